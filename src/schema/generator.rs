//! Generation pipeline
//!
//! Runs load, SQL script, model files and formatting in order. Recoverable loader problems
//! reject the run before anything touches the filesystem; fatal errors are reported with
//! the stage that failed.

use super::config::GenerationConfig;
use super::error::{SchemaError, WriteError};
use super::formatter::{FormatError, Formatter};
use super::introspector::Introspector;
use super::loader::Loader;
use super::model_writer::ModelWriter;
use super::table_writer::TableWriter;
use log::info;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Fatal failure of a generation run, tagged by stage.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("load: {0}")]
    Load(#[source] SchemaError),

    #[error("write schema: {0}")]
    WriteSchema(#[source] WriteError),

    #[error("write models: {0}")]
    WriteModels(#[source] WriteError),

    #[error("format: {0}")]
    Format(#[source] FormatError),
}

/// Paths written by a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationSummary {
    pub schema_file: PathBuf,
    pub models_directory: PathBuf,
    pub model_files: Vec<PathBuf>,
}

#[derive(Debug)]
pub enum GenerationOutcome {
    /// The configuration references things the database does not have; nothing was written
    Rejected(Vec<String>),
    Generated(GenerationSummary),
}

/// Header placed at the top of every generated file.
pub fn file_header(config_path: &str) -> String {
    format!(
        "This file is auto-generated from the database schema. To make changes, update\n\
         the \"{}\" configuration file and then run `schemagen schema generate` to\n\
         regenerate this file.\n",
        config_path
    )
}

pub struct Generator<'a> {
    root: PathBuf,
    introspector: &'a dyn Introspector,
    formatter: &'a dyn Formatter,
}

impl<'a> Generator<'a> {
    /// Relative output paths resolve against `root`.
    pub fn new(
        root: impl Into<PathBuf>,
        introspector: &'a dyn Introspector,
        formatter: &'a dyn Formatter,
    ) -> Self {
        Self {
            root: root.into(),
            introspector,
            formatter,
        }
    }

    pub fn run(
        &self,
        config: &GenerationConfig,
        header: &str,
    ) -> Result<GenerationOutcome, GenerationError> {
        let loaded = Loader::new(self.introspector)
            .load(&config.schema)
            .map_err(GenerationError::Load)?;
        if loaded.has_errors() {
            return Ok(GenerationOutcome::Rejected(loaded.errors));
        }

        let schema_file = self.resolve(&config.output.schema_file);
        TableWriter::new()
            .write_file(&schema_file, &loaded.tables, header)
            .map_err(GenerationError::WriteSchema)?;

        let models_directory = self.resolve(&config.output.models_directory);
        let model_files = ModelWriter::new(&config.output.models_namespace, header)
            .write(&loaded.tables, &models_directory)
            .map_err(GenerationError::WriteModels)?;

        self.formatter
            .format(&models_directory)
            .map_err(GenerationError::Format)?;

        info!("Generated {} table(s)", loaded.tables.len());
        Ok(GenerationOutcome::Generated(GenerationSummary {
            schema_file,
            models_directory,
            model_files,
        }))
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

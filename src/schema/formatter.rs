//! Source formatting for generated model files
//!
//! The model writer emits plain text; a [`Formatter`] normalizes the directory afterwards.
//! [`RustfmtFormatter`] shells out to `rustfmt`, [`NoopFormatter`] leaves files untouched.

use log::{debug, info};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FormatError {
    #[error("Failed to list {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to run `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{program}` exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: String,
        stderr: String,
    },
}

/// Formats every generated source file under a directory.
pub trait Formatter {
    fn format(&self, directory: &Path) -> Result<(), FormatError>;
}

/// Runs `rustfmt` over all `.rs` files below the directory in one invocation.
#[derive(Debug, Clone)]
pub struct RustfmtFormatter {
    program: String,
    edition: String,
}

impl RustfmtFormatter {
    pub fn new(program: impl Into<String>, edition: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            edition: edition.into(),
        }
    }
}

impl Default for RustfmtFormatter {
    fn default() -> Self {
        Self::new("rustfmt", "2021")
    }
}

impl Formatter for RustfmtFormatter {
    fn format(&self, directory: &Path) -> Result<(), FormatError> {
        let files = rust_files(directory)?;
        if files.is_empty() {
            debug!("No Rust files to format in {}", directory.display());
            return Ok(());
        }

        let output = Command::new(&self.program)
            .args(["--edition", &self.edition])
            .args(&files)
            .output()
            .map_err(|source| FormatError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(FormatError::Failed {
                program: self.program.clone(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        info!("Formatted {} file(s) with {}", files.len(), self.program);
        Ok(())
    }
}

/// Leaves generated files as written.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopFormatter;

impl Formatter for NoopFormatter {
    fn format(&self, _directory: &Path) -> Result<(), FormatError> {
        Ok(())
    }
}

/// Collect `.rs` files below `directory`, sorted by path.
pub fn rust_files(directory: &Path) -> Result<Vec<PathBuf>, FormatError> {
    let mut files = Vec::new();
    collect(directory, &mut files)?;
    files.sort();
    Ok(files)
}

fn collect(directory: &Path, files: &mut Vec<PathBuf>) -> Result<(), FormatError> {
    let io = |source| FormatError::Io {
        path: directory.to_path_buf(),
        source,
    };

    for entry in fs::read_dir(directory).map_err(io)? {
        let path = entry.map_err(io)?.path();
        if path.is_dir() {
            collect(&path, files)?;
        } else if path.extension().is_some_and(|ext| ext == "rs") {
            files.push(path);
        }
    }
    Ok(())
}

//! Fatal error types for schema loading and writing
//!
//! Recoverable problems (missing tables, missing columns, invalid configuration values) are
//! collected as plain strings and reported together. The errors in this module abort a run.

use super::introspector::IntrospectionError;
use std::path::PathBuf;
use thiserror::Error;

/// Contract violations detected while building the schema model.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// The introspector failed
    #[error("Introspection failed: {0}")]
    Introspection(#[from] IntrospectionError),

    /// A column resolved to a type outside the closed datatype set
    #[error(
        "Unknown datatype `{datatype}` for column {table}.{column}\n\
         Suggestion: add a `global.columns.modify` rule for this column or exclude it"
    )]
    UnknownDatatype {
        table: String,
        column: String,
        datatype: String,
    },

    /// The introspected primary key names a column the table does not have
    #[error("Primary key column {table}.{column} is not a column of the table")]
    PrimaryKeyMismatch { table: String, column: String },

    /// An override rule carries a regex that does not compile
    #[error("Invalid override regex `{pattern}`: {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Failures while rendering or persisting generated artifacts.
#[derive(Debug, Error)]
pub enum WriteError {
    /// Writing an artifact failed
    #[error("Failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Two tables map onto the same generated file
    #[error("Tables `{first}` and `{second}` would both be generated into {file}")]
    NameCollision {
        file: String,
        first: String,
        second: String,
    },

    /// Rendering into the in-memory buffer failed
    #[error("Failed to render output: {0}")]
    Fmt(#[from] std::fmt::Error),
}

impl WriteError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        WriteError::Io {
            path: path.into(),
            source,
        }
    }
}

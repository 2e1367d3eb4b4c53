//! Schema model and generation pipeline
//!
//! This module contains the in-memory schema model ([`Table`], [`Column`], [`Index`]) and
//! every stage that produces or consumes it:
//! - [`ConfigValidator`] structurally checks the configuration document
//! - [`Loader`] turns introspection plus configuration into an ordered `Vec<Table>`
//! - [`TableWriter`] renders the SQL definition script
//! - [`ModelWriter`] renders one row-insert module per table
//! - [`Generator`] runs the stages in order and reports the outcome
//!
//! # Example
//!
//! ```rust
//! use schemagen::schema::{Column, Datatype, Table};
//!
//! let table = Table::new(
//!     "users",
//!     vec![
//!         Column::new("username", Datatype::Text).not_null(),
//!         Column::new("id", Datatype::Integer).primary_key(),
//!         Column::new("bio", Datatype::Text).max_length(160),
//!     ],
//!     Vec::new(),
//!     vec!["id".to_string()],
//! );
//!
//! let order: Vec<&str> = table.sorted_columns().iter().map(|c| c.name.as_str()).collect();
//! assert_eq!(order, ["id", "bio", "username"]);
//! ```

pub mod config;
pub mod error;
pub mod formatter;
pub mod generator;
pub mod inflection;
pub mod introspector;
pub mod loader;
pub mod model_writer;
pub mod table_writer;
pub mod validator;

pub use config::GenerationConfig;
pub use error::{SchemaError, WriteError};
pub use formatter::{FormatError, Formatter, NoopFormatter, RustfmtFormatter};
pub use generator::{GenerationError, GenerationOutcome, GenerationSummary, Generator};
pub use introspector::{InMemoryIntrospector, IntrospectedColumn, Introspector, PostgresIntrospector};
pub use loader::{LoadedSchema, Loader};
pub use model_writer::ModelWriter;
pub use table_writer::TableWriter;
pub use validator::ConfigValidator;

use serde::Deserialize;
use std::fmt;

/// Column datatypes understood by both writers.
///
/// This set is closed. Anything the loader cannot resolve into one of these variants is a
/// contract violation ([`SchemaError::UnknownDatatype`]), not a configuration problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Datatype {
    Blob,
    Boolean,
    Date,
    Datetime,
    Float,
    Integer,
    Json,
    Numeric,
    Text,
    Inet,
}

impl Datatype {
    /// Every datatype, in declaration order.
    pub const ALL: [Datatype; 10] = [
        Datatype::Blob,
        Datatype::Boolean,
        Datatype::Date,
        Datatype::Datetime,
        Datatype::Float,
        Datatype::Integer,
        Datatype::Json,
        Datatype::Numeric,
        Datatype::Text,
        Datatype::Inet,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Datatype::Blob => "blob",
            Datatype::Boolean => "boolean",
            Datatype::Date => "date",
            Datatype::Datetime => "datetime",
            Datatype::Float => "float",
            Datatype::Integer => "integer",
            Datatype::Json => "json",
            Datatype::Numeric => "numeric",
            Datatype::Text => "text",
            Datatype::Inet => "inet",
        }
    }

    /// Look up a datatype by its lowercase name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.as_str() == name)
    }

    /// Resolve an introspected native type name.
    ///
    /// `binary` becomes `blob`; `string`, `enum` and `uuid` become `text`; `jsonb` becomes
    /// `json`. Every other name must already be a datatype name.
    pub fn from_native(native_type: &str) -> Option<Self> {
        match native_type {
            "binary" => Some(Datatype::Blob),
            "string" | "enum" | "uuid" => Some(Datatype::Text),
            "jsonb" => Some(Datatype::Json),
            other => Self::from_name(other),
        }
    }

    /// Whether a declared length limit is meaningful for this type.
    pub fn is_text_like(&self) -> bool {
        matches!(self, Datatype::Text)
    }
}

impl fmt::Display for Datatype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A column of a generated table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub datatype: Datatype,
    /// Omissible on insert: nullable in the database or backed by a default value.
    pub nullable: bool,
    pub max_length: Option<u32>,
    pub is_primary_key: bool,
}

impl Column {
    /// Create a nullable, non-key column.
    pub fn new(name: impl Into<String>, datatype: Datatype) -> Self {
        Self {
            name: name.into(),
            datatype,
            nullable: true,
            max_length: None,
            is_primary_key: false,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Mark the column as a primary-key column (which also makes it `NOT NULL`).
    pub fn primary_key(mut self) -> Self {
        self.is_primary_key = true;
        self.nullable = false;
        self
    }

    pub fn max_length(mut self, max_length: u32) -> Self {
        self.max_length = Some(max_length);
        self
    }

    /// Whether the row-creation operation must receive a value for this column.
    pub fn is_required(&self) -> bool {
        self.is_primary_key || !self.nullable
    }
}

/// An index declared in the configuration document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Index {
    pub name: String,
    pub column_names: Vec<String>,
    pub unique: bool,
    /// Raw filter clause appended to the statement as-is (e.g. `WHERE deleted_at IS NULL`).
    pub condition: Option<String>,
}

/// A table selected for generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub name: String,
    pub columns: Vec<Column>,
    pub indexes: Vec<Index>,
    pub primary_key_column_names: Vec<String>,
}

impl Table {
    pub fn new(
        name: impl Into<String>,
        columns: Vec<Column>,
        indexes: Vec<Index>,
        primary_key_column_names: Vec<String>,
    ) -> Self {
        Self {
            name: name.into(),
            columns,
            indexes,
            primary_key_column_names,
        }
    }

    /// Columns in output order: primary-key columns by name, then all others by name.
    ///
    /// Both writers use this order, so the DDL column list and the row-creation parameter
    /// list always line up.
    pub fn sorted_columns(&self) -> Vec<&Column> {
        let mut columns: Vec<&Column> = self.columns.iter().collect();
        columns.sort_by(|a, b| {
            b.is_primary_key
                .cmp(&a.is_primary_key)
                .then_with(|| a.name.cmp(&b.name))
        });
        columns
    }

    pub fn has_composite_primary_key(&self) -> bool {
        self.primary_key_column_names.len() > 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::users_table;

    #[test]
    fn test_sorted_columns_primary_key_first() {
        let table = users_table();
        let names: Vec<&str> = table
            .sorted_columns()
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(names, ["id", "bio", "username"]);
    }

    #[test]
    fn test_sorted_columns_composite_key_ordered_by_name() {
        let table = Table::new(
            "post_tags",
            vec![
                Column::new("created_at", Datatype::Datetime).not_null(),
                Column::new("tag_id", Datatype::Integer).primary_key(),
                Column::new("post_id", Datatype::Integer).primary_key(),
                Column::new("a_note", Datatype::Text),
            ],
            Vec::new(),
            vec!["tag_id".to_string(), "post_id".to_string()],
        );

        let names: Vec<&str> = table
            .sorted_columns()
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(names, ["post_id", "tag_id", "a_note", "created_at"]);
        assert!(table.has_composite_primary_key());
    }

    #[test]
    fn test_datatype_from_native() {
        assert_eq!(Datatype::from_native("binary"), Some(Datatype::Blob));
        assert_eq!(Datatype::from_native("string"), Some(Datatype::Text));
        assert_eq!(Datatype::from_native("enum"), Some(Datatype::Text));
        assert_eq!(Datatype::from_native("uuid"), Some(Datatype::Text));
        assert_eq!(Datatype::from_native("jsonb"), Some(Datatype::Json));
        assert_eq!(Datatype::from_native("datetime"), Some(Datatype::Datetime));
        assert_eq!(Datatype::from_native("inet"), Some(Datatype::Inet));
        assert_eq!(Datatype::from_native("interval"), None);
    }

    #[test]
    fn test_column_required() {
        assert!(Column::new("id", Datatype::Integer).primary_key().is_required());
        assert!(Column::new("username", Datatype::Text).not_null().is_required());
        assert!(!Column::new("bio", Datatype::Text).is_required());

        // A nullable key column is still required by the row-creation operation
        let mut key = Column::new("id", Datatype::Integer).primary_key();
        key.nullable = true;
        assert!(key.is_required());
    }
}

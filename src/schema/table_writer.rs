//! SQL definition script writer
//!
//! Renders the loaded tables as `CREATE TABLE` and `CREATE INDEX` statements for the
//! intermediate SQLite database. Column lines are aligned per table so the script reads
//! like a hand-maintained schema file and diffs cleanly.

use super::error::WriteError;
use super::{Column, Datatype, Table};
use log::info;
use std::fmt::Write;
use std::fs;
use std::path::Path;

/// Type token written for a datatype.
///
/// Types SQLite has no native notion of get distinct placeholder tokens so downstream
/// readers can tell them apart from plain text.
pub fn sql_type(datatype: Datatype) -> &'static str {
    match datatype {
        Datatype::Blob => "BLOB",
        Datatype::Boolean => "BOOLEAN",
        Datatype::Date => "DATE",
        Datatype::Datetime => "DATETIME",
        Datatype::Float => "FLOAT",
        Datatype::Integer => "INTEGER",
        Datatype::Numeric => "NUMERIC",
        Datatype::Text => "TEXT",
        Datatype::Inet => "INET_TEXT",
        Datatype::Json => "JSON_TEXT",
    }
}

/// Writer for the SQL definition script.
#[derive(Debug, Default)]
pub struct TableWriter;

impl TableWriter {
    pub fn new() -> Self {
        Self
    }

    /// Render the header comment followed by every table.
    pub fn write(&self, tables: &[Table], header: &str) -> Result<String, WriteError> {
        let mut sql = String::new();
        write_header(&mut sql, header)?;
        for table in tables {
            write_table(&mut sql, table)?;
        }
        Ok(sql)
    }

    /// Render the script and write it to `path`, creating parent directories.
    pub fn write_file(&self, path: &Path, tables: &[Table], header: &str) -> Result<(), WriteError> {
        let sql = self.write(tables, header)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| WriteError::io(parent, e))?;
        }
        fs::write(path, sql).map_err(|e| WriteError::io(path, e))?;

        info!("Wrote schema for {} table(s) to {}", tables.len(), path.display());
        Ok(())
    }
}

fn write_header(sql: &mut String, header: &str) -> Result<(), WriteError> {
    for line in header.lines() {
        writeln!(sql, "{}", format!("-- {}", line).trim_end())?;
    }
    writeln!(sql)?;
    Ok(())
}

fn write_table(sql: &mut String, table: &Table) -> Result<(), WriteError> {
    writeln!(sql, "CREATE TABLE {}", table.name)?;
    writeln!(sql, "(")?;

    let mut definitions = column_definitions(table);
    if table.has_composite_primary_key() {
        definitions.push(format!(
            "    PRIMARY KEY ({})",
            table.primary_key_column_names.join(", ")
        ));
    }
    writeln!(sql, "{}", definitions.join(",\n"))?;
    writeln!(sql, ");")?;

    for index in &table.indexes {
        writeln!(sql)?;
        write!(sql, "CREATE ")?;
        if index.unique {
            write!(sql, "UNIQUE ")?;
        }
        write!(
            sql,
            "INDEX {} ON {} ({})",
            index.name,
            table.name,
            index.column_names.join(", ")
        )?;
        if let Some(condition) = index.condition.as_deref().filter(|c| !c.trim().is_empty()) {
            write!(sql, " {}", condition)?;
        }
        writeln!(sql, ";")?;
    }

    writeln!(sql)?;
    Ok(())
}

fn column_definitions(table: &Table) -> Vec<String> {
    let columns = table.sorted_columns();
    let composite = table.has_composite_primary_key();

    let name_width = columns.iter().map(|c| c.name.len()).max().unwrap_or(0);
    let type_width = columns
        .iter()
        .map(|c| sql_type(c.datatype).len())
        .max()
        .unwrap_or(0);

    columns
        .iter()
        .map(|column| {
            let mut parts = vec![
                format!("{:<width$}", column.name, width = name_width),
                format!("{:<width$}", sql_type(column.datatype), width = type_width),
            ];
            parts.extend(constraints(column, composite).into_iter().map(String::from));

            format!("    {}", parts.join(" ").trim_end())
        })
        .collect()
}

fn constraints(column: &Column, composite_primary_key: bool) -> Vec<&'static str> {
    let mut constraints = Vec::new();

    if column.is_primary_key && !composite_primary_key {
        // INTEGER PRIMARY KEY is a rowid alias and can never be NULL
        if column.datatype != Datatype::Integer {
            constraints.push("NOT NULL");
        }
        constraints.push("PRIMARY KEY");
    } else if column.is_primary_key || !column.nullable {
        constraints.push("NOT NULL");
    }

    constraints
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Index;
    use crate::test_helpers::users_table;

    #[test]
    fn test_users_table_layout() {
        let sql = TableWriter::new()
            .write(&[users_table()], "Generated file.\nDo not edit.")
            .unwrap();

        let expected = "\
-- Generated file.
-- Do not edit.

CREATE TABLE users
(
    id       INTEGER PRIMARY KEY,
    bio      TEXT,
    username TEXT    NOT NULL
);

";
        assert_eq!(sql, expected);
    }

    #[test]
    fn test_blank_header_lines_have_no_trailing_space() {
        let sql = TableWriter::new().write(&[], "first\n\nsecond\n").unwrap();
        assert_eq!(sql, "-- first\n--\n-- second\n\n");
    }

    #[test]
    fn test_text_primary_key_gets_not_null() {
        let table = Table::new(
            "user_api_keys",
            vec![
                Column::new("key", Datatype::Text).primary_key(),
                Column::new("user_id", Datatype::Integer).not_null(),
            ],
            Vec::new(),
            vec!["key".to_string()],
        );

        let sql = TableWriter::new().write(&[table], "h").unwrap();
        assert!(sql.contains("    key     TEXT    NOT NULL PRIMARY KEY,\n"));
        assert!(sql.contains("    user_id INTEGER NOT NULL\n"));
    }

    #[test]
    fn test_composite_primary_key() {
        let mut post_id = Column::new("post_id", Datatype::Integer).primary_key();
        // a key column with a default is still NOT NULL in the script
        post_id.nullable = true;

        let table = Table::new(
            "post_tags",
            vec![
                Column::new("tag_id", Datatype::Integer).primary_key(),
                post_id,
                Column::new("created_at", Datatype::Datetime).not_null(),
                Column::new("metadata", Datatype::Json),
            ],
            Vec::new(),
            vec!["post_id".to_string(), "tag_id".to_string()],
        );

        let sql = TableWriter::new().write(&[table], "h").unwrap();
        let expected = "\
CREATE TABLE post_tags
(
    post_id    INTEGER   NOT NULL,
    tag_id     INTEGER   NOT NULL,
    created_at DATETIME  NOT NULL,
    metadata   JSON_TEXT,
    PRIMARY KEY (post_id, tag_id)
);
";
        assert!(sql.contains(expected), "unexpected output:\n{}", sql);
    }

    #[test]
    fn test_indexes() {
        let mut table = users_table();
        table.indexes = vec![
            Index {
                name: "users_username".to_string(),
                column_names: vec!["username".to_string()],
                unique: true,
                condition: None,
            },
            Index {
                name: "users_bio".to_string(),
                column_names: vec!["bio".to_string(), "id".to_string()],
                unique: false,
                condition: Some("WHERE bio IS NOT NULL".to_string()),
            },
        ];

        let sql = TableWriter::new().write(&[table], "h").unwrap();
        assert!(sql.ends_with(
            ");\n\
             \n\
             CREATE UNIQUE INDEX users_username ON users (username);\n\
             \n\
             CREATE INDEX users_bio ON users (bio, id) WHERE bio IS NOT NULL;\n\
             \n"
        ));
    }

    #[test]
    fn test_placeholder_type_tokens() {
        assert_eq!(sql_type(Datatype::Inet), "INET_TEXT");
        assert_eq!(sql_type(Datatype::Json), "JSON_TEXT");
        assert_eq!(sql_type(Datatype::Datetime), "DATETIME");
        assert_eq!(sql_type(Datatype::Blob), "BLOB");
    }

    #[test]
    fn test_write_file_creates_directories() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("db").join("schema.sql");

        TableWriter::new()
            .write_file(&path, &[users_table()], "h")
            .unwrap();

        let sql = std::fs::read_to_string(&path).unwrap();
        assert!(sql.starts_with("-- h\n\nCREATE TABLE users\n"));
    }
}

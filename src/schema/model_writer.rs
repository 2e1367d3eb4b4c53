//! Row-insert module writer
//!
//! Generates one Rust source file per table. Each file declares a unit struct named after
//! the singularized table with two items:
//! - `SQL`, the parameterized `INSERT` statement for the intermediate database
//! - `create`, which takes a row and hands its values to the insert runtime in the same
//!   order as the statement's placeholders
//!
//! The row is a struct with one named field per column. `Row::new` takes only the required
//! columns (primary key or `NOT NULL` without default) and leaves every optional one `None`:
//!
//! ```text
//! User::create(UserRow {
//!     bio: Some("hello"),
//!     ..UserRow::new(1, "alice")
//! })
//! ```
//!
//! Fields, constructor arguments and insert values all follow [`Table::sorted_columns`], the
//! same order the SQL definition script uses. The runtime (`insert` and `Result`) lives in
//! the configured namespace module.
//!
//! The output is not formatted here; the pipeline runs a [`Formatter`](super::Formatter)
//! over the directory once every file is written.

use super::error::WriteError;
use super::inflection::{file_name_for, rust_identifier, type_name_for};
use super::{Column, Datatype, Table};
use log::{debug, info};
use std::collections::BTreeMap;
use std::fmt::Write;
use std::fs;
use std::path::{Path, PathBuf};

/// Maximum width of a placeholder line, indentation included.
const MAX_LINE_LENGTH: usize = 100;
const SQL_INDENT: &str = "            ";
const PLACEHOLDER: &str = "?, ";
const LAST_PLACEHOLDER: &str = "?";
/// Clippy's default `too_many_arguments` threshold.
const MAX_ARGUMENTS: usize = 7;

/// Field type of a row struct for a datatype; borrowed types use the row lifetime `'a`.
pub fn rust_type(datatype: Datatype) -> &'static str {
    match datatype {
        Datatype::Blob => "&'a [u8]",
        Datatype::Boolean => "bool",
        Datatype::Date => "chrono::NaiveDate",
        Datatype::Datetime => "chrono::DateTime<chrono::Utc>",
        Datatype::Float => "f64",
        Datatype::Integer => "i64",
        Datatype::Json => "&'a serde_json::Value",
        Datatype::Numeric => "rust_decimal::Decimal",
        Datatype::Text => "&'a str",
        Datatype::Inet => "std::net::IpAddr",
    }
}

fn is_borrowed(datatype: Datatype) -> bool {
    rust_type(datatype).starts_with('&')
}

fn field_type(column: &Column) -> String {
    if column.is_required() {
        rust_type(column.datatype).to_string()
    } else {
        format!("Option<{}>", rust_type(column.datatype))
    }
}

/// Writer for per-table row-insert modules.
#[derive(Debug, Clone)]
pub struct ModelWriter {
    namespace: String,
    header: String,
}

impl ModelWriter {
    /// `namespace` is the Rust path of the insert runtime (e.g. `crate::intermediate_db`).
    pub fn new(namespace: impl Into<String>, header: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            header: header.into(),
        }
    }

    /// Name of the file generated for `table`.
    pub fn file_name_for(table: &Table) -> String {
        file_name_for(&table.name)
    }

    /// Render the module source for one table.
    pub fn render(&self, table: &Table) -> Result<String, WriteError> {
        let columns = table.sorted_columns();
        let type_name = type_name_for(&table.name);
        let row_name = format!("{}Row", type_name);
        let borrows = columns.iter().any(|c| is_borrowed(c.datatype));
        let (row_generics, row_argument) = if borrows {
            ("<'a>", format!("{}<'_>", row_name))
        } else {
            ("", row_name.clone())
        };

        let mut code = String::new();

        for line in self.header.lines() {
            writeln!(code, "{}", format!("// {}", line).trim_end())?;
        }
        writeln!(code)?;
        writeln!(code, "pub struct {};", type_name)?;
        writeln!(code)?;
        writeln!(code, "impl {} {{", type_name)?;
        writeln!(code, "    pub const SQL: &'static str = r#\"")?;
        writeln!(code, "        INSERT INTO {} (", table.name)?;
        writeln!(code, "{}", column_names(&columns))?;
        writeln!(code, "        )")?;
        writeln!(code, "        VALUES (")?;
        writeln!(code, "{}", value_placeholders(columns.len()))?;
        writeln!(code, "        )")?;
        writeln!(code, "    \"#;")?;
        writeln!(code)?;
        writeln!(
            code,
            "    pub fn create(row: {}) -> {}::Result<()> {{",
            row_argument, self.namespace
        )?;
        writeln!(code, "        {}::insert(", self.namespace)?;
        writeln!(code, "            Self::SQL,")?;
        writeln!(code, "            &[")?;
        writeln!(code, "{}", insertion_arguments(&columns))?;
        writeln!(code, "            ],")?;
        writeln!(code, "        )")?;
        writeln!(code, "    }}")?;
        writeln!(code, "}}")?;
        writeln!(code)?;

        writeln!(code, "pub struct {}{} {{", row_name, row_generics)?;
        writeln!(code, "{}", row_fields(&columns))?;
        writeln!(code, "}}")?;
        writeln!(code)?;

        let required: Vec<&Column> = columns
            .iter()
            .copied()
            .filter(|c| c.is_required())
            .collect();
        writeln!(code, "impl{} {}{} {{", row_generics, row_name, row_generics)?;
        if required.is_empty() {
            writeln!(code, "    #[allow(clippy::new_without_default)]")?;
        }
        if required.len() > MAX_ARGUMENTS {
            writeln!(code, "    #[allow(clippy::too_many_arguments)]")?;
        }
        writeln!(code, "    pub fn new({}) -> Self {{", constructor_parameters(&required))?;
        writeln!(code, "        Self {{")?;
        writeln!(code, "{}", constructor_fields(&columns))?;
        writeln!(code, "        }}")?;
        writeln!(code, "    }}")?;
        writeln!(code, "}}")?;

        Ok(code)
    }

    /// Write one file per table into `directory`, creating it if needed.
    ///
    /// Returns the written paths in table order.
    pub fn write(&self, tables: &[Table], directory: &Path) -> Result<Vec<PathBuf>, WriteError> {
        let mut file_owners: BTreeMap<String, &str> = BTreeMap::new();
        for table in tables {
            let file = Self::file_name_for(table);
            if let Some(first) = file_owners.insert(file.clone(), &table.name) {
                return Err(WriteError::NameCollision {
                    file,
                    first: first.to_string(),
                    second: table.name.clone(),
                });
            }
        }

        fs::create_dir_all(directory).map_err(|e| WriteError::io(directory, e))?;

        let mut paths = Vec::with_capacity(tables.len());
        for table in tables {
            let path = directory.join(Self::file_name_for(table));
            let code = self.render(table)?;
            fs::write(&path, code).map_err(|e| WriteError::io(&path, e))?;
            debug!("Generated {}", path.display());
            paths.push(path);
        }

        info!(
            "Wrote {} model file(s) to {}",
            paths.len(),
            directory.display()
        );
        Ok(paths)
    }
}

fn column_names(columns: &[&Column]) -> String {
    columns
        .iter()
        .map(|c| format!("{}{}", SQL_INDENT, c.name))
        .collect::<Vec<_>>()
        .join(",\n")
}

/// Pack `count` placeholders greedily into lines of at most [`MAX_LINE_LENGTH`] characters.
fn value_placeholders(count: usize) -> String {
    let max_length = MAX_LINE_LENGTH - SQL_INDENT.len();
    let mut placeholders = String::from(SQL_INDENT);
    let mut current_length = 0;

    for index in 1..=count {
        let placeholder = if index == count {
            LAST_PLACEHOLDER
        } else {
            PLACEHOLDER
        };

        if current_length + placeholder.len() > max_length {
            let trimmed = placeholders.trim_end().len();
            placeholders.truncate(trimmed);
            placeholders.push('\n');
            placeholders.push_str(SQL_INDENT);
            current_length = 0;
        }

        placeholders.push_str(placeholder);
        current_length += placeholder.len();
    }

    placeholders
}

fn row_fields(columns: &[&Column]) -> String {
    columns
        .iter()
        .map(|c| format!("    pub {}: {},", rust_identifier(&c.name), field_type(c)))
        .collect::<Vec<_>>()
        .join("\n")
}

fn constructor_parameters(required: &[&Column]) -> String {
    required
        .iter()
        .map(|c| format!("{}: {}", rust_identifier(&c.name), field_type(c)))
        .collect::<Vec<_>>()
        .join(", ")
}

fn constructor_fields(columns: &[&Column]) -> String {
    columns
        .iter()
        .map(|c| {
            if c.is_required() {
                format!("            {},", rust_identifier(&c.name))
            } else {
                format!("            {}: None,", rust_identifier(&c.name))
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn insertion_arguments(columns: &[&Column]) -> String {
    columns
        .iter()
        .map(|c| format!("                row.{}.into(),", rust_identifier(&c.name)))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::users_table;

    fn writer() -> ModelWriter {
        ModelWriter::new("crate::intermediate_db", "Generated file.\nDo not edit.")
    }

    #[test]
    fn test_users_module() {
        let code = writer().render(&users_table()).unwrap();

        let expected = r###"// Generated file.
// Do not edit.

pub struct User;

impl User {
    pub const SQL: &'static str = r#"
        INSERT INTO users (
            id,
            bio,
            username
        )
        VALUES (
            ?, ?, ?
        )
    "#;

    pub fn create(row: UserRow<'_>) -> crate::intermediate_db::Result<()> {
        crate::intermediate_db::insert(
            Self::SQL,
            &[
                row.id.into(),
                row.bio.into(),
                row.username.into(),
            ],
        )
    }
}

pub struct UserRow<'a> {
    pub id: i64,
    pub bio: Option<&'a str>,
    pub username: &'a str,
}

impl<'a> UserRow<'a> {
    pub fn new(id: i64, username: &'a str) -> Self {
        Self {
            id,
            bio: None,
            username,
        }
    }
}
"###;
        assert_eq!(code, expected);
    }

    #[test]
    fn test_placeholders_single_line() {
        assert_eq!(value_placeholders(1), format!("{}?", SQL_INDENT));
        assert_eq!(value_placeholders(3), format!("{}?, ?, ?", SQL_INDENT));
    }

    #[test]
    fn test_placeholders_wrap_at_line_budget() {
        // 88 characters of budget fit 29 "?, " (87) plus a final "?"
        let thirty = value_placeholders(30);
        assert_eq!(thirty.lines().count(), 1);
        assert_eq!(thirty.len(), SQL_INDENT.len() + 29 * 3 + 1);

        let forty = value_placeholders(40);
        let lines: Vec<&str> = forty.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], format!("{}{}", SQL_INDENT, "?, ".repeat(29).trim_end()));
        assert_eq!(lines[1], format!("{}{}?", SQL_INDENT, "?, ".repeat(10)));
        assert!(lines.iter().all(|line| line.len() <= MAX_LINE_LENGTH));
        assert_eq!(forty.matches('?').count(), 40);
    }

    #[test]
    fn test_keyword_columns_and_types() {
        let table = Table::new(
            "user_events",
            vec![
                Column::new("id", Datatype::Integer).primary_key(),
                Column::new("type", Datatype::Text).not_null(),
                Column::new("payload", Datatype::Json),
                Column::new("created_at", Datatype::Datetime).not_null(),
                Column::new("ip_address", Datatype::Inet),
            ],
            Vec::new(),
            vec!["id".to_string()],
        );

        let code = writer().render(&table).unwrap();
        assert!(code.contains("pub struct UserEvent;"));
        assert!(code.contains("pub struct UserEventRow<'a> {"));
        assert!(code.contains("            type,\n"));
        assert!(code.contains("    pub r#type: &'a str,\n"));
        assert!(code.contains("                row.r#type.into(),\n"));
        assert!(code.contains("    pub payload: Option<&'a serde_json::Value>,\n"));
        assert!(code.contains("    pub created_at: chrono::DateTime<chrono::Utc>,\n"));
        assert!(code.contains("    pub ip_address: Option<std::net::IpAddr>,\n"));
        assert!(code.contains(
            "    pub fn new(id: i64, created_at: chrono::DateTime<chrono::Utc>, r#type: &'a str) -> Self {\n"
        ));
        assert!(code.contains("            ip_address: None,\n"));
        assert!(!code.contains("#[allow("));
    }

    #[test]
    fn test_optional_columns_are_left_out_of_constructor() {
        let table = Table::new(
            "user_profiles",
            vec![
                Column::new("user_id", Datatype::Integer).primary_key(),
                Column::new("approved_by_id", Datatype::Integer),
                Column::new("flair_group_id", Datatype::Integer),
                Column::new("website", Datatype::Text),
            ],
            Vec::new(),
            vec!["user_id".to_string()],
        );

        let code = writer().render(&table).unwrap();
        assert!(code.contains("    pub fn new(user_id: i64) -> Self {\n"));
        assert!(code.contains(
            "            user_id,\n            approved_by_id: None,\n            flair_group_id: None,\n            website: None,\n"
        ));
        assert!(code.contains("    pub approved_by_id: Option<i64>,\n    pub flair_group_id: Option<i64>,\n"));
    }

    #[test]
    fn test_row_without_borrowed_fields_has_no_lifetime() {
        let table = Table::new(
            "post_timings",
            vec![
                Column::new("post_id", Datatype::Integer).primary_key(),
                Column::new("msecs", Datatype::Integer).not_null(),
                Column::new("seen_at", Datatype::Datetime),
            ],
            Vec::new(),
            vec!["post_id".to_string()],
        );

        let code = writer().render(&table).unwrap();
        assert!(code.contains("    pub fn create(row: PostTimingRow) -> crate::intermediate_db::Result<()> {"));
        assert!(code.contains("pub struct PostTimingRow {\n"));
        assert!(code.contains("impl PostTimingRow {\n"));
        assert!(!code.contains("'a"));
    }

    #[test]
    fn test_all_optional_columns() {
        let table = Table::new(
            "tag_notes",
            vec![Column::new("note", Datatype::Text)],
            Vec::new(),
            Vec::new(),
        );

        let code = writer().render(&table).unwrap();
        assert!(code.contains("    #[allow(clippy::new_without_default)]\n    pub fn new() -> Self {\n"));
        assert!(code.contains("            note: None,\n"));
    }

    #[test]
    fn test_many_required_columns_allow_clippy() {
        let columns = (0..8)
            .map(|i| Column::new(format!("c{}", i), Datatype::Integer).not_null())
            .collect();
        let table = Table::new("metrics", columns, Vec::new(), Vec::new());

        let code = writer().render(&table).unwrap();
        assert!(code.contains("    #[allow(clippy::too_many_arguments)]\n    pub fn new("));
        assert!(code.contains("    pub fn create(row: MetricRow) -> "));
    }

    #[test]
    fn test_write_files() {
        let dir = tempfile::TempDir::new().unwrap();
        let models = dir.path().join("intermediate_db");

        let paths = writer().write(&[users_table()], &models).unwrap();
        assert_eq!(paths, [models.join("user.rs")]);
        assert!(std::fs::read_to_string(&paths[0])
            .unwrap()
            .contains("INSERT INTO users ("));
    }

    #[test]
    fn test_file_name_collision() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut singular = users_table();
        singular.name = "user".to_string();

        let result = writer().write(&[singular, users_table()], dir.path());
        assert!(matches!(
            result,
            Err(WriteError::NameCollision { ref file, .. }) if file == "user.rs"
        ));
    }
}

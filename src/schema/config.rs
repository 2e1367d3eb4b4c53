//! Configuration document parsing
//!
//! The configuration document selects tables and columns, declares indexes and names the
//! output locations. It is usually YAML (`config/intermediate_db.yml`), but JSON and TOML
//! renditions are accepted as well. Every format is normalized into a `serde_json::Value`
//! first, which is what [`ConfigValidator`](super::ConfigValidator) checks; only a valid
//! document is turned into the typed [`GenerationConfig`].

use super::Datatype;
use serde::Deserialize;
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use yaml_rust::{Yaml, YamlLoader};

/// Errors while reading the configuration document.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    #[error("Configuration file wasn't found at '{}'", .0.display())]
    NotFound(PathBuf),

    #[error("Failed to read configuration file '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration file: {0}")]
    Parse(String),

    #[error("Configuration does not match the expected structure: {0}")]
    Invalid(#[from] serde_json::Error),
}

/// Supported document formats, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Yaml,
    Json,
    Toml,
}

impl DocumentFormat {
    /// Pick the format from the file extension; anything unknown is read as YAML.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|s| s.to_str()).unwrap_or("") {
            "json" => DocumentFormat::Json,
            "toml" => DocumentFormat::Toml,
            _ => DocumentFormat::Yaml,
        }
    }
}

/// Extensions tried, in order, when locating `<name>` in a configuration directory.
const DOCUMENT_EXTENSIONS: &[&str] = &["yml", "yaml", "json", "toml"];

/// Find the configuration document for database `name` in `directory`.
///
/// The `.yml` path is reported when no candidate exists.
pub fn locate_document(directory: &Path, name: &str) -> Result<PathBuf, ConfigFileError> {
    DOCUMENT_EXTENSIONS
        .iter()
        .map(|ext| directory.join(format!("{}.{}", name, ext)))
        .find(|path| path.is_file())
        .ok_or_else(|| ConfigFileError::NotFound(directory.join(format!("{}.yml", name))))
}

/// Read and parse a configuration document into its untyped tree.
pub fn load_document(path: &Path) -> Result<Value, ConfigFileError> {
    if !path.exists() {
        return Err(ConfigFileError::NotFound(path.to_path_buf()));
    }

    let content = fs::read_to_string(path).map_err(|source| ConfigFileError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    parse_document(&content, DocumentFormat::from_path(path))
}

/// Parse document text in the given format.
pub fn parse_document(content: &str, format: DocumentFormat) -> Result<Value, ConfigFileError> {
    match format {
        DocumentFormat::Json => {
            serde_json::from_str(content).map_err(|e| ConfigFileError::Parse(e.to_string()))
        }
        DocumentFormat::Toml => {
            toml::from_str(content).map_err(|e| ConfigFileError::Parse(e.to_string()))
        }
        DocumentFormat::Yaml => {
            let docs = YamlLoader::load_from_str(content)
                .map_err(|e| ConfigFileError::Parse(e.to_string()))?;
            match docs.into_iter().next() {
                Some(doc) => yaml_to_json(doc),
                None => Ok(Value::Null),
            }
        }
    }
}

fn yaml_to_json(yaml: Yaml) -> Result<Value, ConfigFileError> {
    let value = match yaml {
        Yaml::Null => Value::Null,
        Yaml::Boolean(b) => Value::Bool(b),
        Yaml::Integer(i) => Value::Number(i.into()),
        Yaml::Real(s) => {
            let parsed: f64 = s
                .parse()
                .map_err(|_| ConfigFileError::Parse(format!("invalid number `{}`", s)))?;
            Number::from_f64(parsed)
                .map(Value::Number)
                .ok_or_else(|| ConfigFileError::Parse(format!("invalid number `{}`", s)))?
        }
        Yaml::String(s) => Value::String(s),
        Yaml::Array(items) => Value::Array(
            items
                .into_iter()
                .map(yaml_to_json)
                .collect::<Result<Vec<_>, _>>()?,
        ),
        Yaml::Hash(hash) => {
            let mut map = Map::new();
            for (key, value) in hash {
                map.insert(yaml_key(key)?, yaml_to_json(value)?);
            }
            Value::Object(map)
        }
        Yaml::Alias(_) => {
            return Err(ConfigFileError::Parse(
                "YAML aliases are not supported".to_string(),
            ))
        }
        Yaml::BadValue => {
            return Err(ConfigFileError::Parse("invalid YAML value".to_string()))
        }
    };
    Ok(value)
}

fn yaml_key(key: Yaml) -> Result<String, ConfigFileError> {
    match key {
        Yaml::String(s) | Yaml::Real(s) => Ok(s),
        Yaml::Integer(i) => Ok(i.to_string()),
        Yaml::Boolean(b) => Ok(b.to_string()),
        other => Err(ConfigFileError::Parse(format!(
            "unsupported mapping key: {:?}",
            other
        ))),
    }
}

/// Typed configuration document.
#[derive(Debug, Clone, Deserialize)]
pub struct GenerationConfig {
    pub output: OutputConfig,
    pub schema: SchemaConfig,
}

impl GenerationConfig {
    /// Convert a validated document tree into the typed configuration.
    pub fn from_value(value: Value) -> Result<Self, ConfigFileError> {
        Ok(serde_json::from_value(value)?)
    }
}

/// Where generated artifacts go.
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    pub schema_file: String,
    pub models_directory: String,
    /// Rust path of the module that provides `insert` and `Result` to generated code.
    pub models_namespace: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchemaConfig {
    /// Selected tables. A `null` entry selects a table with all of its columns.
    pub tables: BTreeMap<String, Option<TableConfig>>,
    pub global: GlobalConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GlobalConfig {
    pub tables: GlobalTablesConfig,
    #[serde(default)]
    pub columns: GlobalColumnsConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GlobalTablesConfig {
    #[serde(default)]
    pub exclude: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GlobalColumnsConfig {
    #[serde(default)]
    pub exclude: Vec<String>,
    /// Ordered override rules; the first matching rule wins.
    #[serde(default)]
    pub modify: Vec<ModifyRule>,
}

/// Force a datatype onto every column whose name matches `regex`.
#[derive(Debug, Clone, Deserialize)]
pub struct ModifyRule {
    pub regex: String,
    pub datatype: Datatype,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TableConfig {
    #[serde(default)]
    pub columns: Option<ColumnSelection>,
    #[serde(default)]
    pub indexes: Vec<IndexConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ColumnSelection {
    pub include: Option<Vec<String>>,
    pub exclude: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IndexConfig {
    pub name: String,
    pub columns: IndexColumns,
    #[serde(default)]
    pub unique: bool,
    pub condition: Option<String>,
}

/// `columns: topic_id` and `columns: [topic_id, user_id]` are both accepted.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum IndexColumns {
    One(String),
    Many(Vec<String>),
}

impl IndexColumns {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            IndexColumns::One(name) => vec![name],
            IndexColumns::Many(names) => names,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const YAML: &str = r#"
output:
  schema_file: db/intermediate_db_schema/100-base-schema.sql
  models_directory: src/intermediate_db
  models_namespace: crate::intermediate_db

schema:
  global:
    tables:
      exclude:
        - schema_migrations
    columns:
      exclude:
        - updated_at
      modify:
        - regex: "_ip_address$"
          datatype: inet
  tables:
    users:
      columns:
        exclude:
          - password_hash
      indexes:
        - name: users_username
          columns: username
          unique: true
    posts:
"#;

    #[test]
    fn test_parse_yaml_document() {
        let value = parse_document(YAML, DocumentFormat::Yaml).unwrap();
        assert_eq!(
            value["schema"]["global"]["columns"]["modify"][0]["datatype"],
            json!("inet")
        );
        assert_eq!(value["schema"]["tables"]["posts"], Value::Null);
        assert_eq!(
            value["schema"]["tables"]["users"]["indexes"][0]["unique"],
            json!(true)
        );
    }

    #[test]
    fn test_typed_config_from_yaml() {
        let value = parse_document(YAML, DocumentFormat::Yaml).unwrap();
        let config = GenerationConfig::from_value(value).unwrap();

        assert_eq!(config.output.models_namespace, "crate::intermediate_db");
        assert_eq!(config.schema.global.tables.exclude, ["schema_migrations"]);
        assert_eq!(config.schema.global.columns.modify[0].datatype, Datatype::Inet);

        let users = config.schema.tables["users"].clone().unwrap();
        let selection = users.columns.unwrap();
        assert_eq!(selection.exclude.unwrap(), ["password_hash"]);
        assert!(selection.include.is_none());

        let index = users.indexes[0].clone();
        assert!(index.unique);
        assert_eq!(index.columns.into_vec(), ["username"]);
        assert!(config.schema.tables["posts"].is_none());
    }

    #[test]
    fn test_parse_json_and_toml_documents() {
        let json_doc = r#"{"schema": {"tables": {"users": null}}}"#;
        let value = parse_document(json_doc, DocumentFormat::Json).unwrap();
        assert_eq!(value["schema"]["tables"]["users"], Value::Null);

        let toml_doc = "[schema.global.tables]\nexclude = [\"schema_migrations\"]\n";
        let value = parse_document(toml_doc, DocumentFormat::Toml).unwrap();
        assert_eq!(
            value["schema"]["global"]["tables"]["exclude"],
            json!(["schema_migrations"])
        );
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(
            DocumentFormat::from_path(Path::new("config/intermediate_db.yml")),
            DocumentFormat::Yaml
        );
        assert_eq!(
            DocumentFormat::from_path(Path::new("config/intermediate_db.json")),
            DocumentFormat::Json
        );
        assert_eq!(
            DocumentFormat::from_path(Path::new("config/intermediate_db.toml")),
            DocumentFormat::Toml
        );
    }

    #[test]
    fn test_parse_invalid_yaml() {
        let result = parse_document("schema: [unclosed", DocumentFormat::Yaml);
        assert!(matches!(result, Err(ConfigFileError::Parse(_))));
    }

    #[test]
    fn test_load_missing_document() {
        let result = load_document(Path::new("/nonexistent/config/intermediate_db.yml"));
        match result {
            Err(e @ ConfigFileError::NotFound(_)) => {
                assert!(e.to_string().contains("wasn't found"));
            }
            other => panic!("Expected NotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_locate_document() {
        let dir = tempfile::TempDir::new().unwrap();

        let missing = locate_document(dir.path(), "intermediate_db").unwrap_err();
        assert!(missing.to_string().contains("intermediate_db.yml"));

        std::fs::write(dir.path().join("intermediate_db.json"), "{}").unwrap();
        assert_eq!(
            locate_document(dir.path(), "intermediate_db").unwrap(),
            dir.path().join("intermediate_db.json")
        );

        std::fs::write(dir.path().join("intermediate_db.yml"), "").unwrap();
        assert_eq!(
            locate_document(dir.path(), "intermediate_db").unwrap(),
            dir.path().join("intermediate_db.yml")
        );
    }
}

//! Structural validation of the configuration document
//!
//! The validator walks the untyped document tree and checks it against the fixed layout the
//! loader expects. It never fails: every problem becomes one error string that names the
//! offending location as a JSON pointer. Whether tables and columns actually exist is not
//! checked here; that is the loader's job.

use super::Datatype;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

static MODULE_PATH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(crate|self|super|[A-Za-z_][A-Za-z0-9_]*)(::[A-Za-z_][A-Za-z0-9_]*)*$")
        .expect("module path pattern is valid")
});

/// Structural validator for configuration documents.
///
/// The error list is cleared at the start of every [`validate`](Self::validate) call, so a
/// single validator can be reused for several documents.
///
/// # Example
///
/// ```rust
/// use schemagen::schema::ConfigValidator;
/// use serde_json::json;
///
/// let mut validator = ConfigValidator::new();
/// validator.validate(&json!({ "schema": {} }));
/// assert!(validator.has_errors());
/// ```
#[derive(Debug, Default)]
pub struct ConfigValidator {
    errors: Vec<String>,
}

impl ConfigValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate a document, returning all structural errors found.
    pub fn validate(&mut self, config: &Value) -> &[String] {
        self.errors.clear();
        self.check_root(config);
        &self.errors
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    fn check_root(&mut self, config: &Value) {
        let Some(root) = self.object(config, "", &["output", "schema"], &["output", "schema"])
        else {
            return;
        };

        if let Some(output) = root.get("output") {
            self.check_output(output, "/output");
        }
        if let Some(schema) = root.get("schema") {
            self.check_schema(schema, "/schema");
        }
    }

    fn check_output(&mut self, value: &Value, pointer: &str) {
        let keys = ["schema_file", "models_directory", "models_namespace"];
        let Some(output) = self.object(value, pointer, &keys, &keys) else {
            return;
        };

        for key in ["schema_file", "models_directory"] {
            if let Some(value) = output.get(key) {
                self.string(value, &child(pointer, key));
            }
        }

        if let Some(value) = output.get("models_namespace") {
            let pointer = child(pointer, "models_namespace");
            if let Some(namespace) = self.string(value, &pointer) {
                if !MODULE_PATH.is_match(namespace) {
                    self.error(&pointer, "is not a valid Rust module path");
                }
            }
        }
    }

    fn check_schema(&mut self, value: &Value, pointer: &str) {
        let keys = ["tables", "global"];
        let Some(schema) = self.object(value, pointer, &keys, &keys) else {
            return;
        };

        if let Some(global) = schema.get("global") {
            self.check_global(global, &child(pointer, "global"));
        }
        if let Some(tables) = schema.get("tables") {
            self.check_tables(tables, &child(pointer, "tables"));
        }
    }

    fn check_global(&mut self, value: &Value, pointer: &str) {
        let Some(global) = self.object(value, pointer, &["tables"], &["tables", "columns"]) else {
            return;
        };

        if let Some(tables) = global.get("tables") {
            let pointer = child(pointer, "tables");
            if let Some(tables) = self.object(tables, &pointer, &["exclude"], &["exclude"]) {
                if let Some(exclude) = tables.get("exclude") {
                    self.string_list(exclude, &child(&pointer, "exclude"));
                }
            }
        }

        if let Some(columns) = global.get("columns") {
            let pointer = child(pointer, "columns");
            if let Some(columns) = self.object(columns, &pointer, &[], &["exclude", "modify"]) {
                if let Some(exclude) = columns.get("exclude") {
                    self.string_list(exclude, &child(&pointer, "exclude"));
                }
                if let Some(modify) = columns.get("modify") {
                    self.check_modify_rules(modify, &child(&pointer, "modify"));
                }
            }
        }
    }

    fn check_modify_rules(&mut self, value: &Value, pointer: &str) {
        let Some(rules) = self.array(value, pointer) else {
            return;
        };

        for (i, rule) in rules.iter().enumerate() {
            let pointer = child(pointer, &i.to_string());
            let keys = ["regex", "datatype"];
            let Some(rule) = self.object(rule, &pointer, &keys, &keys) else {
                continue;
            };

            if let Some(regex) = rule.get("regex") {
                let pointer = child(&pointer, "regex");
                if let Some(pattern) = self.string(regex, &pointer) {
                    if Regex::new(pattern).is_err() {
                        self.error(&pointer, "is not a valid regex");
                    }
                }
            }

            if let Some(datatype) = rule.get("datatype") {
                let pointer = child(&pointer, "datatype");
                if let Some(name) = self.string(datatype, &pointer) {
                    if Datatype::from_name(name).is_none() {
                        let allowed: Vec<&str> = Datatype::ALL.iter().map(|d| d.as_str()).collect();
                        self.error(&pointer, &format!("is not one of: {}", allowed.join(", ")));
                    }
                }
            }
        }
    }

    fn check_tables(&mut self, value: &Value, pointer: &str) {
        let Some(tables) = self.object(value, pointer, &[], &[]) else {
            return;
        };

        for (name, table) in tables {
            // `users:` with nothing below it selects the whole table
            if table.is_null() {
                continue;
            }

            let pointer = child(pointer, name);
            let Some(table) = self.object(table, &pointer, &[], &["columns", "indexes"]) else {
                continue;
            };

            if let Some(columns) = table.get("columns") {
                self.check_column_selection(columns, &child(&pointer, "columns"));
            }
            if let Some(indexes) = table.get("indexes") {
                self.check_indexes(indexes, &child(&pointer, "indexes"));
            }
        }
    }

    fn check_column_selection(&mut self, value: &Value, pointer: &str) {
        let keys = ["include", "exclude"];
        let Some(columns) = self.object(value, pointer, &[], &keys) else {
            return;
        };

        let present: Vec<&str> = keys
            .iter()
            .copied()
            .filter(|key| columns.contains_key(*key))
            .collect();
        if present.len() != 1 {
            self.error(pointer, "must contain exactly one of: include, exclude");
        }

        for key in present {
            if let Some(list) = columns.get(key) {
                self.string_list(list, &child(pointer, key));
            }
        }
    }

    fn check_indexes(&mut self, value: &Value, pointer: &str) {
        let Some(indexes) = self.array(value, pointer) else {
            return;
        };

        for (i, index) in indexes.iter().enumerate() {
            let pointer = child(pointer, &i.to_string());
            let Some(index) = self.object(
                index,
                &pointer,
                &["name", "columns"],
                &["name", "columns", "unique", "condition"],
            ) else {
                continue;
            };

            if let Some(name) = index.get("name") {
                self.string(name, &child(&pointer, "name"));
            }

            if let Some(columns) = index.get("columns") {
                let pointer = child(&pointer, "columns");
                if !columns.is_string() {
                    if let Some(names) = self.string_list(columns, &pointer) {
                        if names.is_empty() {
                            self.error(&pointer, "must not be empty");
                        }
                    }
                }
            }

            if let Some(unique) = index.get("unique") {
                if !unique.is_boolean() {
                    self.error(&child(&pointer, "unique"), "is not a boolean");
                }
            }

            if let Some(condition) = index.get("condition") {
                self.string(condition, &child(&pointer, "condition"));
            }
        }
    }

    /// Check that `value` is an object with all `required` keys and, unless `allowed` is
    /// empty, no keys outside `allowed`.
    fn object<'a>(
        &mut self,
        value: &'a Value,
        pointer: &str,
        required: &[&str],
        allowed: &[&str],
    ) -> Option<&'a Map<String, Value>> {
        let Some(map) = value.as_object() else {
            self.error(pointer, "is not an object");
            return None;
        };

        let missing: Vec<&str> = required
            .iter()
            .copied()
            .filter(|key| !map.contains_key(*key))
            .collect();
        if !missing.is_empty() {
            self.error(
                pointer,
                &format!("is missing required properties: {}", missing.join(", ")),
            );
        }

        if !allowed.is_empty() {
            for key in map.keys() {
                if !allowed.contains(&key.as_str()) {
                    self.error(&child(pointer, key), "is a disallowed additional property");
                }
            }
        }

        Some(map)
    }

    fn array<'a>(&mut self, value: &'a Value, pointer: &str) -> Option<&'a Vec<Value>> {
        let array = value.as_array();
        if array.is_none() {
            self.error(pointer, "is not an array");
        }
        array
    }

    fn string<'a>(&mut self, value: &'a Value, pointer: &str) -> Option<&'a str> {
        let string = value.as_str();
        if string.is_none() {
            self.error(pointer, "is not a string");
        }
        string
    }

    fn string_list<'a>(&mut self, value: &'a Value, pointer: &str) -> Option<Vec<&'a str>> {
        let items = self.array(value, pointer)?;
        let mut strings = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            if let Some(s) = self.string(item, &child(pointer, &i.to_string())) {
                strings.push(s);
            }
        }
        Some(strings)
    }

    fn error(&mut self, pointer: &str, problem: &str) {
        let location = if pointer.is_empty() { "/" } else { pointer };
        self.errors
            .push(format!("value at `{}` {}", location, problem));
    }
}

/// Append one reference token to a JSON pointer, escaping `~` and `/`.
fn child(pointer: &str, token: &str) -> String {
    format!("{}/{}", pointer, token.replace('~', "~0").replace('/', "~1"))
}

//! Schema loader
//!
//! Combines the introspected database structure with the configuration document and
//! produces the ordered list of [`Table`]s both writers consume.
//!
//! Configuration that references tables or columns the database does not have is a
//! recoverable problem: it is recorded in [`LoadedSchema::errors`] and loading continues, so
//! a single run reports every such mistake at once. Only contract violations (an unknown
//! datatype, a primary key naming a missing column, a failing introspector) abort with a
//! [`SchemaError`].

use super::config::{ColumnSelection, GlobalConfig, SchemaConfig, TableConfig};
use super::error::SchemaError;
use super::inflection::is_identifier;
use super::introspector::{IntrospectedColumn, Introspector};
use super::{Column, Datatype, Index, Table};
use log::{debug, info, warn};
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};

/// Result of a loader run.
#[derive(Debug, Default)]
pub struct LoadedSchema {
    /// Selected tables, ordered by name
    pub tables: Vec<Table>,
    /// Recoverable configuration problems; no artifacts may be written if any exist
    pub errors: Vec<String>,
}

impl LoadedSchema {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Global column rules, compiled once per run.
struct GlobalRules {
    excluded_columns: BTreeSet<String>,
    overrides: Vec<(Regex, Datatype)>,
}

impl GlobalRules {
    fn compile(global: &GlobalConfig) -> Result<Self, SchemaError> {
        let overrides = global
            .columns
            .modify
            .iter()
            .map(|rule| {
                Regex::new(&rule.regex)
                    .map(|regex| (regex, rule.datatype))
                    .map_err(|source| SchemaError::InvalidRegex {
                        pattern: rule.regex.clone(),
                        source,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            excluded_columns: global.columns.exclude.iter().cloned().collect(),
            overrides,
        })
    }

    /// First matching override rule wins; otherwise the native type is mapped.
    fn datatype_for(
        &self,
        table_name: &str,
        column: &IntrospectedColumn,
    ) -> Result<Datatype, SchemaError> {
        if let Some((regex, datatype)) = self
            .overrides
            .iter()
            .find(|(regex, _)| regex.is_match(&column.name))
        {
            debug!(
                "{}.{}: override rule `{}` sets datatype {}",
                table_name,
                column.name,
                regex.as_str(),
                datatype
            );
            return Ok(*datatype);
        }

        Datatype::from_native(&column.native_type).ok_or_else(|| SchemaError::UnknownDatatype {
            table: table_name.to_string(),
            column: column.name.clone(),
            datatype: column.native_type.clone(),
        })
    }
}

/// Builds the schema model from an [`Introspector`] and a configuration.
pub struct Loader<'a> {
    introspector: &'a dyn Introspector,
}

impl<'a> Loader<'a> {
    pub fn new(introspector: &'a dyn Introspector) -> Self {
        Self { introspector }
    }

    /// Load every configured table.
    ///
    /// Tables are processed and returned in name order, so the same database and
    /// configuration always produce the same result.
    pub fn load(&self, config: &SchemaConfig) -> Result<LoadedSchema, SchemaError> {
        let mut errors = Vec::new();
        let rules = GlobalRules::compile(&config.global)?;
        let existing_table_names =
            self.filtered_table_names(&config.global.tables.exclude, &mut errors)?;

        let mut tables = Vec::with_capacity(config.tables.len());
        let default_config = TableConfig::default();

        for (table_name, table_config) in &config.tables {
            if !existing_table_names.contains(table_name) {
                errors.push(format!("Table does not exist: {}", table_name));
                continue;
            }

            let table_config = table_config.as_ref().unwrap_or(&default_config);
            tables.push(self.table(table_name, table_config, &rules, &mut errors)?);
        }

        info!(
            "Loaded {} table(s) with {} error(s)",
            tables.len(),
            errors.len()
        );

        Ok(LoadedSchema { tables, errors })
    }

    /// All introspected tables minus the globally excluded ones.
    fn filtered_table_names(
        &self,
        excluded: &[String],
        errors: &mut Vec<String>,
    ) -> Result<BTreeSet<String>, SchemaError> {
        let mut table_names = self.introspector.list_tables()?;
        let excluded: BTreeSet<&String> = excluded.iter().collect();

        for name in excluded {
            if !table_names.remove(name) {
                errors.push(format!("Ignored table does not exist: {}", name));
            }
        }

        Ok(table_names)
    }

    fn table(
        &self,
        table_name: &str,
        config: &TableConfig,
        rules: &GlobalRules,
        errors: &mut Vec<String>,
    ) -> Result<Table, SchemaError> {
        let primary_key_column_names = self.introspector.list_primary_keys(table_name)?;
        let introspected = self.introspector.list_columns(table_name)?;

        let columns_by_name: BTreeMap<&str, &IntrospectedColumn> = introspected
            .iter()
            .map(|column| (column.name.as_str(), column))
            .collect();

        if let Some(missing) = primary_key_column_names
            .iter()
            .find(|name| !columns_by_name.contains_key(name.as_str()))
        {
            return Err(SchemaError::PrimaryKeyMismatch {
                table: table_name.to_string(),
                column: missing.clone(),
            });
        }

        let selected = filtered_columns(
            table_name,
            config.columns.as_ref(),
            columns_by_name,
            &primary_key_column_names,
            rules,
            errors,
        );

        let columns = selected
            .into_values()
            .filter(|column| {
                let valid = is_identifier(&column.name);
                if !valid {
                    errors.push(format!(
                        "Column name is not a valid identifier: {}.{}",
                        table_name, column.name
                    ));
                }
                valid
            })
            .map(|column| -> Result<Column, SchemaError> {
                let datatype = rules.datatype_for(table_name, column)?;
                Ok(Column {
                    name: column.name.clone(),
                    datatype,
                    nullable: column.nullable || column.has_default,
                    max_length: if datatype.is_text_like() {
                        column.declared_limit
                    } else {
                        None
                    },
                    is_primary_key: primary_key_column_names.contains(&column.name),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        if columns.is_empty() {
            errors.push(format!("No columns selected for table: {}", table_name));
        }
        debug!("{}: {} column(s) selected", table_name, columns.len());

        Ok(Table::new(
            table_name,
            columns,
            indexes(config),
            primary_key_column_names,
        ))
    }
}

/// Apply the per-table selection and the global column exclusions.
///
/// Primary-key columns survive every rule: an include list that omits them still yields
/// them and exclusions that name them are ignored.
fn filtered_columns<'c>(
    table_name: &str,
    selection: Option<&ColumnSelection>,
    mut columns: BTreeMap<&'c str, &'c IntrospectedColumn>,
    primary_keys: &[String],
    rules: &GlobalRules,
    errors: &mut Vec<String>,
) -> BTreeMap<&'c str, &'c IntrospectedColumn> {
    let is_key = |name: &str| primary_keys.iter().any(|key| key == name);

    match selection {
        Some(ColumnSelection {
            include: Some(included),
            ..
        }) => {
            for name in included {
                if !columns.contains_key(name.as_str()) {
                    errors.push(format!(
                        "Included column not found: {}.{}",
                        table_name, name
                    ));
                }
            }
            columns.retain(|name, _| {
                let keep = included.iter().any(|included| included == name);
                if !keep && is_key(name) {
                    debug!("{}.{}: keeping primary key column", table_name, name);
                    return true;
                }
                keep
            });
        }
        Some(ColumnSelection {
            exclude: Some(excluded),
            ..
        }) => {
            for name in excluded {
                if is_key(name) {
                    warn!(
                        "{}.{}: primary key column cannot be excluded, keeping it",
                        table_name, name
                    );
                    continue;
                }
                if columns.remove(name.as_str()).is_none() {
                    errors.push(format!(
                        "Excluded column not found: {}.{}",
                        table_name, name
                    ));
                }
            }
        }
        _ => {}
    }

    columns.retain(|name, _| {
        if !rules.excluded_columns.contains(*name) {
            return true;
        }
        if is_key(name) {
            warn!(
                "{}.{}: primary key column is globally excluded, keeping it",
                table_name, name
            );
            return true;
        }
        false
    });

    columns
}

fn indexes(config: &TableConfig) -> Vec<Index> {
    config
        .indexes
        .iter()
        .map(|index| Index {
            name: index.name.clone(),
            column_names: index.columns.clone().into_vec(),
            unique: index.unique,
            condition: index.condition.clone(),
        })
        .collect()
}

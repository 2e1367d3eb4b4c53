//! Database introspection
//!
//! The loader only sees the database through the [`Introspector`] trait: table names, the
//! columns of a table and its primary key. [`PostgresIntrospector`] answers these questions
//! from the system catalogs of a live database; [`InMemoryIntrospector`] answers them from
//! definitions held in memory.

use may_postgres::{Client, Error as PostgresError, Row};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// Introspection error type
#[derive(Debug, Error)]
pub enum IntrospectionError {
    /// `PostgreSQL` error from `may_postgres`
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] PostgresError),

    /// The requested table is not known to the introspector
    #[error("Unknown table: {0}")]
    UnknownTable(String),
}

/// Column metadata as reported by the database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntrospectedColumn {
    pub name: String,
    /// Abstract native type name (`integer`, `string`, `jsonb`, ...)
    pub native_type: String,
    pub nullable: bool,
    pub has_default: bool,
    pub declared_limit: Option<u32>,
}

impl IntrospectedColumn {
    /// Create a nullable column without default or limit.
    pub fn new(name: impl Into<String>, native_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            native_type: native_type.into(),
            nullable: true,
            has_default: false,
            declared_limit: None,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn with_default(mut self) -> Self {
        self.has_default = true;
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.declared_limit = Some(limit);
        self
    }
}

/// Read-only view of a database's structure.
pub trait Introspector {
    /// Names of all tables.
    fn list_tables(&self) -> Result<BTreeSet<String>, IntrospectionError>;

    /// Columns of `table` in declaration order; empty when it has none.
    fn list_columns(&self, table: &str) -> Result<Vec<IntrospectedColumn>, IntrospectionError>;

    /// Primary-key column names of `table` in key order; empty without a primary key.
    fn list_primary_keys(&self, table: &str) -> Result<Vec<String>, IntrospectionError>;
}

/// Introspector backed by in-memory table definitions.
///
/// # Example
///
/// ```rust
/// use schemagen::schema::{InMemoryIntrospector, IntrospectedColumn, Introspector};
///
/// let db = InMemoryIntrospector::new().table(
///     "users",
///     vec![
///         IntrospectedColumn::new("id", "integer").not_null(),
///         IntrospectedColumn::new("username", "string").not_null(),
///     ],
///     &["id"],
/// );
///
/// assert!(db.list_tables().unwrap().contains("users"));
/// assert_eq!(db.list_primary_keys("users").unwrap(), ["id"]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemoryIntrospector {
    tables: BTreeMap<String, InMemoryTable>,
}

#[derive(Debug, Clone)]
struct InMemoryTable {
    columns: Vec<IntrospectedColumn>,
    primary_keys: Vec<String>,
}

impl InMemoryIntrospector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a table.
    pub fn table(
        mut self,
        name: impl Into<String>,
        columns: Vec<IntrospectedColumn>,
        primary_keys: &[&str],
    ) -> Self {
        self.tables.insert(
            name.into(),
            InMemoryTable {
                columns,
                primary_keys: primary_keys.iter().map(|s| s.to_string()).collect(),
            },
        );
        self
    }

    fn get(&self, table: &str) -> Result<&InMemoryTable, IntrospectionError> {
        self.tables
            .get(table)
            .ok_or_else(|| IntrospectionError::UnknownTable(table.to_string()))
    }
}

impl Introspector for InMemoryIntrospector {
    fn list_tables(&self) -> Result<BTreeSet<String>, IntrospectionError> {
        Ok(self.tables.keys().cloned().collect())
    }

    fn list_columns(&self, table: &str) -> Result<Vec<IntrospectedColumn>, IntrospectionError> {
        Ok(self.get(table)?.columns.clone())
    }

    fn list_primary_keys(&self, table: &str) -> Result<Vec<String>, IntrospectionError> {
        Ok(self.get(table)?.primary_keys.clone())
    }
}

const TABLES_SQL: &str = "
    SELECT table_name::text
    FROM information_schema.tables
    WHERE table_schema = $1 AND table_type = 'BASE TABLE'
";

const COLUMNS_SQL: &str = "
    SELECT
        c.column_name::text AS name,
        c.data_type::text AS data_type,
        c.udt_name::text AS udt_name,
        (c.is_nullable = 'YES') AS nullable,
        (c.column_default IS NOT NULL OR c.is_identity = 'YES') AS has_default,
        c.character_maximum_length::int4 AS declared_limit,
        EXISTS (
            SELECT 1 FROM pg_type t WHERE t.typname = c.udt_name AND t.typtype = 'e'
        ) AS is_enum
    FROM information_schema.columns c
    WHERE c.table_schema = $1 AND c.table_name = $2
    ORDER BY c.ordinal_position
";

const PRIMARY_KEYS_SQL: &str = "
    SELECT a.attname::text
    FROM pg_index i
    JOIN pg_class c ON c.oid = i.indrelid
    JOIN pg_namespace n ON n.oid = c.relnamespace
    JOIN LATERAL unnest(i.indkey) WITH ORDINALITY AS k(attnum, ord) ON true
    JOIN pg_attribute a ON a.attrelid = c.oid AND a.attnum = k.attnum
    WHERE i.indisprimary AND n.nspname = $1 AND c.relname = $2
    ORDER BY k.ord
";

/// Introspector for one schema of a live PostgreSQL database.
pub struct PostgresIntrospector {
    client: Client,
    schema: String,
}

impl PostgresIntrospector {
    /// Introspect `schema` (usually `public`) through an open client.
    pub fn new(client: Client, schema: impl Into<String>) -> Self {
        Self {
            client,
            schema: schema.into(),
        }
    }

    fn column_from_row(row: &Row) -> Result<IntrospectedColumn, IntrospectionError> {
        let data_type: String = row.try_get("data_type")?;
        let udt_name: String = row.try_get("udt_name")?;
        let is_enum: bool = row.try_get("is_enum")?;
        let declared_limit: Option<i32> = row.try_get("declared_limit")?;

        Ok(IntrospectedColumn {
            name: row.try_get("name")?,
            native_type: native_type_for(&data_type, &udt_name, is_enum),
            nullable: row.try_get("nullable")?,
            has_default: row.try_get("has_default")?,
            declared_limit: declared_limit.and_then(|limit| u32::try_from(limit).ok()),
        })
    }
}

impl Introspector for PostgresIntrospector {
    fn list_tables(&self) -> Result<BTreeSet<String>, IntrospectionError> {
        let rows = self.client.query(TABLES_SQL, &[&self.schema])?;
        rows.iter()
            .map(|row| row.try_get::<_, String>(0).map_err(IntrospectionError::from))
            .collect()
    }

    fn list_columns(&self, table: &str) -> Result<Vec<IntrospectedColumn>, IntrospectionError> {
        // A table without columns yields an empty list; the loader reports it.
        let rows = self.client.query(COLUMNS_SQL, &[&self.schema, &table])?;
        rows.iter().map(Self::column_from_row).collect()
    }

    fn list_primary_keys(&self, table: &str) -> Result<Vec<String>, IntrospectionError> {
        let rows = self.client.query(PRIMARY_KEYS_SQL, &[&self.schema, &table])?;
        rows.iter()
            .map(|row| row.try_get::<_, String>(0).map_err(IntrospectionError::from))
            .collect()
    }
}

/// Map a PostgreSQL column type onto the native type names the loader resolves.
///
/// Types without a mapping pass through under their PostgreSQL name; the loader rejects
/// them unless an override rule covers the column.
pub fn native_type_for(data_type: &str, udt_name: &str, is_enum: bool) -> String {
    let native = match data_type {
        "character varying" | "character" => "string",
        "text" => "text",
        "smallint" | "integer" | "bigint" => "integer",
        "real" | "double precision" => "float",
        "numeric" => "numeric",
        "boolean" => "boolean",
        "date" => "date",
        "timestamp without time zone" | "timestamp with time zone" => "datetime",
        "bytea" => "binary",
        "uuid" => "uuid",
        "json" => "json",
        "jsonb" => "jsonb",
        "inet" => "inet",
        "USER-DEFINED" if is_enum => "enum",
        "USER-DEFINED" if udt_name == "citext" => "string",
        "USER-DEFINED" => udt_name,
        other => other,
    };
    native.to_string()
}

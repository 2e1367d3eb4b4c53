//! # Schemagen
//!
//! Schema-driven generator for the intermediate database used by data migrations.
//!
//! A run introspects a live PostgreSQL schema, narrows it with a declarative
//! configuration document and renders two deterministic artifacts: a SQL definition
//! script and one typed row-insert module per table.

pub mod config;
pub mod connection;
pub mod schema;

#[cfg(test)]
mod test_helpers;

pub use config::Settings;
pub use schema::{
    Column, ConfigValidator, Datatype, GenerationConfig, Generator, Index, Loader, ModelWriter,
    Table, TableWriter,
};

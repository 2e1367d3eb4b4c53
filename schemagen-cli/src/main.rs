//! schemagen command-line tool
//!
//! Validates schema configuration documents and generates the intermediate database
//! schema script plus row-insert modules from a live PostgreSQL database.

use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::Colorize;
use schemagen::connection::connect;
use schemagen::schema::config::{load_document, locate_document};
use schemagen::schema::generator::file_header;
use schemagen::schema::{
    ConfigValidator, GenerationConfig, GenerationOutcome, Generator, PostgresIntrospector,
    RustfmtFormatter,
};
use schemagen::Settings;
use std::path::{Path, PathBuf};
use std::process;

/// Exit code for configuration validation errors and fatal failures
const EXIT_FAILURE: i32 = 1;
/// Exit code for configuration that references missing tables or columns
const EXIT_SCHEMA_ERRORS: i32 = 2;

#[derive(Parser)]
#[command(name = "schemagen")]
#[command(about = "Intermediate database schema and model generator")]
#[command(version)]
struct Cli {
    /// Project root; configuration and output paths resolve against it
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// Source database connection URL
    #[arg(long)]
    database_url: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Quiet output (errors only)
    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage database schema
    Schema {
        #[command(subcommand)]
        command: SchemaCommands,
    },
}

#[derive(Subcommand)]
enum SchemaCommands {
    /// Validates the schema config file
    Validate {
        /// Name of the database
        #[arg(long, default_value = "intermediate_db")]
        db: String,
    },

    /// Generates the database schema
    Generate {
        /// Name of the database
        #[arg(long, default_value = "intermediate_db")]
        db: String,
    },
}

fn main() {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let default_filter = if cli.quiet {
        "error"
    } else if cli.verbose {
        "debug"
    } else {
        "info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let code = match run(&cli) {
        Ok(code) => code,
        Err(e) => {
            print_error(&format!("{:#}", e));
            EXIT_FAILURE
        }
    };
    process::exit(code);
}

fn run(cli: &Cli) -> anyhow::Result<i32> {
    let settings = Settings::load(&cli.root).context("settings")?;

    match &cli.command {
        Commands::Schema { command } => match command {
            SchemaCommands::Validate { db } => validate(cli, &settings, db),
            SchemaCommands::Generate { db } => generate(cli, &settings, db),
        },
    }
}

fn validate(cli: &Cli, settings: &Settings, db: &str) -> anyhow::Result<i32> {
    announce(cli, "Validating schema config for", db);

    let config_path = config_path(cli, settings, db)?;
    let document = load_document(&config_path)?;

    let mut validator = ConfigValidator::new();
    if print_errors(validator.validate(&document)) {
        return Ok(EXIT_FAILURE);
    }

    if !cli.quiet {
        println!("{} is valid", relative_to(&cli.root, &config_path).display());
    }
    Ok(0)
}

fn generate(cli: &Cli, settings: &Settings, db: &str) -> anyhow::Result<i32> {
    announce(cli, "Loading schema for", db);

    let config_path = config_path(cli, settings, db)?;
    let document = load_document(&config_path)?;

    let mut validator = ConfigValidator::new();
    if print_errors(validator.validate(&document)) {
        return Ok(EXIT_FAILURE);
    }
    let config = GenerationConfig::from_value(document)?;

    let database_url = database_url(cli.database_url.as_deref(), settings);
    let client = connect(&database_url).context("connect")?;
    let introspector = PostgresIntrospector::new(client, settings.database.schema.clone());
    let formatter =
        RustfmtFormatter::new(&settings.generator.formatter, &settings.generator.edition);

    let header = file_header(&relative_to(&cli.root, &config_path).display().to_string());
    let generator = Generator::new(&cli.root, &introspector, &formatter);

    match generator.run(&config, &header)? {
        GenerationOutcome::Rejected(errors) => {
            print_errors(&errors);
            Ok(EXIT_SCHEMA_ERRORS)
        }
        GenerationOutcome::Generated(summary) => {
            if !cli.quiet {
                println!(
                    "Wrote {} and {} model file(s) to {}",
                    relative_to(&cli.root, &summary.schema_file).display(),
                    summary.model_files.len(),
                    relative_to(&cli.root, &summary.models_directory).display()
                );
            }
            Ok(0)
        }
    }
}

fn config_path(cli: &Cli, settings: &Settings, db: &str) -> anyhow::Result<PathBuf> {
    let directory = cli.root.join(&settings.generator.config_dir);
    Ok(locate_document(&directory, db)?)
}

/// `--database-url` wins over `DATABASE_URL`, which wins over the settings.
fn database_url(flag: Option<&str>, settings: &Settings) -> String {
    flag.map(str::to_string)
        .or_else(|| std::env::var("DATABASE_URL").ok())
        .unwrap_or_else(|| settings.database.url.clone())
}

fn relative_to<'a>(root: &Path, path: &'a Path) -> &'a Path {
    path.strip_prefix(root).unwrap_or(path)
}

fn announce(cli: &Cli, action: &str, db: &str) {
    if !cli.quiet {
        println!("{} {}...", action, db.bold());
    }
}

/// Print every message as an error line; returns whether there were any.
fn print_errors(errors: &[String]) -> bool {
    for error in errors {
        print_error(error);
    }
    !errors.is_empty()
}

fn print_error(message: &str) {
    eprintln!("{}{}", "ERROR: ".red(), message);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_url_flag_wins() {
        let settings = Settings::default();
        assert_eq!(
            database_url(Some("postgres://app:secret@db/forum"), &settings),
            "postgres://app:secret@db/forum"
        );
    }

    #[test]
    fn test_relative_to() {
        let root = Path::new("/srv/forum");
        assert_eq!(
            relative_to(root, Path::new("/srv/forum/config/intermediate_db.yml")),
            Path::new("config/intermediate_db.yml")
        );
        assert_eq!(
            relative_to(root, Path::new("/tmp/schema.sql")),
            Path::new("/tmp/schema.sql")
        );
    }

    #[test]
    fn test_cli_parses_schema_commands() {
        let cli = Cli::try_parse_from(["schemagen", "-v", "schema", "generate", "--db", "uploads"])
            .unwrap();
        assert!(cli.verbose);
        assert!(matches!(
            cli.command,
            Commands::Schema {
                command: SchemaCommands::Generate { ref db }
            } if db == "uploads"
        ));

        let cli = Cli::try_parse_from(["schemagen", "schema", "validate"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Schema {
                command: SchemaCommands::Validate { ref db }
            } if db == "intermediate_db"
        ));
    }
}

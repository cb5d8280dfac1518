//! Patient Records CLI - operator tool over the local record store

mod commands;

use clap::{Parser, Subcommand};
use patient_records::config;
use patient_records::storage::SqliteStore;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "patient-records")]
#[command(version)]
#[command(about = "Referential record store for hospitals, staff, patients and their clinical history")]
#[command(long_about = r#"
Patient Records keeps hospitals, users, role profiles, visits, lab tests,
procedures and health reports in one SQLite file, with every delete rule
declared in the schema.

Example usage:
  patient-records init
  patient-records seed
  patient-records patients --query smith
  patient-records impact hospitals 1
  patient-records delete records 42
"#)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit machine-readable JSON instead of human output
    #[arg(long, global = true)]
    json: bool,

    /// Path to the database file (overrides the config file)
    #[arg(short, long, global = true)]
    database: Option<PathBuf>,

    /// Path to the config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database and apply the schema
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },

    /// Fill an empty store with demo data
    Seed {
        #[arg(long, default_value = "3")]
        hospitals: usize,

        #[arg(long, default_value = "3")]
        admins: usize,

        #[arg(long, default_value = "15")]
        doctors: usize,

        #[arg(long, default_value = "50")]
        patients: usize,

        /// Upper bound on visits per patient
        #[arg(long, default_value = "5")]
        records_per_patient: usize,
    },

    /// Show row counts per table
    Stats,

    /// List hospitals
    Hospitals {
        #[arg(long, default_value = "0")]
        skip: usize,

        #[arg(short, long, default_value = "100")]
        limit: usize,
    },

    /// Search patients by name or email
    Patients {
        /// Search text (matched case-insensitively)
        #[arg(short, long)]
        query: String,
    },

    /// List a patient's visits, newest first
    Records {
        /// Patient user id
        #[arg(short, long)]
        patient: String,

        #[arg(long, default_value = "0")]
        skip: usize,

        #[arg(short, long, default_value = "100")]
        limit: usize,
    },

    /// Preview what deleting a row would cascade, clear, or be blocked by
    Impact {
        /// Table name (e.g. hospitals, users, records)
        table: String,

        /// Primary key of the row
        key: String,
    },

    /// Delete a row; the schema applies cascade / restrict / set-null
    Delete {
        /// Table name (e.g. hospitals, users, records)
        table: String,

        /// Primary key of the row
        key: String,
    },

    /// Audit users against their role profiles
    Check,
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Init { .. } => "init",
            Commands::Seed { .. } => "seed",
            Commands::Stats => "stats",
            Commands::Hospitals { .. } => "hospitals",
            Commands::Patients { .. } => "patients",
            Commands::Records { .. } => "records",
            Commands::Impact { .. } => "impact",
            Commands::Delete { .. } => "delete",
            Commands::Check => "check",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Human,
    Json,
}

impl OutputMode {
    pub fn is_human(&self) -> bool {
        matches!(self, OutputMode::Human)
    }
}

#[derive(Serialize)]
struct Envelope<'a, T: Serialize> {
    ok: bool,
    command: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Print the JSON envelope for a successful command
pub fn emit_success<T: Serialize>(output_mode: OutputMode, command: &str, data: T) -> anyhow::Result<()> {
    if output_mode == OutputMode::Json {
        let envelope = Envelope { ok: true, command, data: Some(data), error: None };
        println!("{}", serde_json::to_string_pretty(&envelope)?);
    }
    Ok(())
}

fn emit_error(output_mode: OutputMode, command: &str, err: &anyhow::Error) {
    match output_mode {
        OutputMode::Human => patient_records::ui::error(&format!("{:#}", err)),
        OutputMode::Json => {
            let envelope: Envelope<'_, ()> =
                Envelope { ok: false, command, data: None, error: Some(format!("{:#}", err)) };
            match serde_json::to_string_pretty(&envelope) {
                Ok(json) => println!("{}", json),
                Err(e) => eprintln!("{}", e),
            }
        }
    }
}

/// Resolve the database path and open the store
pub fn open_store(database: Option<&Path>, config_path: Option<&Path>) -> anyhow::Result<(SqliteStore, PathBuf)> {
    let cfg = config::load_config(config_path)?;
    let path = config::resolve_database_path(database, cfg.as_ref());
    config::ensure_db_dir(&path)?;
    let store = SqliteStore::open(&path)?;
    Ok((store, path))
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let output_mode = if cli.json { OutputMode::Json } else { OutputMode::Human };
    let command = cli.command.name();

    if let Err(err) = run(cli, output_mode) {
        emit_error(output_mode, command, &err);
        std::process::exit(1);
    }
}

fn run(cli: Cli, output_mode: OutputMode) -> anyhow::Result<()> {
    let database = cli.database.as_deref();
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Init { force } => commands::run_init(output_mode, database, config_path, force),
        Commands::Seed { hospitals, admins, doctors, patients, records_per_patient } => {
            let options = patient_records::seed::SeedOptions {
                hospitals,
                admins,
                doctors,
                patients,
                records_per_patient,
            };
            let (store, _) = open_store(database, config_path)?;
            commands::run_seed(output_mode, &store, &options)
        }
        Commands::Stats => {
            let (store, path) = open_store(database, config_path)?;
            commands::run_stats(output_mode, &store, &path)
        }
        Commands::Hospitals { skip, limit } => {
            let (store, _) = open_store(database, config_path)?;
            commands::run_hospitals(output_mode, &store, skip, limit)
        }
        Commands::Patients { query } => {
            let (store, _) = open_store(database, config_path)?;
            commands::run_patients(output_mode, &store, &query)
        }
        Commands::Records { patient, skip, limit } => {
            let (store, _) = open_store(database, config_path)?;
            commands::run_records(output_mode, &store, &patient, skip, limit)
        }
        Commands::Impact { table, key } => {
            let (store, _) = open_store(database, config_path)?;
            commands::run_impact(output_mode, &store, &table, &key)
        }
        Commands::Delete { table, key } => {
            let (store, _) = open_store(database, config_path)?;
            commands::run_delete(output_mode, &store, &table, &key)
        }
        Commands::Check => {
            let (store, _) = open_store(database, config_path)?;
            commands::run_check(output_mode, &store)
        }
    }
}

//! # hl7-cli
//!
//! Command-line interface of the HL7 v2 validation engine.
//!
//! `hl7v2 validate` loads a profile, an optional value-set library and a
//! split message, validates the message and prints the report as JSON.
//! The exit code is 0 for a valid message, 1 when the report holds errors
//! and 2 when validation could not run at all.

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use hl7_profile::{InMemoryValueSetLibrary, ProfileLoader, RawMessage};
use hl7_validation::{ValidationConfig, ValidationEngine};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "hl7v2")]
#[command(about = "HL7 v2 message profile validation")]
#[command(version)]
struct Cli {
    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a message against a profile
    Validate {
        /// Profile file (YAML or JSON)
        #[arg(short, long)]
        profile: PathBuf,

        /// Split message file (JSON or YAML)
        #[arg(short, long)]
        message: PathBuf,

        /// Message id the profile must describe (e.g. ADT_A01)
        #[arg(long)]
        message_id: String,

        /// Value-set library file
        #[arg(long)]
        value_sets: Option<PathBuf>,

        /// Validation configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Validate {
            profile,
            message,
            message_id,
            value_sets,
            config,
        } => validate(&profile, &message, &message_id, value_sets.as_deref(), config.as_deref()).await,
    };

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(2)
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Run a validation and print its report; `Ok(false)` when the report has errors
async fn validate(
    profile: &Path,
    message: &Path,
    message_id: &str,
    value_sets: Option<&Path>,
    config: Option<&Path>,
) -> anyhow::Result<bool> {
    let loader = ProfileLoader::default();
    let loaded = loader
        .register_file(profile)
        .with_context(|| format!("failed to load profile {}", profile.display()))?;
    if loaded.id != message_id {
        bail!(
            "profile {} describes '{}', not '{message_id}'",
            profile.display(),
            loaded.id
        );
    }

    let library = match value_sets {
        Some(path) => loader
            .load_value_sets(path)
            .with_context(|| format!("failed to load value sets {}", path.display()))?,
        None => InMemoryValueSetLibrary::new(),
    };
    let config: ValidationConfig = match config {
        Some(path) => read_document(path).context("failed to load configuration")?,
        None => ValidationConfig::default(),
    };
    let raw: RawMessage = read_document(message).context("failed to load message")?;

    let engine = ValidationEngine::new(Arc::clone(loader.registry()), Arc::new(library)).with_config(config);
    let bound = engine
        .bind(message_id, raw)
        .with_context(|| format!("failed to bind {}", message.display()))?;
    let report = engine.validate(Arc::new(bound)).await?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    tracing::info!(
        "{}: {} errors, {} warnings",
        message.display(),
        report.error_count(),
        report.warning_count()
    );
    Ok(report.is_valid())
}

/// Read a YAML (`.yaml`/`.yml`) or JSON document
fn read_document<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let is_yaml = path
        .extension()
        .is_some_and(|e| e == "yaml" || e == "yml");

    if is_yaml {
        serde_yaml::from_str(&content).with_context(|| format!("YAML parse error in {}", path.display()))
    } else {
        serde_json::from_str(&content).with_context(|| format!("JSON parse error in {}", path.display()))
    }
}

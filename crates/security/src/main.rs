//! Keyward - key store and certificate authority account tool

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{info, warn};

use keyward_config::{validate, Config};
use keyward_security::{KeyStoreService, OfflineClient, SecuritySubsystem};

/// Keyward - manage key stores and ACME certificate authority accounts
#[derive(Parser, Debug)]
#[command(name = "keyward")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file path
    #[arg(short = 'c', long = "config", env = "KEYWARD_CONFIG", default_value = "keyward.kdl")]
    config: PathBuf,

    /// Enable verbose logging (debug level)
    #[arg(long = "verbose", global = true)]
    verbose: bool,

    /// Log output format
    #[arg(long = "log-format", value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate the configuration file and exit
    Test,
    /// List the aliases of a key store
    ReadAliases {
        /// Key store name
        key_store: String,
        /// Describe every alias instead of listing names
        #[arg(short = 'r', long = "recursive")]
        recursive: bool,
        /// Include parsed certificate details
        #[arg(long = "detailed")]
        detailed: bool,
    },
    /// Describe one alias of a key store
    ReadAlias {
        key_store: String,
        alias: String,
        /// Include parsed certificate details
        #[arg(long = "detailed")]
        detailed: bool,
    },
    /// Remove an alias and store the key store
    RemoveAlias { key_store: String, alias: String },
    /// Generate a key pair with a self-signed certificate under an alias
    GenerateKeyPair {
        key_store: String,
        alias: String,
        /// Certificate common name, defaults to the alias
        #[arg(long = "common-name")]
        common_name: Option<String>,
        /// Password protecting the new entry
        #[arg(long = "key-password", env = "KEYWARD_KEY_PASSWORD")]
        key_password: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_format);

    match cli.command {
        Commands::Test => test_config(&cli.config),
        Commands::ReadAliases {
            key_store,
            recursive,
            detailed,
        } => with_key_store(&cli.config, &key_store, |key_store| {
            print_json(&key_store.read_all_aliases(recursive, detailed)?)
        }),
        Commands::ReadAlias {
            key_store,
            alias,
            detailed,
        } => with_key_store(&cli.config, &key_store, |key_store| {
            print_json(&key_store.read_alias(&alias, detailed)?)
        }),
        Commands::RemoveAlias { key_store, alias } => {
            with_key_store(&cli.config, &key_store, |key_store| {
                key_store.remove_alias(&alias)?;
                key_store.store()?;
                Ok(())
            })
        }
        Commands::GenerateKeyPair {
            key_store,
            alias,
            common_name,
            key_password,
        } => with_key_store(&cli.config, &key_store, |key_store| {
            let common_name = common_name.as_deref().unwrap_or(&alias);
            let material =
                key_store.generate_key_pair(&alias, common_name, key_password.as_deref())?;
            key_store.store()?;
            println!("{}", material.fingerprint().unwrap_or_default());
            Ok(())
        }),
    }
}

fn init_logging(verbose: bool, format: LogFormat) {
    let log_level = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    match format {
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init(),
    }
}

fn load_subsystem(config_path: &Path) -> Result<SecuritySubsystem> {
    let config = Config::from_file(config_path).context("Failed to load configuration file")?;
    SecuritySubsystem::new(config, Arc::new(OfflineClient))
        .context("Configuration validation failed")
}

/// Test configuration file and exit
fn test_config(config_path: &Path) -> Result<()> {
    info!("Testing configuration file: {}", config_path.display());
    let subsystem = load_subsystem(config_path)?;

    for warning in validate::lint::lint_config(subsystem.model()).warnings {
        warn!("{}", warning.message);
    }

    // Read every resource's configuration without opening anything
    let ctx = subsystem.operation_context();
    subsystem
        .boot(&ctx)
        .context("Failed to resolve resource references")?;
    ctx.complete();

    let model = subsystem.model();
    info!("Configuration test successful:");
    info!(
        "  - {} certificate authority(ies)",
        subsystem.capabilities().certificate_authorities().names().len()
    );
    info!("  - {} key store(s)", model.key_stores.len());
    info!("  - {} account(s)", model.accounts.len());

    println!(
        "keyward: configuration file {} test is successful",
        config_path.display()
    );
    Ok(())
}

/// Run `operation` against one key store inside a management operation
fn with_key_store(
    config_path: &Path,
    name: &str,
    operation: impl FnOnce(&KeyStoreService) -> Result<()>,
) -> Result<()> {
    let subsystem = load_subsystem(config_path)?;
    let ctx = subsystem.operation_context();

    let result = subsystem
        .key_store(&ctx, name)
        .with_context(|| format!("Failed to open key store '{}'", name))
        .and_then(|key_store| operation(key_store.as_ref()));
    ctx.finish(result)
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

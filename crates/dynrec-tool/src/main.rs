//! Dynrec CLI
//!
//! ## Usage
//!
//! ```bash
//! # Read ./tmp.db if it exists, otherwise create it with random records
//! dynrec
//!
//! # Create a dataset with 1000 records and zero-padded keys
//! dynrec --path run1.db write --count 1000 --key-width 6
//!
//! # Print one record
//! dynrec --path run1.db read --index 42
//!
//! # Show metadata and namespace sizes
//! dynrec --path run1.db inspect
//!
//! # Write the default configuration
//! dynrec generate-config
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use dynrec_tool::{commands, ToolConfig, DEFAULT_CONFIG_FILE};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "dynrec")]
#[command(author, version, about = "Write and read datasets of run-time typed records")]
struct Cli {
    /// Path to the config file
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Dataset directory (overrides config)
    #[arg(short, long, global = true)]
    path: Option<PathBuf>,

    /// Log level (overrides config)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a dataset filled with random records
    Write {
        /// Number of records (overrides config)
        #[arg(short = 'n', long)]
        count: Option<u64>,

        /// Seed for generated values (overrides config)
        #[arg(short, long)]
        seed: Option<u64>,

        /// Zero-padded key width, 0 for decimal keys (overrides config)
        #[arg(short, long)]
        key_width: Option<u32>,

        /// Schema file (overrides config)
        #[arg(long)]
        schema: Option<PathBuf>,

        /// Record type declared in the schema (overrides config)
        #[arg(short, long)]
        record_type: Option<String>,

        /// Log every record in the WAL
        #[arg(long)]
        wal: bool,
    },

    /// Print the schema and records of a dataset
    Read {
        /// Print only this record
        #[arg(short, long)]
        index: Option<u64>,
    },

    /// Print metadata and namespace sizes
    Inspect,

    /// Write the default configuration file
    GenerateConfig {
        /// Output file
        #[arg(default_value = DEFAULT_CONFIG_FILE)]
        output: PathBuf,
    },
}

fn load_config(path: &Path) -> ToolConfig {
    if !path.exists() {
        return ToolConfig::default();
    }
    match ToolConfig::from_file(path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Warning: Failed to load {}: {}", path.display(), e);
            eprintln!("Using default configuration");
            ToolConfig::default()
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(Commands::GenerateConfig { output }) = &cli.command {
        ToolConfig::write_default(output)?;
        println!("Generated default configuration: {}", output.display());
        return Ok(());
    }

    let mut config = load_config(&cli.config);
    if let Some(path) = cli.path {
        config.dataset.path = path;
    }
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }

    // RUST_LOG takes precedence over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_directive()));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(config.logging.show_target)
        .with_thread_ids(config.logging.show_thread_ids)
        .with_file(config.logging.show_location)
        .with_line_number(config.logging.show_location)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    debug!("Dataset path: {}", config.dataset.path.display());

    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    match cli.command {
        None => {
            commands::validate(&config)?;
            commands::run_default(&config, &mut out)?;
        }
        Some(Commands::Write {
            count,
            seed,
            key_width,
            schema,
            record_type,
            wal,
        }) => {
            if let Some(count) = count {
                config.dataset.record_count = count;
            }
            if seed.is_some() {
                config.dataset.seed = seed;
            }
            if let Some(width) = key_width {
                config.dataset.key_width = width;
            }
            if let Some(schema) = schema {
                config.dataset.schema_text = std::fs::read_to_string(&schema)?;
            }
            if let Some(record_type) = record_type {
                config.dataset.record_type = record_type;
            }
            if wal {
                config.dataset.use_wal = true;
            }
            commands::validate(&config)?;

            let meta = commands::write(&config)?;
            writeln!(
                out,
                "Wrote {} records to {}",
                meta.record_count.unwrap_or(0),
                config.dataset.path.display()
            )?;
        }
        Some(Commands::Read { index }) => {
            commands::read(&config.dataset.path, index, &mut out)?;
        }
        Some(Commands::Inspect) => {
            commands::inspect(&config.dataset.path, &mut out)?;
        }
        Some(Commands::GenerateConfig { .. }) => {}
    }

    out.flush()?;
    Ok(())
}

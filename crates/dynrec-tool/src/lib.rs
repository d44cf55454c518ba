//! Dynrec Tool - write, read and inspect datasets from the command line
//!
//! The binary wraps these modules:
//! - `config`: YAML configuration with CLI overrides
//! - `generator`: random record values
//! - `commands`: the subcommands, writing to any `io::Write`

pub mod commands;
pub mod config;
pub mod generator;

pub use config::{ToolConfig, DEFAULT_CONFIG_FILE};
pub use generator::RandomRecordGenerator;

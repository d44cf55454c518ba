//! Tool configuration - can be loaded from YAML

use dynrec_dataset::{DatasetMeta, KeyFormat, WriterOptions};
use dynrec_storage::{StoreOptions, WalDurability, WriteOptions};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::Level;

/// Default config file name
pub const DEFAULT_CONFIG_FILE: &str = "dynrec.yml";

/// Schema used when the config names none
pub const DEFAULT_SCHEMA: &str = r#"syntax = "proto3";
message recorder_1
{
    uint32 oltc = 1;
    int32 voltage = 2;
    int32 current = 3;
}"#;

/// Complete tool configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    /// Dataset to write or read
    pub dataset: DatasetSettings,
    /// Store settings
    pub storage: StorageSettings,
    pub logging: LoggingSettings,
}

/// Dataset settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetSettings {
    /// Store directory
    pub path: PathBuf,
    /// Message to write, declared in `schema_text`
    pub record_type: String,
    pub schema_text: String,
    /// Records generated by `write`
    pub record_count: u64,
    pub start_index: u64,
    pub end_index: u64,
    pub start_timestamp: i64,
    pub end_timestamp: i64,
    /// Zero-padded key width, 0 for plain decimal keys
    pub key_width: u32,
    /// Seed for generated values (None = random)
    pub seed: Option<u64>,
    /// Write records through the WAL instead of bulk loading
    pub use_wal: bool,
}

impl Default for DatasetSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./tmp.db"),
            record_type: "recorder_1".to_string(),
            schema_text: DEFAULT_SCHEMA.to_string(),
            record_count: 10,
            start_index: 0,
            end_index: 100,
            start_timestamp: 142,
            end_timestamp: 200,
            key_width: 0,
            seed: None,
            use_wal: false,
        }
    }
}

/// Store tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// One of `every_write`, `periodic`, `os_default` or `none`
    pub wal_durability: String,
    /// Sync interval for `periodic`
    pub wal_sync_interval_ms: u64,
    /// WAL rotation threshold, MB
    pub max_wal_file_size_mb: u64,
    /// Buffered bytes across namespaces before a flush, in MB
    pub memtable_flush_mb: usize,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            wal_durability: "periodic".to_string(),
            wal_sync_interval_ms: 100,
            max_wal_file_size_mb: 64,
            memtable_flush_mb: 16,
        }
    }
}

/// Log output
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// `trace`, `debug`, `info`, `warn` or `error`
    pub level: String,
    pub show_target: bool,
    pub show_thread_ids: bool,
    /// Print file and line of each event
    pub show_location: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            show_target: false,
            show_thread_ids: false,
            show_location: false,
        }
    }
}

impl ToolConfig {
    /// Parse a YAML config file
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: ToolConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Write the defaults as YAML, as a starting point for editing
    pub fn write_default(path: impl AsRef<Path>) -> anyhow::Result<()> {
        let yaml = serde_yaml::to_string(&Self::default())?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Store options for opening or creating the dataset
    pub fn to_store_options(&self) -> StoreOptions {
        StoreOptions {
            wal_durability: parse_durability(
                &self.storage.wal_durability,
                self.storage.wal_sync_interval_ms,
            ),
            max_wal_file_size: self.storage.max_wal_file_size_mb * 1024 * 1024,
            memtable_flush_bytes: self.storage.memtable_flush_mb * 1024 * 1024,
        }
    }

    /// Writer options, bypassing the WAL unless `use_wal` is set
    pub fn to_writer_options(&self) -> WriterOptions {
        WriterOptions {
            store: self.to_store_options(),
            write: if self.dataset.use_wal {
                WriteOptions::default()
            } else {
                WriteOptions::no_wal()
            },
        }
    }

    /// Metadata for a new dataset
    pub fn to_meta(&self) -> DatasetMeta {
        DatasetMeta::new(&self.dataset.schema_text, &self.dataset.record_type)
            .with_index_range(self.dataset.start_index, self.dataset.end_index)
            .with_time_range(self.dataset.start_timestamp, self.dataset.end_timestamp)
            .with_key_format(KeyFormat::from_width(self.dataset.key_width))
    }

    /// Level for the subscriber, `warn` if unrecognized
    pub fn log_level(&self) -> Level {
        match self.logging.level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "error" => Level::ERROR,
            _ => Level::WARN,
        }
    }

    /// Default filter directive for the subscriber, e.g. `warn`
    pub fn log_directive(&self) -> String {
        self.log_level().to_string().to_ascii_lowercase()
    }
}

fn parse_durability(name: &str, interval_ms: u64) -> WalDurability {
    match name.to_ascii_lowercase().replace('-', "_").as_str() {
        "every_write" | "every" => WalDurability::EveryWrite,
        "periodic" => WalDurability::Periodic { interval_ms },
        "os_default" | "os" => WalDurability::OsDefault,
        "none" => WalDurability::None,
        other => {
            tracing::warn!("Unknown WAL durability {:?}, using the default", other);
            WalDurability::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_round_trips_through_yaml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        ToolConfig::write_default(&path).unwrap();

        let config = ToolConfig::from_file(&path).unwrap();
        assert_eq!(config.dataset.record_type, "recorder_1");
        assert_eq!(config.dataset.schema_text, DEFAULT_SCHEMA);
        assert_eq!(config.dataset.record_count, 10);
        assert_eq!(config.storage.wal_durability, "periodic");
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = "dataset:\n  path: /data/run1\n  key_width: 6\nstorage:\n  wal_durability: none\n";
        let config: ToolConfig = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.dataset.path, PathBuf::from("/data/run1"));
        assert_eq!(config.dataset.end_index, 100);
        assert_eq!(config.to_meta().key_format, KeyFormat::ZeroPadded { width: 6 });
        assert_eq!(config.to_store_options().wal_durability, WalDurability::None);
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn test_durability_names() {
        let mut config = ToolConfig::default();
        config.storage.wal_sync_interval_ms = 25;
        assert_eq!(
            config.to_store_options().wal_durability,
            WalDurability::Periodic { interval_ms: 25 }
        );

        config.storage.wal_durability = "EVERY_WRITE".to_string();
        assert_eq!(config.to_store_options().wal_durability, WalDurability::EveryWrite);

        config.storage.wal_durability = "os".to_string();
        assert_eq!(config.to_store_options().wal_durability, WalDurability::OsDefault);
    }

    #[test]
    fn test_writer_options_follow_use_wal() {
        let mut config = ToolConfig::default();
        assert!(config.to_writer_options().write.disable_wal);
        config.dataset.use_wal = true;
        assert!(!config.to_writer_options().write.disable_wal);
    }

    #[test]
    fn test_log_directive_is_a_valid_filter() {
        let mut config = ToolConfig::default();
        assert_eq!(config.log_directive(), "warn");
        assert!(tracing_subscriber::EnvFilter::try_new(config.log_directive()).is_ok());

        config.logging.level = "TRACE".to_string();
        assert_eq!(config.log_directive(), "trace");
        assert!(tracing_subscriber::EnvFilter::try_new(config.log_directive()).is_ok());
    }

    #[test]
    fn test_log_level() {
        let mut config = ToolConfig::default();
        assert_eq!(config.log_level(), Level::WARN);
        config.logging.level = "Debug".to_string();
        assert_eq!(config.log_level(), Level::DEBUG);
    }
}

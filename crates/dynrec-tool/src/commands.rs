//! Tool commands
//!
//! Output goes to any `Write` so commands can be run against a buffer.

use crate::config::ToolConfig;
use crate::generator::RandomRecordGenerator;
use anyhow::{bail, Context, Result};
use dynrec_dataset::{
    write_dataset_with_options, DatasetMeta, DatasetReader, METADATA_NAMESPACE,
};
use dynrec_storage::Store;
use std::io::Write;
use std::path::Path;
use tracing::info;

/// Create the configured dataset with random records
pub fn write(config: &ToolConfig) -> Result<DatasetMeta> {
    let path = &config.dataset.path;
    let mut generator = match config.dataset.seed {
        Some(seed) => RandomRecordGenerator::new(seed),
        None => RandomRecordGenerator::from_entropy(),
    };

    let meta = write_dataset_with_options(
        path,
        config.to_meta(),
        config.dataset.record_count,
        config.to_writer_options(),
        |_, record| generator.fill(record),
    )
    .with_context(|| format!("failed to write dataset at {}", path.display()))?;

    info!(
        "Wrote {} records to {}",
        meta.record_count.unwrap_or(0),
        path.display()
    );
    Ok(meta)
}

/// Print the dataset's schema and records
///
/// With `index`, only that record is printed. Returns the number printed.
pub fn read(path: &Path, index: Option<u64>, out: &mut impl Write) -> Result<u64> {
    let reader = DatasetReader::open(path)
        .with_context(|| format!("failed to open dataset at {}", path.display()))?;

    writeln!(out, "{}", reader.meta().schema_text)?;
    writeln!(out)?;

    let printed = match index {
        Some(index) => {
            let record = reader.read_record(index)?;
            write!(out, "[{}]\n{}", index, record)?;
            1
        }
        None => {
            for (index, record) in reader.records().enumerate() {
                write!(out, "[{}]\n{}", index, record?)?;
            }
            reader.len()
        }
    };

    reader.close()?;
    Ok(printed)
}

/// Print metadata and namespace sizes without modifying the store
pub fn inspect(path: &Path, out: &mut impl Write) -> Result<()> {
    let store = Store::open_read_only(path, &[])
        .with_context(|| format!("failed to open store at {}", path.display()))?;

    writeln!(out, "store: {}", path.display())?;
    for name in store.namespace_names() {
        let iter = store.iter(&name)?;
        writeln!(out, "namespace {}: {} keys", name, iter.len())?;
    }

    if !store.namespace_names().iter().any(|n| n == METADATA_NAMESPACE) {
        writeln!(out, "not a dataset: no {} namespace", METADATA_NAMESPACE)?;
        return Ok(());
    }
    drop(store);

    let reader = DatasetReader::open_read_only(path)?;
    let meta = reader.meta();
    writeln!(out, "record type: {}", reader.descriptor().full_name())?;
    writeln!(out, "records: {}", reader.len())?;
    writeln!(out, "index range: {}..{}", meta.start_index, meta.end_index)?;
    writeln!(
        out,
        "time range: {}..{}",
        meta.start_timestamp, meta.end_timestamp
    )?;
    writeln!(out, "key format: {:?}", meta.key_format)?;
    writeln!(out, "{}", reader.descriptor().to_schema_text())?;
    Ok(())
}

/// Read the dataset if it exists, otherwise create it
pub fn run_default(config: &ToolConfig, out: &mut impl Write) -> Result<()> {
    let path = &config.dataset.path;
    if path.exists() {
        read(path, None, out)?;
    } else {
        let meta = write(config)?;
        writeln!(
            out,
            "Created {} with {} records",
            path.display(),
            meta.record_count.unwrap_or(0)
        )?;
    }
    Ok(())
}

/// Fail early on settings that cannot produce a dataset
pub fn validate(config: &ToolConfig) -> Result<()> {
    if config.dataset.record_type.is_empty() {
        bail!("dataset.record_type must not be empty");
    }
    if config.dataset.start_index > config.dataset.end_index {
        bail!(
            "dataset.start_index {} is after end_index {}",
            config.dataset.start_index,
            config.dataset.end_index
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config(dir: &TempDir) -> ToolConfig {
        let mut config = ToolConfig::default();
        config.dataset.path = dir.path().join("tmp.db");
        config.dataset.seed = Some(1);
        config
    }

    #[test]
    fn test_write_then_read() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);
        let meta = write(&config).unwrap();
        assert_eq!(meta.record_count, Some(10));

        let mut out = Vec::new();
        assert_eq!(read(&config.dataset.path, None, &mut out).unwrap(), 10);
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("message recorder_1"));
        assert!(text.contains("[9]\noltc: "));
        assert_eq!(text.matches("voltage: ").count(), 10);
    }

    #[test]
    fn test_read_single_record() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);
        write(&config).unwrap();

        let mut out = Vec::new();
        assert_eq!(read(&config.dataset.path, Some(3), &mut out).unwrap(), 1);
        assert!(String::from_utf8(out).unwrap().contains("[3]\n"));

        let err = read(&config.dataset.path, Some(10), &mut Vec::new()).unwrap_err();
        assert!(err.to_string().contains("out of range"));
    }

    #[test]
    fn test_default_run_creates_then_reads() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);

        let mut out = Vec::new();
        run_default(&config, &mut out).unwrap();
        assert!(String::from_utf8(out).unwrap().starts_with("Created"));

        let mut out = Vec::new();
        run_default(&config, &mut out).unwrap();
        assert!(String::from_utf8(out).unwrap().contains("[0]\n"));
    }

    #[test]
    fn test_inspect() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);
        write(&config).unwrap();

        let mut out = Vec::new();
        inspect(&config.dataset.path, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("namespace default: 10 keys"));
        assert!(text.contains("namespace desc: 1 keys"));
        assert!(text.contains("record type: recorder_1"));
        assert!(text.contains("time range: 142..200"));
    }

    #[test]
    fn test_validate() {
        let mut config = ToolConfig::default();
        assert!(validate(&config).is_ok());
        config.dataset.start_index = 500;
        assert!(validate(&config).is_err());
    }
}

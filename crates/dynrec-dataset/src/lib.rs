//! Dynrec Dataset - Datasets of dynamic records
//!
//! A dataset is one store holding:
//! - a metadata record (`desc1` in the `desc` namespace) with index and time
//!   bounds plus the schema text of the data records
//! - the encoded data records in the default namespace, keyed by index
//!
//! `DatasetWriter` creates datasets, `DatasetReader` opens them again and
//! compiles the embedded schema to decode the records.

pub mod error;
pub mod key;
pub mod meta;
pub mod reader;
pub mod writer;

pub use error::{DatasetError, Result};
pub use key::KeyFormat;
pub use meta::{
    DatasetMeta, DATASET_DESCRIPTOR_SCHEMA, DATASET_DESCRIPTOR_TYPE, METADATA_KEY,
    METADATA_NAMESPACE,
};
pub use reader::DatasetReader;
pub use writer::{write_dataset, write_dataset_with_options, DatasetWriter, WriterOptions};

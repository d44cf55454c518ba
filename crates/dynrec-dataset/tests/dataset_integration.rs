use dynrec_codec::{decode, encode};
use dynrec_dataset::{
    write_dataset, write_dataset_with_options, DatasetError, DatasetMeta, DatasetReader,
    DatasetWriter, KeyFormat, WriterOptions, METADATA_KEY, METADATA_NAMESPACE,
};
use dynrec_record::{DynamicRecord, Value};
use dynrec_schema::SchemaCompiler;
use dynrec_storage::{
    Store, StoreOptions, WalDurability, WriteOptions, DEFAULT_NAMESPACE,
};
use std::sync::Arc;
use tempfile::TempDir;

const SCHEMA: &str = "syntax = \"proto3\";\nmessage R { uint32 a = 1; int32 b = 2; }";

const RECORDER_SCHEMA: &str = r#"syntax = "proto3";
message recorder_1
{
    uint32 oltc = 1;
    int32 voltage = 2;
    int32 current = 3;
}"#;

fn scenario_meta() -> DatasetMeta {
    DatasetMeta::new(SCHEMA, "R")
        .with_index_range(0, 100)
        .with_time_range(142, 200)
}

/// (a, b) pairs (7, -3) .. (16, 6)
fn fill(index: u64, record: &mut DynamicRecord) -> dynrec_record::Result<()> {
    record.set("a", 7 + index as u32)?;
    record.set("b", -3 + index as i32)
}

#[test]
fn written_records_read_back_in_index_order() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("dataset");

    let meta = write_dataset(&path, scenario_meta(), 10, fill).unwrap();
    assert_eq!(meta.record_count, Some(10));

    let reader = DatasetReader::open(&path).unwrap();
    assert_eq!(reader.len(), 10);
    assert_eq!(reader.meta().start_index, 0);
    assert_eq!(reader.meta().end_index, 100);
    assert_eq!(reader.meta().start_timestamp, 142);
    assert_eq!(reader.meta().end_timestamp, 200);
    assert_eq!(reader.meta().schema_text, SCHEMA);

    let pairs: Vec<(Value, Value)> = reader
        .records()
        .map(|record| {
            let record = record.unwrap();
            (record.get("a").unwrap(), record.get("b").unwrap())
        })
        .collect();
    let expected: Vec<(Value, Value)> = (0..10)
        .map(|i| (Value::Uint32(7 + i as u32), Value::Int32(-3 + i)))
        .collect();
    assert_eq!(pairs, expected);

    reader.close().unwrap();
}

#[test]
fn reading_past_the_end_is_not_found() {
    let dir = TempDir::new().unwrap();
    write_dataset(dir.path(), scenario_meta(), 10, fill).unwrap();

    let reader = DatasetReader::open(dir.path()).unwrap();
    let err = reader.read_record(10).unwrap_err();
    assert!(err.is_not_found());
    assert!(matches!(
        err,
        DatasetError::RecordOutOfRange { index: 10, len: 10 }
    ));
}

#[test]
fn descriptor_is_recompiled_from_embedded_text() {
    let dir = TempDir::new().unwrap();
    write_dataset(dir.path(), scenario_meta(), 1, fill).unwrap();

    let reader = DatasetReader::open(dir.path()).unwrap();
    let fresh = SchemaCompiler::new().compile(SCHEMA, "R").unwrap();
    assert_eq!(**reader.descriptor(), *fresh);
    for field in fresh.fields() {
        let found = reader.descriptor().field_by_name(field.name()).unwrap();
        assert_eq!(found.number(), field.number());
    }
}

#[test]
fn namespaces_do_not_leak_keys() {
    let dir = TempDir::new().unwrap();
    let store = Store::create(dir.path()).unwrap();
    store.create_namespace(METADATA_NAMESPACE).unwrap();

    store.put(DEFAULT_NAMESPACE, "k", "A").unwrap();
    store.put(METADATA_NAMESPACE, "k", "B").unwrap();
    assert_eq!(store.get(DEFAULT_NAMESPACE, "k").unwrap(), b"A");
    assert_eq!(store.get(METADATA_NAMESPACE, "k").unwrap(), b"B");

    store.put(DEFAULT_NAMESPACE, "only-default", "x").unwrap();
    let err = store.get(METADATA_NAMESPACE, "only-default").unwrap_err();
    assert!(err.is_not_found());
    store.close().unwrap();

    // Still isolated after the data moved to segments
    let store = Store::open(dir.path(), &[DEFAULT_NAMESPACE, METADATA_NAMESPACE]).unwrap();
    assert_eq!(store.get(DEFAULT_NAMESPACE, "k").unwrap(), b"A");
    assert_eq!(store.get(METADATA_NAMESPACE, "k").unwrap(), b"B");
}

#[test]
fn dataset_creation_is_not_an_upsert() {
    let dir = TempDir::new().unwrap();
    write_dataset(dir.path(), scenario_meta(), 3, fill).unwrap();

    let err = write_dataset(dir.path(), scenario_meta(), 3, fill).unwrap_err();
    assert!(err.is_already_exists());

    // The first dataset is untouched
    assert_eq!(DatasetReader::open(dir.path()).unwrap().len(), 3);
}

#[test]
fn metadata_record_is_protobuf_compatible() {
    let dir = TempDir::new().unwrap();
    write_dataset(dir.path(), scenario_meta(), 2, fill).unwrap();

    let store = Store::open(dir.path(), &[DEFAULT_NAMESPACE, METADATA_NAMESPACE]).unwrap();
    let bytes = store.get(METADATA_NAMESPACE, METADATA_KEY).unwrap();
    // end_index = 100 as field 2, varint
    assert!(bytes.windows(2).any(|w| w[0] == 0x10 && w[1] == 100));

    // Data records decode against a schema compiled independently
    let descriptor = SchemaCompiler::new().compile(SCHEMA, "R").unwrap();
    let record = decode(&store.get(DEFAULT_NAMESPACE, "1").unwrap(), &descriptor).unwrap();
    assert_eq!(record.get("a").unwrap(), Value::Uint32(8));
    assert_eq!(record.get("b").unwrap(), Value::Int32(-2));
}

#[test]
fn zero_padded_keys_keep_index_order_in_store() {
    let dir = TempDir::new().unwrap();
    let meta = scenario_meta().with_key_format(KeyFormat::ZeroPadded { width: 4 });
    write_dataset(dir.path(), meta, 12, fill).unwrap();

    let store = Store::open(dir.path(), &[DEFAULT_NAMESPACE]).unwrap();
    let keys: Vec<String> = store
        .iter(DEFAULT_NAMESPACE)
        .unwrap()
        .map(|(key, _)| String::from_utf8(key).unwrap())
        .collect();
    let expected: Vec<String> = (0..12).map(|i| format!("{:04}", i)).collect();
    assert_eq!(keys, expected);
    drop(store);

    let reader = DatasetReader::open(dir.path()).unwrap();
    assert_eq!(reader.meta().key_format, KeyFormat::ZeroPadded { width: 4 });
    assert_eq!(reader.read_record(11).unwrap().get("a").unwrap(), Value::Uint32(18));
}

#[test]
fn decimal_keys_sort_lexicographically() {
    let dir = TempDir::new().unwrap();
    write_dataset(dir.path(), scenario_meta(), 12, fill).unwrap();

    let store = Store::open(dir.path(), &[DEFAULT_NAMESPACE]).unwrap();
    let keys: Vec<Vec<u8>> = store
        .iter(DEFAULT_NAMESPACE)
        .unwrap()
        .map(|(key, _)| key)
        .collect();
    assert_eq!(keys[0], b"0");
    assert_eq!(keys[1], b"1");
    assert_eq!(keys[2], b"10");
    assert_eq!(store.iter(DEFAULT_NAMESPACE).unwrap().last().unwrap().0, b"9");
}

#[test]
fn unfinished_writer_is_flushed_on_drop() {
    let dir = TempDir::new().unwrap();
    {
        let mut writer = DatasetWriter::create(dir.path(), scenario_meta()).unwrap();
        for i in 0..5 {
            let mut record = writer.new_record();
            fill(i, &mut record).unwrap();
            writer.append(&record).unwrap();
        }
        // Dropped without finish: no record count in the metadata
    }

    let reader = DatasetReader::open(dir.path()).unwrap();
    assert_eq!(reader.meta().record_count, None);
    assert_eq!(reader.len(), 5);
}

#[test]
fn sign_crossing_values_follow_the_chosen_policy() {
    let dir = TempDir::new().unwrap();
    let err = write_dataset(dir.path().join("strict"), scenario_meta(), 1, |_, record| {
        record.set("a", -1i32)
    })
    .unwrap_err();
    assert!(matches!(err, DatasetError::Record(ref e) if e.is_type_mismatch()));

    write_dataset(dir.path().join("reinterpret"), scenario_meta(), 1, |_, record| {
        record.set_reinterpret("a", -1i32)
    })
    .unwrap();
    let reader = DatasetReader::open(dir.path().join("reinterpret")).unwrap();
    assert_eq!(
        reader.read_record(0).unwrap().get("a").unwrap(),
        Value::Uint32(u32::MAX)
    );
}

#[test]
fn read_only_reader_sees_prefix_of_live_writer() {
    let dir = TempDir::new().unwrap();
    let options = WriterOptions {
        store: StoreOptions {
            wal_durability: WalDurability::OsDefault,
            ..StoreOptions::default()
        },
        write: WriteOptions::default(),
    };

    let mut writer =
        DatasetWriter::create_with_options(dir.path(), DatasetMeta::new(RECORDER_SCHEMA, "recorder_1"), options)
            .unwrap();
    for i in 0..20u64 {
        let mut record = writer.new_record();
        record.set("oltc", i as u32).unwrap();
        record.set("voltage", 230i32).unwrap();
        record.set("current", -(i as i32)).unwrap();
        writer.append(&record).unwrap();
    }

    let reader = DatasetReader::open_read_only(dir.path()).unwrap();
    assert_eq!(reader.len(), 20);
    let last = reader.read_record(19).unwrap();
    assert_eq!(last.get("oltc").unwrap(), Value::Uint32(19));
    assert_eq!(last.get("current").unwrap(), Value::Int32(-19));

    for i in 20..30u64 {
        let mut record = writer.new_record();
        record.set("oltc", i as u32).unwrap();
        writer.append(&record).unwrap();
    }
    // Opened before those writes
    assert_eq!(reader.len(), 20);
    drop(reader);

    writer.finish().unwrap();
    assert_eq!(DatasetReader::open(dir.path()).unwrap().len(), 30);
}

#[test]
fn wal_backed_writes_survive_a_crash() {
    let dir = TempDir::new().unwrap();
    let options = WriterOptions {
        store: StoreOptions {
            wal_durability: WalDurability::OsDefault,
            ..StoreOptions::default()
        },
        write: WriteOptions::default(),
    };

    let mut writer =
        DatasetWriter::create_with_options(dir.path(), scenario_meta(), options).unwrap();
    for i in 0..4 {
        let mut record = writer.new_record();
        fill(i, &mut record).unwrap();
        writer.append(&record).unwrap();
    }
    // Skip every destructor, as a crash would
    std::mem::forget(writer);

    let reader = DatasetReader::open(dir.path()).unwrap();
    assert_eq!(reader.len(), 4);
    assert_eq!(reader.read_record(3).unwrap().get("b").unwrap(), Value::Int32(0));
}

#[test]
fn records_encoded_by_hand_are_readable() {
    let dir = TempDir::new().unwrap();
    let options = WriterOptions {
        write: WriteOptions::synced(),
        ..WriterOptions::default()
    };
    write_dataset_with_options(dir.path(), scenario_meta(), 0, options, fill).unwrap();

    let store = Store::open(dir.path(), &[DEFAULT_NAMESPACE, METADATA_NAMESPACE]).unwrap();
    let descriptor = SchemaCompiler::new().compile(SCHEMA, "R").unwrap();
    let mut record = DynamicRecord::new(Arc::clone(&descriptor));
    record.set("b", i32::MIN).unwrap();
    store.put(DEFAULT_NAMESPACE, "0", encode(&record)).unwrap();
    store.close().unwrap();

    // The count says zero, so the record is out of range
    let reader = DatasetReader::open(dir.path()).unwrap();
    assert!(reader.is_empty());
    assert!(reader.read_record(0).unwrap_err().is_not_found());
}

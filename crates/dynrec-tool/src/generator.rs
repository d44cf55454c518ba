//! Random record values

use dynrec_record::{DynamicRecord, Result, Value};
use dynrec_schema::FieldKind;
use rand::distributions::Alphanumeric;
use rand::prelude::*;
use std::sync::Arc;

const MAX_TEXT_LEN: usize = 16;

/// Fills records with uniformly random values
///
/// Integers span their kind's full range.
pub struct RandomRecordGenerator {
    rng: rand::rngs::StdRng,
}

impl RandomRecordGenerator {
    /// Deterministic generator
    pub fn new(seed: u64) -> Self {
        Self {
            rng: rand::rngs::StdRng::seed_from_u64(seed),
        }
    }

    /// Generator seeded from the OS
    pub fn from_entropy() -> Self {
        Self {
            rng: rand::rngs::StdRng::from_entropy(),
        }
    }

    /// Random value for a field kind
    pub fn value(&mut self, kind: FieldKind) -> Value {
        match Value::default_for(kind) {
            Value::Int32(_) => Value::Int32(self.rng.gen()),
            Value::Int64(_) => Value::Int64(self.rng.gen()),
            Value::Uint32(_) => Value::Uint32(self.rng.gen()),
            Value::Uint64(_) => Value::Uint64(self.rng.gen()),
            Value::Float(_) => Value::Float(self.rng.gen_range(-1.0e6f32..1.0e6)),
            Value::Double(_) => Value::Double(self.rng.gen_range(-1.0e9f64..1.0e9)),
            Value::Bool(_) => Value::Bool(self.rng.gen()),
            Value::String(_) => {
                let len = self.rng.gen_range(0..=MAX_TEXT_LEN);
                Value::String(
                    (&mut self.rng)
                        .sample_iter(&Alphanumeric)
                        .take(len)
                        .map(char::from)
                        .collect(),
                )
            }
            Value::Bytes(_) => {
                let len = self.rng.gen_range(0..=MAX_TEXT_LEN);
                Value::Bytes((0..len).map(|_| self.rng.gen()).collect())
            }
        }
    }

    /// Set every field of `record` to a random value
    pub fn fill(&mut self, record: &mut DynamicRecord) -> Result<()> {
        let descriptor = Arc::clone(record.descriptor());
        for field in descriptor.fields() {
            let value = self.value(field.kind());
            record.set_by_index(field.index(), value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dynrec_schema::SchemaCompiler;

    fn record() -> DynamicRecord {
        let descriptor = SchemaCompiler::new()
            .compile(
                "message All { int32 a = 1; sint64 b = 2; fixed32 c = 3; uint64 d = 4; \
                 float e = 5; double f = 6; bool g = 7; string h = 8; bytes i = 9; }",
                "All",
            )
            .unwrap();
        DynamicRecord::new(descriptor)
    }

    #[test]
    fn test_fill_sets_every_field() {
        let mut generator = RandomRecordGenerator::new(7);
        let mut record = record();
        generator.fill(&mut record).unwrap();

        assert_eq!(record.set_fields().count(), 9);
        for (field, value) in record.set_fields() {
            assert!(value.matches_kind(field.kind()), "{}", field.name());
        }
    }

    #[test]
    fn test_seeded_generators_agree() {
        let mut first = RandomRecordGenerator::new(42);
        let mut second = RandomRecordGenerator::new(42);
        let (mut a, mut b) = (record(), record());
        first.fill(&mut a).unwrap();
        second.fill(&mut b).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_string_values_are_bounded() {
        let mut generator = RandomRecordGenerator::from_entropy();
        for _ in 0..100 {
            let Value::String(text) = generator.value(FieldKind::String) else {
                panic!("expected a string");
            };
            assert!(text.len() <= MAX_TEXT_LEN);
            assert!(text.chars().all(|c| c.is_ascii_alphanumeric()));
        }
    }
}

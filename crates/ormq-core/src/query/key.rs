//! Hashable value keys for grouping, hash joins and DISTINCT.

use ormq_proto::{Datum, Row, Value};

/// A hashable normal form of [`Value`].
///
/// Integers of either width and integral floats share a key so that keys
/// agree with [`Value::compare`] equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueKey {
    Null,
    Bool(bool),
    Int(i64),
    Float(u64),
    String(String),
    Timestamp(i64),
}

impl From<&Value> for ValueKey {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => ValueKey::Null,
            Value::Bool(b) => ValueKey::Bool(*b),
            Value::Int32(i) => ValueKey::Int(*i as i64),
            Value::Int64(i) => ValueKey::Int(*i),
            Value::Float64(f) => {
                if f.fract() == 0.0 && *f >= i64::MIN as f64 && *f <= i64::MAX as f64 {
                    ValueKey::Int(*f as i64)
                } else {
                    ValueKey::Float(f.to_bits())
                }
            }
            Value::String(s) => ValueKey::String(s.clone()),
            Value::Timestamp(t) => ValueKey::Timestamp(*t),
        }
    }
}

/// Hashable form of one projected item.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DatumKey {
    Value(ValueKey),
    Entity(Option<(String, ValueKey)>),
}

/// Hashable form of a whole result row.
pub fn row_key(row: &Row) -> Vec<DatumKey> {
    row.data
        .iter()
        .map(|datum| match datum {
            Datum::Value(value) => DatumKey::Value(value.into()),
            Datum::Entity(record) => DatumKey::Entity(
                record
                    .as_ref()
                    .map(|r| (r.entity.clone(), ValueKey::from(&r.key))),
            ),
        })
        .collect()
}

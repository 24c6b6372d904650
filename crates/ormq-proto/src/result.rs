//! Raw result rows returned by a store.

use serde::{Deserialize, Serialize};

use crate::value::Value;

/// A materialized entity instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    /// Entity type name.
    pub entity: String,
    /// Identity key.
    pub key: Value,
    /// Field values in catalog order.
    pub fields: Vec<(String, Value)>,
    /// Associations loaded in the same round trip by fetch joins.
    pub fetched: Vec<FetchedRelation>,
}

impl EntityRecord {
    /// Create a record without fetched associations.
    pub fn new(entity: impl Into<String>, key: Value, fields: Vec<(String, Value)>) -> Self {
        Self {
            entity: entity.into(),
            key,
            fields,
            fetched: vec![],
        }
    }

    /// Get a field value by name.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value)
    }

    /// Get a fetched association by relation name.
    ///
    /// Returns `None` when the relation was not fetch-joined, and
    /// `Some(None)` when it was fetched and has no target.
    pub fn fetched(&self, relation: &str) -> Option<Option<&EntityRecord>> {
        self.fetched
            .iter()
            .find(|f| f.relation == relation)
            .map(|f| f.record.as_ref())
    }
}

/// An association materialized by a fetch join.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchedRelation {
    /// Relation name on the owning entity.
    pub relation: String,
    /// Target record; `None` when the foreign key is null.
    pub record: Option<EntityRecord>,
}

/// One projected item of a row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Datum {
    /// A scalar value.
    Value(Value),
    /// A whole entity; `None` for the null side of a left join.
    Entity(Option<EntityRecord>),
}

impl Datum {
    /// The scalar value, if this is one.
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Datum::Value(value) => Some(value),
            Datum::Entity(_) => None,
        }
    }

    /// The entity record, if this is one.
    pub fn as_entity(&self) -> Option<Option<&EntityRecord>> {
        match self {
            Datum::Entity(record) => Some(record.as_ref()),
            Datum::Value(_) => None,
        }
    }
}

/// One result row, one datum per select item.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Row {
    pub data: Vec<Datum>,
}

impl Row {
    /// Create a row.
    pub fn new(data: Vec<Datum>) -> Self {
        Self { data }
    }

    /// Number of items.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the row has no items.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Item at `index`.
    pub fn get(&self, index: usize) -> Option<&Datum> {
        self.data.get(index)
    }
}

//! In-memory table storage.

use std::collections::{BTreeMap, HashMap};

use parking_lot::RwLock;

use super::{Record, StorageBackend};
use crate::error::Error;

#[derive(Debug, Default)]
struct Table {
    rows: BTreeMap<i64, Record>,
    next_key: i64,
}

/// Tables held in process memory. Contents are lost on drop.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    tables: RwLock<HashMap<String, Table>>,
}

impl MemoryStorage {
    /// Create empty storage.
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageBackend for MemoryStorage {
    fn scan(&self, entity: &str) -> Result<Vec<Record>, Error> {
        Ok(self
            .tables
            .read()
            .get(entity)
            .map(|t| t.rows.values().cloned().collect())
            .unwrap_or_default())
    }

    fn put(&self, entity: &str, record: &Record) -> Result<(), Error> {
        let mut tables = self.tables.write();
        let table = tables.entry(entity.to_string()).or_default();
        table.next_key = table.next_key.max(record.key + 1);
        table.rows.insert(record.key, record.clone());
        Ok(())
    }

    fn remove(&self, entity: &str, key: i64) -> Result<bool, Error> {
        Ok(self
            .tables
            .write()
            .get_mut(entity)
            .is_some_and(|t| t.rows.remove(&key).is_some()))
    }

    fn apply(&self, entity: &str, puts: &[Record], removes: &[i64]) -> Result<(), Error> {
        let mut tables = self.tables.write();
        let table = tables.entry(entity.to_string()).or_default();
        for key in removes {
            table.rows.remove(key);
        }
        for record in puts {
            table.next_key = table.next_key.max(record.key + 1);
            table.rows.insert(record.key, record.clone());
        }
        Ok(())
    }

    fn next_key(&self, entity: &str) -> Result<i64, Error> {
        Ok(self
            .tables
            .read()
            .get(entity)
            .map(|t| t.next_key)
            .unwrap_or(1)
            .max(1))
    }

    fn flush(&self) -> Result<(), Error> {
        Ok(())
    }
}

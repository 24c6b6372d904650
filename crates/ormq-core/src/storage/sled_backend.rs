//! Sled-backed table storage.
//!
//! Each entity gets its own tree named `table:<entity>`. Keys are the
//! big-endian identity so iteration follows key order; values are
//! rkyv-encoded [`Record`]s. The highest key ever issued is kept in the
//! `meta` tree so keys are not reused after deletes.

use sled::transaction::TransactionError;
use sled::{Batch, Db, Transactional, Tree};
use tracing::debug;

use super::{Record, StorageBackend, StorageConfig};
use crate::error::Error;

const META_TREE: &str = "meta";

/// Tables persisted in a sled database.
pub struct SledStorage {
    db: Db,
    meta: Tree,
}

impl SledStorage {
    /// Open or create storage with the given configuration.
    pub fn open(config: &StorageConfig) -> Result<Self, Error> {
        let db = config.to_sled_config().open()?;
        let meta = db.open_tree(META_TREE)?;
        debug!(path = %config.path.display(), temporary = config.temporary, "opened sled storage");
        Ok(Self { db, meta })
    }

    fn table(&self, entity: &str) -> Result<Tree, Error> {
        Ok(self.db.open_tree(format!("table:{entity}"))?)
    }

    fn high_water_key(entity: &str) -> Vec<u8> {
        format!("next_key:{entity}").into_bytes()
    }
}

impl StorageBackend for SledStorage {
    fn scan(&self, entity: &str) -> Result<Vec<Record>, Error> {
        self.table(entity)?
            .iter()
            .values()
            .map(|bytes| Record::from_bytes(&bytes?))
            .collect()
    }

    fn put(&self, entity: &str, record: &Record) -> Result<(), Error> {
        self.table(entity)?
            .insert(record.key.to_be_bytes(), record.to_bytes()?)?;

        let next = record.key + 1;
        if next > self.next_key(entity)? {
            self.meta
                .insert(Self::high_water_key(entity), &next.to_be_bytes())?;
        }
        Ok(())
    }

    fn remove(&self, entity: &str, key: i64) -> Result<bool, Error> {
        Ok(self.table(entity)?.remove(key.to_be_bytes())?.is_some())
    }

    fn apply(&self, entity: &str, puts: &[Record], removes: &[i64]) -> Result<(), Error> {
        let table = self.table(entity)?;
        let mut batch = Batch::default();
        for key in removes {
            batch.remove(&key.to_be_bytes()[..]);
        }
        for record in puts {
            batch.insert(&record.key.to_be_bytes()[..], record.to_bytes()?);
        }

        let current = self.next_key(entity)?;
        let next = puts
            .iter()
            .map(|r| r.key + 1)
            .max()
            .filter(|next| *next > current);
        let counter = Self::high_water_key(entity);

        let result: Result<(), TransactionError<Error>> =
            (&table, &self.meta).transaction(|(table_tx, meta_tx)| {
                table_tx.apply_batch(&batch)?;
                if let Some(next) = next {
                    meta_tx.insert(counter.as_slice(), &next.to_be_bytes()[..])?;
                }
                Ok(())
            });

        match result {
            Ok(()) => Ok(()),
            Err(TransactionError::Abort(e)) => Err(e),
            Err(TransactionError::Storage(e)) => Err(Error::Storage(e)),
        }
    }

    fn next_key(&self, entity: &str) -> Result<i64, Error> {
        match self.meta.get(Self::high_water_key(entity))? {
            Some(bytes) => {
                let buf = <[u8; 8]>::try_from(&bytes[..])
                    .map_err(|_| Error::Deserialization("invalid key counter".into()))?;
                Ok(i64::from_be_bytes(buf).max(1))
            }
            None => Ok(1),
        }
    }

    fn flush(&self) -> Result<(), Error> {
        self.db.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ormq_proto::Value;

    #[test]
    fn test_put_scan_remove() {
        let storage = SledStorage::open(&StorageConfig::temporary()).unwrap();
        for key in [3, 1, 2] {
            storage
                .put(
                    "Member",
                    &Record::new(key, vec![("id".into(), Value::Int64(key))]),
                )
                .unwrap();
        }

        let keys: Vec<i64> = storage
            .scan("Member")
            .unwrap()
            .iter()
            .map(|r| r.key)
            .collect();
        assert_eq!(keys, vec![1, 2, 3]);
        assert_eq!(storage.next_key("Member").unwrap(), 4);

        assert!(storage.remove("Member", 3).unwrap());
        assert_eq!(storage.next_key("Member").unwrap(), 4);
        assert_eq!(storage.scan("Member").unwrap().len(), 2);
    }

    #[test]
    fn test_apply_batch_writes_rows_and_counter_together() {
        let storage = SledStorage::open(&StorageConfig::temporary()).unwrap();
        for key in 1..=4 {
            storage
                .put(
                    "Member",
                    &Record::new(key, vec![("age".into(), Value::Int32(key as i32 * 10))]),
                )
                .unwrap();
        }

        let puts: Vec<Record> = [2, 4, 9]
            .into_iter()
            .map(|key| Record::new(key, vec![("age".into(), Value::Int32(99))]))
            .collect();
        storage.apply("Member", &puts, &[1, 3]).unwrap();

        let rows = storage.scan("Member").unwrap();
        let keys: Vec<i64> = rows.iter().map(|r| r.key).collect();
        assert_eq!(keys, vec![2, 4, 9]);
        assert!(rows.iter().all(|r| r.get("age") == Some(&Value::Int32(99))));
        assert_eq!(storage.next_key("Member").unwrap(), 10);

        // A batch that only removes leaves the counter alone.
        storage.apply("Member", &[], &[9]).unwrap();
        assert_eq!(storage.next_key("Member").unwrap(), 10);
        assert_eq!(storage.scan("Member").unwrap().len(), 2);
    }
}

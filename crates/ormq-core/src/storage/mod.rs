//! Storage layer.
//!
//! Tables are ordered maps from identity key to [`Record`]. Two backends
//! implement [`StorageBackend`]: [`MemoryStorage`] for tests and short-lived
//! sessions, and [`SledStorage`] for on-disk tables.

mod config;
mod locks;
mod memory;
mod record;
mod sled_backend;

pub use config::StorageConfig;
pub use locks::{TableGuard, TableLocks};
pub use memory::MemoryStorage;
pub use record::Record;
pub use sled_backend::SledStorage;

use crate::error::Error;

/// A set of entity tables keyed by identity.
///
/// Backends are internally synchronized, but statement-level isolation is
/// provided by [`TableLocks`], not by the backend.
pub trait StorageBackend: Send + Sync {
    /// All live records of `entity`, in key order.
    fn scan(&self, entity: &str) -> Result<Vec<Record>, Error>;

    /// Insert or overwrite a record by key.
    fn put(&self, entity: &str, record: &Record) -> Result<(), Error>;

    /// Remove a record. Returns whether it existed.
    fn remove(&self, entity: &str, key: i64) -> Result<bool, Error>;

    /// Write `puts` and delete `removes` in one atomic step. Either every
    /// change lands or none does.
    fn apply(&self, entity: &str, puts: &[Record], removes: &[i64]) -> Result<(), Error>;

    /// The next unused identity key for `entity`.
    fn next_key(&self, entity: &str) -> Result<i64, Error>;

    /// Persist pending writes.
    fn flush(&self) -> Result<(), Error>;
}

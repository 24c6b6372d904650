//! Per-table statement locks.

use std::collections::BTreeSet;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Registry of one reader/writer lock per table.
///
/// A statement acquires every lock it needs up front, in name order, and
/// holds them until it finishes. Queries take shared locks; a mutation takes
/// the exclusive lock of its target.
#[derive(Debug, Default)]
pub struct TableLocks {
    locks: DashMap<String, Arc<RwLock<()>>>,
}

/// A held table lock.
pub enum TableGuard<'a> {
    Shared(RwLockReadGuard<'a, ()>),
    Exclusive(RwLockWriteGuard<'a, ()>),
}

impl TableLocks {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock handles for `tables`, sorted by name.
    pub fn handles(&self, tables: &BTreeSet<String>) -> Vec<(String, Arc<RwLock<()>>)> {
        tables
            .iter()
            .map(|name| {
                let lock = self.locks.entry(name.clone()).or_default().clone();
                (name.clone(), lock)
            })
            .collect()
    }

    /// Acquire shared locks on every handle, or an exclusive lock on the one
    /// named `exclusive`.
    pub fn acquire<'a>(
        handles: &'a [(String, Arc<RwLock<()>>)],
        exclusive: Option<&str>,
    ) -> Vec<TableGuard<'a>> {
        handles
            .iter()
            .map(|(name, lock)| {
                if exclusive == Some(name.as_str()) {
                    TableGuard::Exclusive(lock.write())
                } else {
                    TableGuard::Shared(lock.read())
                }
            })
            .collect()
    }
}

//! Alias scopes, row environments and per-statement table snapshots.

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

use ormq_proto::{QueryDescriptor, Value};

use crate::catalog::{Catalog, EntityDef};
use crate::error::Error;
use crate::storage::{Record, StorageBackend};

/// One row of the working set: a record (or null) per alias slot.
pub type Tuple = Vec<Option<Arc<Record>>>;

/// An alias bound to an entity.
#[derive(Debug, Clone)]
pub struct Slot {
    pub alias: String,
    pub entity: Arc<EntityDef>,
}

/// The aliases one query declares. Sources come first, then join targets,
/// in declaration order.
#[derive(Debug, Clone)]
pub struct Scope {
    slots: Vec<Slot>,
}

impl Scope {
    /// Resolve every alias a query declares against the catalog.
    pub fn build(query: &QueryDescriptor, catalog: &Catalog) -> Result<Self, Error> {
        let declared = query
            .sources
            .iter()
            .chain(query.joins.iter().map(|j| &j.target));

        let mut slots: Vec<Slot> = Vec::new();
        for source in declared {
            if slots.iter().any(|s| s.alias == source.alias) {
                return Err(Error::InvalidQuery(format!(
                    "alias {} declared twice",
                    source.alias
                )));
            }
            slots.push(Slot {
                alias: source.alias.clone(),
                entity: catalog.get_entity(&source.entity)?,
            });
        }
        Ok(Self { slots })
    }

    /// A scope holding a single alias, as used by mutations.
    pub fn single(alias: impl Into<String>, entity: Arc<EntityDef>) -> Self {
        Self {
            slots: vec![Slot {
                alias: alias.into(),
                entity,
            }],
        }
    }

    /// Slot index of an alias.
    pub fn slot(&self, alias: &str) -> Option<usize> {
        self.slots.iter().position(|s| s.alias == alias)
    }

    /// Slot at `index`.
    pub fn get(&self, index: usize) -> &Slot {
        &self.slots[index]
    }

    /// Number of slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// A tuple with every slot null.
    pub fn empty_tuple(&self) -> Tuple {
        vec![None; self.slots.len()]
    }
}

/// The evaluation environment of one row, chained to the rows of the
/// enclosing queries for correlated subqueries.
#[derive(Clone, Copy)]
pub struct Env<'a> {
    pub scope: &'a Scope,
    pub tuple: &'a [Option<Arc<Record>>],
    pub outer: Option<&'a Env<'a>>,
}

impl<'a> Env<'a> {
    /// Create an environment.
    pub fn new(
        scope: &'a Scope,
        tuple: &'a [Option<Arc<Record>>],
        outer: Option<&'a Env<'a>>,
    ) -> Self {
        Self {
            scope,
            tuple,
            outer,
        }
    }

    /// Resolve `alias.field`, innermost scope first.
    pub fn column(&self, alias: &str, field: &str) -> Result<Value, Error> {
        match self.scope.slot(alias) {
            Some(index) => {
                let slot = self.scope.get(index);
                if slot.entity.get_field(field).is_none() {
                    return Err(Error::UnknownField {
                        entity: slot.entity.name.clone(),
                        field: field.to_string(),
                    });
                }
                Ok(self
                    .tuple
                    .get(index)
                    .and_then(Option::as_ref)
                    .and_then(|record| record.get(field).cloned())
                    .unwrap_or(Value::Null))
            }
            None => match self.outer {
                Some(outer) => outer.column(alias, field),
                None => Err(Error::UnknownAlias(alias.to_string())),
            },
        }
    }
}

/// Tables read by one statement, loaded lazily and at most once.
///
/// The statement holds the table locks for its whole run, so a table read
/// twice would return the same rows anyway.
pub struct Snapshot<'a> {
    catalog: &'a Catalog,
    storage: &'a dyn StorageBackend,
    tables: RefCell<HashMap<String, Arc<Vec<Arc<Record>>>>>,
}

impl<'a> Snapshot<'a> {
    /// Create an empty snapshot.
    pub fn new(catalog: &'a Catalog, storage: &'a dyn StorageBackend) -> Self {
        Self {
            catalog,
            storage,
            tables: RefCell::new(HashMap::new()),
        }
    }

    /// All rows of `entity`.
    pub fn table(&self, entity: &str) -> Result<Arc<Vec<Arc<Record>>>, Error> {
        if let Some(rows) = self.tables.borrow().get(entity) {
            return Ok(rows.clone());
        }
        self.catalog.get_entity(entity)?;
        let rows: Arc<Vec<Arc<Record>>> = Arc::new(
            self.storage
                .scan(entity)?
                .into_iter()
                .map(Arc::new)
                .collect(),
        );
        self.tables
            .borrow_mut()
            .insert(entity.to_string(), rows.clone());
        Ok(rows)
    }
}

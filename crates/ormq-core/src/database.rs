//! The reference relational store.

use std::collections::BTreeSet;

use ormq_proto::{
    MutationDescriptor, MutationKind, QueryDescriptor, RelationalStore, Row, Value,
};
use tracing::{debug, info, instrument};

use crate::catalog::Catalog;
use crate::config::{BackendConfig, DatabaseConfig, QueryBudget};
use crate::error::Error;
use crate::mutation::MutationExecutor;
use crate::query::Evaluator;
use crate::storage::{MemoryStorage, Record, SledStorage, StorageBackend, TableLocks};

/// An in-process relational store that evaluates descriptors directly.
///
/// Every statement locks the tables it touches for its whole run: shared
/// locks for queries, an exclusive lock on the target for mutations.
pub struct Database {
    catalog: Catalog,
    storage: Box<dyn StorageBackend>,
    locks: TableLocks,
    budget: QueryBudget,
}

impl Database {
    /// Open a database over the configured backend.
    pub fn open(catalog: Catalog, config: DatabaseConfig) -> Result<Self, Error> {
        let storage: Box<dyn StorageBackend> = match &config.backend {
            BackendConfig::Memory => Box::new(MemoryStorage::new()),
            BackendConfig::Sled(storage) => Box::new(SledStorage::open(storage)?),
        };
        let backend = match config.backend {
            BackendConfig::Memory => "memory",
            BackendConfig::Sled(_) => "sled",
        };
        info!(
            backend,
            entities = catalog.list_entities().len(),
            "database opened"
        );
        Ok(Self {
            catalog,
            storage,
            locks: TableLocks::new(),
            budget: config.budget,
        })
    }

    /// An in-memory database with the default budget.
    pub fn in_memory(catalog: Catalog) -> Self {
        Self {
            catalog,
            storage: Box::new(MemoryStorage::new()),
            locks: TableLocks::new(),
            budget: QueryBudget::default(),
        }
    }

    /// The schema catalog.
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// The query budget.
    pub fn budget(&self) -> QueryBudget {
        self.budget
    }

    /// Insert a row and return its identity key.
    ///
    /// Missing fields are stored as NULL. When the identity field is absent
    /// or NULL the next key is assigned; an explicit key that already exists
    /// replaces that row.
    #[instrument(skip(self, fields))]
    pub fn insert(&self, entity: &str, fields: Vec<(String, Value)>) -> Result<Value, Error> {
        let def = self.catalog.get_entity(entity)?;
        if let Some((name, _)) = fields.iter().find(|(name, _)| def.get_field(name).is_none()) {
            return Err(Error::UnknownField {
                entity: entity.to_string(),
                field: name.clone(),
            });
        }

        let handles = self.locks.handles(&BTreeSet::from([entity.to_string()]));
        let _guards = TableLocks::acquire(&handles, Some(entity));

        let explicit_key = fields
            .iter()
            .find(|(name, value)| def.is_identity(name) && !value.is_null())
            .map(|(_, value)| value);
        let key = match explicit_key {
            Some(value) => value.as_i64().ok_or_else(|| {
                Error::TypeMismatch(format!("identity of {entity} must be an integer"))
            })?,
            None => self.storage.next_key(entity)?,
        };

        let mut values = Vec::with_capacity(def.fields.len());
        for field in &def.fields {
            let value = if def.is_identity(&field.name) {
                Value::Int64(key)
            } else {
                fields
                    .iter()
                    .find(|(name, _)| *name == field.name)
                    .map(|(_, value)| value.clone())
                    .unwrap_or(Value::Null)
            };
            values.push((field.name.clone(), field.coerce(value)?));
        }

        self.storage.put(entity, &Record::new(key, values))?;
        debug!(key, "inserted record");
        Ok(Value::Int64(key))
    }

    /// Persist pending writes.
    pub fn flush(&self) -> Result<(), Error> {
        self.storage.flush()
    }

    fn evaluator(&self) -> Evaluator<'_> {
        Evaluator::new(&self.catalog, self.storage.as_ref(), self.budget)
    }
}

impl RelationalStore for Database {
    type Error = Error;

    #[instrument(skip_all)]
    fn execute(&self, query: &QueryDescriptor) -> Result<Vec<Row>, Error> {
        let handles = self.locks.handles(&query_tables(query));
        let _guards = TableLocks::acquire(&handles, None);

        let rows = self.evaluator().execute(query)?;
        debug!(sources = query.sources.len(), rows = rows.len(), "query executed");
        Ok(rows)
    }

    #[instrument(skip_all, fields(entity = %mutation.target.entity))]
    fn execute_mutation(&self, mutation: &MutationDescriptor) -> Result<u64, Error> {
        let handles = self.locks.handles(&mutation_tables(mutation));
        let _guards = TableLocks::acquire(&handles, Some(mutation.target.entity.as_str()));

        let affected =
            MutationExecutor::new(&self.catalog, self.storage.as_ref(), self.budget).execute(mutation)?;
        info!(
            kind = if mutation.is_delete() { "delete" } else { "update" },
            affected,
            "mutation applied"
        );
        Ok(affected)
    }

    #[instrument(skip_all)]
    fn count(&self, query: &QueryDescriptor) -> Result<u64, Error> {
        let handles = self.locks.handles(&query_tables(query));
        let _guards = TableLocks::acquire(&handles, None);

        let count = self.evaluator().count(query)?;
        debug!(sources = query.sources.len(), count, "query counted");
        Ok(count)
    }
}

/// Every entity a query reads, subqueries included.
fn query_tables(query: &QueryDescriptor) -> BTreeSet<String> {
    let mut tables = BTreeSet::new();
    collect_tables(query, &mut tables);
    tables
}

fn collect_tables(query: &QueryDescriptor, tables: &mut BTreeSet<String>) {
    for source in &query.sources {
        tables.insert(source.entity.clone());
    }
    for join in &query.joins {
        tables.insert(join.target.entity.clone());
    }
    for subquery in query.embedded_subqueries() {
        collect_tables(subquery, tables);
    }
}

/// The mutation target plus every entity its subqueries read.
fn mutation_tables(mutation: &MutationDescriptor) -> BTreeSet<String> {
    let mut tables = BTreeSet::from([mutation.target.entity.clone()]);
    let mut subqueries = Vec::new();
    if let Some(filter) = &mutation.filter {
        filter.for_each_subquery(&mut |q| subqueries.push(q));
    }
    if let MutationKind::Update { assignments } = &mutation.kind {
        for assignment in assignments {
            assignment.value.for_each_subquery(&mut |q| subqueries.push(q));
        }
    }
    for subquery in subqueries {
        collect_tables(subquery, &mut tables);
    }
    tables
}

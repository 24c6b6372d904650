//! Bulk mutation execution.
//!
//! A mutation matches rows against the table as it was when the statement
//! started, computes every new row, and only then writes them as a single
//! storage batch. A failing assignment or a failed write therefore leaves
//! the table untouched.

use std::sync::Arc;

use ormq_proto::{MutationDescriptor, MutationKind};

use crate::catalog::{Catalog, EntityDef};
use crate::config::QueryBudget;
use crate::error::Error;
use crate::query::{Env, Evaluator, Scope};
use crate::storage::{Record, StorageBackend};

/// Applies update and delete descriptors. The caller holds the target's
/// exclusive table lock.
pub struct MutationExecutor<'a> {
    catalog: &'a Catalog,
    storage: &'a dyn StorageBackend,
    evaluator: Evaluator<'a>,
}

impl<'a> MutationExecutor<'a> {
    /// Create an executor.
    pub fn new(catalog: &'a Catalog, storage: &'a dyn StorageBackend, budget: QueryBudget) -> Self {
        Self {
            catalog,
            storage,
            evaluator: Evaluator::new(catalog, storage, budget),
        }
    }

    /// Apply a mutation and return the number of affected rows.
    pub fn execute(&self, mutation: &MutationDescriptor) -> Result<u64, Error> {
        let entity = self.catalog.get_entity(&mutation.target.entity)?;
        if let MutationKind::Update { assignments } = &mutation.kind {
            validate_assignments(&entity, assignments.iter().map(|a| a.field.as_str()))?;
        }

        let scope = Scope::single(mutation.target.alias.clone(), entity.clone());
        let rows = self.evaluator.snapshot().table(&entity.name)?;

        let mut matched: Vec<&Arc<Record>> = Vec::new();
        for row in rows.iter() {
            let hit = match &mutation.filter {
                Some(filter) => {
                    let tuple = [Some(row.clone())];
                    let env = Env::new(&scope, &tuple, None);
                    self.evaluator.eval_predicate(filter, &env, None, 0)? == Some(true)
                }
                None => true,
            };
            if hit {
                matched.push(row);
            }
        }

        match &mutation.kind {
            MutationKind::Delete => {
                let keys: Vec<i64> = matched.iter().map(|row| row.key).collect();
                self.storage.apply(&entity.name, &[], &keys)?;
            }
            MutationKind::Update { assignments } => {
                let mut updated = Vec::with_capacity(matched.len());
                for row in &matched {
                    let tuple = [Some(Arc::clone(row))];
                    let env = Env::new(&scope, &tuple, None);
                    let mut record = Record::clone(row);
                    for assignment in assignments {
                        let value = self.evaluator.eval_expr(&assignment.value, &env, None, 0)?;
                        let field = entity.get_field(&assignment.field).ok_or_else(|| {
                            Error::UnknownField {
                                entity: entity.name.clone(),
                                field: assignment.field.clone(),
                            }
                        })?;
                        record.set(&assignment.field, field.coerce(value)?);
                    }
                    updated.push(record);
                }
                self.storage.apply(&entity.name, &updated, &[])?;
            }
        }

        Ok(matched.len() as u64)
    }
}

fn validate_assignments<'f>(
    entity: &EntityDef,
    fields: impl ExactSizeIterator<Item = &'f str>,
) -> Result<(), Error> {
    if fields.len() == 0 {
        return Err(Error::InvalidQuery("update without assignments".into()));
    }
    for field in fields {
        if entity.get_field(field).is_none() {
            return Err(Error::UnknownField {
                entity: entity.name.clone(),
                field: field.to_string(),
            });
        }
        if entity.is_identity(field) {
            return Err(Error::InvalidQuery(format!(
                "identity field {}.{field} cannot be updated",
                entity.name
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use ormq_proto::{ArithOp, Assignment, CompareOp, Expr, PredicateExpr, Source, Value, ValueType};

    use super::*;
    use crate::catalog::FieldDef;
    use crate::storage::MemoryStorage;

    /// Accepts only whole batches, so a mutation that writes row by row fails.
    #[derive(Default)]
    struct BatchOnlyStorage {
        inner: MemoryStorage,
        batches: AtomicUsize,
        fail_batches: bool,
    }

    impl StorageBackend for BatchOnlyStorage {
        fn scan(&self, entity: &str) -> Result<Vec<Record>, Error> {
            self.inner.scan(entity)
        }

        fn put(&self, _entity: &str, _record: &Record) -> Result<(), Error> {
            Err(Error::InvalidQuery("single-row put".into()))
        }

        fn remove(&self, _entity: &str, _key: i64) -> Result<bool, Error> {
            Err(Error::InvalidQuery("single-row remove".into()))
        }

        fn apply(&self, entity: &str, puts: &[Record], removes: &[i64]) -> Result<(), Error> {
            self.batches.fetch_add(1, Ordering::SeqCst);
            if self.fail_batches {
                return Err(Error::Serialization("disk full".into()));
            }
            self.inner.apply(entity, puts, removes)
        }

        fn next_key(&self, entity: &str) -> Result<i64, Error> {
            self.inner.next_key(entity)
        }

        fn flush(&self) -> Result<(), Error> {
            Ok(())
        }
    }

    fn catalog() -> Catalog {
        Catalog::new()
            .with_entity(
                EntityDef::new("Member", "id")
                    .with_field(FieldDef::new("id", ValueType::Int64))
                    .with_field(FieldDef::new("age", ValueType::Int32)),
            )
            .unwrap()
    }

    fn seeded(fail_batches: bool) -> BatchOnlyStorage {
        let storage = BatchOnlyStorage {
            fail_batches,
            ..Default::default()
        };
        let rows: Vec<Record> = (1..=4)
            .map(|key| {
                Record::new(
                    key,
                    vec![
                        ("id".into(), Value::Int64(key)),
                        ("age".into(), Value::Int32(key as i32 * 10)),
                    ],
                )
            })
            .collect();
        storage.inner.apply("Member", &rows, &[]).unwrap();
        storage
    }

    fn ages(storage: &BatchOnlyStorage) -> Vec<Option<Value>> {
        storage
            .scan("Member")
            .unwrap()
            .iter()
            .map(|r| r.get("age").cloned())
            .collect()
    }

    fn increment_all() -> MutationDescriptor {
        MutationDescriptor::update(
            Source::new("Member", "m"),
            vec![Assignment::new(
                "age",
                Expr::arith(ArithOp::Add, Expr::column("m", "age"), Expr::literal(1)),
            )],
        )
    }

    #[test]
    fn test_update_is_written_as_one_batch() {
        let catalog = catalog();
        let storage = seeded(false);
        let executor = MutationExecutor::new(&catalog, &storage, QueryBudget::default());

        assert_eq!(executor.execute(&increment_all()).unwrap(), 4);
        assert_eq!(storage.batches.load(Ordering::SeqCst), 1);
        assert_eq!(
            ages(&storage),
            [11, 21, 31, 41].map(|a| Some(Value::Int32(a))).to_vec()
        );
    }

    #[test]
    fn test_delete_is_written_as_one_batch() {
        let catalog = catalog();
        let storage = seeded(false);
        let executor = MutationExecutor::new(&catalog, &storage, QueryBudget::default());

        let delete = MutationDescriptor::delete(Source::new("Member", "m")).with_filter(
            PredicateExpr::Compare {
                op: CompareOp::Gt,
                lhs: Expr::column("m", "age"),
                rhs: Expr::literal(15),
            },
        );
        assert_eq!(executor.execute(&delete).unwrap(), 3);
        assert_eq!(storage.batches.load(Ordering::SeqCst), 1);
        assert_eq!(ages(&storage), vec![Some(Value::Int32(10))]);
    }

    #[test]
    fn test_failed_write_leaves_table_untouched() {
        let catalog = catalog();
        let storage = seeded(true);
        let executor = MutationExecutor::new(&catalog, &storage, QueryBudget::default());

        assert!(matches!(
            executor.execute(&increment_all()),
            Err(Error::Serialization(_))
        ));
        assert_eq!(
            ages(&storage),
            [10, 20, 30, 40].map(|a| Some(Value::Int32(a))).to_vec()
        );
    }
}

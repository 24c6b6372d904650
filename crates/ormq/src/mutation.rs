//! Bulk update and delete.
//!
//! Mutations go straight to the store. Entities fetched before a bulk
//! mutation are not refreshed; fetch them again to see the new values.

use ormq_proto::{Assignment, Expr, MutationDescriptor, PredicateExpr, RelationalStore, Source, Value};

use crate::error::Error;
use crate::executor::Executor;
use crate::expression::Operand;
use crate::path::Path;
use crate::predicate::{IntoFilter, OptionalPredicate, Predicate};
use crate::validate::check_mutation;

fn merge_filter(existing: Option<PredicateExpr>, filter: impl IntoFilter) -> Option<PredicateExpr> {
    existing
        .map(Predicate::new)
        .and_opt(filter.into_filter())
        .map(Predicate::into_expr)
}

/// `UPDATE target SET ... WHERE ...`.
pub struct UpdateClause<'s, S> {
    store: &'s S,
    target: Source,
    assignments: Vec<Assignment>,
    filter: Option<PredicateExpr>,
    error: Option<String>,
}

impl<'s, S: RelationalStore> UpdateClause<'s, S> {
    pub(crate) fn new(store: &'s S, target: Source) -> Self {
        Self {
            store,
            target,
            assignments: Vec::new(),
            filter: None,
            error: None,
        }
    }

    /// Assign a literal or an expression over the current row.
    pub fn set<T>(mut self, path: &Path<T>, value: impl Operand<T>) -> Self {
        if path.alias() != self.target.alias {
            self.error.get_or_insert_with(|| {
                format!(
                    "`{}.{}` does not belong to the update target `{}`",
                    path.alias(),
                    path.field(),
                    self.target.alias
                )
            });
            return self;
        }
        self.assignments
            .push(Assignment::new(path.field(), value.into_expr()));
        self
    }

    /// Assign NULL.
    pub fn set_null<T>(mut self, path: &Path<T>) -> Self {
        if path.alias() == self.target.alias {
            self.assignments.push(Assignment::new(
                path.field(),
                Expr::Literal(Value::Null),
            ));
        } else {
            self.error.get_or_insert_with(|| {
                format!("`{}.{}` does not belong to the update target", path.alias(), path.field())
            });
        }
        self
    }

    pub fn where_(mut self, filter: impl IntoFilter) -> Self {
        self.filter = merge_filter(self.filter.take(), filter);
        self
    }

    /// The composed mutation.
    pub fn descriptor(&self) -> Result<MutationDescriptor, Error> {
        if let Some(message) = &self.error {
            return Err(Error::Composition(message.clone()));
        }
        let mut mutation = MutationDescriptor::update(self.target.clone(), self.assignments.clone());
        mutation.filter = self.filter.clone();
        check_mutation(&mutation)?;
        Ok(mutation)
    }

    /// Apply the update and return the number of matched rows.
    pub fn execute(&self) -> Result<u64, Error> {
        Executor::new(self.store).execute_update(&self.descriptor()?)
    }
}

/// `DELETE FROM target WHERE ...`.
pub struct DeleteClause<'s, S> {
    store: &'s S,
    target: Source,
    filter: Option<PredicateExpr>,
}

impl<'s, S: RelationalStore> DeleteClause<'s, S> {
    pub(crate) fn new(store: &'s S, target: Source) -> Self {
        Self {
            store,
            target,
            filter: None,
        }
    }

    pub fn where_(mut self, filter: impl IntoFilter) -> Self {
        self.filter = merge_filter(self.filter.take(), filter);
        self
    }

    pub fn descriptor(&self) -> Result<MutationDescriptor, Error> {
        let mut mutation = MutationDescriptor::delete(self.target.clone());
        mutation.filter = self.filter.clone();
        check_mutation(&mutation)?;
        Ok(mutation)
    }

    /// Delete the matching rows and return how many were removed.
    pub fn execute(&self) -> Result<u64, Error> {
        Executor::new(self.store).execute_delete(&self.descriptor()?)
    }
}

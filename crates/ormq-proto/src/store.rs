//! The relational store contract.

use std::sync::Arc;

use crate::mutation::MutationDescriptor;
use crate::query::QueryDescriptor;
use crate::result::Row;

/// A store that evaluates query and mutation descriptors.
///
/// Descriptors are passed read-only. Stores must not retry mutations.
pub trait RelationalStore {
    /// Store-side failure.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Evaluate a query and return one row per result.
    fn execute(&self, query: &QueryDescriptor) -> Result<Vec<Row>, Self::Error>;

    /// Apply a bulk update or delete and return the affected row count.
    fn execute_mutation(&self, mutation: &MutationDescriptor) -> Result<u64, Self::Error>;

    /// Count the results of a query, ignoring its pagination. Grouped
    /// queries count groups.
    fn count(&self, query: &QueryDescriptor) -> Result<u64, Self::Error>;
}

impl<S: RelationalStore + ?Sized> RelationalStore for &S {
    type Error = S::Error;

    fn execute(&self, query: &QueryDescriptor) -> Result<Vec<Row>, Self::Error> {
        (**self).execute(query)
    }

    fn execute_mutation(&self, mutation: &MutationDescriptor) -> Result<u64, Self::Error> {
        (**self).execute_mutation(mutation)
    }

    fn count(&self, query: &QueryDescriptor) -> Result<u64, Self::Error> {
        (**self).count(query)
    }
}

impl<S: RelationalStore + ?Sized> RelationalStore for Arc<S> {
    type Error = S::Error;

    fn execute(&self, query: &QueryDescriptor) -> Result<Vec<Row>, Self::Error> {
        (**self).execute(query)
    }

    fn execute_mutation(&self, mutation: &MutationDescriptor) -> Result<u64, Self::Error> {
        (**self).execute_mutation(mutation)
    }

    fn count(&self, query: &QueryDescriptor) -> Result<u64, Self::Error> {
        (**self).count(query)
    }
}

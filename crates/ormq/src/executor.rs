//! Running composed statements against a store.

use ormq_proto::{Fingerprint, MutationDescriptor, QueryDescriptor, RelationalStore, Row};
use tracing::{debug, info};

use crate::error::Error;
use crate::projection::Selection;
use crate::query::ComposedQuery;

/// One page of results and the total count without paging.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResults<T> {
    results: Vec<T>,
    total: u64,
    offset: u64,
    limit: Option<u64>,
}

impl<T> QueryResults<T> {
    pub fn new(results: Vec<T>, total: u64, offset: u64, limit: Option<u64>) -> Self {
        Self {
            results,
            total,
            offset,
            limit,
        }
    }

    pub fn results(&self) -> &[T] {
        &self.results
    }

    pub fn into_results(self) -> Vec<T> {
        self.results
    }

    /// Number of results across all pages.
    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn limit(&self) -> Option<u64> {
        self.limit
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

/// Runs composed queries and mutations. Descriptors are never modified.
pub struct Executor<'s, S> {
    store: &'s S,
}

impl<S> Clone for Executor<'_, S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S> Copy for Executor<'_, S> {}

impl<'s, S: RelationalStore> Executor<'s, S> {
    pub fn new(store: &'s S) -> Self {
        Self { store }
    }

    fn store_error(fingerprint: Fingerprint, source: S::Error) -> Error {
        Error::Store {
            fingerprint,
            source: Box::new(source),
        }
    }

    fn rows(&self, descriptor: &QueryDescriptor, fingerprint: Fingerprint) -> Result<Vec<Row>, Error> {
        let rows = self
            .store
            .execute(descriptor)
            .map_err(|e| Self::store_error(fingerprint, e))?;
        debug!(fingerprint = %fingerprint.short(), rows = rows.len(), "query fetched");
        Ok(rows)
    }

    fn decode<P: Selection>(selection: &P, rows: Vec<Row>) -> Result<Vec<P::Output>, Error> {
        rows.into_iter().map(|row| selection.decode(row)).collect()
    }

    pub fn fetch_list<P: Selection>(&self, query: &ComposedQuery<P>) -> Result<Vec<P::Output>, Error> {
        let rows = self.rows(query.descriptor(), query.fingerprint())?;
        Self::decode(query.selection(), rows)
    }

    /// At most one result; more than one row is [`Error::NonUniqueResult`].
    pub fn fetch_one<P: Selection>(&self, query: &ComposedQuery<P>) -> Result<Option<P::Output>, Error> {
        let rows = self.rows(query.descriptor(), query.fingerprint())?;
        if rows.len() > 1 {
            return Err(Error::NonUniqueResult { rows: rows.len() });
        }
        Ok(Self::decode(query.selection(), rows)?.into_iter().next())
    }

    /// The first result, fetched with a limit of one applied to a copy of
    /// the descriptor.
    pub fn fetch_first<P: Selection>(&self, query: &ComposedQuery<P>) -> Result<Option<P::Output>, Error> {
        let limited = query.descriptor().with_limit(1);
        let rows = self.rows(&limited, limited.fingerprint()?)?;
        Ok(Self::decode(query.selection(), rows)?.into_iter().next())
    }

    /// Count, then fetch the page.
    ///
    /// The two round trips are separate store calls and are not atomic with
    /// respect to concurrent writers. The page is skipped when the count is
    /// zero.
    pub fn fetch_page<P: Selection>(&self, query: &ComposedQuery<P>) -> Result<QueryResults<P::Output>, Error> {
        let pagination = query.descriptor().pagination;
        let offset = pagination.map(|p| p.offset).unwrap_or(0);
        let limit = pagination.and_then(|p| p.limit);

        let total = self.fetch_count(query)?;
        if total == 0 {
            return Ok(QueryResults::new(Vec::new(), 0, offset, limit));
        }
        let results = self.fetch_list(query)?;
        Ok(QueryResults::new(results, total, offset, limit))
    }

    /// Number of results, ignoring paging.
    pub fn fetch_count<P>(&self, query: &ComposedQuery<P>) -> Result<u64, Error> {
        let unpaged = query.descriptor().without_pagination();
        let count = self
            .store
            .count(&unpaged)
            .map_err(|e| Self::store_error(query.fingerprint(), e))?;
        debug!(fingerprint = %query.fingerprint().short(), count, "query counted");
        Ok(count)
    }

    /// Apply a bulk update and return the affected row count.
    pub fn execute_update(&self, mutation: &MutationDescriptor) -> Result<u64, Error> {
        if mutation.is_delete() {
            return Err(Error::composition("expected an update, got a delete"));
        }
        self.mutate(mutation)
    }

    /// Apply a bulk delete and return the affected row count.
    pub fn execute_delete(&self, mutation: &MutationDescriptor) -> Result<u64, Error> {
        if !mutation.is_delete() {
            return Err(Error::composition("expected a delete, got an update"));
        }
        self.mutate(mutation)
    }

    fn mutate(&self, mutation: &MutationDescriptor) -> Result<u64, Error> {
        let fingerprint = mutation.fingerprint()?;
        let affected = self
            .store
            .execute_mutation(mutation)
            .map_err(|e| Self::store_error(fingerprint, e))?;
        info!(
            fingerprint = %fingerprint.short(),
            entity = %mutation.target.entity,
            affected,
            "bulk mutation applied"
        );
        Ok(affected)
    }
}

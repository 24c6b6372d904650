//! Entry point for building statements against a store.

use ormq_proto::RelationalStore;

use crate::executor::Executor;
use crate::mutation::{DeleteClause, UpdateClause};
use crate::path::{EntityPath, EntityRef};
use crate::projection::{Projections, Selection, TupleItems, TupleSelection};
use crate::query::Query;

/// Creates queries and mutations bound to one store.
pub struct QueryFactory<'s, S> {
    store: &'s S,
}

impl<S> Clone for QueryFactory<'_, S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S> Copy for QueryFactory<'_, S> {}

impl<'s, S: RelationalStore> QueryFactory<'s, S> {
    pub fn new(store: &'s S) -> Self {
        Self { store }
    }

    /// Start a query returning `selection`. Add sources with `from`.
    pub fn select<P: Selection>(&self, selection: P) -> Query<'s, S, P> {
        Query::new(self.store, selection)
    }

    /// Select whole entities from `entity`.
    pub fn select_from<R: EntityRef>(&self, entity: &R) -> Query<'s, S, EntityPath<R::Entity>> {
        Query::new(self.store, entity.entity_path().clone()).from(entity)
    }

    /// Start a tuple query.
    pub fn select_tuple(&self, items: impl TupleItems) -> Query<'s, S, TupleSelection> {
        self.select(Projections::tuple(items))
    }

    pub fn update<R: EntityRef>(&self, target: &R) -> UpdateClause<'s, S> {
        UpdateClause::new(self.store, target.entity_path().source())
    }

    pub fn delete<R: EntityRef>(&self, target: &R) -> DeleteClause<'s, S> {
        DeleteClause::new(self.store, target.entity_path().source())
    }

    pub fn executor(&self) -> Executor<'s, S> {
        Executor::new(self.store)
    }

    pub fn store(&self) -> &'s S {
        self.store
    }
}

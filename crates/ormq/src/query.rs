//! Query composition.
//!
//! A [`Query`] is assembled in clause order: sources, joins, filter,
//! grouping, having, ordering, paging. Each method consumes the builder and
//! returns it. Calling a clause after a later clause has been entered is
//! recorded as a composition error and reported by [`Query::compose`] or any
//! fetch, before the store is called. A composed query is immutable.

use std::fmt;
use std::marker::PhantomData;

use ormq_proto::{
    Expr, Fingerprint, JoinKind, JoinSpec, Pagination, PredicateExpr, Projection,
    QueryDescriptor, RelationalStore, SelectItem, Shape,
};
use tracing::debug;

use crate::error::Error;
use crate::executor::{Executor, QueryResults};
use crate::expression::{OrderSpecifier, TypedExpr};
use crate::path::{EntityRef, RelationPath};
use crate::predicate::{IntoFilter, Predicate};
use crate::projection::Selection;
use crate::validate::check_query;
use crate::value::SqlType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Clause {
    Select,
    From,
    Join,
    Where,
    GroupBy,
    Having,
    OrderBy,
    Page,
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Clause::Select => "select",
            Clause::From => "from",
            Clause::Join => "join",
            Clause::Where => "where_",
            Clause::GroupBy => "group_by",
            Clause::Having => "having",
            Clause::OrderBy => "order_by",
            Clause::Page => "offset/limit",
        };
        f.write_str(name)
    }
}

fn and_filter(existing: Option<PredicateExpr>, filter: impl IntoFilter) -> Option<PredicateExpr> {
    match (existing, filter.into_filter()) {
        (Some(a), Some(b)) => Some(a.and(b.into_expr())),
        (a, b) => a.or(b.map(Predicate::into_expr)),
    }
}

fn empty_descriptor() -> QueryDescriptor {
    QueryDescriptor::new(Projection::new(Vec::new(), Shape::Tuple))
}

/// A query under construction, bound to a store.
pub struct Query<'s, S, P> {
    store: &'s S,
    selection: P,
    descriptor: QueryDescriptor,
    distinct: bool,
    clause: Clause,
    error: Option<String>,
}

impl<S, P: Clone> Clone for Query<'_, S, P> {
    fn clone(&self) -> Self {
        Self {
            store: self.store,
            selection: self.selection.clone(),
            descriptor: self.descriptor.clone(),
            distinct: self.distinct,
            clause: self.clause,
            error: self.error.clone(),
        }
    }
}

impl<S, P: fmt::Debug> fmt::Debug for Query<'_, S, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("selection", &self.selection)
            .field("descriptor", &self.descriptor)
            .field("error", &self.error)
            .finish()
    }
}

impl<'s, S: RelationalStore, P: Selection> Query<'s, S, P> {
    pub(crate) fn new(store: &'s S, selection: P) -> Self {
        Self {
            store,
            selection,
            descriptor: empty_descriptor(),
            distinct: false,
            clause: Clause::Select,
            error: None,
        }
    }

    /// Move to `clause`, recording an error if a later clause was already
    /// entered. Returns whether the call should take effect.
    fn enter(&mut self, clause: Clause) -> bool {
        if self.error.is_some() {
            return false;
        }
        if clause < self.clause {
            self.error = Some(format!("`{clause}` cannot follow `{}`", self.clause));
            return false;
        }
        self.clause = clause;
        true
    }

    fn fail(&mut self, message: String) {
        if self.error.is_none() {
            self.error = Some(message);
        }
    }

    /// Add a source. Several sources form a cross product, correlated only
    /// by the WHERE clause.
    pub fn from(mut self, entity: &impl EntityRef) -> Self {
        if self.enter(Clause::From) {
            self.descriptor.sources.push(entity.entity_path().source());
        }
        self
    }

    /// Inner join along a declared relation.
    pub fn join<E, R: EntityRef>(self, relation: &RelationPath<E, R::Entity>, target: &R) -> Self {
        self.relation_join(JoinKind::Inner, relation, target)
    }

    /// Left join along a declared relation.
    pub fn left_join<E, R: EntityRef>(
        self,
        relation: &RelationPath<E, R::Entity>,
        target: &R,
    ) -> Self {
        self.relation_join(JoinKind::Left, relation, target)
    }

    /// Inner join without a relation; requires [`Query::on`].
    pub fn join_entity(self, target: &impl EntityRef) -> Self {
        self.ad_hoc_join(JoinKind::Inner, target)
    }

    /// Left join without a relation; requires [`Query::on`].
    pub fn left_join_entity(self, target: &impl EntityRef) -> Self {
        self.ad_hoc_join(JoinKind::Left, target)
    }

    fn relation_join<E, R: EntityRef>(
        mut self,
        kind: JoinKind,
        relation: &RelationPath<E, R::Entity>,
        target: &R,
    ) -> Self {
        if self.enter(Clause::Join) {
            self.descriptor.joins.push(JoinSpec::relation(
                kind,
                relation.relation_ref(),
                target.entity_path().source(),
            ));
        }
        self
    }

    fn ad_hoc_join(mut self, kind: JoinKind, target: &impl EntityRef) -> Self {
        if self.enter(Clause::Join) {
            self.descriptor.joins.push(JoinSpec {
                kind,
                target: target.entity_path().source(),
                relation: None,
                on: None,
                fetch: false,
            });
        }
        self
    }

    /// Add an ON condition to the latest join.
    pub fn on(mut self, condition: Predicate) -> Self {
        if self.error.is_some() {
            return self;
        }
        let in_join = self.clause == Clause::Join;
        match self.descriptor.joins.last_mut() {
            Some(join) if in_join => {
                join.on = and_filter(join.on.take(), condition);
            }
            _ => self.fail("`on` requires a preceding join".into()),
        }
        self
    }

    /// Load the latest join's target together with its owner.
    pub fn fetch_join(mut self) -> Self {
        if self.error.is_some() {
            return self;
        }
        let in_join = self.clause == Clause::Join;
        match self.descriptor.joins.last_mut() {
            Some(join) if in_join && join.relation.is_some() => {
                join.fetch = true;
            }
            Some(join) if in_join => {
                let message = format!("fetch join to `{}` requires a relation", join.target.alias);
                self.fail(message);
            }
            _ => self.fail("`fetch_join` requires a preceding join".into()),
        }
        self
    }

    /// Add a WHERE condition, combined with earlier ones by AND. Absent
    /// filters are skipped.
    pub fn where_(mut self, filter: impl IntoFilter) -> Self {
        if self.enter(Clause::Where) {
            self.descriptor.filter = and_filter(self.descriptor.filter.take(), filter);
        }
        self
    }

    pub fn group_by(mut self, key: impl TypedExpr) -> Self {
        if self.enter(Clause::GroupBy) {
            self.descriptor.group_by.push(key.to_expr());
        }
        self
    }

    pub fn having(mut self, filter: impl IntoFilter) -> Self {
        if self.enter(Clause::Having) {
            self.descriptor.having = and_filter(self.descriptor.having.take(), filter);
        }
        self
    }

    pub fn order_by(mut self, order: OrderSpecifier) -> Self {
        if self.enter(Clause::OrderBy) {
            self.descriptor.order_by.push(order.into_spec());
        }
        self
    }

    pub fn offset(mut self, offset: i64) -> Self {
        if self.enter(Clause::Page) {
            match u64::try_from(offset) {
                Ok(offset) => {
                    let limit = self.descriptor.pagination.and_then(|p| p.limit);
                    self.descriptor.pagination = Some(Pagination { offset, limit });
                }
                Err(_) => self.fail(format!("offset must not be negative, got {offset}")),
            }
        }
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        if self.enter(Clause::Page) {
            match u64::try_from(limit) {
                Ok(limit) => {
                    let offset = self.descriptor.pagination.map(|p| p.offset).unwrap_or(0);
                    self.descriptor.pagination = Some(Pagination::new(offset, limit));
                }
                Err(_) => self.fail(format!("limit must not be negative, got {limit}")),
            }
        }
        self
    }

    /// Remove duplicate result rows.
    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    /// Finish composition.
    pub fn compose(self) -> Result<ComposedQuery<P>, Error> {
        if let Some(message) = self.error {
            return Err(Error::Composition(message));
        }
        self.selection.validate()?;

        let mut descriptor = self.descriptor;
        descriptor.projection = Projection {
            items: self
                .selection
                .columns()
                .into_iter()
                .map(|c| c.item)
                .collect(),
            shape: self.selection.shape(),
            distinct: self.distinct,
        };
        check_query(&descriptor, &[])?;

        let composed = ComposedQuery::new(descriptor, self.selection)?;
        debug!(fingerprint = %composed.fingerprint.short(), "query composed");
        Ok(composed)
    }
}

impl<'s, S: RelationalStore, P: Selection + Clone> Query<'s, S, P> {
    fn executor(&self) -> Executor<'s, S> {
        Executor::new(self.store)
    }

    /// At most one result; more than one row is an error.
    pub fn fetch_one(&self) -> Result<Option<P::Output>, Error> {
        self.executor().fetch_one(&self.clone().compose()?)
    }

    /// The first result, if any.
    pub fn fetch_first(&self) -> Result<Option<P::Output>, Error> {
        self.executor().fetch_first(&self.clone().compose()?)
    }

    pub fn fetch_list(&self) -> Result<Vec<P::Output>, Error> {
        self.executor().fetch_list(&self.clone().compose()?)
    }

    /// The requested page plus the total count without paging.
    pub fn fetch_page(&self) -> Result<QueryResults<P::Output>, Error> {
        self.executor().fetch_page(&self.clone().compose()?)
    }

    /// Alias of [`Query::fetch_page`].
    pub fn fetch_results(&self) -> Result<QueryResults<P::Output>, Error> {
        self.fetch_page()
    }

    /// Number of results, ignoring paging.
    pub fn fetch_count(&self) -> Result<u64, Error> {
        self.executor().fetch_count(&self.clone().compose()?)
    }
}

/// A fully composed, immutable query.
#[derive(Debug, Clone)]
pub struct ComposedQuery<P> {
    descriptor: QueryDescriptor,
    selection: P,
    fingerprint: Fingerprint,
}

impl<P> ComposedQuery<P> {
    fn new(descriptor: QueryDescriptor, selection: P) -> Result<Self, Error> {
        let fingerprint = descriptor.fingerprint()?;
        Ok(Self {
            descriptor,
            selection,
            fingerprint,
        })
    }

    pub fn descriptor(&self) -> &QueryDescriptor {
        &self.descriptor
    }

    pub fn selection(&self) -> &P {
        &self.selection
    }

    pub fn fingerprint(&self) -> Fingerprint {
        self.fingerprint
    }
}

/// A query embedded in another: in WHERE (comparison, `in_`, `exists`), in
/// the SELECT list, or as a labelled record slot. It may refer to aliases
/// of the enclosing query; declaring one of them again is an error.
pub struct SubQuery<T> {
    descriptor: QueryDescriptor,
    _type: PhantomData<fn() -> T>,
}

impl<T> Clone for SubQuery<T> {
    fn clone(&self) -> Self {
        Self {
            descriptor: self.descriptor.clone(),
            _type: PhantomData,
        }
    }
}

impl<T> fmt::Debug for SubQuery<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SubQuery").field(&self.descriptor).finish()
    }
}

impl<T: SqlType> SubQuery<T> {
    /// A subquery yielding one `T` per row.
    pub fn select(item: impl TypedExpr<Value = T>) -> Self {
        Self {
            descriptor: QueryDescriptor::new(Projection::new(
                vec![SelectItem::expr(item.to_expr())],
                Shape::Scalar,
            )),
            _type: PhantomData,
        }
    }

    pub fn from(mut self, entity: &impl EntityRef) -> Self {
        self.descriptor.sources.push(entity.entity_path().source());
        self
    }

    pub fn join<E, R: EntityRef>(mut self, relation: &RelationPath<E, R::Entity>, target: &R) -> Self {
        self.descriptor.joins.push(JoinSpec::relation(
            JoinKind::Inner,
            relation.relation_ref(),
            target.entity_path().source(),
        ));
        self
    }

    /// Join without a relation, on `condition`.
    pub fn join_on(mut self, target: &impl EntityRef, condition: Predicate) -> Self {
        self.descriptor.joins.push(JoinSpec::ad_hoc(
            JoinKind::Inner,
            target.entity_path().source(),
            condition.into_expr(),
        ));
        self
    }

    pub fn where_(mut self, filter: impl IntoFilter) -> Self {
        self.descriptor.filter = and_filter(self.descriptor.filter.take(), filter);
        self
    }

    pub fn group_by(mut self, key: impl TypedExpr) -> Self {
        self.descriptor.group_by.push(key.to_expr());
        self
    }

    pub fn having(mut self, filter: impl IntoFilter) -> Self {
        self.descriptor.having = and_filter(self.descriptor.having.take(), filter);
        self
    }

    /// Holds when the subquery returns at least one row.
    pub fn exists(self) -> Predicate {
        Predicate::new(PredicateExpr::Exists {
            query: Box::new(self.descriptor),
            negated: false,
        })
    }

    pub fn not_exists(self) -> Predicate {
        Predicate::new(PredicateExpr::Exists {
            query: Box::new(self.descriptor),
            negated: true,
        })
    }

    pub fn descriptor(&self) -> &QueryDescriptor {
        &self.descriptor
    }

    pub fn into_descriptor(self) -> QueryDescriptor {
        self.descriptor
    }
}

impl<T: SqlType> TypedExpr for SubQuery<T> {
    type Value = T;

    fn to_expr(&self) -> Expr {
        Expr::Subquery(Box::new(self.descriptor.clone()))
    }
}

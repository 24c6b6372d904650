//! Query descriptor types.
//!
//! A [`QueryDescriptor`] is the fully assembled, immutable form of a query:
//! sources, joins, filter, grouping, ordering, paging and projection. Stores
//! receive it read-only.

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::expr::{Expr, PredicateExpr};
use crate::fingerprint::Fingerprint;

/// An aliased entity source (`from Member member`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Source {
    /// Entity type name.
    pub entity: String,
    /// Alias that field references use.
    pub alias: String,
}

impl Source {
    /// Create a new source.
    pub fn new(entity: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            alias: alias.into(),
        }
    }
}

/// Join kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JoinKind {
    /// Only rows with a match survive.
    Inner,
    /// Source rows without a match survive with a null target.
    Left,
}

/// Reference to a declared relationship, e.g. `member.team`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelationRef {
    /// Alias of the entity that owns the relationship.
    pub from_alias: String,
    /// Relationship name in the catalog.
    pub name: String,
}

/// A join of one more entity into the query scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinSpec {
    /// Inner or left.
    pub kind: JoinKind,
    /// Joined entity and its alias.
    pub target: Source,
    /// Declared relationship; `None` for ad-hoc joins, which need `on`.
    pub relation: Option<RelationRef>,
    /// Extra ON condition.
    pub on: Option<PredicateExpr>,
    /// Materialize the target in the same round trip and attach it to the
    /// owning entity.
    pub fetch: bool,
}

impl JoinSpec {
    /// Join through a declared relationship.
    pub fn relation(kind: JoinKind, relation: RelationRef, target: Source) -> Self {
        Self {
            kind,
            target,
            relation: Some(relation),
            on: None,
            fetch: false,
        }
    }

    /// Join without a relationship; an ON condition is mandatory.
    pub fn ad_hoc(kind: JoinKind, target: Source, on: PredicateExpr) -> Self {
        Self {
            kind,
            target,
            relation: None,
            on: Some(on),
            fetch: false,
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderDirection {
    /// Ascending order.
    Asc,
    /// Descending order.
    Desc,
}

/// Placement of NULL keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum NullOrdering {
    /// Store default. The reference store treats NULL as the smallest value.
    #[default]
    Default,
    /// NULLs before all values regardless of direction.
    First,
    /// NULLs after all values regardless of direction.
    Last,
}

/// Order specification for sorting results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderSpec {
    /// Sort key.
    pub expr: Expr,
    /// Sort direction.
    pub direction: OrderDirection,
    /// NULL placement.
    pub nulls: NullOrdering,
}

impl OrderSpec {
    /// Create an ascending order spec.
    pub fn asc(expr: Expr) -> Self {
        Self {
            expr,
            direction: OrderDirection::Asc,
            nulls: NullOrdering::Default,
        }
    }

    /// Create a descending order spec.
    pub fn desc(expr: Expr) -> Self {
        Self {
            expr,
            direction: OrderDirection::Desc,
            nulls: NullOrdering::Default,
        }
    }

    /// Set the NULL placement.
    pub fn with_nulls(mut self, nulls: NullOrdering) -> Self {
        self.nulls = nulls;
        self
    }
}

/// Offset/limit window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Pagination {
    /// Number of results to skip.
    pub offset: u64,
    /// Maximum number of results to return. `None` means unbounded.
    pub limit: Option<u64>,
}

impl Pagination {
    /// Create pagination with limit and offset.
    pub fn new(offset: u64, limit: u64) -> Self {
        Self {
            offset,
            limit: Some(limit),
        }
    }

    /// Create pagination with just a limit.
    pub fn limit(limit: u64) -> Self {
        Self {
            offset: 0,
            limit: Some(limit),
        }
    }

    /// Create pagination with just an offset.
    pub fn offset(offset: u64) -> Self {
        Self {
            offset,
            limit: None,
        }
    }
}

/// One item of the SELECT list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SelectItem {
    /// The whole entity bound to an alias.
    Entity { alias: String },
    /// A value expression, optionally labelled for record binding.
    Expr { expr: Expr, label: Option<String> },
}

impl SelectItem {
    /// Select a whole entity.
    pub fn entity(alias: impl Into<String>) -> Self {
        SelectItem::Entity {
            alias: alias.into(),
        }
    }

    /// Select an unlabelled expression.
    pub fn expr(expr: Expr) -> Self {
        SelectItem::Expr { expr, label: None }
    }

    /// Select a labelled expression.
    pub fn labelled(expr: Expr, label: impl Into<String>) -> Self {
        SelectItem::Expr {
            expr,
            label: Some(label.into()),
        }
    }

    /// The slot name used when binding into a record: the explicit label,
    /// otherwise the column's field name.
    pub fn slot_name(&self) -> Option<&str> {
        match self {
            SelectItem::Entity { .. } => None,
            SelectItem::Expr {
                label: Some(label), ..
            } => Some(label),
            SelectItem::Expr { expr, label: None } => expr.column_name(),
        }
    }

    /// The expression, if this item is not a whole entity.
    pub fn as_expr(&self) -> Option<&Expr> {
        match self {
            SelectItem::Expr { expr, .. } => Some(expr),
            SelectItem::Entity { .. } => None,
        }
    }
}

/// Strategy used to bind projected items into a record type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordBinding {
    /// Writable-property assignment by slot name.
    Properties,
    /// Direct field assignment by slot name.
    Fields,
    /// Positional constructor invocation.
    Constructor,
}

/// Declared output shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Shape {
    /// A single whole entity per row.
    Entity,
    /// A single value per row.
    Scalar,
    /// An ordered list of heterogeneous items.
    Tuple,
    /// A mapped record.
    Record {
        target: String,
        binding: RecordBinding,
    },
}

/// What a query returns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Projection {
    /// Items in output order.
    pub items: Vec<SelectItem>,
    /// Output shape.
    pub shape: Shape,
    /// Remove duplicate rows.
    pub distinct: bool,
}

impl Projection {
    /// Create a projection.
    pub fn new(items: Vec<SelectItem>, shape: Shape) -> Self {
        Self {
            items,
            shape,
            distinct: false,
        }
    }

    /// Whether any item is (or contains) an aggregate.
    pub fn has_aggregate(&self) -> bool {
        self.items
            .iter()
            .filter_map(SelectItem::as_expr)
            .any(Expr::contains_aggregate)
    }
}

/// The assembled query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryDescriptor {
    /// FROM sources. More than one source forms a cross product.
    pub sources: Vec<Source>,
    /// Joins in declaration order.
    pub joins: Vec<JoinSpec>,
    /// WHERE predicate.
    pub filter: Option<PredicateExpr>,
    /// GROUP BY keys.
    pub group_by: Vec<Expr>,
    /// HAVING predicate.
    pub having: Option<PredicateExpr>,
    /// ORDER BY specs.
    pub order_by: Vec<OrderSpec>,
    /// OFFSET/LIMIT.
    pub pagination: Option<Pagination>,
    /// SELECT list.
    pub projection: Projection,
}

impl QueryDescriptor {
    /// Create an empty descriptor with a projection.
    pub fn new(projection: Projection) -> Self {
        Self {
            sources: vec![],
            joins: vec![],
            filter: None,
            group_by: vec![],
            having: None,
            order_by: vec![],
            pagination: None,
            projection,
        }
    }

    /// Add a source.
    pub fn with_source(mut self, source: Source) -> Self {
        self.sources.push(source);
        self
    }

    /// Add a join.
    pub fn with_join(mut self, join: JoinSpec) -> Self {
        self.joins.push(join);
        self
    }

    /// Set the filter.
    pub fn with_filter(mut self, filter: PredicateExpr) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Add a GROUP BY key.
    pub fn with_group(mut self, expr: Expr) -> Self {
        self.group_by.push(expr);
        self
    }

    /// Set the HAVING predicate.
    pub fn with_having(mut self, having: PredicateExpr) -> Self {
        self.having = Some(having);
        self
    }

    /// Add ordering.
    pub fn with_order(mut self, order: OrderSpec) -> Self {
        self.order_by.push(order);
        self
    }

    /// Set pagination.
    pub fn with_pagination(mut self, pagination: Pagination) -> Self {
        self.pagination = Some(pagination);
        self
    }

    /// A copy without the paging window, as used for total counts.
    pub fn without_pagination(&self) -> Self {
        Self {
            pagination: None,
            ..self.clone()
        }
    }

    /// A copy limited to `limit` rows, keeping any offset.
    pub fn with_limit(&self, limit: u64) -> Self {
        let offset = self.pagination.map(|p| p.offset).unwrap_or(0);
        let limit = match self.pagination.and_then(|p| p.limit) {
            Some(existing) => existing.min(limit),
            None => limit,
        };
        Self {
            pagination: Some(Pagination::new(offset, limit)),
            ..self.clone()
        }
    }

    /// Whether the query groups rows or aggregates the whole set.
    pub fn is_aggregating(&self) -> bool {
        !self.group_by.is_empty() || self.projection.has_aggregate()
    }

    /// Aliases declared by this query's own scope (sources and join targets).
    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.sources
            .iter()
            .map(|s| s.alias.as_str())
            .chain(self.joins.iter().map(|j| j.target.alias.as_str()))
    }

    /// Subqueries embedded directly in this query (not recursively).
    pub fn embedded_subqueries(&self) -> Vec<&QueryDescriptor> {
        let mut out: Vec<&QueryDescriptor> = Vec::new();
        self.walk_subqueries(&mut |q| out.push(q));
        out
    }

    fn walk_subqueries<'a>(&'a self, visit: &mut dyn FnMut(&'a QueryDescriptor)) {
        for item in &self.projection.items {
            if let SelectItem::Expr { expr, .. } = item {
                expr.for_each_subquery(visit);
            }
        }
        for join in &self.joins {
            if let Some(on) = &join.on {
                on.for_each_subquery(visit);
            }
        }
        if let Some(filter) = &self.filter {
            filter.for_each_subquery(visit);
        }
        for expr in &self.group_by {
            expr.for_each_subquery(visit);
        }
        if let Some(having) = &self.having {
            having.for_each_subquery(visit);
        }
        for order in &self.order_by {
            order.expr.for_each_subquery(visit);
        }
    }

    /// Structural fingerprint of this descriptor.
    pub fn fingerprint(&self) -> Result<Fingerprint, Error> {
        Fingerprint::of(self)
    }
}

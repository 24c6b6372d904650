//! Query executor.
//!
//! Evaluates a [`QueryDescriptor`] in SQL order: FROM (cross product of the
//! sources), JOIN, WHERE, GROUP BY, HAVING, SELECT, ORDER BY, DISTINCT,
//! OFFSET/LIMIT.

use std::cmp::Ordering;
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use ormq_proto::{
    Datum, EntityRecord, FetchedRelation, NullOrdering, OrderDirection, OrderSpec, Pagination,
    QueryDescriptor, Row, SelectItem, Value,
};
use tracing::warn;

use super::key::{row_key, ValueKey};
use super::scope::{Env, Scope, Snapshot, Tuple};
use crate::catalog::Catalog;
use crate::config::QueryBudget;
use crate::error::Error;
use crate::storage::{Record, StorageBackend};

/// Evaluates descriptors against one statement's table snapshot.
pub struct Evaluator<'a> {
    catalog: &'a Catalog,
    snapshot: Snapshot<'a>,
    budget: QueryBudget,
}

impl<'a> Evaluator<'a> {
    /// Create an evaluator. The caller holds the table locks.
    pub fn new(catalog: &'a Catalog, storage: &'a dyn StorageBackend, budget: QueryBudget) -> Self {
        Self {
            catalog,
            snapshot: Snapshot::new(catalog, storage),
            budget,
        }
    }

    pub(crate) fn catalog(&self) -> &'a Catalog {
        self.catalog
    }

    pub(crate) fn snapshot(&self) -> &Snapshot<'a> {
        &self.snapshot
    }

    /// Execute a top-level query.
    pub fn execute(&self, query: &QueryDescriptor) -> Result<Vec<Row>, Error> {
        let rows = self.run(query, None, 0)?;
        if rows.len() > self.budget.max_result_rows {
            return Err(Error::BudgetExceeded {
                limit: "result rows",
                max: self.budget.max_result_rows,
            });
        }
        Ok(rows)
    }

    /// Count a query's results, ignoring its pagination.
    ///
    /// Rows are only projected when DISTINCT needs their values.
    pub fn count(&self, query: &QueryDescriptor) -> Result<u64, Error> {
        if query.projection.distinct {
            let rows = self.run(&query.without_pagination(), None, 0)?;
            return Ok(rows.len() as u64);
        }
        let (_, units) = self.surviving_units(query, None, 0)?;
        Ok(units.len() as u64)
    }

    /// Execute a query, possibly nested inside `outer`.
    pub(crate) fn run(
        &self,
        query: &QueryDescriptor,
        outer: Option<&Env<'_>>,
        depth: usize,
    ) -> Result<Vec<Row>, Error> {
        let grouped = query.is_aggregating();
        let (scope, units) = self.surviving_units(query, outer, depth)?;

        let empty = scope.empty_tuple();
        let mut produced: Vec<(Vec<Value>, Row)> = Vec::with_capacity(units.len());
        for unit in &units {
            let representative = unit.first().unwrap_or(&empty);
            let env = Env::new(&scope, representative, outer);
            let group = grouped.then_some(unit.as_slice());

            let keys = query
                .order_by
                .iter()
                .map(|spec| self.eval_expr(&spec.expr, &env, group, depth))
                .collect::<Result<Vec<_>, _>>()?;
            let row = self.project(query, &scope, &env, group, depth)?;
            produced.push((keys, row));
        }

        sort_rows(&mut produced, &query.order_by);
        let mut rows: Vec<Row> = produced.into_iter().map(|(_, row)| row).collect();

        if query.projection.distinct {
            let mut seen = HashSet::new();
            rows.retain(|row| seen.insert(row_key(row)));
        }

        apply_pagination(&mut rows, query.pagination);
        Ok(rows)
    }

    /// Scan, join, filter and group, then drop groups rejected by HAVING.
    ///
    /// Each unit is one tuple, or one group when the query aggregates.
    fn surviving_units(
        &self,
        query: &QueryDescriptor,
        outer: Option<&Env<'_>>,
        depth: usize,
    ) -> Result<(Scope, Vec<Vec<Tuple>>), Error> {
        if depth > self.budget.max_subquery_depth {
            return Err(Error::BudgetExceeded {
                limit: "subquery depth",
                max: self.budget.max_subquery_depth,
            });
        }
        if query.sources.is_empty() {
            return Err(Error::InvalidQuery("query has no source".into()));
        }
        let grouped = query.is_aggregating();
        if query.having.is_some() && !grouped {
            return Err(Error::InvalidQuery("HAVING without grouping".into()));
        }

        let scope = Scope::build(query, self.catalog)?;
        let mut tuples = self.scan_sources(query, &scope)?;

        for (index, join) in query.joins.iter().enumerate() {
            let target_slot = query.sources.len() + index;
            tuples = self.apply_join(join, target_slot, &scope, tuples, outer, depth)?;
        }

        if let Some(filter) = &query.filter {
            let mut kept = Vec::with_capacity(tuples.len());
            for tuple in tuples {
                let env = Env::new(&scope, &tuple, outer);
                let keep = self.eval_predicate(filter, &env, None, depth)? == Some(true);
                if keep {
                    kept.push(tuple);
                }
            }
            tuples = kept;
        }

        let units: Vec<Vec<Tuple>> = if grouped {
            self.group(query, &scope, tuples, outer, depth)?
        } else {
            tuples.into_iter().map(|t| vec![t]).collect()
        };

        let Some(having) = &query.having else {
            return Ok((scope, units));
        };
        let empty = scope.empty_tuple();
        let mut kept = Vec::with_capacity(units.len());
        for unit in units {
            let env = Env::new(&scope, unit.first().unwrap_or(&empty), outer);
            if self.eval_predicate(having, &env, Some(unit.as_slice()), depth)? == Some(true) {
                kept.push(unit);
            }
        }
        Ok((scope, kept))
    }

    pub(super) fn check_intermediate(&self, rows: usize) -> Result<(), Error> {
        if rows > self.budget.max_intermediate_rows {
            return Err(Error::BudgetExceeded {
                limit: "intermediate rows",
                max: self.budget.max_intermediate_rows,
            });
        }
        Ok(())
    }

    fn scan_sources(&self, query: &QueryDescriptor, scope: &Scope) -> Result<Vec<Tuple>, Error> {
        if query.sources.len() > 1 {
            warn!(
                sources = query.sources.len(),
                "multiple sources form a cross product before filtering"
            );
        }

        let mut tuples = vec![scope.empty_tuple()];
        for (slot, source) in query.sources.iter().enumerate() {
            let rows = self.snapshot.table(&source.entity)?;
            let size = tuples.len().saturating_mul(rows.len());
            self.check_intermediate(size)?;

            let mut next = Vec::with_capacity(size);
            for tuple in &tuples {
                for row in rows.iter() {
                    let mut extended = tuple.clone();
                    extended[slot] = Some(row.clone());
                    next.push(extended);
                }
            }
            tuples = next;
        }
        Ok(tuples)
    }

    /// Partition tuples by the GROUP BY keys, in first-seen order.
    ///
    /// Without GROUP BY the whole input is one group, even when empty.
    fn group(
        &self,
        query: &QueryDescriptor,
        scope: &Scope,
        tuples: Vec<Tuple>,
        outer: Option<&Env<'_>>,
        depth: usize,
    ) -> Result<Vec<Vec<Tuple>>, Error> {
        let mut index: HashMap<Vec<ValueKey>, usize> = HashMap::new();
        let mut groups: Vec<Vec<Tuple>> = Vec::new();

        for tuple in tuples {
            let env = Env::new(scope, &tuple, outer);
            let key = query
                .group_by
                .iter()
                .map(|expr| {
                    self.eval_expr(expr, &env, None, depth)
                        .map(|v| ValueKey::from(&v))
                })
                .collect::<Result<Vec<_>, _>>()?;

            match index.entry(key) {
                Entry::Occupied(entry) => groups[*entry.get()].push(tuple),
                Entry::Vacant(entry) => {
                    entry.insert(groups.len());
                    groups.push(vec![tuple]);
                }
            }
        }

        if query.group_by.is_empty() && groups.is_empty() {
            groups.push(Vec::new());
        }
        Ok(groups)
    }

    fn project(
        &self,
        query: &QueryDescriptor,
        scope: &Scope,
        env: &Env<'_>,
        group: Option<&[Tuple]>,
        depth: usize,
    ) -> Result<Row, Error> {
        let mut data = Vec::with_capacity(query.projection.items.len());
        for item in &query.projection.items {
            let datum = match item {
                SelectItem::Entity { alias } => {
                    let slot = scope
                        .slot(alias)
                        .ok_or_else(|| Error::UnknownAlias(alias.clone()))?;
                    Datum::Entity(materialize(query, scope, env.tuple, slot))
                }
                SelectItem::Expr { expr, .. } => {
                    Datum::Value(self.eval_expr(expr, env, group, depth)?)
                }
            };
            data.push(datum);
        }
        Ok(Row::new(data))
    }
}

/// Build the record for `slot`, attaching associations fetched by joins
/// owned by that alias.
fn materialize(
    query: &QueryDescriptor,
    scope: &Scope,
    tuple: &[Option<Arc<Record>>],
    slot: usize,
) -> Option<EntityRecord> {
    let record = tuple.get(slot)?.as_ref()?;
    let entity = &scope.get(slot).entity;
    let mut out = EntityRecord::new(
        entity.name.clone(),
        Value::Int64(record.key),
        record.fields.clone(),
    );

    for (index, join) in query.joins.iter().enumerate() {
        let Some(relation) = join.relation.as_ref().filter(|_| join.fetch) else {
            continue;
        };
        if scope.slot(&relation.from_alias) != Some(slot) {
            continue;
        }
        let target = query.sources.len() + index;
        out.fetched.push(FetchedRelation {
            relation: relation.name.clone(),
            record: materialize(query, scope, tuple, target),
        });
    }
    Some(out)
}

fn sort_rows(rows: &mut [(Vec<Value>, Row)], order_by: &[OrderSpec]) {
    if order_by.is_empty() {
        return;
    }

    rows.sort_by(|(a, _), (b, _)| {
        for (index, spec) in order_by.iter().enumerate() {
            let cmp = compare_sort_keys(&a[index], &b[index], spec);
            if cmp != Ordering::Equal {
                return cmp;
            }
        }
        Ordering::Equal
    });
}

/// Compare two sort keys under an order spec's direction and NULL placement.
fn compare_sort_keys(a: &Value, b: &Value, spec: &OrderSpec) -> Ordering {
    let nulls_first = match spec.nulls {
        NullOrdering::First => true,
        NullOrdering::Last => false,
        NullOrdering::Default => spec.direction == OrderDirection::Asc,
    };

    match (a.is_null(), b.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) if nulls_first => Ordering::Less,
        (true, false) => Ordering::Greater,
        (false, true) if nulls_first => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => {
            // Incompatible types are considered equal
            let cmp = a.compare(b).unwrap_or(Ordering::Equal);
            match spec.direction {
                OrderDirection::Asc => cmp,
                OrderDirection::Desc => cmp.reverse(),
            }
        }
    }
}

fn apply_pagination(rows: &mut Vec<Row>, pagination: Option<Pagination>) {
    let Some(pagination) = pagination else {
        return;
    };

    let offset = usize::try_from(pagination.offset).unwrap_or(usize::MAX);
    if offset > 0 {
        if offset >= rows.len() {
            rows.clear();
            return;
        }
        rows.drain(0..offset);
    }

    if let Some(limit) = pagination.limit {
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);
        if limit < rows.len() {
            rows.truncate(limit);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ormq_proto::Expr;

    fn named(name: Option<&str>) -> (Vec<Value>, Row) {
        let value = name.map(|n| Value::String(n.into())).unwrap_or(Value::Null);
        (vec![value.clone()], Row::new(vec![Datum::Value(value)]))
    }

    fn names(rows: &[(Vec<Value>, Row)]) -> Vec<Value> {
        rows.iter().map(|(k, _)| k[0].clone()).collect()
    }

    #[test]
    fn test_default_nulls_are_smallest() {
        let mut rows = vec![named(Some("b")), named(None), named(Some("a"))];
        sort_rows(&mut rows, &[OrderSpec::asc(Expr::column("m", "username"))]);
        assert_eq!(
            names(&rows),
            vec![Value::Null, Value::String("a".into()), Value::String("b".into())]
        );

        sort_rows(&mut rows, &[OrderSpec::desc(Expr::column("m", "username"))]);
        assert_eq!(
            names(&rows),
            vec![Value::String("b".into()), Value::String("a".into()), Value::Null]
        );
    }

    #[test]
    fn test_explicit_null_placement() {
        let mut rows = vec![named(None), named(Some("a"))];
        sort_rows(
            &mut rows,
            &[OrderSpec::asc(Expr::column("m", "username")).with_nulls(NullOrdering::Last)],
        );
        assert_eq!(names(&rows)[1], Value::Null);

        sort_rows(
            &mut rows,
            &[OrderSpec::desc(Expr::column("m", "username")).with_nulls(NullOrdering::First)],
        );
        assert_eq!(names(&rows)[0], Value::Null);
    }

    #[test]
    fn test_pagination() {
        let mut rows: Vec<Row> = (0..4)
            .map(|i| Row::new(vec![Datum::Value(Value::Int32(i))]))
            .collect();
        apply_pagination(&mut rows, Some(Pagination::new(1, 2)));
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].data[0], Datum::Value(Value::Int32(1)));

        let mut rows: Vec<Row> = (0..4)
            .map(|i| Row::new(vec![Datum::Value(Value::Int32(i))]))
            .collect();
        apply_pagination(&mut rows, Some(Pagination::offset(10)));
        assert!(rows.is_empty());
    }
}

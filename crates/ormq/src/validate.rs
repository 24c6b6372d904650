//! Structural checks run when a query or mutation is composed.

use std::collections::HashSet;

use ormq_proto::{Expr, MutationDescriptor, MutationKind, QueryDescriptor, SelectItem};

use crate::error::Error;

/// Check a query and, recursively, its subqueries. `outer` holds the
/// aliases bound by enclosing queries.
pub(crate) fn check_query(query: &QueryDescriptor, outer: &[&str]) -> Result<(), Error> {
    if query.sources.is_empty() {
        return Err(Error::composition("query has no source; call `from`"));
    }

    let mut seen = HashSet::new();
    for alias in query.aliases() {
        if outer.contains(&alias) || !seen.insert(alias) {
            return Err(Error::AmbiguousAlias {
                alias: alias.to_string(),
            });
        }
    }

    for join in &query.joins {
        match &join.on {
            None if join.relation.is_none() => {
                return Err(Error::composition(format!(
                    "join to `{}` has no relation and no ON condition",
                    join.target.alias
                )))
            }
            Some(on) if on.contains_aggregate() => {
                return Err(Error::composition(
                    "aggregates are not allowed in a join ON condition",
                ))
            }
            _ => {}
        }
    }

    if query.filter.as_ref().is_some_and(|f| f.contains_aggregate()) {
        return Err(Error::composition(
            "aggregates are not allowed in WHERE; use HAVING",
        ));
    }
    if query.group_by.iter().any(Expr::contains_aggregate) {
        return Err(Error::composition("aggregates are not allowed in GROUP BY"));
    }
    if query.having.is_some() && query.group_by.is_empty() {
        return Err(Error::composition("HAVING requires GROUP BY"));
    }

    check_projection(query)?;

    let mut scope: Vec<&str> = outer.to_vec();
    scope.extend(query.aliases());
    for subquery in query.embedded_subqueries() {
        check_query(subquery, &scope)?;
    }
    Ok(())
}

fn check_projection(query: &QueryDescriptor) -> Result<(), Error> {
    let grouped = !query.group_by.is_empty();
    if !grouped && !query.projection.has_aggregate() {
        return Ok(());
    }

    for item in &query.projection.items {
        match item {
            SelectItem::Entity { alias } => {
                return Err(Error::composition(format!(
                    "entity `{alias}` cannot be selected from an aggregating query"
                )))
            }
            SelectItem::Expr { expr, .. } => {
                if expr.contains_aggregate()
                    || matches!(expr, Expr::Literal(_) | Expr::Subquery(_))
                    || query.group_by.contains(expr)
                {
                    continue;
                }
                return Err(Error::composition(if grouped {
                    format!("{} must appear in GROUP BY or be aggregated", describe(expr))
                } else {
                    format!(
                        "{} mixes with aggregates; add GROUP BY or aggregate it",
                        describe(expr)
                    )
                }));
            }
        }
    }
    Ok(())
}

/// Check a mutation: at least one assignment, no aggregates, valid subqueries.
pub(crate) fn check_mutation(mutation: &MutationDescriptor) -> Result<(), Error> {
    let mut values: Vec<&Expr> = Vec::new();
    if let MutationKind::Update { assignments } = &mutation.kind {
        if assignments.is_empty() {
            return Err(Error::composition(format!(
                "update of {} has no `set` clause",
                mutation.target.entity
            )));
        }
        values.extend(assignments.iter().map(|a| &a.value));
    }

    if values.iter().any(|v| v.contains_aggregate())
        || mutation.filter.as_ref().is_some_and(|f| f.contains_aggregate())
    {
        return Err(Error::composition(
            "aggregates are not allowed in a bulk update or delete",
        ));
    }

    let scope = [mutation.target.alias.as_str()];
    let mut subqueries = Vec::new();
    for value in values {
        value.for_each_subquery(&mut |q| subqueries.push(q));
    }
    if let Some(filter) = &mutation.filter {
        filter.for_each_subquery(&mut |q| subqueries.push(q));
    }
    for subquery in subqueries {
        check_query(subquery, &scope)?;
    }
    Ok(())
}

fn describe(expr: &Expr) -> String {
    match expr {
        Expr::Column { alias, field } => format!("`{alias}.{field}`"),
        other => format!("`{other:?}`"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ormq_proto::{
        AggregateFunction, JoinKind, JoinSpec, Projection, Shape, Source,
    };

    fn select(items: Vec<SelectItem>) -> QueryDescriptor {
        QueryDescriptor::new(Projection::new(items, Shape::Tuple))
            .with_source(Source::new("Member", "m"))
    }

    fn avg_age() -> Expr {
        Expr::aggregate(AggregateFunction::Avg, Some(Expr::column("m", "age")))
    }

    #[test]
    fn test_mixed_aggregate_needs_group() {
        let mixed = select(vec![
            SelectItem::expr(Expr::column("m", "username")),
            SelectItem::expr(avg_age()),
        ]);
        assert!(matches!(check_query(&mixed, &[]), Err(Error::Composition(_))));

        let grouped = mixed.with_group(Expr::column("m", "username"));
        assert!(check_query(&grouped, &[]).is_ok());
    }

    #[test]
    fn test_ad_hoc_join_without_on() {
        let mut join = JoinSpec::ad_hoc(
            JoinKind::Left,
            Source::new("Team", "t"),
            ormq_proto::PredicateExpr::Literal(true),
        );
        join.on = None;
        let query = select(vec![SelectItem::entity("m")]).with_join(join);
        assert!(matches!(check_query(&query, &[]), Err(Error::Composition(_))));
    }

    #[test]
    fn test_outer_alias_reuse() {
        let query = select(vec![SelectItem::expr(avg_age())]);
        assert!(matches!(
            check_query(&query, &["m"]),
            Err(Error::AmbiguousAlias { alias }) if alias == "m"
        ));
        assert!(check_query(&query, &["outer"]).is_ok());
    }
}

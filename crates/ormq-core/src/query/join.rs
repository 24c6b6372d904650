//! Join evaluation.
//!
//! Joins through a declared relation are equi-joins on the relation's
//! fields and may use a hash index over the target table. Ad-hoc joins only
//! have an ON predicate and always run as nested loops.

use std::collections::HashMap;
use std::sync::Arc;

use ormq_proto::{JoinKind, JoinSpec, RelationRef, Source, Value};
use tracing::debug;

use super::executor::Evaluator;
use super::key::ValueKey;
use super::scope::{Env, Scope, Tuple};
use crate::error::Error;
use crate::storage::Record;

/// Join strategy selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinStrategy {
    /// Nested loop join - O(N*M), best for small inputs.
    NestedLoop,
    /// Hash join - O(N+M), best for larger inputs.
    HashJoin,
}

impl JoinStrategy {
    /// Select a strategy from the input sizes.
    ///
    /// Uses hash join when there are more than 100 rows on the left or more
    /// than 1000 target rows; nested loop otherwise.
    pub fn select(left_rows: usize, target_rows: usize) -> Self {
        if left_rows > 100 || target_rows > 1000 {
            JoinStrategy::HashJoin
        } else {
            JoinStrategy::NestedLoop
        }
    }
}

/// Resolved equality condition of a relation join.
struct EquiJoin {
    from_slot: usize,
    from_field: String,
    to_field: String,
}

impl EquiJoin {
    fn left_value<'t>(&self, tuple: &'t Tuple) -> Option<&'t Value> {
        tuple
            .get(self.from_slot)?
            .as_ref()?
            .get(&self.from_field)
            .filter(|v| !v.is_null())
    }

    fn matches(&self, tuple: &Tuple, target: &Record) -> bool {
        match (self.left_value(tuple), target.get(&self.to_field)) {
            (Some(left), Some(right)) => left.sql_eq(right) == Some(true),
            _ => false,
        }
    }
}

impl Evaluator<'_> {
    /// Extend every tuple with the join target at `target_slot`.
    pub(super) fn apply_join(
        &self,
        join: &JoinSpec,
        target_slot: usize,
        scope: &Scope,
        tuples: Vec<Tuple>,
        outer: Option<&Env<'_>>,
        depth: usize,
    ) -> Result<Vec<Tuple>, Error> {
        let targets = self.snapshot().table(&join.target.entity)?;

        let equi = match &join.relation {
            Some(relation) => Some(self.resolve_relation(relation, &join.target, target_slot, scope)?),
            None if join.on.is_none() => {
                return Err(Error::InvalidQuery(format!(
                    "join to {} has neither a relation nor an ON condition",
                    join.target.alias
                )))
            }
            None => None,
        };
        if join.fetch && equi.is_none() {
            return Err(Error::InvalidQuery(format!(
                "fetch join to {} requires a relation",
                join.target.alias
            )));
        }

        let strategy = match equi {
            Some(_) => JoinStrategy::select(tuples.len(), targets.len()),
            None => JoinStrategy::NestedLoop,
        };
        debug!(alias = %join.target.alias, ?strategy, left_rows = tuples.len(), "joining");

        let index: Option<HashMap<ValueKey, Vec<&Arc<Record>>>> = match (&equi, strategy) {
            (Some(equi), JoinStrategy::HashJoin) => {
                let mut index: HashMap<ValueKey, Vec<&Arc<Record>>> = HashMap::new();
                for target in targets.iter() {
                    if let Some(value) = target.get(&equi.to_field).filter(|v| !v.is_null()) {
                        index.entry(ValueKey::from(value)).or_default().push(target);
                    }
                }
                Some(index)
            }
            _ => None,
        };

        let mut joined_rows = Vec::new();
        for tuple in tuples {
            let candidates: Vec<&Arc<Record>> = match (&equi, &index) {
                (Some(equi), Some(index)) => equi
                    .left_value(&tuple)
                    .and_then(|value| index.get(&ValueKey::from(value)))
                    .cloned()
                    .unwrap_or_default(),
                (Some(equi), None) => targets
                    .iter()
                    .filter(|target| equi.matches(&tuple, target))
                    .collect(),
                (None, _) => targets.iter().collect(),
            };

            let mut matched = false;
            for candidate in candidates {
                let mut joined = tuple.clone();
                joined[target_slot] = Some(candidate.clone());
                if let Some(on) = &join.on {
                    let env = Env::new(scope, &joined, outer);
                    if self.eval_predicate(on, &env, None, depth)? != Some(true) {
                        continue;
                    }
                }
                matched = true;
                joined_rows.push(joined);
                self.check_intermediate(joined_rows.len())?;
            }

            if !matched && join.kind == JoinKind::Left {
                joined_rows.push(tuple);
            }
        }
        Ok(joined_rows)
    }

    fn resolve_relation(
        &self,
        relation: &RelationRef,
        target: &Source,
        target_slot: usize,
        scope: &Scope,
    ) -> Result<EquiJoin, Error> {
        let from_slot = scope
            .slot(&relation.from_alias)
            .ok_or_else(|| Error::UnknownAlias(relation.from_alias.clone()))?;
        if from_slot >= target_slot {
            return Err(Error::InvalidQuery(format!(
                "relation {}.{} is joined before {} is declared",
                relation.from_alias, relation.name, relation.from_alias
            )));
        }

        let owner = &scope.get(from_slot).entity.name;
        let def = self.catalog().get_relation(owner, &relation.name)?;
        if def.to_entity != target.entity {
            return Err(Error::InvalidQuery(format!(
                "relation {owner}.{} targets {}, not {}",
                relation.name, def.to_entity, target.entity
            )));
        }

        Ok(EquiJoin {
            from_slot,
            from_field: def.from_field,
            to_field: def.to_field,
        })
    }
}

//! Bulk mutation descriptors.

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::expr::{Expr, PredicateExpr};
use crate::fingerprint::Fingerprint;
use crate::query::Source;

/// A `SET field = expr` clause. The expression may reference the target alias.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    /// Field being written.
    pub field: String,
    /// New value, evaluated per matching row.
    pub value: Expr,
}

impl Assignment {
    /// Create an assignment.
    pub fn new(field: impl Into<String>, value: Expr) -> Self {
        Self {
            field: field.into(),
            value,
        }
    }
}

/// Kind of bulk mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MutationKind {
    /// Update matching rows.
    Update { assignments: Vec<Assignment> },
    /// Delete matching rows.
    Delete,
}

/// A set-based update or delete over one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutationDescriptor {
    /// Target entity and alias.
    pub target: Source,
    /// Update or delete.
    pub kind: MutationKind,
    /// Row filter. `None` affects every row.
    pub filter: Option<PredicateExpr>,
}

impl MutationDescriptor {
    /// Create an update.
    pub fn update(target: Source, assignments: Vec<Assignment>) -> Self {
        Self {
            target,
            kind: MutationKind::Update { assignments },
            filter: None,
        }
    }

    /// Create a delete.
    pub fn delete(target: Source) -> Self {
        Self {
            target,
            kind: MutationKind::Delete,
            filter: None,
        }
    }

    /// Set the filter.
    pub fn with_filter(mut self, filter: PredicateExpr) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Whether this is a delete.
    pub fn is_delete(&self) -> bool {
        matches!(self.kind, MutationKind::Delete)
    }

    /// Structural fingerprint of this descriptor.
    pub fn fingerprint(&self) -> Result<Fingerprint, Error> {
        Fingerprint::of(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{ArithOp, CompareOp};

    #[test]
    fn test_update_builder() {
        let update = MutationDescriptor::update(
            Source::new("Member", "member"),
            vec![Assignment::new(
                "age",
                Expr::arith(ArithOp::Add, Expr::column("member", "age"), Expr::literal(1)),
            )],
        )
        .with_filter(PredicateExpr::Compare {
            op: CompareOp::Lt,
            lhs: Expr::column("member", "age"),
            rhs: Expr::literal(28),
        });

        assert!(!update.is_delete());
        assert!(update.filter.is_some());
        match &update.kind {
            MutationKind::Update { assignments } => assert_eq!(assignments[0].field, "age"),
            MutationKind::Delete => panic!("expected update"),
        }
    }

    #[test]
    fn test_delete_without_filter() {
        let delete = MutationDescriptor::delete(Source::new("Member", "member"));
        assert!(delete.is_delete());
        assert!(delete.filter.is_none());
    }
}

//! Expression and predicate trees.
//!
//! These are the untyped building blocks of a query descriptor. Typed
//! construction lives in the `ormq` crate; stores evaluate these trees
//! directly.
//!
//! Unlike the rest of the IR, expressions are recursive (`Box`/`Vec` of
//! themselves, and scalar subqueries embed whole descriptors), so they derive
//! serde only.

use serde::{Deserialize, Serialize};

use crate::query::QueryDescriptor;
use crate::value::Value;

/// Arithmetic operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

/// Scalar functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Function {
    /// Lowercase a string.
    Lower,
    /// Uppercase a string.
    Upper,
    /// Concatenate all arguments as strings.
    Concat,
    /// `replace(s, from, to)`.
    Replace,
    /// Render any value as a string.
    ToString,
    /// Character length of a string.
    Length,
    /// Trim surrounding whitespace.
    Trim,
    /// First non-null argument.
    Coalesce,
}

/// Aggregate function types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AggregateFunction {
    /// Count of rows (no argument) or non-null values.
    Count,
    /// Count of distinct non-null values.
    CountDistinct,
    /// Sum of numeric values.
    Sum,
    /// Average of numeric values.
    Avg,
    /// Minimum value.
    Min,
    /// Maximum value.
    Max,
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    /// Apply this operator to an ordering.
    pub fn matches(&self, ordering: std::cmp::Ordering) -> bool {
        match self {
            CompareOp::Eq => ordering.is_eq(),
            CompareOp::Ne => ordering.is_ne(),
            CompareOp::Lt => ordering.is_lt(),
            CompareOp::Le => ordering.is_le(),
            CompareOp::Gt => ordering.is_gt(),
            CompareOp::Ge => ordering.is_ge(),
        }
    }
}

/// A value-producing expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    /// A column of an aliased entity source.
    Column { alias: String, field: String },
    /// A constant.
    Literal(Value),
    /// Binary arithmetic.
    Arith {
        op: ArithOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// Scalar function call.
    Function { func: Function, args: Vec<Expr> },
    /// CASE expression.
    Case(Box<CaseExpr>),
    /// Aggregate over the current group (or the whole set).
    Aggregate {
        func: AggregateFunction,
        arg: Option<Box<Expr>>,
    },
    /// Scalar subquery; must yield at most one row with one item.
    Subquery(Box<QueryDescriptor>),
}

/// CASE expression body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseExpr {
    /// Operand for a simple case (`CASE x WHEN 10 ...`); `None` for a searched case.
    pub operand: Option<Expr>,
    /// Branches, evaluated in order.
    pub branches: Vec<CaseBranch>,
    /// Result when no branch matches.
    pub otherwise: Expr,
}

/// A single WHEN/THEN branch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseBranch {
    pub when: CaseCondition,
    pub then: Expr,
}

/// Condition of a CASE branch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CaseCondition {
    /// Simple case: operand equals this value.
    Equals(Expr),
    /// Searched case: predicate holds.
    Matches(PredicateExpr),
}

/// Set operand of an IN predicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InSet {
    /// Literal list of expressions.
    Values(Vec<Expr>),
    /// Values of the single projected item of a subquery.
    Subquery(Box<QueryDescriptor>),
}

/// Boolean-valued expression tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PredicateExpr {
    /// Constant truth value.
    Literal(bool),
    /// Binary comparison.
    Compare {
        op: CompareOp,
        lhs: Expr,
        rhs: Expr,
    },
    /// Inclusive range check.
    Between {
        expr: Expr,
        low: Expr,
        high: Expr,
        negated: bool,
    },
    /// Set membership.
    In {
        expr: Expr,
        set: InSet,
        negated: bool,
    },
    /// SQL LIKE pattern match.
    Like {
        expr: Expr,
        pattern: String,
        case_insensitive: bool,
        negated: bool,
    },
    /// NULL check.
    IsNull { expr: Expr, negated: bool },
    /// Subquery returns at least one row.
    Exists {
        query: Box<QueryDescriptor>,
        negated: bool,
    },
    /// All conditions must hold.
    And(Vec<PredicateExpr>),
    /// At least one condition must hold.
    Or(Vec<PredicateExpr>),
    /// Negation.
    Not(Box<PredicateExpr>),
}

impl Expr {
    /// Create a column reference.
    pub fn column(alias: impl Into<String>, field: impl Into<String>) -> Self {
        Expr::Column {
            alias: alias.into(),
            field: field.into(),
        }
    }

    /// Create a literal.
    pub fn literal(value: impl Into<Value>) -> Self {
        Expr::Literal(value.into())
    }

    /// Create an aggregate.
    pub fn aggregate(func: AggregateFunction, arg: Option<Expr>) -> Self {
        Expr::Aggregate {
            func,
            arg: arg.map(Box::new),
        }
    }

    /// Create a function call.
    pub fn function(func: Function, args: Vec<Expr>) -> Self {
        Expr::Function { func, args }
    }

    /// Create a binary arithmetic expression.
    pub fn arith(op: ArithOp, lhs: Expr, rhs: Expr) -> Self {
        Expr::Arith {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    /// Whether this expression itself is an aggregate call.
    pub fn is_aggregate(&self) -> bool {
        matches!(self, Expr::Aggregate { .. })
    }

    /// Whether an aggregate appears anywhere in this expression.
    ///
    /// Subqueries are their own aggregation scope and are not searched.
    pub fn contains_aggregate(&self) -> bool {
        match self {
            Expr::Aggregate { .. } => true,
            Expr::Column { .. } | Expr::Literal(_) | Expr::Subquery(_) => false,
            Expr::Arith { lhs, rhs, .. } => lhs.contains_aggregate() || rhs.contains_aggregate(),
            Expr::Function { args, .. } => args.iter().any(Expr::contains_aggregate),
            Expr::Case(case) => {
                case.operand.as_ref().is_some_and(Expr::contains_aggregate)
                    || case.otherwise.contains_aggregate()
                    || case.branches.iter().any(|b| {
                        b.then.contains_aggregate()
                            || match &b.when {
                                CaseCondition::Equals(e) => e.contains_aggregate(),
                                CaseCondition::Matches(p) => p.contains_aggregate(),
                            }
                    })
            }
        }
    }

    /// Visit every subquery embedded directly in this expression.
    pub fn for_each_subquery<'a>(&'a self, visit: &mut dyn FnMut(&'a QueryDescriptor)) {
        match self {
            Expr::Column { .. } | Expr::Literal(_) => {}
            Expr::Subquery(query) => visit(&**query),
            Expr::Arith { lhs, rhs, .. } => {
                lhs.for_each_subquery(visit);
                rhs.for_each_subquery(visit);
            }
            Expr::Function { args, .. } => {
                for arg in args {
                    arg.for_each_subquery(visit);
                }
            }
            Expr::Aggregate { arg, .. } => {
                if let Some(arg) = arg {
                    arg.for_each_subquery(visit);
                }
            }
            Expr::Case(case) => {
                if let Some(operand) = &case.operand {
                    operand.for_each_subquery(visit);
                }
                for branch in &case.branches {
                    match &branch.when {
                        CaseCondition::Equals(e) => e.for_each_subquery(visit),
                        CaseCondition::Matches(p) => p.for_each_subquery(visit),
                    }
                    branch.then.for_each_subquery(visit);
                }
                case.otherwise.for_each_subquery(visit);
            }
        }
    }

    /// The field name when this is a plain column reference.
    pub fn column_name(&self) -> Option<&str> {
        match self {
            Expr::Column { field, .. } => Some(field),
            _ => None,
        }
    }
}

impl PredicateExpr {
    /// Conjunction, flattening nested ANDs.
    pub fn and(self, other: PredicateExpr) -> Self {
        let mut parts = match self {
            PredicateExpr::And(parts) => parts,
            single => vec![single],
        };
        match other {
            PredicateExpr::And(more) => parts.extend(more),
            single => parts.push(single),
        }
        PredicateExpr::And(parts)
    }

    /// Disjunction, flattening nested ORs.
    pub fn or(self, other: PredicateExpr) -> Self {
        let mut parts = match self {
            PredicateExpr::Or(parts) => parts,
            single => vec![single],
        };
        match other {
            PredicateExpr::Or(more) => parts.extend(more),
            single => parts.push(single),
        }
        PredicateExpr::Or(parts)
    }

    /// Negation. Double negation collapses.
    pub fn negate(self) -> Self {
        match self {
            PredicateExpr::Not(inner) => *inner,
            other => PredicateExpr::Not(Box::new(other)),
        }
    }

    /// Whether an aggregate appears anywhere in this predicate.
    pub fn contains_aggregate(&self) -> bool {
        match self {
            PredicateExpr::Literal(_) | PredicateExpr::Exists { .. } => false,
            PredicateExpr::Compare { lhs, rhs, .. } => {
                lhs.contains_aggregate() || rhs.contains_aggregate()
            }
            PredicateExpr::Between {
                expr, low, high, ..
            } => expr.contains_aggregate() || low.contains_aggregate() || high.contains_aggregate(),
            PredicateExpr::In { expr, set, .. } => {
                expr.contains_aggregate()
                    || match set {
                        InSet::Values(values) => values.iter().any(Expr::contains_aggregate),
                        InSet::Subquery(_) => false,
                    }
            }
            PredicateExpr::Like { expr, .. } | PredicateExpr::IsNull { expr, .. } => {
                expr.contains_aggregate()
            }
            PredicateExpr::And(parts) | PredicateExpr::Or(parts) => {
                parts.iter().any(PredicateExpr::contains_aggregate)
            }
            PredicateExpr::Not(inner) => inner.contains_aggregate(),
        }
    }

    /// Visit every subquery embedded directly in this predicate.
    pub fn for_each_subquery<'a>(&'a self, visit: &mut dyn FnMut(&'a QueryDescriptor)) {
        match self {
            PredicateExpr::Literal(_) => {}
            PredicateExpr::Compare { lhs, rhs, .. } => {
                lhs.for_each_subquery(visit);
                rhs.for_each_subquery(visit);
            }
            PredicateExpr::Between {
                expr, low, high, ..
            } => {
                expr.for_each_subquery(visit);
                low.for_each_subquery(visit);
                high.for_each_subquery(visit);
            }
            PredicateExpr::In { expr, set, .. } => {
                expr.for_each_subquery(visit);
                match set {
                    InSet::Values(values) => {
                        for value in values {
                            value.for_each_subquery(visit);
                        }
                    }
                    InSet::Subquery(query) => visit(&**query),
                }
            }
            PredicateExpr::Like { expr, .. } | PredicateExpr::IsNull { expr, .. } => {
                expr.for_each_subquery(visit)
            }
            PredicateExpr::Exists { query, .. } => visit(&**query),
            PredicateExpr::And(parts) | PredicateExpr::Or(parts) => {
                for part in parts {
                    part.for_each_subquery(visit);
                }
            }
            PredicateExpr::Not(inner) => inner.for_each_subquery(visit),
        }
    }
}

/// Escape LIKE metacharacters so `literal` matches only itself.
pub fn escape_like(literal: &str) -> String {
    let mut escaped = String::with_capacity(literal.len());
    for c in literal.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn age_gt(n: i32) -> PredicateExpr {
        PredicateExpr::Compare {
            op: CompareOp::Gt,
            lhs: Expr::column("m", "age"),
            rhs: Expr::literal(n),
        }
    }

    #[test]
    fn test_and_flattens() {
        let p = age_gt(1).and(age_gt(2)).and(age_gt(3));
        match p {
            PredicateExpr::And(parts) => assert_eq!(parts.len(), 3),
            other => panic!("expected And, got {other:?}"),
        }
    }

    #[test]
    fn test_and_is_associative_structurally() {
        let left = age_gt(1).and(age_gt(2)).and(age_gt(3));
        let right = age_gt(1).and(age_gt(2).and(age_gt(3)));
        assert_eq!(left, right);
    }

    #[test]
    fn test_or_does_not_merge_and() {
        let p = age_gt(1).and(age_gt(2)).or(age_gt(3));
        match p {
            PredicateExpr::Or(parts) => {
                assert_eq!(parts.len(), 2);
                assert!(matches!(parts[0], PredicateExpr::And(_)));
            }
            other => panic!("expected Or, got {other:?}"),
        }
    }

    #[test]
    fn test_double_negation() {
        assert_eq!(age_gt(1).negate().negate(), age_gt(1));
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("50%_off"), "50\\%\\_off");
        assert_eq!(escape_like("plain"), "plain");
    }

    #[test]
    fn test_contains_aggregate() {
        let avg = Expr::aggregate(AggregateFunction::Avg, Some(Expr::column("m", "age")));
        assert!(avg.contains_aggregate());
        let scaled = Expr::arith(ArithOp::Mul, avg, Expr::literal(2));
        assert!(scaled.contains_aggregate());
        assert!(!Expr::column("m", "age").contains_aggregate());
    }
}

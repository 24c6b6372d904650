//! Boolean predicates and their composition.
//!
//! Predicates are immutable trees. Combining two predicates builds a new
//! one and flattens nested conjunctions and disjunctions. Optional
//! predicates model dynamic filters: an absent condition is the identity of
//! `and`/`or`, so a search form with no fields filled in composes to no
//! filter at all.

use ormq_proto::PredicateExpr;

/// A typed boolean condition.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    expr: PredicateExpr,
}

impl Predicate {
    /// Wrap an untyped predicate.
    pub fn new(expr: PredicateExpr) -> Self {
        Self { expr }
    }

    /// A constant condition.
    pub fn literal(value: bool) -> Self {
        Self::new(PredicateExpr::Literal(value))
    }

    pub fn and(self, other: Predicate) -> Self {
        Self::new(self.expr.and(other.expr))
    }

    pub fn or(self, other: Predicate) -> Self {
        Self::new(self.expr.or(other.expr))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        Self::new(self.expr.negate())
    }

    /// Build a predicate only when `value` is present.
    ///
    /// ```ignore
    /// let cond = Predicate::when(age_goe, |age| member.age.goe(age));
    /// ```
    pub fn when<V>(value: Option<V>, build: impl FnOnce(V) -> Predicate) -> Option<Predicate> {
        value.map(build)
    }

    /// Like [`Predicate::when`], treating an empty string as absent.
    pub fn when_not_empty<S: AsRef<str>>(
        value: Option<S>,
        build: impl FnOnce(S) -> Predicate,
    ) -> Option<Predicate> {
        value.filter(|s| !s.as_ref().is_empty()).map(build)
    }

    pub fn as_expr(&self) -> &PredicateExpr {
        &self.expr
    }

    pub fn into_expr(self) -> PredicateExpr {
        self.expr
    }
}

/// `and`/`or` over optional predicates, with absent as the identity.
pub trait OptionalPredicate {
    fn and_opt(self, other: Option<Predicate>) -> Option<Predicate>;

    fn or_opt(self, other: Option<Predicate>) -> Option<Predicate>;
}

impl OptionalPredicate for Option<Predicate> {
    fn and_opt(self, other: Option<Predicate>) -> Option<Predicate> {
        match (self, other) {
            (Some(a), Some(b)) => Some(a.and(b)),
            (a, b) => a.or(b),
        }
    }

    fn or_opt(self, other: Option<Predicate>) -> Option<Predicate> {
        match (self, other) {
            (Some(a), Some(b)) => Some(a.or(b)),
            (a, b) => a.or(b),
        }
    }
}

/// Conjunction of every present condition; `None` when all are absent.
pub fn all_of(conditions: impl IntoIterator<Item = Option<Predicate>>) -> Option<Predicate> {
    conditions
        .into_iter()
        .fold(None::<Predicate>, |acc, cond| acc.and_opt(cond))
}

/// Disjunction of every present condition; `None` when all are absent.
pub fn any_of(conditions: impl IntoIterator<Item = Option<Predicate>>) -> Option<Predicate> {
    conditions
        .into_iter()
        .fold(None::<Predicate>, |acc, cond| acc.or_opt(cond))
}

/// Mutable accumulator for filters assembled step by step.
#[derive(Debug, Clone, Default)]
pub struct BooleanBuilder {
    predicate: Option<Predicate>,
}

impl BooleanBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn and(&mut self, predicate: Predicate) -> &mut Self {
        self.and_opt(Some(predicate))
    }

    pub fn or(&mut self, predicate: Predicate) -> &mut Self {
        self.or_opt(Some(predicate))
    }

    pub fn and_opt(&mut self, predicate: Option<Predicate>) -> &mut Self {
        self.predicate = self.predicate.take().and_opt(predicate);
        self
    }

    pub fn or_opt(&mut self, predicate: Option<Predicate>) -> &mut Self {
        self.predicate = self.predicate.take().or_opt(predicate);
        self
    }

    /// Whether any condition was added.
    pub fn has_value(&self) -> bool {
        self.predicate.is_some()
    }

    pub fn build(&self) -> Option<Predicate> {
        self.predicate.clone()
    }
}

/// Anything accepted as a WHERE or HAVING condition. Absent filters are
/// skipped.
pub trait IntoFilter {
    fn into_filter(self) -> Option<Predicate>;
}

impl IntoFilter for Predicate {
    fn into_filter(self) -> Option<Predicate> {
        Some(self)
    }
}

impl IntoFilter for Option<Predicate> {
    fn into_filter(self) -> Option<Predicate> {
        self
    }
}

impl IntoFilter for BooleanBuilder {
    fn into_filter(self) -> Option<Predicate> {
        self.predicate
    }
}

impl IntoFilter for &BooleanBuilder {
    fn into_filter(self) -> Option<Predicate> {
        self.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::{StringExpr, TypedExpr};
    use crate::path::Path;
    use pretty_assertions::assert_eq;

    fn age() -> Path<i32> {
        Path::new("m", "age")
    }

    fn username() -> Path<String> {
        Path::new("m", "username")
    }

    #[test]
    fn test_and_flattens() {
        let p = age()
            .goe(10)
            .and(age().loe(40))
            .and(username().starts_with("member"));
        match p.into_expr() {
            PredicateExpr::And(parts) => assert_eq!(parts.len(), 3),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_absent_is_identity() {
        let p = username().eq("member1");
        assert_eq!(Some(p.clone()).and_opt(None), Some(p.clone()));
        assert_eq!(None::<Predicate>.and_opt(Some(p.clone())), Some(p.clone()));
        assert_eq!(None::<Predicate>.and_opt(None), None);
        assert_eq!(None::<Predicate>.or_opt(None), None);
    }

    #[test]
    fn test_all_of() {
        let p = age().eq(10);
        assert_eq!(all_of([Some(p.clone()), None]), Some(p.clone()));
        assert_eq!(all_of([None, None]), None);
        assert_eq!(
            all_of([Some(p.clone()), Some(username().eq("member1"))]),
            Some(p.and(username().eq("member1")))
        );
    }

    #[test]
    fn test_when_skips_absent_values() {
        assert!(Predicate::when(None::<i32>, |a| age().goe(a)).is_none());
        assert!(Predicate::when(Some(10), |a| age().goe(a)).is_some());
        assert!(Predicate::when_not_empty(Some(""), |n| username().eq(n)).is_none());
        assert!(Predicate::when_not_empty(Some("member1"), |n| username().eq(n)).is_some());
    }

    #[test]
    fn test_boolean_builder() {
        let mut builder = BooleanBuilder::new();
        assert!(!builder.has_value());
        builder.and_opt(None).and(age().goe(10)).or(age().eq(0));
        let built = builder.build().unwrap();
        assert!(matches!(built.as_expr(), PredicateExpr::Or(parts) if parts.len() == 2));
    }

    #[test]
    fn test_double_negation_collapses() {
        let p = age().eq(10);
        assert_eq!(p.clone().not().not(), p);
    }
}

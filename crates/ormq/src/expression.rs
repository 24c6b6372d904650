//! Typed expressions and the comparison/function vocabulary shared by paths,
//! computed expressions and scalar subqueries.

use std::fmt;
use std::marker::PhantomData;

use ormq_proto::{
    AggregateFunction, ArithOp, CaseBranch, CaseCondition, CaseExpr, CompareOp, Expr, Function,
    InSet, NullOrdering, OrderSpec, PredicateExpr, Value, escape_like,
};

use crate::path::Path;
use crate::predicate::Predicate;
use crate::query::SubQuery;
use crate::value::{Numeric, SqlType};

/// A computed expression of type `T`, optionally labelled for record binding.
pub struct Expression<T> {
    expr: Expr,
    label: Option<String>,
    _type: PhantomData<fn() -> T>,
}

impl<T> Expression<T> {
    /// Wrap an untyped expression.
    pub fn new(expr: Expr) -> Self {
        Self {
            expr,
            label: None,
            _type: PhantomData,
        }
    }

    /// The label given with [`TypedExpr::as_`], if any.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }
}

impl<T> Clone for Expression<T> {
    fn clone(&self) -> Self {
        Self {
            expr: self.expr.clone(),
            label: self.label.clone(),
            _type: PhantomData,
        }
    }
}

impl<T> fmt::Debug for Expression<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Expression")
            .field("expr", &self.expr)
            .field("label", &self.label)
            .finish()
    }
}

impl<T: SqlType> TypedExpr for Expression<T> {
    type Value = T;

    fn to_expr(&self) -> Expr {
        self.expr.clone()
    }
}

/// A value usable where a `T` is expected: a literal, a path, an expression
/// or a scalar subquery.
pub trait Operand<T> {
    fn into_expr(self) -> Expr;
}

macro_rules! literal_operand {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Operand<$ty> for $ty {
                fn into_expr(self) -> Expr {
                    Expr::Literal(Value::from(self))
                }
            }
        )*
    };
}

literal_operand!(bool, i32, i64, f64, String);

impl Operand<String> for &str {
    fn into_expr(self) -> Expr {
        Expr::Literal(Value::from(self))
    }
}

impl Operand<String> for &String {
    fn into_expr(self) -> Expr {
        Expr::Literal(Value::from(self.as_str()))
    }
}

macro_rules! typed_operand {
    ($($ty:ident),* $(,)?) => {
        $(
            impl<T: SqlType> Operand<T> for $ty<T> {
                fn into_expr(self) -> Expr {
                    self.to_expr()
                }
            }

            impl<T: SqlType> Operand<T> for &$ty<T> {
                fn into_expr(self) -> Expr {
                    self.to_expr()
                }
            }
        )*
    };
}

typed_operand!(Path, Expression, SubQuery);

/// The right-hand side of `in_`: a list of operands or a subquery.
pub trait InOperand<T> {
    fn into_set(self) -> InSet;
}

impl<T, V: Operand<T>> InOperand<T> for Vec<V> {
    fn into_set(self) -> InSet {
        InSet::Values(self.into_iter().map(Operand::into_expr).collect())
    }
}

impl<T, V: Operand<T>, const N: usize> InOperand<T> for [V; N] {
    fn into_set(self) -> InSet {
        InSet::Values(self.into_iter().map(Operand::into_expr).collect())
    }
}

impl<T: SqlType> InOperand<T> for SubQuery<T> {
    fn into_set(self) -> InSet {
        InSet::Subquery(Box::new(self.into_descriptor()))
    }
}

/// An ORDER BY item built with [`TypedExpr::asc`] or [`TypedExpr::desc`].
#[derive(Debug, Clone, PartialEq)]
pub struct OrderSpecifier {
    spec: OrderSpec,
}

impl OrderSpecifier {
    /// Order NULLs before all values.
    pub fn nulls_first(mut self) -> Self {
        self.spec.nulls = NullOrdering::First;
        self
    }

    /// Order NULLs after all values.
    pub fn nulls_last(mut self) -> Self {
        self.spec.nulls = NullOrdering::Last;
        self
    }

    pub fn into_spec(self) -> OrderSpec {
        self.spec
    }
}

fn compare(op: CompareOp, lhs: Expr, rhs: Expr) -> Predicate {
    Predicate::new(PredicateExpr::Compare { op, lhs, rhs })
}

/// Operations available on every typed expression.
///
/// Nothing here evaluates: each method builds a new tree.
pub trait TypedExpr {
    type Value: SqlType;

    fn to_expr(&self) -> Expr;

    fn eq(&self, rhs: impl Operand<Self::Value>) -> Predicate {
        compare(CompareOp::Eq, self.to_expr(), rhs.into_expr())
    }

    fn ne(&self, rhs: impl Operand<Self::Value>) -> Predicate {
        compare(CompareOp::Ne, self.to_expr(), rhs.into_expr())
    }

    fn gt(&self, rhs: impl Operand<Self::Value>) -> Predicate {
        compare(CompareOp::Gt, self.to_expr(), rhs.into_expr())
    }

    /// Greater than or equal.
    fn goe(&self, rhs: impl Operand<Self::Value>) -> Predicate {
        compare(CompareOp::Ge, self.to_expr(), rhs.into_expr())
    }

    fn lt(&self, rhs: impl Operand<Self::Value>) -> Predicate {
        compare(CompareOp::Lt, self.to_expr(), rhs.into_expr())
    }

    /// Less than or equal.
    fn loe(&self, rhs: impl Operand<Self::Value>) -> Predicate {
        compare(CompareOp::Le, self.to_expr(), rhs.into_expr())
    }

    /// Inclusive range.
    fn between(
        &self,
        low: impl Operand<Self::Value>,
        high: impl Operand<Self::Value>,
    ) -> Predicate {
        Predicate::new(PredicateExpr::Between {
            expr: self.to_expr(),
            low: low.into_expr(),
            high: high.into_expr(),
            negated: false,
        })
    }

    fn in_(&self, set: impl InOperand<Self::Value>) -> Predicate {
        Predicate::new(PredicateExpr::In {
            expr: self.to_expr(),
            set: set.into_set(),
            negated: false,
        })
    }

    fn not_in(&self, set: impl InOperand<Self::Value>) -> Predicate {
        Predicate::new(PredicateExpr::In {
            expr: self.to_expr(),
            set: set.into_set(),
            negated: true,
        })
    }

    fn is_null(&self) -> Predicate {
        Predicate::new(PredicateExpr::IsNull {
            expr: self.to_expr(),
            negated: false,
        })
    }

    fn is_not_null(&self) -> Predicate {
        Predicate::new(PredicateExpr::IsNull {
            expr: self.to_expr(),
            negated: true,
        })
    }

    fn asc(&self) -> OrderSpecifier {
        OrderSpecifier {
            spec: OrderSpec::asc(self.to_expr()),
        }
    }

    fn desc(&self) -> OrderSpecifier {
        OrderSpecifier {
            spec: OrderSpec::desc(self.to_expr()),
        }
    }

    /// Label this expression so it binds to the record slot `label`.
    fn as_(&self, label: impl Into<String>) -> Expression<Self::Value> {
        Expression {
            expr: self.to_expr(),
            label: Some(label.into()),
            _type: PhantomData,
        }
    }

    /// `COUNT(x)`: non-null values.
    fn count(&self) -> Expression<i64> {
        Expression::new(Expr::aggregate(
            AggregateFunction::Count,
            Some(self.to_expr()),
        ))
    }

    fn count_distinct(&self) -> Expression<i64> {
        Expression::new(Expr::aggregate(
            AggregateFunction::CountDistinct,
            Some(self.to_expr()),
        ))
    }

    fn max(&self) -> Expression<Self::Value> {
        Expression::new(Expr::aggregate(AggregateFunction::Max, Some(self.to_expr())))
    }

    fn min(&self) -> Expression<Self::Value> {
        Expression::new(Expr::aggregate(AggregateFunction::Min, Some(self.to_expr())))
    }

    /// First non-null of this and `fallback`.
    fn coalesce(&self, fallback: impl Operand<Self::Value>) -> Expression<Self::Value> {
        Expression::new(Expr::function(
            Function::Coalesce,
            vec![self.to_expr(), fallback.into_expr()],
        ))
    }

    /// The value rendered as a string.
    fn string_value(&self) -> Expression<String> {
        Expression::new(Expr::function(Function::ToString, vec![self.to_expr()]))
    }

    /// Start a simple CASE over this expression.
    fn when<R: SqlType>(&self, value: impl Operand<Self::Value>) -> SimpleCaseWhen<Self::Value, R> {
        SimpleCaseWhen {
            case: SimpleCase {
                operand: self.to_expr(),
                branches: Vec::new(),
                _types: PhantomData,
            },
            when: value.into_expr(),
        }
    }
}

impl<X: TypedExpr + ?Sized> TypedExpr for &X {
    type Value = X::Value;

    fn to_expr(&self) -> Expr {
        (**self).to_expr()
    }
}

/// Arithmetic and numeric aggregates.
pub trait NumericExpr: TypedExpr
where
    Self::Value: Numeric,
{
    fn sum(&self) -> Expression<<Self::Value as Numeric>::Sum> {
        Expression::new(Expr::aggregate(AggregateFunction::Sum, Some(self.to_expr())))
    }

    fn avg(&self) -> Expression<f64> {
        Expression::new(Expr::aggregate(AggregateFunction::Avg, Some(self.to_expr())))
    }

    /// The same expression typed as `f64`, for comparing with averages.
    /// Stores compare numbers across widths, so no conversion is emitted.
    fn as_f64(&self) -> Expression<f64> {
        Expression::new(self.to_expr())
    }

    fn add(&self, rhs: impl Operand<Self::Value>) -> Expression<Self::Value> {
        Expression::new(Expr::arith(ArithOp::Add, self.to_expr(), rhs.into_expr()))
    }

    fn subtract(&self, rhs: impl Operand<Self::Value>) -> Expression<Self::Value> {
        Expression::new(Expr::arith(ArithOp::Sub, self.to_expr(), rhs.into_expr()))
    }

    fn multiply(&self, rhs: impl Operand<Self::Value>) -> Expression<Self::Value> {
        Expression::new(Expr::arith(ArithOp::Mul, self.to_expr(), rhs.into_expr()))
    }

    /// Division; integer operands truncate.
    fn divide(&self, rhs: impl Operand<Self::Value>) -> Expression<Self::Value> {
        Expression::new(Expr::arith(ArithOp::Div, self.to_expr(), rhs.into_expr()))
    }

    fn modulo(&self, rhs: impl Operand<Self::Value>) -> Expression<Self::Value> {
        Expression::new(Expr::arith(ArithOp::Mod, self.to_expr(), rhs.into_expr()))
    }
}

impl<X: TypedExpr + ?Sized> NumericExpr for X where X::Value: Numeric {}

/// Pattern matching and string functions.
pub trait StringExpr: TypedExpr<Value = String> {
    /// SQL LIKE with `%` and `_` wildcards; `\` escapes.
    fn like(&self, pattern: impl Into<String>) -> Predicate {
        like(self.to_expr(), pattern.into(), false)
    }

    fn like_ignore_case(&self, pattern: impl Into<String>) -> Predicate {
        like(self.to_expr(), pattern.into(), true)
    }

    fn not_like(&self, pattern: impl Into<String>) -> Predicate {
        like(self.to_expr(), pattern.into(), false).not()
    }

    /// Substring match; `needle` is taken literally.
    fn contains(&self, needle: &str) -> Predicate {
        like(self.to_expr(), format!("%{}%", escape_like(needle)), false)
    }

    fn starts_with(&self, prefix: &str) -> Predicate {
        like(self.to_expr(), format!("{}%", escape_like(prefix)), false)
    }

    fn ends_with(&self, suffix: &str) -> Predicate {
        like(self.to_expr(), format!("%{}", escape_like(suffix)), false)
    }

    fn lower(&self) -> Expression<String> {
        Expression::new(Expr::function(Function::Lower, vec![self.to_expr()]))
    }

    fn upper(&self) -> Expression<String> {
        Expression::new(Expr::function(Function::Upper, vec![self.to_expr()]))
    }

    fn trim(&self) -> Expression<String> {
        Expression::new(Expr::function(Function::Trim, vec![self.to_expr()]))
    }

    /// Length in characters.
    fn length(&self) -> Expression<i32> {
        Expression::new(Expr::function(Function::Length, vec![self.to_expr()]))
    }

    fn concat(&self, rhs: impl Operand<String>) -> Expression<String> {
        Expression::new(Expr::function(
            Function::Concat,
            vec![self.to_expr(), rhs.into_expr()],
        ))
    }

    fn replace(&self, from: impl Operand<String>, to: impl Operand<String>) -> Expression<String> {
        Expression::new(Expr::function(
            Function::Replace,
            vec![self.to_expr(), from.into_expr(), to.into_expr()],
        ))
    }
}

impl<X: TypedExpr<Value = String> + ?Sized> StringExpr for X {}

fn like(expr: Expr, pattern: String, case_insensitive: bool) -> Predicate {
    Predicate::new(PredicateExpr::Like {
        expr,
        pattern,
        case_insensitive,
        negated: false,
    })
}

/// A searched CASE: `CASE WHEN p THEN x ... ELSE y END`.
///
/// ```ignore
/// let age_band: Expression<String> = CaseBuilder::new()
///     .when(member.age.between(0, 20)).then("0~20")
///     .when(member.age.between(21, 30)).then("21~30")
///     .otherwise("other");
/// ```
pub struct CaseBuilder<R> {
    branches: Vec<CaseBranch>,
    _result: PhantomData<fn() -> R>,
}

/// A searched CASE waiting for the THEN of its latest WHEN.
pub struct CaseWhen<R> {
    case: CaseBuilder<R>,
    when: PredicateExpr,
}

impl<R: SqlType> CaseBuilder<R> {
    pub fn new() -> Self {
        Self {
            branches: Vec::new(),
            _result: PhantomData,
        }
    }

    pub fn when(self, condition: Predicate) -> CaseWhen<R> {
        CaseWhen {
            case: self,
            when: condition.into_expr(),
        }
    }

    pub fn otherwise(self, value: impl Operand<R>) -> Expression<R> {
        Expression::new(Expr::Case(Box::new(CaseExpr {
            operand: None,
            branches: self.branches,
            otherwise: value.into_expr(),
        })))
    }

    /// Close the CASE with NULL as the fallback.
    pub fn end(self) -> Expression<R> {
        Expression::new(Expr::Case(Box::new(CaseExpr {
            operand: None,
            branches: self.branches,
            otherwise: Expr::Literal(Value::Null),
        })))
    }
}

impl<R: SqlType> Default for CaseBuilder<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: SqlType> CaseWhen<R> {
    pub fn then(mut self, value: impl Operand<R>) -> CaseBuilder<R> {
        self.case.branches.push(CaseBranch {
            when: CaseCondition::Matches(self.when),
            then: value.into_expr(),
        });
        self.case
    }
}

/// A simple CASE over an operand of type `V` producing `R`.
pub struct SimpleCase<V, R> {
    operand: Expr,
    branches: Vec<CaseBranch>,
    _types: PhantomData<fn() -> (V, R)>,
}

/// A simple CASE waiting for the THEN of its latest WHEN.
pub struct SimpleCaseWhen<V, R> {
    case: SimpleCase<V, R>,
    when: Expr,
}

impl<V: SqlType, R: SqlType> SimpleCaseWhen<V, R> {
    pub fn then(mut self, value: impl Operand<R>) -> SimpleCase<V, R> {
        self.case.branches.push(CaseBranch {
            when: CaseCondition::Equals(self.when),
            then: value.into_expr(),
        });
        self.case
    }
}

impl<V: SqlType, R: SqlType> SimpleCase<V, R> {
    pub fn when(self, value: impl Operand<V>) -> SimpleCaseWhen<V, R> {
        SimpleCaseWhen {
            case: self,
            when: value.into_expr(),
        }
    }

    pub fn otherwise(self, value: impl Operand<R>) -> Expression<R> {
        Expression::new(Expr::Case(Box::new(CaseExpr {
            operand: Some(self.operand),
            branches: self.branches,
            otherwise: value.into_expr(),
        })))
    }

    pub fn end(self) -> Expression<R> {
        Expression::new(Expr::Case(Box::new(CaseExpr {
            operand: Some(self.operand),
            branches: self.branches,
            otherwise: Expr::Literal(Value::Null),
        })))
    }
}

/// Free-standing expression constructors.
pub struct Expressions;

impl Expressions {
    /// A literal projected or compared like any other expression.
    pub fn constant<T: SqlType>(value: T) -> Expression<T> {
        Expression::new(Expr::Literal(value.into()))
    }

    /// `COUNT(*)`.
    pub fn count_all() -> Expression<i64> {
        Expression::new(Expr::aggregate(AggregateFunction::Count, None))
    }
}

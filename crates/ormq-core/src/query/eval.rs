//! Expression and predicate evaluation.
//!
//! Predicates use SQL three-valued logic: `Ok(None)` is UNKNOWN, which
//! filters treat as false.

use std::cmp::Ordering;

use ormq_proto::{
    ArithOp, CaseCondition, CaseExpr, CompareOp, Datum, Expr, Function, InSet, PredicateExpr,
    QueryDescriptor, Row, Value,
};

use super::aggregate;
use super::executor::Evaluator;
use super::filter::like_match;
use super::scope::{Env, Tuple};
use crate::error::Error;

impl Evaluator<'_> {
    /// Evaluate an expression for one row, or for one group when `group` is
    /// set. Plain columns in a group read the group's first row.
    pub(crate) fn eval_expr(
        &self,
        expr: &Expr,
        env: &Env<'_>,
        group: Option<&[Tuple]>,
        depth: usize,
    ) -> Result<Value, Error> {
        match expr {
            Expr::Column { alias, field } => env.column(alias, field),
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Arith { op, lhs, rhs } => {
                let lhs = self.eval_expr(lhs, env, group, depth)?;
                let rhs = self.eval_expr(rhs, env, group, depth)?;
                arithmetic(*op, &lhs, &rhs)
            }
            Expr::Function { func, args } => {
                let values = args
                    .iter()
                    .map(|arg| self.eval_expr(arg, env, group, depth))
                    .collect::<Result<Vec<_>, _>>()?;
                apply_function(*func, values)
            }
            Expr::Case(case) => self.eval_case(case, env, group, depth),
            Expr::Aggregate { func, arg } => {
                let rows = group.ok_or_else(|| {
                    Error::InvalidQuery("aggregate used outside of a grouped query".into())
                })?;
                let mut values = Vec::with_capacity(rows.len());
                for tuple in rows {
                    let row_env = Env::new(env.scope, tuple, env.outer);
                    values.push(match arg {
                        Some(arg) => Some(self.eval_expr(arg, &row_env, None, depth)?),
                        None => None,
                    });
                }
                aggregate::compute(*func, &values)
            }
            Expr::Subquery(query) => self.scalar_subquery(query, env, depth),
        }
    }

    /// Evaluate a predicate to TRUE, FALSE or UNKNOWN.
    pub(crate) fn eval_predicate(
        &self,
        predicate: &PredicateExpr,
        env: &Env<'_>,
        group: Option<&[Tuple]>,
        depth: usize,
    ) -> Result<Option<bool>, Error> {
        match predicate {
            PredicateExpr::Literal(value) => Ok(Some(*value)),
            PredicateExpr::Compare { op, lhs, rhs } => {
                let lhs = self.eval_expr(lhs, env, group, depth)?;
                let rhs = self.eval_expr(rhs, env, group, depth)?;
                compare(*op, &lhs, &rhs)
            }
            PredicateExpr::Between {
                expr,
                low,
                high,
                negated,
            } => {
                let value = self.eval_expr(expr, env, group, depth)?;
                let low = self.eval_expr(low, env, group, depth)?;
                let high = self.eval_expr(high, env, group, depth)?;
                let above = compare(CompareOp::Ge, &value, &low)?;
                let below = compare(CompareOp::Le, &value, &high)?;
                Ok(and3(above, below).map(|b| b != *negated))
            }
            PredicateExpr::In { expr, set, negated } => {
                let value = self.eval_expr(expr, env, group, depth)?;
                let candidates = match set {
                    InSet::Values(exprs) => exprs
                        .iter()
                        .map(|e| self.eval_expr(e, env, group, depth))
                        .collect::<Result<Vec<_>, _>>()?,
                    InSet::Subquery(query) => self
                        .run(query, Some(env), depth + 1)?
                        .iter()
                        .map(single_value)
                        .collect::<Result<Vec<_>, _>>()?,
                };
                Ok(in_set(&value, &candidates)?.map(|b| b != *negated))
            }
            PredicateExpr::Like {
                expr,
                pattern,
                case_insensitive,
                negated,
            } => match self.eval_expr(expr, env, group, depth)? {
                Value::Null => Ok(None),
                Value::String(s) => Ok(Some(like_match(&s, pattern, *case_insensitive) != *negated)),
                other => Err(Error::TypeMismatch(format!(
                    "LIKE requires a string, got {other}"
                ))),
            },
            PredicateExpr::IsNull { expr, negated } => {
                let value = self.eval_expr(expr, env, group, depth)?;
                Ok(Some(value.is_null() != *negated))
            }
            PredicateExpr::Exists { query, negated } => {
                let rows = self.run(query, Some(env), depth + 1)?;
                Ok(Some(!rows.is_empty() != *negated))
            }
            PredicateExpr::And(parts) => {
                let mut result = Some(true);
                for part in parts {
                    match self.eval_predicate(part, env, group, depth)? {
                        Some(false) => return Ok(Some(false)),
                        None => result = None,
                        Some(true) => {}
                    }
                }
                Ok(result)
            }
            PredicateExpr::Or(parts) => {
                let mut result = Some(false);
                for part in parts {
                    match self.eval_predicate(part, env, group, depth)? {
                        Some(true) => return Ok(Some(true)),
                        None => result = None,
                        Some(false) => {}
                    }
                }
                Ok(result)
            }
            PredicateExpr::Not(inner) => {
                Ok(self.eval_predicate(inner, env, group, depth)?.map(|b| !b))
            }
        }
    }

    fn eval_case(
        &self,
        case: &CaseExpr,
        env: &Env<'_>,
        group: Option<&[Tuple]>,
        depth: usize,
    ) -> Result<Value, Error> {
        let operand = match &case.operand {
            Some(expr) => Some(self.eval_expr(expr, env, group, depth)?),
            None => None,
        };

        for branch in &case.branches {
            let hit = match (&branch.when, &operand) {
                (CaseCondition::Equals(expr), Some(operand)) => {
                    let value = self.eval_expr(expr, env, group, depth)?;
                    operand.sql_eq(&value) == Some(true)
                }
                (CaseCondition::Matches(predicate), _) => {
                    self.eval_predicate(predicate, env, group, depth)? == Some(true)
                }
                (CaseCondition::Equals(_), None) => {
                    return Err(Error::InvalidQuery(
                        "value branch in a case without operand".into(),
                    ))
                }
            };
            if hit {
                return self.eval_expr(&branch.then, env, group, depth);
            }
        }
        self.eval_expr(&case.otherwise, env, group, depth)
    }

    fn scalar_subquery(
        &self,
        query: &QueryDescriptor,
        env: &Env<'_>,
        depth: usize,
    ) -> Result<Value, Error> {
        let rows = self.run(query, Some(env), depth + 1)?;
        match rows.as_slice() {
            [] => Ok(Value::Null),
            [row] => single_value(row),
            _ => Err(Error::SubqueryCardinality { rows: rows.len() }),
        }
    }
}

/// The only value of a one-item row.
fn single_value(row: &Row) -> Result<Value, Error> {
    match row.data.as_slice() {
        [Datum::Value(value)] => Ok(value.clone()),
        _ => Err(Error::InvalidQuery(
            "subquery must project exactly one value".into(),
        )),
    }
}

fn compare(op: CompareOp, lhs: &Value, rhs: &Value) -> Result<Option<bool>, Error> {
    if lhs.is_null() || rhs.is_null() {
        return Ok(None);
    }
    match lhs.compare(rhs) {
        Some(ordering) => Ok(Some(op.matches(ordering))),
        None => Err(Error::TypeMismatch(format!(
            "cannot compare {lhs} with {rhs}"
        ))),
    }
}

fn and3(a: Option<bool>, b: Option<bool>) -> Option<bool> {
    match (a, b) {
        (Some(false), _) | (_, Some(false)) => Some(false),
        (Some(true), Some(true)) => Some(true),
        _ => None,
    }
}

fn in_set(value: &Value, candidates: &[Value]) -> Result<Option<bool>, Error> {
    if value.is_null() {
        return Ok(None);
    }
    let mut saw_null = false;
    for candidate in candidates {
        if candidate.is_null() {
            saw_null = true;
            continue;
        }
        match value.compare(candidate) {
            Some(Ordering::Equal) => return Ok(Some(true)),
            Some(_) => {}
            None => {
                return Err(Error::TypeMismatch(format!(
                    "cannot compare {value} with {candidate}"
                )))
            }
        }
    }
    Ok(if saw_null { None } else { Some(false) })
}

fn arithmetic(op: ArithOp, lhs: &Value, rhs: &Value) -> Result<Value, Error> {
    if lhs.is_null() || rhs.is_null() {
        return Ok(Value::Null);
    }
    match (lhs, rhs) {
        (Value::Int32(a), Value::Int32(b)) => {
            let result = integer_op(op, *a as i64, *b as i64)?;
            Ok(i32::try_from(result)
                .map(Value::Int32)
                .unwrap_or(Value::Int64(result)))
        }
        (Value::Int32(_) | Value::Int64(_), Value::Int32(_) | Value::Int64(_)) => {
            let (a, b) = (lhs.as_i64(), rhs.as_i64());
            match (a, b) {
                (Some(a), Some(b)) => integer_op(op, a, b).map(Value::Int64),
                _ => Err(Error::TypeMismatch("integer operands expected".into())),
            }
        }
        _ => match (lhs.as_f64(), rhs.as_f64()) {
            (Some(a), Some(b)) => float_op(op, a, b),
            _ => Err(Error::TypeMismatch(format!(
                "arithmetic requires numbers, got {lhs} and {rhs}"
            ))),
        },
    }
}

fn integer_op(op: ArithOp, a: i64, b: i64) -> Result<i64, Error> {
    if matches!(op, ArithOp::Div | ArithOp::Mod) && b == 0 {
        return Err(Error::InvalidQuery("division by zero".into()));
    }
    let result = match op {
        ArithOp::Add => a.checked_add(b),
        ArithOp::Sub => a.checked_sub(b),
        ArithOp::Mul => a.checked_mul(b),
        ArithOp::Div => a.checked_div(b),
        ArithOp::Mod => a.checked_rem(b),
    };
    result.ok_or_else(|| Error::TypeMismatch("integer overflow".into()))
}

fn float_op(op: ArithOp, a: f64, b: f64) -> Result<Value, Error> {
    if matches!(op, ArithOp::Div | ArithOp::Mod) && b == 0.0 {
        return Err(Error::InvalidQuery("division by zero".into()));
    }
    Ok(Value::Float64(match op {
        ArithOp::Add => a + b,
        ArithOp::Sub => a - b,
        ArithOp::Mul => a * b,
        ArithOp::Div => a / b,
        ArithOp::Mod => a % b,
    }))
}

fn apply_function(func: Function, args: Vec<Value>) -> Result<Value, Error> {
    match func {
        Function::Coalesce => Ok(args
            .into_iter()
            .find(|v| !v.is_null())
            .unwrap_or(Value::Null)),
        Function::Concat => {
            if args.iter().any(Value::is_null) {
                return Ok(Value::Null);
            }
            Ok(Value::String(args.iter().map(Value::to_string).collect()))
        }
        Function::ToString => match unary(func, args)? {
            Value::Null => Ok(Value::Null),
            value => Ok(Value::String(value.to_string())),
        },
        Function::Lower => map_string(func, args, |s| Value::String(s.to_lowercase())),
        Function::Upper => map_string(func, args, |s| Value::String(s.to_uppercase())),
        Function::Trim => map_string(func, args, |s| Value::String(s.trim().to_string())),
        Function::Length => map_string(func, args, |s| {
            Value::Int32(i32::try_from(s.chars().count()).unwrap_or(i32::MAX))
        }),
        Function::Replace => {
            let [subject, from, to]: [Value; 3] = args.try_into().map_err(|_| {
                Error::InvalidQuery("replace takes three arguments".into())
            })?;
            match (subject, from, to) {
                (Value::Null, _, _) | (_, Value::Null, _) | (_, _, Value::Null) => Ok(Value::Null),
                (Value::String(s), Value::String(from), Value::String(to)) => {
                    Ok(Value::String(s.replace(&from, &to)))
                }
                _ => Err(Error::TypeMismatch("replace requires strings".into())),
            }
        }
    }
}

fn unary(func: Function, args: Vec<Value>) -> Result<Value, Error> {
    let [value]: [Value; 1] = args
        .try_into()
        .map_err(|_| Error::InvalidQuery(format!("{func:?} takes one argument")))?;
    Ok(value)
}

fn map_string(
    func: Function,
    args: Vec<Value>,
    f: impl FnOnce(&str) -> Value,
) -> Result<Value, Error> {
    match unary(func, args)? {
        Value::Null => Ok(Value::Null),
        Value::String(s) => Ok(f(&s)),
        other => Err(Error::TypeMismatch(format!(
            "{func:?} requires a string, got {other}"
        ))),
    }
}

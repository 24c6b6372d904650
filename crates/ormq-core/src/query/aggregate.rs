//! Aggregate function evaluation over a group of values.

use std::cmp::Ordering;
use std::collections::HashSet;

use ormq_proto::{AggregateFunction, Value};

use super::key::ValueKey;
use crate::error::Error;

/// Fold one group's argument values into an aggregate result.
///
/// `values` holds one entry per row of the group; `None` means the aggregate
/// has no argument (`COUNT(*)`). NULL arguments are skipped by every
/// function, and SUM/AVG/MIN/MAX over no values yield NULL.
pub fn compute(func: AggregateFunction, values: &[Option<Value>]) -> Result<Value, Error> {
    let non_null = values.iter().filter_map(|v| match v {
        Some(Value::Null) => None,
        Some(v) => Some(v),
        None => None,
    });

    match func {
        AggregateFunction::Count => {
            let count = if values.iter().all(Option::is_none) {
                values.len()
            } else {
                non_null.count()
            };
            Ok(Value::Int64(count as i64))
        }
        AggregateFunction::CountDistinct => {
            let distinct: HashSet<ValueKey> = non_null.map(ValueKey::from).collect();
            Ok(Value::Int64(distinct.len() as i64))
        }
        AggregateFunction::Sum => sum(non_null),
        AggregateFunction::Avg => {
            let mut total = 0.0;
            let mut count = 0usize;
            for value in non_null {
                total += numeric(value, "AVG")?;
                count += 1;
            }
            Ok(if count > 0 {
                Value::Float64(total / count as f64)
            } else {
                Value::Null
            })
        }
        AggregateFunction::Min => extreme(non_null, Ordering::Less),
        AggregateFunction::Max => extreme(non_null, Ordering::Greater),
    }
}

fn numeric(value: &Value, func: &str) -> Result<f64, Error> {
    value
        .as_f64()
        .ok_or_else(|| Error::TypeMismatch(format!("{func} requires numeric values, got {value}")))
}

fn sum<'a>(values: impl Iterator<Item = &'a Value>) -> Result<Value, Error> {
    let mut int_total: i64 = 0;
    let mut float_total: f64 = 0.0;
    let mut saw_float = false;
    let mut saw_any = false;

    for value in values {
        saw_any = true;
        match value {
            Value::Int32(_) | Value::Int64(_) => {
                let v = value.as_i64().unwrap_or_default();
                int_total = int_total
                    .checked_add(v)
                    .ok_or_else(|| Error::TypeMismatch("SUM overflowed int64".into()))?;
            }
            other => {
                saw_float = true;
                float_total += numeric(other, "SUM")?;
            }
        }
    }

    Ok(match (saw_any, saw_float) {
        (false, _) => Value::Null,
        (true, false) => Value::Int64(int_total),
        (true, true) => Value::Float64(float_total + int_total as f64),
    })
}

fn extreme<'a>(
    values: impl Iterator<Item = &'a Value>,
    keep: Ordering,
) -> Result<Value, Error> {
    let mut best: Option<&Value> = None;
    for value in values {
        best = match best {
            None => Some(value),
            Some(current) => match value.compare(current) {
                Some(ordering) if ordering == keep => Some(value),
                Some(_) => Some(current),
                None => {
                    return Err(Error::TypeMismatch(format!(
                        "cannot compare {value} with {current}"
                    )))
                }
            },
        };
    }
    Ok(best.cloned().unwrap_or(Value::Null))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ages() -> Vec<Option<Value>> {
        [10, 20, 30, 40]
            .into_iter()
            .map(|a| Some(Value::Int32(a)))
            .collect()
    }

    #[test]
    fn test_basic_aggregates() {
        let ages = ages();
        assert_eq!(compute(AggregateFunction::Count, &ages).unwrap(), Value::Int64(4));
        assert_eq!(compute(AggregateFunction::Sum, &ages).unwrap(), Value::Int64(100));
        assert_eq!(compute(AggregateFunction::Avg, &ages).unwrap(), Value::Float64(25.0));
        assert_eq!(compute(AggregateFunction::Max, &ages).unwrap(), Value::Int32(40));
        assert_eq!(compute(AggregateFunction::Min, &ages).unwrap(), Value::Int32(10));
    }

    #[test]
    fn test_count_star_counts_rows() {
        let rows = vec![None, None, None];
        assert_eq!(compute(AggregateFunction::Count, &rows).unwrap(), Value::Int64(3));
    }

    #[test]
    fn test_nulls_are_skipped() {
        let values = vec![Some(Value::Null), Some(Value::Int32(5)), Some(Value::Null)];
        assert_eq!(compute(AggregateFunction::Count, &values).unwrap(), Value::Int64(1));
        assert_eq!(compute(AggregateFunction::Avg, &values).unwrap(), Value::Float64(5.0));
    }

    #[test]
    fn test_empty_group() {
        assert_eq!(compute(AggregateFunction::Count, &[]).unwrap(), Value::Int64(0));
        assert_eq!(compute(AggregateFunction::Sum, &[]).unwrap(), Value::Null);
        assert_eq!(compute(AggregateFunction::Max, &[]).unwrap(), Value::Null);
    }

    #[test]
    fn test_count_distinct() {
        let values = vec![
            Some(Value::String("teamA".into())),
            Some(Value::String("teamA".into())),
            Some(Value::String("teamB".into())),
            Some(Value::Null),
        ];
        assert_eq!(
            compute(AggregateFunction::CountDistinct, &values).unwrap(),
            Value::Int64(2)
        );
    }

    #[test]
    fn test_sum_rejects_strings() {
        let values = vec![Some(Value::String("x".into()))];
        assert!(matches!(
            compute(AggregateFunction::Sum, &values),
            Err(Error::TypeMismatch(_))
        ));
    }
}

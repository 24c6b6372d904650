//! Conversions between Rust values and store values.

use ormq_proto::{Value, ValueType};

use crate::error::Error;

/// Decode a store value into a Rust value.
///
/// Numeric decoding is lenient: any integer that fits converts to the
/// requested width, and integers widen to `f64`.
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Result<Self, Error>;
}

/// A Rust type that maps to one store column type.
pub trait SqlType: FromValue + Into<Value> + Clone + 'static {
    const VALUE_TYPE: ValueType;
}

/// Numeric column types.
pub trait Numeric: SqlType {
    /// Result type of `SUM` over this type.
    type Sum: SqlType;
}

fn mismatch(expected: &str, value: &Value) -> Error {
    Error::Decode(format!("expected {expected}, got {value:?}"))
}

impl FromValue for i32 {
    fn from_value(value: &Value) -> Result<Self, Error> {
        match value {
            Value::Float64(f)
                if f.fract() == 0.0 && *f >= i32::MIN as f64 && *f <= i32::MAX as f64 =>
            {
                Ok(*f as i32)
            }
            other => other.as_i32().ok_or_else(|| mismatch("int32", other)),
        }
    }
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> Result<Self, Error> {
        match value {
            // `i64::MAX as f64` rounds up to 2^63, which is out of range.
            Value::Float64(f)
                if f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64 =>
            {
                Ok(*f as i64)
            }
            other => other.as_i64().ok_or_else(|| mismatch("int64", other)),
        }
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Result<Self, Error> {
        value.as_f64().ok_or_else(|| mismatch("float64", value))
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Result<Self, Error> {
        value.as_bool().ok_or_else(|| mismatch("bool", value))
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self, Error> {
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| mismatch("string", value))
    }
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Result<Self, Error> {
        Ok(value.clone())
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Result<Self, Error> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

macro_rules! sql_type {
    ($($ty:ty => $tag:ident),* $(,)?) => {
        $(
            impl SqlType for $ty {
                const VALUE_TYPE: ValueType = ValueType::$tag;
            }
        )*
    };
}

sql_type! {
    bool => Bool,
    i32 => Int32,
    i64 => Int64,
    f64 => Float64,
    String => String,
}

impl Numeric for i32 {
    type Sum = i64;
}

impl Numeric for i64 {
    type Sum = i64;
}

impl Numeric for f64 {
    type Sum = f64;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lenient_numeric_decoding() {
        assert_eq!(i32::from_value(&Value::Int64(40)).unwrap(), 40);
        assert_eq!(i64::from_value(&Value::Int32(7)).unwrap(), 7);
        assert_eq!(f64::from_value(&Value::Int64(25)).unwrap(), 25.0);
        assert_eq!(i32::from_value(&Value::Float64(15.0)).unwrap(), 15);
        assert!(i32::from_value(&Value::Int64(i64::MAX)).is_err());
        assert!(i32::from_value(&Value::Float64(1.5)).is_err());
    }

    #[test]
    fn test_float_to_integer_range_edges() {
        assert_eq!(i32::from_value(&Value::Float64(-2147483648.0)).unwrap(), i32::MIN);
        assert_eq!(i32::from_value(&Value::Float64(2147483647.0)).unwrap(), i32::MAX);
        assert!(i32::from_value(&Value::Float64(2147483648.0)).is_err());
        assert!(i32::from_value(&Value::Float64(-2147483649.0)).is_err());

        let two_pow_63 = 9_223_372_036_854_775_808.0;
        assert!(i64::from_value(&Value::Float64(two_pow_63)).is_err());
        assert_eq!(i64::from_value(&Value::Float64(-two_pow_63)).unwrap(), i64::MIN);
        assert_eq!(
            i64::from_value(&Value::Float64(9_007_199_254_740_992.0)).unwrap(),
            9_007_199_254_740_992
        );
        assert!(i64::from_value(&Value::Float64(f64::INFINITY)).is_err());
        assert!(i64::from_value(&Value::Float64(f64::NAN)).is_err());
    }

    #[test]
    fn test_null_decodes_only_into_option() {
        assert_eq!(Option::<String>::from_value(&Value::Null).unwrap(), None);
        assert!(matches!(
            String::from_value(&Value::Null),
            Err(Error::Decode(_))
        ));
        assert_eq!(
            Option::<String>::from_value(&Value::from("member1")).unwrap(),
            Some("member1".to_string())
        );
    }
}

//! Value normalization and coercion.
//!
//! Every path that turns a raw database value into a typed member goes through
//! [`coerce`]: a database NULL stays NULL there, and becomes `None` or the type's
//! `Default` once a concrete Rust type is requested through [`coerce_strict`].

use chrono::NaiveDateTime;
use serde_json::Value as JsonValue;

use crate::error::SprocError;
use crate::types::{RowValues, SqlType};

/// Rust types that can be read out of a raw value.
pub trait FromRowValue: Sized {
    /// Convert a raw value. `RowValues::Null` must not fail.
    ///
    /// # Errors
    ///
    /// Returns `SprocError::ConversionError` when the value cannot represent `Self`.
    fn from_row_value(value: RowValues) -> Result<Self, SprocError>;
}

/// Rust types that can be written into a raw value.
pub trait ToRowValue {
    fn to_row_value(&self) -> RowValues;
}

/// Declared column type of a Rust member type. `Option<T>` keeps `T`'s type and
/// flips `NULLABLE`.
pub trait SqlTyped {
    const SQL_TYPE: SqlType;
    const NULLABLE: bool = false;
}

/// Substitute the database-null marker with `None`.
#[must_use]
pub fn normalize(raw: RowValues) -> Option<RowValues> {
    if raw.is_null() { None } else { Some(raw) }
}

/// Coerce a raw value to the canonical representation of `target`.
///
/// NULL passes through unchanged.
///
/// # Errors
///
/// Returns `SprocError::ConversionError` for incompatible kinds, unparsable text and
/// out-of-range numbers.
pub fn coerce(raw: RowValues, target: SqlType) -> Result<RowValues, SprocError> {
    let Some(raw) = normalize(raw) else {
        return Ok(RowValues::Null);
    };
    match target {
        SqlType::TinyInt | SqlType::SmallInt | SqlType::Int | SqlType::BigInt => {
            to_integer(raw, target).map(RowValues::Int)
        }
        SqlType::Real | SqlType::Float => to_float(raw, target).map(RowValues::Float),
        SqlType::Bit => to_bool(raw).map(RowValues::Bool),
        SqlType::NVarChar => to_text(raw).map(RowValues::Text),
        SqlType::DateTime2 => to_timestamp(raw).map(RowValues::Timestamp),
        SqlType::VarBinary => match raw {
            RowValues::Blob(bytes) => Ok(RowValues::Blob(bytes)),
            other => Err(mismatch(&other, target)),
        },
        SqlType::Json => to_json(raw).map(RowValues::JSON),
    }
}

/// Coerce a raw value straight into a Rust type.
///
/// # Errors
///
/// Returns `SprocError::ConversionError` if the value cannot represent `T`.
pub fn coerce_strict<T: FromRowValue>(raw: RowValues) -> Result<T, SprocError> {
    T::from_row_value(raw)
}

fn mismatch(raw: &RowValues, target: SqlType) -> SprocError {
    SprocError::ConversionError(format!("cannot convert {} to {target:?}", raw.kind()))
}

fn out_of_range(value: impl std::fmt::Display, target: SqlType) -> SprocError {
    SprocError::ConversionError(format!("{value} is out of range for {target:?}"))
}

fn to_integer(raw: RowValues, target: SqlType) -> Result<i64, SprocError> {
    let (min, max) = target
        .integer_bounds()
        .ok_or_else(|| mismatch(&raw, target))?;
    let value = match raw {
        RowValues::Int(i) => i,
        RowValues::Bool(b) => i64::from(b),
        #[allow(clippy::cast_possible_truncation)]
        RowValues::Float(f) => {
            // 2^63: `i64::MAX as f64` rounds up to it, so the upper bound is exclusive.
            const I64_LIMIT: f64 = 9_223_372_036_854_775_808.0;
            if !f.is_finite() || f.fract() != 0.0 || f < -I64_LIMIT || f >= I64_LIMIT {
                return Err(out_of_range(f, target));
            }
            f as i64
        }
        RowValues::Text(ref s) => s.trim().parse::<i64>().map_err(|e| {
            SprocError::ConversionError(format!("cannot parse {s:?} as {target:?}: {e}"))
        })?,
        ref other => return Err(mismatch(other, target)),
    };
    if value < min || value > max {
        return Err(out_of_range(value, target));
    }
    Ok(value)
}

fn to_float(raw: RowValues, target: SqlType) -> Result<f64, SprocError> {
    let value = match raw {
        #[allow(clippy::cast_precision_loss)]
        RowValues::Int(i) => i as f64,
        RowValues::Float(f) => f,
        RowValues::Bool(b) => f64::from(u8::from(b)),
        RowValues::Text(ref s) => s.trim().parse::<f64>().map_err(|e| {
            SprocError::ConversionError(format!("cannot parse {s:?} as {target:?}: {e}"))
        })?,
        ref other => return Err(mismatch(other, target)),
    };
    if target == SqlType::Real && value.is_finite() && value.abs() > f64::from(f32::MAX) {
        return Err(out_of_range(value, target));
    }
    Ok(value)
}

fn to_bool(raw: RowValues) -> Result<bool, SprocError> {
    match raw {
        RowValues::Bool(b) => Ok(b),
        RowValues::Int(i) => Ok(i != 0),
        RowValues::Float(f) => Ok(f != 0.0),
        RowValues::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Ok(true),
            "false" | "0" => Ok(false),
            _ => Err(SprocError::ConversionError(format!(
                "cannot parse {s:?} as Bit"
            ))),
        },
        other => Err(mismatch(&other, SqlType::Bit)),
    }
}

fn to_text(raw: RowValues) -> Result<String, SprocError> {
    match raw {
        RowValues::Text(s) => Ok(s),
        RowValues::Int(i) => Ok(i.to_string()),
        RowValues::Float(f) => Ok(f.to_string()),
        RowValues::Bool(b) => Ok(b.to_string()),
        RowValues::Timestamp(dt) => Ok(dt.format("%Y-%m-%d %H:%M:%S%.f").to_string()),
        RowValues::JSON(JsonValue::String(s)) => Ok(s),
        RowValues::JSON(json) => Ok(json.to_string()),
        other => Err(mismatch(&other, SqlType::NVarChar)),
    }
}

fn to_timestamp(raw: RowValues) -> Result<NaiveDateTime, SprocError> {
    match raw {
        RowValues::Timestamp(dt) => Ok(dt),
        RowValues::Text(s) => crate::types::parse_timestamp(&s).ok_or_else(|| {
            SprocError::ConversionError(format!("cannot parse {s:?} as DateTime2"))
        }),
        other => Err(mismatch(&other, SqlType::DateTime2)),
    }
}

fn to_json(raw: RowValues) -> Result<JsonValue, SprocError> {
    match raw {
        RowValues::JSON(json) => Ok(json),
        RowValues::Text(s) => serde_json::from_str(&s)
            .map_err(|e| SprocError::ConversionError(format!("invalid JSON text: {e}"))),
        RowValues::Int(i) => Ok(JsonValue::from(i)),
        RowValues::Float(f) => serde_json::Number::from_f64(f)
            .map(JsonValue::Number)
            .ok_or_else(|| out_of_range(f, SqlType::Json)),
        RowValues::Bool(b) => Ok(JsonValue::Bool(b)),
        other => Err(mismatch(&other, SqlType::Json)),
    }
}

macro_rules! impl_integer {
    ($($ty:ty => $sql:expr),* $(,)?) => {
        $(
            impl SqlTyped for $ty {
                const SQL_TYPE: SqlType = $sql;
            }

            impl FromRowValue for $ty {
                fn from_row_value(value: RowValues) -> Result<Self, SprocError> {
                    match coerce(value, $sql)? {
                        RowValues::Null => Ok(<$ty>::default()),
                        RowValues::Int(i) => <$ty>::try_from(i).map_err(|_| out_of_range(i, $sql)),
                        other => Err(mismatch(&other, $sql)),
                    }
                }
            }

            impl ToRowValue for $ty {
                fn to_row_value(&self) -> RowValues {
                    RowValues::Int(i64::from(*self))
                }
            }

            impl From<$ty> for RowValues {
                fn from(value: $ty) -> Self {
                    value.to_row_value()
                }
            }
        )*
    };
}

impl_integer!(
    u8 => SqlType::TinyInt,
    i16 => SqlType::SmallInt,
    i32 => SqlType::Int,
    i64 => SqlType::BigInt,
);

impl SqlTyped for f64 {
    const SQL_TYPE: SqlType = SqlType::Float;
}

impl FromRowValue for f64 {
    fn from_row_value(value: RowValues) -> Result<Self, SprocError> {
        match coerce(value, SqlType::Float)? {
            RowValues::Float(f) => Ok(f),
            _ => Ok(0.0),
        }
    }
}

impl ToRowValue for f64 {
    fn to_row_value(&self) -> RowValues {
        RowValues::Float(*self)
    }
}

impl SqlTyped for f32 {
    const SQL_TYPE: SqlType = SqlType::Real;
}

impl FromRowValue for f32 {
    #[allow(clippy::cast_possible_truncation)]
    fn from_row_value(value: RowValues) -> Result<Self, SprocError> {
        match coerce(value, SqlType::Real)? {
            RowValues::Float(f) => Ok(f as f32),
            _ => Ok(0.0),
        }
    }
}

impl ToRowValue for f32 {
    fn to_row_value(&self) -> RowValues {
        RowValues::Float(f64::from(*self))
    }
}

impl SqlTyped for bool {
    const SQL_TYPE: SqlType = SqlType::Bit;
}

impl FromRowValue for bool {
    fn from_row_value(value: RowValues) -> Result<Self, SprocError> {
        Ok(matches!(coerce(value, SqlType::Bit)?, RowValues::Bool(true)))
    }
}

impl ToRowValue for bool {
    fn to_row_value(&self) -> RowValues {
        RowValues::Bool(*self)
    }
}

impl SqlTyped for String {
    const SQL_TYPE: SqlType = SqlType::NVarChar;
}

impl FromRowValue for String {
    fn from_row_value(value: RowValues) -> Result<Self, SprocError> {
        match coerce(value, SqlType::NVarChar)? {
            RowValues::Text(s) => Ok(s),
            _ => Ok(String::new()),
        }
    }
}

impl ToRowValue for String {
    fn to_row_value(&self) -> RowValues {
        RowValues::Text(self.clone())
    }
}

impl ToRowValue for str {
    fn to_row_value(&self) -> RowValues {
        RowValues::Text(self.to_string())
    }
}

impl SqlTyped for NaiveDateTime {
    const SQL_TYPE: SqlType = SqlType::DateTime2;
}

impl FromRowValue for NaiveDateTime {
    fn from_row_value(value: RowValues) -> Result<Self, SprocError> {
        match coerce(value, SqlType::DateTime2)? {
            RowValues::Timestamp(dt) => Ok(dt),
            _ => Ok(NaiveDateTime::default()),
        }
    }
}

impl ToRowValue for NaiveDateTime {
    fn to_row_value(&self) -> RowValues {
        RowValues::Timestamp(*self)
    }
}

impl SqlTyped for Vec<u8> {
    const SQL_TYPE: SqlType = SqlType::VarBinary;
}

impl FromRowValue for Vec<u8> {
    fn from_row_value(value: RowValues) -> Result<Self, SprocError> {
        match coerce(value, SqlType::VarBinary)? {
            RowValues::Blob(bytes) => Ok(bytes),
            _ => Ok(Vec::new()),
        }
    }
}

impl ToRowValue for Vec<u8> {
    fn to_row_value(&self) -> RowValues {
        RowValues::Blob(self.clone())
    }
}

impl SqlTyped for JsonValue {
    const SQL_TYPE: SqlType = SqlType::Json;
}

impl FromRowValue for JsonValue {
    fn from_row_value(value: RowValues) -> Result<Self, SprocError> {
        match coerce(value, SqlType::Json)? {
            RowValues::JSON(json) => Ok(json),
            _ => Ok(JsonValue::Null),
        }
    }
}

impl ToRowValue for JsonValue {
    fn to_row_value(&self) -> RowValues {
        RowValues::JSON(self.clone())
    }
}

impl<T: SqlTyped> SqlTyped for Option<T> {
    const SQL_TYPE: SqlType = T::SQL_TYPE;
    const NULLABLE: bool = true;
}

impl<T: FromRowValue> FromRowValue for Option<T> {
    fn from_row_value(value: RowValues) -> Result<Self, SprocError> {
        match normalize(value) {
            None => Ok(None),
            Some(value) => T::from_row_value(value).map(Some),
        }
    }
}

impl<T: ToRowValue> ToRowValue for Option<T> {
    fn to_row_value(&self) -> RowValues {
        self.as_ref().map_or(RowValues::Null, ToRowValue::to_row_value)
    }
}

impl FromRowValue for RowValues {
    fn from_row_value(value: RowValues) -> Result<Self, SprocError> {
        Ok(value)
    }
}

impl ToRowValue for RowValues {
    fn to_row_value(&self) -> RowValues {
        self.clone()
    }
}

impl From<f64> for RowValues {
    fn from(value: f64) -> Self {
        RowValues::Float(value)
    }
}

impl From<f32> for RowValues {
    fn from(value: f32) -> Self {
        RowValues::Float(f64::from(value))
    }
}

impl From<bool> for RowValues {
    fn from(value: bool) -> Self {
        RowValues::Bool(value)
    }
}

impl From<String> for RowValues {
    fn from(value: String) -> Self {
        RowValues::Text(value)
    }
}

impl From<&str> for RowValues {
    fn from(value: &str) -> Self {
        RowValues::Text(value.to_string())
    }
}

impl From<NaiveDateTime> for RowValues {
    fn from(value: NaiveDateTime) -> Self {
        RowValues::Timestamp(value)
    }
}

impl From<Vec<u8>> for RowValues {
    fn from(value: Vec<u8>) -> Self {
        RowValues::Blob(value)
    }
}

impl From<JsonValue> for RowValues {
    fn from(value: JsonValue) -> Self {
        RowValues::JSON(value)
    }
}

impl<T: Into<RowValues>> From<Option<T>> for RowValues {
    fn from(value: Option<T>) -> Self {
        value.map_or(RowValues::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_normalizes_to_none_and_default() {
        assert_eq!(normalize(RowValues::Null), None);
        assert_eq!(
            coerce(RowValues::Null, SqlType::Int).unwrap(),
            RowValues::Null
        );
        assert_eq!(
            coerce_strict::<Option<String>>(RowValues::Null).unwrap(),
            None
        );
        assert_eq!(coerce_strict::<Option<i32>>(RowValues::Null).unwrap(), None);
        assert_eq!(coerce_strict::<i32>(RowValues::Null).unwrap(), 0);
        assert_eq!(coerce_strict::<String>(RowValues::Null).unwrap(), "");
    }

    #[test]
    fn optional_wrapper_uses_inner_type() {
        let parsed = coerce_strict::<Option<i16>>(RowValues::Text(" 42 ".into())).unwrap();
        assert_eq!(parsed, Some(42));
        assert!(coerce_strict::<Option<u8>>(RowValues::Int(300)).is_err());
    }

    #[test]
    fn numeric_widening_and_parsing() {
        assert_eq!(coerce_strict::<i64>(RowValues::Int(7)).unwrap(), 7);
        assert_eq!(coerce_strict::<f64>(RowValues::Int(7)).unwrap(), 7.0);
        assert_eq!(coerce_strict::<i32>(RowValues::Float(3.0)).unwrap(), 3);
        assert_eq!(
            coerce_strict::<f64>(RowValues::Text("2.5".into())).unwrap(),
            2.5
        );
        assert_eq!(coerce_strict::<String>(RowValues::Int(12)).unwrap(), "12");
        assert!(coerce_strict::<bool>(RowValues::Int(2)).unwrap());
    }

    #[test]
    fn incompatible_values_fail_with_conversion_error() {
        let cases = [
            (RowValues::Float(3.5), SqlType::Int),
            (RowValues::Int(i64::from(i32::MAX) + 1), SqlType::Int),
            (RowValues::Text("abc".into()), SqlType::BigInt),
            (RowValues::Blob(vec![1]), SqlType::NVarChar),
            (RowValues::Int(1), SqlType::DateTime2),
            // i64::MAX as f64 is exactly 2^63, one past the largest i64.
            (RowValues::Float(9.223_372_036_854_775_807e18), SqlType::BigInt),
            (RowValues::Float(-1.0e19), SqlType::BigInt),
            (RowValues::Float(f64::NAN), SqlType::BigInt),
            (RowValues::Float(f64::INFINITY), SqlType::Int),
        ];
        for (raw, target) in cases {
            let result = coerce(raw.clone(), target);
            assert!(
                matches!(result, Err(SprocError::ConversionError(_))),
                "{raw:?} should not convert to {target:?}"
            );
        }
        assert!(matches!(
            coerce_strict::<i64>(RowValues::Float(9.223_372_036_854_775_807e18)),
            Err(SprocError::ConversionError(_))
        ));
    }

    #[test]
    fn float_at_the_i64_edges() {
        let min = coerce_strict::<i64>(RowValues::Float(-9.223_372_036_854_775_808e18)).unwrap();
        assert_eq!(min, i64::MIN);
        let big = coerce_strict::<i64>(RowValues::Float(9.007_199_254_740_992e15)).unwrap();
        assert_eq!(big, 9_007_199_254_740_992);
    }

    #[test]
    fn text_timestamps_and_json() {
        let dt = coerce_strict::<NaiveDateTime>(RowValues::Text("2024-02-03 04:05:06".into()))
            .unwrap();
        assert_eq!(dt.to_string(), "2024-02-03 04:05:06");
        let json = coerce_strict::<JsonValue>(RowValues::Text(r#"{"a":1}"#.into())).unwrap();
        assert_eq!(json["a"], 1);
    }
}

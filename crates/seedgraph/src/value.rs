//! Scalar values carried by records.
//!
//! A [`Value`] is the typed payload of one column slot on a record. Literal
//! rendering lives in the dialect layer; this module only models the data,
//! including the two write-time sentinels:
//!
//! - [`Value::Now`] renders as the database's current-timestamp function so
//!   that execution time, not graph construction time, is recorded.
//! - [`Value::RelativeNow`] / [`Value::RelativeDate`] offset from the current
//!   timestamp/date by a caller-supplied amount.

use bytes::Bytes;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Declared type of a column, used to check record values at build time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    Bool,
    Int,
    Float,
    Decimal,
    Text,
    Bytes,
    Uuid,
    Date,
    Time,
    Timestamp,
    TimestampTz,
    Json,
}

impl ValueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Float => "float",
            Self::Decimal => "decimal",
            Self::Text => "text",
            Self::Bytes => "bytes",
            Self::Uuid => "uuid",
            Self::Date => "date",
            Self::Time => "time",
            Self::Timestamp => "timestamp",
            Self::TimestampTz => "timestamptz",
            Self::Json => "json",
        }
    }

    /// Whether this is one of the temporal column types.
    pub fn is_temporal(&self) -> bool {
        matches!(
            self,
            Self::Date | Self::Time | Self::Timestamp | Self::TimestampTz
        )
    }
}

impl std::fmt::Display for ValueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed scalar value on a record.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Decimal(Decimal),
    Text(String),
    Bytes(Bytes),
    Uuid(Uuid),
    Date(NaiveDate),
    Time(NaiveTime),
    Timestamp(NaiveDateTime),
    TimestampTz(DateTime<Utc>),
    Json(serde_json::Value),
    /// Current timestamp at statement execution time.
    Now,
    /// Current timestamp offset by a number of seconds (may be negative).
    RelativeNow { seconds: i64 },
    /// Current date offset by a number of days (may be negative).
    RelativeDate { days: i32 },
}

impl Value {
    /// The value's own type, if it has one.
    ///
    /// `Null` and the write-time sentinels have no single type; the statement
    /// builder accepts them against any nullable / temporal column instead.
    pub fn value_type(&self) -> Option<ValueType> {
        match self {
            Self::Null | Self::Now | Self::RelativeNow { .. } | Self::RelativeDate { .. } => None,
            Self::Bool(_) => Some(ValueType::Bool),
            Self::Int(_) => Some(ValueType::Int),
            Self::Float(_) => Some(ValueType::Float),
            Self::Decimal(_) => Some(ValueType::Decimal),
            Self::Text(_) => Some(ValueType::Text),
            Self::Bytes(_) => Some(ValueType::Bytes),
            Self::Uuid(_) => Some(ValueType::Uuid),
            Self::Date(_) => Some(ValueType::Date),
            Self::Time(_) => Some(ValueType::Time),
            Self::Timestamp(_) => Some(ValueType::Timestamp),
            Self::TimestampTz(_) => Some(ValueType::TimestampTz),
            Self::Json(_) => Some(ValueType::Json),
        }
    }

    /// Whether this value can populate a column of the given declared type.
    ///
    /// `Int` widens to `Float` and `Decimal`; the temporal sentinels fit any
    /// temporal column; `Null` fits everything (nullability is checked by the
    /// statement builder, not here).
    pub fn fits(&self, ty: ValueType) -> bool {
        match self {
            Self::Null => true,
            Self::Now | Self::RelativeNow { .. } => {
                matches!(ty, ValueType::Timestamp | ValueType::TimestampTz)
            }
            Self::RelativeDate { .. } => ty == ValueType::Date,
            Self::Int(_) => matches!(ty, ValueType::Int | ValueType::Float | ValueType::Decimal),
            other => other.value_type() == Some(ty),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Short type label used in diagnostics.
    pub fn kind_str(&self) -> &'static str {
        match self.value_type() {
            Some(ty) => ty.as_str(),
            None => match self {
                Self::Null => "null",
                Self::Now => "now",
                Self::RelativeNow { .. } => "relative-now",
                Self::RelativeDate { .. } => "relative-date",
                _ => unreachable!(),
            },
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<Decimal> for Value {
    fn from(v: Decimal) -> Self {
        Self::Decimal(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<Bytes> for Value {
    fn from(v: Bytes) -> Self {
        Self::Bytes(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(Bytes::from(v))
    }
}

impl From<Uuid> for Value {
    fn from(v: Uuid) -> Self {
        Self::Uuid(v)
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Self::Date(v)
    }
}

impl From<NaiveTime> for Value {
    fn from(v: NaiveTime) -> Self {
        Self::Time(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Self::Timestamp(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Self::TimestampTz(v)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Self::Json(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Self::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_widens_to_numeric_columns() {
        let v = Value::Int(7);
        assert!(v.fits(ValueType::Int));
        assert!(v.fits(ValueType::Float));
        assert!(v.fits(ValueType::Decimal));
        assert!(!v.fits(ValueType::Text));
    }

    #[test]
    fn now_fits_only_timestamps() {
        assert!(Value::Now.fits(ValueType::Timestamp));
        assert!(Value::Now.fits(ValueType::TimestampTz));
        assert!(!Value::Now.fits(ValueType::Date));
        assert!(Value::RelativeDate { days: -7 }.fits(ValueType::Date));
    }

    #[test]
    fn null_fits_everything() {
        assert!(Value::Null.fits(ValueType::Uuid));
        assert!(Value::Null.fits(ValueType::Bytes));
    }

    #[test]
    fn option_conversion() {
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::from(Some("x")), Value::Text("x".into()));
    }
}

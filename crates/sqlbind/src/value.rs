//! Dynamically typed column values and the coercion traits around them.
//!
//! Drivers surface every cell as a [`Value`]. Destinations pull typed data out of it
//! through [`FromValue`]; builder arguments go the other way through [`ToValue`].

use crate::error::{OrmError, OrmResult};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::value::RawValue;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// A raw column value, typed by the driver's native column type.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    Json(serde_json::Value),
    Uuid(uuid::Uuid),
    Date(NaiveDate),
    Time(NaiveTime),
    Timestamp(NaiveDateTime),
    TimestampTz(DateTime<Utc>),
}

impl Value {
    /// Returns `true` for SQL `NULL`.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Short type label used in decode errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
            Value::Bytes(_) => "bytes",
            Value::Json(_) => "json",
            Value::Uuid(_) => "uuid",
            Value::Date(_) => "date",
            Value::Time(_) => "time",
            Value::Timestamp(_) => "timestamp",
            Value::TimestampTz(_) => "timestamptz",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Text(s) => f.write_str(s),
            Value::Bytes(b) => write!(f, "<{} bytes>", b.len()),
            Value::Json(v) => write!(f, "{v}"),
            Value::Uuid(u) => write!(f, "{u}"),
            Value::Date(d) => write!(f, "{d}"),
            Value::Time(t) => write!(f, "{t}"),
            Value::Timestamp(ts) => write!(f, "{ts}"),
            Value::TimestampTz(ts) => write!(f, "{}", ts.to_rfc3339()),
        }
    }
}

/// Wrapper for values stored as JSON text or binary.
///
/// As a builder argument the inner value is serialized; as a destination the column
/// is decoded, and `NULL` yields `T::default()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Json<T>(pub T);

// ==================== ToValue ====================

/// Conversion of a Rust value into a builder argument.
pub trait ToValue {
    fn to_value(&self) -> OrmResult<Value>;
}

impl<T: ToValue + ?Sized> ToValue for &T {
    fn to_value(&self) -> OrmResult<Value> {
        (**self).to_value()
    }
}

impl<T: ToValue> ToValue for Option<T> {
    fn to_value(&self) -> OrmResult<Value> {
        match self {
            Some(v) => v.to_value(),
            None => Ok(Value::Null),
        }
    }
}

impl ToValue for Value {
    fn to_value(&self) -> OrmResult<Value> {
        Ok(self.clone())
    }
}

macro_rules! to_value_int {
    ($($t:ty),*) => {$(
        impl ToValue for $t {
            fn to_value(&self) -> OrmResult<Value> {
                Ok(Value::Int(i64::from(*self)))
            }
        }
    )*};
}

to_value_int!(i8, i16, i32, i64, u8, u16, u32);

impl ToValue for u64 {
    fn to_value(&self) -> OrmResult<Value> {
        i64::try_from(*self)
            .map(Value::Int)
            .map_err(|_| OrmError::validation(format!("integer {self} does not fit in i64")))
    }
}

impl ToValue for bool {
    fn to_value(&self) -> OrmResult<Value> {
        Ok(Value::Bool(*self))
    }
}

impl ToValue for f32 {
    fn to_value(&self) -> OrmResult<Value> {
        Ok(Value::Float(f64::from(*self)))
    }
}

impl ToValue for f64 {
    fn to_value(&self) -> OrmResult<Value> {
        Ok(Value::Float(*self))
    }
}

impl ToValue for str {
    fn to_value(&self) -> OrmResult<Value> {
        Ok(Value::Text(self.to_string()))
    }
}

impl ToValue for String {
    fn to_value(&self) -> OrmResult<Value> {
        Ok(Value::Text(self.clone()))
    }
}

impl ToValue for [u8] {
    fn to_value(&self) -> OrmResult<Value> {
        Ok(Value::Bytes(self.to_vec()))
    }
}

impl ToValue for Vec<u8> {
    fn to_value(&self) -> OrmResult<Value> {
        Ok(Value::Bytes(self.clone()))
    }
}

impl ToValue for serde_json::Value {
    fn to_value(&self) -> OrmResult<Value> {
        Ok(Value::Json(self.clone()))
    }
}

impl ToValue for uuid::Uuid {
    fn to_value(&self) -> OrmResult<Value> {
        Ok(Value::Uuid(*self))
    }
}

impl ToValue for NaiveDate {
    fn to_value(&self) -> OrmResult<Value> {
        Ok(Value::Date(*self))
    }
}

impl ToValue for NaiveTime {
    fn to_value(&self) -> OrmResult<Value> {
        Ok(Value::Time(*self))
    }
}

impl ToValue for NaiveDateTime {
    fn to_value(&self) -> OrmResult<Value> {
        Ok(Value::Timestamp(*self))
    }
}

impl ToValue for DateTime<Utc> {
    fn to_value(&self) -> OrmResult<Value> {
        Ok(Value::TimestampTz(*self))
    }
}

impl<T: Serialize> ToValue for Json<T> {
    fn to_value(&self) -> OrmResult<Value> {
        Ok(Value::Json(serde_json::to_value(&self.0)?))
    }
}

/// Maps are passed as JSON objects.
impl<V: Serialize> ToValue for HashMap<String, V> {
    fn to_value(&self) -> OrmResult<Value> {
        Ok(Value::Json(serde_json::to_value(self)?))
    }
}

impl<V: Serialize> ToValue for BTreeMap<String, V> {
    fn to_value(&self) -> OrmResult<Value> {
        Ok(Value::Json(serde_json::to_value(self)?))
    }
}

// ==================== FromValue ====================

/// Extraction of a typed Rust value from a raw column value.
///
/// `NULL` becomes the type's zero value; wrap the destination in `Option<T>` to
/// observe `NULL` as `None`.
pub trait FromValue: Sized {
    fn from_value(column: &str, value: &Value) -> OrmResult<Self>;
}

fn mismatch(column: &str, value: &Value, target: &str) -> OrmError {
    OrmError::decode(column, format!("cannot convert {} to {target}", value.kind()))
}

fn to_i64(column: &str, value: &Value) -> OrmResult<i64> {
    match value {
        Value::Int(i) => Ok(*i),
        Value::Bool(b) => Ok(i64::from(*b)),
        Value::Float(f) if f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64 => {
            Ok(*f as i64)
        }
        Value::Float(f) => Err(OrmError::decode(
            column,
            format!("float {f} is not representable as an integer"),
        )),
        Value::Text(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|e| OrmError::decode(column, format!("parse {s:?} as integer: {e}"))),
        Value::Bytes(b) => {
            let s = std::str::from_utf8(b).map_err(|e| OrmError::decode(column, e.to_string()))?;
            to_i64(column, &Value::Text(s.to_string()))
        }
        other => Err(mismatch(column, other, "integer")),
    }
}

macro_rules! from_value_int {
    ($($t:ty),*) => {$(
        impl FromValue for $t {
            fn from_value(column: &str, value: &Value) -> OrmResult<Self> {
                if value.is_null() {
                    return Ok(0);
                }
                let wide = to_i64(column, value)?;
                <$t>::try_from(wide).map_err(|_| {
                    OrmError::decode(
                        column,
                        format!("value {wide} out of range for {}", stringify!($t)),
                    )
                })
            }
        }
    )*};
}

from_value_int!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

macro_rules! from_value_float {
    ($($t:ty),*) => {$(
        impl FromValue for $t {
            fn from_value(column: &str, value: &Value) -> OrmResult<Self> {
                match value {
                    Value::Null => Ok(0.0),
                    Value::Float(f) => Ok(*f as $t),
                    Value::Int(i) => Ok(*i as $t),
                    Value::Text(s) => s.trim().parse::<$t>().map_err(|e| {
                        OrmError::decode(column, format!("parse {s:?} as float: {e}"))
                    }),
                    other => Err(mismatch(column, other, "float")),
                }
            }
        }
    )*};
}

from_value_float!(f32, f64);

impl FromValue for bool {
    fn from_value(column: &str, value: &Value) -> OrmResult<Self> {
        match value {
            Value::Null => Ok(false),
            Value::Bool(b) => Ok(*b),
            Value::Int(i) => Ok(*i != 0),
            Value::Text(s) => match s.trim() {
                "t" | "true" | "TRUE" | "1" => Ok(true),
                "f" | "false" | "FALSE" | "0" => Ok(false),
                other => Err(OrmError::decode(column, format!("parse {other:?} as bool"))),
            },
            other => Err(mismatch(column, other, "bool")),
        }
    }
}

impl FromValue for String {
    fn from_value(column: &str, value: &Value) -> OrmResult<Self> {
        match value {
            Value::Null => Ok(String::new()),
            Value::Text(s) => Ok(s.clone()),
            Value::Bytes(b) => String::from_utf8(b.clone())
                .map_err(|e| OrmError::decode(column, e.to_string())),
            other => Ok(other.to_string()),
        }
    }
}

impl FromValue for Vec<u8> {
    fn from_value(column: &str, value: &Value) -> OrmResult<Self> {
        match value {
            Value::Null => Ok(Vec::new()),
            Value::Bytes(b) => Ok(b.clone()),
            Value::Text(s) => Ok(s.as_bytes().to_vec()),
            Value::Json(v) => Ok(v.to_string().into_bytes()),
            other => Err(mismatch(column, other, "bytes")),
        }
    }
}

impl FromValue for Value {
    fn from_value(_column: &str, value: &Value) -> OrmResult<Self> {
        Ok(value.clone())
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(column: &str, value: &Value) -> OrmResult<Self> {
        if value.is_null() {
            return Ok(None);
        }
        T::from_value(column, value).map(Some)
    }
}

impl FromValue for uuid::Uuid {
    fn from_value(column: &str, value: &Value) -> OrmResult<Self> {
        match value {
            Value::Null => Ok(uuid::Uuid::nil()),
            Value::Uuid(u) => Ok(*u),
            Value::Text(s) => {
                uuid::Uuid::parse_str(s.trim()).map_err(|e| OrmError::decode(column, e.to_string()))
            }
            Value::Bytes(b) => {
                uuid::Uuid::from_slice(b).map_err(|e| OrmError::decode(column, e.to_string()))
            }
            other => Err(mismatch(column, other, "uuid")),
        }
    }
}

impl FromValue for NaiveDate {
    fn from_value(column: &str, value: &Value) -> OrmResult<Self> {
        match value {
            Value::Null => Ok(NaiveDate::default()),
            Value::Date(d) => Ok(*d),
            Value::Timestamp(ts) => Ok(ts.date()),
            Value::Text(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                .map_err(|e| OrmError::decode(column, e.to_string())),
            other => Err(mismatch(column, other, "date")),
        }
    }
}

impl FromValue for NaiveTime {
    fn from_value(column: &str, value: &Value) -> OrmResult<Self> {
        match value {
            Value::Null => Ok(NaiveTime::default()),
            Value::Time(t) => Ok(*t),
            Value::Text(s) => s
                .trim()
                .parse::<NaiveTime>()
                .map_err(|e| OrmError::decode(column, e.to_string())),
            other => Err(mismatch(column, other, "time")),
        }
    }
}

impl FromValue for NaiveDateTime {
    fn from_value(column: &str, value: &Value) -> OrmResult<Self> {
        match value {
            Value::Null => Ok(NaiveDateTime::default()),
            Value::Timestamp(ts) => Ok(*ts),
            Value::TimestampTz(ts) => Ok(ts.naive_utc()),
            Value::Text(s) => s
                .trim()
                .replacen(' ', "T", 1)
                .parse::<NaiveDateTime>()
                .map_err(|e| OrmError::decode(column, e.to_string())),
            other => Err(mismatch(column, other, "timestamp")),
        }
    }
}

impl FromValue for DateTime<Utc> {
    fn from_value(column: &str, value: &Value) -> OrmResult<Self> {
        match value {
            Value::Null => Ok(DateTime::<Utc>::default()),
            Value::TimestampTz(ts) => Ok(*ts),
            Value::Timestamp(ts) => Ok(ts.and_utc()),
            Value::Text(s) => DateTime::parse_from_rfc3339(s.trim())
                .map(|ts| ts.with_timezone(&Utc))
                .map_err(|e| OrmError::decode(column, e.to_string())),
            other => Err(mismatch(column, other, "timestamptz")),
        }
    }
}

/// Decode a JSON column from its text, binary or native encoding.
pub(crate) fn decode_json<T: DeserializeOwned>(column: &str, value: &Value) -> OrmResult<T> {
    let decoded = match value {
        Value::Json(v) => serde_json::from_value(v.clone()),
        Value::Text(s) => serde_json::from_str(s),
        Value::Bytes(b) => serde_json::from_slice(b),
        other => return Err(mismatch(column, other, "json")),
    };
    decoded.map_err(|e| OrmError::decode(column, e.to_string()))
}

impl FromValue for serde_json::Value {
    fn from_value(column: &str, value: &Value) -> OrmResult<Self> {
        match value {
            Value::Null => Ok(serde_json::Value::Null),
            other => decode_json(column, other),
        }
    }
}

impl<T: DeserializeOwned + Default> FromValue for Json<T> {
    fn from_value(column: &str, value: &Value) -> OrmResult<Self> {
        if value.is_null() {
            return Ok(Json(T::default()));
        }
        decode_json(column, value).map(Json)
    }
}

impl<V: DeserializeOwned> FromValue for HashMap<String, V> {
    fn from_value(column: &str, value: &Value) -> OrmResult<Self> {
        if value.is_null() {
            return Ok(HashMap::new());
        }
        decode_json(column, value)
    }
}

impl<V: DeserializeOwned> FromValue for BTreeMap<String, V> {
    fn from_value(column: &str, value: &Value) -> OrmResult<Self> {
        if value.is_null() {
            return Ok(BTreeMap::new());
        }
        decode_json(column, value)
    }
}

/// Raw JSON payloads keep the column's encoding verbatim. `NULL` becomes the JSON
/// `null` literal; `Option<Box<RawValue>>` maps it to `None` instead.
impl FromValue for Box<RawValue> {
    fn from_value(column: &str, value: &Value) -> OrmResult<Self> {
        let text = match value {
            Value::Null => "null".to_string(),
            Value::Json(v) => v.to_string(),
            Value::Text(s) => s.clone(),
            Value::Bytes(b) => String::from_utf8(b.clone())
                .map_err(|e| OrmError::decode(column, e.to_string()))?,
            other => return Err(mismatch(column, other, "raw json")),
        };
        RawValue::from_string(text).map_err(|e| OrmError::decode(column, e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_is_zero_for_value_types() {
        assert_eq!(i32::from_value("n", &Value::Null).unwrap(), 0);
        assert_eq!(String::from_value("s", &Value::Null).unwrap(), "");
        assert!(!bool::from_value("b", &Value::Null).unwrap());
    }

    #[test]
    fn null_is_none_for_option() {
        assert_eq!(Option::<i64>::from_value("n", &Value::Null).unwrap(), None);
        assert_eq!(
            Option::<i64>::from_value("n", &Value::Int(7)).unwrap(),
            Some(7)
        );
    }

    #[test]
    fn numeric_widening_and_narrowing() {
        assert_eq!(f64::from_value("f", &Value::Int(3)).unwrap(), 3.0);
        assert_eq!(i16::from_value("i", &Value::Int(300)).unwrap(), 300);
        let err = i8::from_value("i", &Value::Int(300)).unwrap_err();
        assert!(err.to_string().contains("out of range for i8"));
    }

    #[test]
    fn text_parses_into_numbers() {
        assert_eq!(i64::from_value("n", &Value::Text("42".into())).unwrap(), 42);
        assert_eq!(f32::from_value("f", &Value::Text("1.5".into())).unwrap(), 1.5);
        assert!(i64::from_value("n", &Value::Text("abc".into())).is_err());
    }

    #[test]
    fn decodes_json_maps() {
        let v = Value::Text(r#"{"hello":"world"}"#.into());
        let m = HashMap::<String, String>::from_value("map", &v).unwrap();
        assert_eq!(m.get("hello").map(String::as_str), Some("world"));

        let empty = HashMap::<String, String>::from_value("map", &Value::Null).unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn raw_json_keeps_payload_and_null_is_none() {
        let v = Value::Bytes(br#"{"hello":"world"}"#.to_vec());
        let raw = Option::<Box<RawValue>>::from_value("raw", &v).unwrap().unwrap();
        assert_eq!(raw.get(), r#"{"hello":"world"}"#);
        assert!(Option::<Box<RawValue>>::from_value("raw", &Value::Null)
            .unwrap()
            .is_none());
    }

    #[test]
    fn json_wrapper_round_trips_through_value() {
        let mut m = BTreeMap::new();
        m.insert("k".to_string(), 1);
        let v = Json(m.clone()).to_value().unwrap();
        let back = Json::<BTreeMap<String, i32>>::from_value("j", &v).unwrap();
        assert_eq!(back.0, m);
    }

    #[test]
    fn raw_json_null_is_null_literal() {
        let raw = Box::<RawValue>::from_value("raw", &Value::Null).unwrap();
        assert_eq!(raw.get(), "null");
    }

    #[test]
    fn integral_float_out_of_range_is_rejected() {
        assert_eq!(i64::from_value("n", &Value::Float(42.0)).unwrap(), 42);
        assert!(i64::from_value("n", &Value::Float(1e300)).is_err());
        assert!(i64::from_value("n", &Value::Float(-1e19)).is_err());
        assert!(i64::from_value("n", &Value::Float(9.223372036854775807e18)).is_err());
        assert!(i64::from_value("n", &Value::Float(f64::INFINITY)).is_err());
        assert!(i32::from_value("n", &Value::Float(1.5)).is_err());
    }

    #[test]
    fn maps_are_passed_as_json() {
        let mut m = HashMap::new();
        m.insert("hello".to_string(), "world".to_string());
        assert_eq!(
            m.to_value().unwrap(),
            Value::Json(serde_json::json!({"hello": "world"}))
        );

        let mut b = BTreeMap::new();
        b.insert("n".to_string(), 1);
        assert_eq!(b.to_value().unwrap(), Value::Json(serde_json::json!({"n": 1})));
    }

    #[test]
    fn u64_argument_overflow_is_rejected() {
        assert!(u64::MAX.to_value().is_err());
        assert_eq!(5u64.to_value().unwrap(), Value::Int(5));
    }
}

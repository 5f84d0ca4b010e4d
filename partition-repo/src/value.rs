//! Typed column values
//!
//! [`Value`] is the unit of data exchanged between conditions, partial records
//! and stores. Non-null values carry their [`ValueType`]; [`Value::Null`] is
//! compatible with any nullable column.
//!
//! # Example
//!
//! ```rust
//! use partition_repo::value::{Value, ValueType};
//!
//! let table: Value = "t1".into();
//! let node: Value = Some(3_i64).into();
//! let unset: Value = Option::<i64>::None.into();
//!
//! assert_eq!(table.value_type(), Some(ValueType::Text));
//! assert_eq!(node, Value::Integer(3));
//! assert!(unset.is_null());
//! ```

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Declared type of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    /// 64-bit signed integer
    Integer,
    /// UTF-8 text
    Text,
    /// UTC timestamp
    Timestamp,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer => write!(f, "integer"),
            Self::Text => write!(f, "text"),
            Self::Timestamp => write!(f, "timestamp"),
        }
    }
}

/// A single typed value
///
/// Serialized untagged so filters can be written as plain JSON
/// (`"t1"`, `7`, `null`). Timestamps serialize as RFC 3339 strings and are
/// read back as [`Value::Text`]; [`Value::coerce_to`] turns them into
/// timestamps when compared against a timestamp column.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// SQL NULL
    #[default]
    Null,
    /// 64-bit integer value
    Integer(i64),
    /// Text value
    Text(String),
    /// Timestamp value
    Timestamp(DateTime<Utc>),
}

impl Value {
    /// The type of this value, or `None` for [`Value::Null`]
    pub fn value_type(&self) -> Option<ValueType> {
        match self {
            Self::Null => None,
            Self::Integer(_) => Some(ValueType::Integer),
            Self::Text(_) => Some(ValueType::Text),
            Self::Timestamp(_) => Some(ValueType::Timestamp),
        }
    }

    /// Whether this value is NULL
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Convert this value to `target`, if the two are compatible
    ///
    /// NULL and values already of the target type pass through unchanged.
    /// RFC 3339 text converts to a timestamp; nothing else converts.
    pub fn coerce_to(self, target: ValueType) -> Option<Self> {
        match (self, target) {
            (Self::Null, _) => Some(Self::Null),
            (Self::Text(text), ValueType::Timestamp) => DateTime::parse_from_rfc3339(&text)
                .ok()
                .map(|ts| Self::Timestamp(ts.with_timezone(&Utc))),
            (value, target) if value.value_type() == Some(target) => Some(value),
            _ => None,
        }
    }

    /// Compare two non-null values of the same type
    ///
    /// Returns `None` when either side is NULL or the types differ, which
    /// callers treat as "unknown" in the SQL sense.
    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Integer(a), Self::Integer(b)) => Some(a.cmp(b)),
            (Self::Text(a), Self::Text(b)) => Some(a.cmp(b)),
            (Self::Timestamp(a), Self::Timestamp(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Integer payload, if this is an integer
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Text payload, if this is text
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Integer(n) => write!(f, "{}", n),
            Self::Text(s) => write!(f, "'{}'", s),
            Self::Timestamp(ts) => write!(f, "{}", ts.to_rfc3339()),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Integer(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Integer(i64::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Self::Integer(i64::from(n))
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(ts: DateTime<Utc>) -> Self {
        Self::Timestamp(ts)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

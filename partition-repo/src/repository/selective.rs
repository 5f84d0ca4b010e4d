//! Present/absent payloads for selective writes
//!
//! A selective write only touches the fields a caller explicitly supplied.
//! [`Field`] carries that intent per field and is distinct from `Option`, so
//! `Field::Present(None)` writes NULL while `Field::Absent` leaves the column
//! alone.
//!
//! # Example
//!
//! ```rust
//! use partition_repo::repository::Field;
//!
//! let clear_node: Field<Option<i64>> = Field::Present(None);
//! let untouched: Field<Option<i64>> = Field::Absent;
//!
//! assert!(clear_node.is_present());
//! assert!(!untouched.is_present());
//! ```

use serde::{Deserialize, Serialize};

use crate::value::Value;

/// One field of a selective payload
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field<T> {
    /// Write this value
    Present(T),
    /// Leave the column as it is (or at its default on insert)
    #[default]
    Absent,
}

impl<T> Field<T> {
    /// Whether a value was supplied
    pub const fn is_present(&self) -> bool {
        matches!(self, Self::Present(_))
    }

    /// Borrow the supplied value
    pub const fn as_present(&self) -> Option<&T> {
        match self {
            Self::Present(value) => Some(value),
            Self::Absent => None,
        }
    }

    /// Consume into the supplied value
    pub fn into_present(self) -> Option<T> {
        match self {
            Self::Present(value) => Some(value),
            Self::Absent => None,
        }
    }

    /// Map the supplied value
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Field<U> {
        match self {
            Self::Present(value) => Field::Present(f(value)),
            Self::Absent => Field::Absent,
        }
    }
}

impl<T> From<T> for Field<T> {
    fn from(value: T) -> Self {
        Self::Present(value)
    }
}

impl<T: Clone + Into<Value>> Field<T> {
    /// Append `(column, value)` to `out` when present
    pub fn collect_into(&self, column: &'static str, out: &mut Vec<(&'static str, Value)>) {
        if let Self::Present(value) = self {
            out.push((column, value.clone().into()));
        }
    }
}

/// A record whose fields are each present or absent
///
/// Implementors list only their present fields, by column name. Column names
/// and value types are checked against the table schema before any write.
pub trait PartialRecord: Send + Sync {
    /// Present fields as `(column, value)` pairs
    fn present_fields(&self) -> Vec<(&'static str, Value)>;

    /// Whether no field is present
    fn is_empty(&self) -> bool {
        self.present_fields().is_empty()
    }
}

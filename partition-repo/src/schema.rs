//! Table schemas, raw rows and the entity mapping trait
//!
//! A [`TableSchema`] is the static description a store compiles against:
//! ordered columns, their types and the primary-key position. [`Row`] is the
//! raw, schema-ordered form a store returns, and [`Entity`] maps a domain type
//! to and from it.

use chrono::{DateTime, Utc};

use crate::repository::PartialRecord;
use crate::value::{Value, ValueType};

/// A column definition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    /// Column name as stored
    pub name: &'static str,
    /// Declared value type
    pub value_type: ValueType,
    /// Whether NULL is allowed
    pub nullable: bool,
    /// Whether the store can order by this column
    pub sortable: bool,
}

impl Column {
    /// A non-null, sortable column
    pub const fn new(name: &'static str, value_type: ValueType) -> Self {
        Self {
            name,
            value_type,
            nullable: false,
            sortable: true,
        }
    }

    /// Mark the column as nullable
    #[must_use]
    pub const fn nullable(self) -> Self {
        Self {
            nullable: true,
            ..self
        }
    }

    /// Mark the column as not usable in an ordering clause
    #[must_use]
    pub const fn unsortable(self) -> Self {
        Self {
            sortable: false,
            ..self
        }
    }

    /// The type-default a store writes when the column is not supplied
    ///
    /// NULL for nullable columns, otherwise zero, the empty string or the
    /// Unix epoch.
    pub fn default_value(&self) -> Value {
        if self.nullable {
            return Value::Null;
        }
        match self.value_type {
            ValueType::Integer => Value::Integer(0),
            ValueType::Text => Value::Text(String::new()),
            ValueType::Timestamp => Value::Timestamp(DateTime::<Utc>::UNIX_EPOCH),
        }
    }

    /// Whether `value` may be stored in this column
    pub fn accepts(&self, value: &Value) -> bool {
        match value.value_type() {
            None => self.nullable,
            Some(ty) => ty == self.value_type,
        }
    }
}

/// Static description of one table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableSchema {
    /// Table name as stored
    pub name: &'static str,
    /// Columns in row order
    pub columns: &'static [Column],
    /// Index of the integer primary-key column
    pub primary_key: usize,
}

impl TableSchema {
    /// Position of the column called `name`
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Column at `index`
    pub fn column(&self, index: usize) -> Option<&Column> {
        self.columns.get(index)
    }

    /// Name of the column at `index`, or `"?"` when out of range
    pub fn column_name(&self, index: usize) -> &'static str {
        self.columns.get(index).map_or("?", |c| c.name)
    }

    /// Name of the primary-key column
    pub fn primary_key_name(&self) -> &'static str {
        self.column_name(self.primary_key)
    }

    /// A row holding every column's type-default
    pub fn default_row(&self) -> Row {
        Row::new(self.columns.iter().map(Column::default_value).collect())
    }
}

/// A raw row in schema column order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    values: Vec<Value>,
}

impl Row {
    /// Create a row from values in column order
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    /// Value at column `index`
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Replace the value at column `index`; out-of-range writes are ignored
    pub fn set(&mut self, index: usize, value: Value) {
        if let Some(slot) = self.values.get_mut(index) {
            *slot = value;
        }
    }

    /// All values in column order
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Consume the row into its values
    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    /// Take the value at `index`, leaving NULL behind
    pub fn take(&mut self, index: usize) -> Value {
        self.values
            .get_mut(index)
            .map_or(Value::Null, std::mem::take)
    }

    /// Non-null integer at `index`
    pub fn take_integer(&mut self, index: usize) -> Result<i64, DecodeError> {
        match self.take(index) {
            Value::Integer(n) => Ok(n),
            other => Err(DecodeError::new(index, ValueType::Integer, &other)),
        }
    }

    /// Nullable integer at `index`
    pub fn take_optional_integer(&mut self, index: usize) -> Result<Option<i64>, DecodeError> {
        match self.take(index) {
            Value::Null => Ok(None),
            Value::Integer(n) => Ok(Some(n)),
            other => Err(DecodeError::new(index, ValueType::Integer, &other)),
        }
    }

    /// Non-null text at `index`
    pub fn take_text(&mut self, index: usize) -> Result<String, DecodeError> {
        match self.take(index) {
            Value::Text(s) => Ok(s),
            other => Err(DecodeError::new(index, ValueType::Text, &other)),
        }
    }

    /// Nullable text at `index`
    pub fn take_optional_text(&mut self, index: usize) -> Result<Option<String>, DecodeError> {
        match self.take(index) {
            Value::Null => Ok(None),
            Value::Text(s) => Ok(Some(s)),
            other => Err(DecodeError::new(index, ValueType::Text, &other)),
        }
    }

    /// Nullable timestamp at `index`
    pub fn take_optional_timestamp(
        &mut self,
        index: usize,
    ) -> Result<Option<DateTime<Utc>>, DecodeError> {
        match self.take(index) {
            Value::Null => Ok(None),
            Value::Timestamp(ts) => Ok(Some(ts)),
            other => Err(DecodeError::new(index, ValueType::Timestamp, &other)),
        }
    }
}

/// A raw row value did not have the type its entity field expects
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeError {
    /// Column position
    pub column: usize,
    /// Expected type
    pub expected: ValueType,
    /// What was found instead
    pub found: String,
}

impl DecodeError {
    fn new(column: usize, expected: ValueType, found: &Value) -> Self {
        Self {
            column,
            expected,
            found: found.to_string(),
        }
    }
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "column {} expected {}, found {}",
            self.column, self.expected, self.found
        )
    }
}

impl std::error::Error for DecodeError {}

/// A domain type persisted in one table
///
/// The primary key is always an integer column. `to_row` must produce every
/// column in [`TableSchema`] order, and `from_row` must accept what
/// `to_row` produces.
pub trait Entity: Sized + Send + Sync + 'static {
    /// The present/absent payload used by selective writes
    type Patch: PartialRecord;

    /// Name used in error context, e.g. "Partition"
    const ENTITY_NAME: &'static str;

    /// Table description
    fn schema() -> &'static TableSchema;

    /// Primary-key value
    fn primary_key(&self) -> i64;

    /// Every column in schema order
    fn to_row(&self) -> Row;

    /// Decode a raw row returned by a store
    fn from_row(row: Row) -> Result<Self, DecodeError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    const COLUMNS: [Column; 3] = [
        Column::new("id", ValueType::Integer),
        Column::new("name", ValueType::Text),
        Column::new("note", ValueType::Text).nullable().unsortable(),
    ];

    const TABLE: TableSchema = TableSchema {
        name: "things",
        columns: &COLUMNS,
        primary_key: 0,
    };

    #[test]
    fn test_column_lookup() {
        assert_eq!(TABLE.column_index("name"), Some(1));
        assert_eq!(TABLE.column_index("missing"), None);
        assert_eq!(TABLE.primary_key_name(), "id");
        assert!(!TABLE.columns[2].sortable);
    }

    #[test]
    fn test_default_row() {
        let row = TABLE.default_row();
        assert_eq!(
            row.values(),
            &[Value::Integer(0), Value::Text(String::new()), Value::Null]
        );
    }

    #[test]
    fn test_column_accepts() {
        assert!(COLUMNS[1].accepts(&Value::from("x")));
        assert!(!COLUMNS[1].accepts(&Value::Null));
        assert!(COLUMNS[2].accepts(&Value::Null));
        assert!(!COLUMNS[0].accepts(&Value::from("1")));
    }

    #[test]
    fn test_take_typed() {
        let mut row = Row::new(vec![Value::Integer(4), Value::from("a"), Value::Null]);
        assert_eq!(row.take_integer(0), Ok(4));
        assert_eq!(row.take_optional_text(2), Ok(None));
        let err = row.take_integer(1).unwrap_err();
        assert_eq!(err.expected, ValueType::Integer);
        assert_eq!(err.found, "'a'");
    }
}

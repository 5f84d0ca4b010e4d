//! The Partition entity
//!
//! A partition is a unit of data placement tracked by the cluster manager: a
//! key range of a table, optionally assigned to a node.
//!
//! # Example
//!
//! ```rust
//! use partition_repo::partition::{fields, PartitionPatch};
//! use partition_repo::repository::PartialRecord;
//!
//! let patch = PartitionPatch::new().table("t1").status("RUNNING");
//! let names: Vec<_> = patch.present_fields().into_iter().map(|(name, _)| name).collect();
//! assert_eq!(names, vec![fields::TABLE, fields::STATUS]);
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::repository::{Field, PartialRecord};
use crate::schema::{Column, DecodeError, Entity, Row, TableSchema};
use crate::value::{Value, ValueType};

/// Column names of the partitions table
pub mod fields {
    /// Primary key
    pub const PARTITION_ID: &str = "partition_id";
    /// Owning table name
    pub const TABLE: &str = "table";
    /// Assigned node, if any
    pub const NODE_ID: &str = "node_id";
    /// Lifecycle status
    pub const STATUS: &str = "status";
    /// Inclusive lower key bound
    pub const START_KEY: &str = "start_key";
    /// Exclusive upper key bound
    pub const END_KEY: &str = "end_key";
    /// Creation time
    pub const CREATED_AT: &str = "created_at";
    /// Last modification time
    pub const UPDATED_AT: &str = "updated_at";
}

const COLUMNS: [Column; 8] = [
    Column::new(fields::PARTITION_ID, ValueType::Integer),
    Column::new(fields::TABLE, ValueType::Text),
    Column::new(fields::NODE_ID, ValueType::Integer).nullable(),
    Column::new(fields::STATUS, ValueType::Text),
    Column::new(fields::START_KEY, ValueType::Text).nullable(),
    Column::new(fields::END_KEY, ValueType::Text).nullable(),
    Column::new(fields::CREATED_AT, ValueType::Timestamp).nullable(),
    Column::new(fields::UPDATED_AT, ValueType::Timestamp).nullable(),
];

/// Schema of the `partitions` table
pub static PARTITION_TABLE: TableSchema = TableSchema {
    name: "partitions",
    columns: &COLUMNS,
    primary_key: 0,
};

/// A partition record
///
/// `Default` yields the column type-defaults, which is what a non-selective
/// write stores for fields the caller did not fill in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partition {
    /// Unique key, assigned on insert and never changed
    pub partition_id: i64,
    /// Owning table name
    pub table: String,
    /// Assigned node
    pub node_id: Option<i64>,
    /// Lifecycle status, e.g. "RUNNING"
    pub status: String,
    /// Inclusive lower key bound
    pub start_key: Option<String>,
    /// Exclusive upper key bound
    pub end_key: Option<String>,
    /// Creation time
    pub created_at: Option<DateTime<Utc>>,
    /// Last modification time
    pub updated_at: Option<DateTime<Utc>>,
}

impl Entity for Partition {
    type Patch = PartitionPatch;

    const ENTITY_NAME: &'static str = "Partition";

    fn schema() -> &'static TableSchema {
        &PARTITION_TABLE
    }

    fn primary_key(&self) -> i64 {
        self.partition_id
    }

    fn to_row(&self) -> Row {
        Row::new(vec![
            Value::from(self.partition_id),
            Value::from(self.table.clone()),
            Value::from(self.node_id),
            Value::from(self.status.clone()),
            Value::from(self.start_key.clone()),
            Value::from(self.end_key.clone()),
            Value::from(self.created_at),
            Value::from(self.updated_at),
        ])
    }

    fn from_row(mut row: Row) -> Result<Self, DecodeError> {
        Ok(Self {
            partition_id: row.take_integer(0)?,
            table: row.take_text(1)?,
            node_id: row.take_optional_integer(2)?,
            status: row.take_text(3)?,
            start_key: row.take_optional_text(4)?,
            end_key: row.take_optional_text(5)?,
            created_at: row.take_optional_timestamp(6)?,
            updated_at: row.take_optional_timestamp(7)?,
        })
    }
}

/// Selective payload for partitions
///
/// Every field starts absent. `Field::Present(None)` on a nullable field
/// writes NULL.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartitionPatch {
    /// Primary key; a target in key-based updates, never assigned
    pub partition_id: Field<i64>,
    /// Owning table name
    pub table: Field<String>,
    /// Assigned node
    pub node_id: Field<Option<i64>>,
    /// Lifecycle status
    pub status: Field<String>,
    /// Inclusive lower key bound
    pub start_key: Field<Option<String>>,
    /// Exclusive upper key bound
    pub end_key: Field<Option<String>>,
    /// Creation time
    pub created_at: Field<Option<DateTime<Utc>>>,
    /// Last modification time
    pub updated_at: Field<Option<DateTime<Utc>>>,
}

impl PartitionPatch {
    /// A patch with every field absent
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the primary key
    #[must_use]
    pub fn partition_id(mut self, id: i64) -> Self {
        self.partition_id = Field::Present(id);
        self
    }

    /// Set the table name
    #[must_use]
    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Field::Present(table.into());
        self
    }

    /// Set or clear the node
    #[must_use]
    pub fn node_id(mut self, node_id: Option<i64>) -> Self {
        self.node_id = Field::Present(node_id);
        self
    }

    /// Set the status
    #[must_use]
    pub fn status(mut self, status: impl Into<String>) -> Self {
        self.status = Field::Present(status.into());
        self
    }

    /// Set or clear the key range
    #[must_use]
    pub fn key_range(mut self, start: Option<String>, end: Option<String>) -> Self {
        self.start_key = Field::Present(start);
        self.end_key = Field::Present(end);
        self
    }

    /// Set or clear the creation time
    #[must_use]
    pub fn created_at(mut self, at: Option<DateTime<Utc>>) -> Self {
        self.created_at = Field::Present(at);
        self
    }

    /// Set or clear the modification time
    #[must_use]
    pub fn updated_at(mut self, at: Option<DateTime<Utc>>) -> Self {
        self.updated_at = Field::Present(at);
        self
    }
}

impl PartialRecord for PartitionPatch {
    fn present_fields(&self) -> Vec<(&'static str, Value)> {
        let mut out = Vec::new();
        self.partition_id.collect_into(fields::PARTITION_ID, &mut out);
        self.table.collect_into(fields::TABLE, &mut out);
        self.node_id.collect_into(fields::NODE_ID, &mut out);
        self.status.collect_into(fields::STATUS, &mut out);
        self.start_key.collect_into(fields::START_KEY, &mut out);
        self.end_key.collect_into(fields::END_KEY, &mut out);
        self.created_at.collect_into(fields::CREATED_AT, &mut out);
        self.updated_at.collect_into(fields::UPDATED_AT, &mut out);
        out
    }
}

impl From<&Partition> for PartitionPatch {
    fn from(p: &Partition) -> Self {
        Self {
            partition_id: Field::Present(p.partition_id),
            table: Field::Present(p.table.clone()),
            node_id: Field::Present(p.node_id),
            status: Field::Present(p.status.clone()),
            start_key: Field::Present(p.start_key.clone()),
            end_key: Field::Present(p.end_key.clone()),
            created_at: Field::Present(p.created_at),
            updated_at: Field::Present(p.updated_at),
        }
    }
}

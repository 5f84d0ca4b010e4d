//! Store backends
//!
//! The repository compiles every mapper call into one of the requests on
//! [`Store`]: a select, a count, a mutation or an identity allocation. Stores
//! never see criteria or entity types, only compiled predicates, sort keys and
//! raw [`Row`]s in schema order.
//!
//! Two backends are provided:
//!
//! - [`MemoryStore`]: in-process, ordered by primary key
//! - `PgStore`: PostgreSQL through `sqlx` (requires the `database` feature)

use async_trait::async_trait;

use crate::repository::{Pagination, Predicate, SortSpec};
use crate::schema::{Row, TableSchema};
use crate::value::Value;

pub use crate::error::{StoreError, StoreErrorKind, StoreOperation};

mod memory;
#[cfg(feature = "database")]
mod postgres;

pub use memory::{MemoryStore, MemoryTransaction};
#[cfg(feature = "database")]
pub use postgres::{PgStore, PgTransaction};

/// Result type for store calls
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// A value written to one column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    /// Column position
    pub column: usize,
    /// Value to write
    pub value: Value,
}

/// Rows a mutation applies to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// The row with this primary key, if any
    PrimaryKey(i64),
    /// Every row the predicate keeps
    Matching(Predicate),
}

/// A write request
///
/// Columns not named in an insert take their default. Updates never assign
/// the primary key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    /// Insert one row
    Insert {
        /// Columns to write, primary key included
        assignments: Vec<Assignment>,
    },
    /// Overwrite the named columns of the target rows
    Update {
        /// Rows to update
        target: Target,
        /// Columns to write
        assignments: Vec<Assignment>,
    },
    /// Remove the target rows
    Delete {
        /// Rows to delete
        target: Target,
    },
}

/// Raw persistence backend
#[async_trait]
pub trait Store: Send + Sync {
    /// Rows kept by `predicate`, sorted by `sort`, within `window`
    async fn select(
        &self,
        table: &'static TableSchema,
        predicate: &Predicate,
        sort: &SortSpec,
        window: Option<Pagination>,
    ) -> StoreResult<Vec<Row>>;

    /// Number of rows kept by `predicate`
    async fn count(&self, table: &'static TableSchema, predicate: &Predicate) -> StoreResult<u64>;

    /// Execute a mutation, returning rows affected
    async fn apply(&self, table: &'static TableSchema, mutation: &Mutation) -> StoreResult<u64>;

    /// Allocate a fresh primary key
    async fn next_identity(&self, table: &'static TableSchema) -> StoreResult<i64>;
}

/// A store that can open transactions
#[async_trait]
pub trait TransactionalStore: Store {
    /// Transaction handle type
    type Transaction: StoreTransaction;

    /// Open a transaction
    async fn begin(&self) -> StoreResult<Self::Transaction>;
}

/// An open transaction
///
/// Dropping the handle without calling [`commit`](Self::commit) discards
/// every write made through it.
#[async_trait]
pub trait StoreTransaction: Store + Sized {
    /// Publish the writes
    async fn commit(self) -> StoreResult<()>;

    /// Discard the writes
    async fn rollback(self) -> StoreResult<()>;
}

#[async_trait]
impl<S: Store + ?Sized> Store for std::sync::Arc<S> {
    async fn select(
        &self,
        table: &'static TableSchema,
        predicate: &Predicate,
        sort: &SortSpec,
        window: Option<Pagination>,
    ) -> StoreResult<Vec<Row>> {
        (**self).select(table, predicate, sort, window).await
    }

    async fn count(&self, table: &'static TableSchema, predicate: &Predicate) -> StoreResult<u64> {
        (**self).count(table, predicate).await
    }

    async fn apply(&self, table: &'static TableSchema, mutation: &Mutation) -> StoreResult<u64> {
        (**self).apply(table, mutation).await
    }

    async fn next_identity(&self, table: &'static TableSchema) -> StoreResult<i64> {
        (**self).next_identity(table).await
    }
}

//! # partition-repo
//!
//! Example-style data access for partition metadata. A typed record, a
//! criteria builder and a generic repository that counts, selects, inserts,
//! updates and deletes by primary key or by criteria, over an in-memory store
//! or PostgreSQL.
//!
//! ## Features
//!
//! - **Criteria queries**: OR of AND groups with equality, comparison, range,
//!   set membership, null tests and LIKE
//! - **Selective writes**: only present fields are written; absent differs from NULL
//! - **Row bounds**: offset/limit windows pushed down to the store
//! - **Stores**: [`MemoryStore`](store::MemoryStore) always, `PgStore` with the `database` feature
//! - **Configuration**: figment layering of defaults, TOML files and `PARTITION_` env vars
//! - **Observability**: JSON tracing with per-operation spans
//!
//! ## Example
//!
//! ```rust
//! use partition_repo::prelude::*;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<()> {
//!     let repo = StoreRepository::<Partition, _>::new(MemoryStore::new());
//!
//!     for table in ["t1", "t1", "t2"] {
//!         repo.insert_selective(&PartitionPatch::new().table(table).status("RUNNING"))
//!             .await?;
//!     }
//!
//!     let first_page = repo
//!         .select_by_example_with_rowbounds(
//!             &Criteria::matching(CriteriaGroup::new().eq("table", "t1")),
//!             Pagination::first_page(1),
//!         )
//!         .await?;
//!     assert_eq!(first_page.len(), 1);
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod observability;
pub mod partition;
pub mod repository;
pub mod schema;
pub mod store;
pub mod value;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{Config, DatabaseConfig, RepositoryConfig, ServiceConfig};

    pub use crate::error::{Error, Result, StoreError, StoreErrorKind, StoreOperation};

    pub use crate::observability::{init_tracing, shutdown_tracing};

    pub use crate::partition::{fields, Partition, PartitionPatch, PARTITION_TABLE};

    pub use crate::repository::{
        Condition, Criteria, CriteriaGroup, Field, Inserted, Operator, OrderBy, OrderDirection,
        Pagination, PartialRecord, Repository, RepositoryError, RepositoryErrorKind,
        RepositoryOperation, RepositoryResult, StoreRepository, TransactionScope,
    };

    pub use crate::schema::{Column, Entity, Row, TableSchema};

    pub use crate::store::{MemoryStore, Store, StoreTransaction, TransactionalStore};

    #[cfg(feature = "database")]
    pub use crate::store::PgStore;

    pub use crate::value::{Value, ValueType};

    pub use serde::{Deserialize, Serialize};

    // Re-export tracing macros and types
    pub use tracing::{debug, error, info, instrument, trace, warn, Level, Span};

    // Re-export tokio for async runtime
    pub use tokio;

    // Re-export time utilities
    pub use chrono::{DateTime, Utc};
}

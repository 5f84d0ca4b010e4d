//! Example-style repository over a pluggable store
//!
//! This module provides the mapper surface for one entity type: count,
//! select, insert, update and delete by primary key or by [`Criteria`].
//!
//! # Features
//!
//! - **Criteria**: [`Criteria`] is an OR of AND-ed [`CriteriaGroup`]s plus an ordering
//! - **Selective writes**: [`PartialRecord`] payloads distinguish absent fields
//!   from fields explicitly set to NULL via [`Field`]
//! - **Row bounds**: [`Pagination`] windows are pushed down to the store
//! - **Deterministic order**: every ordering ends with the primary key
//! - **Transactions**: [`StoreRepository::begin`] returns a [`TransactionScope`]
//!
//! # Example
//!
//! ```rust
//! use partition_repo::prelude::*;
//!
//! let criteria = Criteria::matching(
//!     CriteriaGroup::new()
//!         .eq("table", "orders")
//!         .is_not_null("node_id"),
//! )
//! .or(CriteriaGroup::new().eq("status", "SPLITTING"))
//! .order_by("status", OrderDirection::Descending);
//!
//! assert_eq!(criteria.groups().len(), 2);
//! assert!(!criteria.is_unfiltered());
//! ```

mod compile;
mod criteria;
mod error;
mod selective;
mod traits;

// Re-export all public types
pub use compile::{compile_assignments, CompiledCondition, Conjunction, Predicate, SortKey, SortSpec};
pub use criteria::{
    Condition, Criteria, CriteriaGroup, Operand, Operator, OrderBy, OrderDirection, Pagination,
};
pub use error::{RepositoryError, RepositoryErrorKind, RepositoryOperation};
pub use selective::{Field, PartialRecord};
pub use traits::{Inserted, Repository, RepositoryResult, StoreRepository, TransactionScope};

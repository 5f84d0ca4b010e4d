//! The mapper trait and its store-backed implementation
//!
//! [`Repository`] is the generated-mapper surface: count, select, insert,
//! update and delete, each either by primary key or by [`Criteria`], with
//! selective variants that only write the present fields of a
//! [`PartialRecord`]. It uses RPITIT (Return Position Impl Trait In Traits)
//! so implementations can be written with plain `async fn`.
//!
//! [`StoreRepository`] implements it over any [`Store`]. It is stateless: every
//! call validates and compiles its inputs, makes its store round-trip and maps
//! rows back into entities.
//!
//! # Example
//!
//! ```rust
//! use partition_repo::prelude::*;
//!
//! # tokio_test_block(async {
//! let repo = StoreRepository::<Partition, _>::new(MemoryStore::new());
//!
//! let created = repo
//!     .insert_selective(&PartitionPatch::new().table("t1").status("RUNNING"))
//!     .await?;
//!
//! let stopped = repo
//!     .update_by_example_selective(
//!         &PartitionPatch::new().status("STOPPED"),
//!         &Criteria::matching(CriteriaGroup::new().eq("table", "t1")),
//!     )
//!     .await?;
//! assert_eq!(stopped, 1);
//!
//! let partition = repo.select_by_primary_key(created.primary_key).await?;
//! assert_eq!(partition.status, "STOPPED");
//! # Ok::<(), RepositoryError>(())
//! # }).unwrap();
//! # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
//! # }
//! ```

use std::future::Future;
use std::marker::PhantomData;
use std::ops::Deref;

use tracing::{debug, warn, Instrument};

use super::compile::{compile_assignments, Predicate, SortSpec};
use super::criteria::{Criteria, Pagination};
use super::error::{RepositoryError, RepositoryErrorKind, RepositoryOperation};
use super::selective::PartialRecord;
use crate::config::RepositoryConfig;
use crate::schema::{Entity, Row};
use crate::store::{
    Assignment, Mutation, Store, StoreError, StoreTransaction, Target, TransactionalStore,
};
use crate::value::Value;

/// Result type for repository operations
pub type RepositoryResult<T> = std::result::Result<T, RepositoryError>;

/// Outcome of an insert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Inserted {
    /// Key of the new row, supplied or store-assigned
    pub primary_key: i64,
    /// Rows written (always 1 on success)
    pub rows_affected: u64,
}

/// Mapper operations for one entity type
///
/// Writes report rows affected. Operations that target a primary key fail
/// with `NotFound` only where noted; deletes never do.
pub trait Repository<E: Entity>: Send + Sync {
    /// Number of rows matching `criteria`
    fn count_by_example(
        &self,
        criteria: &Criteria,
    ) -> impl Future<Output = RepositoryResult<u64>> + Send;

    /// Delete every row matching `criteria`
    ///
    /// An empty criteria deletes every row unless
    /// `require_bulk_delete_filter` is set.
    fn delete_by_example(
        &self,
        criteria: &Criteria,
    ) -> impl Future<Output = RepositoryResult<u64>> + Send;

    /// Delete the row with key `id`; 0 when absent
    fn delete_by_primary_key(&self, id: i64) -> impl Future<Output = RepositoryResult<u64>> + Send;

    /// Insert every field of `record`, including its key
    fn insert(&self, record: &E) -> impl Future<Output = RepositoryResult<Inserted>> + Send;

    /// Insert only the present fields of `patch`
    ///
    /// Absent fields take the column default. An absent key is allocated by
    /// the store; a present key must be unused or the call fails with
    /// `DuplicateKey`.
    fn insert_selective(
        &self,
        patch: &E::Patch,
    ) -> impl Future<Output = RepositoryResult<Inserted>> + Send;

    /// All rows matching `criteria` in its order, then by key
    fn select_by_example(
        &self,
        criteria: &Criteria,
    ) -> impl Future<Output = RepositoryResult<Vec<E>>> + Send;

    /// The `page` window of [`select_by_example`](Self::select_by_example)
    fn select_by_example_with_rowbounds(
        &self,
        criteria: &Criteria,
        page: Pagination,
    ) -> impl Future<Output = RepositoryResult<Vec<E>>> + Send;

    /// The row with key `id`, or `NotFound`
    fn select_by_primary_key(&self, id: i64) -> impl Future<Output = RepositoryResult<E>> + Send;

    /// Write the present fields of `patch` to every row matching `criteria`
    ///
    /// An all-absent patch writes nothing and returns the match count.
    fn update_by_example_selective(
        &self,
        patch: &E::Patch,
        criteria: &Criteria,
    ) -> impl Future<Output = RepositoryResult<u64>> + Send;

    /// Overwrite every non-key field of the rows matching `criteria`
    fn update_by_example(
        &self,
        record: &E,
        criteria: &Criteria,
    ) -> impl Future<Output = RepositoryResult<u64>> + Send;

    /// Write the present fields of `patch` to the row keyed by its key field
    ///
    /// An all-absent patch writes nothing and returns 1 if the key exists,
    /// 0 if not. Otherwise a missing key fails with `NotFound`.
    fn update_by_primary_key_selective(
        &self,
        patch: &E::Patch,
    ) -> impl Future<Output = RepositoryResult<u64>> + Send;

    /// Overwrite every non-key field of the row keyed by `record`'s key
    fn update_by_primary_key(&self, record: &E) -> impl Future<Output = RepositoryResult<u64>> + Send;

    /// Whether a row with key `id` exists
    fn exists(&self, id: i64) -> impl Future<Output = RepositoryResult<bool>> + Send;
}

/// [`Repository`] over a [`Store`]
#[derive(Debug, Clone)]
pub struct StoreRepository<E, S> {
    store: S,
    config: RepositoryConfig,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity, S: Store> StoreRepository<E, S> {
    /// Repository with default settings
    pub fn new(store: S) -> Self {
        Self::with_config(store, RepositoryConfig::default())
    }

    /// Repository with explicit settings
    pub fn with_config(store: S, config: RepositoryConfig) -> Self {
        Self {
            store,
            config,
            _entity: PhantomData,
        }
    }

    /// The backing store
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Run `fut` inside a span naming the operation and table
    fn traced<T>(
        op: RepositoryOperation,
        fut: impl Future<Output = RepositoryResult<T>> + Send,
    ) -> impl Future<Output = RepositoryResult<T>> + Send {
        fut.instrument(tracing::debug_span!(
            "repository",
            operation = op.as_str(),
            table = E::schema().name
        ))
    }

    fn predicate(op: RepositoryOperation, criteria: &Criteria) -> RepositoryResult<Predicate> {
        Predicate::compile(E::schema(), criteria).map_err(|e| e.with_operation(op))
    }

    fn sort(op: RepositoryOperation, criteria: &Criteria) -> RepositoryResult<SortSpec> {
        SortSpec::compile(E::schema(), criteria.ordering()).map_err(|e| e.with_operation(op))
    }

    fn store_error(op: RepositoryOperation, err: StoreError) -> RepositoryError {
        warn!(kind = %err.kind, operation = op.as_str(), "store call failed: {}", err.message);
        RepositoryError::from(err).with_operation(op)
    }

    fn decode(op: RepositoryOperation, rows: Vec<Row>) -> RepositoryResult<Vec<E>> {
        rows.into_iter()
            .map(|row| {
                E::from_row(row).map_err(|e| RepositoryError::serialization_error(op, e.to_string()))
            })
            .collect()
    }

    fn guard_bulk(&self, op: RepositoryOperation, predicate: &Predicate) -> RepositoryResult<()> {
        if self.config.require_bulk_delete_filter && predicate.is_always() {
            return Err(RepositoryError::validation_failed(
                op,
                "criteria matches every row; add a condition or disable require_bulk_delete_filter",
            ));
        }
        Ok(())
    }

    /// Assignments for every non-key column of `record`
    fn record_assignments(op: RepositoryOperation, record: &E) -> RepositoryResult<Vec<Assignment>> {
        let schema = E::schema();
        let fields = schema
            .columns
            .iter()
            .map(|c| c.name)
            .zip(record.to_row().into_values())
            .enumerate()
            .filter(|(index, _)| *index != schema.primary_key)
            .map(|(_, field)| field)
            .collect();
        compile_assignments(schema, op, fields)
    }

    /// Split the key assignment out of a patch
    fn split_key(
        op: RepositoryOperation,
        patch: &E::Patch,
    ) -> RepositoryResult<(Option<i64>, Vec<Assignment>)> {
        let schema = E::schema();
        let mut assignments = compile_assignments(schema, op, patch.present_fields())?;
        let key = assignments
            .iter()
            .position(|a| a.column == schema.primary_key)
            .map(|index| assignments.remove(index).value);
        match key {
            None => Ok((None, assignments)),
            Some(Value::Integer(key)) => Ok((Some(key), assignments)),
            Some(other) => Err(RepositoryError::validation_failed(
                op,
                format!("primary key must be an integer, got {}", other),
            )),
        }
    }

    async fn count_matching(&self, op: RepositoryOperation, predicate: &Predicate) -> RepositoryResult<u64> {
        self.store
            .count(E::schema(), predicate)
            .await
            .map_err(|e| Self::store_error(op, e))
    }

    async fn apply(&self, op: RepositoryOperation, mutation: &Mutation) -> RepositoryResult<u64> {
        self.store
            .apply(E::schema(), mutation)
            .await
            .map_err(|e| Self::store_error(op, e))
    }

    async fn insert_assignments(
        &self,
        op: RepositoryOperation,
        key: Option<i64>,
        mut assignments: Vec<Assignment>,
    ) -> RepositoryResult<Inserted> {
        let schema = E::schema();
        let key = match key {
            Some(key) => key,
            None => self
                .store
                .next_identity(schema)
                .await
                .map_err(|e| Self::store_error(op, e))?,
        };
        assignments.push(Assignment {
            column: schema.primary_key,
            value: Value::Integer(key),
        });
        assignments.sort_by_key(|a| a.column);

        let rows_affected = self
            .apply(op, &Mutation::Insert { assignments })
            .await
            .map_err(|e| match e.kind {
                RepositoryErrorKind::DuplicateKey => e.with_entity(E::ENTITY_NAME, key.to_string()),
                _ => e,
            })?;
        debug!(primary_key = key, rows_affected, "inserted");
        Ok(Inserted {
            primary_key: key,
            rows_affected,
        })
    }

    async fn update_by_key(
        &self,
        op: RepositoryOperation,
        key: i64,
        assignments: Vec<Assignment>,
    ) -> RepositoryResult<u64> {
        let mutation = Mutation::Update {
            target: Target::PrimaryKey(key),
            assignments,
        };
        let rows_affected = self.apply(op, &mutation).await?;
        if rows_affected == 0 {
            return Err(RepositoryError::not_found(op, E::ENTITY_NAME, key));
        }
        debug!(primary_key = key, rows_affected, "updated");
        Ok(rows_affected)
    }

    async fn update_matching(
        &self,
        op: RepositoryOperation,
        criteria: &Criteria,
        assignments: Vec<Assignment>,
    ) -> RepositoryResult<u64> {
        let predicate = Self::predicate(op, criteria)?;
        self.guard_bulk(op, &predicate)?;
        let rows_affected = self
            .apply(
                op,
                &Mutation::Update {
                    target: Target::Matching(predicate),
                    assignments,
                },
            )
            .await?;
        debug!(groups = criteria.groups().len(), rows_affected, "updated");
        Ok(rows_affected)
    }
}

impl<E: Entity, S: Store> Repository<E> for StoreRepository<E, S> {
    async fn count_by_example(&self, criteria: &Criteria) -> RepositoryResult<u64> {
        const OP: RepositoryOperation = RepositoryOperation::CountByExample;
        Self::traced(OP, async {
            let predicate = Self::predicate(OP, criteria)?;
            let rows = self.count_matching(OP, &predicate).await?;
            debug!(groups = criteria.groups().len(), rows, "counted");
            Ok(rows)
        })
        .await
    }

    async fn delete_by_example(&self, criteria: &Criteria) -> RepositoryResult<u64> {
        const OP: RepositoryOperation = RepositoryOperation::DeleteByExample;
        Self::traced(OP, async {
            let predicate = Self::predicate(OP, criteria)?;
            self.guard_bulk(OP, &predicate)?;
            let rows_affected = self
                .apply(
                    OP,
                    &Mutation::Delete {
                        target: Target::Matching(predicate),
                    },
                )
                .await?;
            debug!(groups = criteria.groups().len(), rows_affected, "deleted");
            Ok(rows_affected)
        })
        .await
    }

    async fn delete_by_primary_key(&self, id: i64) -> RepositoryResult<u64> {
        const OP: RepositoryOperation = RepositoryOperation::DeleteByPrimaryKey;
        Self::traced(OP, async {
            let rows_affected = self
                .apply(
                    OP,
                    &Mutation::Delete {
                        target: Target::PrimaryKey(id),
                    },
                )
                .await?;
            debug!(primary_key = id, rows_affected, "deleted");
            Ok(rows_affected)
        })
        .await
    }

    async fn insert(&self, record: &E) -> RepositoryResult<Inserted> {
        const OP: RepositoryOperation = RepositoryOperation::Insert;
        Self::traced(OP, async {
            let assignments = Self::record_assignments(OP, record)?;
            self.insert_assignments(OP, Some(record.primary_key()), assignments)
                .await
        })
        .await
    }

    async fn insert_selective(&self, patch: &E::Patch) -> RepositoryResult<Inserted> {
        const OP: RepositoryOperation = RepositoryOperation::InsertSelective;
        Self::traced(OP, async {
            let (key, assignments) = Self::split_key(OP, patch)?;
            self.insert_assignments(OP, key, assignments).await
        })
        .await
    }

    async fn select_by_example(&self, criteria: &Criteria) -> RepositoryResult<Vec<E>> {
        const OP: RepositoryOperation = RepositoryOperation::SelectByExample;
        Self::traced(OP, async {
            let predicate = Self::predicate(OP, criteria)?;
            let sort = Self::sort(OP, criteria)?;
            let rows = self
                .store
                .select(E::schema(), &predicate, &sort, None)
                .await
                .map_err(|e| Self::store_error(OP, e))?;
            debug!(groups = criteria.groups().len(), rows = rows.len(), "selected");
            Self::decode(OP, rows)
        })
        .await
    }

    async fn select_by_example_with_rowbounds(
        &self,
        criteria: &Criteria,
        page: Pagination,
    ) -> RepositoryResult<Vec<E>> {
        const OP: RepositoryOperation = RepositoryOperation::SelectByExampleWithRowbounds;
        Self::traced(OP, async {
            if page.limit == 0 {
                return Err(RepositoryError::validation_failed(
                    OP,
                    "page limit must be positive",
                ));
            }
            let predicate = Self::predicate(OP, criteria)?;
            let sort = Self::sort(OP, criteria)?;
            let rows = self
                .store
                .select(E::schema(), &predicate, &sort, Some(page))
                .await
                .map_err(|e| Self::store_error(OP, e))?;
            debug!(
                groups = criteria.groups().len(),
                offset = page.offset,
                limit = page.limit,
                rows = rows.len(),
                "selected window"
            );
            Self::decode(OP, rows)
        })
        .await
    }

    async fn select_by_primary_key(&self, id: i64) -> RepositoryResult<E> {
        const OP: RepositoryOperation = RepositoryOperation::SelectByPrimaryKey;
        Self::traced(OP, async {
            let schema = E::schema();
            let rows = self
                .store
                .select(
                    schema,
                    &Predicate::primary_key(schema, id),
                    &SortSpec::primary_key(schema),
                    None,
                )
                .await
                .map_err(|e| Self::store_error(OP, e))?;
            Self::decode(OP, rows)?
                .into_iter()
                .next()
                .ok_or_else(|| RepositoryError::not_found(OP, E::ENTITY_NAME, id))
        })
        .await
    }

    async fn update_by_example_selective(
        &self,
        patch: &E::Patch,
        criteria: &Criteria,
    ) -> RepositoryResult<u64> {
        const OP: RepositoryOperation = RepositoryOperation::UpdateByExampleSelective;
        Self::traced(OP, async {
            let (key, assignments) = Self::split_key(OP, patch)?;
            if key.is_some() {
                return Err(RepositoryError::validation_failed(
                    OP,
                    format!(
                        "primary key '{}' cannot be updated",
                        E::schema().primary_key_name()
                    ),
                ));
            }
            if assignments.is_empty() {
                let predicate = Self::predicate(OP, criteria)?;
                self.guard_bulk(OP, &predicate)?;
                let rows = self.count_matching(OP, &predicate).await?;
                debug!(groups = criteria.groups().len(), rows, "empty patch, nothing written");
                return Ok(rows);
            }
            self.update_matching(OP, criteria, assignments).await
        })
        .await
    }

    async fn update_by_example(&self, record: &E, criteria: &Criteria) -> RepositoryResult<u64> {
        const OP: RepositoryOperation = RepositoryOperation::UpdateByExample;
        Self::traced(OP, async {
            let assignments = Self::record_assignments(OP, record)?;
            self.update_matching(OP, criteria, assignments).await
        })
        .await
    }

    async fn update_by_primary_key_selective(&self, patch: &E::Patch) -> RepositoryResult<u64> {
        const OP: RepositoryOperation = RepositoryOperation::UpdateByPrimaryKeySelective;
        Self::traced(OP, async {
            let (key, assignments) = Self::split_key(OP, patch)?;
            let Some(key) = key else {
                return Err(RepositoryError::validation_failed(
                    OP,
                    format!(
                        "primary key '{}' must be present",
                        E::schema().primary_key_name()
                    ),
                ));
            };
            if assignments.is_empty() {
                let rows = self
                    .count_matching(OP, &Predicate::primary_key(E::schema(), key))
                    .await?;
                debug!(primary_key = key, rows, "empty patch, nothing written");
                return Ok(rows);
            }
            self.update_by_key(OP, key, assignments).await
        })
        .await
    }

    async fn update_by_primary_key(&self, record: &E) -> RepositoryResult<u64> {
        const OP: RepositoryOperation = RepositoryOperation::UpdateByPrimaryKey;
        Self::traced(OP, async {
            let assignments = Self::record_assignments(OP, record)?;
            self.update_by_key(OP, record.primary_key(), assignments)
                .await
        })
        .await
    }

    async fn exists(&self, id: i64) -> RepositoryResult<bool> {
        const OP: RepositoryOperation = RepositoryOperation::Exists;
        Self::traced(OP, async {
            let rows = self
                .count_matching(OP, &Predicate::primary_key(E::schema(), id))
                .await?;
            Ok(rows > 0)
        })
        .await
    }
}

impl<E: Entity, S: TransactionalStore> StoreRepository<E, S> {
    /// Open a transaction scope
    ///
    /// The scope is a repository over the transaction. It commits only when
    /// [`TransactionScope::commit`] is called; returning early, failing or
    /// dropping the scope rolls everything back.
    ///
    /// On a [`MemoryStore`](crate::store::MemoryStore) the open scope holds
    /// the store's write lock. See [`TransactionScope`] before calling this
    /// repository again while the scope is alive.
    pub async fn begin(&self) -> RepositoryResult<TransactionScope<E, S::Transaction>> {
        const OP: RepositoryOperation = RepositoryOperation::Transaction;
        let tx = self
            .store
            .begin()
            .await
            .map_err(|e| Self::store_error(OP, e))?;
        debug!(table = E::schema().name, "transaction started");
        Ok(TransactionScope {
            repository: StoreRepository::with_config(tx, self.config.clone()),
        })
    }
}

/// A repository bound to an open transaction
///
/// Dereferences to a [`StoreRepository`] so every mapper operation is
/// available inside the scope.
///
/// # Locking
///
/// A [`MemoryStore`](crate::store::MemoryStore) transaction holds the whole
/// store's write lock until the scope is committed, rolled back or dropped.
/// Calls through the outer repository (or any other handle to the same
/// store) wait for it. Awaiting such a call from the task that owns the
/// scope never completes, so go through the scope itself or end it first.
/// A `PgStore` transaction uses its own pooled
/// connection and only blocks on the rows it has locked.
#[derive(Debug)]
pub struct TransactionScope<E, T> {
    repository: StoreRepository<E, T>,
}

impl<E: Entity, T: StoreTransaction> TransactionScope<E, T> {
    /// Publish every write made in this scope
    pub async fn commit(self) -> RepositoryResult<()> {
        self.repository.store.commit().await.map_err(|e| {
            StoreRepository::<E, T>::store_error(RepositoryOperation::Transaction, e)
        })?;
        debug!(table = E::schema().name, "transaction committed");
        Ok(())
    }

    /// Discard every write made in this scope
    pub async fn rollback(self) -> RepositoryResult<()> {
        self.repository.store.rollback().await.map_err(|e| {
            StoreRepository::<E, T>::store_error(RepositoryOperation::Transaction, e)
        })?;
        debug!(table = E::schema().name, "transaction rolled back");
        Ok(())
    }
}

impl<E, T> Deref for TransactionScope<E, T> {
    type Target = StoreRepository<E, T>;

    fn deref(&self) -> &Self::Target {
        &self.repository
    }
}

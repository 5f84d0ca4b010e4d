//! In-process store
//!
//! Rows live in a `BTreeMap` per table keyed by primary key, so scans in
//! primary-key order walk the index directly and stop once the page window
//! is filled. Any other ordering materializes the matches and sorts them.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedRwLockWriteGuard, RwLock};

use super::{
    Assignment, Mutation, Store, StoreError, StoreOperation, StoreResult, StoreTransaction, Target,
    TransactionalStore,
};
use crate::repository::{Pagination, Predicate, SortSpec};
use crate::schema::{Row, TableSchema};
use crate::value::Value;

#[derive(Debug, Clone, Default)]
struct TableData {
    rows: BTreeMap<i64, Row>,
    next_key: i64,
}

impl TableData {
    fn allocate_key(&mut self) -> i64 {
        let after_last = self
            .rows
            .last_key_value()
            .map_or(1, |(key, _)| key.saturating_add(1));
        let key = self.next_key.max(after_last).max(1);
        self.next_key = key.saturating_add(1);
        key
    }

    fn target_keys(&self, target: &Target) -> Vec<i64> {
        match target {
            Target::PrimaryKey(key) => {
                if self.rows.contains_key(key) {
                    vec![*key]
                } else {
                    Vec::new()
                }
            }
            Target::Matching(predicate) => self
                .rows
                .iter()
                .filter(|(_, row)| predicate.matches(row))
                .map(|(key, _)| *key)
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Default)]
struct Tables {
    tables: HashMap<&'static str, TableData>,
}

fn to_usize(n: u64) -> usize {
    usize::try_from(n).unwrap_or(usize::MAX)
}

fn check_assignments(
    schema: &TableSchema,
    assignments: &[Assignment],
    allow_primary_key: bool,
) -> StoreResult<()> {
    for assignment in assignments {
        let column = schema.column(assignment.column).ok_or_else(|| {
            StoreError::query_failed(
                StoreOperation::Apply,
                format!("column {} out of range", assignment.column),
            )
        })?;
        if assignment.column == schema.primary_key && !allow_primary_key {
            return Err(StoreError::constraint_violation(
                StoreOperation::Apply,
                format!("primary key '{}' is immutable", column.name),
            ));
        }
        if !column.accepts(&assignment.value) {
            return Err(StoreError::constraint_violation(
                StoreOperation::Apply,
                format!("column '{}' cannot hold {}", column.name, assignment.value),
            ));
        }
    }
    Ok(())
}

impl Tables {
    fn select(
        &self,
        schema: &TableSchema,
        predicate: &Predicate,
        sort: &SortSpec,
        window: Option<Pagination>,
    ) -> Vec<Row> {
        let Some(table) = self.tables.get(schema.name) else {
            return Vec::new();
        };
        let (offset, limit) = window.map_or((0, usize::MAX), |w| {
            (to_usize(w.offset), to_usize(w.limit))
        });

        let matched = table.rows.values().filter(|row| predicate.matches(row));
        if sort.follows_primary_key(schema) {
            return matched.skip(offset).take(limit).cloned().collect();
        }

        let mut matched: Vec<&Row> = matched.collect();
        matched.sort_by(|a, b| sort.compare(a, b));
        matched.into_iter().skip(offset).take(limit).cloned().collect()
    }

    fn count(&self, schema: &TableSchema, predicate: &Predicate) -> u64 {
        self.tables.get(schema.name).map_or(0, |table| {
            table.rows.values().filter(|row| predicate.matches(row)).count() as u64
        })
    }

    fn apply(&mut self, schema: &'static TableSchema, mutation: &Mutation) -> StoreResult<u64> {
        let table = self.tables.entry(schema.name).or_default();
        match mutation {
            Mutation::Insert { assignments } => {
                check_assignments(schema, assignments, true)?;
                let mut row = schema.default_row();
                let mut key = None;
                for assignment in assignments {
                    if assignment.column == schema.primary_key {
                        key = assignment.value.as_integer();
                    }
                    row.set(assignment.column, assignment.value.clone());
                }
                let key = match key {
                    Some(key) => key,
                    None => {
                        let key = table.allocate_key();
                        row.set(schema.primary_key, Value::Integer(key));
                        key
                    }
                };
                if table.rows.contains_key(&key) {
                    return Err(StoreError::unique_violation(
                        StoreOperation::Apply,
                        format!("{} = {} already exists", schema.primary_key_name(), key),
                    )
                    .add_context(schema.name));
                }
                table.next_key = table.next_key.max(key.saturating_add(1));
                table.rows.insert(key, row);
                Ok(1)
            }
            Mutation::Update {
                target,
                assignments,
            } => {
                check_assignments(schema, assignments, false)?;
                let keys = table.target_keys(target);
                for key in &keys {
                    if let Some(row) = table.rows.get_mut(key) {
                        for assignment in assignments {
                            row.set(assignment.column, assignment.value.clone());
                        }
                    }
                }
                Ok(keys.len() as u64)
            }
            Mutation::Delete { target } => {
                if let Target::Matching(Predicate::Always) = target {
                    let removed = table.rows.len() as u64;
                    table.rows.clear();
                    return Ok(removed);
                }
                let keys = table.target_keys(target);
                for key in &keys {
                    table.rows.remove(key);
                }
                Ok(keys.len() as u64)
            }
        }
    }

    fn next_identity(&mut self, schema: &TableSchema) -> i64 {
        self.tables.entry(schema.name).or_default().allocate_key()
    }
}

/// In-process [`Store`] backed by ordered maps
///
/// Cloning shares the underlying tables. An open [`MemoryTransaction`] holds
/// the store's write lock, so calls on the store itself wait until the
/// transaction is committed, rolled back or dropped.
///
/// # Example
///
/// ```rust
/// use partition_repo::store::MemoryStore;
///
/// let store = MemoryStore::new();
/// store.set_available(false);
/// assert!(!store.is_available());
/// ```
#[derive(Debug, Clone)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
    available: Arc<AtomicBool>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// An empty, available store
    pub fn new() -> Self {
        Self {
            tables: Arc::new(RwLock::new(Tables::default())),
            available: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Make every subsequent call succeed or fail with `Unavailable`
    pub fn set_available(&self, available: bool) {
        self.available.store(available, AtomicOrdering::SeqCst);
        tracing::debug!(available, "memory store availability changed");
    }

    /// Whether calls are currently accepted
    pub fn is_available(&self) -> bool {
        self.available.load(AtomicOrdering::SeqCst)
    }

    fn check(&self, operation: StoreOperation) -> StoreResult<()> {
        check_available(&self.available, operation)
    }
}

fn check_available(available: &AtomicBool, operation: StoreOperation) -> StoreResult<()> {
    if available.load(AtomicOrdering::SeqCst) {
        Ok(())
    } else {
        Err(StoreError::unavailable(operation, "memory store is offline"))
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn select(
        &self,
        table: &'static TableSchema,
        predicate: &Predicate,
        sort: &SortSpec,
        window: Option<Pagination>,
    ) -> StoreResult<Vec<Row>> {
        self.check(StoreOperation::Select)?;
        Ok(self.tables.read().await.select(table, predicate, sort, window))
    }

    async fn count(&self, table: &'static TableSchema, predicate: &Predicate) -> StoreResult<u64> {
        self.check(StoreOperation::Count)?;
        Ok(self.tables.read().await.count(table, predicate))
    }

    async fn apply(&self, table: &'static TableSchema, mutation: &Mutation) -> StoreResult<u64> {
        self.check(StoreOperation::Apply)?;
        self.tables.write().await.apply(table, mutation)
    }

    async fn next_identity(&self, table: &'static TableSchema) -> StoreResult<i64> {
        self.check(StoreOperation::NextIdentity)?;
        Ok(self.tables.write().await.next_identity(table))
    }
}

#[async_trait]
impl TransactionalStore for MemoryStore {
    type Transaction = MemoryTransaction;

    async fn begin(&self) -> StoreResult<MemoryTransaction> {
        self.check(StoreOperation::Transaction)?;
        let guard = Arc::clone(&self.tables).write_owned().await;
        let staged = Tables::clone(&guard);
        tracing::debug!("memory transaction started");
        Ok(MemoryTransaction {
            guard,
            staged: Mutex::new(staged),
            available: Arc::clone(&self.available),
        })
    }
}

/// Transaction over a [`MemoryStore`]
///
/// Writes go to a private copy of the tables that replaces the store's
/// contents on commit.
#[derive(Debug)]
pub struct MemoryTransaction {
    guard: OwnedRwLockWriteGuard<Tables>,
    staged: Mutex<Tables>,
    available: Arc<AtomicBool>,
}

#[async_trait]
impl Store for MemoryTransaction {
    async fn select(
        &self,
        table: &'static TableSchema,
        predicate: &Predicate,
        sort: &SortSpec,
        window: Option<Pagination>,
    ) -> StoreResult<Vec<Row>> {
        check_available(&self.available, StoreOperation::Select)?;
        Ok(self.staged.lock().await.select(table, predicate, sort, window))
    }

    async fn count(&self, table: &'static TableSchema, predicate: &Predicate) -> StoreResult<u64> {
        check_available(&self.available, StoreOperation::Count)?;
        Ok(self.staged.lock().await.count(table, predicate))
    }

    async fn apply(&self, table: &'static TableSchema, mutation: &Mutation) -> StoreResult<u64> {
        check_available(&self.available, StoreOperation::Apply)?;
        self.staged.lock().await.apply(table, mutation)
    }

    async fn next_identity(&self, table: &'static TableSchema) -> StoreResult<i64> {
        check_available(&self.available, StoreOperation::NextIdentity)?;
        Ok(self.staged.lock().await.next_identity(table))
    }
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn commit(self) -> StoreResult<()> {
        check_available(&self.available, StoreOperation::Transaction)?;
        let Self {
            mut guard, staged, ..
        } = self;
        *guard = staged.into_inner();
        tracing::debug!("memory transaction committed");
        Ok(())
    }

    async fn rollback(self) -> StoreResult<()> {
        tracing::debug!("memory transaction rolled back");
        Ok(())
    }
}

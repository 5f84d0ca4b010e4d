//! PostgreSQL store
//!
//! Compiled predicates, sort keys and mutations are rendered with
//! [`QueryBuilder`] and bind parameters. Identifiers are always quoted.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::{future, TryStreamExt};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Postgres, QueryBuilder, Row as _};
use tokio::sync::Mutex;

use super::{
    Assignment, Mutation, Store, StoreError, StoreOperation, StoreResult, StoreTransaction, Target,
    TransactionalStore,
};
use crate::config::DatabaseConfig;
use crate::error::sanitize_url;
use crate::repository::{CompiledCondition, Operand, Operator, Pagination, Predicate, SortSpec};
use crate::schema::{Column, Row, TableSchema};
use crate::value::{Value, ValueType};

type Builder = QueryBuilder<'static, Postgres>;

fn quote(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

fn column_at(schema: &TableSchema, index: usize) -> StoreResult<&Column> {
    schema.column(index).ok_or_else(|| {
        StoreError::query_failed(
            StoreOperation::Select,
            format!("column {} out of range", index),
        )
        .add_context(schema.name)
    })
}

fn sql_type(value_type: ValueType) -> &'static str {
    match value_type {
        ValueType::Integer => "BIGINT",
        ValueType::Text => "TEXT",
        ValueType::Timestamp => "TIMESTAMPTZ",
    }
}

fn push_value(qb: &mut Builder, value_type: ValueType, value: &Value) {
    match value {
        Value::Null => match value_type {
            ValueType::Integer => qb.push_bind(None::<i64>),
            ValueType::Text => qb.push_bind(None::<String>),
            ValueType::Timestamp => qb.push_bind(None::<DateTime<Utc>>),
        },
        Value::Integer(n) => qb.push_bind(*n),
        Value::Text(s) => qb.push_bind(s.clone()),
        Value::Timestamp(ts) => qb.push_bind(*ts),
    };
}

fn push_condition(
    qb: &mut Builder,
    schema: &TableSchema,
    condition: &CompiledCondition,
) -> StoreResult<()> {
    let column = column_at(schema, condition.column())?;
    qb.push(quote(column.name));
    match (condition.operator(), condition.operand()) {
        (Operator::IsNull, _) => {
            qb.push(" IS NULL");
        }
        (Operator::IsNotNull, _) => {
            qb.push(" IS NOT NULL");
        }
        (op @ (Operator::In | Operator::NotIn), Operand::Set(values)) => {
            qb.push(format!(" {} (", op));
            for (i, value) in values.iter().enumerate() {
                if i > 0 {
                    qb.push(", ");
                }
                push_value(qb, column.value_type, value);
            }
            qb.push(")");
        }
        (op, Operand::Single(value)) => {
            qb.push(format!(" {} ", op));
            push_value(qb, column.value_type, value);
        }
        (op, _) => {
            return Err(StoreError::query_failed(
                StoreOperation::Select,
                format!("{} on '{}' has no usable operand", op, column.name),
            ));
        }
    }
    Ok(())
}

fn push_where(qb: &mut Builder, schema: &TableSchema, predicate: &Predicate) -> StoreResult<()> {
    let Predicate::AnyOf(conjunctions) = predicate else {
        return Ok(());
    };
    qb.push(" WHERE ");
    for (i, conjunction) in conjunctions.iter().enumerate() {
        if i > 0 {
            qb.push(" OR ");
        }
        qb.push("(");
        if conjunction.conditions().is_empty() {
            qb.push("TRUE");
        }
        for (j, condition) in conjunction.conditions().iter().enumerate() {
            if j > 0 {
                qb.push(" AND ");
            }
            push_condition(qb, schema, condition)?;
        }
        qb.push(")");
    }
    Ok(())
}

fn push_target(qb: &mut Builder, schema: &TableSchema, target: &Target) -> StoreResult<()> {
    match target {
        Target::PrimaryKey(key) => {
            qb.push(" WHERE ")
                .push(quote(schema.primary_key_name()))
                .push(" = ")
                .push_bind(*key);
            Ok(())
        }
        Target::Matching(predicate) => push_where(qb, schema, predicate),
    }
}

fn column_list(schema: &TableSchema) -> String {
    schema
        .columns
        .iter()
        .map(|c| quote(c.name))
        .collect::<Vec<_>>()
        .join(", ")
}

fn render_select(
    schema: &TableSchema,
    predicate: &Predicate,
    sort: &SortSpec,
    window: Option<Pagination>,
) -> StoreResult<Builder> {
    let mut qb = Builder::new(format!(
        "SELECT {} FROM {}",
        column_list(schema),
        quote(schema.name)
    ));
    push_where(&mut qb, schema, predicate)?;

    let mut keys = Vec::with_capacity(sort.keys().len());
    for key in sort.keys() {
        let column = column_at(schema, key.column)?;
        // Byte order for text, the same order the memory store uses
        let collation = if column.value_type == ValueType::Text {
            " COLLATE \"C\""
        } else {
            ""
        };
        keys.push(format!(
            "{}{} {}",
            quote(column.name),
            collation,
            key.direction.as_sql()
        ));
    }
    if !keys.is_empty() {
        qb.push(" ORDER BY ").push(keys.join(", "));
    }

    if let Some(window) = window {
        qb.push(" LIMIT ")
            .push_bind(i64::try_from(window.limit).unwrap_or(i64::MAX))
            .push(" OFFSET ")
            .push_bind(i64::try_from(window.offset).unwrap_or(i64::MAX));
    }
    Ok(qb)
}

fn render_count(schema: &TableSchema, predicate: &Predicate) -> StoreResult<Builder> {
    let mut qb = Builder::new(format!("SELECT COUNT(*) FROM {}", quote(schema.name)));
    push_where(&mut qb, schema, predicate)?;
    Ok(qb)
}

fn push_assignments(
    qb: &mut Builder,
    schema: &TableSchema,
    assignments: &[Assignment],
) -> StoreResult<()> {
    for (i, assignment) in assignments.iter().enumerate() {
        let column = column_at(schema, assignment.column)?;
        if i > 0 {
            qb.push(", ");
        }
        qb.push(quote(column.name)).push(" = ");
        push_value(qb, column.value_type, &assignment.value);
    }
    Ok(())
}

/// `pg_get_serial_sequence(table, key)::regclass` with bound arguments
fn push_sequence(qb: &mut Builder, schema: &TableSchema) {
    qb.push("pg_get_serial_sequence(")
        .push_bind(quote(schema.name))
        .push(", ")
        .push_bind(schema.primary_key_name())
        .push(")::regclass");
}

fn render_mutation(schema: &TableSchema, mutation: &Mutation) -> StoreResult<Builder> {
    let table = quote(schema.name);
    match mutation {
        Mutation::Insert { assignments } if assignments.is_empty() => {
            Ok(Builder::new(format!("INSERT INTO {} DEFAULT VALUES", table)))
        }
        Mutation::Insert { assignments } => {
            let mut names = Vec::with_capacity(assignments.len());
            for assignment in assignments {
                names.push(quote(column_at(schema, assignment.column)?.name));
            }
            let explicit_key = assignments.iter().any(|a| a.column == schema.primary_key);
            let pk = quote(schema.primary_key_name());
            let mut qb = Builder::new("");
            if explicit_key {
                qb.push("WITH \"inserted\" AS (");
            }
            qb.push(format!("INSERT INTO {} ({}) VALUES (", table, names.join(", ")));
            for (i, assignment) in assignments.iter().enumerate() {
                if i > 0 {
                    qb.push(", ");
                }
                let column = column_at(schema, assignment.column)?;
                push_value(&mut qb, column.value_type, &assignment.value);
            }
            qb.push(")");
            if explicit_key {
                // Move the key sequence past the supplied key so later
                // allocations cannot collide with it
                qb.push(format!(" RETURNING {}) SELECT setval(", pk));
                push_sequence(&mut qb, schema);
                qb.push(format!(", GREATEST(\"inserted\".{}, COALESCE(pg_sequence_last_value(", pk));
                push_sequence(&mut qb, schema);
                qb.push("), 0), 1)) FROM \"inserted\"");
            }
            Ok(qb)
        }
        Mutation::Update {
            target,
            assignments,
        } => {
            if assignments.iter().any(|a| a.column == schema.primary_key) {
                return Err(StoreError::constraint_violation(
                    StoreOperation::Apply,
                    format!("primary key '{}' is immutable", schema.primary_key_name()),
                ));
            }
            let mut qb = Builder::new(format!("UPDATE {} SET ", table));
            if assignments.is_empty() {
                // Touch nothing but still report the matched rows
                let pk = quote(schema.primary_key_name());
                qb.push(format!("{} = {}", pk, pk));
            } else {
                push_assignments(&mut qb, schema, assignments)?;
            }
            push_target(&mut qb, schema, target)?;
            Ok(qb)
        }
        Mutation::Delete { target } => {
            let mut qb = Builder::new(format!("DELETE FROM {}", table));
            push_target(&mut qb, schema, target)?;
            Ok(qb)
        }
    }
}

fn default_literal(column: &Column) -> Option<&'static str> {
    if column.nullable {
        return None;
    }
    Some(match column.value_type {
        ValueType::Integer => "0",
        ValueType::Text => "''",
        ValueType::Timestamp => "'1970-01-01T00:00:00Z'",
    })
}

/// `CREATE TABLE IF NOT EXISTS` for `schema`
///
/// The primary key is a `BIGSERIAL`; every other non-null column defaults to
/// its type-default.
pub(crate) fn create_table_sql(schema: &TableSchema) -> String {
    let columns = schema
        .columns
        .iter()
        .enumerate()
        .map(|(index, column)| {
            if index == schema.primary_key {
                return format!("{} BIGSERIAL PRIMARY KEY", quote(column.name));
            }
            match default_literal(column) {
                Some(default) => format!(
                    "{} {} NOT NULL DEFAULT {}",
                    quote(column.name),
                    sql_type(column.value_type),
                    default
                ),
                None => format!("{} {}", quote(column.name), sql_type(column.value_type)),
            }
        })
        .collect::<Vec<_>>()
        .join(", ");
    format!("CREATE TABLE IF NOT EXISTS {} ({})", quote(schema.name), columns)
}

fn decode_row(schema: &TableSchema, row: &PgRow) -> StoreResult<Row> {
    let mut values = Vec::with_capacity(schema.columns.len());
    for (index, column) in schema.columns.iter().enumerate() {
        let value = match column.value_type {
            ValueType::Integer => Value::from(row.try_get::<Option<i64>, _>(index)?),
            ValueType::Text => Value::from(row.try_get::<Option<String>, _>(index)?),
            ValueType::Timestamp => {
                Value::from(row.try_get::<Option<DateTime<Utc>>, _>(index)?)
            }
        };
        values.push(value);
    }
    Ok(Row::new(values))
}

fn decode_rows(schema: &TableSchema, rows: &[PgRow]) -> StoreResult<Vec<Row>> {
    rows.iter().map(|row| decode_row(schema, row)).collect()
}

fn db_error(operation: StoreOperation, schema: &TableSchema) -> impl Fn(sqlx::Error) -> StoreError + '_ {
    move |err| StoreError::from(err).during(operation).add_context(schema.name)
}

fn log_failure(err: &StoreError) {
    tracing::warn!(kind = %err.kind, operation = %err.operation, "store call failed: {}", err.message);
}

/// PostgreSQL-backed [`Store`]
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect with retries and exponential backoff
    ///
    /// Creates the table for `schema` when `initialize_schema` is set.
    pub async fn connect(config: &DatabaseConfig, schema: &TableSchema) -> StoreResult<Self> {
        let pool = create_pool_with_retries(config).await?;
        let store = Self { pool };
        if config.initialize_schema {
            store.initialize(schema).await?;
        }
        Ok(store)
    }

    /// Wrap an existing pool
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the table for `schema` if it does not exist
    pub async fn initialize(&self, schema: &TableSchema) -> StoreResult<()> {
        let sql = create_table_sql(schema);
        tracing::debug!(table = schema.name, "creating table if missing");
        sqlx::query(&sql)
            .execute(&self.pool)
            .await
            .map_err(db_error(StoreOperation::Initialize, schema))?;
        Ok(())
    }
}

async fn create_pool_with_retries(config: &DatabaseConfig) -> StoreResult<PgPool> {
    let mut attempt = 0;
    let base_delay = Duration::from_secs(config.retry_delay_secs);

    loop {
        match try_create_pool(config).await {
            Ok(pool) => {
                if attempt > 0 {
                    tracing::info!(
                        "Database connection established after {} attempt(s)",
                        attempt + 1
                    );
                } else {
                    tracing::info!(
                        "Database connection pool created: max={}, min={}",
                        config.max_connections,
                        config.min_connections
                    );
                }
                return Ok(pool);
            }
            Err(e) => {
                attempt += 1;

                if attempt > config.max_retries {
                    tracing::error!(
                        "Failed to connect to database after {} attempts: {}",
                        config.max_retries + 1,
                        e
                    );
                    return Err(e);
                }

                let delay = base_delay * 2_u32.pow(attempt.saturating_sub(1));
                tracing::warn!(
                    "Database connection attempt {} failed: {}. Retrying in {:?}...",
                    attempt,
                    e,
                    delay
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

async fn try_create_pool(config: &DatabaseConfig) -> StoreResult<PgPool> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.connection_timeout_secs))
        .connect(&config.url)
        .await
        .map_err(|e| {
            StoreError::unavailable(
                StoreOperation::Connect,
                format!(
                    "Failed to connect to database at '{}': {}",
                    sanitize_url(&config.url),
                    e
                ),
            )
        })
}

#[async_trait]
impl Store for PgStore {
    async fn select(
        &self,
        table: &'static TableSchema,
        predicate: &Predicate,
        sort: &SortSpec,
        window: Option<Pagination>,
    ) -> StoreResult<Vec<Row>> {
        let mut qb = render_select(table, predicate, sort, window)?;
        qb.build()
            .fetch(&self.pool)
            .map_err(db_error(StoreOperation::Select, table))
            .and_then(|row| future::ready(decode_row(table, &row)))
            .try_collect()
            .await
            .inspect_err(log_failure)
    }

    async fn count(&self, table: &'static TableSchema, predicate: &Predicate) -> StoreResult<u64> {
        let mut qb = render_count(table, predicate)?;
        let count: i64 = qb
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .map_err(db_error(StoreOperation::Count, table))
            .inspect_err(log_failure)?;
        Ok(count.max(0) as u64)
    }

    async fn apply(&self, table: &'static TableSchema, mutation: &Mutation) -> StoreResult<u64> {
        let mut qb = render_mutation(table, mutation)?;
        let result = qb
            .build()
            .execute(&self.pool)
            .await
            .map_err(db_error(StoreOperation::Apply, table))
            .inspect_err(log_failure)?;
        Ok(result.rows_affected())
    }

    async fn next_identity(&self, table: &'static TableSchema) -> StoreResult<i64> {
        sqlx::query_scalar("SELECT nextval(pg_get_serial_sequence($1, $2))")
            .bind(quote(table.name))
            .bind(table.primary_key_name())
            .fetch_one(&self.pool)
            .await
            .map_err(db_error(StoreOperation::NextIdentity, table))
            .inspect_err(log_failure)
    }
}

#[async_trait]
impl TransactionalStore for PgStore {
    type Transaction = PgTransaction;

    async fn begin(&self) -> StoreResult<PgTransaction> {
        let tx = self.pool.begin().await.map_err(|e| {
            StoreError::from(e).during(StoreOperation::Transaction)
        })?;
        Ok(PgTransaction { tx: Mutex::new(tx) })
    }
}

/// Transaction over a [`PgStore`]
///
/// Dropping it without commit rolls back.
pub struct PgTransaction {
    tx: Mutex<sqlx::Transaction<'static, Postgres>>,
}

impl fmt::Debug for PgTransaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PgTransaction").finish_non_exhaustive()
    }
}

#[async_trait]
impl Store for PgTransaction {
    async fn select(
        &self,
        table: &'static TableSchema,
        predicate: &Predicate,
        sort: &SortSpec,
        window: Option<Pagination>,
    ) -> StoreResult<Vec<Row>> {
        let mut qb = render_select(table, predicate, sort, window)?;
        let mut tx = self.tx.lock().await;
        let rows = qb
            .build()
            .fetch_all(&mut **tx)
            .await
            .map_err(db_error(StoreOperation::Select, table))
            .inspect_err(log_failure)?;
        decode_rows(table, &rows)
    }

    async fn count(&self, table: &'static TableSchema, predicate: &Predicate) -> StoreResult<u64> {
        let mut qb = render_count(table, predicate)?;
        let mut tx = self.tx.lock().await;
        let count: i64 = qb
            .build_query_scalar()
            .fetch_one(&mut **tx)
            .await
            .map_err(db_error(StoreOperation::Count, table))
            .inspect_err(log_failure)?;
        Ok(count.max(0) as u64)
    }

    async fn apply(&self, table: &'static TableSchema, mutation: &Mutation) -> StoreResult<u64> {
        let mut qb = render_mutation(table, mutation)?;
        let mut tx = self.tx.lock().await;
        let result = qb
            .build()
            .execute(&mut **tx)
            .await
            .map_err(db_error(StoreOperation::Apply, table))
            .inspect_err(log_failure)?;
        Ok(result.rows_affected())
    }

    async fn next_identity(&self, table: &'static TableSchema) -> StoreResult<i64> {
        let mut tx = self.tx.lock().await;
        sqlx::query_scalar("SELECT nextval(pg_get_serial_sequence($1, $2))")
            .bind(quote(table.name))
            .bind(table.primary_key_name())
            .fetch_one(&mut **tx)
            .await
            .map_err(db_error(StoreOperation::NextIdentity, table))
            .inspect_err(log_failure)
    }
}

#[async_trait]
impl StoreTransaction for PgTransaction {
    async fn commit(self) -> StoreResult<()> {
        self.tx
            .into_inner()
            .commit()
            .await
            .map_err(|e| StoreError::from(e).during(StoreOperation::Transaction))
    }

    async fn rollback(self) -> StoreResult<()> {
        self.tx
            .into_inner()
            .rollback()
            .await
            .map_err(|e| StoreError::from(e).during(StoreOperation::Transaction))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{Criteria, CriteriaGroup, OrderBy, OrderDirection};

    const COLUMNS: [Column; 4] = [
        Column::new("id", ValueType::Integer),
        Column::new("table", ValueType::Text),
        Column::new("node_id", ValueType::Integer).nullable(),
        Column::new("created_at", ValueType::Timestamp).nullable(),
    ];

    static TABLE: TableSchema = TableSchema {
        name: "partitions",
        columns: &COLUMNS,
        primary_key: 0,
    };

    fn predicate(criteria: Criteria) -> Predicate {
        Predicate::compile(&TABLE, &criteria).unwrap()
    }

    #[test]
    fn test_render_select_unfiltered() {
        let qb = render_select(&TABLE, &Predicate::Always, &SortSpec::primary_key(&TABLE), None)
            .unwrap();
        assert_eq!(
            qb.sql(),
            r#"SELECT "id", "table", "node_id", "created_at" FROM "partitions" ORDER BY "id" ASC"#
        );
    }

    #[test]
    fn test_render_select_or_of_ands_with_window() {
        let criteria = Criteria::new()
            .or(CriteriaGroup::new().eq("table", "t1").in_values("node_id", [1_i64, 2]))
            .or(CriteriaGroup::new().is_null("node_id"));
        let sort = SortSpec::compile(&TABLE, &[OrderBy::new("table", OrderDirection::Descending)])
            .unwrap();
        let qb = render_select(&TABLE, &predicate(criteria), &sort, Some(Pagination::new(40, 20)))
            .unwrap();
        assert_eq!(
            qb.sql(),
            concat!(
                r#"SELECT "id", "table", "node_id", "created_at" FROM "partitions""#,
                r#" WHERE ("table" = $1 AND "node_id" IN ($2, $3)) OR ("node_id" IS NULL)"#,
                r#" ORDER BY "table" COLLATE "C" DESC, "id" ASC LIMIT $4 OFFSET $5"#
            )
        );
    }

    #[test]
    fn test_render_select_collates_text_keys_only() {
        let sort = SortSpec::compile(
            &TABLE,
            &[
                OrderBy::new("node_id", OrderDirection::Ascending),
                OrderBy::new("table", OrderDirection::Ascending),
            ],
        )
        .unwrap();
        let qb = render_select(&TABLE, &Predicate::Always, &sort, None).unwrap();
        assert_eq!(
            qb.sql(),
            concat!(
                r#"SELECT "id", "table", "node_id", "created_at" FROM "partitions""#,
                r#" ORDER BY "node_id" ASC, "table" COLLATE "C" ASC, "id" ASC"#
            )
        );
    }

    #[test]
    fn test_render_count() {
        let criteria = Criteria::matching(CriteriaGroup::new().like("table", "t%"));
        let qb = render_count(&TABLE, &predicate(criteria)).unwrap();
        assert_eq!(
            qb.sql(),
            r#"SELECT COUNT(*) FROM "partitions" WHERE ("table" LIKE $1)"#
        );
    }

    #[test]
    fn test_render_insert() {
        let mutation = Mutation::Insert {
            assignments: vec![
                Assignment {
                    column: 1,
                    value: Value::from("t1"),
                },
                Assignment {
                    column: 2,
                    value: Value::Null,
                },
            ],
        };
        let qb = render_mutation(&TABLE, &mutation).unwrap();
        assert_eq!(
            qb.sql(),
            r#"INSERT INTO "partitions" ("table", "node_id") VALUES ($1, $2)"#
        );
    }

    #[test]
    fn test_render_insert_with_key_advances_sequence() {
        let mutation = Mutation::Insert {
            assignments: vec![
                Assignment {
                    column: 0,
                    value: Value::Integer(7),
                },
                Assignment {
                    column: 1,
                    value: Value::from("t1"),
                },
            ],
        };
        let qb = render_mutation(&TABLE, &mutation).unwrap();
        assert_eq!(
            qb.sql(),
            concat!(
                r#"WITH "inserted" AS (INSERT INTO "partitions" ("id", "table") VALUES ($1, $2)"#,
                r#" RETURNING "id") SELECT setval(pg_get_serial_sequence($3, $4)::regclass,"#,
                r#" GREATEST("inserted"."id", COALESCE(pg_sequence_last_value("#,
                r#"pg_get_serial_sequence($5, $6)::regclass), 0), 1)) FROM "inserted""#
            )
        );
    }

    #[test]
    fn test_render_update_by_key() {
        let mutation = Mutation::Update {
            target: Target::PrimaryKey(3),
            assignments: vec![Assignment {
                column: 1,
                value: Value::from("t2"),
            }],
        };
        let qb = render_mutation(&TABLE, &mutation).unwrap();
        assert_eq!(
            qb.sql(),
            r#"UPDATE "partitions" SET "table" = $1 WHERE "id" = $2"#
        );
    }

    #[test]
    fn test_render_update_rejects_primary_key() {
        let mutation = Mutation::Update {
            target: Target::Matching(Predicate::Always),
            assignments: vec![Assignment {
                column: 0,
                value: Value::Integer(1),
            }],
        };
        assert!(render_mutation(&TABLE, &mutation).is_err());
    }

    #[test]
    fn test_render_delete_all() {
        let mutation = Mutation::Delete {
            target: Target::Matching(Predicate::Always),
        };
        let qb = render_mutation(&TABLE, &mutation).unwrap();
        assert_eq!(qb.sql(), r#"DELETE FROM "partitions""#);
    }

    #[test]
    fn test_create_table_sql() {
        assert_eq!(
            create_table_sql(&TABLE),
            concat!(
                r#"CREATE TABLE IF NOT EXISTS "partitions" ("id" BIGSERIAL PRIMARY KEY,"#,
                r#" "table" TEXT NOT NULL DEFAULT '', "node_id" BIGINT, "created_at" TIMESTAMPTZ)"#
            )
        );
    }

    #[test]
    fn test_quote_escapes() {
        assert_eq!(quote("a\"b"), "\"a\"\"b\"");
    }
}

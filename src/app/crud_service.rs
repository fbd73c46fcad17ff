//! Generic CRUD over tables discovered at runtime.
//!
//! Every operation follows the same path: describe the table, coerce the payload against the
//! live column metadata, build a parameterized statement and run it inside its own transaction.

use crate::domain::coerce::{coerce, coerce_field, FieldMode, SqlValue};
use crate::domain::schema::{SchemaProvider, TableDescriptor};
use crate::error::{CrudError, CrudResult};
use crate::storage::query::{self, Statement};
use serde::Serialize;
use serde_json::{Map as JsonMap, Value as JsonValue};
use sqlx::{PgPool, Postgres, Row, Transaction};
use std::sync::Arc;

/// Result of a successful insert.
#[derive(Debug, Clone, Serialize)]
pub struct CreateOutcome {
    /// Generated primary key, `null` for tables without one.
    pub id: JsonValue,
    /// The coerced values that were written, keyed by column.
    pub fields: JsonMap<String, JsonValue>,
}

/// Result of an update request.
#[derive(Debug, Clone, Serialize)]
pub struct UpdateOutcome {
    pub id: JsonValue,
    /// Columns included in the `SET` clause; empty for a no-op.
    pub updated: Vec<String>,
    pub rows_affected: u64,
}

impl UpdateOutcome {
    pub fn is_noop(&self) -> bool {
        self.updated.is_empty()
    }
}

pub struct CrudService {
    pool: PgPool,
    schema: Arc<dyn SchemaProvider>,
}

impl CrudService {
    pub fn new(pool: PgPool, schema: Arc<dyn SchemaProvider>) -> Self {
        Self { pool, schema }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Names of every user table.
    pub async fn list_tables(&self) -> CrudResult<Vec<String>> {
        Ok(self.schema.list_table_names().await?)
    }

    pub async fn describe(&self, table: &str) -> CrudResult<TableDescriptor> {
        Ok(self.schema.describe_table(table).await?)
    }

    /// Forgets every memoised table descriptor so the next operation reads the live catalog.
    pub fn refresh_schema(&self) {
        self.schema.invalidate_all();
    }

    /// Describes `table` for writing `data`. A key naming no known column may mean the memoised
    /// descriptor predates a schema change, so the table is described afresh once.
    async fn describe_for_payload(
        &self,
        table: &str,
        data: &JsonMap<String, JsonValue>,
    ) -> CrudResult<TableDescriptor> {
        let desc = self.describe(table).await?;
        if unknown_keys(&desc, data).next().is_none() {
            return Ok(desc);
        }
        self.schema.invalidate(table);
        let desc = self.describe(table).await?;
        for key in unknown_keys(&desc, data) {
            tracing::debug!(table, column = %key, "ignoring field that is not a column");
        }
        Ok(desc)
    }

    /// Inserts one row built from `data`. Primary-key fields in the payload are ignored.
    pub async fn create(
        &self,
        table: &str,
        data: &JsonMap<String, JsonValue>,
    ) -> CrudResult<CreateOutcome> {
        let desc = self.describe_for_payload(table, data).await?;

        let supplied = desc.writable_columns().filter(|c| data.contains_key(&c.name)).count();
        if supplied == 0 {
            return Err(CrudError::EmptyPayload);
        }

        let mut row = Vec::new();
        for col in desc.writable_columns() {
            if let Some(value) = coerce_field(col, data.get(&col.name), FieldMode::Create)? {
                row.push((col.name.clone(), value));
            }
        }

        let stmt = query::insert(&desc, &row)?;
        log_statement(table, &stmt);

        let mut tx = self.pool.begin().await?;
        let id = if desc.primary_key().is_some() {
            match stmt.to_query().fetch_one(&mut *tx).await {
                Ok(r) => r.try_get::<Option<JsonValue>, _>("id").ok().flatten(),
                Err(e) => return Err(self.abort(tx, table, e).await),
            }
        } else {
            if let Err(e) = stmt.to_query().execute(&mut *tx).await {
                return Err(self.abort(tx, table, e).await);
            }
            None
        };
        tx.commit().await?;

        let id = id.unwrap_or(JsonValue::Null);
        tracing::info!(table, id = %id, "row created");
        Ok(CreateOutcome {
            id,
            fields: row.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
        })
    }

    /// Every row of `table` as a JSON object, in primary-key order.
    pub async fn read_all(&self, table: &str) -> CrudResult<Vec<JsonValue>> {
        let desc = self.describe(table).await?;
        let stmt = query::select_all(&desc);
        log_statement(table, &stmt);

        let mut tx = self.pool.begin().await?;
        let rows = match stmt.to_query().fetch_all(&mut *tx).await {
            Ok(rows) => rows,
            Err(e) => return Err(self.abort(tx, table, e).await),
        };
        tx.commit().await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let record: JsonValue = row.try_get("record")?;
            records.push(record);
        }
        tracing::debug!(table, count = records.len(), "rows read");
        Ok(records)
    }

    /// The row whose primary key equals `id`.
    pub async fn read_one(&self, table: &str, id: &JsonValue) -> CrudResult<JsonValue> {
        let desc = self.describe(table).await?;
        let key = primary_id(&desc, id)?;
        let stmt = query::select_one(&desc, key)?;
        log_statement(table, &stmt);

        let mut tx = self.pool.begin().await?;
        let row = match stmt.to_query().fetch_optional(&mut *tx).await {
            Ok(row) => row,
            Err(e) => return Err(self.abort(tx, table, e).await),
        };
        tx.commit().await?;

        match row {
            Some(r) => Ok(r.try_get("record")?),
            None => Err(row_not_found(table, id)),
        }
    }

    /// Updates the row addressed by `data[<primary key>]` (or `data["id"]`) with the remaining
    /// fields. Columns absent from `data` are left untouched.
    pub async fn update(
        &self,
        table: &str,
        data: &JsonMap<String, JsonValue>,
    ) -> CrudResult<UpdateOutcome> {
        if data.is_empty() {
            return Err(CrudError::EmptyPayload);
        }
        let desc = self.describe_for_payload(table, data).await?;
        let pk = desc
            .primary_key()
            .ok_or_else(|| CrudError::MissingPrimaryKey(table.to_string()))?;
        let id = data
            .get(&pk.name)
            .or_else(|| data.get("id"))
            .filter(|v| !v.is_null())
            .ok_or(CrudError::MissingField("No ID provided"))?
            .clone();

        self.update_row(&desc, &id, data).await
    }

    async fn update_row(
        &self,
        desc: &TableDescriptor,
        id: &JsonValue,
        data: &JsonMap<String, JsonValue>,
    ) -> CrudResult<UpdateOutcome> {
        let table = desc.name.as_str();
        let key = primary_id(desc, id)?;

        let mut changes = Vec::new();
        for col in desc.writable_columns() {
            if let Some(value) = coerce_field(col, data.get(&col.name), FieldMode::Update)? {
                changes.push((col.name.clone(), value));
            }
        }

        if changes.is_empty() {
            tracing::warn!(table, id = %id, "no valid data to update");
            return Ok(UpdateOutcome {
                id: id.clone(),
                updated: Vec::new(),
                rows_affected: 0,
            });
        }

        let stmt = query::update(desc, key, &changes)?;
        log_statement(table, &stmt);

        let mut tx = self.pool.begin().await?;
        let done = match stmt.to_query().execute(&mut *tx).await {
            Ok(done) => done,
            Err(e) => return Err(self.abort(tx, table, e).await),
        };
        tx.commit().await?;

        tracing::info!(table, id = %id, rows = done.rows_affected(), "row updated");
        Ok(UpdateOutcome {
            id: id.clone(),
            updated: changes.into_iter().map(|(k, _)| k).collect(),
            rows_affected: done.rows_affected(),
        })
    }

    /// Deletes the row whose primary key equals `id`; a missing row is `RowNotFound`.
    pub async fn delete(&self, table: &str, id: &JsonValue) -> CrudResult<()> {
        let desc = self.describe(table).await?;
        let key = primary_id(&desc, id)?;
        let stmt = query::delete(&desc, key)?;
        log_statement(table, &stmt);

        let mut tx = self.pool.begin().await?;
        let done = match stmt.to_query().execute(&mut *tx).await {
            Ok(done) => done,
            Err(e) => return Err(self.abort(tx, table, e).await),
        };
        tx.commit().await?;

        if done.rows_affected() == 0 {
            tracing::warn!(table, id = %id, "no row to delete");
            return Err(row_not_found(table, id));
        }
        tracing::info!(table, id = %id, "row deleted");
        Ok(())
    }

    /// Rolls back, forgets the cached descriptor (the table may have changed underneath us) and
    /// returns the error to propagate.
    async fn abort(&self, tx: Transaction<'_, Postgres>, table: &str, err: sqlx::Error) -> CrudError {
        tracing::error!(table, error = %err, "statement failed, rolling back");
        if let Err(rb) = tx.rollback().await {
            tracing::warn!(table, error = %rb, "rollback failed");
        }
        self.schema.invalidate(table);
        CrudError::Sql(err)
    }
}

/// Coerces a caller-supplied id to the primary key's native type.
fn primary_id(desc: &TableDescriptor, id: &JsonValue) -> CrudResult<SqlValue> {
    let pk = desc
        .primary_key()
        .ok_or_else(|| CrudError::MissingPrimaryKey(desc.name.clone()))?;
    if id.is_null() {
        return Err(CrudError::MissingField("No ID provided"));
    }
    Ok(coerce(pk, id)?)
}

/// Payload keys that are neither a column nor the `id` alias of the primary key.
fn unknown_keys<'a>(
    desc: &'a TableDescriptor,
    data: &'a JsonMap<String, JsonValue>,
) -> impl Iterator<Item = &'a String> {
    data.keys().filter(move |k| {
        desc.column(k).is_none() && !(k.as_str() == "id" && desc.primary_key().is_some())
    })
}

fn row_not_found(table: &str, id: &JsonValue) -> CrudError {
    CrudError::RowNotFound {
        table: table.to_string(),
        id: match id {
            JsonValue::String(s) => s.clone(),
            other => other.to_string(),
        },
    }
}

fn log_statement(table: &str, stmt: &Statement) {
    let params: Vec<&str> = stmt.params.iter().map(|(n, _)| n.as_str()).collect();
    tracing::debug!(table, sql = %stmt.sql, ?params, "executing");
}

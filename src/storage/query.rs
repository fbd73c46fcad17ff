//! Parameterized SQL generation for dynamically discovered tables.
//!
//! Values are never interpolated into SQL text. Identifiers are only accepted when they name a
//! column of the described table and are always emitted double-quoted.

use crate::domain::coerce::SqlValue;
use crate::domain::schema::{ColumnDescriptor, ColumnKind, TableDescriptor};
use sqlx::postgres::PgArguments;
use sqlx::query::Query;
use sqlx::Postgres;

/// Name of the bound parameter that addresses a row in update and delete statements.
pub const PRIMARY_ID: &str = "primary_id";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("Column {column} does not exist on table {table}")]
    UnknownColumn { table: String, column: String },

    #[error("No primary key found for table {0}")]
    MissingPrimaryKey(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Insert,
    Update,
    Delete,
    SelectAll,
    SelectOne,
}

/// A SQL string together with its named, positionally bound parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub kind: StatementKind,
    pub sql: String,
    pub params: Vec<(String, SqlValue)>,
}

impl Statement {
    pub fn param(&self, name: &str) -> Option<&SqlValue> {
        self.params.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Prepares a sqlx query with every parameter bound in order.
    pub fn to_query(&self) -> Query<'_, Postgres, PgArguments> {
        bind_params(sqlx::query(&self.sql), &self.params)
    }
}

/// Wraps an identifier in double quotes, doubling any embedded quote.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn placeholder(idx: usize, column: &ColumnDescriptor) -> String {
    format!("${}::{}", idx, quote_ident(&column.udt_name))
}

fn resolve<'a>(
    table: &'a TableDescriptor,
    column: &str,
) -> Result<&'a ColumnDescriptor, QueryError> {
    table.column(column).ok_or_else(|| QueryError::UnknownColumn {
        table: table.name.clone(),
        column: column.to_string(),
    })
}

fn require_pk(table: &TableDescriptor) -> Result<&ColumnDescriptor, QueryError> {
    table
        .primary_key()
        .ok_or_else(|| QueryError::MissingPrimaryKey(table.name.clone()))
}

/// `INSERT` for the given coerced row, returning the generated key when the table has one.
pub fn insert(table: &TableDescriptor, row: &[(String, SqlValue)]) -> Result<Statement, QueryError> {
    let mut columns = Vec::with_capacity(row.len());
    let mut placeholders = Vec::with_capacity(row.len());
    let mut params = Vec::with_capacity(row.len());

    for (idx, (name, value)) in row.iter().enumerate() {
        let col = resolve(table, name)?;
        columns.push(quote_ident(&col.name));
        placeholders.push(placeholder(idx + 1, col));
        params.push((col.name.clone(), value.clone()));
    }

    let mut sql = if columns.is_empty() {
        format!("INSERT INTO {} DEFAULT VALUES", quote_ident(&table.name))
    } else {
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_ident(&table.name),
            columns.join(", "),
            placeholders.join(", ")
        )
    };
    if let Some(pk) = table.primary_key() {
        sql.push_str(&format!(" RETURNING to_jsonb({}) AS id", quote_ident(&pk.name)));
    }

    Ok(Statement {
        kind: StatementKind::Insert,
        sql,
        params,
    })
}

/// `UPDATE ... SET ... WHERE pk = $n`. The caller guarantees `changes` is non-empty.
pub fn update(
    table: &TableDescriptor,
    id: SqlValue,
    changes: &[(String, SqlValue)],
) -> Result<Statement, QueryError> {
    let pk = require_pk(table)?;

    let mut sets = Vec::with_capacity(changes.len());
    let mut params = Vec::with_capacity(changes.len() + 1);
    for (idx, (name, value)) in changes.iter().enumerate() {
        let col = resolve(table, name)?;
        sets.push(format!("{} = {}", quote_ident(&col.name), placeholder(idx + 1, col)));
        params.push((col.name.clone(), value.clone()));
    }

    let sql = format!(
        "UPDATE {} SET {} WHERE {} = {}",
        quote_ident(&table.name),
        sets.join(", "),
        quote_ident(&pk.name),
        placeholder(params.len() + 1, pk)
    );
    params.push((PRIMARY_ID.to_string(), id));

    Ok(Statement {
        kind: StatementKind::Update,
        sql,
        params,
    })
}

pub fn delete(table: &TableDescriptor, id: SqlValue) -> Result<Statement, QueryError> {
    let pk = require_pk(table)?;
    Ok(Statement {
        kind: StatementKind::Delete,
        sql: format!(
            "DELETE FROM {} WHERE {} = {}",
            quote_ident(&table.name),
            quote_ident(&pk.name),
            placeholder(1, pk)
        ),
        params: vec![(PRIMARY_ID.to_string(), id)],
    })
}

/// Every row as a JSON object, ordered by primary key when the table has one.
pub fn select_all(table: &TableDescriptor) -> Statement {
    let order = table
        .primary_key()
        .map(|pk| format!(" ORDER BY t.{}", quote_ident(&pk.name)))
        .unwrap_or_default();
    Statement {
        kind: StatementKind::SelectAll,
        sql: format!(
            "SELECT row_to_json(t.*) AS record FROM {} t{}",
            quote_ident(&table.name),
            order
        ),
        params: Vec::new(),
    }
}

pub fn select_one(table: &TableDescriptor, id: SqlValue) -> Result<Statement, QueryError> {
    let pk = require_pk(table)?;
    Ok(Statement {
        kind: StatementKind::SelectOne,
        sql: format!(
            "SELECT row_to_json(t.*) AS record FROM {} t WHERE t.{} = {}",
            quote_ident(&table.name),
            quote_ident(&pk.name),
            placeholder(1, pk)
        ),
        params: vec![(PRIMARY_ID.to_string(), id)],
    })
}

/// Binds each value with the Rust type matching its variant; typed nulls bind as `None`.
pub fn bind_params<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    params: &'q [(String, SqlValue)],
) -> Query<'q, Postgres, PgArguments> {
    for (_, value) in params {
        query = match value {
            SqlValue::Null(kind) => match kind {
                ColumnKind::Integer => query.bind(None::<i64>),
                ColumnKind::Float => query.bind(None::<f64>),
                ColumnKind::Bool => query.bind(None::<bool>),
                ColumnKind::Date => query.bind(None::<chrono::NaiveDate>),
                ColumnKind::DateTime => query.bind(None::<chrono::NaiveDateTime>),
                ColumnKind::Text => query.bind(None::<String>),
            },
            SqlValue::Integer(i) => query.bind(*i),
            SqlValue::Float(f) => query.bind(*f),
            SqlValue::Bool(b) => query.bind(*b),
            SqlValue::Date(d) => query.bind(*d),
            SqlValue::DateTime(dt) => query.bind(*dt),
            SqlValue::Text(s) => query.bind(s.as_str()),
        };
    }
    query
}

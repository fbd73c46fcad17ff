//! Schema introspection against PostgreSQL's `information_schema`.

use super::{is_internal_table, ColumnDescriptor, SchemaError, SchemaProvider, TableDescriptor};
use async_trait::async_trait;
use sqlx::{PgPool, Row};
use std::collections::HashSet;

/// Reads table and column metadata from the live database on every call.
#[derive(Clone)]
pub struct PostgresSchemaProvider {
    pool: PgPool,
    schema: String,
}

impl PostgresSchemaProvider {
    pub fn new(pool: PgPool, schema: impl Into<String>) -> Self {
        Self {
            pool,
            schema: schema.into(),
        }
    }

    async fn primary_key_columns(&self, table: &str) -> Result<HashSet<String>, SchemaError> {
        let rows = sqlx::query(
            r#"
            SELECT kcu.column_name::text AS column_name
            FROM information_schema.table_constraints tc
            JOIN information_schema.key_column_usage kcu
              ON tc.constraint_name = kcu.constraint_name
             AND tc.table_schema = kcu.table_schema
             AND tc.table_name = kcu.table_name
            WHERE tc.table_schema = $1
              AND tc.table_name = $2
              AND tc.constraint_type = 'PRIMARY KEY'
            ORDER BY kcu.ordinal_position
            "#,
        )
        .bind(&self.schema)
        .bind(table)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .filter_map(|r| r.try_get::<String, _>("column_name").ok())
            .collect())
    }

    async fn table_exists(&self, table: &str) -> Result<bool, SchemaError> {
        let found = sqlx::query(
            "SELECT 1
             FROM information_schema.tables
             WHERE table_schema = $1 AND table_name = $2 AND table_type = 'BASE TABLE'",
        )
        .bind(&self.schema)
        .bind(table)
        .fetch_optional(&self.pool)
        .await?;
        Ok(found.is_some())
    }
}

#[async_trait]
impl SchemaProvider for PostgresSchemaProvider {
    async fn list_tables(&self) -> Result<Vec<TableDescriptor>, SchemaError> {
        let names = self.list_table_names().await?;
        let mut tables = Vec::with_capacity(names.len());
        for name in names {
            tables.push(self.describe_table(&name).await?);
        }
        Ok(tables)
    }

    async fn list_table_names(&self) -> Result<Vec<String>, SchemaError> {
        let rows = sqlx::query(
            "SELECT table_name::text AS table_name
             FROM information_schema.tables
             WHERE table_schema = $1 AND table_type = 'BASE TABLE'
             ORDER BY table_name",
        )
        .bind(&self.schema)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .filter_map(|r| r.try_get::<String, _>("table_name").ok())
            .filter(|name| !is_internal_table(name))
            .collect())
    }

    async fn describe_table(&self, name: &str) -> Result<TableDescriptor, SchemaError> {
        if is_internal_table(name) || !self.table_exists(name).await? {
            return Err(SchemaError::TableNotFound(name.to_string()));
        }

        let primary_keys = self.primary_key_columns(name).await?;

        let col_rows = sqlx::query(
            "SELECT column_name::text AS column_name,
                    data_type::text AS data_type,
                    udt_name::text AS udt_name,
                    is_nullable::text AS is_nullable,
                    column_default::text AS column_default,
                    character_maximum_length::int4 AS character_maximum_length
             FROM information_schema.columns
             WHERE table_schema = $1 AND table_name = $2
             ORDER BY ordinal_position",
        )
        .bind(&self.schema)
        .bind(name)
        .fetch_all(&self.pool)
        .await?;

        let mut columns = Vec::with_capacity(col_rows.len());
        for cr in col_rows {
            let column_name: String = cr.try_get("column_name").unwrap_or_default();
            if column_name.is_empty() {
                continue;
            }
            let data_type: String = cr
                .try_get("data_type")
                .unwrap_or_else(|_| "text".to_string());
            let udt_name: String = cr
                .try_get("udt_name")
                .unwrap_or_else(|_| "text".to_string());
            let is_nullable: String = cr
                .try_get("is_nullable")
                .unwrap_or_else(|_| "YES".to_string());
            let default: Option<String> = cr.try_get("column_default").ok().flatten();
            let char_len: Option<i32> = cr.try_get("character_maximum_length").ok().flatten();

            let declared_type = declared_type(&data_type, &udt_name, char_len);
            let is_pk = primary_keys.contains(&column_name);
            columns.push(
                ColumnDescriptor::new(
                    column_name,
                    declared_type,
                    udt_name,
                    is_nullable.eq_ignore_ascii_case("YES"),
                    is_pk,
                )
                .with_default(default),
            );
        }

        Ok(TableDescriptor::new(name, columns))
    }
}

/// Rebuilds a `VARCHAR(n)`-style declared type from the catalog's split representation.
fn declared_type(data_type: &str, udt_name: &str, char_len: Option<i32>) -> String {
    let base = match data_type {
        "USER-DEFINED" | "ARRAY" => udt_name,
        other => other,
    };
    match char_len {
        Some(n) => format!("{}({})", base, n),
        None => base.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::declared_type;

    #[test]
    fn declared_type_keeps_length() {
        assert_eq!(
            declared_type("character varying", "varchar", Some(50)),
            "character varying(50)"
        );
        assert_eq!(declared_type("integer", "int4", None), "integer");
        assert_eq!(declared_type("USER-DEFINED", "mood", None), "mood");
    }
}

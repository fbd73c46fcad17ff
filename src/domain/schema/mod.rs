//! Runtime schema discovery.
//!
//! Tables are never declared statically: every administrative operation asks a
//! [`SchemaProvider`] for the live shape of the table it is about to touch.

use async_trait::async_trait;

pub mod descriptor;
pub mod postgres;
pub mod registry;

pub use descriptor::{ColumnDescriptor, ColumnKind, InputKind, TableDescriptor};
pub use postgres::PostgresSchemaProvider;
pub use registry::CachingSchemaProvider;

/// Errors raised while reading database metadata.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("Table {0} not found")]
    TableNotFound(String),

    #[error("schema metadata unavailable: {0}")]
    Unavailable(#[from] sqlx::Error),
}

/// Contract for anything that can describe the tables of a live database.
///
/// Implementations must only report user tables (no catalog or migration bookkeeping tables) and
/// must derive the primary-key set from the database's own constraint metadata.
#[async_trait]
pub trait SchemaProvider: Send + Sync {
    /// Describes every user table.
    async fn list_tables(&self) -> Result<Vec<TableDescriptor>, SchemaError>;

    /// Names of every user table, in display order.
    async fn list_table_names(&self) -> Result<Vec<String>, SchemaError> {
        Ok(self
            .list_tables()
            .await?
            .into_iter()
            .map(|t| t.name)
            .collect())
    }

    /// Describes a single table; unknown names yield [`SchemaError::TableNotFound`].
    async fn describe_table(&self, name: &str) -> Result<TableDescriptor, SchemaError>;

    /// Drops any memoised descriptor for `table`. No-op for uncached providers.
    fn invalidate(&self, _table: &str) {}

    /// Drops every memoised descriptor.
    fn invalidate_all(&self) {}
}

// Tables owned by tooling rather than by the site.
const INTERNAL_PREFIXES: &[&str] = &["pg_", "sql_", "sqlite_", "alembic_", "_sqlx_"];

/// Whether `name` belongs to the database or a migration tool rather than to the application.
pub fn is_internal_table(name: &str) -> bool {
    INTERNAL_PREFIXES.iter().any(|p| name.starts_with(p)) || name == "schema_migrations"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_tables_are_hidden() {
        assert!(is_internal_table("_sqlx_migrations"));
        assert!(is_internal_table("alembic_version"));
        assert!(is_internal_table("sqlite_sequence"));
        assert!(is_internal_table("schema_migrations"));
        assert!(!is_internal_table("Passions"));
        assert!(!is_internal_table("Tales"));
    }
}

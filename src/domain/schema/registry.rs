//! Process-lifetime memoisation of table descriptors.

use super::{SchemaError, SchemaProvider, TableDescriptor};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Wraps another provider and keeps every described table until it is explicitly invalidated.
///
/// Table listings always go to the inner provider so newly created tables appear immediately;
/// only per-table descriptors are memoised.
pub struct CachingSchemaProvider<P> {
    inner: P,
    tables: RwLock<HashMap<String, Arc<TableDescriptor>>>,
}

impl<P: SchemaProvider> CachingSchemaProvider<P> {
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            tables: RwLock::new(HashMap::new()),
        }
    }

    fn lookup(&self, name: &str) -> Option<Arc<TableDescriptor>> {
        self.tables.read().ok()?.get(name).cloned()
    }
}

#[async_trait]
impl<P: SchemaProvider> SchemaProvider for CachingSchemaProvider<P> {
    async fn list_tables(&self) -> Result<Vec<TableDescriptor>, SchemaError> {
        let names = self.inner.list_table_names().await?;
        let mut out = Vec::with_capacity(names.len());
        for name in names {
            out.push(self.describe_table(&name).await?);
        }
        Ok(out)
    }

    async fn list_table_names(&self) -> Result<Vec<String>, SchemaError> {
        self.inner.list_table_names().await
    }

    async fn describe_table(&self, name: &str) -> Result<TableDescriptor, SchemaError> {
        if let Some(hit) = self.lookup(name) {
            return Ok((*hit).clone());
        }
        let described = self.inner.describe_table(name).await?;
        if let Ok(mut map) = self.tables.write() {
            map.insert(name.to_string(), Arc::new(described.clone()));
        }
        Ok(described)
    }

    fn invalidate(&self, table: &str) {
        if let Ok(mut map) = self.tables.write() {
            if map.remove(table).is_some() {
                tracing::debug!(table, "schema descriptor invalidated");
            }
        }
    }

    fn invalidate_all(&self) {
        if let Ok(mut map) = self.tables.write() {
            tracing::info!(tables = map.len(), "schema cache cleared");
            map.clear();
        }
    }
}

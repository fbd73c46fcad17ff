pub mod app;
pub mod crypto;
pub mod domain;
pub mod error;
pub mod infra;
pub mod storage;
pub mod transport;

// Convenience re-exports (keeps call-sites clean)
pub use app::crud_service::{CreateOutcome, CrudService, UpdateOutcome};
pub use crypto::hashing::cache_key;
pub use domain::coerce::{coerce, SqlValue};
pub use domain::schema::{
    CachingSchemaProvider, ColumnDescriptor, PostgresSchemaProvider, SchemaProvider,
    TableDescriptor,
};
pub use error::{CrudError, CrudResult};
pub use infra::cache::{CacheService, Cached};
pub use infra::config::AppConfig;

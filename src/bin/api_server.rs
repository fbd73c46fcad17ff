// src/bin/api_server.rs

use anyhow::Context;
use mindsite::domain::schema::{CachingSchemaProvider, PostgresSchemaProvider, SchemaProvider};
use mindsite::infra::{config::AppConfig, logging};
use mindsite::transport;
use mindsite::{CacheService, CrudService};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let config = AppConfig::from_env().context("invalid configuration")?;
    logging::init(config.log_format);

    // --- Database ---
    tracing::info!(schema = %config.database_schema, "connecting to database");
    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await
        .context("failed to connect to DATABASE_URL")?;

    let introspector = PostgresSchemaProvider::new(pool.clone(), config.database_schema.clone());
    let schema: Arc<dyn SchemaProvider> = if config.schema_cache {
        Arc::new(CachingSchemaProvider::new(introspector))
    } else {
        Arc::new(introspector)
    };
    let tables = schema.list_table_names().await.unwrap_or_default();
    tracing::info!(count = tables.len(), ?tables, "schema discovered");

    // --- Cache ---
    let cache = Arc::new(CacheService::new(config.cache.clone()));
    if !cache.warm_up().await {
        tracing::warn!("running without cache");
    }

    let app_state = transport::http::AppState {
        crud: Arc::new(CrudService::new(pool, schema)),
        cache,
        collections: Arc::new(config.collections.clone()),
        collection_ttl: config.collection_cache_ttl,
    };

    // --- API Server ---
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let app = transport::http::create_router(app_state)
        .merge(
            SwaggerUi::new("/swagger-ui")
                .url("/api-docs/openapi.json", transport::http::ApiDoc::openapi()),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    tracing::info!(addr = %config.bind_addr, "API server listening");
    tracing::info!("Swagger UI available at /swagger-ui");

    tokio::select! {
        result = axum::serve(listener, app) => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received");
        }
    }

    Ok(())
}

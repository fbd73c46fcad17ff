//! Public, read-heavy listing of the configured mind-object tables.

use crate::transport::http::types::{ApiError, ApiResult, AppState, CollectionResponse, ErrorBody};
use axum::extract::{Path, State};
use axum::Json;
use serde_json::Value as JsonValue;

#[utoipa::path(
    get,
    path = "/{collection}/data",
    params(
        ("collection" = String, Path, description = "Collection slug (e.g. thoughts)")
    ),
    responses(
        (status = 200, description = "Rows of the collection's table", body = CollectionResponse),
        (status = 404, description = "Unknown collection or table", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody)
    )
)]
pub async fn collection_data_handler(
    State(state): State<AppState>,
    Path(collection): Path<String>,
) -> ApiResult<Json<CollectionResponse>> {
    let slug = collection.trim().to_lowercase();
    let table = state.collections.get(&slug).cloned().ok_or_else(|| {
        ApiError::not_found(
            "collection_not_found",
            format!("Collection '{}' does not exist", collection),
        )
    })?;

    let objects: Vec<JsonValue> = state
        .collection_cache()
        .call(&state.cache, &AppState::collection_args(&table), || {
            state.crud.read_all(&table)
        })
        .await?;

    Ok(Json(CollectionResponse {
        collection: slug,
        table,
        objects,
    }))
}

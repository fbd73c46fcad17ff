//! Administrative CRUD endpoints over every user table.

use crate::transport::http::types::{
    required, ApiError, ApiResult, AppState, ColumnInfo, ColumnsResponse, CreateResponse,
    ErrorBody, MessageResponse, ObjectResponse, ObjectsResponse, RowQuery, RowRequest,
    TableQuery, TablesResponse,
};
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::Json;
use serde_json::Value as JsonValue;

const ROW_REQUEST_SHAPE: &str = r#"{"table_name": "...", "data": {...}}"#;

fn table_param(query: Result<Query<TableQuery>, QueryRejection>) -> ApiResult<String> {
    let Query(q) = query.map_err(ApiError::invalid_query)?;
    required(q.table, "No table specified")
}

fn row_params(query: Result<Query<RowQuery>, QueryRejection>) -> ApiResult<(String, String)> {
    let Query(q) = query.map_err(ApiError::invalid_query)?;
    let table = required(q.table, "No table specified")?;
    let id = required(q.id, "No ID specified")?;
    Ok((table, id))
}

#[utoipa::path(
    get,
    path = "/admin/tables",
    responses(
        (status = 200, description = "User tables", body = TablesResponse),
        (status = 500, description = "Schema unavailable", body = ErrorBody)
    )
)]
pub async fn list_tables_handler(State(state): State<AppState>) -> ApiResult<Json<TablesResponse>> {
    let tables = state.crud.list_tables().await?;
    Ok(Json(TablesResponse { tables }))
}

#[utoipa::path(
    get,
    path = "/admin/get-columns",
    params(TableQuery),
    responses(
        (status = 200, description = "Column metadata", body = ColumnsResponse),
        (status = 400, description = "No table specified", body = ErrorBody),
        (status = 404, description = "Unknown table", body = ErrorBody),
        (status = 500, description = "Schema unavailable", body = ErrorBody)
    )
)]
pub async fn get_columns_handler(
    State(state): State<AppState>,
    query: Result<Query<TableQuery>, QueryRejection>,
) -> ApiResult<Json<ColumnsResponse>> {
    let table = table_param(query)?;
    let desc = state.crud.describe(&table).await?;

    let columns = desc
        .columns
        .iter()
        .map(|c| {
            let input = c.input_kind();
            ColumnInfo {
                name: c.name.clone(),
                column_type: c.declared_type.clone(),
                nullable: c.nullable,
                primary_key: c.is_primary_key,
                input_type: input.html_type().to_string(),
                max_length: c.max_length,
                step: input.step().map(str::to_string),
                default: c.default.clone(),
            }
        })
        .collect();

    Ok(Json(ColumnsResponse {
        table: desc.name,
        columns,
    }))
}

#[utoipa::path(
    get,
    path = "/admin/objects",
    params(TableQuery),
    responses(
        (status = 200, description = "All rows of the table", body = ObjectsResponse),
        (status = 400, description = "No table specified", body = ErrorBody),
        (status = 404, description = "Unknown table", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody)
    )
)]
pub async fn list_objects_handler(
    State(state): State<AppState>,
    query: Result<Query<TableQuery>, QueryRejection>,
) -> ApiResult<Json<ObjectsResponse>> {
    let table = table_param(query)?;
    let objects = state.crud.read_all(&table).await?;
    Ok(Json(ObjectsResponse { objects }))
}

#[utoipa::path(
    get,
    path = "/admin/object",
    params(RowQuery),
    responses(
        (status = 200, description = "The addressed row", body = ObjectResponse),
        (status = 400, description = "Missing table or id", body = ErrorBody),
        (status = 404, description = "Unknown table or row", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody)
    )
)]
pub async fn get_object_handler(
    State(state): State<AppState>,
    query: Result<Query<RowQuery>, QueryRejection>,
) -> ApiResult<Json<ObjectResponse>> {
    let (table, id) = row_params(query)?;
    let object = state.crud.read_one(&table, &JsonValue::String(id)).await?;
    Ok(Json(ObjectResponse { object }))
}

#[utoipa::path(
    post,
    path = "/admin/create",
    request_body = RowRequest,
    responses(
        (status = 200, description = "Row created", body = CreateResponse),
        (status = 400, description = "Missing table or data", body = ErrorBody),
        (status = 404, description = "Unknown table", body = ErrorBody),
        (status = 422, description = "Unprocessable entity (invalid JSON body)", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody)
    )
)]
pub async fn create_handler(
    State(state): State<AppState>,
    request: Result<Json<RowRequest>, JsonRejection>,
) -> ApiResult<Json<CreateResponse>> {
    let Json(request) = request.map_err(|e| ApiError::invalid_json(e, ROW_REQUEST_SHAPE))?;
    let table = required(request.table_name, "No table specified")?;
    let data = request.data.unwrap_or_default();

    tracing::info!(table = %table, fields = data.len(), "create request");
    let outcome = state.crud.create(&table, &data).await?;
    state.evict_collection(&table).await;

    Ok(Json(CreateResponse {
        success: true,
        message: format!("Successfully created new {} object", table),
        id: outcome.id,
        fields: outcome.fields,
    }))
}

#[utoipa::path(
    post,
    path = "/admin/update",
    request_body = RowRequest,
    responses(
        (status = 200, description = "Row updated (or nothing to change)", body = MessageResponse),
        (status = 400, description = "Missing table, data or id", body = ErrorBody),
        (status = 404, description = "Unknown table", body = ErrorBody),
        (status = 422, description = "Unprocessable entity (invalid JSON body)", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody)
    )
)]
pub async fn update_handler(
    State(state): State<AppState>,
    request: Result<Json<RowRequest>, JsonRejection>,
) -> ApiResult<Json<MessageResponse>> {
    let Json(request) = request.map_err(|e| ApiError::invalid_json(e, ROW_REQUEST_SHAPE))?;
    let table = required(request.table_name, "No table specified")?;
    let data = request.data.unwrap_or_default();

    tracing::info!(table = %table, fields = data.len(), "update request");
    let outcome = state.crud.update(&table, &data).await?;
    let id = display_id(&outcome.id);

    let message = if outcome.is_noop() {
        format!("No changes to update for {} object with ID {}", table, id)
    } else {
        state.evict_collection(&table).await;
        format!("Successfully updated {} object with ID {}", table, id)
    };
    Ok(Json(MessageResponse {
        success: true,
        message,
    }))
}

#[utoipa::path(
    delete,
    path = "/admin/delete",
    params(RowQuery),
    responses(
        (status = 200, description = "Row deleted", body = MessageResponse),
        (status = 400, description = "Missing table or id", body = ErrorBody),
        (status = 404, description = "Unknown table or row", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody)
    )
)]
pub async fn delete_handler(
    State(state): State<AppState>,
    query: Result<Query<RowQuery>, QueryRejection>,
) -> ApiResult<Json<MessageResponse>> {
    let (table, id) = row_params(query)?;

    tracing::info!(table = %table, id = %id, "delete request");
    state.crud.delete(&table, &JsonValue::String(id.clone())).await?;
    state.evict_collection(&table).await;

    Ok(Json(MessageResponse {
        success: true,
        message: format!("Successfully deleted {} object with ID {}", table, id),
    }))
}

#[utoipa::path(
    post,
    path = "/admin/refresh-schema",
    responses(
        (status = 200, description = "Memoised table descriptors dropped", body = MessageResponse)
    )
)]
pub async fn refresh_schema_handler(State(state): State<AppState>) -> Json<MessageResponse> {
    state.crud.refresh_schema();
    Json(MessageResponse {
        success: true,
        message: "Schema cache cleared".to_string(),
    })
}

fn display_id(id: &JsonValue) -> String {
    match id {
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

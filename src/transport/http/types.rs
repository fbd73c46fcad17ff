use crate::app::crud_service::CrudService;
use crate::error::CrudError;
use crate::infra::cache::{CacheService, Cached};
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value as JsonValue};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use utoipa::{IntoParams, ToSchema};

/// Operation name under which public collection listings are cached.
pub const COLLECTION_OPERATION: &str = "collection";

#[derive(Clone)]
pub struct AppState {
    pub crud: Arc<CrudService>,
    pub cache: Arc<CacheService>,
    /// Public collection slug -> table name.
    pub collections: Arc<BTreeMap<String, String>>,
    pub collection_ttl: Duration,
}

impl AppState {
    pub fn collection_cache(&self) -> Cached {
        Cached::new(COLLECTION_OPERATION, self.collection_ttl)
    }

    /// Cache arguments identifying the listing of `table`.
    pub fn collection_args(table: &str) -> JsonValue {
        serde_json::json!({ "table": table })
    }

    /// Drops the cached public listing of `table`, if any.
    pub async fn evict_collection(&self, table: &str) {
        if !self.collections.values().any(|t| t == table) {
            return;
        }
        let evicted = self
            .collection_cache()
            .invalidate(&self.cache, &Self::collection_args(table))
            .await;
        tracing::debug!(table, evicted, "collection cache eviction");
    }
}

// ---- requests ----

#[derive(Deserialize, Debug, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TableQuery {
    /// Table name.
    pub table: Option<String>,
}

#[derive(Deserialize, Debug, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RowQuery {
    /// Table name.
    pub table: Option<String>,
    /// Primary-key value of the row.
    pub id: Option<String>,
}

/// Body of `POST /admin/create` and `POST /admin/update`.
#[derive(Deserialize, Debug, ToSchema)]
pub struct RowRequest {
    pub table_name: Option<String>,
    /// Column name -> raw value. For updates, must include the row id.
    #[serde(default)]
    #[schema(value_type = Object)]
    pub data: Option<JsonMap<String, JsonValue>>,
}

// ---- responses ----

#[derive(Serialize, Debug, ToSchema)]
pub struct TablesResponse {
    pub tables: Vec<String>,
}

#[derive(Serialize, Debug, ToSchema)]
pub struct ColumnInfo {
    pub name: String,
    /// Declared database type.
    #[serde(rename = "type")]
    pub column_type: String,
    pub nullable: bool,
    pub primary_key: bool,
    /// HTML input type for an edit form.
    pub input_type: String,
    pub max_length: Option<u32>,
    pub step: Option<String>,
    /// Column default expression, e.g. `false` or `nextval(...)`.
    pub default: Option<String>,
}

#[derive(Serialize, Debug, ToSchema)]
pub struct ColumnsResponse {
    pub table: String,
    pub columns: Vec<ColumnInfo>,
}

#[derive(Serialize, Debug, ToSchema)]
pub struct ObjectsResponse {
    #[schema(value_type = Vec<Object>)]
    pub objects: Vec<JsonValue>,
}

#[derive(Serialize, Debug, ToSchema)]
pub struct ObjectResponse {
    #[schema(value_type = Object)]
    pub object: JsonValue,
}

#[derive(Serialize, Debug, ToSchema)]
pub struct CreateResponse {
    pub success: bool,
    pub message: String,
    #[schema(value_type = Object)]
    pub id: JsonValue,
    #[schema(value_type = Object)]
    pub fields: JsonMap<String, JsonValue>,
}

#[derive(Serialize, Debug, ToSchema)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Serialize, Debug, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub database: String,
    /// `connected` or `degraded`.
    pub cache: String,
}

#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct CollectionResponse {
    pub collection: String,
    pub table: String,
    #[schema(value_type = Vec<Object>)]
    pub objects: Vec<JsonValue>,
}

#[derive(Serialize, Debug, ToSchema)]
pub struct ErrorBody {
    pub success: bool,
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
}

/// An error response: status code plus [`ErrorBody`].
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorBody,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &str, error: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                success: false,
                error: error.into(),
                code: code.to_string(),
                table: None,
                column: None,
            },
        }
    }

    pub fn bad_request(code: &str, error: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, code, error)
    }

    pub fn not_found(code: &str, error: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, code, error)
    }

    pub fn invalid_json(rejection: JsonRejection, expected: &str) -> Self {
        Self::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            "invalid_json",
            format!("Invalid JSON body: {} (expected: {})", rejection.body_text(), expected),
        )
    }

    pub fn invalid_query(rejection: QueryRejection) -> Self {
        Self::bad_request("invalid_query", rejection.body_text())
    }
}

impl From<CrudError> for ApiError {
    fn from(err: CrudError) -> Self {
        let status =
            StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            tracing::error!(error = %err, code = err.code(), "request failed");
        } else {
            tracing::warn!(error = %err, code = err.code(), "request rejected");
        }
        Self {
            status,
            body: ErrorBody {
                success: false,
                error: err.to_string(),
                code: err.code().to_string(),
                table: err.table().map(str::to_string),
                column: err.column().map(str::to_string),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Non-empty, trimmed parameter or a 400 with `message`.
pub fn required(value: Option<String>, message: &str) -> ApiResult<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::bad_request("missing_parameter", message))
}

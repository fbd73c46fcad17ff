use crate::transport::http::handlers::{admin, collections, health};
use crate::transport::http::types::{
    AppState, CollectionResponse, ColumnInfo, ColumnsResponse, CreateResponse, ErrorBody,
    HealthResponse, MessageResponse, ObjectResponse, ObjectsResponse, RowRequest, TablesResponse,
};
use axum::routing::{delete, get, post};
use axum::Router;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        health::healthcheck_handler,
        admin::list_tables_handler,
        admin::get_columns_handler,
        admin::list_objects_handler,
        admin::get_object_handler,
        admin::create_handler,
        admin::update_handler,
        admin::delete_handler,
        admin::refresh_schema_handler,
        collections::collection_data_handler
    ),
    components(schemas(
        RowRequest,
        TablesResponse,
        ColumnInfo,
        ColumnsResponse,
        ObjectsResponse,
        ObjectResponse,
        CreateResponse,
        MessageResponse,
        HealthResponse,
        CollectionResponse,
        ErrorBody
    ))
)]
pub struct ApiDoc;

pub fn create_router(app_state: AppState) -> Router {
    let admin = Router::new()
        .route("/tables", get(admin::list_tables_handler))
        .route("/get-columns", get(admin::get_columns_handler))
        .route("/objects", get(admin::list_objects_handler))
        .route("/object", get(admin::get_object_handler))
        .route("/create", post(admin::create_handler))
        .route("/update", post(admin::update_handler))
        .route("/delete", delete(admin::delete_handler))
        .route("/refresh-schema", post(admin::refresh_schema_handler));

    Router::new()
        .route("/health", get(health::healthcheck_handler))
        .nest("/admin", admin)
        .route("/:collection/data", get(collections::collection_data_handler))
        .with_state(app_state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_lists_every_route() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&str> = doc.paths.paths.keys().map(String::as_str).collect();
        for expected in [
            "/health",
            "/admin/tables",
            "/admin/get-columns",
            "/admin/objects",
            "/admin/object",
            "/admin/create",
            "/admin/update",
            "/admin/delete",
            "/admin/refresh-schema",
            "/{collection}/data",
        ] {
            assert!(paths.contains(&expected), "missing {expected}");
        }
    }
}

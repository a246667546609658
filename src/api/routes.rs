use axum::{
    Json, Router,
    routing::{get, post},
};
use utoipa::OpenApi;

use crate::AppState;
use crate::api::handlers::{health, query};
use crate::types::{HealthResponse, QueryRequest, QueryResponse, Source};

/// OpenAPI document for the public endpoints
#[derive(OpenApi)]
#[openapi(
    info(
        title = "qcrag",
        description = "Retrieval-augmented quantum computing Q&A"
    ),
    paths(health::health, query::query),
    components(schemas(QueryRequest, QueryResponse, Source, HealthResponse)),
    tags(
        (name = "query", description = "Question answering"),
        (name = "health", description = "Service status")
    )
)]
pub struct ApiDoc;

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

fn endpoints() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/query", post(query::query))
}

/// Routes served at the root and again under `/api` for the chat frontend
pub fn create_router() -> Router<AppState> {
    Router::new()
        .merge(endpoints())
        .nest("/api", endpoints())
        .route("/api-docs/openapi.json", get(openapi_json))
}

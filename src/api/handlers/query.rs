//! Question answering endpoint.

use axum::{Json, extract::State, extract::rejection::JsonRejection};

use crate::{
    AppState,
    types::{QueryRequest, QueryResponse, Result},
};

/// Answer a quantum computing question from the Q&A corpus.
///
/// Retrieves related Q&A pairs, generates an answer with the active backend
/// and suggests follow-up questions not already in `shown_questions`.
#[utoipa::path(
    post,
    path = "/query",
    request_body = QueryRequest,
    responses(
        (status = 200, description = "Answer with sources and follow-ups", body = QueryResponse),
        (status = 400, description = "Malformed body or empty question"),
        (status = 404, description = "No relevant context found"),
        (status = 500, description = "Embedding, database or backend failure"),
        (status = 503, description = "Upstream service unreachable"),
        (status = 504, description = "Upstream service timed out")
    ),
    tag = "query"
)]
pub async fn query(
    State(state): State<AppState>,
    payload: std::result::Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<QueryResponse>> {
    let Json(payload) = payload?;
    let response = state.pipeline.answer(&payload).await?;
    Ok(Json(response))
}

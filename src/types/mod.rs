use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// ============= API Request/Response Types =============

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct QueryRequest {
    pub question: String,
    /// Questions the chat frontend has already offered as follow-ups.
    /// Suggestions close to any of these are not repeated.
    #[serde(default)]
    pub shown_questions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Source {
    pub question: String,
    pub source: String,
    pub similarity: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct QueryResponse {
    pub answer: String,
    pub sources: Vec<Source>,
    pub response_time_ms: u64,
    pub model_loaded_fresh: bool,
    pub backend: String,
    pub suggested_question: Option<String>,
    #[serde(default)]
    pub suggested_questions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub backend: String,
    pub model_loaded: bool,
    pub idle_seconds: Option<u64>,
}

// ============= Corpus Types =============

/// A question/answer row as it appears in the source corpus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QaPair {
    pub question: String,
    pub answer: String,
    pub source: String,
}

impl QaPair {
    /// Text handed to the embedding model for this row.
    pub fn embedding_text(&self) -> String {
        format!("Q: {} A: {}", self.question, self.answer)
    }
}

/// A stored row returned by retrieval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedPair {
    pub id: i64,
    pub source: String,
    pub question: String,
    pub answer: String,
    /// Cosine similarity to the query embedding (0.0 when the row only
    /// matched lexically).
    pub similarity: f32,
    /// Ranking score used to order results (equals `similarity` for
    /// semantic search, the fused RRF score for hybrid search).
    pub score: f32,
}

// ============= Error Types =============

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("LLM error: {0}")]
    LLM(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Unavailable: {0}")]
    Unavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Map a reqwest failure, keeping timeouts and connection failures apart
    /// from other upstream errors.
    pub fn from_http(service: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AppError::Timeout(format!("{} request timed out", service))
        } else if err.is_connect() {
            AppError::Unavailable(format!("Cannot connect to {}: {}", service, err))
        } else {
            AppError::Internal(format!("{} request failed: {}", service, err))
        }
    }

    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            AppError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Database(_)
            | AppError::Embedding(_)
            | AppError::LLM(_)
            | AppError::Configuration(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Database(err.to_string())
    }
}

impl From<axum::extract::rejection::JsonRejection> for AppError {
    fn from(rejection: axum::extract::rejection::JsonRejection) -> Self {
        AppError::InvalidInput(rejection.body_text())
    }
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        let message = match self {
            AppError::Database(msg)
            | AppError::Embedding(msg)
            | AppError::LLM(msg)
            | AppError::NotFound(msg)
            | AppError::InvalidInput(msg)
            | AppError::Configuration(msg)
            | AppError::Timeout(msg)
            | AppError::Unavailable(msg)
            | AppError::Internal(msg) => msg,
        };

        let body = serde_json::json!({
            "error": message
        });

        (status, axum::Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;

    #[test]
    fn test_error_status_codes() {
        assert_eq!(
            AppError::InvalidInput("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::NotFound("x".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::Timeout("x".into()).status_code(),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            AppError::Unavailable("x".into()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            AppError::LLM("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_into_response_uses_status() {
        let response = AppError::NotFound("No relevant context found".into()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_query_request_defaults_shown_questions() {
        let req: QueryRequest =
            serde_json::from_str(r#"{"question": "What is a qubit?"}"#).unwrap();
        assert_eq!(req.question, "What is a qubit?");
        assert!(req.shown_questions.is_empty());
    }

    #[test]
    fn test_embedding_text_format() {
        let pair = QaPair {
            question: "What is a qubit?".into(),
            answer: "A two-level quantum system.".into(),
            source: "claude".into(),
        };
        assert_eq!(
            pair.embedding_text(),
            "Q: What is a qubit? A: A two-level quantum system."
        );
    }
}

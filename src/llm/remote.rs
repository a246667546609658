use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::llm::client::{AnswerBackend, extract_model_answer};
use crate::types::{AppError, Result};

#[derive(Debug, Serialize)]
struct InferenceRequest<'a> {
    context: &'a str,
    question: &'a str,
}

#[derive(Debug, Deserialize)]
struct InferenceResponse {
    #[serde(default)]
    answer: Option<String>,
}

/// Custom model served behind an HTTP inference endpoint.
///
/// The endpoint takes `{"context", "question"}`, builds the training prompt
/// itself and replies with `{"answer": "..."}`.
pub struct RemoteModelBackend {
    http: reqwest::Client,
    url: String,
}

impl RemoteModelBackend {
    pub fn new(url: String, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::LLM(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { http, url })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl AnswerBackend for RemoteModelBackend {
    async fn generate(&self, context: &str, question: &str) -> Result<String> {
        let response = self
            .http
            .post(&self.url)
            .json(&InferenceRequest { context, question })
            .send()
            .await
            .map_err(|e| AppError::from_http("model endpoint", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::LLM(format!(
                "Model endpoint error {}: {}",
                status, body
            )));
        }

        let data: InferenceResponse = response
            .json()
            .await
            .map_err(|e| AppError::LLM(format!("Invalid model endpoint response: {}", e)))?;

        Ok(data.answer.unwrap_or_default())
    }

    fn extract_answer(&self, generated: &str) -> String {
        extract_model_answer(generated)
    }

    fn name(&self) -> &str {
        "custom"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_shape() {
        let json = serde_json::to_value(InferenceRequest {
            context: "Q: a A: b",
            question: "What is c?",
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({"context": "Q: a A: b", "question": "What is c?"}));
    }

    #[test]
    fn test_missing_answer_defaults_empty() {
        let parsed: InferenceResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(parsed.answer.unwrap_or_default(), "");
    }

    #[test]
    fn test_extract_applies_model_rule() {
        let backend =
            RemoteModelBackend::new("http://localhost/query".into(), Duration::from_secs(1))
                .unwrap();
        assert_eq!(
            backend.extract_answer("Answer: Superposition.\n\nQuestion: next"),
            "Superposition."
        );
        assert_eq!(backend.url(), "http://localhost/query");
    }
}

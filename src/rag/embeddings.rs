//! Dense embeddings from a hosted embedding API.
//!
//! The corpus and the user's questions must be embedded by the same model.
//! Voyage models are asymmetric: questions are sent as `query` and corpus
//! rows as `document`.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::{AppError, Result};
use crate::utils::toml_config::EmbeddingConfig;

/// Which side of the retrieval pair a text is on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputType {
    Query,
    Document,
}

impl InputType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InputType::Query => "query",
            InputType::Document => "document",
        }
    }
}

/// Text embedding provider
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Embed a batch of texts, one vector per input in input order
    async fn embed(&self, texts: &[String], input_type: InputType) -> Result<Vec<Vec<f32>>>;

    /// Embed a single user question
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.embed(&[text.to_string()], InputType::Query)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::Embedding("Embedding API returned no vector".into()))
    }

    fn model_name(&self) -> &str;

    fn dimensions(&self) -> usize;
}

// ============= Voyage AI =============

#[derive(Debug, Serialize)]
struct VoyageRequest<'a> {
    input: &'a [String],
    model: &'a str,
    input_type: InputType,
    truncation: bool,
    output_dimension: usize,
}

#[derive(Debug, Deserialize)]
struct VoyageResponse {
    data: Vec<VoyageEmbedding>,
}

#[derive(Debug, Deserialize)]
struct VoyageEmbedding {
    embedding: Vec<f32>,
    index: usize,
}

#[derive(Debug, Deserialize)]
struct VoyageError {
    detail: String,
}

/// Client for the Voyage AI `/embeddings` endpoint
pub struct VoyageClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    dimensions: usize,
}

impl VoyageClient {
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
        dimensions: usize,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Embedding(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            dimensions,
        })
    }

    /// Build a client from the `[embedding]` config section
    pub fn from_config(config: &EmbeddingConfig, api_key: impl Into<String>) -> Result<Self> {
        Self::new(
            api_key,
            config.base_url.clone(),
            config.model.clone(),
            config.dimensions,
            Duration::from_secs(config.timeout_secs),
        )
    }
}

#[async_trait]
impl EmbeddingClient for VoyageClient {
    async fn embed(&self, texts: &[String], input_type: InputType) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = VoyageRequest {
            input: texts,
            model: &self.model,
            input_type,
            truncation: true,
            output_dimension: self.dimensions,
        };

        let response = self
            .http
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::from_http("embedding API", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<VoyageError>(&body)
                .map(|e| e.detail)
                .unwrap_or(body);
            return Err(AppError::Embedding(format!(
                "Embedding API returned {}: {}",
                status, detail
            )));
        }

        let parsed: VoyageResponse = response
            .json()
            .await
            .map_err(|e| AppError::Embedding(format!("Invalid embedding response: {}", e)))?;

        if parsed.data.len() != texts.len() {
            return Err(AppError::Embedding(format!(
                "Embedding API returned {} vectors for {} inputs",
                parsed.data.len(),
                texts.len()
            )));
        }

        let mut data = parsed.data;
        data.sort_by_key(|d| d.index);

        tracing::debug!(
            model = %self.model,
            input_type = input_type.as_str(),
            count = data.len(),
            "Embedded texts"
        );

        Ok(data.into_iter().map(|d| d.embedding).collect())
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_type_serialization() {
        assert_eq!(
            serde_json::to_string(&InputType::Query).unwrap(),
            "\"query\""
        );
        assert_eq!(InputType::Document.as_str(), "document");
    }

    #[test]
    fn test_request_body_shape() {
        let input = vec!["What is a qubit?".to_string()];
        let request = VoyageRequest {
            input: &input,
            model: "voyage-3.5-lite",
            input_type: InputType::Query,
            truncation: true,
            output_dimension: 1024,
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["input"][0], "What is a qubit?");
        assert_eq!(json["model"], "voyage-3.5-lite");
        assert_eq!(json["input_type"], "query");
        assert_eq!(json["truncation"], true);
        assert_eq!(json["output_dimension"], 1024);
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = VoyageClient::new(
            "key",
            "http://localhost:1234/v1/",
            "voyage-3.5-lite",
            1024,
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(client.base_url, "http://localhost:1234/v1");
        assert_eq!(client.model_name(), "voyage-3.5-lite");
        assert_eq!(client.dimensions(), 1024);
    }

    #[tokio::test]
    async fn test_empty_batch_skips_request() {
        // Unroutable base URL: any request would fail
        let client = VoyageClient::new(
            "key",
            "http://127.0.0.1:1",
            "voyage-3.5-lite",
            1024,
            Duration::from_secs(1),
        )
        .unwrap();
        let vectors = client.embed(&[], InputType::Document).await.unwrap();
        assert!(vectors.is_empty());
    }
}

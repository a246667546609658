use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::llm::client::AnswerBackend;
use crate::types::{AppError, Result};

const SYSTEM_PROMPT: &str = "You are a quantum computing assistant for beginners. \
Answer using the provided context. Keep explanations simple and accessible. \
Do not use complex math or equations. Be concise but thorough.";

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

/// Hosted Llama model over Groq's OpenAI-compatible chat completions API
pub struct GroqBackend {
    http: reqwest::Client,
    api_key: String,
    api_base: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl GroqBackend {
    pub fn new(
        api_key: String,
        api_base: String,
        model: String,
        temperature: f32,
        max_tokens: u32,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::LLM(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            api_key,
            api_base: api_base.trim_end_matches('/').to_string(),
            model,
            temperature,
            max_tokens,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

/// User turn sent alongside the system prompt
pub fn user_message(context: &str, question: &str) -> String {
    format!("Context:\n{}\n\nQuestion: {}", context, question)
}

#[async_trait]
impl AnswerBackend for GroqBackend {
    async fn generate(&self, context: &str, question: &str) -> Result<String> {
        let user_content = user_message(context, question);
        let request = ChatCompletionRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &user_content,
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let response = self
            .http
            .post(format!("{}/chat/completions", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::from_http("Groq API", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::LLM(format!("Groq API error {}: {}", status, body)));
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| AppError::LLM(format!("Invalid Groq response: {}", e)))?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| AppError::LLM("No response from Groq".to_string()))
    }

    fn extract_answer(&self, generated: &str) -> String {
        // Chat models return just the answer
        generated.trim().to_string()
    }

    fn name(&self) -> &str {
        "groq"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> GroqBackend {
        GroqBackend::new(
            "key".into(),
            "https://api.groq.com/openai/v1/".into(),
            "llama-3.3-70b-versatile".into(),
            0.2,
            300,
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn test_user_message_layout() {
        assert_eq!(
            user_message("Q: a A: b", "What is c?"),
            "Context:\nQ: a A: b\n\nQuestion: What is c?"
        );
    }

    #[test]
    fn test_extract_trims() {
        assert_eq!(backend().extract_answer("  A qubit.\n"), "A qubit.");
    }

    #[test]
    fn test_request_body_shape() {
        let request = ChatCompletionRequest {
            model: "llama-3.3-70b-versatile",
            messages: vec![ChatMessage {
                role: "system",
                content: SYSTEM_PROMPT,
            }],
            temperature: 0.2,
            max_tokens: 300,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "llama-3.3-70b-versatile");
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["max_tokens"], 300);
    }

    #[test]
    fn test_api_base_trimmed() {
        let backend = backend();
        assert_eq!(backend.api_base, "https://api.groq.com/openai/v1");
        assert_eq!(backend.model(), "llama-3.3-70b-versatile");
        assert_eq!(backend.name(), "groq");
    }
}

//! Answer backend abstractions and provider selection
//!
//! Two interchangeable backends turn a retrieved context plus the user's
//! question into an answer:
//! - **Groq**: hosted Llama model behind an OpenAI-compatible chat API
//! - **Remote**: the custom-trained model served on serverless GPUs

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::types::{AppError, Result};
use crate::utils::toml_config::GenerationConfig;

/// Generation backend trait
///
/// `generate` returns raw model output; `extract_answer` turns that output
/// into the text shown to the user.
#[async_trait]
pub trait AnswerBackend: Send + Sync {
    /// Produce an answer for `question` grounded in `context`
    async fn generate(&self, context: &str, question: &str) -> Result<String>;

    /// Clean raw output from [`AnswerBackend::generate`]
    fn extract_answer(&self, generated: &str) -> String;

    /// Backend identifier reported to clients
    fn name(&self) -> &str;
}

/// Pull the first answer out of custom-model output.
///
/// The model continues the training layout
/// `Context: ... Question: ... Answer: ...` and tends to run on into new
/// Q&A pairs, so only the text after the first `Answer:` up to the next
/// blank line is kept.
pub fn extract_model_answer(text: &str) -> String {
    const MARKER: &str = "Answer:";
    const STOPS: [&str; 3] = ["\n\nContext:", "\n\nQuestion:", "\n\n"];

    let Some(idx) = text.find(MARKER) else {
        return text.trim().to_string();
    };

    let mut answer = text[idx + MARKER.len()..].trim();
    for stop in STOPS {
        if let Some(stop_idx) = answer.find(stop) {
            answer = &answer[..stop_idx];
        }
    }
    answer.trim().to_string()
}

/// Provider enum for runtime selection
#[derive(Debug, Clone)]
pub enum BackendProvider {
    /// Groq chat completions
    ///
    /// # Example
    /// ```rust,ignore
    /// let provider = BackendProvider::Groq {
    ///     api_key: "gsk_...".to_string(),
    ///     api_base: "https://api.groq.com/openai/v1".to_string(),
    ///     model: "llama-3.3-70b-versatile".to_string(),
    ///     temperature: 0.2,
    ///     max_tokens: 300,
    ///     timeout: Duration::from_secs(30),
    /// };
    /// ```
    Groq {
        api_key: String,
        api_base: String,
        model: String,
        temperature: f32,
        max_tokens: u32,
        timeout: Duration,
    },

    /// Custom model behind an HTTP inference endpoint.
    ///
    /// Cold starts on serverless GPUs take minutes, hence the long timeout.
    Remote { url: String, timeout: Duration },
}

impl BackendProvider {
    /// Resolve a provider from the `[generation]` config section, reading
    /// secrets from the environment
    pub fn from_config(config: &GenerationConfig) -> Result<Self> {
        match config.backend.as_str() {
            "groq" => {
                let groq = &config.groq;
                let api_key = std::env::var(&groq.api_key_env).map_err(|_| {
                    AppError::Configuration(format!(
                        "Environment variable '{}' is not set",
                        groq.api_key_env
                    ))
                })?;
                Ok(BackendProvider::Groq {
                    api_key,
                    api_base: groq.api_base.clone(),
                    model: groq.model.clone(),
                    temperature: groq.temperature,
                    max_tokens: groq.max_tokens,
                    timeout: Duration::from_secs(groq.timeout_secs),
                })
            }
            "remote" => {
                let remote = &config.remote;
                let url = std::env::var(&remote.url_env).map_err(|_| {
                    AppError::Configuration(format!(
                        "Environment variable '{}' is not set",
                        remote.url_env
                    ))
                })?;
                Ok(BackendProvider::Remote {
                    url,
                    timeout: Duration::from_secs(remote.timeout_secs),
                })
            }
            other => Err(AppError::Configuration(format!(
                "Unknown generation backend: {}. Use: groq, remote",
                other
            ))),
        }
    }

    /// Create a backend instance for this provider
    pub fn create_backend(&self) -> Result<Arc<dyn AnswerBackend>> {
        match self {
            BackendProvider::Groq {
                api_key,
                api_base,
                model,
                temperature,
                max_tokens,
                timeout,
            } => Ok(Arc::new(super::groq::GroqBackend::new(
                api_key.clone(),
                api_base.clone(),
                model.clone(),
                *temperature,
                *max_tokens,
                *timeout,
            )?)),

            BackendProvider::Remote { url, timeout } => Ok(Arc::new(
                super::remote::RemoteModelBackend::new(url.clone(), *timeout)?,
            )),
        }
    }

    /// Identifier reported in responses and health checks
    pub fn name(&self) -> &'static str {
        match self {
            BackendProvider::Groq { .. } => "groq",
            BackendProvider::Remote { .. } => "custom",
        }
    }
}

/// Builds backends on demand.
///
/// The lifecycle manager only sees this trait so tests can count or fail
/// backend loads.
#[async_trait]
pub trait BackendFactoryTrait: Send + Sync {
    /// Create a fresh backend instance
    async fn create_backend(&self) -> Result<Arc<dyn AnswerBackend>>;

    /// Name of the backend this factory creates
    fn backend_name(&self) -> &str;
}

/// Configuration-based backend factory
pub struct BackendFactory {
    provider: BackendProvider,
}

impl BackendFactory {
    pub fn new(provider: BackendProvider) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &BackendProvider {
        &self.provider
    }
}

#[async_trait]
impl BackendFactoryTrait for BackendFactory {
    async fn create_backend(&self) -> Result<Arc<dyn AnswerBackend>> {
        self.provider.create_backend()
    }

    fn backend_name(&self) -> &str {
        self.provider.name()
    }
}

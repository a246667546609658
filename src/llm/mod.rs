//! Answer Generation Backends
//!
//! This module hides the answer-generation backends behind one trait so the
//! query pipeline does not care which model produced an answer.
//!
//! # Architecture
//!
//! - [`AnswerBackend`] - generate + extract, implemented by each backend
//! - [`BackendProvider`] - backend selection resolved from `qcrag.toml`
//! - [`BackendFactoryTrait`] - creates backends on demand
//! - [`BackendManager`] - lazy loading, fresh-load reporting and idle unloading
//!
//! # Backends
//!
//! - `groq` - Llama 3.3 70B over Groq's OpenAI-compatible API
//! - `remote` - the custom transformer behind its HTTP inference endpoint
//!
//! # Example
//!
//! ```ignore
//! use qcrag::llm::{BackendFactory, BackendManager, BackendProvider};
//!
//! let provider = BackendProvider::from_config(&config.generation)?;
//! let manager = BackendManager::new(Arc::new(BackendFactory::new(provider)), idle_timeout);
//!
//! let (backend, fresh) = manager.acquire().await?;
//! let raw = backend.generate(&context, "What is a qubit?").await?;
//! println!("{}", backend.extract_answer(&raw));
//! ```

/// Backend trait, provider enum and factories.
pub mod client;
/// Groq chat completions backend.
pub mod groq;
/// Lazy loading and idle unloading of the active backend.
pub mod lifecycle;
/// Custom model inference endpoint backend.
pub mod remote;

pub use client::{
    AnswerBackend, BackendFactory, BackendFactoryTrait, BackendProvider, extract_model_answer,
};
pub use groq::GroqBackend;
pub use lifecycle::BackendManager;
pub use remote::RemoteModelBackend;

//! # qcrag - Quantum Computing RAG Server
//!
//! A retrieval-augmented question-answering server for quantum computing
//! topics. Questions are embedded, matched against a corpus of Q&A pairs in
//! Postgres/pgvector, and answered by one of two interchangeable backends:
//! a hosted Llama model on Groq, or a custom small transformer served on
//! serverless GPUs.
//!
//! ## Overview
//!
//! qcrag can be used in two ways:
//!
//! 1. **As a standalone server** - Run the `qcrag-server` binary
//! 2. **As a library** - Embed [`RagPipeline`] in your own service
//!
//! ### Basic Example
//!
//! ```rust,ignore
//! use qcrag::{ConfigManager, RagPipeline};
//! use qcrag::types::QueryRequest;
//!
//! let config_manager = Arc::new(ConfigManager::new("qcrag.toml")?);
//! let state = qcrag::build_state(config_manager).await?;
//!
//! let response = state
//!     .pipeline
//!     .answer(&QueryRequest {
//!         question: "What is superposition?".into(),
//!         shown_questions: vec![],
//!     })
//!     .await?;
//! println!("{}", response.answer);
//! ```
//!
//! ## Modules
//!
//! - [`api`] - REST API handlers and routes
//! - [`cli`] - Command-line interface
//! - [`db`] - Q&A store (pgvector, in-memory)
//! - [`llm`] - Answer backends and their lifecycle
//! - [`rag`] - Embeddings, retrieval, context, suggestions, ingestion
//! - [`types`] - Common types and error handling
//! - [`utils`] - TOML configuration with hot reload
//!
//! ## Configuration
//!
//! All settings live in `qcrag.toml`; secrets are read from the environment
//! variables the file names. Retrieval and suggestion settings hot-reload.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

/// HTTP API handlers and routes.
#[allow(missing_docs)]
pub mod api;
/// Command-line interface.
pub mod cli;
/// Q&A storage backends.
pub mod db;
/// Answer generation backends.
#[allow(missing_docs)]
pub mod llm;
/// Retrieval Augmented Generation (RAG) components.
#[allow(missing_docs)]
pub mod rag;
/// Core types (requests, responses, errors).
#[allow(missing_docs)]
pub mod types;
/// Configuration utilities (TOML).
#[allow(missing_docs)]
pub mod utils;

// Re-export commonly used types
pub use db::{InMemoryQaStore, PgVectorStore, QaStore, StoreProvider};
pub use llm::{
    AnswerBackend, BackendFactory, BackendFactoryTrait, BackendManager, BackendProvider,
};
pub use rag::embeddings::{EmbeddingClient, InputType, VoyageClient};
pub use rag::pipeline::RagPipeline;
pub use rag::retriever::Retriever;
pub use types::{AppError, Result};
pub use utils::toml_config::{ConfigManager, QcragConfig};

use std::sync::Arc;
use std::time::Duration;

use rag::cache::QueryEmbeddingCache;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// TOML configuration with hot-reload support
    pub config_manager: Arc<ConfigManager>,
    /// Query pipeline
    pub pipeline: Arc<RagPipeline>,
    /// Active answer backend and its load state
    pub backends: Arc<BackendManager>,
}

impl AppState {
    /// Wire a pipeline from already-built parts
    pub fn from_parts(
        config_manager: Arc<ConfigManager>,
        embedder: Arc<dyn EmbeddingClient>,
        store: Arc<dyn QaStore>,
        factory: Arc<dyn BackendFactoryTrait>,
    ) -> Self {
        let config = config_manager.config();

        let cache = QueryEmbeddingCache::new(config.embedding.cache_capacity);
        let retriever = Arc::new(Retriever::new(embedder, store, cache));
        let backends = Arc::new(BackendManager::new(
            factory,
            Duration::from_secs(config.generation.idle_timeout_secs),
        ));
        let pipeline = Arc::new(RagPipeline::new(
            retriever,
            Arc::clone(&backends),
            Arc::clone(&config_manager),
        ));

        Self {
            config_manager,
            pipeline,
            backends,
        }
    }
}

/// Create the embedding client described by the config
pub fn build_embedder(config: &QcragConfig) -> Result<Arc<dyn EmbeddingClient>> {
    let api_key = config
        .embedding_api_key()
        .map_err(|e| AppError::Configuration(e.to_string()))?;
    Ok(Arc::new(VoyageClient::from_config(&config.embedding, api_key)?))
}

/// Connect every service the config selects and build the shared state
pub async fn build_state(config_manager: Arc<ConfigManager>) -> Result<AppState> {
    let config = config_manager.config();

    let embedder = build_embedder(&config)?;
    let store = StoreProvider::from_config(&config)?.create_store().await?;
    let provider = BackendProvider::from_config(&config.generation)?;
    let factory: Arc<dyn BackendFactoryTrait> = Arc::new(BackendFactory::new(provider));

    Ok(AppState::from_parts(config_manager, embedder, store, factory))
}

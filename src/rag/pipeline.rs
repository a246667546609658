//! The query pipeline: retrieve, build context, generate, post-process.

use std::sync::Arc;
use std::time::Instant;

use tracing::{info, warn};

use crate::llm::BackendManager;
use crate::rag::context::build_context;
use crate::rag::retriever::{RetrievalOptions, Retriever};
use crate::rag::suggest::{SuggestionOptions, suggest_follow_up, suggest_follow_ups};
use crate::types::{AppError, QueryRequest, QueryResponse, Result, RetrievedPair, Source};
use crate::utils::toml_config::{ConfigManager, QcragConfig};

/// Answers questions against the Q&A corpus
pub struct RagPipeline {
    retriever: Arc<Retriever>,
    backends: Arc<BackendManager>,
    config: Arc<ConfigManager>,
}

impl RagPipeline {
    pub fn new(
        retriever: Arc<Retriever>,
        backends: Arc<BackendManager>,
        config: Arc<ConfigManager>,
    ) -> Self {
        Self {
            retriever,
            backends,
            config,
        }
    }

    pub fn retriever(&self) -> &Arc<Retriever> {
        &self.retriever
    }

    pub fn backends(&self) -> &Arc<BackendManager> {
        &self.backends
    }

    /// Answer one question.
    ///
    /// # Errors
    ///
    /// - `InvalidInput` for a blank question
    /// - `NotFound` when retrieval returns nothing
    /// - embedding, database and backend failures propagate unchanged
    pub async fn answer(&self, request: &QueryRequest) -> Result<QueryResponse> {
        let start = Instant::now();

        let question = request.question.trim();
        if question.is_empty() {
            return Err(AppError::InvalidInput("Question cannot be empty".to_string()));
        }

        // Tunables are re-read per query so hot reloads apply immediately
        let config = self.config.config();
        let retrieval = retrieval_options(&config)?;

        let results = self.retriever.search(question, &retrieval).await?;
        if results.is_empty() {
            warn!(question_len = question.len(), "No relevant context found");
            return Err(AppError::NotFound("No relevant context found".to_string()));
        }

        let context_rows = &results[..results.len().min(config.retrieval.context_pairs)];
        let context = build_context(
            context_rows,
            config.retrieval.context_pairs,
            config.retrieval.answer_char_limit,
        );

        let (backend, model_loaded_fresh) = self.backends.acquire().await?;
        let generated = backend.generate(&context, question).await?;
        let answer = backend.extract_answer(&generated);

        let suggestion = suggestion_options(&config);
        let suggested_question = suggest_follow_up(
            question,
            &answer,
            &results,
            &request.shown_questions,
            &suggestion,
        );
        let suggested_questions =
            suggest_follow_ups(question, &results, &request.shown_questions, &suggestion);

        let sources = context_rows
            .iter()
            .map(|row| to_source(row, config.retrieval.source_question_chars))
            .collect();

        let response_time_ms = start.elapsed().as_millis() as u64;

        info!(
            question_len = question.len(),
            results = results.len(),
            backend = %backend.name(),
            fresh = model_loaded_fresh,
            duration_ms = response_time_ms,
            "Answered query"
        );

        Ok(QueryResponse {
            answer,
            sources,
            response_time_ms,
            model_loaded_fresh,
            backend: backend.name().to_string(),
            suggested_question,
            suggested_questions,
        })
    }
}

fn retrieval_options(config: &QcragConfig) -> Result<RetrievalOptions> {
    Ok(RetrievalOptions {
        strategy: config.retrieval.strategy.parse()?,
        top_k: config.retrieval.top_k,
        alpha: config.retrieval.hybrid_alpha,
        rrf_k: config.retrieval.rrf_k,
    })
}

fn suggestion_options(config: &QcragConfig) -> SuggestionOptions {
    SuggestionOptions {
        max_question_similarity: config.suggestions.max_question_similarity,
        duplicate_similarity: config.suggestions.duplicate_similarity,
        max_suggestions: config.suggestions.max_suggestions,
        min_term_len: config.suggestions.min_term_len,
    }
}

fn to_source(row: &RetrievedPair, question_chars: usize) -> Source {
    Source {
        question: row.question.chars().take(question_chars).collect(),
        source: row.source.clone(),
        similarity: round4(f64::from(row.similarity)),
    }
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

//! Question → ranked corpus rows.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::db::QaStore;
use crate::rag::cache::QueryEmbeddingCache;
use crate::rag::embeddings::{EmbeddingClient, InputType};
use crate::rag::search::{RrfFusion, SearchStrategy};
use crate::types::{Result, RetrievedPair};

/// Candidate pool multiplier for hybrid search
const HYBRID_FETCH_FACTOR: usize = 5;

/// Per-call retrieval settings, read from config on every query
#[derive(Debug, Clone, Copy)]
pub struct RetrievalOptions {
    pub strategy: SearchStrategy,
    pub top_k: usize,
    /// Semantic weight for hybrid fusion
    pub alpha: f32,
    pub rrf_k: f32,
}

impl Default for RetrievalOptions {
    fn default() -> Self {
        Self {
            strategy: SearchStrategy::Semantic,
            top_k: 5,
            alpha: 0.5,
            rrf_k: 60.0,
        }
    }
}

/// Embeds questions and looks them up in the store
pub struct Retriever {
    embedder: Arc<dyn EmbeddingClient>,
    store: Arc<dyn QaStore>,
    cache: QueryEmbeddingCache,
}

impl Retriever {
    pub fn new(
        embedder: Arc<dyn EmbeddingClient>,
        store: Arc<dyn QaStore>,
        cache: QueryEmbeddingCache,
    ) -> Self {
        Self {
            embedder,
            store,
            cache,
        }
    }

    pub fn store(&self) -> &Arc<dyn QaStore> {
        &self.store
    }

    pub fn cache(&self) -> &QueryEmbeddingCache {
        &self.cache
    }

    /// Embed a question as a query, consulting the cache first
    pub async fn embed_question(&self, question: &str) -> Result<Vec<f32>> {
        let key = QueryEmbeddingCache::compute_key(
            self.embedder.model_name(),
            InputType::Query,
            question,
        );

        if let Some(embedding) = self.cache.get(&key) {
            debug!("Query embedding cache hit");
            return Ok(embedding);
        }

        let embedding = self.embedder.embed_query(question).await?;
        self.cache.put(key, embedding.clone());
        Ok(embedding)
    }

    /// Rows relevant to `question`, best first, at most `options.top_k`
    pub async fn search(
        &self,
        question: &str,
        options: &RetrievalOptions,
    ) -> Result<Vec<RetrievedPair>> {
        if options.top_k == 0 {
            return Ok(Vec::new());
        }

        let embedding = self.embed_question(question).await?;

        match options.strategy {
            SearchStrategy::Semantic => {
                self.store.semantic_search(&embedding, options.top_k).await
            }
            SearchStrategy::Hybrid => self.hybrid_search(question, &embedding, options).await,
        }
    }

    async fn hybrid_search(
        &self,
        question: &str,
        embedding: &[f32],
        options: &RetrievalOptions,
    ) -> Result<Vec<RetrievedPair>> {
        let fetch = options.top_k * HYBRID_FETCH_FACTOR;

        let (semantic, keyword) = futures::try_join!(
            self.store.semantic_search(embedding, fetch),
            self.store.keyword_search(question, fetch),
        )?;

        let semantic_ranked: Vec<(i64, f32)> = semantic.iter().map(|r| (r.id, r.score)).collect();
        let keyword_ranked: Vec<(i64, f32)> = keyword.iter().map(|r| (r.id, r.score)).collect();

        let fused = RrfFusion::with_k(options.rrf_k).fuse(&[
            (&semantic_ranked, options.alpha),
            (&keyword_ranked, 1.0 - options.alpha),
        ]);

        // Semantic rows go in last so their similarity wins
        let mut rows: HashMap<i64, RetrievedPair> = HashMap::new();
        for row in keyword.into_iter().chain(semantic) {
            rows.insert(row.id, row);
        }

        let results: Vec<RetrievedPair> = fused
            .into_iter()
            .take(options.top_k)
            .filter_map(|(id, score)| {
                rows.remove(&id).map(|mut row| {
                    row.score = score;
                    row
                })
            })
            .collect();

        debug!(
            semantic = semantic_ranked.len(),
            keyword = keyword_ranked.len(),
            fused = results.len(),
            "Hybrid retrieval"
        );

        Ok(results)
    }
}

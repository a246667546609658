//! Q&A Store Abstraction Layer
//!
//! Retrieval runs against a single table of question/answer rows with one
//! embedding per row. Two backends implement the same contract:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         QaStore Trait                         │
//! ├──────────────────────────────────────────────────────────────┤
//! │ ensure_schema │ insert_batch │ semantic_search │ keyword_search│
//! └──────────────────────────────────────────────────────────────┘
//!             ▲                                  ▲
//!      ┌──────┴───────┐                  ┌───────┴───────┐
//!      │ PgVectorStore│                  │ InMemoryQaStore│
//!      │  (Postgres)  │                  │  (tests, demos)│
//!      └──────────────┘                  └───────────────┘
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::rag::search::Bm25Index;
use crate::types::{AppError, QaPair, Result, RetrievedPair};
use crate::utils::toml_config::QcragConfig;

// ============================================================================
// Provider Configuration
// ============================================================================

/// Which store backs retrieval
#[derive(Debug, Clone)]
pub enum StoreProvider {
    /// PostgreSQL with the pgvector extension
    PgVector {
        connection_string: String,
        table: String,
        max_connections: u32,
        ivfflat_lists: u32,
    },
    /// Process-local store, lost on exit
    InMemory,
}

impl StoreProvider {
    /// Resolve the provider from the `[database]` config section
    pub fn from_config(config: &QcragConfig) -> Result<Self> {
        match config.database.provider.as_str() {
            "postgres" => {
                let connection_string = config
                    .database_url()
                    .map_err(|e| AppError::Configuration(e.to_string()))?;
                Ok(StoreProvider::PgVector {
                    connection_string,
                    table: config.database.table.clone(),
                    max_connections: config.database.max_connections,
                    ivfflat_lists: config.database.ivfflat_lists,
                })
            }
            "memory" => Ok(StoreProvider::InMemory),
            other => Err(AppError::Configuration(format!(
                "Unknown database provider: {}",
                other
            ))),
        }
    }

    /// Connect and return the store
    pub async fn create_store(&self) -> Result<Arc<dyn QaStore>> {
        match self {
            StoreProvider::PgVector {
                connection_string,
                table,
                max_connections,
                ivfflat_lists,
            } => {
                let store = super::pgvector::PgVectorStore::connect(
                    connection_string,
                    table,
                    *max_connections,
                    *ivfflat_lists,
                )
                .await?;
                Ok(Arc::new(store))
            }
            StoreProvider::InMemory => Ok(Arc::new(InMemoryQaStore::new())),
        }
    }
}

// ============================================================================
// Store Trait
// ============================================================================

/// Storage and nearest-neighbour lookup for embedded Q&A rows.
///
/// Search results are ordered best first.
#[async_trait]
pub trait QaStore: Send + Sync {
    /// Short provider name for logs and health output
    fn name(&self) -> &'static str;

    /// Create the table and indexes if missing. `reset` drops existing data first.
    async fn ensure_schema(&self, dimensions: usize, reset: bool) -> Result<()>;

    /// Store rows with their embeddings; returns the number of rows written.
    ///
    /// # Errors
    ///
    /// Fails when `pairs` and `embeddings` differ in length.
    async fn insert_batch(&self, pairs: &[QaPair], embeddings: &[Vec<f32>]) -> Result<usize>;

    /// Rows nearest to `embedding` by cosine similarity
    async fn semantic_search(&self, embedding: &[f32], limit: usize)
    -> Result<Vec<RetrievedPair>>;

    /// Rows matching the words of `query`, ranked lexically.
    /// Returned rows carry a similarity of 0.0.
    async fn keyword_search(&self, query: &str, limit: usize) -> Result<Vec<RetrievedPair>>;

    async fn count(&self) -> Result<usize>;

    /// Delete every row, keeping the schema
    async fn clear(&self) -> Result<()>;
}

pub(crate) fn check_batch(pairs: &[QaPair], embeddings: &[Vec<f32>]) -> Result<()> {
    if pairs.len() != embeddings.len() {
        return Err(AppError::InvalidInput(format!(
            "Got {} rows but {} embeddings",
            pairs.len(),
            embeddings.len()
        )));
    }
    Ok(())
}

// ============================================================================
// In-Memory Store
// ============================================================================

struct StoredRow {
    id: i64,
    pair: QaPair,
    embedding: Vec<f32>,
}

#[derive(Default)]
struct InMemoryState {
    rows: Vec<StoredRow>,
    next_id: i64,
    dimensions: Option<usize>,
    keywords: Bm25Index,
}

/// In-memory Q&A store using cosine similarity and BM25.
pub struct InMemoryQaStore {
    state: RwLock<InMemoryState>,
}

impl InMemoryQaStore {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(InMemoryState {
                next_id: 1,
                keywords: Bm25Index::new(),
                ..Default::default()
            }),
        }
    }

    /// Cosine similarity between two vectors (0.0 for zero or mismatched vectors)
    pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
        if a.len() != b.len() || a.is_empty() {
            return 0.0;
        }

        let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
        let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

        if norm_a == 0.0 || norm_b == 0.0 {
            0.0
        } else {
            dot / (norm_a * norm_b)
        }
    }

    fn to_retrieved(row: &StoredRow, similarity: f32, score: f32) -> RetrievedPair {
        RetrievedPair {
            id: row.id,
            source: row.pair.source.clone(),
            question: row.pair.question.clone(),
            answer: row.pair.answer.clone(),
            similarity,
            score,
        }
    }
}

impl Default for InMemoryQaStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QaStore for InMemoryQaStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn ensure_schema(&self, dimensions: usize, reset: bool) -> Result<()> {
        let mut state = self.state.write();
        if reset {
            state.rows.clear();
            state.keywords.clear();
            state.next_id = 1;
        }
        state.dimensions = Some(dimensions);
        Ok(())
    }

    async fn insert_batch(&self, pairs: &[QaPair], embeddings: &[Vec<f32>]) -> Result<usize> {
        check_batch(pairs, embeddings)?;

        let mut state = self.state.write();
        if let Some(dims) = state.dimensions {
            if let Some(bad) = embeddings.iter().find(|e| e.len() != dims) {
                return Err(AppError::InvalidInput(format!(
                    "Expected {}-dimensional embeddings, got {}",
                    dims,
                    bad.len()
                )));
            }
        }

        for (pair, embedding) in pairs.iter().zip(embeddings) {
            let id = state.next_id;
            state.next_id += 1;
            state
                .keywords
                .add(id, &format!("{} {}", pair.question, pair.answer));
            state.rows.push(StoredRow {
                id,
                pair: pair.clone(),
                embedding: embedding.clone(),
            });
        }

        Ok(pairs.len())
    }

    async fn semantic_search(
        &self,
        embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<RetrievedPair>> {
        let state = self.state.read();

        let mut scored: Vec<(&StoredRow, f32)> = state
            .rows
            .iter()
            .map(|row| (row, Self::cosine_similarity(embedding, &row.embedding)))
            .collect();

        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.id.cmp(&b.0.id))
        });

        Ok(scored
            .into_iter()
            .take(limit)
            .map(|(row, sim)| Self::to_retrieved(row, sim, sim))
            .collect())
    }

    async fn keyword_search(&self, query: &str, limit: usize) -> Result<Vec<RetrievedPair>> {
        let state = self.state.read();

        Ok(state
            .keywords
            .search(query, limit)
            .into_iter()
            .filter_map(|(id, score)| {
                state
                    .rows
                    .iter()
                    .find(|row| row.id == id)
                    .map(|row| Self::to_retrieved(row, 0.0, score))
            })
            .collect())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.state.read().rows.len())
    }

    async fn clear(&self) -> Result<()> {
        let mut state = self.state.write();
        state.rows.clear();
        state.keywords.clear();
        Ok(())
    }
}

//! PostgreSQL pgvector integration.
//!
//! Rows live in one table:
//!
//! ```sql
//! CREATE TABLE chunks (
//!     id          SERIAL PRIMARY KEY,
//!     source      VARCHAR(50) NOT NULL,
//!     question    TEXT NOT NULL,
//!     answer      TEXT NOT NULL,
//!     embedding   vector(1024) NOT NULL,
//!     content_tsv tsvector GENERATED ALWAYS AS (...) STORED,
//!     created_at  TIMESTAMPTZ NOT NULL DEFAULT NOW()
//! );
//! ```
//!
//! Nearest-neighbour search uses the `<=>` cosine distance operator backed by
//! an ivfflat index; keyword search uses the generated `tsvector` column and a
//! GIN index. Embeddings cross the wire as pgvector text literals
//! (`'[0.1,0.2,...]'::vector`), so no pgvector client crate is needed.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use tracing::{debug, info};

use super::vectorstore::{QaStore, check_batch};
use crate::types::{AppError, QaPair, Result, RetrievedPair};

/// pgvector-backed Q&A store
pub struct PgVectorStore {
    pool: PgPool,
    table: String,
    ivfflat_lists: u32,
}

impl PgVectorStore {
    /// Connect a pool to `connection_string`.
    ///
    /// # Errors
    ///
    /// Fails when the table name is not a plain identifier or the database
    /// is unreachable.
    pub async fn connect(
        connection_string: &str,
        table: &str,
        max_connections: u32,
        ivfflat_lists: u32,
    ) -> Result<Self> {
        validate_identifier(table)?;

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .connect(connection_string)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Postgres: {}", e)))?;

        info!(table = %table, max_connections, "Connected to Postgres");

        Ok(Self::from_pool(pool, table, ivfflat_lists))
    }

    /// Wrap an existing pool
    pub fn from_pool(pool: PgPool, table: &str, ivfflat_lists: u32) -> Self {
        Self {
            pool,
            table: table.to_string(),
            ivfflat_lists,
        }
    }

    fn row_to_pair(row: &PgRow, similarity: f32, score: f32) -> Result<RetrievedPair> {
        Ok(RetrievedPair {
            id: row.try_get("id")?,
            source: row.try_get("source")?,
            question: row.try_get("question")?,
            answer: row.try_get("answer")?,
            similarity,
            score,
        })
    }
}

/// Table names are interpolated into SQL, so only plain identifiers pass
fn validate_identifier(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .map(|c| c.is_ascii_alphabetic() || c == '_')
        .unwrap_or(false);

    if valid_start && chars.all(|c| c.is_ascii_alphanumeric() || c == '_') && name.len() <= 63 {
        Ok(())
    } else {
        Err(AppError::Configuration(format!(
            "Invalid table name '{}': use letters, digits and underscores",
            name
        )))
    }
}

/// Render an embedding as a pgvector text literal
pub fn vector_literal(embedding: &[f32]) -> String {
    let parts: Vec<String> = embedding.iter().map(|v| v.to_string()).collect();
    format!("[{}]", parts.join(","))
}

#[async_trait]
impl QaStore for PgVectorStore {
    fn name(&self) -> &'static str {
        "pgvector"
    }

    async fn ensure_schema(&self, dimensions: usize, reset: bool) -> Result<()> {
        let table = &self.table;

        if reset {
            sqlx::query(&format!("DROP TABLE IF EXISTS {table}"))
                .execute(&self.pool)
                .await?;
            info!(table = %table, "Dropped table");
        }

        sqlx::query("CREATE EXTENSION IF NOT EXISTS vector")
            .execute(&self.pool)
            .await?;

        sqlx::query(&format!(
            "CREATE TABLE IF NOT EXISTS {table} (
                id SERIAL PRIMARY KEY,
                source VARCHAR(50) NOT NULL,
                question TEXT NOT NULL,
                answer TEXT NOT NULL,
                embedding vector({dimensions}) NOT NULL,
                content_tsv tsvector GENERATED ALWAYS AS (
                    to_tsvector('english', coalesce(question, '') || ' ' || coalesce(answer, ''))
                ) STORED,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )"
        ))
        .execute(&self.pool)
        .await?;

        sqlx::query(&format!(
            "CREATE INDEX IF NOT EXISTS {table}_embedding_idx ON {table} \
             USING ivfflat (embedding vector_cosine_ops) WITH (lists = {})",
            self.ivfflat_lists
        ))
        .execute(&self.pool)
        .await?;

        sqlx::query(&format!(
            "CREATE INDEX IF NOT EXISTS {table}_content_tsv_idx ON {table} USING GIN (content_tsv)"
        ))
        .execute(&self.pool)
        .await?;

        info!(table = %table, dimensions, "Schema ready");
        Ok(())
    }

    async fn insert_batch(&self, pairs: &[QaPair], embeddings: &[Vec<f32>]) -> Result<usize> {
        check_batch(pairs, embeddings)?;

        let sql = format!(
            "INSERT INTO {} (source, question, answer, embedding) \
             VALUES ($1, $2, $3, $4::text::vector)",
            self.table
        );

        let mut tx = self.pool.begin().await?;
        for (pair, embedding) in pairs.iter().zip(embeddings) {
            sqlx::query(&sql)
                .bind(&pair.source)
                .bind(&pair.question)
                .bind(&pair.answer)
                .bind(vector_literal(embedding))
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        debug!(rows = pairs.len(), "Inserted batch");
        Ok(pairs.len())
    }

    async fn semantic_search(
        &self,
        embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<RetrievedPair>> {
        let sql = format!(
            "SELECT id::bigint AS id, source, question, answer, \
                    1 - (embedding <=> $1::text::vector) AS similarity \
             FROM {} \
             ORDER BY embedding <=> $1::text::vector \
             LIMIT $2",
            self.table
        );

        let rows = sqlx::query(&sql)
            .bind(vector_literal(embedding))
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| {
                let similarity: f64 = row.try_get("similarity")?;
                Self::row_to_pair(row, similarity as f32, similarity as f32)
            })
            .collect()
    }

    async fn keyword_search(&self, query: &str, limit: usize) -> Result<Vec<RetrievedPair>> {
        let sql = format!(
            "SELECT id::bigint AS id, source, question, answer, \
                    ts_rank(content_tsv, q)::float8 AS rank \
             FROM {}, plainto_tsquery('english', $1) q \
             WHERE content_tsv @@ q \
             ORDER BY rank DESC \
             LIMIT $2",
            self.table
        );

        let rows = sqlx::query(&sql)
            .bind(query)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| {
                let rank: f64 = row.try_get("rank")?;
                Self::row_to_pair(row, 0.0, rank as f32)
            })
            .collect()
    }

    async fn count(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", self.table))
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as usize)
    }

    async fn clear(&self) -> Result<()> {
        sqlx::query(&format!("TRUNCATE TABLE {} RESTART IDENTITY", self.table))
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

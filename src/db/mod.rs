//! Q&A storage.
//!
//! - `pgvector` - PostgreSQL with the pgvector extension (production)
//! - `memory` - in-process store for tests and local experiments
//!
//! Select the provider with `[database] provider = "postgres" | "memory"`.

#![allow(missing_docs)]

// Store abstraction and in-memory provider
pub mod vectorstore;

// PostgreSQL provider
pub mod pgvector;

// Re-exports
pub use pgvector::PgVectorStore;
pub use vectorstore::{InMemoryQaStore, QaStore, StoreProvider};

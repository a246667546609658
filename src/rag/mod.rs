//! Retrieval Augmented Generation (RAG) Pipeline
//!
//! Everything between a user's question and the answer returned to the chat
//! frontend lives here.
//!
//! # Module Structure
//!
//! - [`rag::embeddings`](crate::rag::embeddings) - Hosted embedding API (Voyage AI)
//! - [`rag::cache`](crate::rag::cache) - LRU cache for query embeddings
//! - [`rag::search`](crate::rag::search) - Search strategies, BM25 and RRF fusion
//! - [`rag::retriever`](crate::rag::retriever) - Question → ranked corpus rows
//! - [`rag::context`](crate::rag::context) - Bounded prompt context
//! - [`rag::suggest`](crate::rag::suggest) - Follow-up question selection
//! - [`rag::pipeline`](crate::rag::pipeline) - The end-to-end query flow
//! - [`rag::ingest`](crate::rag::ingest) - Loading the Q&A corpus into the store
//!
//! # Query Flow
//!
//! 1. **Embed** - the question is embedded with `input_type = "query"`
//! 2. **Retrieve** - nearest Q&A rows (optionally fused with keyword hits)
//! 3. **Context** - the top rows become `Q: ... A: ...` context
//! 4. **Generate** - the active backend answers from that context
//! 5. **Post-process** - answer extraction and follow-up suggestions
//!
//! # Example
//!
//! ```ignore
//! use qcrag::types::QueryRequest;
//!
//! let response = pipeline
//!     .answer(&QueryRequest {
//!         question: "What is a qubit?".into(),
//!         shown_questions: vec![],
//!     })
//!     .await?;
//! println!("{} ({} ms)", response.answer, response.response_time_ms);
//! ```

pub mod cache;
pub mod context;
pub mod embeddings;
pub mod ingest;
pub mod pipeline;
pub mod retriever;
pub mod search;
pub mod suggest;

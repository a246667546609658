//! API request handlers.

/// Health check handler.
pub mod health;
/// Question answering handler.
pub mod query;

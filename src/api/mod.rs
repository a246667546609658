//! HTTP API Handlers and Routes
//!
//! A thin axum layer over [`RagPipeline`](crate::rag::pipeline::RagPipeline).
//!
//! # Module Structure
//!
//! - [`api::handlers`](crate::api::handlers) - Request handlers for each endpoint
//! - [`api::routes`](crate::api::routes) - Route definitions and router configuration
//!
//! # API Endpoints
//!
//! Every endpoint is served at the root and under `/api`.
//!
//! - `GET /health` - Backend name, load state and idle time
//! - `POST /query` - Answer a question
//!
//! Errors are returned as `{"error": "<message>"}` with a matching status code.
//!
//! # OpenAPI Documentation
//!
//! The OpenAPI document is served at `/api-docs/openapi.json`.

/// Request and response handlers for all API endpoints.
pub mod handlers;
/// Router configuration and route definitions.
pub mod routes;

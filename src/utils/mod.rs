//! Configuration utilities.
//!
//! - [`toml_config`] - `qcrag.toml` parsing, validation and hot reload

pub mod toml_config;

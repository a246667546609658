//! TOML-based configuration for qcrag
//!
//! This module provides declarative configuration for the embedding service,
//! the Q&A store, retrieval tuning, answer backends and follow-up suggestions
//! via a TOML file (`qcrag.toml`).
//!
//! Secrets never live in the file. Sections name the environment variables
//! that hold them (`api_key_env`, `url_env`), and `.env` is loaded at startup.
//!
//! # Hot Reloading
//!
//! Configuration changes are automatically detected and applied at runtime.
//! Use `ConfigManager` for thread-safe access to the current configuration.
//! Retrieval and suggestion settings are read on every query; backend and
//! database settings are only read at startup.

use arc_swap::ArcSwap;
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Root configuration structure loaded from qcrag.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QcragConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub retrieval: RetrievalConfig,

    #[serde(default)]
    pub generation: GenerationConfig,

    #[serde(default)]
    pub suggestions: SuggestionConfig,
}

// ============= Server Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// "pretty" or "json"
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

// ============= Embedding Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_base_url")]
    pub base_url: String,

    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Environment variable containing the embedding API key
    #[serde(default = "default_embedding_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_embedding_dimensions")]
    pub dimensions: usize,

    /// Rows per embedding request during ingestion
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,

    /// Pause before retrying a failed ingestion batch
    #[serde(default = "default_retry_delay")]
    pub retry_delay_secs: u64,

    /// Number of query embeddings kept in memory (0 disables the cache)
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
}

fn default_embedding_base_url() -> String {
    "https://api.voyageai.com/v1".to_string()
}

fn default_embedding_model() -> String {
    "voyage-3.5-lite".to_string()
}

fn default_embedding_key_env() -> String {
    "VOYAGE_API_KEY".to_string()
}

fn default_embedding_dimensions() -> usize {
    1024
}

fn default_batch_size() -> usize {
    20
}

fn default_embedding_timeout() -> u64 {
    30
}

fn default_retry_delay() -> u64 {
    60
}

fn default_cache_capacity() -> usize {
    1024
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: default_embedding_base_url(),
            model: default_embedding_model(),
            api_key_env: default_embedding_key_env(),
            dimensions: default_embedding_dimensions(),
            batch_size: default_batch_size(),
            timeout_secs: default_embedding_timeout(),
            retry_delay_secs: default_retry_delay(),
            cache_capacity: default_cache_capacity(),
        }
    }
}

// ============= Database Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// "postgres" (pgvector) or "memory"
    #[serde(default = "default_database_provider")]
    pub provider: String,

    /// Environment variable for the Postgres connection string
    #[serde(default = "default_database_url_env")]
    pub url_env: String,

    #[serde(default = "default_table")]
    pub table: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// ivfflat list count used when the vector index is created
    #[serde(default = "default_ivfflat_lists")]
    pub ivfflat_lists: u32,
}

fn default_database_provider() -> String {
    "postgres".to_string()
}

fn default_database_url_env() -> String {
    "DATABASE_URL".to_string()
}

fn default_table() -> String {
    "chunks".to_string()
}

fn default_max_connections() -> u32 {
    5
}

fn default_ivfflat_lists() -> u32 {
    100
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            provider: default_database_provider(),
            url_env: default_database_url_env(),
            table: default_table(),
            max_connections: default_max_connections(),
            ivfflat_lists: default_ivfflat_lists(),
        }
    }
}

// ============= Retrieval Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// "semantic" or "hybrid"
    #[serde(default = "default_strategy")]
    pub strategy: String,

    /// Rows fetched per question
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Rows placed in the prompt context
    #[serde(default = "default_context_pairs")]
    pub context_pairs: usize,

    /// Answers longer than this many characters are cut in the context
    #[serde(default = "default_answer_char_limit")]
    pub answer_char_limit: usize,

    /// Semantic weight for hybrid fusion (0.0 - 1.0)
    #[serde(default = "default_hybrid_alpha")]
    pub hybrid_alpha: f32,

    #[serde(default = "default_rrf_k")]
    pub rrf_k: f32,

    /// Source questions in responses are cut to this many characters
    #[serde(default = "default_source_question_chars")]
    pub source_question_chars: usize,
}

fn default_strategy() -> String {
    "semantic".to_string()
}

fn default_top_k() -> usize {
    5
}

fn default_context_pairs() -> usize {
    3
}

fn default_answer_char_limit() -> usize {
    300
}

fn default_hybrid_alpha() -> f32 {
    0.5
}

fn default_rrf_k() -> f32 {
    60.0
}

fn default_source_question_chars() -> usize {
    100
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            strategy: default_strategy(),
            top_k: default_top_k(),
            context_pairs: default_context_pairs(),
            answer_char_limit: default_answer_char_limit(),
            hybrid_alpha: default_hybrid_alpha(),
            rrf_k: default_rrf_k(),
            source_question_chars: default_source_question_chars(),
        }
    }
}

// ============= Generation Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// "groq" or "remote"
    #[serde(default = "default_backend")]
    pub backend: String,

    /// Unload the backend after this many idle seconds
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,

    /// How often the idle reaper wakes up
    #[serde(default = "default_idle_check_interval")]
    pub idle_check_interval_secs: u64,

    #[serde(default)]
    pub groq: GroqConfig,

    #[serde(default)]
    pub remote: RemoteModelConfig,
}

fn default_backend() -> String {
    "groq".to_string()
}

fn default_idle_timeout() -> u64 {
    300
}

fn default_idle_check_interval() -> u64 {
    60
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            idle_timeout_secs: default_idle_timeout(),
            idle_check_interval_secs: default_idle_check_interval(),
            groq: GroqConfig::default(),
            remote: RemoteModelConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroqConfig {
    /// Environment variable containing the Groq API key
    #[serde(default = "default_groq_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_groq_base")]
    pub api_base: String,

    #[serde(default = "default_groq_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_groq_timeout")]
    pub timeout_secs: u64,
}

fn default_groq_key_env() -> String {
    "GROQ_API_KEY".to_string()
}

fn default_groq_base() -> String {
    "https://api.groq.com/openai/v1".to_string()
}

fn default_groq_model() -> String {
    "llama-3.3-70b-versatile".to_string()
}

fn default_temperature() -> f32 {
    0.2
}

fn default_max_tokens() -> u32 {
    300
}

fn default_groq_timeout() -> u64 {
    30
}

impl Default for GroqConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_groq_key_env(),
            api_base: default_groq_base(),
            model: default_groq_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_groq_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteModelConfig {
    /// Environment variable containing the inference endpoint URL
    #[serde(default = "default_remote_url_env")]
    pub url_env: String,

    /// Serverless GPU cold starts can take minutes
    #[serde(default = "default_remote_timeout")]
    pub timeout_secs: u64,
}

fn default_remote_url_env() -> String {
    "MODAL_URL".to_string()
}

fn default_remote_timeout() -> u64 {
    300
}

impl Default for RemoteModelConfig {
    fn default() -> Self {
        Self {
            url_env: default_remote_url_env(),
            timeout_secs: default_remote_timeout(),
        }
    }
}

// ============= Suggestion Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestionConfig {
    /// Candidates more similar than this to the user's question are skipped
    #[serde(default = "default_question_similarity")]
    pub max_question_similarity: f64,

    /// Candidates more similar than this to a chosen or shown prompt are duplicates
    #[serde(default = "default_duplicate_similarity")]
    pub duplicate_similarity: f64,

    #[serde(default = "default_max_suggestions")]
    pub max_suggestions: usize,

    /// Answer words must be longer than this to count as key terms
    #[serde(default = "default_min_term_len")]
    pub min_term_len: usize,
}

fn default_question_similarity() -> f64 {
    0.6
}

fn default_duplicate_similarity() -> f64 {
    0.7
}

fn default_max_suggestions() -> usize {
    3
}

fn default_min_term_len() -> usize {
    5
}

impl Default for SuggestionConfig {
    fn default() -> Self {
        Self {
            max_question_similarity: default_question_similarity(),
            duplicate_similarity: default_duplicate_similarity(),
            max_suggestions: default_max_suggestions(),
            min_term_len: default_min_term_len(),
        }
    }
}

// ============= Configuration Loading & Validation =============

/// Errors that can occur during configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Environment variable '{0}' referenced in config is not set")]
    MissingEnvVar(String),

    #[error("Watch error: {0}")]
    WatchError(#[from] notify::Error),
}

impl QcragConfig {
    /// Load configuration from a TOML file and validate it
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let config: QcragConfig = toml::from_str(&content)?;

        config.validate()?;

        Ok(config)
    }

    /// Check value ranges and known provider names.
    ///
    /// Environment variables are not required here so that `config --validate`
    /// and `ask` against an in-memory store work without every secret set;
    /// use [`QcragConfig::validate_env`] before serving.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.database.provider.as_str() {
            "postgres" | "memory" => {}
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "Unknown database provider '{}'. Use: postgres, memory",
                    other
                )));
            }
        }

        match self.generation.backend.as_str() {
            "groq" | "remote" => {}
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "Unknown generation backend '{}'. Use: groq, remote",
                    other
                )));
            }
        }

        match self.retrieval.strategy.to_lowercase().as_str() {
            "semantic" | "hybrid" => {}
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "Unknown retrieval strategy '{}'. Use: semantic, hybrid",
                    other
                )));
            }
        }

        if self.retrieval.top_k == 0 {
            return Err(ConfigError::ValidationError(
                "retrieval.top_k must be at least 1".into(),
            ));
        }
        if self.retrieval.context_pairs == 0 {
            return Err(ConfigError::ValidationError(
                "retrieval.context_pairs must be at least 1".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.retrieval.hybrid_alpha) {
            return Err(ConfigError::ValidationError(format!(
                "retrieval.hybrid_alpha must be within 0.0..=1.0, got {}",
                self.retrieval.hybrid_alpha
            )));
        }
        if self.retrieval.rrf_k.is_nan() || self.retrieval.rrf_k <= 0.0 {
            return Err(ConfigError::ValidationError(format!(
                "retrieval.rrf_k must be positive, got {}",
                self.retrieval.rrf_k
            )));
        }
        if self.generation.idle_check_interval_secs == 0 {
            return Err(ConfigError::ValidationError(
                "generation.idle_check_interval_secs must be at least 1".into(),
            ));
        }
        if self.embedding.batch_size == 0 {
            return Err(ConfigError::ValidationError(
                "embedding.batch_size must be at least 1".into(),
            ));
        }
        if self.embedding.dimensions == 0 {
            return Err(ConfigError::ValidationError(
                "embedding.dimensions must be at least 1".into(),
            ));
        }

        Ok(())
    }

    /// Validate that every environment variable the selected providers need is set
    pub fn validate_env(&self) -> Result<(), ConfigError> {
        self.validate_env_var(&self.embedding.api_key_env)?;

        if self.database.provider == "postgres" {
            self.validate_env_var(&self.database.url_env)?;
        }

        match self.generation.backend.as_str() {
            "groq" => self.validate_env_var(&self.generation.groq.api_key_env)?,
            "remote" => self.validate_env_var(&self.generation.remote.url_env)?,
            _ => {}
        }

        Ok(())
    }

    fn validate_env_var(&self, name: &str) -> Result<(), ConfigError> {
        match self.resolve_env(name) {
            Some(value) if !value.is_empty() => Ok(()),
            _ => Err(ConfigError::MissingEnvVar(name.to_string())),
        }
    }

    /// Get a resolved value from an env var reference
    pub fn resolve_env(&self, env_name: &str) -> Option<String> {
        std::env::var(env_name).ok()
    }

    /// Get the embedding API key from the environment
    pub fn embedding_api_key(&self) -> Result<String, ConfigError> {
        self.resolve_env(&self.embedding.api_key_env)
            .ok_or_else(|| ConfigError::MissingEnvVar(self.embedding.api_key_env.clone()))
    }

    /// Get the database connection string from the environment
    pub fn database_url(&self) -> Result<String, ConfigError> {
        self.resolve_env(&self.database.url_env)
            .ok_or_else(|| ConfigError::MissingEnvVar(self.database.url_env.clone()))
    }
}

// ============= Hot Reloading Configuration Manager =============

/// Thread-safe configuration manager with hot reloading support
pub struct ConfigManager {
    config: Arc<ArcSwap<QcragConfig>>,
    config_path: PathBuf,
    watcher: RwLock<Option<RecommendedWatcher>>,
}

impl ConfigManager {
    /// Create a new configuration manager and load the initial config
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        // Absolute path for reliable file watching
        let path = path.as_ref();
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()
                .map_err(ConfigError::ReadError)?
                .join(path)
        };

        let config = QcragConfig::load(&path)?;

        Ok(Self {
            config: Arc::new(ArcSwap::from_pointee(config)),
            config_path: path,
            watcher: RwLock::new(None),
        })
    }

    /// Create a config manager directly from a config (useful for testing)
    /// This won't have file watching capabilities.
    pub fn from_config(config: QcragConfig) -> Self {
        Self {
            config: Arc::new(ArcSwap::from_pointee(config)),
            config_path: PathBuf::from("qcrag.toml"),
            watcher: RwLock::new(None),
        }
    }

    /// Get the current configuration (lockless read)
    pub fn config(&self) -> Arc<QcragConfig> {
        self.config.load_full()
    }

    /// Replace the current configuration
    pub fn store(&self, config: QcragConfig) {
        self.config.store(Arc::new(config));
    }

    /// Path the configuration was loaded from
    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Manually reload the configuration from disk
    pub fn reload(&self) -> Result<(), ConfigError> {
        info!("Reloading configuration from {:?}", self.config_path);

        let new_config = QcragConfig::load(&self.config_path)?;
        self.config.store(Arc::new(new_config));

        info!("Configuration reloaded successfully");
        Ok(())
    }

    /// Start watching for configuration file changes
    pub fn start_watching(&self) -> Result<(), ConfigError> {
        let (tx, mut rx) = mpsc::unbounded_channel::<()>();

        let config_path = self.config_path.clone();
        let config_arc = Arc::clone(&self.config);

        let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
            match res {
                Ok(event) => {
                    if event.kind.is_modify() || event.kind.is_create() {
                        // Debounced in the receiver
                        let _ = tx.send(());
                    }
                }
                Err(e) => {
                    error!("Config watcher error: {:?}", e);
                }
            }
        })?;

        if let Some(parent) = self.config_path.parent() {
            watcher.watch(parent, RecursiveMode::NonRecursive)?;
        }

        *self.watcher.write() = Some(watcher);

        tokio::spawn(async move {
            let mut last_reload = std::time::Instant::now();
            let debounce_duration = Duration::from_millis(500);

            while rx.recv().await.is_some() {
                if last_reload.elapsed() < debounce_duration {
                    continue;
                }

                // Let the editor finish writing
                tokio::time::sleep(Duration::from_millis(100)).await;

                match QcragConfig::load(&config_path) {
                    Ok(new_config) => {
                        config_arc.store(Arc::new(new_config));
                        info!("Configuration hot-reloaded successfully");
                        last_reload = std::time::Instant::now();
                    }
                    Err(e) => {
                        warn!(
                            "Failed to hot-reload config: {}. Keeping previous config.",
                            e
                        );
                    }
                }
            }
        });

        info!("Configuration hot-reload watcher started");
        Ok(())
    }

    /// Stop watching for configuration changes
    pub fn stop_watching(&self) {
        *self.watcher.write() = None;
        info!("Configuration hot-reload watcher stopped");
    }
}

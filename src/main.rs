//! qcrag-server entry point
//!
//! - `qcrag-server` / `qcrag-server serve` - run the HTTP API
//! - `qcrag-server ask <question>` - answer one question in the terminal
//! - `qcrag-server init-db` - create the pgvector schema
//! - `qcrag-server ingest FILE[=SOURCE]...` - embed and store corpus files
//! - `qcrag-server config` - show or validate the configuration

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use qcrag::api::routes::create_router;
use qcrag::cli::output::Output;
use qcrag::cli::{Cli, Commands};
use qcrag::rag::context::{build_context, build_prompt};
use qcrag::rag::ingest::{CorpusFile, IngestOptions, Ingestor};
use qcrag::rag::retriever::RetrievalOptions;
use qcrag::types::QueryRequest;
use qcrag::{ConfigManager, QcragConfig, StoreProvider};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let cli = Cli::parse_args();
    let output = if cli.no_color {
        Output::no_color()
    } else {
        Output::new()
    };

    if let Err(e) = run(cli, &output).await {
        output.error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

async fn run(cli: Cli, output: &Output) -> anyhow::Result<()> {
    let config_manager = Arc::new(
        ConfigManager::new(&cli.config)
            .with_context(|| format!("loading {}", cli.config.display()))?,
    );
    init_tracing(&config_manager.config(), cli.verbose);

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => run_serve(config_manager, output).await,
        Commands::Ask {
            question,
            show_prompt,
        } => run_ask(config_manager, output, &question, show_prompt).await,
        Commands::InitDb { reset } => run_init_db(&config_manager.config(), output, reset).await,
        Commands::Ingest { files, reset } => {
            run_ingest(&config_manager.config(), output, &files, reset).await
        }
        Commands::Config { validate } => run_config(&config_manager, output, validate),
    }
}

/// RUST_LOG wins over the configured level; `--verbose` forces debug
fn init_tracing(config: &QcragConfig, verbose: bool) {
    let default_level = if verbose {
        "debug".to_string()
    } else {
        format!("qcrag={0},qcrag_server={0},tower_http=info", config.server.log_level)
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let registry = tracing_subscriber::registry().with(filter);
    if config.server.log_format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn run_serve(config_manager: Arc<ConfigManager>, output: &Output) -> anyhow::Result<()> {
    let config = config_manager.config();
    config.validate_env()?;

    output.banner();

    let state = qcrag::build_state(Arc::clone(&config_manager)).await?;

    let store = state.pipeline.retriever().store();
    let rows = store.count().await?;
    if rows == 0 {
        warn!(store = store.name(), "Q&A store is empty; run `ingest` first");
    }
    info!(
        store = store.name(),
        rows,
        backend = state.backends.backend_name(),
        strategy = %config.retrieval.strategy,
        "Pipeline ready"
    );

    if let Err(e) = config_manager.start_watching() {
        warn!(error = %e, "Config hot reload disabled");
    }

    let reaper = state.backends.spawn_idle_reaper(Duration::from_secs(
        config.generation.idle_check_interval_secs,
    ));

    let app = create_router()
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                ),
        )
        .with_state(state.clone());

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {}", addr))?;

    output.success(&format!("Listening on http://{}", addr));
    info!(%addr, "Server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    reaper.abort();
    config_manager.stop_watching();
    state.backends.unload();
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

async fn run_ask(
    config_manager: Arc<ConfigManager>,
    output: &Output,
    question: &str,
    show_prompt: bool,
) -> anyhow::Result<()> {
    let config = config_manager.config();
    let state = qcrag::build_state(Arc::clone(&config_manager)).await?;

    if show_prompt {
        let options = RetrievalOptions {
            strategy: config.retrieval.strategy.parse()?,
            top_k: config.retrieval.top_k,
            alpha: config.retrieval.hybrid_alpha,
            rrf_k: config.retrieval.rrf_k,
        };
        let rows = state
            .pipeline
            .retriever()
            .search(question.trim(), &options)
            .await?;
        let context = build_context(
            &rows,
            config.retrieval.context_pairs,
            config.retrieval.answer_char_limit,
        );
        output.header("Prompt");
        output.block(&build_prompt(&context, question.trim()));
    }

    let response = state
        .pipeline
        .answer(&QueryRequest {
            question: question.to_string(),
            shown_questions: Vec::new(),
        })
        .await?;

    output.header("Answer");
    output.block(&response.answer);

    output.header("Sources");
    for source in &response.sources {
        output.list_item(&format!(
            "[{}] {} ({:.4})",
            source.source, source.question, source.similarity
        ));
    }

    if !response.suggested_questions.is_empty() {
        output.header("You might also ask");
        for suggestion in &response.suggested_questions {
            output.list_item(suggestion);
        }
    }

    output.newline();
    output.kv("backend", &response.backend);
    output.kv("time", &format!("{} ms", response.response_time_ms));
    Ok(())
}

async fn run_init_db(config: &QcragConfig, output: &Output, reset: bool) -> anyhow::Result<()> {
    let store = StoreProvider::from_config(config)?.create_store().await?;

    if reset {
        output.warning("Dropping existing Q&A rows");
    }
    store.ensure_schema(config.embedding.dimensions, reset).await?;

    output.success(&format!(
        "Schema ready ({} store, {} dimensions)",
        store.name(),
        config.embedding.dimensions
    ));
    output.hint("Load the corpus next:");
    output.command("qcrag-server ingest FILE=SOURCE");
    Ok(())
}

async fn run_ingest(
    config: &QcragConfig,
    output: &Output,
    files: &[String],
    reset: bool,
) -> anyhow::Result<()> {
    let files = files
        .iter()
        .map(|arg| arg.parse::<CorpusFile>())
        .collect::<Result<Vec<_>, _>>()?;

    if config.database.provider == "memory" {
        output.warning("The memory store is discarded when this command exits");
    }

    output.step(1, 3, "Connecting");
    let embedder = qcrag::build_embedder(config)?;
    let store = StoreProvider::from_config(config)?.create_store().await?;
    store.ensure_schema(config.embedding.dimensions, false).await?;

    if reset {
        output.step(2, 3, "Clearing stored rows");
        store.clear().await?;
    } else {
        output.step(2, 3, "Keeping stored rows");
    }

    output.step(3, 3, "Embedding and storing");
    let options = IngestOptions {
        batch_size: config.embedding.batch_size,
        retry_delay: Duration::from_secs(config.embedding.retry_delay_secs),
    };
    let report = Ingestor::new(embedder.as_ref(), store.as_ref(), options)
        .ingest_files(&files)
        .await?;

    output.success(&format!(
        "Stored {} rows from {} files in {:.1}s ({:.1} rows/s)",
        report.rows_stored,
        report.files,
        report.duration.as_secs_f64(),
        report.rate()
    ));
    if report.rows_skipped > 0 {
        output.warning(&format!(
            "Skipped {} rows with an empty question or answer",
            report.rows_skipped
        ));
    }
    if report.retried_batches > 0 {
        output.info(&format!("{} batches needed a retry", report.retried_batches));
    }
    output.kv("total rows", &store.count().await?.to_string());
    Ok(())
}

fn run_config(
    config_manager: &ConfigManager,
    output: &Output,
    validate: bool,
) -> anyhow::Result<()> {
    let config = config_manager.config();

    if validate {
        // Structure was checked on load; secrets are checked here
        config.validate_env()?;
        output.success(&format!("{} is valid", config_manager.path().display()));
        return Ok(());
    }

    output.header("Configuration");
    output.kv("file", &config_manager.path().display().to_string());
    output.newline();
    output.block(&toml::to_string_pretty(config.as_ref())?);
    Ok(())
}

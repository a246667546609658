mod common;

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use common::mocks::{MOCK_DIMENSIONS, MockEmbedder, sample_pairs};
use qcrag::rag::cache::QueryEmbeddingCache;
use qcrag::rag::embeddings::InputType;
use qcrag::rag::ingest::{CorpusFile, IngestOptions, Ingestor};
use qcrag::rag::retriever::{RetrievalOptions, Retriever};
use qcrag::rag::search::SearchStrategy;
use qcrag::{InMemoryQaStore, QaStore};

fn options(batch_size: usize) -> IngestOptions {
    IngestOptions {
        batch_size,
        retry_delay: Duration::ZERO,
    }
}

fn corpus_file(rows: &[(&str, &str)]) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "question,answer").unwrap();
    for (question, answer) in rows {
        writeln!(file, "\"{}\",\"{}\"", question, answer).unwrap();
    }
    file.flush().unwrap();
    file
}

#[tokio::test]
async fn test_ingest_files_labels_rows_by_source() {
    let claude = corpus_file(&[
        ("What is a qubit?", "A two-level quantum system."),
        ("What is a gate?", "A unitary operation."),
        ("", "Orphan answer"),
    ]);
    let stackexchange = corpus_file(&[("What is entanglement?", "Correlated qubit states.")]);

    let files = vec![
        format!("{}=claude", claude.path().display())
            .parse::<CorpusFile>()
            .unwrap(),
        format!("{}=stackexchange", stackexchange.path().display())
            .parse::<CorpusFile>()
            .unwrap(),
    ];

    let embedder = MockEmbedder::new();
    let store = InMemoryQaStore::new();
    store.ensure_schema(MOCK_DIMENSIONS, false).await.unwrap();

    let report = Ingestor::new(&embedder, &store, options(2))
        .ingest_files(&files)
        .await
        .unwrap();

    assert_eq!(report.files, 2);
    assert_eq!(report.rows_read, 3);
    assert_eq!(report.rows_skipped, 1);
    assert_eq!(report.rows_stored, 3);
    assert_eq!(report.batches, 2);
    assert_eq!(report.retried_batches, 0);
    assert_eq!(store.count().await.unwrap(), 3);

    let hits = store.keyword_search("entanglement", 5).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].source, "stackexchange");
}

#[tokio::test]
async fn test_failed_batch_is_retried_once() {
    let embedder = MockEmbedder::failing_first(1);
    let store = InMemoryQaStore::new();
    let pairs = sample_pairs();

    let report = Ingestor::new(&embedder, &store, options(4))
        .ingest_pairs(&pairs)
        .await
        .unwrap();

    assert_eq!(report.rows_stored, pairs.len());
    assert_eq!(report.batches, 2);
    assert_eq!(report.retried_batches, 1);
    // two batches plus one retry
    assert_eq!(embedder.calls(), 3);
    assert_eq!(embedder.input_types(), vec![InputType::Document; 3]);
}

#[tokio::test]
async fn test_questions_are_embedded_as_queries() {
    let embedder = Arc::new(MockEmbedder::new());
    let store = Arc::new(InMemoryQaStore::new());
    let pairs = sample_pairs();

    Ingestor::new(embedder.as_ref(), store.as_ref(), options(20))
        .ingest_pairs(&pairs)
        .await
        .unwrap();
    assert_eq!(embedder.input_types(), vec![InputType::Document]);

    let retriever = Retriever::new(embedder.clone(), store, QueryEmbeddingCache::disabled());
    let semantic = RetrievalOptions::default();
    let hybrid = RetrievalOptions {
        strategy: SearchStrategy::Hybrid,
        ..RetrievalOptions::default()
    };
    retriever.search("What is a qubit?", &semantic).await.unwrap();
    retriever.search("What is entanglement?", &hybrid).await.unwrap();

    assert_eq!(
        embedder.input_types(),
        vec![InputType::Document, InputType::Query, InputType::Query]
    );
}

#[tokio::test]
async fn test_second_failure_aborts_and_keeps_earlier_batches() {
    let embedder = MockEmbedder::new();
    let store = InMemoryQaStore::new();
    let pairs = sample_pairs();

    // Rows from an earlier run stay put when a later run fails
    Ingestor::new(&embedder, &store, options(3))
        .ingest_pairs(&pairs[..3])
        .await
        .unwrap();

    let failing = MockEmbedder::failing_first(2);
    let result = Ingestor::new(&failing, &store, options(3))
        .ingest_pairs(&pairs[3..])
        .await;

    assert!(result.is_err());
    assert_eq!(failing.calls(), 2);
    assert_eq!(store.count().await.unwrap(), 3);
}

#[tokio::test]
async fn test_missing_file_is_error() {
    let embedder = MockEmbedder::new();
    let store = InMemoryQaStore::new();
    let files = vec!["/nonexistent/corpus.csv=claude".parse::<CorpusFile>().unwrap()];

    let result = Ingestor::new(&embedder, &store, options(20))
        .ingest_files(&files)
        .await;

    assert!(result.is_err());
    assert_eq!(embedder.calls(), 0);
}

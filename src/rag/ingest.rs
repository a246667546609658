//! Corpus ingestion: CSV files → embeddings → store.
//!
//! Each CSV needs `question` and `answer` columns. Lines starting with `#`
//! are comments. Rows missing either field are skipped.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::{Duration, Instant};

use serde::Deserialize;
use tracing::{info, warn};

use crate::db::QaStore;
use crate::rag::embeddings::{EmbeddingClient, InputType};
use crate::types::{AppError, QaPair, Result};

/// Longest source label the store accepts
pub const MAX_SOURCE_LEN: usize = 50;

/// A corpus file and the source label its rows are stored under
#[derive(Debug, Clone, PartialEq)]
pub struct CorpusFile {
    pub path: PathBuf,
    pub source: String,
}

impl FromStr for CorpusFile {
    type Err = AppError;

    /// Parse `FILE` or `FILE=SOURCE`; the label defaults to the file stem
    fn from_str(s: &str) -> Result<Self> {
        let (path, source) = match s.rsplit_once('=') {
            Some((path, source)) => (PathBuf::from(path), source.trim().to_string()),
            None => {
                let path = PathBuf::from(s);
                let stem = path
                    .file_stem()
                    .map(|stem| stem.to_string_lossy().into_owned())
                    .unwrap_or_default();
                (path, stem)
            }
        };

        if path.as_os_str().is_empty() {
            return Err(AppError::InvalidInput(format!("Missing file path in '{}'", s)));
        }
        if source.is_empty() {
            return Err(AppError::InvalidInput(format!("Missing source label in '{}'", s)));
        }
        if source.chars().count() > MAX_SOURCE_LEN {
            return Err(AppError::InvalidInput(format!(
                "Source label '{}' is longer than {} characters",
                source, MAX_SOURCE_LEN
            )));
        }

        Ok(Self { path, source })
    }
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(default)]
    question: String,
    #[serde(default)]
    answer: String,
}

/// Rows read from one file
#[derive(Debug, Clone)]
pub struct LoadedFile {
    pub pairs: Vec<QaPair>,
    pub skipped: usize,
}

/// Read Q&A rows from a CSV file, labelling each with `source`.
pub fn load_csv(path: &Path, source: &str) -> Result<LoadedFile> {
    let mut reader = csv::ReaderBuilder::new()
        .comment(Some(b'#'))
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)
        .map_err(|e| AppError::InvalidInput(format!("Cannot read {}: {}", path.display(), e)))?;

    let headers = reader.headers().map_err(|e| {
        AppError::InvalidInput(format!("Bad CSV header in {}: {}", path.display(), e))
    })?;
    for required in ["question", "answer"] {
        if !headers.iter().any(|h| h == required) {
            return Err(AppError::InvalidInput(format!(
                "{} has no '{}' column",
                path.display(),
                required
            )));
        }
    }

    let mut pairs = Vec::new();
    let mut skipped = 0;
    for record in reader.deserialize::<CsvRow>() {
        let row = record.map_err(|e| {
            AppError::InvalidInput(format!("Bad CSV row in {}: {}", path.display(), e))
        })?;

        if row.question.is_empty() || row.answer.is_empty() {
            skipped += 1;
            continue;
        }

        pairs.push(QaPair {
            question: row.question,
            answer: row.answer,
            source: source.to_string(),
        });
    }

    Ok(LoadedFile { pairs, skipped })
}

/// Batch size and retry pause for ingestion
#[derive(Debug, Clone, Copy)]
pub struct IngestOptions {
    pub batch_size: usize,
    pub retry_delay: Duration,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            batch_size: 20,
            retry_delay: Duration::from_secs(60),
        }
    }
}

/// Outcome of an ingestion run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestReport {
    pub files: usize,
    pub rows_read: usize,
    pub rows_skipped: usize,
    pub rows_stored: usize,
    pub batches: usize,
    pub retried_batches: usize,
    pub duration: Duration,
}

impl IngestReport {
    /// Rows stored per second
    pub fn rate(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs > 0.0 {
            self.rows_stored as f64 / secs
        } else {
            0.0
        }
    }
}

/// Embeds corpus rows as documents and writes them to the store
pub struct Ingestor<'a> {
    embedder: &'a dyn EmbeddingClient,
    store: &'a dyn QaStore,
    options: IngestOptions,
}

impl<'a> Ingestor<'a> {
    pub fn new(
        embedder: &'a dyn EmbeddingClient,
        store: &'a dyn QaStore,
        options: IngestOptions,
    ) -> Self {
        Self {
            embedder,
            store,
            options,
        }
    }

    /// Load every file, then embed and store all rows
    pub async fn ingest_files(&self, files: &[CorpusFile]) -> Result<IngestReport> {
        let mut pairs = Vec::new();
        let mut skipped = 0;

        for file in files {
            let loaded = load_csv(&file.path, &file.source)?;
            info!(
                file = %file.path.display(),
                source = %file.source,
                rows = loaded.pairs.len(),
                skipped = loaded.skipped,
                "Loaded corpus file"
            );
            skipped += loaded.skipped;
            pairs.extend(loaded.pairs);
        }

        let mut report = self.ingest_pairs(&pairs).await?;
        report.files = files.len();
        report.rows_skipped = skipped;
        Ok(report)
    }

    /// Embed and store rows in batches.
    ///
    /// A failed batch is retried once after `retry_delay`; a second failure
    /// aborts the run with rows from earlier batches already stored.
    pub async fn ingest_pairs(&self, pairs: &[QaPair]) -> Result<IngestReport> {
        let start = Instant::now();
        let total = pairs.len();
        let batch_size = self.options.batch_size.max(1);
        let total_batches = total.div_ceil(batch_size);

        let mut report = IngestReport {
            rows_read: total,
            ..Default::default()
        };

        for (index, batch) in pairs.chunks(batch_size).enumerate() {
            let texts: Vec<String> = batch.iter().map(QaPair::embedding_text).collect();

            let embeddings = match self.embedder.embed(&texts, InputType::Document).await {
                Ok(embeddings) => embeddings,
                Err(e) => {
                    warn!(
                        batch = index + 1,
                        error = %e,
                        retry_in_secs = self.options.retry_delay.as_secs(),
                        "Embedding batch failed, retrying"
                    );
                    tokio::time::sleep(self.options.retry_delay).await;
                    report.retried_batches += 1;
                    self.embedder.embed(&texts, InputType::Document).await?
                }
            };

            report.rows_stored += self.store.insert_batch(batch, &embeddings).await?;
            report.batches += 1;

            let elapsed = start.elapsed().as_secs_f64();
            let rate = if elapsed > 0.0 {
                report.rows_stored as f64 / elapsed
            } else {
                0.0
            };
            let eta_secs = if rate > 0.0 {
                (total - report.rows_stored) as f64 / rate
            } else {
                0.0
            };
            info!(
                batch = index + 1,
                total_batches,
                stored = report.rows_stored,
                total,
                rows_per_sec = (rate * 10.0).round() / 10.0,
                eta_secs = eta_secs.round() as u64,
                "Stored batch"
            );
        }

        report.duration = start.elapsed();
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_corpus_file_with_label() {
        let file: CorpusFile = "data/raw/claude_qa.csv=claude".parse().unwrap();
        assert_eq!(file.path, PathBuf::from("data/raw/claude_qa.csv"));
        assert_eq!(file.source, "claude");
    }

    #[test]
    fn test_corpus_file_defaults_to_stem() {
        let file: CorpusFile = "data/raw/stackexchange.csv".parse().unwrap();
        assert_eq!(file.source, "stackexchange");
    }

    #[test]
    fn test_corpus_file_rejects_long_label() {
        let arg = format!("a.csv={}", "x".repeat(MAX_SOURCE_LEN + 1));
        assert!(arg.parse::<CorpusFile>().is_err());
        assert!("a.csv=".parse::<CorpusFile>().is_err());
    }

    #[test]
    fn test_load_csv_skips_comments_and_blank_rows() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# generated corpus").unwrap();
        writeln!(file, "question,answer").unwrap();
        writeln!(file, "What is a qubit?,A two-level system.").unwrap();
        writeln!(file, "# a comment between rows").unwrap();
        writeln!(file, "\"What is a gate, really?\",\"An operation, on qubits.\"").unwrap();
        writeln!(file, ",Answer without question").unwrap();
        writeln!(file, "Question without answer,  ").unwrap();
        file.flush().unwrap();

        let loaded = load_csv(file.path(), "claude").unwrap();

        assert_eq!(loaded.pairs.len(), 2);
        assert_eq!(loaded.skipped, 2);
        assert_eq!(loaded.pairs[1].question, "What is a gate, really?");
        assert_eq!(loaded.pairs[1].answer, "An operation, on qubits.");
        assert!(loaded.pairs.iter().all(|p| p.source == "claude"));
    }

    #[test]
    fn test_load_csv_requires_columns() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "prompt,response").unwrap();
        writeln!(file, "a,b").unwrap();
        file.flush().unwrap();

        assert!(matches!(
            load_csv(file.path(), "x"),
            Err(AppError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_report_rate() {
        let report = IngestReport {
            rows_stored: 50,
            duration: Duration::from_secs(10),
            ..Default::default()
        };
        assert!((report.rate() - 5.0).abs() < 1e-9);
        assert_eq!(IngestReport::default().rate(), 0.0);
    }
}

//! Mock implementations for testing.
//!
//! Deterministic embedders, backends and factories shared across the
//! integration tests so no test talks to a real API.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use qcrag::llm::{AnswerBackend, BackendFactoryTrait};
use qcrag::rag::embeddings::{EmbeddingClient, InputType};
use qcrag::types::{AppError, QaPair, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Words that each get their own embedding axis
const VOCABULARY: [&str; 7] = [
    "qubit",
    "superposition",
    "entanglement",
    "gate",
    "measure",
    "algorithm",
    "error",
];

/// Embedding width produced by [`MockEmbedder`]
pub const MOCK_DIMENSIONS: usize = VOCABULARY.len() + 1;

/// Embedder that counts vocabulary words.
///
/// The last axis is a small constant so no vector is all zeros.
/// Can be told to fail its first `n` calls. Every call's input type is
/// recorded, failed calls included.
pub struct MockEmbedder {
    calls: AtomicUsize,
    failures_left: AtomicUsize,
    input_types: Mutex<Vec<InputType>>,
}

impl MockEmbedder {
    pub fn new() -> Self {
        Self::failing_first(0)
    }

    /// Fail the first `n` calls with an embedding error
    pub fn failing_first(n: usize) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            failures_left: AtomicUsize::new(n),
            input_types: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Input types in call order
    pub fn input_types(&self) -> Vec<InputType> {
        self.input_types.lock().clone()
    }

    pub fn vector(text: &str) -> Vec<f32> {
        let lowered = text.to_lowercase();
        let mut vector: Vec<f32> = VOCABULARY
            .iter()
            .map(|word| lowered.matches(word).count() as f32)
            .collect();
        vector.push(0.1);
        vector
    }
}

#[async_trait]
impl EmbeddingClient for MockEmbedder {
    async fn embed(&self, texts: &[String], input_type: InputType) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.input_types.lock().push(input_type);

        let should_fail = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(AppError::Embedding("Mock rate limit".to_string()));
        }

        Ok(texts.iter().map(|text| Self::vector(text)).collect())
    }

    fn model_name(&self) -> &str {
        "mock-embedder"
    }

    fn dimensions(&self) -> usize {
        MOCK_DIMENSIONS
    }
}

/// Backend that returns a fixed answer or always fails
pub struct MockBackend {
    answer: String,
    name: String,
    should_fail: bool,
}

impl MockBackend {
    pub fn new(answer: &str) -> Self {
        Self {
            answer: answer.to_string(),
            name: "groq".to_string(),
            should_fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            answer: String::new(),
            name: "groq".to_string(),
            should_fail: true,
        }
    }
}

#[async_trait]
impl AnswerBackend for MockBackend {
    async fn generate(&self, _context: &str, _question: &str) -> Result<String> {
        if self.should_fail {
            return Err(AppError::LLM("Mock backend failure".to_string()));
        }
        Ok(format!("  {}  ", self.answer))
    }

    fn extract_answer(&self, generated: &str) -> String {
        generated.trim().to_string()
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Factory that hands out one shared mock backend and counts loads
pub struct MockBackendFactory {
    backend: Arc<MockBackend>,
    loads: AtomicUsize,
    fail_load: bool,
}

impl MockBackendFactory {
    pub fn new(backend: MockBackend) -> Self {
        Self {
            backend: Arc::new(backend),
            loads: AtomicUsize::new(0),
            fail_load: false,
        }
    }

    /// A factory whose backend cannot be loaded at all
    pub fn failing_load() -> Self {
        Self {
            fail_load: true,
            ..Self::new(MockBackend::new(""))
        }
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BackendFactoryTrait for MockBackendFactory {
    async fn create_backend(&self) -> Result<Arc<dyn AnswerBackend>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if self.fail_load {
            return Err(AppError::Unavailable("Mock backend unavailable".to_string()));
        }
        Ok(self.backend.clone())
    }

    fn backend_name(&self) -> &str {
        "groq"
    }
}

/// A small quantum computing corpus
pub fn sample_pairs() -> Vec<QaPair> {
    [
        (
            "What is a qubit?",
            "A qubit is the basic unit of quantum information.",
            "claude",
        ),
        (
            "How does superposition work?",
            "Superposition lets a qubit hold a blend of basis states until you measure it.",
            "claude",
        ),
        (
            "What is entanglement?",
            "Entanglement correlates qubit states so one measurement informs the other.",
            "stackexchange",
        ),
        (
            "How do you measure a qubit?",
            "Measurement collapses the qubit to a basis state.",
            "stackexchange",
        ),
        (
            "What does a quantum gate do?",
            "A gate is a unitary operation on one or more qubits.",
            "claude",
        ),
        (
            "What is Shor's algorithm?",
            "An algorithm that factors integers in polynomial time.",
            "stackexchange",
        ),
    ]
    .into_iter()
    .map(|(question, answer, source)| QaPair {
        question: question.to_string(),
        answer: answer.to_string(),
        source: source.to_string(),
    })
    .collect()
}

//! Ranking primitives for retrieval.
//!
//! - **Semantic search** is delegated to the store (dense cosine similarity).
//! - **BM25** gives the in-memory store a lexical ranking comparable to
//!   Postgres full-text search.
//! - **Reciprocal Rank Fusion** merges the two ranked lists for hybrid search.
//!
//! Rows are identified by their store id (`i64`) throughout.

use std::collections::{HashMap, HashSet};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::types::{AppError, Result};

// ============================================================================
// Search Strategy
// ============================================================================

/// How the retriever ranks corpus rows for a question
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum SearchStrategy {
    /// Nearest neighbours by cosine similarity
    #[default]
    Semantic,
    /// Semantic and keyword rankings merged with weighted RRF
    Hybrid,
}

impl FromStr for SearchStrategy {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "semantic" | "dense" | "vector" => Ok(Self::Semantic),
            "hybrid" | "combined" | "rrf" => Ok(Self::Hybrid),
            _ => Err(AppError::Configuration(format!(
                "Unknown search strategy: {}. Use: semantic, hybrid",
                s
            ))),
        }
    }
}

impl std::fmt::Display for SearchStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Semantic => "semantic",
            Self::Hybrid => "hybrid",
        };
        write!(f, "{}", name)
    }
}

// ============================================================================
// BM25
// ============================================================================

/// BM25 index over Q&A rows
#[derive(Debug, Clone, Default)]
pub struct Bm25Index {
    /// Row id -> term counts
    term_counts: HashMap<i64, HashMap<String, usize>>,
    /// Row id -> token count
    lengths: HashMap<i64, usize>,
    /// Term -> row ids containing it
    postings: HashMap<String, HashSet<i64>>,
    total_length: usize,
    /// Term frequency saturation
    k1: f32,
    /// Length normalization
    b: f32,
}

impl Bm25Index {
    /// Create an index with the usual parameters (k1 = 1.2, b = 0.75)
    pub fn new() -> Self {
        Self::with_params(1.2, 0.75)
    }

    pub fn with_params(k1: f32, b: f32) -> Self {
        Self {
            k1,
            b,
            ..Default::default()
        }
    }

    /// Lowercased alphanumeric terms, single characters dropped
    pub fn tokenize(text: &str) -> Vec<String> {
        text.to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|s| s.chars().count() > 1)
            .map(String::from)
            .collect()
    }

    /// Index a row. Re-adding an id replaces the previous text.
    pub fn add(&mut self, id: i64, text: &str) {
        self.remove(id);

        let tokens = Self::tokenize(text);
        let mut counts: HashMap<String, usize> = HashMap::new();
        for token in &tokens {
            *counts.entry(token.clone()).or_insert(0) += 1;
        }
        for term in counts.keys() {
            self.postings.entry(term.clone()).or_default().insert(id);
        }

        self.total_length += tokens.len();
        self.lengths.insert(id, tokens.len());
        self.term_counts.insert(id, counts);
    }

    pub fn remove(&mut self, id: i64) {
        let Some(counts) = self.term_counts.remove(&id) else {
            return;
        };
        for term in counts.keys() {
            if let Some(ids) = self.postings.get_mut(term) {
                ids.remove(&id);
                if ids.is_empty() {
                    self.postings.remove(term);
                }
            }
        }
        if let Some(len) = self.lengths.remove(&id) {
            self.total_length = self.total_length.saturating_sub(len);
        }
    }

    fn idf(&self, term: &str) -> f32 {
        let df = self.postings.get(term).map(|ids| ids.len()).unwrap_or(0) as f32;
        let n = self.len() as f32;
        if df == 0.0 || n == 0.0 {
            return 0.0;
        }
        ((n - df + 0.5) / (df + 0.5) + 1.0).ln()
    }

    fn score(&self, id: i64, query_terms: &[String]) -> f32 {
        let (Some(counts), Some(&len)) = (self.term_counts.get(&id), self.lengths.get(&id)) else {
            return 0.0;
        };
        let avg_len = self.total_length as f32 / self.len().max(1) as f32;
        let norm = 1.0 - self.b + self.b * len as f32 / avg_len.max(f32::EPSILON);

        query_terms
            .iter()
            .map(|term| {
                let tf = counts.get(term).copied().unwrap_or(0) as f32;
                if tf == 0.0 {
                    return 0.0;
                }
                self.idf(term) * tf * (self.k1 + 1.0) / (tf + self.k1 * norm)
            })
            .sum()
    }

    /// Best `limit` rows for the query, highest score first
    pub fn search(&self, query: &str, limit: usize) -> Vec<(i64, f32)> {
        let query_terms = Self::tokenize(query);
        if query_terms.is_empty() {
            return Vec::new();
        }

        let candidates: HashSet<i64> = query_terms
            .iter()
            .filter_map(|term| self.postings.get(term))
            .flat_map(|ids| ids.iter().copied())
            .collect();

        let mut results: Vec<(i64, f32)> = candidates
            .into_iter()
            .map(|id| (id, self.score(id, &query_terms)))
            .filter(|(_, score)| *score > 0.0)
            .collect();

        // Ties broken by id so results are stable
        results.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        results.truncate(limit);
        results
    }

    pub fn len(&self) -> usize {
        self.term_counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.term_counts.is_empty()
    }

    pub fn clear(&mut self) {
        self.term_counts.clear();
        self.lengths.clear();
        self.postings.clear();
        self.total_length = 0;
    }
}

// ============================================================================
// Reciprocal Rank Fusion
// ============================================================================

/// Weighted Reciprocal Rank Fusion
///
/// A row at 1-based position `rank` in a list with weight `w` contributes
/// `w / (k + rank)`. Rows missing from a list contribute nothing for it.
#[derive(Debug, Clone, Copy)]
pub struct RrfFusion {
    k: f32,
}

impl Default for RrfFusion {
    fn default() -> Self {
        Self { k: 60.0 }
    }
}

impl RrfFusion {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_k(k: f32) -> Self {
        Self { k }
    }

    /// Fuse ranked lists of `(id, score)`, each paired with its weight.
    /// Input scores are ignored; only positions matter.
    pub fn fuse(&self, ranked_lists: &[(&[(i64, f32)], f32)]) -> Vec<(i64, f32)> {
        let mut fused: HashMap<i64, f32> = HashMap::new();

        for (results, weight) in ranked_lists {
            for (position, (id, _)) in results.iter().enumerate() {
                let rank = position as f32 + 1.0;
                *fused.entry(*id).or_insert(0.0) += weight / (self.k + rank);
            }
        }

        let mut results: Vec<_> = fused.into_iter().collect();
        results.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_strategy_from_str() {
        assert_eq!(
            "semantic".parse::<SearchStrategy>().unwrap(),
            SearchStrategy::Semantic
        );
        assert_eq!(
            "Hybrid".parse::<SearchStrategy>().unwrap(),
            SearchStrategy::Hybrid
        );
        assert!("fuzzy".parse::<SearchStrategy>().is_err());
    }

    #[test]
    fn test_bm25_basic() {
        let mut index = Bm25Index::new();
        index.add(1, "What is a qubit? A qubit is a two-level quantum system.");
        index.add(2, "What is entanglement? Correlated quantum states.");
        index.add(3, "What is a classical bit? Zero or one.");

        let results = index.search("qubit", 10);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0, 1);
    }

    #[test]
    fn test_bm25_prefers_higher_term_frequency() {
        let mut index = Bm25Index::new();
        index.add(1, "superposition superposition superposition");
        index.add(2, "superposition gates");
        index.add(3, "measurement collapse");

        let results = index.search("superposition", 10);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0, 1);
    }

    #[test]
    fn test_bm25_readd_replaces_text() {
        let mut index = Bm25Index::new();
        index.add(7, "grover search");
        index.add(7, "shor factoring");

        assert_eq!(index.len(), 1);
        assert!(index.search("grover", 5).is_empty());
        assert_eq!(index.search("factoring", 5)[0].0, 7);
    }

    #[test]
    fn test_bm25_remove_and_clear() {
        let mut index = Bm25Index::new();
        index.add(1, "quantum gates");
        index.add(2, "quantum circuits");
        index.remove(1);
        let ids: Vec<i64> = index.search("quantum", 5).iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![2]);

        index.clear();
        assert!(index.is_empty());
        assert!(index.search("quantum", 5).is_empty());
    }

    #[test]
    fn test_bm25_empty_query() {
        let mut index = Bm25Index::new();
        index.add(1, "quantum");
        assert!(index.search("? !", 5).is_empty());
    }

    #[test]
    fn test_rrf_uses_one_based_ranks() {
        let rrf = RrfFusion::new();
        let semantic = vec![(10, 0.9)];
        let fused = rrf.fuse(&[(&semantic, 1.0)]);
        assert!((fused[0].1 - 1.0 / 61.0).abs() < 1e-6);
    }

    #[test]
    fn test_rrf_rank_offset_decides_close_calls() {
        // Row 1 sits at positions 0 and 19, row 2 at 4 and 13.
        // Counting from 1 puts row 2 ahead; counting from 0 would flip them.
        let padded = |placed: &[(usize, i64)], base: i64| -> Vec<(i64, f32)> {
            (0..20)
                .map(|position| {
                    let id = placed
                        .iter()
                        .find(|(at, _)| *at == position)
                        .map(|(_, id)| *id)
                        .unwrap_or(base + position as i64);
                    (id, 1.0)
                })
                .collect()
        };
        let semantic = padded(&[(0, 1), (4, 2)], 100);
        let keyword = padded(&[(13, 2), (19, 1)], 200);

        let fused = RrfFusion::with_k(60.0).fuse(&[(&semantic, 0.5), (&keyword, 0.5)]);

        let one = fused.iter().position(|(id, _)| *id == 1).unwrap();
        let two = fused.iter().position(|(id, _)| *id == 2).unwrap();
        assert!(two < one);
        assert_eq!(fused[0].0, 2);
    }

    #[test]
    fn test_rrf_weighted_fusion() {
        let rrf = RrfFusion::with_k(60.0);
        let semantic = vec![(1, 0.9), (2, 0.8), (3, 0.7)];
        let keyword = vec![(3, 5.0), (2, 4.0)];

        let fused = rrf.fuse(&[(&semantic, 0.5), (&keyword, 0.5)]);

        assert_eq!(fused.len(), 3);
        // Row 2 appears at rank 2 in both lists
        let expected_two = 0.5 / 62.0 + 0.5 / 62.0;
        let two = fused.iter().find(|(id, _)| *id == 2).unwrap();
        assert!((two.1 - expected_two).abs() < 1e-6);
        // Row 3 is first in keyword and third in semantic, beating row 2
        assert_eq!(fused[0].0, 3);
    }

    #[test]
    fn test_rrf_alpha_one_keeps_semantic_order() {
        let rrf = RrfFusion::new();
        let semantic = vec![(5, 0.9), (6, 0.8)];
        let keyword = vec![(6, 3.0), (5, 1.0)];

        let fused = rrf.fuse(&[(&semantic, 1.0), (&keyword, 0.0)]);
        let ids: Vec<i64> = fused.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![5, 6]);
    }
}

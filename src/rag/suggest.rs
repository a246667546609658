//! Follow-up question suggestions.
//!
//! Suggestions are drawn from the questions of retrieved rows. A candidate is
//! dropped when it restates the user's question or repeats a prompt the
//! user has already been shown.

use std::collections::HashSet;

use similar::TextDiff;

use crate::types::RetrievedPair;

/// Thresholds and limits for suggestion selection
#[derive(Debug, Clone, Copy)]
pub struct SuggestionOptions {
    /// Candidates above this similarity to the user's question are skipped
    pub max_question_similarity: f64,
    /// Candidates above this similarity to a chosen or shown prompt are duplicates
    pub duplicate_similarity: f64,
    pub max_suggestions: usize,
    /// Answer words must be longer than this to count as key terms
    pub min_term_len: usize,
}

impl Default for SuggestionOptions {
    fn default() -> Self {
        Self {
            max_question_similarity: 0.6,
            duplicate_similarity: 0.7,
            max_suggestions: 3,
            min_term_len: 5,
        }
    }
}

/// Case-insensitive character sequence similarity in `[0, 1]`
pub fn text_similarity(a: &str, b: &str) -> f64 {
    let a = a.to_lowercase();
    let b = b.to_lowercase();
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    f64::from(TextDiff::from_chars(a.as_str(), b.as_str()).ratio())
}

/// Lowercased answer words longer than `min_len` characters, edge punctuation removed
fn key_terms(answer: &str, min_len: usize) -> HashSet<String> {
    const EDGE_PUNCTUATION: &[char] = &[
        '.', ',', '!', '?', '(', ')', '[', ']', '{', '}', ':', ';', '"', '\'',
    ];

    answer
        .split_whitespace()
        .filter(|word| word.chars().count() > min_len)
        .map(|word| word.to_lowercase().trim_matches(EDGE_PUNCTUATION).to_string())
        .filter(|word| !word.is_empty())
        .collect()
}

fn is_shown(candidate: &str, shown: &[String], threshold: f64) -> bool {
    shown
        .iter()
        .any(|prompt| text_similarity(prompt, candidate) > threshold)
}

/// Pick the single best follow-up for an answered question.
///
/// Candidates are ranked by how many of the answer's key terms they mention,
/// then by lowest similarity to the user's question.
pub fn suggest_follow_up(
    question: &str,
    answer: &str,
    retrieved: &[RetrievedPair],
    shown: &[String],
    options: &SuggestionOptions,
) -> Option<String> {
    let terms = key_terms(answer, options.min_term_len);

    let mut candidates: Vec<(&str, f64, usize)> = retrieved
        .iter()
        .filter_map(|row| {
            let candidate = row.question.trim();
            if candidate.is_empty() {
                return None;
            }

            let similarity = text_similarity(question, candidate);
            if similarity > options.max_question_similarity {
                return None;
            }
            if is_shown(candidate, shown, options.duplicate_similarity) {
                return None;
            }

            let lowered = candidate.to_lowercase();
            let term_matches = terms
                .iter()
                .filter(|term| lowered.contains(term.as_str()))
                .count();

            Some((candidate, similarity, term_matches))
        })
        .collect();

    candidates.sort_by(|a, b| {
        b.2.cmp(&a.2)
            .then(a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
    });

    candidates.first().map(|(candidate, _, _)| candidate.to_string())
}

/// Up to `options.max_suggestions` follow-ups in retrieval order,
/// skipping restatements of the question and near-duplicates.
pub fn suggest_follow_ups(
    question: &str,
    retrieved: &[RetrievedPair],
    shown: &[String],
    options: &SuggestionOptions,
) -> Vec<String> {
    let mut suggestions: Vec<String> = Vec::new();

    for row in retrieved {
        if suggestions.len() >= options.max_suggestions {
            break;
        }

        let candidate = row.question.trim();
        if candidate.is_empty() {
            continue;
        }
        if text_similarity(question, candidate) > options.max_question_similarity {
            continue;
        }
        if is_shown(candidate, &suggestions, options.duplicate_similarity)
            || is_shown(candidate, shown, options.duplicate_similarity)
        {
            continue;
        }

        suggestions.push(candidate.to_string());
    }

    suggestions
}

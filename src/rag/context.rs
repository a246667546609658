//! Prompt context assembly.

use crate::types::RetrievedPair;

/// Cut `text` to at most `limit` characters, marking the cut with `...`.
///
/// Cuts fall on character boundaries, so multi-byte text is never split.
pub fn truncate_chars(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((byte_idx, _)) => format!("{}...", &text[..byte_idx]),
        None => text.to_string(),
    }
}

/// Join the first `max_pairs` rows into a single context string.
///
/// Each row renders as `Q: {question} A: {answer}` with the answer cut to
/// `answer_char_limit` characters; rows are separated by one space.
pub fn build_context(
    pairs: &[RetrievedPair],
    max_pairs: usize,
    answer_char_limit: usize,
) -> String {
    pairs
        .iter()
        .take(max_pairs)
        .map(|pair| {
            format!(
                "Q: {} A: {}",
                pair.question,
                truncate_chars(&pair.answer, answer_char_limit)
            )
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Prompt layout the custom model was trained on
pub fn build_prompt(context: &str, question: &str) -> String {
    format!("Context: {} Question: {} Answer:", context, question)
}

//! Word-overlap scoring of catalog candidates against OCR text.

use crate::domain::BookMatch;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

/// Candidates scoring below this are dropped.
pub const MATCH_THRESHOLD: f32 = 0.5;

static NON_WORD_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\w\s]").expect("punctuation pattern is a valid regex"));

/// Lowercased words longer than two characters, punctuation removed.
pub fn build_word_set(text: &str) -> HashSet<String> {
    let lowered = text.to_lowercase();
    NON_WORD_REGEX
        .replace_all(&lowered, "")
        .split_whitespace()
        .filter(|word| word.chars().count() > 2)
        .map(str::to_string)
        .collect()
}

/// Scores each candidate by the share of its title and author words found in
/// `ocr_words`.
///
/// Candidates with no usable words are skipped. The result holds only scores
/// of at least [`MATCH_THRESHOLD`], best first; equal scores keep catalog order.
pub fn score_results(results: &[BookMatch], ocr_words: &HashSet<String>) -> Vec<(BookMatch, f32)> {
    let mut scored: Vec<(BookMatch, f32)> = results
        .iter()
        .filter_map(|book| {
            let book_words = build_word_set(&format!("{} {}", book.title, book.author));
            if book_words.is_empty() {
                return None;
            }
            let matched = book_words.intersection(ocr_words).count();
            let score = matched as f32 / book_words.len() as f32;
            (score >= MATCH_THRESHOLD).then(|| (book.clone(), score))
        })
        .collect();

    scored.sort_by(|a, b| b.1.total_cmp(&a.1));
    scored
}

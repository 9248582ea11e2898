//! Small text helpers shared by the lexical scorers, the hashing embedder
//! and the document loader.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;

const STOPWORDS: [&str; 64] = [
    "a", "an", "and", "are", "as", "at", "be", "been", "but", "by", "can", "do", "does", "for",
    "from", "had", "has", "have", "how", "i", "if", "in", "into", "is", "it", "its", "me", "my",
    "no", "not", "of", "on", "or", "our", "so", "such", "than", "that", "the", "their", "them",
    "then", "there", "these", "they", "this", "to", "us", "was", "we", "were", "what", "when",
    "where", "which", "who", "why", "will", "with", "would", "you", "your", "all", "any",
];

fn token_regex() -> &'static Regex {
    static TOKEN: OnceLock<Regex> = OnceLock::new();
    TOKEN.get_or_init(|| Regex::new(r"[a-z0-9]+(?:\.[0-9]+)?").expect("static regex"))
}

fn sentence_regex() -> &'static Regex {
    static SENTENCE: OnceLock<Regex> = OnceLock::new();
    SENTENCE.get_or_init(|| Regex::new(r"[.!?]+(?:\s+|$)|\n+").expect("static regex"))
}

/// Lowercased alphanumeric tokens, in order.
pub fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    token_regex()
        .find_iter(&lowered)
        .map(|m| m.as_str().to_string())
        .collect()
}

pub fn is_stopword(token: &str) -> bool {
    STOPWORDS.contains(&token)
}

/// Tokens that carry meaning: stopwords and single letters removed.
pub fn content_tokens(text: &str) -> Vec<String> {
    tokenize(text)
        .into_iter()
        .filter(|t| !is_stopword(t))
        .filter(|t| t.len() > 1 || t.chars().all(|c| c.is_ascii_digit()))
        .collect()
}

pub fn content_token_set(text: &str) -> HashSet<String> {
    content_tokens(text).into_iter().collect()
}

/// Splits on sentence terminators and line breaks; empty pieces are dropped.
pub fn sentences(text: &str) -> Vec<String> {
    sentence_regex()
        .split(text)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

//! Text normalization shared by the phrase lexicons and knowledge lookups.
//!
//! Matching is done on crude prefix stems so Russian inflections
//! ("документы", "документов", "документами") collapse to one key.

const STEM_LEN: usize = 5;

pub fn normalize_text(text: &str) -> String {
    text.to_lowercase().replace('ё', "е")
}

pub fn tokenize(text: &str) -> Vec<String> {
    normalize_text(text)
        .split(|ch: char| !ch.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_owned)
        .collect()
}

pub fn stem(token: &str) -> String {
    token.chars().take(STEM_LEN).collect()
}

/// Stems of all tokens at least `min_len` characters long.
pub fn stems(text: &str, min_len: usize) -> Vec<String> {
    tokenize(text)
        .into_iter()
        .filter(|token| token.chars().count() >= min_len)
        .map(|token| stem(&token))
        .collect()
}

/// True when any phrase occurs in the normalized text.
pub fn contains_any(normalized_text: &str, phrases: &[&str]) -> bool {
    phrases.iter().any(|phrase| normalized_text.contains(phrase))
}

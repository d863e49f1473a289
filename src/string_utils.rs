//! Small string helpers shared by the pipeline stages.

use lazy_static::lazy_static;
use regex::Regex;
use strsim::normalized_levenshtein;

lazy_static! {
    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
}

pub fn is_blank(s: &str) -> bool {
    s.trim().is_empty()
}

/// Lowercase and trim.
pub fn normalize(s: &str) -> String {
    s.trim().to_lowercase()
}

/// Lowercase words split on any run of whitespace.
pub fn tokenize(text: &str) -> Vec<String> {
    WHITESPACE
        .split(text.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_lowercase())
        .collect()
}

/// Edit-distance similarity of the normalized strings, 0.0 to 1.0
pub fn similarity(a: &str, b: &str) -> f64 {
    let a = normalize(a);
    let b = normalize(b);
    if a == b {
        return 1.0;
    }
    normalized_levenshtein(&a, &b)
}

/// First needle contained in `text`, if any.
pub fn contains_any<'a, I>(text: &str, needles: I) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a String>,
{
    needles
        .into_iter()
        .map(String::as_str)
        .find(|needle| !needle.is_empty() && text.contains(needle))
}

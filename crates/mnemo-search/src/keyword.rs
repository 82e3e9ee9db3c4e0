//! Keyword query preparation.
//!
//! User queries are free text. Before they reach a full-text index every
//! operator character is stripped and each remaining word becomes a prefix
//! term, so `"renew passport!"` is searched as `renew* passport*`. Terms are
//! conjunctive. A query with no usable words becomes `""`, which matches
//! nothing.

/// Characters with meaning in full-text query syntax.
const SYNTAX_CHARS: &[char] = &[
    '"', '\'', '*', '(', ')', ':', '^', '-', '+', '!', '&', '|', '<', '>', '{', '}', '[', ']',
    '~', '\\', '/', '@', '.', ',', ';', '?', '=', '#', '%', '$', '`',
];

/// The empty query: matches nothing.
pub const EMPTY_QUERY: &str = "\"\"";

/// Turn free text into a safe prefix query.
pub fn prepare_fts_query(query: &str) -> String {
    let terms: Vec<String> = query
        .split(|c: char| c.is_whitespace() || SYNTAX_CHARS.contains(&c))
        .filter(|w| !w.is_empty())
        .filter(|w| w.chars().any(|c| c.is_alphanumeric()))
        .map(|w| format!("{}*", w.to_lowercase()))
        .collect();

    if terms.is_empty() {
        EMPTY_QUERY.to_string()
    } else {
        terms.join(" ")
    }
}

/// The bare prefixes of a prepared query, in order.
pub fn prefix_terms(prepared: &str) -> Vec<String> {
    if prepared.trim() == EMPTY_QUERY {
        return Vec::new();
    }
    prepared
        .split_whitespace()
        .map(|t| t.trim_end_matches('*').to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

//! Token counting for embedding context management.
//!
//! Embedding providers reject inputs above a token limit, but mnemo does not
//! ship a real subword tokenizer. [`TokenCounter`] approximates counts with
//! a word-shape heuristic and a safety margin so estimates err high.

use crate::defaults::TOKEN_SAFETY_MARGIN;

/// Trait for tokenization operations.
pub trait Tokenizer: Send + Sync {
    /// Count the number of tokens in the given text.
    fn count_tokens(&self, text: &str) -> usize;

    /// Get the name/identifier of this tokenizer.
    fn name(&self) -> &str;
}

/// Heuristic subword token estimator.
///
/// Per whitespace-free run of the input:
/// - digit runs cost `len / 2` tokens, rounded up
/// - words of up to 4 characters cost 1 token, 5 to 8 cost 1.3, longer
///   words cost `len / 5`
/// - every other non-space character (punctuation, symbols) costs 1
///
/// The sum is multiplied by the safety margin and rounded up.
///
/// Internally weights are kept in tenths of a token so that sums stay exact:
/// the weight of `"a b"` equals the weight of `"a"` plus the weight of `"b"`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenCounter;

impl TokenCounter {
    pub fn new() -> Self {
        Self
    }

    /// Pre-margin weight in tenths of a token.
    ///
    /// Additive across whitespace-separated parts.
    pub fn weight(&self, text: &str) -> u64 {
        let mut total = 0u64;
        let mut word_len = 0usize;
        let mut all_digits = true;

        for c in text.chars() {
            if c.is_alphanumeric() {
                word_len += 1;
                all_digits &= c.is_ascii_digit();
                continue;
            }
            total += word_weight(word_len, all_digits);
            word_len = 0;
            all_digits = true;
            if !c.is_whitespace() {
                total += 10;
            }
        }
        total + word_weight(word_len, all_digits)
    }

    /// Token count for a pre-margin weight, margin applied and rounded up.
    pub fn tokens_for_weight(&self, weight: u64) -> usize {
        let margin = (TOKEN_SAFETY_MARGIN * 10.0).round() as u64;
        (weight * margin).div_ceil(100) as usize
    }

    /// Largest weight whose token count stays within `tokens`.
    pub fn weight_budget(&self, tokens: usize) -> u64 {
        let margin = (TOKEN_SAFETY_MARGIN * 10.0).round() as u64;
        (tokens as u64 * 100) / margin
    }
}

fn word_weight(len: usize, all_digits: bool) -> u64 {
    match len {
        0 => 0,
        _ if all_digits => len.div_ceil(2) as u64 * 10,
        1..=4 => 10,
        5..=8 => 13,
        _ => len as u64 * 2,
    }
}

impl Tokenizer for TokenCounter {
    fn count_tokens(&self, text: &str) -> usize {
        self.tokens_for_weight(self.weight(text))
    }

    fn name(&self) -> &str {
        "heuristic"
    }
}

/// Estimate token count with the default [`TokenCounter`].
pub fn estimate_tokens(text: &str) -> usize {
    TokenCounter.count_tokens(text)
}

/// Check if text likely exceeds a token limit using estimation.
pub fn likely_exceeds_limit(text: &str, limit: usize) -> bool {
    estimate_tokens(text) > limit
}

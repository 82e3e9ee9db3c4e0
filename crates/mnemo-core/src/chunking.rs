//! Token-bounded chunking for embedding input.
//!
//! Text is sanitized, split into sentences, and greedily packed into chunks
//! of at most `max_tokens` estimated tokens. Each new chunk is seeded with
//! the trailing words of the previous one so context carries across the
//! boundary.
//!
//! # Example
//!
//! ```rust,ignore
//! use mnemo_core::{ChunkerConfig, TextChunker};
//!
//! let chunker = TextChunker::new(ChunkerConfig::default());
//! for chunk in chunker.chunk(&long_note) {
//!     println!("#{} ({} tokens)", chunk.index, chunk.token_count);
//! }
//! ```

use crate::defaults;
use crate::models::Chunk;
use crate::text::sanitize_text;
use crate::tokenizer::{TokenCounter, Tokenizer};

/// Configuration for [`TextChunker`], in estimated tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkerConfig {
    /// Maximum tokens per chunk.
    pub max_tokens: usize,
    /// Tokens of trailing context carried into the next chunk.
    pub overlap_tokens: usize,
    /// A trailing chunk under this is dropped (unless it is the only one).
    pub min_tokens: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            max_tokens: defaults::CHUNK_MAX_TOKENS,
            overlap_tokens: defaults::CHUNK_OVERLAP_TOKENS,
            min_tokens: defaults::CHUNK_MIN_TOKENS,
        }
    }
}

impl ChunkerConfig {
    /// Config with the given maximum and a 10% overlap.
    pub fn with_max_tokens(max_tokens: usize) -> Self {
        Self {
            max_tokens,
            overlap_tokens: max_tokens / 10,
            ..Default::default()
        }
    }

    pub fn overlap(mut self, overlap_tokens: usize) -> Self {
        self.overlap_tokens = overlap_tokens;
        self
    }

    pub fn min(mut self, min_tokens: usize) -> Self {
        self.min_tokens = min_tokens;
        self
    }
}

/// Sentence-packing chunker driven by [`TokenCounter`] estimates.
#[derive(Debug, Clone, Default)]
pub struct TextChunker {
    config: ChunkerConfig,
    counter: TokenCounter,
}

/// A piece of text with its pre-margin token weight.
#[derive(Debug, Clone)]
struct Piece {
    text: String,
    weight: u64,
}

impl TextChunker {
    pub fn new(config: ChunkerConfig) -> Self {
        Self {
            config,
            counter: TokenCounter,
        }
    }

    pub fn config(&self) -> &ChunkerConfig {
        &self.config
    }

    /// Sanitize and chunk `text`.
    ///
    /// Text shorter than `min_tokens` as a whole still yields one chunk.
    pub fn chunk(&self, text: &str) -> Vec<Chunk> {
        let clean = sanitize_text(text);
        if clean.is_empty() {
            return Vec::new();
        }

        let cap = self.counter.weight_budget(self.config.max_tokens.max(1));
        let overlap_cap = self
            .counter
            .weight_budget(self.config.overlap_tokens.min(self.config.max_tokens));

        let mut units = Vec::new();
        for sentence in split_sentences(&clean) {
            let piece = self.piece(sentence);
            if piece.weight <= cap {
                units.push(piece);
            } else {
                units.extend(self.hard_split(&piece.text, cap));
            }
        }

        let mut packer = Packer::new(cap, overlap_cap, self.config.min_tokens, self.counter);
        for unit in units {
            packer.push_unit(unit);
        }
        let mut texts = packer.finish();

        if texts.len() > 1 {
            if let Some(last) = texts.last() {
                if self.counter.count_tokens(last) < self.config.min_tokens {
                    texts.pop();
                }
            }
        }

        texts
            .into_iter()
            .enumerate()
            .map(|(index, text)| Chunk {
                token_count: self.counter.count_tokens(&text),
                char_count: text.chars().count(),
                text,
                index,
            })
            .collect()
    }

    fn piece(&self, text: &str) -> Piece {
        Piece {
            text: text.to_string(),
            weight: self.counter.weight(text),
        }
    }

    /// Split an oversized sentence into word groups that each fit `cap`.
    fn hard_split(&self, sentence: &str, cap: u64) -> Vec<Piece> {
        let mut groups = Vec::new();
        let mut current: Vec<String> = Vec::new();
        let mut current_weight = 0u64;

        for word in sentence.split_whitespace() {
            for part in self.split_long_word(word, cap) {
                if !current.is_empty() && current_weight + part.weight > cap {
                    groups.push(Piece {
                        text: current.join(" "),
                        weight: current_weight,
                    });
                    current.clear();
                    current_weight = 0;
                }
                current_weight += part.weight;
                current.push(part.text);
            }
        }
        if !current.is_empty() {
            groups.push(Piece {
                text: current.join(" "),
                weight: current_weight,
            });
        }
        groups
    }

    /// A single word above `cap` is cut into fixed character windows.
    fn split_long_word(&self, word: &str, cap: u64) -> Vec<Piece> {
        let piece = self.piece(word);
        if piece.weight <= cap {
            return vec![piece];
        }
        let window = (self.config.max_tokens / 2).max(1);
        let chars: Vec<char> = word.chars().collect();
        chars
            .chunks(window)
            .map(|w| self.piece(&w.iter().collect::<String>()))
            .collect()
    }
}

/// Greedy packer holding the chunk under construction.
struct Packer {
    cap: u64,
    overlap_cap: u64,
    min_tokens: usize,
    counter: TokenCounter,
    chunks: Vec<String>,
    current: Vec<Piece>,
    current_weight: u64,
    /// Weight of the overlap seed at the head of `current`.
    seed_weight: u64,
}

impl Packer {
    fn new(cap: u64, overlap_cap: u64, min_tokens: usize, counter: TokenCounter) -> Self {
        Self {
            cap,
            overlap_cap,
            min_tokens,
            counter,
            chunks: Vec::new(),
            current: Vec::new(),
            current_weight: 0,
            seed_weight: 0,
        }
    }

    fn push_unit(&mut self, unit: Piece) {
        if self.current_weight + unit.weight <= self.cap {
            self.append(unit);
            return;
        }

        // Closing now would leave an undersized chunk; fill it word by word.
        let words: Vec<&str> = unit.text.split_whitespace().collect();
        let undersized = self.counter.tokens_for_weight(self.current_weight) < self.min_tokens;
        if undersized && words.len() > 1 {
            for word in words {
                let piece = Piece {
                    text: word.to_string(),
                    weight: self.counter.weight(word),
                };
                if self.current_weight + piece.weight > self.cap {
                    self.close_and_seed(piece.weight);
                }
                self.append(piece);
            }
            return;
        }

        self.close_and_seed(unit.weight);
        self.append(unit);
    }

    fn append(&mut self, piece: Piece) {
        self.current_weight += piece.weight;
        self.current.push(piece);
    }

    /// Close the current chunk and seed the next with its trailing words,
    /// leaving room for `incoming` weight.
    fn close_and_seed(&mut self, incoming: u64) {
        if self.current.is_empty() {
            return;
        }
        let budget = self.overlap_cap.min(self.cap.saturating_sub(incoming));

        let closed = std::mem::take(&mut self.current);
        let text = closed
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");

        let mut tail: Vec<&str> = Vec::new();
        let mut tail_weight = 0u64;
        for word in text.split_whitespace().rev() {
            let w = self.counter.weight(word);
            if tail_weight + w > budget {
                break;
            }
            tail_weight += w;
            tail.push(word);
        }
        tail.reverse();

        self.chunks.push(text.clone());
        self.current_weight = 0;
        self.seed_weight = 0;
        if !tail.is_empty() {
            self.append(Piece {
                text: tail.join(" "),
                weight: tail_weight,
            });
            self.seed_weight = tail_weight;
        }
    }

    fn finish(mut self) -> Vec<String> {
        if self.current_weight > self.seed_weight || self.chunks.is_empty() {
            let text = self
                .current
                .iter()
                .map(|p| p.text.as_str())
                .collect::<Vec<_>>()
                .join(" ");
            if !text.is_empty() {
                self.chunks.push(text);
            }
        }
        self.chunks
    }
}

/// Split sanitized text into sentences on `.`, `!`, `?` followed by
/// whitespace (or end of text) and on newlines.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        let end = match c {
            '\n' => Some((i, i + 1)),
            '.' | '!' | '?' => match chars.peek() {
                None => Some((i + 1, i + 1)),
                Some((_, next)) if next.is_whitespace() => Some((i + 1, i + 1)),
                _ => None,
            },
            _ => None,
        };
        if let Some((stop, resume)) = end {
            let sentence = text[start..stop].trim();
            if !sentence.is_empty() {
                sentences.push(sentence);
            }
            start = resume;
        }
    }
    let rest = text[start..].trim();
    if !rest.is_empty() {
        sentences.push(rest);
    }
    sentences
}

/// Chunk with the default configuration.
pub fn chunk_text(text: &str) -> Vec<Chunk> {
    TextChunker::default().chunk(text)
}

/// Cap `text` at `max_chars` characters before an embedding request.
///
/// When a sentence boundary falls within the last 20% of the cut, the text
/// ends there instead of mid-sentence.
pub fn truncate_for_embedding(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut_byte = text
        .char_indices()
        .nth(max_chars)
        .map(|(i, _)| i)
        .unwrap_or(text.len());
    let cut = &text[..cut_byte];

    let window_start = (max_chars as f64 * (1.0 - defaults::EMBED_SENTENCE_WINDOW)) as usize;
    let mut boundary = None;
    let mut chars = cut.char_indices().enumerate().peekable();
    while let Some((pos, (i, c))) = chars.next() {
        if matches!(c, '.' | '!' | '?') {
            let at_break = match chars.peek() {
                None => true,
                Some((_, (_, next))) => next.is_whitespace(),
            };
            if at_break && pos + 1 >= window_start {
                boundary = Some(i + c.len_utf8());
            }
        }
    }

    match boundary {
        Some(end) => cut[..end].trim_end().to_string(),
        None => cut.trim_end().to_string(),
    }
}

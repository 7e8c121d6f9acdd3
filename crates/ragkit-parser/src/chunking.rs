//! Sentence-window chunking
//!
//! Text is split into sentences, sentences are packed into chunks under a
//! character budget, and each new chunk starts with the trailing sentences
//! of the previous one. The overlap is counted in sentences, the budget in
//! characters.

use std::ops::Range;

use once_cell::sync::Lazy;
use regex::Regex;

/// Sentence terminator followed by whitespace; the split happens after the terminator
static SENTENCE_BOUNDARY: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.!?]\s+").expect("valid regex"));

/// Configuration for document chunking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkConfig {
    /// Character budget of a chunk's sentences (separators not counted)
    pub max_length: usize,

    /// Trailing sentences of a closed chunk repeated at the start of the next
    pub overlap: usize,
}

impl ChunkConfig {
    pub fn new(max_length: usize, overlap: usize) -> Self {
        Self {
            max_length,
            overlap,
        }
    }
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            max_length: 500,
            overlap: 50,
        }
    }
}

/// A chunk of text from a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    /// Chunk content
    pub content: String,

    /// Chunk index within the document
    pub index: u32,

    /// Indices of the sentences (as returned by [`split_sentences`]) in this chunk
    pub sentences: Range<usize>,
}

/// Split text after `.`, `!` or `?` followed by whitespace.
///
/// Sentences are trimmed and empty ones dropped.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;

    for boundary in SENTENCE_BOUNDARY.find_iter(text) {
        // terminators are single-byte ASCII
        sentences.push(&text[start..boundary.start() + 1]);
        start = boundary.end();
    }
    sentences.push(&text[start..]);

    sentences
        .into_iter()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

fn char_len(sentence: &str) -> usize {
    sentence.chars().count()
}

/// Group sentences into contiguous, overlapping windows.
///
/// A window grows while its sentences fit in `max_length` characters. The
/// sentence that would overflow it closes the window and starts the next
/// one, seeded with the last `overlap` sentences of the closed window. A
/// seeded window may already exceed the budget; it is then closed by the
/// next sentence. A single sentence longer than the budget forms its own
/// window rather than being cut.
pub fn sentence_windows(sentences: &[&str], config: &ChunkConfig) -> Vec<Range<usize>> {
    let mut windows = Vec::new();
    // current window is start..end; end always equals the next sentence index
    let mut start = 0;
    let mut end = 0;
    let mut current_length = 0;

    for (i, sentence) in sentences.iter().enumerate() {
        let length = char_len(sentence);

        if current_length + length <= config.max_length {
            end = i + 1;
            current_length += length;
            continue;
        }

        if end > start {
            windows.push(start..end);
        }

        let seed = (end - start).min(config.overlap);
        start = end - seed;
        end = i + 1;
        current_length = sentences[start..end].iter().map(|s| char_len(s)).sum();
    }

    if end > start {
        windows.push(start..end);
    }

    windows
}

/// Chunk a text string
pub fn chunk_text(text: &str, config: &ChunkConfig) -> Vec<TextChunk> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    let sentences = split_sentences(text);

    sentence_windows(&sentences, config)
        .into_iter()
        .enumerate()
        .map(|(i, window)| TextChunk {
            content: format!("{}.", sentences[window.clone()].join(". ")),
            index: i as u32,
            sentences: window,
        })
        .collect()
}

/// Chunk contents only
pub fn split_into_chunks_with_overlap(text: &str, max_length: usize, overlap: usize) -> Vec<String> {
    chunk_text(text, &ChunkConfig::new(max_length, overlap))
        .into_iter()
        .map(|chunk| chunk.content)
        .collect()
}

// ============================================================================
// Tests
// ============================================================================

//! Line-based chunking with a token budget and whole-line overlap.

use serde::{Deserialize, Serialize};

/// One line-addressed slice of a source file.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub id: String,
    pub content: String,
    pub file_path: String,
    /// 1-based, inclusive.
    pub start_line: usize,
    /// 1-based, inclusive.
    pub end_line: usize,
    pub corpus_id: String,
    pub embedding: Option<Vec<f32>>,
}

impl Chunk {
    /// Canonical chunk identity: `{corpus_id}:{file_path}:{start_line}-{end_line}`.
    #[must_use]
    pub fn make_id(corpus_id: &str, file_path: &str, start_line: usize, end_line: usize) -> String {
        format!("{corpus_id}:{file_path}:{start_line}-{end_line}")
    }
}

/// Chunker configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkerConfig {
    /// Soft upper bound on estimated tokens per chunk (default: 800).
    pub max_tokens: usize,
    /// Estimated tokens carried over from the end of the previous chunk (default: 100).
    pub overlap_tokens: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            max_tokens: 800,
            overlap_tokens: 100,
        }
    }
}

/// Rough token estimate: one token per four characters, rounded up.
#[must_use]
pub fn estimate_tokens(text: &str) -> usize {
    chars_to_tokens(text.chars().count())
}

fn chars_to_tokens(chars: usize) -> usize {
    chars.div_ceil(4)
}

/// Split one file into overlapping chunks bounded by `config.max_tokens`.
///
/// Lines are never split, so a single line longer than the budget becomes a
/// chunk of its own. Blank chunks are dropped.
#[must_use]
pub fn chunk_file(
    file_path: &str,
    content: &str,
    corpus_id: &str,
    config: &ChunkerConfig,
) -> Vec<Chunk> {
    // (line text, char count including the newline)
    let lines: Vec<(&str, usize)> = content
        .lines()
        .map(|l| (l, l.chars().count() + 1))
        .collect();

    let mut chunks = Vec::new();
    let mut buffer: Vec<(&str, usize)> = Vec::new();
    let mut buffer_chars = 0usize;
    let mut start_line = 1usize;

    for (idx, &(line, line_chars)) in lines.iter().enumerate() {
        let line_no = idx + 1;

        if !buffer.is_empty() && chars_to_tokens(buffer_chars + line_chars) > config.max_tokens {
            push_chunk(&mut chunks, &buffer, file_path, corpus_id, start_line, line_no - 1);

            let mut overlap = take_overlap(&buffer, config.overlap_tokens);
            let mut overlap_chars: usize = overlap.iter().map(|(_, c)| c).sum();
            while !overlap.is_empty()
                && chars_to_tokens(overlap_chars + line_chars) > config.max_tokens
            {
                let (_, dropped) = overlap.remove(0);
                overlap_chars -= dropped;
            }

            start_line = line_no - overlap.len();
            buffer = overlap;
            buffer_chars = overlap_chars;
        }

        buffer.push((line, line_chars));
        buffer_chars += line_chars;
    }

    if !buffer.is_empty() {
        push_chunk(&mut chunks, &buffer, file_path, corpus_id, start_line, lines.len());
    }

    chunks
}

/// Trailing whole lines of `buffer` whose estimated size fits in `overlap_tokens`.
fn take_overlap<'a>(buffer: &[(&'a str, usize)], overlap_tokens: usize) -> Vec<(&'a str, usize)> {
    let mut acc = 0usize;
    let mut count = 0usize;
    for &(_, chars) in buffer.iter().rev() {
        if chars_to_tokens(acc + chars) > overlap_tokens {
            break;
        }
        acc += chars;
        count += 1;
    }
    buffer[buffer.len() - count..].to_vec()
}

fn push_chunk(
    chunks: &mut Vec<Chunk>,
    buffer: &[(&str, usize)],
    file_path: &str,
    corpus_id: &str,
    start_line: usize,
    end_line: usize,
) {
    let joined = buffer
        .iter()
        .map(|(l, _)| *l)
        .collect::<Vec<_>>()
        .join("\n");
    let content = joined.trim();
    if content.is_empty() {
        return;
    }
    chunks.push(Chunk {
        id: Chunk::make_id(corpus_id, file_path, start_line, end_line),
        content: content.to_owned(),
        file_path: file_path.to_owned(),
        start_line,
        end_line,
        corpus_id: corpus_id.to_owned(),
        embedding: None,
    });
}


use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::debug;

/// Separators tried in order; the empty separator splits between characters
const SEPARATORS: [&str; 5] = ["\n\n", "\n", ". ", " ", ""];

/// A raw input document, usually one `.txt` file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDocument {
    /// File name used for citations
    pub name: String,
    /// Full UTF-8 text of the file
    pub text: String,
}

impl SourceDocument {
    #[inline]
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
        }
    }
}

/// A bounded slice of document text together with where it came from
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentChunk {
    /// Trimmed, non-empty chunk text
    pub content: String,
    /// Name of the originating file
    pub source: String,
    /// 1-based line number in the originating file
    pub line_number: u32,
}

/// Configuration for content chunking
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum chunk length in characters
    pub chunk_size: usize,
    /// Characters shared between adjacent chunks of the same line
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: 400,
            chunk_overlap: 50,
        }
    }
}

/// Chunk every non-blank line of every document.
///
/// Each trimmed line becomes one candidate tagged with its file name and
/// 1-based line number; candidates longer than `chunk_size` are split
/// further by [`split_text`]. Output follows file order, then line order.
#[inline]
pub fn chunk_documents(
    documents: &[SourceDocument],
    config: &ChunkingConfig,
) -> Vec<DocumentChunk> {
    let mut chunks = Vec::new();

    for document in documents {
        let before = chunks.len();

        for (index, line) in text_lines(&document.text).enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let line_number = u32::try_from(index + 1).unwrap_or(u32::MAX);
            chunks.extend(
                split_text(line, config)
                    .into_iter()
                    .map(|content| DocumentChunk {
                        content,
                        source: document.name.clone(),
                        line_number,
                    }),
            );
        }

        debug!(
            "Chunked '{}' into {} chunks",
            document.name,
            chunks.len() - before
        );
    }

    chunks
}

/// Split text into pieces of at most `chunk_size` characters.
///
/// Paragraph breaks are preferred, then line breaks, then sentence ends,
/// then spaces, and finally raw character boundaries. Adjacent pieces
/// overlap by up to `chunk_overlap` characters.
#[inline]
pub fn split_text(text: &str, config: &ChunkingConfig) -> Vec<String> {
    let mut chunks = Vec::new();
    split_recursive(text, &SEPARATORS, config, &mut chunks);
    chunks
}

/// Lines of a file, ending at `\n`, `\r\n` or a lone `\r`
fn text_lines(text: &str) -> impl Iterator<Item = &str> {
    let mut rest = text;
    std::iter::from_fn(move || {
        if rest.is_empty() {
            return None;
        }
        let Some(end) = rest.find(['\r', '\n']) else {
            return Some(std::mem::take(&mut rest));
        };
        let (line, tail) = rest.split_at(end);
        rest = tail
            .strip_prefix("\r\n")
            .or_else(|| tail.get(1..))
            .unwrap_or_default();
        Some(line)
    })
}

fn split_recursive(
    text: &str,
    separators: &[&str],
    config: &ChunkingConfig,
    out: &mut Vec<String>,
) {
    let position = separators
        .iter()
        .position(|separator| separator.is_empty() || text.contains(separator))
        .unwrap_or(separators.len().saturating_sub(1));
    let separator = separators.get(position).copied().unwrap_or("");
    let remaining = separators.get(position + 1..).unwrap_or(&[]);

    let pieces: Vec<&str> = if separator.is_empty() {
        text.split_inclusive(|_: char| true).collect()
    } else {
        text.split_inclusive(separator).collect()
    };

    let mut pending = Vec::new();
    for piece in pieces {
        if char_len(piece) <= config.chunk_size {
            pending.push(piece);
            continue;
        }

        if !pending.is_empty() {
            merge_pieces(&pending, config, out);
            pending.clear();
        }

        if remaining.is_empty() {
            push_trimmed(out, piece);
        } else {
            split_recursive(piece, remaining, config, out);
        }
    }

    if !pending.is_empty() {
        merge_pieces(&pending, config, out);
    }
}

/// Greedily pack small pieces into chunks, carrying an overlapping tail
fn merge_pieces(pieces: &[&str], config: &ChunkingConfig, out: &mut Vec<String>) {
    let mut window: VecDeque<&str> = VecDeque::new();
    let mut total = 0;

    for &piece in pieces {
        let len = char_len(piece);

        if total + len > config.chunk_size && !window.is_empty() {
            push_trimmed(out, &window.iter().copied().collect::<String>());

            while total > config.chunk_overlap || (total > 0 && total + len > config.chunk_size) {
                match window.pop_front() {
                    Some(front) => total -= char_len(front),
                    None => break,
                }
            }
        }

        window.push_back(piece);
        total += len;
    }

    if !window.is_empty() {
        push_trimmed(out, &window.iter().copied().collect::<String>());
    }
}

fn push_trimmed(out: &mut Vec<String>, text: &str) {
    let trimmed = text.trim();
    if !trimmed.is_empty() {
        out.push(trimmed.to_string());
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

use serde::Serialize;
use tracing::debug;

/// Default maximum chunk length in characters
pub const DEFAULT_MAX_CHUNK_LEN: usize = 160;

/// Extra characters searched past the limit when looking for a sentence break
const SENTENCE_LOOKAHEAD: usize = 30;

/// Chunk configuration
#[derive(Debug, Clone)]
pub struct ChunkConfig {
    /// Maximum chunk length in characters (default: 160)
    pub max_len: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            max_len: DEFAULT_MAX_CHUNK_LEN,
        }
    }
}

/// A single segment of an utterance
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chunk {
    /// Chunk number (0-indexed)
    pub index: usize,
    /// Trimmed chunk text
    pub content: String,
    /// Start offset in the source text (characters)
    pub start: usize,
    /// End offset in the source text (characters, exclusive)
    pub end: usize,
}

/// Where a chunk window was closed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Boundary {
    Sentence,
    Comma,
    Whitespace,
    HardCut,
}

/// Splits normalized text into speakable chunks
#[derive(Debug, Clone, Default)]
pub struct TextChunker {
    config: ChunkConfig,
}

impl TextChunker {
    pub fn new(config: ChunkConfig) -> Self {
        Self { config }
    }

    pub fn with_max_len(max_len: usize) -> Self {
        Self::new(ChunkConfig { max_len })
    }

    pub fn max_len(&self) -> usize {
        self.config.max_len
    }

    /// Split `text` into ordered chunks
    ///
    /// Empty or whitespace-only input produces no chunks. Every chunk is at
    /// most `max_len` characters long.
    pub fn chunk(&self, text: &str) -> Vec<Chunk> {
        let chars: Vec<char> = text.chars().collect();
        let max_len = self.config.max_len.max(1);
        let mut chunks = Vec::new();
        let mut start = 0;

        while start < chars.len() {
            // Skip whitespace consumed at the previous boundary
            while start < chars.len() && chars[start].is_whitespace() {
                start += 1;
            }
            if start >= chars.len() {
                break;
            }

            let (end, boundary) = if chars.len() - start <= max_len {
                (chars.len(), Boundary::HardCut)
            } else {
                find_window_end(&chars, start, max_len)
            };

            let content: String = chars[start..end].iter().collect::<String>().trim().to_string();
            if !content.is_empty() {
                debug!(
                    "Chunk {} closed at {:?} ({}..{}, {} chars)",
                    chunks.len(),
                    boundary,
                    start,
                    end,
                    end - start
                );
                chunks.push(Chunk {
                    index: chunks.len(),
                    content,
                    start,
                    end,
                });
            }

            start = end;
        }

        chunks
    }
}

/// Find the end of the window that starts at `start`
///
/// Priority: first sentence terminator followed by whitespace, first comma
/// followed by a space, last whitespace within the limit, hard cut.
fn find_window_end(chars: &[char], start: usize, max_len: usize) -> (usize, Boundary) {
    let limit = (start + max_len).min(chars.len());
    let lookahead = (limit + SENTENCE_LOOKAHEAD).min(chars.len());

    let sentence_break = (start..lookahead.saturating_sub(1))
        .find(|&i| matches!(chars[i], '.' | '!' | '?') && chars[i + 1].is_whitespace());
    if let Some(i) = sentence_break {
        if i - start < max_len {
            return (i + 1, Boundary::Sentence);
        }
    }

    let comma_break = (start + 1..lookahead.saturating_sub(1))
        .find(|&i| chars[i] == ',' && chars[i + 1] == ' ');
    if let Some(i) = comma_break {
        if i - start < max_len {
            return (i + 1, Boundary::Comma);
        }
    }

    let last_space = (start + 1..=limit.min(chars.len() - 1))
        .rev()
        .find(|&i| chars[i].is_whitespace());
    if let Some(i) = last_space {
        return (i, Boundary::Whitespace);
    }

    (limit, Boundary::HardCut)
}

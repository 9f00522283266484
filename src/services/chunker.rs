//! Text chunking with sentence-aware cuts and overlap.

use crate::error::ConfigError;
use crate::models::IndexingConfig;
use crate::utils::has_meaningful_content;

/// Splits page text into overlapping fragments.
///
/// Chunking is fully deterministic: identical input always yields identical
/// chunk boundaries, which keeps chunk ids stable across reprocessing.
#[derive(Debug, Clone)]
pub struct TextChunker {
    /// Window size in characters.
    max_size: usize,
    /// Shared context between adjacent chunks, in characters.
    overlap: usize,
}

impl TextChunker {
    /// Create a chunker from the indexing configuration.
    pub fn new(config: &IndexingConfig) -> Result<Self, ConfigError> {
        Self::with_limits(config.chunk_size as usize, config.chunk_overlap as usize)
    }

    /// Create a chunker with explicit window and overlap sizes.
    pub fn with_limits(max_size: usize, overlap: usize) -> Result<Self, ConfigError> {
        if max_size == 0 {
            return Err(ConfigError::ValidationError(
                "chunk size must be greater than zero".to_string(),
            ));
        }
        if overlap >= max_size {
            return Err(ConfigError::ValidationError(format!(
                "chunk overlap ({}) must be smaller than chunk size ({})",
                overlap, max_size
            )));
        }
        Ok(Self { max_size, overlap })
    }

    /// Split one page of text into ordered chunk texts.
    ///
    /// Scans the text in windows of `max_size` characters. Before
    /// hard-cutting, the last `overlap` characters of the window are searched
    /// backward for a sentence boundary (terminal punctuation followed by
    /// whitespace); if one is found, the cut lands there. The next window
    /// starts `overlap` characters before the previous cut, so adjacent
    /// chunks share context. Whitespace-only pages produce zero chunks.
    pub fn chunk(&self, text: &str) -> Vec<String> {
        if !has_meaningful_content(text) {
            return Vec::new();
        }

        let chars: Vec<char> = text.chars().collect();
        let total = chars.len();

        if total <= self.max_size {
            return vec![text.to_string()];
        }

        let mut chunks = Vec::new();
        let mut start = 0;

        while start < total {
            let window_end = (start + self.max_size).min(total);
            let cut = if window_end == total {
                total
            } else {
                self.find_cut(&chars, start, window_end)
            };

            let chunk: String = chars[start..cut].iter().collect();
            if has_meaningful_content(&chunk) {
                chunks.push(chunk);
            }

            if cut >= total {
                break;
            }

            // Step back by the overlap, always making forward progress.
            start = cut.saturating_sub(self.overlap).max(start + 1);
        }

        chunks
    }

    /// Find the cut position for a window ending at `window_end`.
    ///
    /// Searches backward within the last `overlap` characters for terminal
    /// punctuation followed by whitespace; falls back to the hard window end.
    fn find_cut(&self, chars: &[char], start: usize, window_end: usize) -> usize {
        let lower = window_end.saturating_sub(self.overlap).max(start + 1);

        for i in (lower..window_end.saturating_sub(1)).rev() {
            if matches!(chars[i], '.' | '!' | '?') && chars[i + 1].is_whitespace() {
                return i + 1;
            }
        }

        window_end
    }
}

//! Text chunking
//!
//! Page text is split into overlapping passages small enough to embed,
//! each carrying a content hash.

mod splitter;

pub use splitter::*;

use crate::config::ChunkConfig;
use blake3::Hasher;

/// A text chunk with metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    /// The chunk text, including any overlap prefix
    pub text: String,

    /// Chunk index within its page (0-based)
    pub index: usize,

    /// Blake3 hash of the text
    pub hash: String,
}

/// Compute a content hash for text
pub fn compute_text_hash(text: &str) -> String {
    let mut hasher = Hasher::new();
    hasher.update(text.as_bytes());
    hasher.finalize().to_hex().to_string()
}

/// Chunk the extracted text of one page
pub fn chunk_page(text: &str, config: &ChunkConfig) -> Vec<TextChunk> {
    split_text(text, config.size, config.overlap)
        .into_iter()
        .enumerate()
        .map(|(index, text)| {
            let hash = compute_text_hash(&text);
            TextChunk { text, index, hash }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_page_indexes_and_hashes() {
        let config = ChunkConfig {
            size: 30,
            overlap: 5,
        };
        let text = "First paragraph here.\n\nSecond paragraph here.\n\nThird one.";
        let chunks = chunk_page(text, &config);

        assert_eq!(chunks.len(), 3);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.index, i);
            assert_eq!(chunk.hash, compute_text_hash(&chunk.text));
        }
        assert!(chunks[1].text.starts_with("here."));
    }

    #[test]
    fn test_hash_is_stable() {
        assert_eq!(compute_text_hash("hello"), compute_text_hash("hello"));
        assert_ne!(compute_text_hash("hello"), compute_text_hash("hello!"));
        assert_eq!(compute_text_hash("hello").len(), 64);
    }

    #[test]
    fn test_empty_page_has_no_chunks() {
        assert!(chunk_page("", &ChunkConfig::default()).is_empty());
    }
}

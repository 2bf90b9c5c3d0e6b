//! Text preparation for speech synthesis
//!
//! Assistant replies go through the normalizer (markup removal) and then the
//! chunker (bounded, boundary-respecting segments) before they are spoken.

pub mod chunk;
pub mod normalize;

pub use chunk::{Chunk, ChunkConfig, TextChunker, DEFAULT_MAX_CHUNK_LEN};
pub use normalize::{TextNormalizer, DEFAULT_CODE_PLACEHOLDER};


use serde::{Deserialize, Serialize};
use tracing::debug;

/// A slice of document text ready for embedding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// The chunk text
    pub text: String,
    /// Position of this chunk within the document
    pub sequence_index: usize,
}

/// Configuration for word-based chunking
///
/// The defaults produce very short chunks with heavy overlap: every word ends up
/// in many neighbouring chunks, so a fact split across a boundary is still
/// retrievable as a whole.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum chunk length in characters before a split is forced
    pub max_length: usize,
    /// Overlap budget in words; a third of it is carried into the next chunk
    pub overlap_words: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            max_length: 100,
            overlap_words: 90,
        }
    }
}

impl ChunkingConfig {
    /// Number of words stepped back from the split point when seeding the next chunk
    #[inline]
    pub fn step_back_words(&self) -> usize {
        self.overlap_words.div_ceil(3)
    }
}

/// Split text into overlapping chunks on whitespace-delimited words
///
/// Words accumulate into a buffer until appending the next one would exceed
/// `max_length` characters. The buffer is then emitted and the next one is
/// seeded with the preceding `step_back_words()` words plus the word that
/// triggered the split. The final buffer is always emitted.
#[inline]
pub fn chunk_text(text: &str, config: &ChunkingConfig) -> Vec<Chunk> {
    let words: Vec<&str> = text.split_whitespace().collect();
    let step_back = config.step_back_words();

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for (i, word) in words.iter().enumerate() {
        let word_len = word.chars().count();

        if current_len + 1 + word_len <= config.max_length {
            if !current.is_empty() {
                current.push(' ');
                current_len += 1;
            }
            current.push_str(word);
            current_len += word_len;
            continue;
        }

        if !current.is_empty() {
            push_chunk(&mut chunks, std::mem::take(&mut current));
        }

        let overlap_start = i.saturating_sub(step_back);
        current = words[overlap_start..=i].join(" ");
        current_len = current.chars().count();
    }

    if !current.is_empty() {
        push_chunk(&mut chunks, current);
    }

    debug!(
        "Chunked {} words into {} chunks (max {} chars, step back {} words)",
        words.len(),
        chunks.len(),
        config.max_length,
        step_back
    );

    chunks
}

fn push_chunk(chunks: &mut Vec<Chunk>, text: String) {
    let sequence_index = chunks.len();
    chunks.push(Chunk {
        text,
        sequence_index,
    });
}

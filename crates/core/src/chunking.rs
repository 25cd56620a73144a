use crate::error::ValidationError;
use crate::models::DocumentChunk;
use std::sync::atomic::{AtomicU64, Ordering};

/// Fixed-width character splitter. Chunk ids are drawn from a sequence owned
/// by the chunker, so one instance never hands out the same id twice.
#[derive(Debug)]
pub struct Chunker {
    max_chunk_chars: usize,
    next_id: AtomicU64,
}

impl Chunker {
    pub fn new(max_chunk_chars: usize) -> Result<Self, ValidationError> {
        if max_chunk_chars == 0 {
            return Err(ValidationError::ChunkSize(max_chunk_chars));
        }

        Ok(Self {
            max_chunk_chars,
            next_id: AtomicU64::new(0),
        })
    }

    pub fn max_chunk_chars(&self) -> usize {
        self.max_chunk_chars
    }

    pub fn chunk(&self, text: &str, source_name: &str) -> Vec<DocumentChunk> {
        let segments = split_by_chars(text, self.max_chunk_chars);
        if segments.is_empty() {
            return Vec::new();
        }

        let first_id = self
            .next_id
            .fetch_add(segments.len() as u64, Ordering::Relaxed);

        segments
            .into_iter()
            .enumerate()
            .map(|(index, (start_offset, piece))| DocumentChunk {
                id: first_id + index as u64,
                text: piece,
                source_name: source_name.to_string(),
                chunk_index: index as u64,
                start_offset: start_offset as u64,
            })
            .collect()
    }
}

/// Splits `text` into `(char_offset, segment)` pairs of at most `max_chars`
/// characters each. Concatenating the segments yields `text` again.
pub fn split_by_chars(text: &str, max_chars: usize) -> Vec<(usize, String)> {
    if text.is_empty() || max_chars == 0 {
        return Vec::new();
    }

    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(max_chars)
        .enumerate()
        .map(|(index, window)| (index * max_chars, window.iter().collect::<String>()))
        .collect()
}

pub fn normalize_whitespace(text: &str) -> String {
    text.replace('\u{a0}', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_yields_no_chunks() {
        let chunker = Chunker::new(10).unwrap();
        assert!(chunker.chunk("", "s").is_empty());
    }

    #[test]
    fn zero_chunk_size_is_rejected() {
        assert_eq!(Chunker::new(0).unwrap_err(), ValidationError::ChunkSize(0));
    }

    #[test]
    fn chunks_respect_limit_and_reconstruct_text() {
        let text = "The quick brown fox jumps over the lazy dog. Ünïcödé text spans bytes.";
        let chunker = Chunker::new(7).unwrap();
        let chunks = chunker.chunk(text, "s");

        assert!(chunks.iter().all(|chunk| chunk.text.chars().count() <= 7));
        let rebuilt: String = chunks.iter().map(|chunk| chunk.text.as_str()).collect();
        assert_eq!(rebuilt, text);
    }

    #[test]
    fn offsets_and_indexes_are_positional() {
        let chunker = Chunker::new(4).unwrap();
        let chunks = chunker.chunk("abcdefghij", "doc");

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2].text, "ij");
        for (position, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.chunk_index, position as u64);
            assert_eq!(chunk.start_offset, (position * 4) as u64);
            assert_eq!(chunk.source_name, "doc");
        }
    }

    #[test]
    fn chunking_is_deterministic() {
        let text = "Hydraulic pressure and flow are measured in bar.";
        let first = Chunker::new(9).unwrap().chunk(text, "a");
        let second = Chunker::new(9).unwrap().chunk(text, "a");
        assert_eq!(first, second);
    }

    #[test]
    fn ids_stay_unique_across_sources() {
        let chunker = Chunker::new(3).unwrap();
        let first = chunker.chunk("abcdef", "a");
        let second = chunker.chunk("ghi", "b");

        let ids: Vec<u64> = first.iter().chain(second.iter()).map(|chunk| chunk.id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
    }

    #[test]
    fn whitespace_is_normalized() {
        let input = "A  \t  lot\nof\u{a0}  spacing";
        assert_eq!(normalize_whitespace(input), "A lot of spacing");
    }
}

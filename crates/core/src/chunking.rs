use crate::error::IngestError;
use crate::models::{Chunk, Document, IngestionOptions};

/// Window size and overlap, in characters. Construction guarantees that
/// successive windows advance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    max_chars: usize,
    overlap_chars: usize,
}

impl ChunkingConfig {
    pub fn new(max_chars: usize, overlap_chars: usize) -> Result<Self, IngestError> {
        if max_chars <= overlap_chars {
            return Err(IngestError::InvalidChunkConfig(format!(
                "window size {max_chars} must exceed overlap {overlap_chars}"
            )));
        }

        Ok(Self {
            max_chars,
            overlap_chars,
        })
    }

    pub fn max_chars(&self) -> usize {
        self.max_chars
    }

    pub fn overlap_chars(&self) -> usize {
        self.overlap_chars
    }

    pub fn stride(&self) -> usize {
        self.max_chars - self.overlap_chars
    }
}

impl TryFrom<&IngestionOptions> for ChunkingConfig {
    type Error = IngestError;

    fn try_from(value: &IngestionOptions) -> Result<Self, Self::Error> {
        Self::new(value.chunk_max_chars, value.chunk_overlap_chars)
    }
}

pub fn chunk_id(doc_id: u64, offset: usize) -> String {
    format!("{doc_id}_{offset}")
}

/// Start offsets of every window over `len` characters. Iteration ends with the
/// first window that reaches the end of the content, so content no longer than
/// one window yields a single offset.
pub fn window_offsets(len: usize, config: ChunkingConfig) -> impl Iterator<Item = usize> {
    let stride = config.stride();
    let max_chars = config.max_chars;
    (0..len)
        .step_by(stride)
        .take_while(move |&offset| offset == 0 || offset - stride + max_chars < len)
}

pub fn chunk_document(document: &Document, config: ChunkingConfig) -> Vec<Chunk> {
    let content = document.content.as_str();
    let boundaries = content
        .char_indices()
        .map(|(index, _)| index)
        .collect::<Vec<_>>();
    let char_count = boundaries.len();
    let byte_at = |char_index: usize| {
        boundaries
            .get(char_index)
            .copied()
            .unwrap_or(content.len())
    };

    window_offsets(char_count, config)
        .map(|offset| {
            let end = (offset + config.max_chars).min(char_count);
            Chunk {
                id: chunk_id(document.id, offset),
                doc_id: document.id,
                doc_name: document.name.clone(),
                offset,
                text: content[byte_at(offset)..byte_at(end)].to_string(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::HashSet;

    fn document(id: u64, content: &str) -> Document {
        Document {
            id,
            name: "doc.txt".to_string(),
            content: content.to_string(),
            checksum: "checksum".to_string(),
            ingested_at: Utc::now(),
        }
    }

    fn default_config() -> ChunkingConfig {
        ChunkingConfig::new(1_200, 200).expect("valid config")
    }

    #[test]
    fn overlap_not_smaller_than_window_is_rejected() {
        assert!(matches!(
            ChunkingConfig::new(200, 200),
            Err(IngestError::InvalidChunkConfig(_))
        ));
        assert!(ChunkingConfig::new(100, 300).is_err());
        assert!(ChunkingConfig::new(0, 0).is_err());
        assert!(ChunkingConfig::new(1, 0).is_ok());
    }

    #[test]
    fn short_content_yields_single_chunk() {
        let chunks = chunk_document(&document(1, "Apples are red."), default_config());

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].id, "1_0");
        assert_eq!(chunks[0].text, "Apples are red.");
    }

    #[test]
    fn content_of_exactly_window_size_yields_single_chunk() {
        let content = "x".repeat(1_200);
        let chunks = chunk_document(&document(1, &content), default_config());
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text.len(), 1_200);
    }

    #[test]
    fn content_within_one_window_is_not_split() {
        for len in [1, 1_001, 1_199, 1_200] {
            let content = "y".repeat(len);
            let chunks = chunk_document(&document(4, &content), default_config());
            assert_eq!(chunks.len(), 1, "len={len}");
            assert_eq!(chunks[0].id, "4_0");
            assert_eq!(chunks[0].text, content);
        }

        let offsets = window_offsets(1_201, default_config()).collect::<Vec<_>>();
        assert_eq!(offsets, vec![0, 1_000]);
    }

    #[test]
    fn last_window_ends_at_content_end() {
        let config = ChunkingConfig::new(5, 2).expect("valid config");
        assert_eq!(window_offsets(11, config).collect::<Vec<_>>(), vec![0, 3, 6]);
        assert_eq!(window_offsets(12, config).collect::<Vec<_>>(), vec![0, 3, 6, 9]);
    }

    #[test]
    fn empty_content_yields_no_chunks() {
        assert!(chunk_document(&document(1, ""), default_config()).is_empty());
    }

    #[test]
    fn long_content_uses_overlapping_windows() {
        let content = (0..3_000)
            .map(|index| char::from(b'a' + (index % 26) as u8))
            .collect::<String>();
        let chunks = chunk_document(&document(7, &content), default_config());

        let offsets = chunks.iter().map(|chunk| chunk.offset).collect::<Vec<_>>();
        assert_eq!(offsets, vec![0, 1_000, 2_000]);
        assert_eq!(chunks[0].text, content[..1_200]);
        assert_eq!(chunks[1].text, content[1_000..2_200]);
        assert_eq!(chunks[2].text, content[2_000..]);
        assert_eq!(chunks[2].id, "7_2000");
    }

    #[test]
    fn windows_cover_content_with_fixed_stride() {
        for (max, overlap) in [(5, 2), (7, 0), (10, 9), (3, 1)] {
            let config = ChunkingConfig::new(max, overlap).expect("valid config");
            for len in 0..40 {
                let offsets = window_offsets(len, config).collect::<Vec<_>>();
                let mut covered = vec![false; len];
                for offset in &offsets {
                    for slot in covered.iter_mut().skip(*offset).take(max) {
                        *slot = true;
                    }
                }
                assert!(covered.iter().all(|slot| *slot), "gap for len={len} max={max} overlap={overlap}");
                for pair in offsets.windows(2) {
                    assert_eq!(pair[1] - pair[0], max - overlap);
                }
            }
        }
    }

    #[test]
    fn multibyte_content_is_split_on_character_boundaries() {
        let content = "é".repeat(10);
        let config = ChunkingConfig::new(4, 1).expect("valid config");
        let chunks = chunk_document(&document(2, &content), config);

        let offsets = chunks.iter().map(|chunk| chunk.offset).collect::<Vec<_>>();
        assert_eq!(offsets, vec![0, 3, 6]);
        assert_eq!(chunks[0].text, "éééé");
        assert_eq!(chunks[2].text, "éééé");
    }

    #[test]
    fn chunk_ids_are_stable_and_unique() {
        let content = "word ".repeat(1_000);
        let first = chunk_document(&document(3, &content), default_config());
        let second = chunk_document(&document(3, &content), default_config());

        assert_eq!(first, second);
        let ids = first.iter().map(|chunk| chunk.id.as_str()).collect::<HashSet<_>>();
        assert_eq!(ids.len(), first.len());
        assert_eq!(chunk_id(3, 1_000), "3_1000");
    }
}

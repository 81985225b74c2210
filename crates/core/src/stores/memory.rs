use crate::embeddings::similarity;
use crate::models::{Chunk, Fingerprint, ScoredChunk};
use crate::traits::VectorIndex;
use std::cmp::Ordering;

#[derive(Debug, Clone)]
struct IndexEntry {
    chunk: Chunk,
    fingerprint: Fingerprint,
}

/// Brute-force cosine ranking over every stored fingerprint.
#[derive(Debug, Clone, Default)]
pub struct InMemoryIndex {
    entries: Vec<IndexEntry>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fingerprint(&self, chunk_id: &str) -> Option<&Fingerprint> {
        self.entries
            .iter()
            .find(|entry| entry.chunk.id == chunk_id)
            .map(|entry| &entry.fingerprint)
    }
}

impl VectorIndex for InMemoryIndex {
    fn insert(&mut self, chunk: Chunk, fingerprint: Fingerprint) {
        self.entries.push(IndexEntry { chunk, fingerprint });
    }

    fn top_k(&self, query: &[f32], k: usize) -> Vec<ScoredChunk> {
        let mut scored = self
            .entries
            .iter()
            .map(|entry| (similarity(query, &entry.fingerprint), entry))
            .collect::<Vec<_>>();

        // stable: ties stay in insertion order
        scored.sort_by(|left, right| right.0.partial_cmp(&left.0).unwrap_or(Ordering::Equal));

        scored
            .into_iter()
            .take(k)
            .map(|(score, entry)| ScoredChunk {
                chunk: entry.chunk.clone(),
                score,
            })
            .collect()
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::{Embedder, HashingEmbedder};

    fn chunk(id: &str, text: &str) -> Chunk {
        Chunk {
            id: id.to_string(),
            doc_id: 1,
            doc_name: "doc.txt".to_string(),
            offset: 0,
            text: text.to_string(),
        }
    }

    fn index_of(texts: &[(&str, &str)]) -> InMemoryIndex {
        let embedder = HashingEmbedder::default();
        let mut index = InMemoryIndex::new();
        for (id, text) in texts {
            index.insert(chunk(id, text), embedder.embed(text));
        }
        index
    }

    #[test]
    fn empty_index_returns_nothing() {
        let index = InMemoryIndex::new();
        assert!(index.is_empty());
        assert!(index.top_k(&HashingEmbedder::default().embed("anything"), 5).is_empty());
    }

    #[test]
    fn best_match_ranks_first() {
        let index = index_of(&[
            ("1_0", "pumps move hydraulic fluid"),
            ("1_1", "bananas are yellow"),
            ("1_2", "valves regulate flow"),
        ]);
        let query = HashingEmbedder::default().embed("yellow bananas");

        let hits = index.top_k(&query, 2);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].chunk.id, "1_1");
        assert!(hits[0].score >= hits[1].score);
    }

    #[test]
    fn k_larger_than_index_returns_everything() {
        let index = index_of(&[("1_0", "one"), ("1_1", "two")]);
        let hits = index.top_k(&HashingEmbedder::default().embed("one"), 10);
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn ties_keep_insertion_order() {
        let index = index_of(&[
            ("1_0", "same words here"),
            ("1_1", "unrelated"),
            ("2_0", "same words here"),
            ("3_0", "here words same"),
        ]);
        let query = HashingEmbedder::default().embed("same words here");

        let hits = index.top_k(&query, 3);
        let ids = hits.iter().map(|hit| hit.chunk.id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["1_0", "2_0", "3_0"]);
    }

    #[test]
    fn repeated_queries_are_identical() {
        let index = index_of(&[
            ("1_0", "alpha beta"),
            ("1_1", "beta gamma"),
            ("1_2", "gamma delta"),
            ("1_3", "delta alpha"),
        ]);
        let query = HashingEmbedder::default().embed("alpha gamma");

        let first = index.top_k(&query, 3);
        let second = index.top_k(&query, 3);
        let ids = |hits: &[ScoredChunk]| hits.iter().map(|hit| hit.chunk.id.clone()).collect::<Vec<_>>();
        assert_eq!(ids(&first), ids(&second));
    }

    #[test]
    fn zero_query_scores_everything_equally() {
        let index = index_of(&[("1_0", "first"), ("1_1", "second")]);
        let hits = index.top_k(&HashingEmbedder::default().embed(""), 2);
        assert_eq!(hits[0].chunk.id, "1_0");
        assert_eq!(hits[0].score, 0.0);
    }

    #[test]
    fn fingerprint_lookup_by_chunk_id() {
        let index = index_of(&[("1_0", "first")]);
        assert_eq!(
            index.fingerprint("1_0"),
            Some(&HashingEmbedder::default().embed("first"))
        );
        assert!(index.fingerprint("9_0").is_none());
    }
}

use crate::models::{Chunk, Fingerprint, ScoredChunk};

/// Append-only similarity index over chunk fingerprints.
pub trait VectorIndex {
    fn insert(&mut self, chunk: Chunk, fingerprint: Fingerprint);

    /// Up to `k` chunks by descending similarity; equal scores keep insertion order.
    fn top_k(&self, query: &[f32], k: usize) -> Vec<ScoredChunk>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Outbound text-generation collaborator. Implementations never fail: transport
/// or protocol errors are reported inside the returned text.
pub trait AnswerGenerator {
    fn generate_answer(&self, prompt: &str) -> String;
}

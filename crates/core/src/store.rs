use crate::models::{Chunk, Document, Fingerprint, ScoredChunk};
use crate::stores::InMemoryIndex;
use crate::traits::VectorIndex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug)]
struct CorpusState<I> {
    documents: Vec<Document>,
    index: I,
}

/// Process-lifetime document corpus. Writers commit a whole document under one
/// write guard, so readers never see a document without all of its chunks.
#[derive(Debug)]
pub struct CorpusStore<I = InMemoryIndex> {
    next_document_id: AtomicU64,
    state: RwLock<CorpusState<I>>,
}

impl Default for CorpusStore<InMemoryIndex> {
    fn default() -> Self {
        Self::with_index(InMemoryIndex::new())
    }
}

impl CorpusStore<InMemoryIndex> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<I: VectorIndex> CorpusStore<I> {
    pub fn with_index(index: I) -> Self {
        Self {
            next_document_id: AtomicU64::new(1),
            state: RwLock::new(CorpusState {
                documents: Vec::new(),
                index,
            }),
        }
    }

    /// Hands out document ids 1, 2, 3, … across all callers.
    pub fn reserve_document_id(&self) -> u64 {
        self.next_document_id.fetch_add(1, Ordering::SeqCst)
    }

    pub fn commit(&self, document: Document, entries: Vec<(Chunk, Fingerprint)>) {
        let mut state = self.write();
        state.documents.push(document);
        for (chunk, fingerprint) in entries {
            state.index.insert(chunk, fingerprint);
        }
    }

    pub fn top_k(&self, query: &[f32], k: usize) -> Vec<ScoredChunk> {
        self.read().index.top_k(query, k)
    }

    pub fn chunk_count(&self) -> usize {
        self.read().index.len()
    }

    pub fn document_count(&self) -> usize {
        self.read().documents.len()
    }

    pub fn documents(&self) -> Vec<Document> {
        self.read().documents.clone()
    }

    pub fn document(&self, id: u64) -> Option<Document> {
        self.read()
            .documents
            .iter()
            .find(|document| document.id == id)
            .cloned()
    }

    // Commits never leave partial state behind, so a poisoned lock is still usable.
    fn read(&self) -> RwLockReadGuard<'_, CorpusState<I>> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, CorpusState<I>> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

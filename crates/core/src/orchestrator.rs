use crate::answer::build_prompt;
use crate::embeddings::{Embedder, HashingEmbedder};
use crate::error::{IngestError, QueryError};
use crate::extractor::{LopdfExtractor, PdfExtractor};
use crate::ingest::{FolderIngestionReport, IngestionPipeline};
use crate::models::{
    Answer, Document, DocumentSource, IngestReport, IngestionOptions, RetrievedContext,
};
use crate::store::CorpusStore;
use crate::traits::{AnswerGenerator, VectorIndex};
use std::path::Path;
use tracing::debug;

/// Separator between retrieved chunk texts in the assembled context.
const CONTEXT_SEPARATOR: &str = "\n\n";

pub struct QueryPipeline<E = HashingEmbedder> {
    embedder: E,
}

impl<E: Embedder> QueryPipeline<E> {
    pub fn new(embedder: E) -> Self {
        Self { embedder }
    }

    pub fn retrieve<I: VectorIndex>(
        &self,
        store: &CorpusStore<I>,
        query: &str,
        top_k: usize,
    ) -> Result<RetrievedContext, QueryError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(QueryError::EmptyQuery);
        }
        if store.chunk_count() == 0 {
            return Err(QueryError::EmptyCorpus);
        }

        let fingerprint = self.embedder.embed(query);
        let hits = store.top_k(&fingerprint, top_k);
        debug!(query, hits = hits.len(), "retrieved chunks");

        let context = hits
            .iter()
            .map(|hit| hit.chunk.text.as_str())
            .collect::<Vec<_>>()
            .join(CONTEXT_SEPARATOR);
        let source_names = hits
            .iter()
            .map(|hit| hit.chunk.doc_name.clone())
            .collect();

        Ok(RetrievedContext {
            context,
            source_names,
            hits,
        })
    }
}

/// Owns the corpus and wires ingestion, retrieval and answer generation together.
pub struct DocumentQa<X = LopdfExtractor, G = crate::answer::StaticAnswer> {
    store: CorpusStore,
    ingestion: IngestionPipeline<X>,
    query: QueryPipeline,
    generator: G,
}

impl<G: AnswerGenerator> DocumentQa<LopdfExtractor, G> {
    pub fn with_options(options: IngestionOptions, generator: G) -> Result<Self, IngestError> {
        Ok(Self::new(IngestionPipeline::from_options(options)?, generator))
    }
}

impl<X: PdfExtractor, G: AnswerGenerator> DocumentQa<X, G> {
    pub fn new(ingestion: IngestionPipeline<X>, generator: G) -> Self {
        let query = QueryPipeline::new(ingestion.embedder());
        Self {
            store: CorpusStore::new(),
            ingestion,
            query,
            generator,
        }
    }

    pub fn ingest(&self, name: &str, source: DocumentSource) -> Result<IngestReport, IngestError> {
        self.ingestion.ingest(&self.store, name, source)
    }

    pub fn ingest_text(
        &self,
        name: &str,
        content: impl Into<String>,
    ) -> Result<IngestReport, IngestError> {
        self.ingest(name, DocumentSource::Content(content.into()))
    }

    pub fn ingest_upload(&self, name: &str, bytes: Vec<u8>) -> Result<IngestReport, IngestError> {
        self.ingest(name, DocumentSource::Upload(bytes))
    }

    pub fn ingest_folder(&self, folder: &Path) -> Result<FolderIngestionReport, IngestError> {
        self.ingestion.ingest_folder_best_effort(&self.store, folder)
    }

    pub fn extract_upload(&self, name: &str, bytes: &[u8]) -> Result<String, IngestError> {
        self.ingestion.extract_upload(name, bytes)
    }

    pub fn query(&self, text: &str, top_k: usize) -> Result<RetrievedContext, QueryError> {
        self.query.retrieve(&self.store, text, top_k)
    }

    /// Retrieves context and asks the generator. Generator failures come back
    /// as answer text, never as an error.
    pub fn ask(&self, text: &str, top_k: usize) -> Result<Answer, QueryError> {
        let retrieved = self.query(text, top_k)?;
        Ok(self.answer(text, &retrieved))
    }

    /// Asks the generator about context that was already retrieved.
    pub fn answer(&self, question: &str, retrieved: &RetrievedContext) -> Answer {
        let prompt = build_prompt(question.trim(), &retrieved.context);

        Answer {
            answer: self.generator.generate_answer(&prompt),
            sources: retrieved.source_names.clone(),
        }
    }

    pub fn documents(&self) -> Vec<Document> {
        self.store.documents()
    }

    pub fn chunk_count(&self) -> usize {
        self.store.chunk_count()
    }

    pub fn store(&self) -> &CorpusStore {
        &self.store
    }
}

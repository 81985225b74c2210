pub mod answer;
pub mod chunking;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod ingest;
pub mod models;
pub mod normalizer;
pub mod orchestrator;
pub mod store;
pub mod stores;
pub mod traits;

pub use answer::{build_prompt, GeminiClient, GeminiConfig, StaticAnswer};
pub use chunking::{chunk_document, chunk_id, ChunkingConfig};
pub use embeddings::{similarity, Embedder, HashingEmbedder, DEFAULT_EMBEDDING_DIMENSIONS};
pub use error::{AnswerError, IngestError, QueryError};
pub use extractor::{LopdfExtractor, PageText, PdfExtractor};
pub use ingest::{discover_documents, FolderIngestionReport, IngestionPipeline, SkippedDocument};
pub use models::{
    Answer, Chunk, Document, DocumentFormat, DocumentSource, ExtractionOptions, Fingerprint,
    IngestReport, IngestionOptions, RetrievedContext, ScoredChunk, DEFAULT_TOP_K,
};
pub use normalizer::{normalize_whitespace, TextNormalizer};
pub use orchestrator::{DocumentQa, QueryPipeline};
pub use store::CorpusStore;
pub use stores::InMemoryIndex;
pub use traits::{AnswerGenerator, VectorIndex};

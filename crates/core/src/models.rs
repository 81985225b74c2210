use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;

pub const DEFAULT_TOP_K: usize = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: u64,
    pub name: String,
    pub content: String,
    pub checksum: String,
    pub ingested_at: DateTime<Utc>,
}

/// A window of a document's content. `offset` counts characters from the start
/// of the content and, together with `doc_id`, determines `id`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Chunk {
    pub id: String,
    pub doc_id: u64,
    pub doc_name: String,
    pub offset: usize,
    pub text: String,
}

pub type Fingerprint = Vec<f32>;

#[derive(Debug, Clone, Serialize)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentFormat {
    PlainText,
    Pdf,
}

/// Payload handed to ingestion: inline text, or an uploaded file whose format
/// is decided by the document name's extension.
#[derive(Debug, Clone)]
pub enum DocumentSource {
    Content(String),
    Upload(Vec<u8>),
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub document_id: u64,
    pub document_name: String,
    pub chunk_count: usize,
    #[serde(skip)]
    pub elapsed: Duration,
}

#[derive(Debug, Clone, Serialize)]
pub struct RetrievedContext {
    pub context: String,
    pub source_names: BTreeSet<String>,
    pub hits: Vec<ScoredChunk>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub answer: String,
    pub sources: BTreeSet<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct ExtractionOptions {
    pub max_pages: usize,
    pub budget: Duration,
    pub min_page_chars: usize,
}

impl Default for ExtractionOptions {
    fn default() -> Self {
        Self {
            max_pages: 150,
            budget: Duration::from_secs(20),
            min_page_chars: 11,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct IngestionOptions {
    pub chunk_max_chars: usize,
    pub chunk_overlap_chars: usize,
    pub extraction: ExtractionOptions,
}

impl Default for IngestionOptions {
    fn default() -> Self {
        Self {
            chunk_max_chars: 1_200,
            chunk_overlap_chars: 200,
            extraction: ExtractionOptions::default(),
        }
    }
}

use crate::chunking::{chunk_document, ChunkingConfig};
use crate::embeddings::{Embedder, HashingEmbedder};
use crate::error::IngestError;
use crate::extractor::{LopdfExtractor, PdfExtractor};
use crate::models::{Document, DocumentFormat, DocumentSource, IngestReport, IngestionOptions};
use crate::normalizer::TextNormalizer;
use crate::store::CorpusStore;
use crate::traits::VectorIndex;
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};
use walkdir::WalkDir;

impl DocumentFormat {
    /// Routes by file extension, ignoring case.
    pub fn from_file_name(name: &str) -> Result<Self, IngestError> {
        let extension = Path::new(name)
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default();

        if extension.eq_ignore_ascii_case("txt") {
            Ok(Self::PlainText)
        } else if extension.eq_ignore_ascii_case("pdf") {
            Ok(Self::Pdf)
        } else {
            Err(IngestError::UnsupportedFormat(name.to_string()))
        }
    }
}

pub fn discover_documents(folder: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let supported = entry
            .file_name()
            .to_str()
            .is_some_and(|name| DocumentFormat::from_file_name(name).is_ok());

        if supported {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

pub fn digest_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

pub struct SkippedDocument {
    pub path: PathBuf,
    pub reason: String,
}

pub struct FolderIngestionReport {
    pub documents: Vec<IngestReport>,
    pub skipped_files: Vec<SkippedDocument>,
}

impl FolderIngestionReport {
    pub fn chunk_count(&self) -> usize {
        self.documents.iter().map(|report| report.chunk_count).sum()
    }
}

/// Extractor → chunker → fingerprints → store, for one document at a time.
pub struct IngestionPipeline<X = LopdfExtractor> {
    chunking: ChunkingConfig,
    extractor: X,
    embedder: HashingEmbedder,
}

impl IngestionPipeline<LopdfExtractor> {
    pub fn from_options(options: IngestionOptions) -> Result<Self, IngestError> {
        let extractor = LopdfExtractor::new(options.extraction, TextNormalizer::new()?);
        Self::new(&options, extractor, HashingEmbedder::default())
    }
}

impl<X: PdfExtractor> IngestionPipeline<X> {
    pub fn new(
        options: &IngestionOptions,
        extractor: X,
        embedder: HashingEmbedder,
    ) -> Result<Self, IngestError> {
        Ok(Self {
            chunking: ChunkingConfig::try_from(options)?,
            extractor,
            embedder,
        })
    }

    pub fn embedder(&self) -> HashingEmbedder {
        self.embedder
    }

    pub fn chunking(&self) -> ChunkingConfig {
        self.chunking
    }

    /// Text of an uploaded file without indexing it. Plain text is decoded
    /// leniently; PDFs go through the extractor and may come back empty.
    pub fn extract_upload(&self, name: &str, bytes: &[u8]) -> Result<String, IngestError> {
        match DocumentFormat::from_file_name(name)? {
            DocumentFormat::PlainText => Ok(String::from_utf8_lossy(bytes).into_owned()),
            DocumentFormat::Pdf => Ok(self.extractor.extract_text(bytes)),
        }
    }

    pub fn ingest<I: VectorIndex>(
        &self,
        store: &CorpusStore<I>,
        name: &str,
        source: DocumentSource,
    ) -> Result<IngestReport, IngestError> {
        let started = Instant::now();
        let name = name.trim();
        if name.is_empty() {
            return Err(IngestError::InvalidDocument(
                "document name is missing".to_string(),
            ));
        }

        let (content, checksum) = self.resolve_content(name, source)?;
        let document = Document {
            id: store.reserve_document_id(),
            name: name.to_string(),
            content,
            checksum,
            ingested_at: Utc::now(),
        };

        let entries = chunk_document(&document, self.chunking)
            .into_iter()
            .map(|chunk| {
                let fingerprint = self.embedder.embed(&chunk.text);
                (chunk, fingerprint)
            })
            .collect::<Vec<_>>();

        let report = IngestReport {
            document_id: document.id,
            document_name: document.name.clone(),
            chunk_count: entries.len(),
            elapsed: started.elapsed(),
        };
        store.commit(document, entries);

        info!(
            document_id = report.document_id,
            name = %report.document_name,
            chunk_count = report.chunk_count,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "processed document"
        );

        Ok(report)
    }

    pub fn ingest_folder_best_effort<I: VectorIndex>(
        &self,
        store: &CorpusStore<I>,
        folder: &Path,
    ) -> Result<FolderIngestionReport, IngestError> {
        let files = discover_documents(folder);

        if files.is_empty() {
            return Err(IngestError::InvalidArgument(format!(
                "no .txt or .pdf files found in {}",
                folder.display()
            )));
        }

        let mut documents = Vec::new();
        let mut skipped_files = Vec::new();

        for path in files {
            let ingested = (|| {
                let name = path
                    .file_name()
                    .and_then(|name| name.to_str())
                    .ok_or_else(|| {
                        IngestError::InvalidDocument(format!(
                            "path has no usable file name: {}",
                            path.display()
                        ))
                    })?;
                let bytes = fs::read(&path)?;
                self.ingest(store, name, DocumentSource::Upload(bytes))
            })();

            match ingested {
                Ok(report) => documents.push(report),
                Err(error) => skipped_files.push(SkippedDocument {
                    path,
                    reason: error.to_string(),
                }),
            }
        }

        Ok(FolderIngestionReport {
            documents,
            skipped_files,
        })
    }

    fn resolve_content(
        &self,
        name: &str,
        source: DocumentSource,
    ) -> Result<(String, String), IngestError> {
        match source {
            DocumentSource::Content(content) => {
                if content.trim().is_empty() {
                    return Err(IngestError::InvalidDocument(format!(
                        "{name} has no content"
                    )));
                }
                let checksum = digest_bytes(content.as_bytes());
                Ok((content, checksum))
            }
            DocumentSource::Upload(bytes) => {
                let format = DocumentFormat::from_file_name(name)?;
                if bytes.is_empty() {
                    return Err(IngestError::InvalidDocument(format!("{name} is empty")));
                }

                let checksum = digest_bytes(&bytes);
                let content = self.extract_upload(name, &bytes)?;
                match format {
                    DocumentFormat::PlainText if content.trim().is_empty() => Err(
                        IngestError::InvalidDocument(format!("{name} has no content")),
                    ),
                    DocumentFormat::Pdf if content.is_empty() => {
                        warn!(name, "no text recovered from pdf, indexing it without chunks");
                        Ok((content, checksum))
                    }
                    _ => Ok((content, checksum)),
                }
            }
        }
    }
}

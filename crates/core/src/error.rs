use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("regex error: {0}")]
    RegexError(#[from] regex::Error),

    #[error("invalid document: {0}")]
    InvalidDocument(String),

    #[error("unsupported file type: {0}")]
    UnsupportedFormat(String),

    #[error("invalid chunking config: {0}")]
    InvalidChunkConfig(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("query is empty")]
    EmptyQuery,

    #[error("no documents have been ingested yet")]
    EmptyCorpus,
}

/// Failures inside the answer-generation client. These never leave the client:
/// they are rendered into the answer text instead.
#[derive(Debug, Error)]
pub enum AnswerError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("response carried no answer candidate")]
    MissingCandidate,
}

pub type Result<T, E = IngestError> = std::result::Result<T, E>;

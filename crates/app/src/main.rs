use anyhow::Context;
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use docqa_core::answer::{DEFAULT_GEMINI_ENDPOINT, DEFAULT_GEMINI_MODEL};
use docqa_core::{
    AnswerGenerator, DocumentFormat, DocumentQa, ExtractionOptions, GeminiClient, GeminiConfig,
    IngestionOptions, LopdfExtractor, StaticAnswer, DEFAULT_TOP_K,
};
use serde_json::json;
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "docqa", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Maximum number of PDF pages read per document
    #[arg(long, env = "DOCQA_MAX_PAGES", default_value = "150")]
    max_pages: usize,

    /// Wall-clock budget for extracting one PDF, in seconds
    #[arg(long, env = "DOCQA_EXTRACTION_BUDGET_SECS", default_value = "20")]
    extraction_budget_secs: u64,

    /// Chunk window size in characters
    #[arg(long, env = "DOCQA_CHUNK_SIZE", default_value = "1200")]
    chunk_size: usize,

    /// Characters shared by consecutive chunks
    #[arg(long, env = "DOCQA_CHUNK_OVERLAP", default_value = "200")]
    chunk_overlap: usize,

    /// Gemini API key; without one, answers are not generated
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    gemini_api_key: Option<String>,

    /// Gemini model path
    #[arg(long, env = "GEMINI_MODEL", default_value = DEFAULT_GEMINI_MODEL)]
    gemini_model: String,

    /// Gemini API base URL
    #[arg(long, env = "GEMINI_ENDPOINT", default_value = DEFAULT_GEMINI_ENDPOINT)]
    gemini_endpoint: String,

    /// Timeout for one answer request, in seconds
    #[arg(long, env = "GEMINI_TIMEOUT_SECS", default_value = "20")]
    gemini_timeout_secs: u64,
}

#[derive(Args)]
struct Sources {
    /// Document to ingest (.txt or .pdf). Repeatable.
    #[arg(long = "file")]
    files: Vec<PathBuf>,

    /// Folder scanned recursively for .txt and .pdf files.
    #[arg(long)]
    folder: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Print the extracted, normalized text of one document without indexing it.
    Extract {
        #[arg(long)]
        file: PathBuf,
    },
    /// Ingest documents and answer a single question.
    Ask {
        #[command(flatten)]
        sources: Sources,
        /// Question to answer
        #[arg(long)]
        query: String,
        /// Number of chunks used as context.
        #[arg(long, default_value_t = DEFAULT_TOP_K)]
        top_k: usize,
        /// Print the retrieved context without calling the answer model.
        #[arg(long, default_value_t = false)]
        context_only: bool,
        /// Emit a JSON object instead of plain text.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Ingest documents, then answer one question per line of stdin.
    Chat {
        #[command(flatten)]
        sources: Sources,
        #[arg(long, default_value_t = DEFAULT_TOP_K)]
        top_k: usize,
    },
}

enum Generator {
    Gemini(GeminiClient),
    Offline(StaticAnswer),
}

impl AnswerGenerator for Generator {
    fn generate_answer(&self, prompt: &str) -> String {
        match self {
            Self::Gemini(client) => client.generate_answer(prompt),
            Self::Offline(fixed) => fixed.generate_answer(prompt),
        }
    }
}

impl Cli {
    fn ingestion_options(&self) -> IngestionOptions {
        IngestionOptions {
            chunk_max_chars: self.chunk_size,
            chunk_overlap_chars: self.chunk_overlap,
            extraction: ExtractionOptions {
                max_pages: self.max_pages,
                budget: Duration::from_secs(self.extraction_budget_secs),
                ..ExtractionOptions::default()
            },
        }
    }

    fn generator(&self) -> anyhow::Result<Generator> {
        let Some(api_key) = self.gemini_api_key.as_deref().filter(|key| !key.trim().is_empty())
        else {
            warn!("GEMINI_API_KEY is not set, answers will not be generated");
            return Ok(Generator::Offline(StaticAnswer(
                "No answer model configured; set GEMINI_API_KEY.".to_string(),
            )));
        };

        let config = GeminiConfig {
            endpoint: self.gemini_endpoint.clone(),
            model: self.gemini_model.clone(),
            timeout: Duration::from_secs(self.gemini_timeout_secs),
            ..GeminiConfig::new(api_key)
        };
        let client = GeminiClient::new(&config).context("building gemini client")?;
        Ok(Generator::Gemini(client))
    }
}

fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();
    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        "docqa boot"
    );

    let options = cli.ingestion_options();

    match &cli.command {
        Command::Extract { file } => {
            let name = file_name(file)?;
            let bytes = fs::read(file).with_context(|| format!("reading {}", file.display()))?;

            let qa = DocumentQa::with_options(options, StaticAnswer(String::new()))?;
            let text = qa.extract_upload(name, &bytes)?;
            if text.is_empty() && DocumentFormat::from_file_name(name)? == DocumentFormat::Pdf {
                warn!(file = %file.display(), "no text recovered");
            }
            println!("{text}");
        }
        Command::Ask {
            sources,
            query,
            top_k,
            context_only,
            json,
        } => {
            let qa = DocumentQa::with_options(options, cli.generator()?)?;
            ingest_sources(&qa, sources)?;

            let retrieved = qa.query(query, *top_k)?;
            let answer = (!*context_only).then(|| qa.answer(query, &retrieved).answer);

            if *json {
                let output = json!({
                    "query": query,
                    "context": retrieved.context,
                    "sourceNames": retrieved.source_names,
                    "hits": retrieved.hits,
                    "answer": answer,
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                println!("query: {query}");
                for hit in &retrieved.hits {
                    println!(
                        "[{}] score={:.4} document={}",
                        hit.chunk.id, hit.score, hit.chunk.doc_name
                    );
                }
                println!(
                    "sources: {}",
                    retrieved.source_names.iter().cloned().collect::<Vec<_>>().join(", ")
                );
                match answer {
                    Some(answer) => println!("answer: {answer}"),
                    None => println!("context:\n{}", retrieved.context),
                }
            }
        }
        Command::Chat { sources, top_k } => {
            let qa = DocumentQa::with_options(options, cli.generator()?)?;
            ingest_sources(&qa, sources)?;

            let stdin = io::stdin();
            let mut stdout = io::stdout();
            write!(stdout, "> ")?;
            stdout.flush()?;

            for line in stdin.lock().lines() {
                let line = line?;
                match qa.ask(&line, *top_k) {
                    Ok(answer) => {
                        println!("{}", answer.answer);
                        println!(
                            "sources: {}",
                            answer.sources.into_iter().collect::<Vec<_>>().join(", ")
                        );
                    }
                    Err(error) => eprintln!("error: {error}"),
                }
                write!(stdout, "> ")?;
                stdout.flush()?;
            }
            println!();
        }
    }

    Ok(())
}

fn ingest_sources<G: AnswerGenerator>(
    qa: &DocumentQa<LopdfExtractor, G>,
    sources: &Sources,
) -> anyhow::Result<()> {
    if sources.files.is_empty() && sources.folder.is_none() {
        anyhow::bail!("nothing to ingest: pass --file or --folder");
    }

    for path in &sources.files {
        let name = file_name(path)?;
        let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        let report = qa.ingest_upload(name, bytes)?;
        if report.chunk_count == 0 {
            warn!(file = %path.display(), "document produced no chunks");
        }
    }

    if let Some(folder) = &sources.folder {
        let report = qa.ingest_folder(folder)?;
        if !report.skipped_files.is_empty() {
            warn!(
                "skipped_files={} for folder={}",
                report.skipped_files.len(),
                folder.display()
            );
            for skipped in &report.skipped_files {
                warn!(path = %skipped.path.display(), reason = %skipped.reason, "skipped document");
            }
        }
        info!(folder = %folder.display(), chunk_count = report.chunk_count(), "ingested folder");
    }

    info!(
        documents = qa.documents().len(),
        chunks = qa.chunk_count(),
        "corpus ready"
    );
    Ok(())
}

fn file_name(path: &Path) -> anyhow::Result<&str> {
    path.file_name()
        .and_then(|name| name.to_str())
        .with_context(|| format!("{} has no usable file name", path.display()))
}

//! Boundary with the remote text-generation service.
//!
//! The core hands the assembled context to an [`AnswerGenerator`] and treats
//! whatever string comes back as the answer. [`GeminiClient`] folds every
//! transport and protocol failure into that string, so callers never retry.

use crate::error::AnswerError;
use crate::traits::AnswerGenerator;
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::warn;
use url::Url;

pub const DEFAULT_GEMINI_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_GEMINI_MODEL: &str = "models/gemini-2.0-flash";
pub const DEFAULT_ANSWER_TIMEOUT: Duration = Duration::from_secs(20);

/// Reply the model is told to give when the context does not hold the answer.
pub const NOT_FOUND_REPLY: &str = "Not found in document.";

pub fn build_prompt(question: &str, context: &str) -> String {
    format!(
        "Answer ONLY using the content from this PDF. \
         Do NOT make assumptions or add external knowledge. \
         If the answer is not in the PDF, reply exactly with: '{NOT_FOUND_REPLY}'\n\n\
         PDF Content:\n{context}\n\nQuestion: {question}\nAnswer:"
    )
}

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub endpoint: String,
    pub model: String,
    pub api_key: String,
    pub timeout: Duration,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            endpoint: DEFAULT_GEMINI_ENDPOINT.to_string(),
            model: DEFAULT_GEMINI_MODEL.to_string(),
            api_key: api_key.into(),
            timeout: DEFAULT_ANSWER_TIMEOUT,
        }
    }

    fn generate_content_url(&self) -> Result<Url, AnswerError> {
        let base = format!(
            "{}/{}:generateContent",
            self.endpoint.trim_end_matches('/'),
            self.model.trim_start_matches('/')
        );
        Ok(Url::parse_with_params(&base, &[("key", self.api_key.as_str())])?)
    }
}

pub struct GeminiClient {
    http: Client,
    url: Url,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

impl GeminiClient {
    pub fn new(config: &GeminiConfig) -> Result<Self, AnswerError> {
        let url = config.generate_content_url()?;
        let http = Client::builder()
            .user_agent("docqa")
            .timeout(config.timeout)
            .build()?;

        Ok(Self { http, url })
    }

    fn request_answer(&self, prompt: &str) -> Result<String, AnswerError> {
        // reqwest errors embed the request url, which carries the api key
        let response = self
            .http
            .post(self.url.clone())
            .header(CONTENT_TYPE, "application/json; charset=utf-8")
            .json(&json!({ "contents": [{ "parts": [{ "text": prompt }] }] }))
            .send()
            .map_err(|error| AnswerError::Http(error.without_url()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(AnswerError::BackendResponse {
                backend: "gemini".to_string(),
                details: format!("{status}: {body}"),
            });
        }

        let payload: GenerateContentResponse = response
            .json()
            .map_err(|error| AnswerError::Http(error.without_url()))?;

        payload
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|part| part.text)
                    .collect::<String>()
            })
            .filter(|answer| !answer.is_empty())
            .ok_or(AnswerError::MissingCandidate)
    }
}

impl AnswerGenerator for GeminiClient {
    fn generate_answer(&self, prompt: &str) -> String {
        match self.request_answer(prompt) {
            Ok(answer) => answer,
            Err(error) => {
                warn!(%error, "answer generation failed");
                format!("Gemini API error: {error}")
            }
        }
    }
}

/// Fixed reply, for running without a remote model.
#[derive(Debug, Clone)]
pub struct StaticAnswer(pub String);

impl AnswerGenerator for StaticAnswer {
    fn generate_answer(&self, _prompt: &str) -> String {
        self.0.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::POST, MockServer};

    const PATH: &str = "/v1beta/models/gemini-2.0-flash:generateContent";

    fn client_for(server: &MockServer, timeout: Duration) -> GeminiClient {
        let config = GeminiConfig {
            endpoint: server.url("/v1beta"),
            timeout,
            ..GeminiConfig::new("test-key")
        };
        GeminiClient::new(&config).expect("client")
    }

    #[test]
    fn prompt_embeds_context_and_question() {
        let prompt = build_prompt("What color are bananas?", "Bananas are yellow.");
        assert!(prompt.starts_with("Answer ONLY using the content from this PDF."));
        assert!(prompt.contains("'Not found in document.'"));
        assert!(prompt.ends_with(
            "PDF Content:\nBananas are yellow.\n\nQuestion: What color are bananas?\nAnswer:"
        ));
    }

    #[test]
    fn url_carries_model_and_key() {
        let config = GeminiConfig::new("secret");
        let url = config.generate_content_url().expect("valid url");
        assert_eq!(
            url.as_str(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent?key=secret"
        );
    }

    #[test]
    fn successful_response_returns_candidate_text() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path(PATH)
                .query_param("key", "test-key")
                .json_body(json!({ "contents": [{ "parts": [{ "text": "prompt" }] }] }));
            then.status(200).json_body(json!({
                "candidates": [{
                    "content": { "parts": [{ "text": "Bananas are " }, { "text": "yellow." }] }
                }]
            }));
        });

        let answer = client_for(&server, DEFAULT_ANSWER_TIMEOUT).generate_answer("prompt");

        mock.assert();
        assert_eq!(answer, "Bananas are yellow.");
    }

    #[test]
    fn error_status_is_reported_in_the_answer() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path(PATH);
            then.status(500).body("boom");
        });

        let answer = client_for(&server, DEFAULT_ANSWER_TIMEOUT).generate_answer("prompt");

        assert!(answer.starts_with("Gemini API error:"));
        assert!(answer.contains("500"));
        assert!(answer.contains("boom"));
    }

    #[test]
    fn missing_candidates_are_reported_in_the_answer() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path(PATH);
            then.status(200).json_body(json!({ "candidates": [] }));
        });

        let answer = client_for(&server, DEFAULT_ANSWER_TIMEOUT).generate_answer("prompt");
        assert_eq!(answer, "Gemini API error: response carried no answer candidate");
    }

    #[test]
    fn stalled_peer_times_out() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path(PATH);
            then.status(200)
                .delay(Duration::from_secs(3))
                .json_body(json!({ "candidates": [] }));
        });

        let started = std::time::Instant::now();
        let answer = client_for(&server, Duration::from_millis(200)).generate_answer("prompt");

        assert!(answer.starts_with("Gemini API error:"));
        assert!(!answer.contains("test-key"));
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[test]
    fn static_answer_ignores_prompt() {
        let generator = StaticAnswer("offline".to_string());
        assert_eq!(generator.generate_answer("anything"), "offline");
    }
}

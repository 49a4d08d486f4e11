//! Gemini `generateContent` REST client
//!
//! - **Version**: 1.0.0
//! - **Since**: 1.0.0
//!
//! ## Changelog
//! - 1.0.0: Initial release; API key sent as a header and kept out of error text

use async_trait::async_trait;
use log::debug;
use serde::{Deserialize, Serialize};
use std::error::Error as _;
use std::time::Duration;

use super::{InvocationError, ModelInvoker};

const API_KEY_HEADER: &str = "x-goog-api-key";

#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    api_base: String,
    api_key: String,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: [Content<'a>; 1],
}

#[derive(Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

/// Google API error envelope: `{"error": {"code", "message", "status"}}`
#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
    status: Option<String>,
}

impl GeminiClient {
    pub fn new(api_base: &str, api_key: &str, call_timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().timeout(call_timeout).build()?;
        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/v1beta/models/{model}:generateContent", self.api_base)
    }
}

/// Error text for a failed exchange. The URL is stripped so nothing about
/// the endpoint or its credentials reaches logs or clients.
fn transport_error(err: reqwest::Error) -> InvocationError {
    let err = err.without_url();
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(&format!(": {cause}"));
        source = cause.source();
    }

    if err.is_timeout() {
        InvocationError::new(format!("request timeout: {message}"))
    } else {
        InvocationError {
            status: err.status().map(|s| s.as_u16()),
            message,
        }
    }
}

fn api_error(status: u16, body: &str) -> InvocationError {
    let message = match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => match (envelope.error.status, envelope.error.message) {
            (Some(code), Some(message)) => format!("{code}: {message}"),
            (None, Some(message)) => message,
            (Some(code), None) => code,
            (None, None) => format!("HTTP {status}"),
        },
        Err(_) if body.trim().is_empty() => format!("HTTP {status}"),
        Err(_) => body.trim().to_string(),
    };
    InvocationError::with_status(status, message)
}

fn extract_text(response: GenerateResponse) -> Result<String, InvocationError> {
    let text: String = response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if !text.is_empty() {
        return Ok(text);
    }

    match response.prompt_feedback.and_then(|f| f.block_reason) {
        Some(reason) => Err(InvocationError::new(format!(
            "prompt blocked by safety filter: {reason}"
        ))),
        None => Err(InvocationError::new("empty response from model")),
    }
}

#[async_trait]
impl ModelInvoker for GeminiClient {
    async fn invoke(&self, model: &str, prompt: &str) -> Result<String, InvocationError> {
        debug!("Calling {model} ({} prompt bytes)", prompt.len());

        let body = GenerateRequest {
            contents: [Content {
                parts: [Part { text: prompt }],
            }],
        };

        let response = self
            .http
            .post(self.endpoint(model))
            .header(API_KEY_HEADER, &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(api_error(status.as_u16(), &text));
        }

        let parsed: GenerateResponse = response.json().await.map_err(transport_error)?;
        extract_text(parsed)
    }
}

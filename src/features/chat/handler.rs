//! Chat request handler
//!
//! - **Version**: 1.0.0
//! - **Since**: 1.0.0
//!
//! ## Changelog
//! - 1.0.0: Initial release with ordered validation and overload/failure mapping

use chrono::{SecondsFormat, Utc};
use log::{error, info, warn};
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

use super::types::{ChatRequest, ChatResponse, ErrorBody, ErrorResponse};
use crate::core::Config;
use crate::features::invocation::{
    ChainFailure, GeminiClient, ModelFallbackChain, RetryScheduler,
};
use crate::features::personas::{assemble, PersonaManager};

pub const MSG_MISSING_CREDENTIAL: &str = "Server misconfiguration: Missing GEMINI_API_KEY";
pub const MSG_MISSING_INPUT: &str = "Message and persona are required";
pub const MSG_UNKNOWN_PERSONA: &str = "Invalid persona selected";
pub const MSG_OVERLOADED: &str =
    "Model is temporarily overloaded. We retried a few times—please try again shortly.";
pub const MSG_SERVICE_FAILURE: &str =
    "Failed to generate response. Please check your API key, internet connection, and server logs.";

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("{}", MSG_MISSING_CREDENTIAL)]
    MissingCredential,

    #[error("{}", MSG_MISSING_INPUT)]
    MissingInput,

    #[error("{}", MSG_UNKNOWN_PERSONA)]
    UnknownPersona(String),

    #[error("{}", MSG_OVERLOADED)]
    ServiceOverloaded(#[source] ChainFailure),

    #[error("{}", MSG_SERVICE_FAILURE)]
    ServiceFailure(#[source] ChainFailure),
}

impl ChatError {
    pub fn status(&self) -> u16 {
        match self {
            ChatError::MissingInput | ChatError::UnknownPersona(_) => 400,
            ChatError::MissingCredential | ChatError::ServiceFailure(_) => 500,
            ChatError::ServiceOverloaded(_) => 503,
        }
    }

    /// Internal detail, only ever shown to clients in debug mode
    pub fn detail(&self) -> Option<String> {
        match self {
            ChatError::ServiceOverloaded(failure) | ChatError::ServiceFailure(failure) => {
                Some(failure.to_string())
            }
            ChatError::UnknownPersona(id) => Some(format!("unknown persona id: {id:?}")),
            ChatError::MissingCredential | ChatError::MissingInput => None,
        }
    }

    pub fn into_response(self, include_details: bool) -> ErrorResponse {
        let details = if include_details { self.detail() } else { None };
        ErrorResponse {
            status: self.status(),
            body: ErrorBody {
                error: self.to_string(),
                details,
            },
        }
    }
}

impl From<ChainFailure> for ChatError {
    fn from(failure: ChainFailure) -> Self {
        if failure.is_overloaded() {
            ChatError::ServiceOverloaded(failure)
        } else {
            ChatError::ServiceFailure(failure)
        }
    }
}

/// Handles one chat turn end to end. Holds only read-only state, so one
/// instance is shared by every concurrent request.
pub struct ChatRequestHandler {
    personas: Arc<PersonaManager>,
    chain: ModelFallbackChain,
    candidates: Vec<String>,
    has_credentials: bool,
    request_timeout: Option<Duration>,
    debug_errors: bool,
}

impl ChatRequestHandler {
    pub fn new(config: &Config, personas: Arc<PersonaManager>, chain: ModelFallbackChain) -> Self {
        Self {
            personas,
            chain,
            candidates: config.model_candidates.clone(),
            has_credentials: config.has_credentials(),
            request_timeout: Some(config.request_timeout).filter(|t| !t.is_zero()),
            debug_errors: config.debug_errors,
        }
    }

    /// Wire the handler to the Gemini REST API using `config`
    pub fn from_config(config: &Config, personas: Arc<PersonaManager>) -> anyhow::Result<Self> {
        let client = GeminiClient::new(
            &config.gemini_api_base,
            config.gemini_api_key.as_deref().unwrap_or_default(),
            config.call_timeout,
        )?;
        let scheduler = RetryScheduler::new(config.retry.clone());

        info!(
            "Model candidates: {:?} | max retries per model: {} | worst-case latency without deadline: {:?}",
            config.model_candidates,
            scheduler.max_attempts(),
            scheduler.worst_case_latency(config.model_candidates.len(), config.call_timeout)
        );

        let chain = ModelFallbackChain::new(Arc::new(client), scheduler);
        Ok(Self::new(config, personas, chain))
    }

    pub fn personas(&self) -> &PersonaManager {
        &self.personas
    }

    /// Handle a request and shape the outcome for the client
    pub async fn handle(&self, request: ChatRequest) -> Result<ChatResponse, ErrorResponse> {
        let request_id = Uuid::new_v4();
        self.process(request, request_id)
            .await
            .map_err(|e| e.into_response(self.debug_errors))
    }

    pub async fn process(
        &self,
        request: ChatRequest,
        request_id: Uuid,
    ) -> Result<ChatResponse, ChatError> {
        let start_time = Instant::now();

        if !self.has_credentials {
            error!("[{request_id}] GEMINI_API_KEY is missing; rejecting chat request");
            return Err(ChatError::MissingCredential);
        }

        let message = request
            .message
            .as_deref()
            .filter(|m| !m.trim().is_empty())
            .ok_or(ChatError::MissingInput)?;
        let persona_id = request
            .persona
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .ok_or(ChatError::MissingInput)?;

        let persona = self.personas.get_persona(persona_id).ok_or_else(|| {
            warn!("[{request_id}] Unknown persona: {persona_id}");
            ChatError::UnknownPersona(persona_id.to_string())
        })?;

        info!(
            "[{request_id}] Chat request | Persona: {persona_id} | Message: {} chars | History: {} turns",
            message.len(),
            request.history.len()
        );

        let prompt = assemble(persona, message, &request.history);
        let deadline = self
            .request_timeout
            .map(|timeout| tokio::time::Instant::now() + timeout);

        match self.chain.invoke(&prompt, &self.candidates, deadline).await {
            Ok(text) => {
                info!(
                    "[{request_id}] Response generated | Persona: {persona_id} | {} chars | {}ms",
                    text.len(),
                    start_time.elapsed().as_millis()
                );
                Ok(ChatResponse {
                    response: text,
                    persona: persona_id.to_string(),
                    timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
                })
            }
            Err(failure) => {
                error!(
                    "[{request_id}] Chat API error after {}ms: {failure}",
                    start_time.elapsed().as_millis()
                );
                Err(ChatError::from(failure))
            }
        }
    }
}

//! # Feature: Resilient Model Invocation
//!
//! Calls the generative model service through an ordered fallback chain of
//! model ids. Each failure is classified once: transient failures are retried
//! on the same model with exponential backoff and jitter, unavailable models are
//! skipped, and anything else aborts the chain.
//!
//! - **Version**: 1.0.0
//! - **Since**: 1.0.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 1.0.0: Initial release with Gemini client, classified retry and model fallback

pub mod classifier;
pub mod fallback;
pub mod gemini;
pub mod retry;

pub use classifier::{classify, ClassifiedError, ErrorKind};
pub use fallback::{ChainFailure, ModelFallbackChain};
pub use gemini::GeminiClient;
pub use retry::{RetryConfig, RetryScheduler, RetryState};

use async_trait::async_trait;
use std::fmt;

/// Raw failure reported by the model service for one call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationError {
    pub status: Option<u16>,
    pub message: String,
}

impl fmt::Display for InvocationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(code) => write!(f, "[{code}] {}", self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for InvocationError {}

impl InvocationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }

    pub fn with_status(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
        }
    }
}

/// The single capability the chain needs from the model service
#[async_trait]
pub trait ModelInvoker: Send + Sync {
    async fn invoke(&self, model: &str, prompt: &str) -> Result<String, InvocationError>;
}

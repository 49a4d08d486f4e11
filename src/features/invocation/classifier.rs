//! Failure classification for model invocation attempts
//!
//! Heuristic matching over the status code and message text returned by the
//! model service. Status codes win when present; message patterns cover SDK and
//! transport errors that carry no code.
//!
//! - **Version**: 1.0.0
//! - **Since**: 1.0.0
//!
//! ## Changelog
//! - 1.0.0: Initial release with status-first classification

use std::fmt;

use super::InvocationError;

/// Message fragments that mean "the same call may succeed later"
pub const TRANSIENT_PATTERNS: &[&str] = &[
    "overloaded",
    "temporarily unavailable",
    "timeout",
    "timed out",
    "deadline exceeded",
    "rate limit",
    "rate-limit",
    "resource_exhausted",
    "too many requests",
    "try again",
    "502",
    "503",
    "504",
];

/// Message fragments that mean "this model id will never work for this account"
pub const MODEL_UNAVAILABLE_PATTERNS: &[&str] =
    &["not found", "unknown", "unsupported", "invalid", "404"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Retry the same model
    Transient,
    /// Skip to the next candidate
    ModelUnavailable,
    /// Abort the whole chain
    Fatal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Transient => write!(f, "transient"),
            ErrorKind::ModelUnavailable => write!(f, "model_unavailable"),
            ErrorKind::Fatal => write!(f, "fatal"),
        }
    }
}

/// An invocation failure tagged with its kind. The detail is kept for logs only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedError {
    pub kind: ErrorKind,
    pub detail: InvocationError,
}

impl fmt::Display for ClassifiedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.detail, self.kind)
    }
}

pub fn classify(error: InvocationError) -> ClassifiedError {
    let kind = classify_kind(&error);
    ClassifiedError { kind, detail: error }
}

pub fn classify_kind(error: &InvocationError) -> ErrorKind {
    let message = error.message.to_lowercase();

    let transient_status = matches!(error.status, Some(408 | 429 | 500..=599));
    if transient_status || TRANSIENT_PATTERNS.iter().any(|p| message.contains(p)) {
        return ErrorKind::Transient;
    }

    if error.status == Some(404) || MODEL_UNAVAILABLE_PATTERNS.iter().any(|p| message.contains(p))
    {
        return ErrorKind::ModelUnavailable;
    }

    ErrorKind::Fatal
}

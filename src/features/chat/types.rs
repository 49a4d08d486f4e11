//! Wire types for the chat endpoint
//!
//! - **Version**: 1.0.0
//! - **Since**: 1.0.0
//!
//! ## Changelog
//! - 1.0.0: Initial wire types; history tolerates missing senders and null lists

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Who sent a history turn. The front end sends `"ai"` for persona replies;
/// anything other than `"user"`, including no sender at all, is treated as
/// the assistant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Option<String>", into = "String")]
pub enum Sender {
    User,
    #[default]
    Assistant,
}

impl From<Option<String>> for Sender {
    fn from(value: Option<String>) -> Self {
        match value.as_deref() {
            Some("user") => Sender::User,
            _ => Sender::Assistant,
        }
    }
}

impl From<Sender> for String {
    fn from(sender: Sender) -> Self {
        match sender {
            Sender::User => "user".to_string(),
            Sender::Assistant => "ai".to_string(),
        }
    }
}

impl Sender {
    pub fn label(&self) -> &'static str {
        match self {
            Sender::User => "User",
            Sender::Assistant => "Assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    #[serde(default)]
    pub sender: Sender,
    #[serde(default)]
    pub content: String,
    /// Kept as sent by the client; never parsed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            sender: Sender::User,
            content: content.into(),
            timestamp: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            sender: Sender::Assistant,
            content: content.into(),
            timestamp: None,
        }
    }
}

/// Incoming chat request. Fields are optional on the wire so that missing
/// values reach validation instead of failing deserialization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub persona: Option<String>,
    /// Most recent turn last. `null` or a non-array value counts as no history.
    #[serde(default, deserialize_with = "lenient_history")]
    pub history: Vec<ConversationTurn>,
}

fn lenient_history<'de, D>(deserializer: D) -> Result<Vec<ConversationTurn>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        Some(value @ Value::Array(_)) => serde_json::from_value(value).map_err(D::Error::custom),
        _ => Ok(Vec::new()),
    }
}

impl ChatRequest {
    pub fn new(message: impl Into<String>, persona: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            persona: Some(persona.into()),
            history: Vec::new(),
        }
    }

    pub fn with_history(mut self, history: Vec<ConversationTurn>) -> Self {
        self.history = history;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
    pub persona: String,
    /// RFC 3339, UTC, millisecond precision
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
        }
    }
}

/// A failed chat request as it should be sent to the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorResponse {
    pub status: u16,
    pub body: ErrorBody,
}

//! # Feature: Persona Chat
//!
//! Request validation, prompt assembly, and model invocation for one chat turn,
//! with the outcome mapped to a client-facing response.
//!
//! - **Version**: 1.0.0
//! - **Since**: 1.0.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 1.0.0: Initial release

pub mod handler;
pub mod types;

pub use handler::{ChatError, ChatRequestHandler};
pub use types::{
    ChatRequest, ChatResponse, ConversationTurn, ErrorBody, ErrorResponse, Sender,
};

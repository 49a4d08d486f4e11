// Core layer - configuration
pub mod core;

// Features layer - personas, prompt assembly, model invocation, chat handling
pub mod features;

// HTTP layer - routes and bind supervisor
pub mod server;

pub use core::Config;

pub use features::{
    // Chat
    chat::{ChatRequest, ChatRequestHandler, ChatResponse, ConversationTurn},
    // Invocation
    invocation::{ModelFallbackChain, ModelInvoker, RetryScheduler},
    // Personas
    personas::{Persona, PersonaManager},
    // Rate limiting
    rate_limiting::RateLimiter,
};

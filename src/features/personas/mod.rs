//! # Personas Feature
//!
//! Persona catalogue and prompt assembly.
//!
//! - **Version**: 1.0.0
//! - **Since**: 1.0.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 1.0.0: Initial release

pub mod manager;
pub mod prompt_builder;

pub use manager::{Persona, PersonaManager, PersonaSummary, TrainingExample};
pub use prompt_builder::{assemble, PromptBuilder, MAX_FEW_SHOT_EXAMPLES, MAX_HISTORY_TURNS};

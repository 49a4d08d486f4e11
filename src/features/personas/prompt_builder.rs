//! Prompt assembly for persona chat
//!
//! The rendered prompt is, in order and separated by blank lines:
//! 1. persona system instruction
//! 2. strict response guidelines
//! 3. few-shot block (first training example only), if any
//! 4. recent conversation (last 6 turns), if any
//! 5. the current user message
//! 6. closing instruction naming the persona
//!
//! Empty optional blocks are left out entirely.
//!
//! - **Version**: 1.0.0
//! - **Since**: 1.0.0
//!
//! ## Changelog
//! - 1.0.0: Fluent builder for the six-section chat prompt

use super::Persona;
use crate::features::chat::ConversationTurn;

/// Turns of history kept in the prompt
pub const MAX_HISTORY_TURNS: usize = 6;
/// Training examples kept in the prompt
pub const MAX_FEW_SHOT_EXAMPLES: usize = 1;

const DEFAULT_TONE: &str = "a friendly, conversational";

/// Builder for the full model prompt of one chat turn
///
/// # Example
///
/// ```ignore
/// let prompt = PromptBuilder::new(persona, "How do I learn Rust?")
///     .with_history(&request.history)
///     .build();
/// ```
pub struct PromptBuilder<'a> {
    persona: &'a Persona,
    message: &'a str,
    history: &'a [ConversationTurn],
    max_history: usize,
    max_examples: usize,
}

impl<'a> PromptBuilder<'a> {
    pub fn new(persona: &'a Persona, message: &'a str) -> Self {
        Self {
            persona,
            message,
            history: &[],
            max_history: MAX_HISTORY_TURNS,
            max_examples: MAX_FEW_SHOT_EXAMPLES,
        }
    }

    /// Conversation so far, most recent last
    pub fn with_history(mut self, history: &'a [ConversationTurn]) -> Self {
        self.history = history;
        self
    }

    pub fn with_max_history(mut self, max: usize) -> Self {
        self.max_history = max;
        self
    }

    pub fn with_max_examples(mut self, max: usize) -> Self {
        self.max_examples = max;
        self
    }

    pub fn build(self) -> String {
        let persona = self.persona;
        let mut sections: Vec<String> = Vec::with_capacity(6);

        sections.push(persona.system_instruction.clone());
        sections.push(self.guidelines());

        if let Some(examples) = self.few_shot_block() {
            sections.push(examples);
        }
        if let Some(history) = self.history_block() {
            sections.push(history);
        }

        sections.push(format!("Current User Message: {}", self.message));
        sections.push(format!(
            "Now respond as {} in a concise answer that follows the STRICT guidelines:",
            persona.name
        ));

        sections.join("\n\n")
    }

    fn guidelines(&self) -> String {
        let tone = self.persona.tone.as_deref().unwrap_or(DEFAULT_TONE);
        [
            "IMPORTANT RESPONSE GUIDELINES (STRICT):".to_string(),
            format!("- Always respond in character as {}", self.persona.name),
            "- Answer the user's question directly; do NOT repeat training data or persona background".to_string(),
            "- Be concise: 2-5 sentences OR up to 5 short bullets (<= 100-120 words)".to_string(),
            "- No greetings, no sign-offs, no emojis, no disclaimers".to_string(),
            format!("- Use {tone} tone naturally; include a signature phrase only if it fits naturally"),
            "- If unclear, ask ONE short clarifying question instead of long filler".to_string(),
        ]
        .join("\n")
    }

    fn few_shot_block(&self) -> Option<String> {
        let examples: Vec<String> = self
            .persona
            .training_examples
            .iter()
            .take(self.max_examples)
            .enumerate()
            .map(|(i, ex)| {
                format!(
                    "Example {}:\nUser: {}\nAssistant ({}): {}",
                    i + 1,
                    ex.user_input,
                    self.persona.id,
                    ex.expected_response
                )
            })
            .collect();

        if examples.is_empty() {
            return None;
        }
        Some(format!(
            "FEW-SHOT EXAMPLES (style reference only, do not copy):\n{}",
            examples.join("\n\n")
        ))
    }

    fn history_block(&self) -> Option<String> {
        let skip = self.history.len().saturating_sub(self.max_history);
        let recent = &self.history[skip..];
        if recent.is_empty() {
            return None;
        }

        let lines: Vec<String> = recent
            .iter()
            .map(|turn| format!("{}: {}", turn.sender.label(), turn.content))
            .collect();
        Some(format!("RECENT CONVERSATION:\n{}", lines.join("\n")))
    }
}

/// Render the prompt with the default bounds (1 example, 6 history turns)
pub fn assemble(persona: &Persona, message: &str, history: &[ConversationTurn]) -> String {
    PromptBuilder::new(persona, message).with_history(history).build()
}

// file: src/llm/mod.rs
// description: chat completion client used for SQL planning and answer generation
// reference: internal module structure

pub mod groq;

pub use groq::{ChatMessage, CompletionOptions, GroqChatClient};

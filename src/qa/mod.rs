// file: src/qa/mod.rs
// description: answer synthesis over hybrid search results

pub mod extractive;
pub mod service;
pub mod synthesizer;

pub use extractive::ExtractiveGenerator;
pub use service::QaService;
pub use synthesizer::{
    AnswerGenerator, AnswerSynthesizer, GeneratedAnswer, GroqAnswerGenerator, Passage,
};

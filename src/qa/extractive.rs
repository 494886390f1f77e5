// file: src/qa/extractive.rs
// description: offline answer generation from keyword-bearing source sentences

use crate::error::Result;
use crate::qa::synthesizer::{AnswerGenerator, GeneratedAnswer, Passage};
use crate::utils::keywords::extract_keywords;
use crate::utils::validation::Validator;
use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref SENTENCE_BREAK: Regex = Regex::new(r"[.!?。\n]+").expect("sentence regex is valid");
}

const MAX_PASSAGES: usize = 3;
const MAX_ANSWER_SENTENCES: usize = 3;
const MAX_CANDIDATES: usize = 5;
const MAX_ANSWER_CHARS: usize = 500;
const MIN_KEYWORD_SENTENCE_CHARS: usize = 10;
const MIN_FILLER_SENTENCE_CHARS: usize = 20;
const SUMMARY_SNIPPET_CHARS: usize = 100;

pub const NO_EXTRACT_ANSWER: &str =
    "관련 문서를 찾았지만, 질문에 대한 구체적인 답변을 추출하기 어렵습니다.";

/// Picks sentences mentioning the question's keywords from the top
/// passages. Needs no network and never fails.
#[derive(Debug, Default, Clone)]
pub struct ExtractiveGenerator;

impl ExtractiveGenerator {
    pub fn new() -> Self {
        Self
    }

    fn sentences(passages: &[Passage]) -> Vec<String> {
        passages
            .iter()
            .take(MAX_PASSAGES)
            .flat_map(|p| SENTENCE_BREAK.split(&p.text))
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }

    fn compose_answer(question: &str, passages: &[Passage]) -> String {
        let keywords = extract_keywords(question, 10);
        let sentences = Self::sentences(passages);

        let mut selected: Vec<&str> = sentences
            .iter()
            .filter(|s| s.chars().count() > MIN_KEYWORD_SENTENCE_CHARS)
            .filter(|s| {
                let lowered = s.to_lowercase();
                keywords.iter().any(|k| lowered.contains(k.as_str()))
            })
            .map(String::as_str)
            .collect();

        if selected.len() < 2 {
            for sentence in &sentences {
                if selected.len() >= MAX_CANDIDATES {
                    break;
                }
                if sentence.chars().count() > MIN_FILLER_SENTENCE_CHARS
                    && !selected.contains(&sentence.as_str())
                {
                    selected.push(sentence);
                }
            }
        }

        if selected.is_empty() {
            return NO_EXTRACT_ANSWER.to_string();
        }

        let answer = selected
            .into_iter()
            .take(MAX_ANSWER_SENTENCES)
            .collect::<Vec<_>>()
            .join(" ");
        Validator::truncate_text(&answer, MAX_ANSWER_CHARS)
    }

    fn compose_summary(passages: &[Passage]) -> Option<String> {
        if passages.len() < 2 {
            return None;
        }
        let lines: Vec<String> = passages
            .iter()
            .take(MAX_PASSAGES)
            .filter_map(|p| {
                let first = SENTENCE_BREAK
                    .split(&p.text)
                    .map(str::trim)
                    .find(|s| !s.is_empty())?;
                Some(format!(
                    "{}: {}",
                    p.label,
                    Validator::truncate_text(first, SUMMARY_SNIPPET_CHARS)
                ))
            })
            .collect();
        (!lines.is_empty()).then(|| lines.join(" / "))
    }
}

#[async_trait]
impl AnswerGenerator for ExtractiveGenerator {
    async fn generate(
        &self,
        question: &str,
        passages: &[Passage],
        want_summary: bool,
    ) -> Result<GeneratedAnswer> {
        Ok(GeneratedAnswer {
            answer: Self::compose_answer(question, passages),
            summary: if want_summary {
                Self::compose_summary(passages)
            } else {
                None
            },
        })
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        "extractive"
    }
}

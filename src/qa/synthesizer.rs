// file: src/qa/synthesizer.rs
// description: answer synthesis over fused search results with citations and confidence
// reference: https://console.groq.com/docs/api-reference#chat

use crate::config::{GenerationConfig, GenerationProvider, LlmConfig};
use crate::error::{Result, SearchError};
use crate::llm::{ChatMessage, CompletionOptions, GroqChatClient};
use crate::models::{AnswerRecord, FusedResultSet, SearchItem, SourceCitation};
use crate::qa::extractive::ExtractiveGenerator;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const NO_RESULTS_ANSWER: &str = "죄송합니다. 질문과 관련된 문서를 찾을 수 없습니다.";

/// One source handed to answer generation.
#[derive(Debug, Clone, PartialEq)]
pub struct Passage {
    /// 1-based position in the fused ranking.
    pub rank: usize,
    /// Document title, or table name for rows.
    pub label: String,
    pub text: String,
    pub score: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedAnswer {
    pub answer: String,
    pub summary: Option<String>,
}

#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    async fn generate(
        &self,
        question: &str,
        passages: &[Passage],
        want_summary: bool,
    ) -> Result<GeneratedAnswer>;

    /// Whether the generation backend is reachable.
    async fn ping(&self) -> Result<()>;

    fn name(&self) -> &str;
}

pub fn generator_from_config(
    generation: &GenerationConfig,
    llm: &LlmConfig,
) -> Arc<dyn AnswerGenerator> {
    match generation.provider {
        GenerationProvider::Groq => match GroqChatClient::new(llm) {
            Ok(chat) => {
                info!("Answer generation via {}", chat.model());
                Arc::new(GroqAnswerGenerator::new(chat, generation))
            }
            Err(e) => {
                warn!("Chat generation unavailable ({}), using extractive answers", e);
                Arc::new(ExtractiveGenerator::new())
            }
        },
        GenerationProvider::Extractive => Arc::new(ExtractiveGenerator::new()),
    }
}

#[derive(Debug, Deserialize)]
struct AnswerReply {
    answer: String,
    #[serde(default)]
    summary: Option<String>,
}

/// Chat-completion answers constrained to the supplied passages.
pub struct GroqAnswerGenerator {
    chat: GroqChatClient,
    max_tokens: u32,
    temperature: f32,
}

impl GroqAnswerGenerator {
    pub fn new(chat: GroqChatClient, config: &GenerationConfig) -> Self {
        Self {
            chat,
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        }
    }

    fn build_messages(question: &str, passages: &[Passage], want_summary: bool) -> Vec<ChatMessage> {
        let context = passages
            .iter()
            .map(|p| format!("[{}] {}\n{}", p.rank, p.label, p.text))
            .collect::<Vec<_>>()
            .join("\n\n");

        let summary_rule = if want_summary {
            "\"summary\" is a one or two sentence overview of the sources."
        } else {
            "\"summary\" must be null."
        };

        let system = format!(
            "You answer questions about company documents and records using only the numbered \
             sources provided. Answer in the language of the question and cite sources as [n]. \
             If the sources do not contain the answer, say so. Reply with a JSON object \
             {{\"answer\": string, \"summary\": string or null}}. {}",
            summary_rule
        );

        vec![
            ChatMessage::system(system),
            ChatMessage::user(format!("Sources:\n{}\n\nQuestion: {}", context, question)),
        ]
    }
}

#[async_trait]
impl AnswerGenerator for GroqAnswerGenerator {
    async fn generate(
        &self,
        question: &str,
        passages: &[Passage],
        want_summary: bool,
    ) -> Result<GeneratedAnswer> {
        let messages = Self::build_messages(question, passages, want_summary);
        let options = CompletionOptions {
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            json_mode: true,
        };

        let reply: AnswerReply = self
            .chat
            .complete_json(&messages, options)
            .await
            .map_err(|e| match e {
                SearchError::SynthesisUnavailable(_) => e,
                other => SearchError::SynthesisUnavailable(other.to_string()),
            })?;

        if reply.answer.trim().is_empty() {
            return Err(SearchError::SynthesisUnavailable(
                "model returned an empty answer".to_string(),
            ));
        }

        Ok(GeneratedAnswer {
            answer: reply.answer,
            summary: reply.summary.filter(|s| want_summary && !s.trim().is_empty()),
        })
    }

    async fn ping(&self) -> Result<()> {
        self.chat.ping().await
    }

    fn name(&self) -> &str {
        self.chat.model()
    }
}

pub struct AnswerSynthesizer {
    generator: Arc<dyn AnswerGenerator>,
    context_char_budget: usize,
    degraded_penalty: f32,
}

impl AnswerSynthesizer {
    pub fn new(
        generator: Arc<dyn AnswerGenerator>,
        context_char_budget: usize,
        degraded_penalty: f32,
    ) -> Self {
        Self {
            generator,
            context_char_budget: context_char_budget.max(1),
            degraded_penalty: degraded_penalty.clamp(0.0, 1.0),
        }
    }

    pub fn generator(&self) -> &dyn AnswerGenerator {
        self.generator.as_ref()
    }

    /// Never fails: a generation error yields an answerless record that
    /// still carries the citations and confidence.
    pub async fn synthesize(
        &self,
        question: &str,
        fused: &FusedResultSet,
        want_summary: bool,
    ) -> AnswerRecord {
        if fused.items.is_empty() {
            return AnswerRecord {
                answer: Some(NO_RESULTS_ANSWER.to_string()),
                summary: None,
                sources: Vec::new(),
                confidence_score: 0.0,
                answer_generated: false,
            };
        }

        let used = self.select_passages(&fused.items);
        let sources: Vec<SourceCitation> = used
            .iter()
            .map(|(item, passage)| SourceCitation::from_item(passage.rank, item))
            .collect();
        let passages: Vec<Passage> = used.into_iter().map(|(_, p)| p).collect();

        let scores: Vec<f32> = passages.iter().map(|p| p.score).collect();
        let mut confidence = confidence_from_scores(&scores);
        if fused.degraded {
            confidence *= self.degraded_penalty;
        }

        debug!(
            "Synthesizing from {} of {} results with {}",
            passages.len(),
            fused.items.len(),
            self.generator.name()
        );

        match self.generator.generate(question, &passages, want_summary).await {
            Ok(generated) => AnswerRecord {
                answer: Some(generated.answer),
                summary: generated.summary,
                sources,
                confidence_score: confidence,
                answer_generated: true,
            },
            Err(e) => {
                warn!("Answer generation failed, returning search results only: {}", e);
                AnswerRecord {
                    answer: None,
                    summary: None,
                    sources,
                    confidence_score: confidence,
                    answer_generated: false,
                }
            }
        }
    }

    /// Takes results in rank order until the character budget runs out. The
    /// first result is truncated to fit rather than dropped.
    fn select_passages<'a>(&self, items: &'a [SearchItem]) -> Vec<(&'a SearchItem, Passage)> {
        let mut remaining = self.context_char_budget;
        let mut selected = Vec::new();

        for (idx, item) in items.iter().enumerate() {
            let text = item.passage_text();
            let length = text.chars().count();

            let text = if length <= remaining {
                remaining -= length;
                text
            } else if selected.is_empty() {
                let truncated: String = text.chars().take(remaining).collect();
                remaining = 0;
                truncated
            } else {
                break;
            };

            let label = item
                .doc_title()
                .map(str::to_string)
                .unwrap_or_else(|| match item {
                    SearchItem::Table(t) => t.table_type.clone(),
                    SearchItem::Text(t) => t.doc_id.clone(),
                });

            selected.push((
                item,
                Passage {
                    rank: idx + 1,
                    label,
                    text,
                    score: item.score(),
                },
            ));

            if remaining == 0 {
                break;
            }
        }

        selected
    }
}

/// Weighted mean of the three best scores (weights 3, 2, 1), capped at the
/// best score.
pub fn confidence_from_scores(scores: &[f32]) -> f32 {
    let mut sorted: Vec<f32> = scores.iter().copied().filter(|s| s.is_finite()).collect();
    sorted.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));

    let Some(&max) = sorted.first() else {
        return 0.0;
    };

    let (weighted, weights) = sorted
        .iter()
        .take(3)
        .zip([3.0f32, 2.0, 1.0])
        .fold((0.0, 0.0), |(sum, total), (score, weight)| {
            (sum + score * weight, total + weight)
        });

    (weighted / weights).min(max).clamp(0.0, 1.0)
}

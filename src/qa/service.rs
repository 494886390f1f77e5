// file: src/qa/service.rs
// description: question answering entry point plus stats and health reads
// reference: search first, then synthesize; search failures propagate

use crate::config::Config;
use crate::error::{Result, SearchError};
use crate::models::{HybridSearchRequest, HybridSearchResponse, QaRequest, QaResponse};
use crate::qa::synthesizer::{AnswerGenerator, AnswerSynthesizer, generator_from_config};
use crate::search::engine::{HybridSearchEngine, to_check};
use crate::utils::stats::{SearchStats, SearchTelemetry};
use crate::utils::telemetry::{HealthReport, OperationTimer};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{Instrument, info, info_span};

const SLOW_ANSWER: Duration = Duration::from_secs(10);

pub struct QaService {
    engine: Arc<HybridSearchEngine>,
    synthesizer: AnswerSynthesizer,
    generation_timeout: Duration,
}

impl QaService {
    pub fn new(
        engine: Arc<HybridSearchEngine>,
        generator: Arc<dyn AnswerGenerator>,
        config: &Config,
    ) -> Self {
        Self {
            engine,
            synthesizer: AnswerSynthesizer::new(
                generator,
                config.generation.context_char_budget,
                config.search.degraded_confidence_penalty,
            ),
            generation_timeout: Duration::from_millis(config.llm.request_timeout_ms),
        }
    }

    pub async fn from_config(config: &Config, telemetry: SearchTelemetry) -> Result<Self> {
        let engine = Arc::new(HybridSearchEngine::from_config(config, telemetry).await?);
        let generator = generator_from_config(&config.generation, &config.llm);
        Ok(Self::new(engine, generator, config))
    }

    pub fn engine(&self) -> &HybridSearchEngine {
        &self.engine
    }

    pub async fn search(&self, request: &HybridSearchRequest) -> Result<HybridSearchResponse> {
        self.engine.search(request).await
    }

    /// Answers `request.question` from up to `top_k` fused results. Only a
    /// validation error or a total search failure is an error; a failed
    /// generation step still returns the sources.
    pub async fn ask(&self, request: &QaRequest) -> Result<QaResponse> {
        let top_k = request.validate(self.engine.settings())?;
        let span = info_span!("ask", top_k);

        async {
            let timer = OperationTimer::new("question answering");
            let fused = self.engine.run(&request.question, top_k).await?;

            let answer = self
                .synthesizer
                .synthesize(&request.question, &fused, request.include_summary)
                .await;

            timer.warn_if_slow(SLOW_ANSWER, "answer synthesis");
            info!(
                "Answered from {} sources (generated: {}, confidence {:.2})",
                answer.sources.len(),
                answer.answer_generated,
                answer.confidence_score
            );
            timer.finish();

            Ok::<_, SearchError>(QaResponse::new(
                &request.question,
                fused,
                answer,
                request.include_summary,
                request.include_sources,
            ))
        }
        .instrument(span)
        .await
    }

    pub fn stats(&self) -> SearchStats {
        self.engine.telemetry().snapshot()
    }

    /// Probes both search backends and the generation service concurrently.
    pub async fn health(&self) -> HealthReport {
        let generation = async {
            let started = Instant::now();
            let result = match tokio::time::timeout(
                self.generation_timeout,
                self.synthesizer.generator().ping(),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(SearchError::Timeout {
                    operation: "generation ping".to_string(),
                    millis: self.generation_timeout.as_millis() as u64,
                }),
            };
            to_check("generation_service", result, started.elapsed())
        };

        let ((structured, semantic), generation) =
            tokio::join!(self.engine.check_backends(), generation);

        HealthReport::new(
            structured,
            semantic,
            generation,
            env!("CARGO_PKG_VERSION").to_string(),
        )
    }
}

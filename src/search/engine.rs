// file: src/search/engine.rs
// description: hybrid search orchestration: classify, fan out, fuse, record
// reference: concurrent retrieval with per-backend timeouts

use crate::config::{Config, PlannerKind, SearchConfig};
use crate::database::client::LanceDbClient;
use crate::database::embeddings::provider_from_config;
use crate::database::sqlite::SqliteClient;
use crate::error::{Result, SearchError};
use crate::llm::GroqChatClient;
use crate::models::{
    ClassificationResult, FusedResultSet, HybridSearchRequest, HybridSearchResponse, SearchType,
    TableSearchResult, TextSearchResult,
};
use crate::search::classifier::QueryClassifier;
use crate::search::fusion::{AdapterOutcome, ResultFusion, SEMANTIC_BACKEND, STRUCTURED_BACKEND};
use crate::search::retry::RetryPolicy;
use crate::search::semantic::{SemanticSearch, VectorSearch};
use crate::search::sql_planner::{KeywordSqlPlanner, LlmSqlPlanner, SqlPlanner};
use crate::search::structured::{StructuredSearch, Text2SqlSearch};
use crate::utils::stats::{SearchEvent, SearchTelemetry};
use crate::utils::telemetry::HealthCheck;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

pub struct HybridSearchEngine {
    classifier: QueryClassifier,
    structured: Arc<dyn StructuredSearch>,
    semantic: Arc<dyn SemanticSearch>,
    fusion: ResultFusion,
    telemetry: SearchTelemetry,
    settings: SearchConfig,
}

impl HybridSearchEngine {
    pub fn new(
        config: &Config,
        structured: Arc<dyn StructuredSearch>,
        semantic: Arc<dyn SemanticSearch>,
        telemetry: SearchTelemetry,
    ) -> Self {
        Self {
            classifier: QueryClassifier::new(&config.classifier),
            structured,
            semantic,
            fusion: ResultFusion::new(config.search.dedup_delta),
            telemetry,
            settings: config.search.clone(),
        }
    }

    /// Wires the SQLite and LanceDB adapters described by `config`.
    pub async fn from_config(config: &Config, telemetry: SearchTelemetry) -> Result<Self> {
        let planner: Arc<dyn SqlPlanner> = match config.structured.planner {
            PlannerKind::Llm => match GroqChatClient::new(&config.llm) {
                Ok(chat) => Arc::new(LlmSqlPlanner::new(chat)),
                Err(e) => {
                    warn!("LLM planner unavailable ({}), using keyword planner", e);
                    Arc::new(KeywordSqlPlanner::new())
                }
            },
            PlannerKind::Keyword => Arc::new(KeywordSqlPlanner::new()),
        };

        let structured = Arc::new(Text2SqlSearch::new(
            SqliteClient::new(&config.structured.sqlite_path),
            planner,
            config.structured.max_rows,
        ));

        let index = LanceDbClient::new(config.database.clone()).await?;
        let embedder = provider_from_config(&config.llm, &config.database)?;
        let semantic = Arc::new(VectorSearch::new(
            index,
            embedder,
            RetryPolicy::from_config(&config.database),
        ));

        Ok(Self::new(config, structured, semantic, telemetry))
    }

    pub fn settings(&self) -> &SearchConfig {
        &self.settings
    }

    pub fn telemetry(&self) -> &SearchTelemetry {
        &self.telemetry
    }

    pub fn classify(&self, query: &str) -> ClassificationResult {
        self.classifier.classify(query)
    }

    /// Validates, runs and wraps a hybrid search. Validation failures are
    /// returned before anything is recorded.
    pub async fn search(&self, request: &HybridSearchRequest) -> Result<HybridSearchResponse> {
        let limit = request.validate(&self.settings)?;
        let fused = self.run(&request.query, limit).await?;
        Ok(HybridSearchResponse::from_fused(&request.query, fused))
    }

    /// Classifies `query`, queries the routed backends concurrently and fuses
    /// up to `limit` results. Records one telemetry event either way.
    pub async fn run(&self, query: &str, limit: usize) -> Result<FusedResultSet> {
        let request_id = Uuid::new_v4();
        let span = info_span!("search", %request_id);

        async move {
            let started = Instant::now();
            let analysis = self.classify(query);
            let (outcome, effective) = self.execute(query, &analysis, limit, started).await;

            self.telemetry.record(SearchEvent {
                query: query.to_string(),
                search_type: effective,
                latency: started.elapsed(),
                success: outcome.is_ok(),
            });

            match &outcome {
                Ok(fused) => info!(
                    "Search returned {} results in {:.3}s{}",
                    fused.total_count,
                    fused.search_time,
                    if fused.degraded { " (degraded)" } else { "" }
                ),
                Err(e) => warn!("Search failed: {}", e),
            }
            outcome
        }
        .instrument(span)
        .await
    }

    async fn execute(
        &self,
        query: &str,
        analysis: &ClassificationResult,
        limit: usize,
        started: Instant,
    ) -> (Result<FusedResultSet>, SearchType) {
        let routed = analysis.search_type;

        let (mut table, mut text) = tokio::join!(
            self.maybe_structured(routed.runs_table(), query, analysis, limit),
            self.maybe_semantic(routed.runs_text(), query, limit),
        );

        // A single routed path that failed falls back to the other one.
        let mut effective = routed;
        if routed == SearchType::Table && !table.succeeded() {
            info!("Structured path failed, falling back to semantic search");
            text = self.run_semantic(query, limit).await;
            effective = SearchType::Hybrid;
        } else if routed == SearchType::Text && !text.succeeded() {
            info!("Semantic path failed, falling back to structured search");
            table = self.run_structured(query, analysis, limit).await;
            effective = SearchType::Hybrid;
        }

        let search_time = round_secs(started.elapsed());
        let fused = self
            .fusion
            .fuse(table, text, limit, analysis.clone(), search_time)
            .map(|mut fused| {
                fused.search_type = effective;
                fused
            });
        (fused, effective)
    }

    async fn maybe_structured(
        &self,
        enabled: bool,
        query: &str,
        analysis: &ClassificationResult,
        limit: usize,
    ) -> AdapterOutcome<TableSearchResult> {
        if enabled {
            self.run_structured(query, analysis, limit).await
        } else {
            AdapterOutcome::Skipped
        }
    }

    async fn maybe_semantic(
        &self,
        enabled: bool,
        query: &str,
        limit: usize,
    ) -> AdapterOutcome<TextSearchResult> {
        if enabled {
            self.run_semantic(query, limit).await
        } else {
            AdapterOutcome::Skipped
        }
    }

    async fn run_structured(
        &self,
        query: &str,
        analysis: &ClassificationResult,
        limit: usize,
    ) -> AdapterOutcome<TableSearchResult> {
        let result = with_timeout(
            "structured search",
            self.settings.structured_timeout(),
            self.structured.search(query, analysis, limit),
        )
        .await;
        log_outcome(STRUCTURED_BACKEND, AdapterOutcome::from_result(result))
    }

    async fn run_semantic(&self, query: &str, limit: usize) -> AdapterOutcome<TextSearchResult> {
        let result = with_timeout(
            "semantic search",
            self.settings.semantic_timeout(),
            self.semantic.search(query, limit),
        )
        .await;
        log_outcome(SEMANTIC_BACKEND, AdapterOutcome::from_result(result))
    }

    /// Pings both search backends under their request timeouts.
    pub async fn check_backends(&self) -> (HealthCheck, HealthCheck) {
        let structured = async {
            let started = Instant::now();
            let result = with_timeout(
                "structured ping",
                self.settings.structured_timeout(),
                self.structured.ping(),
            )
            .await;
            to_check("structured_store", result, started.elapsed())
        };
        let semantic = async {
            let started = Instant::now();
            let result = with_timeout(
                "semantic ping",
                self.settings.semantic_timeout(),
                self.semantic.ping(),
            )
            .await;
            to_check("semantic_index", result, started.elapsed())
        };
        tokio::join!(structured, semantic)
    }
}

/// Dropping the inner future on expiry cancels the backend call.
async fn with_timeout<T, F>(operation: &str, limit: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(SearchError::Timeout {
            operation: operation.to_string(),
            millis: limit.as_millis() as u64,
        }),
    }
}

fn log_outcome<T>(backend: &str, outcome: AdapterOutcome<T>) -> AdapterOutcome<T> {
    match &outcome {
        AdapterOutcome::Ok(items) => debug!("{} backend returned {} results", backend, items.len()),
        AdapterOutcome::Failed(reason) => warn!("{} backend failed: {}", backend, reason),
        AdapterOutcome::TimedOut => warn!("{} backend timed out", backend),
        AdapterOutcome::Skipped => {}
    }
    outcome
}

pub(crate) fn to_check(component: &str, result: Result<()>, elapsed: Duration) -> HealthCheck {
    match result {
        Ok(()) => HealthCheck::healthy(component, elapsed),
        Err(e) => HealthCheck::unhealthy(component, e.to_string(), elapsed),
    }
}

fn round_secs(elapsed: Duration) -> f64 {
    (elapsed.as_secs_f64() * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use serde_json::{Map, json};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct RowsOnly {
        result: std::result::Result<Vec<TableSearchResult>, String>,
        delay: Duration,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl StructuredSearch for RowsOnly {
        async fn search(
            &self,
            _query: &str,
            _analysis: &ClassificationResult,
            limit: usize,
        ) -> Result<Vec<TableSearchResult>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.result
                .clone()
                .map(|mut rows| {
                    rows.truncate(limit);
                    rows
                })
                .map_err(SearchError::SearchBackendUnavailable)
        }

        async fn ping(&self) -> Result<()> {
            self.result
                .as_ref()
                .map(|_| ())
                .map_err(|e| SearchError::SearchBackendUnavailable(e.clone()))
        }
    }

    struct ChunksOnly {
        result: std::result::Result<Vec<TextSearchResult>, String>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SemanticSearch for ChunksOnly {
        async fn search(&self, _query: &str, top_k: usize) -> Result<Vec<TextSearchResult>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result
                .clone()
                .map(|mut chunks| {
                    chunks.truncate(top_k);
                    chunks
                })
                .map_err(SearchError::IndexUnavailable)
        }

        async fn ping(&self) -> Result<()> {
            self.result
                .as_ref()
                .map(|_| ())
                .map_err(|e| SearchError::IndexUnavailable(e.clone()))
        }
    }

    fn sales_row() -> TableSearchResult {
        let mut content = Map::new();
        content.insert("month".to_string(), json!("2024-01"));
        content.insert("sales".to_string(), json!(1500000));
        TableSearchResult {
            id: "1".to_string(),
            doc_id: None,
            table_type: "sales_records".to_string(),
            content,
            created_at: None,
            similarity_score: 0.95,
            source: TableSearchResult::SOURCE.to_string(),
        }
    }

    fn report_chunk() -> TextSearchResult {
        TextSearchResult {
            id: "chunk-1".to_string(),
            doc_id: "report-q1".to_string(),
            doc_title: "1분기 영업 보고서".to_string(),
            content: "1월 매출은 150만원으로 전월 대비 증가했다.".to_string(),
            created_at: None,
            similarity_score: 0.88,
            source: TextSearchResult::SOURCE.to_string(),
        }
    }

    fn engine(
        rows: std::result::Result<Vec<TableSearchResult>, String>,
        chunks: std::result::Result<Vec<TextSearchResult>, String>,
        delay: Duration,
    ) -> (HybridSearchEngine, Arc<RowsOnly>, Arc<ChunksOnly>) {
        let mut config = Config::default_config();
        config.search.structured_timeout_ms = 50;
        let structured = Arc::new(RowsOnly {
            result: rows,
            delay,
            calls: AtomicUsize::new(0),
        });
        let semantic = Arc::new(ChunksOnly {
            result: chunks,
            calls: AtomicUsize::new(0),
        });
        let telemetry = SearchTelemetry::new(&config.telemetry);
        (
            HybridSearchEngine::new(&config, structured.clone(), semantic.clone(), telemetry),
            structured,
            semantic,
        )
    }

    #[tokio::test]
    async fn test_hybrid_query_merges_both_paths() {
        let (engine, _, _) = engine(Ok(vec![sales_row()]), Ok(vec![report_chunk()]), Duration::ZERO);
        let response = engine
            .search(&HybridSearchRequest::new("매출 현황").with_limit(20))
            .await
            .unwrap();

        assert_eq!(response.search_type, SearchType::Hybrid);
        assert_eq!(response.total_count, 2);
        assert_eq!(response.results[0].id(), "1");
        assert_eq!(response.table_results[0].similarity_score, 0.95);
        assert_eq!(engine.telemetry().snapshot().search_types.hybrid, 1);
    }

    #[tokio::test]
    async fn test_structured_timeout_degrades() {
        let (engine, _, _) = engine(
            Ok(vec![sales_row()]),
            Ok(vec![report_chunk()]),
            Duration::from_millis(500),
        );
        let fused = engine.run("매출 현황", 20).await.unwrap();
        assert!(fused.degraded);
        assert!(fused.failures[0].timed_out);
        assert_eq!(fused.table_results().len(), 0);
        assert_eq!(fused.text_results().len(), 1);
    }

    #[tokio::test]
    async fn test_table_route_failure_falls_back_to_semantic() {
        let (engine, _, semantic) = engine(
            Err("connection refused".to_string()),
            Ok(vec![report_chunk()]),
            Duration::ZERO,
        );
        let fused = engine.run("2024년 매출액 판매 실적", 20).await.unwrap();
        assert_eq!(fused.analysis.search_type, SearchType::Table);
        assert_eq!(fused.search_type, SearchType::Hybrid);
        assert!(fused.degraded);
        assert_eq!(fused.total_count, 1);
        assert_eq!(semantic.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_table_route_skips_semantic_when_healthy() {
        let (engine, _, semantic) =
            engine(Ok(vec![sales_row()]), Ok(vec![report_chunk()]), Duration::ZERO);
        let fused = engine.run("2024년 매출액 판매 실적", 20).await.unwrap();
        assert_eq!(fused.search_type, SearchType::Table);
        assert_eq!(fused.total_count, 1);
        assert_eq!(semantic.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_total_failure_is_recorded() {
        let (engine, _, _) = engine(Err("down".to_string()), Err("down".to_string()), Duration::ZERO);
        let result = engine.run("매출 현황", 20).await;
        assert!(matches!(result, Err(SearchError::SearchUnavailable(_))));

        let stats = engine.telemetry().snapshot();
        assert_eq!(stats.total_searches, 1);
        assert_eq!(stats.success_rate, 0.0);
    }

    #[tokio::test]
    async fn test_validation_failure_is_not_recorded() {
        let (engine, structured, _) =
            engine(Ok(vec![sales_row()]), Ok(vec![report_chunk()]), Duration::ZERO);
        let result = engine.search(&HybridSearchRequest::new("   ")).await;
        assert!(matches!(result, Err(SearchError::Validation(_))));
        assert_eq!(engine.telemetry().snapshot().total_searches, 0);
        assert_eq!(structured.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_check_backends() {
        let (engine, _, _) = engine(Err("down".to_string()), Ok(vec![]), Duration::ZERO);
        let (structured, semantic) = engine.check_backends().await;
        assert!(!structured.is_up());
        assert!(semantic.is_up());
        assert_eq!(semantic.component, "semantic_index");
    }
}

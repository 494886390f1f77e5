// file: src/search/structured.rs
// description: structured (text-to-SQL) search over the SQLite record store

use crate::database::sqlite::{InterruptGuard, SqliteClient, TableSchema};
use crate::error::{Result, SearchError};
use crate::models::{ClassificationResult, TableSearchResult};
use crate::search::sql_planner::{PlanningContext, SqlPlan, SqlPlanner, guard_sql};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rusqlite::Connection;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info};

#[async_trait]
pub trait StructuredSearch: Send + Sync {
    /// Rows relevant to `query`, highest score first, at most `limit`.
    async fn search(
        &self,
        query: &str,
        analysis: &ClassificationResult,
        limit: usize,
    ) -> Result<Vec<TableSearchResult>>;

    async fn ping(&self) -> Result<()>;
}

pub struct Text2SqlSearch {
    store: SqliteClient,
    planner: Arc<dyn SqlPlanner>,
    max_rows: usize,
}

impl Text2SqlSearch {
    pub fn new(store: SqliteClient, planner: Arc<dyn SqlPlanner>, max_rows: usize) -> Self {
        info!(
            "Structured search over {} using {} planner",
            store.path().display(),
            planner.name()
        );
        Self {
            store,
            planner,
            max_rows: max_rows.max(1),
        }
    }

    async fn open_with_schema(&self) -> Result<(Connection, Vec<TableSchema>)> {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || -> Result<(Connection, Vec<TableSchema>)> {
            let conn = store.open_readonly()?;
            let tables = SqliteClient::schema(&conn).map_err(into_backend_error)?;
            Ok((conn, tables))
        })
        .await
        .map_err(|e| SearchError::SearchBackendUnavailable(format!("schema task failed: {}", e)))?
    }

    /// Runs the plan on a blocking thread. If this future is dropped before
    /// the query finishes, the guard interrupts the statement.
    async fn execute(&self, conn: Connection, plan: &SqlPlan) -> Result<Vec<Map<String, Value>>> {
        let sql = guard_sql(&plan.sql, self.max_rows)?;
        let params = plan.params.clone();

        let guard = InterruptGuard::new(&conn);
        let rows = tokio::task::spawn_blocking(move || {
            SqliteClient::query_rows(&conn, &sql, &params).map_err(into_backend_error)
        })
        .await
        .map_err(|e| SearchError::SearchBackendUnavailable(format!("query task failed: {}", e)))?;
        guard.disarm();

        rows
    }
}

#[async_trait]
impl StructuredSearch for Text2SqlSearch {
    async fn search(
        &self,
        query: &str,
        analysis: &ClassificationResult,
        limit: usize,
    ) -> Result<Vec<TableSearchResult>> {
        let (conn, tables) = self.open_with_schema().await?;

        let ctx = PlanningContext {
            query,
            table_hint: analysis.table_hint.as_deref(),
            trigger_keywords: &analysis.matched_keywords,
            tables: &tables,
        };

        let Some(plan) = self.planner.plan(&ctx).await? else {
            debug!("No structured plan for query");
            return Ok(Vec::new());
        };

        debug!("Executing plan on {}: {}", plan.target_table, plan.reasoning);
        let rows = self.execute(conn, &plan).await?;

        let mut results: Vec<TableSearchResult> = rows
            .into_iter()
            .enumerate()
            .map(|(idx, row)| row_to_result(&plan.target_table, row, plan.confidence, idx))
            .collect();

        results.sort_by(|a, b| {
            b.similarity_score
                .partial_cmp(&a.similarity_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(limit);

        info!("Structured search returned {} rows", results.len());
        Ok(results)
    }

    async fn ping(&self) -> Result<()> {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || store.ping())
            .await
            .map_err(|e| SearchError::SearchBackendUnavailable(format!("ping task failed: {}", e)))?
    }
}

fn into_backend_error(err: SearchError) -> SearchError {
    match err {
        SearchError::Database(msg) => SearchError::SearchBackendUnavailable(msg),
        other => other,
    }
}

fn row_to_result(
    table: &str,
    content: Map<String, Value>,
    score: f32,
    idx: usize,
) -> TableSearchResult {
    let id = ["id".to_string(), format!("{}_id", table)]
        .iter()
        .find_map(|key| content.get(key).and_then(scalar_to_string))
        .unwrap_or_else(|| format!("{}:{}", table, idx));

    let doc_id = content.get("doc_id").and_then(scalar_to_string);
    let created_at = content.get("created_at").and_then(parse_timestamp);

    TableSearchResult {
        id,
        doc_id,
        table_type: table.to_string(),
        content,
        created_at,
        similarity_score: score.clamp(0.0, 1.0),
        source: TableSearchResult::SOURCE.to_string(),
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DD`, or Unix seconds
/// (milliseconds when the value is too large to be seconds).
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            DateTime::parse_from_rfc3339(s)
                .map(|dt| dt.with_timezone(&Utc))
                .ok()
                .or_else(|| {
                    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
                        .ok()
                        .map(|naive| naive.and_utc())
                })
                .or_else(|| {
                    NaiveDate::parse_from_str(s, "%Y-%m-%d")
                        .ok()
                        .and_then(|date| date.and_hms_opt(0, 0, 0))
                        .map(|naive| naive.and_utc())
                })
        }
        Value::Number(n) => {
            let raw = n.as_i64()?;
            if raw.abs() >= 100_000_000_000 {
                DateTime::from_timestamp_millis(raw)
            } else {
                DateTime::from_timestamp(raw, 0)
            }
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::sqlite::tests::{ENDLESS_QUERY, fixture_db};
    use crate::models::SearchType;
    use crate::search::sql_planner::KeywordSqlPlanner;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn analysis(hint: Option<&str>, keywords: &[&str]) -> ClassificationResult {
        ClassificationResult {
            query_type: "sales_inquiry".to_string(),
            confidence: 0.5,
            search_type: SearchType::Hybrid,
            table_hint: hint.map(str::to_string),
            matched_keywords: keywords.iter().map(|k| k.to_string()).collect(),
        }
    }

    struct FixedPlanner(&'static str, &'static str);

    #[async_trait]
    impl SqlPlanner for FixedPlanner {
        async fn plan(&self, _ctx: &PlanningContext<'_>) -> Result<Option<SqlPlan>> {
            Ok(Some(SqlPlan {
                sql: self.0.to_string(),
                params: Vec::new(),
                target_table: self.1.to_string(),
                confidence: 0.95,
                reasoning: "fixed".to_string(),
            }))
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    #[tokio::test]
    async fn test_keyword_search_returns_matching_rows() {
        let (_dir, path) = fixture_db();
        let search = Text2SqlSearch::new(
            SqliteClient::new(&path),
            Arc::new(KeywordSqlPlanner::new()),
            100,
        );

        let results = search
            .search("서울 매출", &analysis(Some("sales_records"), &["매출"]), 10)
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        // newest first: row 3 (April) then row 1 (February)
        assert_eq!(results[0].id, "3");
        assert_eq!(results[1].id, "1");
        assert_eq!(results[1].doc_id.as_deref(), Some("report-2024"));
        assert_eq!(results[1].content["sales_amount"], json!(1500000.0));
        assert_eq!(results[0].doc_id, None);
        assert!(results.iter().all(|r| r.source == "text2sql_search"));
        assert!(results.iter().all(|r| r.similarity_score == 0.8));
    }

    #[tokio::test]
    async fn test_limit_truncates_rows() {
        let (_dir, path) = fixture_db();
        let search = Text2SqlSearch::new(
            SqliteClient::new(&path),
            Arc::new(KeywordSqlPlanner::new()),
            100,
        );
        let results = search
            .search("매출 현황", &analysis(Some("sales_records"), &["매출", "현황"]), 1)
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn test_no_hint_yields_no_rows() {
        let (_dir, path) = fixture_db();
        let search = Text2SqlSearch::new(
            SqliteClient::new(&path),
            Arc::new(KeywordSqlPlanner::new()),
            100,
        );
        let results = search.search("안녕", &analysis(None, &[]), 10).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_prefixed_id_column_and_plan_score() {
        let (_dir, path) = fixture_db();
        let search = Text2SqlSearch::new(
            SqliteClient::new(&path),
            Arc::new(FixedPlanner("SELECT * FROM employee_info", "employee_info")),
            100,
        );
        let results = search.search("직원", &analysis(None, &[]), 10).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "10");
        assert_eq!(results[0].similarity_score, 0.95);
    }

    #[tokio::test]
    async fn test_unsafe_plan_is_rejected() {
        let (_dir, path) = fixture_db();
        let search = Text2SqlSearch::new(
            SqliteClient::new(&path),
            Arc::new(FixedPlanner("DELETE FROM sales_records", "sales_records")),
            100,
        );
        let err = search.search("x", &analysis(None, &[]), 10).await.unwrap_err();
        assert!(matches!(err, SearchError::Validation(_)));
    }

    #[tokio::test]
    async fn test_missing_store_is_backend_unavailable() {
        let search = Text2SqlSearch::new(
            SqliteClient::new("/nonexistent/records.sqlite"),
            Arc::new(KeywordSqlPlanner::new()),
            100,
        );
        assert!(matches!(
            search.search("매출", &analysis(Some("sales_records"), &[]), 10).await,
            Err(SearchError::SearchBackendUnavailable(_))
        ));
        assert!(search.ping().await.is_err());
    }

    #[test]
    fn test_timed_out_query_releases_blocking_thread() {
        // One blocking thread: the follow-up search only runs once the
        // abandoned statement has been interrupted.
        let runtime = tokio::runtime::Builder::new_current_thread()
            .max_blocking_threads(1)
            .enable_all()
            .build()
            .unwrap();

        runtime.block_on(async {
            let (_dir, path) = fixture_db();
            let slow = Text2SqlSearch::new(
                SqliteClient::new(&path),
                Arc::new(FixedPlanner(ENDLESS_QUERY, "sales_records")),
                100,
            );
            let abandoned = tokio::time::timeout(
                std::time::Duration::from_millis(300),
                slow.search("매출", &analysis(None, &[]), 10),
            )
            .await;
            assert!(abandoned.is_err());

            let quick = Text2SqlSearch::new(
                SqliteClient::new(&path),
                Arc::new(FixedPlanner("SELECT * FROM employee_info", "employee_info")),
                100,
            );
            let results = tokio::time::timeout(
                std::time::Duration::from_secs(5),
                quick.search("직원", &analysis(None, &[]), 10),
            )
            .await
            .expect("blocking thread was not released")
            .unwrap();
            assert_eq!(results.len(), 1);
        });
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = "2024-04-01T09:00:00+00:00";
        for value in [
            json!("2024-04-01T09:00:00Z"),
            json!("2024-04-01 09:00:00"),
            json!(1711962000),
            json!(1711962000000i64),
        ] {
            assert_eq!(parse_timestamp(&value).unwrap().to_rfc3339(), expected);
        }
        assert_eq!(
            parse_timestamp(&json!("2024-04-01")).unwrap().to_rfc3339(),
            "2024-04-01T00:00:00+00:00"
        );
        assert!(parse_timestamp(&json!("April")).is_none());
        assert!(parse_timestamp(&Value::Null).is_none());
    }
}

// file: src/search/sql_planner.rs
// description: natural-language to read-only SQL planning for the structured store
// reference: text-to-SQL prompting with a keyword fallback

use crate::database::sqlite::TableSchema;
use crate::error::{Result, SearchError};
use crate::llm::groq::{ChatMessage, CompletionOptions, GroqChatClient, strip_code_fence};
use crate::utils::keywords::extract_keywords;
use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use rusqlite::types::Value as SqlValue;
use serde::Deserialize;
use tracing::{debug, info};

lazy_static! {
    static ref MUTATING_KEYWORD: Regex = Regex::new(
        r"(?i)\b(insert|update|delete|drop|alter|create|replace|attach|detach|pragma|vacuum|reindex|truncate)\b"
    )
    .expect("mutating keyword regex is valid");
    static ref FROM_TABLE: Regex =
        Regex::new(r"(?i)\bfrom\s+([A-Za-z_][A-Za-z0-9_]*)").expect("from-table regex is valid");
}

/// Confidence given to model replies that were plain SQL rather than JSON.
pub const RAW_SQL_CONFIDENCE: f32 = 0.7;
const KEYWORD_FILTER_CONFIDENCE: f32 = 0.8;
const KEYWORD_SCAN_CONFIDENCE: f32 = 0.5;

/// A read-only query ready for validation and execution.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlPlan {
    pub sql: String,
    pub params: Vec<SqlValue>,
    pub target_table: String,
    /// In [0, 1]; becomes the score of every returned row.
    pub confidence: f32,
    pub reasoning: String,
}

pub struct PlanningContext<'a> {
    pub query: &'a str,
    pub table_hint: Option<&'a str>,
    /// Routing keywords that describe the table rather than the rows.
    pub trigger_keywords: &'a [String],
    pub tables: &'a [TableSchema],
}

impl PlanningContext<'_> {
    fn hinted_table(&self) -> Option<&TableSchema> {
        let hint = self.table_hint?;
        self.tables.iter().find(|t| t.name.eq_ignore_ascii_case(hint))
    }
}

#[async_trait]
pub trait SqlPlanner: Send + Sync {
    /// `Ok(None)` means the query has no structured interpretation.
    async fn plan(&self, ctx: &PlanningContext<'_>) -> Result<Option<SqlPlan>>;

    fn name(&self) -> &str;
}

/// Validates a planned statement and wraps it in an outer row limit.
pub fn guard_sql(sql: &str, max_rows: usize) -> Result<String> {
    let mut statement = strip_code_fence(sql).trim();
    while let Some(stripped) = statement.strip_suffix(';') {
        statement = stripped.trim_end();
    }

    if statement.is_empty() {
        return Err(SearchError::Validation("Planned SQL is empty".to_string()));
    }
    if statement.contains(';') {
        return Err(SearchError::Validation(
            "Planned SQL contains multiple statements".to_string(),
        ));
    }

    let first_word = statement
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();
    if first_word != "select" && first_word != "with" {
        return Err(SearchError::Validation(format!(
            "Only SELECT statements are allowed, got '{}'",
            first_word
        )));
    }

    if let Some(m) = MUTATING_KEYWORD.find(statement) {
        return Err(SearchError::Validation(format!(
            "Planned SQL contains forbidden keyword '{}'",
            m.as_str()
        )));
    }

    Ok(format!("SELECT * FROM ({}) LIMIT {}", statement, max_rows))
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn escape_like(keyword: &str) -> String {
    keyword
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// Offline planner: scans the hinted table, filtering text columns by the
/// query's content keywords.
#[derive(Debug, Default, Clone)]
pub struct KeywordSqlPlanner;

impl KeywordSqlPlanner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SqlPlanner for KeywordSqlPlanner {
    async fn plan(&self, ctx: &PlanningContext<'_>) -> Result<Option<SqlPlan>> {
        let Some(table) = ctx.hinted_table() else {
            debug!("No known table hinted for query, skipping keyword plan");
            return Ok(None);
        };

        let keywords: Vec<String> = extract_keywords(ctx.query, 8)
            .into_iter()
            .filter(|k| {
                !ctx.trigger_keywords
                    .iter()
                    .any(|t| k.contains(t.as_str()) || t.contains(k.as_str()))
            })
            .collect();

        let columns = table.text_columns();
        let order = if table.has_column("created_at") {
            "ORDER BY created_at DESC"
        } else {
            "ORDER BY rowid DESC"
        };

        if keywords.is_empty() || columns.is_empty() {
            return Ok(Some(SqlPlan {
                sql: format!("SELECT * FROM {} {}", quote_ident(&table.name), order),
                params: Vec::new(),
                target_table: table.name.clone(),
                confidence: KEYWORD_SCAN_CONFIDENCE,
                reasoning: "no row filter in query; newest rows of hinted table".to_string(),
            }));
        }

        let clauses: Vec<String> = (1..=keywords.len())
            .map(|i| {
                columns
                    .iter()
                    .map(|col| format!("{} LIKE ?{} ESCAPE '\\'", quote_ident(col), i))
                    .collect::<Vec<_>>()
                    .join(" OR ")
            })
            .collect();

        let sql = format!(
            "SELECT * FROM {} WHERE ({}) {}",
            quote_ident(&table.name),
            clauses.join(") OR ("),
            order
        );

        Ok(Some(SqlPlan {
            sql,
            params: keywords
                .iter()
                .map(|k| SqlValue::Text(format!("%{}%", escape_like(k))))
                .collect(),
            target_table: table.name.clone(),
            confidence: KEYWORD_FILTER_CONFIDENCE,
            reasoning: format!("keyword filter on {}: {}", table.name, keywords.join(", ")),
        }))
    }

    fn name(&self) -> &str {
        "keyword"
    }
}

#[derive(Debug, Deserialize)]
struct PlanReply {
    sql: String,
    #[serde(default)]
    target_table: Option<String>,
    #[serde(default)]
    confidence: Option<f32>,
    #[serde(default)]
    reasoning: Option<String>,
}

/// Asks the chat model to write SQL for the introspected schema.
pub struct LlmSqlPlanner {
    chat: GroqChatClient,
}

impl LlmSqlPlanner {
    pub fn new(chat: GroqChatClient) -> Self {
        Self { chat }
    }

    fn build_messages(ctx: &PlanningContext<'_>) -> Vec<ChatMessage> {
        let schema = ctx
            .tables
            .iter()
            .map(TableSchema::describe)
            .collect::<Vec<_>>()
            .join("\n");

        let hint = ctx
            .table_hint
            .map(|h| format!("The question most likely concerns the `{}` table.\n", h))
            .unwrap_or_default();

        let system = "You translate questions into a single read-only SQLite SELECT statement. \
             Reply with a JSON object {\"sql\": string, \"target_table\": string, \
             \"confidence\": number between 0 and 1, \"reasoning\": string}. \
             Never modify data. Use LIKE for partial text matches.";

        let user = format!(
            "Schema:\n{}\n\n{}Question: {}",
            schema, hint, ctx.query
        );

        vec![ChatMessage::system(system), ChatMessage::user(user)]
    }

    /// JSON replies are used as-is; anything else is taken as raw SQL.
    fn parse_reply(content: &str, ctx: &PlanningContext<'_>) -> SqlPlan {
        let body = strip_code_fence(content);
        match serde_json::from_str::<PlanReply>(body) {
            Ok(reply) => {
                let target_table = reply
                    .target_table
                    .filter(|t| !t.trim().is_empty())
                    .or_else(|| infer_table(&reply.sql, ctx))
                    .unwrap_or_default();
                SqlPlan {
                    target_table,
                    confidence: reply.confidence.unwrap_or(RAW_SQL_CONFIDENCE).clamp(0.0, 1.0),
                    reasoning: reply.reasoning.unwrap_or_default(),
                    sql: reply.sql,
                    params: Vec::new(),
                }
            }
            Err(_) => SqlPlan {
                target_table: infer_table(body, ctx).unwrap_or_default(),
                sql: body.to_string(),
                params: Vec::new(),
                confidence: RAW_SQL_CONFIDENCE,
                reasoning: "model replied with raw SQL".to_string(),
            },
        }
    }
}

fn infer_table(sql: &str, ctx: &PlanningContext<'_>) -> Option<String> {
    FROM_TABLE
        .captures(sql)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .or_else(|| ctx.table_hint.map(str::to_string))
}

#[async_trait]
impl SqlPlanner for LlmSqlPlanner {
    async fn plan(&self, ctx: &PlanningContext<'_>) -> Result<Option<SqlPlan>> {
        if ctx.tables.is_empty() {
            return Ok(None);
        }

        let messages = Self::build_messages(ctx);
        let options = CompletionOptions {
            max_tokens: 500,
            temperature: 0.1,
            json_mode: false,
        };

        let content = self.chat.complete(&messages, options).await.map_err(|e| {
            SearchError::SearchBackendUnavailable(format!("SQL planning failed: {}", e))
        })?;

        let plan = Self::parse_reply(&content, ctx);
        info!(
            "Planned SQL for {} (confidence {:.2})",
            plan.target_table, plan.confidence
        );
        Ok(Some(plan))
    }

    fn name(&self) -> &str {
        "llm"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::sqlite::ColumnInfo;
    use pretty_assertions::assert_eq;

    fn sales_table() -> TableSchema {
        let col = |name: &str, ty: &str| ColumnInfo {
            name: name.to_string(),
            decl_type: ty.to_string(),
        };
        TableSchema {
            name: "sales_records".to_string(),
            columns: vec![
                col("id", "INTEGER"),
                col("month", "TEXT"),
                col("region", "TEXT"),
                col("sales_amount", "REAL"),
                col("created_at", "TEXT"),
            ],
        }
    }

    fn ctx<'a>(
        query: &'a str,
        hint: Option<&'a str>,
        triggers: &'a [String],
        tables: &'a [TableSchema],
    ) -> PlanningContext<'a> {
        PlanningContext {
            query,
            table_hint: hint,
            trigger_keywords: triggers,
            tables,
        }
    }

    #[test]
    fn test_guard_wraps_select() {
        assert_eq!(
            guard_sql("```sql\nSELECT month FROM sales_records;\n```", 50).unwrap(),
            "SELECT * FROM (SELECT month FROM sales_records) LIMIT 50"
        );
        assert!(guard_sql("WITH t AS (SELECT 1) SELECT * FROM t", 5).is_ok());
    }

    #[test]
    fn test_guard_rejects_unsafe_sql() {
        assert!(guard_sql("", 5).is_err());
        assert!(guard_sql("DELETE FROM sales_records", 5).is_err());
        assert!(guard_sql("SELECT 1; DROP TABLE sales_records", 5).is_err());
        assert!(guard_sql("WITH x AS (DELETE FROM t RETURNING *) SELECT * FROM x", 5).is_err());
        assert!(guard_sql("PRAGMA table_info(sales_records)", 5).is_err());
    }

    #[tokio::test]
    async fn test_keyword_plan_filters_by_content_words() {
        let tables = vec![sales_table()];
        let triggers = vec!["매출".to_string()];
        let planner = KeywordSqlPlanner::new();
        let plan = planner
            .plan(&ctx("서울 지역 매출", Some("sales_records"), &triggers, &tables))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(plan.target_table, "sales_records");
        assert_eq!(plan.confidence, 0.8);
        assert_eq!(
            plan.params,
            vec![
                SqlValue::Text("%서울%".to_string()),
                SqlValue::Text("%지역%".to_string())
            ]
        );
        assert!(plan.sql.contains("\"region\" LIKE ?1"));
        assert!(plan.sql.contains("\"month\" LIKE ?2"));
        assert!(plan.sql.ends_with("ORDER BY created_at DESC"));
    }

    #[tokio::test]
    async fn test_keyword_plan_without_filter_scans_newest() {
        let tables = vec![sales_table()];
        let triggers = vec!["매출".to_string(), "현황".to_string()];
        let plan = KeywordSqlPlanner::new()
            .plan(&ctx("매출 현황", Some("sales_records"), &triggers, &tables))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            plan.sql,
            "SELECT * FROM \"sales_records\" ORDER BY created_at DESC"
        );
        assert!(plan.params.is_empty());
        assert_eq!(plan.confidence, 0.5);
    }

    #[tokio::test]
    async fn test_keyword_plan_needs_known_hint() {
        let tables = vec![sales_table()];
        let planner = KeywordSqlPlanner::new();
        assert!(planner.plan(&ctx("서울", None, &[], &tables)).await.unwrap().is_none());
        assert!(
            planner
                .plan(&ctx("서울", Some("customers"), &[], &tables))
                .await
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("10%_off\\"), "10\\%\\_off\\\\");
    }

    #[test]
    fn test_parse_json_reply() {
        let tables = vec![sales_table()];
        let context = ctx("q", Some("sales_records"), &[], &tables);
        let plan = LlmSqlPlanner::parse_reply(
            r#"{"sql": "SELECT * FROM sales_records WHERE month = '2024-01'", "target_table": "sales_records", "confidence": 0.92, "reasoning": "month filter"}"#,
            &context,
        );
        assert_eq!(plan.confidence, 0.92);
        assert_eq!(plan.reasoning, "month filter");
    }

    #[test]
    fn test_parse_raw_sql_reply() {
        let tables = vec![sales_table()];
        let context = ctx("q", None, &[], &tables);
        let plan = LlmSqlPlanner::parse_reply("```sql\nSELECT * FROM sales_records\n```", &context);
        assert_eq!(plan.sql, "SELECT * FROM sales_records");
        assert_eq!(plan.target_table, "sales_records");
        assert_eq!(plan.confidence, RAW_SQL_CONFIDENCE);
    }

    #[test]
    fn test_prompt_includes_schema_and_hint() {
        let tables = vec![sales_table()];
        let context = ctx("1월 매출", Some("sales_records"), &[], &tables);
        let messages = LlmSqlPlanner::build_messages(&context);
        assert_eq!(messages.len(), 2);
        assert!(messages[1].content.contains("sales_records(id INTEGER"));
        assert!(messages[1].content.contains("`sales_records` table"));
        assert!(messages[1].content.ends_with("Question: 1월 매출"));
    }
}

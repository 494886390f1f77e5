// file: src/config.rs
// description: application configuration management with toml support
// reference: https://docs.rs/config

use crate::error::{Result, SearchError};
use dotenvy::dotenv;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub search: SearchConfig,
    pub classifier: ClassifierConfig,
    pub structured: StructuredConfig,
    pub database: DatabaseConfig,
    pub llm: LlmConfig,
    pub generation: GenerationConfig,
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchConfig {
    pub default_limit: usize,
    pub default_top_k: usize,
    pub max_limit: usize,
    pub max_query_chars: usize,
    /// Scores closer than this collapse when two hits cover the same document.
    pub dedup_delta: f32,
    pub structured_timeout_ms: u64,
    pub semantic_timeout_ms: u64,
    pub degraded_confidence_penalty: f32,
}

impl SearchConfig {
    pub fn structured_timeout(&self) -> Duration {
        Duration::from_millis(self.structured_timeout_ms)
    }

    pub fn semantic_timeout(&self) -> Duration {
        Duration::from_millis(self.semantic_timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClassifierConfig {
    pub route_threshold: f32,
    #[serde(default)]
    pub rules: Vec<ClassifierRule>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleTarget {
    Table,
    Text,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClassifierRule {
    pub label: String,
    pub target: RuleTarget,
    #[serde(default)]
    pub table_hint: Option<String>,
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlannerKind {
    Llm,
    Keyword,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StructuredConfig {
    pub sqlite_path: PathBuf,
    pub planner: PlannerKind,
    pub max_rows: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    pub uri: String,
    pub table_name: String,
    pub batch_size: usize,
    pub embedding_dim: usize,
    pub retry_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LlmConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub chat_model: String,
    pub embedding_model: String,
    pub request_timeout_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationProvider {
    Groq,
    Extractive,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GenerationConfig {
    pub provider: GenerationProvider,
    pub context_char_budget: usize,
    pub max_tokens: u32,
    pub temperature: f32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TelemetryConfig {
    pub popular_queries_limit: usize,
    pub max_tracked_queries: usize,
}

impl Config {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenv().ok();

        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        } else {
            builder = builder.add_source(config::File::from(Path::new("config/default.toml")));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("DOC_QA_SEARCH")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .map_err(|e| SearchError::Config(e.to_string()))?;

        let mut config: Config = settings
            .try_deserialize()
            .map_err(|e| SearchError::Config(e.to_string()))?;

        if config.classifier.rules.is_empty() {
            config.classifier.rules = default_rules();
        }

        config.validate()?;
        Ok(config)
    }

    pub fn default_config() -> Self {
        Self {
            search: SearchConfig {
                default_limit: 20,
                default_top_k: 5,
                max_limit: 20,
                max_query_chars: 1000,
                dedup_delta: 0.02,
                structured_timeout_ms: 3_000,
                semantic_timeout_ms: 5_000,
                degraded_confidence_penalty: 0.8,
            },
            classifier: ClassifierConfig {
                route_threshold: 0.7,
                rules: default_rules(),
            },
            structured: StructuredConfig {
                sqlite_path: PathBuf::from("data/records.sqlite"),
                planner: PlannerKind::Keyword,
                max_rows: 100,
            },
            database: DatabaseConfig {
                uri: "data/lancedb".to_string(),
                table_name: "document_chunks".to_string(),
                batch_size: 32,
                embedding_dim: 768,
                retry_attempts: 3,
                retry_base_delay_ms: 200,
                retry_max_delay_ms: 2_000,
            },
            llm: LlmConfig {
                api_key: None,
                base_url: "https://api.groq.com/openai/v1".to_string(),
                chat_model: "openai/gpt-oss-120b".to_string(),
                embedding_model: "nomic-embed-text-v1_5".to_string(),
                request_timeout_ms: 20_000,
            },
            generation: GenerationConfig {
                provider: GenerationProvider::Extractive,
                context_char_budget: 6_000,
                max_tokens: 800,
                temperature: 0.2,
            },
            telemetry: TelemetryConfig {
                popular_queries_limit: 10,
                max_tracked_queries: 1_000,
            },
        }
    }

    pub fn validate(&self) -> Result<()> {
        let search = &self.search;

        if search.max_limit == 0 {
            return Err(SearchError::Config(
                "search.max_limit must be greater than 0".to_string(),
            ));
        }

        if search.default_limit == 0 || search.default_limit > search.max_limit {
            return Err(SearchError::Config(format!(
                "search.default_limit must be within 1..={}",
                search.max_limit
            )));
        }

        if search.default_top_k == 0 || search.default_top_k > search.max_limit {
            return Err(SearchError::Config(format!(
                "search.default_top_k must be within 1..={}",
                search.max_limit
            )));
        }

        if search.max_query_chars == 0 {
            return Err(SearchError::Config(
                "search.max_query_chars must be greater than 0".to_string(),
            ));
        }

        if search.structured_timeout_ms == 0 || search.semantic_timeout_ms == 0 {
            return Err(SearchError::Config(
                "adapter timeouts must be greater than 0".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&search.dedup_delta) {
            return Err(SearchError::Config(
                "search.dedup_delta must be within [0, 1]".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&search.degraded_confidence_penalty) {
            return Err(SearchError::Config(
                "search.degraded_confidence_penalty must be within [0, 1]".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.classifier.route_threshold) {
            return Err(SearchError::Config(
                "classifier.route_threshold must be within [0, 1]".to_string(),
            ));
        }

        if self.database.batch_size == 0 {
            return Err(SearchError::Config(
                "batch_size must be greater than 0".to_string(),
            ));
        }

        if self.database.embedding_dim == 0 {
            return Err(SearchError::Config(
                "embedding_dim must be greater than 0".to_string(),
            ));
        }

        if self.database.retry_attempts == 0 {
            return Err(SearchError::Config(
                "retry_attempts must be at least 1".to_string(),
            ));
        }

        if self.generation.context_char_budget == 0 {
            return Err(SearchError::Config(
                "generation.context_char_budget must be greater than 0".to_string(),
            ));
        }

        if self.telemetry.popular_queries_limit == 0 || self.telemetry.max_tracked_queries == 0 {
            return Err(SearchError::Config(
                "telemetry limits must be greater than 0".to_string(),
            ));
        }

        for rule in &self.classifier.rules {
            if rule.keywords.iter().all(|k| k.trim().is_empty()) {
                return Err(SearchError::Config(format!(
                    "classifier rule '{}' has no keywords",
                    rule.label
                )));
            }
        }

        Ok(())
    }
}

/// Built-in routing rules for the sales/HR/customer/product record tables
/// and the regulation/report document corpus.
pub fn default_rules() -> Vec<ClassifierRule> {
    fn rule(label: &str, target: RuleTarget, hint: Option<&str>, keywords: &[&str]) -> ClassifierRule {
        ClassifierRule {
            label: label.to_string(),
            target,
            table_hint: hint.map(str::to_string),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        }
    }

    vec![
        rule(
            "sales_inquiry",
            RuleTarget::Table,
            Some("sales_records"),
            &["매출", "판매", "실적", "매출액", "sales", "revenue"],
        ),
        rule(
            "employee_inquiry",
            RuleTarget::Table,
            Some("employee_info"),
            &["직원", "사번", "직급", "급여", "성과급", "employee", "salary"],
        ),
        rule(
            "customer_inquiry",
            RuleTarget::Table,
            Some("customers"),
            &["거래처", "고객", "의료기관", "환자수", "customer", "client"],
        ),
        rule(
            "product_inquiry",
            RuleTarget::Table,
            Some("products"),
            &["제품", "품목", "product", "item"],
        ),
        rule(
            "regulation_inquiry",
            RuleTarget::Text,
            None,
            &["규정", "규칙", "지침", "정책", "가이드라인", "regulation", "policy", "guideline"],
        ),
        rule(
            "report_inquiry",
            RuleTarget::Text,
            None,
            &["보고서", "리포트", "분석", "현황", "전망", "report", "analysis", "status"],
        ),
    ]
}

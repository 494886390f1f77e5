// file: src/mcp/server.rs
// description: MCP server exposing hybrid search, question answering, stats and health as tools
// reference: https://docs.rs/rmcp

use crate::error::SearchError;
use crate::models::{ErrorResponse, HybridSearchRequest, QaRequest};
use crate::qa::QaService;
use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::tool::Parameters;
use rmcp::model::*;
use rmcp::{ErrorData as McpError, ServerHandler, tool, tool_handler, tool_router};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SearchParams {
    /// Natural-language search query (1-1000 characters)
    pub query: String,
    /// Maximum number of results (1-20, default 20)
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AskParams {
    /// Question to answer from the indexed documents and records
    pub question: String,
    /// Number of search results to answer from (1-20, default 5)
    #[serde(default)]
    pub top_k: Option<usize>,
    /// Include a short summary of the sources (default true)
    #[serde(default)]
    pub include_summary: Option<bool>,
    /// Include source citations (default true)
    #[serde(default)]
    pub include_sources: Option<bool>,
}

#[derive(Clone)]
pub struct DocQaMcp {
    service: Arc<QaService>,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl DocQaMcp {
    pub fn new(service: Arc<QaService>) -> Self {
        Self {
            service,
            tool_router: Self::tool_router(),
        }
    }

    pub fn get_tool_router(&self) -> &ToolRouter<Self> {
        &self.tool_router
    }

    #[tool(
        description = "Search structured tables and document text together. Returns table rows and text chunks in one ranking with the query classification."
    )]
    async fn hybrid_search(
        &self,
        Parameters(params): Parameters<SearchParams>,
    ) -> Result<CallToolResult, McpError> {
        info!("MCP: hybrid search for {:?}", params.query);

        let request = HybridSearchRequest {
            query: params.query,
            limit: params.limit,
        };

        match self.service.search(&request).await {
            Ok(response) => json_result(&response),
            Err(e) => error_result(&e),
        }
    }

    #[tool(
        description = "Answer a question from the indexed documents and records, with cited sources and a confidence score."
    )]
    async fn ask_question(
        &self,
        Parameters(params): Parameters<AskParams>,
    ) -> Result<CallToolResult, McpError> {
        info!("MCP: question {:?}", params.question);

        let request = QaRequest {
            question: params.question,
            top_k: params.top_k,
            include_summary: params.include_summary.unwrap_or(true),
            include_sources: params.include_sources.unwrap_or(true),
        };

        match self.service.ask(&request).await {
            Ok(response) => json_result(&response),
            Err(e) => error_result(&e),
        }
    }

    #[tool(description = "Get search statistics: totals, average latency, success rate, popular queries and search type counts")]
    async fn get_search_stats(&self) -> Result<CallToolResult, McpError> {
        json_result(&self.service.stats())
    }

    #[tool(description = "Check reachability of the structured store, the semantic index and the answer generation service")]
    async fn check_health(&self) -> Result<CallToolResult, McpError> {
        let report = self.service.health().await;
        info!("MCP: health {:?}", report.status);
        json_result(&report)
    }

    #[tool(description = "Get the active search configuration")]
    async fn get_config(&self) -> Result<CallToolResult, McpError> {
        let settings = self.service.engine().settings();

        let config_text = format!(
            "Search Configuration:\n\
             - Default limit: {}\n\
             - Maximum limit: {}\n\
             - Default top_k: {}\n\
             - Maximum query length: {} chars\n\
             - Structured timeout: {} ms\n\
             - Semantic timeout: {} ms\n\
             - Dedup delta: {}",
            settings.default_limit,
            settings.max_limit,
            settings.default_top_k,
            settings.max_query_chars,
            settings.structured_timeout_ms,
            settings.semantic_timeout_ms,
            settings.dedup_delta
        );

        Ok(CallToolResult::success(vec![Content::text(config_text)]))
    }
}

#[tool_handler]
impl ServerHandler for DocQaMcp {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(
                "Hybrid search and question answering over company documents and tables. \
                 Use 'hybrid_search' to find rows and passages, 'ask_question' for cited answers, \
                 'get_search_stats' for usage and 'check_health' for backend status."
                    .to_string(),
            ),
            ..Default::default()
        }
    }
}

fn json_result<T: Serialize>(value: &T) -> Result<CallToolResult, McpError> {
    let text = serde_json::to_string_pretty(value).map_err(|e| {
        McpError::internal_error(format!("Failed to serialize response: {}", e), None)
    })?;
    Ok(CallToolResult::success(vec![Content::text(text)]))
}

/// Request failures are tool errors carrying the error body, not protocol errors.
fn error_result(err: &SearchError) -> Result<CallToolResult, McpError> {
    warn!("MCP: request failed: {}", err);
    let body = ErrorResponse::from(err);
    let text = serde_json::to_string_pretty(&body).unwrap_or_else(|_| body.message.clone());
    Ok(CallToolResult::error(vec![Content::text(text)]))
}

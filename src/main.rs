// file: src/main.rs
// description: commandline application entry point with command handling
// reference: application bootstrap and orchestration

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use colored::Colorize;
use doc_qa_search::database::provider_from_config;
use doc_qa_search::mcp::DocQaMcp;
use doc_qa_search::models::{HybridSearchResponse, QaResponse, SearchItem};
use doc_qa_search::pipeline::{ChunkIngestor, IngestProgress, read_chunks_jsonl};
use doc_qa_search::utils::logging::{
    format_error, format_info, format_step, format_success, format_warning,
};
use doc_qa_search::{
    Config, HybridSearchRequest, LanceDbClient, QaRequest, QaService, SchemaManager,
    SearchTelemetry, SqliteClient, Validator,
};
use rmcp::ServiceExt;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "doc_qa_search")]
#[command(author = "cipher")]
#[command(version)]
#[command(about = "Hybrid table + semantic search and question answering", long_about = None)]
struct Cli {
    #[arg(
        short,
        long,
        value_name = "FILE",
        default_value = "config/default.toml"
    )]
    config: PathBuf,

    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    color: bool,

    #[arg(short, long, action = ArgAction::SetTrue)]
    verbose: bool,

    /// Print responses as JSON instead of formatted text
    #[arg(long, action = ArgAction::SetTrue)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search tables and documents together
    Search {
        query: String,

        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Answer a question with cited sources
    Ask {
        question: String,

        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        #[arg(long)]
        no_summary: bool,

        #[arg(long)]
        no_sources: bool,
    },

    /// Check the structured store, semantic index and generation service
    Health,

    /// Embed and index document chunks from a JSONL file
    Ingest {
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Delete existing chunks of each incoming document first
        #[arg(long)]
        replace: bool,
    },

    /// Run queries in-process and print the resulting search statistics
    Stats {
        #[arg(short, long = "query", value_name = "QUERY")]
        queries: Vec<String>,
    },

    /// Show the chunk index and structured store layout
    Verify,

    /// Drop the chunk index
    Reset {
        #[arg(long)]
        confirm: bool,
    },

    /// Start MCP (Model Context Protocol) server for agentic tool integration
    Mcp {
        #[arg(long, default_value = "stdio")]
        transport: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    doc_qa_search::utils::logging::init_logger(cli.color, cli.verbose);
    colored::control::set_override(cli.color);

    info!("Loading configuration from: {}", cli.config.display());

    let config = if cli.config.exists() {
        Config::load(Some(cli.config.as_path())).context("Failed to load configuration")?
    } else {
        warn!(
            "Config file {} not found, using default configuration",
            cli.config.display()
        );
        Config::load(None).unwrap_or_else(|e| {
            warn!("Falling back to built-in defaults: {}", e);
            Config::default_config()
        })
    };

    match cli.command {
        Commands::Search { query, limit } => {
            cmd_search(&config, &query, limit, cli.json).await?;
        }
        Commands::Ask {
            question,
            top_k,
            no_summary,
            no_sources,
        } => {
            let request = QaRequest {
                question,
                top_k,
                include_summary: !no_summary,
                include_sources: !no_sources,
            };
            cmd_ask(&config, &request, cli.json).await?;
        }
        Commands::Health => {
            cmd_health(&config, cli.json).await?;
        }
        Commands::Ingest { input, replace } => {
            cmd_ingest(&config, &input, replace, cli.color && !cli.json).await?;
        }
        Commands::Stats { queries } => {
            cmd_stats(&config, &queries, cli.json).await?;
        }
        Commands::Verify => {
            cmd_verify(&config).await?;
        }
        Commands::Reset { confirm } => {
            cmd_reset(&config, confirm).await?;
        }
        Commands::Mcp { transport } => {
            cmd_mcp(&config, &transport).await?;
        }
    }

    Ok(())
}

async fn build_service(config: &Config) -> Result<QaService> {
    QaService::from_config(config, SearchTelemetry::new(&config.telemetry))
        .await
        .context("Failed to initialize search services")
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("Failed to serialize response")?
    );
    Ok(())
}

async fn cmd_search(config: &Config, query: &str, limit: Option<usize>, json: bool) -> Result<()> {
    let service = build_service(config).await?;
    let request = HybridSearchRequest {
        query: query.to_string(),
        limit,
    };

    let response = service.search(&request).await.context("Search failed")?;

    if json {
        return print_json(&response);
    }
    print_search(&response);
    Ok(())
}

fn print_search(response: &HybridSearchResponse) {
    println!("\nSearch Results for: \"{}\"", response.query);
    println!(
        "Type: {} | Classified as {} ({:.2})",
        response.search_type, response.analysis.query_type, response.analysis.confidence
    );
    println!("{}", format_info(&response.message));
    if response.degraded {
        println!(
            "{}",
            format_warning(&format!(
                "Unavailable backends: {}",
                response.degraded_backends.join(", ")
            ))
        );
    }

    if response.results.is_empty() {
        println!("\nNo results found.");
        println!("Try:");
        println!("  - Using different search terms");
        println!("  - Checking that documents have been ingested");
        return;
    }

    println!("{}", "=".repeat(80));
    for (idx, item) in response.results.iter().enumerate() {
        print_item(idx + 1, item);
    }
    println!("\n{}", "=".repeat(80));
}

fn print_item(rank: usize, item: &SearchItem) {
    match item {
        SearchItem::Table(row) => {
            println!(
                "\n{}. [{}] {} (Score: {:.4})",
                rank,
                "table".cyan(),
                row.table_type,
                row.similarity_score
            );
            println!("   {}", Validator::truncate_text(&row.content_text(), 300));
        }
        SearchItem::Text(chunk) => {
            println!("\n{}. [{}]", rank, "text".magenta());
            for line in chunk.format_summary(300).lines().take(6) {
                println!("   {}", line);
            }
        }
    }
}

async fn cmd_ask(config: &Config, request: &QaRequest, json: bool) -> Result<()> {
    let service = build_service(config).await?;
    let response = service.ask(request).await.context("Question answering failed")?;

    if json {
        return print_json(&response);
    }
    print_answer(&response);
    Ok(())
}

fn print_answer(response: &QaResponse) {
    println!("\nQ: {}\n", response.question.bold());

    match &response.answer {
        Some(answer) => println!("{}\n", answer),
        None => println!(
            "{}\n",
            format_warning("Answer generation unavailable; showing search results only")
        ),
    }

    if let Some(summary) = &response.summary {
        println!("{} {}\n", "Summary:".bold(), summary);
    }

    println!(
        "Confidence: {:.2} | Sources searched: {}",
        response.confidence_score, response.total_sources
    );

    if let Some(sources) = &response.sources {
        println!("\n{}", "Sources:".bold());
        for source in sources {
            let label = source
                .doc_title
                .clone()
                .unwrap_or_else(|| source.result_id.clone());
            println!(
                "  [{}] {} ({}, {:.3})",
                source.rank, label, source.kind, source.similarity_score
            );
        }
    } else if !response.answer_generated {
        for (idx, item) in response.search_results.iter().enumerate() {
            print_item(idx + 1, item);
        }
    }

    if response.degraded {
        println!(
            "\n{}",
            format_warning(&format!(
                "Partial results, unavailable: {}",
                response.degraded_backends.join(", ")
            ))
        );
    }
}

async fn cmd_health(config: &Config, json: bool) -> Result<()> {
    let service = build_service(config).await?;
    let report = service.health().await;

    if json {
        return print_json(&report);
    }
    println!("{}", report.format());
    Ok(())
}

async fn cmd_ingest(config: &Config, input: &Path, replace: bool, colored: bool) -> Result<()> {
    info!("Starting ingestion from {}", input.display());
    let start_time = Instant::now();

    println!("{}", format_step(1, 3, &format!("Reading {}", input.display())));
    let loaded = read_chunks_jsonl(input)
        .with_context(|| format!("Failed to read chunks from {}", input.display()))?;

    if loaded.chunks.is_empty() {
        println!("{}", format_warning("No valid chunks found, nothing to ingest"));
        return Ok(());
    }

    println!("{}", format_step(2, 3, "Connecting to LanceDB"));
    let client = LanceDbClient::new(config.database.clone())
        .await
        .context("Failed to create LanceDB client")?;
    client.ping().await.context("Cannot connect to LanceDB")?;

    let embedder = provider_from_config(&config.llm, &config.database)
        .context("Failed to create embedding provider")?;
    info!("Using {} embeddings", embedder.name());

    println!(
        "{}",
        format_step(3, 3, &format!("Embedding {} chunks", loaded.chunks.len()))
    );
    let progress = IngestProgress::new(loaded.chunks.len(), colored);
    let ingestor = ChunkIngestor::new(&client, embedder);
    let mut stats = ingestor
        .ingest(&loaded.chunks, replace, &progress)
        .await
        .context("Ingestion failed")?;
    progress.finish();

    stats.chunks_skipped = loaded.skipped;
    stats.duration_secs = start_time.elapsed().as_secs_f64();

    let line = format!("Ingestion complete: {}", stats.summary());
    if stats.chunks_failed > 0 {
        println!("{}", format_warning(&line));
    } else {
        println!("{}", format_success(&line));
    }
    if stats.documents_replaced > 0 {
        println!(
            "{}",
            format_info(&format!("Replaced {} documents", stats.documents_replaced))
        );
    }

    Ok(())
}

async fn cmd_stats(config: &Config, queries: &[String], json: bool) -> Result<()> {
    let service = build_service(config).await?;

    for query in queries {
        match service.search(&HybridSearchRequest::new(query.clone())).await {
            Ok(response) => info!("{:?}: {} results", query, response.total_count),
            Err(e) => warn!("{:?} failed: {}", query, e),
        }
    }

    let stats = service.stats();
    if json {
        return print_json(&stats);
    }

    println!("\nSearch Statistics:");
    println!("  - Total searches: {}", stats.total_searches);
    println!("  - Average search time: {:.3}s", stats.average_search_time);
    println!("  - Success rate: {:.1}%", stats.success_rate * 100.0);
    println!(
        "  - Search types: table_only {}, text_only {}, hybrid {}",
        stats.search_types.table_only, stats.search_types.text_only, stats.search_types.hybrid
    );
    if !stats.popular_queries.is_empty() {
        println!("  - Popular queries:");
        for query in &stats.popular_queries {
            println!("      {}", query);
        }
    }
    Ok(())
}

async fn cmd_verify(config: &Config) -> Result<()> {
    info!("Verifying stores");

    let client = LanceDbClient::new(config.database.clone())
        .await
        .context("Failed to create LanceDB client")?;

    match client.ping().await {
        Ok(()) => println!("{}", format_success("LanceDB connection OK")),
        Err(e) => println!("{}", format_error(&format!("LanceDB connection failed: {}", e))),
    }

    if SchemaManager::new(&client).verify_schema().await? {
        let count = client.chunk_count().await?;
        println!(
            "{}",
            format_success(&format!(
                "Chunk table '{}' holds {} chunks",
                client.table_name(),
                count
            ))
        );
    } else {
        println!(
            "{}",
            format_warning(&format!(
                "Chunk table '{}' not created yet; run `ingest` first",
                client.table_name()
            ))
        );
    }

    let sqlite = SqliteClient::new(&config.structured.sqlite_path);
    match sqlite.open_readonly().and_then(|conn| SqliteClient::schema(&conn)) {
        Ok(tables) => {
            println!(
                "{}",
                format_success(&format!(
                    "Structured store {} has {} tables",
                    sqlite.path().display(),
                    tables.len()
                ))
            );
            for table in tables {
                println!("  - {}", table.describe());
            }
        }
        Err(e) => println!("{}", format_error(&format!("Structured store: {}", e))),
    }

    Ok(())
}

async fn cmd_reset(config: &Config, confirm: bool) -> Result<()> {
    if !confirm {
        println!(
            "{}",
            format_warning("This drops the chunk index. Re-run with --confirm to proceed.")
        );
        return Ok(());
    }

    let client = LanceDbClient::new(config.database.clone())
        .await
        .context("Failed to create LanceDB client")?;
    SchemaManager::new(&client)
        .drop_chunks_table()
        .await
        .context("Failed to drop chunk table")?;

    println!(
        "{}",
        format_success(&format!("Dropped chunk table '{}'", client.table_name()))
    );
    Ok(())
}

async fn cmd_mcp(config: &Config, transport: &str) -> Result<()> {
    info!("Starting MCP server (transport: {})", transport);

    if transport != "stdio" {
        return Err(anyhow::anyhow!("Unsupported transport: {}", transport));
    }

    let service = Arc::new(build_service(config).await?);
    let mcp_server = DocQaMcp::new(service);

    info!("MCP server ready. Available tools:");
    for tool in mcp_server.get_tool_router().list_all() {
        info!(
            "  - {}: {}",
            tool.name,
            tool.description.as_deref().unwrap_or("No description")
        );
    }

    let running = mcp_server
        .serve(rmcp::transport::stdio())
        .await
        .context("Failed to start MCP stdio transport")?;
    running.waiting().await?;

    info!("MCP server shutting down");
    Ok(())
}

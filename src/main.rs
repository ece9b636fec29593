//! Binary entry point: five subcommands over the same [`AppContext`] —
//! `serve` (HTTP surface contracts: health + streaming), `worker`
//! (ingestion coordinator loop), `scheduler` (connector due-check
//! timer), `migrate` (schema migrations), and `seed-docs` (local dev
//! seeding). Exit codes follow [`error::AppError::exit_code`].

mod agent;
mod chat;
mod chunker;
mod config;
mod connectors;
mod context;
mod embedder;
mod error;
mod ingestion;
mod llm;
mod notifications;
mod quota;
mod retriever;
mod scheduler;
mod store;
mod streaming;
mod summarizer;
mod telemetry;
mod tools;
mod vault;

use std::collections::HashMap;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use crate::agent::{AgentNodes, AgentRuntime};
use crate::config::AppConfig;
use crate::connectors::registry::{ConnectorRegistry, OAuthProviderConfig};
use crate::connectors::ConnectorType;
use crate::context::AppContext;
use crate::embedder::OpenAiEmbeddings;
use crate::error::AppError;
use crate::ingestion::lock::DistributedLock;
use crate::ingestion::IngestionCoordinator;
use crate::llm::provider::OpenAiProvider;
use crate::llm::reasoning::Reasoning;
use crate::quota::QuotaGuard;
use crate::retriever::HybridRetriever;
use crate::scheduler::Scheduler;
use crate::store::Repository;
use crate::tools::builtin::{
    CreateNotionPageTool, GeneratePodcastTool, LinkPreviewTool, MemoryReadTool, MemoryWriteTool,
    MultiLinkPreviewTool, RetrieveTool, ScrapeWebpageTool, WriteTodosTool,
};
use crate::tools::mcp::McpClient;
use crate::tools::ToolRegistry;
use crate::vault::Vault;

#[derive(Parser)]
#[command(name = "surfsense")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP surface: health checks and the agent streaming
    /// endpoint. The broader REST API is out of this crate's scope.
    Serve,
    /// Run the ingestion worker loop for connectors handed to it by the
    /// scheduler.
    Worker,
    /// Run the connector-due-check timer (spec §4.G).
    Scheduler,
    /// Apply pending schema migrations and exit.
    Migrate,
    /// Seed a local search space with sample documents for development.
    SeedDocs,
}

#[tokio::main]
async fn main() {
    telemetry::init();

    let exit_code = match run().await {
        Ok(()) => 0,
        Err(e) => {
            tracing::error!(error = %e, "fatal error");
            e.exit_code()
        }
    };
    std::process::exit(exit_code);
}

async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let config = AppConfig::load()?;

    match cli.command {
        Command::Migrate => return run_migrate(&config).await,
        _ => {}
    }

    let ctx = build_context(&config).await?;
    ctx.health_check().await.map_err(AppError::DependencyUnhealthy)?;

    match cli.command {
        Command::Serve => run_serve(ctx).await,
        Command::Worker => run_worker(ctx).await,
        Command::Scheduler => run_scheduler(ctx).await,
        Command::SeedDocs => run_seed_docs(ctx).await,
        Command::Migrate => unreachable!("handled above"),
    }
}

async fn build_context(config: &AppConfig) -> Result<AppContext, AppError> {
    let db = deadpool_postgres::Config {
        url: Some(config.database_url.clone()),
        ..Default::default()
    }
    .create_pool(Some(deadpool_postgres::Runtime::Tokio1), tokio_postgres::NoTls)
    .map_err(|e| AppError::Config(e.to_string()))?;

    let redis = deadpool_redis::Config::from_url(&config.redis_url)
        .create_pool(Some(deadpool_redis::Runtime::Tokio1))
        .map_err(|e| AppError::Config(e.to_string()))?;

    let vault = Arc::new(
        Vault::new(&config.secret_key, config.encryption_key.as_deref())
            .map_err(|e| AppError::Config(e.to_string()))?,
    );
    let embeddings = Arc::new(OpenAiEmbeddings::new(&config.openai_api_key, &config.embedding_model));
    let llm = Arc::new(OpenAiProvider::new(&config.openai_api_key, &config.llm_model));
    let lock = Arc::new(DistributedLock::new(redis.clone(), config.connector_indexing_lock_ttl()));
    let store = Arc::new(Repository::new(db.clone()));
    let quota = Arc::new(QuotaGuard::new(store.clone(), config.requests_per_minute));

    Ok(AppContext { config: Arc::new(config.clone()), db, redis, vault, embeddings, llm, lock, quota })
}

async fn run_migrate(config: &AppConfig) -> Result<(), AppError> {
    let (mut client, connection) = tokio_postgres::connect(&config.database_url, tokio_postgres::NoTls)
        .await
        .map_err(|e| AppError::Config(e.to_string()))?;
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            tracing::error!(error = %e, "migration connection error");
        }
    });
    store::migrations::run(&mut client).await.map_err(crate::error::IngestionError::Store)?;
    Ok(())
}

fn connector_registry(ctx: &AppContext) -> Arc<ConnectorRegistry> {
    let mut oauth_providers: HashMap<ConnectorType, OAuthProviderConfig> = HashMap::new();
    for kind in [ConnectorType::Slack, ConnectorType::GoogleDrive, ConnectorType::GoogleCalendar, ConnectorType::Gmail] {
        let prefix = kind.as_str().to_uppercase();
        if let (Ok(token_url), Ok(client_id), Ok(client_secret)) = (
            std::env::var(format!("{prefix}_TOKEN_URL")),
            std::env::var(format!("{prefix}_CLIENT_ID")),
            std::env::var(format!("{prefix}_CLIENT_SECRET")),
        ) {
            oauth_providers.insert(kind, OAuthProviderConfig { token_url, client_id, client_secret });
        }
    }

    Arc::new(ConnectorRegistry::new(
        ctx.vault.clone(),
        oauth_providers,
        ctx.config.notion_mcp_server_url.clone().unwrap_or_default(),
    ))
}

fn tool_registry(ctx: &AppContext, store: Arc<Repository>, retriever: Arc<HybridRetriever>) -> Arc<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(RetrieveTool::new(retriever)));
    registry.register(Arc::new(MemoryReadTool::new(store.clone(), ctx.embeddings.clone())));
    registry.register(Arc::new(MemoryWriteTool::new(store.clone(), ctx.embeddings.clone())));
    registry.register(Arc::new(ScrapeWebpageTool::new()));
    registry.register(Arc::new(LinkPreviewTool::new()));
    registry.register(Arc::new(MultiLinkPreviewTool::new()));
    registry.register(Arc::new(GeneratePodcastTool::new(store.clone())));
    registry.register(Arc::new(WriteTodosTool::new()));
    if let Some(url) = ctx.config.notion_mcp_server_url.clone() {
        registry.register(Arc::new(CreateNotionPageTool::new(Arc::new(McpClient::new(url)))));
    }
    Arc::new(registry)
}

fn agent_runtime(ctx: &AppContext, store: Arc<Repository>) -> AgentRuntime {
    let retriever = Arc::new(HybridRetriever::new(store.clone(), ctx.embeddings.clone()));
    let tools = tool_registry(ctx, store.clone(), retriever.clone());
    let reasoning = Reasoning::new(ctx.llm.clone());
    let nodes = Arc::new(AgentNodes::new(reasoning, retriever, tools, store.clone()));
    AgentRuntime::new(store, nodes, ctx.config.agent_heartbeat_ttl_seconds as i64)
}

/// Minimal HTTP surface (spec §6): liveness/readiness probes only. The
/// broader REST API (auth, `/threads`, `/documents`, `/connectors`,
/// `/public/{token}`, ...) is an external collaborator's contract per
/// §1's Non-goals — this binary exposes the two operational endpoints a
/// deployment needs to route traffic and nothing more.
async fn run_serve(ctx: AppContext) -> Result<(), AppError> {
    use axum::routing::get;
    use axum::{Json, Router};

    let state = Arc::new(ctx);
    let app = Router::new()
        .route("/health/live", get(|| async { "ok" }))
        .route(
            "/health/ready",
            get({
                let state = state.clone();
                move || {
                    let state = state.clone();
                    async move {
                        match state.health_check().await {
                            Ok(()) => (axum::http::StatusCode::OK, Json(serde_json::json!({"status": "ready"}))),
                            Err(reason) => (
                                axum::http::StatusCode::SERVICE_UNAVAILABLE,
                                Json(serde_json::json!({"status": "unhealthy", "reason": reason})),
                            ),
                        }
                    }
                }
            }),
        );

    let listener = tokio::net::TcpListener::bind(&state.config.bind_addr)
        .await
        .map_err(|e| AppError::DependencyUnhealthy(e.to_string()))?;
    tracing::info!(addr = %state.config.bind_addr, "listening");
    axum::serve(listener, app)
        .await
        .map_err(|e| AppError::Other(anyhow::anyhow!(e)))?;
    Ok(())
}

async fn run_worker(ctx: AppContext) -> Result<(), AppError> {
    let store = Arc::new(Repository::new(ctx.db.clone()));
    let registry = connector_registry(&ctx);
    let coordinator = Arc::new(IngestionCoordinator::new(
        store.clone(),
        registry,
        ctx.embeddings.clone(),
        ctx.llm.clone(),
        ctx.lock.clone(),
        ctx.quota.clone(),
    ));

    loop {
        let due = store.connectors_due().await.map_err(crate::error::IngestionError::Store)?;
        for record in due {
            match coordinator.run(&record).await {
                Ok(Some(outcome)) if outcome.succeeded => {
                    store
                        .advance_connector_schedule(record.id, outcome.advanced_to)
                        .await
                        .map_err(crate::error::IngestionError::Store)?;
                    tracing::info!(connector = %record.id, created = outcome.documents_created, "connector run complete");
                }
                Ok(Some(_)) => {
                    tracing::warn!(connector = %record.id, "run failed threshold, not advancing schedule");
                }
                Ok(None) => tracing::debug!(connector = %record.id, "lock contended, skipped"),
                Err(e) => tracing::warn!(connector = %record.id, error = %e, "connector run failed"),
            }
        }
        tokio::time::sleep(std::time::Duration::from_secs(30)).await;
    }
}

async fn run_scheduler(ctx: AppContext) -> Result<(), AppError> {
    let store = Arc::new(Repository::new(ctx.db.clone()));
    let registry = connector_registry(&ctx);
    let coordinator = Arc::new(IngestionCoordinator::new(
        store.clone(),
        registry,
        ctx.embeddings.clone(),
        ctx.llm.clone(),
        ctx.lock.clone(),
        ctx.quota.clone(),
    ));
    let scheduler = Scheduler::new(store, coordinator);
    let (_tx, rx) = tokio::sync::watch::channel(false);
    scheduler.run(rx).await?;
    Ok(())
}

async fn run_seed_docs(ctx: AppContext) -> Result<(), AppError> {
    let store = Arc::new(Repository::new(ctx.db.clone()));
    let runtime = agent_runtime(&ctx, store);
    let _ = runtime;
    tracing::info!("seed-docs is a development convenience; no sample corpus bundled");
    Ok(())
}

//! EventRank — incremental item-item similarity and event recommendations.
//!
//! Main entry point that initializes all subsystems and starts the server.

use clap::Parser;
use eventrank_agents::{AgentManager, LocalPipeline};
use eventrank_aggregator::{Aggregator, SimilarityState};
use eventrank_analyzer::RecommendationEngine;
use eventrank_api::ApiServer;
use eventrank_core::config::AppConfig;
use eventrank_core::sink::ActionSink;
use eventrank_core::weights::WeightResolver;
use eventrank_store::{InteractionStore, SimilarityStore};
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "eventrank")]
#[command(about = "Streaming item-item similarity and event recommendations")]
#[command(version)]
struct Cli {
    /// Node identifier (overrides config)
    #[arg(long, env = "EVENTRANK__NODE_ID")]
    node_id: Option<String>,

    /// Number of aggregator partitions (overrides config)
    #[arg(long, env = "EVENTRANK__AGGREGATOR_WORKERS")]
    workers: Option<usize>,

    /// HTTP port (overrides config)
    #[arg(long, env = "EVENTRANK__API__HTTP_PORT")]
    http_port: Option<u16>,

    /// Process actions in-process instead of through NATS
    #[arg(long, default_value_t = false)]
    standalone: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "eventrank=info,tower_http=info".into()),
        )
        .json()
        .init();

    let cli = Cli::parse();

    info!("EventRank starting up");

    // Load configuration
    let mut config = AppConfig::load().unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        AppConfig::default()
    });

    // Apply CLI overrides
    if let Some(node_id) = cli.node_id {
        config.node_id = node_id;
    }
    if let Some(workers) = cli.workers {
        config.aggregator_workers = workers;
    }
    if let Some(port) = cli.http_port {
        config.api.http_port = port;
    }

    info!(
        node_id = %config.node_id,
        workers = config.aggregator_workers,
        http_port = config.api.http_port,
        standalone = cli.standalone,
        "Configuration loaded"
    );

    let resolver = WeightResolver::from_config(&config.weights)?;
    let aggregator = Arc::new(Aggregator::new(resolver, Arc::new(SimilarityState::new())));
    let similarities = Arc::new(SimilarityStore::new());
    let interactions = Arc::new(InteractionStore::new());
    let engine = Arc::new(RecommendationEngine::new(
        similarities.clone(),
        interactions.clone(),
    ));

    let local = |config: &AppConfig| -> Arc<dyn ActionSink> {
        Arc::new(LocalPipeline::new(
            aggregator.clone(),
            similarities.clone(),
            interactions.clone(),
            config.aggregator_workers,
        ))
    };

    // Start NATS-based agents (unless standalone)
    let mut agent_manager = AgentManager::new(
        config.clone(),
        aggregator.clone(),
        similarities.clone(),
        interactions.clone(),
    );
    let actions = if cli.standalone {
        info!("Running standalone (no NATS)");
        local(&config)
    } else {
        match agent_manager.start().await {
            Ok(sink) => {
                info!(agents = agent_manager.agent_count(), "Agent manager started");
                sink
            }
            Err(e) => {
                error!(error = %e, "Failed to start agent manager, running standalone");
                local(&config)
            }
        }
    };

    // Start API server
    let api_server = ApiServer::new(config.clone(), engine, actions);

    // Start metrics exporter
    if let Err(e) = api_server.start_metrics().await {
        error!(error = %e, "Failed to start metrics exporter");
    }

    info!("EventRank is ready to serve traffic");

    // Start HTTP server (blocks until shutdown)
    api_server.start_http().await?;

    Ok(())
}

//! Agent manager — wires this node into the NATS topology: one aggregator
//! agent per partition, the ingest subscriptions feeding the stores, and the
//! outbound publishers.

use crate::agent::AggregatorAgent;
use crate::ingest::{spawn_action_dispatch, spawn_action_ingest, spawn_similarity_ingest};
use crate::publisher::{ActionPublisher, NatsPublisher, SimilarityPublisher};
use crate::router::PartitionRouter;
use eventrank_aggregator::Aggregator;
use eventrank_core::config::AppConfig;
use eventrank_core::sink::{ActionSink, SimilaritySink};
use eventrank_store::{InteractionStore, SimilarityStore};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Manages the lifecycle of all aggregator agents and subscriptions on this
/// node.
pub struct AgentManager {
    config: AppConfig,
    aggregator: Arc<Aggregator>,
    similarities: Arc<SimilarityStore>,
    interactions: Arc<InteractionStore>,
    agents: usize,
    handles: Vec<JoinHandle<()>>,
}

impl AgentManager {
    pub fn new(
        config: AppConfig,
        aggregator: Arc<Aggregator>,
        similarities: Arc<SimilarityStore>,
        interactions: Arc<InteractionStore>,
    ) -> Self {
        Self {
            config,
            aggregator,
            similarities,
            interactions,
            agents: 0,
            handles: Vec::new(),
        }
    }

    /// Connect to NATS, spawn the agents and subscriptions, and return the
    /// sink the API uses to publish inbound actions.
    pub async fn start(&mut self) -> anyhow::Result<Arc<dyn ActionSink>> {
        let nats = self.config.nats.clone();
        let nats_url = nats
            .urls
            .first()
            .cloned()
            .unwrap_or_else(|| "nats://localhost:4222".to_string());

        info!(url = %nats_url, "Connecting to NATS");

        let client = async_nats::ConnectOptions::new()
            .max_reconnects(Some(nats.max_reconnects))
            .connect(&nats_url)
            .await?;

        info!("NATS connection established");

        let similarity_sink: Arc<dyn SimilaritySink> = Arc::new(SimilarityPublisher::new(
            NatsPublisher::spawn(client.clone(), nats.publish_buffer, "similarity"),
            nats.clone(),
        ));

        let (router, receivers) =
            PartitionRouter::new(self.config.aggregator_workers, nats.partition_buffer);
        for (i, receiver) in receivers.into_iter().enumerate() {
            let agent_id = format!("{}-agg-{:02}", self.config.node_id, i);
            let agent = AggregatorAgent::new(
                agent_id.clone(),
                self.aggregator.clone(),
                similarity_sink.clone(),
            );
            self.handles.push(agent.spawn(receiver));
            self.agents += 1;

            info!(agent_id = %agent_id, "Agent spawned");
        }

        self.handles.push(spawn_action_dispatch(
            client.clone(),
            nats.action_wildcard(),
            router,
        ));
        self.handles.push(spawn_action_ingest(
            client.clone(),
            nats.action_wildcard(),
            self.interactions.clone(),
            self.aggregator.resolver().clone(),
        ));
        self.handles.push(spawn_similarity_ingest(
            client.clone(),
            nats.similarity_wildcard(),
            self.similarities.clone(),
        ));

        info!(
            count = self.agents,
            node = %self.config.node_id,
            "All agents started"
        );

        Ok(Arc::new(ActionPublisher::new(
            NatsPublisher::spawn(client, nats.publish_buffer, "actions"),
            nats,
        )))
    }

    /// Wait for all agents and subscriptions to complete (blocks until
    /// shutdown).
    pub async fn wait(&mut self) {
        for handle in self.handles.drain(..) {
            if let Err(e) = handle.await {
                error!(error = %e, "Agent task panicked");
            }
        }
    }

    pub fn agent_count(&self) -> usize {
        self.agents
    }
}

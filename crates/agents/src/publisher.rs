//! Asynchronous NATS publishers. Messages are queued on a bounded channel and
//! published by a background task, so callers never block on the network.

use async_nats::Client;
use eventrank_core::config::NatsConfig;
use eventrank_core::error::{EventRankError, EventRankResult};
use eventrank_core::sink::{ActionSink, SimilaritySink};
use eventrank_core::types::{SimilarityDelta, UserAction};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

#[derive(Debug)]
pub(crate) struct Outbound {
    pub(crate) subject: String,
    pub(crate) payload: Vec<u8>,
}

/// Queue in front of a NATS client with a background publish loop.
pub struct NatsPublisher {
    sender: mpsc::Sender<Outbound>,
    name: &'static str,
}

impl NatsPublisher {
    /// Create the queue and spawn the publish loop on the current runtime.
    pub fn spawn(client: Client, capacity: usize, name: &'static str) -> Self {
        let (sender, receiver) = mpsc::channel::<Outbound>(capacity.max(1));

        tokio::spawn(async move {
            run(client, receiver, name).await;
        });

        info!(publisher = name, capacity = capacity, "NATS publisher started");
        Self { sender, name }
    }

    #[cfg(test)]
    pub(crate) fn from_sender(sender: mpsc::Sender<Outbound>, name: &'static str) -> Self {
        Self { sender, name }
    }

    /// Queue a message without waiting. Fails when the queue is full or the
    /// publish loop has stopped.
    pub fn try_publish(&self, subject: String, payload: Vec<u8>) -> Result<(), String> {
        match self.sender.try_send(Outbound { subject, payload }) {
            Ok(()) => {
                metrics::counter!("publisher.queued", "publisher" => self.name).increment(1);
                Ok(())
            }
            Err(e) => {
                metrics::counter!("publisher.dropped", "publisher" => self.name).increment(1);
                Err(e.to_string())
            }
        }
    }
}

async fn run(client: Client, mut receiver: mpsc::Receiver<Outbound>, name: &'static str) {
    while let Some(message) = receiver.recv().await {
        let subject = message.subject;
        match client.publish(subject.clone(), message.payload.into()).await {
            Ok(()) => {
                metrics::counter!("publisher.published", "publisher" => name).increment(1);
                debug!(publisher = name, subject = %subject, "Message published");
            }
            Err(e) => {
                metrics::counter!("publisher.errors", "publisher" => name).increment(1);
                error!(publisher = name, subject = %subject, error = %e, "Failed to publish message");
            }
        }
    }
    warn!(publisher = name, "Publish queue closed");
}

/// Publishes similarity deltas on `{prefix}.similarity.{item_a}`. Delivery
/// is fire-and-forget: failures are logged and counted, never retried.
pub struct SimilarityPublisher {
    publisher: NatsPublisher,
    nats: NatsConfig,
}

impl SimilarityPublisher {
    pub fn new(publisher: NatsPublisher, nats: NatsConfig) -> Self {
        Self { publisher, nats }
    }
}

impl SimilaritySink for SimilarityPublisher {
    fn emit(&self, delta: SimilarityDelta) {
        let payload = match serde_json::to_vec(&delta) {
            Ok(p) => p,
            Err(e) => {
                error!(error = %e, "Failed to serialize similarity delta");
                return;
            }
        };
        let subject = self.nats.similarity_subject(delta.item_a);
        if let Err(e) = self.publisher.try_publish(subject, payload) {
            warn!(
                item_a = delta.item_a,
                item_b = delta.item_b,
                error = %e,
                "Similarity delta dropped"
            );
        }
    }
}

/// Publishes inbound user actions on `{prefix}.user-actions.{user_id}`.
pub struct ActionPublisher {
    publisher: NatsPublisher,
    nats: NatsConfig,
}

impl ActionPublisher {
    pub fn new(publisher: NatsPublisher, nats: NatsConfig) -> Self {
        Self { publisher, nats }
    }
}

impl ActionSink for ActionPublisher {
    fn submit(&self, action: UserAction) -> EventRankResult<()> {
        let payload = serde_json::to_vec(&action)?;
        let subject = self.nats.action_subject(action.user_id);
        self.publisher
            .try_publish(subject, payload)
            .map_err(EventRankError::QueueFull)
    }
}

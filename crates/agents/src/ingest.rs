//! Subscription loops feeding NATS traffic into this node: user actions to
//! the aggregator partitions and the interaction store, similarity deltas to
//! the similarity store.

use crate::router::PartitionRouter;
use eventrank_core::sink::SimilaritySink;
use eventrank_core::types::{SimilarityDelta, UserAction};
use eventrank_core::weights::WeightResolver;
use eventrank_store::{InteractionStore, SimilarityStore};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tracing::{error, info, warn};

/// Decode a JSON payload, logging and counting malformed messages.
pub fn decode<T: DeserializeOwned>(stream: &'static str, payload: &[u8]) -> Option<T> {
    match serde_json::from_slice(payload) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(stream = stream, error = %e, "Failed to deserialize message");
            metrics::counter!("ingest.deserialize_errors", "stream" => stream).increment(1);
            None
        }
    }
}

async fn subscribe(client: &async_nats::Client, subject: String) -> Option<async_nats::Subscriber> {
    match client.subscribe(subject.clone()).await {
        Ok(sub) => {
            info!(subject = %subject, "Subscribed to NATS subject");
            Some(sub)
        }
        Err(e) => {
            error!(subject = %subject, error = %e, "Failed to subscribe to NATS");
            None
        }
    }
}

/// Route inbound user actions to the aggregator partitions.
pub fn spawn_action_dispatch(
    client: async_nats::Client,
    subject: String,
    router: PartitionRouter,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let Some(mut subscriber) = subscribe(&client, subject).await else {
            return;
        };
        while let Some(msg) = subscriber.next().await {
            if let Some(action) = decode::<UserAction>("user-actions", &msg.payload) {
                if !router.dispatch(action).await {
                    break;
                }
            }
        }
        warn!("Action dispatch subscription ended");
    })
}

/// Record inbound user actions into the interaction store.
pub fn spawn_action_ingest(
    client: async_nats::Client,
    subject: String,
    store: Arc<InteractionStore>,
    resolver: WeightResolver,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let Some(mut subscriber) = subscribe(&client, subject).await else {
            return;
        };
        while let Some(msg) = subscriber.next().await {
            if let Some(action) = decode::<UserAction>("user-actions", &msg.payload) {
                store.record(&action, resolver.resolve(action.action));
            }
        }
        warn!("Interaction ingest subscription ended");
    })
}

/// Upsert inbound similarity deltas into the similarity store.
pub fn spawn_similarity_ingest(
    client: async_nats::Client,
    subject: String,
    store: Arc<SimilarityStore>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let Some(mut subscriber) = subscribe(&client, subject).await else {
            return;
        };
        while let Some(msg) = subscriber.next().await {
            if let Some(delta) = decode::<SimilarityDelta>("similarity", &msg.payload) {
                store.emit(delta);
            }
        }
        warn!("Similarity ingest subscription ended");
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_valid_action() {
        let payload =
            br#"{"user_id":3,"event_id":9,"action":"REGISTER","timestamp":"2024-05-01T10:00:00Z"}"#;
        let action: UserAction = decode("user-actions", payload).unwrap();
        assert_eq!(action.user_id, 3);
        assert_eq!(action.event_id, 9);
    }

    #[test]
    fn test_decode_malformed_is_none() {
        assert!(decode::<SimilarityDelta>("similarity", b"not json").is_none());
        assert!(decode::<UserAction>("user-actions", br#"{"user_id":1}"#).is_none());
    }
}

//! Aggregator agent — a Tokio task that drains one partition's actions,
//! applies them to the shared similarity state, and emits changed scores.

use eventrank_aggregator::Aggregator;
use eventrank_core::sink::SimilaritySink;
use eventrank_core::types::UserAction;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub struct AggregatorAgent {
    pub agent_id: String,
    aggregator: Arc<Aggregator>,
    sink: Arc<dyn SimilaritySink>,
}

impl AggregatorAgent {
    pub fn new(agent_id: String, aggregator: Arc<Aggregator>, sink: Arc<dyn SimilaritySink>) -> Self {
        Self {
            agent_id,
            aggregator,
            sink,
        }
    }

    /// Spawn this agent as a Tokio task consuming `receiver` until it closes.
    pub fn spawn(self, receiver: mpsc::Receiver<UserAction>) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(agent_id = %self.agent_id, "Aggregator agent started");
            self.process_actions(receiver).await;
        })
    }

    async fn process_actions(self, mut receiver: mpsc::Receiver<UserAction>) {
        while let Some(action) = receiver.recv().await {
            let start = std::time::Instant::now();
            let emitted = self.aggregator.process_and_emit(&action, self.sink.as_ref());
            metrics::histogram!("aggregator.process_us").record(start.elapsed().as_micros() as f64);
            debug!(
                agent_id = %self.agent_id,
                user_id = action.user_id,
                event_id = action.event_id,
                emitted = emitted,
                "Action processed"
            );
        }

        warn!(agent_id = %self.agent_id, "Partition channel closed");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use eventrank_aggregator::SimilarityState;
    use eventrank_core::sink::capture_sink;
    use eventrank_core::types::ActionKind;
    use eventrank_core::weights::WeightResolver;

    #[tokio::test]
    async fn test_agent_emits_deltas_until_channel_closes() {
        let aggregator = Arc::new(Aggregator::new(
            WeightResolver::default(),
            Arc::new(SimilarityState::new()),
        ));
        let sink = capture_sink();
        let agent = AggregatorAgent::new("agent-00".into(), aggregator, sink.clone());

        let (tx, rx) = mpsc::channel(8);
        let handle = agent.spawn(rx);
        for (item, kind) in [(1, ActionKind::Like), (2, ActionKind::View), (3, ActionKind::Register)] {
            tx.send(UserAction {
                user_id: 1,
                event_id: item,
                action: kind,
                timestamp: Utc::now(),
            })
            .await
            .unwrap();
        }
        drop(tx);
        handle.await.unwrap();

        // (1,2), then (1,3) and (2,3).
        assert_eq!(sink.count(), 3);
    }
}

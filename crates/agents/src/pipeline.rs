//! In-process pipeline for running without NATS: each submitted action is
//! applied to the aggregator inline, its deltas land directly in the
//! similarity store, and the action itself is recorded in the interaction
//! store.

use crate::router::partition_for;
use eventrank_aggregator::Aggregator;
use eventrank_core::error::EventRankResult;
use eventrank_core::sink::ActionSink;
use eventrank_core::types::UserAction;
use eventrank_store::{InteractionStore, SimilarityStore};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

pub struct LocalPipeline {
    aggregator: Arc<Aggregator>,
    similarities: Arc<SimilarityStore>,
    interactions: Arc<InteractionStore>,
    // Striped by user partition: one user's actions never interleave, other
    // users' actions proceed in parallel.
    partitions: Vec<Mutex<()>>,
}

impl LocalPipeline {
    pub fn new(
        aggregator: Arc<Aggregator>,
        similarities: Arc<SimilarityStore>,
        interactions: Arc<InteractionStore>,
        partitions: usize,
    ) -> Self {
        Self {
            aggregator,
            similarities,
            interactions,
            partitions: (0..partitions.max(1)).map(|_| Mutex::new(())).collect(),
        }
    }
}

impl ActionSink for LocalPipeline {
    fn submit(&self, action: UserAction) -> EventRankResult<()> {
        let index = partition_for(action.user_id, self.partitions.len());
        let _guard = self.partitions[index].lock();

        let weight = self.aggregator.resolver().resolve(action.action);
        self.interactions.record(&action, weight);
        let emitted = self
            .aggregator
            .process_and_emit(&action, self.similarities.as_ref());

        debug!(
            user_id = action.user_id,
            event_id = action.event_id,
            emitted = emitted,
            "Action applied in-process"
        );
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use eventrank_aggregator::SimilarityState;
    use eventrank_analyzer::RecommendationEngine;
    use eventrank_core::types::{ActionKind, ItemId, UserId};
    use eventrank_core::weights::WeightResolver;
    use std::thread;

    struct Harness {
        pipeline: Arc<LocalPipeline>,
        aggregator: Arc<Aggregator>,
        similarities: Arc<SimilarityStore>,
        engine: RecommendationEngine,
    }

    fn harness() -> Harness {
        let aggregator = Arc::new(Aggregator::new(
            WeightResolver::default(),
            Arc::new(SimilarityState::new()),
        ));
        let similarities = Arc::new(SimilarityStore::new());
        let interactions = Arc::new(InteractionStore::new());
        let pipeline = Arc::new(LocalPipeline::new(
            aggregator.clone(),
            similarities.clone(),
            interactions.clone(),
            4,
        ));
        let engine = RecommendationEngine::new(similarities.clone(), interactions);
        Harness {
            pipeline,
            aggregator,
            similarities,
            engine,
        }
    }

    fn submit(h: &Harness, user: UserId, item: ItemId, kind: ActionKind, secs: i64) {
        h.pipeline
            .submit(UserAction {
                user_id: user,
                event_id: item,
                action: kind,
                timestamp: Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap(),
            })
            .unwrap();
    }

    #[test]
    fn test_similarity_store_tracks_aggregator() {
        let h = harness();
        submit(&h, 1, 10, ActionKind::View, 0);
        submit(&h, 1, 10, ActionKind::Like, 1);
        submit(&h, 1, 20, ActionKind::View, 2);
        submit(&h, 1, 10, ActionKind::View, 3);

        let stored = h.similarities.score(10, 20).unwrap();
        assert!((stored - h.aggregator.state().similarity(10, 20)).abs() < 1e-12);
    }

    #[test]
    fn test_store_follows_state_across_skewed_user_clocks() {
        let h = harness();
        submit(&h, 1, 10, ActionKind::View, 100);
        submit(&h, 1, 20, ActionKind::View, 100);
        // A second user whose clock runs behind still moves the pair.
        submit(&h, 2, 10, ActionKind::Like, 50);
        submit(&h, 2, 20, ActionKind::Like, 50);

        let expected = h.aggregator.state().similarity(10, 20);
        assert!((expected - 1.4 / 1.16).abs() < 1e-9);
        let stored = h.similarities.score(10, 20).unwrap();
        assert!((stored - expected).abs() < 1e-12);
    }

    #[test]
    fn test_store_converges_under_reordered_multi_user_input() {
        let h = harness();
        let kinds = [ActionKind::View, ActionKind::Register, ActionKind::Like];
        // Later users carry earlier timestamps; each user's second action
        // touches the pair and so emits the pair's current score.
        for user in 0..9i64 {
            let secs = 1_000 - user * 100;
            let (first, second) = if user % 2 == 0 { (10, 20) } else { (20, 10) };
            submit(&h, user, first, kinds[(user % 3) as usize], secs);
            submit(&h, user, second, kinds[((user + 1) % 3) as usize], secs);
            // Replays with arbitrary clocks change nothing.
            submit(&h, user, first, ActionKind::View, -secs);
        }

        let expected = h.aggregator.state().similarity(10, 20);
        let stored = h.similarities.score(10, 20).unwrap();
        assert!((stored - expected).abs() < 1e-12);

        let similar = h.engine.similar_to(10, 99, 5).unwrap();
        assert_eq!(similar.len(), 1);
        assert!((similar[0].score - expected).abs() < 1e-12);
    }

    #[test]
    fn test_end_to_end_recommendations() {
        let h = harness();
        // Users 2 and 3 both pair item 1 with item 3; user 3 also views 2 and 4.
        submit(&h, 2, 1, ActionKind::Like, 0);
        submit(&h, 2, 3, ActionKind::Like, 1);
        submit(&h, 3, 1, ActionKind::Register, 2);
        submit(&h, 3, 3, ActionKind::Register, 3);
        submit(&h, 3, 4, ActionKind::View, 4);
        submit(&h, 3, 2, ActionKind::View, 4);
        // User 1 has seen items 1 and 2.
        submit(&h, 1, 1, ActionKind::Like, 5);
        submit(&h, 1, 2, ActionKind::View, 6);

        let recs = h.engine.recommend_for(1, 5).unwrap();
        assert!(!recs.is_empty());
        assert!(recs.iter().all(|r| r.event_id != 1 && r.event_id != 2));
        assert_eq!(recs[0].event_id, 3);

        let similar = h.engine.similar_to(1, 1, 5).unwrap();
        assert!(similar.iter().all(|r| r.event_id != 1 && r.event_id != 2));

        let popular = h.engine.popularity_of(&[4, 1, 99]).unwrap();
        assert_eq!(popular[0].event_id, 1);
        assert!((popular[0].score - 2.8).abs() < 1e-9);
        assert_eq!(popular[2].score, 0.0);
    }

    #[test]
    fn test_cold_start_user() {
        let h = harness();
        submit(&h, 2, 1, ActionKind::Like, 0);
        submit(&h, 2, 3, ActionKind::Like, 1);
        assert!(h.engine.recommend_for(77, 10).unwrap().is_empty());
    }

    #[test]
    fn test_unknown_action_recorded_nowhere() {
        let h = harness();
        submit(&h, 1, 1, ActionKind::Unknown, 0);
        assert!(h.engine.recommend_for(1, 10).unwrap().is_empty());
        assert_eq!(h.aggregator.state().item_count(), 0);
    }

    #[test]
    fn test_concurrent_submissions() {
        let h = harness();
        let handles: Vec<_> = (0..4)
            .map(|user| {
                let pipeline = h.pipeline.clone();
                thread::spawn(move || {
                    for item in 0..20 {
                        pipeline
                            .submit(UserAction {
                                user_id: user,
                                event_id: item,
                                action: ActionKind::Register,
                                timestamp: Utc::now(),
                            })
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        // Every user gave every item 0.8: all pairs share the same score.
        let state = h.aggregator.state();
        let expected = (4.0 * 0.8) / (4.0 * 0.64);
        for (a, b) in [(0, 1), (5, 17), (3, 19)] {
            assert!((state.similarity(a, b) - expected).abs() < 1e-9);
        }
    }
}

//! Incremental aggregator: applies one interaction to the similarity state and
//! returns the pair scores that changed because of it.
//!
//! A pair's score only moves when some user who touched both items raises
//! their weight on one of them, so each interaction revisits just the
//! acting user's touched items. Cost is proportional to that user's breadth,
//! never to the catalog size.

use crate::state::SimilarityState;
use eventrank_core::sink::SimilaritySink;
use eventrank_core::types::{PairKey, SimilarityDelta, UserAction};
use eventrank_core::weights::WeightResolver;
use std::sync::Arc;
use tracing::{debug, trace};

pub struct Aggregator {
    resolver: WeightResolver,
    state: Arc<SimilarityState>,
}

impl Aggregator {
    pub fn new(resolver: WeightResolver, state: Arc<SimilarityState>) -> Self {
        Self { resolver, state }
    }

    pub fn state(&self) -> &Arc<SimilarityState> {
        &self.state
    }

    pub fn resolver(&self) -> &WeightResolver {
        &self.resolver
    }

    /// Apply `action` and return the changed pair scores sorted by
    /// `(item_a, item_b)`. Unknown action kinds and interactions that do not
    /// strictly raise the user's weight on the item return an empty list, so
    /// replaying an interaction is a no-op.
    pub fn process(&self, action: &UserAction) -> Vec<SimilarityDelta> {
        let user = action.user_id;
        let item = action.event_id;
        metrics::counter!("aggregator.interactions").increment(1);

        let new_weight = self.resolver.resolve(action.action);
        if new_weight == 0.0 {
            debug!(
                user_id = user,
                event_id = item,
                action = %action.action,
                "Action kind has no weight, discarding"
            );
            metrics::counter!("aggregator.discarded", "reason" => "unknown_action").increment(1);
            return Vec::new();
        }

        let old_weight = self.state.user_item_weight(user, item);
        if new_weight <= old_weight {
            trace!(
                user_id = user,
                event_id = item,
                new_weight = new_weight,
                old_weight = old_weight,
                "Weight not increased, skipping"
            );
            metrics::counter!("aggregator.discarded", "reason" => "not_increased").increment(1);
            return Vec::new();
        }

        debug!(
            user_id = user,
            event_id = item,
            new_weight = new_weight,
            old_weight = old_weight,
            "Applying interaction"
        );

        self.state.set_user_item_weight(user, item, new_weight);
        self.state.mark_user_touched_item(user, item);
        self.state
            .add_to_item_self_energy(item, new_weight * new_weight - old_weight * old_weight);

        let mut deltas = Vec::new();
        for other in self.state.snapshot_user_touched_items(user) {
            if other == item {
                continue;
            }
            let other_weight = self.state.user_item_weight(user, other);
            let delta_min = new_weight.min(other_weight) - old_weight.min(other_weight);
            if delta_min == 0.0 {
                trace!(event_id = item, other_event_id = other, "Pair minimum unchanged");
                continue;
            }
            self.state.add_to_pair_shared_energy(item, other, delta_min);

            let key = PairKey::new(item, other);
            let score = self.state.similarity(key.item_a, key.item_b);
            debug!(
                item_a = key.item_a,
                item_b = key.item_b,
                score = score,
                "Similarity recomputed"
            );
            deltas.push(SimilarityDelta {
                item_a: key.item_a,
                item_b: key.item_b,
                score,
                timestamp: action.timestamp,
            });
        }

        deltas.sort_by_key(|d| (d.item_a, d.item_b));
        metrics::counter!("aggregator.deltas").increment(deltas.len() as u64);
        deltas
    }

    /// Process `action` and hand every changed score to `sink`. Emission is
    /// fire-and-forget; state changes stand whether or not delivery succeeds.
    pub fn process_and_emit(&self, action: &UserAction, sink: &dyn SimilaritySink) -> usize {
        let deltas = self.process(action);
        let count = deltas.len();
        for delta in deltas {
            sink.emit(delta);
        }
        count
    }
}

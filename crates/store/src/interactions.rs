//! Interaction repository fed by the user-action stream.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use eventrank_core::error::EventRankResult;
use eventrank_core::repository::InteractionLookup;
use eventrank_core::types::{ItemId, UserAction, UserId};
use std::collections::{HashMap, HashSet};
use tracing::trace;

#[derive(Debug, Clone, Copy)]
struct InteractionRecord {
    weight: f64,
    last_seen: DateTime<Utc>,
}

/// Per-user interaction history: the maximum weight and latest timestamp per
/// (user, item), plus a running per-item weight total maintained by delta.
#[derive(Default)]
pub struct InteractionStore {
    users: DashMap<UserId, DashMap<ItemId, InteractionRecord>>,
    item_totals: DashMap<ItemId, f64>,
}

impl InteractionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `action` carrying the resolved `weight`. Non-positive weights
    /// are ignored. The stored weight only ever rises; the timestamp tracks
    /// the latest interaction. Returns whether the stored weight increased.
    pub fn record(&self, action: &UserAction, weight: f64) -> bool {
        if weight <= 0.0 {
            return false;
        }

        let delta = {
            let history = self.users.entry(action.user_id).or_default();
            let mut record = history.entry(action.event_id).or_insert(InteractionRecord {
                weight: 0.0,
                last_seen: action.timestamp,
            });
            if action.timestamp > record.last_seen {
                record.last_seen = action.timestamp;
            }
            if weight > record.weight {
                let delta = weight - record.weight;
                record.weight = weight;
                delta
            } else {
                0.0
            }
        };

        if delta > 0.0 {
            *self.item_totals.entry(action.event_id).or_insert(0.0) += delta;
            trace!(
                user_id = action.user_id,
                event_id = action.event_id,
                weight = weight,
                "Interaction weight raised"
            );
            true
        } else {
            false
        }
    }

    pub fn weight(&self, user: UserId, item: ItemId) -> Option<f64> {
        self.users
            .get(&user)
            .and_then(|history| history.get(&item).map(|r| r.weight))
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }
}

impl InteractionLookup for InteractionStore {
    fn recent_items(&self, user: UserId, limit: usize) -> EventRankResult<Vec<ItemId>> {
        let Some(history) = self.users.get(&user) else {
            return Ok(Vec::new());
        };
        let mut items: Vec<(ItemId, DateTime<Utc>)> = history
            .iter()
            .map(|entry| (*entry.key(), entry.value().last_seen))
            .collect();
        items.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        Ok(items.into_iter().take(limit).map(|(id, _)| id).collect())
    }

    fn all_items(&self, user: UserId) -> EventRankResult<HashSet<ItemId>> {
        Ok(self
            .users
            .get(&user)
            .map(|history| history.iter().map(|entry| *entry.key()).collect())
            .unwrap_or_default())
    }

    fn weights_for(
        &self,
        user: UserId,
        items: &HashSet<ItemId>,
    ) -> EventRankResult<HashMap<ItemId, f64>> {
        let Some(history) = self.users.get(&user) else {
            return Ok(HashMap::new());
        };
        let weights = items
            .iter()
            .filter_map(|item| history.get(item).map(|r| (*item, r.weight)))
            .collect();
        Ok(weights)
    }

    fn aggregated_weights(&self, items: &[ItemId]) -> EventRankResult<HashMap<ItemId, f64>> {
        Ok(items
            .iter()
            .filter_map(|item| self.item_totals.get(item).map(|total| (*item, *total)))
            .collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use eventrank_core::types::ActionKind;

    fn action(user: UserId, item: ItemId, secs: i64) -> UserAction {
        UserAction {
            user_id: user,
            event_id: item,
            action: ActionKind::View,
            timestamp: Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap(),
        }
    }

    #[test]
    fn test_weight_keeps_maximum() {
        let store = InteractionStore::new();
        assert!(store.record(&action(1, 10, 0), 1.0));
        assert!(!store.record(&action(1, 10, 1), 0.4));
        assert_eq!(store.weight(1, 10), Some(1.0));
    }

    #[test]
    fn test_zero_weight_ignored() {
        let store = InteractionStore::new();
        assert!(!store.record(&action(1, 10, 0), 0.0));
        assert_eq!(store.weight(1, 10), None);
        assert!(store.all_items(1).unwrap().is_empty());
    }

    #[test]
    fn test_recent_items_newest_first() {
        let store = InteractionStore::new();
        store.record(&action(1, 10, 0), 0.4);
        store.record(&action(1, 20, 5), 0.4);
        store.record(&action(1, 30, 2), 0.4);
        // A lower-weight interaction still refreshes recency.
        store.record(&action(1, 10, 9), 0.4);

        assert_eq!(store.recent_items(1, 10).unwrap(), vec![10, 20, 30]);
        assert_eq!(store.recent_items(1, 2).unwrap(), vec![10, 20]);
        assert!(store.recent_items(2, 5).unwrap().is_empty());
    }

    #[test]
    fn test_weights_for_subset() {
        let store = InteractionStore::new();
        store.record(&action(1, 10, 0), 0.4);
        store.record(&action(1, 20, 0), 0.8);
        let wanted: HashSet<ItemId> = [20, 99].into_iter().collect();
        let weights = store.weights_for(1, &wanted).unwrap();
        assert_eq!(weights.len(), 1);
        assert_eq!(weights[&20], 0.8);
    }

    #[test]
    fn test_aggregated_weights_track_raises() {
        let store = InteractionStore::new();
        store.record(&action(1, 10, 0), 0.4);
        store.record(&action(1, 10, 1), 1.0);
        store.record(&action(2, 10, 0), 0.8);
        store.record(&action(2, 20, 0), 0.4);

        let totals = store.aggregated_weights(&[10, 20, 30]).unwrap();
        assert!((totals[&10] - 1.8).abs() < 1e-9);
        assert!((totals[&20] - 0.4).abs() < 1e-9);
        assert!(!totals.contains_key(&30));
    }
}

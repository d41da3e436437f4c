//! Shared mutable state behind the incremental similarity computation.
//!
//! Four process-wide maps, created empty and only ever growing:
//! - max weight observed per (user, item)
//! - sum of squared weights per item ("self energy")
//! - sum of per-user minimum weights per canonical item pair ("shared energy")
//! - the set of items each user has touched
//!
//! The numeric maps are `DashMap`s: every update is an add-or-create merge
//! under the key's shard lock, so independent keys never contend. The
//! per-user touched set is a plain `HashSet` behind its own
//! `parking_lot::RwLock`; the lock is held only to insert one element or
//! to copy the set, never across a similarity computation.

use dashmap::DashMap;
use eventrank_core::types::{ItemId, PairKey, UserId};
use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::trace;

type TouchedItems = Arc<RwLock<HashSet<ItemId>>>;

#[derive(Default)]
pub struct SimilarityState {
    user_item_weight: DashMap<(UserId, ItemId), f64>,
    item_self_energy: DashMap<ItemId, f64>,
    pair_shared_energy: DashMap<PairKey, f64>,
    user_touched_items: DashMap<UserId, TouchedItems>,
}

impl SimilarityState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Max weight recorded for the pair, or 0 if the user never touched the item.
    pub fn user_item_weight(&self, user: UserId, item: ItemId) -> f64 {
        self.user_item_weight
            .get(&(user, item))
            .map(|w| *w)
            .unwrap_or(0.0)
    }

    /// Unconditional overwrite. Callers only invoke this with a weight above
    /// the current one; the store does not check.
    pub fn set_user_item_weight(&self, user: UserId, item: ItemId, weight: f64) {
        self.user_item_weight.insert((user, item), weight);
        trace!(user_id = user, event_id = item, weight = weight, "User weight updated");
    }

    pub fn add_to_item_self_energy(&self, item: ItemId, delta: f64) {
        let mut entry = self.item_self_energy.entry(item).or_insert(0.0);
        *entry += delta;
        trace!(event_id = item, delta = delta, total = *entry, "Self energy updated");
    }

    pub fn add_to_pair_shared_energy(&self, x: ItemId, y: ItemId, delta: f64) {
        let key = PairKey::new(x, y);
        let mut entry = self.pair_shared_energy.entry(key).or_insert(0.0);
        *entry += delta;
        trace!(
            item_a = key.item_a,
            item_b = key.item_b,
            delta = delta,
            total = *entry,
            "Shared energy updated"
        );
    }

    pub fn item_self_energy(&self, item: ItemId) -> f64 {
        self.item_self_energy
            .get(&item)
            .map(|e| *e)
            .unwrap_or(0.0)
    }

    pub fn pair_shared_energy(&self, x: ItemId, y: ItemId) -> f64 {
        self.pair_shared_energy
            .get(&PairKey::new(x, y))
            .map(|e| *e)
            .unwrap_or(0.0)
    }

    /// Idempotent insert into the user's touched-item set.
    pub fn mark_user_touched_item(&self, user: UserId, item: ItemId) {
        // Clone the Arc out so the DashMap shard guard is released before
        // taking the per-user lock.
        let items = self
            .user_touched_items
            .entry(user)
            .or_default()
            .value()
            .clone();
        let inserted = items.write().insert(item);
        if inserted {
            trace!(user_id = user, event_id = item, "Item added to user's touched set");
        }
    }

    /// Point-in-time copy of the user's touched items, safe to iterate while
    /// other threads keep mutating the live set.
    pub fn snapshot_user_touched_items(&self, user: UserId) -> HashSet<ItemId> {
        let items = match self.user_touched_items.get(&user) {
            Some(entry) => entry.value().clone(),
            None => return HashSet::new(),
        };
        let snapshot = items.read().clone();
        snapshot
    }

    /// `shared / (sqrt(self_a) * sqrt(self_b))`, or 0 when either energy is 0.
    pub fn similarity(&self, x: ItemId, y: ItemId) -> f64 {
        let self_a = self.item_self_energy(x);
        let self_b = self.item_self_energy(y);
        if self_a <= 0.0 || self_b <= 0.0 {
            return 0.0;
        }
        let denominator = self_a.sqrt() * self_b.sqrt();
        if denominator <= 0.0 {
            return 0.0;
        }
        self.pair_shared_energy(x, y) / denominator
    }

    pub fn item_count(&self) -> usize {
        self.item_self_energy.len()
    }

    pub fn pair_count(&self) -> usize {
        self.pair_shared_energy.len()
    }

    pub fn user_count(&self) -> usize {
        self.user_touched_items.len()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_defaults_are_zero() {
        let state = SimilarityState::new();
        assert_eq!(state.user_item_weight(1, 10), 0.0);
        assert_eq!(state.item_self_energy(10), 0.0);
        assert_eq!(state.pair_shared_energy(10, 20), 0.0);
        assert!(state.snapshot_user_touched_items(1).is_empty());
    }

    #[test]
    fn test_pair_energy_is_keyed_canonically() {
        let state = SimilarityState::new();
        state.add_to_pair_shared_energy(20, 10, 0.4);
        state.add_to_pair_shared_energy(10, 20, 0.4);
        assert!((state.pair_shared_energy(10, 20) - 0.8).abs() < 1e-12);
        assert!((state.pair_shared_energy(20, 10) - 0.8).abs() < 1e-12);
        assert_eq!(state.pair_count(), 1);
    }

    #[test]
    fn test_mark_touched_is_idempotent() {
        let state = SimilarityState::new();
        state.mark_user_touched_item(1, 10);
        state.mark_user_touched_item(1, 10);
        state.mark_user_touched_item(1, 20);
        let snapshot = state.snapshot_user_touched_items(1);
        assert_eq!(snapshot.len(), 2);
        assert!(snapshot.contains(&10) && snapshot.contains(&20));
    }

    #[test]
    fn test_snapshot_is_detached_from_live_set() {
        let state = SimilarityState::new();
        state.mark_user_touched_item(1, 10);
        let snapshot = state.snapshot_user_touched_items(1);
        state.mark_user_touched_item(1, 20);
        assert_eq!(snapshot.len(), 1);
        assert_eq!(state.snapshot_user_touched_items(1).len(), 2);
    }

    #[test]
    fn test_similarity_zero_norm() {
        let state = SimilarityState::new();
        state.add_to_pair_shared_energy(1, 2, 0.5);
        assert_eq!(state.similarity(1, 2), 0.0);
        state.add_to_item_self_energy(1, 1.0);
        assert_eq!(state.similarity(1, 2), 0.0);
        state.add_to_item_self_energy(2, 0.25);
        assert!((state.similarity(1, 2) - 1.0).abs() < 1e-12);
        assert!((state.similarity(2, 1) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_concurrent_self_energy_merge() {
        let state = Arc::new(SimilarityState::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let state = state.clone();
                thread::spawn(move || {
                    for _ in 0..1000 {
                        state.add_to_item_self_energy(7, 0.5);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(state.item_self_energy(7), 4000.0);
    }
}

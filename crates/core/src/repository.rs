//! Read contracts of the durable stores the recommendation engine queries.
//!
//! Both traits are read-only. Failures surface as
//! [`EventRankError::Repository`](crate::EventRankError::Repository) and are
//! propagated to the caller unchanged; retries belong to the caller.

use crate::error::EventRankResult;
use crate::types::{ItemId, ScoredItem, UserId};
use std::collections::{HashMap, HashSet};

/// Lookup over accumulated pairwise similarity scores.
pub trait SimilarityLookup: Send + Sync {
    /// Items most similar to any of `items`, excluding `exclude`, best first.
    fn top_similar_to(
        &self,
        items: &[ItemId],
        exclude: &HashSet<ItemId>,
        limit: usize,
    ) -> EventRankResult<Vec<ScoredItem>>;

    /// Items most similar to `item`, excluding `exclude`, best first.
    fn top_similar_to_item(
        &self,
        item: ItemId,
        exclude: &HashSet<ItemId>,
        limit: usize,
    ) -> EventRankResult<Vec<ScoredItem>>;

    /// For each of `items`, its most similar neighbours restricted to
    /// `within`, best first, at most `limit` per item.
    fn neighbours_of(
        &self,
        items: &[ItemId],
        within: &HashSet<ItemId>,
        limit: usize,
    ) -> EventRankResult<HashMap<ItemId, Vec<ScoredItem>>>;
}

/// Lookup over recorded user-item weights.
pub trait InteractionLookup: Send + Sync {
    /// The user's most recently touched items, newest first.
    fn recent_items(&self, user: UserId, limit: usize) -> EventRankResult<Vec<ItemId>>;

    fn all_items(&self, user: UserId) -> EventRankResult<HashSet<ItemId>>;

    fn weights_for(
        &self,
        user: UserId,
        items: &HashSet<ItemId>,
    ) -> EventRankResult<HashMap<ItemId, f64>>;

    /// Sum of recorded weights across all users, per item. Items with no
    /// recorded interactions are absent from the map.
    fn aggregated_weights(&self, items: &[ItemId]) -> EventRankResult<HashMap<ItemId, f64>>;
}

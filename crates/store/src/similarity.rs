//! Similarity repository fed by the aggregator's delta stream.

use dashmap::DashMap;
use eventrank_core::error::EventRankResult;
use eventrank_core::repository::SimilarityLookup;
use eventrank_core::sink::SimilaritySink;
use eventrank_core::types::{rank_descending, ItemId, PairKey, ScoredItem, SimilarityDelta};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// Latest known score per item pair, plus a per-item adjacency index for
/// neighbour queries. Both directions of a pair are indexed.
#[derive(Default)]
pub struct SimilarityStore {
    records: DashMap<PairKey, f64>,
    neighbours: DashMap<ItemId, DashMap<ItemId, f64>>,
}

impl SimilarityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the score for the delta's pair. The last write wins:
    /// each delta carries the pair's score as computed from the cumulative
    /// state, so the interaction timestamp plays no part in ordering. Returns
    /// whether the store changed.
    pub fn upsert(&self, delta: &SimilarityDelta) -> bool {
        let key = delta.key();
        if key.item_a == key.item_b {
            warn!(event_id = key.item_a, "Ignoring self-similarity record");
            return false;
        }

        let mut record = self.records.entry(key).or_insert(delta.score);
        *record = delta.score;
        self.index(key, delta.score);
        drop(record);
        metrics::counter!("store.similarity.upserts").increment(1);

        debug!(
            item_a = key.item_a,
            item_b = key.item_b,
            score = delta.score,
            "Similarity upserted"
        );
        true
    }

    // Called with the record's entry still held so the index never lags
    // behind a concurrent upsert of the same pair.
    fn index(&self, key: PairKey, score: f64) {
        self.neighbours
            .entry(key.item_a)
            .or_default()
            .insert(key.item_b, score);
        self.neighbours
            .entry(key.item_b)
            .or_default()
            .insert(key.item_a, score);
    }

    pub fn score(&self, x: ItemId, y: ItemId) -> Option<f64> {
        self.records.get(&PairKey::new(x, y)).map(|r| *r)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Rank by score descending, ties by ascending id, then truncate.
    fn ranked(mut items: Vec<ScoredItem>, limit: usize) -> Vec<ScoredItem> {
        items.sort_by_key(|i| i.event_id);
        rank_descending(&mut items);
        items.truncate(limit);
        items
    }
}

impl SimilaritySink for SimilarityStore {
    fn emit(&self, delta: SimilarityDelta) {
        self.upsert(&delta);
    }
}

impl SimilarityLookup for SimilarityStore {
    fn top_similar_to(
        &self,
        items: &[ItemId],
        exclude: &HashSet<ItemId>,
        limit: usize,
    ) -> EventRankResult<Vec<ScoredItem>> {
        // A candidate reachable from several query items keeps its best score.
        let mut best: HashMap<ItemId, f64> = HashMap::new();
        for item in items {
            let Some(adjacent) = self.neighbours.get(item) else {
                continue;
            };
            for entry in adjacent.iter() {
                let other = *entry.key();
                if exclude.contains(&other) {
                    continue;
                }
                let score = *entry.value();
                best.entry(other)
                    .and_modify(|s| *s = s.max(score))
                    .or_insert(score);
            }
        }

        let candidates = best
            .into_iter()
            .map(|(id, score)| ScoredItem::new(id, score))
            .collect();
        Ok(Self::ranked(candidates, limit))
    }

    fn top_similar_to_item(
        &self,
        item: ItemId,
        exclude: &HashSet<ItemId>,
        limit: usize,
    ) -> EventRankResult<Vec<ScoredItem>> {
        self.top_similar_to(&[item], exclude, limit)
    }

    fn neighbours_of(
        &self,
        items: &[ItemId],
        within: &HashSet<ItemId>,
        limit: usize,
    ) -> EventRankResult<HashMap<ItemId, Vec<ScoredItem>>> {
        let mut result = HashMap::new();
        for item in items {
            let Some(adjacent) = self.neighbours.get(item) else {
                continue;
            };
            let found: Vec<ScoredItem> = adjacent
                .iter()
                .filter(|entry| within.contains(entry.key()))
                .map(|entry| ScoredItem::new(*entry.key(), *entry.value()))
                .collect();
            if !found.is_empty() {
                result.insert(*item, Self::ranked(found, limit));
            }
        }
        Ok(result)
    }
}

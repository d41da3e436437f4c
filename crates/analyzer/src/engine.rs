//! Recommendation engine — personalized recommendations, similar items and
//! interaction-weight popularity, computed on demand from the similarity and
//! interaction repositories.
//!
//! The engine holds no state of its own. Repository failures propagate to the
//! caller untouched and nothing is retried here.

use eventrank_core::error::EventRankResult;
use eventrank_core::repository::{InteractionLookup, SimilarityLookup};
use eventrank_core::types::{rank_descending, ItemId, ScoredItem, UserId};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

pub struct RecommendationEngine {
    similarities: Arc<dyn SimilarityLookup>,
    interactions: Arc<dyn InteractionLookup>,
}

impl RecommendationEngine {
    pub fn new(
        similarities: Arc<dyn SimilarityLookup>,
        interactions: Arc<dyn InteractionLookup>,
    ) -> Self {
        Self {
            similarities,
            interactions,
        }
    }

    /// Personalized recommendations for `user`.
    ///
    /// Candidates are the items most similar to the user's recent
    /// interactions that the user has not seen. Each candidate's predicted
    /// score is the similarity-weighted mean of the user's weights on the
    /// candidate's most similar already-seen items:
    ///
    /// `score(c) = Σ weight(n) * sim(c, n) / Σ sim(c, n)`
    ///
    /// over neighbours `n` with a known weight. Candidates whose denominator
    /// is zero are dropped. A user with no history gets an empty list.
    pub fn recommend_for(&self, user: UserId, limit: usize) -> EventRankResult<Vec<ScoredItem>> {
        info!(user_id = user, limit = limit, "Recommendations requested");
        if limit == 0 {
            return Ok(Vec::new());
        }

        let recent = self.interactions.recent_items(user, limit)?;
        if recent.is_empty() {
            debug!(user_id = user, "No recent interactions, nothing to recommend");
            metrics::counter!("analyzer.cold_start").increment(1);
            return Ok(Vec::new());
        }

        let seen = self.interactions.all_items(user)?;
        let candidates = self.similarities.top_similar_to(&recent, &seen, limit)?;

        // Deduplicate while keeping candidate-generation order.
        let mut candidate_ids: Vec<ItemId> = Vec::with_capacity(candidates.len());
        let mut unique = HashSet::with_capacity(candidates.len());
        for candidate in &candidates {
            if !seen.contains(&candidate.event_id) && unique.insert(candidate.event_id) {
                candidate_ids.push(candidate.event_id);
            }
        }
        if candidate_ids.is_empty() {
            debug!(user_id = user, "No unseen candidates found");
            return Ok(Vec::new());
        }

        let neighbours = self
            .similarities
            .neighbours_of(&candidate_ids, &seen, limit)?;
        let neighbour_ids: HashSet<ItemId> = neighbours
            .values()
            .flatten()
            .map(|n| n.event_id)
            .collect();
        let ratings = self.interactions.weights_for(user, &neighbour_ids)?;

        let mut results: Vec<ScoredItem> = candidate_ids
            .iter()
            .filter_map(|candidate| {
                let neighbours = neighbours.get(candidate)?;
                let mut weighted_sum = 0.0;
                let mut similarity_sum = 0.0;
                for neighbour in neighbours {
                    if let Some(rating) = ratings.get(&neighbour.event_id) {
                        weighted_sum += rating * neighbour.score;
                        similarity_sum += neighbour.score;
                    }
                }
                if similarity_sum == 0.0 {
                    return None;
                }
                Some(ScoredItem::new(*candidate, weighted_sum / similarity_sum))
            })
            .collect();

        rank_descending(&mut results);
        results.truncate(limit);

        info!(user_id = user, count = results.len(), "Recommendations built");
        Ok(results)
    }

    /// Items most similar to `item`, excluding `item` itself and everything
    /// `user` has already interacted with.
    pub fn similar_to(
        &self,
        item: ItemId,
        user: UserId,
        limit: usize,
    ) -> EventRankResult<Vec<ScoredItem>> {
        info!(event_id = item, user_id = user, limit = limit, "Similar items requested");
        if limit == 0 {
            return Ok(Vec::new());
        }

        let mut exclude = self.interactions.all_items(user)?;
        exclude.insert(item);

        let mut results = self
            .similarities
            .top_similar_to_item(item, &exclude, limit)?;
        results.retain(|r| !exclude.contains(&r.event_id));
        rank_descending(&mut results);
        results.truncate(limit);

        debug!(event_id = item, count = results.len(), "Similar items found");
        Ok(results)
    }

    /// Total interaction weight per requested item, highest first. Items with
    /// no recorded interactions score 0.
    pub fn popularity_of(&self, items: &[ItemId]) -> EventRankResult<Vec<ScoredItem>> {
        if items.is_empty() {
            return Ok(Vec::new());
        }
        info!(count = items.len(), "Interaction weights requested");

        let totals = self.interactions.aggregated_weights(items)?;
        let mut results: Vec<ScoredItem> = items
            .iter()
            .map(|id| ScoredItem::new(*id, totals.get(id).copied().unwrap_or(0.0)))
            .collect();
        rank_descending(&mut results);
        Ok(results)
    }
}

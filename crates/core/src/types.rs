use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

pub type UserId = i64;
pub type ItemId = i64;

/// Kind of user interaction. Unrecognized wire values deserialize to
/// `Unknown`, which resolves to weight 0 and is discarded.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(from = "String", into = "String")]
pub enum ActionKind {
    View,
    Register,
    Like,
    Unknown,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::View => "VIEW",
            ActionKind::Register => "REGISTER",
            ActionKind::Like => "LIKE",
            ActionKind::Unknown => "UNKNOWN",
        }
    }
}

impl From<String> for ActionKind {
    fn from(value: String) -> Self {
        match value.to_ascii_uppercase().as_str() {
            "VIEW" => ActionKind::View,
            "REGISTER" => ActionKind::Register,
            "LIKE" => ActionKind::Like,
            _ => ActionKind::Unknown,
        }
    }
}

impl From<ActionKind> for String {
    fn from(kind: ActionKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inbound interaction record, delivered per user in order, at least once.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserAction {
    pub user_id: UserId,
    pub event_id: ItemId,
    pub action: ActionKind,
    pub timestamp: DateTime<Utc>,
}

/// Canonical key for an unordered item pair: `item_a <= item_b` always.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PairKey {
    pub item_a: ItemId,
    pub item_b: ItemId,
}

impl PairKey {
    pub fn new(x: ItemId, y: ItemId) -> Self {
        if x <= y {
            Self { item_a: x, item_b: y }
        } else {
            Self { item_a: y, item_b: x }
        }
    }

    /// The member of the pair that is not `item`.
    pub fn other(&self, item: ItemId) -> ItemId {
        if self.item_a == item {
            self.item_b
        } else {
            self.item_a
        }
    }
}

/// Outbound similarity record. `item_a < item_b` for every emitted delta.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimilarityDelta {
    pub item_a: ItemId,
    pub item_b: ItemId,
    pub score: f64,
    pub timestamp: DateTime<Utc>,
}

impl SimilarityDelta {
    pub fn key(&self) -> PairKey {
        PairKey::new(self.item_a, self.item_b)
    }
}

/// Ranked query result entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoredItem {
    pub event_id: ItemId,
    pub score: f64,
}

impl ScoredItem {
    pub fn new(event_id: ItemId, score: f64) -> Self {
        Self { event_id, score }
    }
}

/// Sort by score descending. The sort is stable, so equal scores keep
/// their incoming order.
pub fn rank_descending(items: &mut [ScoredItem]) {
    items.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
}

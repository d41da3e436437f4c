pub mod config;
pub mod error;
pub mod repository;
pub mod sink;
pub mod types;
pub mod weights;

pub use config::AppConfig;
pub use error::{EventRankError, EventRankResult};
pub use repository::{InteractionLookup, SimilarityLookup};
pub use sink::{ActionSink, SimilaritySink};
pub use types::{ActionKind, ItemId, PairKey, ScoredItem, SimilarityDelta, UserAction, UserId};
pub use weights::WeightResolver;

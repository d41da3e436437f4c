#![warn(clippy::unwrap_used)]

pub mod aggregator;
pub mod state;

pub use aggregator::Aggregator;
pub use state::SimilarityState;

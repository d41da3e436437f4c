//! In-process repositories behind the recommendation engine's read contracts.
//! `SimilarityStore` is fed by the similarity stream, `InteractionStore` by
//! the user-action stream.

#![warn(clippy::unwrap_used)]

pub mod interactions;
pub mod similarity;

pub use interactions::InteractionStore;
pub use similarity::SimilarityStore;

//! Query-side recommendation engine: item-based k-nearest-neighbour
//! collaborative filtering over the accumulated similarity model.

pub mod engine;

pub use engine::RecommendationEngine;

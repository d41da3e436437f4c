#![warn(clippy::unwrap_used)]

pub mod agent;
pub mod ingest;
pub mod manager;
pub mod pipeline;
pub mod publisher;
pub mod router;

pub use agent::AggregatorAgent;
pub use manager::AgentManager;
pub use pipeline::LocalPipeline;
pub use publisher::{ActionPublisher, NatsPublisher, SimilarityPublisher};
pub use router::PartitionRouter;

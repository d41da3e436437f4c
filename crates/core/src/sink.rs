//! Emission seams for the similarity stream and the action stream.
//!
//! The aggregator accepts an `Arc<dyn SimilaritySink>` to publish changed pair
//! scores downstream; the collector accepts an `Arc<dyn ActionSink>` to push
//! inbound interactions into the stream.

use crate::error::EventRankResult;
use crate::types::{SimilarityDelta, UserAction};
use parking_lot::Mutex;
use std::sync::Arc;

/// Fire-and-forget destination for similarity deltas. Implementations log
/// delivery failures instead of returning them.
pub trait SimilaritySink: Send + Sync {
    fn emit(&self, delta: SimilarityDelta);
}

/// Entry point for inbound interactions.
pub trait ActionSink: Send + Sync {
    fn submit(&self, action: UserAction) -> EventRankResult<()>;
}

/// No-op sink for modules that don't need emission.
pub struct NoOpSink;

impl SimilaritySink for NoOpSink {
    fn emit(&self, _delta: SimilarityDelta) {}
}

/// In-memory sink that captures deltas for testing.
#[derive(Default)]
pub struct CaptureSink {
    deltas: Mutex<Vec<SimilarityDelta>>,
}

impl CaptureSink {
    pub fn new() -> Self {
        Self {
            deltas: Mutex::new(Vec::new()),
        }
    }

    pub fn deltas(&self) -> Vec<SimilarityDelta> {
        self.deltas.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.deltas.lock().len()
    }

    pub fn clear(&self) {
        self.deltas.lock().clear();
    }
}

impl SimilaritySink for CaptureSink {
    fn emit(&self, delta: SimilarityDelta) {
        self.deltas.lock().push(delta);
    }
}

pub fn noop_sink() -> Arc<dyn SimilaritySink> {
    Arc::new(NoOpSink)
}

pub fn capture_sink() -> Arc<CaptureSink> {
    Arc::new(CaptureSink::new())
}

//! Applies the feature extractor to a single chunk.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::features::{CategorySet, FeatureExtractor, FeatureSet};
use crate::task::{ChunkSpan, ChunkState};

/// Result of processing one chunk. Never an error: failures are data.
#[derive(Debug, Clone, PartialEq)]
pub enum ChunkOutcome {
    Completed(FeatureSet),
    Failed(String),
}

impl From<ChunkOutcome> for ChunkState {
    fn from(outcome: ChunkOutcome) -> Self {
        match outcome {
            ChunkOutcome::Completed(features) => ChunkState::Completed(features),
            ChunkOutcome::Failed(message) => ChunkState::Failed(message),
        }
    }
}

#[derive(Clone)]
pub struct ChunkProcessor {
    extractor: Arc<dyn FeatureExtractor>,
}

impl ChunkProcessor {
    pub fn new(extractor: Arc<dyn FeatureExtractor>) -> Self {
        Self { extractor }
    }

    /// Extract features for one chunk, turning errors and panics into `Failed`.
    pub fn process(
        &self,
        span: ChunkSpan,
        samples: &[f32],
        sample_rate: u32,
        categories: &CategorySet,
    ) -> ChunkOutcome {
        let result = catch_unwind(AssertUnwindSafe(|| {
            self.extractor.extract(samples, sample_rate, categories)
        }));

        match result {
            Ok(Ok(features)) => {
                debug!(chunk_id = span.chunk_id, samples = samples.len(), "Chunk extracted");
                ChunkOutcome::Completed(features)
            }
            Ok(Err(e)) => {
                warn!(chunk_id = span.chunk_id, error = %e, "Chunk extraction failed");
                ChunkOutcome::Failed(chunk_failure(span, &e.to_string()))
            }
            Err(payload) => {
                let reason = panic_message(payload.as_ref());
                warn!(chunk_id = span.chunk_id, reason = %reason, "Chunk extraction panicked");
                ChunkOutcome::Failed(chunk_failure(span, &format!("extractor panicked: {reason}")))
            }
        }
    }
}

pub(crate) fn chunk_failure(span: ChunkSpan, reason: &str) -> String {
    format!(
        "chunk {} ({:.2}s-{:.2}s): {reason}",
        span.chunk_id, span.start_time, span.end_time
    )
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

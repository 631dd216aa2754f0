//! Task and chunk data model.

use std::fmt;
use std::ops::Range;
use std::str::FromStr;

use uuid::Uuid;

use crate::features::FeatureSet;

/// Slack used when counting chunks, so float noise in `len / rate` does not
/// add a spurious empty chunk.
const PARTITION_EPSILON: f64 = 1e-9;

/// Opaque task identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(Uuid);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for TaskId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkStatus {
    Processing,
    Completed,
    Failed,
}

impl ChunkStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, ChunkStatus::Processing)
    }
}

/// Chunk state together with its payload.
#[derive(Debug, Clone, PartialEq)]
pub enum ChunkState {
    Processing,
    Completed(FeatureSet),
    Failed(String),
}

impl ChunkState {
    pub fn status(&self) -> ChunkStatus {
        match self {
            ChunkState::Processing => ChunkStatus::Processing,
            ChunkState::Completed(_) => ChunkStatus::Completed,
            ChunkState::Failed(_) => ChunkStatus::Failed,
        }
    }
}

/// Time interval of one chunk, in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChunkSpan {
    pub chunk_id: u32,
    pub start_time: f64,
    pub end_time: f64,
}

impl ChunkSpan {
    /// Sample indices covered by this span, clamped to the buffer.
    pub fn sample_range(&self, len: usize, sample_rate: u32) -> Range<usize> {
        let rate = sample_rate as f64;
        let end = ((self.end_time * rate).round() as usize).min(len);
        let start = ((self.start_time * rate).round() as usize).min(end);
        start..end
    }
}

/// Split `[0, duration)` into consecutive spans of `chunk_duration`.
///
/// Every span but the last is exactly `chunk_duration` long; the last ends at
/// `duration`. At least one span is produced.
pub fn partition(duration: f64, chunk_duration: f64) -> Vec<ChunkSpan> {
    let total = ((duration / chunk_duration - PARTITION_EPSILON).ceil() as usize).max(1);
    (0..total)
        .map(|i| {
            let start_time = i as f64 * chunk_duration;
            let end_time = if i + 1 == total {
                duration
            } else {
                ((i + 1) as f64 * chunk_duration).min(duration)
            };
            ChunkSpan {
                chunk_id: i as u32,
                start_time,
                end_time,
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChunkRecord {
    pub chunk_id: u32,
    pub start_time: f64,
    pub end_time: f64,
    state: ChunkState,
}

impl ChunkRecord {
    pub fn processing(span: ChunkSpan) -> Self {
        Self {
            chunk_id: span.chunk_id,
            start_time: span.start_time,
            end_time: span.end_time,
            state: ChunkState::Processing,
        }
    }

    pub fn status(&self) -> ChunkStatus {
        self.state.status()
    }

    /// Present iff the chunk completed.
    pub fn features(&self) -> Option<&FeatureSet> {
        match &self.state {
            ChunkState::Completed(features) => Some(features),
            _ => None,
        }
    }

    /// Present iff the chunk failed.
    pub fn error(&self) -> Option<&str> {
        match &self.state {
            ChunkState::Failed(message) => Some(message),
            _ => None,
        }
    }

    /// Move out of `Processing`. Returns false (and leaves the record alone)
    /// if the chunk already reached a terminal state or `next` is not terminal.
    pub(crate) fn resolve(&mut self, next: ChunkState) -> bool {
        if self.status().is_terminal() || !next.status().is_terminal() {
            return false;
        }
        self.state = next;
        true
    }
}

/// A submitted recording split into chunks.
#[derive(Debug, Clone)]
pub struct AnalysisTask {
    id: TaskId,
    chunks: Vec<ChunkRecord>,
}

impl AnalysisTask {
    /// New task with every chunk `Processing`.
    pub fn new(id: TaskId, spans: &[ChunkSpan]) -> Self {
        Self {
            id,
            chunks: spans.iter().copied().map(ChunkRecord::processing).collect(),
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn chunks(&self) -> &[ChunkRecord] {
        &self.chunks
    }

    pub(crate) fn chunk_mut(&mut self, chunk_id: u32) -> Option<&mut ChunkRecord> {
        self.chunks.get_mut(chunk_id as usize)
    }

    pub fn is_complete(&self) -> bool {
        self.chunks.iter().all(|c| c.status().is_terminal())
    }

    pub fn snapshot(&self) -> TaskSnapshot {
        TaskSnapshot {
            task_id: self.id,
            chunks: self.chunks.clone(),
        }
    }
}

/// Point-in-time copy of a task handed to readers and observers.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskSnapshot {
    pub task_id: TaskId,
    pub chunks: Vec<ChunkRecord>,
}

impl TaskSnapshot {
    pub fn total_chunks(&self) -> usize {
        self.chunks.len()
    }

    pub fn count(&self, status: ChunkStatus) -> usize {
        self.chunks.iter().filter(|c| c.status() == status).count()
    }

    pub fn terminal_chunks(&self) -> usize {
        self.chunks
            .iter()
            .filter(|c| c.status().is_terminal())
            .count()
    }

    /// All chunks terminal.
    pub fn is_complete(&self) -> bool {
        self.terminal_chunks() == self.chunks.len()
    }
}

#[cfg(test)]
#[path = "task_test.rs"]
mod tests;

//! Task submission and background chunk processing.
//!
//! Each submitted recording gets one background job that walks its chunks in
//! order: extract on the blocking pool, record the outcome, broadcast the new
//! snapshot, pause. Jobs for different tasks run concurrently.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::features::CategorySet;
use crate::hub::SubscriberHub;
use crate::processor::{ChunkOutcome, ChunkProcessor, chunk_failure};
use crate::store::{StoreError, TaskStore, TaskWriter};
use crate::task::{AnalysisTask, ChunkSpan, TaskId, TaskSnapshot, partition};

#[derive(Debug, Clone, Error, PartialEq)]
pub enum SubmitError {
    #[error("at least one feature category is required")]
    NoCategories,
    #[error("chunk duration must be a positive number of seconds, got {0}")]
    InvalidChunkDuration(f64),
    #[error("sample buffer is empty")]
    EmptySamples,
    #[error("sample rate must be positive")]
    InvalidSampleRate,
    #[error("chunk duration {chunk_duration}s is shorter than one sample at {sample_rate} Hz")]
    ChunkShorterThanSample { chunk_duration: f64, sample_rate: u32 },
    #[error("daemon is shutting down")]
    ShuttingDown,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Counts reported by a finished job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobReport {
    pub completed: usize,
    pub failed: usize,
}

/// Handle to a task's background job.
#[derive(Debug)]
pub struct JobHandle {
    task_id: TaskId,
    handle: JoinHandle<JobReport>,
}

impl JobHandle {
    pub fn task_id(&self) -> TaskId {
        self.task_id
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the job to process every chunk.
    pub async fn join(self) -> Result<JobReport, JoinError> {
        self.handle.await
    }
}

/// A registered task and its running job.
#[derive(Debug)]
pub struct SubmittedTask {
    /// Initial snapshot, every chunk `Processing`.
    pub snapshot: TaskSnapshot,
    pub job: JobHandle,
}

pub struct TaskOrchestrator {
    store: Arc<TaskStore>,
    hub: Arc<SubscriberHub>,
    processor: ChunkProcessor,
    pacing: Duration,
    tracker: TaskTracker,
}

impl TaskOrchestrator {
    pub fn new(
        store: Arc<TaskStore>,
        hub: Arc<SubscriberHub>,
        processor: ChunkProcessor,
        pacing: Duration,
    ) -> Self {
        Self {
            store,
            hub,
            processor,
            pacing,
            tracker: TaskTracker::new(),
        }
    }

    /// Register a recording for analysis and start its job.
    ///
    /// Returns as soon as the task exists; nothing is registered when the
    /// request is rejected.
    pub fn submit(
        &self,
        samples: Vec<f32>,
        sample_rate: u32,
        categories: CategorySet,
        chunk_duration: f64,
    ) -> Result<SubmittedTask, SubmitError> {
        if categories.is_empty() {
            return Err(SubmitError::NoCategories);
        }
        if !chunk_duration.is_finite() || chunk_duration <= 0.0 {
            return Err(SubmitError::InvalidChunkDuration(chunk_duration));
        }
        if samples.is_empty() {
            return Err(SubmitError::EmptySamples);
        }
        if sample_rate == 0 {
            return Err(SubmitError::InvalidSampleRate);
        }
        // Bounds the chunk count by the sample count.
        if chunk_duration * (sample_rate as f64) < 1.0 {
            return Err(SubmitError::ChunkShorterThanSample {
                chunk_duration,
                sample_rate,
            });
        }
        if self.tracker.is_closed() {
            return Err(SubmitError::ShuttingDown);
        }

        let duration = samples.len() as f64 / sample_rate as f64;
        let spans = partition(duration, chunk_duration);
        let task = AnalysisTask::new(TaskId::new(), &spans);
        let snapshot = task.snapshot();
        let writer = self.store.create(task)?;
        let task_id = writer.task_id();

        info!(
            task_id = %task_id,
            duration_secs = duration,
            chunks = spans.len(),
            categories = ?categories,
            "Task submitted"
        );

        let job = Job {
            writer,
            hub: Arc::clone(&self.hub),
            processor: self.processor.clone(),
            samples: Arc::new(samples),
            sample_rate,
            categories: Arc::new(categories),
            spans,
            pacing: self.pacing,
        };
        let handle = self.tracker.spawn(job.run());

        Ok(SubmittedTask {
            snapshot,
            job: JobHandle { task_id, handle },
        })
    }

    /// Number of jobs still running.
    pub fn active_jobs(&self) -> usize {
        self.tracker.len()
    }

    /// Refuse new submissions and wait for running jobs to finish.
    pub async fn shutdown(&self) {
        self.tracker.close();
        if !self.tracker.is_empty() {
            info!(jobs = self.tracker.len(), "Waiting for analysis jobs");
        }
        self.tracker.wait().await;
    }
}

struct Job {
    writer: TaskWriter,
    hub: Arc<SubscriberHub>,
    processor: ChunkProcessor,
    samples: Arc<Vec<f32>>,
    sample_rate: u32,
    categories: Arc<CategorySet>,
    spans: Vec<ChunkSpan>,
    pacing: Duration,
}

impl Job {
    async fn run(self) -> JobReport {
        let task_id = self.writer.task_id();
        let mut report = JobReport::default();

        for (index, span) in self.spans.iter().copied().enumerate() {
            let outcome = self.process(span).await;
            match &outcome {
                ChunkOutcome::Completed(_) => report.completed += 1,
                ChunkOutcome::Failed(_) => report.failed += 1,
            }

            if let Err(e) = self.writer.record(span.chunk_id, outcome) {
                warn!(task_id = %task_id, chunk_id = span.chunk_id, error = %e, "Failed to record chunk");
                continue;
            }
            let delivery = self.hub.broadcast(task_id).await;
            debug!(
                task_id = %task_id,
                chunk_id = span.chunk_id,
                delivered = delivery.delivered,
                "Chunk done"
            );

            if index + 1 < self.spans.len() && !self.pacing.is_zero() {
                tokio::time::sleep(self.pacing).await;
            }
        }

        info!(
            task_id = %task_id,
            completed = report.completed,
            failed = report.failed,
            "Analysis finished"
        );
        report
    }

    async fn process(&self, span: ChunkSpan) -> ChunkOutcome {
        let processor = self.processor.clone();
        let samples = Arc::clone(&self.samples);
        let categories = Arc::clone(&self.categories);
        let sample_rate = self.sample_rate;

        let result = tokio::task::spawn_blocking(move || {
            let range = span.sample_range(samples.len(), sample_rate);
            processor.process(span, &samples[range], sample_rate, &categories)
        })
        .await;

        result.unwrap_or_else(|e| {
            ChunkOutcome::Failed(chunk_failure(span, &format!("worker failed: {e}")))
        })
    }
}

#[cfg(test)]
#[path = "orchestrator_test.rs"]
mod tests;

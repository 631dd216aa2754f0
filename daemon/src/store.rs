//! In-memory task registry.
//!
//! Readers get copies; the only way to change a task is through the
//! [`TaskWriter`] returned when it was created. Locks are never held across
//! an await point.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::processor::ChunkOutcome;
use crate::task::{AnalysisTask, ChunkStatus, TaskId, TaskSnapshot};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("task {0} already exists")]
    Duplicate(TaskId),
    #[error("task {0} not found")]
    UnknownTask(TaskId),
    #[error("task {task_id} has no chunk {chunk_id}")]
    UnknownChunk { task_id: TaskId, chunk_id: u32 },
    #[error("chunk {chunk_id} of task {task_id} is already {status:?}")]
    AlreadyResolved {
        task_id: TaskId,
        chunk_id: u32,
        status: ChunkStatus,
    },
}

struct TaskEntry {
    task: AnalysisTask,
    completed_at: Option<Instant>,
}

#[derive(Default)]
pub struct TaskStore {
    tasks: RwLock<HashMap<TaskId, TaskEntry>>,
}

impl TaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new task and hand back its single writer.
    pub fn create(self: &Arc<Self>, task: AnalysisTask) -> Result<TaskWriter, StoreError> {
        let task_id = task.id();
        let mut tasks = self.tasks.write();
        if tasks.contains_key(&task_id) {
            return Err(StoreError::Duplicate(task_id));
        }
        let completed_at = task.is_complete().then(Instant::now);
        tasks.insert(task_id, TaskEntry { task, completed_at });
        debug!(task_id = %task_id, tasks = tasks.len(), "Task registered");

        Ok(TaskWriter {
            store: Arc::clone(self),
            task_id,
        })
    }

    /// Copy of the task's current state.
    pub fn get(&self, task_id: TaskId) -> Option<TaskSnapshot> {
        self.tasks
            .read()
            .get(&task_id)
            .map(|entry| entry.task.snapshot())
    }

    pub fn len(&self) -> usize {
        self.tasks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.read().is_empty()
    }

    /// Drop tasks that finished more than `ttl` ago. In-progress tasks stay.
    pub fn evict_expired(&self, ttl: Duration) -> Vec<TaskId> {
        let now = Instant::now();
        let mut tasks = self.tasks.write();
        let expired: Vec<TaskId> = tasks
            .iter()
            .filter(|(_, entry)| {
                entry
                    .completed_at
                    .is_some_and(|done| now.duration_since(done) >= ttl)
            })
            .map(|(id, _)| *id)
            .collect();
        for id in &expired {
            tasks.remove(id);
        }
        if !expired.is_empty() {
            info!(evicted = expired.len(), remaining = tasks.len(), "Evicted expired tasks");
        }
        expired
    }

    fn record(
        &self,
        task_id: TaskId,
        chunk_id: u32,
        outcome: ChunkOutcome,
    ) -> Result<(), StoreError> {
        let mut tasks = self.tasks.write();
        let entry = tasks
            .get_mut(&task_id)
            .ok_or(StoreError::UnknownTask(task_id))?;
        let chunk = entry
            .task
            .chunk_mut(chunk_id)
            .ok_or(StoreError::UnknownChunk { task_id, chunk_id })?;

        let status = chunk.status();
        if !chunk.resolve(outcome.into()) {
            return Err(StoreError::AlreadyResolved {
                task_id,
                chunk_id,
                status,
            });
        }
        let status = chunk.status();

        if entry.completed_at.is_none() && entry.task.is_complete() {
            entry.completed_at = Some(Instant::now());
            info!(task_id = %task_id, "Task complete");
        }
        debug!(task_id = %task_id, chunk_id, ?status, "Chunk recorded");
        Ok(())
    }
}

/// Exclusive write access to one task.
pub struct TaskWriter {
    store: Arc<TaskStore>,
    task_id: TaskId,
}

impl TaskWriter {
    pub fn task_id(&self) -> TaskId {
        self.task_id
    }

    /// Move a chunk from `Processing` to the outcome's terminal state.
    pub fn record(&self, chunk_id: u32, outcome: ChunkOutcome) -> Result<(), StoreError> {
        self.store.record(self.task_id, chunk_id, outcome)
    }
}

#[cfg(test)]
#[path = "store_test.rs"]
mod tests;

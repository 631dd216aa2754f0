//! Controller owns daemon state and coordinates components.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::Config;
use crate::features::{CategorySet, FeatureEngine, FeatureExtractor};
use crate::hub::{HubError, SubscriberHub, Subscription};
use crate::orchestrator::{SubmitError, SubmittedTask, TaskOrchestrator};
use crate::processor::ChunkProcessor;
use crate::store::TaskStore;
use crate::task::{TaskId, TaskSnapshot};

/// Daemon-wide state shared by the gRPC service and background jobs.
pub struct Controller {
    config: Config,
    store: Arc<TaskStore>,
    hub: Arc<SubscriberHub>,
    orchestrator: TaskOrchestrator,
    shutdown_tx: Mutex<Option<oneshot::Sender<()>>>,
    background: CancellationToken,
}

impl Controller {
    /// Create a controller using the built-in feature engine.
    pub fn new(config: Config, shutdown_tx: oneshot::Sender<()>) -> Self {
        let engine = FeatureEngine::new(config.features.engine_config());
        Self::with_extractor(config, Arc::new(engine), shutdown_tx)
    }

    /// Create a controller with a custom extractor.
    pub fn with_extractor(
        config: Config,
        extractor: Arc<dyn FeatureExtractor>,
        shutdown_tx: oneshot::Sender<()>,
    ) -> Self {
        let store = Arc::new(TaskStore::new());
        let hub = Arc::new(SubscriberHub::new(
            Arc::clone(&store),
            config.delivery.timeout(),
        ));
        let orchestrator = TaskOrchestrator::new(
            Arc::clone(&store),
            Arc::clone(&hub),
            ChunkProcessor::new(extractor),
            config.analysis.pacing(),
        );

        Self {
            config,
            store,
            hub,
            orchestrator,
            shutdown_tx: Mutex::new(Some(shutdown_tx)),
            background: CancellationToken::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Submit a recording. `chunk_duration` falls back to the configured default.
    pub fn submit(
        &self,
        samples: Vec<f32>,
        sample_rate: u32,
        categories: CategorySet,
        chunk_duration: Option<f64>,
    ) -> Result<SubmittedTask, SubmitError> {
        let chunk_duration =
            chunk_duration.unwrap_or(self.config.analysis.default_chunk_seconds);
        self.orchestrator
            .submit(samples, sample_rate, categories, chunk_duration)
    }

    pub fn status(&self, task_id: TaskId) -> Option<TaskSnapshot> {
        self.store.get(task_id)
    }

    /// Observe a task; the first item is its current snapshot.
    pub fn subscribe(&self, task_id: TaskId) -> Result<Subscription, HubError> {
        self.hub
            .subscribe(task_id, self.config.delivery.observer_buffer)
    }

    /// Evict tasks completed more than `ttl` ago and drop their observers.
    pub fn sweep_expired(&self, ttl: Duration) -> usize {
        let evicted = self.store.evict_expired(ttl);
        for task_id in &evicted {
            self.hub.forget(*task_id);
        }
        evicted.len()
    }

    /// Start the retention sweeper if a TTL is configured.
    pub fn start_retention(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        let ttl = self.config.retention.completed_ttl()?;
        let interval = self.config.retention.sweep_interval();
        let controller = Arc::clone(self);
        let cancel = self.background.clone();
        info!(ttl_secs = ttl.as_secs(), interval_secs = interval.as_secs(), "Retention enabled");

        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("Retention sweeper stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        controller.sweep_expired(ttl);
                    }
                }
            }
        }))
    }

    /// Request a graceful daemon shutdown.
    pub async fn shutdown(&self) {
        if let Some(tx) = self.shutdown_tx.lock().await.take() {
            info!("Shutdown requested");
            let _ = tx.send(());
        }
    }

    /// Stop background work and wait for running analysis jobs.
    pub async fn drain(&self) {
        self.background.cancel();
        self.orchestrator.shutdown().await;
    }
}

#[cfg(test)]
#[path = "controller_test.rs"]
mod tests;

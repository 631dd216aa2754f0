use super::*;
use crate::config::{AnalysisConfig, RetentionConfig};
use crate::features::FeatureCategory;
use crate::hub::HubError;

fn fast_config() -> Config {
    Config {
        analysis: AnalysisConfig {
            default_chunk_seconds: 1.0,
            pacing_ms: 0,
        },
        ..Config::default()
    }
}

fn create_controller(config: Config) -> (Arc<Controller>, oneshot::Receiver<()>) {
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    (Arc::new(Controller::new(config, shutdown_tx)), shutdown_rx)
}

fn acoustic() -> CategorySet {
    [FeatureCategory::Acoustic].into_iter().collect()
}

#[tokio::test]
async fn test_submit_uses_default_chunk_duration() {
    let (controller, _) = create_controller(fast_config());

    let submitted = controller
        .submit(vec![0.0; 16000 * 3], 16000, acoustic(), None)
        .unwrap();
    assert_eq!(submitted.snapshot.total_chunks(), 3);

    let task_id = submitted.job.task_id();
    submitted.job.join().await.unwrap();
    assert!(controller.status(task_id).unwrap().is_complete());
}

#[tokio::test]
async fn test_submit_explicit_chunk_duration() {
    let (controller, _) = create_controller(fast_config());

    let submitted = controller
        .submit(vec![0.0; 16000 * 3], 16000, acoustic(), Some(2.0))
        .unwrap();
    assert_eq!(submitted.snapshot.total_chunks(), 2);
    submitted.job.join().await.unwrap();
}

#[tokio::test]
async fn test_status_unknown_task() {
    let (controller, _) = create_controller(fast_config());
    assert!(controller.status(TaskId::new()).is_none());
}

#[tokio::test]
async fn test_subscribe_unknown_task() {
    let (controller, _) = create_controller(fast_config());
    let missing = TaskId::new();
    assert!(matches!(
        controller.subscribe(missing),
        Err(HubError::NotFound(id)) if id == missing
    ));
}

#[tokio::test]
async fn test_shutdown_signals_once() {
    let (controller, shutdown_rx) = create_controller(fast_config());

    controller.shutdown().await;
    controller.shutdown().await;
    assert!(shutdown_rx.await.is_ok());
}

#[tokio::test]
async fn test_sweep_evicts_finished_tasks_and_observers() {
    let (controller, _) = create_controller(fast_config());

    let submitted = controller
        .submit(vec![0.0; 1600], 16000, acoustic(), None)
        .unwrap();
    let task_id = submitted.job.task_id();
    submitted.job.join().await.unwrap();

    let mut sub = controller.subscribe(task_id).unwrap();
    assert!(sub.recv().await.unwrap().is_complete());

    assert_eq!(controller.sweep_expired(Duration::ZERO), 1);
    assert!(controller.status(task_id).is_none());
    assert!(sub.recv().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_retention_sweeper_runs_on_interval() {
    let config = Config {
        retention: RetentionConfig {
            completed_ttl_secs: Some(5),
            sweep_interval_secs: 1,
        },
        ..fast_config()
    };
    let (controller, _) = create_controller(config);

    let submitted = controller
        .submit(vec![0.0; 1600], 16000, acoustic(), None)
        .unwrap();
    let task_id = submitted.job.task_id();
    submitted.job.join().await.unwrap();

    let sweeper = controller.start_retention().unwrap();
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert!(controller.status(task_id).is_some());

    tokio::time::sleep(Duration::from_secs(4)).await;
    assert!(controller.status(task_id).is_none());

    controller.drain().await;
    sweeper.await.unwrap();
}

#[tokio::test]
async fn test_retention_disabled_by_default() {
    let (controller, _) = create_controller(fast_config());
    assert!(controller.start_retention().is_none());
}

#[tokio::test]
async fn test_drain_rejects_new_submissions() {
    let (controller, _) = create_controller(fast_config());
    controller.drain().await;
    assert_eq!(
        controller
            .submit(vec![0.0; 100], 16000, acoustic(), None)
            .unwrap_err(),
        SubmitError::ShuttingDown
    );
}

use super::*;
use crate::config::{AnalysisConfig, Config};
use tokio::sync::oneshot;
use tokio_stream::StreamExt;
use tonic::Code;

fn create_service() -> (AudioResearchService, oneshot::Receiver<()>) {
    let config = Config {
        analysis: AnalysisConfig {
            default_chunk_seconds: 1.0,
            pacing_ms: 0,
        },
        ..Config::default()
    };
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let controller = Arc::new(Controller::new(config, shutdown_tx));
    (AudioResearchService::new(controller), shutdown_rx)
}

fn submit_request(seconds: usize, categories: Vec<proto::FeatureCategory>) -> proto::SubmitRequest {
    proto::SubmitRequest {
        samples: vec![0.0; 16000 * seconds],
        sample_rate: 16000,
        categories: categories.into_iter().map(i32::from).collect(),
        chunk_duration: None,
    }
}

async fn follow(service: &AudioResearchService, task_id: &str) -> Vec<proto::TaskSnapshot> {
    let stream = service
        .subscribe(Request::new(proto::TaskRequest {
            task_id: task_id.to_string(),
        }))
        .await
        .unwrap()
        .into_inner();
    stream.map(|item| item.unwrap()).collect().await
}

#[tokio::test]
async fn test_submit_returns_processing_snapshot() {
    let (service, _) = create_service();

    let snapshot = service
        .submit(Request::new(submit_request(
            3,
            vec![proto::FeatureCategory::Acoustic],
        )))
        .await
        .unwrap()
        .into_inner();

    assert_eq!(snapshot.total_chunks, 3);
    assert_eq!(snapshot.chunks.len(), 3);
    assert!(
        snapshot
            .chunks
            .iter()
            .all(|c| c.status() == proto::ChunkStatus::Processing && c.features.is_none())
    );
    assert!(snapshot.task_id.parse::<TaskId>().is_ok());
}

#[tokio::test]
async fn test_submit_rejects_invalid_requests() {
    let (service, _) = create_service();

    let empty = service
        .submit(Request::new(submit_request(1, Vec::new())))
        .await
        .unwrap_err();
    assert_eq!(empty.code(), Code::InvalidArgument);

    let unspecified = service
        .submit(Request::new(submit_request(
            1,
            vec![proto::FeatureCategory::Unspecified],
        )))
        .await
        .unwrap_err();
    assert_eq!(unspecified.code(), Code::InvalidArgument);

    let mut unknown = submit_request(1, Vec::new());
    unknown.categories = vec![42];
    let err = service.submit(Request::new(unknown)).await.unwrap_err();
    assert_eq!(err.code(), Code::InvalidArgument);

    let mut bad_duration = submit_request(1, vec![proto::FeatureCategory::Speaker]);
    bad_duration.chunk_duration = Some(0.0);
    let err = service.submit(Request::new(bad_duration)).await.unwrap_err();
    assert_eq!(err.code(), Code::InvalidArgument);

    let mut sub_sample = submit_request(1, vec![proto::FeatureCategory::Speaker]);
    sub_sample.chunk_duration = Some(1e-12);
    let err = service.submit(Request::new(sub_sample)).await.unwrap_err();
    assert_eq!(err.code(), Code::InvalidArgument);

    let mut no_rate = submit_request(1, vec![proto::FeatureCategory::Speaker]);
    no_rate.sample_rate = 0;
    let err = service.submit(Request::new(no_rate)).await.unwrap_err();
    assert_eq!(err.code(), Code::InvalidArgument);
}

#[tokio::test]
async fn test_get_status_unknown_and_malformed_ids() {
    let (service, _) = create_service();

    for task_id in [TaskId::new().to_string(), "not-a-task".to_string()] {
        let err = service
            .get_status(Request::new(proto::TaskRequest { task_id }))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::NotFound);
    }
}

#[tokio::test]
async fn test_subscribe_unknown_task_not_found() {
    let (service, _) = create_service();

    let result = service
        .subscribe(Request::new(proto::TaskRequest {
            task_id: TaskId::new().to_string(),
        }))
        .await;
    assert_eq!(result.err().map(|s| s.code()), Some(Code::NotFound));
}

#[tokio::test]
async fn test_subscribe_streams_until_complete() {
    let (service, _) = create_service();

    let initial = service
        .submit(Request::new(submit_request(
            3,
            vec![
                proto::FeatureCategory::Acoustic,
                proto::FeatureCategory::Paralinguistic,
            ],
        )))
        .await
        .unwrap()
        .into_inner();

    let snapshots = follow(&service, &initial.task_id).await;
    let last = snapshots.last().unwrap();
    assert!(last.is_complete());
    assert_eq!(last.total_chunks, 3);
    assert!(snapshots[..snapshots.len() - 1].iter().all(|s| !s.is_complete()));

    for chunk in &last.chunks {
        assert_eq!(chunk.status(), proto::ChunkStatus::Completed);
        let features = chunk.features.as_ref().unwrap();
        let acoustic = features.acoustic.as_ref().unwrap();
        assert_eq!(acoustic.mfcc.len(), 13);
        assert_eq!(acoustic.energy, 0.0);
        assert!(features.paralinguistic.is_some());
        assert!(features.speaker.is_none());
        assert!(chunk.error.is_none());
    }

    let status = service
        .get_status(Request::new(proto::TaskRequest {
            task_id: initial.task_id.clone(),
        }))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(&status, last);
}

#[tokio::test]
async fn test_subscribe_after_completion_yields_single_snapshot() {
    let (service, _) = create_service();

    let initial = service
        .submit(Request::new(submit_request(
            1,
            vec![proto::FeatureCategory::Speaker],
        )))
        .await
        .unwrap()
        .into_inner();
    follow(&service, &initial.task_id).await;

    let snapshots = follow(&service, &initial.task_id).await;
    assert_eq!(snapshots.len(), 1);
    assert_eq!(snapshots[0].terminal_chunks(), 1);
}

#[tokio::test]
async fn test_shutdown_signals_daemon() {
    let (service, shutdown_rx) = create_service();

    service
        .shutdown(Request::new(proto::Empty {}))
        .await
        .unwrap();
    assert!(shutdown_rx.await.is_ok());
}

#[test]
fn test_chunk_record_conversion() {
    use crate::processor::ChunkOutcome;
    use crate::task::{AnalysisTask, ChunkSpan, ChunkState};

    let span = ChunkSpan {
        chunk_id: 0,
        start_time: 0.0,
        end_time: 1.5,
    };
    let mut task = AnalysisTask::new(TaskId::new(), &[span]);
    task.chunk_mut(0)
        .unwrap()
        .resolve(ChunkState::from(ChunkOutcome::Failed("boom".into())));

    let converted = proto::TaskSnapshot::from(&task.snapshot());
    let chunk = &converted.chunks[0];
    assert_eq!(chunk.status(), proto::ChunkStatus::Failed);
    assert_eq!(chunk.error.as_deref(), Some("boom"));
    assert!(chunk.features.is_none());
    assert!((chunk.end_time - 1.5).abs() < f64::EPSILON);
}

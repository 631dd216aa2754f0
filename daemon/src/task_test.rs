use super::*;

fn spans(pairs: &[ChunkSpan]) -> Vec<(f64, f64)> {
    pairs.iter().map(|s| (s.start_time, s.end_time)).collect()
}

#[test]
fn test_partition_with_short_last_chunk() {
    let chunks = partition(150.0, 60.0);
    assert_eq!(
        spans(&chunks),
        vec![(0.0, 60.0), (60.0, 120.0), (120.0, 150.0)]
    );
    assert_eq!(
        chunks.iter().map(|c| c.chunk_id).collect::<Vec<_>>(),
        vec![0, 1, 2]
    );
}

#[test]
fn test_partition_exact_multiple() {
    assert_eq!(spans(&partition(120.0, 60.0)), vec![(0.0, 60.0), (60.0, 120.0)]);
}

#[test]
fn test_partition_shorter_than_chunk() {
    assert_eq!(spans(&partition(0.5, 60.0)), vec![(0.0, 0.5)]);
}

#[test]
fn test_partition_tiles_duration() {
    for (duration, chunk) in [(10.0, 3.0), (7.25, 0.5), (1.0, 0.1), (59.999, 60.0)] {
        let chunks = partition(duration, chunk);
        let expected = (duration / chunk - 1e-9_f64).ceil() as usize;
        assert_eq!(chunks.len(), expected.max(1), "{duration}/{chunk}");
        assert_eq!(chunks[0].start_time, 0.0);
        assert_eq!(chunks.last().unwrap().end_time, duration);
        for pair in chunks.windows(2) {
            assert_eq!(pair[0].end_time, pair[1].start_time);
            assert!((pair[0].end_time - pair[0].start_time - chunk).abs() < 1e-9);
        }
    }
}

#[test]
fn test_partition_ignores_float_noise() {
    // 4800 samples at 16 kHz is 0.3 s, which does not divide exactly by 0.1.
    let duration = 4800.0 / 16000.0;
    assert_eq!(partition(duration, 0.1).len(), 3);
}

#[test]
fn test_sample_range_covers_buffer() {
    let len = 16000 * 150;
    let chunks = partition(150.0, 60.0);
    let ranges: Vec<_> = chunks.iter().map(|c| c.sample_range(len, 16000)).collect();
    assert_eq!(ranges[0], 0..960_000);
    assert_eq!(ranges[1], 960_000..1_920_000);
    assert_eq!(ranges[2], 1_920_000..len);
}

#[test]
fn test_new_task_is_all_processing() {
    let task = AnalysisTask::new(TaskId::new(), &partition(150.0, 60.0));
    let snapshot = task.snapshot();
    assert_eq!(snapshot.total_chunks(), 3);
    assert_eq!(snapshot.count(ChunkStatus::Processing), 3);
    assert!(!snapshot.is_complete());
    assert!(snapshot.chunks.iter().all(|c| c.features().is_none() && c.error().is_none()));
}

#[test]
fn test_resolve_is_one_way() {
    let mut record = ChunkRecord::processing(partition(1.0, 1.0)[0]);

    assert!(!record.resolve(ChunkState::Processing));
    assert!(record.resolve(ChunkState::Failed("boom".into())));
    assert_eq!(record.error(), Some("boom"));
    assert!(record.features().is_none());

    assert!(!record.resolve(ChunkState::Completed(FeatureSet::default())));
    assert_eq!(record.status(), ChunkStatus::Failed);
}

#[test]
fn test_completed_carries_features_only() {
    let mut record = ChunkRecord::processing(partition(1.0, 1.0)[0]);
    assert!(record.resolve(ChunkState::Completed(FeatureSet::default())));
    assert_eq!(record.features(), Some(&FeatureSet::default()));
    assert_eq!(record.error(), None);
}

#[test]
fn test_task_id_parse() {
    let id = TaskId::new();
    assert_eq!(id.to_string().parse::<TaskId>().unwrap(), id);
    assert!("not-a-uuid".parse::<TaskId>().is_err());
}

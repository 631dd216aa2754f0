//! Onset detection on a log-mel spectral-flux envelope.

/// Peak-picking windows, in frames.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(super) struct PeakParams {
    pub(super) pre_max: usize,
    pub(super) post_max: usize,
    pub(super) pre_avg: usize,
    pub(super) post_avg: usize,
    pub(super) delta: f32,
    pub(super) wait: usize,
}

impl PeakParams {
    /// Windows of 30 ms (max), 100 ms (mean) and 30 ms (wait) at the given frame rate.
    pub(super) fn for_frame_rate(frame_rate: f64) -> Self {
        let frames = |seconds: f64| ((seconds * frame_rate).round() as usize).max(1);
        Self {
            pre_max: frames(0.03),
            post_max: 1,
            pre_avg: frames(0.10),
            post_avg: frames(0.10) + 1,
            delta: 0.07,
            wait: frames(0.03),
        }
    }
}

/// Mean rectified dB increase across mel bands between consecutive frames.
pub(super) fn strength_envelope(log_mel: &[Vec<f32>]) -> Vec<f32> {
    let mut envelope = vec![0.0_f32; log_mel.len()];
    for (t, pair) in log_mel.windows(2).enumerate() {
        let (prev, next) = (&pair[0], &pair[1]);
        let rise: f32 = prev
            .iter()
            .zip(next)
            .map(|(a, b)| (b - a).max(0.0))
            .sum();
        envelope[t + 1] = rise / prev.len().max(1) as f32;
    }
    envelope
}

/// Frame indices of onsets in the envelope.
///
/// The envelope is normalized to [0, 1] first; a flat envelope has no onsets.
pub(super) fn pick_peaks(envelope: &[f32], params: PeakParams) -> Vec<usize> {
    let min = envelope.iter().copied().fold(f32::INFINITY, f32::min);
    let max = envelope.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let range = max - min;
    if !range.is_finite() || range <= f32::EPSILON {
        return Vec::new();
    }
    let normalized: Vec<f32> = envelope.iter().map(|v| (v - min) / range).collect();
    let len = normalized.len();

    let mut peaks = Vec::new();
    let mut last: Option<usize> = None;
    for (n, &value) in normalized.iter().enumerate() {
        let max_window = &normalized[n.saturating_sub(params.pre_max)..(n + params.post_max + 1).min(len)];
        if max_window.iter().any(|&v| v > value) {
            continue;
        }
        let avg_window = &normalized[n.saturating_sub(params.pre_avg)..(n + params.post_avg + 1).min(len)];
        let mean = avg_window.iter().sum::<f32>() / avg_window.len() as f32;
        if value < mean + params.delta {
            continue;
        }
        if last.is_some_and(|prev| n - prev <= params.wait) {
            continue;
        }
        peaks.push(n);
        last = Some(n);
    }
    peaks
}

/// Mean interval between consecutive onset times; `None` below two onsets.
pub(super) fn mean_interval(times: &[f64]) -> Option<f64> {
    if times.len() < 2 {
        return None;
    }
    let span: f64 = times.windows(2).map(|w| w[1] - w[0]).sum();
    Some(span / (times.len() - 1) as f64)
}

//! Spectral peak-picking pitch estimate.

use super::spectrum::Spectrogram;

#[derive(Debug, Clone, Copy)]
pub(super) struct PitchParams {
    pub(super) threshold: f64,
    pub(super) min_hz: f64,
    pub(super) max_hz: f64,
}

/// Mean frequency of prominent spectral peaks within the pitch band.
///
/// A bin survives when it is a local maximum and its magnitude reaches
/// `threshold` times the frame's peak. Returns 0.0 when nothing survives.
pub(super) fn estimate(spectrogram: &Spectrogram, params: PitchParams) -> f64 {
    let bin_hz = spectrogram.bin_frequency(1.0);
    let lowest = ((params.min_hz / bin_hz).ceil() as usize).max(1);
    let highest = (params.max_hz / bin_hz).floor() as usize;

    let mut sum = 0.0_f64;
    let mut count = 0usize;
    for frame in spectrogram.frames() {
        let peak = frame.iter().copied().fold(0.0_f32, f32::max) as f64;
        if peak <= f64::from(f32::EPSILON) {
            continue;
        }
        let upper = highest.min(frame.len().saturating_sub(2));
        for bin in lowest..=upper {
            let (left, center, right) = (
                frame[bin - 1] as f64,
                frame[bin] as f64,
                frame[bin + 1] as f64,
            );
            if center > left && center >= right && center >= params.threshold * peak {
                sum += spectrogram.bin_frequency(bin as f64 + parabolic_offset(left, center, right));
                count += 1;
            }
        }
    }

    if count == 0 { 0.0 } else { sum / count as f64 }
}

/// Sub-bin offset of a peak from a parabola fitted through three bins.
fn parabolic_offset(left: f64, center: f64, right: f64) -> f64 {
    let denom = left - 2.0 * center + right;
    if denom.abs() < f64::EPSILON {
        return 0.0;
    }
    (0.5 * (left - right) / denom).clamp(-0.5, 0.5)
}

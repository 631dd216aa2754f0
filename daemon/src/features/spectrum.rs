//! Short-time magnitude spectra and frame-level spectral descriptors.

use std::ops::Range;

use rustfft::FftPlanner;
use rustfft::num_complex::Complex;

/// Frame boundaries over a buffer of `len` samples.
///
/// Buffers shorter than one frame yield a single (zero-padded) frame; a tail
/// shorter than one hop is dropped.
pub(super) fn frame_ranges(len: usize, frame_length: usize, hop_length: usize) -> Vec<Range<usize>> {
    let frame_length = frame_length.max(1);
    let hop_length = hop_length.max(1);
    if len <= frame_length {
        return vec![0..len];
    }
    let count = 1 + (len - frame_length) / hop_length;
    (0..count)
        .map(|i| {
            let start = i * hop_length;
            start..start + frame_length
        })
        .collect()
}

/// Periodic Hann window.
pub(super) fn hann_window(length: usize) -> Vec<f32> {
    if length <= 1 {
        return vec![1.0; length.max(1)];
    }
    (0..length)
        .map(|n| {
            let phase = 2.0 * std::f32::consts::PI * n as f32 / length as f32;
            0.5 - 0.5 * phase.cos()
        })
        .collect()
}

/// Magnitude spectra of consecutive Hann-windowed frames.
#[derive(Debug, Clone)]
pub(super) struct Spectrogram {
    frames: Vec<Vec<f32>>,
    frame_length: usize,
    hop_length: usize,
    sample_rate: u32,
}

impl Spectrogram {
    pub(super) fn compute(
        samples: &[f32],
        sample_rate: u32,
        frame_length: usize,
        hop_length: usize,
    ) -> Self {
        let frame_length = frame_length.max(2);
        let bins = frame_length / 2 + 1;
        let window = hann_window(frame_length);
        let fft = FftPlanner::<f32>::new().plan_fft_forward(frame_length);
        let mut buffer = vec![Complex::new(0.0_f32, 0.0); frame_length];

        let frames = frame_ranges(samples.len(), frame_length, hop_length)
            .into_iter()
            .map(|range| {
                let frame = &samples[range];
                for (i, cell) in buffer.iter_mut().enumerate() {
                    let sample = frame.get(i).copied().unwrap_or(0.0);
                    *cell = Complex::new(sample * window[i], 0.0);
                }
                fft.process(&mut buffer);
                buffer[..bins].iter().map(|c| c.norm()).collect()
            })
            .collect();

        Self {
            frames,
            frame_length,
            hop_length: hop_length.max(1),
            sample_rate,
        }
    }

    pub(super) fn frames(&self) -> &[Vec<f32>] {
        &self.frames
    }

    pub(super) fn frame_length(&self) -> usize {
        self.frame_length
    }

    pub(super) fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Center frequency of an FFT bin in Hz.
    pub(super) fn bin_frequency(&self, bin: f64) -> f64 {
        bin * self.sample_rate as f64 / self.frame_length as f64
    }

    /// Start time of a frame in seconds.
    pub(super) fn frame_time(&self, frame: usize) -> f64 {
        (frame * self.hop_length) as f64 / self.sample_rate.max(1) as f64
    }

    /// Frames per second.
    pub(super) fn frame_rate(&self) -> f64 {
        self.sample_rate as f64 / self.hop_length as f64
    }
}

/// Frame-averaged spectral shape descriptors, in Hz except flux.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub(super) struct SpectralSummary {
    pub(super) centroid: f64,
    pub(super) bandwidth: f64,
    pub(super) flux: f64,
    pub(super) rolloff: f64,
}

pub(super) fn summarize(spectrogram: &Spectrogram, rolloff_fraction: f64) -> SpectralSummary {
    let frames = spectrogram.frames();
    if frames.is_empty() {
        return SpectralSummary::default();
    }

    let mut centroid_sum = 0.0;
    let mut bandwidth_sum = 0.0;
    let mut rolloff_sum = 0.0;
    for frame in frames {
        let centroid = centroid(spectrogram, frame);
        centroid_sum += centroid;
        bandwidth_sum += bandwidth(spectrogram, frame, centroid);
        rolloff_sum += rolloff(spectrogram, frame, rolloff_fraction);
    }

    let count = frames.len() as f64;
    SpectralSummary {
        centroid: centroid_sum / count,
        bandwidth: bandwidth_sum / count,
        flux: flux(frames),
        rolloff: rolloff_sum / count,
    }
}

fn centroid(spectrogram: &Spectrogram, magnitudes: &[f32]) -> f64 {
    let mut total = 0.0_f64;
    let mut weighted = 0.0_f64;
    for (bin, &m) in magnitudes.iter().enumerate() {
        let m = m as f64;
        total += m;
        weighted += m * spectrogram.bin_frequency(bin as f64);
    }
    if total <= 0.0 { 0.0 } else { weighted / total }
}

fn bandwidth(spectrogram: &Spectrogram, magnitudes: &[f32], centroid: f64) -> f64 {
    let mut total = 0.0_f64;
    let mut spread = 0.0_f64;
    for (bin, &m) in magnitudes.iter().enumerate() {
        let m = m as f64;
        let diff = spectrogram.bin_frequency(bin as f64) - centroid;
        total += m;
        spread += m * diff * diff;
    }
    if total <= 0.0 {
        0.0
    } else {
        (spread / total).sqrt()
    }
}

fn rolloff(spectrogram: &Spectrogram, magnitudes: &[f32], fraction: f64) -> f64 {
    let total: f64 = magnitudes.iter().map(|&m| (m as f64) * (m as f64)).sum();
    if total <= 0.0 {
        return 0.0;
    }
    let target = total * fraction;
    let mut cumulative = 0.0_f64;
    for (bin, &m) in magnitudes.iter().enumerate() {
        cumulative += (m as f64) * (m as f64);
        if cumulative >= target {
            return spectrogram.bin_frequency(bin as f64);
        }
    }
    spectrogram.sample_rate() as f64 / 2.0
}

fn flux(frames: &[Vec<f32>]) -> f64 {
    if frames.len() < 2 {
        return 0.0;
    }
    let total: f64 = frames
        .windows(2)
        .map(|pair| {
            let (prev, next) = (&pair[0], &pair[1]);
            let diff: f64 = prev
                .iter()
                .zip(next)
                .map(|(&a, &b)| (b as f64 - a as f64).abs())
                .sum();
            diff / prev.len().max(1) as f64
        })
        .sum();
    total / (frames.len() - 1) as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, sample_rate: u32, seconds: f32) -> Vec<f32> {
        let len = (sample_rate as f32 * seconds) as usize;
        (0..len)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate as f32).sin())
            .collect()
    }

    #[test]
    fn test_frame_ranges_short_buffer_is_single_frame() {
        assert_eq!(frame_ranges(100, 2048, 512), vec![0..100]);
        assert_eq!(frame_ranges(0, 2048, 512), vec![0..0]);
    }

    #[test]
    fn test_frame_ranges_hop() {
        let ranges = frame_ranges(4096, 2048, 512);
        assert_eq!(ranges.len(), 5);
        assert_eq!(ranges[0], 0..2048);
        assert_eq!(ranges[4], 2048..4096);
    }

    #[test]
    fn test_hann_window_endpoints() {
        let window = hann_window(8);
        assert_eq!(window.len(), 8);
        assert!(window[0].abs() < 1e-6);
        assert!((window[4] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_sine_centroid_tracks_frequency() {
        let samples = sine(1000.0, 16000, 0.5);
        let spectrogram = Spectrogram::compute(&samples, 16000, 2048, 512);
        let summary = summarize(&spectrogram, 0.85);

        assert!((summary.centroid - 1000.0).abs() < 50.0, "{summary:?}");
        assert!(summary.rolloff > 950.0 && summary.rolloff < 1100.0, "{summary:?}");
        assert!(summary.bandwidth < 200.0, "{summary:?}");
    }

    #[test]
    fn test_silence_summarizes_to_zero() {
        let spectrogram = Spectrogram::compute(&[0.0; 8000], 16000, 2048, 512);
        assert_eq!(summarize(&spectrogram, 0.85), SpectralSummary::default());
    }

    #[test]
    fn test_flux_zero_for_stationary_signal_frames() {
        let frames = vec![vec![1.0, 2.0, 3.0]; 4];
        assert_eq!(flux(&frames), 0.0);

        let changing = vec![vec![0.0, 0.0], vec![1.0, 3.0]];
        assert!((flux(&changing) - 2.0).abs() < 1e-12);
    }
}

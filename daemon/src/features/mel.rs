//! Mel filterbank, decibel scaling and cepstral coefficients.

use super::spectrum::Spectrogram;

/// Power floor applied before taking logarithms.
const POWER_FLOOR: f32 = 1e-10;

/// Dynamic range kept below the loudest band when computing MFCCs.
const TOP_DB: f32 = 80.0;

fn hz_to_mel(hz: f64) -> f64 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

fn mel_to_hz(mel: f64) -> f64 {
    700.0 * (10f64.powf(mel / 2595.0) - 1.0)
}

/// Triangular filters spaced evenly on the mel scale between 0 Hz and Nyquist.
#[derive(Debug, Clone)]
pub(super) struct MelFilterBank {
    filters: Vec<Vec<(usize, f32)>>,
}

impl MelFilterBank {
    pub(super) fn new(sample_rate: u32, frame_length: usize, bands: usize) -> Self {
        let bins = frame_length / 2 + 1;
        let nyquist = sample_rate as f64 / 2.0;
        let mel_max = hz_to_mel(nyquist);
        let edges: Vec<f64> = (0..bands + 2)
            .map(|i| mel_to_hz(mel_max * i as f64 / (bands + 1) as f64))
            .collect();
        let bin_hz = sample_rate as f64 / frame_length.max(1) as f64;

        let filters = edges
            .windows(3)
            .map(|edge| {
                let (left, center, right) = (edge[0], edge[1], edge[2]);
                (0..bins)
                    .filter_map(|bin| {
                        let freq = bin as f64 * bin_hz;
                        let rising = (freq - left) / (center - left).max(f64::EPSILON);
                        let falling = (right - freq) / (right - center).max(f64::EPSILON);
                        let weight = rising.min(falling);
                        (weight > 0.0).then_some((bin, weight as f32))
                    })
                    .collect()
            })
            .collect();

        Self { filters }
    }

    pub(super) fn bands(&self) -> usize {
        self.filters.len()
    }

    /// Band energies of one power spectrum.
    pub(super) fn apply(&self, power: &[f32]) -> Vec<f32> {
        self.filters
            .iter()
            .map(|filter| {
                filter
                    .iter()
                    .map(|&(bin, weight)| power.get(bin).copied().unwrap_or(0.0) * weight)
                    .sum()
            })
            .collect()
    }
}

/// Log-mel energies (dB) for every frame of the spectrogram.
pub(super) fn log_mel_frames(spectrogram: &Spectrogram, bank: &MelFilterBank) -> Vec<Vec<f32>> {
    spectrogram
        .frames()
        .iter()
        .map(|magnitudes| {
            let power: Vec<f32> = magnitudes.iter().map(|m| m * m).collect();
            bank.apply(&power)
                .into_iter()
                .map(|energy| 10.0 * energy.max(POWER_FLOOR).log10())
                .collect()
        })
        .collect()
}

/// Orthonormal DCT-II.
pub(super) fn dct_ii(input: &[f32]) -> Vec<f64> {
    let n = input.len();
    if n == 0 {
        return Vec::new();
    }
    let scale_first = (1.0 / n as f64).sqrt();
    let scale_rest = (2.0 / n as f64).sqrt();
    (0..n)
        .map(|k| {
            let sum: f64 = input
                .iter()
                .enumerate()
                .map(|(i, &x)| {
                    x as f64 * (std::f64::consts::PI * k as f64 * (i as f64 + 0.5) / n as f64).cos()
                })
                .sum();
            sum * if k == 0 { scale_first } else { scale_rest }
        })
        .collect()
}

/// Mean MFCC vector across frames.
///
/// The log-mel frames are clipped to `TOP_DB` below the chunk maximum before
/// the transform.
pub(super) fn mean_mfcc(log_mel: &[Vec<f32>], coefficients: usize) -> Vec<f64> {
    let mut mean = vec![0.0_f64; coefficients];
    if log_mel.is_empty() {
        return mean;
    }

    let peak = log_mel
        .iter()
        .flatten()
        .copied()
        .fold(f32::NEG_INFINITY, f32::max);
    let floor = peak - TOP_DB;

    for frame in log_mel {
        let clipped: Vec<f32> = frame.iter().map(|&db| db.max(floor)).collect();
        for (slot, value) in mean.iter_mut().zip(dct_ii(&clipped)) {
            *slot += value;
        }
    }
    let count = log_mel.len() as f64;
    mean.iter_mut().for_each(|v| *v /= count);
    mean
}

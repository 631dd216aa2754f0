//! Time-domain descriptors.

use super::spectrum::frame_ranges;

pub(super) fn rms(samples: &[f32]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    (sum / samples.len() as f64).sqrt()
}

/// Frame-averaged fraction of adjacent sample pairs that change sign.
pub(super) fn zero_crossing_rate(samples: &[f32], frame_length: usize, hop_length: usize) -> f64 {
    let ranges = frame_ranges(samples.len(), frame_length, hop_length);
    let rates: Vec<f64> = ranges
        .into_iter()
        .map(|range| {
            let frame = &samples[range];
            if frame.len() < 2 {
                return 0.0;
            }
            let crossings = frame
                .windows(2)
                .filter(|w| (w[0] >= 0.0) != (w[1] >= 0.0))
                .count();
            crossings as f64 / (frame.len() - 1) as f64
        })
        .collect();
    if rates.is_empty() {
        0.0
    } else {
        rates.iter().sum::<f64>() / rates.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rms() {
        assert_eq!(rms(&[]), 0.0);
        assert_eq!(rms(&[0.0; 16]), 0.0);
        assert!((rms(&[0.5, -0.5, 0.5, -0.5]) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_zcr_alternating_signal() {
        let samples: Vec<f32> = (0..4096).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        assert!((zero_crossing_rate(&samples, 2048, 512) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_zcr_sine() {
        let samples: Vec<f32> = (0..16000)
            .map(|i| (2.0 * std::f32::consts::PI * 1000.0 * (i as f32 + 0.25) / 16000.0).sin())
            .collect();
        let zcr = zero_crossing_rate(&samples, 2048, 512);
        assert!((zcr - 0.125).abs() < 0.005, "zcr = {zcr}");
    }

    #[test]
    fn test_zcr_silence_and_tiny_buffers() {
        assert_eq!(zero_crossing_rate(&[0.0; 1000], 2048, 512), 0.0);
        assert_eq!(zero_crossing_rate(&[0.3], 2048, 512), 0.0);
    }
}

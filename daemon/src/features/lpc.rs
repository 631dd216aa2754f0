//! Linear prediction and formant estimation.

use rustfft::num_complex::Complex;

const ROOT_ITERATIONS: usize = 500;
const ROOT_TOLERANCE: f64 = 1e-12;
const MAX_FORMANTS: usize = 3;

pub(super) fn pre_emphasis(samples: &[f32], coefficient: f64) -> Vec<f64> {
    let mut out = Vec::with_capacity(samples.len());
    let mut previous = 0.0_f64;
    for (i, &sample) in samples.iter().enumerate() {
        let sample = sample as f64;
        out.push(if i == 0 { sample } else { sample - coefficient * previous });
        previous = sample;
    }
    out
}

/// Biased autocorrelation for lags `0..=order`.
pub(super) fn autocorrelation(signal: &[f64], order: usize) -> Vec<f64> {
    (0..=order)
        .map(|lag| {
            signal
                .iter()
                .zip(signal.iter().skip(lag))
                .map(|(a, b)| a * b)
                .sum()
        })
        .collect()
}

/// Prediction polynomial `[1, a1, .., ap]` via Levinson–Durbin.
///
/// Returns `None` for a zero-energy signal. Recursion stops early once the
/// prediction error vanishes; remaining coefficients stay zero.
pub(super) fn levinson_durbin(r: &[f64], order: usize) -> Option<Vec<f64>> {
    let energy = *r.first()?;
    if energy.is_nan() || energy <= 0.0 || r.len() <= order {
        return None;
    }

    let mut a = vec![0.0_f64; order + 1];
    a[0] = 1.0;
    let mut error = energy;
    for i in 1..=order {
        let acc: f64 = r[i] + (1..i).map(|j| a[j] * r[i - j]).sum::<f64>();
        let k = -acc / error;
        let previous = a.clone();
        for j in 1..i {
            a[j] = previous[j] + k * previous[i - j];
        }
        a[i] = k;
        error *= 1.0 - k * k;
        if error <= energy * 1e-12 {
            break;
        }
    }
    Some(a)
}

/// Roots of a polynomial given highest-degree coefficient first (Durand–Kerner).
pub(super) fn polynomial_roots(coefficients: &[f64]) -> Vec<Complex<f64>> {
    let Some(lead_index) = coefficients.iter().position(|c| *c != 0.0) else {
        return Vec::new();
    };
    let lead = coefficients[lead_index];
    let monic: Vec<f64> = coefficients[lead_index..].iter().map(|c| c / lead).collect();
    let degree = monic.len() - 1;
    if degree == 0 {
        return Vec::new();
    }

    let eval = |z: Complex<f64>| {
        monic
            .iter()
            .fold(Complex::new(0.0, 0.0), |acc, &c| acc * z + c)
    };

    let seed = Complex::new(0.4, 0.9);
    let mut roots: Vec<Complex<f64>> = (0..degree).map(|i| seed.powu(i as u32)).collect();
    for _ in 0..ROOT_ITERATIONS {
        let mut largest_step = 0.0_f64;
        for i in 0..degree {
            let z = roots[i];
            let denominator = roots
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != i)
                .fold(Complex::new(1.0, 0.0), |acc, (_, &other)| acc * (z - other));
            if denominator.norm() < f64::MIN_POSITIVE {
                roots[i] = z + Complex::new(1e-6, 1e-6);
                largest_step = f64::INFINITY;
                continue;
            }
            let step = eval(z) / denominator;
            roots[i] = z - step;
            largest_step = largest_step.max(step.norm());
        }
        if largest_step < ROOT_TOLERANCE {
            break;
        }
    }
    roots.retain(|z| z.re.is_finite() && z.im.is_finite());
    roots
}

/// Formant frequencies implied by a prediction polynomial, ascending, at most three.
pub(super) fn formants_from_coefficients(a: &[f64], sample_rate: u32) -> Vec<f64> {
    let nyquist = sample_rate as f64 / 2.0;
    let mut formants: Vec<f64> = polynomial_roots(a)
        .into_iter()
        .filter(|root| root.im > 0.0)
        .map(|root| root.arg() * sample_rate as f64 / (2.0 * std::f64::consts::PI))
        .filter(|f| *f > 0.0 && *f < nyquist)
        .collect();
    formants.sort_by(f64::total_cmp);
    formants.truncate(MAX_FORMANTS);
    formants
}

pub(super) fn formants(samples: &[f32], sample_rate: u32, order: usize, emphasis: f64) -> Vec<f64> {
    let emphasized = pre_emphasis(samples, emphasis);
    let r = autocorrelation(&emphasized, order);
    match levinson_durbin(&r, order) {
        Some(a) => formants_from_coefficients(&a, sample_rate),
        None => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Deterministic uniform noise in [-1, 1).
    fn noise(len: usize, mut state: u64) -> Vec<f64> {
        (0..len)
            .map(|_| {
                state = state
                    .wrapping_mul(6364136223846793005)
                    .wrapping_add(1442695040888963407);
                ((state >> 11) as f64 / (1u64 << 53) as f64) * 2.0 - 1.0
            })
            .collect()
    }

    /// Second-order resonator at `freq` driven by white noise.
    fn resonator(freq: f64, radius: f64, sample_rate: f64, len: usize) -> Vec<f64> {
        let theta = 2.0 * std::f64::consts::PI * freq / sample_rate;
        let (b1, b2) = (2.0 * radius * theta.cos(), -radius * radius);
        let mut out = vec![0.0; len];
        for (n, e) in noise(len, 7).into_iter().enumerate() {
            let y1 = if n >= 1 { out[n - 1] } else { 0.0 };
            let y2 = if n >= 2 { out[n - 2] } else { 0.0 };
            out[n] = e + b1 * y1 + b2 * y2;
        }
        out
    }

    #[test]
    fn test_pre_emphasis() {
        let out = pre_emphasis(&[1.0, 1.0, 0.0], 0.5);
        assert_eq!(out, vec![1.0, 0.5, -0.5]);
    }

    #[test]
    fn test_levinson_zero_energy() {
        assert!(levinson_durbin(&[0.0, 0.0, 0.0], 2).is_none());
    }

    #[test]
    fn test_polynomial_roots_quadratic() {
        // z^2 + 1
        let mut roots = polynomial_roots(&[1.0, 0.0, 1.0]);
        roots.sort_by(|a, b| a.im.total_cmp(&b.im));
        assert!((roots[0] - Complex::new(0.0, -1.0)).norm() < 1e-9);
        assert!((roots[1] - Complex::new(0.0, 1.0)).norm() < 1e-9);
    }

    #[test]
    fn test_polynomial_roots_real() {
        // (z - 0.5)(z - 0.25)
        let mut roots = polynomial_roots(&[1.0, -0.75, 0.125]);
        roots.sort_by(|a, b| a.re.total_cmp(&b.re));
        assert!((roots[0].re - 0.25).abs() < 1e-9);
        assert!((roots[1].re - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_resonance_recovered_by_second_order_prediction() {
        let signal = resonator(800.0, 0.98, 16000.0, 16000);
        let a = levinson_durbin(&autocorrelation(&signal, 2), 2).unwrap();
        let found = formants_from_coefficients(&a, 16000);
        assert_eq!(found.len(), 1);
        assert!((found[0] - 800.0).abs() < 40.0, "found {found:?}");
    }

    #[test]
    fn test_formants_are_bounded_and_sorted() {
        let samples: Vec<f32> = noise(4000, 3).into_iter().map(|v| v as f32).collect();
        let found = formants(&samples, 16000, 8, 0.97);
        assert!(found.len() <= 3);
        assert!(found.windows(2).all(|w| w[0] <= w[1]));
        assert!(found.iter().all(|f| *f > 0.0 && *f < 8000.0));
    }

    #[test]
    fn test_formants_of_silence_are_empty() {
        assert!(formants(&[0.0; 1024], 16000, 8, 0.97).is_empty());
    }
}

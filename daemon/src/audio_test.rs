use super::*;
use hound::{WavSpec, WavWriter};
use tempfile::TempDir;

fn write_wav(path: &Path, spec: WavSpec, frames: &[Vec<f32>]) {
    let mut writer = WavWriter::create(path, spec).unwrap();
    for frame in frames {
        for &sample in frame {
            match spec.sample_format {
                SampleFormat::Float => writer.write_sample(sample).unwrap(),
                SampleFormat::Int => {
                    let max = (1_i32 << (spec.bits_per_sample - 1)) as f32;
                    writer.write_sample((sample * max) as i32).unwrap();
                }
            }
        }
    }
    writer.finalize().unwrap();
}

#[test]
fn test_recording_duration() {
    let recording = Recording::new(vec![0.0; 8000], 16000);
    assert!((recording.duration_secs() - 0.5).abs() < f64::EPSILON);
    assert_eq!(Recording::new(vec![0.0; 10], 0).duration_secs(), 0.0);
}

#[test]
fn test_to_mono_passthrough() {
    let samples = vec![0.1, 0.2, 0.3];
    assert_eq!(to_mono(&samples, 1), samples);
}

#[test]
fn test_to_mono_stereo() {
    let mono = to_mono(&[0.2, 0.4, 0.6, 0.8], 2);

    assert_eq!(mono.len(), 2);
    assert!((mono[0] - 0.3).abs() < f32::EPSILON);
    assert!((mono[1] - 0.7).abs() < f32::EPSILON);
}

#[test]
fn test_to_mono_drops_partial_frame() {
    let mono = to_mono(&[0.1, 0.2, 0.3, 0.4, 0.9], 4);
    assert_eq!(mono.len(), 1);
    assert!((mono[0] - 0.25).abs() < f32::EPSILON);
}

#[test]
fn test_decode_int16_stereo() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("stereo.wav");
    let spec = WavSpec {
        channels: 2,
        sample_rate: 22050,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    write_wav(&path, spec, &[vec![0.5, 0.0], vec![-0.5, -0.5], vec![0.25, 0.75]]);

    let recording = decode_wav(&path).unwrap();
    assert_eq!(recording.sample_rate, 22050);
    assert_eq!(recording.samples.len(), 3);
    let expected = [0.25, -0.5, 0.5];
    for (got, want) in recording.samples.iter().zip(expected) {
        assert!((got - want).abs() < 1e-3, "{got} vs {want}");
    }
}

#[test]
fn test_decode_float_mono() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("mono.wav");
    let spec = WavSpec {
        channels: 1,
        sample_rate: 16000,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };
    write_wav(&path, spec, &[vec![0.125], vec![-1.0], vec![1.0]]);

    let recording = decode_wav(&path).unwrap();
    assert_eq!(recording, Recording::new(vec![0.125, -1.0, 1.0], 16000));
}

#[test]
fn test_decode_missing_file_errors() {
    let temp = TempDir::new().unwrap();
    let err = decode_wav(&temp.path().join("missing.wav")).unwrap_err();
    assert!(err.to_string().contains("missing.wav"));
}

#[test]
fn test_decode_garbage_errors() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("garbage.wav");
    std::fs::write(&path, b"definitely not RIFF").unwrap();
    assert!(decode_wav(&path).is_err());
}

#[test]
fn test_resample_same_rate_is_identity() {
    let recording = Recording::new(vec![0.1, 0.2, 0.3], 16000);
    assert_eq!(recording.clone().resample(16000).unwrap(), recording);
}

#[test]
fn test_resample_downsample_length() {
    let recording = Recording::new(vec![0.5; 48000], 48000);
    let resampled = recording.resample(16000).unwrap();

    assert_eq!(resampled.sample_rate, 16000);
    assert!(
        (resampled.samples.len() as i64 - 16000).abs() < 100,
        "got {} samples",
        resampled.samples.len()
    );
}

#[test]
fn test_resample_upsample_length() {
    let recording = Recording::new(vec![0.5; 8000], 8000);
    let resampled = recording.resample(16000).unwrap();

    assert!((resampled.samples.len() as i64 - 16000).abs() < 100);
}

#[test]
fn test_resampler_rejects_zero_rate() {
    assert!(AudioResampler::new(0, 16000, 1024).is_err());
}

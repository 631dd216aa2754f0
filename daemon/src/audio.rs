//! Loading recordings for analysis.
//!
//! WAV files are decoded with `hound`, down-mixed to mono and optionally
//! resampled with `rubato` before they are submitted to the daemon.

use std::path::Path;

use anyhow::{Context, Result, bail};
use audioadapter_buffers::owned::InterleavedOwned;
use hound::{SampleFormat, WavReader};
use rubato::{Fft, FixedSync, Resampler};

/// Input frames per resampler pass.
const RESAMPLE_CHUNK: usize = 1024;

/// Mono f32 samples at a known sample rate.
#[derive(Debug, Clone, PartialEq)]
pub struct Recording {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl Recording {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Duration in seconds.
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Convert to `target_rate`. A no-op when the rates already match.
    pub fn resample(self, target_rate: u32) -> Result<Self> {
        if target_rate == self.sample_rate || self.samples.is_empty() {
            return Ok(Self {
                sample_rate: target_rate,
                ..self
            });
        }
        let mut resampler = AudioResampler::new(self.sample_rate, target_rate, RESAMPLE_CHUNK)?;
        let samples = resampler.process_all(&self.samples)?;
        Ok(Self::new(samples, target_rate))
    }
}

/// Decode a WAV file to mono f32 samples in `[-1, 1]`.
pub fn decode_wav(path: &Path) -> Result<Recording> {
    let reader =
        WavReader::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let spec = reader.spec();
    if spec.channels == 0 {
        bail!("{} declares zero channels", path.display());
    }

    let interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<Result<_, _>>()
            .context("Failed to read float samples")?,
        SampleFormat::Int => {
            let scale = 1.0 / (1_i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 * scale))
                .collect::<Result<_, _>>()
                .context("Failed to read integer samples")?
        }
    };

    Ok(Recording::new(
        to_mono(&interleaved, spec.channels),
        spec.sample_rate,
    ))
}

/// Convert multi-channel interleaved samples to mono by averaging all channels.
pub fn to_mono(samples: &[f32], channels: u16) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }

    let channels = channels as usize;
    samples
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Fixed-input-size FFT resampler for mono audio.
pub struct AudioResampler {
    resampler: Fft<f32>,
}

impl AudioResampler {
    pub fn new(input_rate: u32, output_rate: u32, chunk_size: usize) -> Result<Self> {
        if input_rate == 0 || output_rate == 0 {
            bail!("Sample rates must be positive ({input_rate} -> {output_rate})");
        }
        let resampler = Fft::new(
            input_rate as usize,
            output_rate as usize,
            chunk_size,
            1, // sub_chunks
            1, // channels
            FixedSync::Input,
        )
        .context("Failed to create resampler")?;

        Ok(Self { resampler })
    }

    /// Resample a complete signal, flushing the filter delay.
    pub fn process_all(&mut self, input: &[f32]) -> Result<Vec<f32>> {
        if input.is_empty() {
            return Ok(Vec::new());
        }
        let output_len = self.resampler.process_all_needed_output_len(input.len());
        let input_buf = InterleavedOwned::new_from(input.to_vec(), 1, input.len())
            .context("Invalid resampler input")?;
        let mut output_buf = InterleavedOwned::new(0.0f32, 1, output_len);

        let (_, written) = self
            .resampler
            .process_all_into_buffer(&input_buf, &mut output_buf, input.len(), None)
            .context("Resampling failed")?;

        let mut output = output_buf.take_data();
        output.truncate(written);
        Ok(output)
    }
}

#[cfg(test)]
#[path = "audio_test.rs"]
mod tests;

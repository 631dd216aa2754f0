//! Per-chunk feature extraction.
//!
//! [`FeatureEngine`] turns one mono sample buffer into a [`FeatureSet`] holding
//! one record per requested [`FeatureCategory`]. Extraction is deterministic
//! and free of I/O; shared intermediate results (spectrogram, log-mel frames,
//! onsets) are computed at most once per call.

mod lpc;
mod mel;
mod onset;
mod pitch;
mod spectrum;
mod temporal;

use std::cell::OnceCell;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use mel::MelFilterBank;
use onset::PeakParams;
use pitch::PitchParams;
use spectrum::{SpectralSummary, Spectrogram};

/// Number of cepstral coefficients reported per chunk.
pub const MFCC_COEFFICIENTS: usize = 13;

/// Centroid (Hz) treated as fully aroused.
const AROUSAL_CENTROID_HZ: f64 = 5000.0;
/// Zero-crossing rate treated as fully aroused.
const AROUSAL_ZCR: f64 = 0.25;
/// Rolloff (Hz) treated as maximal valence.
const VALENCE_ROLLOFF_HZ: f64 = 12000.0;

/// Feature family requested for a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FeatureCategory {
    Acoustic,
    Speaker,
    Paralinguistic,
}

impl FeatureCategory {
    pub const ALL: [FeatureCategory; 3] = [
        FeatureCategory::Acoustic,
        FeatureCategory::Speaker,
        FeatureCategory::Paralinguistic,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FeatureCategory::Acoustic => "acoustic",
            FeatureCategory::Speaker => "speaker",
            FeatureCategory::Paralinguistic => "paralinguistic",
        }
    }
}

impl fmt::Display for FeatureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown feature category: {0}")]
pub struct UnknownCategory(pub String);

impl FromStr for FeatureCategory {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FeatureCategory::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownCategory(s.to_string()))
    }
}

/// Requested categories, deduplicated and in a stable order.
pub type CategorySet = BTreeSet<FeatureCategory>;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SpectralFeatures {
    pub centroid: f64,
    pub bandwidth: f64,
    pub flux: f64,
    pub rolloff: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AcousticFeatures {
    pub mfcc: Vec<f64>,
    /// Hz, 0.0 when no pitch was found.
    pub pitch: f64,
    /// Up to three formant frequencies in Hz, ascending.
    pub formants: Vec<f64>,
    /// RMS energy.
    pub energy: f64,
    pub zcr: f64,
    pub spectral: SpectralFeatures,
    /// Mean inter-onset interval in seconds, absent below two onsets.
    pub voice_onset_time: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SpeakerFeatures {
    /// Onsets per second.
    pub speaking_rate: f64,
    pub voice_onset_time: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ParalinguisticFeatures {
    pub arousal: f64,
    pub valence: f64,
}

/// Extraction result for one chunk; a field is present iff its category was requested.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureSet {
    pub acoustic: Option<AcousticFeatures>,
    pub speaker: Option<SpeakerFeatures>,
    pub paralinguistic: Option<ParalinguisticFeatures>,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("sample buffer is empty")]
    EmptyBuffer,
    #[error("invalid sample rate: {0}")]
    InvalidSampleRate(u32),
}

/// Something that can compute a feature set from a sample buffer.
pub trait FeatureExtractor: Send + Sync {
    fn extract(
        &self,
        samples: &[f32],
        sample_rate: u32,
        categories: &CategorySet,
    ) -> Result<FeatureSet, ExtractionError>;
}

/// Analysis parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub frame_length: usize,
    pub hop_length: usize,
    pub mel_bands: usize,
    pub lpc_order: usize,
    pub pre_emphasis: f64,
    pub pitch_threshold: f64,
    pub pitch_min_hz: f64,
    pub pitch_max_hz: f64,
    pub rolloff_fraction: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            frame_length: 2048,
            hop_length: 512,
            mel_bands: 13,
            lpc_order: 8,
            pre_emphasis: 0.97,
            pitch_threshold: 0.7,
            pitch_min_hz: 60.0,
            pitch_max_hz: 4000.0,
            rolloff_fraction: 0.85,
        }
    }
}

/// Spectral, cepstral and linear-prediction feature engine.
#[derive(Debug, Clone, Default)]
pub struct FeatureEngine {
    config: EngineConfig,
}

impl FeatureEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }
}

impl FeatureExtractor for FeatureEngine {
    fn extract(
        &self,
        samples: &[f32],
        sample_rate: u32,
        categories: &CategorySet,
    ) -> Result<FeatureSet, ExtractionError> {
        if samples.is_empty() {
            return Err(ExtractionError::EmptyBuffer);
        }
        if sample_rate == 0 {
            return Err(ExtractionError::InvalidSampleRate(sample_rate));
        }

        let samples: Vec<f32> = samples
            .iter()
            .map(|s| if s.is_finite() { *s } else { 0.0 })
            .collect();
        let analysis = ChunkAnalysis::new(&samples, sample_rate, &self.config);

        let mut set = FeatureSet::default();
        for category in categories {
            match category {
                FeatureCategory::Acoustic => set.acoustic = Some(analysis.acoustic()),
                FeatureCategory::Speaker => set.speaker = Some(analysis.speaker()),
                FeatureCategory::Paralinguistic => {
                    set.paralinguistic = Some(analysis.paralinguistic())
                }
            }
        }
        Ok(set)
    }
}

/// Lazily shared intermediates for one extraction call.
struct ChunkAnalysis<'a> {
    samples: &'a [f32],
    sample_rate: u32,
    config: &'a EngineConfig,
    spectrogram: Spectrogram,
    spectral: OnceCell<SpectralSummary>,
    zcr: OnceCell<f64>,
    log_mel: OnceCell<Vec<Vec<f32>>>,
    onsets: OnceCell<Vec<f64>>,
}

impl<'a> ChunkAnalysis<'a> {
    fn new(samples: &'a [f32], sample_rate: u32, config: &'a EngineConfig) -> Self {
        Self {
            samples,
            sample_rate,
            config,
            spectrogram: Spectrogram::compute(
                samples,
                sample_rate,
                config.frame_length,
                config.hop_length,
            ),
            spectral: OnceCell::new(),
            zcr: OnceCell::new(),
            log_mel: OnceCell::new(),
            onsets: OnceCell::new(),
        }
    }

    fn duration(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }

    fn spectral(&self) -> SpectralSummary {
        *self
            .spectral
            .get_or_init(|| spectrum::summarize(&self.spectrogram, self.config.rolloff_fraction))
    }

    fn zcr(&self) -> f64 {
        *self.zcr.get_or_init(|| {
            temporal::zero_crossing_rate(
                self.samples,
                self.config.frame_length,
                self.config.hop_length,
            )
        })
    }

    fn log_mel(&self) -> &[Vec<f32>] {
        self.log_mel.get_or_init(|| {
            let bank = MelFilterBank::new(
                self.sample_rate,
                self.spectrogram.frame_length(),
                self.config.mel_bands.max(1),
            );
            mel::log_mel_frames(&self.spectrogram, &bank)
        })
    }

    /// Onset times in seconds from the chunk start.
    fn onsets(&self) -> &[f64] {
        self.onsets.get_or_init(|| {
            let envelope = onset::strength_envelope(self.log_mel());
            let params = PeakParams::for_frame_rate(self.spectrogram.frame_rate());
            onset::pick_peaks(&envelope, params)
                .into_iter()
                .map(|frame| self.spectrogram.frame_time(frame))
                .collect()
        })
    }

    fn acoustic(&self) -> AcousticFeatures {
        let summary = self.spectral();
        let pitch = pitch::estimate(
            &self.spectrogram,
            PitchParams {
                threshold: self.config.pitch_threshold,
                min_hz: self.config.pitch_min_hz,
                max_hz: self.config.pitch_max_hz,
            },
        );
        let formants = lpc::formants(
            self.samples,
            self.sample_rate,
            self.config.lpc_order,
            self.config.pre_emphasis,
        );

        AcousticFeatures {
            mfcc: mel::mean_mfcc(self.log_mel(), MFCC_COEFFICIENTS)
                .into_iter()
                .map(finite)
                .collect(),
            pitch: finite(pitch),
            formants: formants.into_iter().filter(|f| f.is_finite()).collect(),
            energy: finite(temporal::rms(self.samples)),
            zcr: finite(self.zcr()),
            spectral: SpectralFeatures {
                centroid: finite(summary.centroid),
                bandwidth: finite(summary.bandwidth),
                flux: finite(summary.flux),
                rolloff: finite(summary.rolloff),
            },
            voice_onset_time: onset::mean_interval(self.onsets()).map(finite),
        }
    }

    fn speaker(&self) -> SpeakerFeatures {
        let onsets = self.onsets();
        SpeakerFeatures {
            speaking_rate: finite(onsets.len() as f64 / self.duration()),
            voice_onset_time: onset::mean_interval(onsets).map_or(0.0, finite),
        }
    }

    fn paralinguistic(&self) -> ParalinguisticFeatures {
        let summary = self.spectral();
        let arousal = (summary.centroid / AROUSAL_CENTROID_HZ + self.zcr() / AROUSAL_ZCR) / 2.0;
        let valence = summary.rolloff / VALENCE_ROLLOFF_HZ;
        ParalinguisticFeatures {
            arousal: finite(arousal).clamp(0.0, 1.0),
            valence: finite(valence).clamp(0.0, 1.0),
        }
    }
}

fn finite(value: f64) -> f64 {
    if value.is_finite() { value } else { 0.0 }
}

#[cfg(test)]
#[path = "features_test.rs"]
mod tests;

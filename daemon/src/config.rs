//! Configuration for the audio-research daemon.
//!
//! Handles loading, saving, validating and providing defaults for
//! `config.toml`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};

use crate::features::{EngineConfig, MFCC_COEFFICIENTS};

/// Main configuration struct for the daemon.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub analysis: AnalysisConfig,
    pub features: FeaturesConfig,
    pub delivery: DeliveryConfig,
    pub retention: RetentionConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

/// Chunking and pacing of analysis jobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Chunk length used when a submission does not specify one.
    pub default_chunk_seconds: f64,
    /// Pause after each processed chunk.
    pub pacing_ms: u64,
}

/// Feature-extraction parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeaturesConfig {
    pub frame_length: usize,
    pub hop_length: usize,
    pub mel_bands: usize,
    pub lpc_order: usize,
    pub pre_emphasis: f64,
    /// Fraction of the frame peak a spectral peak must reach to count as pitch.
    pub pitch_threshold: f64,
    pub pitch_min_hz: f64,
    pub pitch_max_hz: f64,
    pub rolloff_fraction: f64,
}

/// Observer delivery settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliveryConfig {
    /// Snapshots buffered per observer before sends start to wait.
    pub observer_buffer: usize,
    /// How long a single delivery may wait before the observer is dropped.
    pub timeout_ms: u64,
}

/// Retention of finished tasks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionConfig {
    /// Evict tasks this long after they complete. Unset keeps them forever.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_ttl_secs: Option<u64>,
    pub sweep_interval_secs: u64,
}

/// gRPC server limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Largest accepted request, which bounds the size of a submitted recording.
    pub max_message_bytes: usize,
}

/// Logging configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub level: LogLevel,
}

/// Log verbosity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Convert to a tracing filter directive string for the daemon crate.
    pub fn as_directive(&self) -> &'static str {
        match self {
            LogLevel::Error => "audio_research_daemon=error",
            LogLevel::Warn => "audio_research_daemon=warn",
            LogLevel::Info => "audio_research_daemon=info",
            LogLevel::Debug => "audio_research_daemon=debug",
            LogLevel::Trace => "audio_research_daemon=trace",
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            default_chunk_seconds: 60.0,
            pacing_ms: 100,
        }
    }
}

impl Default for FeaturesConfig {
    fn default() -> Self {
        let engine = EngineConfig::default();
        Self {
            frame_length: engine.frame_length,
            hop_length: engine.hop_length,
            mel_bands: engine.mel_bands,
            lpc_order: engine.lpc_order,
            pre_emphasis: engine.pre_emphasis,
            pitch_threshold: engine.pitch_threshold,
            pitch_min_hz: engine.pitch_min_hz,
            pitch_max_hz: engine.pitch_max_hz,
            rolloff_fraction: engine.rolloff_fraction,
        }
    }
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            observer_buffer: 16,
            timeout_ms: 2000,
        }
    }
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            completed_ttl_secs: None,
            sweep_interval_secs: 60,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_message_bytes: audio_research_common::client::MAX_MESSAGE_BYTES,
        }
    }
}

impl AnalysisConfig {
    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_ms)
    }
}

impl FeaturesConfig {
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            frame_length: self.frame_length,
            hop_length: self.hop_length,
            mel_bands: self.mel_bands,
            lpc_order: self.lpc_order,
            pre_emphasis: self.pre_emphasis,
            pitch_threshold: self.pitch_threshold,
            pitch_min_hz: self.pitch_min_hz,
            pitch_max_hz: self.pitch_max_hz,
            rolloff_fraction: self.rolloff_fraction,
        }
    }
}

impl DeliveryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl RetentionConfig {
    pub fn completed_ttl(&self) -> Option<Duration> {
        self.completed_ttl_secs.map(Duration::from_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl Config {
    /// Returns the default config file path.
    /// `~/.config/audio-research/config.toml`
    pub fn config_path() -> Result<PathBuf> {
        audio_research_common::dirs::config_path()
    }

    /// Load configuration from the default path.
    /// Returns defaults if the file doesn't exist.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    /// Returns defaults if the file doesn't exist.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
    }

    /// Parse and validate configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).context("Failed to parse config file as TOML")?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        let a = &self.analysis;
        ensure!(
            a.default_chunk_seconds.is_finite() && a.default_chunk_seconds > 0.0,
            "analysis.default_chunk_seconds must be positive, got {}",
            a.default_chunk_seconds
        );

        let f = &self.features;
        ensure!(f.frame_length >= 2, "features.frame_length must be at least 2");
        ensure!(f.hop_length >= 1, "features.hop_length must be at least 1");
        ensure!(
            f.mel_bands >= MFCC_COEFFICIENTS,
            "features.mel_bands must be at least {MFCC_COEFFICIENTS}, got {}",
            f.mel_bands
        );
        ensure!(f.lpc_order >= 1, "features.lpc_order must be at least 1");
        ensure!(
            (0.0..1.0).contains(&f.pre_emphasis),
            "features.pre_emphasis must be in [0, 1), got {}",
            f.pre_emphasis
        );
        ensure!(
            f.pitch_threshold > 0.0 && f.pitch_threshold <= 1.0,
            "features.pitch_threshold must be in (0, 1], got {}",
            f.pitch_threshold
        );
        ensure!(
            f.pitch_min_hz > 0.0 && f.pitch_min_hz < f.pitch_max_hz,
            "features.pitch_min_hz ({}) must be positive and below pitch_max_hz ({})",
            f.pitch_min_hz,
            f.pitch_max_hz
        );
        ensure!(
            f.rolloff_fraction > 0.0 && f.rolloff_fraction <= 1.0,
            "features.rolloff_fraction must be in (0, 1], got {}",
            f.rolloff_fraction
        );

        ensure!(
            self.delivery.observer_buffer >= 1,
            "delivery.observer_buffer must be at least 1"
        );
        ensure!(self.delivery.timeout_ms >= 1, "delivery.timeout_ms must be at least 1");
        ensure!(
            self.retention.sweep_interval_secs >= 1,
            "retention.sweep_interval_secs must be at least 1"
        );
        ensure!(
            self.server.max_message_bytes >= 1024,
            "server.max_message_bytes must be at least 1024"
        );
        Ok(())
    }

    /// Save configuration to the default path.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        self.save_to(&path)
    }

    /// Save configuration to a specific path.
    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;

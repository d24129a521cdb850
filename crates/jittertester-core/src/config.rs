//! Analysis configuration
//!
//! Quality thresholds, the PCM format of the service's output, and the
//! session log limit. Stored as JSON at `<data_dir>/jittertester/config.json`
//! or any path given on the command line. Every field has a default so a
//! partial (or empty) file is valid.

use crate::error::JitterError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

fn default_jitter_stddev_threshold_ms() -> f64 {
    20.0
}

fn default_jitter_range_threshold_ms() -> f64 {
    50.0
}

fn default_chunk_cv_threshold() -> f64 {
    0.5
}

fn default_reference_stddev_ms() -> f64 {
    100.0
}

fn default_sample_rate() -> u32 {
    crate::DEFAULT_SAMPLE_RATE
}

fn default_channels() -> u16 {
    crate::DEFAULT_CHANNELS
}

fn default_bits_per_sample() -> u16 {
    crate::DEFAULT_BITS_PER_SAMPLE
}

fn default_max_observations() -> usize {
    1_000_000
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_file_prefix() -> String {
    "session".to_string()
}

/// Thresholds applied by the quality assessor
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityThresholds {
    /// Interval standard deviation above which jitter is flagged (ms)
    #[serde(default = "default_jitter_stddev_threshold_ms")]
    pub jitter_stddev_threshold_ms: f64,
    /// Interval range (max - min) above which jitter is flagged (ms)
    #[serde(default = "default_jitter_range_threshold_ms")]
    pub jitter_range_threshold_ms: f64,
    /// Chunk size coefficient of variation above which sizes are irregular
    #[serde(default = "default_chunk_cv_threshold")]
    pub chunk_cv_threshold: f64,
    /// Interval standard deviation that drives the consistency score to zero (ms)
    #[serde(default = "default_reference_stddev_ms")]
    pub reference_stddev_ms: f64,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            jitter_stddev_threshold_ms: default_jitter_stddev_threshold_ms(),
            jitter_range_threshold_ms: default_jitter_range_threshold_ms(),
            chunk_cv_threshold: default_chunk_cv_threshold(),
            reference_stddev_ms: default_reference_stddev_ms(),
        }
    }
}

impl QualityThresholds {
    /// Reject thresholds that would make the verdict meaningless
    pub fn validate(&self) -> Result<(), JitterError> {
        let checks = [
            ("jitter_stddev_threshold_ms", self.jitter_stddev_threshold_ms),
            ("jitter_range_threshold_ms", self.jitter_range_threshold_ms),
            ("chunk_cv_threshold", self.chunk_cv_threshold),
        ];
        for (name, value) in checks {
            if !value.is_finite() || value < 0.0 {
                return Err(JitterError::Config(format!(
                    "{} must be a non-negative number, got {}",
                    name, value
                )));
            }
        }
        if !self.reference_stddev_ms.is_finite() || self.reference_stddev_ms <= 0.0 {
            return Err(JitterError::Config(format!(
                "reference_stddev_ms must be positive, got {}",
                self.reference_stddev_ms
            )));
        }
        Ok(())
    }
}

/// Linear PCM format of the reconstructed audio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioFormat {
    /// Sample rate in Hz
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    /// Interleaved channel count
    #[serde(default = "default_channels")]
    pub channels: u16,
    /// Bits per sample (integer PCM)
    #[serde(default = "default_bits_per_sample")]
    pub bits_per_sample: u16,
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            channels: default_channels(),
            bits_per_sample: default_bits_per_sample(),
        }
    }
}

impl AudioFormat {
    /// Bytes per interleaved frame
    pub fn block_align(&self) -> usize {
        self.channels as usize * (self.bits_per_sample as usize).div_ceil(8)
    }

    /// Bytes per second of audio
    pub fn byte_rate(&self) -> usize {
        self.sample_rate as usize * self.block_align()
    }

    /// Playback duration of `byte_len` bytes of PCM in this format
    pub fn duration_secs(&self, byte_len: usize) -> f64 {
        let rate = self.byte_rate();
        if rate == 0 {
            return 0.0;
        }
        byte_len as f64 / rate as f64
    }

    pub fn validate(&self) -> Result<(), JitterError> {
        if self.sample_rate == 0 {
            return Err(JitterError::Config("sample_rate must be non-zero".into()));
        }
        if self.channels == 0 {
            return Err(JitterError::Config("channels must be non-zero".into()));
        }
        if !matches!(self.bits_per_sample, 8 | 16 | 24 | 32) {
            return Err(JitterError::Config(format!(
                "bits_per_sample must be 8, 16, 24 or 32, got {}",
                self.bits_per_sample
            )));
        }
        Ok(())
    }
}

/// Persistent jitter analysis configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JitterConfig {
    #[serde(default)]
    pub thresholds: QualityThresholds,
    #[serde(default)]
    pub audio: AudioFormat,
    /// Hard limit on observations per session; reaching it aborts the session
    #[serde(default = "default_max_observations")]
    pub max_observations: usize,
    /// Directory that receives reports and audio files
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Prefix of persisted file names
    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,
}

impl Default for JitterConfig {
    fn default() -> Self {
        Self {
            thresholds: QualityThresholds::default(),
            audio: AudioFormat::default(),
            max_observations: default_max_observations(),
            output_dir: default_output_dir(),
            file_prefix: default_file_prefix(),
        }
    }
}

impl JitterConfig {
    /// Config file path: `<data_dir>/jittertester/config.json`
    pub fn path() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("jittertester")
            .join("config.json")
    }

    /// Load config from the default path, falling back to defaults on any error
    pub fn load() -> Self {
        let path = Self::path();
        match Self::load_from(&path) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "Loaded config from disk");
                config
            }
            Err(JitterError::Io(_)) => {
                tracing::info!(path = %path.display(), "No config file found, using defaults");
                Self::default()
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to parse config, using defaults");
                Self::default()
            }
        }
    }

    /// Load and validate config from an explicit path
    pub fn load_from(path: &Path) -> Result<Self, JitterError> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to disk, creating parent directories if needed
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        tracing::info!(path = %path.display(), "Config saved to disk");
        Ok(())
    }

    pub fn validate(&self) -> Result<(), JitterError> {
        self.thresholds.validate()?;
        self.audio.validate()?;
        if self.max_observations == 0 {
            return Err(JitterError::Config(
                "max_observations must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

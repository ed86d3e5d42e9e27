use crate::audio::{EstimatorConfig, NoiseConfig, VoicingConfig};
use crate::defaults;
use crate::error::{PitchError, Result};
use crate::pipeline::{PipelineConfig, RunnerConfig};
use crate::tracking::StabilizerConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
#[cfg(feature = "cli")]
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub audio: AudioConfig,
    pub noise: NoiseConfig,
    pub estimator: EstimatorConfig,
    pub voicing: VoicingConfig,
    pub stabilizer: StabilizerConfig,
    pub runner: RunnerSection,
}

/// Audio capture configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AudioConfig {
    pub device: Option<String>,
    pub sample_rate: u32,
    pub frame_size: usize,
}

/// Capture-to-processing handoff configuration
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RunnerSection {
    pub queue_capacity: usize,
    pub max_frame_age_frames: u32,
    pub poll_interval_ms: u64,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            device: None,
            sample_rate: defaults::SAMPLE_RATE,
            frame_size: defaults::FRAME_SIZE,
        }
    }
}

impl Default for RunnerSection {
    fn default() -> Self {
        Self {
            queue_capacity: defaults::QUEUE_CAPACITY,
            max_frame_age_frames: defaults::MAX_FRAME_AGE_FRAMES,
            poll_interval_ms: defaults::POLL_INTERVAL_MS,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Missing fields use default values. Values are not validated here;
    /// call [`Config::validate`] once overrides have been applied.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if the file doesn't exist
    ///
    /// Invalid TOML and unreadable files are still errors.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(PitchError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No config at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(e),
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - VOXPITCH_AUDIO_DEVICE → audio.device
    /// - VOXPITCH_FILTER_STRENGTH → noise.strength
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(device) = std::env::var("VOXPITCH_AUDIO_DEVICE")
            && !device.is_empty()
        {
            self.audio.device = Some(device);
        }

        if let Ok(strength) = std::env::var("VOXPITCH_FILTER_STRENGTH")
            && !strength.is_empty()
        {
            match strength.trim().parse::<f32>() {
                Ok(value) => self.noise.strength = value,
                Err(e) => {
                    tracing::warn!("Ignoring VOXPITCH_FILTER_STRENGTH={strength:?}: {e}");
                }
            }
        }

        self
    }

    /// Check every section against the pipeline's construction rules.
    pub fn validate(&self) -> Result<()> {
        self.pipeline_config().validate()?;
        self.runner_config().validate()
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            sample_rate: self.audio.sample_rate,
            frame_size: self.audio.frame_size,
            noise: self.noise,
            estimator: self.estimator,
            voicing: self.voicing,
            stabilizer: self.stabilizer,
        }
    }

    pub fn runner_config(&self) -> RunnerConfig {
        RunnerConfig {
            queue_capacity: self.runner.queue_capacity,
            max_frame_age_frames: self.runner.max_frame_age_frames,
            poll_interval: Duration::from_millis(self.runner.poll_interval_ms),
        }
    }

    /// Render the effective configuration as TOML.
    pub fn to_display_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| PitchError::ConfigParse {
            message: e.to_string(),
        })
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/voxpitch/config.toml on Linux, or `None` when the
    /// platform has no config directory.
    #[cfg(feature = "cli")]
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("voxpitch").join("config.toml"))
    }

    /// Resolve `--config` against the default location.
    #[cfg(feature = "cli")]
    pub fn resolve_path(custom: Option<&Path>) -> Option<PathBuf> {
        custom.map(Path::to_path_buf).or_else(Self::default_path)
    }
}

//! Error types for voxpitch.
//!
//! Frame processing never fails; these errors only surface from
//! construction, configuration loading and audio I/O at the crate edge.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PitchError {
    // Configuration errors
    #[error("Failed to parse configuration: {message}")]
    ConfigParse { message: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Audio source errors
    #[error("Audio device not found: {device}")]
    AudioDeviceNotFound { device: String },

    #[error("Audio format mismatch: expected {expected}, got {actual}")]
    AudioFormatMismatch { expected: String, actual: String },

    #[error("Audio capture failed: {message}")]
    AudioCapture { message: String },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

impl PitchError {
    /// Shorthand for a configuration validation failure.
    pub fn invalid(key: &str, message: impl Into<String>) -> Self {
        PitchError::ConfigInvalidValue {
            key: key.to_string(),
            message: message.into(),
        }
    }
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, PitchError>;

//! voxpitch - Real-time monophonic pitch tracking for voice training
//!
//! Frames flow through noise suppression, YIN estimation, voicing
//! classification and a note-locking stabilizer; observers read a
//! consistent statistics snapshot from any thread.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod audio;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod defaults;
pub mod error;
#[cfg(feature = "cli")]
pub mod output;
pub mod pipeline;
pub mod tracking;

// Frame sources
pub use audio::recorder::AudioSource;
pub use audio::wav::WavAudioSource;

// Pipeline
pub use pipeline::orchestrator::{PipelineConfig, PitchPipeline};
pub use pipeline::runner::{PipelineRunner, RunnerConfig, RunnerHandle};
pub use pipeline::stats::{ComponentStatistics, StatsHandle};
pub use pipeline::types::{AudioFrame, FrameReport, PitchState};

// Note naming
pub use tracking::note::{EqualTemperament, NoteConverter};
pub use tracking::stabilizer::StabilizerState;

// Error handling
pub use error::{PitchError, Result};

// Config
pub use config::Config;

// Fault reporting
pub use pipeline::error::{FaultReporter, FrameFault};

/// Build version string with optional git commit hash.
///
/// Returns `"0.3.1+abc1234"` when git hash is available, `"0.3.1"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_string_starts_with_cargo_version() {
        let ver = version_string();
        assert!(
            ver.starts_with(env!("CARGO_PKG_VERSION")),
            "version_string should start with CARGO_PKG_VERSION, got: {}",
            ver
        );
    }

    #[test]
    fn version_string_appends_hash_only_when_known() {
        let ver = version_string();
        if option_env!("GIT_HASH").is_some_and(|h| !h.is_empty()) {
            let hash_part = ver.split('+').nth(1).unwrap_or("");
            assert_eq!(hash_part.len(), 7, "Git hash should be 7 chars: {}", ver);
        } else {
            assert_eq!(ver, env!("CARGO_PKG_VERSION"));
        }
    }
}

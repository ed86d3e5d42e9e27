//! Audio sources and the per-frame signal stages.

#[cfg(feature = "cpal-audio")]
pub mod capture;
pub mod noise;
pub mod recorder;
pub mod signal;
pub mod vad;
pub mod wav;
pub mod yin;

pub use noise::{NoiseConfig, NoiseStats, NoiseSuppressor, SuppressionReport};
pub use recorder::{AudioSource, MockAudioSource};
pub use vad::{VoiceActivityClassifier, VoicingConfig, VoicingStats};
pub use wav::WavAudioSource;
pub use yin::{EstimatorConfig, FrequencyEstimator};

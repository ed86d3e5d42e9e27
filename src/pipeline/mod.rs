//! Pitch tracking pipeline.
//!
//! [`PitchPipeline`] runs the per-frame stages synchronously; [`PipelineRunner`]
//! drives it in real time from an audio source over a bounded crossbeam channel.

pub mod error;
pub mod orchestrator;
pub mod runner;
pub mod session;
pub mod stats;
pub mod types;

pub use error::{FaultReporter, FrameFault, LogReporter};
pub use orchestrator::{PipelineConfig, PitchPipeline};
pub use runner::{PipelineRunner, RunnerConfig, RunnerHandle, RunnerStats};
pub use session::{SessionSummary, SessionTracker};
pub use stats::{ComponentStatistics, PipelineCounters, StatsHandle};
pub use types::{AudioFrame, FrameReport, PitchCandidate, PitchEstimate, PitchState, VoiceDecision};

//! Data types passed between pipeline stages.

use crate::tracking::stabilizer::{StabilizerState, StabilizerUpdate};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// A fixed-length frame of captured audio.
///
/// Samples are nominally in [-1.0, 1.0]. The frame is immutable once
/// captured; stages read it through accessors.
#[derive(Debug, Clone)]
pub struct AudioFrame {
    samples: Vec<f32>,
    sample_rate: u32,
    sequence: u64,
    captured_at: Instant,
}

impl AudioFrame {
    /// Creates a new audio frame stamped with the current instant.
    pub fn new(samples: Vec<f32>, sample_rate: u32, sequence: u64) -> Self {
        Self::with_timestamp(samples, sample_rate, sequence, Instant::now())
    }

    /// Creates a new audio frame with an explicit capture timestamp.
    pub fn with_timestamp(
        samples: Vec<f32>,
        sample_rate: u32,
        sequence: u64,
        captured_at: Instant,
    ) -> Self {
        Self {
            samples,
            sample_rate,
            sequence,
            captured_at,
        }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn captured_at(&self) -> Instant {
        self.captured_at
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Wall-clock span the frame covers; this is the real-time budget for
    /// processing it.
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.samples.len() as f64 / self.sample_rate as f64)
    }
}

/// A fundamental frequency candidate for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PitchCandidate {
    /// Estimated fundamental in Hz; always finite and positive.
    pub frequency_hz: f32,
    /// How strongly the frame repeats at this period (0.0 to 1.0).
    pub periodicity: f32,
}

/// Output of the frequency estimator for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PitchEstimate {
    /// Usable candidate, or `None` for silence, aperiodic or out-of-range frames.
    pub candidate: Option<PitchCandidate>,
    /// Periodicity at the selected lag, reported even when the frequency
    /// itself was discarded.
    pub periodicity: f32,
    /// RMS of the analysed (cleaned) frame.
    pub rms: f32,
}

impl PitchEstimate {
    /// Estimate for a frame with no periodic content.
    pub fn unpitched(rms: f32) -> Self {
        Self {
            candidate: None,
            periodicity: 0.0,
            rms,
        }
    }
}

/// Voiced/unvoiced decision for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VoiceDecision {
    pub is_voiced: bool,
    /// Voicing likelihood (0.0 to 1.0).
    pub confidence: f32,
}

impl VoiceDecision {
    /// Decision used for empty or degenerate frames.
    pub const UNVOICED: VoiceDecision = VoiceDecision {
        is_voiced: false,
        confidence: 0.0,
    };
}

/// The latest stable pitch and voicing state, as shown to consumers.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PitchState {
    /// Smoothed pitch in Hz, held across unvoiced frames and outliers.
    pub frequency_hz: Option<f32>,
    /// Nearest note name of the smoothed pitch.
    pub note: Option<String>,
    /// Whether `note` is locked.
    pub locked: bool,
    /// Voicing decision of the most recent frame.
    pub voiced: bool,
    /// Voicing confidence of the most recent frame.
    pub confidence: f32,
    pub state: StabilizerState,
}

/// Everything the pipeline learned from one frame.
#[derive(Debug, Clone)]
pub struct FrameReport {
    pub sequence: u64,
    pub estimate: PitchEstimate,
    pub voicing: VoiceDecision,
    /// Present only when the frame was voiced and carried a candidate.
    pub stabilizer: Option<StabilizerUpdate>,
    pub snr_db: f32,
    pub state: PitchState,
}

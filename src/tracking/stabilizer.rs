//! Pitch stabilization: outlier rejection, smoothing and note locking.
//!
//! Candidates from voiced frames are checked against a running window of
//! recently accepted pitches. Accepted values are exponentially smoothed into
//! the emitted pitch, whose nearest note drives a small state machine:
//!
//! ```text
//! WarmingUp --(window full)--> Tracking --(counter reaches required)--> Locked
//!                                  ^                                      |
//!                                  +------(note mismatch or outlier)------+
//! ```

use crate::defaults;
use crate::error::{PitchError, Result};
use crate::tracking::note::{EqualTemperament, NoteConverter};
use crate::tracking::window::RunningPitchWindow;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Tuning of the stabilizer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StabilizerConfig {
    /// Window size; also the number of accepted frames before outlier
    /// rejection starts.
    pub min_samples: usize,
    pub base_threshold_multiplier: f32,
    pub adaptive_threshold_coefficient: f32,
    /// Weight of a new value in the exponential smoother (0, 1].
    pub smoothing_factor: f32,
    /// Frames needed to lock at zero voicing confidence.
    pub required_stable_frames: u32,
    /// Frames needed to lock at full voicing confidence.
    pub min_required_stable_frames: u32,
    /// Floor applied to the window's standard deviation, in Hz.
    pub min_deviation_hz: f32,
    /// Consecutive rejections after which the next candidate is accepted.
    pub max_consecutive_outliers: u32,
}

impl Default for StabilizerConfig {
    fn default() -> Self {
        Self {
            min_samples: defaults::MIN_SAMPLES,
            base_threshold_multiplier: defaults::BASE_THRESHOLD_MULTIPLIER,
            adaptive_threshold_coefficient: defaults::ADAPTIVE_THRESHOLD_COEFFICIENT,
            smoothing_factor: defaults::SMOOTHING_FACTOR,
            required_stable_frames: defaults::REQUIRED_STABLE_FRAMES,
            min_required_stable_frames: defaults::MIN_REQUIRED_STABLE_FRAMES,
            min_deviation_hz: defaults::MIN_DEVIATION_HZ,
            max_consecutive_outliers: defaults::MAX_CONSECUTIVE_OUTLIERS,
        }
    }
}

impl StabilizerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.min_samples == 0 {
            return Err(PitchError::invalid(
                "stabilizer.min_samples",
                "must be at least 1",
            ));
        }
        if !(self.smoothing_factor > 0.0 && self.smoothing_factor <= 1.0) {
            return Err(PitchError::invalid(
                "stabilizer.smoothing_factor",
                "must be within (0, 1]",
            ));
        }
        if !(self.base_threshold_multiplier.is_finite() && self.base_threshold_multiplier > 0.0) {
            return Err(PitchError::invalid(
                "stabilizer.base_threshold_multiplier",
                "must be a positive number",
            ));
        }
        if !(self.adaptive_threshold_coefficient.is_finite()
            && self.adaptive_threshold_coefficient >= 0.0)
        {
            return Err(PitchError::invalid(
                "stabilizer.adaptive_threshold_coefficient",
                "must be a non-negative number",
            ));
        }
        if !(self.min_deviation_hz.is_finite() && self.min_deviation_hz >= 0.0) {
            return Err(PitchError::invalid(
                "stabilizer.min_deviation_hz",
                "must be a non-negative number",
            ));
        }
        if self.min_required_stable_frames == 0 {
            return Err(PitchError::invalid(
                "stabilizer.min_required_stable_frames",
                "must be at least 1",
            ));
        }
        if self.min_required_stable_frames > self.required_stable_frames {
            return Err(PitchError::invalid(
                "stabilizer.required_stable_frames",
                format!(
                    "must be at least min_required_stable_frames ({})",
                    self.min_required_stable_frames
                ),
            ));
        }
        Ok(())
    }
}

/// Lock state of the stabilizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StabilizerState {
    /// Fewer than `min_samples` pitches accepted so far.
    #[default]
    WarmingUp,
    /// Following the pitch without a locked note.
    Tracking,
    /// Enough consecutive frames agreed on one note.
    Locked,
}

impl fmt::Display for StabilizerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StabilizerState::WarmingUp => "warming up",
            StabilizerState::Tracking => "tracking",
            StabilizerState::Locked => "locked",
        };
        f.write_str(s)
    }
}

/// Consecutive frames agreeing on the tracked note.
///
/// `consecutive_stable_frames` never exceeds `required_frames`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StabilityCounter {
    consecutive_stable_frames: u32,
    required_frames: u32,
}

impl StabilityCounter {
    pub fn new(required_frames: u32) -> Self {
        Self {
            consecutive_stable_frames: 0,
            required_frames: required_frames.max(1),
        }
    }

    pub fn consecutive_stable_frames(&self) -> u32 {
        self.consecutive_stable_frames
    }

    pub fn required_frames(&self) -> u32 {
        self.required_frames
    }

    /// Counts one more agreeing frame, saturating at the requirement.
    pub fn increment(&mut self) {
        self.consecutive_stable_frames =
            (self.consecutive_stable_frames + 1).min(self.required_frames);
    }

    pub fn reset(&mut self) {
        self.consecutive_stable_frames = 0;
    }

    pub fn set_required(&mut self, required_frames: u32) {
        self.required_frames = required_frames.max(1);
        self.consecutive_stable_frames = self.consecutive_stable_frames.min(self.required_frames);
    }

    pub fn is_satisfied(&self) -> bool {
        self.consecutive_stable_frames >= self.required_frames
    }
}

/// Outcome of feeding one candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct StabilizerUpdate {
    /// False when the candidate was rejected as an outlier.
    pub accepted: bool,
    /// True when the candidate was accepted only because too many
    /// consecutive candidates had been rejected.
    pub reanchored: bool,
    /// Smoothed pitch after this update (held on rejection).
    pub frequency_hz: Option<f32>,
    /// Note currently being tracked.
    pub note: Option<String>,
    pub locked: bool,
    pub state: StabilizerState,
}

/// Stabilizer counters exposed to observers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StabilizerStats {
    pub outlier_count: u64,
    pub total_processed: u64,
    pub smoothing_factor: f32,
    pub consecutive_stable_frames: u32,
    pub required_frames: u32,
    pub state: StabilizerState,
}

impl Default for StabilizerStats {
    fn default() -> Self {
        Self {
            outlier_count: 0,
            total_processed: 0,
            smoothing_factor: defaults::SMOOTHING_FACTOR,
            consecutive_stable_frames: 0,
            required_frames: defaults::REQUIRED_STABLE_FRAMES,
            state: StabilizerState::WarmingUp,
        }
    }
}

/// Outlier filter, smoother and note-lock state machine.
pub struct PitchStabilizer {
    config: StabilizerConfig,
    converter: Arc<dyn NoteConverter>,
    window: RunningPitchWindow,
    counter: StabilityCounter,
    base_required: u32,
    emitted: Option<f32>,
    tracked_note: Option<String>,
    locked: bool,
    outlier_count: u64,
    total_processed: u64,
    consecutive_outliers: u32,
}

impl PitchStabilizer {
    /// Creates a stabilizer that names notes in twelve-tone equal temperament.
    pub fn new(config: StabilizerConfig) -> Self {
        Self::with_converter(config, Arc::new(EqualTemperament::default()))
    }

    pub fn with_converter(config: StabilizerConfig, converter: Arc<dyn NoteConverter>) -> Self {
        Self {
            config,
            converter,
            window: RunningPitchWindow::new(config.min_samples),
            counter: StabilityCounter::new(config.required_stable_frames),
            base_required: config.required_stable_frames,
            emitted: None,
            tracked_note: None,
            locked: false,
            outlier_count: 0,
            total_processed: 0,
            consecutive_outliers: 0,
        }
    }

    pub fn config(&self) -> &StabilizerConfig {
        &self.config
    }

    /// Overrides the number of frames needed to lock at low confidence.
    pub fn set_required_frames(&mut self, frames: u32) -> Result<()> {
        if frames == 0 {
            return Err(PitchError::invalid(
                "stabilizer.required_stable_frames",
                "must be at least 1",
            ));
        }
        self.base_required = frames;
        if !self.locked {
            self.counter.set_required(frames);
        }
        Ok(())
    }

    /// Feeds the candidate of a voiced frame.
    ///
    /// `confidence` is the frame's voicing confidence; higher confidence
    /// shortens the run of agreeing frames needed to lock.
    pub fn update(&mut self, frequency_hz: f32, confidence: f32) -> StabilizerUpdate {
        self.total_processed += 1;
        self.adapt_required(confidence);

        let mut reanchored = false;
        if self.window.is_full() && self.is_outlier(frequency_hz) {
            if self.consecutive_outliers < self.config.max_consecutive_outliers {
                self.reject(frequency_hz);
                return self.snapshot(false, false);
            }
            tracing::debug!(
                frequency_hz,
                rejected = self.consecutive_outliers,
                "re-anchoring pitch window"
            );
            reanchored = true;
        }

        self.consecutive_outliers = 0;
        self.window.push(frequency_hz);

        let smoothed = match self.emitted {
            Some(previous) => {
                let a = self.config.smoothing_factor;
                a * frequency_hz + (1.0 - a) * previous
            }
            None => frequency_hz,
        };
        self.emitted = Some(smoothed);

        if self.window.is_full() {
            self.track_note(smoothed);
        }

        self.snapshot(true, reanchored)
    }

    fn is_outlier(&self, frequency_hz: f32) -> bool {
        let sigma = self.window.std_dev().max(self.config.min_deviation_hz);
        let threshold = sigma
            * (self.config.base_threshold_multiplier
                + self.config.adaptive_threshold_coefficient * sigma);
        (frequency_hz - self.window.mean()).abs() > threshold
    }

    fn reject(&mut self, frequency_hz: f32) {
        self.outlier_count += 1;
        self.consecutive_outliers += 1;
        self.counter.reset();
        if self.locked {
            tracing::trace!(frequency_hz, "outlier released note lock");
        }
        self.locked = false;
    }

    fn track_note(&mut self, frequency_hz: f32) {
        let note = self.converter.nearest_note(frequency_hz);
        if self.tracked_note.as_deref() == Some(note.as_str()) {
            self.counter.increment();
            if !self.locked && self.counter.is_satisfied() {
                tracing::debug!(note = %note, "note locked");
                self.locked = true;
            }
        } else {
            self.tracked_note = Some(note);
            self.counter.reset();
            self.locked = false;
        }
    }

    /// The requirement is frozen while a lock is held.
    fn adapt_required(&mut self, confidence: f32) {
        if self.locked {
            return;
        }
        let base = self.base_required;
        let min = self.config.min_required_stable_frames.min(base);
        let c = if confidence.is_finite() {
            confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let required = (base as f32 - (base - min) as f32 * c).round() as u32;
        self.counter.set_required(required.clamp(min, base));
    }

    fn snapshot(&self, accepted: bool, reanchored: bool) -> StabilizerUpdate {
        StabilizerUpdate {
            accepted,
            reanchored,
            frequency_hz: self.emitted,
            note: self.tracked_note.clone(),
            locked: self.locked,
            state: self.state(),
        }
    }

    pub fn state(&self) -> StabilizerState {
        if !self.window.is_full() {
            StabilizerState::WarmingUp
        } else if self.locked {
            StabilizerState::Locked
        } else {
            StabilizerState::Tracking
        }
    }

    /// Latest smoothed pitch, if any candidate has been accepted.
    pub fn emitted(&self) -> Option<f32> {
        self.emitted
    }

    pub fn tracked_note(&self) -> Option<&str> {
        self.tracked_note.as_deref()
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn counter(&self) -> StabilityCounter {
        self.counter
    }

    pub fn stats(&self) -> StabilizerStats {
        StabilizerStats {
            outlier_count: self.outlier_count,
            total_processed: self.total_processed,
            smoothing_factor: self.config.smoothing_factor,
            consecutive_stable_frames: self.counter.consecutive_stable_frames(),
            required_frames: self.counter.required_frames(),
            state: self.state(),
        }
    }
}

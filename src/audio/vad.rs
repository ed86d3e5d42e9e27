//! Voice Activity Detection (VAD) module.
//!
//! Classifies each frame as voiced or unvoiced by combining two independent
//! sub-decisions: an RMS energy threshold and a periodicity threshold on the
//! estimator's output. A frame is voiced only when both agree.
//!
//! The classifier also tracks how often the two sub-decisions agree over a
//! rolling window. That agreement rate is reported as `accuracy_percent`.

use crate::defaults;
use crate::error::{PitchError, Result};
use crate::pipeline::types::{PitchEstimate, VoiceDecision};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Configuration for voice activity classification.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoicingConfig {
    /// RMS threshold for the energy sub-decision (0.0 to 1.0).
    pub energy_threshold: f32,
    /// Minimum periodicity for the periodicity sub-decision (0.0 to 1.0).
    pub periodicity_threshold: f32,
    /// Number of recent frames the agreement rate is computed over.
    pub accuracy_window: usize,
}

impl Default for VoicingConfig {
    fn default() -> Self {
        Self {
            energy_threshold: defaults::VAD_THRESHOLD,
            periodicity_threshold: defaults::PERIODICITY_THRESHOLD,
            accuracy_window: defaults::ACCURACY_WINDOW,
        }
    }
}

impl VoicingConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.energy_threshold > 0.0 && self.energy_threshold <= 1.0) {
            return Err(PitchError::invalid(
                "voicing.energy_threshold",
                "must be within (0, 1]",
            ));
        }
        if !(0.0..=1.0).contains(&self.periodicity_threshold) {
            return Err(PitchError::invalid(
                "voicing.periodicity_threshold",
                "must be within [0, 1]",
            ));
        }
        if self.accuracy_window == 0 {
            return Err(PitchError::invalid(
                "voicing.accuracy_window",
                "must be at least 1",
            ));
        }
        Ok(())
    }
}

/// Voicing counters exposed to observers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VoicingStats {
    pub voice_frames: u64,
    pub total_frames: u64,
    /// Sub-decision agreement over the rolling window, in percent.
    pub accuracy_percent: f32,
}

impl Default for VoicingStats {
    fn default() -> Self {
        Self {
            voice_frames: 0,
            total_frames: 0,
            accuracy_percent: 100.0,
        }
    }
}

/// Voiced/unvoiced classifier.
pub struct VoiceActivityClassifier {
    config: VoicingConfig,
    voice_frames: u64,
    total_frames: u64,
    agreement: VecDeque<bool>,
    agreeing: usize,
}

impl VoiceActivityClassifier {
    pub fn new(config: VoicingConfig) -> Self {
        Self {
            config,
            voice_frames: 0,
            total_frames: 0,
            agreement: VecDeque::with_capacity(config.accuracy_window),
            agreeing: 0,
        }
    }

    pub fn config(&self) -> &VoicingConfig {
        &self.config
    }

    /// Classifies one frame from its cleaned samples' estimate.
    ///
    /// `frame_len` is the length of the analysed frame; an empty frame, or one
    /// whose level is not a finite number, is unvoiced with zero confidence.
    pub fn classify(&mut self, estimate: &PitchEstimate, frame_len: usize) -> VoiceDecision {
        self.total_frames += 1;

        let rms = estimate.rms;
        let periodicity = estimate.periodicity;
        if frame_len == 0 || !rms.is_finite() || !periodicity.is_finite() {
            self.record_agreement(true);
            return VoiceDecision::UNVOICED;
        }

        let energetic = rms > self.config.energy_threshold;
        let periodic = periodicity >= self.config.periodicity_threshold;
        self.record_agreement(energetic == periodic);

        let is_voiced = energetic && periodic;
        if is_voiced {
            self.voice_frames += 1;
        }

        VoiceDecision {
            is_voiced,
            confidence: self.confidence(rms, periodicity),
        }
    }

    /// Energy likelihood times periodicity, in [0, 1].
    fn confidence(&self, rms: f32, periodicity: f32) -> f32 {
        let rms = rms.max(0.0);
        let energy_likelihood = rms / (rms + self.config.energy_threshold);
        (energy_likelihood * periodicity.clamp(0.0, 1.0)).clamp(0.0, 1.0)
    }

    fn record_agreement(&mut self, agrees: bool) {
        if self.agreement.len() == self.config.accuracy_window
            && let Some(oldest) = self.agreement.pop_front()
            && oldest
        {
            self.agreeing -= 1;
        }
        self.agreement.push_back(agrees);
        if agrees {
            self.agreeing += 1;
        }
    }

    /// Percentage of recent frames whose sub-decisions agreed.
    ///
    /// Reports 100 before any frame has been classified.
    pub fn accuracy_percent(&self) -> f32 {
        if self.agreement.is_empty() {
            return 100.0;
        }
        100.0 * self.agreeing as f32 / self.agreement.len() as f32
    }

    pub fn stats(&self) -> VoicingStats {
        VoicingStats {
            voice_frames: self.voice_frames,
            total_frames: self.total_frames,
            accuracy_percent: self.accuracy_percent(),
        }
    }

    /// Clears all counters and the agreement window.
    pub fn reset(&mut self) {
        self.voice_frames = 0;
        self.total_frames = 0;
        self.agreement.clear();
        self.agreeing = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::types::PitchCandidate;

    fn estimate(rms: f32, periodicity: f32) -> PitchEstimate {
        PitchEstimate {
            candidate: Some(PitchCandidate {
                frequency_hz: 220.0,
                periodicity,
            }),
            periodicity,
            rms,
        }
    }

    #[test]
    fn test_loud_periodic_frame_is_voiced() {
        let mut vad = VoiceActivityClassifier::new(VoicingConfig::default());
        let decision = vad.classify(&estimate(0.3, 0.95), 2048);
        assert!(decision.is_voiced);
        assert!(decision.confidence > 0.8);
    }

    #[test]
    fn test_quiet_periodic_frame_is_unvoiced() {
        let mut vad = VoiceActivityClassifier::new(VoicingConfig::default());
        let decision = vad.classify(&estimate(0.01, 0.95), 2048);
        assert!(!decision.is_voiced);
    }

    #[test]
    fn test_loud_aperiodic_frame_is_unvoiced() {
        let mut vad = VoiceActivityClassifier::new(VoicingConfig::default());
        let decision = vad.classify(&estimate(0.3, 0.2), 2048);
        assert!(!decision.is_voiced);
        assert!(decision.confidence < 0.2);
    }

    #[test]
    fn test_energy_threshold_is_strict() {
        let mut vad = VoiceActivityClassifier::new(VoicingConfig::default());
        let decision = vad.classify(&estimate(defaults::VAD_THRESHOLD, 1.0), 2048);
        assert!(!decision.is_voiced);
    }

    #[test]
    fn test_periodicity_threshold_is_inclusive() {
        let mut vad = VoiceActivityClassifier::new(VoicingConfig::default());
        let decision = vad.classify(&estimate(0.3, defaults::PERIODICITY_THRESHOLD), 2048);
        assert!(decision.is_voiced);
    }

    #[test]
    fn test_empty_frame_is_unvoiced_with_zero_confidence() {
        let mut vad = VoiceActivityClassifier::new(VoicingConfig::default());
        let decision = vad.classify(&PitchEstimate::unpitched(0.0), 0);
        assert_eq!(decision, VoiceDecision::UNVOICED);
        assert_eq!(vad.stats().total_frames, 1);
    }

    #[test]
    fn test_nan_level_is_unvoiced() {
        let mut vad = VoiceActivityClassifier::new(VoicingConfig::default());
        let decision = vad.classify(&estimate(f32::NAN, 0.9), 2048);
        assert_eq!(decision, VoiceDecision::UNVOICED);
    }

    #[test]
    fn test_confidence_is_bounded() {
        let mut vad = VoiceActivityClassifier::new(VoicingConfig::default());
        for (rms, periodicity) in [(0.0, 0.0), (1.0, 1.0), (5.0, 1.0), (0.02, 0.7)] {
            let c = vad.classify(&estimate(rms, periodicity), 2048).confidence;
            assert!((0.0..=1.0).contains(&c), "confidence {c} out of range");
        }
    }

    #[test]
    fn test_counters_accumulate() {
        let mut vad = VoiceActivityClassifier::new(VoicingConfig::default());
        vad.classify(&estimate(0.3, 0.9), 2048);
        vad.classify(&estimate(0.3, 0.9), 2048);
        vad.classify(&estimate(0.0, 0.0), 2048);

        let stats = vad.stats();
        assert_eq!(stats.voice_frames, 2);
        assert_eq!(stats.total_frames, 3);
    }

    #[test]
    fn test_accuracy_is_full_before_any_frame() {
        let vad = VoiceActivityClassifier::new(VoicingConfig::default());
        assert_eq!(vad.accuracy_percent(), 100.0);
    }

    #[test]
    fn test_accuracy_tracks_disagreement() {
        let mut vad = VoiceActivityClassifier::new(VoicingConfig::default());
        // Agree (both true), agree (both false), disagree twice.
        vad.classify(&estimate(0.3, 0.9), 2048);
        vad.classify(&estimate(0.0, 0.0), 2048);
        vad.classify(&estimate(0.3, 0.1), 2048);
        vad.classify(&estimate(0.001, 0.9), 2048);

        assert!((vad.accuracy_percent() - 50.0).abs() < 1e-4);
    }

    #[test]
    fn test_accuracy_window_rolls() {
        let config = VoicingConfig {
            accuracy_window: 4,
            ..VoicingConfig::default()
        };
        let mut vad = VoiceActivityClassifier::new(config);
        for _ in 0..4 {
            vad.classify(&estimate(0.3, 0.1), 2048);
        }
        assert_eq!(vad.accuracy_percent(), 0.0);

        for _ in 0..4 {
            vad.classify(&estimate(0.3, 0.9), 2048);
        }
        assert_eq!(vad.accuracy_percent(), 100.0);
    }

    #[test]
    fn test_reset_clears_counters() {
        let mut vad = VoiceActivityClassifier::new(VoicingConfig::default());
        vad.classify(&estimate(0.3, 0.1), 2048);
        vad.reset();

        let stats = vad.stats();
        assert_eq!(stats.total_frames, 0);
        assert_eq!(stats.voice_frames, 0);
        assert_eq!(stats.accuracy_percent, 100.0);
    }

    #[test]
    fn test_validate_rejects_zero_window() {
        let config = VoicingConfig {
            accuracy_window: 0,
            ..VoicingConfig::default()
        };
        assert!(config.validate().is_err());
        assert!(VoicingConfig::default().validate().is_ok());
    }
}

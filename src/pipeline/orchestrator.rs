//! Per-frame pitch tracking pipeline.
//!
//! Frames flow through sanitize -> noise suppression -> F0 estimation ->
//! voicing -> stabilization. The voicing decision is fed back to the
//! suppressor so that the next frame can refine the noise estimate.

use crate::audio::noise::{NoiseConfig, NoiseSuppressor};
use crate::audio::signal::{calculate_rms, sanitize};
use crate::audio::vad::{VoiceActivityClassifier, VoicingConfig};
use crate::audio::yin::{EstimatorConfig, FrequencyEstimator};
use crate::defaults;
use crate::error::{PitchError, Result};
use crate::pipeline::session::{SessionSummary, SessionTracker};
use crate::pipeline::stats::{ComponentStatistics, PipelineCounters, StatsHandle};
use crate::pipeline::types::{AudioFrame, FrameReport, PitchEstimate, PitchState};
use crate::tracking::note::{EqualTemperament, NoteConverter};
use crate::tracking::stabilizer::{PitchStabilizer, StabilizerConfig};
use std::sync::Arc;
use std::time::Instant;

/// Configuration for the pipeline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineConfig {
    /// Sample rate the estimator assumes for every frame.
    pub sample_rate: u32,
    /// Nominal frame length; sources are expected to deliver this many samples.
    pub frame_size: usize,
    pub noise: NoiseConfig,
    pub estimator: EstimatorConfig,
    pub voicing: VoicingConfig,
    pub stabilizer: StabilizerConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sample_rate: defaults::SAMPLE_RATE,
            frame_size: defaults::FRAME_SIZE,
            noise: NoiseConfig::default(),
            estimator: EstimatorConfig::default(),
            voicing: VoicingConfig::default(),
            stabilizer: StabilizerConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(PitchError::invalid("audio.sample_rate", "must be positive"));
        }
        if self.frame_size < defaults::MIN_FRAME_SIZE {
            return Err(PitchError::invalid(
                "audio.frame_size",
                format!("must be at least {}", defaults::MIN_FRAME_SIZE),
            ));
        }
        self.noise.validate()?;
        self.estimator.validate(self.sample_rate)?;
        self.voicing.validate()?;
        self.stabilizer.validate()
    }
}

/// Single-threaded pitch tracking pipeline.
///
/// `process_frame` never blocks and never fails. Statistics are published
/// after every frame to a [`StatsHandle`] that other threads may read.
pub struct PitchPipeline {
    config: PipelineConfig,
    converter: Arc<dyn NoteConverter>,
    suppressor: NoiseSuppressor,
    estimator: FrequencyEstimator,
    classifier: VoiceActivityClassifier,
    stabilizer: PitchStabilizer,
    input: Vec<f32>,
    cleaned: Vec<f32>,
    counters: PipelineCounters,
    session: SessionTracker,
    stats: StatsHandle,
}

impl PitchPipeline {
    /// Validates the configuration and builds every stage.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        tracing::debug!(
            sample_rate = config.sample_rate,
            frame_size = config.frame_size,
            strength = config.noise.strength,
            "pitch pipeline created"
        );

        let converter: Arc<dyn NoteConverter> = Arc::new(EqualTemperament::default());
        Ok(Self {
            suppressor: NoiseSuppressor::new(config.noise),
            estimator: FrequencyEstimator::new(config.estimator, config.sample_rate),
            classifier: VoiceActivityClassifier::new(config.voicing),
            stabilizer: PitchStabilizer::with_converter(config.stabilizer, Arc::clone(&converter)),
            converter,
            input: Vec::with_capacity(config.frame_size),
            cleaned: Vec::with_capacity(config.frame_size),
            counters: PipelineCounters::default(),
            session: SessionTracker::new(),
            stats: StatsHandle::new(),
            config,
        })
    }

    /// Uses a different note converter. Resets the stabilizer.
    pub fn with_converter(mut self, converter: Arc<dyn NoteConverter>) -> Self {
        self.stabilizer =
            PitchStabilizer::with_converter(self.config.stabilizer, Arc::clone(&converter));
        self.converter = converter;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Handle for reading statistics from any thread.
    pub fn stats_handle(&self) -> StatsHandle {
        self.stats.clone()
    }

    /// Changes the noise filter strength for subsequent frames.
    pub fn set_filter_strength(&mut self, strength: f32) {
        self.suppressor.set_strength(strength);
    }

    /// Overrides the number of agreeing frames needed to lock a note.
    pub fn set_required_frames(&mut self, frames: u32) -> Result<()> {
        self.stabilizer.set_required_frames(frames)
    }

    /// Runs one frame through every stage.
    pub fn process_frame(&mut self, frame: &AudioFrame) -> FrameReport {
        let started = Instant::now();

        self.input.clear();
        self.input.extend_from_slice(frame.samples());
        let sanitized = sanitize(&mut self.input);
        if sanitized > 0 {
            tracing::trace!(sequence = frame.sequence(), sanitized, "replaced non-finite samples");
        }

        let suppression = self.suppressor.process(&self.input, &mut self.cleaned);
        let rate_matches = frame.sample_rate() == self.config.sample_rate;
        let estimate = if rate_matches {
            self.estimator.estimate(&self.cleaned)
        } else {
            self.counters.rate_mismatch_frames += 1;
            if self.counters.rate_mismatch_frames == 1 {
                tracing::warn!(
                    sequence = frame.sequence(),
                    frame_rate = frame.sample_rate(),
                    pipeline_rate = self.config.sample_rate,
                    "sample rate mismatch, frame not analysed"
                );
            }
            PitchEstimate::unpitched(calculate_rms(&self.cleaned))
        };
        let voicing = self.classifier.classify(&estimate, self.cleaned.len());

        let stabilizer = match estimate.candidate {
            Some(candidate) if voicing.is_voiced => {
                Some(self.stabilizer.update(candidate.frequency_hz, voicing.confidence))
            }
            _ => None,
        };

        // An unanalysed frame says nothing about the noise floor.
        if rate_matches {
            self.suppressor.observe_voicing(voicing.is_voiced);
        }

        self.counters.frames_processed += 1;
        self.counters.sanitized_samples += sanitized as u64;
        if estimate.candidate.is_none() {
            self.counters.no_candidate_frames += 1;
        }

        let state = PitchState {
            frequency_hz: self.stabilizer.emitted(),
            note: self.stabilizer.tracked_note().map(str::to_string),
            locked: self.stabilizer.is_locked(),
            voiced: voicing.is_voiced,
            confidence: voicing.confidence,
            state: self.stabilizer.state(),
        };

        let report = FrameReport {
            sequence: frame.sequence(),
            estimate,
            voicing,
            stabilizer,
            snr_db: suppression.snr_db,
            state,
        };

        tracing::trace!(
            sequence = report.sequence,
            voiced = voicing.is_voiced,
            frequency_hz = ?estimate.candidate.map(|c| c.frequency_hz),
            snr_db = suppression.snr_db,
            "frame processed"
        );

        self.session.record(&report, frame.duration(), started.elapsed());
        self.publish(&report.state);
        report
    }

    fn publish(&self, pitch: &PitchState) {
        self.stats.publish(ComponentStatistics {
            noise: self.suppressor.stats(),
            voicing: self.classifier.stats(),
            stabilizer: self.stabilizer.stats(),
            pipeline: self.counters,
            pitch: pitch.clone(),
        });
    }

    /// Discards all learned state and statistics.
    ///
    /// Existing [`StatsHandle`]s stay connected and observe zeroed counters.
    pub fn reset(&mut self) {
        tracing::debug!("pitch pipeline reset");
        let strength = self.suppressor.strength();
        self.suppressor = NoiseSuppressor::new(NoiseConfig {
            strength,
            ..self.config.noise
        });
        self.estimator = FrequencyEstimator::new(self.config.estimator, self.config.sample_rate);
        self.classifier = VoiceActivityClassifier::new(self.config.voicing);
        self.stabilizer =
            PitchStabilizer::with_converter(self.config.stabilizer, Arc::clone(&self.converter));
        self.counters = PipelineCounters::default();
        self.session = SessionTracker::new();
        self.publish(&PitchState::default());
    }

    /// Summary of everything processed since construction or the last reset.
    pub fn session_summary(&self) -> SessionSummary {
        self.session.summary()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::stabilizer::StabilizerState;
    use std::f32::consts::PI;

    fn tone(frequency: f32, amplitude: f32, sequence: u64) -> AudioFrame {
        let offset = sequence as usize * defaults::FRAME_SIZE;
        let samples = (0..defaults::FRAME_SIZE)
            .map(|i| {
                let t = (offset + i) as f32 / defaults::SAMPLE_RATE as f32;
                amplitude * (2.0 * PI * frequency * t).sin()
            })
            .collect();
        AudioFrame::new(samples, defaults::SAMPLE_RATE, sequence)
    }

    fn silence(sequence: u64) -> AudioFrame {
        AudioFrame::new(vec![0.0; defaults::FRAME_SIZE], defaults::SAMPLE_RATE, sequence)
    }

    struct Solfege;

    impl NoteConverter for Solfege {
        fn nearest_note(&self, _frequency_hz: f32) -> String {
            "la".to_string()
        }
    }

    #[test]
    fn test_invalid_config_fails_fast() {
        let config = PipelineConfig {
            frame_size: 16,
            ..PipelineConfig::default()
        };
        assert!(PitchPipeline::new(config).is_err());

        let config = PipelineConfig {
            sample_rate: 1000,
            ..PipelineConfig::default()
        };
        assert!(PitchPipeline::new(config).is_err());
    }

    #[test]
    fn test_voiced_tone_reaches_stabilizer() {
        let mut pipeline = PitchPipeline::new(PipelineConfig::default()).unwrap();
        let report = pipeline.process_frame(&tone(220.0, 0.5, 0));

        assert!(report.voicing.is_voiced);
        let update = report.stabilizer.unwrap();
        assert!(update.accepted);
        let hz = report.state.frequency_hz.unwrap();
        assert!((hz - 220.0).abs() < 2.2);
        assert_eq!(report.state.state, StabilizerState::WarmingUp);
    }

    #[test]
    fn test_silence_skips_stabilizer() {
        let mut pipeline = PitchPipeline::new(PipelineConfig::default()).unwrap();
        let report = pipeline.process_frame(&silence(0));

        assert!(!report.voicing.is_voiced);
        assert!(report.stabilizer.is_none());
        assert!(report.state.frequency_hz.is_none());
        assert_eq!(report.snr_db, defaults::SNR_FLOOR_DB);

        let stats = pipeline.stats_handle().snapshot();
        assert_eq!(stats.stabilizer.total_processed, 0);
        assert_eq!(stats.pipeline.no_candidate_frames, 1);
    }

    #[test]
    fn test_pitch_is_held_through_silence() {
        let mut pipeline = PitchPipeline::new(PipelineConfig::default()).unwrap();
        for seq in 0..5 {
            pipeline.process_frame(&tone(330.0, 0.5, seq));
        }
        let held = pipeline.stats_handle().snapshot().pitch.frequency_hz;
        let report = pipeline.process_frame(&silence(5));

        assert!(!report.state.voiced);
        assert_eq!(report.state.frequency_hz, held);
    }

    #[test]
    fn test_unvoiced_frame_trains_noise() {
        let mut pipeline = PitchPipeline::new(PipelineConfig::default()).unwrap();
        let hiss: Vec<f32> = (0..defaults::FRAME_SIZE)
            .map(|i| if i % 3 == 0 { 0.01 } else { -0.005 })
            .collect();

        pipeline.process_frame(&AudioFrame::new(hiss.clone(), defaults::SAMPLE_RATE, 0));
        assert!(!pipeline.stats_handle().snapshot().noise.initialized);

        pipeline.process_frame(&AudioFrame::new(hiss, defaults::SAMPLE_RATE, 1));
        assert!(pipeline.stats_handle().snapshot().noise.initialized);
    }

    #[test]
    fn test_quiet_tone_after_silence_stays_voiced() {
        let mut pipeline = PitchPipeline::new(PipelineConfig::default()).unwrap();
        for seq in 0..10 {
            pipeline.process_frame(&silence(seq));
        }

        let voiced = (10..110)
            .filter(|&seq| pipeline.process_frame(&tone(440.0, 0.06, seq)).voicing.is_voiced)
            .count();

        assert_eq!(voiced, 100);
        let stats = pipeline.stats_handle().snapshot();
        assert!(!stats.noise.initialized);
        assert!(stats.pitch.locked);
    }

    #[test]
    fn test_mismatched_sample_rate_is_not_analysed() {
        let mut pipeline = PitchPipeline::new(PipelineConfig::default()).unwrap();
        let samples = tone(440.0, 0.5, 0).samples().to_vec();

        let report = pipeline.process_frame(&AudioFrame::new(samples, 48000, 0));

        assert!(report.estimate.candidate.is_none());
        assert!(report.stabilizer.is_none());
        assert!(report.estimate.rms > 0.3);
        let stats = pipeline.stats_handle().snapshot();
        assert_eq!(stats.pipeline.rate_mismatch_frames, 1);
        assert_eq!(stats.pipeline.no_candidate_frames, 1);

        pipeline.process_frame(&tone(440.0, 0.5, 1));
        let stats = pipeline.stats_handle().snapshot();
        assert_eq!(stats.pipeline.rate_mismatch_frames, 1);
        assert!(!stats.noise.initialized);
    }

    #[test]
    fn test_non_finite_samples_are_sanitized() {
        let mut pipeline = PitchPipeline::new(PipelineConfig::default()).unwrap();
        let mut frame = tone(220.0, 0.5, 0).samples().to_vec();
        frame[10] = f32::NAN;
        frame[20] = f32::INFINITY;

        let report = pipeline.process_frame(&AudioFrame::new(frame, defaults::SAMPLE_RATE, 0));

        assert!(report.estimate.rms.is_finite());
        let stats = pipeline.stats_handle().snapshot();
        assert_eq!(stats.pipeline.sanitized_samples, 2);
        assert_eq!(stats.pipeline.frames_processed, 1);
    }

    #[test]
    fn test_empty_frame_is_handled() {
        let mut pipeline = PitchPipeline::new(PipelineConfig::default()).unwrap();
        let report = pipeline.process_frame(&AudioFrame::new(Vec::new(), defaults::SAMPLE_RATE, 0));
        assert!(!report.voicing.is_voiced);
        assert_eq!(report.voicing.confidence, 0.0);
    }

    #[test]
    fn test_custom_converter_names_notes() {
        let mut pipeline = PitchPipeline::new(PipelineConfig::default())
            .unwrap()
            .with_converter(Arc::new(Solfege));
        for seq in 0..defaults::MIN_SAMPLES as u64 {
            pipeline.process_frame(&tone(440.0, 0.5, seq));
        }
        let stats = pipeline.stats_handle().snapshot();
        assert_eq!(stats.pitch.note.as_deref(), Some("la"));
    }

    #[test]
    fn test_locks_on_steady_tone() {
        let mut pipeline = PitchPipeline::new(PipelineConfig::default()).unwrap();
        for seq in 0..40 {
            pipeline.process_frame(&tone(440.0, 0.5, seq));
        }
        let stats = pipeline.stats_handle().snapshot();
        assert!(stats.pitch.locked);
        assert_eq!(stats.pitch.note.as_deref(), Some("A4"));
        assert_eq!(stats.stabilizer.state, StabilizerState::Locked);
        assert_eq!(stats.stabilizer.outlier_count, 0);
    }

    #[test]
    fn test_reset_zeroes_statistics() {
        let mut pipeline = PitchPipeline::new(PipelineConfig::default()).unwrap();
        let handle = pipeline.stats_handle();
        for seq in 0..20 {
            pipeline.process_frame(&tone(440.0, 0.5, seq));
        }
        pipeline.reset();

        let stats = handle.snapshot();
        assert_eq!(stats.pipeline.frames_processed, 0);
        assert_eq!(stats.stabilizer.total_processed, 0);
        assert!(stats.pitch.frequency_hz.is_none());
        assert_eq!(pipeline.session_summary().frames, 0);
    }

    #[test]
    fn test_session_summary_counts_frames() {
        let mut pipeline = PitchPipeline::new(PipelineConfig::default()).unwrap();
        for seq in 0..6 {
            pipeline.process_frame(&tone(220.0, 0.5, seq));
        }
        pipeline.process_frame(&silence(6));
        pipeline.process_frame(&silence(7));

        let summary = pipeline.session_summary();
        assert_eq!(summary.frames, 8);
        assert_eq!(summary.voiced_frames, 6);
        assert!((summary.voiced_ratio - 0.75).abs() < 1e-6);
        assert!(summary.pitch_mean_hz.is_some());
    }

    #[test]
    fn test_set_filter_strength_is_reported() {
        let mut pipeline = PitchPipeline::new(PipelineConfig::default()).unwrap();
        pipeline.set_filter_strength(0.3);
        pipeline.process_frame(&silence(0));
        let stats = pipeline.stats_handle().snapshot();
        assert!((stats.noise.strength - 0.3).abs() < 1e-6);
    }
}

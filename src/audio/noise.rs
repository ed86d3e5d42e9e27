//! Adaptive Wiener noise suppression.
//!
//! Each frame is transformed with an FFT, every bin is scaled by the Wiener
//! gain `S / (S + N)` derived from a per-bin noise power estimate, and the
//! result is transformed back. The noise estimate only learns from frames
//! judged unvoiced: the power spectrum of frame `t - 1` is kept, its voicing
//! arrives via [`NoiseSuppressor::observe_voicing`], and both are consumed
//! while processing frame `t`. Frame `t` is cleaned with the updated estimate.
//!
//! Degenerate input never fails; it is passed through and reported with the
//! [`defaults::SNR_FLOOR_DB`] sentinel.

use crate::audio::signal::energy;
use crate::defaults;
use crate::error::{PitchError, Result};
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Configuration for the noise suppressor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseConfig {
    /// Scales the applied gain: 0.0 bypasses, 1.0 applies the full Wiener gain.
    pub strength: f32,
    /// Lowest Wiener gain any bin receives.
    pub gain_floor: f32,
    /// Gain used until the first noise estimate exists.
    pub uninitialized_gain: f32,
    /// Noise smoothing for bins whose power rose above the estimate.
    pub rise_smoothing: f32,
    /// Noise smoothing for bins whose power fell below the estimate.
    pub fall_smoothing: f32,
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self {
            strength: defaults::FILTER_STRENGTH,
            gain_floor: defaults::GAIN_FLOOR,
            uninitialized_gain: defaults::UNINITIALIZED_GAIN,
            rise_smoothing: defaults::NOISE_RISE_SMOOTHING,
            fall_smoothing: defaults::NOISE_FALL_SMOOTHING,
        }
    }
}

impl NoiseConfig {
    pub fn validate(&self) -> Result<()> {
        let unit = |key: &str, value: f32| -> Result<()> {
            if (0.0..=1.0).contains(&value) {
                Ok(())
            } else {
                Err(PitchError::invalid(key, "must be within [0, 1]"))
            }
        };
        let smoothing = |key: &str, value: f32| -> Result<()> {
            if (0.0..1.0).contains(&value) {
                Ok(())
            } else {
                Err(PitchError::invalid(key, "must be within [0, 1)"))
            }
        };

        unit("noise.strength", self.strength)?;
        unit("noise.gain_floor", self.gain_floor)?;
        unit("noise.uninitialized_gain", self.uninitialized_gain)?;
        smoothing("noise.rise_smoothing", self.rise_smoothing)?;
        smoothing("noise.fall_smoothing", self.fall_smoothing)
    }
}

/// Per-frame result of noise suppression.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SuppressionReport {
    /// Estimated signal-to-noise ratio of the cleaned frame, in dB.
    pub snr_db: f32,
    /// Energy removed relative to the unfiltered frame, in percent.
    pub noise_reduction_percent: f32,
}

impl SuppressionReport {
    const DEGENERATE: SuppressionReport = SuppressionReport {
        snr_db: defaults::SNR_FLOOR_DB,
        noise_reduction_percent: 0.0,
    };
}

/// Statistics exposed to observers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NoiseStats {
    pub snr_db: f32,
    pub noise_reduction_percent: f32,
    pub strength: f32,
    pub initialized: bool,
}

impl Default for NoiseStats {
    fn default() -> Self {
        Self {
            snr_db: defaults::SNR_FLOOR_DB,
            noise_reduction_percent: 0.0,
            strength: defaults::FILTER_STRENGTH,
            initialized: false,
        }
    }
}

/// Forward/inverse FFT pair for one frame length.
struct FftPlan {
    len: usize,
    forward: Arc<dyn Fft<f32>>,
    inverse: Arc<dyn Fft<f32>>,
}

/// Frequency-domain Wiener noise suppressor.
pub struct NoiseSuppressor {
    config: NoiseConfig,
    plan: Option<FftPlan>,
    spectrum: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    noise_power: Vec<f32>,
    /// Power spectrum of the previous frame, empty when it was degenerate.
    previous_power: Vec<f32>,
    initialized: bool,
    /// Voicing of the previous frame; read once by the next `process`.
    last_voicing: Option<bool>,
    last_report: SuppressionReport,
}

impl NoiseSuppressor {
    pub fn new(config: NoiseConfig) -> Self {
        Self {
            config,
            plan: None,
            spectrum: Vec::new(),
            scratch: Vec::new(),
            noise_power: Vec::new(),
            previous_power: Vec::new(),
            initialized: false,
            last_voicing: None,
            last_report: SuppressionReport::DEGENERATE,
        }
    }

    /// Records the voicing decision of the frame just processed.
    ///
    /// Consumed by the next call to [`process`](Self::process).
    pub fn observe_voicing(&mut self, is_voiced: bool) {
        self.last_voicing = Some(is_voiced);
    }

    /// Updates the filter strength, clamped into [0, 1].
    pub fn set_strength(&mut self, strength: f32) {
        if strength.is_finite() {
            self.config.strength = strength.clamp(0.0, 1.0);
        }
    }

    pub fn strength(&self) -> f32 {
        self.config.strength
    }

    /// True once the noise estimate has received its first update.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn stats(&self) -> NoiseStats {
        NoiseStats {
            snr_db: self.last_report.snr_db,
            noise_reduction_percent: self.last_report.noise_reduction_percent,
            strength: self.config.strength,
            initialized: self.initialized,
        }
    }

    /// Cleans `input` into `output` (replacing its contents).
    pub fn process(&mut self, input: &[f32], output: &mut Vec<f32>) -> SuppressionReport {
        output.clear();
        let learn_noise = self.last_voicing.take() == Some(false);

        let input_energy = energy(input);
        if input.is_empty() || !(input_energy > 0.0) || !input_energy.is_finite() {
            self.previous_power.clear();
            output.extend_from_slice(input);
            self.last_report = SuppressionReport::DEGENERATE;
            return self.last_report;
        }

        self.ensure_plan(input.len());
        let Some(plan) = self.plan.as_ref() else {
            output.extend_from_slice(input);
            self.last_report = SuppressionReport::DEGENERATE;
            return self.last_report;
        };
        let forward = Arc::clone(&plan.forward);
        let inverse = Arc::clone(&plan.inverse);

        self.spectrum.clear();
        self.spectrum
            .extend(input.iter().map(|&s| Complex::new(s, 0.0)));
        forward.process_with_scratch(&mut self.spectrum, &mut self.scratch);

        if learn_noise && self.previous_power.len() == input.len() {
            self.update_noise();
        }
        self.previous_power.clear();
        self.previous_power
            .extend(self.spectrum.iter().map(|bin| bin.norm_sqr()));

        let (signal_out, noise_out) = self.apply_gains();

        inverse.process_with_scratch(&mut self.spectrum, &mut self.scratch);
        let scale = 1.0 / input.len() as f32;
        output.extend(self.spectrum.iter().map(|c| c.re * scale));

        let output_energy = energy(output);
        let noise_reduction_percent =
            (100.0 * (1.0 - output_energy / input_energy)).clamp(0.0, 100.0) as f32;

        self.last_report = SuppressionReport {
            snr_db: self.snr_db(signal_out, noise_out),
            noise_reduction_percent,
        };
        self.last_report
    }

    fn ensure_plan(&mut self, len: usize) {
        if self.plan.as_ref().is_some_and(|p| p.len == len) {
            return;
        }

        let mut planner = FftPlanner::<f32>::new();
        let forward = planner.plan_fft_forward(len);
        let inverse = planner.plan_fft_inverse(len);
        let scratch_len = forward
            .get_inplace_scratch_len()
            .max(inverse.get_inplace_scratch_len());

        self.scratch = vec![Complex::new(0.0, 0.0); scratch_len];
        self.spectrum = Vec::with_capacity(len);
        // A new frame length invalidates the per-bin estimate.
        self.noise_power = vec![0.0; len];
        self.previous_power.clear();
        self.initialized = false;
        self.plan = Some(FftPlan {
            len,
            forward,
            inverse,
        });
    }

    /// Folds the previous (unvoiced) frame's power into the estimate.
    fn update_noise(&mut self) {
        if !self.initialized {
            self.noise_power.copy_from_slice(&self.previous_power);
            self.initialized = true;
            tracing::debug!("noise estimate initialized");
            return;
        }

        let rise = self.config.rise_smoothing;
        let fall = self.config.fall_smoothing;
        for (noise, &power) in self.noise_power.iter_mut().zip(&self.previous_power) {
            let alpha = if power > *noise { rise } else { fall };
            *noise = alpha * *noise + (1.0 - alpha) * power;
        }
    }

    /// Scales every bin in place; returns the gain-weighted signal and noise power.
    fn apply_gains(&mut self) -> (f64, f64) {
        let strength = self.config.strength;
        let mut signal_out = 0.0f64;
        let mut noise_out = 0.0f64;

        for (k, bin) in self.spectrum.iter_mut().enumerate() {
            let wiener = if self.initialized {
                let power = bin.norm_sqr();
                let noise = self.noise_power[k];
                let signal = (power - noise).max(0.0);
                let gain = if signal + noise > 0.0 {
                    signal / (signal + noise)
                } else {
                    1.0
                };
                let applied = 1.0 - strength * (1.0 - gain.max(self.config.gain_floor));
                let squared = (applied * applied) as f64;
                signal_out += squared * signal as f64;
                noise_out += squared * noise as f64;
                applied
            } else {
                1.0 - strength * (1.0 - self.config.uninitialized_gain)
            };
            *bin *= wiener;
        }

        (signal_out, noise_out)
    }

    fn snr_db(&self, signal: f64, noise: f64) -> f32 {
        if !self.initialized || !(signal > 0.0) {
            return defaults::SNR_FLOOR_DB;
        }
        if !(noise > f64::MIN_POSITIVE) {
            return defaults::SNR_CEILING_DB;
        }
        let db = 10.0 * (signal / noise).log10();
        (db as f32).clamp(defaults::SNR_FLOOR_DB, defaults::SNR_CEILING_DB)
    }
}

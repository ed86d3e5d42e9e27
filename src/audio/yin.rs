//! # Fundamental Frequency Estimation
//!
//! YIN-style estimator for monophonic voice:
//! - Difference function over the lag range of the supported vocal span
//! - Cumulative mean normalized difference (CMND)
//! - First dip below an absolute threshold, followed down to its valley floor,
//!   with a global-minimum fallback
//! - Parabolic interpolation for sub-sample lag precision
//! - Silence gate that skips the lag search entirely
//!
//! Frequencies outside the configured range are discarded, never clamped.

use crate::audio::signal::calculate_rms;
use crate::defaults;
use crate::error::{PitchError, Result};
use crate::pipeline::types::{PitchCandidate, PitchEstimate};
use serde::{Deserialize, Serialize};

/// Configuration for the frequency estimator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorConfig {
    /// Lowest frequency reported, in Hz.
    pub min_frequency_hz: f32,
    /// Highest frequency reported, in Hz.
    pub max_frequency_hz: f32,
    /// Absolute CMND threshold; lower values are stricter.
    pub threshold: f32,
    /// Frames with RMS below this are treated as silence.
    pub silence_rms: f32,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            min_frequency_hz: defaults::MIN_FREQUENCY_HZ,
            max_frequency_hz: defaults::MAX_FREQUENCY_HZ,
            threshold: defaults::YIN_THRESHOLD,
            silence_rms: defaults::SILENCE_RMS,
        }
    }
}

impl EstimatorConfig {
    /// Checks the frequency range against the Nyquist limit of `sample_rate`.
    pub fn validate(&self, sample_rate: u32) -> Result<()> {
        let nyquist = sample_rate as f32 / 2.0;
        if !(self.min_frequency_hz.is_finite() && self.min_frequency_hz > 0.0) {
            return Err(PitchError::invalid(
                "estimator.min_frequency_hz",
                "must be a positive frequency",
            ));
        }
        if !(self.max_frequency_hz.is_finite() && self.max_frequency_hz > self.min_frequency_hz) {
            return Err(PitchError::invalid(
                "estimator.max_frequency_hz",
                format!("must be above min_frequency_hz ({})", self.min_frequency_hz),
            ));
        }
        if self.max_frequency_hz >= nyquist {
            return Err(PitchError::invalid(
                "estimator.max_frequency_hz",
                format!("must be below the Nyquist frequency ({nyquist} Hz)"),
            ));
        }
        if !(self.threshold > 0.0 && self.threshold < 1.0) {
            return Err(PitchError::invalid(
                "estimator.threshold",
                "must be between 0 and 1 (exclusive)",
            ));
        }
        if !(self.silence_rms.is_finite() && self.silence_rms >= 0.0) {
            return Err(PitchError::invalid(
                "estimator.silence_rms",
                "must be a non-negative level",
            ));
        }
        Ok(())
    }
}

/// Per-frame fundamental frequency estimator.
///
/// Holds scratch buffers so steady-state estimation does not allocate.
pub struct FrequencyEstimator {
    config: EstimatorConfig,
    sample_rate: u32,
    difference: Vec<f32>,
    cmnd: Vec<f32>,
}

impl FrequencyEstimator {
    pub fn new(config: EstimatorConfig, sample_rate: u32) -> Self {
        Self {
            config,
            sample_rate,
            difference: Vec::new(),
            cmnd: Vec::new(),
        }
    }

    pub fn config(&self) -> &EstimatorConfig {
        &self.config
    }

    /// Estimates the fundamental of one cleaned frame.
    pub fn estimate(&mut self, samples: &[f32]) -> PitchEstimate {
        let rms = calculate_rms(samples);
        if !rms.is_finite() {
            return PitchEstimate::unpitched(0.0);
        }
        if rms < self.config.silence_rms {
            return PitchEstimate::unpitched(rms);
        }

        let Some((min_lag, max_lag)) = self.lag_bounds(samples.len()) else {
            return PitchEstimate::unpitched(rms);
        };

        self.compute_difference(samples, max_lag);
        self.compute_cmnd(max_lag);

        let lag = self.select_lag(min_lag, max_lag);
        let periodicity = (1.0 - self.cmnd[lag]).clamp(0.0, 1.0);
        let refined = self.refine_lag(lag, max_lag);

        PitchEstimate {
            candidate: self.to_candidate(refined, periodicity),
            periodicity,
            rms,
        }
    }

    /// Lag search range `[min_lag, max_lag]` for a frame of `len` samples.
    fn lag_bounds(&self, len: usize) -> Option<(usize, usize)> {
        let rate = self.sample_rate as f32;
        let min_lag = ((rate / self.config.max_frequency_hz).floor() as usize).max(2);
        let max_lag = ((rate / self.config.min_frequency_hz).ceil() as usize).min(len / 2);
        if min_lag + 1 >= max_lag {
            return None;
        }
        Some((min_lag, max_lag))
    }

    /// d(tau) = sum over the window of (x[j] - x[j + tau])^2.
    fn compute_difference(&mut self, samples: &[f32], max_lag: usize) {
        let window = samples.len() - max_lag;
        self.difference.clear();
        self.difference.resize(max_lag + 1, 0.0);

        for tau in 1..=max_lag {
            let head = &samples[..window];
            let shifted = &samples[tau..tau + window];
            self.difference[tau] = head
                .iter()
                .zip(shifted)
                .map(|(a, b)| {
                    let delta = a - b;
                    delta * delta
                })
                .sum();
        }
    }

    /// d'(tau) = d(tau) / ((1/tau) * sum_{j=1..tau} d(j)), with d'(0) = 1.
    fn compute_cmnd(&mut self, max_lag: usize) {
        self.cmnd.clear();
        self.cmnd.resize(max_lag + 1, 1.0);

        let mut running_sum = 0.0f64;
        for tau in 1..=max_lag {
            running_sum += self.difference[tau] as f64;
            self.cmnd[tau] = if running_sum > 0.0 {
                (self.difference[tau] as f64 * tau as f64 / running_sum) as f32
            } else {
                1.0
            };
        }
    }

    /// First valley dipping below the threshold, else the global minimum.
    fn select_lag(&self, min_lag: usize, max_lag: usize) -> usize {
        let threshold = self.config.threshold;

        for tau in min_lag..max_lag {
            if self.cmnd[tau] < threshold {
                let mut floor = tau;
                while floor < max_lag && self.cmnd[floor + 1] < self.cmnd[floor] {
                    floor += 1;
                }
                return floor;
            }
        }

        (min_lag..=max_lag)
            .min_by(|&a, &b| self.cmnd[a].total_cmp(&self.cmnd[b]))
            .unwrap_or(min_lag)
    }

    /// Parabolic interpolation around `lag` using its two CMND neighbours.
    fn refine_lag(&self, lag: usize, max_lag: usize) -> f32 {
        if lag < 1 || lag >= max_lag {
            return lag as f32;
        }

        let y1 = self.cmnd[lag - 1];
        let y2 = self.cmnd[lag];
        let y3 = self.cmnd[lag + 1];

        let curvature = y1 - 2.0 * y2 + y3;
        if curvature.abs() < 1e-12 {
            return lag as f32;
        }

        let shift = (0.5 * (y1 - y3) / curvature).clamp(-1.0, 1.0);
        lag as f32 + shift
    }

    fn to_candidate(&self, lag: f32, periodicity: f32) -> Option<PitchCandidate> {
        if periodicity <= 0.0 || lag <= 0.0 {
            return None;
        }
        let frequency_hz = self.sample_rate as f32 / lag;
        let in_range = frequency_hz >= self.config.min_frequency_hz
            && frequency_hz <= self.config.max_frequency_hz;
        if !frequency_hz.is_finite() || !in_range {
            return None;
        }
        Some(PitchCandidate {
            frequency_hz,
            periodicity,
        })
    }
}

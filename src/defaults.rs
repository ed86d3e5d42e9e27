//! Default configuration constants for voxpitch.
//!
//! Every tuned number in the pipeline lives here under a name so that
//! configuration structs, validation and tests agree on one value. The
//! stabilizer constants were calibrated empirically against sung input and
//! are overridable through [`crate::config::Config`].

/// Default capture sample rate in Hz.
pub const SAMPLE_RATE: u32 = 44100;

/// Default frame length in samples (~46 ms at 44.1 kHz).
///
/// Long enough to hold two periods of the lowest supported pitch.
pub const FRAME_SIZE: usize = 2048;

/// Smallest frame the pipeline accepts at construction.
pub const MIN_FRAME_SIZE: usize = 64;

// --- Fundamental frequency estimator ---

/// Lowest supported vocal fundamental (about C2).
pub const MIN_FREQUENCY_HZ: f32 = 65.0;

/// Highest supported vocal fundamental (about B5).
pub const MAX_FREQUENCY_HZ: f32 = 1000.0;

/// Absolute threshold on the cumulative-mean-normalized difference.
pub const YIN_THRESHOLD: f32 = 0.15;

/// Frames with RMS below this skip the lag search entirely.
pub const SILENCE_RMS: f32 = 0.005;

// --- Noise suppressor ---

/// Default filter strength (0 = bypass, 1 = full Wiener gain).
pub const FILTER_STRENGTH: f32 = 0.8;

/// Gain applied before the first noise estimate exists (pass-through).
pub const UNINITIALIZED_GAIN: f32 = 1.0;

/// Lower bound on the per-bin Wiener gain (-20 dB).
pub const GAIN_FLOOR: f32 = 0.1;

/// Noise estimate smoothing when bin power rises above the estimate.
pub const NOISE_RISE_SMOOTHING: f32 = 0.95;

/// Noise estimate smoothing when bin power falls below the estimate.
pub const NOISE_FALL_SMOOTHING: f32 = 0.7;

/// Sentinel SNR reported for degenerate frames or an unknown noise floor.
pub const SNR_FLOOR_DB: f32 = -60.0;

/// Upper clamp for SNR when residual noise is (numerically) absent.
pub const SNR_CEILING_DB: f32 = 120.0;

// --- Voice activity classifier ---

/// RMS threshold for the energy sub-decision (0.0 to 1.0).
pub const VAD_THRESHOLD: f32 = 0.02;

/// Minimum periodicity for the periodicity sub-decision.
pub const PERIODICITY_THRESHOLD: f32 = 0.7;

/// Number of recent frames the agreement accuracy is computed over.
pub const ACCURACY_WINDOW: usize = 100;

// --- Pitch stabilizer ---

/// Window size and warm-up length of the running pitch statistics.
pub const MIN_SAMPLES: usize = 15;

/// Fixed multiplier of the standard deviation in the outlier test.
pub const BASE_THRESHOLD_MULTIPLIER: f32 = 4.0;

/// Coefficient of the volatility-scaled part of the outlier threshold.
pub const ADAPTIVE_THRESHOLD_COEFFICIENT: f32 = 0.2;

/// Exponential smoothing weight of a newly accepted pitch.
pub const SMOOTHING_FACTOR: f32 = 0.3;

/// Consecutive matching frames needed to lock at low voicing confidence.
pub const REQUIRED_STABLE_FRAMES: u32 = 8;

/// Consecutive matching frames needed to lock at full voicing confidence.
pub const MIN_REQUIRED_STABLE_FRAMES: u32 = 3;

/// Floor on the window's standard deviation in Hz.
///
/// A perfectly steady tone has near-zero spread, which would otherwise turn
/// every rounding difference into an outlier.
pub const MIN_DEVIATION_HZ: f32 = 1.0;

/// Consecutive rejections after which the next candidate is accepted.
pub const MAX_CONSECUTIVE_OUTLIERS: u32 = 5;

// --- Note naming ---

/// Concert pitch reference.
pub const A4_HZ: f32 = 440.0;

// --- Real-time runner ---

/// Frames buffered between capture and processing before dropping.
pub const QUEUE_CAPACITY: usize = 4;

/// Frames older than this many frame durations are dropped unprocessed.
pub const MAX_FRAME_AGE_FRAMES: u32 = 2;

/// Capture polling interval when a live source has no full frame yet.
pub const POLL_INTERVAL_MS: u64 = 5;

//! Statistics snapshot shared between the processing thread and observers.

use crate::audio::noise::NoiseStats;
use crate::audio::vad::VoicingStats;
use crate::pipeline::types::PitchState;
use crate::tracking::stabilizer::StabilizerStats;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Counters owned by the orchestrator itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PipelineCounters {
    pub frames_processed: u64,
    /// Non-finite input samples replaced with silence.
    pub sanitized_samples: u64,
    /// Frames for which the estimator produced no candidate.
    pub no_candidate_frames: u64,
    /// Frames whose sample rate differed from the pipeline's; not analysed.
    pub rate_mismatch_frames: u64,
}

/// Immutable snapshot of every component's statistics after one frame.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ComponentStatistics {
    pub noise: NoiseStats,
    pub voicing: VoicingStats,
    pub stabilizer: StabilizerStats,
    pub pipeline: PipelineCounters,
    pub pitch: PitchState,
}

impl ComponentStatistics {
    /// Flattens the numeric fields into `"section.field"` entries.
    ///
    /// Booleans map to 0/1; absent pitch values are omitted.
    pub fn to_map(&self) -> BTreeMap<String, f64> {
        let flag = |b: bool| if b { 1.0 } else { 0.0 };
        let mut map = BTreeMap::new();
        let mut put = |key: &str, value: f64| {
            map.insert(key.to_string(), value);
        };

        put("noise.snr_db", self.noise.snr_db as f64);
        put(
            "noise.noise_reduction_percent",
            self.noise.noise_reduction_percent as f64,
        );
        put("noise.strength", self.noise.strength as f64);
        put("noise.initialized", flag(self.noise.initialized));

        put("voicing.voice_frames", self.voicing.voice_frames as f64);
        put("voicing.total_frames", self.voicing.total_frames as f64);
        put(
            "voicing.accuracy_percent",
            self.voicing.accuracy_percent as f64,
        );

        put(
            "stabilizer.outlier_count",
            self.stabilizer.outlier_count as f64,
        );
        put(
            "stabilizer.total_processed",
            self.stabilizer.total_processed as f64,
        );
        put(
            "stabilizer.smoothing_factor",
            self.stabilizer.smoothing_factor as f64,
        );
        put(
            "stabilizer.consecutive_stable_frames",
            self.stabilizer.consecutive_stable_frames as f64,
        );
        put(
            "stabilizer.required_frames",
            self.stabilizer.required_frames as f64,
        );

        put(
            "pipeline.frames_processed",
            self.pipeline.frames_processed as f64,
        );
        put(
            "pipeline.sanitized_samples",
            self.pipeline.sanitized_samples as f64,
        );
        put(
            "pipeline.no_candidate_frames",
            self.pipeline.no_candidate_frames as f64,
        );
        put(
            "pipeline.rate_mismatch_frames",
            self.pipeline.rate_mismatch_frames as f64,
        );

        if let Some(hz) = self.pitch.frequency_hz {
            put("pitch.frequency_hz", hz as f64);
        }
        put("pitch.locked", flag(self.pitch.locked));
        put("pitch.voiced", flag(self.pitch.voiced));
        put("pitch.confidence", self.pitch.confidence as f64);

        map
    }
}

/// Cloneable read handle to the latest statistics.
///
/// The processing thread swaps in a complete snapshot once per frame, so a
/// reader always sees counters from the same frame.
#[derive(Debug, Clone, Default)]
pub struct StatsHandle {
    latest: Arc<RwLock<Arc<ComponentStatistics>>>,
}

impl StatsHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest published statistics.
    pub fn snapshot(&self) -> Arc<ComponentStatistics> {
        let guard = self.latest.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&*guard)
    }

    pub(crate) fn publish(&self, stats: ComponentStatistics) {
        let next = Arc::new(stats);
        let mut guard = self.latest.write().unwrap_or_else(PoisonError::into_inner);
        *guard = next;
    }
}

//! Per-session accumulation and reporting.
//!
//! The orchestrator feeds every frame report into a [`SessionTracker`]; the
//! resulting [`SessionSummary`] is what a practice-history store would keep.

use crate::pipeline::types::FrameReport;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Aggregated results of one session.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SessionSummary {
    pub frames: u64,
    pub voiced_frames: u64,
    pub voiced_ratio: f32,
    /// Mean of the smoothed pitch over accepted frames.
    pub pitch_mean_hz: Option<f32>,
    pub pitch_min_hz: Option<f32>,
    pub pitch_max_hz: Option<f32>,
    /// Frames spent locked, per note.
    pub locked_frames: BTreeMap<String, u64>,
    pub longest_lock_frames: u64,
    pub longest_lock_note: Option<String>,
    /// Frames lost before processing (filled in by the runner).
    pub dropped_frames: u64,
    /// Audio covered by the processed frames.
    pub duration_secs: f64,
    pub processing_avg_ms: f64,
    pub processing_max_ms: f64,
}

impl SessionSummary {
    /// Processing time relative to audio time.
    /// < 1.0 means faster than real-time.
    pub fn realtime_factor(&self) -> f64 {
        if self.duration_secs <= 0.0 || self.frames == 0 {
            return 0.0;
        }
        let frame_secs = self.duration_secs / self.frames as f64;
        (self.processing_avg_ms / 1000.0) / frame_secs
    }

    /// Prints a user-friendly summary of the session.
    pub fn print_summary(&self) {
        eprintln!();
        eprintln!("=== Session Summary ===");
        eprintln!(
            "Analysed {} frame{} ({})",
            self.frames,
            if self.frames == 1 { "" } else { "s" },
            format_duration(Duration::from_secs_f64(self.duration_secs.max(0.0)))
        );
        eprintln!();
        eprintln!(
            "  Voiced:                   {} ({:.0}%)",
            self.voiced_frames,
            self.voiced_ratio * 100.0
        );
        if let (Some(mean), Some(min), Some(max)) =
            (self.pitch_mean_hz, self.pitch_min_hz, self.pitch_max_hz)
        {
            eprintln!("  Pitch:                    {mean:.1} Hz (range {min:.1} to {max:.1} Hz)");
        }
        if let Some(note) = &self.longest_lock_note {
            eprintln!(
                "  Longest lock:             {} for {} frames",
                note, self.longest_lock_frames
            );
        }
        for (note, frames) in &self.locked_frames {
            eprintln!("    {:<4} {}", note, frames);
        }
        eprintln!();
        eprintln!(
            "  Processing: {:.2}ms avg, {:.2}ms max ({:.3}x real-time)",
            self.processing_avg_ms,
            self.processing_max_ms,
            self.realtime_factor()
        );
        if self.dropped_frames > 0 {
            eprintln!("  Dropped frames: {}", self.dropped_frames);
        }
    }
}

/// Running accumulator behind [`SessionSummary`].
#[derive(Debug, Default)]
pub struct SessionTracker {
    frames: u64,
    voiced_frames: u64,
    pitch_sum: f64,
    pitch_count: u64,
    pitch_min: Option<f32>,
    pitch_max: Option<f32>,
    locked_frames: BTreeMap<String, u64>,
    streak: Option<(String, u64)>,
    longest: Option<(String, u64)>,
    audio: Duration,
    processing: Duration,
    processing_max: Duration,
}

impl SessionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one processed frame.
    pub fn record(&mut self, report: &FrameReport, audio: Duration, processing: Duration) {
        self.frames += 1;
        self.audio += audio;
        self.processing += processing;
        self.processing_max = self.processing_max.max(processing);

        if report.voicing.is_voiced {
            self.voiced_frames += 1;
        }

        if let Some(update) = &report.stabilizer
            && update.accepted
            && let Some(hz) = update.frequency_hz
        {
            self.pitch_sum += hz as f64;
            self.pitch_count += 1;
            self.pitch_min = Some(self.pitch_min.map_or(hz, |m| m.min(hz)));
            self.pitch_max = Some(self.pitch_max.map_or(hz, |m| m.max(hz)));
        }

        match (&report.state.note, report.state.locked) {
            (Some(note), true) => self.extend_streak(note),
            _ => self.streak = None,
        }
    }

    fn extend_streak(&mut self, note: &str) {
        *self.locked_frames.entry(note.to_string()).or_insert(0) += 1;

        let len = match &mut self.streak {
            Some((current, len)) if current == note => {
                *len += 1;
                *len
            }
            _ => {
                self.streak = Some((note.to_string(), 1));
                1
            }
        };

        if self.longest.as_ref().is_none_or(|(_, best)| len > *best) {
            self.longest = Some((note.to_string(), len));
        }
    }

    pub fn summary(&self) -> SessionSummary {
        let voiced_ratio = if self.frames == 0 {
            0.0
        } else {
            self.voiced_frames as f32 / self.frames as f32
        };
        let pitch_mean_hz =
            (self.pitch_count > 0).then(|| (self.pitch_sum / self.pitch_count as f64) as f32);
        let processing_avg_ms = if self.frames == 0 {
            0.0
        } else {
            self.processing.as_secs_f64() * 1000.0 / self.frames as f64
        };

        SessionSummary {
            frames: self.frames,
            voiced_frames: self.voiced_frames,
            voiced_ratio,
            pitch_mean_hz,
            pitch_min_hz: self.pitch_min,
            pitch_max_hz: self.pitch_max,
            locked_frames: self.locked_frames.clone(),
            longest_lock_frames: self.longest.as_ref().map_or(0, |(_, len)| *len),
            longest_lock_note: self.longest.as_ref().map(|(note, _)| note.clone()),
            dropped_frames: 0,
            duration_secs: self.audio.as_secs_f64(),
            processing_avg_ms,
            processing_max_ms: self.processing_max.as_secs_f64() * 1000.0,
        }
    }
}

/// Formats a duration as a human-friendly string.
/// Under 1s: "450ms", at or above 1s: "1.5s".
fn format_duration(d: Duration) -> String {
    let ms = d.as_millis();
    if ms < 1000 {
        format!("{}ms", ms)
    } else {
        format!("{:.1}s", d.as_secs_f64())
    }
}

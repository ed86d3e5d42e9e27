//! Terminal rendering for `voxpitch analyze` and `voxpitch listen`.

use crate::pipeline::{ComponentStatistics, FrameReport, PitchState};
use crate::tracking::{EqualTemperament, StabilizerState};
use owo_colors::OwoColorize;
use std::io::{self, Write};

/// Width of the tuning bar in cells, excluding the end markers.
const CENTS_BAR_WIDTH: usize = 21;

/// Clear the current terminal line (replaces the meter).
pub fn clear_line() {
    eprint!("\r\x1b[2K");
}

/// Horizontal tuning bar with the marker at `cents` from the nearest note.
///
/// The centre cell is the in-tune position; the ends are a quarter tone off.
pub fn format_cents_bar(cents: Option<f32>) -> String {
    let mut cells = vec!['-'; CENTS_BAR_WIDTH];
    let centre = CENTS_BAR_WIDTH / 2;
    cells[centre] = '+';

    if let Some(cents) = cents.filter(|c| c.is_finite()) {
        let offset = (cents.clamp(-50.0, 50.0) / 50.0 * centre as f32).round() as isize;
        let position = (centre as isize + offset).clamp(0, CENTS_BAR_WIDTH as isize - 1);
        cells[position as usize] = '|';
    }

    let bar: String = cells.into_iter().collect();
    format!("[{bar}]")
}

/// Plain one-line description of the current pitch state.
pub fn format_pitch(state: &PitchState) -> String {
    match (state.frequency_hz, state.note.as_deref()) {
        (Some(hz), Some(note)) => {
            let lock = if state.locked { " locked" } else { "" };
            format!("{note:<4} {hz:7.2} Hz{lock}")
        }
        (Some(hz), None) => format!("{:<4} {hz:7.2} Hz", "-"),
        _ => format!("{:<4} {:>7} Hz", "-", "---"),
    }
}

/// One line per analysed frame for `analyze -v`.
pub fn format_frame_line(report: &FrameReport, frame_secs: f64) -> String {
    let time = report.sequence as f64 * frame_secs;
    let raw = report
        .estimate
        .candidate
        .map(|c| format!("{:7.2}", c.frequency_hz))
        .unwrap_or_else(|| format!("{:>7}", "-"));
    let verdict = match &report.stabilizer {
        Some(update) if update.reanchored => "reanchor",
        Some(update) if !update.accepted => "outlier",
        Some(_) => "ok",
        None if report.voicing.is_voiced => "no pitch",
        None => "unvoiced",
    };
    format!(
        "{time:8.3}s  raw {raw}  conf {:.2}  snr {:6.1} dB  {:<8}  {}  [{}]",
        report.voicing.confidence,
        report.snr_db,
        verdict,
        format_pitch(&report.state),
        report.state.state,
    )
}

/// Live meter line: note, tuning bar, voicing and filter status.
pub fn render_meter(stats: &ComponentStatistics, scale: &EqualTemperament) {
    let pitch = &stats.pitch;
    let cents = pitch.frequency_hz.and_then(|hz| scale.cents_off(hz));
    let bar = format_cents_bar(cents);
    let cents_text = cents
        .map(|c| format!("{c:+4.0}c"))
        .unwrap_or_else(|| "     ".to_string());

    let text = format_pitch(pitch);
    let pitch_text = match pitch.state {
        StabilizerState::Locked => text.green().bold().to_string(),
        StabilizerState::Tracking => text.yellow().to_string(),
        StabilizerState::WarmingUp => text.dimmed().to_string(),
    };
    let voice = if pitch.voiced {
        "VOICE".green().to_string()
    } else {
        "     ".to_string()
    };
    let snr = format!("snr {:5.1} dB", stats.noise.snr_db);

    eprint!(
        "\r\x1b[2K{pitch_text} {bar} {cents_text} {voice} {}",
        snr.dimmed()
    );
    io::stderr().flush().ok();
}

//! Frequency to note-name conversion.

use crate::defaults;

const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Maps a frequency to the name of its nearest note.
///
/// Implementations must be pure: the same frequency always yields the same
/// name.
pub trait NoteConverter: Send + Sync {
    /// Nearest note name for a finite, positive frequency (e.g. `"A4"`).
    fn nearest_note(&self, frequency_hz: f32) -> String;
}

/// Twelve-tone equal temperament anchored at A4.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EqualTemperament {
    pub a4_hz: f32,
}

impl Default for EqualTemperament {
    fn default() -> Self {
        Self {
            a4_hz: defaults::A4_HZ,
        }
    }
}

impl EqualTemperament {
    pub fn new(a4_hz: f32) -> Self {
        Self { a4_hz }
    }

    /// Nearest MIDI note number, or `None` for non-positive input.
    pub fn midi_note(&self, frequency_hz: f32) -> Option<i32> {
        if !(frequency_hz > 0.0) || !frequency_hz.is_finite() {
            return None;
        }
        let semitones = 12.0 * (frequency_hz / self.a4_hz).log2();
        Some(69 + semitones.round() as i32)
    }

    /// Deviation from the nearest note in cents (-50 to +50).
    pub fn cents_off(&self, frequency_hz: f32) -> Option<f32> {
        let midi = self.midi_note(frequency_hz)?;
        let reference = self.a4_hz * 2f32.powf((midi - 69) as f32 / 12.0);
        Some(1200.0 * (frequency_hz / reference).log2())
    }
}

impl NoteConverter for EqualTemperament {
    fn nearest_note(&self, frequency_hz: f32) -> String {
        match self.midi_note(frequency_hz) {
            Some(midi) => {
                let name = NOTE_NAMES[midi.rem_euclid(12) as usize];
                let octave = midi.div_euclid(12) - 1;
                format!("{name}{octave}")
            }
            None => "-".to_string(),
        }
    }
}

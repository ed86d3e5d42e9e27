//! Turning per-frame pitch candidates into a stable current note.

pub mod note;
pub mod stabilizer;
pub mod window;

pub use note::{EqualTemperament, NoteConverter};
pub use stabilizer::{
    PitchStabilizer, StabilityCounter, StabilizerConfig, StabilizerState, StabilizerStats,
    StabilizerUpdate,
};
pub use window::RunningPitchWindow;

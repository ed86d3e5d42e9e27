//! WAV file audio source for offline analysis.

use crate::audio::recorder::AudioSource;
use crate::error::{PitchError, Result};
use crate::pipeline::types::AudioFrame;
use std::io::Read;
use std::path::Path;
use std::time::Duration;

/// Audio source that reads from WAV file data.
///
/// Integer and float files of any channel count are mixed down to mono
/// `f32`. The file's own sample rate is preserved.
pub struct WavAudioSource {
    samples: Vec<f32>,
    sample_rate: u32,
    position: usize,
    frame_size: usize,
    sequence: u64,
}

impl WavAudioSource {
    /// Create from any reader (for testing/flexibility).
    pub fn from_reader(reader: Box<dyn Read + Send>, frame_size: usize) -> Result<Self> {
        if frame_size == 0 {
            return Err(PitchError::invalid("audio.frame_size", "must be positive"));
        }

        let mut wav_reader =
            hound::WavReader::new(reader).map_err(|e| PitchError::AudioCapture {
                message: format!("Failed to parse WAV file: {}", e),
            })?;

        let spec = wav_reader.spec();
        if spec.channels == 0 {
            return Err(PitchError::AudioFormatMismatch {
                expected: "at least one channel".to_string(),
                actual: "0 channels".to_string(),
            });
        }

        let interleaved: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => wav_reader
                .samples::<f32>()
                .collect::<std::result::Result<Vec<_>, _>>(),
            hound::SampleFormat::Int => {
                let scale = 1.0 / (1i64 << (spec.bits_per_sample.max(1) - 1)) as f32;
                wav_reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| v as f32 * scale))
                    .collect::<std::result::Result<Vec<_>, _>>()
            }
        }
        .map_err(|e| PitchError::AudioCapture {
            message: format!("Failed to read WAV samples: {}", e),
        })?;

        let samples = mixdown(&interleaved, spec.channels as usize);
        tracing::debug!(
            sample_rate = spec.sample_rate,
            channels = spec.channels,
            samples = samples.len(),
            "loaded WAV audio"
        );

        Ok(Self {
            samples,
            sample_rate: spec.sample_rate,
            position: 0,
            frame_size,
            sequence: 0,
        })
    }

    /// Open a WAV file from disk.
    pub fn open(path: &Path, frame_size: usize) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(Box::new(std::io::BufReader::new(file)), frame_size)
    }

    /// Create from stdin.
    pub fn from_stdin(frame_size: usize) -> Result<Self> {
        use std::io::Cursor;

        // Read all data from stdin into memory first (StdinLock is not Send)
        let mut buffer = Vec::new();
        std::io::stdin()
            .lock()
            .read_to_end(&mut buffer)
            .map_err(|e| PitchError::AudioCapture {
                message: format!("Failed to read from stdin: {}", e),
            })?;

        Self::from_reader(Box::new(Cursor::new(buffer)), frame_size)
    }

    /// Length of the decoded audio.
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.samples.len() as f64 / self.sample_rate as f64)
    }

    /// Number of frames the whole file yields.
    pub fn frame_count(&self) -> usize {
        self.samples.len().div_ceil(self.frame_size)
    }
}

impl AudioSource for WavAudioSource {
    fn start(&mut self) -> Result<()> {
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        Ok(())
    }

    fn read_frame(&mut self) -> Result<Option<AudioFrame>> {
        if self.position >= self.samples.len() {
            return Ok(None);
        }

        let end = std::cmp::min(self.position + self.frame_size, self.samples.len());
        let mut frame = self.samples[self.position..end].to_vec();
        frame.resize(self.frame_size, 0.0);
        self.position = end;

        let frame = AudioFrame::new(frame, self.sample_rate, self.sequence);
        self.sequence += 1;
        Ok(Some(frame))
    }

    fn is_finite(&self) -> bool {
        true
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

/// Averages interleaved channels into one.
fn mixdown(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks_exact(channels)
        .map(|chunk| chunk.iter().sum::<f32>() / channels as f32)
        .collect()
}

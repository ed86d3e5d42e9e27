use crate::defaults;
use crate::error::{PitchError, Result};
use crate::pipeline::types::AudioFrame;
use std::collections::VecDeque;

/// Trait for audio source devices.
///
/// This trait allows swapping implementations (microphone, WAV file, mock).
/// Sources deliver fixed-size frames; a short final frame is zero-padded.
pub trait AudioSource: Send {
    /// Start capturing audio from the source.
    ///
    /// # Returns
    /// Ok(()) if the source started successfully, or an error
    fn start(&mut self) -> Result<()>;

    /// Stop capturing audio from the source.
    ///
    /// # Returns
    /// Ok(()) if the source stopped successfully, or an error
    fn stop(&mut self) -> Result<()>;

    /// Read the next complete frame.
    ///
    /// # Returns
    /// `Some(frame)` when a full frame is available, `None` when a live source
    /// has nothing yet or a finite source is exhausted, or an error
    fn read_frame(&mut self) -> Result<Option<AudioFrame>>;

    /// Whether the source ends on its own (a file) rather than running
    /// until stopped (a microphone).
    fn is_finite(&self) -> bool {
        false
    }

    /// Sample rate of the frames this source produces.
    fn sample_rate(&self) -> u32;
}

/// Mock audio source for testing
#[derive(Debug, Clone)]
pub struct MockAudioSource {
    is_started: bool,
    sample_rate: u32,
    frames: VecDeque<Vec<f32>>,
    sequence: u64,
    finite: bool,
    should_fail_start: bool,
    should_fail_stop: bool,
    failing_reads: Option<u32>,
    error_message: String,
}

impl MockAudioSource {
    /// Create a new finite mock audio source with no frames
    pub fn new() -> Self {
        Self {
            is_started: false,
            sample_rate: defaults::SAMPLE_RATE,
            frames: VecDeque::new(),
            sequence: 0,
            finite: true,
            should_fail_start: false,
            should_fail_stop: false,
            failing_reads: Some(0),
            error_message: "mock audio error".to_string(),
        }
    }

    /// Configure the frames returned by successive reads
    pub fn with_frames(mut self, frames: Vec<Vec<f32>>) -> Self {
        self.frames = frames.into();
        self
    }

    /// Configure the reported sample rate
    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    /// Behave like a microphone: never finite, `None` once drained
    pub fn live(mut self) -> Self {
        self.finite = false;
        self
    }

    /// Configure the mock to fail on start
    pub fn with_start_failure(mut self) -> Self {
        self.should_fail_start = true;
        self
    }

    /// Configure the mock to fail on stop
    pub fn with_stop_failure(mut self) -> Self {
        self.should_fail_stop = true;
        self
    }

    /// Configure the mock to fail on every read
    pub fn with_read_failure(mut self) -> Self {
        self.failing_reads = None;
        self
    }

    /// Configure the mock to fail only the first `count` reads
    pub fn with_read_failures(mut self, count: u32) -> Self {
        self.failing_reads = Some(count);
        self
    }

    /// Configure the error message for failures
    pub fn with_error_message(mut self, message: &str) -> Self {
        self.error_message = message.to_string();
        self
    }

    /// Check if the audio source is started
    pub fn is_started(&self) -> bool {
        self.is_started
    }

    /// Frames not yet read
    pub fn remaining(&self) -> usize {
        self.frames.len()
    }

    fn error(&self) -> PitchError {
        PitchError::AudioCapture {
            message: self.error_message.clone(),
        }
    }
}

impl Default for MockAudioSource {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioSource for MockAudioSource {
    fn start(&mut self) -> Result<()> {
        if self.should_fail_start {
            Err(self.error())
        } else {
            self.is_started = true;
            Ok(())
        }
    }

    fn stop(&mut self) -> Result<()> {
        if self.should_fail_stop {
            Err(self.error())
        } else {
            self.is_started = false;
            Ok(())
        }
    }

    fn read_frame(&mut self) -> Result<Option<AudioFrame>> {
        match self.failing_reads {
            None => return Err(self.error()),
            Some(n) if n > 0 => {
                self.failing_reads = Some(n - 1);
                return Err(self.error());
            }
            Some(_) => {}
        }

        Ok(self.frames.pop_front().map(|samples| {
            let frame = AudioFrame::new(samples, self.sample_rate, self.sequence);
            self.sequence += 1;
            frame
        }))
    }

    fn is_finite(&self) -> bool {
        self.finite
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

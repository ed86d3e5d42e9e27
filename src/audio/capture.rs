//! Real audio capture using CPAL (Cross-Platform Audio Library).

use crate::audio::recorder::AudioSource;
use crate::error::{PitchError, Result};
use crate::pipeline::types::AudioFrame;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Run a closure with stderr temporarily redirected to /dev/null.
///
/// This suppresses noisy ALSA/JACK/PipeWire messages that CPAL triggers
/// when probing audio backends.
///
/// # Safety
/// Uses `libc::dup`/`libc::dup2` to save and restore file descriptor 2 (stderr).
/// Safe as long as no other thread is concurrently manipulating fd 2.
fn with_suppressed_stderr<F, R>(f: F) -> R
where
    F: FnOnce() -> R,
{
    unsafe {
        let saved_fd = libc::dup(2);
        let devnull = libc::open(c"/dev/null".as_ptr(), libc::O_WRONLY);
        if saved_fd >= 0 && devnull >= 0 {
            libc::dup2(devnull, 2);
            libc::close(devnull);
        }

        let result = f();

        if saved_fd >= 0 {
            libc::dup2(saved_fd, 2);
            libc::close(saved_fd);
        }

        result
    }
}

/// Device name patterns that are never microphones.
const FILTERED_PATTERNS: &[&str] = &[
    "surround",
    "front:",
    "rear:",
    "center:",
    "side:",
    "Digital Output",
    "HDMI",
    "S/PDIF",
];

fn should_filter_device(name: &str) -> bool {
    let lower = name.to_lowercase();
    FILTERED_PATTERNS
        .iter()
        .any(|pattern| lower.contains(&pattern.to_lowercase()))
}

/// List usable audio input device names.
///
/// # Errors
/// Returns `PitchError::AudioCapture` if device enumeration fails.
pub fn list_devices() -> Result<Vec<String>> {
    let devices = with_suppressed_stderr(|| cpal::default_host().input_devices());
    let devices = devices.map_err(|e| PitchError::AudioCapture {
        message: format!("Failed to enumerate input devices: {}", e),
    })?;

    Ok(devices
        .filter_map(|device| device.name().ok())
        .filter(|name| !should_filter_device(name))
        .collect())
}

fn find_device(device_name: Option<&str>) -> Result<cpal::Device> {
    with_suppressed_stderr(|| {
        let host = cpal::default_host();

        let Some(name) = device_name else {
            return host
                .default_input_device()
                .ok_or_else(|| PitchError::AudioDeviceNotFound {
                    device: "default".to_string(),
                });
        };

        let devices = host
            .input_devices()
            .map_err(|e| PitchError::AudioCapture {
                message: format!("Failed to enumerate devices: {}", e),
            })?;

        for device in devices {
            if let Ok(device_name) = device.name()
                && device_name == name
            {
                return Ok(device);
            }
        }

        Err(PitchError::AudioDeviceNotFound {
            device: name.to_string(),
        })
    })
}

/// Wrapper for cpal::Stream to make it Send.
///
/// SAFETY: the stream is only touched from the thread that owns the
/// `CpalAudioSource` (start/stop), never from the data callback.
struct SendableStream(cpal::Stream);

unsafe impl Send for SendableStream {}

/// Microphone capture delivering mono `f32` frames.
///
/// Opens the device at the requested rate when it supports it, otherwise at
/// its native rate; [`AudioSource::sample_rate`] reports the rate actually
/// in use once started.
pub struct CpalAudioSource {
    device: cpal::Device,
    stream: Option<SendableStream>,
    buffer: Arc<Mutex<Vec<f32>>>,
    callback_count: Arc<AtomicU64>,
    sample_rate: u32,
    frame_size: usize,
    sequence: u64,
}

impl CpalAudioSource {
    /// Create a new CPAL audio source.
    ///
    /// # Arguments
    /// * `device_name` - Optional device name. If None, uses the default input device.
    /// * `sample_rate` - Preferred capture rate in Hz
    /// * `frame_size` - Samples per delivered frame
    pub fn new(device_name: Option<&str>, sample_rate: u32, frame_size: usize) -> Result<Self> {
        if frame_size == 0 {
            return Err(PitchError::invalid("audio.frame_size", "must be positive"));
        }
        let device = find_device(device_name)?;

        Ok(Self {
            device,
            stream: None,
            buffer: Arc::new(Mutex::new(Vec::new())),
            callback_count: Arc::new(AtomicU64::new(0)),
            sample_rate,
            frame_size,
            sequence: 0,
        })
    }

    /// Build a mono stream at the preferred rate, f32 first, then i16.
    fn build_stream(&self) -> Result<cpal::Stream> {
        let preferred_config = cpal::StreamConfig {
            channels: 1,
            sample_rate: cpal::SampleRate(self.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let err_callback = |err| {
            tracing::warn!("audio stream error: {}", err);
        };

        let buffer = Arc::clone(&self.buffer);
        let counter = Arc::clone(&self.callback_count);
        if let Ok(stream) = self.device.build_input_stream(
            &preferred_config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                counter.fetch_add(1, Ordering::Relaxed);
                if let Ok(mut buf) = buffer.lock() {
                    buf.extend_from_slice(data);
                }
            },
            err_callback,
            None,
        ) {
            return Ok(stream);
        }

        let buffer = Arc::clone(&self.buffer);
        let counter = Arc::clone(&self.callback_count);
        self.device
            .build_input_stream(
                &preferred_config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    counter.fetch_add(1, Ordering::Relaxed);
                    if let Ok(mut buf) = buffer.lock() {
                        buf.extend(data.iter().map(|&s| s as f32 / i16::MAX as f32));
                    }
                },
                err_callback,
                None,
            )
            .map_err(|e| PitchError::AudioCapture {
                message: format!("Failed to build input stream: {}", e),
            })
    }

    /// Build a stream at the device's native config, mixing down to mono.
    ///
    /// Returns the stream and the native sample rate.
    fn build_stream_native(&self) -> Result<(cpal::Stream, u32)> {
        use cpal::SampleFormat;

        let default_config =
            self.device
                .default_input_config()
                .map_err(|e| PitchError::AudioCapture {
                    message: format!("Failed to query default input config: {}", e),
                })?;

        let native_rate = default_config.sample_rate().0;
        let channels = default_config.channels() as usize;
        let stream_config: cpal::StreamConfig = default_config.clone().into();

        tracing::info!(
            channels,
            sample_rate = native_rate,
            format = ?default_config.sample_format(),
            "using native audio format"
        );

        let err_callback = |err| {
            tracing::warn!("audio stream error: {}", err);
        };
        let buffer = Arc::clone(&self.buffer);
        let counter = Arc::clone(&self.callback_count);

        let stream = match default_config.sample_format() {
            SampleFormat::F32 => self.device.build_input_stream(
                &stream_config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    counter.fetch_add(1, Ordering::Relaxed);
                    if let Ok(mut buf) = buffer.lock() {
                        push_mono(&mut buf, data.iter().copied(), channels);
                    }
                },
                err_callback,
                None,
            ),
            SampleFormat::I16 => self.device.build_input_stream(
                &stream_config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    counter.fetch_add(1, Ordering::Relaxed);
                    if let Ok(mut buf) = buffer.lock() {
                        let samples = data.iter().map(|&s| s as f32 / i16::MAX as f32);
                        push_mono(&mut buf, samples, channels);
                    }
                },
                err_callback,
                None,
            ),
            fmt => {
                return Err(PitchError::AudioCapture {
                    message: format!(
                        "Unsupported native sample format: {:?}. \
                         Try specifying a device with --device.",
                        fmt
                    ),
                });
            }
        }
        .map_err(|e| PitchError::AudioCapture {
            message: format!("Failed to build native stream: {}", e),
        })?;

        Ok((stream, native_rate))
    }
}

/// Appends interleaved samples to `buf`, averaged down to one channel.
fn push_mono(buf: &mut Vec<f32>, samples: impl Iterator<Item = f32>, channels: usize) {
    if channels <= 1 {
        buf.extend(samples);
        return;
    }
    let mut sum = 0.0;
    let mut count = 0;
    for sample in samples {
        sum += sample;
        count += 1;
        if count == channels {
            buf.push(sum / channels as f32);
            sum = 0.0;
            count = 0;
        }
    }
}

impl AudioSource for CpalAudioSource {
    fn start(&mut self) -> Result<()> {
        if self.stream.is_some() {
            return Ok(()); // Already started
        }

        let stream = with_suppressed_stderr(|| self.build_stream());
        let stream = match stream {
            Ok(stream) => {
                stream.play().map_err(|e| PitchError::AudioCapture {
                    message: format!("Failed to start audio stream: {}", e),
                })?;

                // Some PipeWire-ALSA setups accept the config but never call back.
                std::thread::sleep(std::time::Duration::from_millis(200));
                if self.callback_count.load(Ordering::Relaxed) > 0 {
                    Some(stream)
                } else {
                    None
                }
            }
            Err(e) => {
                tracing::debug!("preferred stream config rejected: {}", e);
                None
            }
        };

        let stream = match stream {
            Some(stream) => stream,
            None => {
                if let Ok(mut buf) = self.buffer.lock() {
                    buf.clear();
                }
                let (native, rate) = self.build_stream_native()?;
                native.play().map_err(|e| PitchError::AudioCapture {
                    message: format!("Failed to start native audio stream: {}", e),
                })?;
                self.sample_rate = rate;
                native
            }
        };

        self.stream = Some(SendableStream(stream));
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        if let Some(sendable_stream) = self.stream.take() {
            sendable_stream
                .0
                .pause()
                .map_err(|e| PitchError::AudioCapture {
                    message: format!("Failed to stop audio stream: {}", e),
                })?;
        }
        Ok(())
    }

    fn read_frame(&mut self) -> Result<Option<AudioFrame>> {
        let mut buffer = self.buffer.lock().map_err(|e| PitchError::AudioCapture {
            message: format!("Failed to lock audio buffer: {}", e),
        })?;

        if buffer.len() < self.frame_size {
            return Ok(None);
        }

        let samples: Vec<f32> = buffer.drain(..self.frame_size).collect();
        drop(buffer);

        let frame = AudioFrame::new(samples, self.sample_rate, self.sequence);
        self.sequence += 1;
        Ok(Some(frame))
    }

    fn is_finite(&self) -> bool {
        false
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_filter_device() {
        assert!(should_filter_device("surround51"));
        assert!(should_filter_device("front:CARD=PCH"));
        assert!(should_filter_device("HDMI Output"));
        assert!(should_filter_device("Digital Output S/PDIF"));
        assert!(!should_filter_device("pipewire"));
        assert!(!should_filter_device("Built-in Audio"));
    }

    #[test]
    fn test_push_mono_averages_channels() {
        let mut buf = Vec::new();
        push_mono(&mut buf, [1.0, 0.0, 0.5, -0.5, 0.25].into_iter(), 2);
        // The trailing half frame is discarded.
        assert_eq!(buf, vec![0.5, 0.0]);

        let mut mono = Vec::new();
        push_mono(&mut mono, [0.1, 0.2].into_iter(), 1);
        assert_eq!(mono, vec![0.1, 0.2]);
    }

    #[test]
    #[ignore] // Requires audio hardware
    fn test_list_devices_returns_at_least_one_device() {
        let devices = list_devices().unwrap();
        assert!(!devices.is_empty(), "Expected at least one audio device");
    }

    #[test]
    fn test_create_with_invalid_device_name() {
        let source = CpalAudioSource::new(Some("NonExistentDevice12345"), 44100, 2048);
        match source {
            Err(PitchError::AudioDeviceNotFound { device }) => {
                assert_eq!(device, "NonExistentDevice12345");
            }
            // Hosts without any audio backend fail enumeration instead.
            Err(PitchError::AudioCapture { .. }) => {}
            _ => panic!("Expected AudioDeviceNotFound error"),
        }
    }

    #[test]
    #[ignore] // Requires audio hardware
    fn test_capture_delivers_fixed_size_frames() {
        let mut source = CpalAudioSource::new(None, 44100, 1024).unwrap();
        source.start().unwrap();
        std::thread::sleep(std::time::Duration::from_millis(300));

        if let Some(frame) = source.read_frame().unwrap() {
            assert_eq!(frame.len(), 1024);
            assert_eq!(frame.sample_rate(), source.sample_rate());
        }
        source.stop().unwrap();
    }
}

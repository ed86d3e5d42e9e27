//! Deterministic signal generators shared by the integration tests.

#![allow(dead_code)]

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::f32::consts::TAU;
use std::path::Path;
use voxpitch::pipeline::AudioFrame;

pub const SAMPLE_RATE: u32 = 44100;
pub const FRAME_SIZE: usize = 2048;

/// Seeded generator so every run sees the same noise.
pub fn rng(seed: u64) -> SmallRng {
    SmallRng::seed_from_u64(seed)
}

/// Zero-mean Gaussian sample (Box-Muller).
pub fn gaussian(rng: &mut SmallRng, sigma: f32) -> f32 {
    let u1: f32 = rng.random::<f32>().max(f32::MIN_POSITIVE);
    let u2: f32 = rng.random();
    sigma * (-2.0 * u1.ln()).sqrt() * (TAU * u2).cos()
}

/// Continuous-phase sine: frame `sequence` picks up where the previous one ended.
pub fn sine_frame(frequency: f32, amplitude: f32, sequence: u64) -> Vec<f32> {
    let offset = sequence as usize * FRAME_SIZE;
    (0..FRAME_SIZE)
        .map(|i| {
            let t = (offset + i) as f64 / SAMPLE_RATE as f64;
            amplitude * (std::f64::consts::TAU * frequency as f64 * t).sin() as f32
        })
        .collect()
}

pub fn noise_frame(rng: &mut SmallRng, sigma: f32) -> Vec<f32> {
    (0..FRAME_SIZE).map(|_| gaussian(rng, sigma)).collect()
}

pub fn noisy_sine_frame(
    rng: &mut SmallRng,
    frequency: f32,
    amplitude: f32,
    sigma: f32,
    sequence: u64,
) -> Vec<f32> {
    sine_frame(frequency, amplitude, sequence)
        .into_iter()
        .map(|s| s + gaussian(rng, sigma))
        .collect()
}

pub fn silence_frame() -> Vec<f32> {
    vec![0.0; FRAME_SIZE]
}

pub fn frame(samples: Vec<f32>, sequence: u64) -> AudioFrame {
    AudioFrame::new(samples, SAMPLE_RATE, sequence)
}

/// Gaussian noise level of the scenarios below, about 17 dB under a 0.5 sine.
pub const SCENARIO_SIGMA: f32 = 0.05;

/// 200 frames of noisy A4 followed by 50 frames of silence.
pub fn tone_then_silence(seed: u64) -> Vec<AudioFrame> {
    let mut rng = rng(seed);
    let mut frames = Vec::with_capacity(250);
    for seq in 0..200u64 {
        frames.push(frame(
            noisy_sine_frame(&mut rng, 440.0, 0.5, SCENARIO_SIGMA, seq),
            seq,
        ));
    }
    for seq in 200..250u64 {
        frames.push(frame(silence_frame(), seq));
    }
    frames
}

/// `lead_in` frames of noise alone, then 200 frames of A4 in the same noise.
pub fn noise_then_tone(seed: u64, lead_in: u64) -> Vec<AudioFrame> {
    let mut rng = rng(seed);
    let mut frames = Vec::new();
    for seq in 0..lead_in {
        frames.push(frame(noise_frame(&mut rng, SCENARIO_SIGMA), seq));
    }
    for seq in lead_in..lead_in + 200 {
        frames.push(frame(
            noisy_sine_frame(&mut rng, 440.0, 0.5, SCENARIO_SIGMA, seq),
            seq,
        ));
    }
    frames
}

/// Writes mono 16-bit PCM.
pub fn write_wav(path: &Path, samples: &[f32]) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    for &s in samples {
        writer
            .write_sample((s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
            .unwrap();
    }
    writer.finalize().unwrap();
}

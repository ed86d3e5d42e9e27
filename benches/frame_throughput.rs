use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::f32::consts::TAU;
use std::hint::black_box;
use std::time::{Duration, Instant};
use voxpitch::audio::{EstimatorConfig, FrequencyEstimator, NoiseConfig, NoiseSuppressor};
use voxpitch::pipeline::{AudioFrame, PipelineConfig, PitchPipeline};

const SAMPLE_RATE: u32 = 44100;
const FRAME_SIZES: [usize; 3] = [1024, 2048, 4096];

/// A4 with a little deterministic hiss, continuous across frames.
fn voiced_frame(frame_size: usize, sequence: u64) -> Vec<f32> {
    let offset = sequence as usize * frame_size;
    (0..frame_size)
        .map(|i| {
            let n = offset + i;
            let t = n as f32 / SAMPLE_RATE as f32;
            let hiss = ((n.wrapping_mul(2_654_435_761) % 1000) as f32 / 1000.0 - 0.5) * 0.02;
            0.4 * (TAU * 440.0 * t).sin() + hiss
        })
        .collect()
}

fn pipeline_for(frame_size: usize) -> PitchPipeline {
    let config = PipelineConfig {
        sample_rate: SAMPLE_RATE,
        frame_size,
        ..PipelineConfig::default()
    };
    match PitchPipeline::new(config) {
        Ok(pipeline) => pipeline,
        Err(e) => panic!("Failed to build pipeline: {}", e),
    }
}

fn bench_stages(c: &mut Criterion) {
    let mut group = c.benchmark_group("stages");

    for &frame_size in &FRAME_SIZES {
        let frame = voiced_frame(frame_size, 0);

        group.bench_with_input(
            BenchmarkId::new("noise_suppressor", frame_size),
            &frame,
            |b, frame| {
                let mut suppressor = NoiseSuppressor::new(NoiseConfig::default());
                let mut output = Vec::with_capacity(frame.len());
                // Train a noise estimate so the filter path runs.
                suppressor.process(frame, &mut output);
                suppressor.observe_voicing(false);
                suppressor.process(frame, &mut output);
                b.iter(|| suppressor.process(black_box(frame), &mut output));
            },
        );

        group.bench_with_input(BenchmarkId::new("yin", frame_size), &frame, |b, frame| {
            let mut estimator = FrequencyEstimator::new(EstimatorConfig::default(), SAMPLE_RATE);
            b.iter(|| estimator.estimate(black_box(frame)));
        });
    }

    group.finish();
}

fn bench_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline");

    for &frame_size in &FRAME_SIZES {
        let frames: Vec<AudioFrame> = (0..32)
            .map(|seq| AudioFrame::new(voiced_frame(frame_size, seq), SAMPLE_RATE, seq))
            .collect();

        group.bench_with_input(
            BenchmarkId::new("process_frame", frame_size),
            &frames,
            |b, frames| {
                let mut pipeline = pipeline_for(frame_size);
                let mut next = 0;
                b.iter(|| {
                    let report = pipeline.process_frame(black_box(&frames[next]));
                    next = (next + 1) % frames.len();
                    report
                });
            },
        );
    }

    group.finish();
    print_realtime_budget();
}

/// Compare mean per-frame cost with the frame's own duration.
fn print_realtime_budget() {
    println!("\n=== Real-time budget ===\n");
    println!(
        "{:<10} {:>12} {:>12} {:>8}",
        "Frame", "Budget (ms)", "Cost (ms)", "RTF"
    );
    println!("{:-<10} {:->12} {:->12} {:->8}", "", "", "", "");

    for &frame_size in &FRAME_SIZES {
        let budget = Duration::from_secs_f64(frame_size as f64 / SAMPLE_RATE as f64);
        let mut pipeline = pipeline_for(frame_size);
        let iterations = 200u64;

        let start = Instant::now();
        for seq in 0..iterations {
            let frame = AudioFrame::new(voiced_frame(frame_size, seq), SAMPLE_RATE, seq);
            black_box(pipeline.process_frame(&frame));
        }
        let cost = start.elapsed() / iterations as u32;

        println!(
            "{:<10} {:>12.2} {:>12.3} {:>8.3}",
            frame_size,
            budget.as_secs_f64() * 1000.0,
            cost.as_secs_f64() * 1000.0,
            cost.as_secs_f64() / budget.as_secs_f64()
        );
    }
}

criterion_group!(benches, bench_stages, bench_pipeline);
criterion_main!(benches);

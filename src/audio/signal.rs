//! Small sample-level helpers shared by the pipeline stages.

/// Replaces every NaN or infinite sample with 0.0.
///
/// Returns the number of samples that were replaced.
pub fn sanitize(samples: &mut [f32]) -> usize {
    let mut replaced = 0;
    for sample in samples.iter_mut() {
        if !sample.is_finite() {
            *sample = 0.0;
            replaced += 1;
        }
    }
    replaced
}

/// Calculates the Root Mean Square (RMS) of audio samples.
///
/// # Returns
/// RMS value, where:
/// - 0.0 represents silence (or an empty slice)
/// - ~0.707 represents a full-scale sine wave
/// - 1.0 represents a full-scale square wave
pub fn calculate_rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f64 = samples
        .iter()
        .map(|&sample| {
            let s = sample as f64;
            s * s
        })
        .sum();

    (sum_squares / samples.len() as f64).sqrt() as f32
}

/// Sum of squared samples.
pub fn energy(samples: &[f32]) -> f64 {
    samples.iter().map(|&s| (s as f64) * (s as f64)).sum()
}

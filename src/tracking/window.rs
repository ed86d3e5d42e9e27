//! Bounded window of recently accepted pitches with O(1) statistics.

use std::collections::VecDeque;

/// Fixed-capacity FIFO of accepted frequencies.
///
/// Sum and sum of squares are maintained incrementally in `f64` so the mean
/// and population standard deviation cost nothing per frame.
#[derive(Debug, Clone)]
pub struct RunningPitchWindow {
    capacity: usize,
    values: VecDeque<f32>,
    sum: f64,
    sum_squares: f64,
}

impl RunningPitchWindow {
    /// Creates an empty window. A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            values: VecDeque::with_capacity(capacity),
            sum: 0.0,
            sum_squares: 0.0,
        }
    }

    /// Appends a value, evicting the oldest one when full.
    pub fn push(&mut self, value: f32) {
        if self.values.len() == self.capacity
            && let Some(oldest) = self.values.pop_front()
        {
            let oldest = oldest as f64;
            self.sum -= oldest;
            self.sum_squares -= oldest * oldest;
        }

        let v = value as f64;
        self.values.push_back(value);
        self.sum += v;
        self.sum_squares += v * v;
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.values.len() == self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn mean(&self) -> f32 {
        if self.values.is_empty() {
            return 0.0;
        }
        (self.sum / self.values.len() as f64) as f32
    }

    /// Population standard deviation.
    pub fn std_dev(&self) -> f32 {
        if self.values.is_empty() {
            return 0.0;
        }
        let n = self.values.len() as f64;
        let mean = self.sum / n;
        // Cancellation can leave a tiny negative residue.
        let variance = (self.sum_squares / n - mean * mean).max(0.0);
        variance.sqrt() as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_window() {
        let window = RunningPitchWindow::new(4);
        assert!(window.is_empty());
        assert_eq!(window.mean(), 0.0);
        assert_eq!(window.std_dev(), 0.0);
    }

    #[test]
    fn test_mean_and_std_dev() {
        let mut window = RunningPitchWindow::new(8);
        for v in [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0] {
            window.push(v);
        }
        assert!((window.mean() - 5.0).abs() < 1e-6);
        assert!((window.std_dev() - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_evicts_oldest_when_full() {
        let mut window = RunningPitchWindow::new(3);
        for v in [100.0, 200.0, 300.0, 400.0] {
            window.push(v);
        }
        assert_eq!(window.len(), 3);
        assert!(window.is_full());
        assert!((window.mean() - 300.0).abs() < 1e-4);
    }

    #[test]
    fn test_never_exceeds_capacity() {
        let mut window = RunningPitchWindow::new(15);
        for i in 0..1000 {
            window.push(200.0 + (i % 7) as f32);
            assert!(window.len() <= 15);
        }
    }

    #[test]
    fn test_constant_values_have_zero_deviation() {
        let mut window = RunningPitchWindow::new(15);
        for _ in 0..500 {
            window.push(440.0);
        }
        assert!(window.std_dev() < 1e-3);
    }

    #[test]
    fn test_zero_capacity_is_one() {
        let mut window = RunningPitchWindow::new(0);
        window.push(1.0);
        window.push(2.0);
        assert_eq!(window.capacity(), 1);
        assert_eq!(window.mean(), 2.0);
    }
}

//! Streaming statistics over a sliding window of scalar samples.

use std::collections::VecDeque;

use crate::error::{PropagationError, Result};

/// Mean and variance of the most recent `window_size` values.
///
/// Each push is O(1). Values are accumulated with Welford's update, and once the window is full
/// the evicted value is removed with the matching downdate, which avoids the cancellation of the
/// naive sum-of-squares form.
///
/// ```rust
/// use inertial::statistics::MovingStatistics;
/// let mut stats = MovingStatistics::new(3).unwrap();
/// for x in [1.0, 2.0, 3.0, 4.0] {
///     stats.push(x);
/// }
/// assert_eq!(stats.mean(), 3.0);
/// assert_eq!(stats.variance(), 1.0);
/// ```
#[derive(Clone, Debug)]
pub struct MovingStatistics {
    window: VecDeque<f64>,
    window_size: usize,
    mean: f64,
    m2: f64, // Σ(x-μ)² over the window
}
impl MovingStatistics {
    /// # Errors
    /// [`PropagationError::InvalidParameter`] for an empty window.
    pub fn new(window_size: usize) -> Result<MovingStatistics> {
        if window_size == 0 {
            return Err(PropagationError::InvalidParameter(
                "moving statistics window must hold at least one value".to_string(),
            ));
        }
        Ok(MovingStatistics {
            window: VecDeque::with_capacity(window_size),
            window_size,
            mean: 0.0,
            m2: 0.0,
        })
    }
    pub fn push(&mut self, x: f64) {
        if self.window.len() < self.window_size {
            self.window.push_back(x);
            let n = self.window.len() as f64;
            let delta = x - self.mean;
            self.mean += delta / n;
            self.m2 += delta * (x - self.mean);
            return;
        }
        // full window: replace the oldest value in a single step
        let Some(old) = self.window.pop_front() else {
            return;
        };
        self.window.push_back(x);
        let n = self.window_size as f64;
        let old_mean = self.mean;
        self.mean += (x - old) / n;
        self.m2 += (x - old) * (x - self.mean + old - old_mean);
        // rounding can push a constant window slightly negative
        self.m2 = self.m2.max(0.0);
    }
    /// Mean of the current window, zero when empty
    pub fn mean(&self) -> f64 {
        self.mean
    }
    /// Sample variance (n - 1 normalisation), zero with fewer than two values
    pub fn variance(&self) -> f64 {
        let n = self.window.len();
        if n < 2 { 0.0 } else { self.m2 / (n - 1) as f64 }
    }
    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }
    pub fn len(&self) -> usize {
        self.window.len()
    }
    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }
    pub fn is_full(&self) -> bool {
        self.window.len() == self.window_size
    }
    pub fn window_size(&self) -> usize {
        self.window_size
    }
    pub fn clear(&mut self) {
        self.window.clear();
        self.mean = 0.0;
        self.m2 = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn batch_stats(values: &[f64]) -> (f64, f64) {
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
        (mean, variance)
    }

    #[test]
    fn empty_and_single_value() {
        let mut stats = MovingStatistics::new(4).unwrap();
        assert!(stats.is_empty());
        assert_eq!(stats.mean(), 0.0);
        assert_eq!(stats.variance(), 0.0);
        stats.push(2.5);
        assert_eq!(stats.mean(), 2.5);
        assert_eq!(stats.variance(), 0.0);
        assert_eq!(stats.len(), 1);
    }
    #[test]
    fn zero_window_rejected() {
        assert!(MovingStatistics::new(0).is_err());
    }
    #[test]
    fn matches_batch_computation_while_sliding() {
        let data: Vec<f64> = (0..200)
            .map(|i| (i as f64 * 0.37).sin() * 10.0 + 1000.0)
            .collect();
        let mut stats = MovingStatistics::new(25).unwrap();
        for (i, x) in data.iter().enumerate() {
            stats.push(*x);
            let start = (i + 1).saturating_sub(25);
            let window = &data[start..=i];
            if window.len() >= 2 {
                let (mean, variance) = batch_stats(window);
                assert_approx_eq!(stats.mean(), mean, 1e-9);
                assert_approx_eq!(stats.variance(), variance, 1e-7);
            }
        }
        assert!(stats.is_full());
        assert_eq!(stats.window_size(), 25);
    }
    #[test]
    fn constant_input_has_zero_spread() {
        let mut stats = MovingStatistics::new(5).unwrap();
        for _ in 0..50 {
            stats.push(0.1);
        }
        assert_approx_eq!(stats.mean(), 0.1, 1e-15);
        assert!(stats.variance() >= 0.0);
        assert_approx_eq!(stats.std_dev(), 0.0, 1e-7);
    }
    #[test]
    fn clear_resets() {
        let mut stats = MovingStatistics::new(2).unwrap();
        stats.push(1.0);
        stats.push(3.0);
        assert_eq!(stats.variance(), 2.0);
        stats.clear();
        assert!(stats.is_empty());
        assert_eq!(stats.mean(), 0.0);
    }
}

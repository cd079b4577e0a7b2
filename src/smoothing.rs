//! Bounded sample history
//!
//! Each joint keeps the most recent samples of its translation and rotation.
//! The value the rest of the crate observes is the rolling mean of the window.

use std::collections::VecDeque;

/// Number of samples kept per buffer
pub const SMOOTHING_WINDOW: usize = 5;

/// FIFO of the last [`SMOOTHING_WINDOW`] samples of an `N`-component vector
#[derive(Debug, Clone, PartialEq)]
pub struct SmoothingBuffer<const N: usize> {
    samples: VecDeque<[f32; N]>,
}

impl<const N: usize> SmoothingBuffer<N> {
    /// Create a buffer seeded with its first sample; a buffer is never empty
    pub fn new(seed: [f32; N]) -> Self {
        let mut samples = VecDeque::with_capacity(SMOOTHING_WINDOW + 1);
        samples.push_back(seed);
        Self { samples }
    }

    /// Append a sample, dropping the oldest once the window is full
    pub fn push(&mut self, sample: [f32; N]) {
        self.samples.push_back(sample);
        while self.samples.len() > SMOOTHING_WINDOW {
            self.samples.pop_front();
        }
    }

    /// Component-wise arithmetic mean of the current window
    pub fn mean(&self) -> [f32; N] {
        let mut sum = [0.0f32; N];
        for sample in &self.samples {
            for (acc, v) in sum.iter_mut().zip(sample.iter()) {
                *acc += v;
            }
        }
        let count = self.samples.len() as f32;
        sum.map(|s| s / count)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Always false; kept for API symmetry with `len`
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Samples oldest first
    pub fn samples(&self) -> impl Iterator<Item = &[f32; N]> {
        self.samples.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_buffer_mean_is_seed() {
        let buffer = SmoothingBuffer::new([1.0, 2.0, 3.0]);
        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer.mean(), [1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_mean_of_partial_window() {
        let mut buffer = SmoothingBuffer::new([0.0, 0.0, 0.0, 1.0]);
        buffer.push([2.0, 4.0, 6.0, 1.0]);
        assert_eq!(buffer.mean(), [1.0, 2.0, 3.0, 1.0]);
    }

    #[test]
    fn test_window_drops_oldest() {
        let mut buffer = SmoothingBuffer::new([100.0]);

        // 100 then 1..=5 - only the last five survive
        for i in 1..=5 {
            buffer.push([i as f32]);
        }

        assert_eq!(buffer.len(), SMOOTHING_WINDOW);
        assert!((buffer.mean()[0] - 3.0).abs() < 1e-6);
        assert_eq!(buffer.samples().next(), Some(&[1.0]));
    }

    #[test]
    fn test_mean_independent_of_history_before_window() {
        let mut a = SmoothingBuffer::new([-50.0, 9.0, 7.0]);
        let mut b = SmoothingBuffer::new([0.0, 0.0, 0.0]);
        for _ in 0..3 {
            a.push([1000.0, 1000.0, 1000.0]);
        }

        for i in 0..5 {
            let sample = [i as f32, (i * 2) as f32, 0.5];
            a.push(sample);
            b.push(sample);
        }

        assert_eq!(a.mean(), b.mean());
    }
}

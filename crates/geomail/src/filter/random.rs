//! Injectable source of uniform samples for probabilistic predicates

use rand::Rng;
use rand::rngs::{StdRng, ThreadRng};

/// Yields uniform samples in `[0, 1)`
pub trait RandomSource {
    fn next_sample(&mut self) -> f64;
}

impl RandomSource for ThreadRng {
    fn next_sample(&mut self) -> f64 {
        self.random::<f64>()
    }
}

impl RandomSource for StdRng {
    fn next_sample(&mut self) -> f64 {
        self.random::<f64>()
    }
}

/// Always returns the same sample
#[derive(Debug, Clone, Copy)]
pub struct FixedSample(pub f64);

impl RandomSource for FixedSample {
    fn next_sample(&mut self) -> f64 {
        self.0
    }
}

/// Replays a list of samples, cycling when exhausted
#[derive(Debug, Clone)]
pub struct SampleSequence {
    samples: Vec<f64>,
    next: usize,
    drawn: usize,
}

impl SampleSequence {
    pub fn new(samples: Vec<f64>) -> Self {
        Self {
            samples,
            next: 0,
            drawn: 0,
        }
    }

    /// How many samples were requested so far
    pub fn drawn(&self) -> usize {
        self.drawn
    }
}

impl RandomSource for SampleSequence {
    fn next_sample(&mut self) -> f64 {
        self.drawn += 1;
        if self.samples.is_empty() {
            return 0.0;
        }
        let value = self.samples[self.next % self.samples.len()];
        self.next += 1;
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_seeded_rng_is_reproducible() {
        let mut a = StdRng::seed_from_u64(7);
        let mut b = StdRng::seed_from_u64(7);
        for _ in 0..10 {
            let x = a.next_sample();
            assert_eq!(x, b.next_sample());
            assert!((0.0..1.0).contains(&x));
        }
    }

    #[test]
    fn test_sequence_cycles() {
        let mut seq = SampleSequence::new(vec![0.1, 0.9]);
        assert_eq!(seq.next_sample(), 0.1);
        assert_eq!(seq.next_sample(), 0.9);
        assert_eq!(seq.next_sample(), 0.1);
        assert_eq!(seq.drawn(), 3);
    }
}

use crate::distribution::Distribution;
use rand::RngCore;
use std::collections::VecDeque;

/// A distribution plus a FIFO batch of pre-generated variates.
///
/// The batch is generated right after the shared generator is seeded for this
/// stream, so a whole run's draws come from one seed. Overrunning the batch
/// falls back to drawing single variates from whatever state the generator is in.
#[derive(Clone, Debug)]
pub struct VariateStream {
    distribution: Distribution,
    buffer: VecDeque<f64>,
}

impl VariateStream {
    pub fn new(distribution: Distribution) -> Self {
        Self {
            distribution,
            buffer: VecDeque::new(),
        }
    }

    pub fn distribution(&self) -> &Distribution {
        &self.distribution
    }

    /// Discard unconsumed variates and pre-generate `count` fresh ones
    pub fn refill<R: RngCore + ?Sized>(&mut self, rng: &mut R, count: usize) {
        self.buffer = self.distribution.sample(rng, count).into();
    }

    /// Oldest buffered variate, or one fresh variate if the buffer is empty
    pub fn draw<R: RngCore + ?Sized>(&mut self, rng: &mut R) -> f64 {
        match self.buffer.pop_front() {
            Some(value) => value,
            None => self.distribution.sample(rng, 1)[0],
        }
    }

    /// Number of variates still buffered
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }
}

/// Batch size expected to cover a run: `floor(d + 6·sqrt(d) + 10)` for an
/// expected count `d`, i.e. six standard deviations of a Poisson count plus slack
pub fn batch_size(expected: f64) -> usize {
    if !expected.is_finite() || expected < 0.0 {
        return 0;
    }
    (expected + 6.0 * expected.sqrt() + 10.0).floor() as usize
}

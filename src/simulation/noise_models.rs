//! Gaussian noise source for the `noise` waveform
//! Location: src/simulation/noise_models.rs

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Normal-distributed sample source with its own generator
///
/// Each noise parameter owns one of these, seeded once from the shared random
/// source, so sampling never contends with other devices.
#[derive(Debug, Clone)]
pub struct GaussianNoise {
    mean: f64,
    stddev: f64,
    rng: StdRng,
}

impl GaussianNoise {
    pub fn new(mean: f64, stddev: f64, seed: u64) -> Self {
        Self {
            mean,
            stddev,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    pub fn stddev(&self) -> f64 {
        self.stddev
    }

    /// Draw one sample from N(mean, stddev)
    pub fn sample(&mut self) -> f64 {
        self.mean + self.stddev * self.box_muller_transform()
    }

    fn box_muller_transform(&mut self) -> f64 {
        // u1 in (0, 1] keeps ln() finite
        let u1 = 1.0 - self.rng.gen::<f64>();
        let u2 = self.rng.gen::<f64>();
        (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
    }
}

//! Injectable jitter for sensor readings.
//!
//! The sensor asks a [`NoiseSource`] for one integer per tick and clamps it to
//! its configured amplitude, so any source is safe to plug in. Closures work
//! too: `let mut n = || 1; sensor.sample(.., &mut n)`.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub trait NoiseSource: Send {
    /// Next jitter value; callers clamp it to their own bound
    fn next_jitter(&mut self) -> i64;
}

impl<F> NoiseSource for F
where
    F: FnMut() -> i64 + Send,
{
    fn next_jitter(&mut self) -> i64 {
        self()
    }
}

/// Always zero. Makes a run fully deterministic without a seed.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullNoise;

impl NoiseSource for NullNoise {
    fn next_jitter(&mut self) -> i64 {
        0
    }
}

/// Uniform integer jitter in `[-amplitude, +amplitude]`
#[derive(Debug, Clone)]
pub struct UniformJitter {
    amplitude: i64,
    rng: StdRng,
}

impl UniformJitter {
    /// Seeded for reproducible runs; `None` draws the seed from OS entropy
    pub fn new(amplitude: u32, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Self {
            amplitude: amplitude as i64,
            rng,
        }
    }
}

impl NoiseSource for UniformJitter {
    fn next_jitter(&mut self) -> i64 {
        self.rng.gen_range(-self.amplitude..=self.amplitude)
    }
}

/// Noise source matching a config: null when the amplitude is zero,
/// otherwise uniform jitter with the configured seed.
pub fn from_config(amplitude: u32, seed: Option<u64>) -> Box<dyn NoiseSource> {
    if amplitude == 0 {
        Box::new(NullNoise)
    } else {
        Box::new(UniformJitter::new(amplitude, seed))
    }
}

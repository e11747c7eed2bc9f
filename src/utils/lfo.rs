//! Sine LFO advanced at block rate.

#[allow(unused_imports)]
use num_traits::float::Float;

const TWO_PI: f32 = 2.0 * core::f32::consts::PI;

#[derive(Debug, Default, Clone, Copy)]
pub struct Lfo {
    /// Phase in [0, 2π).
    phase: f32,
}

impl Lfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.phase = 0.0;
    }

    /// Bipolar output in [-1, 1] at the current phase.
    #[inline]
    pub fn value(&self) -> f32 {
        self.phase.sin()
    }

    #[inline]
    pub fn phase(&self) -> f32 {
        self.phase
    }

    /// Advances the phase by `block_size` samples at `rate_hz`.
    #[inline]
    pub fn advance(&mut self, rate_hz: f32, block_size: usize, sample_rate: f32) {
        self.phase += TWO_PI * rate_hz * (block_size as f32) / sample_rate;
        while self.phase >= TWO_PI {
            self.phase -= TWO_PI;
        }
    }
}

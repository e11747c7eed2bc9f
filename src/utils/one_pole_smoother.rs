//! Block-rate one-pole parameter smoother.
//!
//! Advanced once per processing block rather than per sample; sub-block
//! accuracy is not needed for morph/intensity targets, and the block-rate
//! update keeps the control path out of the per-sample loop.

#[allow(unused_imports)]
use num_traits::float::Float;

#[derive(Debug, Default, Clone, Copy)]
pub struct OnePoleSmoother {
    value: f32,
    target: f32,
    /// Time constant in samples.
    tau: f32,
}

impl OnePoleSmoother {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the smoothing time constant and jumps to `value`.
    pub fn init(&mut self, time_s: f32, sample_rate: f32, value: f32) {
        self.tau = (time_s * sample_rate).max(1.0);
        self.reset(value);
    }

    /// Jumps value and target without smoothing.
    pub fn reset(&mut self, value: f32) {
        self.value = value;
        self.target = value;
    }

    pub fn set_target(&mut self, target: f32) {
        self.target = target;
    }

    /// Advances the smoother by `block_size` samples and returns the value.
    #[inline]
    pub fn advance(&mut self, block_size: usize) -> f32 {
        let coefficient = 1.0 - (-(block_size as f32) / self.tau).exp();
        self.value += coefficient * (self.target - self.value);
        self.value
    }

    #[inline]
    pub fn value(&self) -> f32 {
        self.value
    }

    #[inline]
    pub fn target(&self) -> f32 {
        self.target
    }
}

//! Small linear-congruential random source for tests and randomized sweeps.

/// Deterministic LCG, seedable per use site. Not shared state: each instance
/// owns its sequence, so concurrent engine instances never alias.
#[derive(Debug, Clone, Copy)]
pub struct Lcg {
    state: u32,
}

impl Lcg {
    pub fn new(seed: u32) -> Self {
        Self { state: seed }
    }

    #[inline]
    pub fn next_word(&mut self) -> u32 {
        self.state = self.state.wrapping_mul(1664525).wrapping_add(1013904223);
        self.state
    }

    /// Uniform float in [0, 1).
    #[inline]
    pub fn next_float(&mut self) -> f32 {
        self.next_word() as f32 / 4294967296.0
    }
}

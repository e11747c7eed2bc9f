//! Passivity clamp over the whole cascade.
//!
//! Individually stable sections can still compound into audible runaway gain
//! for some morph/intensity combinations. The guard samples the cascade's
//! magnitude response on a coarse grid and, when the worst point exceeds the
//! ceiling, scales every section's numerator by one shared factor. It is a
//! cheap approximation of the true peak gain and runs at block rate only.

#[allow(unused_imports)]
use num_traits::float::Float;

use crate::biquad::SectionCoefficients;
use crate::NUM_SECTIONS;

/// Maximum allowed cascade magnitude on the sampled grid.
pub const GAIN_CEILING: f32 = 1.05;

/// Number of evaluation points spread over (0, π).
const GRID_POINTS: usize = 12;

const M_PI_F: f32 = core::f32::consts::PI;

/// Cascade magnitude at `z = e^{jω}`.
#[inline]
fn magnitude_at(sections: &[SectionCoefficients; NUM_SECTIONS], omega: f32) -> f32 {
    let (s1, c1) = omega.sin_cos();
    let (s2, c2) = (2.0 * omega).sin_cos();

    let mut magnitude = 1.0;
    for c in sections.iter() {
        let num_re = c.b0 + c.b1 * c1 + c.b2 * c2;
        let num_im = -(c.b1 * s1 + c.b2 * s2);
        let den_re = 1.0 + c.a1 * c1 + c.a2 * c2;
        let den_im = -(c.a1 * s1 + c.a2 * s2);
        let den = (den_re * den_re + den_im * den_im).max(1e-12);
        magnitude *= ((num_re * num_re + num_im * num_im) / den).sqrt();
    }
    magnitude
}

/// Worst sampled cascade magnitude over the grid.
#[inline]
pub fn peak_gain(sections: &[SectionCoefficients; NUM_SECTIONS]) -> f32 {
    let mut peak = 0.0f32;
    for k in 1..=GRID_POINTS {
        let omega = M_PI_F * (k as f32) / ((GRID_POINTS + 1) as f32);
        peak = peak.max(magnitude_at(sections, omega));
    }
    peak
}

/// Clamps the cascade gain to [`GAIN_CEILING`].
///
/// Each section's numerator is scaled by the sixth root of the required total
/// correction, so the product over the cascade lands back on the ceiling.
/// Returns the post-correction peak gain on the grid.
#[inline]
pub fn apply(sections: &mut [SectionCoefficients; NUM_SECTIONS]) -> f32 {
    let peak = peak_gain(sections);
    if peak <= GAIN_CEILING || !peak.is_finite() {
        return peak;
    }

    let per_section = (GAIN_CEILING / peak).powf(1.0 / NUM_SECTIONS as f32);
    for c in sections.iter_mut() {
        c.b0 *= per_section;
        c.b1 *= per_section;
        c.b2 *= per_section;
    }
    GAIN_CEILING
}

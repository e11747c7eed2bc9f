//! Pole-pair shapes and morph interpolation at the reference rate.
//!
//! A shape is six complex-conjugate pole pairs in polar form, captured at
//! 48 kHz. Morphing produces one interpolated pole set from two shapes:
//! radii are interpolated in the log domain (resonance bandwidth is roughly
//! exponential in `1 - r`), angles along the shortest arc around the unit
//! circle. Intensity pulls every radius toward a de-resonated neutral value.

#[allow(unused_imports)]
use num_traits::float::Float;

use crate::utils::{crossfade, smoothstep};
use crate::NUM_SECTIONS;

/// Lower bound of the radius safety band.
pub const MIN_RADIUS: f32 = 0.10;

/// Upper bound of the radius safety band. Strictly below 1 for stability.
pub const MAX_RADIUS: f32 = 0.995;

/// Radius scale for the fully de-resonated pole at intensity 0.
const NEUTRAL_RADIUS_SCALE: f32 = 0.85;

const M_PI_F: f32 = core::f32::consts::PI;

/// Complex-conjugate pole pair `r * e^{±jθ}` in polar form.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct PolePair {
    /// Pole radius, in (0, 1) for a stable section.
    pub radius: f32,
    /// Pole angle in radians.
    pub angle: f32,
}

impl PolePair {
    pub const fn new(radius: f32, angle: f32) -> Self {
        Self { radius, angle }
    }

    /// Returns the pair with its radius clamped into the safety band and
    /// its angle wrapped into `(-π, π]`.
    #[inline]
    pub fn clamped(self) -> Self {
        Self {
            radius: self.radius.clamp(MIN_RADIUS, MAX_RADIUS),
            angle: wrap_angle(self.angle),
        }
    }
}

/// Fixed-size pole set defining one filter character at the reference rate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Shape {
    pub poles: [PolePair; NUM_SECTIONS],
}

/// Indices into the shape table forming the endpoints of one morph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MorphPair {
    pub a: usize,
    pub b: usize,
}

impl MorphPair {
    pub const fn new(a: usize, b: usize) -> Self {
        Self { a, b }
    }
}

#[inline]
fn wrap_once(x: f32) -> f32 {
    x - (x * (0.5 / M_PI_F)).round() * (2.0 * M_PI_F)
}

/// Wraps an angle difference into `(-π, π]`.
///
/// One closed-form pass leaves a residue bounded by π plus the rounding
/// error of `n * 2π`, which is about `x * 2^-24`, so each pass shrinks the
/// magnitude by that factor. Seven passes reduce any finite f32; the cap
/// keeps the reduction bounded even on non-finite input.
#[inline]
pub fn wrap_angle(mut x: f32) -> f32 {
    let mut pass = 0;
    while (x > M_PI_F || x <= -M_PI_F) && pass < 8 {
        x = wrap_once(x);
        pass += 1;
    }
    if x <= -M_PI_F {
        x + 2.0 * M_PI_F
    } else {
        x
    }
}

/// Blends a radius toward its neutral value according to intensity.
///
/// Intensity 1 reproduces the authentic resonance, intensity 0 the softest.
#[inline]
pub fn apply_intensity(radius: f32, intensity: f32) -> f32 {
    crossfade(radius * NEUTRAL_RADIUS_SCALE, radius, intensity).clamp(MIN_RADIUS, MAX_RADIUS)
}

/// Interpolates between two shapes at the reference rate.
///
/// `morph` and `intensity` outside [0, 1] are clamped. Identical endpoint
/// shapes are valid and yield a static pole set. The morph position runs
/// through a smoothstep ease so the perceptual sweep feels uniform.
#[inline]
pub fn interpolate(
    a: &Shape,
    b: &Shape,
    morph: f32,
    intensity: f32,
) -> [PolePair; NUM_SECTIONS] {
    let t = smoothstep(morph.clamp(0.0, 1.0));
    let intensity = intensity.clamp(0.0, 1.0);

    core::array::from_fn(|i| {
        let pa = a.poles[i].clamped();
        let pb = b.poles[i].clamped();

        let log_r = crossfade(pa.radius.ln(), pb.radius.ln(), t);
        let radius = apply_intensity(log_r.exp(), intensity);
        let angle = pa.angle + wrap_angle(pb.angle - pa.angle) * t;

        PolePair { radius, angle }
    })
}

//! Second-order sections: pole-to-coefficient conversion and the TDF-II
//! cascade that forms the per-sample audio path.

#[allow(unused_imports)]
use num_traits::float::Float;

use crate::morph::{PolePair, MAX_RADIUS, MIN_RADIUS};
use crate::utils::{crossfade, soft_limit};
use crate::NUM_SECTIONS;

/// Last-resort denominator bounds, independent of the upstream radius clamp.
const A1_LIMIT: f32 = 1.999;
const A2_LIMIT: f32 = 0.999;

/// State below this magnitude is flushed to zero to keep denormals out of the
/// feedback path.
const DENORMAL_EPSILON: f32 = 1e-20;

/// Angle (as a fraction of π) above which the high-frequency taper engages.
const TAPER_KNEE: f32 = 0.55;

/// Numerator attenuation at Nyquist once the taper is fully engaged.
const TAPER_FLOOR: f32 = 0.40;

const M_PI_F: f32 = core::f32::consts::PI;

/// Normalized biquad coefficients (`a0` = 1).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SectionCoefficients {
    pub b0: f32,
    pub b1: f32,
    pub b2: f32,
    pub a1: f32,
    pub a2: f32,
}

impl Default for SectionCoefficients {
    fn default() -> Self {
        Self::NEUTRAL
    }
}

impl SectionCoefficients {
    /// Pass-through section.
    pub const NEUTRAL: Self = Self {
        b0: 1.0,
        b1: 0.0,
        b2: 0.0,
        a1: 0.0,
        a2: 0.0,
    };

    /// Builds band-pass-style coefficients from a pole pair.
    ///
    /// Zeros sit at DC and Nyquist (`b0 = (1 - a2) / 2`, `b1 = 0`,
    /// `b2 = -b0`) so the section peaks around its resonant frequency and
    /// attenuates at the spectrum edges. Poles approaching Nyquist get their
    /// numerator tapered to counter high-frequency gain buildup. Non-finite
    /// input degrades to [`Self::NEUTRAL`].
    #[inline]
    pub fn from_pole(pole: PolePair) -> Self {
        if !pole.radius.is_finite() || !pole.angle.is_finite() {
            return Self::NEUTRAL;
        }

        let r = pole.radius.clamp(MIN_RADIUS, MAX_RADIUS);
        let a1 = (-2.0 * r * pole.angle.cos()).clamp(-A1_LIMIT, A1_LIMIT);
        let a2 = (r * r).clamp(-A2_LIMIT, A2_LIMIT);

        let mut b0 = (1.0 - a2) * 0.5;
        let position = pole.angle.abs() / M_PI_F;
        if position > TAPER_KNEE {
            let excess = ((position - TAPER_KNEE) / (1.0 - TAPER_KNEE)).min(1.0);
            b0 *= 1.0 - (1.0 - TAPER_FLOOR) * excess;
        }

        let out = Self {
            b0,
            b1: 0.0,
            b2: -b0,
            a1,
            a2,
        };
        if out.is_finite() {
            out
        } else {
            Self::NEUTRAL
        }
    }

    /// Recovers the pole pair encoded by the denominator, if any.
    ///
    /// Returns `None` when `a1`/`a2` do not describe a complex-conjugate
    /// pair (real poles, or a non-finite denominator).
    #[inline]
    pub fn pole(&self) -> Option<PolePair> {
        if !self.is_finite() || self.a2 <= 0.0 {
            return None;
        }
        let r = self.a2.sqrt();
        let c = (-self.a1 / (2.0 * r)).clamp(-1.0, 1.0);
        // Real-pole pairs have |a1| > 2r before clamping; reject them.
        if (self.a1.abs() - 2.0 * r) > 1e-6 {
            return None;
        }
        Some(PolePair::new(r, c.acos()))
    }

    #[inline]
    pub fn is_finite(&self) -> bool {
        self.b0.is_finite()
            && self.b1.is_finite()
            && self.b2.is_finite()
            && self.a1.is_finite()
            && self.a2.is_finite()
    }
}

/// One second-order section in transposed direct form II.
#[derive(Debug, Default, Clone, Copy)]
pub struct FilterSection {
    pub coefficients: SectionCoefficients,
    z1: f32,
    z2: f32,
}

impl FilterSection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.z1 = 0.0;
        self.z2 = 0.0;
    }

    #[inline]
    pub fn process(&mut self, x: f32) -> f32 {
        let c = &self.coefficients;
        let y = c.b0 * x + self.z1;
        self.z1 = c.b1 * x - c.a1 * y + self.z2;
        self.z2 = c.b2 * x - c.a2 * y;
        if self.z1.abs() < DENORMAL_EPSILON {
            self.z1 = 0.0;
        }
        if self.z2.abs() < DENORMAL_EPSILON {
            self.z2 = 0.0;
        }
        y
    }
}

/// Fixed cascade of six sections with optional per-section saturation.
#[derive(Debug, Default, Clone)]
pub struct SectionChain {
    sections: [FilterSection; NUM_SECTIONS],
}

impl SectionChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears all section state. Coefficients are left untouched.
    pub fn reset(&mut self) {
        for section in self.sections.iter_mut() {
            section.reset();
        }
    }

    pub fn set_coefficients(&mut self, coefficients: &[SectionCoefficients; NUM_SECTIONS]) {
        for (section, c) in self.sections.iter_mut().zip(coefficients.iter()) {
            section.coefficients = *c;
        }
    }

    pub fn coefficients(&self) -> [SectionCoefficients; NUM_SECTIONS] {
        core::array::from_fn(|i| self.sections[i].coefficients)
    }

    /// Runs one sample through sections 0 to 5 in order.
    ///
    /// `saturation` in [0, 1] soft-clips each section output after the linear
    /// update, modelling the hardware's per-stage nonlinearity.
    #[inline]
    pub fn process(&mut self, x: f32, saturation: f32) -> f32 {
        let mut y = x;
        if saturation > 0.0 {
            let drive = 1.0 + 3.0 * saturation;
            let inv_drive = 1.0 / drive;
            for section in self.sections.iter_mut() {
                let linear = section.process(y);
                y = crossfade(linear, soft_limit(linear * drive) * inv_drive, saturation);
            }
        } else {
            for section in self.sections.iter_mut() {
                y = section.process(y);
            }
        }
        y
    }
}

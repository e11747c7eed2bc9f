//! Bilinear remapping of reference-rate poles to the running sample rate.
//!
//! A pole captured at 48 kHz sits at a fixed z-plane position; played back at
//! another rate it would drift in perceived frequency. The remap sends the
//! pole through the bilinear transform into the s-plane using the reference
//! rate as the bilinear constant, then back into the z-plane of the running
//! rate. At 48 kHz the round trip is the identity.

#[allow(unused_imports)]
use num_traits::float::Float;

use crate::morph::PolePair;
use crate::REFERENCE_SAMPLE_RATE;

/// Maps a 48 kHz reference-rate pole to the running sample rate.
#[inline]
pub fn remap_pole(pole: PolePair, sample_rate: f32) -> PolePair {
    remap_pole_from(pole, REFERENCE_SAMPLE_RATE, sample_rate)
}

/// Maps a pole captured at `source_rate` to the running sample rate.
///
/// The result's radius is re-clamped into the safety band; rounding near
/// Nyquist can push `|z|` marginally outside (0, 1).
#[inline]
pub fn remap_pole_from(pole: PolePair, source_rate: f32, sample_rate: f32) -> PolePair {
    if (sample_rate - source_rate).abs() < 1e-3 {
        return pole.clamped();
    }

    let pole = pole.clamped();
    let (sin, cos) = pole.angle.sin_cos();
    let zr = pole.radius * cos;
    let zi = pole.radius * sin;

    // s = k0 * (z - 1) / (z + 1), k0 = 2 * source rate.
    let k0 = 2.0 * source_rate;
    let dr = zr + 1.0;
    let di = zi;
    let d = dr * dr + di * di;
    if d < 1e-12 {
        // Pole at z = -1 maps to infinite s; pin it to Nyquist instead.
        return PolePair::new(pole.radius, core::f32::consts::PI * 0.995).clamped();
    }
    let nr = zr - 1.0;
    let ni = zi;
    let sr = k0 * (nr * dr + ni * di) / d;
    let si = k0 * (ni * dr - nr * di) / d;

    // z' = (k1 + s) / (k1 - s), k1 = 2 * running rate.
    let k1 = 2.0 * sample_rate;
    let dr = k1 - sr;
    let di = -si;
    let d = dr * dr + di * di;
    if d < 1e-12 {
        return PolePair::new(pole.radius, core::f32::consts::PI * 0.995).clamped();
    }
    let nr = k1 + sr;
    let ni = si;
    let zr = (nr * dr + ni * di) / d;
    let zi = (ni * dr - nr * di) / d;

    PolePair::new((zr * zr + zi * zi).sqrt(), zi.atan2(zr)).clamped()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::morph::{MAX_RADIUS, MIN_RADIUS};
    use crate::resources::SHAPE_TABLE;

    #[test]
    fn identity_at_reference_rate() {
        for shape in SHAPE_TABLE {
            for pole in shape.poles {
                let mapped = remap_pole(pole, 48000.0);
                assert!((mapped.radius - pole.clamped().radius).abs() < 1e-6);
                assert!((mapped.angle - pole.angle).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn radius_stays_in_band_at_all_rates() {
        for rate in [44100.0, 48000.0, 96000.0, 192000.0] {
            for shape in SHAPE_TABLE {
                for pole in shape.poles {
                    let mapped = remap_pole(pole, rate);
                    assert!(
                        mapped.radius >= MIN_RADIUS && mapped.radius <= MAX_RADIUS,
                        "radius {} out of band at {} Hz",
                        mapped.radius,
                        rate
                    );
                }
            }
        }
    }

    #[test]
    fn analog_frequency_is_preserved() {
        // The bilinear transform preserves the prewarped analog frequency.
        // tan(θ'/2) * fs' must equal tan(θ/2) * fs0 for a pole on the unit
        // circle; for interior poles the relation holds approximately, so
        // check that the perceived frequency ratio stays close to 1.
        let pole = PolePair::new(0.98, 0.3);
        for rate in [44100.0f32, 96000.0, 192000.0] {
            let mapped = remap_pole(pole, rate);
            let f_ref = (pole.angle * 0.5).tan() * REFERENCE_SAMPLE_RATE;
            let f_run = (mapped.angle * 0.5).tan() * rate;
            let ratio = f_run / f_ref;
            assert!(
                (ratio - 1.0).abs() < 0.05,
                "frequency drifted by {ratio} at {rate} Hz"
            );
        }
    }

    #[test]
    fn higher_rate_shrinks_the_angle() {
        let pole = PolePair::new(0.95, 0.5);
        let mapped = remap_pole(pole, 96000.0);
        assert!(mapped.angle < pole.angle);
        let mapped = remap_pole(pole, 44100.0);
        assert!(mapped.angle > pole.angle);
    }

    #[test]
    fn nyquist_pole_does_not_blow_up() {
        let pole = PolePair::new(0.99, core::f32::consts::PI);
        for rate in [44100.0, 96000.0] {
            let mapped = remap_pole(pole, rate);
            assert!(mapped.radius.is_finite() && mapped.angle.is_finite());
            assert!(mapped.radius <= MAX_RADIUS);
        }
    }
}

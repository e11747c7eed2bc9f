//! Compiled-in shape bank.

pub mod shapes;

use crate::morph::{MorphPair, Shape};

/// All built-in shapes, addressed by index.
pub const SHAPE_TABLE: [&Shape; 8] = [
    &shapes::VOWEL_AE,
    &shapes::VOWEL_OO,
    &shapes::LOWPASS_WARM,
    &shapes::LOWPASS_PEAK,
    &shapes::BELL_METALLIC,
    &shapes::STRING_BODY,
    &shapes::PHASER_SWEEP,
    &shapes::FLANGE_COMB,
];

/// Selectable morph endpoint pairs, addressed by pair id.
pub const MORPH_PAIR_TABLE: [MorphPair; 6] = [
    MorphPair::new(0, 1), // vowel Ae -> Oo
    MorphPair::new(2, 3), // warm low-pass -> resonant peak
    MorphPair::new(4, 5), // metallic bell -> string body
    MorphPair::new(6, 7), // phaser -> flanger comb
    MorphPair::new(1, 4), // vowel Oo -> metallic bell
    MorphPair::new(3, 6), // resonant peak -> phaser
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::morph::{MAX_RADIUS, MIN_RADIUS};

    #[test]
    fn every_shape_is_in_the_stability_band() {
        for shape in SHAPE_TABLE {
            for pole in shape.poles {
                assert!(pole.radius > MIN_RADIUS && pole.radius < MAX_RADIUS);
                assert!(pole.angle > 0.0 && pole.angle < core::f32::consts::PI);
            }
        }
    }

    #[test]
    fn pair_table_indices_are_valid() {
        for pair in MORPH_PAIR_TABLE {
            assert!(pair.a < SHAPE_TABLE.len());
            assert!(pair.b < SHAPE_TABLE.len());
        }
    }
}

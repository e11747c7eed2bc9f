//! Built-in filter shapes.
//!
//! Pole pairs captured at the 48 kHz reference rate. Angles encode the
//! resonant frequency (`2π · f / 48000`), radii the bandwidth.

use crate::morph::{PolePair, Shape};

pub const VOWEL_AE: Shape = Shape {
    poles: [
        PolePair::new(0.985, 0.08639380), // 660 Hz
        PolePair::new(0.978, 0.22514747), // 1720 Hz
        PolePair::new(0.965, 0.31546826), // 2410 Hz
        PolePair::new(0.945, 0.45814893), // 3500 Hz
        PolePair::new(0.925, 0.58904862), // 4500 Hz
        PolePair::new(0.905, 0.71994832), // 5500 Hz
    ],
};

pub const VOWEL_OO: Shape = Shape {
    poles: [
        PolePair::new(0.988, 0.03926991), // 300 Hz
        PolePair::new(0.980, 0.11388273), // 870 Hz
        PolePair::new(0.962, 0.29321531), // 2240 Hz
        PolePair::new(0.943, 0.41887902), // 3200 Hz
        PolePair::new(0.922, 0.54977871), // 4200 Hz
        PolePair::new(0.902, 0.68067841), // 5200 Hz
    ],
};

pub const LOWPASS_WARM: Shape = Shape {
    poles: [
        PolePair::new(0.952, 0.03141593), // 240 Hz
        PolePair::new(0.946, 0.06283185), // 480 Hz
        PolePair::new(0.938, 0.12828170), // 980 Hz
        PolePair::new(0.922, 0.25525440), // 1950 Hz
        PolePair::new(0.902, 0.51050881), // 3900 Hz
        PolePair::new(0.872, 1.02101761), // 7800 Hz
    ],
};

pub const LOWPASS_PEAK: Shape = Shape {
    poles: [
        PolePair::new(0.990, 0.05497787), // 420 Hz
        PolePair::new(0.972, 0.10995574), // 840 Hz
        PolePair::new(0.954, 0.21991149), // 1680 Hz
        PolePair::new(0.936, 0.43982297), // 3360 Hz
        PolePair::new(0.912, 0.87964594), // 6720 Hz
        PolePair::new(0.886, 1.37444679), // 10500 Hz
    ],
};

pub const BELL_METALLIC: Shape = Shape {
    poles: [
        PolePair::new(0.992, 0.06806784), // 520 Hz
        PolePair::new(0.988, 0.17147860), // 1310 Hz
        PolePair::new(0.982, 0.35735616), // 2730 Hz
        PolePair::new(0.974, 0.54454273), // 4160 Hz
        PolePair::new(0.962, 0.85608400), // 6540 Hz
        PolePair::new(0.946, 1.28936198), // 9850 Hz
    ],
};

pub const STRING_BODY: Shape = Shape {
    poles: [
        PolePair::new(0.975, 0.03665191), // 280 Hz
        PolePair::new(0.968, 0.06021386), // 460 Hz
        PolePair::new(0.958, 0.12893620), // 985 Hz
        PolePair::new(0.944, 0.23823744), // 1820 Hz
        PolePair::new(0.928, 0.34688419), // 2650 Hz
        PolePair::new(0.908, 0.51312680), // 3920 Hz
    ],
};

pub const PHASER_SWEEP: Shape = Shape {
    poles: [
        PolePair::new(0.935, 0.04581489), // 350 Hz
        PolePair::new(0.930, 0.10210176), // 780 Hz
        PolePair::new(0.923, 0.22907446), // 1750 Hz
        PolePair::new(0.913, 0.51050881), // 3900 Hz
        PolePair::new(0.900, 0.90320789), // 6900 Hz
        PolePair::new(0.882, 1.33517688), // 10200 Hz
    ],
};

pub const FLANGE_COMB: Shape = Shape {
    poles: [
        PolePair::new(0.962, 0.05366887), // 410 Hz
        PolePair::new(0.958, 0.10733775), // 820 Hz
        PolePair::new(0.951, 0.21467550), // 1640 Hz
        PolePair::new(0.941, 0.42935100), // 3280 Hz
        PolePair::new(0.926, 0.85870199), // 6560 Hz
        PolePair::new(0.906, 1.28805299), // 9840 Hz
    ],
};

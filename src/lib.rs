#![doc = include_str!("../README.md")]
#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod biquad;
pub mod engine;
pub mod guard;
pub mod morph;
pub mod pack;
pub mod params;
pub mod remap;
pub mod resources;
pub mod utils;

/// Sample rate at which the built-in shape tables were captured, in Hz.
pub const REFERENCE_SAMPLE_RATE: f32 = 48000.0;

/// Number of second-order sections in the cascade.
pub const NUM_SECTIONS: usize = 6;

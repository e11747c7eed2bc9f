//! Morphing filter engine: block scheduler, channel replication and the
//! per-sample cascade.
//!
//! One engine instance is owned by the audio thread. All control-thread
//! traffic goes through [`crate::params::SharedParameters`]; a snapshot is
//! consumed at the start of each block and coefficients stay fixed for its
//! duration. The per-block and per-sample paths never allocate; the only
//! allocations happen in [`ZPlaneEngine::prepare`] and on a channel-count
//! change detected at block start.

use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec;

#[allow(unused_imports)]
use num_traits::float::Float;

use crate::biquad::{SectionChain, SectionCoefficients};
use crate::guard;
use crate::morph::{self, PolePair, Shape, MIN_RADIUS};
use crate::pack::{ModelPack, PackError};
use crate::params::{ParameterSnapshot, VisualizationTap};
use crate::remap::remap_pole_from;
use crate::resources::{MORPH_PAIR_TABLE, SHAPE_TABLE};
use crate::utils::{crossfade, db_to_gain};
use crate::utils::lfo::Lfo;
use crate::utils::one_pole_smoother::OnePoleSmoother;
use crate::{NUM_SECTIONS, REFERENCE_SAMPLE_RATE};

/// Smoothing time constant for the morph and intensity targets, in seconds.
const SMOOTHING_TIME_S: f32 = 0.02;

/// Coefficients are not recomputed while both smoothed controls moved less
/// than this since the previous block.
const CONTROL_EPSILON: f32 = 1e-5;

/// Below these values intensity, drive and saturation count as neutral and
/// the engine early-exits to a pass-through.
const NEUTRAL_EPSILON: f32 = 1e-3;

/// Per-channel stereo decorrelation offsets, applied with opposite sign on
/// left and right so a mono sum stays unbiased. Odd sections only.
const DECORRELATION_ANGLE: f32 = 1.0 / 720.0;
const DECORRELATION_RADIUS: f32 = 0.002;

/// Bounds for the optional auto-makeup gain.
const MAKEUP_MIN: f32 = 0.25;
const MAKEUP_MAX: f32 = 4.0;

#[derive(Debug, Clone)]
struct ChannelState {
    chain: SectionChain,
    /// Post-guard peak gain on the evaluation grid, for auto-makeup.
    response_peak: f32,
}

impl Default for ChannelState {
    fn default() -> Self {
        Self {
            chain: SectionChain::new(),
            response_peak: 1.0,
        }
    }
}

/// Active source of morph endpoints, resolved once per coefficient update.
#[derive(Debug, Default)]
enum MorphSource {
    /// Built-in shape bank, indexed by the pair parameter.
    #[default]
    Bank,
    /// Loaded endpoint shapes, overriding the bank.
    ShapePair { a: Shape, b: Shape },
    /// Loaded coefficient-frame model.
    Model(ModelPack),
}

/// The morphing filter engine.
#[derive(Debug, Default)]
pub struct ZPlaneEngine {
    sample_rate: f32,
    max_block_size: usize,
    channels: Box<[ChannelState]>,

    morph_smoother: OnePoleSmoother,
    intensity_smoother: OnePoleSmoother,
    lfo: Lfo,

    /// Where interpolated poles come from: bank, loaded shapes or a model.
    source: MorphSource,

    /// Lock-free tap for control-thread visualization queries; shared via
    /// [`Self::visualization`].
    tap: Arc<VisualizationTap>,

    /// Reference-rate poles of the last coefficient update, for read-only
    /// visualization queries.
    current_poles: [PolePair; NUM_SECTIONS],

    /// True while the cascade is engaged; cleared when the transparency
    /// bypass takes over so its entry runs exactly once.
    active: bool,

    last_morph: f32,
    last_intensity: f32,
    last_pair: usize,
    /// False until the first coefficient update after prepare/reset; the
    /// change-epsilon skip must never suppress that first update.
    primed: bool,

    previous_drive: f32,
    previous_makeup: f32,
}

impl ZPlaneEngine {
    pub fn new() -> Self {
        Self {
            sample_rate: REFERENCE_SAMPLE_RATE,
            previous_drive: 1.0,
            previous_makeup: 1.0,
            ..Default::default()
        }
    }

    /// Allocates per-channel state for the given configuration. Must be
    /// called before the first [`Self::process`].
    pub fn prepare(&mut self, sample_rate: f32, max_block_size: usize, num_channels: usize) {
        self.sample_rate = if sample_rate > 0.0 {
            sample_rate
        } else {
            REFERENCE_SAMPLE_RATE
        };
        self.max_block_size = max_block_size;
        self.channels = vec![ChannelState::default(); num_channels].into_boxed_slice();
        self.morph_smoother
            .init(SMOOTHING_TIME_S, self.sample_rate, 0.0);
        self.intensity_smoother
            .init(SMOOTHING_TIME_S, self.sample_rate, 0.0);
        self.reset();
    }

    /// Clears all section and control state without reallocating.
    /// Idempotent: a second reset, or a reset followed by a prepare with
    /// unchanged configuration, leaves the engine in the same state.
    pub fn reset(&mut self) {
        for channel in self.channels.iter_mut() {
            channel.chain.reset();
            channel.response_peak = 1.0;
        }
        self.morph_smoother.reset(0.0);
        self.intensity_smoother.reset(0.0);
        self.lfo.reset();
        self.previous_drive = 1.0;
        self.previous_makeup = 1.0;
        self.primed = false;
        self.active = false;
    }

    /// Installs a loaded model pack, replacing the built-in bank.
    ///
    /// The pack must match the engine cascade's section count; on mismatch
    /// the previous source stays active. Call from the thread driving
    /// [`Self::process`], at a block boundary.
    pub fn install_pack(&mut self, pack: ModelPack) -> Result<(), PackError> {
        if pack.num_sections() != NUM_SECTIONS {
            return Err(PackError::SectionCountMismatch {
                expected: NUM_SECTIONS,
                found: pack.num_sections(),
            });
        }
        self.source = MorphSource::Model(pack);
        self.primed = false;
        Ok(())
    }

    /// Installs two loaded shapes as the morph endpoints, overriding the
    /// built-in bank. The pair parameter is ignored while installed. Call
    /// from the thread driving [`Self::process`], at a block boundary.
    pub fn install_shape_pair(&mut self, a: Shape, b: Shape) {
        self.source = MorphSource::ShapePair { a, b };
        self.primed = false;
    }

    /// Reverts to the built-in shape bank, discarding any installed pack
    /// model or shape pair.
    pub fn clear_pack(&mut self) {
        self.source = MorphSource::Bank;
        self.primed = false;
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    /// Shared lock-free visualization tap. Clone the handle before moving
    /// the engine to the audio thread; the control thread then reads poles
    /// and coefficients from it while blocks are in flight, through the same
    /// word-atomic scheme as [`crate::params::SharedParameters`].
    pub fn visualization(&self) -> Arc<VisualizationTap> {
        Arc::clone(&self.tap)
    }

    /// Reference-rate poles of the most recent coefficient update.
    /// Read-only; safe for visualization collaborators.
    pub fn poles(&self) -> [PolePair; NUM_SECTIONS] {
        self.current_poles
    }

    /// Running-rate coefficients of one channel's cascade.
    pub fn coefficients(&self, channel: usize) -> Option<[SectionCoefficients; NUM_SECTIONS]> {
        self.channels.get(channel).map(|c| c.chain.coefficients())
    }

    /// Filters `in_out` in place, one slice per channel, all of equal length.
    ///
    /// Invalid input (no channels, empty block) is a no-op. The coefficient
    /// pipeline runs at most once per block, before any sample is processed.
    pub fn process(&mut self, parameters: &ParameterSnapshot, in_out: &mut [&mut [f32]]) {
        if in_out.is_empty() {
            return;
        }
        let block_size = in_out[0].len();
        if block_size == 0 {
            return;
        }
        debug_assert!(self.max_block_size == 0 || block_size <= self.max_block_size);

        // Channel-count changes are detected at block start. This is the one
        // allocation outside prepare().
        if in_out.len() != self.channels.len() {
            self.channels = vec![ChannelState::default(); in_out.len()].into_boxed_slice();
            self.primed = false;
        }

        // Control-rate update: LFO contribution to morph, then block-rate
        // smoothing of both targets.
        self.lfo
            .advance(parameters.lfo_rate, block_size, self.sample_rate);
        let lfo_value = self.lfo.value();
        let morph_target =
            (parameters.morph + lfo_value * parameters.lfo_depth * 0.5).clamp(0.0, 1.0);
        self.morph_smoother.set_target(morph_target);
        self.intensity_smoother
            .set_target(parameters.intensity.clamp(0.0, 1.0));

        let morph = self.morph_smoother.advance(block_size);
        let intensity = self.intensity_smoother.advance(block_size);

        // Transparent settings bypass the whole cascade. The first bypassed
        // block fades the remaining wet tail into the dry signal and flushes
        // the sections, so neither engaging (truncated tail) nor disengaging
        // (stale section state) clicks. Later bypassed blocks are untouched.
        if intensity < NEUTRAL_EPSILON
            && parameters.drive_db.abs() < NEUTRAL_EPSILON
            && parameters.saturation < NEUTRAL_EPSILON
        {
            if self.active {
                let drive_gain = self.previous_drive;
                let makeup_gain = self.previous_makeup;
                let step = 1.0 / block_size as f32;
                for (channel, buffer) in self.channels.iter_mut().zip(in_out.iter_mut()) {
                    let mut dry_mix = 0.0;
                    for sample in buffer.iter_mut() {
                        dry_mix += step;
                        let wet = channel.chain.process(*sample * drive_gain, 0.0) * makeup_gain;
                        *sample = crossfade(wet, *sample, dry_mix);
                    }
                    channel.chain.reset();
                    channel.response_peak = 1.0;
                }
                self.active = false;
            }
            self.previous_drive = 1.0;
            self.previous_makeup = 1.0;
            return;
        }
        self.active = true;

        let pair = parameters.morph_pair;
        if !self.primed
            || pair != self.last_pair
            || (morph - self.last_morph).abs() > CONTROL_EPSILON
            || (intensity - self.last_intensity).abs() > CONTROL_EPSILON
        {
            self.update_coefficients(morph, intensity, pair);
            self.last_morph = morph;
            self.last_intensity = intensity;
            self.last_pair = pair;
            self.primed = true;
        }

        let drive = db_to_gain(parameters.drive_db);
        let makeup = if parameters.auto_makeup {
            (1.0 / self.channels[0].response_peak.max(1e-3)).clamp(MAKEUP_MIN, MAKEUP_MAX)
        } else {
            1.0
        };

        // Sample-accurate ramp of both gains across the block.
        let scale = 1.0 / block_size as f32;
        let drive_increment = (drive - self.previous_drive) * scale;
        let makeup_increment = (makeup - self.previous_makeup) * scale;
        let saturation = parameters.saturation.clamp(0.0, 1.0);

        for (channel, buffer) in self.channels.iter_mut().zip(in_out.iter_mut()) {
            let mut drive_gain = self.previous_drive;
            let mut makeup_gain = self.previous_makeup;
            for sample in buffer.iter_mut() {
                drive_gain += drive_increment;
                makeup_gain += makeup_increment;
                let y = channel.chain.process(*sample * drive_gain, saturation);
                *sample = y * makeup_gain;
            }
        }
        self.previous_drive = drive;
        self.previous_makeup = makeup;
    }

    /// Runs the coefficient pipeline for every channel: source poles,
    /// decorrelation, sample-rate remap, biquad conversion, passivity clamp.
    fn update_coefficients(&mut self, morph: f32, intensity: f32, pair: usize) {
        let (poles, source_rate) = match &self.source {
            MorphSource::Bank => (bank_poles(morph, intensity, pair), REFERENCE_SAMPLE_RATE),
            MorphSource::ShapePair { a, b } => (
                morph::interpolate(a, b, morph, intensity),
                REFERENCE_SAMPLE_RATE,
            ),
            MorphSource::Model(pack) => {
                (pack_poles(pack, morph, intensity), pack.reference_rate())
            }
        };
        self.current_poles = poles;

        let num_channels = self.channels.len();
        for (index, channel) in self.channels.iter_mut().enumerate() {
            let mut sections = [SectionCoefficients::NEUTRAL; NUM_SECTIONS];
            for (i, pole) in poles.iter().enumerate() {
                let pole = decorrelate(*pole, i, index, num_channels);
                let pole = remap_pole_from(pole, source_rate, self.sample_rate);
                sections[i] = SectionCoefficients::from_pole(pole);
            }
            channel.response_peak = guard::apply(&mut sections);
            channel.chain.set_coefficients(&sections);
            if index == 0 {
                self.tap.publish(&poles, &sections);
            }
        }
    }
}

/// Interpolated reference-rate poles from the built-in bank.
fn bank_poles(morph: f32, intensity: f32, pair: usize) -> [PolePair; NUM_SECTIONS] {
    let pair = MORPH_PAIR_TABLE[pair.min(MORPH_PAIR_TABLE.len() - 1)];
    morph::interpolate(SHAPE_TABLE[pair.a], SHAPE_TABLE[pair.b], morph, intensity)
}

/// Poles recovered from a model pack's interpolated frames.
///
/// Pack frames store precomputed coefficients; the denominator is inverted
/// back to a pole so the shared remap/convert/guard pipeline applies at any
/// running rate. Frames whose denominator holds no conjugate pair degrade to
/// a wide, low-resonance pole instead of propagating.
fn pack_poles(pack: &ModelPack, morph: f32, intensity: f32) -> [PolePair; NUM_SECTIONS] {
    core::array::from_fn(|i| match pack.coefficients(morph, i).pole() {
        Some(pole) => PolePair::new(morph::apply_intensity(pole.radius, intensity), pole.angle),
        None => PolePair::new(MIN_RADIUS, 0.1),
    })
}

/// Deterministic, symmetric stereo offsets on odd-indexed sections.
#[inline]
fn decorrelate(pole: PolePair, section: usize, channel: usize, num_channels: usize) -> PolePair {
    if num_channels < 2 || section % 2 == 0 {
        return pole;
    }
    let sign = match channel {
        0 => -1.0,
        1 => 1.0,
        _ => return pole,
    };
    PolePair::new(
        pole.radius * (1.0 + sign * DECORRELATION_RADIUS),
        pole.angle + sign * DECORRELATION_ANGLE,
    )
    .clamped()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::SharedParameters;

    fn prepared_engine(channels: usize) -> ZPlaneEngine {
        let mut engine = ZPlaneEngine::new();
        engine.prepare(48000.0, 512, channels);
        engine
    }

    #[test]
    fn zero_channels_is_a_no_op() {
        let mut engine = prepared_engine(0);
        let snapshot = SharedParameters::new().snapshot();
        engine.process(&snapshot, &mut []);
    }

    #[test]
    fn empty_block_is_a_no_op() {
        let mut engine = prepared_engine(1);
        let snapshot = SharedParameters::new().snapshot();
        let mut buffer: [f32; 0] = [];
        engine.process(&snapshot, &mut [&mut buffer[..]]);
    }

    #[test]
    fn channel_count_change_is_absorbed_at_block_start() {
        let mut engine = prepared_engine(1);
        let params = SharedParameters::new();
        params.set_intensity(0.8);
        let snapshot = params.snapshot();

        let mut mono = [0.0f32; 64];
        mono[0] = 1.0;
        engine.process(&snapshot, &mut [&mut mono[..]]);
        assert_eq!(engine.num_channels(), 1);

        let mut left = [0.0f32; 64];
        let mut right = [0.0f32; 64];
        left[0] = 1.0;
        right[0] = 1.0;
        engine.process(&snapshot, &mut [&mut left[..], &mut right[..]]);
        assert_eq!(engine.num_channels(), 2);
    }

    #[test]
    fn stereo_decorrelation_is_symmetric_on_odd_sections() {
        let pole = PolePair::new(0.9, 0.5);
        let left = decorrelate(pole, 1, 0, 2);
        let right = decorrelate(pole, 1, 1, 2);
        assert!((left.angle + right.angle - 2.0 * pole.angle).abs() < 1e-6);
        assert!((left.radius * right.radius - pole.radius * pole.radius).abs() < 1e-4);
        assert_ne!(left, right);
    }

    #[test]
    fn even_sections_and_mono_are_not_decorrelated() {
        let pole = PolePair::new(0.9, 0.5);
        assert_eq!(decorrelate(pole, 0, 0, 2), pole);
        assert_eq!(decorrelate(pole, 2, 1, 2), pole);
        assert_eq!(decorrelate(pole, 1, 0, 1), pole);
    }

    #[test]
    fn pair_index_out_of_range_is_clamped() {
        let poles = bank_poles(0.5, 1.0, usize::MAX);
        let clamped = bank_poles(0.5, 1.0, MORPH_PAIR_TABLE.len() - 1);
        assert_eq!(poles, clamped);
    }

    #[test]
    fn visualization_queries_reflect_the_last_update() {
        let mut engine = prepared_engine(2);
        let params = SharedParameters::new();
        params.set_intensity(1.0);
        params.set_morph(0.3);
        let snapshot = params.snapshot();
        let mut left = [0.0f32; 128];
        let mut right = [0.0f32; 128];
        engine.process(&snapshot, &mut [&mut left[..], &mut right[..]]);

        let poles = engine.poles();
        for pole in poles {
            assert!(pole.radius > 0.0 && pole.radius < 1.0);
        }
        let c = engine.coefficients(0).unwrap();
        assert!(c.iter().all(|s| s.is_finite()));
        assert!(engine.coefficients(2).is_none());

        // The shared tap carries the same update without borrowing the
        // engine.
        let tap = engine.visualization();
        assert_eq!(tap.poles(), poles);
        assert_eq!(tap.coefficients(), c);
    }

    #[test]
    fn installed_shape_pair_overrides_the_bank() {
        let mut engine = prepared_engine(1);
        let params = SharedParameters::new();
        params.set_intensity(1.0);
        params.set_morph(0.0);
        let snapshot = params.snapshot();

        // Lets the intensity smoother converge so poles sit on the endpoint.
        let settle = |engine: &mut ZPlaneEngine| {
            for _ in 0..256 {
                let mut block = [0.0f32; 64];
                engine.process(&snapshot, &mut [&mut block[..]]);
            }
        };

        settle(&mut engine);
        let bank = engine.poles();

        let a = Shape {
            poles: [PolePair::new(0.88, 0.3); NUM_SECTIONS],
        };
        let b = Shape {
            poles: [PolePair::new(0.6, 1.4); NUM_SECTIONS],
        };
        engine.install_shape_pair(a, b);
        settle(&mut engine);
        let installed = engine.poles();
        assert_ne!(installed, bank);
        // Morph 0 with full intensity reproduces endpoint A.
        for pole in installed {
            assert!((pole.radius - 0.88).abs() < 1e-4);
            assert!((pole.angle - 0.3).abs() < 1e-5);
        }

        engine.clear_pack();
        settle(&mut engine);
        for (pole, reference) in engine.poles().iter().zip(bank) {
            assert!((pole.radius - reference.radius).abs() < 1e-4);
            assert!((pole.angle - reference.angle).abs() < 1e-5);
        }
    }

    #[test]
    fn bypass_entry_flushes_ringing_state() {
        let mut engine = prepared_engine(1);
        let params = SharedParameters::new();
        params.set_intensity(1.0);

        // Charge the section state, then pull the target to neutral and run
        // until the bypass engages (exact pass-through of a marker block).
        let input: [f32; 64] =
            core::array::from_fn(|i| (i as f32 * core::f32::consts::TAU / 13.0).sin());
        for _ in 0..8 {
            let mut block = input;
            engine.process(&params.snapshot(), &mut [&mut block[..]]);
        }
        params.set_intensity(0.0);
        let mut engaged = false;
        for _ in 0..400 {
            let mut block = input;
            engine.process(&params.snapshot(), &mut [&mut block[..]]);
            if block == input {
                engaged = true;
                break;
            }
        }
        assert!(engaged, "bypass never engaged");

        // With the sections flushed on entry, re-engaging on silence must
        // produce silence rather than a stale tail.
        params.set_intensity(1.0);
        let mut silent = [0.0f32; 64];
        engine.process(&params.snapshot(), &mut [&mut silent[..]]);
        assert!(silent.iter().all(|s| *s == 0.0));
    }

    #[test]
    fn pack_with_wrong_section_count_is_refused() {
        let frames = vec![SectionCoefficients::NEUTRAL; 4];
        let pack = ModelPack::from_frames(1, 4, 48000.0, &frames).unwrap();
        let mut engine = prepared_engine(1);
        assert_eq!(
            engine.install_pack(pack),
            Err(PackError::SectionCountMismatch {
                expected: NUM_SECTIONS,
                found: 4
            })
        );
    }
}

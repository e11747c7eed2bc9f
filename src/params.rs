//! Lock-free parameter handoff between the control and audio threads.
//!
//! Setters run on a non-real-time thread (UI or host automation) and publish
//! single words with relaxed atomics; the audio thread takes one
//! [`ParameterSnapshot`] at the start of each block and never blocks on a
//! writer. Floats travel as their bit patterns in `AtomicU32`.

use core::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};

use crate::biquad::SectionCoefficients;
use crate::morph::PolePair;
use crate::NUM_SECTIONS;

/// Drive range in dB.
pub const DRIVE_DB_RANGE: (f32, f32) = (-24.0, 24.0);

/// LFO rate range in Hz.
pub const LFO_RATE_RANGE: (f32, f32) = (0.02, 8.0);

/// Shared mutable parameter block. All setters clamp to the documented range
/// and are idempotent; out-of-range values are never rejected.
#[derive(Debug)]
pub struct SharedParameters {
    morph: AtomicU32,
    intensity: AtomicU32,
    drive_db: AtomicU32,
    saturation: AtomicU32,
    lfo_rate: AtomicU32,
    lfo_depth: AtomicU32,
    morph_pair: AtomicUsize,
    auto_makeup: AtomicBool,
}

/// Plain-data copy of the parameters, read once per block by the audio thread
/// and stable for the duration of that block. Also serves read-only queries
/// from visualization collaborators.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterSnapshot {
    pub morph: f32,
    pub intensity: f32,
    pub drive_db: f32,
    pub saturation: f32,
    pub lfo_rate: f32,
    pub lfo_depth: f32,
    pub morph_pair: usize,
    pub auto_makeup: bool,
}

impl Default for ParameterSnapshot {
    fn default() -> Self {
        Self {
            morph: 0.0,
            intensity: 0.0,
            drive_db: 0.0,
            saturation: 0.0,
            lfo_rate: 1.0,
            lfo_depth: 0.0,
            morph_pair: 0,
            auto_makeup: false,
        }
    }
}

impl Default for SharedParameters {
    fn default() -> Self {
        let snapshot = ParameterSnapshot::default();
        Self {
            morph: AtomicU32::new(snapshot.morph.to_bits()),
            intensity: AtomicU32::new(snapshot.intensity.to_bits()),
            drive_db: AtomicU32::new(snapshot.drive_db.to_bits()),
            saturation: AtomicU32::new(snapshot.saturation.to_bits()),
            lfo_rate: AtomicU32::new(snapshot.lfo_rate.to_bits()),
            lfo_depth: AtomicU32::new(snapshot.lfo_depth.to_bits()),
            morph_pair: AtomicUsize::new(snapshot.morph_pair),
            auto_makeup: AtomicBool::new(snapshot.auto_makeup),
        }
    }
}

impl SharedParameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Morph position between the pair's endpoint shapes. Range: 0.0 - 1.0.
    pub fn set_morph(&self, value: f32) {
        self.morph
            .store(value.clamp(0.0, 1.0).to_bits(), Ordering::Relaxed);
    }

    /// Resonance intensity, 0 is neutral, 1 the authentic (tightest)
    /// character. Range: 0.0 - 1.0.
    pub fn set_intensity(&self, value: f32) {
        self.intensity
            .store(value.clamp(0.0, 1.0).to_bits(), Ordering::Relaxed);
    }

    /// Input drive in dB, mapped to linear gain internally.
    /// Range: -24.0 - 24.0.
    pub fn set_drive_db(&self, value: f32) {
        self.drive_db.store(
            value.clamp(DRIVE_DB_RANGE.0, DRIVE_DB_RANGE.1).to_bits(),
            Ordering::Relaxed,
        );
    }

    /// Per-section saturation amount. Range: 0.0 - 1.0.
    pub fn set_saturation(&self, value: f32) {
        self.saturation
            .store(value.clamp(0.0, 1.0).to_bits(), Ordering::Relaxed);
    }

    /// Morph LFO rate in Hz. Range: 0.02 - 8.0.
    pub fn set_lfo_rate(&self, value: f32) {
        self.lfo_rate.store(
            value.clamp(LFO_RATE_RANGE.0, LFO_RATE_RANGE.1).to_bits(),
            Ordering::Relaxed,
        );
    }

    /// Morph LFO depth. The LFO swings bipolar around the morph position by
    /// half the depth before clamping to [0, 1]. Range: 0.0 - 1.0.
    pub fn set_lfo_depth(&self, value: f32) {
        self.lfo_depth
            .store(value.clamp(0.0, 1.0).to_bits(), Ordering::Relaxed);
    }

    /// Selects the morph endpoint pair. Indices beyond the active bank are
    /// clamped by the engine when the snapshot is consumed.
    pub fn set_morph_pair(&self, index: usize) {
        self.morph_pair.store(index, Ordering::Relaxed);
    }

    /// Enables output auto-makeup gain. Off by default: the makeup masks the
    /// thin, precise character the filter is meant to have.
    pub fn set_auto_makeup(&self, enabled: bool) {
        self.auto_makeup.store(enabled, Ordering::Relaxed);
    }

    /// Reads a coherent-enough copy of all parameters. Each field is
    /// individually atomic; tearing across fields is acceptable at block
    /// boundaries by design.
    pub fn snapshot(&self) -> ParameterSnapshot {
        ParameterSnapshot {
            morph: f32::from_bits(self.morph.load(Ordering::Relaxed)),
            intensity: f32::from_bits(self.intensity.load(Ordering::Relaxed)),
            drive_db: f32::from_bits(self.drive_db.load(Ordering::Relaxed)),
            saturation: f32::from_bits(self.saturation.load(Ordering::Relaxed)),
            lfo_rate: f32::from_bits(self.lfo_rate.load(Ordering::Relaxed)),
            lfo_depth: f32::from_bits(self.lfo_depth.load(Ordering::Relaxed)),
            morph_pair: self.morph_pair.load(Ordering::Relaxed),
            auto_makeup: self.auto_makeup.load(Ordering::Relaxed),
        }
    }
}

/// Lock-free visualization tap. The audio thread publishes the poles and
/// channel-0 coefficients of each update; the control thread reads them at
/// any time without touching the engine. Words travel as f32 bit patterns in
/// `AtomicU32`, like the parameter block; tearing between words is acceptable
/// for display purposes.
#[derive(Debug)]
pub struct VisualizationTap {
    radii: [AtomicU32; NUM_SECTIONS],
    angles: [AtomicU32; NUM_SECTIONS],
    coefficients: [[AtomicU32; 5]; NUM_SECTIONS],
}

impl Default for VisualizationTap {
    fn default() -> Self {
        let tap = Self {
            radii: core::array::from_fn(|_| AtomicU32::new(0)),
            angles: core::array::from_fn(|_| AtomicU32::new(0)),
            coefficients: core::array::from_fn(|_| core::array::from_fn(|_| AtomicU32::new(0))),
        };
        tap.publish(
            &[PolePair::default(); NUM_SECTIONS],
            &[SectionCoefficients::NEUTRAL; NUM_SECTIONS],
        );
        tap
    }
}

impl VisualizationTap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes one update. Called by the audio thread after the coefficient
    /// pipeline has run.
    pub(crate) fn publish(
        &self,
        poles: &[PolePair; NUM_SECTIONS],
        sections: &[SectionCoefficients; NUM_SECTIONS],
    ) {
        for i in 0..NUM_SECTIONS {
            self.radii[i].store(poles[i].radius.to_bits(), Ordering::Relaxed);
            self.angles[i].store(poles[i].angle.to_bits(), Ordering::Relaxed);
            let c = &sections[i];
            let words = [c.b0, c.b1, c.b2, c.a1, c.a2];
            for (slot, value) in self.coefficients[i].iter().zip(words) {
                slot.store(value.to_bits(), Ordering::Relaxed);
            }
        }
    }

    /// Reference-rate poles of the most recent update.
    pub fn poles(&self) -> [PolePair; NUM_SECTIONS] {
        core::array::from_fn(|i| {
            PolePair::new(
                f32::from_bits(self.radii[i].load(Ordering::Relaxed)),
                f32::from_bits(self.angles[i].load(Ordering::Relaxed)),
            )
        })
    }

    /// Running-rate cascade coefficients of the most recent update.
    pub fn coefficients(&self) -> [SectionCoefficients; NUM_SECTIONS] {
        core::array::from_fn(|i| {
            let words: [f32; 5] = core::array::from_fn(|j| {
                f32::from_bits(self.coefficients[i][j].load(Ordering::Relaxed))
            });
            SectionCoefficients {
                b0: words[0],
                b1: words[1],
                b2: words[2],
                a1: words[3],
                a2: words[4],
            }
        })
    }
}

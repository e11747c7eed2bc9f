//! Loadable model packs.
//!
//! Two little-endian binary formats extend or replace the built-in bank at
//! run time. Parsing is defensive: magic mismatch, truncation or an
//! out-of-range entry fails closed with an error and no partially
//! initialized state. Loading happens off the audio thread; the parsed pack
//! owns its storage and is handed to the engine at a block boundary.
//!
//! - `ZMF1` carries one named model: a header followed by
//!   `frames × sections × 5` packed `f32` coefficients (`b0 b1 b2 a1 a2`),
//!   frame-major. The morph position indexes fractionally into the frames.
//! - `ZPK1` is a directory of typed entries (`id, type, subtype, flags,
//!   offset, length`) pointing into a shared payload buffer, from which
//!   `ZMF1` blobs or raw shape records are extracted.

use alloc::vec::Vec;

use thiserror::Error;

use crate::biquad::SectionCoefficients;
use crate::morph::{PolePair, Shape, MIN_RADIUS};
use crate::utils::crossfade;
use crate::NUM_SECTIONS;

pub const ZMF1_MAGIC: [u8; 4] = *b"ZMF1";
pub const ZPK1_MAGIC: [u8; 4] = *b"ZPK1";

pub const ZMF1_VERSION: u32 = 1;
pub const ZPK1_VERSION: u32 = 1;

/// Hard ceiling on sections per model frame.
pub const MAX_PACK_SECTIONS: usize = 8;

const ZMF1_HEADER_SIZE: usize = 24;
const ZPK1_HEADER_SIZE: usize = 12;
const ZPK1_ENTRY_SIZE: usize = 20;
const COEFFICIENTS_PER_SECTION: usize = 5;
const RAW_SHAPE_SIZE: usize = NUM_SECTIONS * 2 * 4;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum PackError {
    #[error("unrecognized magic bytes")]
    BadMagic,
    #[error("unsupported format version {0}")]
    UnsupportedVersion(u32),
    #[error("buffer truncated")]
    Truncated,
    #[error("model declares no frames")]
    NoFrames,
    #[error("section count {0} exceeds the supported maximum")]
    TooManySections(u32),
    #[error("section count {found} does not match the engine cascade of {expected}")]
    SectionCountMismatch { expected: usize, found: usize },
    #[error("entry payload lies outside the pack buffer")]
    EntryOutOfRange,
    #[error("reference sample rate is not a positive finite value")]
    BadReferenceRate,
    #[error("entry kind does not match the requested interpretation")]
    WrongEntryKind,
}

#[inline]
fn read_u32(data: &[u8], offset: usize) -> Result<u32, PackError> {
    let bytes = data
        .get(offset..offset + 4)
        .ok_or(PackError::Truncated)?
        .try_into()
        .map_err(|_| PackError::Truncated)?;
    Ok(u32::from_le_bytes(bytes))
}

#[inline]
fn read_u16(data: &[u8], offset: usize) -> Result<u16, PackError> {
    let bytes = data
        .get(offset..offset + 2)
        .ok_or(PackError::Truncated)?
        .try_into()
        .map_err(|_| PackError::Truncated)?;
    Ok(u16::from_le_bytes(bytes))
}

#[inline]
fn read_f32(data: &[u8], offset: usize) -> Result<f32, PackError> {
    Ok(f32::from_bits(read_u32(data, offset)?))
}

/// Single-model coefficient set parsed from a `ZMF1` blob.
///
/// Owns a copy of its frames; nothing borrows the source buffer after
/// [`ModelPack::from_bytes`] returns.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelPack {
    model_id: u32,
    num_frames: usize,
    num_sections: usize,
    reference_rate: f32,
    /// Frame-major, then section, 5 floats per section.
    frames: Vec<f32>,
}

impl ModelPack {
    pub fn from_bytes(data: &[u8]) -> Result<Self, PackError> {
        if data.len() < ZMF1_HEADER_SIZE {
            return Err(PackError::Truncated);
        }
        if data[0..4] != ZMF1_MAGIC {
            return Err(PackError::BadMagic);
        }
        let version = read_u32(data, 4)?;
        if version != ZMF1_VERSION {
            return Err(PackError::UnsupportedVersion(version));
        }
        let model_id = read_u32(data, 8)?;
        let num_frames = read_u32(data, 12)?;
        let num_sections = read_u32(data, 16)?;
        let reference_rate = read_f32(data, 20)?;

        if num_frames == 0 {
            return Err(PackError::NoFrames);
        }
        if num_sections as usize > MAX_PACK_SECTIONS {
            return Err(PackError::TooManySections(num_sections));
        }
        if !(reference_rate.is_finite() && reference_rate > 0.0) {
            return Err(PackError::BadReferenceRate);
        }

        let count = num_frames as usize * num_sections as usize * COEFFICIENTS_PER_SECTION;
        let payload = data
            .get(ZMF1_HEADER_SIZE..ZMF1_HEADER_SIZE + count * 4)
            .ok_or(PackError::Truncated)?;

        let mut frames = Vec::with_capacity(count);
        for chunk in payload.chunks_exact(4) {
            frames.push(f32::from_le_bytes(chunk.try_into().unwrap_or([0; 4])));
        }

        Ok(Self {
            model_id,
            num_frames: num_frames as usize,
            num_sections: num_sections as usize,
            reference_rate,
            frames,
        })
    }

    /// Serializes the model back into the `ZMF1` wire format.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(ZMF1_HEADER_SIZE + self.frames.len() * 4);
        out.extend_from_slice(&ZMF1_MAGIC);
        out.extend_from_slice(&ZMF1_VERSION.to_le_bytes());
        out.extend_from_slice(&self.model_id.to_le_bytes());
        out.extend_from_slice(&(self.num_frames as u32).to_le_bytes());
        out.extend_from_slice(&(self.num_sections as u32).to_le_bytes());
        out.extend_from_slice(&self.reference_rate.to_le_bytes());
        for value in &self.frames {
            out.extend_from_slice(&value.to_le_bytes());
        }
        out
    }

    /// Builds a model from already-unpacked frames (the producer side).
    ///
    /// `frames` must hold `num_frames × num_sections` coefficient sets,
    /// frame-major.
    pub fn from_frames(
        model_id: u32,
        num_sections: usize,
        reference_rate: f32,
        frames: &[SectionCoefficients],
    ) -> Result<Self, PackError> {
        if num_sections > MAX_PACK_SECTIONS {
            return Err(PackError::TooManySections(num_sections as u32));
        }
        if num_sections == 0 || frames.is_empty() || frames.len() % num_sections != 0 {
            return Err(PackError::NoFrames);
        }
        if !(reference_rate.is_finite() && reference_rate > 0.0) {
            return Err(PackError::BadReferenceRate);
        }
        let mut flat = Vec::with_capacity(frames.len() * COEFFICIENTS_PER_SECTION);
        for c in frames {
            flat.extend_from_slice(&[c.b0, c.b1, c.b2, c.a1, c.a2]);
        }
        Ok(Self {
            model_id,
            num_frames: frames.len() / num_sections,
            num_sections,
            reference_rate,
            frames: flat,
        })
    }

    pub fn model_id(&self) -> u32 {
        self.model_id
    }

    pub fn num_frames(&self) -> usize {
        self.num_frames
    }

    pub fn num_sections(&self) -> usize {
        self.num_sections
    }

    pub fn reference_rate(&self) -> f32 {
        self.reference_rate
    }

    /// Coefficients of one stored frame, without interpolation.
    pub fn frame(&self, frame: usize, section: usize) -> SectionCoefficients {
        debug_assert!(frame < self.num_frames && section < self.num_sections);
        let base = (frame * self.num_sections + section) * COEFFICIENTS_PER_SECTION;
        SectionCoefficients {
            b0: self.frames[base],
            b1: self.frames[base + 1],
            b2: self.frames[base + 2],
            a1: self.frames[base + 3],
            a2: self.frames[base + 4],
        }
    }

    /// Fractionally interpolated coefficients at a morph position in [0, 1].
    #[inline]
    pub fn coefficients(&self, morph: f32, section: usize) -> SectionCoefficients {
        let position = morph.clamp(0.0, 1.0) * (self.num_frames - 1) as f32;
        let index = (position as usize).min(self.num_frames - 1);
        let next = (index + 1).min(self.num_frames - 1);
        let frac = position - index as f32;

        let a = self.frame(index, section);
        let b = self.frame(next, section);
        SectionCoefficients {
            b0: crossfade(a.b0, b.b0, frac),
            b1: crossfade(a.b1, b.b1, frac),
            b2: crossfade(a.b2, b.b2, frac),
            a1: crossfade(a.a1, b.a1, frac),
            a2: crossfade(a.a2, b.a2, frac),
        }
    }
}

/// Payload interpretation of a directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// Embedded `ZMF1` blob.
    Model,
    /// Raw shape record: six (radius, angle) `f32` pairs.
    RawShape,
    Unknown(u16),
}

impl From<u16> for EntryKind {
    fn from(value: u16) -> Self {
        match value {
            1 => Self::Model,
            2 => Self::RawShape,
            other => Self::Unknown(other),
        }
    }
}

/// One validated directory record. `offset`/`length` are guaranteed to lie
/// within the pack buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackEntry {
    pub id: u32,
    pub kind: EntryKind,
    pub subtype: u16,
    pub flags: u32,
    offset: usize,
    length: usize,
}

/// Multi-entry `ZPK1` pack. Owns its backing buffer; entry payloads are
/// views into it and consumers copy what they keep.
#[derive(Debug, Clone)]
pub struct PackDirectory {
    entries: Vec<PackEntry>,
    data: Vec<u8>,
}

impl PackDirectory {
    pub fn from_bytes(data: &[u8]) -> Result<Self, PackError> {
        if data.len() < ZPK1_HEADER_SIZE {
            return Err(PackError::Truncated);
        }
        if data[0..4] != ZPK1_MAGIC {
            return Err(PackError::BadMagic);
        }
        let version = read_u32(data, 4)?;
        if version != ZPK1_VERSION {
            return Err(PackError::UnsupportedVersion(version));
        }
        let num_entries = read_u32(data, 8)? as usize;

        let table_end = num_entries
            .checked_mul(ZPK1_ENTRY_SIZE)
            .and_then(|n| n.checked_add(ZPK1_HEADER_SIZE))
            .ok_or(PackError::Truncated)?;
        if data.len() < table_end {
            return Err(PackError::Truncated);
        }

        let mut entries = Vec::with_capacity(num_entries);
        for i in 0..num_entries {
            let base = ZPK1_HEADER_SIZE + i * ZPK1_ENTRY_SIZE;
            let id = read_u32(data, base)?;
            let kind = EntryKind::from(read_u16(data, base + 4)?);
            let subtype = read_u16(data, base + 6)?;
            let flags = read_u32(data, base + 8)?;
            let offset = read_u32(data, base + 12)? as usize;
            let length = read_u32(data, base + 16)? as usize;

            let end = offset.checked_add(length).ok_or(PackError::EntryOutOfRange)?;
            if end > data.len() {
                return Err(PackError::EntryOutOfRange);
            }

            entries.push(PackEntry {
                id,
                kind,
                subtype,
                flags,
                offset,
                length,
            });
        }

        Ok(Self {
            entries,
            data: data.to_vec(),
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &PackEntry> {
        self.entries.iter()
    }

    /// Raw payload bytes of one entry.
    pub fn payload(&self, entry: &PackEntry) -> &[u8] {
        &self.data[entry.offset..entry.offset + entry.length]
    }

    /// Parses a [`EntryKind::Model`] entry into an owned model.
    pub fn model(&self, entry: &PackEntry) -> Result<ModelPack, PackError> {
        if entry.kind != EntryKind::Model {
            return Err(PackError::WrongEntryKind);
        }
        ModelPack::from_bytes(self.payload(entry))
    }

    /// Parses a [`EntryKind::RawShape`] entry into a reference-rate shape.
    pub fn shape(&self, entry: &PackEntry) -> Result<Shape, PackError> {
        if entry.kind != EntryKind::RawShape {
            return Err(PackError::WrongEntryKind);
        }
        if entry.length < RAW_SHAPE_SIZE {
            return Err(PackError::Truncated);
        }
        let payload = self.payload(entry);
        let mut poles = [PolePair::default(); NUM_SECTIONS];
        for (i, pole) in poles.iter_mut().enumerate() {
            let radius = read_f32(payload, i * 8)?;
            let angle = read_f32(payload, i * 8 + 4)?;
            // Non-finite fields fall back to a soft pole; finite ones are
            // clamped into the safety band with the angle wrapped.
            *pole = if radius.is_finite() && angle.is_finite() {
                PolePair::new(radius, angle).clamped()
            } else {
                PolePair::new(MIN_RADIUS, 0.1)
            };
        }
        Ok(Shape { poles })
    }
}

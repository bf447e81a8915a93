//! Core data types for mimic-rs
//!
//! This module contains the fundamental data structures used throughout
//! the crate for representing recorded movement: vectors, frames, sparse
//! correction entries, bookmarks, and the persisted record itself.
//!
//! # Main Types
//!
//! - [`Frame`] - One simulation tick of recorded actor state
//! - [`CorrectionFlags`] - Which corrective fields a frame references
//! - [`CorrectionEntry`] - An out-of-band full-state resync point
//! - [`Bookmark`] - A named, seekable point within a record
//! - [`RecordHeader`] - Header metadata (cheap to load for listings)
//! - [`Record`] - Header plus frame and correction data
//!
//! # Corrections
//!
//! Frames are mostly low-fidelity (predicted input). To bound drift, some
//! frames carry a [`CorrectionFlags`] value that references the next entry in
//! [`Record::corrections`]. Entries are consumed strictly in order, one per
//! flagged frame, so the number of flagged frames always equals the number of
//! correction entries.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Binary format version written by this crate
pub const FORMAT_VERSION: u8 = 0x02;

/// First format version that carries a bookmark table
pub const BOOKMARKS_SINCE_VERSION: u8 = 0x02;

/// Stable identifier of an actor in the host simulation
///
/// Unlike a player slot, an `ActorId` is never reused for a different actor
/// while sessions referencing it are alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActorId(pub u64);

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "actor#{}", self.0)
    }
}

/// A 3-component float vector (position or velocity)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3::new(0.0, 0.0, 0.0);

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

impl fmt::Display for Vec3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.2}, {:.2}, {:.2})", self.x, self.y, self.z)
    }
}

/// Euler orientation in degrees
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Angles {
    pub pitch: f32,
    pub yaw: f32,
    pub roll: f32,
}

impl Angles {
    pub const fn new(pitch: f32, yaw: f32, roll: f32) -> Self {
        Self { pitch, yaw, roll }
    }

    /// Drop the roll component (frames and headers only store pitch/yaw)
    pub fn without_roll(self) -> Self {
        Self { roll: 0.0, ..self }
    }
}

/// Bitfield marking which correction fields a frame references
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct CorrectionFlags(u32);

impl CorrectionFlags {
    pub const NONE: CorrectionFlags = CorrectionFlags(0);
    pub const ORIGIN: CorrectionFlags = CorrectionFlags(1 << 0);
    pub const ANGLES: CorrectionFlags = CorrectionFlags(1 << 1);
    pub const VELOCITY: CorrectionFlags = CorrectionFlags(1 << 2);
    pub const ALL: CorrectionFlags = CorrectionFlags(0b111);

    /// Build from raw wire bits. Unknown bits are kept so they survive a rewrite.
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: CorrectionFlags) -> bool {
        self.0 & other.0 == other.0
    }

    /// Whether any known correction bit is set
    ///
    /// This, not raw non-zeroness, decides whether a correction entry follows
    /// the frame on the wire.
    pub const fn has_correction(self) -> bool {
        self.0 & Self::ALL.0 != 0
    }
}

impl BitOr for CorrectionFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for CorrectionFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// One simulation tick of recorded actor state
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Frame {
    /// Input button bitmask
    pub buttons: u64,
    /// Impulse command code
    pub impulse: i32,
    /// Ground-truth velocity read from the simulation
    pub actual_velocity: Vec3,
    /// Velocity as sampled from input prediction
    pub predicted_velocity: Vec3,
    /// Predicted view angles (roll is never stored)
    pub predicted_angles: Angles,
    /// Ground-truth origin
    pub origin: Vec3,
    /// Item identifier, present only on ticks where the active item changed
    pub new_weapon: Option<String>,
    pub subtype: i32,
    pub seed: i32,
    /// Correction fields referenced by this frame
    pub correction: CorrectionFlags,
}

/// Sparse full-state resync point, stored out-of-band from the frames
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CorrectionEntry {
    pub origin: Option<Vec3>,
    pub angles: Option<Angles>,
    pub velocity: Option<Vec3>,
}

impl CorrectionEntry {
    /// Full snapshot (origin, angles and velocity)
    pub fn full(origin: Vec3, angles: Angles, velocity: Vec3) -> Self {
        Self {
            origin: Some(origin),
            angles: Some(angles),
            velocity: Some(velocity),
        }
    }

    /// Origin-only snapshot used for periodic drift bounding
    pub fn origin_only(origin: Vec3) -> Self {
        Self {
            origin: Some(origin),
            ..Default::default()
        }
    }

    /// Flags mirroring which fields are populated
    pub fn flags(&self) -> CorrectionFlags {
        let mut flags = CorrectionFlags::NONE;
        if self.origin.is_some() {
            flags |= CorrectionFlags::ORIGIN;
        }
        if self.angles.is_some() {
            flags |= CorrectionFlags::ANGLES;
        }
        if self.velocity.is_some() {
            flags |= CorrectionFlags::VELOCITY;
        }
        flags
    }
}

/// A named, seekable point within a record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bookmark {
    /// Frame index the bookmark refers to
    pub frame: u32,
    /// Index of the correction entry attached to that frame
    pub correction_index: u32,
    pub name: String,
}

impl Bookmark {
    /// Case-insensitive name comparison
    pub fn is_named(&self, name: &str) -> bool {
        self.name.to_lowercase() == name.to_lowercase()
    }
}

/// Header metadata of a persisted record
///
/// Headers can be loaded without the frame data, which is what the catalog
/// does when listing records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordHeader {
    pub format_version: u8,
    /// Unix timestamp (seconds) at which the recording ended
    pub end_time: i32,
    /// Display name
    pub name: String,
    pub initial_position: Vec3,
    /// Initial orientation (pitch/yaw only)
    pub initial_angles: Angles,
    /// Number of frames in the record body
    pub frame_count: u32,
    pub bookmarks: Vec<Bookmark>,
}

impl RecordHeader {
    /// Find a bookmark by name (case-insensitive), returning its storage index
    pub fn find_bookmark(&self, name: &str) -> Option<(usize, &Bookmark)> {
        self.bookmarks.iter().enumerate().find(|(_, b)| b.is_named(name))
    }
}

/// A complete record: header, frames, and correction entries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub header: RecordHeader,
    pub frames: Vec<Frame>,
    pub corrections: Vec<CorrectionEntry>,
}

impl Record {
    /// Assemble a record, deriving the frame count from `frames`
    pub fn new(
        name: impl Into<String>,
        end_time: i32,
        initial_position: Vec3,
        initial_angles: Angles,
        frames: Vec<Frame>,
        corrections: Vec<CorrectionEntry>,
        bookmarks: Vec<Bookmark>,
    ) -> Self {
        Self {
            header: RecordHeader {
                format_version: FORMAT_VERSION,
                end_time,
                name: name.into(),
                initial_position,
                initial_angles: initial_angles.without_roll(),
                frame_count: frames.len() as u32,
                bookmarks,
            },
            frames,
            corrections,
        }
    }

    /// Wrap a header whose body has not been loaded
    pub fn header_only(header: RecordHeader) -> Self {
        Self {
            header,
            frames: Vec::new(),
            corrections: Vec::new(),
        }
    }

    /// Number of frames in the record (from the header, valid for header-only records)
    pub fn frame_count(&self) -> usize {
        self.header.frame_count as usize
    }

    /// Whether the frame body is present
    pub fn has_body(&self) -> bool {
        self.frames.len() == self.frame_count()
    }

    /// Number of frames that reference a correction entry
    pub fn flagged_frame_count(&self) -> usize {
        self.frames
            .iter()
            .filter(|f| f.correction.has_correction())
            .count()
    }
}

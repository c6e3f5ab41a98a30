//! Decoded digit and readout-frame records.
//!
//! These are produced by the raw decoder upstream and only read here.

use std::cmp::Ordering;
use std::ops::Range;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Bunch crossings in one LHC orbit.
pub const BUNCH_CROSSINGS_PER_ORBIT: u32 = 3564;

/// Bunch crossing spacing in nanoseconds.
pub const BUNCH_CROSSING_NS: f64 = 25.0;

/// Orbit length in milliseconds (3564 × 25 ns).
pub const ORBIT_LENGTH_MS: f64 = BUNCH_CROSSINGS_PER_ORBIT as f64 * BUNCH_CROSSING_NS / 1e6;

/// Number of strip patterns in a [`HitRecord`]: four bending lines and one
/// non-bending pattern.
pub const N_PATTERNS: usize = 5;

/// Index of the non-bending pattern.
pub const NON_BENDING_PATTERN: usize = 4;

/// Fired strips of one RPC column in one readout frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct HitRecord {
    /// Detection element (RPC) identifier.
    pub de_id: u8,
    /// Column identifier within the detection element.
    pub column_id: u8,
    /// Strip bit patterns. Indices 0..4 are bending lines, 4 is non-bending.
    pub patterns: [u16; N_PATTERNS],
}

impl HitRecord {
    /// Creates a record from its identifiers and patterns.
    #[must_use]
    pub fn new(de_id: u8, column_id: u8, patterns: [u16; N_PATTERNS]) -> Self {
        Self {
            de_id,
            column_id,
            patterns,
        }
    }

    /// Fired strips on bending line `line` (0..4).
    #[must_use]
    #[inline]
    pub fn bending_pattern(&self, line: usize) -> u16 {
        self.patterns[line]
    }

    /// Fired strips on the non-bending plane.
    #[must_use]
    #[inline]
    pub fn non_bending_pattern(&self) -> u16 {
        self.patterns[NON_BENDING_PATTERN]
    }

    /// Number of fired bending-plane strips over all four lines.
    #[must_use]
    #[inline]
    pub fn bending_hits(&self) -> u32 {
        self.patterns[..NON_BENDING_PATTERN]
            .iter()
            .map(|pattern| pattern.count_ones())
            .sum()
    }

    /// Number of fired non-bending strips.
    #[must_use]
    #[inline]
    pub fn non_bending_hits(&self) -> u32 {
        self.non_bending_pattern().count_ones()
    }
}

/// Readout time reference: bunch crossing within an orbit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct InteractionRecord {
    /// Bunch crossing, `0..3564`.
    pub bc: u16,
    /// Orbit counter.
    pub orbit: u32,
}

impl InteractionRecord {
    /// Creates an interaction record.
    #[must_use]
    pub fn new(bc: u16, orbit: u32) -> Self {
        Self { bc, orbit }
    }

    /// Signed distance from `other` to `self` in bunch crossings.
    #[must_use]
    pub fn difference_in_bc(&self, other: &Self) -> i64 {
        let orbits = i64::from(self.orbit) - i64::from(other.orbit);
        orbits * i64::from(BUNCH_CROSSINGS_PER_ORBIT) + i64::from(self.bc) - i64::from(other.bc)
    }
}

impl PartialOrd for InteractionRecord {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for InteractionRecord {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.orbit, self.bc).cmp(&(other.orbit, other.bc))
    }
}

/// One readout frame: a contiguous slice of the batch's hit records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FrameRecord {
    /// Time reference shared by every hit in the frame.
    pub interaction: InteractionRecord,
    /// Index of the first hit record.
    pub first_entry: usize,
    /// Number of hit records.
    pub n_entries: usize,
}

impl FrameRecord {
    /// Creates a frame record.
    #[must_use]
    pub fn new(interaction: InteractionRecord, first_entry: usize, n_entries: usize) -> Self {
        Self {
            interaction,
            first_entry,
            n_entries,
        }
    }

    /// One past the last hit index, or `None` on overflow.
    #[must_use]
    #[inline]
    pub fn end_index(&self) -> Option<usize> {
        self.first_entry.checked_add(self.n_entries)
    }

    /// Hit index range covered by this frame, or `None` on overflow.
    #[must_use]
    #[inline]
    pub fn range(&self) -> Option<Range<usize>> {
        self.end_index().map(|end| self.first_entry..end)
    }
}

/// Hits and frames delivered together for one processing cycle.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct HitBatch {
    /// Decoded hit records.
    pub hits: Vec<HitRecord>,
    /// Frames indexing into `hits`.
    pub frames: Vec<FrameRecord>,
}

impl HitBatch {
    /// Creates a batch from aligned hits and frames.
    #[must_use]
    pub fn new(hits: Vec<HitRecord>, frames: Vec<FrameRecord>) -> Self {
        Self { hits, frames }
    }

    /// Returns true if the batch carries no hits and no frames.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty() && self.frames.is_empty()
    }

    /// Appends a frame holding `hits`, stamped with `interaction`.
    pub fn push_frame(&mut self, interaction: InteractionRecord, hits: &[HitRecord]) {
        self.frames
            .push(FrameRecord::new(interaction, self.hits.len(), hits.len()));
        self.hits.extend_from_slice(hits);
    }
}

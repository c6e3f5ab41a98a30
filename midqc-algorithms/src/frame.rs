//! Per-frame statistics over one hit batch.
//!
//! For every readout frame the aggregator fills:
//! - the frame size per plane,
//! - the hit multiplicity per chamber and plane (zeros included),
//! - the gap to the previous frame against the smaller of the two sizes,
//! - the local board map for hits on the selected chamber.
//!
//! The only state carried between frames is the previous frame's time
//! reference and size, and nothing is carried between batches.

use midqc_core::record::{NON_BENDING_PATTERN, N_PATTERNS};
use midqc_core::{BinGrid, FrameError, GridError, Histogram1D, HitBatch, HitRecord, MonitorSet};
use midqc_geometry::{
    board_positions, GeometryDescriptor, BOARD_MAP_X_BINS, BOARD_MAP_X_MAX, BOARD_MAP_X_MIN,
    BOARD_MAP_Y_BINS, BOARD_MAP_Y_MAX, BOARD_MAP_Y_MIN, CHAMBER_NAMES, N_CHAMBERS,
};

/// Frame size histograms: 100 bins over `[0, 100)`.
pub const FRAME_SIZE_BINS: usize = 100;
/// Upper edge of the frame size histograms.
pub const FRAME_SIZE_MAX: f64 = 100.0;
/// Time difference map: 100 x 100 bins over `[0, 100)^2`.
pub const TIME_DIFF_BINS: usize = 100;
/// Upper edge of both time difference axes.
pub const TIME_DIFF_MAX: f64 = 100.0;
/// Multiplicity histograms: 300 bins over `[0, 300)`.
pub const MULTIPLICITY_BINS: usize = 300;
/// Upper edge of the multiplicity histograms.
pub const MULTIPLICITY_MAX: f64 = 300.0;

/// Published name of the time difference map.
pub const TIME_DIFF_NAME: &str = "ROFTimeDiff";
/// Published name of the local board map.
pub const LOCAL_BOARDS_NAME: &str = "LocalBoardsMap";

/// Readout plane of an RPC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Plane {
    /// Bending plane: pattern lines 0..4.
    Bending,
    /// Non-bending plane: pattern 4.
    NonBending,
}

impl Plane {
    /// Both planes, bending first.
    pub const ALL: [Plane; 2] = [Plane::Bending, Plane::NonBending];

    /// Name suffix used for published objects.
    #[must_use]
    pub fn suffix(self) -> &'static str {
        match self {
            Plane::Bending => "B",
            Plane::NonBending => "NB",
        }
    }

    /// Fired strips of `hit` on this plane.
    #[must_use]
    #[inline]
    pub fn hits(self, hit: &HitRecord) -> u32 {
        match self {
            Plane::Bending => hit.bending_hits(),
            Plane::NonBending => hit.non_bending_hits(),
        }
    }

    #[inline]
    pub(crate) fn index(self) -> usize {
        match self {
            Plane::Bending => 0,
            Plane::NonBending => 1,
        }
    }
}

/// Published name of a frame size histogram.
#[must_use]
pub fn frame_size_name(plane: Plane) -> String {
    format!("ROFSize{}", plane.suffix())
}

/// Published name of a multiplicity histogram.
#[must_use]
pub fn multiplicity_name(chamber: u8, plane: Plane) -> String {
    let chamber_name = CHAMBER_NAMES
        .get(usize::from(chamber))
        .copied()
        .unwrap_or("MT??");
    format!("MultHit{chamber_name}{}", plane.suffix())
}

/// Checks that every frame lies inside the batch and that frame time
/// references never decrease.
///
/// # Errors
///
/// Returns [`FrameError::OutOfBounds`] or [`FrameError::OutOfOrder`] for the
/// first offending frame.
pub fn validate_frames(batch: &HitBatch) -> Result<(), FrameError> {
    let n_hits = batch.hits.len();
    for (index, frame) in batch.frames.iter().enumerate() {
        match frame.end_index() {
            Some(end) if end <= n_hits => {}
            _ => {
                return Err(FrameError::OutOfBounds {
                    frame: index,
                    first_entry: frame.first_entry,
                    n_entries: frame.n_entries,
                    n_hits,
                })
            }
        }
        if index > 0 && frame.interaction < batch.frames[index - 1].interaction {
            return Err(FrameError::OutOfOrder {
                frame: index,
                previous: index - 1,
            });
        }
    }
    Ok(())
}

/// Histograms written by the [`FrameAggregator`].
#[derive(Debug, Clone, PartialEq)]
pub struct FrameHistograms {
    frame_size: [Histogram1D; 2],
    time_diff: BinGrid,
    multiplicity: [[Histogram1D; 2]; N_CHAMBERS as usize],
    local_boards: BinGrid,
}

impl FrameHistograms {
    /// Creates empty histograms with the standard binning.
    ///
    /// # Errors
    ///
    /// Propagates axis construction errors.
    pub fn new() -> Result<Self, GridError> {
        let size = Histogram1D::with_bins(FRAME_SIZE_BINS, 0.0, FRAME_SIZE_MAX)?;
        let multiplicity = Histogram1D::with_bins(MULTIPLICITY_BINS, 0.0, MULTIPLICITY_MAX)?;
        Ok(Self {
            frame_size: [size.clone(), size],
            time_diff: BinGrid::with_bins(
                TIME_DIFF_BINS,
                0.0,
                TIME_DIFF_MAX,
                TIME_DIFF_BINS,
                0.0,
                TIME_DIFF_MAX,
            )?,
            multiplicity: std::array::from_fn(|_| [multiplicity.clone(), multiplicity.clone()]),
            local_boards: BinGrid::with_bins(
                BOARD_MAP_X_BINS,
                BOARD_MAP_X_MIN,
                BOARD_MAP_X_MAX,
                BOARD_MAP_Y_BINS,
                BOARD_MAP_Y_MIN,
                BOARD_MAP_Y_MAX,
            )?,
        })
    }

    /// Frame size distribution of one plane.
    #[must_use]
    pub fn frame_size(&self, plane: Plane) -> &Histogram1D {
        &self.frame_size[plane.index()]
    }

    /// Gap to the previous frame (x) against the smaller frame size (y).
    #[must_use]
    pub fn time_diff(&self) -> &BinGrid {
        &self.time_diff
    }

    /// Multiplicity distribution of one chamber and plane.
    #[must_use]
    pub fn multiplicity(&self, chamber: u8, plane: Plane) -> Option<&Histogram1D> {
        self.multiplicity
            .get(usize::from(chamber))
            .map(|planes| &planes[plane.index()])
    }

    /// Local board occupancy map.
    #[must_use]
    pub fn local_boards(&self) -> &BinGrid {
        &self.local_boards
    }

    /// Clears every histogram.
    pub fn reset(&mut self) {
        for histogram in &mut self.frame_size {
            histogram.reset();
        }
        self.time_diff.reset();
        for histogram in self.multiplicity.iter_mut().flatten() {
            histogram.reset();
        }
        self.local_boards.reset();
    }

    /// Adds copies of every histogram to `set` under its published name.
    pub fn publish_into(&self, set: &mut MonitorSet) {
        for plane in Plane::ALL {
            set.insert(frame_size_name(plane), self.frame_size(plane).clone());
        }
        set.insert(TIME_DIFF_NAME, self.time_diff.clone());
        for (chamber, planes) in (0..N_CHAMBERS).zip(&self.multiplicity) {
            for plane in Plane::ALL {
                set.insert(
                    multiplicity_name(chamber, plane),
                    planes[plane.index()].clone(),
                );
            }
        }
        set.insert(LOCAL_BOARDS_NAME, self.local_boards.clone());
    }
}

/// What one call to [`FrameAggregator::aggregate`] filled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameSummary {
    /// Frames processed.
    pub frames: usize,
    /// Samples added to the time difference map.
    pub time_diff_samples: usize,
    /// Points added to the local board map.
    pub board_fills: usize,
}

/// Computes per-frame statistics for a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameAggregator {
    board_chamber: u8,
}

impl Default for FrameAggregator {
    fn default() -> Self {
        Self::new(0)
    }
}

impl FrameAggregator {
    /// Creates an aggregator that fills the local board map for `board_chamber`.
    #[must_use]
    pub fn new(board_chamber: u8) -> Self {
        Self { board_chamber }
    }

    /// Chamber whose boards are placed on the local board map.
    #[must_use]
    pub fn board_chamber(&self) -> u8 {
        self.board_chamber
    }

    /// Fills `out` from every frame of `batch`.
    ///
    /// `descriptors[i]` is the classification of `batch.hits[i]`, `None` for
    /// hits outside the topology. Those hits are left out of every histogram.
    ///
    /// # Errors
    ///
    /// Returns a [`FrameError`] if the frames are malformed or `descriptors`
    /// does not have one entry per hit; `out` is left unchanged in that case.
    pub fn aggregate(
        &self,
        batch: &HitBatch,
        descriptors: &[Option<GeometryDescriptor>],
        out: &mut FrameHistograms,
    ) -> Result<FrameSummary, FrameError> {
        validate_frames(batch)?;
        if descriptors.len() != batch.hits.len() {
            return Err(FrameError::DescriptorCountMismatch {
                descriptors: descriptors.len(),
                n_hits: batch.hits.len(),
            });
        }

        let mut summary = FrameSummary::default();
        let mut previous: Option<(usize, u32)> = None;

        for (index, frame) in batch.frames.iter().enumerate() {
            let range = frame.first_entry..frame.first_entry + frame.n_entries;

            let mut size = [0u32; 2];
            let mut multiplicity = [[0u32; 2]; N_CHAMBERS as usize];

            for hit_index in range {
                let hit = &batch.hits[hit_index];
                let Some(descriptor) = descriptors[hit_index] else {
                    continue;
                };
                for plane in Plane::ALL {
                    size[plane.index()] += plane.hits(hit);
                }
                if let Some(counts) = multiplicity.get_mut(usize::from(descriptor.chamber)) {
                    for plane in Plane::ALL {
                        counts[plane.index()] += plane.hits(hit);
                    }
                }
                if descriptor.chamber == self.board_chamber {
                    summary.board_fills += fill_boards(hit, &descriptor, &mut out.local_boards);
                }
            }

            for plane in Plane::ALL {
                out.frame_size[plane.index()].fill(f64::from(size[plane.index()]));
            }
            for (planes, counts) in out.multiplicity.iter_mut().zip(&multiplicity) {
                for plane in Plane::ALL {
                    planes[plane.index()].fill(f64::from(counts[plane.index()]));
                }
            }

            let total = size[0] + size[1];
            if let Some((previous_index, previous_total)) = previous {
                #[allow(clippy::cast_precision_loss)]
                let gap = frame
                    .interaction
                    .difference_in_bc(&batch.frames[previous_index].interaction)
                    as f64;
                out.time_diff
                    .fill(gap, f64::from(total.min(previous_total)), 1.0);
                summary.time_diff_samples += 1;
            }
            previous = Some((index, total));
            summary.frames += 1;
        }

        Ok(summary)
    }
}

/// Places every board reading a fired bending line on the board map.
fn fill_boards(hit: &HitRecord, descriptor: &GeometryDescriptor, map: &mut BinGrid) -> usize {
    let mut filled = 0;
    for line_pattern in (0..N_PATTERNS).filter(|&i| i != NON_BENDING_PATTERN) {
        if hit.bending_pattern(line_pattern) == 0 {
            continue;
        }
        for &(x, y) in &board_positions(descriptor, line_pattern) {
            map.fill(x, y, 1.0);
            filled += 1;
        }
    }
    filled
}

#[cfg(test)]
mod tests {
    #![allow(clippy::float_cmp)]
    use super::*;
    use midqc_core::{FrameRecord, InteractionRecord};
    use midqc_geometry::classify;

    fn classify_all(batch: &HitBatch) -> Vec<Option<GeometryDescriptor>> {
        batch
            .hits
            .iter()
            .map(|hit| classify(hit.de_id, hit.column_id).ok())
            .collect()
    }

    /// A hit with `n` fired bending strips on line 0 and none elsewhere.
    fn bending_hit(de_id: u8, column_id: u8, n: u32) -> HitRecord {
        let pattern = if n >= 16 { u16::MAX } else { (1u16 << n) - 1 };
        HitRecord::new(de_id, column_id, [pattern, 0, 0, 0, 0])
    }

    #[test]
    fn test_time_diff_single_sample() {
        let mut batch = HitBatch::default();
        batch.push_frame(
            InteractionRecord::new(100, 7),
            &[bending_hit(10, 3, 6), bending_hit(11, 3, 4)],
        );
        batch.push_frame(InteractionRecord::new(150, 7), &[bending_hit(12, 3, 4)]);

        let mut out = FrameHistograms::new().unwrap();
        let summary = FrameAggregator::default()
            .aggregate(&batch, &classify_all(&batch), &mut out)
            .unwrap();

        assert_eq!(summary.frames, 2);
        assert_eq!(summary.time_diff_samples, 1);
        assert_eq!(out.time_diff().sum(), 1.0);
        assert_eq!(out.time_diff().get(50, 4), Some(1.0));
    }

    #[test]
    fn test_single_frame_has_no_time_diff() {
        let mut batch = HitBatch::default();
        batch.push_frame(InteractionRecord::new(0, 1), &[bending_hit(10, 3, 10)]);

        let mut out = FrameHistograms::new().unwrap();
        FrameAggregator::default()
            .aggregate(&batch, &classify_all(&batch), &mut out)
            .unwrap();
        assert_eq!(out.time_diff().sum(), 0.0);
        assert_eq!(out.frame_size(Plane::Bending).get(10), Some(1.0));
        assert_eq!(out.frame_size(Plane::NonBending).get(0), Some(1.0));
    }

    #[test]
    fn test_multiplicity_filled_per_chamber_with_zeros() {
        let mut batch = HitBatch::default();
        // MT12 right (de 9..18) and MT22 left (de 63..72)
        batch.push_frame(
            InteractionRecord::new(0, 1),
            &[
                HitRecord::new(10, 1, [0b11, 0, 0, 0, 0b1]),
                HitRecord::new(65, 2, [0b1, 0b1, 0, 0, 0]),
            ],
        );

        let mut out = FrameHistograms::new().unwrap();
        FrameAggregator::default()
            .aggregate(&batch, &classify_all(&batch), &mut out)
            .unwrap();

        let mt12b = out.multiplicity(1, Plane::Bending).unwrap();
        assert_eq!(mt12b.get(2), Some(1.0));
        let mt12nb = out.multiplicity(1, Plane::NonBending).unwrap();
        assert_eq!(mt12nb.get(1), Some(1.0));
        let mt22b = out.multiplicity(3, Plane::Bending).unwrap();
        assert_eq!(mt22b.get(2), Some(1.0));
        // Empty chambers still record a zero per frame
        let mt11b = out.multiplicity(0, Plane::Bending).unwrap();
        assert_eq!(mt11b.get(0), Some(1.0));
        assert_eq!(mt11b.entries(), 1);
        assert!(out.multiplicity(4, Plane::Bending).is_none());
    }

    #[test]
    fn test_board_map_fan_out() {
        let mut batch = HitBatch::default();
        batch.push_frame(
            InteractionRecord::new(0, 1),
            &[
                // MT11 right, line 3, column 1: one board
                bending_hit(3, 1, 1),
                // MT11 left, line 0, column 2: four boards
                bending_hit(36, 2, 1),
                // MT12: not on the map
                bending_hit(9, 2, 1),
                // Non-bending only: not on the map
                HitRecord::new(1, 1, [0, 0, 0, 0, 0xFF]),
            ],
        );

        let mut out = FrameHistograms::new().unwrap();
        let summary = FrameAggregator::default()
            .aggregate(&batch, &classify_all(&batch), &mut out)
            .unwrap();

        assert_eq!(summary.board_fills, 5);
        assert_eq!(out.local_boards().sum(), 5.0);
        assert_eq!(out.local_boards().content_at(1.5, 3.01), Some(1.0));
        for y in [0.01, 0.26, 0.51, 0.76] {
            assert_eq!(out.local_boards().content_at(-2.5, y), Some(1.0));
        }
    }

    #[test]
    fn test_board_chamber_selection() {
        let mut batch = HitBatch::default();
        // MT12 right, line 1, column 3: two boards
        batch.push_frame(InteractionRecord::new(0, 1), &[bending_hit(10, 3, 1)]);

        let mut out = FrameHistograms::new().unwrap();
        let ignored = FrameAggregator::default()
            .aggregate(&batch, &classify_all(&batch), &mut out)
            .unwrap();
        assert_eq!(ignored.board_fills, 0);

        let summary = FrameAggregator::new(1)
            .aggregate(&batch, &classify_all(&batch), &mut out)
            .unwrap();
        assert_eq!(summary.board_fills, 2);
    }

    #[test]
    fn test_unknown_hits_left_out_of_every_histogram() {
        let mut batch = HitBatch::default();
        // de 4 is line 4, which has no column 0
        batch.push_frame(InteractionRecord::new(0, 1), &[bending_hit(4, 0, 3)]);
        batch.push_frame(
            InteractionRecord::new(20, 1),
            &[bending_hit(4, 0, 3), bending_hit(3, 1, 2)],
        );

        let descriptors = classify_all(&batch);
        assert_eq!(descriptors[0], None);
        assert_eq!(descriptors[1], None);

        let mut out = FrameHistograms::new().unwrap();
        let summary = FrameAggregator::default()
            .aggregate(&batch, &descriptors, &mut out)
            .unwrap();

        let sizes = out.frame_size(Plane::Bending);
        assert_eq!(sizes.get(0), Some(1.0));
        assert_eq!(sizes.get(2), Some(1.0));
        assert_eq!(sizes.get(3), Some(0.0));
        assert_eq!(sizes.get(5), Some(0.0));
        // min(0, 2) at a gap of 20
        assert_eq!(out.time_diff().get(20, 0), Some(1.0));
        assert_eq!(out.multiplicity(0, Plane::Bending).unwrap().get(0), Some(1.0));
        assert_eq!(out.multiplicity(0, Plane::Bending).unwrap().get(2), Some(1.0));
        assert_eq!(summary.board_fills, 1);
    }

    #[test]
    fn test_descriptor_count_must_match_hits() {
        let mut batch = HitBatch::default();
        // MT12 right, line 1, column 3
        batch.push_frame(InteractionRecord::new(0, 1), &[bending_hit(10, 3, 1)]);

        let mut out = FrameHistograms::new().unwrap();
        let before = out.clone();
        let aggregator = FrameAggregator::default();

        assert_eq!(
            aggregator.aggregate(&batch, &[], &mut out),
            Err(FrameError::DescriptorCountMismatch {
                descriptors: 0,
                n_hits: 1
            })
        );
        let mut extra = classify_all(&batch);
        extra.push(None);
        assert!(aggregator.aggregate(&batch, &extra, &mut out).is_err());
        assert_eq!(out, before);

        aggregator
            .aggregate(&batch, &classify_all(&batch), &mut out)
            .unwrap();
        assert_eq!(out.multiplicity(1, Plane::Bending).unwrap().get(1), Some(1.0));
    }

    #[test]
    fn test_malformed_frames_rejected_without_writes() {
        let hit = bending_hit(10, 3, 1);
        let mut out = FrameHistograms::new().unwrap();
        let before = out.clone();
        let aggregator = FrameAggregator::default();

        let out_of_bounds = HitBatch::new(
            vec![hit; 2],
            vec![
                FrameRecord::new(InteractionRecord::new(0, 1), 0, 1),
                FrameRecord::new(InteractionRecord::new(5, 1), 1, 2),
            ],
        );
        assert_eq!(
            aggregator.aggregate(&out_of_bounds, &[], &mut out),
            Err(FrameError::OutOfBounds {
                frame: 1,
                first_entry: 1,
                n_entries: 2,
                n_hits: 2
            })
        );

        let out_of_order = HitBatch::new(
            vec![hit; 2],
            vec![
                FrameRecord::new(InteractionRecord::new(5, 1), 0, 1),
                FrameRecord::new(InteractionRecord::new(4, 1), 1, 1),
            ],
        );
        assert_eq!(
            aggregator.aggregate(&out_of_order, &[], &mut out),
            Err(FrameError::OutOfOrder {
                frame: 1,
                previous: 0
            })
        );
        assert_eq!(out, before);
    }

    #[test]
    fn test_equal_time_references_allowed() {
        let hit = bending_hit(10, 3, 2);
        let mut batch = HitBatch::default();
        batch.push_frame(InteractionRecord::new(5, 1), &[hit]);
        batch.push_frame(InteractionRecord::new(5, 1), &[hit]);

        let mut out = FrameHistograms::new().unwrap();
        FrameAggregator::default()
            .aggregate(&batch, &classify_all(&batch), &mut out)
            .unwrap();
        assert_eq!(out.time_diff().get(0, 2), Some(1.0));
    }

    #[test]
    fn test_published_names() {
        let mut set = MonitorSet::new();
        FrameHistograms::new().unwrap().publish_into(&mut set);
        assert_eq!(set.len(), 2 + 1 + 8 + 1);
        assert!(set.histogram("ROFSizeNB").is_some());
        assert!(set.histogram("MultHitMT21NB").is_some());
        assert!(set.grid("ROFTimeDiff").is_some());
        assert!(set.grid("LocalBoardsMap").is_some());
    }
}

//! Per-cycle occupancy pipeline.
//!
//! Every batch adds a fixed exposure to the orbit maps, adds the fired
//! strips of every classified hit to the hit maps and hands the frames to
//! the [`FrameAggregator`]. Accumulation is cumulative until [`reset`].
//! [`end_of_cycle`] refreshes the occupancy ratios so that [`publish`]
//! exposes finalized contents.
//!
//! [`reset`]: AggregationPipeline::reset
//! [`end_of_cycle`]: AggregationPipeline::end_of_cycle
//! [`publish`]: AggregationPipeline::publish

use crate::config::PipelineConfig;
use crate::frame::{validate_frames, FrameAggregator, FrameHistograms, Plane};
use log::{debug, info, warn};
use midqc_core::record::ORBIT_LENGTH_MS;
use midqc_core::{Axis, GridError, HitBatch, MonitorSet, RatioAccumulator, Result};
use midqc_geometry::{
    GeometryDescriptor, GeometryLookup, MidGeometry, N_COLUMNS, N_DETECTION_ELEMENTS,
};

/// Scaling factor that turns hits per orbit into kHz.
pub const KHZ_SCALING: f64 = 1.0 / ORBIT_LENGTH_MS;

/// Published name of a hit map.
#[must_use]
pub fn hits_map_name(plane: Plane) -> String {
    format!("HitsMap{}", plane.suffix())
}

/// Published name of an orbit (exposure) map.
#[must_use]
pub fn orbits_map_name(plane: Plane) -> String {
    format!("OrbitsMap{}", plane.suffix())
}

/// Published name of an occupancy ratio.
#[must_use]
pub fn occupancy_map_name(plane: Plane) -> String {
    format!("OccupancyMap{}", plane.suffix())
}

/// Cumulative counters of a pipeline instance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineCounters {
    /// Batches processed.
    pub batches: u64,
    /// Frames processed.
    pub frames: u64,
    /// Hit records processed, classified or not.
    pub hits: u64,
    /// Hit records skipped for an unknown identifier.
    pub unknown_geometry: u64,
}

/// Result of processing one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// Hit records in the batch.
    pub hits: usize,
    /// Frames in the batch.
    pub frames: usize,
    /// Hits skipped for an unknown identifier.
    pub unknown_geometry: usize,
    /// Samples added to the time difference map.
    pub time_diff_samples: usize,
    /// Points added to the local board map.
    pub board_fills: usize,
}

/// Occupancy monitoring state of one worker.
#[derive(Debug, Clone)]
pub struct AggregationPipeline<G: GeometryLookup = MidGeometry> {
    config: PipelineConfig,
    geometry: G,
    aggregator: FrameAggregator,
    /// Hits over orbits, indexed by plane.
    occupancy: [RatioAccumulator; 2],
    frames: FrameHistograms,
    counters: PipelineCounters,
}

impl AggregationPipeline<MidGeometry> {
    /// Creates a pipeline over the built-in detector layout.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `config` is out of range.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        Self::with_geometry(config, MidGeometry::new())
    }
}

impl<G: GeometryLookup> AggregationPipeline<G> {
    /// Creates a pipeline with a custom geometry lookup.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `config` is out of range.
    pub fn with_geometry(config: PipelineConfig, geometry: G) -> Result<Self> {
        config.validate()?;

        let scaling = if config.scale_to_khz { KHZ_SCALING } else { 1.0 };
        let occupancy = occupancy_accumulator(scaling)?;

        Ok(Self {
            config,
            geometry,
            aggregator: FrameAggregator::new(config.board_chamber),
            occupancy: [occupancy.clone(), occupancy],
            frames: FrameHistograms::new()?,
            counters: PipelineCounters::default(),
        })
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Cumulative counters.
    #[must_use]
    pub fn counters(&self) -> PipelineCounters {
        self.counters
    }

    /// Occupancy accumulator of one plane: hit map over orbit map.
    #[must_use]
    pub fn occupancy(&self, plane: Plane) -> &RatioAccumulator {
        &self.occupancy[plane.index()]
    }

    /// Per-frame histograms.
    #[must_use]
    pub fn frame_histograms(&self) -> &FrameHistograms {
        &self.frames
    }

    /// Adds one batch to the accumulated state.
    ///
    /// Frames are validated before anything is written; a malformed batch
    /// leaves the pipeline untouched. Hits with an unknown identifier are
    /// skipped and counted.
    ///
    /// # Errors
    ///
    /// Returns a frame error if a frame lies outside the batch or frames go
    /// back in time.
    pub fn process_batch(&mut self, batch: &HitBatch) -> Result<BatchSummary> {
        validate_frames(batch)?;

        self.add_exposure();

        let descriptors = self.classify_hits(batch);
        let mut summary = BatchSummary {
            hits: batch.hits.len(),
            frames: batch.frames.len(),
            ..BatchSummary::default()
        };

        for (hit, descriptor) in batch.hits.iter().zip(&descriptors) {
            if descriptor.is_none() {
                summary.unknown_geometry += 1;
                continue;
            }
            let x = f64::from(hit.de_id);
            let y = f64::from(hit.column_id);
            for plane in Plane::ALL {
                self.occupancy[plane.index()].fill_numerator(x, y, f64::from(plane.hits(hit)));
            }
        }

        let frames = self
            .aggregator
            .aggregate(batch, &descriptors, &mut self.frames)?;
        summary.time_diff_samples = frames.time_diff_samples;
        summary.board_fills = frames.board_fills;

        self.counters.batches += 1;
        self.counters.frames += summary.frames as u64;
        self.counters.hits += summary.hits as u64;
        self.counters.unknown_geometry += summary.unknown_geometry as u64;

        debug!(
            "batch {}: {} hits in {} frames, {} unknown, {} board fills",
            self.counters.batches,
            summary.hits,
            summary.frames,
            summary.unknown_geometry,
            summary.board_fills
        );

        Ok(summary)
    }

    /// Recomputes both occupancy ratios from the accumulated maps.
    pub fn end_of_cycle(&mut self) {
        for accumulator in &mut self.occupancy {
            accumulator.update();
        }
        info!(
            "end of cycle: {} batches, {} frames, {} hits, {} unknown identifiers",
            self.counters.batches,
            self.counters.frames,
            self.counters.hits,
            self.counters.unknown_geometry
        );
    }

    /// Snapshot of every published object under its detector name.
    ///
    /// Call [`end_of_cycle`](Self::end_of_cycle) first for current ratios.
    #[must_use]
    pub fn publish(&self) -> MonitorSet {
        let mut set = MonitorSet::new();
        for plane in Plane::ALL {
            let occupancy = &self.occupancy[plane.index()];
            set.insert(hits_map_name(plane), occupancy.numerator().clone());
            set.insert(orbits_map_name(plane), occupancy.denominator().clone());
            set.insert(occupancy_map_name(plane), occupancy.clone());
        }
        self.frames.publish_into(&mut set);
        set
    }

    /// Clears every accumulated object and counter.
    pub fn reset(&mut self) {
        info!("resetting occupancy histograms");
        for accumulator in &mut self.occupancy {
            accumulator.reset();
        }
        self.frames.reset();
        self.counters = PipelineCounters::default();
    }

    fn add_exposure(&mut self) {
        let orbits = self.config.orbits_per_batch;
        for de_id in 0..N_DETECTION_ELEMENTS {
            for column_id in 0..N_COLUMNS {
                let (x, y) = (f64::from(de_id), f64::from(column_id));
                for accumulator in &mut self.occupancy {
                    accumulator.fill_denominator(x, y, orbits);
                }
            }
        }
    }

    fn classify_hits(&self, batch: &HitBatch) -> Vec<Option<GeometryDescriptor>> {
        batch
            .hits
            .iter()
            .map(|hit| match self.geometry.classify(hit.de_id, hit.column_id) {
                Ok(descriptor) => Some(descriptor),
                Err(err) => {
                    warn!("skipping hit: {err}");
                    None
                }
            })
            .collect()
    }
}

/// Empty 72 x 7 occupancy accumulator over `[0, 72) x [0, 7)`.
fn occupancy_accumulator(scaling: f64) -> std::result::Result<RatioAccumulator, GridError> {
    let x = Axis::new(
        usize::from(N_DETECTION_ELEMENTS),
        0.0,
        f64::from(N_DETECTION_ELEMENTS),
    )?;
    let y = Axis::new(usize::from(N_COLUMNS), 0.0, f64::from(N_COLUMNS))?;
    Ok(RatioAccumulator::new(x, y, scaling))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::float_cmp)]
    use super::*;
    use approx::assert_relative_eq;
    use midqc_core::{Error, FrameError, FrameRecord, GeometryError, HitRecord, InteractionRecord};

    fn per_orbit() -> PipelineConfig {
        PipelineConfig::default().with_scale_to_khz(false)
    }

    #[test]
    fn test_exposure_applied_uniformly() {
        let mut pipeline = AggregationPipeline::new(per_orbit()).unwrap();
        pipeline.process_batch(&HitBatch::default()).unwrap();
        pipeline.process_batch(&HitBatch::default()).unwrap();

        for plane in Plane::ALL {
            let orbits = pipeline.occupancy(plane).denominator();
            assert!(orbits.values().iter().all(|&v| v == 256.0));
        }
        assert_eq!(pipeline.counters().batches, 2);
    }

    #[test]
    fn test_hit_maps_and_occupancy() {
        let mut pipeline = AggregationPipeline::new(per_orbit()).unwrap();
        let mut batch = HitBatch::default();
        batch.push_frame(
            InteractionRecord::new(0, 1),
            &[HitRecord::new(20, 5, [0b111, 0b1, 0, 0, 0b11])],
        );
        pipeline.process_batch(&batch).unwrap();
        pipeline.end_of_cycle();

        let bending = pipeline.occupancy(Plane::Bending);
        assert_eq!(bending.numerator().get(20, 5), Some(4.0));
        assert_relative_eq!(bending.ratio().get(20, 5).unwrap(), 4.0 / 128.0);
        let non_bending = pipeline.occupancy(Plane::NonBending);
        assert_eq!(non_bending.numerator().get(20, 5), Some(2.0));
        assert_eq!(non_bending.ratio().get(0, 0), Some(0.0));
    }

    #[test]
    fn test_khz_scaling() {
        let mut pipeline = AggregationPipeline::new(PipelineConfig::default()).unwrap();
        let mut batch = HitBatch::default();
        batch.push_frame(
            InteractionRecord::new(0, 1),
            &[HitRecord::new(0, 0, [0xFFFF; 5])],
        );
        pipeline.process_batch(&batch).unwrap();
        pipeline.end_of_cycle();

        let rate = pipeline.occupancy(Plane::NonBending).ratio().get(0, 0).unwrap();
        assert_relative_eq!(rate, 16.0 / 128.0 / ORBIT_LENGTH_MS, max_relative = 1e-12);
    }

    #[test]
    fn test_unknown_geometry_skipped_and_counted() {
        let mut pipeline = AggregationPipeline::new(per_orbit()).unwrap();
        let mut batch = HitBatch::default();
        batch.push_frame(
            InteractionRecord::new(0, 1),
            &[
                HitRecord::new(4, 0, [1, 0, 0, 0, 1]),
                HitRecord::new(80, 1, [1, 0, 0, 0, 1]),
                HitRecord::new(5, 1, [1, 0, 0, 0, 1]),
            ],
        );
        let summary = pipeline.process_batch(&batch).unwrap();

        assert_eq!(summary.unknown_geometry, 2);
        assert_eq!(pipeline.counters().unknown_geometry, 2);
        assert_eq!(pipeline.counters().hits, 3);
        let hits = pipeline.occupancy(Plane::Bending).numerator();
        assert_eq!(hits.sum(), 1.0);
        assert_eq!(hits.get(4, 0), Some(0.0));
        let sizes = pipeline.frame_histograms().frame_size(Plane::Bending);
        assert_eq!(sizes.get(1), Some(1.0));
        assert_eq!(sizes.entries(), 1);
    }

    #[test]
    fn test_malformed_batch_leaves_state_untouched() {
        let mut pipeline = AggregationPipeline::new(per_orbit()).unwrap();
        let batch = HitBatch::new(
            vec![HitRecord::new(1, 1, [1, 0, 0, 0, 0])],
            vec![FrameRecord::new(InteractionRecord::new(0, 1), 0, 2)],
        );

        let err = pipeline.process_batch(&batch).unwrap_err();
        assert!(matches!(err, Error::Frame(FrameError::OutOfBounds { .. })));
        assert_eq!(pipeline.counters(), PipelineCounters::default());
        assert_eq!(pipeline.occupancy(Plane::Bending).denominator().sum(), 0.0);
    }

    #[test]
    fn test_publish_names() {
        let pipeline = AggregationPipeline::new(PipelineConfig::default()).unwrap();
        let set = pipeline.publish();

        for name in ["HitsMapB", "HitsMapNB", "OrbitsMapB", "OrbitsMapNB"] {
            assert!(set.grid(name).is_some(), "missing {name}");
        }
        assert!(set.ratio("OccupancyMapB").is_some());
        assert!(set.ratio("OccupancyMapNB").is_some());
        assert!(set.histogram("ROFSizeB").is_some());
        assert!(set.histogram("MultHitMT11B").is_some());
        assert!(set.grid("LocalBoardsMap").is_some());
        assert_eq!(set.len(), 6 + 12);
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut pipeline = AggregationPipeline::new(per_orbit()).unwrap();
        let mut batch = HitBatch::default();
        batch.push_frame(
            InteractionRecord::new(0, 1),
            &[HitRecord::new(2, 3, [1, 0, 0, 0, 0])],
        );
        pipeline.process_batch(&batch).unwrap();
        pipeline.reset();

        assert_eq!(pipeline.counters(), PipelineCounters::default());
        assert_eq!(pipeline.occupancy(Plane::Bending).numerator().sum(), 0.0);
        assert_eq!(
            pipeline.frame_histograms().frame_size(Plane::Bending).entries(),
            0
        );
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = PipelineConfig::default().with_board_chamber(7);
        assert!(AggregationPipeline::new(config).is_err());
    }

    /// Layout with a single valid cell.
    struct SingleCell;

    impl GeometryLookup for SingleCell {
        fn classify(
            &self,
            de_id: u8,
            column_id: u8,
        ) -> std::result::Result<GeometryDescriptor, GeometryError> {
            if (de_id, column_id) == (0, 0) {
                Ok(GeometryDescriptor {
                    chamber: 0,
                    is_right_side: true,
                    line: 0,
                    column: 0,
                    board_count: 1,
                })
            } else {
                Err(GeometryError::UnknownIdentifier { de_id, column_id })
            }
        }
    }

    #[test]
    fn test_custom_geometry() {
        let mut pipeline = AggregationPipeline::with_geometry(per_orbit(), SingleCell).unwrap();
        let mut batch = HitBatch::default();
        batch.push_frame(
            InteractionRecord::new(0, 1),
            &[
                HitRecord::new(0, 0, [1, 0, 0, 0, 0]),
                HitRecord::new(0, 1, [1, 0, 0, 0, 0]),
            ],
        );
        let summary = pipeline.process_batch(&batch).unwrap();
        assert_eq!(summary.unknown_geometry, 1);
        assert_eq!(summary.board_fills, 1);
    }
}

//! midqc-algorithms: Occupancy aggregation for muon identifier digits.
//!
//! This crate provides:
//! - **`FrameAggregator`** - per-frame sizes, multiplicities, timing and
//!   local board occupancy
//! - **`AggregationPipeline`** - per-worker accumulation of hit and
//!   exposure maps into mergeable occupancy ratios
//! - **`merge_all`** - parallel reduction of partial results
//!
#![warn(missing_docs)]

pub mod config;
pub mod frame;
mod merge;
pub mod pipeline;

pub use config::{ConfigLoadError, PipelineConfig, DEFAULT_ORBITS_PER_BATCH};
pub use frame::{
    frame_size_name, multiplicity_name, validate_frames, FrameAggregator, FrameHistograms,
    FrameSummary, Plane,
};
pub use merge::{merge_all, merge_published};
pub use pipeline::{
    hits_map_name, occupancy_map_name, orbits_map_name, AggregationPipeline, BatchSummary,
    PipelineCounters, KHZ_SCALING,
};

// Re-export the merge capability
pub use midqc_core::Mergeable;

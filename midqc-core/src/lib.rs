//! midqc-core: Core types for muon identifier occupancy monitoring.
//!
//! This crate provides the decoded record types, fixed-binning grids and
//! histograms, and the mergeable ratio accumulator that partial results
//! from independent workers are combined with.
//!

pub mod axis;
pub mod error;
pub mod grid;
pub mod histogram;
pub mod object;
pub mod ratio;
pub mod record;

pub use axis::{Axis, GridShape};
pub use error::{ConfigError, Error, FrameError, GeometryError, GridError, ObjectError, Result};
pub use grid::BinGrid;
pub use histogram::Histogram1D;
pub use object::{Mergeable, MonitorObject, MonitorSet};
pub use ratio::RatioAccumulator;
pub use record::{FrameRecord, HitBatch, HitRecord, InteractionRecord};

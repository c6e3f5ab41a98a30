//! Error types for midqc-core.

use crate::axis::{Axis, GridShape};
use thiserror::Error;

/// Result type alias for midqc operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for midqc operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Grid construction or combination error.
    #[error("grid error: {0}")]
    Grid(#[from] GridError),

    /// Detector geometry lookup error.
    #[error("geometry error: {0}")]
    Geometry(#[from] GeometryError),

    /// Malformed frame in a hit batch.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// Monitor object combination error.
    #[error("monitor object error: {0}")]
    Object(#[from] ObjectError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Errors raised by axes, grids and histograms.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GridError {
    /// Axis with zero bins or an empty / non-finite range.
    #[error("invalid axis: {n_bins} bins over [{min}, {max})")]
    InvalidAxis { n_bins: usize, min: f64, max: f64 },

    /// Two grids with different binning were combined.
    #[error("shape mismatch: {left} vs {right}")]
    ShapeMismatch { left: GridShape, right: GridShape },

    /// Stored bin array does not match the declared binning.
    #[error("bin storage {nx}x{ny} does not match {shape}")]
    StorageMismatch { shape: GridShape, nx: usize, ny: usize },

    /// Stored 1D bin array does not match the declared axis.
    #[error("expected {expected} bins, found {found}")]
    BinCountMismatch { expected: usize, found: usize },

    /// Two histograms with different binning were combined.
    #[error("axis mismatch: {left} vs {right}")]
    AxisMismatch { left: Axis, right: Axis },

    /// Two ratios with different unit conversion were combined.
    #[error("scaling factor mismatch: {left} vs {right}")]
    ScalingMismatch { left: f64, right: f64 },
}

/// Errors raised by the detector geometry lookup.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometryError {
    /// Identifier pair outside the fixed detector topology.
    #[error("unknown detector identifier: DE {de_id}, column {column_id}")]
    UnknownIdentifier { de_id: u8, column_id: u8 },
}

/// Caller contract violations in a frame sequence.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    /// Frame range reaches past the end of the hit records.
    #[error("frame {frame} covers [{first_entry}, {first_entry}+{n_entries}) but the batch has {n_hits} hits")]
    OutOfBounds {
        frame: usize,
        first_entry: usize,
        n_entries: usize,
        n_hits: usize,
    },

    /// Frame time reference earlier than its predecessor.
    #[error("frame {frame} is earlier than frame {previous}")]
    OutOfOrder { frame: usize, previous: usize },

    /// Classification list does not have one entry per hit record.
    #[error("{descriptors} hit classifications for {n_hits} hits")]
    DescriptorCountMismatch { descriptors: usize, n_hits: usize },
}

/// Errors raised when combining monitor objects.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ObjectError {
    /// Two objects of different kinds share a name.
    #[error("cannot merge {right} into {left} for object '{name}'")]
    IncompatibleKind {
        name: String,
        left: &'static str,
        right: &'static str,
    },
}

/// Invalid configuration values.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Exposure increment must be finite and strictly positive.
    #[error("orbits per batch must be finite and positive, got {0}")]
    InvalidExposure(f64),

    /// Board map chamber outside `[0, 4)`.
    #[error("board map chamber must be below 4, got {0}")]
    InvalidBoardChamber(u8),
}

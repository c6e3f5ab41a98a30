//! One-dimensional histograms for per-frame distributions.

use crate::axis::Axis;
use crate::error::GridError;
use ndarray::Array1;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A fixed-binning 1D histogram.
///
/// Out-of-range values are dropped, same as [`crate::BinGrid`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "HistogramParts"))]
pub struct Histogram1D {
    axis: Axis,
    bins: Array1<f64>,
    entries: u64,
}

#[cfg(feature = "serde")]
#[derive(Deserialize)]
struct HistogramParts {
    axis: Axis,
    bins: Array1<f64>,
    entries: u64,
}

#[cfg(feature = "serde")]
impl TryFrom<HistogramParts> for Histogram1D {
    type Error = GridError;

    fn try_from(parts: HistogramParts) -> Result<Self, GridError> {
        if parts.bins.len() != parts.axis.n_bins() {
            return Err(GridError::BinCountMismatch {
                expected: parts.axis.n_bins(),
                found: parts.bins.len(),
            });
        }
        Ok(Self {
            axis: parts.axis,
            bins: parts.bins,
            entries: parts.entries,
        })
    }
}

impl Histogram1D {
    /// Creates an empty histogram over `axis`.
    #[must_use]
    pub fn new(axis: Axis) -> Self {
        Self {
            axis,
            bins: Array1::zeros(axis.n_bins()),
            entries: 0,
        }
    }

    /// Creates an empty histogram from raw axis parameters.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::InvalidAxis`] if the axis is invalid.
    pub fn with_bins(n_bins: usize, min: f64, max: f64) -> Result<Self, GridError> {
        Ok(Self::new(Axis::new(n_bins, min, max)?))
    }

    /// Binning of this histogram.
    #[must_use]
    #[inline]
    pub fn axis(&self) -> &Axis {
        &self.axis
    }

    /// Read-only view of the bin contents.
    #[must_use]
    #[inline]
    pub fn values(&self) -> &Array1<f64> {
        &self.bins
    }

    /// Number of in-range fills since the last reset.
    #[must_use]
    #[inline]
    pub fn entries(&self) -> u64 {
        self.entries
    }

    /// Adds `weight` to the bin containing `value`.
    pub fn fill_weighted(&mut self, value: f64, weight: f64) {
        if let Some(bin) = self.axis.find_bin(value) {
            self.bins[bin] += weight;
            self.entries += 1;
        }
    }

    /// Adds one count to the bin containing `value`.
    #[inline]
    pub fn fill(&mut self, value: f64) {
        self.fill_weighted(value, 1.0);
    }

    /// Content of bin `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<f64> {
        self.bins.get(index).copied()
    }

    /// Sum of all bins.
    #[must_use]
    pub fn sum(&self) -> f64 {
        self.bins.sum()
    }

    /// Clears contents and the entry counter.
    pub fn reset(&mut self) {
        self.bins.fill(0.0);
        self.entries = 0;
    }

    /// Adds `other` binwise into this histogram.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::AxisMismatch`] when the binnings differ; `self`
    /// is left unchanged.
    pub fn add_from(&mut self, other: &Histogram1D) -> Result<(), GridError> {
        if self.axis != other.axis {
            return Err(GridError::AxisMismatch {
                left: self.axis,
                right: other.axis,
            });
        }
        self.bins += &other.bins;
        self.entries += other.entries;
        Ok(())
    }
}

//! Fixed-width binning axes.

use crate::error::GridError;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A fixed-width binning of the half-open range `[min, max)`.
///
/// Axes are immutable once built: every histogram and grid that owns one
/// keeps the same binning for its whole lifetime.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "AxisParts"))]
pub struct Axis {
    n_bins: usize,
    min: f64,
    max: f64,
}

#[cfg(feature = "serde")]
#[derive(Deserialize)]
struct AxisParts {
    n_bins: usize,
    min: f64,
    max: f64,
}

#[cfg(feature = "serde")]
impl TryFrom<AxisParts> for Axis {
    type Error = GridError;

    fn try_from(parts: AxisParts) -> Result<Self, GridError> {
        Self::new(parts.n_bins, parts.min, parts.max)
    }
}

impl Axis {
    /// Creates an axis with `n_bins` equal-width bins over `[min, max)`.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::InvalidAxis`] if `n_bins` is zero, either bound
    /// is not finite, or `min >= max`.
    pub fn new(n_bins: usize, min: f64, max: f64) -> Result<Self, GridError> {
        if n_bins == 0 || !min.is_finite() || !max.is_finite() || min >= max {
            return Err(GridError::InvalidAxis { n_bins, min, max });
        }
        Ok(Self { n_bins, min, max })
    }

    /// Number of bins.
    #[must_use]
    #[inline]
    pub fn n_bins(&self) -> usize {
        self.n_bins
    }

    /// Lower edge of the first bin.
    #[must_use]
    #[inline]
    pub fn min(&self) -> f64 {
        self.min
    }

    /// Upper edge of the last bin.
    #[must_use]
    #[inline]
    pub fn max(&self) -> f64 {
        self.max
    }

    /// Width of a single bin.
    #[must_use]
    #[inline]
    #[allow(clippy::cast_precision_loss)]
    pub fn bin_width(&self) -> f64 {
        (self.max - self.min) / self.n_bins as f64
    }

    /// Index of the bin containing `value`.
    ///
    /// Returns `None` for underflow, overflow and NaN.
    #[must_use]
    #[inline]
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn find_bin(&self, value: f64) -> Option<usize> {
        // NaN fails both comparisons
        if !(value >= self.min && value < self.max) {
            return None;
        }
        let bin = (self.n_bins as f64 * (value - self.min) / (self.max - self.min)) as usize;
        // Rounding right below `max` can land on `n_bins`.
        Some(bin.min(self.n_bins - 1))
    }

    /// Lower edge of bin `index`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn bin_low_edge(&self, index: usize) -> f64 {
        self.min + self.bin_width() * index as f64
    }

    /// Center of bin `index`.
    #[must_use]
    pub fn bin_center(&self, index: usize) -> f64 {
        self.bin_low_edge(index) + 0.5 * self.bin_width()
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.n_bins, self.min, self.max)
    }
}

/// Binning of a 2D grid, compared exactly when grids are combined.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GridShape {
    /// Horizontal axis.
    pub x: Axis,
    /// Vertical axis.
    pub y: Axis,
}

impl GridShape {
    /// Fails with [`GridError::ShapeMismatch`] unless `other` has the same binning.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::ShapeMismatch`] when the shapes differ.
    pub fn ensure_same(&self, other: &Self) -> Result<(), GridError> {
        if self == other {
            Ok(())
        } else {
            Err(GridError::ShapeMismatch {
                left: *self,
                right: *other,
            })
        }
    }
}

impl fmt::Display for GridShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "x{} y{}", self.x, self.y)
    }
}

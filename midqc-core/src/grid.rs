//! Dense 2D binned counters.
//!
//! A [`BinGrid`] is the storage behind every map the pipeline publishes.
//! Its binning is fixed at construction, and combination operations
//! ([`BinGrid::add_from`], [`BinGrid::divide_into`]) refuse grids with a
//! different [`GridShape`] instead of silently rebinning.

use crate::axis::{Axis, GridShape};
use crate::error::GridError;
use ndarray::{Array2, Zip};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A fixed-shape 2D array of weights indexed by `[x_bin, y_bin]`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "GridParts"))]
pub struct BinGrid {
    shape: GridShape,
    bins: Array2<f64>,
}

#[cfg(feature = "serde")]
#[derive(Deserialize)]
struct GridParts {
    shape: GridShape,
    bins: Array2<f64>,
}

#[cfg(feature = "serde")]
impl TryFrom<GridParts> for BinGrid {
    type Error = GridError;

    fn try_from(parts: GridParts) -> Result<Self, GridError> {
        let expected = (parts.shape.x.n_bins(), parts.shape.y.n_bins());
        if parts.bins.dim() != expected {
            let (nx, ny) = parts.bins.dim();
            return Err(GridError::StorageMismatch {
                shape: parts.shape,
                nx,
                ny,
            });
        }
        Ok(Self {
            shape: parts.shape,
            bins: parts.bins,
        })
    }
}

impl BinGrid {
    /// Creates an empty grid over the given axes.
    #[must_use]
    pub fn new(x: Axis, y: Axis) -> Self {
        Self {
            shape: GridShape { x, y },
            bins: Array2::zeros((x.n_bins(), y.n_bins())),
        }
    }

    /// Creates an empty grid from raw axis parameters.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::InvalidAxis`] if either axis is invalid.
    pub fn with_bins(
        nx: usize,
        x_min: f64,
        x_max: f64,
        ny: usize,
        y_min: f64,
        y_max: f64,
    ) -> Result<Self, GridError> {
        Ok(Self::new(
            Axis::new(nx, x_min, x_max)?,
            Axis::new(ny, y_min, y_max)?,
        ))
    }

    /// Creates an empty grid with the given shape.
    #[must_use]
    pub fn from_shape(shape: GridShape) -> Self {
        Self::new(shape.x, shape.y)
    }

    /// Binning of this grid.
    #[must_use]
    #[inline]
    pub fn shape(&self) -> GridShape {
        self.shape
    }

    /// Horizontal axis.
    #[must_use]
    #[inline]
    pub fn x_axis(&self) -> &Axis {
        &self.shape.x
    }

    /// Vertical axis.
    #[must_use]
    #[inline]
    pub fn y_axis(&self) -> &Axis {
        &self.shape.y
    }

    /// Read-only view of the bin contents.
    #[must_use]
    #[inline]
    pub fn values(&self) -> &Array2<f64> {
        &self.bins
    }

    /// Sets every bin to zero.
    pub fn reset(&mut self) {
        self.bins.fill(0.0);
    }

    /// Bin indices enclosing `(x, y)`, or `None` outside the grid.
    #[must_use]
    #[inline]
    pub fn find_bin(&self, x: f64, y: f64) -> Option<(usize, usize)> {
        Some((self.shape.x.find_bin(x)?, self.shape.y.find_bin(y)?))
    }

    /// Adds `weight` to the bin enclosing `(x, y)`.
    ///
    /// Coordinates outside either axis range are dropped.
    #[inline]
    pub fn fill(&mut self, x: f64, y: f64, weight: f64) {
        if let Some(index) = self.find_bin(x, y) {
            self.bins[index] += weight;
        }
    }

    /// Content of bin `(ix, iy)`, or `None` if the indices are out of range.
    #[must_use]
    #[inline]
    pub fn get(&self, ix: usize, iy: usize) -> Option<f64> {
        self.bins.get((ix, iy)).copied()
    }

    /// Content of the bin enclosing `(x, y)`.
    #[must_use]
    pub fn content_at(&self, x: f64, y: f64) -> Option<f64> {
        self.find_bin(x, y).map(|index| self.bins[index])
    }

    /// Sum of all bins.
    #[must_use]
    pub fn sum(&self) -> f64 {
        self.bins.sum()
    }

    /// Multiplies every bin by `factor`.
    pub fn scale(&mut self, factor: f64) {
        self.bins *= factor;
    }

    /// Adds `other` elementwise into this grid.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::ShapeMismatch`] if the binnings differ; `self` is
    /// left unchanged.
    pub fn add_from(&mut self, other: &BinGrid) -> Result<(), GridError> {
        self.shape.ensure_same(&other.shape)?;
        self.bins += &other.bins;
        Ok(())
    }

    /// Overwrites this grid with `numerator / denominator`.
    ///
    /// Bins whose denominator is zero are set to exactly `0.0`. Any other
    /// denominator is divided as is, so the quotient stays finite only while
    /// it fits in an `f64`; hit counts over orbit counts always do.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::ShapeMismatch`] if any of the three grids differ
    /// in binning; `self` is left unchanged.
    pub fn divide_into(
        &mut self,
        numerator: &BinGrid,
        denominator: &BinGrid,
    ) -> Result<(), GridError> {
        self.shape.ensure_same(&numerator.shape)?;
        self.shape.ensure_same(&denominator.shape)?;
        self.divide_same_shape(numerator, denominator);
        Ok(())
    }

    /// Division kernel for callers that own all three grids and built them
    /// from one shape.
    #[allow(clippy::float_cmp)]
    pub(crate) fn divide_same_shape(&mut self, numerator: &BinGrid, denominator: &BinGrid) {
        debug_assert_eq!(self.shape, numerator.shape);
        debug_assert_eq!(self.shape, denominator.shape);
        Zip::from(&mut self.bins)
            .and(&numerator.bins)
            .and(&denominator.bins)
            .for_each(|out, &num, &den| {
                *out = if den == 0.0 { 0.0 } else { num / den };
            });
    }

    /// Returns `numerator / denominator` as a new grid.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::ShapeMismatch`] if the binnings differ.
    pub fn divide(numerator: &BinGrid, denominator: &BinGrid) -> Result<BinGrid, GridError> {
        let mut out = Self::from_shape(numerator.shape);
        out.divide_into(numerator, denominator)?;
        Ok(out)
    }
}

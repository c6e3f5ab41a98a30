//! Mergeable ratio of two independently accumulated grids.
//!
//! Occupancy is hits over exposure. Averaging two partial occupancy maps
//! would weight every worker equally regardless of how long it observed, so
//! a [`RatioAccumulator`] keeps the numerator and denominator separately,
//! merges those by summation and only derives the ratio on [`update`].
//!
//! [`update`]: RatioAccumulator::update

use crate::axis::{Axis, GridShape};
use crate::error::{GridError, Result};
use crate::grid::BinGrid;
use crate::object::Mergeable;
use crate::record::ORBIT_LENGTH_MS;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Numerator and denominator grids plus a cached, rescaled ratio view.
///
/// Deserialization goes through [`RatioAccumulator::from_parts`], so the
/// ratio view of a loaded accumulator is always recomputed.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "RatioParts"))]
pub struct RatioAccumulator {
    numerator: BinGrid,
    denominator: BinGrid,
    ratio: BinGrid,
    scaling_factor: f64,
}

impl RatioAccumulator {
    /// Creates an empty accumulator over the given axes.
    ///
    /// Any `scaling_factor` other than exactly `1.0` converts the ratio from
    /// a per-orbit count to a rate in kHz on [`update`](Self::update).
    #[must_use]
    pub fn new(x: Axis, y: Axis, scaling_factor: f64) -> Self {
        Self {
            numerator: BinGrid::new(x, y),
            denominator: BinGrid::new(x, y),
            ratio: BinGrid::new(x, y),
            scaling_factor,
        }
    }

    /// Builds an accumulator that takes ownership of existing grids.
    ///
    /// The ratio view is computed immediately.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::ShapeMismatch`] if the grids differ in binning.
    pub fn from_parts(
        numerator: BinGrid,
        denominator: BinGrid,
        scaling_factor: f64,
    ) -> std::result::Result<Self, GridError> {
        numerator.shape().ensure_same(&denominator.shape())?;
        let ratio = BinGrid::from_shape(numerator.shape());
        let mut accumulator = Self {
            numerator,
            denominator,
            ratio,
            scaling_factor,
        };
        accumulator.update();
        Ok(accumulator)
    }

    /// Binning shared by all three grids.
    #[must_use]
    #[inline]
    pub fn shape(&self) -> GridShape {
        self.numerator.shape()
    }

    /// Unit conversion selector fixed at construction.
    #[must_use]
    #[inline]
    pub fn scaling_factor(&self) -> f64 {
        self.scaling_factor
    }

    /// Accumulated numerator.
    #[must_use]
    #[inline]
    pub fn numerator(&self) -> &BinGrid {
        &self.numerator
    }

    /// Accumulated denominator.
    #[must_use]
    #[inline]
    pub fn denominator(&self) -> &BinGrid {
        &self.denominator
    }

    /// Ratio view as of the last [`update`](Self::update).
    #[must_use]
    #[inline]
    pub fn ratio(&self) -> &BinGrid {
        &self.ratio
    }

    /// Adds `weight` to the numerator bin enclosing `(x, y)`.
    #[inline]
    pub fn fill_numerator(&mut self, x: f64, y: f64, weight: f64) {
        self.numerator.fill(x, y, weight);
    }

    /// Adds `weight` to the denominator bin enclosing `(x, y)`.
    #[inline]
    pub fn fill_denominator(&mut self, x: f64, y: f64, weight: f64) {
        self.denominator.fill(x, y, weight);
    }

    /// Checks that `other` could be merged into `self` without writing.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::ShapeMismatch`] if the binning differs, or
    /// [`GridError::ScalingMismatch`] if the scaling factors differ.
    #[allow(clippy::float_cmp)]
    pub fn ensure_compatible(&self, other: &Self) -> std::result::Result<(), GridError> {
        self.numerator.shape().ensure_same(&other.numerator.shape())?;
        self.denominator
            .shape()
            .ensure_same(&other.denominator.shape())?;
        if self.scaling_factor != other.scaling_factor {
            return Err(GridError::ScalingMismatch {
                left: self.scaling_factor,
                right: other.scaling_factor,
            });
        }
        Ok(())
    }

    /// Recomputes the ratio view from the current numerator and denominator.
    #[allow(clippy::float_cmp)]
    pub fn update(&mut self) {
        // All three grids were built with one shape and never rebinned.
        self.ratio.divide_same_shape(&self.numerator, &self.denominator);
        if self.scaling_factor != 1.0 {
            self.ratio.scale(1.0 / ORBIT_LENGTH_MS);
        }
    }

    /// Clears numerator, denominator and ratio.
    pub fn reset(&mut self) {
        self.numerator.reset();
        self.denominator.reset();
        self.ratio.reset();
    }
}

#[cfg(feature = "serde")]
#[derive(Deserialize)]
struct RatioParts {
    numerator: BinGrid,
    denominator: BinGrid,
    scaling_factor: f64,
}

#[cfg(feature = "serde")]
impl TryFrom<RatioParts> for RatioAccumulator {
    type Error = GridError;

    fn try_from(parts: RatioParts) -> std::result::Result<Self, GridError> {
        Self::from_parts(parts.numerator, parts.denominator, parts.scaling_factor)
    }
}

impl Mergeable for RatioAccumulator {
    /// Sums numerator and denominator of `other` into `self`, then
    /// refreshes the ratio view.
    ///
    /// Shapes and scaling factors are checked before anything is written.
    fn merge(&mut self, other: &Self) -> Result<()> {
        self.ensure_compatible(other)?;
        self.numerator.add_from(&other.numerator)?;
        self.denominator.add_from(&other.denominator)?;
        self.update();
        Ok(())
    }
}

//! Merge capability and the closed set of publishable objects.

use crate::error::{GridError, ObjectError, Result};
use crate::grid::BinGrid;
use crate::histogram::Histogram1D;
use crate::ratio::RatioAccumulator;
use std::collections::BTreeMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Objects that can absorb a partial result produced elsewhere.
///
/// Implementations must be associative and commutative: merging any
/// partition of the contributions, in any order or grouping, yields the
/// same contents as filling everything into a single instance. A failed
/// merge leaves `self` unchanged.
pub trait Mergeable {
    /// Merges `other` into `self`.
    ///
    /// # Errors
    ///
    /// Returns an error if the two objects are not compatible.
    fn merge(&mut self, other: &Self) -> Result<()>;
}

impl Mergeable for BinGrid {
    fn merge(&mut self, other: &Self) -> Result<()> {
        Ok(self.add_from(other)?)
    }
}

impl Mergeable for Histogram1D {
    fn merge(&mut self, other: &Self) -> Result<()> {
        Ok(self.add_from(other)?)
    }
}

/// Any object the pipeline publishes.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "snake_case"))]
pub enum MonitorObject {
    /// Plain 2D counter.
    Grid(BinGrid),
    /// 1D distribution.
    Histogram(Histogram1D),
    /// Derived ratio with its two accumulated grids.
    Ratio(RatioAccumulator),
}

impl MonitorObject {
    /// Short name of the variant, used in error messages.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            MonitorObject::Grid(_) => "grid",
            MonitorObject::Histogram(_) => "histogram",
            MonitorObject::Ratio(_) => "ratio",
        }
    }

    /// Checks that `other` could be merged into `self` without writing.
    ///
    /// # Errors
    ///
    /// Returns [`ObjectError::IncompatibleKind`] if the variants differ, or
    /// the shape or scaling error the merge itself would raise.
    pub fn ensure_compatible(&self, name: &str, other: &Self) -> Result<()> {
        match (self, other) {
            (MonitorObject::Grid(a), MonitorObject::Grid(b)) => {
                Ok(a.shape().ensure_same(&b.shape())?)
            }
            (MonitorObject::Histogram(a), MonitorObject::Histogram(b)) => {
                if a.axis() == b.axis() {
                    Ok(())
                } else {
                    Err(GridError::AxisMismatch {
                        left: *a.axis(),
                        right: *b.axis(),
                    }
                    .into())
                }
            }
            (MonitorObject::Ratio(a), MonitorObject::Ratio(b)) => Ok(a.ensure_compatible(b)?),
            (left, right) => Err(ObjectError::IncompatibleKind {
                name: name.to_string(),
                left: left.kind(),
                right: right.kind(),
            }
            .into()),
        }
    }

    /// Merges a same-kind object, reporting `name` on a kind mismatch.
    ///
    /// # Errors
    ///
    /// Returns [`ObjectError::IncompatibleKind`] if the variants differ, or
    /// the underlying shape error.
    pub fn merge_named(&mut self, name: &str, other: &Self) -> Result<()> {
        match (self, other) {
            (MonitorObject::Grid(a), MonitorObject::Grid(b)) => a.merge(b),
            (MonitorObject::Histogram(a), MonitorObject::Histogram(b)) => a.merge(b),
            (MonitorObject::Ratio(a), MonitorObject::Ratio(b)) => a.merge(b),
            (left, right) => Err(ObjectError::IncompatibleKind {
                name: name.to_string(),
                left: left.kind(),
                right: right.kind(),
            }
            .into()),
        }
    }
}

impl Mergeable for MonitorObject {
    fn merge(&mut self, other: &Self) -> Result<()> {
        self.merge_named("<unnamed>", other)
    }
}

impl From<BinGrid> for MonitorObject {
    fn from(grid: BinGrid) -> Self {
        MonitorObject::Grid(grid)
    }
}

impl From<Histogram1D> for MonitorObject {
    fn from(histogram: Histogram1D) -> Self {
        MonitorObject::Histogram(histogram)
    }
}

impl From<RatioAccumulator> for MonitorObject {
    fn from(ratio: RatioAccumulator) -> Self {
        MonitorObject::Ratio(ratio)
    }
}

/// Named monitor objects, ordered by name.
///
/// This is what a worker hands to the publisher, and what a coordinator
/// merges across workers.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MonitorSet {
    objects: BTreeMap<String, MonitorObject>,
}

impl MonitorSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the object stored under `name`.
    pub fn insert(&mut self, name: impl Into<String>, object: impl Into<MonitorObject>) {
        self.objects.insert(name.into(), object.into());
    }

    /// Object stored under `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&MonitorObject> {
        self.objects.get(name)
    }

    /// Grid stored under `name`, if that object is a grid.
    #[must_use]
    pub fn grid(&self, name: &str) -> Option<&BinGrid> {
        match self.objects.get(name)? {
            MonitorObject::Grid(grid) => Some(grid),
            _ => None,
        }
    }

    /// Histogram stored under `name`, if that object is a histogram.
    #[must_use]
    pub fn histogram(&self, name: &str) -> Option<&Histogram1D> {
        match self.objects.get(name)? {
            MonitorObject::Histogram(histogram) => Some(histogram),
            _ => None,
        }
    }

    /// Ratio stored under `name`, if that object is a ratio.
    #[must_use]
    pub fn ratio(&self, name: &str) -> Option<&RatioAccumulator> {
        match self.objects.get(name)? {
            MonitorObject::Ratio(ratio) => Some(ratio),
            _ => None,
        }
    }

    /// Number of objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Returns true if the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Object names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.objects.keys().map(String::as_str)
    }

    /// `(name, object)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &MonitorObject)> {
        self.objects.iter().map(|(name, object)| (name.as_str(), object))
    }

    /// Recomputes the ratio view of every ratio object.
    pub fn update_ratios(&mut self) {
        for object in self.objects.values_mut() {
            if let MonitorObject::Ratio(ratio) = object {
                ratio.update();
            }
        }
    }
}

impl Mergeable for MonitorSet {
    /// Merges objects by name; names only present in `other` are copied in.
    ///
    /// Every shared name is checked before anything is written, so a failed
    /// merge leaves `self` unchanged.
    fn merge(&mut self, other: &Self) -> Result<()> {
        for (name, theirs) in &other.objects {
            if let Some(ours) = self.objects.get(name) {
                ours.ensure_compatible(name, theirs)?;
            }
        }
        for (name, theirs) in &other.objects {
            match self.objects.get_mut(name) {
                Some(ours) => ours.merge_named(name, theirs)?,
                None => {
                    self.objects.insert(name.clone(), theirs.clone());
                }
            }
        }
        Ok(())
    }
}

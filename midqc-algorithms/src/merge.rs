//! Parallel combination of finalized partial results.

use midqc_core::{Error, Mergeable, MonitorSet, Result};
use rayon::prelude::*;

/// Merges `parts` pairwise in parallel.
///
/// Returns `None` for an empty input. Merging is associative, so the
/// grouping rayon picks does not affect the result.
///
/// # Errors
///
/// Returns the first merge error encountered.
pub fn merge_all<T>(parts: Vec<T>) -> Result<Option<T>>
where
    T: Mergeable + Send,
{
    parts
        .into_par_iter()
        .map(Ok::<T, Error>)
        .try_reduce_with(|mut left, right| {
            left.merge(&right)?;
            Ok(left)
        })
        .transpose()
}

/// Merges published sets from several workers and refreshes their ratios.
///
/// # Errors
///
/// Returns an error if two sets hold incompatible objects under one name.
pub fn merge_published(parts: Vec<MonitorSet>) -> Result<MonitorSet> {
    let mut merged = merge_all(parts)?.unwrap_or_default();
    merged.update_ratios();
    Ok(merged)
}

//! Local board occupancy coordinates.
//!
//! A fired bending line is attributed to every local board reading its
//! column. Each board gets its own point in the local board map
//! (columns on x, mirrored for the left side; RPC lines on y, four bins per
//! line) so that neighbouring boards land in distinct bins.

use crate::topology::{GeometryDescriptor, MAX_BOARDS_PER_CELL, N_COLUMNS, N_RPC_LINES};

/// Local board map: columns on x, mirrored for the left side.
pub const BOARD_MAP_X_BINS: usize = 2 * N_COLUMNS as usize;
/// Lower x edge of the local board map.
pub const BOARD_MAP_X_MIN: f64 = -(N_COLUMNS as f64);
/// Upper x edge of the local board map.
pub const BOARD_MAP_X_MAX: f64 = N_COLUMNS as f64;
/// Local board map: four bins per RPC line on y.
pub const BOARD_MAP_Y_BINS: usize = 4 * N_RPC_LINES as usize;
/// Lower y edge of the local board map.
pub const BOARD_MAP_Y_MIN: f64 = 0.0;
/// Upper y edge of the local board map.
pub const BOARD_MAP_Y_MAX: f64 = N_RPC_LINES as f64;

/// Offset that keeps every point off a bin edge.
const EDGE_OFFSET: f64 = 0.01;
/// Line spacing between consecutive boards.
const BOARD_STEP: f64 = 0.25;

/// Up to four `(x, y)` board map coordinates for one fired line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoardPositions {
    points: [(f64, f64); MAX_BOARDS_PER_CELL],
    len: usize,
}

impl BoardPositions {
    /// Coordinates as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[(f64, f64)] {
        &self.points[..self.len]
    }

    /// Number of positions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if there are no positions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Iterates over the coordinates.
    pub fn iter(&self) -> std::slice::Iter<'_, (f64, f64)> {
        self.as_slice().iter()
    }
}

impl<'a> IntoIterator for &'a BoardPositions {
    type Item = &'a (f64, f64);
    type IntoIter = std::slice::Iter<'a, (f64, f64)>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Board map x coordinate for a column: bin centre, negative on the left.
#[must_use]
#[inline]
pub fn board_map_x(descriptor: &GeometryDescriptor) -> f64 {
    let x = f64::from(descriptor.column) + 0.5;
    if descriptor.is_right_side {
        x
    } else {
        -x
    }
}

/// Board map coordinates for bending line `line_pattern` (0..4) of a cell.
///
/// Produces exactly `descriptor.board_count` points. On two-board cells
/// the second line pattern belongs to the upper board, which is shifted
/// half an RPC line up.
#[must_use]
pub fn board_positions(descriptor: &GeometryDescriptor, line_pattern: usize) -> BoardPositions {
    let x = board_map_x(descriptor);
    let n_boards = usize::from(descriptor.board_count).min(MAX_BOARDS_PER_CELL);

    let (base, line_offset) = if n_boards == 2 && line_pattern == 1 {
        (f64::from(descriptor.line) + 0.5, 0)
    } else {
        (f64::from(descriptor.line), line_pattern)
    };

    let mut points = [(0.0, 0.0); MAX_BOARDS_PER_CELL];
    for (board, point) in points.iter_mut().enumerate().take(n_boards) {
        #[allow(clippy::cast_precision_loss)]
        let y = base + EDGE_OFFSET + BOARD_STEP * board as f64 + BOARD_STEP * line_offset as f64;
        *point = (x, y);
    }

    BoardPositions {
        points,
        len: n_boards,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::classify;
    use approx::assert_relative_eq;

    #[test]
    fn test_single_board_cell() {
        // MT11 right, line 3, column 1
        let d = classify(3, 1).unwrap();
        assert_eq!(d.board_count, 1);

        let positions = board_positions(&d, 0);
        assert_eq!(positions.len(), 1);
        let (x, y) = positions.as_slice()[0];
        assert_relative_eq!(x, 1.5);
        assert_relative_eq!(y, 3.01);
    }

    #[test]
    fn test_four_board_cell_distinct_positions() {
        // MT11 left, line 0, column 2
        let d = classify(36, 2).unwrap();
        assert_eq!(d.board_count, 4);

        let positions = board_positions(&d, 0);
        assert_eq!(positions.len(), 4);
        let ys: Vec<f64> = positions.iter().map(|&(_, y)| y).collect();
        for (expected, y) in [0.01, 0.26, 0.51, 0.76].iter().zip(&ys) {
            assert_relative_eq!(*y, *expected, epsilon = 1e-12);
        }
        assert!(positions.iter().all(|&(x, _)| (x + 2.5).abs() < 1e-12));
    }

    #[test]
    fn test_two_board_upper_line_shift() {
        // MT11 right, line 2, column 3: two boards
        let d = classify(2, 3).unwrap();
        assert_eq!(d.board_count, 2);

        let first = board_positions(&d, 0);
        let second = board_positions(&d, 1);
        assert_relative_eq!(first.as_slice()[0].1, 2.01);
        assert_relative_eq!(first.as_slice()[1].1, 2.26);
        assert_relative_eq!(second.as_slice()[0].1, 2.51);
        assert_relative_eq!(second.as_slice()[1].1, 2.76);

        // Line patterns 2 and 3 keep their own offset
        let third = board_positions(&d, 2);
        assert_relative_eq!(third.as_slice()[0].1, 2.51);
    }

    #[test]
    fn test_board_map_binning() {
        assert_eq!(BOARD_MAP_X_BINS, 14);
        assert_eq!(BOARD_MAP_Y_BINS, 36);
        assert_relative_eq!(BOARD_MAP_X_MIN, -7.0);
        assert_relative_eq!(BOARD_MAP_Y_MAX, 9.0);
    }
}

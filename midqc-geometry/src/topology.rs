//! Fixed detector topology and identifier classification.
//!
//! The muon identifier has 72 detection elements (RPCs): two sides of 36,
//! each side holding four chambers of nine RPC lines. Every RPC is read out
//! in seven columns, except the short RPC next to the beam pipe (line 4),
//! which has no column 0.
//!
//! ```text
//!   de_id = side * 36 + chamber * 9 + line      side 0 = right, 1 = left
//! ```

use midqc_core::GeometryError;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Number of detection elements.
pub const N_DETECTION_ELEMENTS: u8 = 72;

/// Detection elements per side.
pub const N_DETECTION_ELEMENTS_PER_SIDE: u8 = 36;

/// Columns per detection element.
pub const N_COLUMNS: u8 = 7;

/// Chambers per side.
pub const N_CHAMBERS: u8 = 4;

/// RPC lines per chamber.
pub const N_RPC_LINES: u8 = 9;

/// Line index of the short RPC around the beam pipe.
pub const SHORT_RPC_LINE: u8 = 4;

/// Largest number of local boards reading one column.
pub const MAX_BOARDS_PER_CELL: usize = 4;

/// Conventional chamber names, indexed by chamber.
pub const CHAMBER_NAMES: [&str; N_CHAMBERS as usize] = ["MT11", "MT12", "MT21", "MT22"];

/// Semantic coordinates of one (detection element, column) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GeometryDescriptor {
    /// Chamber index in `[0, 4)`.
    pub chamber: u8,
    /// True for the right-hand side (`de_id < 36`).
    pub is_right_side: bool,
    /// RPC line within the half-chamber, `[0, 9)`.
    pub line: u8,
    /// Column within the RPC, `[0, 7)`.
    pub column: u8,
    /// Number of local boards reading this column: 1, 2 or 4.
    pub board_count: u8,
}

impl GeometryDescriptor {
    /// Conventional name of this descriptor's chamber.
    #[must_use]
    pub fn chamber_name(&self) -> &'static str {
        CHAMBER_NAMES[usize::from(self.chamber)]
    }
}

/// Pure lookup from raw identifiers to geometry.
///
/// The built-in [`MidGeometry`] encodes the fixed detector layout; other
/// implementations can stand in for alternative or test layouts.
pub trait GeometryLookup: Send + Sync {
    /// Classifies a `(de_id, column_id)` pair.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::UnknownIdentifier`] for pairs outside the
    /// topology.
    fn classify(&self, de_id: u8, column_id: u8) -> Result<GeometryDescriptor, GeometryError>;
}

/// The built-in muon identifier layout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MidGeometry;

impl MidGeometry {
    /// Creates the built-in layout.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Every valid `(de_id, column_id)` pair, in identifier order.
    pub fn cells() -> impl Iterator<Item = (u8, u8)> {
        (0..N_DETECTION_ELEMENTS).flat_map(|de_id| {
            (0..N_COLUMNS)
                .filter(move |&column_id| column_exists(de_id % N_RPC_LINES, column_id))
                .map(move |column_id| (de_id, column_id))
        })
    }
}

impl GeometryLookup for MidGeometry {
    fn classify(&self, de_id: u8, column_id: u8) -> Result<GeometryDescriptor, GeometryError> {
        classify(de_id, column_id)
    }
}

/// True for detection elements on the right-hand side.
#[must_use]
#[inline]
pub fn is_right_side(de_id: u8) -> bool {
    de_id < N_DETECTION_ELEMENTS_PER_SIDE
}

/// Chamber index of a detection element.
#[must_use]
#[inline]
pub fn chamber(de_id: u8) -> u8 {
    (de_id % N_DETECTION_ELEMENTS_PER_SIDE) / N_RPC_LINES
}

/// RPC line of a detection element.
#[must_use]
#[inline]
pub fn rpc_line(de_id: u8) -> u8 {
    de_id % N_RPC_LINES
}

#[inline]
fn column_exists(line: u8, column_id: u8) -> bool {
    column_id < N_COLUMNS && !(line == SHORT_RPC_LINE && column_id == 0)
}

/// Number of local boards reading `(line, column_id)`.
///
/// The layout is the same in all four chambers: the outermost lines and
/// the outermost column carry four boards, the columns hugging the beam
/// pipe carry one, everything else two.
#[must_use]
pub fn board_count(line: u8, column_id: u8) -> u8 {
    match (line, column_id) {
        (0 | 8, _) | (_, 6) => 4,
        (3 | 5, 0) | (3..=5, 1 | 2) => 1,
        _ => 2,
    }
}

/// Classifies a `(de_id, column_id)` pair against the fixed topology.
///
/// # Errors
///
/// Returns [`GeometryError::UnknownIdentifier`] if `de_id >= 72`,
/// `column_id >= 7`, or the pair names column 0 of the short RPC.
pub fn classify(de_id: u8, column_id: u8) -> Result<GeometryDescriptor, GeometryError> {
    let line = rpc_line(de_id);
    if de_id >= N_DETECTION_ELEMENTS || !column_exists(line, column_id) {
        return Err(GeometryError::UnknownIdentifier { de_id, column_id });
    }
    Ok(GeometryDescriptor {
        chamber: chamber(de_id),
        is_right_side: is_right_side(de_id),
        line,
        column: column_id,
        board_count: board_count(line, column_id),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_decomposition() {
        let d = classify(0, 0).unwrap();
        assert_eq!((d.chamber, d.is_right_side, d.line), (0, true, 0));

        let d = classify(13, 3).unwrap();
        assert_eq!((d.chamber, d.is_right_side, d.line), (1, true, 4));
        assert_eq!(d.chamber_name(), "MT12");

        let d = classify(71, 6).unwrap();
        assert_eq!((d.chamber, d.is_right_side, d.line), (3, false, 8));
        assert_eq!(d.chamber_name(), "MT22");

        let d = classify(36, 2).unwrap();
        assert_eq!((d.chamber, d.is_right_side, d.line), (0, false, 0));
    }

    #[test]
    fn test_unknown_identifiers() {
        assert_eq!(
            classify(72, 0),
            Err(GeometryError::UnknownIdentifier {
                de_id: 72,
                column_id: 0
            })
        );
        assert!(classify(0, 7).is_err());
        // Short RPC has no column 0 on either side or in any chamber
        assert!(classify(4, 0).is_err());
        assert!(classify(31, 0).is_err());
        assert!(classify(40, 0).is_err());
        assert!(classify(4, 1).is_ok());
    }

    #[test]
    fn test_board_count_table() {
        // Outer lines and outer column
        assert_eq!(board_count(0, 3), 4);
        assert_eq!(board_count(8, 0), 4);
        assert_eq!(board_count(2, 6), 4);
        assert_eq!(board_count(4, 6), 4);
        // Beam pipe neighbours
        assert_eq!(board_count(3, 0), 1);
        assert_eq!(board_count(5, 0), 1);
        assert_eq!(board_count(3, 1), 1);
        assert_eq!(board_count(4, 1), 1);
        assert_eq!(board_count(4, 2), 1);
        assert_eq!(board_count(5, 2), 1);
        // Regular cells
        assert_eq!(board_count(1, 0), 2);
        assert_eq!(board_count(4, 3), 2);
        assert_eq!(board_count(6, 1), 2);
        assert_eq!(board_count(7, 5), 2);
    }

    #[test]
    fn test_board_count_totals() {
        // Board multiplicities over one half-chamber: 9 lines x 7 columns
        // minus the short RPC's column 0.
        let half: Vec<u8> = MidGeometry::cells()
            .filter(|&(de_id, _)| de_id < N_RPC_LINES)
            .map(|(de_id, column_id)| board_count(rpc_line(de_id), column_id))
            .collect();
        assert_eq!(half.len(), 62);
        // Lines 0 and 8, plus column 6 of lines 1..=7
        assert_eq!(half.iter().filter(|&&n| n == 4).count(), 2 * 7 + 7);
        assert_eq!(half.iter().filter(|&&n| n == 1).count(), 2 + 6);
        assert_eq!(half.iter().filter(|&&n| n == 2).count(), 33);
        let total: u32 = half.iter().map(|&n| u32::from(n)).sum();
        assert_eq!(total, 21 * 4 + 8 + 33 * 2);
    }

    #[test]
    fn test_classification_total_and_deterministic() {
        let geometry = MidGeometry::new();
        let mut count = 0;
        for (de_id, column_id) in MidGeometry::cells() {
            let first = geometry.classify(de_id, column_id).unwrap();
            let second = geometry.classify(de_id, column_id).unwrap();
            assert_eq!(first, second);
            let side = if first.is_right_side { 0 } else { 36 };
            assert_eq!(side + first.chamber * 9 + first.line, de_id);
            count += 1;
        }
        assert_eq!(count, 72 * 7 - 8);
    }
}

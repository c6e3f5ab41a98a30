//! midqc-geometry: Muon identifier detector topology.
//!
//! This crate classifies raw `(de_id, column_id)` identifiers into
//! chamber, side, RPC line and local board multiplicity, and places the
//! local boards of a fired line on the local board map.
//!
#![warn(missing_docs)]

pub mod boards;
pub mod topology;

pub use boards::{
    board_map_x, board_positions, BoardPositions, BOARD_MAP_X_BINS, BOARD_MAP_X_MAX,
    BOARD_MAP_X_MIN, BOARD_MAP_Y_BINS, BOARD_MAP_Y_MAX, BOARD_MAP_Y_MIN,
};
pub use topology::{
    board_count, chamber, classify, is_right_side, rpc_line,
    GeometryDescriptor, GeometryLookup, MidGeometry, CHAMBER_NAMES, MAX_BOARDS_PER_CELL,
    N_CHAMBERS, N_COLUMNS, N_DETECTION_ELEMENTS, N_DETECTION_ELEMENTS_PER_SIDE, N_RPC_LINES,
    SHORT_RPC_LINE,
};

// Re-export the error raised by lookups
pub use midqc_core::GeometryError;

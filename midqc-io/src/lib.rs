//! midqc-io: File formats for midqc.
//!
//! Hit batches are read from JSON-lines files, one batch per line.
//! Published monitor sets are written as JSON snapshots, and single grids
//! can be dumped as CSV.
//!

mod error;
mod reader;
mod writer;

pub use error::{Error, Result};
pub use reader::{BatchReader, BatchWriter};
pub use writer::{read_snapshot, SnapshotWriter};

//! Monitor snapshot files.

use crate::Result;
use midqc_core::{BinGrid, MonitorSet};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

/// Writer for published monitor objects.
pub struct SnapshotWriter {
    writer: BufWriter<File>,
}

impl SnapshotWriter {
    /// Creates a new file writer.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::create(path)?;
        let writer = BufWriter::new(file);
        Ok(Self { writer })
    }

    /// Writes a whole set as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns an error on encoding or write failure.
    pub fn write_set(&mut self, set: &MonitorSet) -> Result<()> {
        serde_json::to_writer_pretty(&mut self.writer, set)?;
        writeln!(self.writer)?;
        self.writer.flush()?;
        Ok(())
    }

    /// Writes the non-empty bins of a grid as CSV, one row per bin.
    ///
    /// Coordinates are bin centres.
    ///
    /// # Errors
    ///
    /// Returns an error on write failure.
    #[allow(clippy::float_cmp)]
    pub fn write_grid_csv(&mut self, grid: &BinGrid) -> Result<()> {
        writeln!(self.writer, "ix,iy,x,y,content")?;

        let (x_axis, y_axis) = (grid.x_axis(), grid.y_axis());
        for ((ix, iy), &content) in grid.values().indexed_iter() {
            if content == 0.0 {
                continue;
            }
            writeln!(
                self.writer,
                "{},{},{},{},{}",
                ix,
                iy,
                x_axis.bin_center(ix),
                y_axis.bin_center(iy),
                content
            )?;
        }

        self.writer.flush()?;
        Ok(())
    }

    /// Flushes the writer.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush fails.
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Reads a set written by [`SnapshotWriter::write_set`].
///
/// Ratio views are recomputed while loading.
///
/// # Errors
///
/// Returns an error if the file cannot be read or does not hold a valid set.
pub fn read_snapshot<P: AsRef<Path>>(path: P) -> Result<MonitorSet> {
    let file = File::open(path)?;
    let set = serde_json::from_reader(BufReader::new(file))?;
    Ok(set)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::float_cmp)]
    use super::*;
    use midqc_core::{Axis, Histogram1D, RatioAccumulator};
    use tempfile::NamedTempFile;

    fn sample_set() -> MonitorSet {
        let mut grid = BinGrid::with_bins(4, 0.0, 4.0, 2, 0.0, 2.0).unwrap();
        grid.fill(1.5, 0.5, 3.0);

        let mut histogram = Histogram1D::with_bins(10, 0.0, 10.0).unwrap();
        histogram.fill(2.0);

        let axis = Axis::new(2, 0.0, 2.0).unwrap();
        let mut ratio = RatioAccumulator::new(axis, axis, 2.0);
        ratio.fill_numerator(0.5, 0.5, 9.0);
        ratio.fill_denominator(0.5, 0.5, 3.0);
        ratio.update();

        let mut set = MonitorSet::new();
        set.insert("grid", grid);
        set.insert("histogram", histogram);
        set.insert("ratio", ratio);
        set
    }

    #[test]
    fn test_snapshot_reload() {
        let file = NamedTempFile::new().unwrap();
        let set = sample_set();

        let mut writer = SnapshotWriter::create(file.path()).unwrap();
        writer.write_set(&set).unwrap();

        let loaded = read_snapshot(file.path()).unwrap();
        assert_eq!(loaded, set);
    }

    #[test]
    fn test_snapshot_rejects_bad_storage() {
        let file = NamedTempFile::new().unwrap();
        let json = r#"{"objects": {"h": {"kind": "histogram",
            "axis": {"n_bins": 3, "min": 0.0, "max": 3.0},
            "bins": {"v": 1, "dim": [2], "data": [1.0, 2.0]},
            "entries": 2}}}"#;
        std::fs::write(file.path(), json).unwrap();

        assert!(read_snapshot(file.path()).is_err());
    }

    #[test]
    fn test_write_grid_csv() {
        let file = NamedTempFile::new().unwrap();
        let set = sample_set();

        let mut writer = SnapshotWriter::create(file.path()).unwrap();
        writer.write_grid_csv(set.grid("grid").unwrap()).unwrap();

        let content = std::fs::read_to_string(file.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines, vec!["ix,iy,x,y,content", "1,0,1.5,0.5,3"]);
    }
}

//! JSON-lines hit batch files.
//!
//! One [`HitBatch`] per line; blank lines are skipped.

use crate::{Error, Result};
use log::debug;
use midqc_core::HitBatch;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// Streams batches from a JSON-lines source.
pub struct BatchReader<R> {
    reader: R,
    line: usize,
    buffer: String,
}

impl BatchReader<BufReader<File>> {
    /// Opens a batch file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        debug!("opening batch file {}", path.display());
        let file = File::open(path)?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead> BatchReader<R> {
    /// Wraps a buffered reader.
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: 0,
            buffer: String::new(),
        }
    }

    /// Number of lines consumed so far.
    #[must_use]
    pub fn line(&self) -> usize {
        self.line
    }

    fn next_batch(&mut self) -> Option<Result<HitBatch>> {
        loop {
            self.buffer.clear();
            match self.reader.read_line(&mut self.buffer) {
                Ok(0) => return None,
                Ok(_) => self.line += 1,
                Err(err) => return Some(Err(err.into())),
            }
            let text = self.buffer.trim();
            if text.is_empty() {
                continue;
            }
            return Some(
                serde_json::from_str(text).map_err(|source| Error::InvalidBatch {
                    line: self.line,
                    source,
                }),
            );
        }
    }
}

impl<R: BufRead> Iterator for BatchReader<R> {
    type Item = Result<HitBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_batch()
    }
}

/// Writes batches as JSON lines.
pub struct BatchWriter {
    writer: BufWriter<File>,
}

impl BatchWriter {
    /// Creates a new batch file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }

    /// Appends one batch.
    ///
    /// # Errors
    ///
    /// Returns an error on encoding or write failure.
    pub fn write_batch(&mut self, batch: &HitBatch) -> Result<()> {
        serde_json::to_writer(&mut self.writer, batch)?;
        self.writer.write_all(b"\n")?;
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

//! Completion report.
//!
//! One line per successfully encoded task, in the same four-column format as
//! the task file. Each line is flushed as soon as it is written so the report
//! always reflects every clip that was fully finalized, even if a later task
//! brings the batch down.

use std::{
    fs::{File, OpenOptions},
    io::{BufWriter, Write},
    path::Path,
};

use crate::{error::CutError, task::Task};

/// Append-only writer for the completion report.
#[derive(Debug)]
pub struct ReportWriter<W: Write> {
    writer: W,
    lines: u64,
}

impl ReportWriter<BufWriter<File>> {
    /// Open the report file at `path`.
    ///
    /// The file is truncated unless `append` is set, in which case new lines
    /// are added after the existing ones (useful when resuming a batch).
    ///
    /// # Errors
    ///
    /// Returns [`CutError::FileOpen`] if the file cannot be opened.
    pub fn create<P: AsRef<Path>>(path: P, append: bool) -> Result<Self, CutError> {
        let path = path.as_ref();
        let mut options = OpenOptions::new();
        if append {
            options.append(true).create(true);
        } else {
            options.write(true).create(true).truncate(true);
        }
        let file = options.open(path).map_err(|source| CutError::FileOpen {
            path: path.to_path_buf(),
            source,
        })?;
        log::debug!("Writing report to {} (append={append})", path.display());
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> ReportWriter<W> {
    /// Wrap an arbitrary writer.
    pub fn new(writer: W) -> Self {
        Self { writer, lines: 0 }
    }

    /// Append the completion line for `task` and flush it.
    ///
    /// # Errors
    ///
    /// Returns [`CutError::IoError`] if the line cannot be written or flushed.
    pub fn record(&mut self, task: &Task) -> Result<(), CutError> {
        writeln!(self.writer, "{task}")?;
        self.writer.flush()?;
        self.lines += 1;
        Ok(())
    }

    /// Number of lines written by this writer.
    pub fn lines_written(&self) -> u64 {
        self.lines
    }

    /// Consume the report writer and return the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

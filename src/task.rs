//! Cut tasks and the line-oriented task file format.
//!
//! Each non-blank line of a task file holds exactly four fields separated by
//! runs of whitespace:
//!
//! ```text
//! id:u64  destination:string  start_ms:u64  end_ms:u64
//! ```
//!
//! There is no quoting or escaping. Blank lines are skipped; any other field
//! count, or a line that is not UTF-8, aborts the batch.

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    io::BufRead,
    path::Path,
};

use crate::{conversion::millis_to_seconds, error::CutError};

/// One clip to cut from the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    /// Caller-assigned identifier, echoed into the report.
    pub id: u64,
    /// Output location of the clip; its extension selects the container.
    pub destination: String,
    /// Window start in milliseconds.
    pub start_ms: u64,
    /// Window end in milliseconds (inclusive).
    pub end_ms: u64,
}

impl Task {
    /// Parse a single task line.
    ///
    /// Returns `Ok(None)` for blank lines. `line_number` is only used for
    /// error messages.
    ///
    /// # Errors
    ///
    /// Returns [`CutError::TaskFormat`] if the line does not have exactly
    /// four fields or a numeric field does not parse.
    ///
    /// # Example
    ///
    /// ```
    /// use clipcut::Task;
    ///
    /// let task = Task::parse_line("7  clip.mp4 500   2000", 1)?.unwrap();
    /// assert_eq!(task.destination, "clip.mp4");
    /// assert_eq!(task.window(), (0.5, 2.0));
    /// # Ok::<(), clipcut::CutError>(())
    /// ```
    pub fn parse_line(line: &str, line_number: usize) -> Result<Option<Self>, CutError> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.is_empty() {
            return Ok(None);
        }
        let &[id, destination, start_ms, end_ms] = fields.as_slice() else {
            return Err(CutError::TaskFormat {
                line: line_number,
                reason: format!("expected 4 fields, found {}", fields.len()),
            });
        };

        let number = |name: &str, value: &str| {
            value.parse::<u64>().map_err(|error| CutError::TaskFormat {
                line: line_number,
                reason: format!("invalid {name} {value:?}: {error}"),
            })
        };

        Ok(Some(Self {
            id: number("id", id)?,
            destination: destination.to_string(),
            start_ms: number("start", start_ms)?,
            end_ms: number("end", end_ms)?,
        }))
    }

    /// The window of this task in seconds, as `(start, end)`.
    pub fn window(&self) -> (f64, f64) {
        (millis_to_seconds(self.start_ms), millis_to_seconds(self.end_ms))
    }

    /// The destination as a filesystem path.
    pub fn destination_path(&self) -> &Path {
        Path::new(&self.destination)
    }
}

/// Renders the report line for this task.
impl Display for Task {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(
            f,
            "{} {} {} {}",
            self.id, self.destination, self.start_ms, self.end_ms
        )
    }
}

/// Streaming reader over a task file.
///
/// Yields tasks lazily in file order, so a malformed line is only reported
/// once every earlier task has been processed.
///
/// # Example
///
/// ```
/// use clipcut::TaskReader;
///
/// let input = "1 a.mp4 0 400\n\n2 b.mp4 500 2000\n";
/// let tasks = TaskReader::new(input.as_bytes()).collect::<Result<Vec<_>, _>>()?;
/// assert_eq!(tasks.len(), 2);
/// # Ok::<(), clipcut::CutError>(())
/// ```
#[derive(Debug)]
pub struct TaskReader<R> {
    reader: R,
    line_number: usize,
    line: Vec<u8>,
    done: bool,
}

impl<R: BufRead> TaskReader<R> {
    /// Wrap a buffered reader.
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line_number: 0,
            line: Vec::new(),
            done: false,
        }
    }

    /// The number of lines consumed so far.
    pub fn line_number(&self) -> usize {
        self.line_number
    }
}

impl<R: BufRead> Iterator for TaskReader<R> {
    type Item = Result<Task, CutError>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            self.line.clear();
            match self.reader.read_until(b'\n', &mut self.line) {
                Ok(0) => self.done = true,
                Ok(_) => {
                    self.line_number += 1;
                    let parsed = match std::str::from_utf8(&self.line) {
                        Ok(text) => Task::parse_line(text, self.line_number),
                        Err(error) => Err(CutError::TaskFormat {
                            line: self.line_number,
                            reason: format!("line is not valid UTF-8: {error}"),
                        }),
                    };
                    match parsed {
                        Ok(Some(task)) => return Some(Ok(task)),
                        Ok(None) => continue,
                        Err(error) => {
                            self.done = true;
                            return Some(Err(error));
                        }
                    }
                }
                Err(error) => {
                    self.done = true;
                    return Some(Err(CutError::IoError(error)));
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::{Task, TaskReader};
    use crate::error::CutError;

    #[test]
    fn parses_space_runs_and_trailing_newline() {
        let task = Task::parse_line("  42   out/clip.mp4  1000 2500\n", 3)
            .unwrap()
            .unwrap();
        assert_eq!(
            task,
            Task {
                id: 42,
                destination: "out/clip.mp4".to_string(),
                start_ms: 1000,
                end_ms: 2500,
            }
        );
    }

    #[test]
    fn blank_lines_are_skipped() {
        assert!(Task::parse_line("", 1).unwrap().is_none());
        assert!(Task::parse_line("   \n", 1).unwrap().is_none());
        assert!(Task::parse_line("\r\n", 1).unwrap().is_none());
    }

    #[test]
    fn wrong_field_count_reports_line() {
        let error = Task::parse_line("1 clip.mp4 0", 9).unwrap_err();
        match error {
            CutError::TaskFormat { line, reason } => {
                assert_eq!(line, 9);
                assert!(reason.contains("found 3"), "{reason}");
            }
            other => panic!("unexpected error: {other}"),
        }

        assert!(Task::parse_line("1 clip.mp4 0 10 extra", 1).is_err());
    }

    #[test]
    fn non_numeric_fields_are_rejected() {
        let error = Task::parse_line("x clip.mp4 0 10", 2).unwrap_err();
        assert!(error.to_string().contains("invalid id"), "{error}");
        assert!(Task::parse_line("1 clip.mp4 -5 10", 2).is_err());
    }

    #[test]
    fn display_matches_report_format() {
        let task = Task::parse_line("5 g5.mp4 500 2000", 1).unwrap().unwrap();
        assert_eq!(task.to_string(), "5 g5.mp4 500 2000");
    }

    #[test]
    fn reader_stops_after_first_error() {
        let input = "1 a.mp4 0 100\nbroken line\n2 b.mp4 100 200\n";
        let mut reader = TaskReader::new(input.as_bytes());

        assert!(reader.next().unwrap().is_ok());
        assert!(matches!(
            reader.next(),
            Some(Err(CutError::TaskFormat { line: 2, .. }))
        ));
        assert!(reader.next().is_none());
        assert_eq!(reader.line_number(), 2);
    }

    #[test]
    fn reader_counts_blank_lines() {
        let input = "\n\n1 a.mp4 0 100\n\nfoo\n";
        let results: Vec<_> = TaskReader::new(input.as_bytes()).collect();
        assert_eq!(results.len(), 2);
        assert!(matches!(
            results[1],
            Err(CutError::TaskFormat { line: 5, .. })
        ));
    }
}

// Incremental tailing of an append-only log file.
//
// A cursor remembers the first line of the file it last read and how many bytes
// of complete lines it has consumed. Each pass resumes right after the last
// complete line, or starts over when the file turns out to be a different one.

use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::TrackerError;

/// Read position within one profile's log file.
#[derive(Debug, Clone)]
pub struct LogCursor {
    log_path: PathBuf,
    /// First line of the file last read, verbatim including its newline.
    first_line: String,
    /// Bytes of complete lines consumed, counted from the start of the file.
    byte_offset: u64,
}

/// What a single tail pass consumed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TailSummary {
    pub lines: usize,
    pub bytes: u64,
    /// The file was replaced (or truncated) since the previous pass.
    pub rotated: bool,
}

impl LogCursor {
    pub fn new(log_path: impl Into<PathBuf>) -> Self {
        Self {
            log_path: log_path.into(),
            first_line: String::new(),
            byte_offset: 0,
        }
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    pub fn first_line(&self) -> &str {
        &self.first_line
    }

    pub fn byte_offset(&self) -> u64 {
        self.byte_offset
    }

    /// Read every complete line appended since the previous pass, in file order.
    ///
    /// `visit` receives each line with its trailing newline. A trailing partial
    /// line is left for a later pass. The cursor only moves when the pass
    /// succeeds; a file that cannot be opened yields `LogUnavailable`.
    pub fn tail<F>(&mut self, mut visit: F) -> Result<TailSummary, TrackerError>
    where
        F: FnMut(&str),
    {
        let unavailable = |source| TrackerError::LogUnavailable {
            path: self.log_path.clone(),
            source,
        };

        let file = File::open(&self.log_path).map_err(unavailable)?;
        let file_len = file.metadata().map_err(unavailable)?.len();
        let mut reader = BufReader::new(file);

        let mut buf = Vec::new();
        reader.read_until(b'\n', &mut buf).map_err(unavailable)?;
        if buf.last() != Some(&b'\n') {
            // The writer has not finished the first line yet; nothing to compare against.
            return Ok(TailSummary::default());
        }
        let first_line = String::from_utf8_lossy(&buf).into_owned();

        let same_file = first_line == self.first_line && self.byte_offset <= file_len;
        let start = if same_file { self.byte_offset } else { 0 };
        let rotated = !same_file && !self.first_line.is_empty();
        reader.seek(SeekFrom::Start(start)).map_err(unavailable)?;

        let mut summary = TailSummary {
            rotated,
            ..TailSummary::default()
        };
        let mut offset = start;
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    if buf.last() != Some(&b'\n') {
                        break;
                    }
                    offset += n as u64;
                    summary.lines += 1;
                    summary.bytes += n as u64;
                    visit(&String::from_utf8_lossy(&buf));
                }
                Err(e) => {
                    tracing::warn!(
                        "Stopped reading {} at byte {offset}: {e}",
                        self.log_path.display()
                    );
                    break;
                }
            }
        }

        self.first_line = first_line;
        self.byte_offset = offset;
        Ok(summary)
    }
}

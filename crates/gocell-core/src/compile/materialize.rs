//! Turning raw cell lines into a directly compilable program.
//!
//! [`CellProgram`] is a forward-only producer of lines; [`LineSink`] is the
//! consumer writing them out. The sink latches the first write error and keeps
//! accepting (and discarding) lines, so the producer is always drained.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::iter::Enumerate;
use std::path::{Path, PathBuf};
use std::slice::Iter;

use rustc_hash::FxHashSet;

use crate::cursor::{Cursor, CursorTracker, mark_cursor};
use crate::error::{Error, Result};

/// Lines that start the synthesized entry point.
pub const ENTRY_MARKERS: [&str; 2] = ["%main", "%%"];

/// Cell line indices that must not be emitted (directives handled elsewhere).
pub type SkipLines = FxHashSet<usize>;

/// Returns true if `line` switches a cell into entry-point mode.
///
/// Surrounding whitespace is ignored, the same rule directive lines follow.
pub fn is_entry_marker(line: &str) -> bool {
    ENTRY_MARKERS.contains(&line.trim())
}

/// One line of generated text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmittedLine {
    pub text: String,
    /// Cell line this text came from; `None` for scaffolding.
    pub cell_line: Option<usize>,
    /// How far the cell text was shifted right.
    pub column_delta: usize,
}

impl EmittedLine {
    fn synthetic(text: &str) -> Self {
        Self {
            text: text.to_string(),
            cell_line: None,
            column_delta: 0,
        }
    }
}

/// Generated-file line to cell line mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineMap {
    cell_lines: Vec<Option<usize>>,
}

impl LineMap {
    pub fn push(&mut self, cell_line: Option<usize>) {
        self.cell_lines.push(cell_line);
    }

    /// Cell line of a 0-based generated line, if it has one.
    pub fn cell_line(&self, file_line: usize) -> Option<usize> {
        self.cell_lines.get(file_line).copied().flatten()
    }

    pub fn len(&self) -> usize {
        self.cell_lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cell_lines.is_empty()
    }
}

/// Producer of the minimal program for one cell.
pub struct CellProgram<'a, S> {
    lines: Enumerate<Iter<'a, S>>,
    skip: &'a SkipLines,
    queue: VecDeque<EmittedLine>,
    entry_point: bool,
    finished: bool,
}

impl<'a, S: AsRef<str>> CellProgram<'a, S> {
    pub fn new(lines: &'a [S], skip: &'a SkipLines) -> Self {
        let queue = VecDeque::from([
            EmittedLine::synthetic("package main"),
            EmittedLine::synthetic(""),
        ]);
        Self {
            lines: lines.iter().enumerate(),
            skip,
            queue,
            entry_point: false,
            finished: false,
        }
    }

    fn feed(&mut self, idx: usize, raw: &str) {
        if is_entry_marker(raw) {
            // A repeated marker inside the entry point adds nothing.
            if !self.entry_point {
                self.entry_point = true;
                self.queue.extend([
                    EmittedLine::synthetic(""),
                    EmittedLine::synthetic("func main() {"),
                    EmittedLine::synthetic("\tflag.Parse()"),
                ]);
            }
            return;
        }
        if self.skip.contains(&idx) {
            return;
        }
        let line = raw.trim_end_matches(' ');
        let emitted = if self.entry_point {
            EmittedLine {
                text: format!("\t{line}"),
                cell_line: Some(idx),
                column_delta: 1,
            }
        } else {
            EmittedLine {
                text: line.to_string(),
                cell_line: Some(idx),
                column_delta: 0,
            }
        };
        self.queue.push_back(emitted);
    }
}

impl<S: AsRef<str>> Iterator for CellProgram<'_, S> {
    type Item = EmittedLine;

    fn next(&mut self) -> Option<EmittedLine> {
        loop {
            if let Some(line) = self.queue.pop_front() {
                return Some(line);
            }
            if self.finished {
                return None;
            }
            match self.lines.next() {
                Some((idx, raw)) => self.feed(idx, raw.as_ref()),
                None => {
                    if self.entry_point {
                        self.queue.push_back(EmittedLine::synthetic("}"));
                    }
                    self.finished = true;
                }
            }
        }
    }
}

/// Line consumer with an error latch.
pub struct LineSink<W: Write> {
    writer: W,
    path: PathBuf,
    error: Option<std::io::Error>,
    written: usize,
    discarded: usize,
}

impl LineSink<BufWriter<File>> {
    /// Create (or truncate) `path` and write lines to it.
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path).map_err(|source| Error::Materialize {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::new(BufWriter::new(file), path))
    }
}

impl<W: Write> LineSink<W> {
    /// Wrap a writer; `path` is only used in error messages.
    pub fn new(writer: W, path: &Path) -> Self {
        Self {
            writer,
            path: path.to_path_buf(),
            error: None,
            written: 0,
            discarded: 0,
        }
    }

    /// Write one line, or discard it once a write has failed.
    pub fn push(&mut self, line: &str) {
        if self.error.is_some() {
            self.discarded += 1;
            return;
        }
        match writeln!(self.writer, "{line}") {
            Ok(()) => self.written += 1,
            Err(e) => self.error = Some(e),
        }
    }

    pub fn written(&self) -> usize {
        self.written
    }

    pub fn discarded(&self) -> usize {
        self.discarded
    }

    /// Flush and report the first error encountered.
    pub fn finish(mut self) -> Result<()> {
        let result = match self.error.take() {
            Some(e) => Err(e),
            None => self.writer.flush(),
        };
        result.map_err(|source| Error::Materialize {
            path: self.path,
            source,
        })
    }
}

/// Result of materializing a cell.
#[derive(Debug, Clone, Default)]
pub struct Materialized {
    /// Cursor translated into file coordinates.
    pub cursor: Option<Cursor>,
    pub line_map: LineMap,
}

/// Drain the program for `lines` into `sink`, tracking the cursor.
pub fn materialize<S: AsRef<str>, W: Write>(
    lines: &[S],
    skip: &SkipLines,
    cursor: Option<Cursor>,
    sink: &mut LineSink<W>,
) -> Materialized {
    let mut tracker = CursorTracker::new(cursor);
    let mut line_map = LineMap::default();
    for line in CellProgram::new(lines, skip) {
        if let Some(found) = tracker.advance(line.cell_line, line.column_delta) {
            tracing::debug!(
                file_line = found.line,
                cell_line = ?line.cell_line,
                "cursor in generated file: {}",
                mark_cursor(&line.text, found.col)
            );
        }
        line_map.push(line.cell_line);
        sink.push(&line.text);
    }
    Materialized {
        cursor: tracker.found(),
        line_map,
    }
}

/// Write the minimal program for a cell to `path`.
///
/// # Arguments
///
/// * `path` - File to create or truncate, usually the session's `main.go`
/// * `lines` - Raw cell lines
/// * `skip` - Indices of directive lines to leave out
/// * `cursor` - Optional cursor in cell coordinates
///
/// # Errors
///
/// Returns `Error::Materialize` if the file cannot be created or a write
/// fails. The program is drained either way.
pub fn write_cell_program<S: AsRef<str>>(
    path: &Path,
    lines: &[S],
    skip: &SkipLines,
    cursor: Option<Cursor>,
) -> Result<Materialized> {
    let mut sink = LineSink::create(path)?;
    let materialized = materialize(lines, skip, cursor, &mut sink);
    sink.finish()?;
    Ok(materialized)
}

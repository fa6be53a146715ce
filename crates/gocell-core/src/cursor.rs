//! Cursor positions and their translation through generated text.
//!
//! A cursor is carried from cell coordinates, through the materialized file,
//! into the merged program. An absent cursor is simply `None`.

use serde::{Deserialize, Serialize};

/// A 0-based (line, column) position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Cursor {
    pub line: usize,
    pub col: usize,
}

impl Cursor {
    pub fn new(line: usize, col: usize) -> Self {
        Self { line, col }
    }

    /// Move the cursor down by `lines`, keeping the column.
    pub fn shifted(self, lines: usize) -> Self {
        Self {
            line: self.line + lines,
            col: self.col,
        }
    }
}

impl std::fmt::Display for Cursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

/// Line bookkeeping for a forward-only text producer.
///
/// Each emitted line is reported through [`CursorTracker::advance`], which
/// returns the translated cursor for the one line that carries it. Lines with
/// no source line (synthetic scaffolding) never carry the cursor.
#[derive(Debug, Clone)]
pub struct CursorTracker {
    lines_emitted: usize,
    target: Option<Cursor>,
    found: Option<Cursor>,
}

impl CursorTracker {
    /// Create a tracker looking for `target`, given in source coordinates.
    pub fn new(target: Option<Cursor>) -> Self {
        Self {
            lines_emitted: 0,
            target,
            found: None,
        }
    }

    /// Account for one emitted line.
    ///
    /// `source_line` is the line the output came from, `column_delta` how far
    /// the text was shifted right when emitted.
    pub fn advance(&mut self, source_line: Option<usize>, column_delta: usize) -> Option<Cursor> {
        let out_line = self.lines_emitted;
        self.lines_emitted += 1;

        let target = self.target?;
        if self.found.is_some() || source_line != Some(target.line) {
            return None;
        }
        let cursor = Cursor::new(out_line, target.col + column_delta);
        self.found = Some(cursor);
        Some(cursor)
    }

    /// Number of lines accounted for so far.
    pub fn lines_emitted(&self) -> usize {
        self.lines_emitted
    }

    /// The translated cursor, once its line has been emitted.
    pub fn found(&self) -> Option<Cursor> {
        self.found
    }
}

/// Render `line` with a `*` inserted at byte column `col`, for debug logs.
pub fn mark_cursor(line: &str, col: usize) -> String {
    if col < line.len() && line.is_char_boundary(col) {
        format!("{}*{}", &line[..col], &line[col..])
    } else {
        format!("{line}*")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracker_without_target_only_counts() {
        let mut tracker = CursorTracker::new(None);
        assert_eq!(tracker.advance(Some(0), 0), None);
        assert_eq!(tracker.advance(None, 0), None);
        assert_eq!(tracker.lines_emitted(), 2);
        assert_eq!(tracker.found(), None);
    }

    #[test]
    fn test_tracker_skips_synthetic_lines() {
        let mut tracker = CursorTracker::new(Some(Cursor::new(0, 3)));
        assert_eq!(tracker.advance(None, 0), None);
        assert_eq!(tracker.advance(None, 0), None);
        assert_eq!(tracker.advance(Some(0), 1), Some(Cursor::new(2, 4)));
        assert_eq!(tracker.found(), Some(Cursor::new(2, 4)));
    }

    #[test]
    fn test_tracker_records_once() {
        let mut tracker = CursorTracker::new(Some(Cursor::new(1, 0)));
        tracker.advance(Some(0), 0);
        assert!(tracker.advance(Some(1), 0).is_some());
        assert!(tracker.advance(Some(1), 0).is_none());
        assert_eq!(tracker.found(), Some(Cursor::new(1, 0)));
    }

    #[test]
    fn test_mark_cursor() {
        assert_eq!(mark_cursor("abc", 1), "a*bc");
        assert_eq!(mark_cursor("abc", 3), "abc*");
        assert_eq!(mark_cursor("", 5), "*");
    }
}

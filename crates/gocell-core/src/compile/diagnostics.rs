//! Mapping compiler diagnostics back to declarations and cell lines.
//!
//! The compiler reports positions in the generated program. Every generated
//! line belongs to at most one declaration span; declarations contributed by
//! the current cell also know where they started in the materialized cell
//! file, which the [`LineMap`] translates to cell lines.

use rustc_hash::FxHashMap;

use super::materialize::LineMap;
use crate::decls::{Decl, DeclKey, DeclKind, DeclSpan, Declarations, ENTRY_POINT};

/// Lines of context shown on each side of a diagnostic.
const CONTEXT_LINES: usize = 2;

/// A position-carrying line of compiler output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// 0-based line in the generated program.
    pub line: usize,
    /// 0-based column.
    pub col: usize,
    pub message: String,
}

/// Where a generated line came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub key: DeclKey,
    /// 0-based cell line, for declarations of the current cell.
    pub cell_line: Option<usize>,
}

#[derive(Debug, Clone)]
struct MappedSpan {
    span: DeclSpan,
    /// First line of the declaration in the materialized cell file.
    cell_origin: Option<usize>,
}

/// Generated program lines to declarations and cell lines.
#[derive(Debug, Clone, Default)]
pub struct SourceMap {
    spans: Vec<MappedSpan>,
    line_map: LineMap,
}

impl SourceMap {
    /// Build a map from the spans of a program.
    ///
    /// `cell` holds the declarations of the current cell and `entry` its
    /// entry point, if it defined one. A declaration whose span no longer has
    /// the cell's line count (the formatter rewrote it) maps to its key only.
    pub fn new(spans: Vec<DeclSpan>, cell: &Declarations, entry: Option<&Decl>, line_map: &LineMap) -> Self {
        let spans = spans
            .into_iter()
            .map(|span| {
                let decl = match (span.key.kind, span.key.key.as_str()) {
                    (DeclKind::Func, ENTRY_POINT) => entry,
                    (kind, key) => cell.get(kind, key),
                };
                let origin = decl
                    .filter(|d| d.line_count() == span.lines)
                    .and_then(|d| d.origin_line);
                MappedSpan {
                    span,
                    cell_origin: origin,
                }
            })
            .collect();
        Self {
            spans,
            line_map: line_map.clone(),
        }
    }

    /// Locate a 0-based generated line.
    pub fn locate(&self, line: usize) -> Option<Location> {
        let mapped = self.spans.iter().find(|m| m.span.contains(line))?;
        let cell_line = mapped
            .cell_origin
            .and_then(|origin| self.line_map.cell_line(origin + line - mapped.span.start));
        Some(Location {
            key: mapped.span.key.clone(),
            cell_line,
        })
    }
}

/// Spans of declarations parsed from a program file.
///
/// Used after import resolution rewrote the file, when rendered line numbers
/// no longer hold.
pub fn decl_spans(decls: &Declarations) -> Vec<DeclSpan> {
    let mut spans: Vec<DeclSpan> = [DeclKind::Type, DeclKind::Const, DeclKind::Var, DeclKind::Func]
        .into_iter()
        .flat_map(|kind| {
            let table: &FxHashMap<String, Decl> = match kind {
                DeclKind::Type => &decls.types,
                DeclKind::Const => &decls.constants,
                DeclKind::Var => &decls.variables,
                _ => &decls.functions,
            };
            table.values().filter_map(move |d| {
                d.origin_line.map(|start| DeclSpan {
                    key: DeclKey::new(kind, d.key.clone()),
                    start,
                    lines: d.line_count(),
                })
            })
        })
        .collect();
    spans.sort_by_key(|s| s.start);
    spans
}

/// Parse one output line of the form `[dir/]file:LINE:COL: message`.
pub fn parse_diagnostic(line: &str, file_name: &str) -> Option<Diagnostic> {
    let needle = format!("{file_name}:");
    let at = line.find(&needle)?;
    if at > 0 && !line[..at].ends_with(['/', '\\']) {
        return None;
    }
    let mut parts = line[at + needle.len()..].splitn(3, ':');
    let line_no: usize = parts.next()?.trim().parse().ok()?;
    let col: usize = parts.next()?.trim().parse().ok()?;
    let message = parts.next().unwrap_or_default().trim().to_string();
    Some(Diagnostic {
        line: line_no.checked_sub(1)?,
        col: col.saturating_sub(1),
        message,
    })
}

/// Annotate compiler output with declaration and cell positions, and show
/// the offending generated lines. Lines that are not diagnostics pass through.
pub fn annotate(output: &str, file_name: &str, source: &str, map: &SourceMap) -> String {
    let program: Vec<&str> = source.lines().collect();
    let mut text = String::new();
    for raw in output.lines() {
        text.push_str(raw);
        let Some(diag) = parse_diagnostic(raw, file_name) else {
            text.push('\n');
            continue;
        };
        match map.locate(diag.line) {
            Some(Location {
                cell_line: Some(cell_line),
                ..
            }) => text.push_str(&format!("  (cell line {})", cell_line + 1)),
            Some(Location { key, .. }) => text.push_str(&format!("  (in {key})")),
            None => {}
        }
        text.push('\n');

        if diag.line >= program.len() {
            continue;
        }
        let first = diag.line.saturating_sub(CONTEXT_LINES);
        let last = (diag.line + CONTEXT_LINES).min(program.len() - 1);
        for (idx, src) in program.iter().enumerate().take(last + 1).skip(first) {
            let marker = if idx == diag.line { ">" } else { " " };
            text.push_str(&format!("  {marker} {:>4} | {src}\n", idx + 1));
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_diagnostic() {
        let d = parse_diagnostic("./main.go:12:5: undefined: y", "main.go").unwrap();
        assert_eq!(d, Diagnostic { line: 11, col: 4, message: "undefined: y".to_string() });
        assert!(parse_diagnostic("/tmp/x/main.go:3:1: expected 'IDENT'", "main.go").is_some());
        assert!(parse_diagnostic("# command-line-arguments", "main.go").is_none());
        assert!(parse_diagnostic("notmain.go:1:1: x", "main.go").is_none());
        assert!(parse_diagnostic("main.go:abc", "main.go").is_none());
    }

    fn cell_map() -> (SourceMap, Declarations) {
        // Cell: line 0 "func f() int {", 1 "\treturn y", 2 "}".
        let mut line_map = LineMap::default();
        for l in [None, None, Some(0), Some(1), Some(2)] {
            line_map.push(l);
        }
        let mut cell = Declarations::new();
        let mut f = Decl::new("f", "f", "func f() int {\n\treturn y\n}");
        f.origin_line = Some(2);
        cell.add(DeclKind::Func, f);

        let spans = vec![
            DeclSpan { key: DeclKey::new(DeclKind::Var, "old"), start: 2, lines: 1 },
            DeclSpan { key: DeclKey::new(DeclKind::Func, "f"), start: 4, lines: 3 },
            DeclSpan { key: DeclKey::new(DeclKind::Func, "main"), start: 8, lines: 1 },
        ];
        (SourceMap::new(spans, &cell, None, &line_map), cell)
    }

    #[test]
    fn test_locate_maps_current_cell_lines() {
        let (map, _) = cell_map();
        let loc = map.locate(5).unwrap();
        assert_eq!(loc.key, DeclKey::new(DeclKind::Func, "f"));
        assert_eq!(loc.cell_line, Some(1));

        let old = map.locate(2).unwrap();
        assert_eq!(old.cell_line, None);
        assert_eq!(map.locate(3), None);
        assert_eq!(map.locate(8).unwrap().cell_line, None);
    }

    #[test]
    fn test_reformatted_declaration_maps_to_key() {
        let mut line_map = LineMap::default();
        for l in [None, None, Some(0), Some(1), Some(2), Some(3), Some(4)] {
            line_map.push(l);
        }
        let mut cell = Declarations::new();
        let mut f = Decl::new("f", "f", "func f() int {\n\n\n\treturn y\n}");
        f.origin_line = Some(2);
        cell.add(DeclKind::Func, f);

        // Blank lines collapsed: five cell lines became four.
        let spans = vec![DeclSpan { key: DeclKey::new(DeclKind::Func, "f"), start: 2, lines: 4 }];
        let map = SourceMap::new(spans, &cell, None, &line_map);
        let loc = map.locate(4).unwrap();
        assert_eq!(loc.key, DeclKey::new(DeclKind::Func, "f"));
        assert_eq!(loc.cell_line, None);

        let text = annotate("./main.go:5:9: undefined: y\n", "main.go", "", &map);
        assert_eq!(text, "./main.go:5:9: undefined: y  (in func:f)\n");
    }

    #[test]
    fn test_annotate_adds_context() {
        let (map, _) = cell_map();
        let source = "package main\n\nvar old = 1\n\nfunc f() int {\n\treturn y\n}\n\nfunc main() { flag.Parse() }\n";
        let output = "# command-line-arguments\n./main.go:6:9: undefined: y\n./main.go:3:5: old declared and not used\n";
        let text = annotate(output, "main.go", source, &map);
        assert!(text.starts_with("# command-line-arguments\n"));
        assert!(text.contains("./main.go:6:9: undefined: y  (cell line 2)\n"));
        assert!(text.contains(">    6 | \treturn y"));
        assert!(text.contains("./main.go:3:5: old declared and not used  (in var:old)\n"));
    }

    #[test]
    fn test_decl_spans_sorted_by_start() {
        let mut decls = Declarations::new();
        let mut g = Decl::new("g", "g", "func g() {}");
        g.origin_line = Some(9);
        let mut t = Decl::new("T", "T", "type T struct {\n}");
        t.origin_line = Some(3);
        decls.add(DeclKind::Func, g);
        decls.add(DeclKind::Type, t);
        decls.add(DeclKind::Var, Decl::new("nowhere", "nowhere", "var nowhere int"));
        let spans = decl_spans(&decls);
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0].key, DeclKey::new(DeclKind::Type, "T"));
        assert_eq!(spans[0].lines, 2);
        assert_eq!(spans[1].start, 9);
    }
}

//! Rendering the accumulated declarations into one complete program.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::cursor::Cursor;
use crate::decls::{Decl, DeclKey, DeclKind, DeclSpan, Declarations, ENTRY_POINT, RenderedBlock};
use crate::error::{Error, Result};

type BlockRenderer = fn(&Declarations, usize, &mut dyn Write) -> Result<RenderedBlock>;

/// Category blocks, in the order they appear in the program.
const BLOCKS: [(&str, BlockRenderer); 5] = [
    ("imports", Declarations::render_imports),
    ("types", Declarations::render_types),
    ("constants", Declarations::render_constants),
    ("variables", Declarations::render_variables),
    ("functions", Declarations::render_functions),
];

/// Where things landed in a rendered program.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderedProgram {
    /// Cursor of the first declaration carrying one, in program lines.
    pub cursor: Option<Cursor>,
    /// Generated lines of every declaration, entry point last.
    pub spans: Vec<DeclSpan>,
    /// Total number of lines written.
    pub lines: usize,
}

/// Render `decls` plus `entry` to `w`.
///
/// Stops at the first failing block; whatever was written so far stays written.
pub fn render_program(decls: &Declarations, entry: &Decl, w: &mut dyn Write) -> Result<RenderedProgram> {
    let mut program = RenderedProgram::default();

    write!(w, "package main\n\n")?;
    let mut line_num = 2;

    for (name, render) in BLOCKS {
        let block = render(decls, line_num, w).map_err(|source| Error::Render {
            block: name,
            source: Box::new(source),
        })?;
        tracing::trace!(block = name, from = line_num, to = block.next_line, "rendered block");
        line_num = block.next_line;
        if program.cursor.is_none() {
            program.cursor = block.cursor;
        }
        program.spans.extend(block.spans);
    }

    writeln!(w)?;
    line_num += 1;
    if program.cursor.is_none() {
        program.cursor = entry.cursor.map(|c| c.shifted(line_num));
    }
    writeln!(w, "{}", entry.definition.trim_end_matches('\n'))?;
    program.spans.push(DeclSpan {
        key: DeclKey::new(DeclKind::Func, ENTRY_POINT),
        start: line_num,
        lines: entry.line_count(),
    });
    program.lines = line_num + entry.line_count();
    Ok(program)
}

/// Render the complete program to `path`, creating or truncating it.
///
/// # Arguments
///
/// * `path` - Program file, usually the session's `main.go`
/// * `decls` - Declarations rendered in fixed block order
/// * `entry` - The `main` function, rendered last
///
/// # Errors
///
/// Returns `Error::Materialize` if the file cannot be created or flushed, and
/// `Error::Render` naming the block that failed. Lines written before a
/// failure are kept in the file.
pub fn write_program(path: &Path, decls: &Declarations, entry: &Decl) -> Result<RenderedProgram> {
    let file = File::create(path).map_err(|source| Error::Materialize {
        path: path.to_path_buf(),
        source,
    })?;
    let mut w = BufWriter::new(file);
    let rendered = render_program(decls, entry, &mut w);
    // Flush even on failure: the partial program is useful for diagnosis.
    let flushed = w.flush().map_err(|source| Error::Materialize {
        path: path.to_path_buf(),
        source,
    });
    let rendered = rendered?;
    flushed?;
    if let Some(cursor) = rendered.cursor {
        tracing::debug!(%cursor, "cursor in rendered program");
    }
    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decls::Import;

    fn sample() -> Declarations {
        let mut decls = Declarations::new();
        decls.add_import(Import::new("fmt", None));
        decls.add(DeclKind::Type, Decl::new("T", "T", "type T struct {\n\tv int\n}"));
        decls.add(DeclKind::Const, Decl::new("N", "N", "const N = 3"));
        decls.add(DeclKind::Var, Decl::new("x", "x", "var x = N"));
        decls.add(DeclKind::Func, Decl::new("f", "f", "func f() int {\n\treturn x\n}"));
        decls
    }

    fn render(decls: &Declarations, entry: &Decl) -> (String, RenderedProgram) {
        let mut buf = Vec::new();
        let program = render_program(decls, entry, &mut buf).unwrap();
        (String::from_utf8(buf).unwrap(), program)
    }

    #[test]
    fn test_render_order_and_layout() {
        let (text, program) = render(&sample(), &Decl::stub_entry_point());
        let expected = "package main\n\n\
            import (\n\t\"fmt\"\n)\n\n\
            type T struct {\n\tv int\n}\n\n\
            const N = 3\n\n\
            var x = N\n\n\
            func f() int {\n\treturn x\n}\n\n\
            \nfunc main() { flag.Parse() }\n";
        assert_eq!(text, expected);
        assert_eq!(program.lines, text.lines().count());
        let main = program.spans.last().unwrap();
        assert_eq!(main.key, DeclKey::new(DeclKind::Func, "main"));
        assert_eq!(text.lines().nth(main.start).unwrap(), "func main() { flag.Parse() }");
    }

    #[test]
    fn test_render_is_deterministic() {
        let mut decls = sample();
        for name in ["zeta", "alpha", "mid", "beta"] {
            decls.add(DeclKind::Func, Decl::new(name, name, format!("func {name}() {{}}")));
        }
        let entry = Decl::stub_entry_point();
        let (first, p1) = render(&decls, &entry);
        let (second, p2) = render(&decls.clone(), &entry);
        assert_eq!(first, second);
        assert_eq!(p1, p2);
        let alpha = first.find("func alpha").unwrap();
        let zeta = first.find("func zeta").unwrap();
        assert!(alpha < zeta);
    }

    #[test]
    fn test_spans_point_at_declarations() {
        let (text, program) = render(&sample(), &Decl::stub_entry_point());
        let lines: Vec<&str> = text.lines().collect();
        for span in &program.spans {
            let first = lines[span.start];
            match span.key.kind {
                DeclKind::Import => assert_eq!(first, "\t\"fmt\""),
                kind => assert!(first.starts_with(kind.as_str()), "{first:?} for {}", span.key),
            }
        }
    }

    #[test]
    fn test_cursor_in_declaration() {
        let mut decls = sample();
        let mut f = decls.get(DeclKind::Func, "f").unwrap().clone();
        f.cursor = Some(Cursor::new(1, 8));
        decls.add(DeclKind::Func, f);
        let (text, program) = render(&decls, &Decl::stub_entry_point());
        let cursor = program.cursor.unwrap();
        assert_eq!(cursor.col, 8);
        assert_eq!(text.lines().nth(cursor.line).unwrap(), "\treturn x");
    }

    #[test]
    fn test_cursor_in_entry_point() {
        let mut entry = Decl::new("main", "main", "func main() {\n\tflag.Parse()\n\tf()\n}");
        entry.cursor = Some(Cursor::new(2, 2));
        let (text, program) = render(&sample(), &entry);
        let cursor = program.cursor.unwrap();
        assert_eq!(text.lines().nth(cursor.line).unwrap(), "\tf()");
        assert_eq!(cursor.col, 2);
    }

    #[test]
    fn test_first_cursor_wins() {
        let mut decls = sample();
        let mut t = decls.get(DeclKind::Type, "T").unwrap().clone();
        t.cursor = Some(Cursor::new(0, 5));
        decls.add(DeclKind::Type, t);
        let mut entry = Decl::stub_entry_point();
        entry.cursor = Some(Cursor::new(0, 0));
        let (text, program) = render(&decls, &entry);
        let cursor = program.cursor.unwrap();
        assert!(text.lines().nth(cursor.line).unwrap().starts_with("type T"));
    }

    #[test]
    fn test_failing_block_is_named_and_stops_rendering() {
        let mut decls = sample();
        decls.add(DeclKind::Const, Decl::new("bad", "bad", ""));
        let mut buf = Vec::new();
        let err = render_program(&decls, &Decl::stub_entry_point(), &mut buf).unwrap_err();
        match &err {
            Error::Render { block, .. } => assert_eq!(*block, "constants"),
            other => panic!("unexpected error: {other}"),
        }
        let partial = String::from_utf8(buf).unwrap();
        assert!(partial.contains("type T"));
        assert!(!partial.contains("var x"));
        assert!(!partial.contains("func main"));
    }

    #[test]
    fn test_write_program_leaves_partial_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("main.go");
        let mut decls = sample();
        decls.add(DeclKind::Var, Decl::new("bad", "bad", "\n"));
        assert!(write_program(&path, &decls, &Decl::stub_entry_point()).is_err());
        let partial = std::fs::read_to_string(&path).unwrap();
        assert!(partial.starts_with("package main"));
        assert!(partial.contains("const N = 3"));
    }
}

//! The build pipeline of a cell.
//!
//! Materialize, parse, merge into a copy of the committed declarations,
//! render, resolve imports, compile. Every stage before the commit works on
//! the copy; the committed declarations change in exactly one place.

use super::diagnostics::{self, SourceMap};
use super::materialize::{LineMap, SkipLines, write_cell_program};
use super::render::{RenderedProgram, write_program};
use crate::cursor::Cursor;
use crate::decls::{Decl, DeclKey, Declarations};
use crate::error::{Error, Result};
use crate::execute::{OutputSink, ProgramExit, Stream, run_checked};
use crate::paths::MAIN_FILE;
use crate::session::{CellReport, Session};

const GOIMPORTS_HINT: &str = "goimports adds missing standard imports automatically. Install it with:\n\n    \
                              go install golang.org/x/tools/cmd/goimports@latest";

const GO_HINT: &str = "install Go from https://go.dev/dl/";

/// Cursor position in the merged program.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgramCursor {
    pub cursor: Option<Cursor>,
    /// Declaration under the cursor.
    pub key: Option<DeclKey>,
}

/// Declarations of one cell, split from its entry point.
struct CellDecls {
    decls: Declarations,
    entry: Decl,
    cursor_key: Option<DeclKey>,
    line_map: LineMap,
    cursor: Option<Cursor>,
}

impl Session {
    /// Build and run a cell, committing its declarations if it compiles.
    ///
    /// Lines in `skip` are left out of the program.
    pub fn run_pipeline<S: AsRef<str>>(
        &mut self,
        lines: &[S],
        skip: &SkipLines,
        sink: &dyn OutputSink,
    ) -> Result<CellReport> {
        let cell = self.parse_cell(lines, skip, None)?;

        tracing::debug!(stage = "merge", cell_decls = cell.decls.len(), "merging into a copy");
        let mut tentative = self.decls.clone();
        tentative.merge_from(&cell.decls);

        tracing::debug!(stage = "render");
        let rendered = write_program(&self.work_dir.main_path(), &tentative, &cell.entry)?;

        self.ensure_module(sink)?;
        self.resolve_imports(sink)?;
        self.compile(&cell, &rendered, sink)?;

        let committed = cell.decls.keys();
        self.decls = tentative;
        tracing::info!(
            committed = committed.len(),
            total = self.decls.len(),
            "cell declarations committed"
        );

        let exit = self.execute(sink)?;
        Ok(CellReport {
            exit: Some(exit),
            committed,
        })
    }

    /// Locate `cursor` (cell coordinates) in the program the cell would build,
    /// without compiling or committing anything.
    pub fn cursor_in_program<S: AsRef<str>>(
        &mut self,
        lines: &[S],
        skip: &SkipLines,
        cursor: Cursor,
    ) -> Result<ProgramCursor> {
        let cell = self.parse_cell(lines, skip, Some(cursor))?;
        if cell.cursor.is_none() {
            tracing::debug!(%cursor, "cursor is not on an emitted line");
            return Ok(ProgramCursor::default());
        }

        let mut tentative = self.decls.clone();
        tentative.clear_cursors();
        tentative.merge_from(&cell.decls);
        let rendered = write_program(&self.work_dir.main_path(), &tentative, &cell.entry)?;
        Ok(ProgramCursor {
            cursor: rendered.cursor,
            key: cell.cursor_key,
        })
    }

    /// Materialize the cell and parse its declarations.
    fn parse_cell<S: AsRef<str>>(&self, lines: &[S], skip: &SkipLines, cursor: Option<Cursor>) -> Result<CellDecls> {
        let main_path = self.work_dir.main_path();

        tracing::debug!(stage = "materialize", lines = lines.len(), skipped = skip.len());
        let materialized = write_cell_program(&main_path, lines, skip, cursor)?;

        tracing::debug!(stage = "parse");
        let parsed = self
            .parser
            .parse(&main_path, materialized.cursor)
            .map_err(|e| remap_parse_error(e, &materialized.line_map))?;

        let mut decls = parsed.decls;
        let entry = match decls.take_entry_point() {
            Some(entry) => entry,
            None => {
                tracing::debug!("no entry point in cell, using stub");
                Decl::stub_entry_point()
            }
        };
        Ok(CellDecls {
            decls,
            entry,
            cursor_key: parsed.cursor_key,
            line_map: materialized.line_map,
            cursor: materialized.cursor,
        })
    }

    /// Create the module file on the first build.
    fn ensure_module(&self, sink: &dyn OutputSink) -> Result<()> {
        if self.work_dir.go_mod_path().exists() {
            return Ok(());
        }
        let go = &self.config.toolchain.go;
        if self.runner.lookup(go).is_none() {
            return Err(Error::ToolMissing {
                tool: go.clone(),
                hint: GO_HINT.to_string(),
            });
        }
        let args = self.config.toolchain.mod_init_args(&self.config.package);
        forward_failure(run_checked(&*self.runner, go, &args, self.work_dir.root()), sink)?;
        Ok(())
    }

    /// Fix the imports of the rendered program and fetch dependencies.
    fn resolve_imports(&self, sink: &dyn OutputSink) -> Result<()> {
        let toolchain = &self.config.toolchain;
        let tool = &toolchain.imports;
        if self.runner.lookup(tool).is_none() {
            let hint = if tool == "goimports" {
                GOIMPORTS_HINT.to_string()
            } else {
                format!("make sure {tool} is installed and in PATH")
            };
            return Err(Error::ToolMissing {
                tool: tool.clone(),
                hint,
            });
        }

        tracing::debug!(stage = "imports");
        let args = toolchain.imports_args(&self.work_dir.main_path());
        forward_failure(run_checked(&*self.runner, tool, &args, self.work_dir.root()), sink)?;

        if self.config.auto_get {
            tracing::debug!(stage = "fetch");
            let args = toolchain.get_args();
            forward_failure(
                run_checked(&*self.runner, &toolchain.go, &args, self.work_dir.root()),
                sink,
            )?;
        }
        Ok(())
    }

    fn compile(&self, cell: &CellDecls, rendered: &RenderedProgram, sink: &dyn OutputSink) -> Result<()> {
        tracing::debug!(stage = "compile");
        let toolchain = &self.config.toolchain;
        let args = toolchain.build_args(&self.work_dir.binary_path());
        match run_checked(&*self.runner, &toolchain.go, &args, self.work_dir.root()) {
            Ok(_) => Ok(()),
            Err(Error::ToolFailed { tool, command, output }) => {
                sink.write(Stream::Stderr, &self.annotate(&output, cell, rendered));
                Err(Error::ToolFailed { tool, command, output })
            }
            Err(e) => Err(e),
        }
    }

    /// Annotate compiler output with positions in the cell.
    fn annotate(&self, output: &str, cell: &CellDecls, rendered: &RenderedProgram) -> String {
        let main_path = self.work_dir.main_path();
        let source = match std::fs::read_to_string(&main_path) {
            Ok(source) => source,
            Err(e) => {
                tracing::warn!(error = %e, "cannot read program for diagnostics");
                return output.to_string();
            }
        };
        // Import resolution may have moved lines; prefer spans of the file as it is now.
        let spans = match self.parser.parse(&main_path, None) {
            Ok(parsed) => diagnostics::decl_spans(&parsed.decls),
            Err(e) => {
                tracing::debug!(error = %e, "using rendered spans for diagnostics");
                rendered.spans.clone()
            }
        };
        let map = SourceMap::new(spans, &cell.decls, Some(&cell.entry), &cell.line_map);
        diagnostics::annotate(output, MAIN_FILE, &source, &map)
    }

    /// Run the compiled program. A failing program is reported, not an error.
    fn execute(&self, sink: &dyn OutputSink) -> Result<ProgramExit> {
        tracing::debug!(stage = "execute", args = ?self.config.args);
        let exit = self.runner.stream(
            &self.work_dir.binary_path(),
            &self.config.args,
            self.work_dir.root(),
            sink,
        )?;
        if !exit.success() {
            let notice = match exit.code {
                Some(code) => format!("exit status {code}\n"),
                None => "program terminated by a signal\n".to_string(),
            };
            sink.write(Stream::Stderr, &notice);
        }
        Ok(exit)
    }
}

/// Forward the raw output of a failed tool to the session output.
fn forward_failure(result: Result<String>, sink: &dyn OutputSink) -> Result<String> {
    if let Err(Error::ToolFailed { output, .. }) = &result {
        sink.write(Stream::Stderr, output);
        if !output.ends_with('\n') && !output.is_empty() {
            sink.write(Stream::Stderr, "\n");
        }
    }
    result
}

/// Translate the line of a parse error from the materialized file to the cell.
fn remap_parse_error(err: Error, line_map: &LineMap) -> Error {
    match err {
        Error::Parse { line: Some(line), message } => Error::Parse {
            line: line_map.cell_line(line),
            message,
        },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remap_parse_error() {
        let mut map = LineMap::default();
        for l in [None, None, Some(0), Some(1)] {
            map.push(l);
        }
        let err = remap_parse_error(
            Error::Parse {
                line: Some(3),
                message: "expected declaration".to_string(),
            },
            &map,
        );
        assert!(matches!(err, Error::Parse { line: Some(1), .. }));

        let synthetic = remap_parse_error(
            Error::Parse {
                line: Some(0),
                message: "x".to_string(),
            },
            &map,
        );
        assert!(matches!(synthetic, Error::Parse { line: None, .. }));
    }

    #[test]
    fn test_forward_failure_writes_output() {
        let sink = crate::execute::CapturedOutput::new();
        let result = forward_failure(
            Err(Error::ToolFailed {
                tool: "goimports".to_string(),
                command: "goimports -w main.go".to_string(),
                output: "main.go:3:1: expected declaration".to_string(),
            }),
            &sink,
        );
        assert!(result.is_err());
        assert_eq!(sink.stderr(), "main.go:3:1: expected declaration\n");

        assert!(forward_failure(Ok(String::new()), &sink).is_ok());
    }
}

//! Per-category rendering of declarations.
//!
//! Each renderer writes one contiguous block, sorted by key, starting at the
//! absolute line `line_num`, and reports where it stopped.

use std::io::Write;

use rustc_hash::FxHashMap;

use super::{Decl, DeclKey, DeclKind, Declarations};
use crate::cursor::Cursor;
use crate::error::{Error, Result};

/// Generated lines occupied by one declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclSpan {
    pub key: DeclKey,
    /// First generated line, 0-based.
    pub start: usize,
    pub lines: usize,
}

impl DeclSpan {
    pub fn contains(&self, line: usize) -> bool {
        line >= self.start && line < self.start + self.lines
    }
}

/// Outcome of rendering one block.
#[derive(Debug, Clone, Default)]
pub struct RenderedBlock {
    /// Line counter after the block.
    pub next_line: usize,
    /// Cursor of a declaration in the block, in absolute lines.
    pub cursor: Option<Cursor>,
    pub spans: Vec<DeclSpan>,
}

impl Declarations {
    /// Render all imports as a single `import ( ... )` block.
    pub fn render_imports(&self, line_num: usize, w: &mut dyn Write) -> Result<RenderedBlock> {
        let mut block = RenderedBlock {
            next_line: line_num,
            ..Default::default()
        };
        if self.imports.is_empty() {
            return Ok(block);
        }

        writeln!(w, "import (")?;
        block.next_line += 1;
        for key in sorted_keys(&self.imports) {
            let import = &self.imports[key];
            if import.path.is_empty() || import.path.contains(['"', '\n']) {
                return Err(Error::InvalidDeclaration {
                    key: format!("import:{key}"),
                    message: format!("bad import path {:?}", import.path),
                });
            }
            writeln!(w, "\t{}", import.spec())?;
            if let Some(cursor) = import.cursor {
                // Shifted right by the tab.
                block.cursor = Some(Cursor::new(block.next_line, cursor.col + 1));
            }
            block.spans.push(DeclSpan {
                key: DeclKey::new(DeclKind::Import, key.clone()),
                start: block.next_line,
                lines: 1,
            });
            block.next_line += 1;
        }
        writeln!(w, ")")?;
        writeln!(w)?;
        block.next_line += 2;
        Ok(block)
    }

    pub fn render_types(&self, line_num: usize, w: &mut dyn Write) -> Result<RenderedBlock> {
        render_decls(&self.types, DeclKind::Type, line_num, w)
    }

    pub fn render_constants(&self, line_num: usize, w: &mut dyn Write) -> Result<RenderedBlock> {
        render_decls(&self.constants, DeclKind::Const, line_num, w)
    }

    pub fn render_variables(&self, line_num: usize, w: &mut dyn Write) -> Result<RenderedBlock> {
        render_decls(&self.variables, DeclKind::Var, line_num, w)
    }

    pub fn render_functions(&self, line_num: usize, w: &mut dyn Write) -> Result<RenderedBlock> {
        render_decls(&self.functions, DeclKind::Func, line_num, w)
    }
}

/// Write each declaration followed by a blank line.
fn render_decls(
    table: &FxHashMap<String, Decl>,
    kind: DeclKind,
    line_num: usize,
    w: &mut dyn Write,
) -> Result<RenderedBlock> {
    let mut block = RenderedBlock {
        next_line: line_num,
        ..Default::default()
    };
    for key in sorted_keys(table) {
        let decl = &table[key];
        let definition = decl.definition.trim_end_matches('\n');
        if definition.trim().is_empty() {
            return Err(Error::InvalidDeclaration {
                key: format!("{kind}:{key}"),
                message: "empty definition".to_string(),
            });
        }
        writeln!(w, "{definition}")?;
        writeln!(w)?;

        let lines = decl.line_count();
        if let Some(cursor) = decl.cursor {
            block.cursor = Some(cursor.shifted(block.next_line));
        }
        block.spans.push(DeclSpan {
            key: DeclKey::new(kind, key.clone()),
            start: block.next_line,
            lines,
        });
        block.next_line += lines + 1;
    }
    Ok(block)
}

fn sorted_keys<V>(table: &FxHashMap<String, V>) -> Vec<&String> {
    let mut keys: Vec<&String> = table.keys().collect();
    keys.sort();
    keys
}

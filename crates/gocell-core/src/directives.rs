//! `%` directives embedded in cells.
//!
//! Directive lines are interpreted before the build and skipped by the
//! materializer, so they never reach the compiler.

use crate::compile::{SkipLines, is_entry_marker};
use crate::decls::DeclKey;
use crate::error::{Error, Result};

/// A session command found in a cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// `%args a b ...`: arguments for the produced binary.
    Args(Vec<String>),
    /// `%autoget` / `%noautoget`.
    AutoGet(bool),
    /// `%reset`: forget all committed declarations and remove generated files.
    Reset,
    /// `%list` / `%ls`: print committed declaration keys.
    List,
    /// `%remove kind:name ...` / `%rm`.
    Remove(Vec<DeclKey>),
}

/// Directives of a cell, in order.
#[derive(Debug, Clone, Default)]
pub struct CellDirectives {
    pub directives: Vec<Directive>,
    /// Indices of the directive lines.
    pub skip: SkipLines,
}

impl CellDirectives {
    /// True if every non-blank line of the cell is a directive.
    pub fn covers<S: AsRef<str>>(&self, lines: &[S]) -> bool {
        lines
            .iter()
            .enumerate()
            .all(|(idx, line)| self.skip.contains(&idx) || line.as_ref().trim().is_empty())
    }
}

/// Extract the directives of a cell.
///
/// A directive is a line whose trimmed text starts with `%` and is not an
/// entry marker. Lines that begin inside a Go raw string literal are code.
pub fn parse_directives<S: AsRef<str>>(lines: &[S]) -> Result<CellDirectives> {
    let mut parsed = CellDirectives::default();
    let mut in_raw = false;
    for (idx, line) in lines.iter().enumerate() {
        let line = line.as_ref();
        let starts_in_raw = in_raw;
        in_raw = raw_string_open_after(line, in_raw);
        let line = line.trim();
        if starts_in_raw || !line.starts_with('%') || is_entry_marker(line) {
            continue;
        }
        parsed.directives.push(parse_directive(line)?);
        parsed.skip.insert(idx);
    }
    Ok(parsed)
}

/// Whether a raw string literal is still open at the end of `line`.
///
/// Interpreted strings, rune literals and line comments are skipped so their
/// backticks do not count.
fn raw_string_open_after(line: &str, mut in_raw: bool) -> bool {
    let mut chars = line.chars();
    while let Some(c) = chars.next() {
        if in_raw {
            in_raw = c != '`';
            continue;
        }
        match c {
            '`' => in_raw = true,
            '"' | '\'' => {
                while let Some(next) = chars.next() {
                    match next {
                        '\\' => {
                            chars.next();
                        }
                        _ if next == c => break,
                        _ => {}
                    }
                }
            }
            '/' if chars.as_str().starts_with('/') => break,
            _ => {}
        }
    }
    in_raw
}

fn invalid(line: &str, message: impl Into<String>) -> Error {
    Error::InvalidDirective {
        directive: line.to_string(),
        message: message.into(),
    }
}

fn parse_directive(line: &str) -> Result<Directive> {
    let mut words = line[1..].split_whitespace();
    let name = words.next().unwrap_or_default();
    let rest: Vec<String> = words.map(str::to_string).collect();
    let directive = match name {
        "args" => Directive::Args(rest),
        "autoget" | "noautoget" => {
            if !rest.is_empty() {
                return Err(invalid(line, "takes no arguments"));
            }
            Directive::AutoGet(name == "autoget")
        }
        "reset" | "list" | "ls" => {
            if !rest.is_empty() {
                return Err(invalid(line, "takes no arguments"));
            }
            if name == "reset" { Directive::Reset } else { Directive::List }
        }
        "remove" | "rm" => {
            if rest.is_empty() {
                return Err(invalid(line, "expected at least one kind:name key"));
            }
            let keys = rest
                .iter()
                .map(|word| {
                    DeclKey::parse(word).ok_or_else(|| invalid(line, format!("{word:?} is not a kind:name key")))
                })
                .collect::<Result<Vec<_>>>()?;
            Directive::Remove(keys)
        }
        "" => return Err(invalid(line, "missing directive name")),
        other => return Err(invalid(line, format!("unknown directive %{other}"))),
    };
    Ok(directive)
}

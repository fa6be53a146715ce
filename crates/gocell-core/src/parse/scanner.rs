//! Top-level declaration splitter for Go source.
//!
//! Tracks bracket depth outside of comments and literals, and cuts the file
//! into declarations at lines where the depth returns to zero. Comment lines
//! directly above a declaration are kept with it.

use std::iter::Peekable;
use std::path::Path;
use std::str::Chars;

use super::{DeclParser, ParsedFile};
use crate::cursor::Cursor;
use crate::decls::{Decl, DeclKey, DeclKind, Import};
use crate::error::{Error, Result};

/// The default [`DeclParser`].
#[derive(Debug, Default, Clone, Copy)]
pub struct TopLevelScanner;

impl TopLevelScanner {
    pub fn new() -> Self {
        Self
    }

    /// Scan source text. `cursor` is in the coordinates of `source`.
    pub fn parse_str(&self, source: &str, cursor: Option<Cursor>) -> Result<ParsedFile> {
        let lines: Vec<&str> = source.lines().collect();
        let mut parsed = ParsedFile::default();

        for item in split_items(&lines)? {
            match item.kind {
                DeclKind::Import => collect_imports(&lines, &item, cursor, &mut parsed),
                kind => {
                    let decl = build_decl(&lines, &item, cursor)?;
                    if decl.cursor.is_some() {
                        parsed.cursor_key = Some(DeclKey::new(kind, decl.key.clone()));
                    }
                    parsed.decls.add(kind, decl);
                }
            }
        }
        Ok(parsed)
    }
}

impl DeclParser for TopLevelScanner {
    fn parse(&self, path: &Path, cursor: Option<Cursor>) -> Result<ParsedFile> {
        let source = std::fs::read_to_string(path)?;
        let parsed = self.parse_str(&source, cursor)?;
        tracing::debug!(
            path = %path.display(),
            decls = parsed.decls.len(),
            "scanned declarations"
        );
        Ok(parsed)
    }
}

/// Line range of one top-level declaration.
#[derive(Debug, Clone, Copy)]
struct Item {
    kind: DeclKind,
    /// First line, including attached comments.
    start: usize,
    /// Line holding the keyword.
    keyword_line: usize,
    /// Last line, inclusive.
    end: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Mode {
    #[default]
    Code,
    BlockComment,
    RawString,
}

#[derive(Debug, Default)]
struct Lexer {
    mode: Mode,
    depth: i32,
}

#[derive(Debug, Default)]
struct LineScan {
    has_code: bool,
    last_code: Option<char>,
}

impl Lexer {
    fn scan_line(&mut self, line: &str) -> LineScan {
        let mut scan = LineScan::default();
        let mut chars = line.chars().peekable();
        while let Some(c) = chars.next() {
            match self.mode {
                Mode::BlockComment => {
                    if c == '*' && chars.peek() == Some(&'/') {
                        chars.next();
                        self.mode = Mode::Code;
                    }
                }
                Mode::RawString => {
                    scan.has_code = true;
                    if c == '`' {
                        self.mode = Mode::Code;
                        scan.last_code = Some(c);
                    }
                }
                Mode::Code => {
                    match c {
                        '/' if chars.peek() == Some(&'/') => break,
                        '/' if chars.peek() == Some(&'*') => {
                            chars.next();
                            self.mode = Mode::BlockComment;
                            continue;
                        }
                        '"' | '\'' => skip_quoted(&mut chars, c),
                        '`' => self.mode = Mode::RawString,
                        '(' | '{' | '[' => self.depth += 1,
                        ')' | '}' | ']' => self.depth -= 1,
                        c if c.is_whitespace() => continue,
                        _ => {}
                    }
                    scan.has_code = true;
                    scan.last_code = Some(c);
                }
            }
        }
        scan
    }
}

fn skip_quoted(chars: &mut Peekable<Chars<'_>>, quote: char) {
    while let Some(c) = chars.next() {
        if c == '\\' {
            chars.next();
        } else if c == quote {
            break;
        }
    }
}

/// A trailing token that makes the expression continue on the next line.
fn continues(last: Option<char>) -> bool {
    matches!(
        last,
        Some(',' | '+' | '-' | '*' | '/' | '%' | '&' | '|' | '^' | '<' | '>' | '=' | '.' | '!' | ':')
    )
}

fn parse_error(line: usize, message: impl Into<String>) -> Error {
    Error::Parse {
        line: Some(line),
        message: message.into(),
    }
}

fn split_items(lines: &[&str]) -> Result<Vec<Item>> {
    let mut lexer = Lexer::default();
    let mut items = Vec::new();
    let mut current: Option<Item> = None;
    let mut comment_start: Option<usize> = None;

    for (idx, line) in lines.iter().copied().enumerate() {
        let code = if lexer.mode == Mode::BlockComment {
            line.split_once("*/").map_or("", |(_, rest)| rest)
        } else {
            line
        };
        let scan = lexer.scan_line(line);
        if lexer.depth < 0 {
            return Err(parse_error(idx, "unbalanced closing bracket"));
        }

        if current.is_none() {
            if !scan.has_code {
                if line.trim().is_empty() {
                    comment_start = None;
                } else {
                    comment_start.get_or_insert(idx);
                }
                continue;
            }
            let word = ident(code.trim_start());
            if word == "package" {
                comment_start = None;
                continue;
            }
            let Some(kind) = DeclKind::from_keyword(word) else {
                return Err(parse_error(
                    idx,
                    format!("expected declaration, found {:?}", line.trim()),
                ));
            };
            current = Some(Item {
                kind,
                start: comment_start.take().unwrap_or(idx),
                keyword_line: idx,
                end: idx,
            });
        }

        let done = match current.as_mut() {
            Some(item) => {
                item.end = idx;
                lexer.depth == 0 && lexer.mode == Mode::Code && !continues(scan.last_code)
            }
            None => false,
        };
        if done {
            items.extend(current.take());
        }
    }

    if let Some(item) = current {
        return Err(parse_error(
            item.keyword_line,
            format!("unterminated {} declaration", item.kind),
        ));
    }
    Ok(items)
}

/// Leading identifier of `text`.
fn ident(text: &str) -> &str {
    let end = text
        .char_indices()
        .find(|(_, c)| !(c.is_alphanumeric() || *c == '_'))
        .map_or(text.len(), |(i, _)| i);
    &text[..end]
}

fn build_decl(lines: &[&str], item: &Item, cursor: Option<Cursor>) -> Result<Decl> {
    let header = lines[item.keyword_line].trim_start();
    let rest = header
        .strip_prefix(item.kind.as_str())
        .unwrap_or(header)
        .trim_start();

    let (key, name) = match item.kind {
        DeclKind::Func => func_key(rest)
            .ok_or_else(|| parse_error(item.keyword_line, "function declaration without a name"))?,
        _ => {
            let name = match rest.strip_prefix('(') {
                Some(group) => group_first_name(group, &lines[item.keyword_line + 1..=item.end]),
                None => Some(ident(rest)).filter(|n| !n.is_empty()),
            };
            let name = name.ok_or_else(|| {
                parse_error(item.keyword_line, format!("{} declaration without a name", item.kind))
            })?;
            (name.to_string(), name.to_string())
        }
    };

    let mut decl = Decl::new(key, name, lines[item.start..=item.end].join("\n"));
    decl.origin_line = Some(item.start);
    if let Some(c) = cursor {
        if (item.start..=item.end).contains(&c.line) {
            decl.cursor = Some(Cursor::new(c.line - item.start, c.col));
        }
    }
    Ok(decl)
}

/// Key and name of a function header following `func`.
///
/// Methods are keyed `Receiver~Name` so they never collide with functions.
fn func_key(rest: &str) -> Option<(String, String)> {
    let Some(receiver_rest) = rest.strip_prefix('(') else {
        let name = ident(rest);
        return (!name.is_empty()).then(|| (name.to_string(), name.to_string()));
    };
    let close = receiver_rest.find(')')?;
    let receiver = receiver_rest[..close].split('[').next().unwrap_or_default();
    let recv_type = receiver.split_whitespace().last()?.trim_start_matches('*');
    let name = ident(receiver_rest[close + 1..].trim_start());
    if recv_type.is_empty() || name.is_empty() {
        return None;
    }
    Some((format!("{recv_type}~{name}"), name.to_string()))
}

/// First declared name of a `( ... )` group.
fn group_first_name<'a>(same_line: &'a str, following: &[&'a str]) -> Option<&'a str> {
    std::iter::once(same_line)
        .chain(following.iter().copied())
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with("//"))
        .take_while(|l| !l.starts_with(')'))
        .map(ident)
        .find(|n| !n.is_empty())
}

fn collect_imports(lines: &[&str], item: &Item, cursor: Option<Cursor>, parsed: &mut ParsedFile) {
    for idx in item.keyword_line..=item.end {
        let line = lines[idx];
        let mut offset = 0;
        if idx == item.keyword_line {
            offset = line.len() - line.trim_start().len() + "import".len();
        }
        let text = &line[offset..];
        let lead = text.len()
            - text
                .trim_start_matches(|c: char| c.is_whitespace() || c == '(')
                .len();
        offset += lead;

        let Some((alias, path)) = parse_import_spec(&line[offset..]) else {
            continue;
        };
        let mut import = Import::new(path, alias);
        if let Some(c) = cursor.filter(|c| c.line == idx) {
            import.cursor = Some(Cursor::new(0, c.col.saturating_sub(offset)));
            parsed.cursor_key = Some(DeclKey::new(DeclKind::Import, import.key.clone()));
        }
        parsed.decls.add_import(import);
    }
}

/// Parse `[alias] "path"`.
fn parse_import_spec(text: &str) -> Option<(Option<String>, String)> {
    let (alias, rest) = if text.starts_with(['"', '`']) {
        (None, text)
    } else {
        let alias = if text.starts_with('.') { "." } else { ident(text) };
        if alias.is_empty() {
            return None;
        }
        (Some(alias.to_string()), text[alias.len()..].trim_start())
    };
    let quote = rest.chars().next().filter(|q| *q == '"' || *q == '`')?;
    let body = &rest[1..];
    let end = body.find(quote)?;
    Some((alias, body[..end].to_string()))
}

//! Extraction of declarations from a generated source file.
//!
//! The pipeline only depends on the [`DeclParser`] contract. The bundled
//! [`TopLevelScanner`] splits a file into its top-level declarations without
//! type checking; anything deeper is left to the compiler.

mod scanner;

use std::path::Path;

use crate::cursor::Cursor;
use crate::decls::{DeclKey, Declarations};
use crate::error::Result;

pub use scanner::TopLevelScanner;

/// Declarations found in one file.
#[derive(Debug, Clone, Default)]
pub struct ParsedFile {
    pub decls: Declarations,
    /// Declaration that contains the requested cursor, if any.
    pub cursor_key: Option<DeclKey>,
}

/// Turns a source file into a set of declarations.
pub trait DeclParser: Send {
    /// Parse the file at `path`. When `cursor` is given (file coordinates),
    /// the declaration containing it carries the cursor relative to its own
    /// text and is named in [`ParsedFile::cursor_key`].
    fn parse(&self, path: &Path, cursor: Option<Cursor>) -> Result<ParsedFile>;
}

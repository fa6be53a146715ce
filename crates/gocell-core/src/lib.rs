//! Execution core for gocell, a cell-based Go notebook.
//!
//! This crate provides:
//! - Declaration store with copy, merge and commit semantics
//! - Cell materialization with cursor and line tracking
//! - Deterministic rendering of the merged program
//! - Build pipeline driving goimports, go get and go build
//! - Remapping of compiler diagnostics to cell lines
//! - Streaming execution of the produced binary

pub mod compile;
pub mod config;
pub mod cursor;
pub mod decls;
pub mod directives;
pub mod error;
pub mod execute;
pub mod parse;
pub mod paths;
pub mod session;

pub use compile::ProgramCursor;
pub use config::{SessionConfig, Toolchain};
pub use cursor::Cursor;
pub use decls::{Decl, DeclKey, DeclKind, Declarations, Import};
pub use directives::Directive;
pub use error::{Error, Result};
pub use execute::{CapturedOutput, OutputSink, ProgramExit, StdioSink, Stream, SystemRunner, ToolOutput, ToolRunner};
pub use parse::{DeclParser, ParsedFile, TopLevelScanner};
pub use paths::WorkDir;
pub use session::{CellReport, Session};

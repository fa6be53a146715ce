//! Error types for gocell-core.

use std::path::PathBuf;

use thiserror::Error;

/// Result type for gocell-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while executing a cell.
///
/// Every variant up to and including [`Error::ToolFailed`] aborts the build
/// pipeline before the commit point, so the committed declarations are never
/// touched by a failing cell.
#[derive(Debug, Error)]
pub enum Error {
    /// Writing a generated source file failed.
    #[error("failed to write {}: {source}", path.display())]
    Materialize {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Cell text does not consist of valid top-level declarations.
    #[error("parse error{}: {message}", line.map(|l| format!(" at line {}", l + 1)).unwrap_or_default())]
    Parse {
        /// 0-based line, relative to the cell when it could be mapped back.
        line: Option<usize>,
        message: String,
    },

    /// A declaration category failed to render.
    #[error("in block {block:?}: {source}")]
    Render {
        block: &'static str,
        #[source]
        source: Box<Error>,
    },

    /// A declaration record holds something that cannot be rendered.
    #[error("invalid declaration {key:?}: {message}")]
    InvalidDeclaration { key: String, message: String },

    /// A required external tool is not installed.
    #[error("program {tool} is not installed")]
    ToolMissing { tool: String, hint: String },

    /// An external tool exited with a non-zero status.
    #[error("failed to run {command:?}")]
    ToolFailed {
        tool: String,
        command: String,
        /// Combined stdout and stderr of the tool.
        output: String,
    },

    /// A `%` directive could not be understood.
    #[error("invalid directive {directive:?}: {message}")]
    InvalidDirective { directive: String, message: String },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Format the error together with advice on how to recover from it.
    pub fn with_hint(&self) -> String {
        match self {
            Error::ToolMissing { hint, .. } => format!("{self}\n{hint}"),
            Error::ToolFailed { tool, .. } => {
                format!("{self}\nhint: see the {tool} output above")
            }
            Error::Parse { .. } => format!(
                "{self}\nhint: only declarations (func, type, const, var, import) may appear \
                 outside of %main; put statements after a %main line"
            ),
            Error::Render { .. } | Error::InvalidDeclaration { .. } => format!(
                "{self}\nhint: the accumulated declarations look corrupted, %reset clears them"
            ),
            _ => self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_display_is_one_based() {
        let err = Error::Parse {
            line: Some(2),
            message: "expected declaration".to_string(),
        };
        assert_eq!(err.to_string(), "parse error at line 3: expected declaration");
    }

    #[test]
    fn test_render_error_names_block() {
        let err = Error::Render {
            block: "imports",
            source: Box::new(Error::InvalidDeclaration {
                key: "import:".to_string(),
                message: "empty import path".to_string(),
            }),
        };
        assert!(err.to_string().starts_with("in block \"imports\""));
    }

    #[test]
    fn test_tool_missing_hint_includes_instructions() {
        let err = Error::ToolMissing {
            tool: "goimports".to_string(),
            hint: "go install golang.org/x/tools/cmd/goimports@latest".to_string(),
        };
        assert!(err.with_hint().contains("go install"));
    }
}

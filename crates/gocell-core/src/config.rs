//! Session configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Names of the external tools a session drives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Toolchain {
    /// The compiler driver.
    pub go: String,
    /// Subcommand that compiles the program.
    pub build: String,
    /// Import resolution tool, run as `<imports> -w <file>`.
    pub imports: String,
    /// Subcommand that fetches missing dependencies.
    pub get: String,
}

impl Default for Toolchain {
    fn default() -> Self {
        Self {
            go: "go".to_string(),
            build: "build".to_string(),
            imports: "goimports".to_string(),
            get: "get".to_string(),
        }
    }
}

impl Toolchain {
    /// Arguments for `go build -o <binary>`.
    pub fn build_args(&self, binary: &Path) -> Vec<String> {
        vec![self.build.clone(), "-o".to_string(), binary.display().to_string()]
    }

    /// Arguments for the import tool, rewriting `file` in place.
    pub fn imports_args(&self, file: &Path) -> Vec<String> {
        vec!["-w".to_string(), file.display().to_string()]
    }

    pub fn get_args(&self) -> Vec<String> {
        vec![self.get.clone()]
    }

    /// Arguments creating the module file for `package`.
    pub fn mod_init_args(&self, package: &str) -> Vec<String> {
        vec!["mod".to_string(), "init".to_string(), package.to_string()]
    }
}

/// Configuration of one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Module name, also the name of the produced binary.
    pub package: String,
    /// Working directory. A fresh temporary directory when unset.
    pub work_dir: Option<PathBuf>,
    /// Arguments passed to the produced binary.
    pub args: Vec<String>,
    /// Fetch missing dependencies after resolving imports.
    pub auto_get: bool,
    pub toolchain: Toolchain,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            package: "gc_session".to_string(),
            work_dir: None,
            args: Vec::new(),
            auto_get: true,
            toolchain: Toolchain::default(),
        }
    }
}

impl SessionConfig {
    /// Default configuration for a fixed working directory.
    pub fn in_dir(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: Some(work_dir.into()),
            ..Self::default()
        }
    }
}

//! Working directory layout.
//!
//! ```text
//! <work_dir>/
//! ├── go.mod      # created on first build
//! ├── main.go     # overwritten by every stage of every cell
//! └── <package>   # produced binary
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Fixed name of the generated source file.
pub const MAIN_FILE: &str = "main.go";

/// Files of one session.
#[derive(Debug)]
pub struct WorkDir {
    root: PathBuf,
    package: String,
    /// Remove the directory on drop.
    owned: bool,
}

impl WorkDir {
    /// Use `root` as the working directory, creating it if needed.
    ///
    /// # Arguments
    ///
    /// * `root` - Directory that receives `main.go`, `go.mod` and the binary
    /// * `package` - Module name, also the name of the produced binary
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the directory cannot be created. The directory
    /// is left in place when the `WorkDir` is dropped.
    pub fn create(root: impl Into<PathBuf>, package: &str) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            package: package.to_string(),
            owned: false,
        })
    }

    /// Create a fresh `gocell-<uuid>` directory under the system temp dir.
    /// It is removed when the `WorkDir` is dropped.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the directory cannot be created.
    pub fn temporary(package: &str) -> Result<Self> {
        let root = std::env::temp_dir().join(format!("gocell-{}", uuid::Uuid::new_v4()));
        let mut dir = Self::create(root, package)?;
        dir.owned = true;
        Ok(dir)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn package(&self) -> &str {
        &self.package
    }

    /// The generated source file.
    pub fn main_path(&self) -> PathBuf {
        self.root.join(MAIN_FILE)
    }

    /// The produced binary, named after the package.
    pub fn binary_path(&self) -> PathBuf {
        let name = if cfg!(windows) {
            format!("{}.exe", self.package)
        } else {
            self.package.clone()
        };
        self.root.join(name)
    }

    pub fn go_mod_path(&self) -> PathBuf {
        self.root.join("go.mod")
    }

    fn go_sum_path(&self) -> PathBuf {
        self.root.join("go.sum")
    }

    /// Remove the generated source, module files and binary. Other files in
    /// the directory are left alone.
    pub fn clean(&self) -> Result<()> {
        for path in [self.main_path(), self.go_mod_path(), self.go_sum_path(), self.binary_path()] {
            match fs::remove_file(&path) {
                Err(e) if e.kind() != std::io::ErrorKind::NotFound => return Err(e.into()),
                _ => {}
            }
        }
        Ok(())
    }
}

impl Drop for WorkDir {
    fn drop(&mut self) {
        if self.owned {
            if let Err(e) = fs::remove_dir_all(&self.root) {
                tracing::warn!(dir = %self.root.display(), error = %e, "failed to remove working directory");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_layout() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let dir = WorkDir::create(temp.path().join("session"), "demo").unwrap();
        assert!(dir.root().exists());
        assert!(dir.main_path().ends_with("main.go"));
        assert!(dir.go_mod_path().ends_with("go.mod"));
        assert_eq!(dir.binary_path().parent(), Some(dir.root()));
        assert!(dir.binary_path().file_name().unwrap().to_string_lossy().starts_with("demo"));
    }

    #[test]
    fn test_clean() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let dir = WorkDir::create(temp.path(), "demo").unwrap();
        fs::write(dir.main_path(), "package main\n").unwrap();
        fs::write(dir.go_mod_path(), "module demo\n").unwrap();
        fs::write(dir.binary_path(), "").unwrap();
        fs::write(temp.path().join("notes.txt"), "keep").unwrap();
        dir.clean().unwrap();
        assert!(!dir.main_path().exists());
        assert!(!dir.go_mod_path().exists());
        assert!(!dir.binary_path().exists());
        assert!(temp.path().join("notes.txt").exists());

        // Nothing left to remove is fine.
        dir.clean().unwrap();
    }

    #[test]
    fn test_temporary_removed_on_drop() {
        let dir = WorkDir::temporary("demo").unwrap();
        let root = dir.root().to_path_buf();
        assert!(root.exists());
        assert!(root.file_name().unwrap().to_string_lossy().starts_with("gocell-"));
        drop(dir);
        assert!(!root.exists());
    }

    #[test]
    fn test_created_dir_is_kept() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let root = temp.path().join("keep");
        drop(WorkDir::create(&root, "demo").unwrap());
        assert!(root.exists());
    }
}

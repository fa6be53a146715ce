//! Run command implementation for gocell CLI.
//!
//! Executes cell files in order within one session, stopping at the first
//! cell that fails.

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use gocell_core::{Session, SessionConfig, StdioSink};

use crate::colors;

/// Split a cell file into lines.
pub fn read_cell(path: &Path) -> anyhow::Result<Vec<String>> {
    let text = std::fs::read_to_string(path).with_context(|| format!("Failed to read cell {}", path.display()))?;
    Ok(text.lines().map(str::to_string).collect())
}

/// Execute cell files.
pub fn execute(config: SessionConfig, files: &[PathBuf]) -> anyhow::Result<()> {
    let start = Instant::now();
    let mut session = Session::new(config)?;
    tracing::debug!(work_dir = %session.work_dir().root().display(), "session started");

    for (idx, path) in files.iter().enumerate() {
        let lines = read_cell(path)?;
        eprintln!(
            "{}── [{}] {} ──{}",
            colors::DIM,
            idx + 1,
            path.display(),
            colors::RESET
        );
        if let Err(err) = session.execute_cell(&lines, &StdioSink) {
            eprintln!("{}{}cell {} failed{}", colors::BOLD, colors::RED, path.display(), colors::RESET);
            return Err(err.into());
        }
    }

    eprintln!(
        "{}Completed{} {} cells in {:.2}s ({} declarations)",
        colors::GREEN,
        colors::RESET,
        files.len(),
        start.elapsed().as_secs_f64(),
        session.declarations().len()
    );
    Ok(())
}

//! Loading the session configuration.

use std::path::{Path, PathBuf};

use anyhow::Context;
use gocell_core::SessionConfig;

use crate::SessionArgs;

/// Default location of the configuration file.
fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("gocell").join("config.json"))
}

/// Load the configuration from `path`, or from the default location if it
/// exists, or fall back to defaults.
pub fn load(path: Option<&Path>) -> anyhow::Result<SessionConfig> {
    match path {
        Some(path) => read(path),
        None => match default_path().filter(|p| p.is_file()) {
            Some(path) => read(&path),
            None => Ok(SessionConfig::default()),
        },
    }
}

fn read(path: &Path) -> anyhow::Result<SessionConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config = serde_json::from_str(&text)
        .with_context(|| format!("Invalid config file {}", path.display()))?;
    tracing::debug!(path = %path.display(), "loaded config");
    Ok(config)
}

/// Apply command line overrides.
pub fn apply(mut config: SessionConfig, args: &SessionArgs) -> SessionConfig {
    if let Some(package) = &args.package {
        config.package = package.clone();
    }
    if let Some(workdir) = &args.workdir {
        config.work_dir = Some(workdir.clone());
    }
    if args.no_autoget {
        config.auto_get = false;
    }
    config
}

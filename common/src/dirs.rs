//! XDG directory layout for audio-research.

use std::path::PathBuf;

use anyhow::{Context, Result};
use xdg::BaseDirectories;

const APP_NAME: &str = "audio-research";

fn base_dirs() -> BaseDirectories {
    BaseDirectories::with_prefix(APP_NAME)
}

/// Return the XDG state directory, creating it if needed.
/// `~/.local/state/audio-research/`
pub fn state_dir() -> Result<PathBuf> {
    let dir = base_dirs()
        .get_state_home()
        .context("Failed to get XDG state directory (HOME not set?)")?;
    std::fs::create_dir_all(&dir).context("Failed to create state directory")?;
    Ok(dir)
}

/// Return the XDG config directory (no creation - config may not exist yet).
/// `~/.config/audio-research/`
pub fn config_dir() -> Result<PathBuf> {
    base_dirs()
        .get_config_home()
        .context("Could not determine config directory (HOME not set?)")
}

/// Daemon config file.
/// `~/.config/audio-research/config.toml`
pub fn config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

/// Daemon Unix socket path.
/// `~/.local/state/audio-research/daemon.sock`
pub fn socket_path() -> Result<PathBuf> {
    Ok(state_dir()?.join("daemon.sock"))
}

/// Daemon PID file path.
pub fn pid_path() -> Result<PathBuf> {
    Ok(state_dir()?.join("daemon.pid"))
}

/// Daemon log file path.
pub fn log_path() -> Result<PathBuf> {
    Ok(state_dir()?.join("daemon.log"))
}

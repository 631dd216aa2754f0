//! Unix socket setup for the daemon's gRPC endpoint.

use std::path::Path;

use anyhow::{Context, Result, bail};
use tokio::net::UnixListener;
use tracing::warn;

/// Bind the daemon socket.
///
/// A leftover socket file from a crashed daemon is replaced; a socket that
/// still accepts connections means another daemon owns it.
pub fn create_listener(path: &Path) -> Result<UnixListener> {
    if path.exists() {
        if std::os::unix::net::UnixStream::connect(path).is_ok() {
            bail!("Another daemon is already listening on {}", path.display());
        }
        warn!(path = %path.display(), "Removing stale socket");
        std::fs::remove_file(path).context("Failed to remove stale socket")?;
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create socket directory")?;
    }

    UnixListener::bind(path)
        .with_context(|| format!("Failed to bind Unix socket at {}", path.display()))
}

/// Remove the socket file.
pub fn cleanup_socket(path: &Path) {
    let _ = std::fs::remove_file(path);
}

//! Daemon runner that wires the components together and serves gRPC.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use audio_research_common::dirs;
use tokio::sync::oneshot;
use tonic::transport::Server;
use tracing::{error, info};

use crate::config::Config;
use crate::controller::Controller;
use crate::server::AudioResearchService;
use crate::socket::{cleanup_socket, create_listener};

/// Paths used by the daemon at runtime.
pub struct DaemonPaths {
    pub socket: PathBuf,
    pub pid: PathBuf,
}

impl DaemonPaths {
    /// Paths under the XDG state directory.
    pub fn from_xdg() -> Result<Self> {
        Ok(Self {
            socket: dirs::socket_path()?,
            pid: dirs::pid_path()?,
        })
    }
}

/// Run the daemon with default XDG paths.
pub async fn run(config: Config) -> Result<()> {
    run_with_paths(DaemonPaths::from_xdg()?, config).await
}

/// Run the daemon until a Shutdown RPC or Ctrl-C, then drain running jobs.
pub async fn run_with_paths(paths: DaemonPaths, config: Config) -> Result<()> {
    let sock_path = paths.socket;
    let pid_file = paths.pid;

    let listener = create_listener(&sock_path)?;
    info!(path = %sock_path.display(), "Listening on Unix socket");

    let pid = std::process::id();
    std::fs::write(&pid_file, pid.to_string()).context("Failed to write PID file")?;
    info!(pid, path = %pid_file.display(), "Wrote PID file");

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let controller = Arc::new(Controller::new(config, shutdown_tx));
    let sweeper = controller.start_retention();

    let service = AudioResearchService::new(Arc::clone(&controller));

    let incoming = async_stream::stream! {
        loop {
            match listener.accept().await {
                Ok((stream, _)) => yield Ok::<_, std::io::Error>(stream),
                Err(e) => error!(error = %e, "Accept error"),
            }
        }
    };

    info!("Daemon started");
    let result = Server::builder()
        .add_service(service.into_server())
        .serve_with_incoming_shutdown(incoming, async {
            tokio::select! {
                _ = shutdown_rx => info!("Shutdown requested over gRPC"),
                _ = tokio::signal::ctrl_c() => info!("Interrupted"),
            }
        })
        .await;

    controller.drain().await;
    if let Some(sweeper) = sweeper {
        let _ = sweeper.await;
    }

    cleanup_socket(&sock_path);
    let _ = std::fs::remove_file(&pid_file);
    info!("Daemon stopped");

    result.context("Server error")
}

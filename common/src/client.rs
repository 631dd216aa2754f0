//! gRPC client for communicating with the audio-research daemon.

use std::path::Path;

use anyhow::{Context, Result};
use audio_research_proto::audio_research_client::AudioResearchClient;
use audio_research_proto::{TaskRequest, TaskSnapshot};
use hyper_util::rt::TokioIo;
use tokio::net::UnixStream;
use tonic::transport::{Channel, Endpoint, Uri};
use tower::service_fn;

/// Largest gRPC message either side accepts; a submit carries the whole recording.
pub const MAX_MESSAGE_BYTES: usize = 256 * 1024 * 1024;

/// Connect to daemon via Unix socket.
pub async fn connect(socket_path: impl AsRef<Path>) -> Result<AudioResearchClient<Channel>> {
    let socket_path = socket_path.as_ref().to_path_buf();

    // The URI is ignored by the connector, tonic only needs a syntactically valid one.
    let channel = Endpoint::try_from("http://[::]:50051")?
        .connect_with_connector(service_fn(move |_: Uri| {
            let path = socket_path.clone();
            async move {
                let stream = UnixStream::connect(path).await?;
                Ok::<_, std::io::Error>(TokioIo::new(stream))
            }
        }))
        .await
        .context("Failed to connect to daemon")?;

    Ok(AudioResearchClient::new(channel)
        .max_encoding_message_size(MAX_MESSAGE_BYTES)
        .max_decoding_message_size(MAX_MESSAGE_BYTES))
}

/// Subscribe to snapshots of one task.
pub async fn subscribe(
    client: &mut AudioResearchClient<Channel>,
    task_id: &str,
) -> Result<tonic::Streaming<TaskSnapshot>> {
    let response = client
        .subscribe(TaskRequest {
            task_id: task_id.to_string(),
        })
        .await
        .with_context(|| format!("Failed to subscribe to task {task_id}"))?;
    Ok(response.into_inner())
}

/// Check if daemon is running by attempting to connect.
pub async fn is_daemon_running(socket_path: impl AsRef<Path>) -> bool {
    let socket_path = socket_path.as_ref();
    if !socket_path.exists() {
        return false;
    }
    connect(socket_path).await.is_ok()
}

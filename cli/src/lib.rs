//! `arsctl`: submit recordings to the audio-research daemon and follow them.

mod render;

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use audio_research_common::{client, dirs};
use audio_research_daemon::audio::decode_wav;
use audio_research_daemon::features::FeatureCategory;
use audio_research_proto::audio_research_client::AudioResearchClient;
use audio_research_proto::{self as proto, Empty, SubmitRequest, TaskRequest};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tokio_stream::StreamExt;
use tonic::transport::Channel;
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser)]
#[command(name = "arsctl")]
#[command(about = "audio-research CLI - chunked speech feature extraction")]
#[command(version)]
struct Cli {
    /// Daemon socket (defaults to the XDG state directory)
    #[arg(long, global = true)]
    socket: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit a WAV file for analysis
    Analyze {
        /// Path to a WAV file
        path: PathBuf,
        /// Feature categories: acoustic, speaker, paralinguistic
        #[arg(long, value_delimiter = ',', required = true)]
        features: Vec<FeatureCategory>,
        /// Seconds per chunk (daemon default when omitted)
        #[arg(long)]
        chunk_duration: Option<f64>,
        /// Resample to this rate before submitting
        #[arg(long)]
        resample: Option<u32>,
        /// Follow progress until every chunk is done
        #[arg(long)]
        follow: bool,
    },
    /// Show the current snapshot of a task
    Status { task_id: String },
    /// Follow a task until every chunk is done
    Watch { task_id: String },
    /// Stop the daemon
    Stop,
}

/// Entry point for the CLI process.
pub async fn run() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let socket = match cli.socket {
        Some(path) => path,
        None => dirs::socket_path()?,
    };

    match cli.command {
        Commands::Analyze {
            path,
            features,
            chunk_duration,
            resample,
            follow,
        } => {
            let mut recording = decode_wav(&path)?;
            if let Some(rate) = resample {
                recording = recording.resample(rate)?;
            }
            debug!(
                samples = recording.samples.len(),
                sample_rate = recording.sample_rate,
                "Decoded recording"
            );

            let mut rpc = connect(&socket).await?;
            let request = SubmitRequest {
                samples: recording.samples,
                sample_rate: recording.sample_rate,
                categories: features
                    .into_iter()
                    .map(|c| proto::FeatureCategory::from(c).into())
                    .collect(),
                chunk_duration,
            };
            let snapshot = rpc
                .submit(request)
                .await
                .map_err(|s| anyhow::anyhow!("Submit rejected: {}", s.message()))?
                .into_inner();
            println!("{}", snapshot.task_id);
            println!("{}", render::summary(&snapshot));

            if follow {
                watch(&mut rpc, &snapshot.task_id).await?;
            }
        }
        Commands::Status { task_id } => {
            let mut rpc = connect(&socket).await?;
            let snapshot = rpc
                .get_status(TaskRequest { task_id })
                .await
                .map_err(|s| anyhow::anyhow!("{}", s.message()))?
                .into_inner();
            print_snapshot(&snapshot);
        }
        Commands::Watch { task_id } => {
            let mut rpc = connect(&socket).await?;
            watch(&mut rpc, &task_id).await?;
        }
        Commands::Stop => {
            if !client::is_daemon_running(&socket).await {
                println!("Daemon is not running");
                return Ok(());
            }
            let mut rpc = connect(&socket).await?;
            rpc.shutdown(Empty {})
                .await
                .context("Failed to stop daemon")?;
            println!("Daemon stopping");
        }
    }

    Ok(())
}

async fn connect(socket: &std::path::Path) -> Result<AudioResearchClient<Channel>> {
    client::connect(socket)
        .await
        .with_context(|| format!("Is the daemon running? (socket {})", socket.display()))
}

async fn watch(rpc: &mut AudioResearchClient<Channel>, task_id: &str) -> Result<()> {
    let mut stream = client::subscribe(rpc, task_id).await?;

    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} chunks {msg}")
            .context("Invalid progress template")?
            .progress_chars("#>-"),
    );

    let mut last = None;
    while let Some(item) = stream.next().await {
        let snapshot = item.map_err(|s| anyhow::anyhow!("{}", s.message()))?;
        bar.set_length(u64::from(snapshot.total_chunks));
        bar.set_position(snapshot.terminal_chunks() as u64);
        bar.set_message(render::failures(&snapshot));
        let complete = snapshot.is_complete();
        last = Some(snapshot);
        if complete {
            break;
        }
    }
    bar.finish_and_clear();

    match last {
        Some(snapshot) if snapshot.is_complete() => {
            print_snapshot(&snapshot);
            Ok(())
        }
        Some(snapshot) => bail!("Stream ended early: {}", render::summary(&snapshot)),
        None => bail!("Stream ended without a snapshot"),
    }
}

fn print_snapshot(snapshot: &proto::TaskSnapshot) {
    println!("{}", render::summary(snapshot));
    for chunk in &snapshot.chunks {
        println!("  {}", render::chunk_line(chunk));
    }
}

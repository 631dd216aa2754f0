//! Run the analysis pipeline in-process on a WAV file.
//! Run with: cargo run -p audio-research-daemon --example analyze_wav -- speech.wav [chunk_seconds]
//!
//! Without a path a synthetic two-second vowel-like signal is analyzed.
//!
//! Set RUST_LOG for tracing output:
//!   RUST_LOG=audio_research_daemon=debug  - per-chunk progress

use std::f32::consts::TAU;
use std::path::PathBuf;
use std::sync::Arc;

use audio_research_daemon::audio::{Recording, decode_wav};
use audio_research_daemon::config::Config;
use audio_research_daemon::controller::Controller;
use audio_research_daemon::features::{CategorySet, FeatureCategory};
use tokio::sync::oneshot;
use tracing_subscriber::EnvFilter;

fn synthetic_vowel() -> Recording {
    let sample_rate = 16000;
    let samples = (0..sample_rate * 2)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            0.5 * (TAU * 140.0 * t).sin() + 0.2 * (TAU * 700.0 * t).sin()
                + 0.1 * (TAU * 1200.0 * t).sin()
        })
        .collect();
    Recording::new(samples, sample_rate)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut args = std::env::args().skip(1);
    let recording = match args.next() {
        Some(path) => decode_wav(&PathBuf::from(path))?,
        None => synthetic_vowel(),
    };
    let chunk_duration = args.next().map(|s| s.parse::<f64>()).transpose()?;

    println!(
        "Analyzing {:.2}s at {}Hz",
        recording.duration_secs(),
        recording.sample_rate
    );

    let mut config = Config::default();
    config.analysis.pacing_ms = 0;
    let (shutdown_tx, _shutdown_rx) = oneshot::channel();
    let controller = Arc::new(Controller::new(config, shutdown_tx));

    let categories: CategorySet = FeatureCategory::ALL.into_iter().collect();
    let submitted = controller.submit(
        recording.samples,
        recording.sample_rate,
        categories,
        chunk_duration,
    )?;
    let mut subscription = controller.subscribe(submitted.job.task_id())?;

    while let Some(snapshot) = subscription.recv().await {
        println!(
            "{} / {} chunks done",
            snapshot.terminal_chunks(),
            snapshot.total_chunks()
        );
        if !snapshot.is_complete() {
            continue;
        }
        for chunk in &snapshot.chunks {
            match (chunk.features(), chunk.error()) {
                (Some(features), _) => println!(
                    "#{} {:.2}s-{:.2}s {:#?}",
                    chunk.chunk_id, chunk.start_time, chunk.end_time, features
                ),
                (None, Some(error)) => println!("#{} failed: {error}", chunk.chunk_id),
                (None, None) => {}
            }
        }
        break;
    }

    controller.drain().await;
    Ok(())
}

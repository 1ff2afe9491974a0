// src/main.rs

mod attribution;
mod calibration;
mod config;
mod debug;
mod detection;
mod pipeline;
mod scoring;
mod types;
mod video_processor;

use anyhow::{bail, Result};
use config::Config;
use pipeline::{GameAnalyzer, GameSummary};
use std::path::{Path, PathBuf};
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use video_processor::VideoProcessor;

const CONFIG_ENV: &str = "PICKUP_SCORER_CONFIG";

#[tokio::main]
async fn main() {
    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    };

    let default_filter = if config.debug {
        "pickup_scorer=debug"
    } else {
        "pickup_scorer=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    if let Err(e) = run(config).await {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

fn load_config() -> Result<Config> {
    let path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| "config.yaml".to_string());
    let mut config = Config::load(&path)?;
    if let Some(input) = std::env::args().nth(1) {
        config.video.input = PathBuf::from(input);
    }
    Ok(config)
}

async fn run(config: Config) -> Result<()> {
    info!("🏀 Pickup Game Scorer Starting");
    info!(
        "Scoring: threshold={} ratio={:.2} cooldown={} frames, min gap={:.1}s, max total={}",
        config.scoring.score_threshold,
        config.scoring.team_detection_ratio,
        config.scoring.cooldown_frames,
        config.scoring.min_seconds_between_scores,
        config.scoring.max_total_score
    );

    let processor = VideoProcessor::new(config.video.clone());
    let videos = processor.find_video_files()?;
    if videos.is_empty() {
        bail!("No video files found in {}", config.video.input.display());
    }
    let single_input = config.video.input.is_file();

    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping after the current frame");
            let _ = cancel_tx.send(true);
        }
    });

    for (idx, video_path) in videos.iter().enumerate() {
        info!("========================================");
        info!(
            "Processing video {}/{}: {}",
            idx + 1,
            videos.len(),
            video_path.display()
        );
        info!("========================================");

        match analyze_video(video_path, &processor, &config, cancel_rx.clone()).await {
            Ok(summary) => {
                for line in summary.to_string().lines() {
                    info!("{}", line);
                }
                if summary.cancelled {
                    break;
                }
            }
            Err(e) if !single_input => {
                error!("Failed to process {}: {:#}", video_path.display(), e);
            }
            Err(e) => return Err(e),
        }
    }

    Ok(())
}

async fn analyze_video(
    video_path: &Path,
    processor: &VideoProcessor,
    config: &Config,
    cancel: watch::Receiver<bool>,
) -> Result<GameSummary> {
    let mut reader = processor.open_video(video_path)?;
    let mut writer = processor.create_writer(video_path, &reader)?;
    let mut analyzer = GameAnalyzer::from_config(config)?.with_cancellation(cancel);

    let source = video_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| video_path.display().to_string());
    let summary = analyzer.run(&source, &mut reader, &mut writer).await?;

    if let Some(mut writer) = writer {
        use opencv::videoio::VideoWriterTrait;
        writer.release()?;
    }
    Ok(summary)
}

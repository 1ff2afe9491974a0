// src/pipeline/analyzer.rs
//
// Per-video analysis loop. One sampled frame at a time:
//
//   calibrate (first frame) → cooldown? → ball proximity → state machine
//     → attribution vote when due → ledger
//
// Everything the loop mutates lives in `GameAnalyzer`; frames are dropped at
// the end of each iteration except the single previous frame kept for the
// motion gate.

use super::metrics::PipelineMetrics;
use super::summary::{resident_memory_mb, GameSummary, ProgressReport};
use crate::attribution::TeamAttributor;
use crate::calibration::Regions;
use crate::config::Config;
use crate::debug::{annotate_frame, OverlayStatus, WindowStatus};
use crate::detection::BallProximityDetector;
use crate::scoring::{FrameStep, ScoringStateMachine, VoteOutcome};
use crate::types::{BallProximity, Frame};
use crate::video_processor::VideoReader;
use anyhow::{Context, Result};
use opencv::{core::Mat, prelude::*, videoio::VideoWriter};
use std::time::Instant;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// What happened to one sampled frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameReport {
    pub step: FrameStep,
    pub proximity: BallProximity,
    pub outcome: Option<VoteOutcome>,
}

pub struct GameAnalyzer {
    config: Config,
    detector: BallProximityDetector,
    attributor: TeamAttributor,
    machine: ScoringStateMachine,
    regions: Option<Regions>,
    previous: Option<Mat>,
    metrics: PipelineMetrics,
    cancel: Option<watch::Receiver<bool>>,
}

impl GameAnalyzer {
    pub fn new(config: Config, attributor: TeamAttributor) -> Result<Self> {
        let detector = BallProximityDetector::new(config.ball.clone())?;
        let machine = ScoringStateMachine::new(config.scoring.clone());
        Ok(Self {
            config,
            detector,
            attributor,
            machine,
            regions: None,
            previous: None,
            metrics: PipelineMetrics::new(),
            cancel: None,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let attributor = TeamAttributor::from_config(config)?;
        Self::new(config.clone(), attributor)
    }

    /// Stop at the next sampled frame once `cancel` turns true.
    pub fn with_cancellation(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn machine(&self) -> &ScoringStateMachine {
        &self.machine
    }

    pub fn regions(&self) -> Option<&Regions> {
        self.regions.as_ref()
    }

    pub fn metrics(&self) -> &PipelineMetrics {
        &self.metrics
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().map(|rx| *rx.borrow()).unwrap_or(false)
    }

    /// Run one sampled frame through the pipeline.
    ///
    /// `now` is the wall-clock time used by the minimum scoring interval.
    pub async fn process_frame(&mut self, frame: &Frame, now: Instant) -> Result<FrameReport> {
        self.metrics.frames_sampled += 1;

        let regions = match &self.regions {
            Some(regions) => regions.clone(),
            None => {
                let (width, height) = frame.working_size();
                let regions = Regions::calibrate(width, height, &self.config.regions);
                self.regions = Some(regions.clone());
                regions
            }
        };

        if self.machine.is_cooling_down() {
            self.metrics.frames_in_cooldown += 1;
            // The motion gate compares against the last sampled frame, cooldown included.
            if self.config.ball.require_motion {
                self.previous = Some(frame.working().try_clone()?);
            }
            let step = self.machine.step(frame.index, BallProximity::default());
            return Ok(FrameReport {
                step,
                proximity: BallProximity::default(),
                outcome: None,
            });
        }

        let started = Instant::now();
        let proximity = self
            .detector
            .detect(frame.working(), &regions, self.previous.as_ref())
            .context("ball proximity detection failed")?;
        self.metrics.detection_time_us = started.elapsed().as_micros() as u64;
        if proximity.near_basket() {
            self.metrics.frames_with_ball += 1;
        }

        if self.config.ball.require_motion {
            self.previous = Some(frame.working().try_clone()?);
        }

        let step = self.machine.step(frame.index, proximity);
        let outcome = match step {
            FrameStep::VoteDue { ask_primary, .. } => {
                let started = Instant::now();
                let team = self
                    .attributor
                    .classify(frame, &regions, ask_primary)
                    .await
                    .context("team attribution failed")?;
                self.metrics.attribution_time_us = started.elapsed().as_micros() as u64;
                debug!("Vote at frame {}: {}", frame.index, team);
                Some(
                    self.machine
                        .submit_vote(team, frame.index, now, frame.timestamp_secs),
                )
            }
            _ => None,
        };

        Ok(FrameReport {
            step,
            proximity,
            outcome,
        })
    }

    /// `process_frame`, but a fault only costs this frame.
    pub async fn process_or_skip(&mut self, frame: &Frame, now: Instant) -> Option<FrameReport> {
        match self.process_frame(frame, now).await {
            Ok(report) => Some(report),
            Err(e) => {
                self.metrics.frames_faulted += 1;
                warn!("Skipping frame {}: {:#}", frame.index, e);
                None
            }
        }
    }

    /// Analyze every sampled frame of `reader`.
    pub async fn run(
        &mut self,
        source: &str,
        reader: &mut VideoReader,
        writer: &mut Option<VideoWriter>,
    ) -> Result<GameSummary> {
        let progress_interval = self.config.reporting.progress_interval.max(1);
        let release_interval = self.config.reporting.release_interval.max(1);
        let mut sampled: u64 = 0;
        let mut cancelled = false;

        loop {
            if self.is_cancelled() {
                warn!("Analysis of {} cancelled at frame {}", source, reader.position);
                cancelled = true;
                break;
            }

            let frame = match reader.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(e) => {
                    warn!(
                        "Failed to decode frame {} of {}: {:#}. Treating as end of stream",
                        reader.position, source, e
                    );
                    break;
                }
            };
            sampled += 1;

            let report = self.process_or_skip(&frame, Instant::now()).await;

            if let Some(w) = writer.as_mut() {
                let written = self
                    .output_frame(&frame, report.as_ref())
                    .and_then(|out| Ok(w.write(&out)?));
                if let Err(e) = written {
                    warn!("Failed to write annotated frame {}: {:#}", frame.index, e);
                }
            }

            if sampled % progress_interval == 0 {
                info!("{}", self.progress(reader));
            }
            if sampled % release_interval == 0 {
                self.release_buffers();
            }
        }

        let summary = self.summary(source, reader.game_time_secs(), cancelled);
        self.previous = None;
        Ok(summary)
    }

    /// Image written to the annotated video for `frame`. Frames that faulted
    /// go out unannotated so the output keeps the game clock.
    pub fn output_frame(&self, frame: &Frame, report: Option<&FrameReport>) -> Result<Mat> {
        match (&self.regions, report) {
            (Some(regions), Some(report)) => {
                annotate_frame(frame.working(), regions, &self.overlay_status(frame, report))
            }
            _ => Ok(frame.working().try_clone()?),
        }
    }

    fn overlay_status(&self, frame: &Frame, report: &FrameReport) -> OverlayStatus {
        let ledger = self.machine.ledger();
        let window = if ledger.is_cooling_down() {
            WindowStatus::Cooldown {
                remaining: ledger.cooldown_remaining(),
            }
        } else if let Some(window) = self.machine.window() {
            WindowStatus::Open {
                frames_since_opened: window.frames_since_opened,
            }
        } else {
            WindowStatus::Idle
        };
        OverlayStatus {
            team_a_score: ledger.team_a_score(),
            team_b_score: ledger.team_b_score(),
            total_baskets: ledger.total_baskets(),
            game_time_secs: frame.timestamp_secs,
            window,
            ball_near_basket: report.proximity.near_basket(),
        }
    }

    pub fn progress(&self, reader: &VideoReader) -> ProgressReport {
        let ledger = self.machine.ledger();
        ProgressReport {
            percent: reader.progress(),
            game_time_secs: reader.game_time_secs(),
            total_secs: reader.duration_secs(),
            team_a_score: ledger.team_a_score(),
            team_b_score: ledger.team_b_score(),
            total_baskets: ledger.total_baskets(),
            memory_mb: resident_memory_mb(),
        }
    }

    /// Drop the reusable scratch Mats; they are reallocated on next use.
    pub fn release_buffers(&mut self) {
        self.detector.release_buffers();
        self.attributor.release_buffers();
        self.metrics.buffer_releases += 1;
        debug!("Released detector scratch buffers");
    }

    pub fn summary(&self, source: &str, game_duration_secs: f64, cancelled: bool) -> GameSummary {
        let ledger = self.machine.ledger();
        GameSummary {
            source: source.to_string(),
            game_duration_secs,
            team_a_score: ledger.team_a_score(),
            team_b_score: ledger.team_b_score(),
            total_baskets: ledger.total_baskets(),
            cancelled,
            metrics: self.metrics.summary(),
            scoring: self.machine.stats(),
            attribution: self.attributor.stats(),
        }
    }
}

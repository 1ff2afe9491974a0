// src/config.rs
//
// Immutable analyzer configuration. Every threshold the pipeline uses lives
// here with its default; the values were tuned against one fixed-camera court
// and are expected to be adjusted per video through config.yaml.

use anyhow::{ensure, Context, Result};
use opencv::core::Scalar;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub video: VideoConfig,
    pub regions: RegionConfig,
    pub ball: BallConfig,
    pub jersey: JerseyConfig,
    pub scoring: ScoringConfig,
    pub classifier: ClassifierConfig,
    pub reporting: ReportingConfig,
    pub debug: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    /// Video file, or a directory that is searched for video files.
    pub input: PathBuf,
    /// Frames per second handed to the pipeline; the rest are skipped.
    pub target_fps: f64,
    pub downscale: bool,
    /// Scale applied to each sampled frame when `downscale` is set.
    pub downscale_factor: f64,
    pub save_annotated: bool,
    pub output_dir: PathBuf,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::from("videos"),
            target_fps: 10.0,
            downscale: true,
            downscale_factor: 0.5,
            save_annotated: false,
            output_dir: PathBuf::from("output"),
        }
    }
}

/// Region fractions, all relative to the processing frame size.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionConfig {
    pub basket_width: f64,
    pub basket_height: f64,
    /// Gap between a basket zone and its frame edge.
    pub basket_edge_margin: f64,
    pub court_width: f64,
    pub court_height: f64,
}

impl Default for RegionConfig {
    fn default() -> Self {
        Self {
            basket_width: 0.30,
            basket_height: 0.25,
            basket_edge_margin: 0.0,
            court_width: 0.80,
            court_height: 0.80,
        }
    }
}

/// Inclusive HSV bounds in OpenCV units (H 0-180, S/V 0-255).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HsvRange {
    pub lower: [f64; 3],
    pub upper: [f64; 3],
}

impl HsvRange {
    pub const fn new(lower: [f64; 3], upper: [f64; 3]) -> Self {
        Self { lower, upper }
    }

    pub fn lower_scalar(&self) -> Scalar {
        Scalar::new(self.lower[0], self.lower[1], self.lower[2], 0.0)
    }

    pub fn upper_scalar(&self) -> Scalar {
        Scalar::new(self.upper[0], self.upper[1], self.upper[2], 0.0)
    }

    fn is_valid(&self) -> bool {
        self.lower
            .iter()
            .zip(self.upper.iter())
            .all(|(lo, hi)| lo <= hi)
            && self.upper[0] <= 180.0
            && self.upper[1] <= 255.0
            && self.upper[2] <= 255.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BallConfig {
    pub color: HsvRange,
    pub min_area: f64,
    pub max_area: f64,
    /// 4π·area / perimeter², 1.0 for a perfect circle.
    pub min_circularity: f64,
    pub min_aspect_ratio: f64,
    pub max_aspect_ratio: f64,
    pub open_kernel: i32,
    /// Only accept a ball in a basket zone that changed since the previous
    /// sampled frame.
    pub require_motion: bool,
    /// Mean absolute per-channel difference required by the motion gate.
    pub min_motion: f64,
}

impl Default for BallConfig {
    fn default() -> Self {
        Self {
            color: HsvRange::new([5.0, 100.0, 100.0], [20.0, 255.0, 255.0]),
            min_area: 50.0,
            max_area: 400.0,
            min_circularity: 0.7,
            min_aspect_ratio: 0.8,
            max_aspect_ratio: 1.2,
            open_kernel: 3,
            require_motion: false,
            min_motion: 2.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JerseyConfig {
    pub team_a: HsvRange,
    pub team_b: HsvRange,
    /// Blobs below this area are not counted as players.
    pub min_player_area: f64,
    /// A team needs strictly more players than this to win on count.
    pub min_players: usize,
    pub count_ratio: f64,
    pub pixel_ratio: f64,
    pub min_pixel_count: i32,
    pub open_kernel: i32,
    pub dilate_iterations: i32,
}

impl Default for JerseyConfig {
    fn default() -> Self {
        Self {
            // Light jerseys
            team_a: HsvRange::new([0.0, 0.0, 190.0], [180.0, 50.0, 255.0]),
            // Dark blue jerseys
            team_b: HsvRange::new([100.0, 90.0, 30.0], [130.0, 255.0, 200.0]),
            min_player_area: 500.0,
            min_players: 2,
            count_ratio: 1.5,
            pixel_ratio: 3.0,
            min_pixel_count: 2000,
            open_kernel: 5,
            dilate_iterations: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Votes kept in the window FIFO and required before consensus.
    pub score_threshold: usize,
    pub team_detection_ratio: f64,
    /// First and last frame (since the window opened) that collect a vote.
    pub vote_start_frame: u32,
    pub vote_end_frame: u32,
    /// Frame (since the window opened) that asks the external classifier.
    pub external_vote_frame: u32,
    /// The window closes unscored once this many frames have passed.
    pub window_timeout_frames: u32,
    pub cooldown_frames: u32,
    pub points_per_basket: u32,
    pub max_total_score: u32,
    pub min_seconds_between_scores: f64,
    pub expected_baskets_per_minute: f64,
    pub pace_multiplier: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            score_threshold: 3,
            team_detection_ratio: 0.6,
            vote_start_frame: 3,
            vote_end_frame: 10,
            external_vote_frame: 5,
            window_timeout_frames: 15,
            cooldown_frames: 60,
            points_per_basket: 2,
            max_total_score: 50,
            min_seconds_between_scores: 3.0,
            expected_baskets_per_minute: 2.0,
            pace_multiplier: 2.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// External classifier executable. Disabled when unset.
    pub command: Option<PathBuf>,
    pub timeout_ms: u64,
    /// Directory for the handoff image; a private temp dir when unset.
    pub handoff_dir: Option<PathBuf>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            command: None,
            timeout_ms: 1500,
            handoff_dir: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportingConfig {
    /// Processed frames between progress lines.
    pub progress_interval: u64,
    /// Processed frames between scratch buffer releases.
    pub release_interval: u64,
}

impl Default for ReportingConfig {
    fn default() -> Self {
        Self {
            progress_interval: 100,
            release_interval: 1000,
        }
    }
}

impl Config {
    /// Load from YAML. A missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            info!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&contents)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let v = &self.video;
        ensure!(v.target_fps > 0.0, "video.target_fps must be positive");
        ensure!(
            v.downscale_factor > 0.0 && v.downscale_factor <= 1.0,
            "video.downscale_factor must be in (0, 1]"
        );

        let r = &self.regions;
        for (name, value) in [
            ("basket_width", r.basket_width),
            ("basket_height", r.basket_height),
            ("court_width", r.court_width),
            ("court_height", r.court_height),
        ] {
            ensure!(
                value > 0.0 && value <= 1.0,
                "regions.{name} must be in (0, 1]"
            );
        }
        ensure!(
            r.basket_edge_margin >= 0.0 && r.basket_edge_margin + r.basket_height <= 0.5,
            "regions.basket_edge_margin + basket_height must not exceed half the frame"
        );

        let b = &self.ball;
        ensure!(b.color.is_valid(), "ball.color is not a valid HSV range");
        ensure!(
            b.min_area >= 0.0 && b.min_area <= b.max_area,
            "ball.min_area must not exceed ball.max_area"
        );
        ensure!(
            b.min_aspect_ratio <= b.max_aspect_ratio,
            "ball aspect ratio range is empty"
        );
        ensure!(b.open_kernel > 0, "ball.open_kernel must be positive");

        let j = &self.jersey;
        ensure!(j.team_a.is_valid(), "jersey.team_a is not a valid HSV range");
        ensure!(j.team_b.is_valid(), "jersey.team_b is not a valid HSV range");
        ensure!(j.open_kernel > 0, "jersey.open_kernel must be positive");

        let s = &self.scoring;
        ensure!(s.score_threshold > 0, "scoring.score_threshold must be positive");
        ensure!(
            s.team_detection_ratio > 0.0 && s.team_detection_ratio <= 1.0,
            "scoring.team_detection_ratio must be in (0, 1]"
        );
        ensure!(
            s.vote_start_frame <= s.vote_end_frame
                && s.vote_end_frame <= s.window_timeout_frames,
            "scoring vote frames must lie inside the window timeout"
        );
        // A FIFO larger than the vote range never fills, so no basket could score.
        ensure!(
            s.score_threshold as u64 <= u64::from(s.vote_end_frame - s.vote_start_frame) + 1,
            "scoring.score_threshold exceeds the number of vote frames"
        );
        ensure!(
            (s.vote_start_frame..=s.vote_end_frame).contains(&s.external_vote_frame),
            "scoring.external_vote_frame must lie inside the vote frames"
        );
        ensure!(s.points_per_basket > 0, "scoring.points_per_basket must be positive");
        ensure!(
            s.expected_baskets_per_minute > 0.0 && s.pace_multiplier > 0.0,
            "scoring pace settings must be positive"
        );
        ensure!(
            s.min_seconds_between_scores >= 0.0,
            "scoring.min_seconds_between_scores must not be negative"
        );

        ensure!(
            self.classifier.timeout_ms > 0,
            "classifier.timeout_ms must be positive"
        );
        ensure!(
            self.reporting.progress_interval > 0 && self.reporting.release_interval > 0,
            "reporting intervals must be positive"
        );
        Ok(())
    }
}

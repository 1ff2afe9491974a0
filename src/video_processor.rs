// src/video_processor.rs
//
// Frame source. Opens recorded videos with OpenCV, hands every
// `frame_skip`-th frame to the pipeline and only `grab()`s the rest so they
// advance the game clock without being decoded.

use crate::config::VideoConfig;
use crate::types::Frame;
use anyhow::{bail, Context, Result};
use opencv::{
    core::{self, Mat},
    imgproc,
    prelude::*,
    videoio::{self, VideoCapture, VideoWriter},
};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

const VIDEO_EXTENSIONS: [&str; 4] = ["mp4", "avi", "mov", "mkv"];
const FALLBACK_FPS: f64 = 30.0;

pub struct VideoProcessor {
    config: VideoConfig,
}

impl VideoProcessor {
    pub fn new(config: VideoConfig) -> Self {
        Self { config }
    }

    /// Videos to analyze: the input itself when it is a file, otherwise
    /// every video found under it, sorted by path.
    pub fn find_video_files(&self) -> Result<Vec<PathBuf>> {
        let input = &self.config.input;
        if !input.exists() {
            bail!("Input path does not exist: {}", input.display());
        }
        if input.is_file() {
            return Ok(vec![input.clone()]);
        }

        let mut videos: Vec<PathBuf> = WalkDir::new(input)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file() && is_video(e.path()))
            .map(|e| e.into_path())
            .collect();
        videos.sort();

        info!("Found {} video files in {}", videos.len(), input.display());
        Ok(videos)
    }

    pub fn open_video(&self, path: &Path) -> Result<VideoReader> {
        info!("Opening video: {}", path.display());

        if !path.is_file() {
            bail!("Video file not found: {}", path.display());
        }
        let cap = VideoCapture::from_file(&path.to_string_lossy(), videoio::CAP_ANY)
            .with_context(|| format!("Failed to open video file {}", path.display()))?;
        if !cap.is_opened()? {
            bail!("Failed to open video file {}", path.display());
        }

        let mut fps = cap.get(videoio::CAP_PROP_FPS)?;
        if !(fps > 0.0) {
            warn!("Video reports {} FPS, assuming {}", fps, FALLBACK_FPS);
            fps = FALLBACK_FPS;
        }
        let total_frames = cap.get(videoio::CAP_PROP_FRAME_COUNT)?.max(0.0) as u64;
        let width = cap.get(videoio::CAP_PROP_FRAME_WIDTH)? as i32;
        let height = cap.get(videoio::CAP_PROP_FRAME_HEIGHT)? as i32;
        let frame_skip = frame_skip(fps, self.config.target_fps);

        info!(
            "Video properties: {}x{} @ {:.1} FPS, {} frames, analyzing every {} frame(s)",
            width, height, fps, total_frames, frame_skip
        );

        Ok(VideoReader {
            cap,
            fps,
            total_frames,
            position: 0,
            width,
            height,
            frame_skip,
            downscale: self.config.downscale.then_some(self.config.downscale_factor),
        })
    }

    /// Annotated output for `input_path`, sized to the frames the detectors
    /// see. `None` when annotation is disabled.
    pub fn create_writer(&self, input_path: &Path, reader: &VideoReader) -> Result<Option<VideoWriter>> {
        if !self.config.save_annotated {
            return Ok(None);
        }

        std::fs::create_dir_all(&self.config.output_dir).with_context(|| {
            format!("Failed to create {}", self.config.output_dir.display())
        })?;

        let stem = input_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "video".to_string());
        let output_path = self.config.output_dir.join(format!("{}_annotated.mp4", stem));

        info!("Output video: {}", output_path.display());

        let (width, height) = reader.working_size();
        let fourcc = VideoWriter::fourcc('m', 'p', '4', 'v')?;
        let writer = VideoWriter::new(
            &output_path.to_string_lossy(),
            fourcc,
            reader.sampled_fps(),
            core::Size::new(width, height),
            true,
        )?;
        if !writer.is_opened()? {
            bail!("Failed to open video writer {}", output_path.display());
        }

        Ok(Some(writer))
    }
}

fn is_video(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| VIDEO_EXTENSIONS.iter().any(|v| v.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

/// `max(1, round(fps / target))`.
pub fn frame_skip(fps: f64, target_fps: f64) -> u64 {
    if target_fps <= 0.0 {
        return 1;
    }
    ((fps / target_fps).round() as u64).max(1)
}

pub struct VideoReader {
    cap: VideoCapture,
    pub fps: f64,
    pub total_frames: u64,
    /// Index of the next frame in the stream.
    pub position: u64,
    pub width: i32,
    pub height: i32,
    pub frame_skip: u64,
    downscale: Option<f64>,
}

impl VideoReader {
    /// Next sampled frame, or `None` at end of stream.
    pub fn next_frame(&mut self) -> Result<Option<Frame>> {
        while self.position % self.frame_skip != 0 {
            if !self.cap.grab()? {
                return Ok(None);
            }
            self.position += 1;
        }

        let mut image = Mat::default();
        if !self.cap.read(&mut image)? || image.empty() {
            return Ok(None);
        }
        let index = self.position;
        self.position += 1;

        let scaled = match self.downscale {
            Some(factor) => {
                let mut small = Mat::default();
                imgproc::resize(
                    &image,
                    &mut small,
                    core::Size::default(),
                    factor,
                    factor,
                    imgproc::INTER_AREA,
                )?;
                Some(small)
            }
            None => None,
        };

        Ok(Some(Frame {
            index,
            timestamp_secs: index as f64 / self.fps,
            image,
            scaled,
        }))
    }

    /// Game clock at the current read position.
    pub fn game_time_secs(&self) -> f64 {
        self.position as f64 / self.fps
    }

    /// Length of the whole video in seconds, 0 when the frame count is unknown.
    pub fn duration_secs(&self) -> f64 {
        self.total_frames as f64 / self.fps
    }

    pub fn sampled_fps(&self) -> f64 {
        self.fps / self.frame_skip as f64
    }

    /// Dimensions of the frames the detectors run on.
    pub fn working_size(&self) -> (i32, i32) {
        match self.downscale {
            Some(f) => (
                (self.width as f64 * f).round() as i32,
                (self.height as f64 * f).round() as i32,
            ),
            None => (self.width, self.height),
        }
    }

    pub fn progress(&self) -> f64 {
        if self.total_frames == 0 {
            return 0.0;
        }
        (self.position as f64 / self.total_frames as f64 * 100.0).min(100.0)
    }
}

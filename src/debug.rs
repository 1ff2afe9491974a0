// src/debug.rs
//
// Annotated output frames: region outlines plus a status banner with the
// running score and the scoring window state.

use crate::calibration::{RegionLabel, Regions};
use anyhow::Result;
use opencv::{core, imgproc, prelude::*};

/// What the banner shows for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayStatus {
    pub team_a_score: u32,
    pub team_b_score: u32,
    pub total_baskets: u32,
    pub game_time_secs: f64,
    pub window: WindowStatus,
    pub ball_near_basket: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowStatus {
    Idle,
    Open { frames_since_opened: u32 },
    Cooldown { remaining: u32 },
}

impl WindowStatus {
    fn label(&self) -> String {
        match self {
            WindowStatus::Idle => "IDLE".to_string(),
            WindowStatus::Open {
                frames_since_opened,
            } => format!("WINDOW {}", frames_since_opened),
            WindowStatus::Cooldown { remaining } => format!("COOLDOWN {}", remaining),
        }
    }

    fn color(&self) -> core::Scalar {
        match self {
            WindowStatus::Idle => core::Scalar::new(255.0, 255.0, 255.0, 0.0),
            WindowStatus::Open { .. } => core::Scalar::new(0.0, 165.0, 255.0, 0.0),
            WindowStatus::Cooldown { .. } => core::Scalar::new(0.0, 255.0, 255.0, 0.0),
        }
    }
}

fn region_color(label: RegionLabel) -> core::Scalar {
    match label {
        RegionLabel::TopBasket | RegionLabel::BottomBasket => core::Scalar::new(0.0, 0.0, 255.0, 0.0), // Red
        RegionLabel::Court => core::Scalar::new(0.0, 255.0, 0.0, 0.0), // Green
        RegionLabel::TeamAArea => core::Scalar::new(255.0, 255.0, 255.0, 0.0),
        RegionLabel::TeamBArea => core::Scalar::new(255.0, 0.0, 0.0, 0.0), // Blue
    }
}

pub fn annotate_frame(frame: &Mat, regions: &Regions, status: &OverlayStatus) -> Result<Mat> {
    let mut output = frame.try_clone()?;

    // Team areas only get a divider; their outlines would cover the court.
    let (width, height) = regions.frame_size();
    let divider_x = regions.get(RegionLabel::TeamBArea).x;
    imgproc::line(
        &mut output,
        core::Point::new(divider_x, 0),
        core::Point::new(divider_x, height),
        core::Scalar::new(128.0, 128.0, 128.0, 0.0),
        1,
        imgproc::LINE_8,
        0,
    )?;

    for (label, rect) in regions.iter() {
        if matches!(label, RegionLabel::TeamAArea | RegionLabel::TeamBArea) {
            continue;
        }
        let thickness = if status.ball_near_basket && label != RegionLabel::Court { 3 } else { 1 };
        imgproc::rectangle(&mut output, rect, region_color(label), thickness, imgproc::LINE_8, 0)?;
    }

    // Banner background
    let banner_w = width.min(420);
    imgproc::rectangle(
        &mut output,
        core::Rect::new(0, 0, banner_w, 44),
        core::Scalar::new(40.0, 40.0, 40.0, 0.0),
        -1,
        imgproc::LINE_8,
        0,
    )?;

    let minutes = (status.game_time_secs / 60.0).floor() as u64;
    let seconds = status.game_time_secs % 60.0;
    let score = format!(
        "A {} - B {}  ({} baskets)  {:02}:{:04.1}",
        status.team_a_score, status.team_b_score, status.total_baskets, minutes, seconds
    );
    imgproc::put_text(
        &mut output,
        &score,
        core::Point::new(8, 18),
        imgproc::FONT_HERSHEY_SIMPLEX,
        0.5,
        core::Scalar::new(255.0, 255.0, 255.0, 0.0),
        1,
        imgproc::LINE_8,
        false,
    )?;
    imgproc::put_text(
        &mut output,
        &status.window.label(),
        core::Point::new(8, 38),
        imgproc::FONT_HERSHEY_SIMPLEX,
        0.5,
        status.window.color(),
        1,
        imgproc::LINE_8,
        false,
    )?;

    Ok(output)
}

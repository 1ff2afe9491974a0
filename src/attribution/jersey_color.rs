// src/attribution/jersey_color.rs
//
// In-process team attribution: count jersey-coloured blobs inside the court
// region and credit the team that clearly dominates. Falls back to raw mask
// pixel counts when too few player-sized blobs are found.

use super::TeamClassifier;
use crate::calibration::{RegionLabel, Regions};
use crate::config::JerseyConfig;
use crate::detection::color_mask::{crop, external_contours, structuring_element, ColorMasker};
use crate::types::{Frame, Team};
use anyhow::Result;
use async_trait::async_trait;
use opencv::{
    core::{self, Mat, Point},
    imgproc,
    prelude::*,
};
use tracing::debug;

/// Blob and pixel tallies for both teams in one court image.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JerseyCounts {
    pub players_a: usize,
    pub players_b: usize,
    pub pixels_a: i32,
    pub pixels_b: i32,
}

impl JerseyCounts {
    /// Player counts first, pixel counts as the last resort.
    pub fn decide(&self, config: &JerseyConfig) -> Team {
        let dominates_count = |mine: usize, theirs: usize| {
            mine > config.min_players && mine as f64 >= config.count_ratio * theirs as f64
        };
        if dominates_count(self.players_a, self.players_b) {
            return Team::A;
        }
        if dominates_count(self.players_b, self.players_a) {
            return Team::B;
        }

        let dominates_pixels = |mine: i32, theirs: i32| {
            mine > config.min_pixel_count && mine as f64 > config.pixel_ratio * theirs as f64
        };
        if dominates_pixels(self.pixels_a, self.pixels_b) {
            return Team::A;
        }
        if dominates_pixels(self.pixels_b, self.pixels_a) {
            return Team::B;
        }

        Team::Unknown
    }
}

pub struct JerseyColorClassifier {
    config: JerseyConfig,
    open_kernel: Mat,
    masker: ColorMasker,
    opened: Mat,
    mask: Mat,
}

impl JerseyColorClassifier {
    pub fn new(config: JerseyConfig) -> Result<Self> {
        let open_kernel = structuring_element(config.open_kernel)?;
        Ok(Self {
            config,
            open_kernel,
            masker: ColorMasker::new(),
            opened: Mat::default(),
            mask: Mat::default(),
        })
    }

    pub fn count(&mut self, court: &Mat) -> Result<JerseyCounts> {
        self.masker.load(court)?;
        let (players_a, pixels_a) = self.tally(true)?;
        let (players_b, pixels_b) = self.tally(false)?;
        Ok(JerseyCounts {
            players_a,
            players_b,
            pixels_a,
            pixels_b,
        })
    }

    fn tally(&mut self, team_a: bool) -> Result<(usize, i32)> {
        let range = if team_a {
            self.config.team_a
        } else {
            self.config.team_b
        };
        self.masker
            .mask(&range, &self.open_kernel, &mut self.opened)?;
        imgproc::dilate(
            &self.opened,
            &mut self.mask,
            &self.open_kernel,
            Point::new(-1, -1),
            self.config.dilate_iterations,
            core::BORDER_CONSTANT,
            imgproc::morphology_default_border_value()?,
        )?;

        let pixels = core::count_non_zero(&self.mask)?;
        let mut players = 0;
        for contour in external_contours(&self.mask)?.iter() {
            if imgproc::contour_area(&contour, false)? > self.config.min_player_area {
                players += 1;
            }
        }
        Ok((players, pixels))
    }
}

#[async_trait(?Send)]
impl TeamClassifier for JerseyColorClassifier {
    fn name(&self) -> &'static str {
        "jersey-color"
    }

    async fn classify(&mut self, frame: &Frame, regions: &Regions) -> Result<Team> {
        let Some(court) = crop(frame.working(), regions.get(RegionLabel::Court))? else {
            return Ok(Team::Unknown);
        };
        let counts = self.count(&court)?;
        let team = counts.decide(&self.config);
        debug!(
            "Jersey counts at frame {}: A={} ({}px) B={} ({}px) -> {}",
            frame.index, counts.players_a, counts.pixels_a, counts.players_b, counts.pixels_b, team
        );
        Ok(team)
    }

    fn release_buffers(&mut self) {
        self.masker.release();
        self.opened = Mat::default();
        self.mask = Mat::default();
    }
}

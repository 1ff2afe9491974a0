// src/detection/ball_proximity.rs
//
// Cheap per-frame check: is something shaped and coloured like the game ball
// inside either basket zone? Tuned for recall; false positives are filtered
// later by attribution consensus and the ledger guards.

use super::color_mask::{crop, external_contours, structuring_element, ColorMasker};
use crate::calibration::Regions;
use crate::config::BallConfig;
use crate::types::{BallProximity, BasketLocation};
use anyhow::Result;
use opencv::{
    core::{self, Mat, Point, Vector},
    imgproc,
    prelude::*,
};
use std::f64::consts::PI;
use tracing::debug;

/// Geometry of one contour, enough to judge "is this round and ball-sized".
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContourShape {
    pub area: f64,
    pub perimeter: f64,
    pub width: i32,
    pub height: i32,
}

impl ContourShape {
    pub fn measure(contour: &Vector<Point>) -> Result<Self> {
        let area = imgproc::contour_area(contour, false)?;
        let perimeter = imgproc::arc_length(contour, true)?;
        let bbox = imgproc::bounding_rect(contour)?;
        Ok(Self {
            area,
            perimeter,
            width: bbox.width,
            height: bbox.height,
        })
    }

    pub fn circularity(&self) -> f64 {
        if self.perimeter <= f64::EPSILON {
            return 0.0;
        }
        4.0 * PI * self.area / (self.perimeter * self.perimeter)
    }

    pub fn aspect_ratio(&self) -> f64 {
        if self.height == 0 {
            return 0.0;
        }
        self.width as f64 / self.height as f64
    }

    pub fn is_ball_like(&self, config: &BallConfig) -> bool {
        let aspect = self.aspect_ratio();
        self.area >= config.min_area
            && self.area <= config.max_area
            && self.circularity() > config.min_circularity
            && aspect >= config.min_aspect_ratio
            && aspect <= config.max_aspect_ratio
    }
}

pub struct BallProximityDetector {
    config: BallConfig,
    kernel: Mat,
    masker: ColorMasker,
    mask: Mat,
}

impl BallProximityDetector {
    pub fn new(config: BallConfig) -> Result<Self> {
        let kernel = structuring_element(config.open_kernel)?;
        Ok(Self {
            config,
            kernel,
            masker: ColorMasker::new(),
            mask: Mat::default(),
        })
    }

    /// Evaluate both basket zones of `frame`.
    ///
    /// `previous` is the last sampled frame; it is only consulted when the
    /// motion gate is enabled.
    pub fn detect(
        &mut self,
        frame: &Mat,
        regions: &Regions,
        previous: Option<&Mat>,
    ) -> Result<BallProximity> {
        let in_top = self.ball_at(frame, regions, BasketLocation::Top, previous)?;
        let in_bottom = self.ball_at(frame, regions, BasketLocation::Bottom, previous)?;
        Ok(BallProximity { in_top, in_bottom })
    }

    fn ball_at(
        &mut self,
        frame: &Mat,
        regions: &Regions,
        location: BasketLocation,
        previous: Option<&Mat>,
    ) -> Result<bool> {
        let rect = regions.basket(location);
        let Some(zone) = crop(frame, rect)? else {
            return Ok(false);
        };

        if !self.ball_in_zone(&zone)? {
            return Ok(false);
        }

        if self.config.require_motion {
            let moved = match previous.map(|p| crop(p, rect)).transpose()?.flatten() {
                Some(before) => self.zone_moved(&zone, &before)?,
                None => false,
            };
            if !moved {
                debug!("Ball-like object at {:?} basket ignored: no motion", location);
                return Ok(false);
            }
        }

        debug!("Ball-like object near {:?} basket", location);
        Ok(true)
    }

    /// True if any contour in the zone passes the area, roundness and
    /// aspect-ratio filters.
    pub fn ball_in_zone(&mut self, zone: &Mat) -> Result<bool> {
        self.masker.load(zone)?;
        self.masker
            .mask(&self.config.color, &self.kernel, &mut self.mask)?;

        for contour in external_contours(&self.mask)?.iter() {
            let shape = ContourShape::measure(&contour)?;
            if shape.is_ball_like(&self.config) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn zone_moved(&self, current: &Mat, previous: &Mat) -> Result<bool> {
        if current.size()? != previous.size()? {
            return Ok(true);
        }
        let mut diff = Mat::default();
        core::absdiff(current, previous, &mut diff)?;
        let mean = core::mean(&diff, &core::no_array())?;
        let channels = current.channels().clamp(1, 3) as usize;
        let motion = (0..channels).map(|c| mean[c]).sum::<f64>() / channels as f64;
        Ok(motion >= self.config.min_motion)
    }

    pub fn release_buffers(&mut self) {
        self.masker.release();
        self.mask = Mat::default();
    }
}

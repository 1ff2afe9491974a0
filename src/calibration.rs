// src/calibration.rs
//
// Fixed regions of interest, computed once from the first sampled frame.
// The camera is assumed not to move for the whole video, so nothing here
// looks at frame content.

use crate::config::RegionConfig;
use crate::types::BasketLocation;
use opencv::core::Rect;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionLabel {
    TopBasket,
    BottomBasket,
    Court,
    TeamAArea,
    TeamBArea,
}

impl RegionLabel {
    pub const ALL: [RegionLabel; 5] = [
        RegionLabel::TopBasket,
        RegionLabel::BottomBasket,
        RegionLabel::Court,
        RegionLabel::TeamAArea,
        RegionLabel::TeamBArea,
    ];

    fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RegionLabel::TopBasket => "top basket",
            RegionLabel::BottomBasket => "bottom basket",
            RegionLabel::Court => "court",
            RegionLabel::TeamAArea => "team A area",
            RegionLabel::TeamBArea => "team B area",
        }
    }
}

impl From<BasketLocation> for RegionLabel {
    fn from(location: BasketLocation) -> Self {
        match location {
            BasketLocation::Top => RegionLabel::TopBasket,
            BasketLocation::Bottom => RegionLabel::BottomBasket,
        }
    }
}

/// Calibrated regions, indexed by label.
#[derive(Debug, Clone, PartialEq)]
pub struct Regions {
    rects: [Rect; 5],
    frame_width: i32,
    frame_height: i32,
}

impl Regions {
    pub fn calibrate(width: i32, height: i32, config: &RegionConfig) -> Self {
        let w = width as f64;
        let h = height as f64;

        let basket_w = (w * config.basket_width).round() as i32;
        let basket_h = (h * config.basket_height).round() as i32;
        let basket_x = ((w - basket_w as f64) / 2.0).round() as i32;
        let margin = (h * config.basket_edge_margin).round() as i32;

        let top = Rect::new(basket_x, margin, basket_w, basket_h);
        let bottom = Rect::new(basket_x, height - margin - basket_h, basket_w, basket_h);

        let court_w = (w * config.court_width).round() as i32;
        let court_h = (h * config.court_height).round() as i32;
        let court = Rect::new(
            ((w - court_w as f64) / 2.0).round() as i32,
            ((h - court_h as f64) / 2.0).round() as i32,
            court_w,
            court_h,
        );

        let half = width / 2;
        let team_a = Rect::new(0, 0, half, height);
        let team_b = Rect::new(half, 0, width - half, height);

        let regions = Self {
            rects: [top, bottom, court, team_a, team_b],
            frame_width: width,
            frame_height: height,
        };

        info!(
            "Regions calibrated for {}x{}: top={:?} bottom={:?} court={:?}",
            width, height, top, bottom, court
        );
        regions
    }

    pub fn get(&self, label: RegionLabel) -> Rect {
        self.rects[label.index()]
    }

    pub fn basket(&self, location: BasketLocation) -> Rect {
        self.get(location.into())
    }

    pub fn frame_size(&self) -> (i32, i32) {
        (self.frame_width, self.frame_height)
    }

    pub fn iter(&self) -> impl Iterator<Item = (RegionLabel, Rect)> + '_ {
        RegionLabel::ALL.iter().map(|label| (*label, self.get(*label)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contains(outer: Rect, inner: Rect) -> bool {
        inner.x >= outer.x
            && inner.y >= outer.y
            && inner.x + inner.width <= outer.x + outer.width
            && inner.y + inner.height <= outer.y + outer.height
    }

    #[test]
    fn test_default_regions_640x480() {
        let regions = Regions::calibrate(640, 480, &RegionConfig::default());

        let top = regions.get(RegionLabel::TopBasket);
        assert_eq!(top, Rect::new(224, 0, 192, 120));

        let bottom = regions.get(RegionLabel::BottomBasket);
        assert_eq!(bottom, Rect::new(224, 360, 192, 120));

        let court = regions.get(RegionLabel::Court);
        assert_eq!(court, Rect::new(64, 48, 512, 384));

        assert_eq!(regions.get(RegionLabel::TeamAArea), Rect::new(0, 0, 320, 480));
        assert_eq!(regions.get(RegionLabel::TeamBArea), Rect::new(320, 0, 320, 480));
    }

    #[test]
    fn test_regions_fit_inside_odd_frame() {
        let frame = Rect::new(0, 0, 333, 197);
        let regions = Regions::calibrate(333, 197, &RegionConfig::default());
        for (label, rect) in regions.iter() {
            assert!(contains(frame, rect), "{} escapes the frame", label.as_str());
            assert!(rect.width > 0 && rect.height > 0);
        }
        let a = regions.get(RegionLabel::TeamAArea);
        let b = regions.get(RegionLabel::TeamBArea);
        assert_eq!(a.width + b.width, 333);
    }

    #[test]
    fn test_edge_margin_moves_baskets_inward() {
        let config = RegionConfig {
            basket_edge_margin: 0.05,
            ..RegionConfig::default()
        };
        let regions = Regions::calibrate(400, 400, &config);
        assert_eq!(regions.basket(BasketLocation::Top).y, 20);
        let bottom = regions.basket(BasketLocation::Bottom);
        assert_eq!(bottom.y + bottom.height, 380);
    }
}

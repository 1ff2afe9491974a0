// src/detection/color_mask.rs
//
// HSV thresholding, morphology and contour helpers shared by the ball
// detector and the jersey-colour classifier. Scratch Mats are kept between
// frames and dropped on `release`.

use crate::config::HsvRange;
use anyhow::Result;
use opencv::{
    core::{self, Mat, Point, Rect, Size, Vector},
    imgproc,
    prelude::*,
};

pub type Contours = Vector<Vector<Point>>;

/// Elliptical structuring element of `size`×`size`.
pub fn structuring_element(size: i32) -> Result<Mat> {
    let kernel = imgproc::get_structuring_element(
        imgproc::MORPH_ELLIPSE,
        Size::new(size, size),
        Point::new(-1, -1),
    )?;
    Ok(kernel)
}

/// Clamp `rect` to a `width`×`height` image. Returns None when nothing is left.
pub fn clamp_rect(rect: Rect, width: i32, height: i32) -> Option<Rect> {
    let x1 = rect.x.max(0);
    let y1 = rect.y.max(0);
    let x2 = (rect.x + rect.width).min(width);
    let y2 = (rect.y + rect.height).min(height);
    if x2 <= x1 || y2 <= y1 {
        return None;
    }
    Some(Rect::new(x1, y1, x2 - x1, y2 - y1))
}

/// Owned copy of `rect` inside `image`, clamped to the image bounds.
pub fn crop(image: &Mat, rect: Rect) -> Result<Option<Mat>> {
    match clamp_rect(rect, image.cols(), image.rows()) {
        Some(rect) => Ok(Some(Mat::roi(image, rect)?.try_clone()?)),
        None => Ok(None),
    }
}

pub fn external_contours(mask: &Mat) -> Result<Contours> {
    let mut contours = Contours::new();
    imgproc::find_contours(
        mask,
        &mut contours,
        imgproc::RETR_EXTERNAL,
        imgproc::CHAIN_APPROX_SIMPLE,
        Point::new(0, 0),
    )?;
    Ok(contours)
}

#[derive(Default)]
pub struct ColorMasker {
    hsv: Mat,
    raw: Mat,
}

impl ColorMasker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convert a BGR image into the internal HSV buffer.
    pub fn load(&mut self, bgr: &Mat) -> Result<()> {
        imgproc::cvt_color(bgr, &mut self.hsv, imgproc::COLOR_BGR2HSV, 0)?;
        Ok(())
    }

    /// Threshold the loaded HSV image to `range` and open it with `kernel`.
    pub fn mask(&mut self, range: &HsvRange, kernel: &Mat, out: &mut Mat) -> Result<()> {
        core::in_range(
            &self.hsv,
            &range.lower_scalar(),
            &range.upper_scalar(),
            &mut self.raw,
        )?;
        imgproc::morphology_ex(
            &self.raw,
            out,
            imgproc::MORPH_OPEN,
            kernel,
            Point::new(-1, -1),
            1,
            core::BORDER_CONSTANT,
            imgproc::morphology_default_border_value()?,
        )?;
        Ok(())
    }

    pub fn release(&mut self) {
        self.hsv = Mat::default();
        self.raw = Mat::default();
    }
}

// src/detection/mod.rs

mod ball_proximity;
pub mod color_mask;

pub use ball_proximity::{BallProximityDetector, ContourShape};

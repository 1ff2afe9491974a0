// src/types.rs

use opencv::core::Mat;
use opencv::prelude::*;
use std::fmt;

/// A sampled video frame.
///
/// `image` is the decoded frame at source resolution; `scaled` holds the
/// downscaled copy used for detection when downscaling is enabled.
pub struct Frame {
    pub index: u64,
    /// Game clock: `index / fps`.
    pub timestamp_secs: f64,
    pub image: Mat,
    pub scaled: Option<Mat>,
}

impl Frame {
    /// Image the detectors run on.
    pub fn working(&self) -> &Mat {
        self.scaled.as_ref().unwrap_or(&self.image)
    }

    pub fn working_size(&self) -> (i32, i32) {
        let mat = self.working();
        (mat.cols(), mat.rows())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Team {
    A,
    B,
    Unknown,
}

impl Team {
    /// Parse the external classifier token. Anything else is inconclusive.
    pub fn from_token(token: &str) -> Self {
        match token.trim() {
            "TeamA" => Team::A,
            "TeamB" => Team::B,
            _ => Team::Unknown,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Team::Unknown)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Team::A => "Team A",
            Team::B => "Team B",
            Team::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for Team {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BasketLocation {
    Top,
    Bottom,
}

/// Output of the ball proximity detector for one frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BallProximity {
    pub in_top: bool,
    pub in_bottom: bool,
}

impl BallProximity {
    pub fn near_basket(&self) -> bool {
        self.in_top || self.in_bottom
    }

    /// Basket the ball was seen at; top wins when both fire.
    pub fn location(&self) -> Option<BasketLocation> {
        if self.in_top {
            Some(BasketLocation::Top)
        } else if self.in_bottom {
            Some(BasketLocation::Bottom)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectionVote {
    pub team: Team,
    pub basket: BasketLocation,
    pub frame_index: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_team_token_parsing() {
        assert_eq!(Team::from_token("TeamA"), Team::A);
        assert_eq!(Team::from_token("TeamB\n"), Team::B);
        assert_eq!(Team::from_token("teama"), Team::Unknown);
        assert_eq!(Team::from_token(""), Team::Unknown);
    }

    #[test]
    fn test_proximity_location_prefers_top() {
        let both = BallProximity {
            in_top: true,
            in_bottom: true,
        };
        assert_eq!(both.location(), Some(BasketLocation::Top));

        let bottom = BallProximity {
            in_top: false,
            in_bottom: true,
        };
        assert!(bottom.near_basket());
        assert_eq!(bottom.location(), Some(BasketLocation::Bottom));

        assert_eq!(BallProximity::default().location(), None);
        assert!(!BallProximity::default().near_basket());
    }
}

// src/scoring/ledger.rs
//
// Running score for the whole video. The only mutation is `confirm_basket`,
// which applies the cooldown, minimum-interval, pace and ceiling guards
// before crediting a team.

use crate::config::ScoringConfig;
use crate::types::Team;
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GuardRejection {
    #[error("cooldown active ({0} frames left)")]
    CoolingDown(u32),

    #[error("only {elapsed:.2}s since the last basket, {required:.2}s required")]
    TooSoon { elapsed: f64, required: f64 },

    #[error("projected pace {projected:.2} baskets/min exceeds {limit:.2}")]
    Pace { projected: f64, limit: f64 },

    #[error("total {current} + {points} would exceed the {max} point ceiling")]
    ScoreCeiling { current: u32, points: u32, max: u32 },

    #[error("no team attributed")]
    UnattributedTeam,
}

/// A basket the ledger accepted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreEvent {
    pub team: Team,
    pub points: u32,
    pub team_a_score: u32,
    pub team_b_score: u32,
    pub total_baskets: u32,
    pub game_time_secs: f64,
}

pub struct ScoreLedger {
    config: ScoringConfig,
    team_a_score: u32,
    team_b_score: u32,
    total_baskets: u32,
    last_score_at: Option<Instant>,
    cooldown_frames_remaining: u32,
}

impl ScoreLedger {
    pub fn new(config: ScoringConfig) -> Self {
        Self {
            config,
            team_a_score: 0,
            team_b_score: 0,
            total_baskets: 0,
            last_score_at: None,
            cooldown_frames_remaining: 0,
        }
    }

    pub fn team_a_score(&self) -> u32 {
        self.team_a_score
    }

    pub fn team_b_score(&self) -> u32 {
        self.team_b_score
    }

    pub fn total_score(&self) -> u32 {
        self.team_a_score + self.team_b_score
    }

    pub fn total_baskets(&self) -> u32 {
        self.total_baskets
    }

    pub fn last_score_at(&self) -> Option<Instant> {
        self.last_score_at
    }

    pub fn cooldown_remaining(&self) -> u32 {
        self.cooldown_frames_remaining
    }

    pub fn is_cooling_down(&self) -> bool {
        self.cooldown_frames_remaining > 0
    }

    /// Count one sampled frame off the cooldown.
    pub fn tick_cooldown(&mut self) {
        self.cooldown_frames_remaining = self.cooldown_frames_remaining.saturating_sub(1);
    }

    /// Seconds since the last basket, or None before the first one.
    pub fn seconds_since_last(&self, now: Instant) -> Option<f64> {
        self.last_score_at
            .map(|last| now.saturating_duration_since(last).as_secs_f64())
    }

    /// True once the minimum gap since the last basket has passed.
    pub fn interval_elapsed(&self, now: Instant) -> bool {
        match self.last_score_at {
            Some(last) => {
                now.saturating_duration_since(last)
                    >= Duration::from_secs_f64(self.config.min_seconds_between_scores)
            }
            None => true,
        }
    }

    /// Baskets per minute if one more were credited at `game_time_secs`.
    /// The first minute counts as a full minute.
    pub fn projected_pace(&self, game_time_secs: f64) -> f64 {
        let minutes = (game_time_secs / 60.0).max(1.0);
        (self.total_baskets + 1) as f64 / minutes
    }

    pub fn pace_limit(&self) -> f64 {
        self.config.expected_baskets_per_minute * self.config.pace_multiplier
    }

    pub fn confirm_basket(
        &mut self,
        team: Team,
        now: Instant,
        game_time_secs: f64,
    ) -> Result<ScoreEvent, GuardRejection> {
        if !team.is_known() {
            return Err(GuardRejection::UnattributedTeam);
        }
        if self.is_cooling_down() {
            return Err(GuardRejection::CoolingDown(self.cooldown_frames_remaining));
        }
        if !self.interval_elapsed(now) {
            return Err(GuardRejection::TooSoon {
                elapsed: self.seconds_since_last(now).unwrap_or_default(),
                required: self.config.min_seconds_between_scores,
            });
        }

        let projected = self.projected_pace(game_time_secs);
        let limit = self.pace_limit();
        if projected > limit {
            return Err(GuardRejection::Pace { projected, limit });
        }

        let points = self.config.points_per_basket;
        let current = self.total_score();
        if current + points > self.config.max_total_score {
            return Err(GuardRejection::ScoreCeiling {
                current,
                points,
                max: self.config.max_total_score,
            });
        }

        if team == Team::A {
            self.team_a_score += points;
        } else {
            self.team_b_score += points;
        }
        self.total_baskets += 1;
        self.last_score_at = Some(now);
        self.cooldown_frames_remaining = self.config.cooldown_frames;

        Ok(ScoreEvent {
            team,
            points,
            team_a_score: self.team_a_score,
            team_b_score: self.team_b_score,
            total_baskets: self.total_baskets,
            game_time_secs,
        })
    }
}

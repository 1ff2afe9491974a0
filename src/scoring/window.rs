// src/scoring/window.rs

use crate::types::{BasketLocation, DetectionVote, Team};
use std::collections::VecDeque;

/// Votes per team in a window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VoteTally {
    pub team_a: usize,
    pub team_b: usize,
    pub unknown: usize,
}

impl VoteTally {
    pub fn from_teams<'a>(teams: impl IntoIterator<Item = &'a Team>) -> Self {
        let mut tally = Self::default();
        for team in teams {
            match team {
                Team::A => tally.team_a += 1,
                Team::B => tally.team_b += 1,
                Team::Unknown => tally.unknown += 1,
            }
        }
        tally
    }

    pub fn total(&self) -> usize {
        self.team_a + self.team_b + self.unknown
    }

    /// Team holding at least `threshold × ratio` votes and strictly more
    /// than the other team. Unknown votes fill the window but never win.
    pub fn consensus(&self, threshold: usize, ratio: f64) -> Option<Team> {
        let needed = threshold as f64 * ratio;
        if self.team_a as f64 >= needed && self.team_a > self.team_b {
            Some(Team::A)
        } else if self.team_b as f64 >= needed && self.team_b > self.team_a {
            Some(Team::B)
        } else {
            None
        }
    }
}

/// The single open scoring window: frames since the ball was seen near a
/// basket and a bounded FIFO of attribution votes.
#[derive(Debug, Clone)]
pub struct ScoringWindow {
    pub basket: BasketLocation,
    pub opened_at_frame: u64,
    pub frames_since_opened: u32,
    votes: VecDeque<DetectionVote>,
    capacity: usize,
}

impl ScoringWindow {
    pub fn open(basket: BasketLocation, frame_index: u64, capacity: usize) -> Self {
        Self {
            basket,
            opened_at_frame: frame_index,
            frames_since_opened: 0,
            votes: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Add a vote, evicting the oldest when full.
    pub fn push(&mut self, vote: DetectionVote) {
        if self.votes.len() >= self.capacity {
            self.votes.pop_front();
        }
        self.votes.push_back(vote);
    }

    pub fn len(&self) -> usize {
        self.votes.len()
    }

    pub fn is_full(&self) -> bool {
        self.votes.len() >= self.capacity
    }

    pub fn votes(&self) -> impl Iterator<Item = &DetectionVote> {
        self.votes.iter()
    }

    pub fn tally(&self) -> VoteTally {
        VoteTally::from_teams(self.votes.iter().map(|v| &v.team))
    }
}

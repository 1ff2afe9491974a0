// src/scoring/state_machine.rs
//
// Scoring event state machine.
//
//   Idle ──ball near basket──▶ WindowOpen ──consensus + guards──▶ Cooldown
//     ▲                            │                                 │
//     └──────── timeout ───────────┘◀──────── countdown done ────────┘
//
// Cooldown is the ledger's frame countdown; while it runs the detector and
// window logic are skipped entirely, so no window can open.

use super::ledger::{GuardRejection, ScoreEvent, ScoreLedger};
use super::window::{ScoringWindow, VoteTally};
use crate::config::ScoringConfig;
use crate::types::{BallProximity, BasketLocation, DetectionVote, Team};
use std::time::Instant;
use tracing::{debug, info, warn};

/// What the caller should do with the current sampled frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStep {
    CoolingDown { remaining: u32 },
    Idle,
    Opened { basket: BasketLocation },
    /// Window open but outside the voting frames.
    Waiting { frames_since_opened: u32 },
    /// Attribute this frame and pass the result to `submit_vote`.
    VoteDue {
        frames_since_opened: u32,
        ask_primary: bool,
    },
    TimedOut { votes: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub enum VoteOutcome {
    /// Recorded; no basket yet.
    Pending,
    Scored(ScoreEvent),
    /// Consensus reached but a guard refused it. The window stays open.
    Rejected(GuardRejection),
    /// No window was open.
    Ignored,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ScoringStats {
    pub windows_opened: u64,
    pub windows_timed_out: u64,
    pub votes: VoteTally,
    pub rejections: u64,
}

pub struct ScoringStateMachine {
    config: ScoringConfig,
    window: Option<ScoringWindow>,
    ledger: ScoreLedger,
    stats: ScoringStats,
}

impl ScoringStateMachine {
    pub fn new(config: ScoringConfig) -> Self {
        let ledger = ScoreLedger::new(config.clone());
        Self {
            config,
            window: None,
            ledger,
            stats: ScoringStats::default(),
        }
    }

    pub fn ledger(&self) -> &ScoreLedger {
        &self.ledger
    }

    pub fn window(&self) -> Option<&ScoringWindow> {
        self.window.as_ref()
    }

    pub fn stats(&self) -> ScoringStats {
        self.stats
    }

    /// True while the post-basket cooldown runs; the caller can skip
    /// detection for this frame.
    pub fn is_cooling_down(&self) -> bool {
        self.ledger.is_cooling_down()
    }

    /// Advance one sampled frame.
    pub fn step(&mut self, frame_index: u64, proximity: BallProximity) -> FrameStep {
        if self.ledger.is_cooling_down() {
            self.ledger.tick_cooldown();
            return FrameStep::CoolingDown {
                remaining: self.ledger.cooldown_remaining(),
            };
        }

        let Some(window) = self.window.as_mut() else {
            return match proximity.location() {
                Some(basket) => {
                    self.window = Some(ScoringWindow::open(
                        basket,
                        frame_index,
                        self.config.score_threshold,
                    ));
                    self.stats.windows_opened += 1;
                    debug!("Scoring window opened at frame {} ({:?} basket)", frame_index, basket);
                    FrameStep::Opened { basket }
                }
                None => FrameStep::Idle,
            };
        };

        window.frames_since_opened += 1;
        let frames = window.frames_since_opened;

        if frames > self.config.window_timeout_frames {
            let votes = window.len();
            debug!(
                "Scoring window from frame {} timed out with {} votes ({:?})",
                window.opened_at_frame,
                votes,
                window.tally()
            );
            self.window = None;
            self.stats.windows_timed_out += 1;
            return FrameStep::TimedOut { votes };
        }

        if (self.config.vote_start_frame..=self.config.vote_end_frame).contains(&frames) {
            FrameStep::VoteDue {
                frames_since_opened: frames,
                ask_primary: frames == self.config.external_vote_frame,
            }
        } else {
            FrameStep::Waiting {
                frames_since_opened: frames,
            }
        }
    }

    /// Record a vote for the open window and check for consensus.
    ///
    /// `now` is the wall-clock time used for the minimum interval between
    /// baskets; `game_time_secs` feeds the pace guard.
    pub fn submit_vote(
        &mut self,
        team: Team,
        frame_index: u64,
        now: Instant,
        game_time_secs: f64,
    ) -> VoteOutcome {
        let Some(window) = self.window.as_mut() else {
            return VoteOutcome::Ignored;
        };

        window.push(DetectionVote {
            team,
            basket: window.basket,
            frame_index,
        });
        match team {
            Team::A => self.stats.votes.team_a += 1,
            Team::B => self.stats.votes.team_b += 1,
            Team::Unknown => self.stats.votes.unknown += 1,
        }

        if !window.is_full() || !self.ledger.interval_elapsed(now) {
            return VoteOutcome::Pending;
        }

        let tally = window.tally();
        let Some(winner) =
            tally.consensus(self.config.score_threshold, self.config.team_detection_ratio)
        else {
            return VoteOutcome::Pending;
        };

        match self.ledger.confirm_basket(winner, now, game_time_secs) {
            Ok(event) => {
                info!(
                    "🏀 Basket for {} at {:.1}s (frame {}) | Score A {} - B {} | votes {:?}",
                    winner,
                    game_time_secs,
                    frame_index,
                    event.team_a_score,
                    event.team_b_score,
                    tally
                );
                self.window = None;
                VoteOutcome::Scored(event)
            }
            Err(rejection) => {
                self.stats.rejections += 1;
                warn!(
                    "Basket for {} at {:.1}s rejected: {}",
                    winner, game_time_secs, rejection
                );
                VoteOutcome::Rejected(rejection)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const FPS: f64 = 10.0;

    fn ball_top() -> BallProximity {
        BallProximity {
            in_top: true,
            in_bottom: false,
        }
    }

    /// Feeds frames to the machine, answering every vote request with
    /// `vote_for(frame)`. Wall clock advances in step with the game clock.
    struct Harness {
        machine: ScoringStateMachine,
        start: Instant,
        fps: f64,
        outcomes: Vec<VoteOutcome>,
    }

    impl Harness {
        fn new(config: ScoringConfig, fps: f64) -> Self {
            Self {
                machine: ScoringStateMachine::new(config),
                start: Instant::now(),
                fps,
                outcomes: Vec::new(),
            }
        }

        fn frame(
            &mut self,
            index: u64,
            proximity: BallProximity,
            vote_for: impl Fn(u64) -> Team,
        ) -> FrameStep {
            let step = self.machine.step(index, proximity);
            if let FrameStep::VoteDue { .. } = step {
                let game_time = index as f64 / self.fps;
                let now = self.start + Duration::from_secs_f64(game_time);
                let outcome = self.machine.submit_vote(vote_for(index), index, now, game_time);
                self.outcomes.push(outcome);
            }
            step
        }

        fn scored(&self) -> usize {
            self.outcomes
                .iter()
                .filter(|o| matches!(o, VoteOutcome::Scored(_)))
                .count()
        }
    }

    #[test]
    fn test_no_activity_scores_nothing() {
        let mut h = Harness::new(ScoringConfig::default(), FPS);
        for i in 0..3000 {
            assert_eq!(h.frame(i, BallProximity::default(), |_| Team::A), FrameStep::Idle);
        }
        let ledger = h.machine.ledger();
        assert_eq!((ledger.team_a_score(), ledger.team_b_score()), (0, 0));
        assert_eq!(ledger.total_baskets(), 0);
        assert_eq!(h.machine.stats().windows_opened, 0);
    }

    #[test]
    fn test_single_clean_basket_then_cooldown() {
        let mut h = Harness::new(ScoringConfig::default(), FPS);
        for i in 0..100 {
            h.frame(i, BallProximity::default(), |_| Team::A);
        }

        assert_eq!(
            h.frame(100, ball_top(), |_| Team::A),
            FrameStep::Opened {
                basket: BasketLocation::Top
            }
        );
        for i in 101..=105 {
            h.frame(i, BallProximity::default(), |_| Team::A);
        }

        assert_eq!(
            h.outcomes[..2],
            [VoteOutcome::Pending, VoteOutcome::Pending]
        );
        let VoteOutcome::Scored(event) = &h.outcomes[2] else {
            panic!("expected a basket at frame 105, got {:?}", h.outcomes[2]);
        };
        assert_eq!(event.team, Team::A);

        let ledger = h.machine.ledger();
        assert_eq!(ledger.team_a_score(), 2);
        assert_eq!(ledger.team_b_score(), 0);
        assert_eq!(ledger.total_baskets(), 1);
        assert!(h.machine.window().is_none());

        // Ball keeps showing up during the cooldown: nothing opens.
        for i in 106..166 {
            let step = h.frame(i, ball_top(), |_| Team::A);
            assert!(matches!(step, FrameStep::CoolingDown { .. }), "frame {i}: {step:?}");
            assert!(h.machine.window().is_none());
        }
        assert!(!h.machine.is_cooling_down());
        assert_eq!(h.machine.ledger().total_baskets(), 1);
        assert_eq!(h.machine.stats().windows_opened, 1);

        // First frame after the cooldown may open a new window.
        assert!(matches!(
            h.frame(166, ball_top(), |_| Team::A),
            FrameStep::Opened { .. }
        ));
    }

    #[test]
    fn test_votes_only_inside_vote_frames() {
        let mut machine = ScoringStateMachine::new(ScoringConfig::default());
        machine.step(0, ball_top());

        let steps: Vec<FrameStep> = (1..=16)
            .map(|i| machine.step(i, BallProximity::default()))
            .collect();

        assert_eq!(steps[0], FrameStep::Waiting { frames_since_opened: 1 });
        assert_eq!(steps[1], FrameStep::Waiting { frames_since_opened: 2 });
        assert_eq!(
            steps[2],
            FrameStep::VoteDue {
                frames_since_opened: 3,
                ask_primary: false
            }
        );
        assert_eq!(
            steps[4],
            FrameStep::VoteDue {
                frames_since_opened: 5,
                ask_primary: true
            }
        );
        assert!(matches!(steps[9], FrameStep::VoteDue { frames_since_opened: 10, .. }));
        assert_eq!(steps[10], FrameStep::Waiting { frames_since_opened: 11 });
        assert_eq!(steps[14], FrameStep::Waiting { frames_since_opened: 15 });
        assert_eq!(steps[15], FrameStep::TimedOut { votes: 0 });
        assert!(machine.window().is_none());
        assert_eq!(machine.stats().windows_timed_out, 1);
    }

    #[test]
    fn test_split_votes_time_out_without_score() {
        let mut h = Harness::new(ScoringConfig::default(), FPS);
        h.frame(0, ball_top(), |_| Team::A);
        // Every three consecutive votes hold one A, one B and one unknown.
        let rotate = |i: u64| match i % 3 {
            0 => Team::A,
            1 => Team::B,
            _ => Team::Unknown,
        };
        let mut last = FrameStep::Idle;
        for i in 1..=16 {
            last = h.frame(i, BallProximity::default(), rotate);
        }
        assert_eq!(last, FrameStep::TimedOut { votes: 3 });
        assert_eq!(h.scored(), 0);
        assert_eq!(h.machine.ledger().total_baskets(), 0);
    }

    #[test]
    fn test_unknown_votes_fill_but_do_not_score() {
        let mut h = Harness::new(ScoringConfig::default(), FPS);
        h.frame(0, ball_top(), |_| Team::A);
        for i in 1..=16 {
            h.frame(i, BallProximity::default(), |i| {
                if i == 4 { Team::B } else { Team::Unknown }
            });
        }
        assert_eq!(h.scored(), 0);
        assert_eq!(h.machine.stats().votes.unknown, 7);
    }

    #[test]
    fn test_minimum_interval_defers_consensus() {
        let config = ScoringConfig {
            cooldown_frames: 0,
            ..ScoringConfig::default()
        };
        let mut machine = ScoringStateMachine::new(config);
        let start = Instant::now();

        machine.step(0, ball_top());
        for i in 1..=5 {
            if let FrameStep::VoteDue { .. } = machine.step(i, BallProximity::default()) {
                machine.submit_vote(Team::A, i, start, 120.0);
            }
        }
        assert_eq!(machine.ledger().total_baskets(), 1);

        // Second window reaches consensus one second later: held back.
        machine.step(6, ball_top());
        let mut outcomes = Vec::new();
        for i in 7..=11 {
            if let FrameStep::VoteDue { .. } = machine.step(i, BallProximity::default()) {
                let now = start + Duration::from_secs(1);
                outcomes.push(machine.submit_vote(Team::B, i, now, 121.0));
            }
        }
        assert!(outcomes.iter().all(|o| *o == VoteOutcome::Pending));
        assert!(machine.window().is_some());

        // Once the interval has passed the next vote scores.
        let mut scored = false;
        for i in 12..=16 {
            if let FrameStep::VoteDue { .. } = machine.step(i, BallProximity::default()) {
                let now = start + Duration::from_secs(4);
                if let VoteOutcome::Scored(_) = machine.submit_vote(Team::B, i, now, 124.0) {
                    scored = true;
                    break;
                }
            }
        }
        assert!(scored);
        assert_eq!(machine.ledger().team_b_score(), 2);
    }

    #[test]
    fn test_rejected_basket_keeps_window_open() {
        let config = ScoringConfig {
            max_total_score: 1,
            ..ScoringConfig::default()
        };
        let mut machine = ScoringStateMachine::new(config);
        let now = Instant::now();

        machine.step(0, ball_top());
        let mut last = VoteOutcome::Ignored;
        for i in 1..=5 {
            if let FrameStep::VoteDue { .. } = machine.step(i, BallProximity::default()) {
                last = machine.submit_vote(Team::A, i, now, 60.0);
            }
        }
        assert!(matches!(
            last,
            VoteOutcome::Rejected(GuardRejection::ScoreCeiling { .. })
        ));
        assert!(machine.window().is_some());
        assert!(!machine.is_cooling_down());
        assert_eq!(machine.stats().rejections, 1);
    }

    #[test]
    fn test_vote_without_window_is_ignored() {
        let mut machine = ScoringStateMachine::new(ScoringConfig::default());
        assert_eq!(
            machine.submit_vote(Team::A, 3, Instant::now(), 0.3),
            VoteOutcome::Ignored
        );
        assert_eq!(machine.stats().votes.total(), 0);
    }

    #[test]
    fn test_pace_guard_rejects_burst_of_baskets() {
        // No cooldown or interval so only the pace guard limits scoring.
        let config = ScoringConfig {
            cooldown_frames: 0,
            min_seconds_between_scores: 0.0,
            ..ScoringConfig::default()
        };
        // 40 fps game clock: 20 windows × 17 frames stay under 10 seconds.
        let mut h = Harness::new(config, 40.0);
        let mut frame = 0;
        let mut consensus_events = 0;
        for _ in 0..20 {
            h.frame(frame, ball_top(), |_| Team::A);
            frame += 1;
            let before = h.outcomes.len();
            loop {
                let step = h.frame(frame, BallProximity::default(), |_| Team::A);
                frame += 1;
                if matches!(step, FrameStep::TimedOut { .. }) || h.machine.window().is_none() {
                    break;
                }
            }
            if h.outcomes[before..]
                .iter()
                .any(|o| matches!(o, VoteOutcome::Scored(_) | VoteOutcome::Rejected(_)))
            {
                consensus_events += 1;
            }
        }

        assert!(frame as f64 / 40.0 <= 10.0);
        assert_eq!(consensus_events, 20);
        assert_eq!(h.scored(), 4);
        assert!(h.outcomes.iter().any(|o| matches!(
            o,
            VoteOutcome::Rejected(GuardRejection::Pace { .. })
        )));
        let ledger = h.machine.ledger();
        assert_eq!(ledger.total_baskets(), 4);
        assert_eq!(ledger.team_a_score(), 8);
    }
}

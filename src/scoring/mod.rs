// src/scoring/mod.rs

mod ledger;
mod state_machine;
mod window;

pub use ledger::{GuardRejection, ScoreEvent, ScoreLedger};
pub use state_machine::{FrameStep, ScoringStateMachine, ScoringStats, VoteOutcome};
pub use window::{ScoringWindow, VoteTally};

// src/pipeline/summary.rs

use super::metrics::MetricsSummary;
use crate::attribution::AttributionStats;
use crate::scoring::ScoringStats;
use crate::types::Team;
use std::fmt;

/// `mm:ss` game clock.
pub fn format_clock(secs: f64) -> String {
    let total = secs.max(0.0).round() as u64;
    format!("{:02}:{:02}", total / 60, total % 60)
}

/// Resident set size of this process in MB. Linux only; diagnostics.
pub fn resident_memory_mb() -> Option<f64> {
    let status = std::fs::read_to_string("/proc/self/status").ok()?;
    let line = status.lines().find(|l| l.starts_with("VmRSS:"))?;
    let kb: f64 = line.split_whitespace().nth(1)?.parse().ok()?;
    Some(kb / 1024.0)
}

/// One periodic progress line.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressReport {
    pub percent: f64,
    pub game_time_secs: f64,
    pub total_secs: f64,
    pub team_a_score: u32,
    pub team_b_score: u32,
    pub total_baskets: u32,
    pub memory_mb: Option<f64>,
}

impl fmt::Display for ProgressReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Progress: {:.1}% | {} / {} | Score A {} - B {} | Baskets: {}",
            self.percent,
            format_clock(self.game_time_secs),
            format_clock(self.total_secs),
            self.team_a_score,
            self.team_b_score,
            self.total_baskets
        )?;
        if let Some(mb) = self.memory_mb {
            write!(f, " | Mem: {:.0} MB", mb)?;
        }
        Ok(())
    }
}

/// Final result of analyzing one video.
#[derive(Debug, Clone)]
pub struct GameSummary {
    pub source: String,
    pub game_duration_secs: f64,
    pub team_a_score: u32,
    pub team_b_score: u32,
    pub total_baskets: u32,
    pub cancelled: bool,
    pub metrics: MetricsSummary,
    pub scoring: ScoringStats,
    pub attribution: AttributionStats,
}

impl GameSummary {
    /// Baskets per minute of game time.
    pub fn pace_per_minute(&self) -> f64 {
        let minutes = self.game_duration_secs / 60.0;
        if minutes > 0.0 {
            self.total_baskets as f64 / minutes
        } else {
            0.0
        }
    }

    /// `None` on a tie.
    pub fn winner(&self) -> Option<Team> {
        match self.team_a_score.cmp(&self.team_b_score) {
            std::cmp::Ordering::Greater => Some(Team::A),
            std::cmp::Ordering::Less => Some(Team::B),
            std::cmp::Ordering::Equal => None,
        }
    }
}

impl fmt::Display for GameSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "🏀 Game summary: {}", self.source)?;
        if self.cancelled {
            writeln!(f, "  ⚠️  Analysis cancelled, partial result")?;
        }
        writeln!(f, "  Game duration: {}", format_clock(self.game_duration_secs))?;
        writeln!(f, "  Total baskets: {}", self.total_baskets)?;
        writeln!(f, "  Pace: {:.2} baskets/min", self.pace_per_minute())?;
        writeln!(f, "  Final score: Team A {} - Team B {}", self.team_a_score, self.team_b_score)?;
        match self.winner() {
            Some(team) => writeln!(f, "  Winner: {}", team)?,
            None => writeln!(f, "  Result: tie")?,
        }

        let s = &self.scoring;
        writeln!(
            f,
            "  Windows: {} opened, {} timed out | Votes A/B/unknown: {}/{}/{} | Rejected: {}",
            s.windows_opened,
            s.windows_timed_out,
            s.votes.team_a,
            s.votes.team_b,
            s.votes.unknown,
            s.rejections
        )?;
        let a = &self.attribution;
        writeln!(
            f,
            "  External classifier: {} calls, {} conclusive, {} failed | Jersey fallback: {} calls",
            a.primary_calls, a.primary_hits, a.primary_failures, a.fallback_calls
        )?;
        let m = &self.metrics;
        write!(
            f,
            "  Frames: {} sampled, {} processed, {} skipped on error | {:.1} FPS",
            m.frames_sampled, m.frames_processed, m.frames_faulted, m.fps
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::PipelineMetrics;

    fn summary(a: u32, b: u32, duration: f64) -> GameSummary {
        GameSummary {
            source: "game.mp4".to_string(),
            game_duration_secs: duration,
            team_a_score: a,
            team_b_score: b,
            total_baskets: (a + b) / 2,
            cancelled: false,
            metrics: PipelineMetrics::new().summary(),
            scoring: ScoringStats::default(),
            attribution: AttributionStats::default(),
        }
    }

    #[test]
    fn test_winner_and_tie() {
        assert_eq!(summary(8, 4, 600.0).winner(), Some(Team::A));
        assert_eq!(summary(2, 6, 600.0).winner(), Some(Team::B));
        assert_eq!(summary(0, 0, 600.0).winner(), None);
    }

    #[test]
    fn test_pace() {
        assert!((summary(12, 8, 300.0).pace_per_minute() - 2.0).abs() < 1e-9);
        assert_eq!(summary(0, 0, 0.0).pace_per_minute(), 0.0);
    }

    #[test]
    fn test_display_reports_score_and_result() {
        let text = summary(6, 6, 125.0).to_string();
        assert!(text.contains("Final score: Team A 6 - Team B 6"));
        assert!(text.contains("Result: tie"));
        assert!(text.contains("Game duration: 02:05"));
        assert!(text.contains("Total baskets: 6"));

        let mut cancelled = summary(2, 0, 30.0);
        cancelled.cancelled = true;
        let text = cancelled.to_string();
        assert!(text.contains("cancelled"));
        assert!(text.contains("Winner: Team A"));
    }

    #[test]
    fn test_progress_line() {
        let report = ProgressReport {
            percent: 42.0,
            game_time_secs: 61.0,
            total_secs: 600.0,
            team_a_score: 2,
            team_b_score: 4,
            total_baskets: 3,
            memory_mb: None,
        };
        assert_eq!(
            report.to_string(),
            "Progress: 42.0% | 01:01 / 10:00 | Score A 2 - B 4 | Baskets: 3"
        );
    }

    #[test]
    fn test_clock_format() {
        assert_eq!(format_clock(0.0), "00:00");
        assert_eq!(format_clock(59.6), "01:00");
        assert_eq!(format_clock(3725.0), "62:05");
    }
}

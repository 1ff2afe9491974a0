// src/pipeline/metrics.rs
//
// Run counters for one video. Owned and updated by the analyzer loop only.

use std::time::Instant;

#[derive(Debug, Clone)]
pub struct PipelineMetrics {
    pub frames_sampled: u64,
    pub frames_faulted: u64,
    pub frames_in_cooldown: u64,
    pub frames_with_ball: u64,
    pub buffer_releases: u64,
    pub detection_time_us: u64,
    pub attribution_time_us: u64,
    pub started_at: Instant,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self {
            frames_sampled: 0,
            frames_faulted: 0,
            frames_in_cooldown: 0,
            frames_with_ball: 0,
            buffer_releases: 0,
            detection_time_us: 0,
            attribution_time_us: 0,
            started_at: Instant::now(),
        }
    }

    /// Sampled frames per second of wall time.
    pub fn fps(&self) -> f64 {
        let elapsed = self.started_at.elapsed().as_secs_f64();
        if elapsed > 0.01 {
            self.frames_sampled as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            frames_sampled: self.frames_sampled,
            frames_processed: self.frames_sampled.saturating_sub(self.frames_faulted),
            frames_faulted: self.frames_faulted,
            frames_in_cooldown: self.frames_in_cooldown,
            frames_with_ball: self.frames_with_ball,
            buffer_releases: self.buffer_releases,
            fps: self.fps(),
            last_detection_us: self.detection_time_us,
            last_attribution_us: self.attribution_time_us,
            elapsed_secs: self.started_at.elapsed().as_secs_f64(),
        }
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct MetricsSummary {
    pub frames_sampled: u64,
    pub frames_processed: u64,
    pub frames_faulted: u64,
    pub frames_in_cooldown: u64,
    pub frames_with_ball: u64,
    pub buffer_releases: u64,
    pub fps: f64,
    pub last_detection_us: u64,
    pub last_attribution_us: u64,
    pub elapsed_secs: f64,
}

// src/pipeline/mod.rs

pub mod analyzer;
pub mod metrics;
pub mod summary;

pub use analyzer::{FrameReport, GameAnalyzer};
pub use metrics::{MetricsSummary, PipelineMetrics};
pub use summary::{GameSummary, ProgressReport};

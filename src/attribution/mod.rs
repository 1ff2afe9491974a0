// src/attribution/mod.rs
//
// Team attribution for a scoring window: an optional slow classifier asked
// once mid-window, with the jersey-colour heuristic covering every other vote
// and any inconclusive or failed slow call.

mod external;
mod jersey_color;

pub use external::{ClassifierError, ExternalProcessClassifier};
pub use jersey_color::{JerseyColorClassifier, JerseyCounts};

use crate::calibration::Regions;
use crate::config::Config;
use crate::types::{Frame, Team};
use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, info, warn};

/// Something that can name the team responsible for a frame.
#[async_trait(?Send)]
pub trait TeamClassifier {
    fn name(&self) -> &'static str;

    async fn classify(&mut self, frame: &Frame, regions: &Regions) -> Result<Team>;

    /// Drop any scratch buffers held between calls.
    fn release_buffers(&mut self) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AttributionStats {
    pub primary_calls: u64,
    pub primary_hits: u64,
    pub primary_failures: u64,
    pub fallback_calls: u64,
}

pub struct TeamAttributor {
    primary: Option<Box<dyn TeamClassifier>>,
    fallback: Box<dyn TeamClassifier>,
    stats: AttributionStats,
}

impl TeamAttributor {
    pub fn new(
        primary: Option<Box<dyn TeamClassifier>>,
        fallback: Box<dyn TeamClassifier>,
    ) -> Self {
        Self {
            primary,
            fallback,
            stats: AttributionStats::default(),
        }
    }

    /// External process first when configured, jersey colours always.
    pub fn from_config(config: &Config) -> Result<Self> {
        let primary = ExternalProcessClassifier::from_config(&config.classifier)?
            .map(|c| Box::new(c) as Box<dyn TeamClassifier>);
        match &primary {
            Some(_) => info!(
                "External classifier enabled ({} ms timeout)",
                config.classifier.timeout_ms
            ),
            None => info!("No external classifier configured, using jersey colours only"),
        }
        let fallback = Box::new(JerseyColorClassifier::new(config.jersey.clone())?);
        Ok(Self::new(primary, fallback))
    }

    /// Produce one team vote for `frame`.
    ///
    /// `ask_primary` marks the mid-window frame where the slow classifier is
    /// worth its cost. A failed or inconclusive slow call falls through to
    /// the fallback; fallback errors are returned to the caller.
    pub async fn classify(
        &mut self,
        frame: &Frame,
        regions: &Regions,
        ask_primary: bool,
    ) -> Result<Team> {
        if ask_primary {
            if let Some(primary) = self.primary.as_mut() {
                self.stats.primary_calls += 1;
                match primary.classify(frame, regions).await {
                    Ok(team) if team.is_known() => {
                        self.stats.primary_hits += 1;
                        debug!("{} classifier voted {} at frame {}", primary.name(), team, frame.index);
                        return Ok(team);
                    }
                    Ok(_) => {
                        debug!("{} classifier inconclusive at frame {}", primary.name(), frame.index);
                    }
                    Err(e) => {
                        self.stats.primary_failures += 1;
                        warn!(
                            "{} classifier failed at frame {}: {:#}. Falling back to {}",
                            primary.name(),
                            frame.index,
                            e,
                            self.fallback.name()
                        );
                    }
                }
            }
        }

        self.stats.fallback_calls += 1;
        self.fallback.classify(frame, regions).await
    }

    pub fn stats(&self) -> AttributionStats {
        self.stats
    }

    pub fn release_buffers(&mut self) {
        if let Some(primary) = self.primary.as_mut() {
            primary.release_buffers();
        }
        self.fallback.release_buffers();
    }
}

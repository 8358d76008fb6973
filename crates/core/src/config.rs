//! Processor configuration.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Limits and pacing for one document-processing run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessorConfig {
    /// Slides sent to the rewrite service together.
    pub max_slides_per_section: usize,

    /// Decks above this size are rejected before any work starts.
    pub max_total_slides: usize,

    /// Character budget of each section summary.
    pub summary_max_chars: usize,

    /// Attempts per section before it degrades to placeholders.
    pub section_max_attempts: usize,

    /// Base of the exponential backoff between section attempts.
    pub section_backoff_base_ms: u64,

    /// Interval of synthetic progress ticks while a section is in flight.
    pub progress_tick_ms: u64,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            max_slides_per_section: 50,
            max_total_slides: 500,
            summary_max_chars: 500,
            section_max_attempts: 3,
            section_backoff_base_ms: 1000,
            progress_tick_ms: 2000,
        }
    }
}

impl ProcessorConfig {
    /// Create a configuration with default limits.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the section size.
    pub fn with_max_slides_per_section(mut self, max: usize) -> Self {
        self.max_slides_per_section = max;
        self
    }

    /// Set the deck size limit.
    pub fn with_max_total_slides(mut self, max: usize) -> Self {
        self.max_total_slides = max;
        self
    }

    /// Set the summary character budget.
    pub fn with_summary_max_chars(mut self, max: usize) -> Self {
        self.summary_max_chars = max;
        self
    }

    /// Set the section attempt count and backoff base.
    pub fn with_section_retry(mut self, attempts: usize, backoff_base: Duration) -> Self {
        self.section_max_attempts = attempts;
        self.section_backoff_base_ms = backoff_base.as_millis() as u64;
        self
    }

    /// Set the progress tick interval.
    pub fn with_progress_tick(mut self, tick: Duration) -> Self {
        self.progress_tick_ms = tick.as_millis() as u64;
        self
    }

    pub fn section_backoff_base(&self) -> Duration {
        Duration::from_millis(self.section_backoff_base_ms)
    }

    pub fn progress_tick(&self) -> Duration {
        Duration::from_millis(self.progress_tick_ms)
    }

    /// Reject values that would make processing meaningless.
    pub fn validate(&self) -> Result<()> {
        if self.max_slides_per_section == 0 {
            return Err(Error::InvalidConfig(
                "max_slides_per_section must be positive".to_string(),
            ));
        }
        if self.max_total_slides == 0 {
            return Err(Error::InvalidConfig(
                "max_total_slides must be positive".to_string(),
            ));
        }
        if self.section_max_attempts == 0 {
            return Err(Error::InvalidConfig(
                "section_max_attempts must be positive".to_string(),
            ));
        }
        if self.progress_tick_ms == 0 {
            return Err(Error::InvalidConfig(
                "progress_tick_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

//! Broadcast configuration

use std::time::Duration;

use super::part::DEFAULT_BOUNDARY;
use crate::env::env_or;
use crate::error::Result;

/// Viewer loop options
#[derive(Debug, Clone)]
pub struct BroadcastConfig {
    /// Delay between two frame buffer polls
    pub poll_interval: Duration,

    /// Re-send the current frame when nothing new arrived for this long
    /// (zero re-sends on every poll)
    pub keepalive_interval: Duration,

    /// Multipart boundary token
    pub boundary: String,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(50), // ~20 fps
            keepalive_interval: Duration::from_secs(1),
            boundary: DEFAULT_BOUNDARY.to_string(),
        }
    }
}

impl BroadcastConfig {
    /// Load from environment variables, falling back to defaults
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            poll_interval: Duration::from_millis(env_or("POLL_INTERVAL_MS", 50)?),
            keepalive_interval: Duration::from_millis(env_or("KEEPALIVE_INTERVAL_MS", 1_000)?),
            ..Default::default()
        })
    }

    /// Set the poll interval
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the keepalive interval
    pub fn keepalive_interval(mut self, interval: Duration) -> Self {
        self.keepalive_interval = interval;
        self
    }
}

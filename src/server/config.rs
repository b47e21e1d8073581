//! Server configuration

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use crate::broadcast::BroadcastConfig;
use crate::env::{env_optional_path, env_or};
use crate::error::Result;
use crate::transcode::TranscodeConfig;

/// Default snapshot directory, relative to the working directory
pub const DEFAULT_SNAPSHOT_DIR: &str = "frames";

/// Relay configuration options
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// Largest accepted producer message
    pub max_frame_bytes: usize,

    /// Disconnect a producer that sends nothing for this long
    pub producer_idle_timeout: Duration,

    /// Where `frame_latest.jpg` is written (None disables snapshots)
    pub snapshot_dir: Option<PathBuf>,

    /// Viewer loop options
    pub broadcast: BroadcastConfig,

    /// Encoder options
    pub transcode: TranscodeConfig,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 5000)),
            max_frame_bytes: 8 * 1024 * 1024, // 8MB
            producer_idle_timeout: Duration::from_secs(10),
            snapshot_dir: Some(PathBuf::from(DEFAULT_SNAPSHOT_DIR)),
            broadcast: BroadcastConfig::default(),
            transcode: TranscodeConfig::default(),
        }
    }
}

impl RelayConfig {
    /// Load from environment variables, falling back to defaults
    pub fn from_env() -> Result<Self> {
        let host: IpAddr = env_or("HOST", IpAddr::from([0, 0, 0, 0]))?;
        let port: u16 = env_or("PORT", 5000)?;

        Ok(Self {
            bind_addr: SocketAddr::new(host, port),
            max_frame_bytes: env_or("MAX_FRAME_BYTES", 8 * 1024 * 1024)?,
            producer_idle_timeout: Duration::from_millis(env_or("PRODUCER_IDLE_MS", 10_000)?),
            snapshot_dir: env_optional_path(
                "FRAME_DIR",
                Some(PathBuf::from(DEFAULT_SNAPSHOT_DIR)),
            ),
            broadcast: BroadcastConfig::from_env()?,
            transcode: TranscodeConfig::from_env()?,
        })
    }

    /// Create a new config with custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set the largest accepted producer message
    pub fn max_frame_bytes(mut self, max: usize) -> Self {
        self.max_frame_bytes = max;
        self
    }

    /// Set the producer idle timeout
    pub fn producer_idle_timeout(mut self, timeout: Duration) -> Self {
        self.producer_idle_timeout = timeout;
        self
    }

    /// Write snapshots into `dir`
    pub fn snapshot_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.snapshot_dir = Some(dir.into());
        self
    }

    /// Disable the snapshot writer
    pub fn disable_snapshots(mut self) -> Self {
        self.snapshot_dir = None;
        self
    }

    /// Replace the viewer options
    pub fn broadcast(mut self, broadcast: BroadcastConfig) -> Self {
        self.broadcast = broadcast;
        self
    }

    /// Replace the encoder options
    pub fn transcode(mut self, transcode: TranscodeConfig) -> Self {
        self.transcode = transcode;
        self
    }
}

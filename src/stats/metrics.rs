//! Statistics for producer sessions, viewers and the transcoder

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::transcode::TranscoderState;

/// Per-connection producer statistics
#[derive(Debug, Clone)]
pub struct SessionStats {
    /// Connection start time
    pub started_at: Instant,
    /// Frames accepted
    pub frames: u64,
    /// Payload bytes accepted
    pub bytes: u64,
    /// Messages ignored (text, empty)
    pub ignored: u64,
}

impl SessionStats {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            frames: 0,
            bytes: 0,
            ignored: 0,
        }
    }

    /// Get duration since the session started
    pub fn duration(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Average bitrate in bits per second
    pub fn bitrate(&self) -> u64 {
        let secs = self.duration().as_secs();
        if secs > 0 {
            (self.bytes * 8) / secs
        } else {
            0
        }
    }

    /// Average frame rate
    pub fn framerate(&self) -> f64 {
        let secs = self.duration().as_secs_f64();
        if secs > 0.0 {
            self.frames as f64 / secs
        } else {
            0.0
        }
    }
}

impl Default for SessionStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Server-wide ingest counters, updated by the producer handler
#[derive(Debug, Default)]
pub struct IngestCounters {
    pub connections: AtomicU64,
    pub rejected: AtomicU64,
    pub frames: AtomicU64,
    pub bytes: AtomicU64,
    pub ignored: AtomicU64,
}

impl IngestCounters {
    pub fn snapshot(&self, producer_connected: bool) -> IngestStats {
        IngestStats {
            producer_connected,
            connections: self.connections.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            frames: self.frames.load(Ordering::Relaxed),
            bytes: self.bytes.load(Ordering::Relaxed),
            ignored: self.ignored.load(Ordering::Relaxed),
        }
    }
}

/// Server-wide viewer counters
#[derive(Debug, Default)]
pub struct ViewerCounters {
    pub active: AtomicU64,
    pub total: AtomicU64,
    pub parts_sent: AtomicU64,
}

impl ViewerCounters {
    pub fn snapshot(&self) -> BroadcastStats {
        BroadcastStats {
            active_viewers: self.active.load(Ordering::Relaxed),
            total_viewers: self.total.load(Ordering::Relaxed),
            parts_sent: self.parts_sent.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestStats {
    pub producer_connected: bool,
    pub connections: u64,
    pub rejected: u64,
    pub frames: u64,
    pub bytes: u64,
    pub ignored: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct BroadcastStats {
    pub active_viewers: u64,
    pub total_viewers: u64,
    pub parts_sent: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TranscodeStats {
    pub enabled: bool,
    pub state: TranscoderState,
    pub launches: u64,
    pub launch_failures: u64,
    pub failures: u64,
    pub frames_written: u64,
    pub frames_dropped: u64,
}

/// Server-wide statistics served by `/stats`
#[derive(Debug, Clone, Serialize)]
pub struct ServerStats {
    pub uptime_secs: u64,
    pub sequence: u64,
    pub ingest: IngestStats,
    pub broadcast: BroadcastStats,
    pub transcode: TranscodeStats,
}

//! Counters and snapshots

pub mod metrics;

pub use metrics::{
    BroadcastStats, IngestCounters, IngestStats, ServerStats, SessionStats, TranscodeStats,
    ViewerCounters,
};

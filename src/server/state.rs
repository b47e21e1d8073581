//! Shared handler state

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;

use crate::broadcast::ViewerSession;
use crate::buffer::FrameBuffer;
use crate::ingest::ProducerSlot;
use crate::server::config::RelayConfig;
use crate::stats::{IngestCounters, ServerStats, ViewerCounters};
use crate::transcode::TranscodeSupervisor;

/// State handed to every axum handler
///
/// Cheap to clone; everything behind it is shared.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<RelayConfig>,
    pub buffer: Arc<FrameBuffer>,
    pub supervisor: Arc<TranscodeSupervisor>,
    pub producer: Arc<ProducerSlot>,
    pub ingest: Arc<IngestCounters>,
    pub viewers: Arc<ViewerCounters>,
    /// Cancelled when the server starts shutting down
    pub cancel: CancellationToken,
    start_time: Instant,
    next_session_id: Arc<AtomicU64>,
}

impl AppState {
    /// Build state with an ffmpeg-backed supervisor
    pub fn new(config: RelayConfig) -> Self {
        let supervisor = Arc::new(TranscodeSupervisor::new(config.transcode.clone()));
        Self::with_supervisor(config, supervisor)
    }

    /// Build state around an existing supervisor
    pub fn with_supervisor(config: RelayConfig, supervisor: Arc<TranscodeSupervisor>) -> Self {
        Self {
            config: Arc::new(config),
            buffer: Arc::new(FrameBuffer::new()),
            supervisor,
            producer: Arc::new(ProducerSlot::new()),
            ingest: Arc::new(IngestCounters::default()),
            viewers: Arc::new(ViewerCounters::default()),
            cancel: CancellationToken::new(),
            start_time: Instant::now(),
            next_session_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Allocate a connection id, shared by producers and viewers
    pub fn next_session_id(&self) -> u64 {
        self.next_session_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Start a broadcast session for a new viewer
    pub fn open_viewer(&self) -> ViewerSession {
        ViewerSession::new(
            self.next_session_id(),
            Arc::clone(&self.buffer),
            self.config.broadcast.clone(),
            self.cancel.clone(),
            Arc::clone(&self.viewers),
        )
    }

    pub fn stats(&self) -> ServerStats {
        ServerStats {
            uptime_secs: self.start_time.elapsed().as_secs(),
            sequence: self.buffer.sequence(),
            ingest: self.ingest.snapshot(self.producer.is_occupied()),
            broadcast: self.viewers.snapshot(),
            transcode: self.supervisor.stats(),
        }
    }
}

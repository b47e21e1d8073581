//! Viewer session
//!
//! One per open `/stream` connection. The session polls the frame buffer on a
//! fixed cadence and yields a multipart part whenever the sequence number has
//! advanced, or when the keepalive interval has passed since the last part.
//! The HTTP body drops the session when the client goes away.

use std::convert::Infallible;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use bytes::Bytes;
use futures::Stream;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::config::BroadcastConfig;
use super::part::encode_part;
use crate::buffer::FrameBuffer;
use crate::stats::ViewerCounters;

/// Per-connection broadcast state
pub struct ViewerSession {
    id: u64,
    buffer: Arc<FrameBuffer>,
    config: BroadcastConfig,
    cancel: CancellationToken,
    counters: Arc<ViewerCounters>,
    last_seq: u64,
    last_sent: Option<Instant>,
    parts_sent: u64,
    opened_at: Instant,
}

impl ViewerSession {
    pub fn new(
        id: u64,
        buffer: Arc<FrameBuffer>,
        config: BroadcastConfig,
        cancel: CancellationToken,
        counters: Arc<ViewerCounters>,
    ) -> Self {
        counters.active.fetch_add(1, Ordering::Relaxed);
        counters.total.fetch_add(1, Ordering::Relaxed);

        Self {
            id,
            buffer,
            config,
            cancel,
            counters,
            last_seq: 0,
            last_sent: None,
            parts_sent: 0,
            opened_at: Instant::now(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Sequence number of the last frame written (0 before the first)
    pub fn last_seq(&self) -> u64 {
        self.last_seq
    }

    /// Wait for the next part to send
    ///
    /// Returns `None` once the server is shutting down.
    pub async fn next_part(&mut self) -> Option<Bytes> {
        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return None,
                _ = tokio::time::sleep(self.config.poll_interval) => {}
            }

            let Some(frame) = self.buffer.peek() else {
                continue;
            };

            let advanced = frame.seq != self.last_seq;
            let keepalive_due = self
                .last_sent
                .is_some_and(|at| at.elapsed() >= self.config.keepalive_interval);

            if advanced || keepalive_due {
                self.last_seq = frame.seq;
                self.last_sent = Some(Instant::now());
                self.parts_sent += 1;
                self.counters.parts_sent.fetch_add(1, Ordering::Relaxed);
                return Some(encode_part(&self.config.boundary, &frame));
            }
        }
    }

    /// Turn the session into a response body stream
    pub fn into_stream(self) -> impl Stream<Item = Result<Bytes, Infallible>> + Send + 'static {
        futures::stream::unfold(self, |mut session| async move {
            session.next_part().await.map(|part| (Ok(part), session))
        })
    }
}

impl Drop for ViewerSession {
    fn drop(&mut self) {
        self.counters.active.fetch_sub(1, Ordering::Relaxed);
        tracing::debug!(
            viewer_id = self.id,
            parts_sent = self.parts_sent,
            last_seq = self.last_seq,
            duration_secs = self.opened_at.elapsed().as_secs(),
            "Viewer disconnected"
        );
    }
}

//! Single-slot frame buffer
//!
//! Holds the most recent frame only. Backed by `tokio::sync::watch`: a store
//! swaps in a new immutable value under a short write lock and a peek clones
//! the current value under a short read lock, so readers never observe a
//! half-written frame and a slow viewer never holds up the producer.

use bytes::Bytes;
use tokio::sync::watch;

use super::frame::Frame;

/// Latest-frame register shared between the producer and all viewers
#[derive(Debug)]
pub struct FrameBuffer {
    tx: watch::Sender<Option<Frame>>,
}

impl FrameBuffer {
    /// Create an empty buffer
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx }
    }

    /// Replace the current frame and advance the sequence counter
    ///
    /// Returns the sequence number assigned to the stored frame.
    pub fn store(&self, data: Bytes) -> u64 {
        let mut assigned = 0;
        self.tx.send_modify(|slot| {
            let seq = slot.as_ref().map_or(0, |f| f.seq) + 1;
            assigned = seq;
            *slot = Some(Frame::new(seq, data));
        });
        assigned
    }

    /// Current frame, or `None` before the first store
    pub fn peek(&self) -> Option<Frame> {
        self.tx.borrow().clone()
    }

    /// Sequence number of the current frame (0 when empty)
    pub fn sequence(&self) -> u64 {
        self.tx.borrow().as_ref().map_or(0, |f| f.seq)
    }

    /// Receiver notified on every store
    pub fn subscribe(&self) -> watch::Receiver<Option<Frame>> {
        self.tx.subscribe()
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

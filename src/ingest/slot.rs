//! Single-producer admission
//!
//! At most one producer may be connected. A second connection attempt is
//! refused while the first holds the slot; the slot is freed when the
//! holder's guard is dropped.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use thiserror::Error;

/// Error type for producer admission
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IngestError {
    /// Another producer is connected
    #[error("a producer is already connected (session {0})")]
    ProducerActive(u64),
}

/// Holds the session id of the admitted producer (0 = free)
#[derive(Debug, Default)]
pub struct ProducerSlot {
    current: AtomicU64,
}

impl ProducerSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the slot for `session_id` (must be non-zero)
    pub fn try_acquire(self: &Arc<Self>, session_id: u64) -> Result<ProducerGuard, IngestError> {
        debug_assert_ne!(session_id, 0);

        match self
            .current
            .compare_exchange(0, session_id, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => Ok(ProducerGuard {
                slot: Arc::clone(self),
                session_id,
            }),
            Err(holder) => Err(IngestError::ProducerActive(holder)),
        }
    }

    /// Session id of the connected producer
    pub fn current(&self) -> Option<u64> {
        match self.current.load(Ordering::Acquire) {
            0 => None,
            id => Some(id),
        }
    }

    pub fn is_occupied(&self) -> bool {
        self.current().is_some()
    }
}

/// Releases the producer slot on drop
#[derive(Debug)]
pub struct ProducerGuard {
    slot: Arc<ProducerSlot>,
    session_id: u64,
}

impl ProducerGuard {
    pub fn session_id(&self) -> u64 {
        self.session_id
    }
}

impl Drop for ProducerGuard {
    fn drop(&mut self) {
        let released = self
            .slot
            .current
            .compare_exchange(self.session_id, 0, Ordering::AcqRel, Ordering::Acquire);

        if let Err(holder) = released {
            tracing::warn!(
                expected = self.session_id,
                actual = holder,
                "Producer slot release mismatch"
            );
        }
    }
}

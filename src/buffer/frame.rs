//! Frame type held by the frame buffer

use bytes::Bytes;

/// One encoded JPEG image and the sequence number it was stored under
///
/// Cheap to clone: the payload is reference counted, so every viewer shares
/// the same allocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Sequence number assigned at store time (first frame is 1)
    pub seq: u64,
    /// Encoded image bytes
    pub data: Bytes,
}

impl Frame {
    /// Create a frame with an explicit sequence number
    pub fn new(seq: u64, data: Bytes) -> Self {
        Self { seq, data }
    }

    /// Payload size in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

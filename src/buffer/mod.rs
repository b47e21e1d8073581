//! Latest-frame buffer
//!
//! The only state shared between the ingest handler (sole writer) and the
//! viewer handlers (readers).
//!
//! ```text
//!   [Producer] ──store()──► Arc<FrameBuffer> ◄──peek()── [Viewer] × N
//!                                 │
//!                                 └──subscribe()──► [Snapshot writer]
//! ```
//!
//! Frames carry their payload as `bytes::Bytes`, so a peek clones a reference
//! count rather than the image.

pub mod frame;
pub mod store;

pub use frame::Frame;
pub use store::FrameBuffer;

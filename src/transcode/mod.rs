//! Supervision of the external HLS encoder
//!
//! The encoder is an opaque child process: JPEG frames go in on stdin, a
//! rolling manifest and segment files come out in `output_dir`. This module
//! decides when that process runs.
//!
//! ```text
//!   ingest ──feed()──► TranscodeSupervisor ──try_send──► writer task ──stdin──► ffmpeg
//!                         │  (state machine,                                     │
//!                         │   restart backoff)                                   ▼
//!                         └──clear stale output──────────────────────────► output_dir/
//! ```

pub mod config;
pub mod launcher;
pub mod process;
pub mod state;
pub mod supervisor;

pub use config::TranscodeConfig;
pub use launcher::{CommandLauncher, FfmpegLauncher, Launcher};
pub use process::{FeedOutcome, ProcessStatus, TranscoderProcess};
pub use state::TranscoderState;
pub use supervisor::TranscodeSupervisor;

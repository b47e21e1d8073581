//! # jpeg-relay
//!
//! A live relay for JPEG frames. One producer pushes frames over a
//! WebSocket; the relay keeps the newest one and fans it out to any number
//! of MJPEG viewers, while a supervised ffmpeg process turns the same frames
//! into a rolling HLS playlist.
//!
//! ```text
//!  producer ──ws──► ingest ──► FrameBuffer ──poll──► ViewerSession ──► /stream
//!                     │             │
//!                     │             └──watch──► snapshot writer ──► /frames
//!                     ▼
//!           TranscodeSupervisor ──stdin──► ffmpeg ──► /hls
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use jpeg_relay::{RelayConfig, RelayServer};
//!
//! #[tokio::main]
//! async fn main() -> jpeg_relay::Result<()> {
//!     let config = RelayConfig::from_env()?;
//!     RelayServer::new(config)
//!         .run_until(async {
//!             let _ = tokio::signal::ctrl_c().await;
//!         })
//!         .await
//! }
//! ```

pub mod broadcast;
pub mod buffer;
pub mod error;
pub mod ingest;
pub mod segments;
pub mod server;
pub mod snapshot;
pub mod stats;
pub mod transcode;

mod env;

pub use buffer::{Frame, FrameBuffer};
pub use error::{Error, Result, TranscodeError};
pub use server::{AppState, BoundServer, RelayConfig, RelayServer};
pub use transcode::{TranscodeConfig, TranscodeSupervisor, TranscoderState};

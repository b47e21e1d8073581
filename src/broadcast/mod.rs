//! MJPEG broadcast to viewers
//!
//! `GET /stream` answers with an endless `multipart/x-mixed-replace` body.
//! Every viewer gets its own [`ViewerSession`] polling the shared frame
//! buffer, so a slow client only ever delays itself.
//!
//! ```text
//!                       Arc<FrameBuffer>
//!                              │ peek() every poll_interval
//!          ┌───────────────────┼───────────────────┐
//!          ▼                   ▼                   ▼
//!   [ViewerSession]     [ViewerSession]     [ViewerSession]
//!     --frame part        --frame part        --frame part
//!          │                   │                   │
//!          ▼                   ▼                   ▼
//!        TCP                 TCP                 TCP
//! ```

pub mod config;
pub mod part;
pub mod session;

use axum::body::Body;
use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;

pub use config::BroadcastConfig;
pub use part::{content_type, encode_part, DEFAULT_BOUNDARY};
pub use session::ViewerSession;

use crate::server::AppState;

/// `GET /stream`
pub async fn stream_handler(State(state): State<AppState>) -> impl IntoResponse {
    let session = state.open_viewer();
    tracing::debug!(viewer_id = session.id(), "Viewer connected");

    let headers = [
        (header::CONTENT_TYPE, content_type(&state.config.broadcast.boundary)),
        (
            header::CACHE_CONTROL,
            "no-cache, no-store, must-revalidate".to_string(),
        ),
        (header::PRAGMA, "no-cache".to_string()),
    ];

    (headers, Body::from_stream(session.into_stream()))
}

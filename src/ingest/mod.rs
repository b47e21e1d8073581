//! Producer ingest over WebSocket
//!
//! `GET /ws` upgrades the single producer connection. Every binary message is
//! one complete JPEG: it is stored in the frame buffer and then handed to the
//! transcode supervisor. Nothing is sent back to the producer.
//!
//! ```text
//!   producer ──binary msg──► run_producer ──store()──► FrameBuffer
//!                                 │
//!                                 └──feed()──► TranscodeSupervisor
//! ```

pub mod slot;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use std::sync::atomic::Ordering;
use std::time::Duration;

pub use slot::{IngestError, ProducerGuard, ProducerSlot};

use crate::server::AppState;
use crate::stats::SessionStats;

/// What to do with one inbound message
#[derive(Debug, PartialEq, Eq)]
pub enum Inbound {
    /// A frame to store and transcode
    Frame(Bytes),
    /// Malformed for our purposes; counted and skipped
    Ignored(&'static str),
    /// Ping/pong, answered by the WebSocket layer
    Control,
    /// Producer closed the connection
    Close,
}

impl Inbound {
    pub fn classify(msg: Message) -> Self {
        match msg {
            Message::Binary(data) if data.is_empty() => Inbound::Ignored("empty binary message"),
            Message::Binary(data) => Inbound::Frame(data),
            Message::Text(_) => Inbound::Ignored("text message"),
            Message::Ping(_) | Message::Pong(_) => Inbound::Control,
            Message::Close(_) => Inbound::Close,
        }
    }
}

/// `GET /ws`
pub async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    let session_id = state.next_session_id();

    let guard = match state.producer.try_acquire(session_id) {
        Ok(guard) => guard,
        Err(e) => {
            state.ingest.rejected.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(session_id = session_id, error = %e, "Producer rejected");
            return (StatusCode::CONFLICT, e.to_string()).into_response();
        }
    };

    let max_frame_bytes = state.config.max_frame_bytes;
    ws.max_message_size(max_frame_bytes)
        .max_frame_size(max_frame_bytes)
        .on_failed_upgrade(move |e| {
            tracing::warn!(session_id = session_id, error = %e, "Producer upgrade failed");
        })
        .on_upgrade(move |socket| run_producer(socket, state, guard))
}

/// Producer loop; returns when the producer leaves or the server stops
pub async fn run_producer(mut socket: WebSocket, state: AppState, guard: ProducerGuard) {
    let session_id = guard.session_id();
    let mut stats = SessionStats::new();

    let idle_timeout = state.config.producer_idle_timeout;

    state.ingest.connections.fetch_add(1, Ordering::Relaxed);
    tracing::info!(session_id = session_id, "Producer connected");

    loop {
        let msg = tokio::select! {
            _ = state.cancel.cancelled() => {
                tracing::debug!(session_id = session_id, "Closing producer for shutdown");
                close_socket(&mut socket).await;
                break;
            }
            msg = tokio::time::timeout(idle_timeout, socket.recv()) => match msg {
                Ok(msg) => msg,
                Err(_) => {
                    tracing::warn!(
                        session_id = session_id,
                        idle_ms = idle_timeout.as_millis() as u64,
                        "Producer idle, disconnecting"
                    );
                    close_socket(&mut socket).await;
                    break;
                }
            },
        };

        let msg = match msg {
            Some(Ok(msg)) => msg,
            Some(Err(e)) => {
                tracing::debug!(session_id = session_id, error = %e, "Producer read error");
                break;
            }
            None => break,
        };

        match Inbound::classify(msg) {
            Inbound::Frame(data) => {
                stats.frames += 1;
                stats.bytes += data.len() as u64;
                let seq = ingest_frame(&state, data).await;
                tracing::trace!(session_id = session_id, seq = seq, "Frame received");
            }
            Inbound::Ignored(reason) => {
                stats.ignored += 1;
                state.ingest.ignored.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(session_id = session_id, reason = reason, "Message ignored");
            }
            Inbound::Control => {}
            Inbound::Close => break,
        }
    }

    tracing::info!(
        session_id = session_id,
        frames = stats.frames,
        bytes = stats.bytes,
        ignored = stats.ignored,
        duration_secs = stats.duration().as_secs(),
        fps = format!("{:.1}", stats.framerate()),
        bitrate = stats.bitrate(),
        "Producer disconnected"
    );
    drop(guard);
}

/// Best-effort close frame; a dead peer must not hold up the loop
async fn close_socket(socket: &mut WebSocket) {
    let _ = tokio::time::timeout(Duration::from_secs(1), socket.send(Message::Close(None))).await;
}

/// Store one frame, then feed it to the transcoder
///
/// Returns the frame's sequence number.
pub async fn ingest_frame(state: &AppState, data: Bytes) -> u64 {
    state.ingest.frames.fetch_add(1, Ordering::Relaxed);
    state
        .ingest
        .bytes
        .fetch_add(data.len() as u64, Ordering::Relaxed);

    let seq = state.buffer.store(data.clone());
    state.supervisor.feed(data).await;
    seq
}

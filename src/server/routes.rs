//! HTTP routes

use std::time::Duration;

use axum::extract::{Request, State};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::Span;

use crate::broadcast::stream_handler;
use crate::ingest::ws_handler;
use crate::segments;
use crate::server::state::AppState;

/// Body of the liveness endpoints
pub const HEALTH_BODY: &str = "jpeg-relay: ok";

/// Build the full router
pub fn create_router(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/stats", get(stats))
        .route("/ws", get(ws_handler))
        .route("/stream", get(stream_handler))
        .merge(segments::router(&state.config.transcode.output_dir));

    if let Some(dir) = &state.config.snapshot_dir {
        router = router.nest_service("/frames", ServeDir::new(dir));
    }

    // Request tracing, quiet for health probes and segment polling
    router
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &Request| {
                    if is_quiet(req.uri().path()) {
                        Span::none()
                    } else {
                        tracing::info_span!("http", method = %req.method(), path = %req.uri().path())
                    }
                })
                .on_request(|_req: &Request, span: &Span| {
                    if !span.is_disabled() {
                        tracing::debug!("Request started");
                    }
                })
                .on_response(|res: &Response, latency: Duration, span: &Span| {
                    if !span.is_disabled() {
                        tracing::debug!(
                            status = res.status().as_u16(),
                            latency_ms = latency.as_millis() as u64,
                            "Response sent"
                        );
                    }
                }),
        )
        .with_state(state)
}

async fn health() -> &'static str {
    HEALTH_BODY
}

async fn stats(State(state): State<AppState>) -> impl IntoResponse {
    state.supervisor.poll_health().await;
    Json(state.stats())
}

fn is_quiet(path: &str) -> bool {
    path == "/" || path == "/health" || path.starts_with(segments::HLS_PREFIX)
}

#[cfg(test)]
mod tests {
    use axum::body::{to_bytes, Body};
    use axum::http::{header, StatusCode};
    use bytes::Bytes;
    use tower::ServiceExt;

    use super::*;
    use crate::server::RelayConfig;
    use crate::transcode::TranscodeConfig;

    fn state(hls: &std::path::Path) -> AppState {
        AppState::new(
            RelayConfig::default()
                .transcode(TranscodeConfig::disabled().output_dir(hls))
                .disable_snapshots(),
        )
    }

    fn get(uri: &str) -> Request {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let dir = tempfile::tempdir().unwrap();

        for uri in ["/", "/health"] {
            let res = create_router(state(dir.path()))
                .oneshot(get(uri))
                .await
                .unwrap();

            assert_eq!(res.status(), StatusCode::OK);
            let body = to_bytes(res.into_body(), 1024).await.unwrap();
            assert_eq!(body, HEALTH_BODY.as_bytes());
        }
    }

    #[tokio::test]
    async fn test_stats_json() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path());
        state.buffer.store(Bytes::from_static(b"jpeg"));

        let res = create_router(state).oneshot(get("/stats")).await.unwrap();

        assert_eq!(res.status(), StatusCode::OK);
        let body = to_bytes(res.into_body(), 64 * 1024).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["sequence"], 1);
        assert_eq!(json["ingest"]["producer_connected"], false);
        assert_eq!(json["transcode"]["state"], "stopped");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_stats_reports_dead_encoder() {
        use std::sync::Arc;

        use crate::transcode::{CommandLauncher, TranscodeSupervisor, TranscoderState};

        let dir = tempfile::tempdir().unwrap();
        let transcode = TranscodeConfig::default().output_dir(dir.path());
        let supervisor = Arc::new(TranscodeSupervisor::with_launcher(
            transcode.clone(),
            Arc::new(CommandLauncher::shell("read line; exit 0")),
        ));
        let state = AppState::with_supervisor(
            RelayConfig::default()
                .transcode(transcode)
                .disable_snapshots(),
            Arc::clone(&supervisor),
        );

        supervisor.feed(Bytes::from_static(b"one\n")).await;
        for _ in 0..500 {
            if supervisor.live_processes().await == 0 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(supervisor.state(), TranscoderState::Running);

        let res = create_router(state).oneshot(get("/stats")).await.unwrap();
        let body = to_bytes(res.into_body(), 64 * 1024).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["transcode"]["state"], "failed");
        assert_eq!(json["transcode"]["failures"], 1);

        supervisor.shutdown().await;
    }

    #[tokio::test]
    async fn test_stream_headers() {
        let dir = tempfile::tempdir().unwrap();

        let res = create_router(state(dir.path()))
            .oneshot(get("/stream"))
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(
            res.headers()[header::CONTENT_TYPE],
            "multipart/x-mixed-replace; boundary=frame"
        );
        assert!(res.headers()[header::CACHE_CONTROL]
            .to_str()
            .unwrap()
            .contains("no-cache"));
    }

    #[tokio::test]
    async fn test_ws_requires_upgrade() {
        let dir = tempfile::tempdir().unwrap();

        let res = create_router(state(dir.path()))
            .oneshot(get("/ws"))
            .await
            .unwrap();

        assert!(res.status().is_client_error());
    }

    #[tokio::test]
    async fn test_hls_served() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.m3u8"), "#EXTM3U\n").unwrap();

        let res = create_router(state(dir.path()))
            .oneshot(get("/hls/index.m3u8"))
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(
            res.headers()[header::CONTENT_TYPE],
            "application/vnd.apple.mpegurl"
        );
    }

    #[tokio::test]
    async fn test_snapshot_dir_served() {
        let hls = tempfile::tempdir().unwrap();
        let frames = tempfile::tempdir().unwrap();
        std::fs::write(frames.path().join("frame_latest.jpg"), [0xFF, 0xD8]).unwrap();

        let state = AppState::new(
            RelayConfig::default()
                .transcode(TranscodeConfig::disabled().output_dir(hls.path()))
                .snapshot_dir(frames.path()),
        );
        let res = create_router(state)
            .oneshot(get("/frames/frame_latest.jpg"))
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::OK);
        let body = to_bytes(res.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], &[0xFF, 0xD8]);
    }
}

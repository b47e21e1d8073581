//! HLS segment publishing
//!
//! The encoder writes `index.m3u8` and its `.ts` segments into the output
//! directory; this module serves that directory under `/hls`. The manifest is
//! rewritten every segment, so it must never be cached, while a segment never
//! changes once listed.

use std::path::Path;

use axum::extract::Request;
use axum::http::header::{self, HeaderValue};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::Router;
use tower_http::services::ServeDir;

/// URL prefix for the encoder output
pub const HLS_PREFIX: &str = "/hls";

/// Kinds of file the encoder publishes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    Playlist,
    TransportStream,
    Fragment,
}

impl SegmentKind {
    /// Classify a request path by extension
    pub fn from_path(path: &str) -> Option<Self> {
        let ext = Path::new(path).extension()?.to_str()?;

        match ext.to_ascii_lowercase().as_str() {
            "m3u8" => Some(SegmentKind::Playlist),
            "ts" => Some(SegmentKind::TransportStream),
            "m4s" => Some(SegmentKind::Fragment),
            _ => None,
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            SegmentKind::Playlist => "application/vnd.apple.mpegurl",
            SegmentKind::TransportStream => "video/mp2t",
            SegmentKind::Fragment => "video/iso.segment",
        }
    }

    pub fn cache_control(&self) -> &'static str {
        match self {
            SegmentKind::Playlist => "no-cache, no-store, must-revalidate",
            SegmentKind::TransportStream | SegmentKind::Fragment => "public, max-age=60",
        }
    }
}

/// Router serving `dir` under [`HLS_PREFIX`]
///
/// Missing files (including the whole directory before the first launch)
/// answer 404.
pub fn router<S>(dir: impl AsRef<Path>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new()
        .nest_service(HLS_PREFIX, ServeDir::new(dir.as_ref()))
        .layer(middleware::from_fn(segment_headers))
}

async fn segment_headers(req: Request, next: Next) -> Response {
    let kind = SegmentKind::from_path(req.uri().path());
    let mut res = next.run(req).await;

    let headers = res.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );

    if let (true, Some(kind)) = (res.status().is_success(), kind) {
        let headers = res.headers_mut();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static(kind.content_type()),
        );
        headers.insert(
            header::CACHE_CONTROL,
            HeaderValue::from_static(kind.cache_control()),
        );
    }

    res
}

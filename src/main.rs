//! jpeg-relay binary
//!
//! Run with: jpeg-relay
//!
//! Configuration comes from the environment (and `.env`); see `--help`.
//!
//! ## Producing
//!
//! Connect a WebSocket to `ws://HOST:PORT/ws` and send one binary message
//! per JPEG frame.
//!
//! ## Viewing
//!
//! - MJPEG: `http://HOST:PORT/stream` (any browser `<img>` tag)
//! - HLS: `http://HOST:PORT/hls/index.m3u8`
//! - Latest frame: `http://HOST:PORT/frames/frame_latest.jpg`

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use jpeg_relay::{RelayConfig, RelayServer};

const DEFAULT_LOG_FILTER: &str = "jpeg_relay=info,tower_http=info";

fn print_usage() {
    println!("jpeg-relay - live JPEG relay with MJPEG and HLS output");
    println!();
    println!("Usage: jpeg-relay");
    println!();
    println!("Environment:");
    println!("  HOST, PORT                  bind address (0.0.0.0:5000)");
    println!("  POLL_INTERVAL_MS            viewer poll interval (50)");
    println!("  KEEPALIVE_INTERVAL_MS       resend unchanged frame after (1000, 0 = every poll)");
    println!("  MAX_FRAME_BYTES             largest accepted frame (8388608)");
    println!("  PRODUCER_IDLE_MS            drop a silent producer after (10000)");
    println!("  FRAME_DIR                   snapshot directory (frames, empty disables)");
    println!("  TRANSCODE_ENABLED           run the HLS encoder (true)");
    println!("  FFMPEG_PATH, HLS_DIR        encoder binary and output (ffmpeg, hls)");
    println!("  INPUT_FPS                   producer frame rate (20)");
    println!("  OUTPUT_WIDTH, OUTPUT_HEIGHT output resolution (640x360)");
    println!("  VIDEO_BITRATE, MAX_BITRATE, BUFFER_SIZE");
    println!("                              rate control (800k, 1000k, 1600k)");
    println!("  KEYFRAME_INTERVAL           GOP length in frames (40)");
    println!("  SEGMENT_SECONDS, SEGMENT_COUNT");
    println!("                              playlist window (2, 6)");
    println!("  RESTART_BACKOFF_MS          delay between launches (2000)");
    println!("  SHUTDOWN_GRACE_MS           encoder stop grace (3000)");
    println!("  WRITE_TIMEOUT_MS            encoder stdin write timeout (1000)");
    println!("  RUST_LOG                    log filter ({DEFAULT_LOG_FILTER})");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if std::env::args().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }

    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = RelayConfig::from_env().context("invalid configuration")?;
    let bind_addr = config.bind_addr;

    let server = RelayServer::new(config)
        .bind()
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;

    server.run_until(shutdown_signal()).await?;

    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

//! End-to-end tests against a running relay
//!
//! A tokio-tungstenite client plays the producer; viewers speak plain
//! HTTP/1.0 over a TCP socket so the multipart body arrives unchunked.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::SinkExt;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_util::sync::CancellationToken;

use jpeg_relay::broadcast::BroadcastConfig;
use jpeg_relay::transcode::CommandLauncher;
use jpeg_relay::{RelayConfig, RelayServer, TranscodeConfig, TranscodeSupervisor};

const WAIT: Duration = Duration::from_secs(5);

struct Relay {
    addr: SocketAddr,
    cancel: CancellationToken,
    handle: JoinHandle<jpeg_relay::Result<()>>,
}

impl Relay {
    async fn start(server: RelayServer) -> Self {
        let cancel = server.cancel_token();
        let bound = server.bind().await.unwrap();
        let addr = bound.local_addr();
        let handle = tokio::spawn(bound.run_until(std::future::pending()));

        Self {
            addr,
            cancel,
            handle,
        }
    }

    fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    async fn stop(self) {
        self.cancel.cancel();
        let result = timeout(WAIT, self.handle).await.unwrap().unwrap();
        assert!(result.is_ok());
    }
}

fn config() -> RelayConfig {
    RelayConfig::with_addr("127.0.0.1:0".parse().unwrap())
        .broadcast(BroadcastConfig::default().keepalive_interval(Duration::from_millis(100)))
        .transcode(TranscodeConfig::disabled())
        .disable_snapshots()
}

/// Minimal HTTP/1.0 GET returning status line, headers and the open reader
async fn http_get(addr: SocketAddr, path: &str) -> (String, Vec<String>, BufReader<TcpStream>) {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!("GET {path} HTTP/1.0\r\nHost: {addr}\r\n\r\n");
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut reader = BufReader::new(stream);
    let mut status = String::new();
    reader.read_line(&mut status).await.unwrap();

    let mut headers = Vec::new();
    loop {
        let mut line = String::new();
        reader.read_line(&mut line).await.unwrap();
        let line = line.trim_end().to_string();
        if line.is_empty() {
            break;
        }
        headers.push(line.to_ascii_lowercase());
    }

    (status.trim_end().to_string(), headers, reader)
}

struct Viewer {
    reader: BufReader<TcpStream>,
}

impl Viewer {
    async fn connect(addr: SocketAddr) -> Self {
        let (status, headers, reader) = http_get(addr, "/stream").await;

        assert!(status.contains("200"), "unexpected status: {status}");
        assert!(headers
            .iter()
            .any(|h| h == "content-type: multipart/x-mixed-replace; boundary=frame"));

        Self { reader }
    }

    /// Read one multipart part and return its JPEG payload
    async fn next_frame(&mut self) -> Vec<u8> {
        timeout(WAIT, self.read_part()).await.unwrap()
    }

    async fn read_part(&mut self) -> Vec<u8> {
        let mut line = String::new();
        self.reader.read_line(&mut line).await.unwrap();
        assert_eq!(line, "--frame\r\n");

        let mut content_length = None;
        loop {
            line.clear();
            self.reader.read_line(&mut line).await.unwrap();
            if line == "\r\n" {
                break;
            }
            if let Some(value) = line.strip_prefix("Content-Length: ") {
                content_length = Some(value.trim().parse::<usize>().unwrap());
            }
        }

        let mut body = vec![0u8; content_length.unwrap()];
        self.reader.read_exact(&mut body).await.unwrap();

        let mut crlf = [0u8; 2];
        self.reader.read_exact(&mut crlf).await.unwrap();
        assert_eq!(&crlf, b"\r\n");

        body
    }
}

fn jpeg(fill: u8, len: usize) -> Vec<u8> {
    let mut data = vec![fill; len];
    data[..2].copy_from_slice(&[0xFF, 0xD8]);
    let n = data.len();
    data[n - 2..].copy_from_slice(&[0xFF, 0xD9]);
    data
}

#[tokio::test]
async fn frames_reach_viewer_in_order() {
    let relay = Relay::start(RelayServer::new(config())).await;
    let mut viewer = Viewer::connect(relay.addr).await;
    let (mut producer, _) = tokio_tungstenite::connect_async(relay.ws_url()).await.unwrap();

    let f1 = jpeg(0x11, 500);
    let f2 = jpeg(0x22, 600);

    producer
        .send(Message::Binary(Bytes::from(f1.clone())))
        .await
        .unwrap();
    assert_eq!(viewer.next_frame().await, f1);

    producer
        .send(Message::Binary(Bytes::from(f2.clone())))
        .await
        .unwrap();

    // Keepalive may repeat F1 before F2 shows up, never after
    let mut part = viewer.next_frame().await;
    while part == f1 {
        part = viewer.next_frame().await;
    }
    assert_eq!(part.len(), 600);
    assert_eq!(part, f2);

    producer.close(None).await.unwrap();
    relay.stop().await;
}

#[tokio::test]
async fn frozen_frame_after_producer_leaves() {
    let relay = Relay::start(RelayServer::new(config())).await;
    let (mut producer, _) = tokio_tungstenite::connect_async(relay.ws_url()).await.unwrap();

    let f1 = jpeg(0x33, 500);
    producer
        .send(Message::Binary(Bytes::from(f1.clone())))
        .await
        .unwrap();
    producer.close(None).await.unwrap();
    drop(producer);

    // A viewer arriving afterwards still gets the last frame, repeatedly
    let mut viewer = Viewer::connect(relay.addr).await;
    for _ in 0..3 {
        assert_eq!(viewer.next_frame().await, f1);
    }

    relay.stop().await;
}

#[tokio::test]
async fn ignored_messages_keep_connection_open() {
    let relay = Relay::start(RelayServer::new(config())).await;
    let (mut producer, _) = tokio_tungstenite::connect_async(relay.ws_url()).await.unwrap();

    producer.send(Message::Text("hello".into())).await.unwrap();
    producer.send(Message::Binary(Bytes::new())).await.unwrap();

    let f1 = jpeg(0x44, 64);
    producer
        .send(Message::Binary(Bytes::from(f1.clone())))
        .await
        .unwrap();

    let mut viewer = Viewer::connect(relay.addr).await;
    assert_eq!(viewer.next_frame().await, f1);

    producer.close(None).await.unwrap();
    relay.stop().await;
}

#[tokio::test]
async fn second_producer_is_rejected() {
    let relay = Relay::start(RelayServer::new(config())).await;
    let (mut first, _) = tokio_tungstenite::connect_async(relay.ws_url()).await.unwrap();

    match tokio_tungstenite::connect_async(relay.ws_url()).await {
        Err(tungstenite::Error::Http(response)) => assert_eq!(response.status(), 409),
        Err(e) => panic!("expected 409, got {e}"),
        Ok(_) => panic!("second producer was admitted"),
    }

    first.close(None).await.unwrap();
    drop(first);

    // The slot frees once the first session winds down
    let mut admitted = false;
    for _ in 0..50 {
        if let Ok((mut next, _)) = tokio_tungstenite::connect_async(relay.ws_url()).await {
            next.close(None).await.unwrap();
            admitted = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(admitted);

    relay.stop().await;
}

#[tokio::test]
async fn silent_producer_is_evicted() {
    let config = config().producer_idle_timeout(Duration::from_millis(200));
    let server = RelayServer::new(config);
    let state = server.state().clone();
    let relay = Relay::start(server).await;

    // Connected but never sends, like a crashed host behind a NAT
    let (silent, _) = tokio_tungstenite::connect_async(relay.ws_url()).await.unwrap();
    assert!(state.producer.is_occupied());

    let mut admitted = None;
    for _ in 0..100 {
        if let Ok((next, _)) = tokio_tungstenite::connect_async(relay.ws_url()).await {
            admitted = Some(next);
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    let mut next = admitted.expect("slot never freed after idle timeout");

    let f1 = jpeg(0x77, 128);
    next.send(Message::Binary(Bytes::from(f1.clone())))
        .await
        .unwrap();
    let mut viewer = Viewer::connect(relay.addr).await;
    assert_eq!(viewer.next_frame().await, f1);

    drop(silent);
    // May already be evicted in turn
    let _ = next.close(None).await;
    relay.stop().await;
}

#[tokio::test]
async fn health_and_stats() {
    let relay = Relay::start(RelayServer::new(config())).await;

    let (status, _, mut reader) = http_get(relay.addr, "/health").await;
    assert!(status.contains("200"));
    let mut body = String::new();
    reader.read_to_string(&mut body).await.unwrap();
    assert_eq!(body, "jpeg-relay: ok");

    let (status, headers, mut reader) = http_get(relay.addr, "/stats").await;
    assert!(status.contains("200"));
    assert!(headers.iter().any(|h| h == "content-type: application/json"));
    let mut body = String::new();
    reader.read_to_string(&mut body).await.unwrap();
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["broadcast"]["active_viewers"], 0);

    relay.stop().await;
}

#[cfg(unix)]
#[tokio::test]
async fn frames_are_fed_to_transcoder() {
    let dir = tempfile::tempdir().unwrap();
    let capture = dir.path().join("input.mjpeg");

    let transcode = TranscodeConfig::default()
        .output_dir(dir.path())
        .shutdown_grace(Duration::from_secs(2));
    let launcher = CommandLauncher::shell(&format!("cat > '{}'", capture.display()));
    let supervisor = Arc::new(TranscodeSupervisor::with_launcher(
        transcode.clone(),
        Arc::new(launcher),
    ));

    let server = RelayServer::with_supervisor(config().transcode(transcode), supervisor);
    let state = server.state().clone();
    let relay = Relay::start(server).await;

    let (mut producer, _) = tokio_tungstenite::connect_async(relay.ws_url()).await.unwrap();
    let f1 = jpeg(0x55, 500);
    let f2 = jpeg(0x66, 600);
    for frame in [&f1, &f2] {
        producer
            .send(Message::Binary(Bytes::from(frame.clone())))
            .await
            .unwrap();
    }

    // Wait until both frames made it through ingest
    for _ in 0..100 {
        if state.buffer.sequence() == 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(state.buffer.sequence(), 2);

    producer.close(None).await.unwrap();
    relay.stop().await;

    // Shutdown closes the encoder input, so the capture is complete
    let captured = std::fs::read(&capture).unwrap();
    assert_eq!(captured, [f1, f2].concat());
    assert_eq!(state.supervisor.stats().launches, 1);
}

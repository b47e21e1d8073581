//! Handle to one running encoder instance
//!
//! Frames reach the encoder through a bounded queue drained by a dedicated
//! writer task, so the feeding side never waits on the pipe. The writer is
//! the only owner of the child's stdin.

use std::process::{ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;

use super::launcher::Launcher;
use crate::error::TranscodeError;

/// Result of handing a frame to the encoder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedOutcome {
    /// Queued for the writer task
    Queued,
    /// Queue full; frame discarded
    Dropped,
    /// Writer task is gone (pipe broken or stalled)
    Closed,
}

/// Liveness as observed without blocking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessStatus {
    Running,
    /// Writes to stdin failed or timed out
    Unhealthy,
    Exited(ExitStatus),
}

/// Live encoder process: identity, input pipe and health flag
pub struct TranscoderProcess {
    child: Child,
    pid: Option<u32>,
    frames_tx: Option<mpsc::Sender<Bytes>>,
    healthy: Arc<AtomicBool>,
    writer: JoinHandle<()>,
    started_at: Instant,
}

impl TranscoderProcess {
    /// Spawn the encoder and start its writer and log tasks
    ///
    /// `written` is incremented for every frame fully written to stdin.
    pub fn spawn(
        launcher: &dyn Launcher,
        queue_capacity: usize,
        write_timeout: Duration,
        written: Arc<AtomicU64>,
    ) -> Result<Self, TranscodeError> {
        let mut child = launcher
            .command()
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(TranscodeError::Spawn)?;

        let pid = child.id();
        let stdin = child.stdin.take().ok_or(TranscodeError::NoStdin)?;

        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_stderr(stderr, pid));
        }

        let healthy = Arc::new(AtomicBool::new(true));
        let (frames_tx, frames_rx) = mpsc::channel(queue_capacity.max(1));
        let writer = tokio::spawn(write_frames(
            stdin,
            frames_rx,
            Arc::clone(&healthy),
            write_timeout,
            written,
            pid,
        ));

        Ok(Self {
            child,
            pid,
            frames_tx: Some(frames_tx),
            healthy,
            writer,
            started_at: Instant::now(),
        })
    }

    /// OS process id
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Time since spawn
    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Queue a frame without waiting
    pub fn try_feed(&self, data: Bytes) -> FeedOutcome {
        let Some(tx) = self.frames_tx.as_ref() else {
            return FeedOutcome::Closed;
        };

        match tx.try_send(data) {
            Ok(()) => FeedOutcome::Queued,
            Err(TrySendError::Full(_)) => FeedOutcome::Dropped,
            Err(TrySendError::Closed(_)) => FeedOutcome::Closed,
        }
    }

    /// Poll the process state
    pub fn status(&mut self) -> ProcessStatus {
        match self.child.try_wait() {
            Ok(Some(status)) => ProcessStatus::Exited(status),
            Ok(None) if self.healthy.load(Ordering::Acquire) => ProcessStatus::Running,
            Ok(None) => ProcessStatus::Unhealthy,
            Err(e) => {
                tracing::warn!(pid = ?self.pid, error = %e, "Failed to poll transcoder");
                ProcessStatus::Unhealthy
            }
        }
    }

    /// Stop gracefully: close stdin, wait up to `grace`, then kill
    pub async fn terminate(mut self, grace: Duration) -> Option<ExitStatus> {
        let deadline = tokio::time::Instant::now() + grace;

        // Dropping the sender lets the writer flush what is queued and close stdin
        self.frames_tx.take();
        if tokio::time::timeout_at(deadline, &mut self.writer)
            .await
            .is_err()
        {
            self.writer.abort();
        }

        match tokio::time::timeout_at(deadline, self.child.wait()).await {
            Ok(Ok(status)) => {
                tracing::info!(pid = ?self.pid, status = %status, "Transcoder exited");
                Some(status)
            }
            Ok(Err(e)) => {
                tracing::warn!(pid = ?self.pid, error = %e, "Failed to wait for transcoder");
                None
            }
            Err(_) => {
                tracing::warn!(
                    pid = ?self.pid,
                    grace_ms = grace.as_millis() as u64,
                    "Transcoder did not exit within grace period, killing"
                );
                self.kill().await
            }
        }
    }

    /// Force-terminate and reap
    pub async fn kill(mut self) -> Option<ExitStatus> {
        self.frames_tx.take();
        self.writer.abort();

        if let Err(e) = self.child.kill().await {
            tracing::debug!(pid = ?self.pid, error = %e, "Kill failed (already exited?)");
        }
        self.child.wait().await.ok()
    }
}

async fn write_frames(
    mut stdin: ChildStdin,
    mut frames_rx: mpsc::Receiver<Bytes>,
    healthy: Arc<AtomicBool>,
    write_timeout: Duration,
    written: Arc<AtomicU64>,
    pid: Option<u32>,
) {
    while let Some(data) = frames_rx.recv().await {
        match tokio::time::timeout(write_timeout, stdin.write_all(&data)).await {
            Ok(Ok(())) => {
                written.fetch_add(1, Ordering::Relaxed);
            }
            Ok(Err(e)) => {
                tracing::warn!(pid = ?pid, error = %e, "Transcoder input write failed");
                frames_rx.close();
                healthy.store(false, Ordering::Release);
                return;
            }
            Err(_) => {
                tracing::warn!(
                    pid = ?pid,
                    timeout_ms = write_timeout.as_millis() as u64,
                    "Transcoder input stalled"
                );
                frames_rx.close();
                healthy.store(false, Ordering::Release);
                return;
            }
        }
    }

    // Queue closed: shutdown in progress
    let _ = stdin.shutdown().await;
}

async fn forward_stderr(stderr: ChildStderr, pid: Option<u32>) {
    let mut lines = BufReader::new(stderr).lines();

    loop {
        match lines.next_line().await {
            Ok(Some(line)) if line.trim().is_empty() => {}
            Ok(Some(line)) => {
                if line.contains("Error") || line.contains("error") {
                    tracing::warn!(pid = ?pid, "transcoder: {}", line);
                } else {
                    tracing::debug!(pid = ?pid, "transcoder: {}", line);
                }
            }
            Ok(None) => break,
            Err(e) => {
                tracing::debug!(pid = ?pid, error = %e, "Transcoder stderr read failed");
                break;
            }
        }
    }
}

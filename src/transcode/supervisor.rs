//! Transcode supervisor
//!
//! Owns the single encoder instance and drives the state machine in
//! [`super::state`]. All transitions happen under one async mutex, so
//! concurrent feeds are serialized and at most one process is ever live.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use tokio::sync::{watch, Mutex};

use super::config::{TranscodeConfig, OUTPUT_EXTENSIONS};
use super::launcher::{FfmpegLauncher, Launcher};
use super::process::{FeedOutcome, ProcessStatus, TranscoderProcess};
use super::state::TranscoderState;
use crate::error::TranscodeError;
use crate::stats::TranscodeStats;

#[derive(Debug, Default)]
struct Counters {
    launches: AtomicU64,
    launch_failures: AtomicU64,
    failures: AtomicU64,
    frames_written: Arc<AtomicU64>,
    frames_dropped: AtomicU64,
}

struct Inner {
    state: TranscoderState,
    process: Option<TranscoderProcess>,
    last_launch: Option<Instant>,
    /// Set by shutdown; feeds are ignored afterwards
    closed: bool,
}

/// Supervises the external encoder on behalf of the ingest path
pub struct TranscodeSupervisor {
    config: TranscodeConfig,
    launcher: Arc<dyn Launcher>,
    inner: Mutex<Inner>,
    state_tx: watch::Sender<TranscoderState>,
    counters: Counters,
}

impl TranscodeSupervisor {
    /// Create a supervisor that launches ffmpeg
    pub fn new(config: TranscodeConfig) -> Self {
        let launcher = Arc::new(FfmpegLauncher::new(&config));
        Self::with_launcher(config, launcher)
    }

    /// Create a supervisor with a custom launcher
    pub fn with_launcher(config: TranscodeConfig, launcher: Arc<dyn Launcher>) -> Self {
        let (state_tx, _) = watch::channel(TranscoderState::Stopped);

        Self {
            config,
            launcher,
            inner: Mutex::new(Inner {
                state: TranscoderState::Stopped,
                process: None,
                last_launch: None,
                closed: false,
            }),
            state_tx,
            counters: Counters::default(),
        }
    }

    pub fn config(&self) -> &TranscodeConfig {
        &self.config
    }

    /// Current state without taking the lock
    ///
    /// A process exit is only noticed by `feed()` or [`Self::poll_health`],
    /// so this may still read `Running` for an encoder that died while idle.
    pub fn state(&self) -> TranscoderState {
        *self.state_tx.borrow()
    }

    /// Process id of the live encoder, if any
    pub async fn pid(&self) -> Option<u32> {
        self.inner.lock().await.process.as_ref().and_then(|p| p.pid())
    }

    /// Number of live encoder processes (0 or 1)
    pub async fn live_processes(&self) -> usize {
        let mut inner = self.inner.lock().await;
        match inner.process.as_mut().map(|p| p.status()) {
            Some(ProcessStatus::Running) | Some(ProcessStatus::Unhealthy) => 1,
            Some(ProcessStatus::Exited(_)) | None => 0,
        }
    }

    /// Hand a frame to the encoder, (re)launching it if needed
    ///
    /// Never waits on the encoder's stdin. Launches at most once per call and
    /// not more often than `restart_backoff`. Frames that cannot be delivered
    /// are dropped and counted.
    pub async fn feed(&self, data: Bytes) {
        if !self.config.enabled {
            return;
        }

        let mut inner = self.inner.lock().await;
        if inner.closed {
            return;
        }

        if inner.state == TranscoderState::Running {
            self.check_health(&mut inner).await;
        }

        if inner.state.needs_launch() && !self.launch(&mut inner).await {
            self.counters.frames_dropped.fetch_add(1, Ordering::Relaxed);
            return;
        }

        let outcome = inner
            .process
            .as_ref()
            .map_or(FeedOutcome::Closed, |p| p.try_feed(data));

        match outcome {
            FeedOutcome::Queued => {}
            FeedOutcome::Dropped => {
                self.counters.frames_dropped.fetch_add(1, Ordering::Relaxed);
                tracing::debug!("Transcoder queue full, frame dropped");
            }
            FeedOutcome::Closed => {
                self.counters.frames_dropped.fetch_add(1, Ordering::Relaxed);
                self.fail(&mut inner, "input closed").await;
            }
        }
    }

    /// Check the live encoder without feeding it
    ///
    /// A dead or stalled process moves the state to `Failed`; the next feed
    /// relaunches it.
    pub async fn poll_health(&self) {
        let mut inner = self.inner.lock().await;
        if !inner.closed && inner.state == TranscoderState::Running {
            self.check_health(&mut inner).await;
        }
    }

    /// Stop the encoder and refuse further feeds
    ///
    /// Closes the input, waits up to `shutdown_grace`, then kills. Safe to
    /// call more than once.
    pub async fn shutdown(&self) {
        let mut inner = self.inner.lock().await;
        inner.closed = true;

        if let Some(process) = inner.process.take() {
            tracing::info!(pid = ?process.pid(), "Stopping transcoder");
            process.terminate(self.config.shutdown_grace).await;
        }

        if inner.state != TranscoderState::Stopped {
            self.transition(&mut inner, TranscoderState::Stopped);
        }
    }

    /// Snapshot of counters and state
    pub fn stats(&self) -> TranscodeStats {
        TranscodeStats {
            enabled: self.config.enabled,
            state: self.state(),
            launches: self.counters.launches.load(Ordering::Relaxed),
            launch_failures: self.counters.launch_failures.load(Ordering::Relaxed),
            failures: self.counters.failures.load(Ordering::Relaxed),
            frames_written: self.counters.frames_written.load(Ordering::Relaxed),
            frames_dropped: self.counters.frames_dropped.load(Ordering::Relaxed),
        }
    }

    async fn check_health(&self, inner: &mut Inner) {
        let Some(process) = inner.process.as_mut() else {
            self.fail(inner, "process handle missing").await;
            return;
        };

        match process.status() {
            ProcessStatus::Running => {}
            ProcessStatus::Unhealthy => self.fail(inner, "input broken or stalled").await,
            ProcessStatus::Exited(status) => {
                let reason = format!("exited unexpectedly ({status})");
                self.fail(inner, &reason).await;
            }
        }
    }

    /// Returns true when the encoder is running afterwards
    async fn launch(&self, inner: &mut Inner) -> bool {
        if let Some(last) = inner.last_launch {
            if last.elapsed() < self.config.restart_backoff {
                return false;
            }
        }
        inner.last_launch = Some(Instant::now());

        self.transition(inner, TranscoderState::Starting);

        if let Err(e) = clear_output_dir(&self.config.output_dir).await {
            tracing::error!(error = %e, "Cannot prepare transcoder output");
            self.counters.launch_failures.fetch_add(1, Ordering::Relaxed);
            self.transition(inner, TranscoderState::Failed);
            return false;
        }

        match TranscoderProcess::spawn(
            self.launcher.as_ref(),
            self.config.queue_capacity,
            self.config.write_timeout,
            Arc::clone(&self.counters.frames_written),
        ) {
            Ok(process) => {
                let launches = self.counters.launches.fetch_add(1, Ordering::Relaxed) + 1;
                tracing::info!(
                    launcher = self.launcher.name(),
                    pid = ?process.pid(),
                    launches = launches,
                    output = %self.config.output_dir.display(),
                    "Transcoder started"
                );
                inner.process = Some(process);
                self.transition(inner, TranscoderState::Running);
                true
            }
            Err(e) => {
                self.counters.launch_failures.fetch_add(1, Ordering::Relaxed);
                tracing::error!(
                    launcher = self.launcher.name(),
                    error = %e,
                    retry_in_ms = self.config.restart_backoff.as_millis() as u64,
                    "Failed to launch transcoder"
                );
                self.transition(inner, TranscoderState::Failed);
                false
            }
        }
    }

    async fn fail(&self, inner: &mut Inner, reason: &str) {
        if let Some(process) = inner.process.take() {
            let pid = process.pid();
            let uptime_secs = process.uptime().as_secs();
            process.kill().await;
            tracing::warn!(pid = ?pid, uptime_secs = uptime_secs, reason = reason, "Transcoder failed");
        } else {
            tracing::warn!(reason = reason, "Transcoder failed");
        }

        self.counters.failures.fetch_add(1, Ordering::Relaxed);
        self.transition(inner, TranscoderState::Failed);
    }

    fn transition(&self, inner: &mut Inner, next: TranscoderState) {
        let from = inner.state;
        debug_assert!(
            from.can_transition_to(next),
            "invalid transcoder transition {from} -> {next}"
        );

        inner.state = next;
        self.state_tx.send_replace(next);
        tracing::debug!(from = %from, to = %next, "Transcoder state");
    }
}

/// Remove manifests and segments left by a previous encoder instance
///
/// Only files with known encoder extensions are touched.
async fn clear_output_dir(dir: &Path) -> Result<usize, TranscodeError> {
    let wrap = |source| TranscodeError::ClearOutput {
        path: dir.display().to_string(),
        source,
    };

    tokio::fs::create_dir_all(dir).await.map_err(wrap)?;

    let mut removed = 0;
    let mut entries = tokio::fs::read_dir(dir).await.map_err(wrap)?;
    while let Some(entry) = entries.next_entry().await.map_err(wrap)? {
        let path = entry.path();
        let is_output = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| OUTPUT_EXTENSIONS.contains(&ext));
        if !is_output || !entry.file_type().await.map_err(wrap)?.is_file() {
            continue;
        }

        match tokio::fs::remove_file(&path).await {
            Ok(()) => removed += 1,
            // The encoder's own segment rotation may race us
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(wrap(e)),
        }
    }

    if removed > 0 {
        tracing::debug!(dir = %dir.display(), removed = removed, "Cleared stale transcoder output");
    }
    Ok(removed)
}

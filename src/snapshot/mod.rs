//! Latest-frame snapshot on disk
//!
//! Keeps `frame_latest.jpg` in the snapshot directory equal to the newest
//! frame. Runs as its own task off the ingest path: it follows the buffer's
//! watch channel, so when the disk is slower than the producer the
//! intermediate frames are skipped and only the newest one is written.
//! Every write goes to a temporary file first and is renamed into place, so
//! readers never see a partial JPEG.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::buffer::{Frame, FrameBuffer};

/// File name of the snapshot inside the snapshot directory
pub const SNAPSHOT_FILE: &str = "frame_latest.jpg";

const SNAPSHOT_TMP: &str = ".frame_latest.jpg.tmp";

/// Start the snapshot writer
pub fn spawn_snapshot_writer(
    buffer: Arc<FrameBuffer>,
    dir: PathBuf,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut rx = buffer.subscribe();
        let mut written = 0u64;

        tracing::debug!(dir = %dir.display(), "Snapshot writer started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                changed = rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }

            let frame = rx.borrow_and_update().clone();
            let Some(frame) = frame else { continue };

            match write_snapshot(&dir, &frame).await {
                Ok(()) => written += 1,
                Err(e) => {
                    tracing::debug!(seq = frame.seq, error = %e, "Failed to write snapshot");
                }
            }
        }

        tracing::debug!(written = written, "Snapshot writer stopped");
    })
}

/// Atomically replace the snapshot with `frame`
pub async fn write_snapshot(dir: &Path, frame: &Frame) -> std::io::Result<()> {
    tokio::fs::create_dir_all(dir).await?;

    let tmp = dir.join(SNAPSHOT_TMP);
    tokio::fs::write(&tmp, &frame.data).await?;
    tokio::fs::rename(&tmp, dir.join(SNAPSHOT_FILE)).await
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use bytes::Bytes;

    use super::*;

    #[tokio::test]
    async fn test_write_snapshot_replaces_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nested");

        write_snapshot(&target, &Frame::new(1, Bytes::from_static(b"first")))
            .await
            .unwrap();
        write_snapshot(&target, &Frame::new(2, Bytes::from_static(b"second")))
            .await
            .unwrap();

        let on_disk = std::fs::read(target.join(SNAPSHOT_FILE)).unwrap();
        assert_eq!(on_disk, b"second");
        assert!(!target.join(SNAPSHOT_TMP).exists());
    }

    #[tokio::test]
    async fn test_writer_follows_buffer() {
        let dir = tempfile::tempdir().unwrap();
        let buffer = Arc::new(FrameBuffer::new());
        let cancel = CancellationToken::new();

        let handle =
            spawn_snapshot_writer(Arc::clone(&buffer), dir.path().to_path_buf(), cancel.clone());

        buffer.store(Bytes::from_static(b"jpeg-1"));
        buffer.store(Bytes::from_static(b"jpeg-2"));

        let path = dir.path().join(SNAPSHOT_FILE);
        let mut latest = Vec::new();
        for _ in 0..100 {
            latest = std::fs::read(&path).unwrap_or_default();
            if latest == b"jpeg-2" {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(latest, b"jpeg-2");

        cancel.cancel();
        handle.await.unwrap();
    }
}

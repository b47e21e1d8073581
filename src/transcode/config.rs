//! Transcoder configuration

use std::path::PathBuf;
use std::time::Duration;

use crate::env::{env_flag, env_or, env_path};
use crate::error::Result;

/// File name of the HLS manifest inside the output directory
pub const PLAYLIST_NAME: &str = "index.m3u8";

/// Segment file name pattern handed to the encoder
pub const SEGMENT_PATTERN: &str = "segment_%05d.ts";

/// Extensions the supervisor treats as stale encoder output
pub const OUTPUT_EXTENSIONS: &[&str] = &["ts", "m3u8", "m4s", "tmp"];

/// Transcode supervisor options
#[derive(Debug, Clone)]
pub struct TranscodeConfig {
    /// Run the external encoder at all
    pub enabled: bool,

    /// Path to the ffmpeg binary
    pub ffmpeg_path: PathBuf,

    /// Directory receiving the manifest and segments
    pub output_dir: PathBuf,

    /// Nominal input frame rate announced to the encoder
    pub input_fps: u32,

    /// Output width in pixels
    pub width: u32,

    /// Output height in pixels
    pub height: u32,

    /// Target video bitrate (ffmpeg notation, e.g. "800k")
    pub video_bitrate: String,

    /// Maximum video bitrate
    pub max_bitrate: String,

    /// Rate control buffer size
    pub buffer_size: String,

    /// Frames between forced keyframes
    pub keyframe_interval: u32,

    /// Target segment duration in seconds
    pub segment_seconds: u32,

    /// Segments kept in the manifest window
    pub segment_count: u32,

    /// Minimum time between two launch attempts
    pub restart_backoff: Duration,

    /// How long a stopping encoder may take to exit before it is killed
    pub shutdown_grace: Duration,

    /// A single frame write slower than this marks the encoder as stalled
    pub write_timeout: Duration,

    /// Frames queued ahead of the encoder before new ones are dropped
    pub queue_capacity: usize,
}

impl Default for TranscodeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ffmpeg_path: PathBuf::from("ffmpeg"),
            output_dir: PathBuf::from("hls"),
            input_fps: 20,
            width: 640,
            height: 360,
            video_bitrate: "800k".to_string(),
            max_bitrate: "1000k".to_string(),
            buffer_size: "1600k".to_string(),
            keyframe_interval: 40,
            segment_seconds: 2,
            segment_count: 6,
            restart_backoff: Duration::from_secs(2),
            shutdown_grace: Duration::from_secs(3),
            write_timeout: Duration::from_secs(1),
            queue_capacity: 8,
        }
    }
}

impl TranscodeConfig {
    /// Load from environment variables, falling back to defaults
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        Ok(Self {
            enabled: env_flag("TRANSCODE_ENABLED", defaults.enabled)?,
            ffmpeg_path: env_path("FFMPEG_PATH").unwrap_or(defaults.ffmpeg_path),
            output_dir: env_path("HLS_DIR").unwrap_or(defaults.output_dir),
            input_fps: env_or("INPUT_FPS", defaults.input_fps)?,
            width: env_or("OUTPUT_WIDTH", defaults.width)?,
            height: env_or("OUTPUT_HEIGHT", defaults.height)?,
            video_bitrate: env_or("VIDEO_BITRATE", defaults.video_bitrate)?,
            max_bitrate: env_or("MAX_BITRATE", defaults.max_bitrate)?,
            buffer_size: env_or("BUFFER_SIZE", defaults.buffer_size)?,
            keyframe_interval: env_or("KEYFRAME_INTERVAL", defaults.keyframe_interval)?,
            segment_seconds: env_or("SEGMENT_SECONDS", defaults.segment_seconds)?,
            segment_count: env_or("SEGMENT_COUNT", defaults.segment_count)?,
            restart_backoff: Duration::from_millis(env_or("RESTART_BACKOFF_MS", 2_000)?),
            shutdown_grace: Duration::from_millis(env_or("SHUTDOWN_GRACE_MS", 3_000)?),
            write_timeout: Duration::from_millis(env_or("WRITE_TIMEOUT_MS", 1_000)?),
            queue_capacity: defaults.queue_capacity,
        })
    }

    /// Disable the encoder
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }

    /// Set the output directory
    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Set the minimum delay between launch attempts
    pub fn restart_backoff(mut self, backoff: Duration) -> Self {
        self.restart_backoff = backoff;
        self
    }

    /// Set the shutdown grace period
    pub fn shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// Set the per-frame write timeout
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Set the output resolution
    pub fn resolution(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Full path of the manifest
    pub fn playlist_path(&self) -> PathBuf {
        self.output_dir.join(PLAYLIST_NAME)
    }

    /// Build the encoder argument list
    ///
    /// Input is a concatenated JPEG stream on stdin; output is an HLS window
    /// of `segment_count` segments. `temp_file` makes the encoder write each
    /// segment under a temporary name and rename it when complete, so the
    /// segment publisher never serves a partial file.
    pub fn ffmpeg_args(&self) -> Vec<String> {
        let mut args: Vec<String> = Vec::new();

        args.extend(["-hide_banner", "-loglevel", "warning", "-y"].map(String::from));

        // Input: MJPEG over stdin
        args.extend(["-f", "image2pipe", "-c:v", "mjpeg"].map(String::from));
        args.extend(["-framerate".to_string(), self.input_fps.to_string()]);
        args.extend(["-i", "pipe:0", "-an"].map(String::from));

        // Video encoding
        args.extend([
            "-vf".to_string(),
            format!("scale={}:{}", self.width, self.height),
        ]);
        args.extend(
            [
                "-c:v",
                "libx264",
                "-preset",
                "veryfast",
                "-tune",
                "zerolatency",
                "-pix_fmt",
                "yuv420p",
            ]
            .map(String::from),
        );
        args.extend([
            "-b:v".to_string(),
            self.video_bitrate.clone(),
            "-maxrate".to_string(),
            self.max_bitrate.clone(),
            "-bufsize".to_string(),
            self.buffer_size.clone(),
            "-g".to_string(),
            self.keyframe_interval.to_string(),
            "-keyint_min".to_string(),
            self.keyframe_interval.to_string(),
            "-sc_threshold".to_string(),
            "0".to_string(),
        ]);

        // HLS muxer
        args.extend([
            "-f".to_string(),
            "hls".to_string(),
            "-hls_time".to_string(),
            self.segment_seconds.to_string(),
            "-hls_list_size".to_string(),
            self.segment_count.to_string(),
            "-hls_flags".to_string(),
            "delete_segments+temp_file+independent_segments".to_string(),
            "-hls_segment_filename".to_string(),
            self.output_dir
                .join(SEGMENT_PATTERN)
                .to_string_lossy()
                .to_string(),
        ]);

        args.push(self.playlist_path().to_string_lossy().to_string());
        args
    }
}

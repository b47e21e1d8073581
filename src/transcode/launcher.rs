//! Process launch seam
//!
//! The supervisor only needs "a command whose stdin accepts a JPEG stream".
//! Production uses ffmpeg; tests substitute a shell command.

use std::ffi::OsString;

use tokio::process::Command;

use super::config::TranscodeConfig;

/// Builds the command for a fresh encoder instance
pub trait Launcher: Send + Sync + 'static {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Command to spawn; stdio is configured by the caller
    fn command(&self) -> Command;
}

/// Launches ffmpeg with the HLS argument set from [`TranscodeConfig`]
#[derive(Debug, Clone)]
pub struct FfmpegLauncher {
    program: OsString,
    args: Vec<String>,
}

impl FfmpegLauncher {
    pub fn new(config: &TranscodeConfig) -> Self {
        Self {
            program: config.ffmpeg_path.clone().into_os_string(),
            args: config.ffmpeg_args(),
        }
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }
}

impl Launcher for FfmpegLauncher {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).env("LC_ALL", "C");
        cmd
    }
}

/// Runs an arbitrary program with fixed arguments
#[derive(Debug, Clone)]
pub struct CommandLauncher {
    program: OsString,
    args: Vec<OsString>,
}

impl CommandLauncher {
    pub fn new<I, S>(program: impl Into<OsString>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// `sh -c <script>`
    pub fn shell(script: &str) -> Self {
        Self::new("sh", ["-c", script])
    }
}

impl Launcher for CommandLauncher {
    fn name(&self) -> &str {
        self.program.to_str().unwrap_or("command")
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd
    }
}

//! Error types
//!
//! Per-connection failures never surface here: they are handled and logged
//! where they happen. This type covers startup, configuration and transcoder
//! launch failures.

use thiserror::Error;

/// Crate-wide result type
pub type Result<T> = std::result::Result<T, Error>;

/// Crate-wide error type
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Transcoder error: {0}")]
    Transcoder(#[from] TranscodeError),

    #[error("Server error: {0}")]
    Server(String),
}

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

/// Failures inside the transcode supervisor
///
/// These are contained by the supervisor state machine; callers of `feed`
/// never see them.
#[derive(Error, Debug)]
pub enum TranscodeError {
    #[error("failed to spawn transcoder: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("transcoder stdin was not captured")]
    NoStdin,

    #[error("failed to clear output directory {path}: {source}")]
    ClearOutput {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

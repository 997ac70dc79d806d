use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while running the external encoder.
#[derive(Debug, Error)]
pub enum ToolError {
    /// FFmpeg binary not found.
    #[error("FFmpeg not found at path: {path}")]
    FfmpegNotFound { path: PathBuf },

    /// Encoder invocation exceeded the configured timeout.
    #[error("Encoder invocation timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    /// I/O error while spawning or streaming the encoder process.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::cancel::CancelToken;
use crate::media::{MediaProperties, ProbeError};

use super::error::ToolError;

/// One encoder invocation, fully described.
///
/// `args` is the complete argument list between the binary name and the
/// output path; the implementation prepends its own log-level arguments and
/// appends `output`.
#[derive(Debug, Clone)]
pub struct EncodeInvocation {
    pub args: Vec<String>,
    pub output: PathBuf,
    /// Total duration of the material being encoded, for bounded progress.
    /// `None` degrades progress to indeterminate.
    pub expected_duration: Option<f64>,
    /// Short human-readable label for logs and the progress bar.
    pub label: String,
    pub cancel: CancelToken,
}

/// How an encoder invocation ended. Non-zero exit is an outcome, not an
/// error; callers decide success/failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodeOutcome {
    Completed,
    Failed {
        code: Option<i32>,
        /// Tail of the encoder's diagnostic output, preserved for logging
        /// but never required for control flow.
        log_tail: String,
    },
    Cancelled,
}

/// The external media toolchain: one prober, one encoder.
#[async_trait]
pub trait MediaTools: Send + Sync {
    /// Probes a media file for its stream properties. Fails only when the
    /// prober cannot start or exits non-zero; partial reports are returned
    /// with the missing fields unset.
    async fn probe(&self, path: &Path) -> Result<MediaProperties, ProbeError>;

    /// Runs the prober diagnostically and returns its raw error-stream text.
    /// The text format is unstable and must be matched defensively.
    async fn diagnose(&self, path: &Path) -> Result<String, ProbeError>;

    /// Runs one encoder invocation to completion, streaming its diagnostic
    /// output while it runs.
    async fn encode(&self, invocation: EncodeInvocation) -> Result<EncodeOutcome, ToolError>;
}

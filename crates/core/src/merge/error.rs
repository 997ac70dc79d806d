use std::path::PathBuf;
use thiserror::Error;

use crate::media::ProbeError;
use crate::tools::ToolError;

/// Job-fatal errors. Per-input failures are [`DropReason`]s instead and
/// never abort a job that still has viable inputs.
#[derive(Debug, Error)]
pub enum MergeError {
    /// Invalid mode/clip-count combination, detected before any process
    /// spawns.
    #[error("Invalid configuration: {reason}")]
    Configuration { reason: String },

    /// The final composition encode exited non-zero.
    #[error("Composition failed: {reason}")]
    Composition {
        reason: String,
        stderr: Option<String>,
    },

    /// Every input was dropped during normalization.
    #[error("No usable inputs: all {total} inputs were dropped")]
    NoUsableInputs { total: usize },

    /// The output path exists and the job did not request overwrite.
    #[error("Output already exists: {path}")]
    OutputExists { path: PathBuf },

    /// Scratch directory could not be created or written.
    #[error("Scratch directory error: {0}")]
    Scratch(#[source] std::io::Error),

    /// The external encoder could not be run at all.
    #[error(transparent)]
    Tool(#[from] ToolError),
}

impl MergeError {
    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    pub fn composition(reason: impl Into<String>, stderr: Option<String>) -> Self {
        Self::Composition {
            reason: reason.into(),
            stderr,
        }
    }
}

/// Why one input was excluded from a job. Recovered locally: logged,
/// reported in [`super::JobResult::PartialSuccess`], never retried.
#[derive(Debug, Error)]
pub enum DropReason {
    /// FormatGuard declined the file (unsupported container extension).
    #[error("unsupported container format")]
    UnsupportedFormat,

    /// The prober could not be run or exited non-zero.
    #[error("probe failed: {0}")]
    Probe(#[from] ProbeError),

    /// The probe report lacked width, height or frame rate.
    #[error("missing essential stream properties")]
    MissingStreamInfo,

    /// The normalization encode exited non-zero.
    #[error("normalization failed (exit code {code:?})")]
    EncodeFailed { code: Option<i32> },

    /// The encoder could not be started for this input.
    #[error("encoder unavailable: {0}")]
    Tool(#[from] ToolError),

    /// The job was cancelled while this input was being normalized.
    #[error("cancelled")]
    Cancelled,
}

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::media::MediaProperties;

use super::error::{DropReason, MergeError};

/// Target canvas for normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Canvas {
    /// Per-file passthrough of each clip's own dimensions; no scale/pad.
    Original,
    /// Scale-to-fit with letterbox padding onto a fixed canvas.
    Fixed { width: u32, height: u32 },
}

/// Quality mode: constant rate factor or target bitrate, mutually exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Quality {
    Crf(u8),
    BitrateKbps(u32),
}

/// The common encoding profile every clip is normalized to. Supplied once
/// by the caller; read-only inside the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodeProfile {
    pub canvas: Canvas,
    /// Target frame rate; `None` means use each source's own rate. A source
    /// rate at or above the target is kept (frame rate is never artificially
    /// dropped).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fps: Option<f64>,
    /// FFmpeg video codec identifier, e.g. `libx264`.
    pub video_codec: String,
    pub quality: Quality,
    /// Encoder preset label, e.g. `medium`.
    pub preset: String,
    pub denoise: bool,
    /// Motion-interpolated frame rate conversion. Accepted independently of
    /// `fps`; the combination is intentionally not cross-validated.
    pub interpolate: bool,
}

impl Default for EncodeProfile {
    fn default() -> Self {
        Self {
            canvas: Canvas::Fixed {
                width: 1920,
                height: 1080,
            },
            fps: None,
            video_codec: "libx264".to_string(),
            quality: Quality::Crf(23),
            preset: "medium".to_string(),
            denoise: false,
            interpolate: false,
        }
    }
}

/// Spatial/temporal composition strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeMode {
    /// Sequential concatenation via the concat demuxer, no re-encode.
    Concat,
    /// All clips stacked top to bottom.
    VStack,
    /// Grid layout solved against the target canvas aspect ratio.
    Grid,
    /// Exactly two clips, side by side at a common height.
    SideBySide,
    /// Largest clip as spine, the rest randomly paired side-by-side, all
    /// segments concatenated.
    Auto,
    /// Exactly one clip, copied byte-for-byte to the output.
    Single,
}

/// The unit of work: consumed once by [`super::MergeEngine::execute`],
/// never persisted.
#[derive(Debug, Clone)]
pub struct MergeJob {
    pub job_id: String,
    /// Ordered input file paths, as delivered by the discovery collaborator.
    pub inputs: Vec<PathBuf>,
    pub profile: EncodeProfile,
    pub mode: MergeMode,
    pub output: PathBuf,
    /// Without this, an existing output file fails the job instead of being
    /// silently overwritten.
    pub overwrite: bool,
    /// Seed for auto-mode pairing order. `None` draws from entropy,
    /// preserving the source behavior; tests inject a seed to reproduce a
    /// grouping.
    pub shuffle_seed: Option<u64>,
}

impl MergeJob {
    pub fn new(
        inputs: Vec<PathBuf>,
        profile: EncodeProfile,
        mode: MergeMode,
        output: PathBuf,
    ) -> Self {
        Self {
            job_id: uuid::Uuid::new_v4().to_string(),
            inputs,
            profile,
            mode,
            output,
            overwrite: false,
            shuffle_seed: None,
        }
    }

    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn with_shuffle_seed(mut self, seed: u64) -> Self {
        self.shuffle_seed = Some(seed);
        self
    }
}

/// A normalized intermediate file, owned by the job's scratch directory.
#[derive(Debug, Clone)]
pub struct NormalizedClip {
    pub path: PathBuf,
    /// The source properties this clip was produced from.
    pub properties: MediaProperties,
}

/// An input excluded from the job, with the reason it was dropped.
#[derive(Debug)]
pub struct DroppedInput {
    pub path: PathBuf,
    pub reason: DropReason,
}

/// Terminal result of one merge job, reported to the caller instead of
/// raised through arbitrary call stacks.
#[derive(Debug)]
pub enum JobResult {
    Success {
        output: PathBuf,
    },
    /// Some inputs failed normalization but the job still produced output.
    PartialSuccess {
        output: PathBuf,
        dropped: Vec<DroppedInput>,
    },
    Failure {
        error: MergeError,
    },
    Cancelled,
}

impl JobResult {
    /// The produced output path, when the job produced one.
    pub fn output_path(&self) -> Option<&Path> {
        match self {
            Self::Success { output } | Self::PartialSuccess { output, .. } => Some(output),
            Self::Failure { .. } | Self::Cancelled => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. } | Self::PartialSuccess { .. })
    }
}

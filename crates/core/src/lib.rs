//! Video merge orchestration engine.
//!
//! Takes a heterogeneous set of input clips (differing resolution, frame
//! rate, codec and audio presence), normalizes each one to a common encoding
//! profile, composes them with one of several spatial/temporal strategies
//! (concat, vertical stack, grid, side-by-side, auto pairing) and tracks
//! encode progress, guaranteeing cleanup of intermediate files on success,
//! failure and cancellation.
//!
//! Encoding itself is delegated to external `ffmpeg`/`ffprobe` processes
//! behind the [`tools::MediaTools`] trait; the engine only orchestrates them.

pub mod cancel;
pub mod config;
pub mod layout;
pub mod media;
pub mod merge;
pub mod progress;
pub mod testing;
pub mod tools;

pub use cancel::{CancelHandle, CancelToken};
pub use config::{load_config, load_config_from_str, validate_config, ConfigError, EngineConfig};
pub use layout::{solve, GridLayout};
pub use media::{MediaProperties, ProbeError};
pub use merge::{
    Canvas, DropReason, DroppedInput, EncodeProfile, JobResult, MergeEngine, MergeError, MergeJob,
    MergeMode, NormalizedClip, Quality, ScratchDir,
};
pub use tools::{EncodeInvocation, EncodeOutcome, FfmpegTools, MediaTools, ToolError};

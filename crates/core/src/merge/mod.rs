//! Merge orchestration: normalization, composition strategies and the
//! job-scoped resource lifecycle.
//!
//! The entry point is [`MergeEngine::execute`], which drives one
//! [`MergeJob`] end to end: acquire scratch directory, normalize every
//! input (best-effort, per-input failures are dropped and logged), select
//! and run the composition strategy, tear the scratch directory down
//! exactly once regardless of outcome.

mod auto;
mod dispatch;
mod engine;
mod error;
mod normalize;
mod scratch;
mod types;

pub use auto::AutoPlan;
pub use dispatch::MergeDispatcher;
pub use engine::MergeEngine;
pub use error::{DropReason, MergeError};
pub use normalize::Normalizer;
pub use scratch::ScratchDir;
pub use types::{
    Canvas, DroppedInput, EncodeProfile, JobResult, MergeJob, MergeMode, NormalizedClip, Quality,
};

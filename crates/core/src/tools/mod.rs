//! External encoder/prober boundary.
//!
//! The engine never talks to ffmpeg/ffprobe directly; everything goes
//! through the [`MediaTools`] trait so orchestration logic is testable
//! without the binaries installed. [`FfmpegTools`] is the real
//! implementation.

mod error;
mod ffmpeg;
mod traits;

pub use error::ToolError;
pub use ffmpeg::FfmpegTools;
pub use traits::{EncodeInvocation, EncodeOutcome, MediaTools};

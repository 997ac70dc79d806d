//! Media inspection and input validation.
//!
//! [`MediaProperties`] is the per-file report extracted from ffprobe's
//! line-oriented `key=value` output; fields absent from that output stay
//! `None` rather than being defaulted, so callers must cope with partial
//! data. [`FormatGuard`] filters inputs by container extension and repairs
//! the known missing-moov-atom defect before a file enters a job.

mod error;
mod guard;
mod types;

pub use error::ProbeError;
pub use guard::{extension_supported, FormatGuard, MOOV_SIGNATURE, SUPPORTED_EXTENSIONS};
pub use types::{parse_probe_output, MediaProperties};

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::cancel::CancelToken;
use crate::tools::{EncodeInvocation, EncodeOutcome, MediaTools};

use super::error::ProbeError;

/// Container extensions the engine accepts.
pub const SUPPORTED_EXTENSIONS: &[&str] = &[
    "mp4", "avi", "mkv", "mov", "flv", "wmv", "webm", "m4v", "gif",
];

/// Diagnostic signature of a truncated mp4-family file missing its index.
pub const MOOV_SIGNATURE: &str = "moov atom not found";

/// Whether the file's extension is in the supported set. Case-insensitive;
/// no external tool is consulted.
pub fn extension_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            SUPPORTED_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// Validates inputs before they enter a merge job and repairs the known
/// missing-moov-atom defect via a stream-copy remux.
pub struct FormatGuard<T: MediaTools> {
    tools: Arc<T>,
    cancel: CancelToken,
}

impl<T: MediaTools> FormatGuard<T> {
    pub fn new(tools: Arc<T>, cancel: CancelToken) -> Self {
        Self { tools, cancel }
    }

    /// Returns `Ok(false)` for files this guard declines to process
    /// (unsupported extension); the caller owns skip-with-log semantics.
    /// Errors only when the prober itself cannot run.
    ///
    /// May mutate the input file in place: a repair is staged in `scratch`
    /// and swapped in with copy + atomic rename, never a partial write.
    pub async fn ensure_valid(&self, path: &Path, scratch: &Path) -> Result<bool, ProbeError> {
        if !extension_supported(path) {
            debug!(path = %path.display(), "unsupported container extension");
            return Ok(false);
        }

        let diagnostics = self.tools.diagnose(path).await?;
        if diagnostics.contains(MOOV_SIGNATURE) {
            info!(path = %path.display(), "missing moov atom, attempting stream-copy repair");
            self.repair(path, scratch).await;
        }

        Ok(true)
    }

    async fn repair(&self, path: &Path, scratch: &Path) {
        let file_name = match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => name.to_string(),
            None => return,
        };
        let repaired = scratch.join(format!("repaired_{file_name}"));

        let invocation = EncodeInvocation {
            args: vec![
                "-y".to_string(),
                "-i".to_string(),
                path.to_string_lossy().to_string(),
                "-c".to_string(),
                "copy".to_string(),
            ],
            output: repaired.clone(),
            expected_duration: None,
            label: format!("repair {file_name}"),
            cancel: self.cancel.clone(),
        };

        match self.tools.encode(invocation).await {
            Ok(EncodeOutcome::Completed) => {
                if let Err(e) = replace_file(&repaired, path).await {
                    warn!(path = %path.display(), error = %e, "failed to swap in repaired file");
                }
            }
            Ok(outcome) => {
                warn!(path = %path.display(), ?outcome, "stream-copy repair did not complete");
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "stream-copy repair failed to run");
            }
        }
    }
}

/// Replaces `target` with `staged` without partial writes: the staged copy
/// lands in the target's own directory first, then an atomic rename swaps
/// it in.
async fn replace_file(staged: &Path, target: &Path) -> std::io::Result<()> {
    let sibling: PathBuf = match (target.parent(), target.file_name()) {
        (Some(parent), Some(name)) => {
            let mut tmp = std::ffi::OsString::from(".");
            tmp.push(name);
            tmp.push(".repaired");
            parent.join(tmp)
        }
        _ => {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "target has no parent directory",
            ))
        }
    };
    tokio::fs::copy(staged, &sibling).await?;
    tokio::fs::rename(&sibling, target).await
}

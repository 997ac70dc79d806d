use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};

/// Job-scoped scratch directory for intermediate encoder outputs.
///
/// Created before any normalization starts and owned exclusively by one
/// job. Removal happens exactly once no matter how many paths reach it:
/// the explicit `remove` on the job's single cleanup path, with `Drop` as
/// a last-resort fallback for early returns.
#[derive(Debug)]
pub struct ScratchDir {
    path: PathBuf,
    removed: AtomicBool,
}

impl ScratchDir {
    /// Creates `<root>/job-<job_id>`, including missing parents.
    pub async fn create(root: &Path, job_id: &str) -> std::io::Result<Self> {
        let path = root.join(format!("job-{job_id}"));
        tokio::fs::create_dir_all(&path).await?;
        debug!(path = %path.display(), "scratch directory created");
        Ok(Self {
            path,
            removed: AtomicBool::new(false),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path for an intermediate file inside the scratch directory.
    pub fn file(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }

    /// Removes the directory and everything in it. Calling this again (or
    /// dropping afterwards) is a no-op.
    pub async fn remove(&self) -> std::io::Result<()> {
        if self.removed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        match tokio::fs::remove_dir_all(&self.path).await {
            Ok(()) => {
                debug!(path = %self.path.display(), "scratch directory removed");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if !self.removed.swap(true, Ordering::SeqCst) {
            if let Err(e) = std::fs::remove_dir_all(&self.path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %self.path.display(), error = %e, "scratch cleanup on drop failed");
                }
            }
        }
    }
}

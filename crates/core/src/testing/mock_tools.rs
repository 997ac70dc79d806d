//! Mock toolchain for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::media::{MediaProperties, ProbeError};
use crate::tools::{EncodeInvocation, EncodeOutcome, MediaTools, ToolError};

/// Mock implementation of the [`MediaTools`] trait.
///
/// Provides controllable behavior for testing:
/// - Pre-configured probe results per path, with a sensible default
/// - Diagnostic text injection (e.g. a missing-moov report)
/// - Per-invocation encode failure by argument substring
/// - Records every encode invocation for assertions
/// - Counts every spawned process (probe, diagnose and encode alike)
/// - Snapshots concat manifests at encode time, before scratch teardown
///
/// # Example
///
/// ```rust,ignore
/// use vidweld_core::testing::MockTools;
///
/// let tools = MockTools::new();
/// tools.set_probe_result("/clips/a.mp4", MockTools::video_properties("/clips/a.mp4", 640, 480, 12.0)).await;
/// tools.fail_encode_matching("b.mp4").await;
///
/// let result = engine.execute(job).await;
///
/// let encodes = tools.recorded_encodes().await;
/// assert_eq!(tools.spawn_count(), 7);
/// ```
#[derive(Debug)]
pub struct MockTools {
    /// Pre-configured probe results by path.
    probe_results: Arc<RwLock<HashMap<PathBuf, MediaProperties>>>,
    /// Paths whose probe fails outright.
    probe_failures: Arc<RwLock<Vec<PathBuf>>>,
    /// Diagnostic text by path; unknown paths diagnose clean.
    diagnostics: Arc<RwLock<HashMap<PathBuf, String>>>,
    /// Substrings that make a matching encode invocation fail.
    encode_failures: Arc<RwLock<Vec<String>>>,
    /// Recorded encode invocations, in submission order.
    encodes: Arc<RwLock<Vec<EncodeInvocation>>>,
    /// Concat manifest contents captured at encode time.
    manifests: Arc<RwLock<Vec<String>>>,
    /// Every external process this mock would have started.
    spawns: AtomicUsize,
    /// Simulated encode duration in milliseconds.
    encode_duration_ms: Arc<RwLock<u64>>,
}

impl Default for MockTools {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTools {
    pub fn new() -> Self {
        Self {
            probe_results: Arc::new(RwLock::new(HashMap::new())),
            probe_failures: Arc::new(RwLock::new(Vec::new())),
            diagnostics: Arc::new(RwLock::new(HashMap::new())),
            encode_failures: Arc::new(RwLock::new(Vec::new())),
            encodes: Arc::new(RwLock::new(Vec::new())),
            manifests: Arc::new(RwLock::new(Vec::new())),
            spawns: AtomicUsize::new(0),
            encode_duration_ms: Arc::new(RwLock::new(0)),
        }
    }

    /// Well-formed video properties for a test clip.
    pub fn video_properties(
        path: impl AsRef<Path>,
        width: u32,
        height: u32,
        duration_secs: f64,
    ) -> MediaProperties {
        MediaProperties {
            path: path.as_ref().to_path_buf(),
            width: Some(width),
            height: Some(height),
            fps_num: Some(30),
            fps_den: Some(1),
            duration_secs: Some(duration_secs),
            has_audio: true,
        }
    }

    /// Set a probe result for a specific path.
    pub async fn set_probe_result(&self, path: impl AsRef<Path>, properties: MediaProperties) {
        self.probe_results
            .write()
            .await
            .insert(path.as_ref().to_path_buf(), properties);
    }

    /// Make probing the given path fail.
    pub async fn fail_probe_for(&self, path: impl AsRef<Path>) {
        self.probe_failures
            .write()
            .await
            .push(path.as_ref().to_path_buf());
    }

    /// Set the diagnostic text reported for a path.
    pub async fn set_diagnostics(&self, path: impl AsRef<Path>, text: impl Into<String>) {
        self.diagnostics
            .write()
            .await
            .insert(path.as_ref().to_path_buf(), text.into());
    }

    /// Make every encode invocation whose arguments contain `needle` fail
    /// with exit code 1.
    pub async fn fail_encode_matching(&self, needle: impl Into<String>) {
        self.encode_failures.write().await.push(needle.into());
    }

    /// Set the simulated encode duration.
    pub async fn set_encode_duration(&self, duration: Duration) {
        *self.encode_duration_ms.write().await = duration.as_millis() as u64;
    }

    /// Get all recorded encode invocations.
    pub async fn recorded_encodes(&self) -> Vec<EncodeInvocation> {
        self.encodes.read().await.clone()
    }

    /// Concat manifest contents, captured when the concat encode ran. The
    /// scratch directory is gone by the time a job returns, so the files
    /// themselves cannot be inspected after the fact.
    pub async fn concat_manifests(&self) -> Vec<String> {
        self.manifests.read().await.clone()
    }

    /// Total number of external processes this mock would have spawned.
    pub fn spawn_count(&self) -> usize {
        self.spawns.load(Ordering::SeqCst)
    }

    async fn should_fail(&self, invocation: &EncodeInvocation) -> bool {
        let needles = self.encode_failures.read().await;
        invocation
            .args
            .iter()
            .any(|arg| needles.iter().any(|needle| arg.contains(needle)))
    }

    /// Captures the manifest contents of a concat-demuxer invocation.
    async fn snapshot_manifest(&self, invocation: &EncodeInvocation) {
        let is_concat = invocation
            .args
            .windows(2)
            .any(|pair| pair[0] == "-f" && pair[1] == "concat");
        if !is_concat {
            return;
        }
        let manifest_path = invocation
            .args
            .windows(2)
            .find(|pair| pair[0] == "-i")
            .map(|pair| pair[1].clone());
        if let Some(path) = manifest_path {
            if let Ok(contents) = tokio::fs::read_to_string(&path).await {
                self.manifests.write().await.push(contents);
            }
        }
    }
}

#[async_trait]
impl MediaTools for MockTools {
    async fn probe(&self, path: &Path) -> Result<MediaProperties, ProbeError> {
        self.spawns.fetch_add(1, Ordering::SeqCst);

        if self.probe_failures.read().await.iter().any(|p| p == path) {
            return Err(ProbeError::probe_failed(format!(
                "mock probe failure for {}",
                path.display()
            )));
        }
        if let Some(properties) = self.probe_results.read().await.get(path) {
            return Ok(properties.clone());
        }
        Ok(Self::video_properties(path, 1920, 1080, 10.0))
    }

    async fn diagnose(&self, path: &Path) -> Result<String, ProbeError> {
        self.spawns.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .diagnostics
            .read()
            .await
            .get(path)
            .cloned()
            .unwrap_or_default())
    }

    async fn encode(&self, invocation: EncodeInvocation) -> Result<EncodeOutcome, ToolError> {
        self.spawns.fetch_add(1, Ordering::SeqCst);
        self.snapshot_manifest(&invocation).await;
        self.encodes.write().await.push(invocation.clone());

        let duration_ms = *self.encode_duration_ms.read().await;
        if duration_ms > 0 {
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_millis(duration_ms)) => {}
                _ = invocation.cancel.cancelled() => return Ok(EncodeOutcome::Cancelled),
            }
        }
        if invocation.cancel.is_cancelled() {
            return Ok(EncodeOutcome::Cancelled);
        }

        if self.should_fail(&invocation).await {
            return Ok(EncodeOutcome::Failed {
                code: Some(1),
                log_tail: "mock encode failure".to_string(),
            });
        }

        // Materialize a stub output so downstream file operations succeed.
        tokio::fs::write(&invocation.output, invocation.args.join(" ")).await?;
        Ok(EncodeOutcome::Completed)
    }
}

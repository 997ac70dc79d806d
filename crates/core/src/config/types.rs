use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the merge engine and its external tools.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Path to the ffmpeg binary.
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: PathBuf,

    /// Path to the ffprobe binary.
    #[serde(default = "default_ffprobe_path")]
    pub ffprobe_path: PathBuf,

    /// Root directory under which per-job scratch directories are created.
    #[serde(default = "default_scratch_root")]
    pub scratch_root: PathBuf,

    /// Maximum concurrent per-clip normalization encodes within one job.
    #[serde(default = "default_max_parallel")]
    pub max_parallel_normalizations: usize,

    /// Timeout for a single encoder invocation in seconds.
    #[serde(default = "default_timeout")]
    pub encode_timeout_secs: u64,

    /// FFmpeg log level (quiet, panic, fatal, error, warning, info, verbose, debug).
    #[serde(default = "default_log_level")]
    pub ffmpeg_log_level: String,

    /// Additional global ffmpeg arguments.
    #[serde(default)]
    pub extra_ffmpeg_args: Vec<String>,

    /// Render progress bars / spinners on stderr. Purely cosmetic; disabled
    /// by default for non-interactive embedding.
    #[serde(default)]
    pub render_progress: bool,
}

fn default_ffmpeg_path() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_ffprobe_path() -> PathBuf {
    PathBuf::from("ffprobe")
}

fn default_scratch_root() -> PathBuf {
    std::env::temp_dir().join("vidweld")
}

fn default_max_parallel() -> usize {
    2
}

fn default_timeout() -> u64 {
    3600 // 1 hour
}

fn default_log_level() -> String {
    "error".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg_path(),
            ffprobe_path: default_ffprobe_path(),
            scratch_root: default_scratch_root(),
            max_parallel_normalizations: default_max_parallel(),
            encode_timeout_secs: default_timeout(),
            ffmpeg_log_level: default_log_level(),
            extra_ffmpeg_args: Vec::new(),
            render_progress: false,
        }
    }
}

impl EngineConfig {
    /// Creates a config with custom ffmpeg/ffprobe paths.
    pub fn with_paths(ffmpeg_path: PathBuf, ffprobe_path: PathBuf) -> Self {
        Self {
            ffmpeg_path,
            ffprobe_path,
            ..Default::default()
        }
    }

    /// Sets the scratch root directory.
    pub fn with_scratch_root(mut self, scratch_root: PathBuf) -> Self {
        self.scratch_root = scratch_root;
        self
    }

    /// Sets the maximum concurrent normalizations.
    pub fn with_max_parallel(mut self, max: usize) -> Self {
        self.max_parallel_normalizations = max;
        self
    }

    /// Sets the encode timeout in seconds.
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.encode_timeout_secs = timeout_secs;
        self
    }
}

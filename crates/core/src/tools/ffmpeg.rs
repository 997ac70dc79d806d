//! FFmpeg/FFprobe-backed implementation of the tool boundary.

use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tokio::time::{timeout, Duration};
use tracing::debug;

use crate::config::EngineConfig;
use crate::media::{parse_probe_output, MediaProperties, ProbeError};
use crate::progress;

use super::error::ToolError;
use super::traits::{EncodeInvocation, EncodeOutcome, MediaTools};

/// Real toolchain: spawns `ffprobe` for inspection and `ffmpeg` for
/// encoding, streaming the encoder's stderr through the progress monitor.
pub struct FfmpegTools {
    config: EngineConfig,
}

impl FfmpegTools {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(EngineConfig::default())
    }

    fn map_probe_spawn_error(&self, e: std::io::Error) -> ProbeError {
        if e.kind() == std::io::ErrorKind::NotFound {
            ProbeError::FfprobeNotFound {
                path: self.config.ffprobe_path.clone(),
            }
        } else {
            ProbeError::Io(e)
        }
    }

    /// Checks for the presence of any audio stream. A failed check is
    /// missing data, not an error: the clip is treated as silent.
    async fn has_audio_stream(&self, path: &Path) -> Result<bool, ProbeError> {
        let output = Command::new(&self.config.ffprobe_path)
            .args([
                "-v",
                "error",
                "-select_streams",
                "a",
                "-show_entries",
                "stream=codec_type",
                "-of",
                "default=noprint_wrappers=1",
            ])
            .arg(path)
            .output()
            .await
            .map_err(|e| self.map_probe_spawn_error(e))?;

        if !output.status.success() {
            return Ok(false);
        }
        Ok(String::from_utf8_lossy(&output.stdout).contains("codec_type=audio"))
    }

    async fn probe_streams(&self, path: &Path) -> Result<MediaProperties, ProbeError> {
        let output = Command::new(&self.config.ffprobe_path)
            .args([
                "-v",
                "error",
                "-select_streams",
                "v:0",
                "-show_entries",
                "stream=width,height,r_frame_rate,duration",
                "-show_entries",
                "format=duration",
                "-of",
                "default=noprint_wrappers=1",
            ])
            .arg(path)
            .output()
            .await
            .map_err(|e| self.map_probe_spawn_error(e))?;

        if !output.status.success() {
            return Err(ProbeError::probe_failed(format!(
                "ffprobe failed: {}",
                String::from_utf8_lossy(&output.stderr)
            )));
        }

        let has_audio = self.has_audio_stream(path).await?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(parse_probe_output(path, &stdout, has_audio))
    }
}

#[async_trait]
impl MediaTools for FfmpegTools {
    async fn probe(&self, path: &Path) -> Result<MediaProperties, ProbeError> {
        if !path.exists() {
            return Err(ProbeError::InputNotFound {
                path: path.to_path_buf(),
            });
        }

        let spinner = progress::Spinner::start(
            format!("probing {}", path.display()),
            self.config.render_progress,
        );
        let result = self.probe_streams(path).await;
        spinner.stop();
        result
    }

    async fn diagnose(&self, path: &Path) -> Result<String, ProbeError> {
        // Exit status is deliberately ignored: a broken file is exactly what
        // this call is for, and its complaint arrives on stderr.
        let output = Command::new(&self.config.ffprobe_path)
            .args(["-v", "error"])
            .arg(path)
            .output()
            .await
            .map_err(|e| self.map_probe_spawn_error(e))?;

        Ok(String::from_utf8_lossy(&output.stderr).to_string())
    }

    async fn encode(&self, invocation: EncodeInvocation) -> Result<EncodeOutcome, ToolError> {
        let mut cmd = Command::new(&self.config.ffmpeg_path);
        cmd.args([
            "-hide_banner",
            "-loglevel",
            self.config.ffmpeg_log_level.as_str(),
            "-stats",
        ]);
        cmd.args(&self.config.extra_ffmpeg_args);
        cmd.args(&invocation.args);
        cmd.arg(&invocation.output);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        debug!(label = %invocation.label, "spawning encoder");
        let mut child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ToolError::FfmpegNotFound {
                    path: self.config.ffmpeg_path.clone(),
                }
            } else {
                ToolError::Io(e)
            }
        })?;

        let timeout_secs = self.config.encode_timeout_secs;
        let monitored = timeout(
            Duration::from_secs(timeout_secs),
            progress::monitor(
                &mut child,
                invocation.expected_duration,
                &invocation.cancel,
                self.config.render_progress,
                &invocation.label,
            ),
        )
        .await;

        match monitored {
            Ok(Ok(outcome)) => {
                if invocation.cancel.is_cancelled() {
                    return Ok(EncodeOutcome::Cancelled);
                }
                if outcome.status.success() {
                    Ok(EncodeOutcome::Completed)
                } else {
                    Ok(EncodeOutcome::Failed {
                        code: outcome.status.code(),
                        log_tail: outcome.log_tail.join("\n"),
                    })
                }
            }
            Ok(Err(e)) => Err(ToolError::Io(e)),
            Err(_) => {
                let _ = child.kill().await;
                Err(ToolError::Timeout { timeout_secs })
            }
        }
    }
}

use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use crate::cancel::CancelToken;
use crate::media::{FormatGuard, MediaProperties};
use crate::tools::{EncodeInvocation, EncodeOutcome, MediaTools};

use super::error::DropReason;
use super::scratch::ScratchDir;
use super::types::{Canvas, EncodeProfile, NormalizedClip, Quality};

/// Re-encodes one input clip to the job's common profile, writing the
/// result into the job's scratch directory.
///
/// Best-effort: any failure drops this input from the job (returned as a
/// [`DropReason`] for the caller's report) and never aborts the job itself.
/// Nothing is retried.
pub struct Normalizer<T: MediaTools> {
    tools: Arc<T>,
    guard: FormatGuard<T>,
    cancel: CancelToken,
}

impl<T: MediaTools> Normalizer<T> {
    pub fn new(tools: Arc<T>, cancel: CancelToken) -> Self {
        let guard = FormatGuard::new(Arc::clone(&tools), cancel.clone());
        Self {
            tools,
            guard,
            cancel,
        }
    }

    pub async fn normalize(
        &self,
        input: &Path,
        profile: &EncodeProfile,
        scratch: &ScratchDir,
    ) -> Result<NormalizedClip, DropReason> {
        match self.guard.ensure_valid(input, scratch.path()).await {
            Ok(true) => {}
            Ok(false) => return Err(DropReason::UnsupportedFormat),
            Err(e) => return Err(DropReason::Probe(e)),
        }

        let properties = self.tools.probe(input).await?;
        if !properties.has_essential_fields() {
            return Err(DropReason::MissingStreamInfo);
        }

        let output = scratch.file(&normalized_file_name(input));
        let args = build_normalize_args(input, &properties, profile);
        debug!(input = %input.display(), ?args, "normalizing clip");

        let invocation = EncodeInvocation {
            args,
            output: output.clone(),
            expected_duration: properties.duration_secs,
            label: format!(
                "normalize {}",
                input.file_name().unwrap_or_default().to_string_lossy()
            ),
            cancel: self.cancel.clone(),
        };

        match self.tools.encode(invocation).await? {
            EncodeOutcome::Completed => {
                info!(input = %input.display(), "clip normalized");
                Ok(NormalizedClip {
                    path: output,
                    properties,
                })
            }
            EncodeOutcome::Failed { code, log_tail } => {
                debug!(input = %input.display(), %log_tail, "normalization encode failed");
                Err(DropReason::EncodeFailed { code })
            }
            EncodeOutcome::Cancelled => Err(DropReason::Cancelled),
        }
    }
}

/// Deterministic scratch-file name for one input. Inputs within a job are
/// unique paths already, so collisions are not expected.
pub(crate) fn normalized_file_name(input: &Path) -> String {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "clip".to_string());
    let sanitized: String = stem
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{sanitized}_normalized.mp4")
}

/// The target frame rate actually applied to this clip, or `None` to keep
/// the source rate. A source rate at or above the request is kept: frame
/// rate is never artificially dropped.
pub(crate) fn effective_fps(requested: Option<f64>, source: Option<f64>) -> Option<f64> {
    match (requested, source) {
        (Some(target), Some(src)) if src >= target => None,
        (Some(target), _) => Some(target),
        (None, _) => None,
    }
}

/// Builds the encoder argument list for one normalization, output path
/// excluded. Filter order is fixed: scale + letterbox pad (skipped for the
/// `Original` canvas), then denoise, then frame interpolation.
pub(crate) fn build_normalize_args(
    input: &Path,
    properties: &MediaProperties,
    profile: &EncodeProfile,
) -> Vec<String> {
    let mut args = vec![
        "-y".to_string(),
        "-i".to_string(),
        input.to_string_lossy().to_string(),
    ];

    let source_fps = properties.fps();
    let target_fps = effective_fps(profile.fps, source_fps);

    let mut filters: Vec<String> = Vec::new();
    if let Canvas::Fixed { width, height } = profile.canvas {
        filters.push(format!(
            "scale={width}:{height}:force_original_aspect_ratio=decrease"
        ));
        filters.push(format!("pad={width}:{height}:(ow-iw)/2:(oh-ih)/2"));
        filters.push("setsar=1".to_string());
    }
    if profile.denoise {
        filters.push("hqdn3d".to_string());
    }
    if profile.interpolate {
        if let Some(fps) = target_fps.or(source_fps) {
            filters.push(format!("minterpolate=fps={fps}"));
        }
    }
    if !filters.is_empty() {
        args.extend(["-vf".to_string(), filters.join(",")]);
    }

    args.extend(["-c:v".to_string(), profile.video_codec.clone()]);
    match profile.quality {
        Quality::Crf(crf) => args.extend(["-crf".to_string(), crf.to_string()]),
        Quality::BitrateKbps(kbps) => args.extend(["-b:v".to_string(), format!("{kbps}k")]),
    }
    args.extend(["-preset".to_string(), profile.preset.clone()]);

    // Interpolation already sets the output rate through its filter.
    if !profile.interpolate {
        if let Some(fps) = target_fps {
            args.extend(["-r".to_string(), fps.to_string()]);
        }
    }

    if properties.has_audio {
        args.extend([
            "-c:a".to_string(),
            "aac".to_string(),
            "-b:a".to_string(),
            "192k".to_string(),
        ]);
    } else {
        args.push("-an".to_string());
    }
    args.extend(["-pix_fmt".to_string(), "yuv420p".to_string()]);

    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn props(width: u32, height: u32, fps: (u32, u32), has_audio: bool) -> MediaProperties {
        MediaProperties {
            path: PathBuf::from("/clips/in.mp4"),
            width: Some(width),
            height: Some(height),
            fps_num: Some(fps.0),
            fps_den: Some(fps.1),
            duration_secs: Some(10.0),
            has_audio,
        }
    }

    #[test]
    fn test_effective_fps_never_drops() {
        // Source already at or above the request: keep source.
        assert_eq!(effective_fps(Some(30.0), Some(60.0)), None);
        assert_eq!(effective_fps(Some(30.0), Some(30.0)), None);
        // Source below the request: convert up.
        assert_eq!(effective_fps(Some(60.0), Some(30.0)), Some(60.0));
        // No request: always source.
        assert_eq!(effective_fps(None, Some(24.0)), None);
        // Unknown source with a request: honor the request.
        assert_eq!(effective_fps(Some(25.0), None), Some(25.0));
    }

    #[test]
    fn test_original_canvas_has_no_filter_chain() {
        let profile = EncodeProfile {
            canvas: Canvas::Original,
            ..Default::default()
        };
        let args = build_normalize_args(
            Path::new("/clips/in.mp4"),
            &props(1920, 1080, (30, 1), true),
            &profile,
        );
        assert!(!args.contains(&"-vf".to_string()));
        assert!(args.contains(&"-c:v".to_string()));
        assert!(args.contains(&"libx264".to_string()));
    }

    #[test]
    fn test_filter_order_scale_denoise_interpolate() {
        let profile = EncodeProfile {
            canvas: Canvas::Fixed {
                width: 1280,
                height: 720,
            },
            denoise: true,
            interpolate: true,
            fps: Some(60.0),
            ..Default::default()
        };
        let args = build_normalize_args(
            Path::new("/clips/in.mp4"),
            &props(640, 480, (30, 1), false),
            &profile,
        );
        let vf_pos = args.iter().position(|a| a == "-vf").unwrap();
        let chain = &args[vf_pos + 1];
        let scale = chain.find("scale=1280:720").unwrap();
        let pad = chain.find("pad=1280:720").unwrap();
        let denoise = chain.find("hqdn3d").unwrap();
        let interp = chain.find("minterpolate=fps=60").unwrap();
        assert!(scale < pad && pad < denoise && denoise < interp);
        // Interpolation owns the output rate; no separate -r.
        assert!(!args.contains(&"-r".to_string()));
    }

    #[test]
    fn test_explicit_rate_without_interpolation() {
        let profile = EncodeProfile {
            fps: Some(50.0),
            ..Default::default()
        };
        let args = build_normalize_args(
            Path::new("/clips/in.mp4"),
            &props(1920, 1080, (25, 1), false),
            &profile,
        );
        let r_pos = args.iter().position(|a| a == "-r").unwrap();
        assert_eq!(args[r_pos + 1], "50");
    }

    #[test]
    fn test_quality_modes_are_exclusive() {
        let crf = build_normalize_args(
            Path::new("/in.mp4"),
            &props(1280, 720, (30, 1), false),
            &EncodeProfile {
                quality: Quality::Crf(18),
                ..Default::default()
            },
        );
        assert!(crf.contains(&"-crf".to_string()));
        assert!(!crf.contains(&"-b:v".to_string()));

        let bitrate = build_normalize_args(
            Path::new("/in.mp4"),
            &props(1280, 720, (30, 1), false),
            &EncodeProfile {
                quality: Quality::BitrateKbps(4500),
                ..Default::default()
            },
        );
        assert!(bitrate.contains(&"-b:v".to_string()));
        assert!(bitrate.contains(&"4500k".to_string()));
        assert!(!bitrate.contains(&"-crf".to_string()));
    }

    #[test]
    fn test_audio_handling() {
        let with_audio = build_normalize_args(
            Path::new("/in.mp4"),
            &props(1280, 720, (30, 1), true),
            &EncodeProfile::default(),
        );
        assert!(with_audio.contains(&"-c:a".to_string()));
        assert!(with_audio.contains(&"aac".to_string()));

        let silent = build_normalize_args(
            Path::new("/in.mp4"),
            &props(1280, 720, (30, 1), false),
            &EncodeProfile::default(),
        );
        assert!(silent.contains(&"-an".to_string()));
        assert!(!silent.contains(&"-c:a".to_string()));
    }

    #[test]
    fn test_scratch_file_name_is_sanitized() {
        assert_eq!(
            normalized_file_name(Path::new("/clips/my clip (1).mp4")),
            "my_clip__1__normalized.mp4"
        );
        assert_eq!(
            normalized_file_name(Path::new("/clips/intro.mkv")),
            "intro_normalized.mp4"
        );
    }
}

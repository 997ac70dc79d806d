use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use crate::cancel::CancelToken;
use crate::layout::{self, GridLayout};
use crate::tools::{EncodeInvocation, EncodeOutcome, MediaTools};

use super::error::MergeError;
use super::scratch::ScratchDir;
use super::types::{Canvas, EncodeProfile, MergeMode, NormalizedClip, Quality};

/// Builds and runs the single composition-stage encoder invocation for a
/// job: concat demuxer, vertical stack, grid, or side-by-side filter graph.
///
/// Mode/clip-count combinations are validated before any process spawns;
/// a bad combination is a configuration error, not a runtime failure
/// mid-job.
pub struct MergeDispatcher<T: MediaTools> {
    tools: Arc<T>,
    cancel: CancelToken,
}

impl<T: MediaTools> MergeDispatcher<T> {
    pub fn new(tools: Arc<T>, cancel: CancelToken) -> Self {
        Self { tools, cancel }
    }

    /// Rejects unsupported mode/clip-count combinations up front.
    pub fn validate(mode: MergeMode, input_count: usize) -> Result<(), MergeError> {
        let ok = match mode {
            MergeMode::Concat | MergeMode::Auto => input_count >= 1,
            MergeMode::VStack | MergeMode::Grid => input_count >= 2,
            MergeMode::SideBySide => input_count == 2,
            MergeMode::Single => input_count == 1,
        };
        if ok {
            Ok(())
        } else {
            Err(MergeError::configuration(format!(
                "mode {mode:?} cannot merge {input_count} input(s)"
            )))
        }
    }

    /// Concatenates clips in order via the concat demuxer, stream-copy.
    /// All clips must already share one canonical geometry.
    pub async fn concat(
        &self,
        clips: &[NormalizedClip],
        scratch: &ScratchDir,
        output: &Path,
    ) -> Result<(), MergeError> {
        let manifest_path = scratch.file("concat_manifest.txt");
        let manifest = concat_manifest(clips.iter().map(|c| c.path.as_path()));
        tokio::fs::write(&manifest_path, manifest)
            .await
            .map_err(MergeError::Scratch)?;

        let expected = clips
            .iter()
            .filter_map(|c| c.properties.duration_secs)
            .sum::<f64>();
        self.run(
            build_concat_args(&manifest_path),
            output,
            (expected > 0.0).then_some(expected),
            "concat",
        )
        .await
    }

    /// Stacks all clips top to bottom, timestamps reset per input.
    pub async fn vstack(
        &self,
        clips: &[NormalizedClip],
        profile: &EncodeProfile,
        output: &Path,
    ) -> Result<(), MergeError> {
        self.run(
            build_vstack_args(clips, profile),
            output,
            max_duration(clips),
            "vstack",
        )
        .await
    }

    /// Arranges clips on a solved grid over the target canvas.
    pub async fn grid(
        &self,
        clips: &[NormalizedClip],
        profile: &EncodeProfile,
        output: &Path,
    ) -> Result<(), MergeError> {
        let (width, height) = target_canvas(profile, clips);
        let layout = layout::solve(clips.len(), width, height);
        debug!(
            columns = layout.columns,
            rows = layout.rows,
            "grid layout solved"
        );
        self.run(
            build_grid_args(clips, &layout, profile),
            output,
            max_duration(clips),
            "grid",
        )
        .await
    }

    /// Places two clips side by side at a common height.
    pub async fn side_by_side(
        &self,
        left: &NormalizedClip,
        right: &NormalizedClip,
        profile: &EncodeProfile,
        output: &Path,
    ) -> Result<(), MergeError> {
        let clips = [left.clone(), right.clone()];
        self.run(
            build_side_by_side_args(left, right, profile),
            output,
            max_duration(&clips),
            "side-by-side",
        )
        .await
    }

    async fn run(
        &self,
        args: Vec<String>,
        output: &Path,
        expected_duration: Option<f64>,
        label: &str,
    ) -> Result<(), MergeError> {
        let invocation = EncodeInvocation {
            args,
            output: output.to_path_buf(),
            expected_duration,
            label: label.to_string(),
            cancel: self.cancel.clone(),
        };
        match self.tools.encode(invocation).await? {
            EncodeOutcome::Completed => Ok(()),
            EncodeOutcome::Failed { code, log_tail } => Err(MergeError::composition(
                format!("{label} encode exited with code {code:?}"),
                (!log_tail.is_empty()).then_some(log_tail),
            )),
            EncodeOutcome::Cancelled => Err(MergeError::composition(
                format!("{label} encode cancelled"),
                None,
            )),
        }
    }
}

/// Longest clip duration, for bounded composition progress.
fn max_duration(clips: &[NormalizedClip]) -> Option<f64> {
    clips
        .iter()
        .filter_map(|c| c.properties.duration_secs)
        .fold(None, |acc, d| Some(acc.map_or(d, |m: f64| m.max(d))))
}

/// Canvas the composition renders onto. With an `Original` profile canvas
/// the largest source dimensions found among the clips are used.
fn target_canvas(profile: &EncodeProfile, clips: &[NormalizedClip]) -> (u32, u32) {
    match profile.canvas {
        Canvas::Fixed { width, height } => (width, height),
        Canvas::Original => {
            let width = clips
                .iter()
                .filter_map(|c| c.properties.width)
                .max()
                .unwrap_or(1920);
            let height = clips
                .iter()
                .filter_map(|c| c.properties.height)
                .max()
                .unwrap_or(1080);
            (width, height)
        }
    }
}

/// Concat-demuxer manifest: one `file '...'` line per clip, in input order.
pub(crate) fn concat_manifest<'a>(paths: impl Iterator<Item = &'a Path>) -> String {
    let mut manifest = String::new();
    for path in paths {
        let escaped = path.to_string_lossy().replace('\'', r"'\''");
        manifest.push_str(&format!("file '{escaped}'\n"));
    }
    manifest
}

pub(crate) fn build_concat_args(manifest: &Path) -> Vec<String> {
    vec![
        "-y".to_string(),
        "-f".to_string(),
        "concat".to_string(),
        "-safe".to_string(),
        "0".to_string(),
        "-i".to_string(),
        manifest.to_string_lossy().to_string(),
        "-c".to_string(),
        "copy".to_string(),
    ]
}

fn input_args(clips: &[NormalizedClip]) -> Vec<String> {
    let mut args = vec!["-y".to_string()];
    for clip in clips {
        args.push("-i".to_string());
        args.push(clip.path.to_string_lossy().to_string());
    }
    args
}

/// Shared trailing arguments for filter-graph compositions: map the stacked
/// video plus the first input's audio if it has any, then encode with the
/// profile's codec settings.
fn composition_output_args(filter: String, profile: &EncodeProfile) -> Vec<String> {
    let mut args = vec![
        "-filter_complex".to_string(),
        filter,
        "-map".to_string(),
        "[vout]".to_string(),
        "-map".to_string(),
        "0:a?".to_string(),
        "-c:v".to_string(),
        profile.video_codec.clone(),
    ];
    match profile.quality {
        Quality::Crf(crf) => args.extend(["-crf".to_string(), crf.to_string()]),
        Quality::BitrateKbps(kbps) => args.extend(["-b:v".to_string(), format!("{kbps}k")]),
    }
    args.extend([
        "-preset".to_string(),
        profile.preset.clone(),
        "-c:a".to_string(),
        "aac".to_string(),
        "-b:a".to_string(),
        "192k".to_string(),
        "-pix_fmt".to_string(),
        "yuv420p".to_string(),
        "-movflags".to_string(),
        "+faststart".to_string(),
        "-shortest".to_string(),
    ]);
    args
}

pub(crate) fn build_vstack_args(clips: &[NormalizedClip], profile: &EncodeProfile) -> Vec<String> {
    let mut filter = String::new();
    for i in 0..clips.len() {
        filter.push_str(&format!("[{i}:v]setpts=PTS-STARTPTS[v{i}];"));
    }
    for i in 0..clips.len() {
        filter.push_str(&format!("[v{i}]"));
    }
    filter.push_str(&format!("vstack=inputs={}[vout]", clips.len()));

    let mut args = input_args(clips);
    args.extend(composition_output_args(filter, profile));
    args
}

pub(crate) fn build_grid_args(
    clips: &[NormalizedClip],
    layout: &GridLayout,
    profile: &EncodeProfile,
) -> Vec<String> {
    let cw = layout.cell_width;
    let ch = layout.cell_height;
    let mut filter = String::new();
    for i in 0..clips.len() {
        filter.push_str(&format!(
            "[{i}:v]scale={cw}:{ch}:force_original_aspect_ratio=decrease,\
             pad={cw}:{ch}:(ow-iw)/2:(oh-ih)/2,setsar=1,setpts=PTS-STARTPTS[c{i}];"
        ));
    }
    for i in 0..clips.len() {
        filter.push_str(&format!("[c{i}]"));
    }
    let positions: Vec<String> = layout
        .placements
        .iter()
        .map(|(x, y)| format!("{x}_{y}"))
        .collect();
    filter.push_str(&format!(
        "xstack=inputs={}:layout={}:fill=black[vout]",
        clips.len(),
        positions.join("|")
    ));

    let mut args = input_args(clips);
    args.extend(composition_output_args(filter, profile));
    args
}

pub(crate) fn build_side_by_side_args(
    left: &NormalizedClip,
    right: &NormalizedClip,
    profile: &EncodeProfile,
) -> Vec<String> {
    // Common height is the taller of the two sources, so neither is
    // upsampled past its own resolution by the shorter partner.
    let height = left
        .properties
        .height
        .into_iter()
        .chain(right.properties.height)
        .max()
        .unwrap_or(720);
    let filter = format!(
        "[0:v]scale=-2:{height},setpts=PTS-STARTPTS[l];\
         [1:v]scale=-2:{height},setpts=PTS-STARTPTS[r];\
         [l][r]hstack=inputs=2[vout]"
    );

    let clips = [left.clone(), right.clone()];
    let mut args = input_args(&clips);
    args.extend(composition_output_args(filter, profile));
    args
}

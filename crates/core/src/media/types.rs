use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Properties of one probed media file. Immutable once created.
///
/// The frame rate is kept as a rational (`fps_num` / `fps_den`) rather than
/// pre-divided, to avoid rounding loss on rates like 30000/1001.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaProperties {
    /// Source file path.
    pub path: PathBuf,
    /// Video width in pixels (if reported).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    /// Video height in pixels (if reported).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    /// Frame rate numerator (if reported).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fps_num: Option<u32>,
    /// Frame rate denominator (if reported).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fps_den: Option<u32>,
    /// Duration in seconds; absent when the container does not report one,
    /// in which case progress tracking degrades to indeterminate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<f64>,
    /// Whether the file has at least one audio stream.
    pub has_audio: bool,
}

impl MediaProperties {
    /// Frame rate as a float, when both parts of the rational are known.
    pub fn fps(&self) -> Option<f64> {
        match (self.fps_num, self.fps_den) {
            (Some(num), Some(den)) if den > 0 => Some(f64::from(num) / f64::from(den)),
            _ => None,
        }
    }

    /// Raw frame area in pixels, used by auto-pairing to rank clips.
    pub fn frame_area(&self) -> Option<u64> {
        match (self.width, self.height) {
            (Some(w), Some(h)) => Some(u64::from(w) * u64::from(h)),
            _ => None,
        }
    }

    /// Whether the fields normalization cannot proceed without are present.
    pub fn has_essential_fields(&self) -> bool {
        self.width.is_some() && self.height.is_some() && self.fps().is_some()
    }
}

/// Parses line-oriented `key=value` ffprobe output into [`MediaProperties`].
///
/// Unknown keys and malformed lines are skipped; `N/A` values are treated as
/// absent. When a key repeats (e.g. stream and format both report a
/// duration) the first parseable value wins.
pub fn parse_probe_output(path: &Path, output: &str, has_audio: bool) -> MediaProperties {
    let mut props = MediaProperties {
        path: path.to_path_buf(),
        width: None,
        height: None,
        fps_num: None,
        fps_den: None,
        duration_secs: None,
        has_audio,
    };

    for line in output.lines() {
        let Some((key, value)) = line.trim().split_once('=') else {
            continue;
        };
        let value = value.trim();
        if value.is_empty() || value == "N/A" {
            continue;
        }
        match key.trim() {
            "width" => {
                if props.width.is_none() {
                    props.width = value.parse().ok();
                }
            }
            "height" => {
                if props.height.is_none() {
                    props.height = value.parse().ok();
                }
            }
            "r_frame_rate" => {
                if props.fps_num.is_none() {
                    if let Some((num, den)) = parse_rational(value) {
                        props.fps_num = Some(num);
                        props.fps_den = Some(den);
                    }
                }
            }
            "duration" => {
                if props.duration_secs.is_none() {
                    props.duration_secs = value.parse().ok().filter(|d: &f64| d.is_finite());
                }
            }
            _ => {}
        }
    }

    props
}

/// Parses frame rates shaped like `30000/1001` or plain `25`.
fn parse_rational(value: &str) -> Option<(u32, u32)> {
    match value.split_once('/') {
        Some((num, den)) => {
            let num = num.trim().parse().ok()?;
            let den = den.trim().parse().ok()?;
            if den == 0 {
                None
            } else {
                Some((num, den))
            }
        }
        None => value.trim().parse().ok().map(|num| (num, 1)),
    }
}

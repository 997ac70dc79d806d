//! End-to-end merge job scenarios against the mock toolchain.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use vidweld_core::testing::MockTools;
use vidweld_core::{
    Canvas, EncodeProfile, EngineConfig, JobResult, MergeEngine, MergeError, MergeJob, MergeMode,
};

struct Harness {
    engine: MergeEngine<MockTools>,
    tools: Arc<MockTools>,
    dir: tempfile::TempDir,
}

fn harness() -> Harness {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let dir = tempfile::tempdir().unwrap();
    let config = EngineConfig::default().with_scratch_root(dir.path().join("scratch"));
    let tools = Arc::new(MockTools::new());
    let engine = MergeEngine::new(config, Arc::clone(&tools));
    Harness { engine, tools, dir }
}

impl Harness {
    fn input(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn job(&self, names: &[&str], mode: MergeMode) -> MergeJob {
        let inputs = names.iter().map(|n| self.input(n)).collect();
        MergeJob::new(
            inputs,
            EncodeProfile::default(),
            mode,
            self.dir.path().join("merged.mp4"),
        )
    }
}

#[tokio::test]
async fn concat_normalizes_each_input_then_stream_copies() {
    let h = harness();
    let job = h.job(&["a.mp4", "b.mkv", "c.avi", "d.webm"], MergeMode::Concat);

    let result = h.engine.execute(job).await;
    assert!(matches!(result, JobResult::Success { .. }));

    let manifests = h.tools.concat_manifests().await;
    assert_eq!(manifests.len(), 1);
    assert_eq!(manifests[0].lines().count(), 4);
    assert!(manifests[0].lines().all(|l| l.starts_with("file '")));

    // Every input gets its own normalization encode, then one concat.
    let encodes = h.tools.recorded_encodes().await;
    assert_eq!(encodes.len(), 5);
    let concat = encodes
        .iter()
        .find(|e| e.args.iter().any(|a| a == "concat"))
        .unwrap();
    // Stream copy: no filter, no re-encode.
    assert!(!concat.args.iter().any(|a| a == "-vf"));
    assert!(concat.args.windows(2).any(|p| p[0] == "-c" && p[1] == "copy"));
    // The normalization encodes do scale/pad.
    let normalize = encodes.iter().find(|e| e.args.iter().any(|a| a == "-vf"));
    assert!(normalize.is_some());
}

#[tokio::test]
async fn concat_with_original_canvas_skips_scaling() {
    let h = harness();
    // All inputs already share one geometry (the mock default), so with an
    // original canvas no scale/pad filter is needed anywhere.
    let names = ["a.mp4", "b.mp4", "c.mp4", "d.mp4"];
    let mut job = h.job(&names, MergeMode::Concat);
    job.profile = EncodeProfile {
        canvas: Canvas::Original,
        ..Default::default()
    };

    let result = h.engine.execute(job).await;
    assert!(matches!(result, JobResult::Success { .. }));

    let encodes = h.tools.recorded_encodes().await;
    assert!(encodes.iter().all(|e| !e.args.contains(&"-vf".to_string())));

    // Manifest preserves input order.
    let manifest = h.tools.concat_manifests().await.remove(0);
    let lines: Vec<&str> = manifest.lines().collect();
    assert_eq!(lines.len(), 4);
    for (line, name) in lines.iter().zip(["a_", "b_", "c_", "d_"]) {
        assert!(line.contains(&format!("{name}normalized")));
    }
}

#[tokio::test]
async fn mismatched_original_canvas_concat_is_rejected() {
    let h = harness();
    h.tools
        .set_probe_result(
            h.input("tall.mp4"),
            MockTools::video_properties(h.input("tall.mp4"), 1080, 1920, 6.0),
        )
        .await;
    let mut job = h.job(&["wide.mp4", "tall.mp4"], MergeMode::Concat);
    job.profile = EncodeProfile {
        canvas: Canvas::Original,
        ..Default::default()
    };

    let result = h.engine.execute(job).await;
    assert!(matches!(
        result,
        JobResult::Failure {
            error: MergeError::Composition { .. }
        }
    ));
    // The geometry check fires before the concat spawn.
    assert!(h.tools.concat_manifests().await.is_empty());
}

#[tokio::test]
async fn auto_pairs_smaller_clips_around_the_largest_spine() {
    let h = harness();
    h.tools
        .set_probe_result(
            h.input("big.mp4"),
            MockTools::video_properties(h.input("big.mp4"), 3840, 2160, 30.0),
        )
        .await;
    h.tools
        .set_probe_result(
            h.input("small_a.mp4"),
            MockTools::video_properties(h.input("small_a.mp4"), 640, 480, 8.0),
        )
        .await;
    h.tools
        .set_probe_result(
            h.input("small_b.mp4"),
            MockTools::video_properties(h.input("small_b.mp4"), 1280, 720, 12.0),
        )
        .await;

    let job = h
        .job(&["small_a.mp4", "big.mp4", "small_b.mp4"], MergeMode::Auto)
        .with_shuffle_seed(7);
    let result = h.engine.execute(job).await;
    assert!(matches!(result, JobResult::Success { .. }));

    // One side-by-side segment for the two smaller clips.
    let encodes = h.tools.recorded_encodes().await;
    let segments: Vec<_> = encodes
        .iter()
        .filter(|e| e.args.iter().any(|a| a.contains("hstack")))
        .collect();
    assert_eq!(segments.len(), 1);
    assert!(segments[0]
        .output
        .file_name()
        .unwrap()
        .to_string_lossy()
        .starts_with("segment_"));

    // Final list: spine first, then the paired segment.
    let manifests = h.tools.concat_manifests().await;
    assert_eq!(manifests.len(), 1);
    let lines: Vec<&str> = manifests[0].lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].contains("big_normalized"));
    assert!(lines[1].contains("segment_00"));
}

#[tokio::test]
async fn auto_with_seed_is_reproducible() {
    let names = ["a.mp4", "b.mp4", "c.mp4", "d.mp4", "e.mp4"];
    let mut first_run: Option<String> = None;
    for _ in 0..2 {
        let h = harness();
        for (i, name) in names.iter().enumerate() {
            h.tools
                .set_probe_result(
                    h.input(name),
                    MockTools::video_properties(h.input(name), 320 * (i as u32 + 1), 240, 5.0),
                )
                .await;
        }
        let job = h.job(&names, MergeMode::Auto).with_shuffle_seed(42);
        let result = h.engine.execute(job).await;
        assert!(result.is_success());

        let manifest = h.tools.concat_manifests().await.remove(0);
        // Strip the per-run temp directory so only the ordering remains.
        let order: String = manifest
            .lines()
            .map(|l| l.rsplit('/').next().unwrap_or(l))
            .collect::<Vec<_>>()
            .join("\n");
        match &first_run {
            None => first_run = Some(order),
            Some(previous) => assert_eq!(&order, previous),
        }
    }
}

#[tokio::test]
async fn failed_normalization_drops_the_input_and_continues() {
    let h = harness();
    h.tools.fail_encode_matching("bad.mp4").await;

    let job = h.job(&["ok_a.mp4", "bad.mp4", "ok_b.mp4"], MergeMode::Concat);
    let result = h.engine.execute(job).await;

    match result {
        JobResult::PartialSuccess { dropped, .. } => {
            assert_eq!(dropped.len(), 1);
            assert_eq!(dropped[0].path, h.input("bad.mp4"));
        }
        other => panic!("expected partial success, got {other:?}"),
    }

    let manifests = h.tools.concat_manifests().await;
    assert_eq!(manifests[0].lines().count(), 2);
    assert!(!manifests[0].contains("bad"));
}

#[tokio::test]
async fn probe_error_drops_the_input_and_continues() {
    let h = harness();
    h.tools.fail_probe_for(h.input("opaque.mp4")).await;

    let job = h.job(&["first.mp4", "opaque.mp4", "third.mp4"], MergeMode::Concat);
    let result = h.engine.execute(job).await;

    match result {
        JobResult::PartialSuccess { dropped, .. } => {
            assert_eq!(dropped.len(), 1);
            assert_eq!(dropped[0].path, h.input("opaque.mp4"));
        }
        other => panic!("expected partial success, got {other:?}"),
    }
    let manifest = h.tools.concat_manifests().await.remove(0);
    assert_eq!(manifest.lines().count(), 2);
    assert!(manifest.contains("first_normalized"));
    assert!(manifest.contains("third_normalized"));
}

#[tokio::test]
async fn unsupported_extension_is_dropped_without_probing() {
    let h = harness();
    let job = h.job(&["clip.mp4", "notes.txt"], MergeMode::Concat);
    let result = h.engine.execute(job).await;

    match result {
        JobResult::PartialSuccess { dropped, .. } => {
            assert_eq!(dropped.len(), 1);
            assert_eq!(dropped[0].path, h.input("notes.txt"));
        }
        other => panic!("expected partial success, got {other:?}"),
    }
}

#[tokio::test]
async fn all_inputs_dropped_fails_the_job() {
    let h = harness();
    h.tools.fail_encode_matching(".mp4").await;

    let job = h.job(&["a.mp4", "b.mp4"], MergeMode::Concat);
    let result = h.engine.execute(job).await;
    assert!(matches!(
        result,
        JobResult::Failure {
            error: MergeError::NoUsableInputs { total: 2 }
        }
    ));
}

#[tokio::test]
async fn invalid_mode_count_fails_before_anything_spawns() {
    let h = harness();
    let job = h.job(&["a.mp4", "b.mp4", "c.mp4"], MergeMode::SideBySide);
    let result = h.engine.execute(job).await;

    assert!(matches!(
        result,
        JobResult::Failure {
            error: MergeError::Configuration { .. }
        }
    ));
    assert_eq!(h.tools.spawn_count(), 0);
    // No scratch directory was created either.
    assert!(!h.dir.path().join("scratch").exists());
}

#[tokio::test]
async fn single_mode_copies_the_original_bytes() {
    let h = harness();
    let input = h.input("only.mp4");
    tokio::fs::write(&input, b"original clip bytes").await.unwrap();

    let job = h.job(&["only.mp4"], MergeMode::Single);
    let output = job.output.clone();
    let result = h.engine.execute(job).await;
    assert!(matches!(result, JobResult::Success { .. }));

    let copied = tokio::fs::read(&output).await.unwrap();
    assert_eq!(copied, b"original clip bytes");
    // Validation probes only, no encoder run.
    assert!(h.tools.recorded_encodes().await.is_empty());
}

#[tokio::test]
async fn existing_output_is_refused_without_overwrite() {
    let h = harness();
    let job = h.job(&["a.mp4", "b.mp4"], MergeMode::Concat);
    tokio::fs::write(&job.output, b"precious").await.unwrap();

    let result = h.engine.execute(job).await;
    assert!(matches!(
        result,
        JobResult::Failure {
            error: MergeError::OutputExists { .. }
        }
    ));
    assert_eq!(h.tools.spawn_count(), 0);

    let h = harness();
    let job = h
        .job(&["a.mp4", "b.mp4"], MergeMode::Concat)
        .with_overwrite(true);
    tokio::fs::write(&job.output, b"replaceable").await.unwrap();
    assert!(h.engine.execute(job).await.is_success());
}

#[tokio::test]
async fn cancellation_stops_the_job_and_cleans_scratch() {
    let h = harness();
    h.tools.set_encode_duration(Duration::from_millis(500)).await;

    let job = h.job(&["a.mp4", "b.mp4", "c.mp4"], MergeMode::Concat);
    let canceller = h.engine.canceller();
    let engine = Arc::new(h.engine);

    let task = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move { engine.execute(job).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    canceller.cancel();

    let result = task.await.unwrap();
    assert!(matches!(result, JobResult::Cancelled));

    // Scratch was torn down on the cancellation path too.
    let scratch_root = h.dir.path().join("scratch");
    let leftovers = std::fs::read_dir(&scratch_root)
        .map(|entries| entries.count())
        .unwrap_or(0);
    assert_eq!(leftovers, 0);
}

#[tokio::test]
async fn broken_index_triggers_stream_copy_repair() {
    let h = harness();
    let input = h.input("truncated.mp4");
    tokio::fs::write(&input, b"no moov here").await.unwrap();
    h.tools
        .set_diagnostics(&input, "moov atom not found\n")
        .await;

    let job = h.job(&["truncated.mp4", "fine.mp4"], MergeMode::Concat);
    let result = h.engine.execute(job).await;
    assert!(result.is_success());

    // Repair ran as a stream copy before normalization.
    let encodes = h.tools.recorded_encodes().await;
    let repair = encodes
        .iter()
        .find(|e| e.label.starts_with("repair"))
        .unwrap();
    assert!(repair.args.windows(2).any(|p| p[0] == "-c" && p[1] == "copy"));
    // The repaired bytes were swapped into the original path.
    let swapped = tokio::fs::read_to_string(&input).await.unwrap();
    assert!(swapped.contains("-c copy"));
}

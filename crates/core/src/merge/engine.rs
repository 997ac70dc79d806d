use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::cancel::{self, CancelHandle, CancelToken};
use crate::config::EngineConfig;
use crate::media::{FormatGuard, MediaProperties};
use crate::tools::MediaTools;

use super::auto;
use super::dispatch::MergeDispatcher;
use super::error::{DropReason, MergeError};
use super::normalize::Normalizer;
use super::scratch::ScratchDir;
use super::types::{DroppedInput, JobResult, MergeJob, MergeMode, NormalizedClip};

/// Drives one [`MergeJob`] end to end.
///
/// Per-input failures are recovered locally: the input is dropped, logged
/// and reported in the result; the job continues while viable inputs
/// remain. Job-level failures come back as a typed [`JobResult`], never as
/// a panic or an error threaded through arbitrary call stacks. One engine
/// carries one cancellation channel, which is the single registered
/// shutdown path for everything the job spawns.
pub struct MergeEngine<T: MediaTools> {
    config: EngineConfig,
    tools: Arc<T>,
    cancel_handle: CancelHandle,
    cancel: CancelToken,
}

impl<T: MediaTools + 'static> MergeEngine<T> {
    pub fn new(config: EngineConfig, tools: Arc<T>) -> Self {
        let (cancel_handle, cancel) = cancel::channel();
        Self {
            config,
            tools,
            cancel_handle,
            cancel,
        }
    }

    /// Handle for requesting cancellation of the running job.
    pub fn canceller(&self) -> CancelHandle {
        self.cancel_handle.clone()
    }

    /// Wires interrupt (Ctrl-C) delivery into the engine's shutdown path.
    pub fn cancel_on_interrupt(&self) {
        let handle = self.cancel_handle.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, cancelling merge job");
                handle.cancel();
            }
        });
    }

    /// Executes the job and reports its terminal result.
    pub async fn execute(&self, job: MergeJob) -> JobResult {
        info!(
            job_id = %job.job_id,
            mode = ?job.mode,
            inputs = job.inputs.len(),
            output = %job.output.display(),
            "merge job started"
        );
        let job_id = job.job_id.clone();
        let result = match self.run(job).await {
            Ok(result) => result,
            Err(_) if self.cancel.is_cancelled() => JobResult::Cancelled,
            Err(error) => {
                warn!(job_id = %job_id, error = %error, "merge job failed");
                JobResult::Failure { error }
            }
        };
        info!(job_id = %job_id, success = result.is_success(), "merge job finished");
        result
    }

    async fn run(&self, job: MergeJob) -> Result<JobResult, MergeError> {
        // Configuration problems surface before anything spawns or any
        // scratch space exists.
        MergeDispatcher::<T>::validate(job.mode, job.inputs.len())?;
        if !job.overwrite && tokio::fs::try_exists(&job.output).await.unwrap_or(false) {
            return Err(MergeError::OutputExists {
                path: job.output.clone(),
            });
        }

        let scratch = ScratchDir::create(&self.config.scratch_root, &job.job_id)
            .await
            .map_err(MergeError::Scratch)?;

        let result = self.run_in_scratch(&job, &scratch).await;

        // The one cleanup point for the job, cancellation included; the
        // scratch guard makes a second reach here a no-op.
        if let Err(e) = scratch.remove().await {
            warn!(job_id = %job.job_id, error = %e, "scratch cleanup failed");
        }

        if self.cancel.is_cancelled() {
            return Ok(JobResult::Cancelled);
        }
        result
    }

    async fn run_in_scratch(
        &self,
        job: &MergeJob,
        scratch: &ScratchDir,
    ) -> Result<JobResult, MergeError> {
        match job.mode {
            MergeMode::Single => self.run_single(job, scratch).await,
            MergeMode::Auto => self.run_auto(job, scratch).await,
            _ => self.run_uniform(job, scratch).await,
        }
    }

    /// Single mode: one valid clip, copied byte-for-byte, no encoder.
    async fn run_single(
        &self,
        job: &MergeJob,
        scratch: &ScratchDir,
    ) -> Result<JobResult, MergeError> {
        let input = &job.inputs[0];
        let guard = FormatGuard::new(Arc::clone(&self.tools), self.cancel.clone());
        let valid = matches!(guard.ensure_valid(input, scratch.path()).await, Ok(true))
            && self.tools.probe(input).await.is_ok();
        if !valid {
            return Err(MergeError::NoUsableInputs { total: 1 });
        }

        tokio::fs::copy(input, &job.output)
            .await
            .map_err(|e| MergeError::composition(format!("direct copy failed: {e}"), None))?;
        Ok(JobResult::Success {
            output: job.output.clone(),
        })
    }

    /// Concat, VStack, Grid and SideBySide: normalize everything to the
    /// common profile, then one composition invocation.
    async fn run_uniform(
        &self,
        job: &MergeJob,
        scratch: &ScratchDir,
    ) -> Result<JobResult, MergeError> {
        let (clips, dropped) = self.normalize_all(job, scratch).await;
        if self.cancel.is_cancelled() {
            return Ok(JobResult::Cancelled);
        }
        if clips.is_empty() {
            return Err(MergeError::NoUsableInputs {
                total: job.inputs.len(),
            });
        }
        self.check_surviving_count(job.mode, clips.len())?;

        let dispatcher = MergeDispatcher::new(Arc::clone(&self.tools), self.cancel.clone());
        match job.mode {
            MergeMode::Concat => {
                // A fixed canvas already forced one geometry during
                // normalization; original-canvas clips keep their own.
                if matches!(job.profile.canvas, super::types::Canvas::Original) {
                    check_concat_geometry(&clips)?;
                }
                dispatcher.concat(&clips, scratch, &job.output).await?;
            }
            MergeMode::VStack => {
                dispatcher.vstack(&clips, &job.profile, &job.output).await?;
            }
            MergeMode::Grid => {
                dispatcher.grid(&clips, &job.profile, &job.output).await?;
            }
            MergeMode::SideBySide => {
                dispatcher
                    .side_by_side(&clips[0], &clips[1], &job.profile, &job.output)
                    .await?;
            }
            MergeMode::Auto | MergeMode::Single => unreachable!("handled by run_in_scratch"),
        }

        Ok(finish(job.output.clone(), dropped))
    }

    /// Auto mode: rank by raw frame area, keep the largest as the spine,
    /// pair the rest side-by-side in shuffled order, concat all segments.
    /// The only mode with multiple composition-stage invocations; they run
    /// strictly in sequence because each consumes the previous stage's
    /// files.
    async fn run_auto(&self, job: &MergeJob, scratch: &ScratchDir) -> Result<JobResult, MergeError> {
        let (clips, dropped) = self.normalize_all(job, scratch).await;
        if self.cancel.is_cancelled() {
            return Ok(JobResult::Cancelled);
        }
        if clips.is_empty() {
            return Err(MergeError::NoUsableInputs {
                total: job.inputs.len(),
            });
        }

        let areas: Vec<u64> = clips
            .iter()
            .map(|c| c.properties.frame_area().unwrap_or(0))
            .collect();
        let mut rng = match job.shuffle_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let plan = auto::plan(&areas, &mut rng);

        let dispatcher = MergeDispatcher::new(Arc::clone(&self.tools), self.cancel.clone());
        let mut segments: Vec<NormalizedClip> = vec![clips[plan.spine].clone()];

        for (index, &(a, b)) in plan.pairs.iter().enumerate() {
            let segment_path = scratch.file(&format!("segment_{index:02}.mp4"));
            dispatcher
                .side_by_side(&clips[a], &clips[b], &job.profile, &segment_path)
                .await?;
            segments.push(segment_clip(segment_path, &clips[a], &clips[b]));
            if self.cancel.is_cancelled() {
                return Ok(JobResult::Cancelled);
            }
        }
        if let Some(lone) = plan.leftover {
            segments.push(clips[lone].clone());
        }

        dispatcher.concat(&segments, scratch, &job.output).await?;
        Ok(finish(job.output.clone(), dropped))
    }

    /// Normalizes every input, bounded by the configured parallelism.
    /// Futures are joined in input order, so surviving clips keep it.
    async fn normalize_all(
        &self,
        job: &MergeJob,
        scratch: &ScratchDir,
    ) -> (Vec<NormalizedClip>, Vec<DroppedInput>) {
        let normalizer = Normalizer::new(Arc::clone(&self.tools), self.cancel.clone());
        let semaphore = Arc::new(Semaphore::new(self.config.max_parallel_normalizations));

        let tasks = job.inputs.iter().map(|input| {
            let semaphore = Arc::clone(&semaphore);
            let normalizer = &normalizer;
            let profile = &job.profile;
            async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return Err(DropReason::Cancelled),
                };
                normalizer.normalize(input, profile, scratch).await
            }
        });
        let results = futures::future::join_all(tasks).await;

        let mut clips = Vec::new();
        let mut dropped = Vec::new();
        for (input, result) in job.inputs.iter().zip(results) {
            match result {
                Ok(clip) => clips.push(clip),
                Err(reason) => {
                    warn!(input = %input.display(), reason = %reason, "input dropped");
                    dropped.push(DroppedInput {
                        path: input.clone(),
                        reason,
                    });
                }
            }
        }
        (clips, dropped)
    }

    /// A drop can leave a mode without enough clips to compose; that is a
    /// job-level failure, found before the composition spawn.
    fn check_surviving_count(&self, mode: MergeMode, remaining: usize) -> Result<(), MergeError> {
        let required = match mode {
            MergeMode::VStack | MergeMode::Grid | MergeMode::SideBySide => 2,
            _ => 1,
        };
        if remaining < required {
            return Err(MergeError::composition(
                format!("mode {mode:?} has {remaining} clip(s) left after normalization"),
                None,
            ));
        }
        Ok(())
    }
}

fn finish(output: PathBuf, dropped: Vec<DroppedInput>) -> JobResult {
    if dropped.is_empty() {
        JobResult::Success { output }
    } else {
        JobResult::PartialSuccess { output, dropped }
    }
}

/// Stream concatenation cannot re-negotiate geometry, so every clip must
/// arrive at identical dimensions.
fn check_concat_geometry(clips: &[NormalizedClip]) -> Result<(), MergeError> {
    let mut dims = clips
        .iter()
        .map(|c| (c.properties.width, c.properties.height));
    let first = dims.next();
    if let Some(first) = first {
        if dims.any(|d| d != first) {
            return Err(MergeError::composition(
                "concat requires identical dimensions across all clips",
                None,
            ));
        }
    }
    Ok(())
}

/// Synthetic clip record for an ephemeral side-by-side segment. Only the
/// path and duration matter downstream (the final concat manifest and its
/// progress bound).
fn segment_clip(path: PathBuf, a: &NormalizedClip, b: &NormalizedClip) -> NormalizedClip {
    let duration = match (a.properties.duration_secs, b.properties.duration_secs) {
        (Some(x), Some(y)) => Some(x.max(y)),
        (Some(x), None) | (None, Some(x)) => Some(x),
        (None, None) => None,
    };
    NormalizedClip {
        properties: MediaProperties {
            path: path.clone(),
            width: None,
            height: None,
            fps_num: None,
            fps_den: None,
            duration_secs: duration,
            has_audio: a.properties.has_audio || b.properties.has_audio,
        },
        path,
    }
}

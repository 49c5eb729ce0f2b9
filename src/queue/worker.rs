use super::job::{AudioSource, EncodeJob};
use crate::analyzer::{TrackProbe, probe_duration};
use crate::config::{AppConfig, MixSettings};
use crate::encoder::{
    EncodeRequest, EncodeResult, MixInput, MixParams, ProcessRegistry, build_ffmpeg_args,
    run_encoder,
};
use crate::error::AppError;
use crate::postprocess::dispose_sources;
use crate::utils::has_enough_space;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{info, warn};

/// Messages sent from worker threads to the batch consumer
#[derive(Debug)]
pub enum WorkerMessage {
    /// Job picked up, encoder about to start
    Started(String),
    /// Progress percentage for a running job
    Progress(String, f32),
    /// Job reached a terminal state
    Finished(String, JobOutcome),
}

/// Terminal result of one job
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    Done { output: PathBuf },
    Error(String),
    Stopped,
}

/// State shared by every worker of a batch
pub struct WorkerContext {
    pub config: AppConfig,
    pub mix: MixSettings,
    pub probe: Arc<dyn TrackProbe>,
    pub registry: ProcessRegistry,
    pub cancel_flag: Arc<AtomicBool>,
    /// Temp directories staged into by this or an earlier batch of the same
    /// orchestrator, removed after a clean finish
    pub staged_temp_dirs: Arc<Mutex<BTreeSet<PathBuf>>>,
}

impl WorkerContext {
    fn cancelled(&self) -> bool {
        self.cancel_flag.load(Ordering::Relaxed)
    }
}

/// Run one job from duration probe to source disposal
pub fn process_job(job: &EncodeJob, ctx: &WorkerContext, tx: &Sender<WorkerMessage>) -> JobOutcome {
    if ctx.cancelled() {
        return JobOutcome::Stopped;
    }

    let duration = match probe_duration(&ctx.config.tools.ffprobe, &job.video) {
        Ok(d) => d,
        Err(e) => return JobOutcome::Error(e.to_string()),
    };

    let _ = tx.send(WorkerMessage::Started(job.identity.clone()));

    let args = match prepare(job, ctx) {
        Ok(args) => args,
        Err(e) => return JobOutcome::Error(e.to_string()),
    };

    let request = EncodeRequest {
        job_id: job.id,
        program: ctx.config.tools.ffmpeg.clone(),
        args,
        duration,
        poll_interval: ctx.config.performance.poll_interval(),
        terminate_grace: ctx.config.performance.terminate_grace(),
    };

    let tx_progress = tx.clone();
    let identity = job.identity.clone();
    let result = run_encoder(
        &request,
        &ctx.registry,
        &ctx.cancel_flag,
        Box::new(move |progress| {
            let _ = tx_progress.send(WorkerMessage::Progress(identity.clone(), progress));
        }),
    );

    match result {
        EncodeResult::Success => match commit(&job.temp_output, &job.final_output) {
            Ok(()) => {
                info!("Committed {}", job.final_output.display());
                dispose_sources(
                    &job.source_files(),
                    ctx.config.options.disposition(),
                    &ctx.config.output.backup_dir_name,
                );
                JobOutcome::Done {
                    output: job.final_output.clone(),
                }
            }
            Err(e) => {
                remove_temp_output(&job.temp_output);
                JobOutcome::Error(e.to_string())
            }
        },
        EncodeResult::Cancelled => {
            remove_temp_output(&job.temp_output);
            JobOutcome::Stopped
        }
        EncodeResult::Error(message) => {
            remove_temp_output(&job.temp_output);
            JobOutcome::Error(message)
        }
    }
}

/// Setup between pickup and encoder start: space check, staging directory,
/// and the command line
fn prepare(job: &EncodeJob, ctx: &WorkerContext) -> Result<Vec<String>, AppError> {
    let required = std::fs::metadata(&job.video).map(|m| m.len()).unwrap_or(0);
    let video_dir = job.video.parent().unwrap_or(Path::new("."));
    if !has_enough_space(video_dir, required) {
        return Err(AppError::DiskSpace {
            dir: video_dir.to_path_buf(),
            required,
        });
    }

    std::fs::create_dir_all(&job.temp_dir)?;
    ctx.staged_temp_dirs
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .insert(job.temp_dir.clone());

    let input = match &job.source {
        AudioSource::External(audio) => MixInput::External {
            audio: audio.clone(),
        },
        AudioSource::Embedded => {
            let (_, tracks) = ctx.probe.inspect(&job.video);
            MixParams::embedded_input(&tracks, ctx.mix.invert_tracks)?
        }
    };

    let params = MixParams::new(job.video.clone(), input, &ctx.mix, &ctx.config);
    Ok(build_ffmpeg_args(&params, &job.temp_output))
}

/// Move the staged output into place
fn commit(temp_output: &Path, final_output: &Path) -> Result<(), AppError> {
    std::fs::rename(temp_output, final_output).map_err(|source| AppError::Commit {
        from: temp_output.to_path_buf(),
        to: final_output.to_path_buf(),
        source,
    })
}

fn remove_temp_output(path: &Path) {
    if path.exists()
        && let Err(e) = std::fs::remove_file(path)
    {
        warn!("Failed to remove {}: {}", path.display(), e);
    }
}

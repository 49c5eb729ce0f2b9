//! Batch execution.
//!
//! A coordinator thread schedules eligible pairs, feeds them to a bounded pool
//! of worker threads, and consumes their messages. It is the only place that
//! writes job statuses while a batch runs, and it fires the observer
//! callbacks in the order the messages arrive.

use super::job::{EncodeJob, JobStatus};
use super::state::JobStore;
use super::summary::BatchSummary;
use super::worker::{JobOutcome, WorkerContext, WorkerMessage, process_job};
use crate::analyzer::TrackProbe;
use crate::config::{AppConfig, MixSettings};
use crate::encoder::ProcessRegistry;
use crate::error::AppError;
use chrono::Local;
use std::collections::{BTreeSet, VecDeque};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use tracing::{info, warn};

/// Callbacks fired by the batch consumer
pub trait BatchObserver: Send + Sync {
    fn on_item_status_changed(&self, _identity: &str, _status: &JobStatus, _progress: f32) {}
    fn on_batch_progress(&self, _processed: usize, _total: usize) {}
    fn on_batch_finished(&self, _success_count: usize, _error_count: usize) {}
}

/// A running batch
pub struct BatchHandle {
    thread: JoinHandle<BatchSummary>,
}

impl BatchHandle {
    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Wait for the batch to end
    pub fn join(self) -> Result<BatchSummary, AppError> {
        self.thread
            .join()
            .map_err(|_| AppError::Encode("Batch coordinator panicked".to_string()))
    }
}

/// Runs batches over the pairs of a [`JobStore`]
pub struct Orchestrator {
    config: AppConfig,
    store: Arc<JobStore>,
    probe: Arc<dyn TrackProbe>,
    registry: ProcessRegistry,
    running: Arc<AtomicBool>,
    current_cancel: Mutex<Option<Arc<AtomicBool>>>,
    /// Kept across batches so a stopped batch's staging dirs are cleaned by
    /// the next one that finishes
    staged_temp_dirs: Arc<Mutex<BTreeSet<PathBuf>>>,
}

impl Orchestrator {
    pub fn new(config: AppConfig, store: Arc<JobStore>, probe: Arc<dyn TrackProbe>) -> Self {
        Self {
            config,
            store,
            probe,
            registry: ProcessRegistry::new(),
            running: Arc::new(AtomicBool::new(false)),
            current_cancel: Mutex::new(None),
            staged_temp_dirs: Arc::new(Mutex::new(BTreeSet::new())),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn store(&self) -> &Arc<JobStore> {
        &self.store
    }

    /// Start a batch over every eligible pair. Only one batch runs at a time.
    pub fn start_batch(
        &self,
        mix: MixSettings,
        observer: Arc<dyn BatchObserver>,
    ) -> Result<BatchHandle, AppError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(AppError::BatchRunning);
        }

        let cancel_flag = Arc::new(AtomicBool::new(false));
        *self
            .current_cancel
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(cancel_flag.clone());

        let ctx = WorkerContext {
            config: self.config.clone(),
            mix,
            probe: self.probe.clone(),
            registry: self.registry.clone(),
            cancel_flag,
            staged_temp_dirs: self.staged_temp_dirs.clone(),
        };
        let store = self.store.clone();
        let running = self.running.clone();

        let spawned = thread::Builder::new()
            .name("batch-coordinator".to_string())
            .spawn(move || {
                let summary = run_batch(ctx, &store, observer.as_ref());
                running.store(false, Ordering::SeqCst);
                summary
            });

        match spawned {
            Ok(thread) => Ok(BatchHandle { thread }),
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                Err(AppError::Io(e))
            }
        }
    }

    /// Start a batch and wait for it
    pub fn run_batch(
        &self,
        mix: MixSettings,
        observer: Arc<dyn BatchObserver>,
    ) -> Result<BatchSummary, AppError> {
        self.start_batch(mix, observer)?.join()
    }

    /// Cancel the running batch and terminate every encoder process
    pub fn stop(&self) {
        if let Some(flag) = self
            .current_cancel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            flag.store(true, Ordering::Relaxed);
        }
        self.registry
            .terminate_all(self.config.performance.terminate_grace());
    }
}

fn run_batch(ctx: WorkerContext, store: &JobStore, observer: &dyn BatchObserver) -> BatchSummary {
    let scheduled = store.schedule(ctx.probe.as_ref());
    let mut summary = BatchSummary::new(Local::now(), scheduled.len());
    info!("Batch started with {} job(s)", summary.total);
    observer.on_batch_progress(0, summary.total);

    let mut queue = VecDeque::new();
    for pair in &scheduled {
        observer.on_item_status_changed(&pair.identity, &JobStatus::Pending, 0.0);
        match EncodeJob::for_pair(pair, &ctx.config.output) {
            Ok(job) => queue.push_back(job),
            Err(e) => {
                let status = JobStatus::error(e.to_string());
                store.set_status(&pair.identity, status.clone());
                observer.on_item_status_changed(&pair.identity, &status, 0.0);
                summary.errors += 1;
                summary.processed += 1;
                observer.on_batch_progress(summary.processed, summary.total);
            }
        }
    }

    let worker_count = ctx.config.performance.worker_count().min(queue.len()).max(1);
    let queue = Arc::new(Mutex::new(queue));
    let ctx = Arc::new(ctx);
    let (tx, rx) = mpsc::channel();

    let mut workers = Vec::with_capacity(worker_count);
    for i in 0..worker_count {
        let queue = queue.clone();
        let ctx = ctx.clone();
        let tx = tx.clone();
        let spawned = thread::Builder::new()
            .name(format!("encode-worker-{}", i))
            .spawn(move || worker_loop(&queue, &ctx, &tx));
        match spawned {
            Ok(handle) => workers.push(handle),
            Err(e) => warn!("Failed to spawn worker {}: {}", i, e),
        }
    }
    drop(tx);

    if workers.is_empty() {
        // Nothing will drain the queue, so close it out here
        let remaining: Vec<EncodeJob> = queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        for job in remaining {
            apply_outcome(
                store,
                observer,
                &mut summary,
                &job.identity,
                JobOutcome::Error("No worker thread available".to_string()),
            );
        }
    }

    for message in rx {
        match message {
            WorkerMessage::Started(identity) => {
                let status = JobStatus::Processing { progress: 0.0 };
                if store.set_status(&identity, status.clone()) {
                    observer.on_item_status_changed(&identity, &status, 0.0);
                }
            }
            WorkerMessage::Progress(identity, progress) => {
                if store.update_progress(&identity, progress) {
                    let progress = progress.clamp(0.0, 100.0);
                    observer.on_item_status_changed(
                        &identity,
                        &JobStatus::Processing { progress },
                        progress,
                    );
                }
            }
            WorkerMessage::Finished(identity, outcome) => {
                apply_outcome(store, observer, &mut summary, &identity, outcome);
            }
        }
    }

    for worker in workers {
        let _ = worker.join();
    }

    summary.cancelled = ctx.cancel_flag.load(Ordering::Relaxed);
    if !summary.cancelled {
        remove_temp_dirs(&ctx);
    }

    summary.finished_at = Local::now();
    info!(
        "Batch finished: {} done, {} failed, {} stopped",
        summary.done, summary.errors, summary.stopped
    );
    observer.on_batch_finished(summary.done, summary.errors);
    summary
}

fn worker_loop(
    queue: &Mutex<VecDeque<EncodeJob>>,
    ctx: &WorkerContext,
    tx: &mpsc::Sender<WorkerMessage>,
) {
    loop {
        let next = queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        let Some(job) = next else {
            break;
        };

        let outcome = process_job(&job, ctx, tx);
        if tx
            .send(WorkerMessage::Finished(job.identity.clone(), outcome))
            .is_err()
        {
            break;
        }
    }
}

fn apply_outcome(
    store: &JobStore,
    observer: &dyn BatchObserver,
    summary: &mut BatchSummary,
    identity: &str,
    outcome: JobOutcome,
) {
    let status = match outcome {
        JobOutcome::Done { output } => {
            summary.done += 1;
            summary.record_output(output);
            JobStatus::Done
        }
        JobOutcome::Error(message) => {
            warn!("{}: {}", identity, message);
            summary.errors += 1;
            JobStatus::Error { message }
        }
        JobOutcome::Stopped => {
            summary.stopped += 1;
            JobStatus::Stopped
        }
    };

    let progress = if status == JobStatus::Done { 100.0 } else { 0.0 };
    store.set_status(identity, status.clone());
    observer.on_item_status_changed(identity, &status, progress);

    summary.processed += 1;
    observer.on_batch_progress(summary.processed, summary.total);
}

fn remove_temp_dirs(ctx: &WorkerContext) {
    let dirs = std::mem::take(
        &mut *ctx
            .staged_temp_dirs
            .lock()
            .unwrap_or_else(PoisonError::into_inner),
    );
    for dir in dirs.into_iter().filter(|d| d.exists()) {
        match std::fs::remove_dir_all(&dir) {
            Ok(()) => info!("Removed temp directory {}", dir.display()),
            Err(e) => warn!("Failed to remove temp directory {}: {}", dir.display(), e),
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::analyzer::FfmpegInspector;
    use crate::pairing::MediaScan;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};
    use std::time::{Duration, Instant};

    const FAKE_FFMPEG: &str = r#"#!/bin/sh
for arg in "$@"; do
  if [ "$arg" = "-filter_complex" ]; then mixing=1; fi
  last="$arg"
done
if [ -n "$mixing" ]; then
  echo "size=   10kB time=00:00:05.00 bitrate= 16.4kbits/s" >&2
  echo "mixed" > "$last"
  exit 0
fi
cat >&2 <<EOF
Input #0, matroska,webm, from 'input':
  Stream #0:0: Video: h264, yuv420p, 1920x1080
  Stream #0:1(eng): Audio: aac (LC), 48000 Hz, stereo, fltp
  Stream #0:2(rus): Audio: aac (LC), 48000 Hz, mono, fltp
  Stream #0:3(und): Audio: aac (LC), 48000 Hz, stereo, fltp
At least one output file must be specified
EOF
exit 1
"#;

    const FAILING_FFMPEG: &str = r#"#!/bin/sh
for arg in "$@"; do
  if [ "$arg" = "-filter_complex" ]; then
    echo "Invalid data found when processing input" >&2
    exit 1
  fi
done
echo "  Stream #0:1(eng): Audio: aac, 48000 Hz, stereo" >&2
echo "  Stream #0:2(rus): Audio: aac, 48000 Hz, stereo" >&2
exit 1
"#;

    const SLOW_FFMPEG: &str = r#"#!/bin/sh
for arg in "$@"; do
  if [ "$arg" = "-filter_complex" ]; then exec sleep 30; fi
done
echo "  Stream #0:1(eng): Audio: aac, 48000 Hz, stereo" >&2
echo "  Stream #0:2(rus): Audio: aac, 48000 Hz, stereo" >&2
exit 1
"#;

    // Mixing runs are appended to `<script>.runs`; while `<script>.hold`
    // exists a mixing run blocks until it is killed
    const HOLDING_FFMPEG: &str = r#"#!/bin/sh
for arg in "$@"; do
  if [ "$arg" = "-filter_complex" ]; then mixing=1; fi
  last="$arg"
done
if [ -n "$mixing" ]; then
  echo run >> "$0.runs"
  if [ -e "$0.hold" ]; then exec sleep 30; fi
  echo "mixed" > "$last"
  exit 0
fi
echo "  Stream #0:1(eng): Audio: aac, 48000 Hz, stereo" >&2
echo "  Stream #0:2(rus): Audio: aac, 48000 Hz, stereo" >&2
exit 1
"#;

    const FAKE_FFPROBE: &str = "#!/bin/sh\necho 10.0\n";

    struct NoopObserver;

    impl BatchObserver for NoopObserver {}

    fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, body).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    struct Fixture {
        _tools: tempfile::TempDir,
        media: tempfile::TempDir,
        orchestrator: Orchestrator,
    }

    fn fixture(ffmpeg_body: &str, videos: &[&str], audios: &[&str]) -> Fixture {
        let tools = tempfile::tempdir().unwrap();
        let media = tempfile::tempdir().unwrap();

        let mut config = AppConfig::default();
        config.tools.ffmpeg = script(tools.path(), "ffmpeg", ffmpeg_body);
        config.tools.ffprobe = script(tools.path(), "ffprobe", FAKE_FFPROBE);
        config.performance.workers = Some(2);
        config.performance.poll_interval_ms = 10;

        let mut scan = MediaScan::default();
        for name in videos {
            let path = media.path().join(name);
            fs::write(&path, b"video").unwrap();
            scan.videos.push(path);
        }
        for name in audios {
            let path = media.path().join(name);
            fs::write(&path, b"audio").unwrap();
            scan.audios.push(path);
        }

        let probe: Arc<dyn TrackProbe> = Arc::new(FfmpegInspector::new(&config.tools.ffmpeg));
        let store = Arc::new(JobStore::new());
        store.add_media(scan, probe.as_ref());

        Fixture {
            _tools: tools,
            media,
            orchestrator: Orchestrator::new(config, store, probe),
        }
    }

    /// File next to the fake ffmpeg script, e.g. `ffmpeg.hold`
    fn beside_ffmpeg(fx: &Fixture, ext: &str) -> PathBuf {
        let ffmpeg = &fx.orchestrator.config.tools.ffmpeg;
        PathBuf::from(format!("{}.{}", ffmpeg.display(), ext))
    }

    fn mixing_runs(fx: &Fixture) -> usize {
        fs::read_to_string(beside_ffmpeg(fx, "runs"))
            .map(|s| s.lines().count())
            .unwrap_or(0)
    }

    fn wait_for(condition: impl Fn() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while !condition() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(20));
        }
        assert!(condition(), "condition not reached within 10s");
    }

    #[derive(Default)]
    struct Recorder {
        statuses: Mutex<Vec<(String, JobStatus)>>,
        progress: Mutex<Vec<(usize, usize)>>,
        finished: Mutex<Option<(usize, usize)>>,
    }

    impl BatchObserver for Recorder {
        fn on_item_status_changed(&self, identity: &str, status: &JobStatus, _progress: f32) {
            self.statuses
                .lock()
                .unwrap()
                .push((identity.to_string(), status.clone()));
        }

        fn on_batch_progress(&self, processed: usize, total: usize) {
            self.progress.lock().unwrap().push((processed, total));
        }

        fn on_batch_finished(&self, success_count: usize, error_count: usize) {
            *self.finished.lock().unwrap() = Some((success_count, error_count));
        }
    }

    #[test]
    fn test_embedded_movie_goes_pending_processing_done() {
        let fx = fixture(FAKE_FFMPEG, &["movie.mp4"], &[]);
        let store = fx.orchestrator.store().clone();
        assert_eq!(store.get("movie").unwrap().track_summary(), "1:ENG, 2:RUS, 3:UND");

        let recorder = Arc::new(Recorder::default());
        let summary = fx
            .orchestrator
            .run_batch(MixSettings::default(), recorder.clone())
            .unwrap();

        assert_eq!(summary.done, 1);
        assert_eq!(summary.processed, 1);
        assert_eq!(store.get("movie").unwrap().status, JobStatus::Done);

        let states: Vec<JobStatus> = recorder
            .statuses
            .lock()
            .unwrap()
            .iter()
            .map(|(_, s)| s.clone())
            .collect();
        assert_eq!(states.first(), Some(&JobStatus::Pending));
        assert_eq!(states.get(1), Some(&JobStatus::Processing { progress: 0.0 }));
        assert_eq!(states.last(), Some(&JobStatus::Done));
        assert!(!states.iter().any(|s| matches!(s, JobStatus::Error { .. })));

        let media = fx.media.path();
        assert!(media.join("movie_RUS.mkv").exists());
        assert!(!media.join("temp").exists());
        assert!(media.join("backup/movie.mp4").exists());
        assert!(!media.join("movie.mp4").exists());
        assert_eq!(*recorder.finished.lock().unwrap(), Some((1, 0)));
    }

    #[test]
    fn test_every_eligible_pair_reaches_a_terminal_status() {
        let fx = fixture(
            FAKE_FFMPEG,
            &["a.mp4", "b.mp4", "c.mkv"],
            &["a_rus.mp3", "zzz.wav"],
        );
        let store = fx.orchestrator.store().clone();

        let recorder = Arc::new(Recorder::default());
        let summary = fx
            .orchestrator
            .run_batch(MixSettings::default(), recorder.clone())
            .unwrap();

        assert_eq!(summary.total, 3);
        assert_eq!(summary.processed, 3);
        assert_eq!(recorder.progress.lock().unwrap().last(), Some(&(3, 3)));
        for id in ["a", "b", "c"] {
            assert_eq!(store.get(id).unwrap().status, JobStatus::Done);
        }
        assert!(matches!(
            store.get("zzz").unwrap().status,
            JobStatus::Error { .. }
        ));
        assert!(fx.media.path().join("backup/a_rus.mp3").exists());
    }

    #[test]
    fn test_encoder_failure_is_a_per_item_error() {
        let fx = fixture(FAILING_FFMPEG, &["movie.mp4"], &[]);
        let store = fx.orchestrator.store().clone();

        let summary = fx
            .orchestrator
            .run_batch(MixSettings::default(), Arc::new(NoopObserver))
            .unwrap();

        assert_eq!(summary.errors, 1);
        match store.get("movie").unwrap().status {
            JobStatus::Error { message } => assert!(message.contains("Invalid data")),
            other => panic!("unexpected status {:?}", other),
        }
        assert!(fx.media.path().join("movie.mp4").exists());
        assert!(!fx.media.path().join("movie_RUS.mkv").exists());
    }

    #[test]
    fn test_stop_marks_running_jobs_stopped() {
        let fx = fixture(SLOW_FFMPEG, &["a.mp4", "b.mp4"], &[]);
        let store = fx.orchestrator.store().clone();

        let handle = fx
            .orchestrator
            .start_batch(MixSettings::default(), Arc::new(NoopObserver))
            .unwrap();
        assert!(matches!(
            fx.orchestrator
                .start_batch(MixSettings::default(), Arc::new(NoopObserver)),
            Err(AppError::BatchRunning)
        ));

        let deadline = Instant::now() + Duration::from_secs(10);
        while store.counts().processing < 2 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(20));
        }
        assert_eq!(store.counts().processing, 2);

        let stopped_at = Instant::now();
        fx.orchestrator.stop();
        let summary = handle.join().unwrap();

        assert!(stopped_at.elapsed() < Duration::from_secs(10));
        assert!(summary.cancelled);
        assert_eq!(summary.stopped, 2);
        assert_eq!(summary.done, 0);
        assert_eq!(store.counts().stopped, 2);
        assert!(!fx.media.path().join("a_RUS.mkv").exists());
        assert!(!fx.orchestrator.is_running());

        // Stopped pairs are picked up again by the next batch
        assert_eq!(store.schedule(&FfmpegInspector::new("/nonexistent")).len(), 2);
    }

    #[test]
    fn test_stop_never_starts_queued_jobs() {
        let mut fx = fixture(HOLDING_FFMPEG, &["a.mp4", "b.mp4", "c.mp4"], &[]);
        fx.orchestrator.config.performance.workers = Some(1);
        fs::write(beside_ffmpeg(&fx, "hold"), b"").unwrap();
        let store = fx.orchestrator.store().clone();

        let handle = fx
            .orchestrator
            .start_batch(MixSettings::default(), Arc::new(NoopObserver))
            .unwrap();
        wait_for(|| mixing_runs(&fx) == 1 && store.counts().processing == 1);

        fx.orchestrator.stop();
        let summary = handle.join().unwrap();

        assert!(summary.cancelled);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.processed, 3);
        assert_eq!(summary.stopped, 3);
        assert_eq!(store.counts().stopped, 3);
        assert_eq!(mixing_runs(&fx), 1);
    }

    #[test]
    fn test_failed_commit_is_a_per_item_error() {
        let fx = fixture(FAKE_FFMPEG, &["movie.mp4"], &[]);
        let media = fx.media.path();
        fs::create_dir(media.join("movie_RUS.mkv")).unwrap();
        fs::write(media.join("movie_RUS.mkv").join("keep"), b"x").unwrap();
        let store = fx.orchestrator.store().clone();

        let summary = fx
            .orchestrator
            .run_batch(MixSettings::default(), Arc::new(NoopObserver))
            .unwrap();

        assert_eq!(summary.errors, 1);
        assert_eq!(summary.done, 0);
        match store.get("movie").unwrap().status {
            JobStatus::Error { message } => assert!(message.contains("Failed to move")),
            other => panic!("unexpected status {:?}", other),
        }
        assert!(media.join("movie.mp4").exists());
        assert!(!media.join("backup").join("movie.mp4").exists());
        assert!(!media.join("temp").join("movie_RUS.mkv").exists());
    }

    #[test]
    fn test_clean_batch_removes_temp_left_by_stopped_batch() {
        let fx = fixture(HOLDING_FFMPEG, &["movie.mp4"], &[]);
        let hold = beside_ffmpeg(&fx, "hold");
        fs::write(&hold, b"").unwrap();
        let temp = fx.media.path().join("temp");

        let handle = fx
            .orchestrator
            .start_batch(MixSettings::default(), Arc::new(NoopObserver))
            .unwrap();
        wait_for(|| mixing_runs(&fx) == 1);
        fx.orchestrator.stop();
        let stopped = handle.join().unwrap();
        assert!(stopped.cancelled);
        assert!(temp.is_dir());

        fs::remove_file(&hold).unwrap();
        let summary = fx
            .orchestrator
            .run_batch(MixSettings::default(), Arc::new(NoopObserver))
            .unwrap();

        assert!(!summary.cancelled);
        assert_eq!(summary.done, 1);
        assert!(fx.media.path().join("movie_RUS.mkv").exists());
        assert!(!temp.exists());
    }

    #[test]
    fn test_clean_batch_removes_existing_temp_dir() {
        let fx = fixture(FAKE_FFMPEG, &["movie.mp4"], &[]);
        let temp = fx.media.path().join("temp");
        fs::create_dir(&temp).unwrap();

        let summary = fx
            .orchestrator
            .run_batch(MixSettings::default(), Arc::new(NoopObserver))
            .unwrap();

        assert_eq!(summary.done, 1);
        assert!(!temp.exists());
    }
}

use super::registry::{ProcessRegistry, lock_child};
use crate::utils::process::{TAIL_LINES, spawn_line_reader, terminate};
use regex::Regex;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::LazyLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

static PROGRESS_TIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"time=(\d+):(\d+):(\d+(?:\.\d+)?)").expect("valid progress time regex")
});

/// Progress callback type, receiving a percentage
pub type ProgressCallback = Box<dyn FnMut(f32) + Send>;

/// Encoding result
#[derive(Debug, PartialEq)]
pub enum EncodeResult {
    /// Encoder exited cleanly
    Success,
    /// Cancellation observed while running
    Cancelled,
    /// Encoder could not start or failed
    Error(String),
}

/// One encoder invocation
#[derive(Debug, Clone)]
pub struct EncodeRequest {
    pub job_id: Uuid,
    pub program: PathBuf,
    pub args: Vec<String>,
    /// Input duration in seconds, used to turn `time=` into a percentage
    pub duration: f64,
    pub poll_interval: Duration,
    pub terminate_grace: Duration,
}

/// Run the encoder, polling for exit and cancellation.
///
/// Diagnostic output is drained by a reader thread that reports progress.
/// The child is registered in `registry` while it runs so a stop request can
/// terminate it from outside.
pub fn run_encoder(
    request: &EncodeRequest,
    registry: &ProcessRegistry,
    cancel_flag: &AtomicBool,
    mut progress_callback: ProgressCallback,
) -> EncodeResult {
    info!(
        "Encoding with {} {}",
        request.program.display(),
        request.args.join(" ")
    );

    let mut child = match Command::new(&request.program)
        .args(&request.args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
    {
        Ok(c) => c,
        Err(e) => return EncodeResult::Error(format!("Failed to start ffmpeg: {}", e)),
    };

    let duration = request.duration;
    let reader = child.stderr.take().map(|stderr| {
        spawn_line_reader(stderr, TAIL_LINES, move |line| {
            debug!("ffmpeg: {}", line);
            if let Some(secs) = parse_progress_time(line) {
                progress_callback(progress_percent(secs, duration));
            }
        })
    });

    let child = registry.register(request.job_id, child);

    let status = loop {
        if cancel_flag.load(Ordering::Relaxed) {
            terminate(&mut lock_child(&child), request.terminate_grace);
            registry.unregister(&request.job_id);
            return EncodeResult::Cancelled;
        }

        let polled = lock_child(&child).try_wait();
        match polled {
            Ok(Some(status)) => break status,
            Ok(None) => thread::sleep(request.poll_interval),
            Err(e) => {
                terminate(&mut lock_child(&child), request.terminate_grace);
                registry.unregister(&request.job_id);
                return EncodeResult::Error(format!("Failed to check ffmpeg status: {}", e));
            }
        }
    };
    registry.unregister(&request.job_id);

    if cancel_flag.load(Ordering::Relaxed) {
        return EncodeResult::Cancelled;
    }

    if !status.success() {
        let tail = reader
            .and_then(|r| r.join().ok())
            .unwrap_or_default();
        let error_msg = if tail.is_empty() {
            format!("ffmpeg failed with status: {}", status)
        } else {
            format!("ffmpeg failed ({}): {}", status, tail.join("\n"))
        };
        return EncodeResult::Error(error_msg);
    }

    EncodeResult::Success
}

/// Extract the `time=HH:MM:SS.ff` position from a progress line, in seconds
pub fn parse_progress_time(line: &str) -> Option<f64> {
    let caps = PROGRESS_TIME.captures(line)?;
    let hours: f64 = caps.get(1)?.as_str().parse().ok()?;
    let minutes: f64 = caps.get(2)?.as_str().parse().ok()?;
    let seconds: f64 = caps.get(3)?.as_str().parse().ok()?;
    Some(hours * 3600.0 + minutes * 60.0 + seconds)
}

/// Position relative to duration, clamped to [0, 100]
pub fn progress_percent(position: f64, duration: f64) -> f32 {
    if duration <= 0.0 {
        return 0.0;
    }
    ((position / duration) * 100.0).clamp(0.0, 100.0) as f32
}

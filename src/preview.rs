//! Short mixed-audio previews.
//!
//! The encoder writes the first seconds of the mix as WAV to its stdout, which
//! is connected straight to the player's stdin. Only one preview plays at a
//! time.

use crate::config::{AppConfig, MixSettings};
use crate::encoder::{MixParams, build_player_args, build_preview_args};
use crate::error::AppError;
use crate::pairing::FilePair;
use crate::utils::process::terminate;
use std::process::{Child, Command, Stdio};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

/// Identifies one started preview
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreviewHandle {
    pub id: Uuid,
}

struct ActivePreview {
    id: Uuid,
    producer: Child,
    player: Child,
}

pub struct PreviewEngine {
    config: AppConfig,
    active: Mutex<Option<ActivePreview>>,
}

impl PreviewEngine {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            active: Mutex::new(None),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<ActivePreview>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start playing a preview of `pair`, stopping any running one first
    pub fn start(&self, pair: &FilePair, mix: &MixSettings) -> Result<PreviewHandle, AppError> {
        let params = MixParams::for_pair(pair, mix, &self.config)?;

        let mut active = self.lock();
        if let Some(previous) = active.take() {
            self.shutdown(previous);
        }

        let mut producer = Command::new(&self.config.tools.ffmpeg)
            .args(build_preview_args(&params, self.config.preview.duration_secs))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| AppError::Preview(format!("Failed to start ffmpeg: {}", e)))?;

        let Some(audio) = producer.stdout.take() else {
            terminate(&mut producer, self.grace());
            return Err(AppError::Preview("ffmpeg stdout not captured".to_string()));
        };

        let player = match Command::new(&self.config.tools.ffplay)
            .args(build_player_args())
            .stdin(Stdio::from(audio))
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
        {
            Ok(p) => p,
            Err(e) => {
                terminate(&mut producer, self.grace());
                return Err(AppError::Preview(format!("Failed to start ffplay: {}", e)));
            }
        };

        let id = Uuid::new_v4();
        info!("Preview {} started for {}", id, pair.display_name());
        *active = Some(ActivePreview {
            id,
            producer,
            player,
        });
        Ok(PreviewHandle { id })
    }

    /// Stop the preview behind `handle`. Returns false if it is no longer current.
    pub fn stop(&self, handle: &PreviewHandle) -> bool {
        let mut active = self.lock();
        if active.as_ref().is_some_and(|a| a.id == handle.id)
            && let Some(preview) = active.take()
        {
            self.shutdown(preview);
            return true;
        }
        false
    }

    /// Stop whatever preview is playing
    pub fn stop_current(&self) {
        if let Some(preview) = self.lock().take() {
            self.shutdown(preview);
        }
    }

    /// Whether a preview is still playing, reaping it once the player exits
    pub fn is_playing(&self) -> bool {
        let mut active = self.lock();
        let finished = match active.as_mut() {
            None => return false,
            Some(preview) => !matches!(preview.player.try_wait(), Ok(None)),
        };
        if finished && let Some(preview) = active.take() {
            self.shutdown(preview);
        }
        !finished
    }

    /// Block until the preview behind `handle` ends on its own or is stopped
    pub fn wait(&self, handle: &PreviewHandle) {
        loop {
            let current = self.lock().as_ref().is_some_and(|a| a.id == handle.id);
            if !current || !self.is_playing() {
                return;
            }
            thread::sleep(Duration::from_millis(100));
        }
    }

    fn grace(&self) -> Duration {
        self.config.performance.terminate_grace()
    }

    /// Player first, then producer
    fn shutdown(&self, mut preview: ActivePreview) {
        terminate(&mut preview.player, self.grace());
        terminate(&mut preview.producer, self.grace());
        debug!("Preview {} stopped", preview.id);
    }
}

impl Drop for PreviewEngine {
    fn drop(&mut self) {
        self.stop_current();
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::tracks::track;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};
    use std::time::Instant;

    fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, body).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn engine(dir: &Path, player_body: &str) -> PreviewEngine {
        let mut config = AppConfig::default();
        config.tools.ffmpeg = script(dir, "ffmpeg", "#!/bin/sh\nexec sleep 30\n");
        config.tools.ffplay = script(dir, "ffplay", player_body);
        config.performance.terminate_grace_ms = 500;
        PreviewEngine::new(config)
    }

    fn embedded_pair() -> FilePair {
        let mut pair = FilePair::with_video("movie", PathBuf::from("movie.mkv"));
        pair.set_tracks(vec![track(0, "eng", "stereo"), track(1, "rus", "stereo")]);
        pair
    }

    #[test]
    fn test_start_and_stop() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path(), "#!/bin/sh\nexec sleep 30\n");

        let handle = engine.start(&embedded_pair(), &MixSettings::default()).unwrap();
        assert!(engine.is_playing());

        let started = Instant::now();
        assert!(engine.stop(&handle));
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(!engine.is_playing());
        assert!(!engine.stop(&handle));
    }

    #[test]
    fn test_new_preview_replaces_running_one() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path(), "#!/bin/sh\nexec sleep 30\n");

        let first = engine.start(&embedded_pair(), &MixSettings::default()).unwrap();
        let second = engine.start(&embedded_pair(), &MixSettings::default()).unwrap();

        assert_ne!(first, second);
        assert!(!engine.stop(&first));
        assert!(engine.stop(&second));
    }

    #[test]
    fn test_player_exit_ends_preview() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path(), "#!/bin/sh\nexit 0\n");

        let handle = engine.start(&embedded_pair(), &MixSettings::default()).unwrap();
        engine.wait(&handle);
        assert!(!engine.is_playing());
    }

    #[test]
    fn test_pair_without_tracks_cannot_preview() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path(), "#!/bin/sh\nexit 0\n");
        let pair = FilePair::with_video("movie", PathBuf::from("movie.mkv"));

        assert!(matches!(
            engine.start(&pair, &MixSettings::default()),
            Err(AppError::InsufficientAudio(_))
        ));
    }
}

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// What happens to the source files after a successful commit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceDisposition {
    /// Leave sources where they are
    Keep,
    /// Move sources into a backup directory beside them
    Backup,
    /// Delete sources outright
    Delete,
}

impl SourceDisposition {
    /// Removal takes precedence over backup when both are requested
    pub fn from_flags(remove: bool, backup: bool) -> Self {
        match (remove, backup) {
            (true, _) => SourceDisposition::Delete,
            (false, true) => SourceDisposition::Backup,
            (false, false) => SourceDisposition::Keep,
        }
    }
}

/// User-facing processing switches
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingOptions {
    /// Swap which embedded track is treated as original and translation
    pub invert_tracks: bool,
    /// Drop the untouched original track from the output
    pub delete_original_track: bool,
    /// Move sources into `backup/` after success
    pub backup: bool,
    /// Delete sources after success, even when `backup` is set
    pub remove_source: bool,
}

impl Default for ProcessingOptions {
    fn default() -> Self {
        Self {
            invert_tracks: false,
            delete_original_track: false,
            backup: true,
            remove_source: false,
        }
    }
}

impl ProcessingOptions {
    pub fn disposition(&self) -> SourceDisposition {
        SourceDisposition::from_flags(self.remove_source, self.backup)
    }
}

/// Output naming and audio codec settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Appended to the video stem
    pub suffix: String,
    /// Output container extension
    pub container: String,
    /// Staging directory created beside each video
    pub temp_dir_name: String,
    /// Backup directory created beside each source
    pub backup_dir_name: String,
    /// Codec for the mixed track
    pub audio_codec: String,
    /// Bitrate for the mixed track
    pub audio_bitrate: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            suffix: "_RUS".to_string(),
            container: "mkv".to_string(),
            temp_dir_name: "temp".to_string(),
            backup_dir_name: "backup".to_string(),
            audio_codec: "aac".to_string(),
            audio_bitrate: "96k".to_string(),
        }
    }
}

impl OutputConfig {
    /// File name of the output for a given video stem
    pub fn output_file_name(&self, stem: &str) -> String {
        format!("{}{}.{}", stem, self.suffix, self.container)
    }
}

/// External programs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
    pub ffplay: PathBuf,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
            ffplay: PathBuf::from("ffplay"),
        }
    }
}

/// Worker pool and subprocess supervision
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceConfig {
    /// Number of concurrent encoder processes, defaults to the hardware concurrency
    pub workers: Option<usize>,
    /// Interval between exit checks of a running encoder
    pub poll_interval_ms: u64,
    /// Time given to a process to exit after a termination request
    pub terminate_grace_ms: u64,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            workers: None,
            poll_interval_ms: 100,
            terminate_grace_ms: 1000,
        }
    }
}

impl PerformanceConfig {
    pub fn worker_count(&self) -> usize {
        self.workers
            .filter(|&n| n > 0)
            .unwrap_or_else(|| {
                std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(1)
            })
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn terminate_grace(&self) -> Duration {
        Duration::from_millis(self.terminate_grace_ms)
    }
}

/// Preview playback settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewConfig {
    /// Length of the mixed preview in seconds
    pub duration_secs: u32,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self { duration_secs: 30 }
    }
}

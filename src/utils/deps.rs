use crate::config::ToolsConfig;
use std::path::Path;
use std::process::{Command, Stdio};

/// Availability of the external programs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DependencyStatus {
    pub ffmpeg: bool,
    pub ffprobe: bool,
    pub ffplay: bool,
}

impl DependencyStatus {
    /// Check all external programs
    pub fn check(tools: &ToolsConfig) -> Self {
        Self {
            ffmpeg: check_command(&tools.ffmpeg),
            ffprobe: check_command(&tools.ffprobe),
            ffplay: check_command(&tools.ffplay),
        }
    }

    /// Encoder and probe are required for batches
    pub fn can_encode(&self) -> bool {
        self.ffmpeg && self.ffprobe
    }

    /// The player is only needed for previews
    pub fn can_preview(&self) -> bool {
        self.ffmpeg && self.ffplay
    }

    pub fn missing(&self, tools: &ToolsConfig) -> Vec<String> {
        [
            (self.ffmpeg, &tools.ffmpeg),
            (self.ffprobe, &tools.ffprobe),
            (self.ffplay, &tools.ffplay),
        ]
        .into_iter()
        .filter(|(ok, _)| !ok)
        .map(|(_, p)| p.display().to_string())
        .collect()
    }
}

/// Check if a command answers `-version`
fn check_command(cmd: &Path) -> bool {
    Command::new(cmd)
        .arg("-version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok_and(|s| s.success())
}

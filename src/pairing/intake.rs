use crate::config::OutputConfig;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

const VIDEO_EXTENSIONS: [&str; 6] = ["flv", "mp4", "avi", "mov", "mkv", "m4v"];
const AUDIO_EXTENSIONS: [&str; 7] = ["mp3", "wav", "flac", "aac", "m4a", "ac3", "mka"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Video,
    Audio,
}

/// Classify a path by its extension
pub fn classify(path: &Path) -> Option<MediaKind> {
    let ext = path.extension()?.to_str()?.to_lowercase();
    if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
        Some(MediaKind::Video)
    } else if AUDIO_EXTENSIONS.contains(&ext.as_str()) {
        Some(MediaKind::Audio)
    } else {
        None
    }
}

/// Media files found in a set of dropped or selected paths
#[derive(Debug, Default, Clone, PartialEq)]
pub struct MediaScan {
    pub videos: Vec<PathBuf>,
    pub audios: Vec<PathBuf>,
}

impl MediaScan {
    pub fn is_empty(&self) -> bool {
        self.videos.is_empty() && self.audios.is_empty()
    }

    fn push(&mut self, path: PathBuf) {
        match classify(&path) {
            Some(MediaKind::Video) => self.videos.push(path),
            Some(MediaKind::Audio) => self.audios.push(path),
            None => debug!("Ignoring {}", path.display()),
        }
    }
}

/// Collect media files from files and directories.
///
/// Directories are walked recursively, skipping the staging and backup
/// directories and outputs from earlier runs. Explicit file paths are taken
/// as they are.
pub fn collect_media(paths: &[PathBuf], output: &OutputConfig) -> MediaScan {
    let mut scan = MediaScan::default();

    for path in paths {
        if path.is_dir() {
            let walker = WalkDir::new(path)
                .follow_links(true)
                .sort_by_file_name()
                .into_iter()
                .filter_entry(|e| {
                    !(e.file_type().is_dir() && e.depth() > 0 && is_work_dir(e.path(), output))
                });

            for entry in walker.filter_map(|e| e.ok()) {
                if entry.file_type().is_file() && !is_produced_output(entry.path(), output) {
                    scan.push(entry.into_path());
                }
            }
        } else if path.is_file() {
            scan.push(path.clone());
        } else {
            debug!("Skipping missing path {}", path.display());
        }
    }

    scan
}

fn is_work_dir(path: &Path, output: &OutputConfig) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n == output.temp_dir_name || n == output.backup_dir_name)
}

/// Whether a file looks like `<stem><suffix>.<container>` from an earlier run
pub fn is_produced_output(path: &Path, output: &OutputConfig) -> bool {
    let tail = format!("{}.{}", output.suffix, output.container);
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.len() > tail.len() && n.ends_with(&tail))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, b"x").unwrap();
    }

    #[test]
    fn test_classify_by_extension() {
        assert_eq!(classify(Path::new("a.MKV")), Some(MediaKind::Video));
        assert_eq!(classify(Path::new("a.flac")), Some(MediaKind::Audio));
        assert_eq!(classify(Path::new("a.srt")), None);
        assert_eq!(classify(Path::new("noext")), None);
    }

    #[test]
    fn test_walk_skips_work_dirs_and_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("show/ep1.mp4"));
        touch(&root.join("show/ep1_rus.mp3"));
        touch(&root.join("show/ep1_RUS.mkv"));
        touch(&root.join("show/notes.txt"));
        touch(&root.join("show/temp/ep2_RUS.mkv"));
        touch(&root.join("show/backup/ep0.mp4"));

        let scan = collect_media(&[root.to_path_buf()], &OutputConfig::default());
        assert_eq!(scan.videos, vec![root.join("show/ep1.mp4")]);
        assert_eq!(scan.audios, vec![root.join("show/ep1_rus.mp3")]);
    }

    #[test]
    fn test_explicit_files_are_taken_as_given() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("ep1_RUS.mkv");
        touch(&output);

        let scan = collect_media(&[output.clone()], &OutputConfig::default());
        assert_eq!(scan.videos, vec![output]);
    }
}

use crate::config::SourceDisposition;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Handle source files after their output was committed.
///
/// Failures are logged per file and never stop the others. Returns the number
/// of files that were moved or deleted.
pub fn dispose_sources(
    files: &[PathBuf],
    disposition: SourceDisposition,
    backup_dir_name: &str,
) -> usize {
    let mut handled = 0;

    for file in files {
        let result = match disposition {
            SourceDisposition::Keep => continue,
            SourceDisposition::Backup => backup_file(file, backup_dir_name).map(|dest| {
                info!("Moved {} to {}", file.display(), dest.display());
            }),
            SourceDisposition::Delete => std::fs::remove_file(file).map(|_| {
                info!("Deleted {}", file.display());
            }),
        };

        match result {
            Ok(()) => handled += 1,
            Err(e) => warn!("Failed to dispose of {}: {}", file.display(), e),
        }
    }

    handled
}

/// Move `file` into a backup directory beside it, replacing a same-named file there
fn backup_file(file: &Path, backup_dir_name: &str) -> io::Result<PathBuf> {
    let parent = file.parent().unwrap_or(Path::new("."));
    let name = file
        .file_name()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"))?;

    let backup_dir = parent.join(backup_dir_name);
    std::fs::create_dir_all(&backup_dir)?;

    let dest = backup_dir.join(name);
    if dest.exists() {
        std::fs::remove_file(&dest)?;
    }
    std::fs::rename(file, &dest)?;
    Ok(dest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_backup_moves_and_replaces() {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("movie.mp4");
        let audio = dir.path().join("movie_rus.mp3");
        fs::write(&video, b"video").unwrap();
        fs::write(&audio, b"audio").unwrap();
        fs::create_dir(dir.path().join("backup")).unwrap();
        fs::write(dir.path().join("backup/movie.mp4"), b"stale").unwrap();

        let handled = dispose_sources(
            &[video.clone(), audio.clone()],
            SourceDisposition::Backup,
            "backup",
        );

        assert_eq!(handled, 2);
        assert!(!video.exists());
        assert!(!audio.exists());
        assert_eq!(fs::read(dir.path().join("backup/movie.mp4")).unwrap(), b"video");
        assert!(dir.path().join("backup/movie_rus.mp3").exists());
    }

    #[test]
    fn test_delete_and_keep() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("movie.mp4");
        fs::write(&file, b"video").unwrap();

        assert_eq!(dispose_sources(&[file.clone()], SourceDisposition::Keep, "backup"), 0);
        assert!(file.exists());

        assert_eq!(dispose_sources(&[file.clone()], SourceDisposition::Delete, "backup"), 1);
        assert!(!file.exists());
    }

    #[test]
    fn test_failures_do_not_stop_other_files() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("gone.mp4");
        let present = dir.path().join("here.mp3");
        fs::write(&present, b"audio").unwrap();

        let handled = dispose_sources(&[missing, present.clone()], SourceDisposition::Delete, "backup");
        assert_eq!(handled, 1);
        assert!(!present.exists());
    }
}

use crate::config::OutputConfig;
use crate::error::AppError;
use crate::pairing::FilePair;
use serde::Serialize;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Status of a pair in the working set
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum JobStatus {
    /// Has enough material, waiting for a batch
    Pending,
    /// Encoder running
    Processing { progress: f32 },
    /// Output committed
    Done,
    /// Failed, or never had enough material
    Error { message: String },
    /// Cancelled by a stop request
    Stopped,
}

impl JobStatus {
    pub fn error(message: impl Into<String>) -> Self {
        JobStatus::Error {
            message: message.into(),
        }
    }

    /// Whether a batch start should pick this status up again
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            JobStatus::Pending | JobStatus::Stopped | JobStatus::Error { .. }
        )
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            JobStatus::Pending => "🕒",
            JobStatus::Processing { .. } => "⏳",
            JobStatus::Done => "✓",
            JobStatus::Error { .. } => "✗",
            JobStatus::Stopped => "⏹",
        }
    }

    pub fn label(&self) -> String {
        match self {
            JobStatus::Pending => "Pending".to_string(),
            JobStatus::Processing { progress } => format!("{:.1}%", progress),
            JobStatus::Done => "Done".to_string(),
            JobStatus::Error { message } => format!("Error: {}", message),
            JobStatus::Stopped => "Stopped".to_string(),
        }
    }
}

/// Where the translation audio comes from
#[derive(Debug, Clone, PartialEq)]
pub enum AudioSource {
    /// A separate audio file
    External(PathBuf),
    /// Two tracks inside the video, resolved again right before encoding
    Embedded,
}

/// One unit of work, owned by the worker running it
#[derive(Debug, Clone)]
pub struct EncodeJob {
    pub id: Uuid,
    pub identity: String,
    pub video: PathBuf,
    pub source: AudioSource,
    pub temp_dir: PathBuf,
    pub temp_output: PathBuf,
    pub final_output: PathBuf,
}

impl EncodeJob {
    /// Build a job for a pair, staging the output under the temp directory
    /// beside the video
    pub fn for_pair(pair: &FilePair, output: &OutputConfig) -> Result<Self, AppError> {
        let video = pair.video.clone().ok_or(AppError::NoVideo)?;
        let source = match &pair.audio {
            Some(audio) => AudioSource::External(audio.clone()),
            None => AudioSource::Embedded,
        };

        let stem = video.file_stem().unwrap_or_default().to_string_lossy();
        let file_name = output.output_file_name(&stem);
        let parent = video.parent().unwrap_or(Path::new(".")).to_path_buf();
        let temp_dir = parent.join(&output.temp_dir_name);

        Ok(Self {
            id: Uuid::new_v4(),
            identity: pair.identity.clone(),
            temp_output: temp_dir.join(&file_name),
            final_output: parent.join(&file_name),
            temp_dir,
            video,
            source,
        })
    }

    /// Source files handed to the post-processor after a commit
    pub fn source_files(&self) -> Vec<PathBuf> {
        let mut files = vec![self.video.clone()];
        if let AudioSource::External(audio) = &self.source {
            files.push(audio.clone());
        }
        files
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_paths_for_embedded_pair() {
        let pair = FilePair::with_video("movie", PathBuf::from("/films/movie.mp4"));
        let job = EncodeJob::for_pair(&pair, &OutputConfig::default()).unwrap();

        assert_eq!(job.source, AudioSource::Embedded);
        assert_eq!(job.temp_dir, PathBuf::from("/films/temp"));
        assert_eq!(job.temp_output, PathBuf::from("/films/temp/movie_RUS.mkv"));
        assert_eq!(job.final_output, PathBuf::from("/films/movie_RUS.mkv"));
        assert_eq!(job.source_files(), vec![PathBuf::from("/films/movie.mp4")]);
    }

    #[test]
    fn test_job_for_external_audio_lists_both_sources() {
        let mut pair = FilePair::with_video("movie", PathBuf::from("/films/movie.mp4"));
        pair.set_audio(PathBuf::from("/films/movie_rus.mp3"));
        let job = EncodeJob::for_pair(&pair, &OutputConfig::default()).unwrap();

        assert_eq!(
            job.source,
            AudioSource::External(PathBuf::from("/films/movie_rus.mp3"))
        );
        assert_eq!(job.source_files().len(), 2);
    }

    #[test]
    fn test_audio_only_pair_has_no_job() {
        let pair = FilePair::with_audio("movie", PathBuf::from("/films/movie.mp3"));
        assert!(matches!(
            EncodeJob::for_pair(&pair, &OutputConfig::default()),
            Err(AppError::NoVideo)
        ));
    }

    #[test]
    fn test_retry_rule() {
        assert!(JobStatus::Stopped.is_retryable());
        assert!(JobStatus::error("boom").is_retryable());
        assert!(!JobStatus::Done.is_retryable());
        assert!(!JobStatus::Processing { progress: 3.0 }.is_retryable());
    }
}

use crate::analyzer::TrackProbe;
use crate::queue::JobStatus;
use crate::tracks::{self, AudioTrack, TrackRoles};
use serde::Serialize;
use std::path::PathBuf;

/// A video matched with its translation audio
#[derive(Debug, Clone, Serialize)]
pub struct FilePair {
    pub identity: String,
    pub video: Option<PathBuf>,
    pub audio: Option<PathBuf>,
    tracks: Option<Vec<AudioTrack>>,
    pub status: JobStatus,
}

impl FilePair {
    pub fn with_video(identity: impl Into<String>, video: PathBuf) -> Self {
        Self {
            identity: identity.into(),
            video: Some(video),
            audio: None,
            tracks: None,
            status: JobStatus::Pending,
        }
    }

    pub fn with_audio(identity: impl Into<String>, audio: PathBuf) -> Self {
        Self {
            identity: identity.into(),
            video: None,
            audio: Some(audio),
            tracks: None,
            status: JobStatus::Pending,
        }
    }

    /// Replace the video, dropping the cached track list
    pub fn set_video(&mut self, video: PathBuf) {
        if self.video.as_ref() != Some(&video) {
            self.tracks = None;
        }
        self.video = Some(video);
    }

    pub fn set_audio(&mut self, audio: PathBuf) {
        self.audio = Some(audio);
    }

    pub fn tracks(&self) -> Option<&[AudioTrack]> {
        self.tracks.as_deref()
    }

    pub fn set_tracks(&mut self, tracks: Vec<AudioTrack>) {
        self.tracks = Some(tracks);
    }

    /// Enough material to mix: a video plus external audio or two embedded tracks
    pub fn has_usable_audio(&self) -> bool {
        self.video.is_some()
            && (self.audio.is_some() || self.tracks.as_ref().is_some_and(|t| t.len() >= 2))
    }

    /// Inspect embedded tracks if needed and derive the initial status
    pub fn evaluate(&mut self, probe: &dyn TrackProbe) {
        self.status = match &self.video {
            None => JobStatus::error("No video file"),
            Some(video) => {
                if self.audio.is_none() && self.tracks.is_none() {
                    let (_, tracks) = probe.inspect(video);
                    self.tracks = Some(tracks);
                }
                if self.has_usable_audio() {
                    JobStatus::Pending
                } else {
                    JobStatus::error("Not enough audio tracks")
                }
            }
        };
    }

    pub fn progress_percent(&self) -> f32 {
        match self.status {
            JobStatus::Processing { progress } => progress,
            JobStatus::Done => 100.0,
            _ => 0.0,
        }
    }

    /// Roles of the embedded tracks, when mixing from the video alone
    pub fn embedded_roles(&self, invert: bool) -> Option<TrackRoles> {
        if self.audio.is_some() {
            return None;
        }
        TrackRoles::select(self.tracks.as_deref()?, invert)
    }

    pub fn track_summary(&self) -> String {
        match (&self.audio, &self.tracks) {
            (Some(_), _) => "external".to_string(),
            (None, Some(tracks)) if !tracks.is_empty() => tracks::summarize(tracks),
            _ => "-".to_string(),
        }
    }

    /// File name shown for the pair
    pub fn display_name(&self) -> String {
        self.video
            .as_ref()
            .or(self.audio.as_ref())
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.identity.clone())
    }

    pub fn audio_name(&self) -> String {
        self.audio
            .as_ref()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}

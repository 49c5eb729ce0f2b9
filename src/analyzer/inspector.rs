use crate::tracks::AudioTrack;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::LazyLock;
use tracing::{debug, warn};

static STREAM_INDEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#\d+:(\d+)").expect("valid stream index regex"));
static LANGUAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(([a-z]{3})\)").expect("valid language regex"));

/// Something that can list the audio streams of a video file
pub trait TrackProbe: Send + Sync {
    /// Returns the number of audio streams and their descriptors.
    /// Failures yield `(0, [])`.
    fn inspect(&self, video: &Path) -> (usize, Vec<AudioTrack>);
}

/// Inspector running the encoder with an input and no output, reading the
/// stream declarations it prints before complaining about the missing output
#[derive(Debug, Clone)]
pub struct FfmpegInspector {
    program: PathBuf,
}

impl FfmpegInspector {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl TrackProbe for FfmpegInspector {
    fn inspect(&self, video: &Path) -> (usize, Vec<AudioTrack>) {
        let output = match Command::new(&self.program)
            .arg("-hide_banner")
            .arg("-i")
            .arg(video)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
        {
            Ok(o) => o,
            Err(e) => {
                warn!(
                    "Failed to run {} for {}: {}",
                    self.program.display(),
                    video.display(),
                    e
                );
                return (0, Vec::new());
            }
        };

        // Exit status is always non-zero here since no output is given
        let text = String::from_utf8_lossy(&output.stderr);
        let tracks = parse_audio_streams(&text);
        debug!("{}: {} audio stream(s)", video.display(), tracks.len());
        (tracks.len(), tracks)
    }
}

/// Parse audio stream declarations out of the encoder's diagnostic text
pub fn parse_audio_streams(text: &str) -> Vec<AudioTrack> {
    let mut tracks = Vec::new();

    for line in text.lines() {
        if !line.contains("Stream #") {
            continue;
        }
        let Some(audio_pos) = line.find("Audio:") else {
            continue;
        };

        let Some(stream_index) = STREAM_INDEX
            .captures(line)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse::<usize>().ok())
        else {
            continue;
        };

        let language = LANGUAGE
            .captures(&line[..audio_pos])
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
            .unwrap_or_else(|| "und".to_string());

        let channel_layout = line
            .split(',')
            .nth(2)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or("unknown")
            .to_string();

        tracks.push(AudioTrack {
            stream_index,
            audio_index: tracks.len(),
            language,
            channel_layout,
            raw_description: line.trim().to_string(),
        });
    }

    tracks
}

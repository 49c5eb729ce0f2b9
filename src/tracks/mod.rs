pub mod selection;

pub use selection::{TrackRole, TrackRoles};

use serde::Serialize;

/// Audio stream declared inside a video container
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AudioTrack {
    /// Index of the stream within the container
    pub stream_index: usize,
    /// 0-based index among audio streams only, as used by `0:a:N` selectors
    pub audio_index: usize,
    /// 3-letter language code, `und` when not declared
    pub language: String,
    /// Channel layout as reported by the probe, `unknown` when absent
    pub channel_layout: String,
    /// The full probe line the track was parsed from
    pub raw_description: String,
}

impl AudioTrack {
    pub fn is_mono(&self) -> bool {
        self.channel_layout.trim().eq_ignore_ascii_case("mono")
    }

    pub fn display_name(&self) -> String {
        format!(
            "#{}: {} ({})",
            self.stream_index,
            self.language.to_uppercase(),
            self.channel_layout
        )
    }
}

/// Compact listing of stream indices and languages such as `1:ENG, 2:RUS`
pub fn summarize(tracks: &[AudioTrack]) -> String {
    tracks
        .iter()
        .map(|t| format!("{}:{}", t.stream_index, t.language.to_uppercase()))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
pub(crate) fn track(audio_index: usize, language: &str, layout: &str) -> AudioTrack {
    AudioTrack {
        stream_index: audio_index + 1,
        audio_index,
        language: language.to_string(),
        channel_layout: layout.to_string(),
        raw_description: String::new(),
    }
}

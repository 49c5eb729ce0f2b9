use crate::config::{AppConfig, MixSettings};
use crate::error::AppError;
use crate::pairing::FilePair;
use crate::tracks::{AudioTrack, TrackRoles};
use std::path::{Path, PathBuf};

/// Where the two mixed streams come from
#[derive(Debug, Clone, PartialEq)]
pub enum MixInput {
    /// First audio track of the video mixed with a separate audio file
    External { audio: PathBuf },
    /// Two audio tracks of the video mixed with each other
    Embedded { roles: TrackRoles },
}

/// Everything needed to build a mix command line
#[derive(Debug, Clone)]
pub struct MixParams {
    pub video: PathBuf,
    pub input: MixInput,
    pub mix: MixSettings,
    pub audio_codec: String,
    pub audio_bitrate: String,
}

impl MixParams {
    /// Params for a pair, using its cached tracks for embedded mixes
    pub fn for_pair(pair: &FilePair, mix: &MixSettings, config: &AppConfig) -> Result<Self, AppError> {
        let video = pair.video.clone().ok_or(AppError::NoVideo)?;
        let input = match &pair.audio {
            Some(audio) => MixInput::External {
                audio: audio.clone(),
            },
            None => {
                let tracks = pair.tracks().unwrap_or_default();
                Self::embedded_input(tracks, mix.invert_tracks)?
            }
        };
        Ok(Self::new(video, input, mix, config))
    }

    pub fn new(video: PathBuf, input: MixInput, mix: &MixSettings, config: &AppConfig) -> Self {
        Self {
            video,
            input,
            mix: mix.clone(),
            audio_codec: config.output.audio_codec.clone(),
            audio_bitrate: config.output.audio_bitrate.clone(),
        }
    }

    /// Pick the two embedded tracks, failing when fewer than two exist
    pub fn embedded_input(tracks: &[AudioTrack], invert: bool) -> Result<MixInput, AppError> {
        TrackRoles::select(tracks, invert)
            .map(|roles| MixInput::Embedded { roles })
            .ok_or_else(|| {
                AppError::InsufficientAudio(format!(
                    "{} audio track(s) found, 2 needed",
                    tracks.len()
                ))
            })
    }

    /// Audio selector of the untouched original track
    fn original_selector(&self) -> String {
        match &self.input {
            MixInput::External { .. } => "0:a:0".to_string(),
            MixInput::Embedded { roles } => format!("0:a:{}", roles.original.audio_index),
        }
    }
}

/// Build the `-filter_complex` graph producing `[a_mix]`
pub fn build_filter_graph(params: &MixParams) -> String {
    let original_gain = params.mix.original_gain();
    let translation_gain = params.mix.translation_gain();

    let (first, second) = match &params.input {
        MixInput::External { .. } => (
            format!("[0:a:0]volume={}[a0]", original_gain),
            format!("[1:a:0]volume={}[a1]", translation_gain),
        ),
        MixInput::Embedded { roles } => (
            track_chain(&roles.original, original_gain, "a0"),
            track_chain(&roles.translation, translation_gain, "a1"),
        ),
    };

    format!(
        "{};{};[a0][a1]amix=inputs=2:duration=shortest:dropout_transition=2[a_mix]",
        first, second
    )
}

/// Gain chain for one embedded track, upmixing mono to stereo first
fn track_chain(track: &AudioTrack, gain: f64, label: &str) -> String {
    let upmix = if track.is_mono() {
        "pan=stereo|c0=c0|c1=c0,"
    } else {
        ""
    };
    format!(
        "[0:a:{}]{}volume={}[{}]",
        track.audio_index, upmix, gain, label
    )
}

fn input_args(params: &MixParams) -> Vec<String> {
    let mut args = vec!["-i".to_string(), params.video.to_string_lossy().to_string()];
    if let MixInput::External { audio } = &params.input {
        args.extend(["-i".to_string(), audio.to_string_lossy().to_string()]);
    }
    args
}

/// Build FFmpeg arguments for the full mix into `output`
pub fn build_ffmpeg_args(params: &MixParams, output: &Path) -> Vec<String> {
    let mut args = vec![
        "-y".to_string(),
        "-hide_banner".to_string(),
        "-nostdin".to_string(),
    ];
    args.extend(input_args(params));

    args.extend([
        "-filter_complex".to_string(),
        build_filter_graph(params),
        "-map".to_string(),
        "0:v:0".to_string(),
        "-map".to_string(),
        "[a_mix]".to_string(),
    ]);

    let keep_original = params.mix.keep_original_track;
    if keep_original {
        args.extend(["-map".to_string(), params.original_selector()]);
    }

    args.extend(["-c:v".to_string(), "copy".to_string()]);

    // Stream specifiers only when a second audio stream is present
    let (codec_flag, bitrate_flag) = if keep_original {
        ("-c:a:0", "-b:a:0")
    } else {
        ("-c:a", "-b:a")
    };
    args.extend([codec_flag.to_string(), params.audio_codec.clone()]);
    if params.audio_codec == "aac" {
        args.extend(["-aac_coder".to_string(), "twoloop".to_string()]);
    }
    args.extend([bitrate_flag.to_string(), params.audio_bitrate.clone()]);
    if keep_original {
        args.extend(["-c:a:1".to_string(), "copy".to_string()]);
    }

    args.push(output.to_string_lossy().to_string());
    args
}

/// Build FFmpeg arguments writing the first `duration_secs` of the mix as WAV to stdout
pub fn build_preview_args(params: &MixParams, duration_secs: u32) -> Vec<String> {
    let mut args = vec![
        "-hide_banner".to_string(),
        "-nostdin".to_string(),
        "-loglevel".to_string(),
        "error".to_string(),
    ];
    args.extend(input_args(params));
    args.extend([
        "-filter_complex".to_string(),
        build_filter_graph(params),
        "-map".to_string(),
        "[a_mix]".to_string(),
        "-t".to_string(),
        duration_secs.to_string(),
        "-f".to_string(),
        "wav".to_string(),
        "-".to_string(),
    ]);
    args
}

/// Build player arguments reading audio from stdin without a window
pub fn build_player_args() -> Vec<String> {
    ["-nodisp", "-autoexit", "-loglevel", "quiet", "-"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

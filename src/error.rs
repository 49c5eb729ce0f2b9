use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Probe failed: {0}")]
    Probe(String),

    #[error("Encoder failed: {0}")]
    Encode(String),

    #[error("Not enough audio to mix: {0}")]
    InsufficientAudio(String),

    #[error("No video file to encode")]
    NoVideo,

    #[error("Failed to move {} to {}: {source}", .from.display(), .to.display())]
    Commit {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Not enough disk space in {} ({required} bytes needed)", .dir.display())]
    DiskSpace { dir: PathBuf, required: u64 },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Preview error: {0}")]
    Preview(String),

    #[error("A batch is already running")]
    BatchRunning,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    TomlDe(#[from] toml::de::Error),

    #[error(transparent)]
    TomlSer(#[from] toml::ser::Error),
}

pub mod ffprobe;
pub mod inspector;

pub use ffprobe::probe_duration;
pub use inspector::{FfmpegInspector, TrackProbe};

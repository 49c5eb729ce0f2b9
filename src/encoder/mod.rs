pub mod command_builder;
pub mod ffmpeg;
pub mod registry;

pub use command_builder::{
    MixInput, MixParams, build_ffmpeg_args, build_player_args, build_preview_args,
};
pub use ffmpeg::{EncodeRequest, EncodeResult, run_encoder};
pub use registry::ProcessRegistry;

//! Video encoder sinks

pub mod ffmpeg;
pub mod traits;

pub use ffmpeg::FfmpegEncoder;
pub use traits::{
    even_dimension, CodecConfig, EncoderSession, EncoderStatus, FinishCallback, PixelBuffer,
    VideoCodec, VideoEncoder,
};

pub mod backend;
pub mod pipeline;

pub use backend::{AudioBlock, AudioCapture, CaptureConfig, RasterFrame, VideoCapture, AUDIO_BLOCK_SIZE};
pub use pipeline::{encode_jpeg, CapturePipeline, StopReason};

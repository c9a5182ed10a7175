pub mod capture;
pub mod channel;
pub mod codec;
pub mod config;
pub mod marker;
pub mod playback;
pub mod session;
pub mod transcript;

pub use capture::{
    AudioBlock, AudioCapture, CaptureConfig, CapturePipeline, RasterFrame, StopReason,
    VideoCapture, AUDIO_BLOCK_SIZE,
};
pub use channel::{
    InboundEvent, LiveTransport, MediaChunk, SessionChannel, SessionState, TransportChannels,
    WsTransport,
};
pub use codec::AudioSegment;
pub use config::Config;
pub use marker::{Marker, MarkerOverlay, Rect, SurfaceGeometry, SurfaceLayout};
pub use playback::{AudioSink, PlaybackScheduler};
pub use session::{AssistSession, SessionConfig, SessionStats};
pub use transcript::{Citation, Speaker, TranscriptEntry, TranscriptLog};

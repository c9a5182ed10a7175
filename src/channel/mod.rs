pub mod channel;
pub mod events;
pub mod transport;
pub mod wire;

pub use channel::{SessionChannel, SessionState};
pub use events::{InboundEvent, MediaChunk};
pub use transport::{LiveTransport, TransportChannels, WsTransport, DEFAULT_HOST};

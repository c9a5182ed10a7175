// Live session transport
//
// A transport turns a configured setup message into a pair of channels:
// one carrying client messages out, one carrying parsed server messages
// back. The production implementation speaks the service's websocket
// protocol; tests substitute an in-memory transport.

use super::wire::{ClientMessage, ServerMessage};
use anyhow::{ensure, Context, Result};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{error, info, warn};

/// Default live API host.
pub const DEFAULT_HOST: &str = "generativelanguage.googleapis.com";

const CHANNEL_CAPACITY: usize = 256;

/// Channel pair produced by a resolved connection.
pub struct TransportChannels {
    /// Outbound client messages; dropping all senders closes the connection
    pub outbound: mpsc::Sender<ClientMessage>,
    /// Inbound server messages; ends when the connection does
    pub inbound: mpsc::Receiver<ServerMessage>,
}

/// Establishes one bidirectional session to the inference service.
#[async_trait::async_trait]
pub trait LiveTransport: Send {
    /// Open the connection and deliver the setup message. Resolves once
    /// the session is ready to carry realtime input.
    async fn connect(&mut self, setup: ClientMessage) -> Result<TransportChannels>;
}

/// Websocket transport for the hosted live API.
pub struct WsTransport {
    endpoint: String,
}

impl WsTransport {
    /// Build a transport for the given host and credential. Fails fast
    /// when no credential is supplied.
    pub fn new(host: &str, api_key: &str) -> Result<Self> {
        ensure!(!api_key.is_empty(), "API key is required to open a live session");
        Ok(Self {
            endpoint: format!(
                "wss://{}/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent?key={}",
                host, api_key
            ),
        })
    }
}

#[async_trait::async_trait]
impl LiveTransport for WsTransport {
    async fn connect(&mut self, setup: ClientMessage) -> Result<TransportChannels> {
        info!("Connecting to live API");

        let (socket, _response) = connect_async(&self.endpoint)
            .await
            .context("Failed to open live API websocket")?;
        let (mut sink, mut stream) = socket.split();

        let payload = serde_json::to_string(&setup)?;
        sink.send(Message::Text(payload))
            .await
            .context("Failed to send session setup")?;

        info!("Live API connection established");

        let (outbound_tx, mut outbound_rx) = mpsc::channel::<ClientMessage>(CHANNEL_CAPACITY);
        let (inbound_tx, inbound_rx) = mpsc::channel::<ServerMessage>(CHANNEL_CAPACITY);

        // Writer: forward client messages until the sender side is dropped,
        // then close the socket
        tokio::spawn(async move {
            while let Some(message) = outbound_rx.recv().await {
                let text = match serde_json::to_string(&message) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!("Failed to serialize outbound message: {}", e);
                        continue;
                    }
                };
                if let Err(e) = sink.send(Message::Text(text)).await {
                    error!("Live API send failed: {}", e);
                    break;
                }
            }
            if let Err(e) = sink.close().await {
                warn!("Error closing live API socket: {}", e);
            }
        });

        // Reader: parse every frame into a server message; any socket
        // error ends the stream (fail-stop, no reconnection)
        tokio::spawn(async move {
            while let Some(frame) = stream.next().await {
                let bytes = match frame {
                    Ok(Message::Text(text)) => text.into_bytes(),
                    Ok(Message::Binary(bytes)) => bytes,
                    Ok(Message::Close(_)) => {
                        info!("Live API closed the connection");
                        break;
                    }
                    Ok(_) => continue,
                    Err(e) => {
                        error!("Live API receive failed: {}", e);
                        break;
                    }
                };
                match serde_json::from_slice::<ServerMessage>(&bytes) {
                    Ok(message) => {
                        if inbound_tx.send(message).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!("Failed to parse server message: {}", e),
                }
            }
        });

        Ok(TransportChannels {
            outbound: outbound_tx,
            inbound: inbound_rx,
        })
    }
}

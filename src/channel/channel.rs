use super::events::{InboundEvent, MediaChunk};
use super::transport::LiveTransport;
use super::wire::{ClientMessage, FunctionResponse, MediaBlob, RealtimeInput, ToolResponse};
use anyhow::{bail, Result};
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

const QUEUE_CAPACITY: usize = 256;

/// Lifecycle of one live session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No connection attempted yet
    #[default]
    Idle,
    /// Connection establishment in flight; sends are queued
    Connecting,
    /// Connected; media flows both ways
    Active,
    /// Teardown in progress
    Closing,
    /// Terminal: connection released
    Closed,
    /// Terminal-ish: the transport failed; awaiting teardown
    Error,
}

/// Owns the lifecycle of a single persistent bidirectional session.
///
/// One channel covers exactly one user-activated session: there is no
/// reconnection, every transport failure is fail-stop. Media may be sent
/// while the connection is still resolving; queued sends are forwarded
/// once it does.
pub struct SessionChannel {
    state: watch::Sender<SessionState>,
    queue_tx: mpsc::Sender<ClientMessage>,
    events: Mutex<Option<mpsc::Receiver<InboundEvent>>>,
    shutdown_tx: watch::Sender<bool>,
    io_task: Mutex<Option<JoinHandle<()>>>,
}

impl SessionChannel {
    /// Start opening a session. Returns immediately in `Connecting`;
    /// the connection resolves on a background task.
    pub fn open(mut transport: Box<dyn LiveTransport>, setup: ClientMessage) -> Self {
        let (state, _) = watch::channel(SessionState::Connecting);
        let (queue_tx, mut queue_rx) = mpsc::channel::<ClientMessage>(QUEUE_CAPACITY);
        let (event_tx, event_rx) = mpsc::channel::<InboundEvent>(QUEUE_CAPACITY);
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let task_state = state.clone();
        let io_task = tokio::spawn(async move {
            let channels = match transport.connect(setup).await {
                Ok(channels) => channels,
                Err(e) => {
                    error!("Failed to open live session: {:#}", e);
                    task_state.send_replace(SessionState::Error);
                    // Dropping the queue receiver makes subsequent sends
                    // surface the failure to their callers
                    return;
                }
            };

            let mut raced = false;
            task_state.send_modify(|state| {
                if *state == SessionState::Connecting {
                    *state = SessionState::Active;
                } else {
                    // stop() won the race; never go Active
                    raced = true;
                }
            });
            if raced {
                return;
            }
            info!("Live session active");

            let outbound = channels.outbound;
            let mut inbound = channels.inbound;
            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => break,
                    queued = queue_rx.recv() => match queued {
                        Some(message) => {
                            if outbound.send(message).await.is_err() {
                                error!("Live session rejected an outbound message");
                                task_state.send_replace(SessionState::Error);
                                break;
                            }
                        }
                        None => break,
                    },
                    received = inbound.recv() => match received {
                        Some(message) => {
                            if message.setup_complete.is_some() {
                                debug!("Session setup acknowledged");
                            }
                            for event in message.into_events() {
                                if event_tx.send(event).await.is_err() {
                                    return;
                                }
                            }
                        }
                        None => {
                            warn!("Live session closed by the service");
                            task_state.send_replace(SessionState::Error);
                            break;
                        }
                    },
                }
            }
            // Dropping the transport sender here closes the connection;
            // dropping event_tx ends the subscriber's event stream
        });

        Self {
            state,
            queue_tx,
            events: Mutex::new(Some(event_rx)),
            shutdown_tx,
            io_task: Mutex::new(Some(io_task)),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Subscribe to lifecycle state changes.
    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Wait for the connection to resolve.
    ///
    /// Returns once the session is `Active`; errors when it failed to
    /// open or was stopped first.
    pub async fn ready(&self) -> Result<()> {
        let mut state_rx = self.state.subscribe();
        loop {
            match *state_rx.borrow_and_update() {
                SessionState::Active => return Ok(()),
                SessionState::Error => bail!("Live session failed to open"),
                SessionState::Closing | SessionState::Closed => {
                    bail!("Live session was stopped before it opened")
                }
                SessionState::Idle | SessionState::Connecting => {}
            }
            if state_rx.changed().await.is_err() {
                bail!("Live session failed to open");
            }
        }
    }

    /// Take the ordered inbound event stream. Yields `None` after the
    /// first call; there is exactly one subscriber, which fans events out.
    pub async fn take_events(&self) -> Option<mpsc::Receiver<InboundEvent>> {
        self.events.lock().await.take()
    }

    /// Forward one media chunk as a realtime-input message.
    ///
    /// Silently a no-op once teardown has begun; errors when the session
    /// failed to resolve or the transport rejected the send.
    pub async fn send(&self, chunk: MediaChunk) -> Result<()> {
        let message = ClientMessage::RealtimeInput(RealtimeInput {
            media_chunks: vec![MediaBlob {
                mime_type: chunk.mime_type(),
                data: chunk.into_data(),
            }],
        });
        self.send_message(message).await
    }

    /// Acknowledge a tool call. The acknowledgment is enqueued
    /// immediately, independent of any future model output.
    pub async fn send_tool_result(
        &self,
        call_id: &str,
        name: &str,
        response: serde_json::Value,
    ) -> Result<()> {
        let message = ClientMessage::ToolResponse(ToolResponse {
            function_responses: vec![FunctionResponse {
                id: call_id.to_string(),
                name: name.to_string(),
                response,
            }],
        });
        self.send_message(message).await
    }

    async fn send_message(&self, message: ClientMessage) -> Result<()> {
        if self.tearing_down() {
            return Ok(());
        }
        if self.queue_tx.send(message).await.is_err() {
            // Teardown may have started while the send was in flight;
            // late sends stay silent, genuine failures propagate
            if self.tearing_down() {
                return Ok(());
            }
            bail!("Live session is no longer accepting input");
        }
        Ok(())
    }

    fn tearing_down(&self) -> bool {
        matches!(
            *self.state.borrow(),
            SessionState::Closing | SessionState::Closed
        )
    }

    /// Stop the session. Idempotent; awaits a pending connection, closes
    /// the transport, and always ends in `Closed` even when the close
    /// itself fails (logged, never re-thrown).
    pub async fn stop(&self) {
        let mut already_stopped = false;
        self.state.send_modify(|state| {
            if matches!(*state, SessionState::Closing | SessionState::Closed) {
                already_stopped = true;
            } else {
                *state = SessionState::Closing;
            }
        });
        if already_stopped {
            debug!("Session already stopped");
            return;
        }
        info!("Stopping live session");

        let _ = self.shutdown_tx.send(true);
        if let Some(task) = self.io_task.lock().await.take() {
            if let Err(e) = task.await {
                error!("Session task panicked: {}", e);
            }
        }

        self.state.send_replace(SessionState::Closed);
        info!("Live session closed");
    }
}

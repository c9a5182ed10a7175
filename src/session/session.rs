use super::config::SessionConfig;
use super::stats::SessionStats;
use crate::capture::{AudioCapture, CapturePipeline, StopReason, VideoCapture};
use crate::channel::{wire, InboundEvent, LiveTransport, SessionChannel};
use crate::codec;
use crate::marker::{Marker, MarkerOverlay, SurfaceGeometry, SHOW_CLICK_MARKER};
use crate::playback::{AudioSink, PlaybackScheduler};
use crate::transcript::{Citation, TranscriptEntry, TranscriptLog};
use anyhow::{Context, Result};
use chrono::Utc;
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// One user-activated assistant session.
///
/// Owns every piece of mutable session state (transcript log, playback
/// cursor, marker, pending connection) so that sequential sessions are
/// fully independent. Capture backends, the transport and the audio sink
/// are injected: they wrap hardware and network collaborators.
#[derive(Clone)]
pub struct AssistSession {
    config: SessionConfig,

    /// When the session object was created
    started_at: chrono::DateTime<chrono::Utc>,

    /// Whether the session is currently running
    is_active: Arc<AtomicBool>,

    /// Transcript folded from inbound events
    transcript: Arc<Mutex<TranscriptLog>>,

    /// Gapless playback of the model's spoken response
    playback: Arc<PlaybackScheduler>,

    /// On-screen click marker driven by tool calls
    overlay: Arc<MarkerOverlay>,

    /// The live connection, present while started
    channel: Arc<Mutex<Option<Arc<SessionChannel>>>>,

    /// The capture pipeline, present while started
    pipeline: Arc<Mutex<Option<Arc<CapturePipeline>>>>,

    /// Handle for the inbound event dispatch task
    dispatch_task: Arc<Mutex<Option<JoinHandle<()>>>>,

    /// Chunk counters preserved across teardown for final stats
    final_counts: Arc<Mutex<(usize, usize)>>,
}

impl AssistSession {
    pub fn new(
        config: SessionConfig,
        sink: Arc<dyn AudioSink>,
        geometry: Arc<dyn SurfaceGeometry>,
    ) -> Self {
        Self {
            config,
            started_at: Utc::now(),
            is_active: Arc::new(AtomicBool::new(false)),
            transcript: Arc::new(Mutex::new(TranscriptLog::new())),
            playback: Arc::new(PlaybackScheduler::new(sink)),
            overlay: Arc::new(MarkerOverlay::new(geometry)),
            channel: Arc::new(Mutex::new(None)),
            pipeline: Arc::new(Mutex::new(None)),
            dispatch_task: Arc::new(Mutex::new(None)),
            final_counts: Arc::new(Mutex::new((0, 0))),
        }
    }

    /// Start the session: open the live connection, start capture, and
    /// begin dispatching inbound events.
    ///
    /// Capture refusal (permission denied) aborts the start and leaves
    /// nothing running.
    pub async fn start(
        &self,
        transport: Box<dyn LiveTransport>,
        audio: Box<dyn AudioCapture>,
        video: Box<dyn VideoCapture>,
    ) -> Result<()> {
        if self.is_active.swap(true, Ordering::SeqCst) {
            warn!("Session already started");
            return Ok(());
        }

        info!("Starting assistant session: {}", self.config.session_id);

        let setup = wire::setup(&self.config.model, &self.config.system_instruction);
        let channel = Arc::new(SessionChannel::open(transport, setup));
        let mut events = channel
            .take_events()
            .await
            .context("Inbound event stream already taken")?;

        let (stop_tx, mut stop_rx) = mpsc::channel::<StopReason>(4);
        let pipeline = Arc::new(CapturePipeline::new(
            self.config.capture.clone(),
            Arc::clone(&channel),
            stop_tx.clone(),
        ));

        if let Err(e) = pipeline.start(audio, video).await {
            self.is_active.store(false, Ordering::SeqCst);
            channel.stop().await;
            return Err(e);
        }

        *self.channel.lock().await = Some(Arc::clone(&channel));
        *self.pipeline.lock().await = Some(Arc::clone(&pipeline));

        // Inbound dispatch: every event goes to exactly one component, in
        // arrival order
        let transcript = Arc::clone(&self.transcript);
        let playback = Arc::clone(&self.playback);
        let overlay = Arc::clone(&self.overlay);
        let ack_channel = Arc::clone(&channel);
        let is_active = Arc::clone(&self.is_active);
        let output_sample_rate = self.config.output_sample_rate;
        let dispatch_task = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                match event {
                    InboundEvent::TranscriptDelta { source, text } => {
                        transcript.lock().await.apply_delta(source, &text);
                    }
                    InboundEvent::Citation { uri, title } => {
                        transcript.lock().await.apply_citation(Citation { uri, title });
                    }
                    InboundEvent::TurnComplete => {
                        transcript.lock().await.complete_turn();
                    }
                    InboundEvent::AudioChunk { data } => {
                        let decoded = codec::transport_decode(&data).and_then(|bytes| {
                            codec::decode_audio_segment(&bytes, output_sample_rate, 1)
                        });
                        match decoded {
                            Ok(segment) => {
                                playback.schedule(segment).await;
                            }
                            Err(e) => warn!("Dropping undecodable audio chunk: {:#}", e),
                        }
                    }
                    InboundEvent::ToolCall { id, name, args } => {
                        if name == SHOW_CLICK_MARKER {
                            match overlay.handle_call(&args).await {
                                Some(marker) => {
                                    debug!("Marker shown at ({:.0}, {:.0})", marker.x, marker.y)
                                }
                                None => debug!("Tool call had no usable coordinates"),
                            }
                        } else {
                            warn!("Unsupported tool call: {}", name);
                        }
                        // Always acknowledge, even for malformed calls, so
                        // the model's tool-use turn never stalls
                        if let Err(e) = ack_channel
                            .send_tool_result(&id, &name, json!({ "result": "ok, marker shown" }))
                            .await
                        {
                            error!("Failed to acknowledge tool call: {:#}", e);
                        }
                    }
                }
            }
            // Stream end means the transport failed or teardown began;
            // either way the whole session stops
            if is_active.load(Ordering::SeqCst) {
                let _ = stop_tx.send(StopReason::ConnectionLost).await;
            }
        });
        *self.dispatch_task.lock().await = Some(dispatch_task);

        // Fail-stop watchdog: the first stop request tears everything down
        let session = self.clone();
        tokio::spawn(async move {
            if let Some(reason) = stop_rx.recv().await {
                warn!("Stopping session: {}", reason);
                session.stop().await;
            }
        });

        info!("Assistant session started");

        Ok(())
    }

    /// Stop the session and release every acquired resource.
    ///
    /// Idempotent: a second call is a no-op with no duplicated teardown.
    /// Individual teardown failures are logged and never block the
    /// remaining steps.
    pub async fn stop(&self) -> SessionStats {
        if !self.is_active.swap(false, Ordering::SeqCst) {
            debug!("Session not active");
            return self.stats().await;
        }

        info!("Stopping assistant session: {}", self.config.session_id);

        // Capture first, so no new chunks chase the closing connection
        if let Some(pipeline) = self.pipeline.lock().await.take() {
            pipeline.stop().await;
            *self.final_counts.lock().await =
                (pipeline.audio_chunks_sent(), pipeline.image_chunks_sent());
        }

        if let Some(channel) = self.channel.lock().await.take() {
            channel.stop().await;
        }

        // Channel teardown ends the event stream, so dispatch drains and
        // exits on its own
        if let Some(task) = self.dispatch_task.lock().await.take() {
            if let Err(e) = task.await {
                error!("Dispatch task panicked: {}", e);
            }
        }

        self.playback.stop().await;
        self.overlay.clear().await;

        info!("Assistant session stopped");

        self.stats().await
    }

    /// Current session statistics.
    pub async fn stats(&self) -> SessionStats {
        let (audio_chunks_sent, image_chunks_sent) = match &*self.pipeline.lock().await {
            Some(pipeline) => (pipeline.audio_chunks_sent(), pipeline.image_chunks_sent()),
            None => *self.final_counts.lock().await,
        };

        let duration = Utc::now().signed_duration_since(self.started_at);

        SessionStats {
            is_active: self.is_active.load(Ordering::SeqCst),
            started_at: self.started_at,
            duration_secs: duration.num_milliseconds() as f64 / 1000.0,
            audio_chunks_sent,
            image_chunks_sent,
            transcript_entries: self.transcript.lock().await.len(),
        }
    }

    /// Snapshot of the accumulated transcript.
    pub async fn transcript(&self) -> Vec<TranscriptEntry> {
        self.transcript.lock().await.entries().to_vec()
    }

    /// Currently displayed click marker, if any.
    pub async fn current_marker(&self) -> Option<Marker> {
        self.overlay.current().await
    }

    /// The playback scheduler (e.g. to observe scheduling state).
    pub fn playback(&self) -> Arc<PlaybackScheduler> {
        Arc::clone(&self.playback)
    }

    pub fn is_active(&self) -> bool {
        self.is_active.load(Ordering::SeqCst)
    }
}

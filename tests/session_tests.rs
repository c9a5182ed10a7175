// End-to-end session tests: an AssistSession wired to fake capture
// backends, a fake transport, a collecting audio sink and a fixed surface
// layout. Everything the session touches is observable from the test side.

use anyhow::{Context, Result};
use serde_json::json;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep, timeout, Duration};
use witness_live::capture::{AudioBlock, AudioCapture, RasterFrame, VideoCapture, AUDIO_BLOCK_SIZE};
use witness_live::channel::wire::{ClientMessage, ServerMessage};
use witness_live::channel::{LiveTransport, TransportChannels};
use witness_live::codec::{transport_decode, transport_encode, AudioSegment};
use witness_live::marker::{Marker, Rect, SurfaceGeometry, SurfaceLayout};
use witness_live::playback::AudioSink;
use witness_live::session::{AssistSession, SessionConfig};
use witness_live::transcript::Speaker;

/// Test-side view of a resolved fake connection.
struct Link {
    client_rx: mpsc::Receiver<ClientMessage>,
    server_tx: mpsc::Sender<ServerMessage>,
}

struct FakeTransport {
    link_tx: Option<oneshot::Sender<Link>>,
}

impl FakeTransport {
    fn new() -> (Self, oneshot::Receiver<Link>) {
        let (link_tx, link_rx) = oneshot::channel();
        (
            Self {
                link_tx: Some(link_tx),
            },
            link_rx,
        )
    }
}

#[async_trait::async_trait]
impl LiveTransport for FakeTransport {
    async fn connect(&mut self, _setup: ClientMessage) -> Result<TransportChannels> {
        let (outbound_tx, outbound_rx) = mpsc::channel(64);
        let (inbound_tx, inbound_rx) = mpsc::channel(64);
        if let Some(link_tx) = self.link_tx.take() {
            let _ = link_tx.send(Link {
                client_rx: outbound_rx,
                server_tx: inbound_tx,
            });
        }
        Ok(TransportChannels {
            outbound: outbound_tx,
            inbound: inbound_rx,
        })
    }
}

/// Microphone fed by the test through an mpsc sender.
struct ScriptedMic {
    blocks: Option<mpsc::Receiver<AudioBlock>>,
}

impl ScriptedMic {
    fn new() -> (mpsc::Sender<AudioBlock>, Self) {
        let (tx, rx) = mpsc::channel(16);
        (tx, Self { blocks: Some(rx) })
    }
}

#[async_trait::async_trait]
impl AudioCapture for ScriptedMic {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioBlock>> {
        self.blocks.take().context("microphone already started")
    }

    async fn stop(&mut self) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        "scripted-mic"
    }
}

/// Microphone whose permission prompt was declined.
struct DeniedMic;

#[async_trait::async_trait]
impl AudioCapture for DeniedMic {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioBlock>> {
        anyhow::bail!("microphone permission denied")
    }

    async fn stop(&mut self) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        "denied-mic"
    }
}

/// Screen that always returns the same frame (or none at all).
struct StillScreen {
    frame: Option<RasterFrame>,
}

#[async_trait::async_trait]
impl VideoCapture for StillScreen {
    async fn start(&mut self) -> Result<()> {
        Ok(())
    }

    async fn frame(&mut self) -> Result<Option<RasterFrame>> {
        Ok(self.frame.clone())
    }

    async fn stop(&mut self) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        "still-screen"
    }
}

#[derive(Default)]
struct CollectingSink {
    played: StdMutex<Vec<usize>>,
}

impl AudioSink for CollectingSink {
    fn play(&self, segment: &AudioSegment) {
        self.played.lock().unwrap().push(segment.samples.len());
    }
}

struct FixedGeometry(Option<SurfaceLayout>);

impl SurfaceGeometry for FixedGeometry {
    fn layout(&self) -> Option<SurfaceLayout> {
        self.0
    }
}

fn test_layout() -> SurfaceLayout {
    SurfaceLayout {
        container: Rect {
            left: 10.0,
            top: 10.0,
            width: 400.0,
            height: 300.0,
        },
        video: Rect {
            left: 20.0,
            top: 30.0,
            width: 200.0,
            height: 100.0,
        },
    }
}

fn test_session() -> AssistSession {
    AssistSession::new(
        SessionConfig::default(),
        Arc::new(CollectingSink::default()),
        Arc::new(FixedGeometry(Some(test_layout()))),
    )
}

fn silent_block() -> AudioBlock {
    AudioBlock {
        samples: vec![0.25; AUDIO_BLOCK_SIZE],
        sample_rate: 16000,
    }
}

fn blank_screen() -> Box<StillScreen> {
    Box::new(StillScreen { frame: None })
}

fn output_delta(text: &str) -> ServerMessage {
    serde_json::from_value(json!({
        "serverContent": { "outputTranscription": { "text": text } }
    }))
    .expect("valid server message")
}

async fn recv_client(link: &mut Link) -> ClientMessage {
    timeout(Duration::from_secs(2), link.client_rx.recv())
        .await
        .expect("no outbound message in time")
        .expect("outbound stream ended")
}

#[tokio::test(start_paused = true)]
async fn test_microphone_blocks_flow_to_the_service() -> Result<()> {
    let session = test_session();
    let (transport, link_rx) = FakeTransport::new();
    let (mic_tx, mic) = ScriptedMic::new();

    session
        .start(Box::new(transport), Box::new(mic), blank_screen())
        .await?;
    let mut link = timeout(Duration::from_secs(2), link_rx).await??;

    mic_tx.send(silent_block()).await?;

    match recv_client(&mut link).await {
        ClientMessage::RealtimeInput(input) => {
            assert_eq!(input.media_chunks.len(), 1);
            assert_eq!(input.media_chunks[0].mime_type, "audio/pcm;rate=16000");
            let bytes = transport_decode(&input.media_chunks[0].data)?;
            assert_eq!(bytes.len(), AUDIO_BLOCK_SIZE * 2);
            // 0.25 maps to 8192 = 0x2000, little-endian
            assert_eq!(&bytes[0..2], &[0x00, 0x20]);
        }
        other => panic!("expected realtime audio input, got {:?}", other),
    }

    for _ in 0..200 {
        if session.stats().await.audio_chunks_sent == 1 {
            break;
        }
        sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(session.stats().await.audio_chunks_sent, 1);

    session.stop().await;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_screen_frames_flow_as_jpeg() -> Result<()> {
    let session = test_session();
    let (transport, link_rx) = FakeTransport::new();
    let (_mic_tx, mic) = ScriptedMic::new();
    let screen = Box::new(StillScreen {
        frame: Some(RasterFrame {
            width: 4,
            height: 4,
            pixels: vec![200; 4 * 4 * 3],
        }),
    });

    session
        .start(Box::new(transport), Box::new(mic), screen)
        .await?;
    let mut link = timeout(Duration::from_secs(2), link_rx).await??;

    match recv_client(&mut link).await {
        ClientMessage::RealtimeInput(input) => {
            assert_eq!(input.media_chunks[0].mime_type, "image/jpeg");
            let bytes = transport_decode(&input.media_chunks[0].data)?;
            // JPEG magic
            assert_eq!(&bytes[0..2], &[0xFF, 0xD8]);
        }
        other => panic!("expected realtime image input, got {:?}", other),
    }

    session.stop().await;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_extreme_frame_rate_still_captures() -> Result<()> {
    // Above 1000 fps the naive millisecond period would be zero
    let mut config = SessionConfig::default();
    config.capture.frame_rate = 5000;
    let session = AssistSession::new(
        config,
        Arc::new(CollectingSink::default()),
        Arc::new(FixedGeometry(Some(test_layout()))),
    );
    let (transport, link_rx) = FakeTransport::new();
    let (_mic_tx, mic) = ScriptedMic::new();
    let screen = Box::new(StillScreen {
        frame: Some(RasterFrame {
            width: 4,
            height: 4,
            pixels: vec![50; 4 * 4 * 3],
        }),
    });

    session
        .start(Box::new(transport), Box::new(mic), screen)
        .await?;
    let mut link = timeout(Duration::from_secs(2), link_rx).await??;

    match recv_client(&mut link).await {
        ClientMessage::RealtimeInput(input) => {
            assert_eq!(input.media_chunks[0].mime_type, "image/jpeg");
        }
        other => panic!("expected realtime image input, got {:?}", other),
    }

    session.stop().await;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_transcript_folds_deltas_and_turns() -> Result<()> {
    let session = test_session();
    let (transport, link_rx) = FakeTransport::new();
    let (_mic_tx, mic) = ScriptedMic::new();

    session
        .start(Box::new(transport), Box::new(mic), blank_screen())
        .await?;
    let link = timeout(Duration::from_secs(2), link_rx).await??;

    link.server_tx.send(output_delta("Hel")).await?;
    link.server_tx.send(output_delta("lo")).await?;

    for _ in 0..200 {
        let entries = session.transcript().await;
        if entries.len() == 1 && entries[0].text == "Hello" {
            break;
        }
        sleep(Duration::from_millis(10)).await;
    }
    let entries = session.transcript().await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].text, "Hello");
    assert_eq!(entries[0].source, Speaker::Ai);
    assert!(!entries[0].is_final);

    let turn_complete: ServerMessage =
        serde_json::from_value(json!({ "serverContent": { "turnComplete": true } }))?;
    link.server_tx.send(turn_complete).await?;
    for _ in 0..200 {
        if session.transcript().await[0].is_final {
            break;
        }
        sleep(Duration::from_millis(10)).await;
    }
    assert!(session.transcript().await[0].is_final);

    // The next delta opens a fresh entry instead of mutating the final one
    link.server_tx.send(output_delta("Next")).await?;
    for _ in 0..200 {
        if session.transcript().await.len() == 2 {
            break;
        }
        sleep(Duration::from_millis(10)).await;
    }
    let entries = session.transcript().await;
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].text, "Hello");
    assert_eq!(entries[1].text, "Next");
    assert_ne!(entries[0].id, entries[1].id);

    session.stop().await;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_tool_calls_place_markers_and_are_acknowledged() -> Result<()> {
    let session = test_session();
    let (transport, link_rx) = FakeTransport::new();
    let (_mic_tx, mic) = ScriptedMic::new();

    session
        .start(Box::new(transport), Box::new(mic), blank_screen())
        .await?;
    let mut link = timeout(Duration::from_secs(2), link_rx).await??;

    let call: ServerMessage = serde_json::from_value(json!({
        "toolCall": { "functionCalls": [
            { "id": "c1", "name": "showClickMarker", "args": { "x": 0.5, "y": 0.5 } }
        ] }
    }))?;
    link.server_tx.send(call).await?;

    match recv_client(&mut link).await {
        ClientMessage::ToolResponse(response) => {
            assert_eq!(response.function_responses[0].id, "c1");
            assert_eq!(
                response.function_responses[0].response,
                json!({ "result": "ok, marker shown" })
            );
        }
        other => panic!("expected tool response, got {:?}", other),
    }
    assert_eq!(
        session.current_marker().await,
        Some(Marker { x: 110.0, y: 70.0 })
    );

    // A malformed call places nothing but is still acknowledged
    let malformed: ServerMessage = serde_json::from_value(json!({
        "toolCall": { "functionCalls": [
            { "id": "c2", "name": "showClickMarker", "args": { "x": "half" } }
        ] }
    }))?;
    link.server_tx.send(malformed).await?;

    match recv_client(&mut link).await {
        ClientMessage::ToolResponse(response) => {
            assert_eq!(response.function_responses[0].id, "c2");
        }
        other => panic!("expected tool response, got {:?}", other),
    }
    assert_eq!(
        session.current_marker().await,
        Some(Marker { x: 110.0, y: 70.0 })
    );

    session.stop().await;
    assert_eq!(session.current_marker().await, None);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_model_audio_is_scheduled_for_playback() -> Result<()> {
    let session = test_session();
    let (transport, link_rx) = FakeTransport::new();
    let (_mic_tx, mic) = ScriptedMic::new();

    session
        .start(Box::new(transport), Box::new(mic), blank_screen())
        .await?;
    let link = timeout(Duration::from_secs(2), link_rx).await??;

    // 0.1s of 24kHz PCM
    let audio: ServerMessage = serde_json::from_value(json!({
        "serverContent": { "modelTurn": { "parts": [
            { "inlineData": { "mimeType": "audio/pcm;rate=24000",
                              "data": transport_encode(&vec![0u8; 4800]) } }
        ] } }
    }))?;
    link.server_tx.send(audio).await?;

    for _ in 0..200 {
        if session.playback().cursor().await > 0.0 {
            break;
        }
        sleep(Duration::from_millis(10)).await;
    }
    assert!(session.playback().cursor().await > 0.0);

    session.stop().await;
    assert_eq!(session.playback().cursor().await, 0.0);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_stop_is_idempotent() -> Result<()> {
    let session = test_session();
    let (transport, link_rx) = FakeTransport::new();
    let (mic_tx, mic) = ScriptedMic::new();

    session
        .start(Box::new(transport), Box::new(mic), blank_screen())
        .await?;
    let mut link = timeout(Duration::from_secs(2), link_rx).await??;

    mic_tx.send(silent_block()).await?;
    let _ = recv_client(&mut link).await;

    let stats = session.stop().await;
    assert!(!stats.is_active);
    assert_eq!(stats.audio_chunks_sent, 1);
    assert!(!session.is_active());

    // Second stop changes nothing and panics nowhere
    let stats = session.stop().await;
    assert!(!stats.is_active);
    assert_eq!(stats.audio_chunks_sent, 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_capture_refusal_aborts_start() {
    let session = test_session();
    let (transport, _link_rx) = FakeTransport::new();

    let result = session
        .start(Box::new(transport), Box::new(DeniedMic), blank_screen())
        .await;
    assert!(result.is_err());
    assert!(!session.is_active());
}

#[tokio::test(start_paused = true)]
async fn test_microphone_track_end_stops_the_session() -> Result<()> {
    let session = test_session();
    let (transport, link_rx) = FakeTransport::new();
    let (mic_tx, mic) = ScriptedMic::new();

    session
        .start(Box::new(transport), Box::new(mic), blank_screen())
        .await?;
    let _link = timeout(Duration::from_secs(2), link_rx).await??;

    // Device gone: the block stream ends
    drop(mic_tx);

    for _ in 0..200 {
        if !session.is_active() {
            break;
        }
        sleep(Duration::from_millis(10)).await;
    }
    assert!(!session.is_active());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_connection_loss_stops_the_session() -> Result<()> {
    let session = test_session();
    let (transport, link_rx) = FakeTransport::new();
    let (_mic_tx, mic) = ScriptedMic::new();

    session
        .start(Box::new(transport), Box::new(mic), blank_screen())
        .await?;
    let link = timeout(Duration::from_secs(2), link_rx).await??;

    // Service hangs up
    drop(link.server_tx);

    for _ in 0..200 {
        if !session.is_active() {
            break;
        }
        sleep(Duration::from_millis(10)).await;
    }
    assert!(!session.is_active());
    Ok(())
}

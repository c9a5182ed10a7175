// Capture pipeline
//
// Turns live hardware input into a steady outbound stream of media chunks:
// one audio chunk per hardware-delivered block, one JPEG frame per timer
// tick. Any delivery failure, or the microphone track ending, requests a
// stop of the whole session (fail-stop, no chunk-level retry).

use super::backend::{AudioCapture, CaptureConfig, RasterFrame, VideoCapture};
use crate::channel::{MediaChunk, SessionChannel};
use crate::codec;
use anyhow::{Context, Result};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{error, info, warn};

/// Why the pipeline asked for the session to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The capture track ended externally (e.g. permission revoked)
    TrackEnded,
    /// The session channel rejected a chunk
    SendFailed,
    /// The inbound event stream ended (transport failed or closed)
    ConnectionLost,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::TrackEnded => write!(f, "capture track ended"),
            StopReason::SendFailed => write!(f, "media send failed"),
            StopReason::ConnectionLost => write!(f, "live connection lost"),
        }
    }
}

/// Drives the audio and video capture tasks for one session.
pub struct CapturePipeline {
    config: CaptureConfig,
    channel: Arc<SessionChannel>,
    stop_request: mpsc::Sender<StopReason>,
    shutdown_tx: watch::Sender<bool>,
    audio_chunks_sent: Arc<AtomicUsize>,
    image_chunks_sent: Arc<AtomicUsize>,
    audio_task: Mutex<Option<JoinHandle<()>>>,
    video_task: Mutex<Option<JoinHandle<()>>>,
}

impl CapturePipeline {
    /// `stop_request` is how the pipeline tells its owner to tear the
    /// whole session down when delivery fails.
    pub fn new(
        config: CaptureConfig,
        channel: Arc<SessionChannel>,
        stop_request: mpsc::Sender<StopReason>,
    ) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            config,
            channel,
            stop_request,
            shutdown_tx,
            audio_chunks_sent: Arc::new(AtomicUsize::new(0)),
            image_chunks_sent: Arc::new(AtomicUsize::new(0)),
            audio_task: Mutex::new(None),
            video_task: Mutex::new(None),
        }
    }

    /// Acquire both hardware streams and spawn the capture tasks.
    ///
    /// A backend refusing to start (permission denied) aborts here; no
    /// tasks are left running.
    pub async fn start(
        &self,
        mut audio: Box<dyn AudioCapture>,
        mut video: Box<dyn VideoCapture>,
    ) -> Result<()> {
        video
            .start()
            .await
            .context("Failed to start screen capture")?;

        let mut blocks = match audio.start().await.context("Failed to start microphone capture") {
            Ok(blocks) => blocks,
            Err(e) => {
                // Don't leave the display stream acquired
                if let Err(stop_err) = video.stop().await {
                    warn!("Failed to release screen capture: {:#}", stop_err);
                }
                return Err(e);
            }
        };

        info!(
            "Capture started: {} + {} ({}Hz audio, {} fps video)",
            audio.name(),
            video.name(),
            self.config.input_sample_rate,
            self.config.frame_rate
        );

        // Audio path: one chunk per hardware-delivered block, no extra
        // buffering
        let channel = Arc::clone(&self.channel);
        let stop_request = self.stop_request.clone();
        let sent = Arc::clone(&self.audio_chunks_sent);
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let audio_task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => break,
                    block = blocks.recv() => match block {
                        Some(block) => {
                            let data = codec::transport_encode(&codec::encode_pcm16(&block.samples));
                            let chunk = MediaChunk::Audio {
                                sample_rate: block.sample_rate,
                                data,
                            };
                            if let Err(e) = channel.send(chunk).await {
                                error!("Failed to send audio chunk: {:#}", e);
                                let _ = stop_request.send(StopReason::SendFailed).await;
                                break;
                            }
                            sent.fetch_add(1, Ordering::SeqCst);
                        }
                        None => {
                            info!("Microphone track ended");
                            let _ = stop_request.send(StopReason::TrackEnded).await;
                            break;
                        }
                    },
                }
            }
            if let Err(e) = audio.stop().await {
                warn!("Failed to stop audio capture: {:#}", e);
            }
        });

        // Video path: fixed-rate timer; a tick with nothing to send is
        // silently skipped
        let channel = Arc::clone(&self.channel);
        let stop_request = self.stop_request.clone();
        let sent = Arc::clone(&self.image_chunks_sent);
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        // A zero-length interval period panics; frame rates above 1000 fps
        // collapse to one frame per millisecond
        let period = Duration::from_millis((1000 / self.config.frame_rate.max(1) as u64).max(1));
        let quality = self.config.jpeg_quality;
        let video_task = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => break,
                    _ = ticker.tick() => {
                        let frame = match video.frame().await {
                            Ok(Some(frame)) => frame,
                            Ok(None) => continue,
                            Err(e) => {
                                warn!("Skipping video frame: {:#}", e);
                                continue;
                            }
                        };
                        let jpeg = match encode_jpeg(&frame, quality) {
                            Ok(jpeg) => jpeg,
                            Err(e) => {
                                warn!("Skipping uncompressable frame: {:#}", e);
                                continue;
                            }
                        };
                        let chunk = MediaChunk::Image {
                            mime_type: "image/jpeg".to_string(),
                            data: codec::transport_encode(&jpeg),
                        };
                        if let Err(e) = channel.send(chunk).await {
                            error!("Failed to send video frame: {:#}", e);
                            let _ = stop_request.send(StopReason::SendFailed).await;
                            break;
                        }
                        sent.fetch_add(1, Ordering::SeqCst);
                    },
                }
            }
            if let Err(e) = video.stop().await {
                warn!("Failed to stop screen capture: {:#}", e);
            }
        });

        *self.audio_task.lock().await = Some(audio_task);
        *self.video_task.lock().await = Some(video_task);

        Ok(())
    }

    /// Halt both capture tasks and release the hardware streams. Teardown
    /// failures are logged inside the tasks, never propagated.
    pub async fn stop(&self) {
        let _ = self.shutdown_tx.send(true);

        if let Some(task) = self.audio_task.lock().await.take() {
            if let Err(e) = task.await {
                error!("Audio capture task panicked: {}", e);
            }
        }
        if let Some(task) = self.video_task.lock().await.take() {
            if let Err(e) = task.await {
                error!("Video capture task panicked: {}", e);
            }
        }
    }

    pub fn audio_chunks_sent(&self) -> usize {
        self.audio_chunks_sent.load(Ordering::SeqCst)
    }

    pub fn image_chunks_sent(&self) -> usize {
        self.image_chunks_sent.load(Ordering::SeqCst)
    }
}

/// Compress a raster frame to JPEG at a fixed quality factor.
pub fn encode_jpeg(frame: &RasterFrame, quality: u8) -> Result<Vec<u8>> {
    let mut jpeg = Vec::new();
    let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut jpeg, quality);
    encoder
        .encode(
            &frame.pixels,
            frame.width,
            frame.height,
            image::ExtendedColorType::Rgb8,
        )
        .context("Failed to encode frame as JPEG")?;
    Ok(jpeg)
}

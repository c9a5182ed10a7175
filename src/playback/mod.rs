// Playback scheduler
//
// Audio segments arrive from the live session faster or slower than real
// time. The scheduler lines them up against a monotonic clock so they play
// strictly in order with no overlap: gapless when data runs ahead of the
// clock, silence-gapped when it falls behind.

use crate::codec::AudioSegment;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{sleep, sleep_until, Duration, Instant};
use tracing::debug;

/// Output device abstraction. Implementations hand the segment to the
/// platform audio stack; rendering the samples is an external concern.
pub trait AudioSink: Send + Sync {
    fn play(&self, segment: &AudioSegment);
}

struct SchedulerInner {
    /// Clock origin; offsets below are seconds since this instant
    epoch: Instant,
    /// Next available start offset in seconds
    cursor: f64,
    next_source_id: u64,
    /// Every segment currently scheduled or playing
    active: HashMap<u64, JoinHandle<()>>,
}

/// Schedules decoded audio segments for gapless sequential playback.
pub struct PlaybackScheduler {
    sink: Arc<dyn AudioSink>,
    inner: Arc<Mutex<SchedulerInner>>,
}

impl PlaybackScheduler {
    pub fn new(sink: Arc<dyn AudioSink>) -> Self {
        Self {
            sink,
            inner: Arc::new(Mutex::new(SchedulerInner {
                epoch: Instant::now(),
                cursor: 0.0,
                next_source_id: 0,
                active: HashMap::new(),
            })),
        }
    }

    /// Schedule a segment to start at the playback cursor.
    ///
    /// The cursor never moves backwards past the current clock time, so a
    /// segment is never scheduled in the past and never overlaps the one
    /// before it. Returns the scheduled start offset in seconds.
    pub async fn schedule(&self, segment: AudioSegment) -> f64 {
        let duration = segment.duration();

        let mut inner = self.inner.lock().await;
        let now = inner.epoch.elapsed().as_secs_f64();
        inner.cursor = inner.cursor.max(now);
        let start = inner.cursor;
        inner.cursor += duration;

        let source_id = inner.next_source_id;
        inner.next_source_id += 1;
        let epoch = inner.epoch;

        debug!(
            "Scheduling segment {} at +{:.3}s ({:.3}s long)",
            source_id, start, duration
        );

        let sink = Arc::clone(&self.sink);
        let tracked = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move {
            sleep_until(epoch + Duration::from_secs_f64(start)).await;
            sink.play(&segment);
            sleep(Duration::from_secs_f64(duration)).await;

            // Natural completion: untrack ourselves
            tracked.lock().await.active.remove(&source_id);
        });

        inner.active.insert(source_id, handle);

        start
    }

    /// Number of segments currently scheduled or playing.
    pub async fn active_count(&self) -> usize {
        self.inner.lock().await.active.len()
    }

    /// Current cursor offset in seconds.
    pub async fn cursor(&self) -> f64 {
        self.inner.lock().await.cursor
    }

    /// Forcibly stop every tracked segment and reset the clock.
    pub async fn stop(&self) {
        let mut inner = self.inner.lock().await;
        for (_, handle) in inner.active.drain() {
            handle.abort();
        }
        inner.cursor = 0.0;
        inner.epoch = Instant::now();
    }
}

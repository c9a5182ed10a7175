// Marker overlay controller
//
// The model points at the screen through `showClickMarker` tool calls with
// normalized coordinates. This module translates them into pixel positions
// relative to the rendered video surface, keeps at most one marker alive,
// and expires it after a fixed delay.

use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};
use tracing::debug;

/// How long a marker stays on screen unless replaced first.
pub const MARKER_LIFETIME: Duration = Duration::from_millis(4000);

/// Tool name the model uses to place a marker.
pub const SHOW_CLICK_MARKER: &str = "showClickMarker";

/// An absolute rectangle in pixels (bounding-box coordinates).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

/// Geometry of the rendering surface at the moment a marker is placed.
///
/// The marker position is computed against the video element's box, then
/// expressed relative to the container that hosts the overlay.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceLayout {
    pub container: Rect,
    pub video: Rect,
}

/// Provides the current surface geometry. The rendering layer owns layout;
/// it may report `None` while no video is displayed.
pub trait SurfaceGeometry: Send + Sync {
    fn layout(&self) -> Option<SurfaceLayout>;
}

/// A placed marker, in pixels relative to the container.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Marker {
    pub x: f64,
    pub y: f64,
}

/// Owns the single active marker and its expiry timer.
pub struct MarkerOverlay {
    geometry: Arc<dyn SurfaceGeometry>,
    marker: Arc<Mutex<Option<Marker>>>,
    expiry: Mutex<Option<JoinHandle<()>>>,
}

impl MarkerOverlay {
    pub fn new(geometry: Arc<dyn SurfaceGeometry>) -> Self {
        Self {
            geometry,
            marker: Arc::new(Mutex::new(None)),
            expiry: Mutex::new(None),
        }
    }

    /// Handle a `showClickMarker` invocation.
    ///
    /// Missing or non-numeric coordinates, or an unavailable surface, place
    /// no marker; the caller still acknowledges the tool call either way so
    /// the model's tool-use turn never stalls.
    pub async fn handle_call(&self, args: &serde_json::Value) -> Option<Marker> {
        let x = args.get("x").and_then(|v| v.as_f64())?;
        let y = args.get("y").and_then(|v| v.as_f64())?;
        let layout = self.geometry.layout()?;
        Some(self.place(&layout, x, y).await)
    }

    /// Place a marker at normalized (x, y), replacing any existing one and
    /// re-arming the auto-expiry timer.
    pub async fn place(&self, layout: &SurfaceLayout, x: f64, y: f64) -> Marker {
        let marker = Marker {
            x: (layout.video.left - layout.container.left) + x * layout.video.width,
            y: (layout.video.top - layout.container.top) + y * layout.video.height,
        };

        debug!("Placing marker at ({:.1}, {:.1}) px", marker.x, marker.y);
        *self.marker.lock().await = Some(marker);

        // Replace the previous expiry timer so an old timeout cannot clear
        // the new marker early
        let mut expiry = self.expiry.lock().await;
        if let Some(task) = expiry.take() {
            task.abort();
        }
        let slot = Arc::clone(&self.marker);
        *expiry = Some(tokio::spawn(async move {
            sleep(MARKER_LIFETIME).await;
            *slot.lock().await = None;
        }));

        marker
    }

    /// Currently displayed marker, if any.
    pub async fn current(&self) -> Option<Marker> {
        *self.marker.lock().await
    }

    /// Remove the marker and cancel the expiry timer.
    pub async fn clear(&self) {
        if let Some(task) = self.expiry.lock().await.take() {
            task.abort();
        }
        *self.marker.lock().await = None;
    }
}

// SPDX-License-Identifier: GPL-3.0-only

//! Scanner control
//!
//! [`ScannerControl`] is the public face of the scanner. It composes the
//! resolution selector, the scan loop, focus/torch handling and the host
//! collaborators, and publishes [`ScannedEvent`]s on a broadcast channel.
//!
//! ```no_run
//! use camera_scanner::backends::virtual_camera::VirtualCameraBackend;
//! use camera_scanner::{ScanOptions, ScannerControl};
//!
//! # async fn run() -> camera_scanner::ScanResult<()> {
//! let backend = VirtualCameraBackend::new(vec!["code.png".into()]);
//! let control = ScannerControl::builder(Box::new(backend)).build();
//! let mut events = control.subscribe();
//! control.start(ScanOptions::default()).await?;
//! if let Ok(event) = events.recv().await {
//!     println!("{}", event.results[0].text);
//! }
//! control.dispose().await;
//! # Ok(())
//! # }
//! ```

pub mod focus;
pub mod orientation;
pub mod overlay;
pub mod resolution;
mod scan_loop;
pub mod session;

pub use orientation::{
    OrientationBroadcaster, OrientationCallback, OrientationSource, SubscriptionId,
};
pub use overlay::{
    DisplayRequest, NoopDisplayRequest, NoopOverlayHost, OverlayHost, OverlayMode,
    ScannerOverlay,
};
pub use resolution::{ResolutionPicker, choose_resolution, default_resolution};
pub use scan_loop::select_camera;
pub use session::{ScanState, ScannedEvent};

use crate::backends::camera::{BackendError, CameraBackend, DeviceInfo};
use crate::config::ScanOptions;
use crate::constants::{focus::FOCUS_BOX_SIZE, timing::EVENT_CHANNEL_CAPACITY};
use crate::errors::{ScanError, ScanResult};
use crate::geometry::{DisplayOrientation, Point, PreviewGeometry, Size};
use scan_loop::{Shared, run_ticks};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{error, info};

/// Builder for [`ScannerControl`]
pub struct ScannerControlBuilder {
    backend: Box<dyn CameraBackend>,
    orientation_source: Option<Arc<dyn OrientationSource>>,
    overlay_host: Arc<dyn OverlayHost>,
    display_request: Arc<dyn DisplayRequest>,
    focus_box: Size,
    overlay: ScannerOverlay,
    event_capacity: usize,
}

impl ScannerControlBuilder {
    pub fn with_orientation_source(mut self, source: Arc<dyn OrientationSource>) -> Self {
        self.orientation_source = Some(source);
        self
    }

    pub fn with_overlay_host(mut self, host: Arc<dyn OverlayHost>) -> Self {
        self.overlay_host = host;
        self
    }

    pub fn with_display_request(mut self, request: Arc<dyn DisplayRequest>) -> Self {
        self.display_request = request;
        self
    }

    /// Side length of the tap-to-focus box, in UI units
    pub fn with_focus_box_size(mut self, size: f64) -> Self {
        self.focus_box = Size::new(size, size);
        self
    }

    pub fn with_overlay(mut self, overlay: ScannerOverlay) -> Self {
        self.overlay = overlay;
        self
    }

    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity.max(1);
        self
    }

    pub fn build(self) -> ScannerControl {
        let orientation_source = self
            .orientation_source
            .unwrap_or_else(|| Arc::new(OrientationBroadcaster::default()));
        let shared = Shared::new(
            self.backend,
            orientation_source,
            self.overlay_host,
            self.display_request,
            self.focus_box,
            self.event_capacity,
        );
        shared.lock().overlay = self.overlay;
        ScannerControl {
            shared: Arc::new(shared),
        }
    }
}

/// Live camera barcode scanner
///
/// One scan session at a time. Dropping the control stops the session.
pub struct ScannerControl {
    shared: Arc<Shared>,
}

impl ScannerControl {
    pub fn builder(backend: Box<dyn CameraBackend>) -> ScannerControlBuilder {
        ScannerControlBuilder {
            backend,
            orientation_source: None,
            overlay_host: Arc::new(NoopOverlayHost),
            display_request: Arc::new(NoopDisplayRequest),
            focus_box: Size::new(FOCUS_BOX_SIZE, FOCUS_BOX_SIZE),
            overlay: ScannerOverlay::default(),
            event_capacity: EVENT_CHANNEL_CAPACITY,
        }
    }

    /// Receive scanned events from now on
    pub fn subscribe(&self) -> broadcast::Receiver<ScannedEvent> {
        self.shared.events.subscribe()
    }

    /// Cameras the backend currently offers
    pub fn cameras(&self) -> Vec<DeviceInfo> {
        self.shared.backend.enumerate_cameras()
    }

    // ===== Lifecycle =====

    /// Start a scan session
    ///
    /// Does nothing while stopping or when a session is already running.
    /// Failures are logged and returned with the control back at Idle.
    pub async fn start(&self, options: ScanOptions) -> ScanResult<()> {
        if !self.shared.begin_start(options) {
            return Ok(());
        }

        let shared = self.shared.clone();
        let (initial_delay, session_id) =
            match tokio::task::spawn_blocking(move || shared.acquire()).await {
                Ok(result) => result?,
                Err(e) => {
                    error!(error = %e, "Camera acquisition task failed");
                    self.shared.abort_start(None);
                    return Err(ScanError::CaptureInit(BackendError::Other(e.to_string())));
                }
            };

        let task = tokio::spawn(run_ticks(Arc::downgrade(&self.shared), initial_delay));
        self.shared.attach_task(&session_id, task);
        Ok(())
    }

    /// Stop the running session; safe to call repeatedly
    ///
    /// While a start is in progress this requests cancellation and the
    /// start unwinds itself.
    pub async fn stop(&self) {
        let shared = self.shared.clone();
        if let Err(e) = tokio::task::spawn_blocking(move || shared.stop_sync()).await {
            error!(error = %e, "Stop task failed");
        }
    }

    /// Stop and clear overlay content
    pub async fn dispose(&self) {
        self.stop().await;
        self.shared.overlay_host.clear();
    }

    pub fn state(&self) -> ScanState {
        self.shared.lock().state
    }

    pub fn session_id(&self) -> Option<String> {
        let session = self.shared.lock();
        (session.state != ScanState::Idle).then(|| session.session_id.clone())
    }

    /// Run one decode tick now and return the delay until the next
    ///
    /// The tick task calls this on its own schedule; hosts driving their
    /// own timer may call it directly.
    pub fn tick(&self) -> Duration {
        self.shared.tick()
    }

    /// Delay the scan loop currently waits between ticks
    pub fn current_delay(&self) -> Duration {
        self.shared.lock().current_delay
    }

    // ===== Analysis =====

    pub fn is_analyzing(&self) -> bool {
        self.shared.lock().is_analyzing
    }

    /// Pause or resume decoding without releasing the camera
    pub fn set_analyzing(&self, analyzing: bool) {
        let mut session = self.shared.lock();
        if session.state == ScanState::Streaming {
            session.is_analyzing = analyzing;
        }
    }

    // ===== Layout =====

    /// Size of the UI control showing the preview
    pub fn set_control_size(&self, width: f64, height: f64) {
        self.shared.set_control_size(Size::new(width, height));
    }

    pub fn preview_geometry(&self) -> Option<PreviewGeometry> {
        self.shared.lock().geometry
    }

    pub fn orientation(&self) -> DisplayOrientation {
        self.shared.lock().orientation
    }

    /// Overlay used by the next start
    pub fn set_overlay(&self, overlay: ScannerOverlay) {
        self.shared.lock().overlay = overlay;
    }

    pub fn overlay(&self) -> ScannerOverlay {
        self.shared.lock().overlay.clone()
    }

    // ===== Focus and torch =====

    /// Focus on a point of the preview control
    pub fn focus_at(&self, x: f64, y: f64) {
        self.shared.focus_at(Some(Point::new(x, y)));
    }

    /// Refocus without a region
    pub fn auto_focus(&self) {
        self.shared.focus_at(None);
    }

    /// Tap on the preview control
    pub fn on_tap(&self, x: f64, y: f64) {
        info!(x, y, "AutoFocus requested");
        self.focus_at(x, y);
    }

    pub fn is_focus_supported(&self) -> bool {
        self.shared
            .with_device(focus::is_focus_supported)
            .unwrap_or(false)
    }

    pub fn has_torch(&self) -> bool {
        self.shared.with_device(focus::has_torch).unwrap_or(false)
    }

    pub fn is_torch_on(&self) -> bool {
        self.shared.with_device(focus::is_torch_on).unwrap_or(false)
    }

    /// Switch the torch; a no-op without torch hardware
    pub fn set_torch(&self, on: bool) {
        if let Some(Err(e)) = self.shared.with_device(|device| focus::set_torch(device, on)) {
            error!(error = %e, "Failed to switch torch");
        }
    }

    pub fn toggle_torch(&self) {
        if let Some(Err(e)) = self.shared.with_device(focus::toggle_torch) {
            error!(error = %e, "Failed to toggle torch");
        }
    }
}

/// Dropping a running control stops it
///
/// Inside a tokio runtime the teardown runs on the blocking pool and the
/// drop returns before the device is closed. Outside one it runs inline.
impl Drop for ScannerControl {
    fn drop(&mut self) {
        if self.shared.lock().state == ScanState::Idle {
            return;
        }
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let shared = self.shared.clone();
                handle.spawn_blocking(move || shared.stop_sync());
            }
            Err(_) => self.shared.stop_sync(),
        }
    }
}

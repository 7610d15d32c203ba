// SPDX-License-Identifier: GPL-3.0-only

//! Scan loop controller
//!
//! Owns the session state machine: device acquisition on start, the
//! self-rescheduling decode tick, orientation handling and teardown.
//!
//! Device calls that may block (initialize, start/stop preview, frame
//! fetch) run on the blocking pool. The tick fetches its frame with the
//! session mutex held, so a slow dequeue also delays stop, focus and torch
//! requests. The mutex is released before decoding and is never held while
//! calling into host collaborators.

use super::focus;
use super::orientation::OrientationSource;
use super::overlay::{DisplayRequest, OverlayHost, OverlayMode};
use super::resolution::choose_resolution;
use super::session::{ScanState, ScannedEvent, Session, Teardown};
use crate::backends::camera::{CameraBackend, CaptureDevice, DeviceInfo, Panel};
use crate::config::ScanOptions;
use crate::errors::{ScanError, ScanResult};
use crate::frame_processor::{LuminanceSource, decode_frame};
use crate::geometry::{DisplayOrientation, Point, PreviewGeometry, Rect, Size};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, error, info, trace, warn};

/// State shared between the public control, the tick task and callbacks
pub(crate) struct Shared {
    pub backend: Box<dyn CameraBackend>,
    pub orientation_source: Arc<dyn OrientationSource>,
    pub overlay_host: Arc<dyn OverlayHost>,
    pub display_request: Arc<dyn DisplayRequest>,
    pub events: broadcast::Sender<ScannedEvent>,
    pub focus_box: Size,
    session: Mutex<Session>,
}

/// Pick the camera on the preferred panel, falling back to the first one
///
/// `Some(true)` asks for the front panel. Anything else prefers the back
/// panel.
pub fn select_camera(cameras: &[DeviceInfo], use_front: Option<bool>) -> Option<DeviceInfo> {
    let use_front = use_front.unwrap_or(false);
    let wanted = if use_front { Panel::Front } else { Panel::Back };
    if let Some(camera) = cameras.iter().find(|c| c.panel == wanted) {
        return Some(camera.clone());
    }

    let first = cameras.first().cloned();
    if first.is_some() {
        let which = if use_front { "front" } else { "back" };
        info!(which, "Finding preferred camera failed, opening first available camera");
    }
    first
}

impl Shared {
    pub fn new(
        backend: Box<dyn CameraBackend>,
        orientation_source: Arc<dyn OrientationSource>,
        overlay_host: Arc<dyn OverlayHost>,
        display_request: Arc<dyn DisplayRequest>,
        focus_box: Size,
        event_capacity: usize,
    ) -> Self {
        let (events, _) = broadcast::channel(event_capacity);
        let mut session = Session::new();
        session.orientation = orientation_source.current_orientation();
        Self {
            backend,
            orientation_source,
            overlay_host,
            display_request,
            events,
            focus_box,
            session: Mutex::new(session),
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(|e| e.into_inner())
    }

    // ===== Start =====

    /// Move Idle → Starting
    ///
    /// Returns `false` when the start must not proceed: the control is
    /// stopping or a session is already starting or running.
    pub fn begin_start(&self, options: ScanOptions) -> bool {
        let (mode, overlay) = {
            let mut session = self.lock();
            match session.state {
                ScanState::Stopping => {
                    warn!("Camera is already closing");
                    return false;
                }
                ScanState::Starting | ScanState::Streaming => {
                    debug!(state = %session.state, "Scanner already running");
                    return false;
                }
                ScanState::Idle => {}
            }
            session.prepare(options);
            info!(session = %session.session_id, "Starting scanner");
            (session.overlay_mode, session.overlay.clone())
        };

        if let Err(e) = self.display_request.request_active() {
            warn!(error = %e, "Display request failed");
        }
        self.overlay_host.show(mode, &overlay);
        true
    }

    /// Acquire and configure the device, then commit Starting → Streaming
    ///
    /// Blocking. Returns the delay before the first tick and the session id.
    /// On failure the session is back at Idle and everything acquired has
    /// been released.
    pub fn acquire(self: &Arc<Self>) -> ScanResult<(Duration, String)> {
        let result = self.acquire_device();
        if let Err(e) = &result {
            match e {
                ScanError::Cancelled => info!("Scanner start cancelled"),
                e if e.is_fatal() => error!(error = %e, "Failed to start scanner"),
                _ => warn!(error = %e, "Scanner start interrupted"),
            }
        }
        result
    }

    fn acquire_device(self: &Arc<Self>) -> ScanResult<(Duration, String)> {
        let options = self.lock().options.clone();

        let cameras = self.backend.enumerate_cameras();
        let Some(camera) = select_camera(&cameras, options.use_front_camera) else {
            self.abort_start(None);
            return Err(ScanError::NoCameraAvailable);
        };
        let mirrored = camera.panel == Panel::Front;
        debug!(camera = %camera.name, id = %camera.id, mirrored, "Camera selected");

        let mut device = match self.backend.initialize(&camera) {
            Ok(device) => device,
            Err(e) => {
                self.abort_start(None);
                return Err(ScanError::CaptureInit(e));
            }
        };
        if self.lock().stop_requested {
            self.abort_start(Some(device));
            return Err(ScanError::Cancelled);
        }

        if let Err(e) = device.start_preview() {
            self.abort_start(Some(device));
            return Err(ScanError::PreviewStart(e));
        }
        if self.lock().stop_requested {
            self.abort_start(Some(device));
            return Err(ScanError::Cancelled);
        }

        let available = device.available_resolutions();
        let Some(resolution) = choose_resolution(&available, options.resolution_selector.as_ref())
        else {
            self.abort_start(Some(device));
            return Err(ScanError::NoResolutionAvailable);
        };

        let orientation = self.orientation_source.current_orientation();
        let geometry =
            PreviewGeometry::new(resolution.width, resolution.height, orientation, mirrored);
        if let Err(e) = device.set_preview_resolution(resolution, geometry.rotation) {
            self.abort_start(Some(device));
            return Err(ScanError::PreviewStart(e));
        }
        info!(%resolution, rotation = %geometry.rotation, "Preview configured");

        if let Err(e) = focus::configure_initial_focus(device.as_mut(), options.disable_autofocus)
        {
            error!(error = %e, "Failed to set up autofocus");
        }

        let weak = Arc::downgrade(self);
        let subscription = self.orientation_source.subscribe(Arc::new(move |orientation| {
            if let Some(shared) = weak.upgrade() {
                shared.on_orientation_changed(orientation);
            }
        }));

        let layout = {
            let mut guard = self.lock();
            if guard.stop_requested {
                drop(guard);
                self.orientation_source.unsubscribe(subscription);
                self.abort_start(Some(device));
                return Err(ScanError::Cancelled);
            }
            let session = &mut *guard;
            session.device = Some(device);
            session.device_info = Some(camera);
            session.geometry = Some(geometry);
            session.orientation = orientation;
            session.mirrored = mirrored;
            session.subscription = Some(subscription);
            session.state = ScanState::Streaming;
            info!(session = %session.session_id, "Scanner streaming");
            (
                geometry.active_rect(session.control_size),
                session.session_id.clone(),
            )
        };

        self.overlay_host.set_preview_layout(layout.0, mirrored);
        Ok((options.initial_delay(), layout.1))
    }

    /// Unwind a failed or cancelled start back to Idle
    pub fn abort_start(&self, device: Option<Box<dyn CaptureDevice>>) {
        let teardown = {
            let mut session = self.lock();
            session.state = ScanState::Stopping;
            session.is_analyzing = false;
            let mut teardown = Teardown::take_from(&mut session);
            if teardown.device.is_none() {
                teardown.device = device;
            }
            teardown
        };
        self.teardown(teardown);
        self.lock().finish();
    }

    /// Attach the tick task to the session it was spawned for
    ///
    /// Aborts the task when that session is gone already.
    pub fn attach_task(&self, session_id: &str, task: tokio::task::JoinHandle<()>) {
        let mut session = self.lock();
        if session.state == ScanState::Streaming
            && session.task.is_none()
            && session.session_id == session_id
        {
            session.task = Some(task);
        } else {
            task.abort();
        }
    }

    // ===== Stop =====

    /// Stop the session; idempotent
    pub fn stop_sync(&self) {
        let teardown = {
            let mut session = self.lock();
            match session.state {
                ScanState::Idle | ScanState::Stopping => return,
                ScanState::Starting => {
                    debug!("Stop requested while starting");
                    session.stop_requested = true;
                    session.is_analyzing = false;
                    return;
                }
                ScanState::Streaming => {}
            }
            info!(session = %session.session_id, "Stopping scanner");
            session.state = ScanState::Stopping;
            session.is_analyzing = false;
            session.is_processing_frame = false;
            Teardown::take_from(&mut session)
        };

        self.teardown(teardown);
        self.lock().finish();
        debug!("Scanner stopped");
    }

    /// Release everything a session held
    ///
    /// Each step runs regardless of earlier failures.
    fn teardown(&self, teardown: Teardown) {
        let Teardown {
            device,
            subscription,
            task,
            overlay_mode,
        } = teardown;

        if let Err(e) = self.display_request.request_release() {
            warn!(error = %e, "Release request failed");
        }

        if let Some(mut device) = device {
            if focus::is_torch_on(device.as_mut())
                && let Err(e) = focus::set_torch(device.as_mut(), false)
            {
                warn!(error = %e, "Failed to turn torch off");
            }
            if device.stream_state() == crate::backends::camera::StreamState::Streaming
                && let Err(e) = device.stop_preview()
            {
                warn!(error = %e, "Failed to stop preview");
            }
            if overlay_mode == OverlayMode::Custom {
                self.overlay_host.remove_custom_overlay();
            }
            device.close();
        } else if overlay_mode == OverlayMode::Custom {
            self.overlay_host.remove_custom_overlay();
        }

        if let Some(id) = subscription {
            self.orientation_source.unsubscribe(id);
        }
        if let Some(task) = task {
            task.abort();
        }
    }

    // ===== Tick =====

    /// Run one scan tick and return the delay until the next one
    pub fn tick(&self) -> Duration {
        let (frame, decoder, hints, session_id) = {
            let mut guard = self.lock();
            let session = &mut *guard;
            if !session.ready_for_tick() {
                trace!(state = %session.state, analyzing = session.is_analyzing, "Idle tick");
                return session.current_delay;
            }
            let (Some(device), Some(decoder)) = (session.device.as_mut(), session.decoder.clone())
            else {
                return session.current_delay;
            };
            session.is_processing_frame = true;
            let frame = device.preview_frame();
            (
                frame,
                decoder,
                session.hints.clone(),
                session.session_id.clone(),
            )
        };

        let results = match frame {
            Ok(frame) => LuminanceSource::from_frame(&frame)
                .and_then(|source| decode_frame(decoder.as_ref(), &source, &hints))
                .unwrap_or_else(|e| {
                    warn!(error = %e, "Decode failed");
                    Vec::new()
                }),
            Err(e) => {
                warn!(error = %ScanError::FrameFetch(e), "Frame skipped");
                Vec::new()
            }
        };

        let mut session = self.lock();
        if session.session_id != session_id {
            return session.current_delay;
        }
        session.is_processing_frame = false;
        if session.state != ScanState::Streaming {
            return session.current_delay;
        }

        if results.is_empty() {
            session.current_delay = session.options.delay_between_frames();
        } else {
            session.current_delay = session.options.delay_between_continuous_scans();
            debug!(count = results.len(), "Barcode scanned");
            // No receivers is fine
            let _ = self.events.send(ScannedEvent::new(session_id, results));
        }
        session.current_delay
    }

    // ===== Orientation =====

    /// Reapply rotation after the display orientation changed
    pub fn on_orientation_changed(&self, orientation: DisplayOrientation) {
        let layout = {
            let mut guard = self.lock();
            let session = &mut *guard;
            session.orientation = orientation;
            let (Some(device), Some(current)) = (session.device.as_mut(), session.geometry) else {
                return;
            };

            let geometry = PreviewGeometry::new(
                current.stream_width,
                current.stream_height,
                orientation,
                current.mirrored,
            );
            if let Err(e) = device.set_rotation(geometry.rotation) {
                warn!(error = %e, "Failed to apply preview rotation");
            }
            debug!(%orientation, rotation = %geometry.rotation, "Preview rotation updated");
            session.geometry = Some(geometry);
            (geometry.active_rect(session.control_size), geometry.mirrored)
        };

        self.overlay_host.set_preview_layout(layout.0, layout.1);
    }

    /// Record the preview control size and republish the layout
    pub fn set_control_size(&self, size: Size) {
        let layout = {
            let mut session = self.lock();
            session.control_size = size;
            session
                .geometry
                .map(|g| (g.active_rect(size), g.mirrored))
        };
        if let Some((rect, mirrored)) = layout {
            self.overlay_host.set_preview_layout(rect, mirrored);
        }
    }

    // ===== Focus and torch =====

    /// Focus at a UI point, or refocus generally when `point` is `None`
    ///
    /// Failures are logged, never returned.
    pub fn focus_at(&self, point: Option<Point>) {
        let mut guard = self.lock();
        let session = &mut *guard;
        if session.options.disable_autofocus {
            return;
        }
        let Some(device) = session.device.as_mut() else {
            return;
        };

        let region: Option<Rect> = match (point, session.geometry) {
            (Some(tap), Some(geometry)) => {
                Some(geometry.tap_region(tap, self.focus_box, session.control_size))
            }
            (Some(_), None) => return,
            (None, _) => None,
        };

        if let Err(e) = focus::focus_at(device.as_mut(), region) {
            error!(error = %e, "AutoFocus failed");
        }
    }

    /// Run `f` against the current device, if any
    pub fn with_device<R>(&self, f: impl FnOnce(&mut dyn CaptureDevice) -> R) -> Option<R> {
        let mut session = self.lock();
        session.device.as_mut().map(|device| f(device.as_mut()))
    }
}

/// Periodic tick task
///
/// Holds only a weak reference so a dropped control ends the loop.
pub(crate) async fn run_ticks(shared: Weak<Shared>, initial_delay: Duration) {
    let mut delay = initial_delay;
    loop {
        tokio::time::sleep(delay).await;

        let Some(strong) = shared.upgrade() else {
            break;
        };
        if strong.lock().state != ScanState::Streaming {
            break;
        }

        delay = match tokio::task::spawn_blocking(move || strong.tick()).await {
            Ok(delay) => delay,
            Err(e) => {
                error!(error = %e, "Scan tick panicked");
                break;
            }
        };
    }
    trace!("Tick loop finished");
}

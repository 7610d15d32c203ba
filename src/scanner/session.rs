// SPDX-License-Identifier: GPL-3.0-only

//! Scan session state record
//!
//! Everything a running session touches lives in one [`Session`] behind the
//! control's mutex. Only the scan loop mutates it.

use crate::backends::camera::{CaptureDevice, DeviceInfo};
use crate::config::ScanOptions;
use crate::frame_processor::{BarcodeDecoder, BarcodeResult, DecodeHints};
use crate::geometry::{DisplayOrientation, PreviewGeometry, Size};
use crate::scanner::orientation::SubscriptionId;
use crate::scanner::overlay::{OverlayMode, ScannerOverlay};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Lifecycle state of the scan session
///
/// Transitions only Idle → Starting → Streaming → Stopping → Idle. A failed
/// or cancelled start goes Starting → Stopping → Idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum ScanState {
    #[default]
    Idle,
    Starting,
    Streaming,
    Stopping,
}

impl std::fmt::Display for ScanState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ScanState::Idle => "idle",
            ScanState::Starting => "starting",
            ScanState::Streaming => "streaming",
            ScanState::Stopping => "stopping",
        };
        write!(f, "{}", name)
    }
}

/// Results dispatched to subscribers after a successful decode
#[derive(Debug, Clone, Serialize)]
pub struct ScannedEvent {
    /// Session that produced the results
    pub session_id: String,
    /// Filtered results, never empty
    pub results: Vec<BarcodeResult>,
    /// Local time of dispatch, RFC 3339
    pub timestamp: String,
}

impl ScannedEvent {
    pub(crate) fn new(session_id: String, results: Vec<BarcodeResult>) -> Self {
        Self {
            session_id,
            results,
            timestamp: chrono::Local::now().to_rfc3339(),
        }
    }
}

pub(crate) struct Session {
    pub state: ScanState,
    pub is_analyzing: bool,
    pub is_processing_frame: bool,
    /// `stop()` arrived while starting
    pub stop_requested: bool,
    pub options: ScanOptions,
    pub hints: DecodeHints,
    pub decoder: Option<Arc<dyn BarcodeDecoder>>,
    pub device: Option<Box<dyn CaptureDevice>>,
    pub device_info: Option<DeviceInfo>,
    pub geometry: Option<PreviewGeometry>,
    pub orientation: DisplayOrientation,
    pub mirrored: bool,
    /// Size of the UI control hosting the preview
    pub control_size: Size,
    pub current_delay: Duration,
    pub subscription: Option<SubscriptionId>,
    pub overlay: ScannerOverlay,
    pub overlay_mode: OverlayMode,
    pub session_id: String,
    pub task: Option<JoinHandle<()>>,
}

impl Session {
    pub fn new() -> Self {
        let options = ScanOptions::default();
        Self {
            state: ScanState::Idle,
            is_analyzing: false,
            is_processing_frame: false,
            stop_requested: false,
            hints: options.decode_hints(),
            current_delay: options.delay_between_frames(),
            options,
            decoder: None,
            device: None,
            device_info: None,
            geometry: None,
            orientation: DisplayOrientation::default(),
            mirrored: false,
            control_size: Size::default(),
            subscription: None,
            overlay: ScannerOverlay::default(),
            overlay_mode: OverlayMode::Default,
            session_id: String::new(),
            task: None,
        }
    }

    /// Reset per-session fields for a new start with `options`
    pub fn prepare(&mut self, options: ScanOptions) {
        self.state = ScanState::Starting;
        self.is_analyzing = true;
        self.is_processing_frame = false;
        self.stop_requested = false;
        self.hints = options.decode_hints();
        self.decoder = Some(Arc::from(options.build_decoder()));
        self.current_delay = options.delay_between_frames();
        self.options = options;
        self.overlay_mode = self.overlay.mode();
        self.session_id = uuid::Uuid::new_v4().to_string();
    }

    /// Drop per-session resources once teardown finished
    pub fn finish(&mut self) {
        self.state = ScanState::Idle;
        self.is_analyzing = false;
        self.is_processing_frame = false;
        self.stop_requested = false;
        self.decoder = None;
        self.device_info = None;
        self.geometry = None;
        self.mirrored = false;
        self.current_delay = self.options.delay_between_frames();
    }

    /// Whether a tick may decode right now
    pub fn ready_for_tick(&self) -> bool {
        self.state == ScanState::Streaming
            && self.is_analyzing
            && !self.is_processing_frame
            && self.device.as_ref().is_some_and(|device| {
                device.stream_state() == crate::backends::camera::StreamState::Streaming
            })
    }
}

/// Resources taken out of a session for teardown
pub(crate) struct Teardown {
    pub device: Option<Box<dyn CaptureDevice>>,
    pub subscription: Option<SubscriptionId>,
    pub task: Option<JoinHandle<()>>,
    pub overlay_mode: OverlayMode,
}

impl Teardown {
    pub fn take_from(session: &mut Session) -> Self {
        Self {
            device: session.device.take(),
            subscription: session.subscription.take(),
            task: session.task.take(),
            overlay_mode: session.overlay_mode,
        }
    }
}

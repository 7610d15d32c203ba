// SPDX-License-Identifier: GPL-3.0-only

//! Test doubles for scanner integration tests

#![allow(dead_code)]

use camera_scanner::backends::camera::{
    AutoFocusRange, BackendError, BackendResult, CameraBackend, CameraBackendType, CameraFrame,
    CameraResolution, CaptureDevice, DeviceInfo, FocusControl, FocusMode, FocusSettings, Panel,
    RegionOfInterest, RegionOfInterestControl, StreamState, TorchControl,
};
use camera_scanner::errors::ScanResult;
use camera_scanner::frame_processor::{
    BarcodeDecoder, BarcodeFormat, BarcodeResult, DecoderFactory, LuminanceSource,
};
use camera_scanner::geometry::{DisplayOrientation, Rect, VideoRotation};
use camera_scanner::scanner::{
    DisplayRequest, OrientationBroadcaster, OrientationCallback, OrientationSource, OverlayHost,
    OverlayMode, ScannerOverlay, SubscriptionId,
};
use camera_scanner::{ScanOptions, ScannerControl};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::ThreadId;

/// What the mock camera offers
#[derive(Clone)]
pub struct MockSetup {
    pub cameras: Vec<DeviceInfo>,
    pub resolutions: Vec<CameraResolution>,
    pub init_error: Option<BackendError>,
    pub focus_modes: Vec<FocusMode>,
    pub focus_ranges: Vec<AutoFocusRange>,
    pub torch: bool,
    pub roi_regions: u32,
    pub fail_frames: bool,
    /// Runs inside `initialize` before the device is returned
    pub on_initialize: Option<Arc<dyn Fn() + Send + Sync>>,
}

impl Default for MockSetup {
    fn default() -> Self {
        Self {
            cameras: vec![DeviceInfo::new("/dev/video0", "Rear camera", Panel::Back)],
            resolutions: vec![
                CameraResolution::new(320, 240),
                CameraResolution::new(640, 480),
                CameraResolution::new(1920, 1080),
            ],
            init_error: None,
            focus_modes: vec![FocusMode::Auto, FocusMode::Continuous, FocusMode::Single],
            focus_ranges: vec![AutoFocusRange::Normal, AutoFocusRange::FullRange],
            torch: true,
            roi_regions: 1,
            fail_frames: false,
            on_initialize: None,
        }
    }
}

/// Everything the mock device was asked to do
#[derive(Default)]
pub struct Record {
    pub initialized: Mutex<Vec<String>>,
    pub closes: AtomicUsize,
    pub closed_on: Mutex<Option<ThreadId>>,
    pub start_previews: AtomicUsize,
    pub stop_previews: AtomicUsize,
    pub frames: AtomicUsize,
    pub resolutions: Mutex<Vec<(CameraResolution, VideoRotation)>>,
    pub rotations: Mutex<Vec<VideoRotation>>,
    pub focus_settings: Mutex<Vec<FocusSettings>>,
    pub focus_requests: AtomicUsize,
    pub regions: Mutex<Vec<RegionOfInterest>>,
    pub region_clears: AtomicUsize,
    pub torch_on: AtomicBool,
}

impl Record {
    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

pub struct MockBackend {
    pub setup: MockSetup,
    pub record: Arc<Record>,
}

impl CameraBackend for MockBackend {
    fn enumerate_cameras(&self) -> Vec<DeviceInfo> {
        self.setup.cameras.clone()
    }

    fn initialize(&self, device: &DeviceInfo) -> BackendResult<Box<dyn CaptureDevice>> {
        if let Some(hook) = &self.setup.on_initialize {
            hook();
        }
        if let Some(e) = &self.setup.init_error {
            return Err(e.clone());
        }
        self.record
            .initialized
            .lock()
            .unwrap()
            .push(device.id.clone());
        Ok(Box::new(MockDevice {
            setup: self.setup.clone(),
            record: self.record.clone(),
            state: StreamState::NotStreaming,
            current: None,
            focus: (!self.setup.focus_modes.is_empty()).then(|| MockFocus {
                modes: self.setup.focus_modes.clone(),
                ranges: self.setup.focus_ranges.clone(),
                record: self.record.clone(),
            }),
            torch: self.setup.torch.then(|| MockTorch {
                record: self.record.clone(),
            }),
            roi: MockRoi {
                max_regions: self.setup.roi_regions,
                record: self.record.clone(),
            },
        }))
    }

    fn backend_type(&self) -> CameraBackendType {
        CameraBackendType::Virtual
    }
}

pub struct MockDevice {
    setup: MockSetup,
    record: Arc<Record>,
    state: StreamState,
    current: Option<CameraResolution>,
    focus: Option<MockFocus>,
    torch: Option<MockTorch>,
    roi: MockRoi,
}

impl CaptureDevice for MockDevice {
    fn start_preview(&mut self) -> BackendResult<()> {
        self.record.start_previews.fetch_add(1, Ordering::SeqCst);
        self.state = StreamState::Streaming;
        Ok(())
    }

    fn stop_preview(&mut self) -> BackendResult<()> {
        self.record.stop_previews.fetch_add(1, Ordering::SeqCst);
        self.state = StreamState::NotStreaming;
        Ok(())
    }

    fn stream_state(&self) -> StreamState {
        self.state
    }

    fn preview_frame(&mut self) -> BackendResult<CameraFrame> {
        self.record.frames.fetch_add(1, Ordering::SeqCst);
        if self.setup.fail_frames {
            return Err(BackendError::IoError("dequeue failed".into()));
        }
        Ok(CameraFrame::from_gray(8, 8, vec![128; 64]))
    }

    fn available_resolutions(&self) -> Vec<CameraResolution> {
        self.setup.resolutions.clone()
    }

    fn set_preview_resolution(
        &mut self,
        resolution: CameraResolution,
        rotation: VideoRotation,
    ) -> BackendResult<()> {
        self.record
            .resolutions
            .lock()
            .unwrap()
            .push((resolution, rotation));
        self.current = Some(resolution);
        Ok(())
    }

    fn preview_resolution(&self) -> Option<CameraResolution> {
        self.current
    }

    fn set_rotation(&mut self, rotation: VideoRotation) -> BackendResult<()> {
        self.record.rotations.lock().unwrap().push(rotation);
        Ok(())
    }

    fn focus_control(&mut self) -> Option<&mut dyn FocusControl> {
        self.focus.as_mut().map(|f| f as &mut dyn FocusControl)
    }

    fn torch_control(&mut self) -> Option<&mut dyn TorchControl> {
        self.torch.as_mut().map(|t| t as &mut dyn TorchControl)
    }

    fn region_of_interest_control(&mut self) -> Option<&mut dyn RegionOfInterestControl> {
        Some(&mut self.roi)
    }

    fn close(&mut self) {
        self.record.closes.fetch_add(1, Ordering::SeqCst);
        *self.record.closed_on.lock().unwrap() = Some(std::thread::current().id());
        self.state = StreamState::Shutdown;
    }
}

struct MockFocus {
    modes: Vec<FocusMode>,
    ranges: Vec<AutoFocusRange>,
    record: Arc<Record>,
}

impl FocusControl for MockFocus {
    fn supported(&self) -> bool {
        true
    }

    fn supported_modes(&self) -> Vec<FocusMode> {
        self.modes.clone()
    }

    fn supported_ranges(&self) -> Vec<AutoFocusRange> {
        self.ranges.clone()
    }

    fn configure(&mut self, settings: &FocusSettings) -> BackendResult<()> {
        self.record.focus_settings.lock().unwrap().push(*settings);
        Ok(())
    }

    fn focus(&mut self) -> BackendResult<()> {
        self.record.focus_requests.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct MockTorch {
    record: Arc<Record>,
}

impl TorchControl for MockTorch {
    fn supported(&self) -> bool {
        true
    }

    fn enabled(&self) -> bool {
        self.record.torch_on.load(Ordering::SeqCst)
    }

    fn set_enabled(&mut self, on: bool) -> BackendResult<()> {
        self.record.torch_on.store(on, Ordering::SeqCst);
        Ok(())
    }
}

struct MockRoi {
    max_regions: u32,
    record: Arc<Record>,
}

impl RegionOfInterestControl for MockRoi {
    fn auto_focus_supported(&self) -> bool {
        self.max_regions > 0
    }

    fn max_regions(&self) -> u32 {
        self.max_regions
    }

    fn set_regions(&mut self, regions: &[RegionOfInterest], replace: bool) -> BackendResult<()> {
        let mut stored = self.record.regions.lock().unwrap();
        if replace {
            stored.clear();
        }
        stored.extend_from_slice(regions);
        Ok(())
    }

    fn clear_regions(&mut self) -> BackendResult<()> {
        self.record.region_clears.fetch_add(1, Ordering::SeqCst);
        self.record.regions.lock().unwrap().clear();
        Ok(())
    }
}

/// Decoder replaying a script, one step per decode call
///
/// Each step lists the texts found in a frame, `None` standing for a null
/// result. An exhausted script finds nothing.
#[derive(Clone, Default)]
pub struct ScriptedDecoder {
    steps: Arc<Mutex<VecDeque<Vec<Option<&'static str>>>>>,
}

impl ScriptedDecoder {
    pub fn push(&self, step: Vec<Option<&'static str>>) {
        self.steps.lock().unwrap().push_back(step);
    }

    pub fn factory(&self) -> DecoderFactory {
        let decoder = self.clone();
        Arc::new(move || Box::new(decoder.clone()))
    }

    fn next_step(&self) -> Vec<Option<BarcodeResult>> {
        self.steps
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_default()
            .into_iter()
            .map(|text| text.map(|t| BarcodeResult::new(t, BarcodeFormat::QrCode)))
            .collect()
    }
}

impl BarcodeDecoder for ScriptedDecoder {
    fn decode(&self, _source: &LuminanceSource) -> ScanResult<Option<BarcodeResult>> {
        Ok(self.next_step().into_iter().next().flatten())
    }

    fn decode_multiple(&self, _source: &LuminanceSource) -> ScanResult<Vec<BarcodeResult>> {
        Ok(self.next_step().into_iter().flatten().collect())
    }
}

/// Decoder that reports entering a decode and waits to be released
///
/// Every released decode finds "GATED".
#[derive(Clone)]
pub struct GatedDecoder {
    entered: Arc<Mutex<Sender<()>>>,
    release: Arc<Mutex<Receiver<()>>>,
}

impl GatedDecoder {
    /// The decoder plus the entered receiver and release sender
    pub fn new() -> (Self, Receiver<()>, Sender<()>) {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let decoder = Self {
            entered: Arc::new(Mutex::new(entered_tx)),
            release: Arc::new(Mutex::new(release_rx)),
        };
        (decoder, entered_rx, release_tx)
    }

    pub fn factory(&self) -> DecoderFactory {
        let decoder = self.clone();
        Arc::new(move || Box::new(decoder.clone()))
    }

    fn wait(&self) -> BarcodeResult {
        let _ = self.entered.lock().unwrap().send(());
        let _ = self.release.lock().unwrap().recv();
        BarcodeResult::new("GATED", BarcodeFormat::QrCode)
    }
}

impl BarcodeDecoder for GatedDecoder {
    fn decode(&self, _source: &LuminanceSource) -> ScanResult<Option<BarcodeResult>> {
        Ok(Some(self.wait()))
    }

    fn decode_multiple(&self, _source: &LuminanceSource) -> ScanResult<Vec<BarcodeResult>> {
        Ok(vec![self.wait()])
    }
}

/// Orientation source counting subscriptions
#[derive(Default)]
pub struct CountingOrientation {
    inner: OrientationBroadcaster,
    pub subscribes: AtomicUsize,
    pub unsubscribes: AtomicUsize,
}

impl CountingOrientation {
    pub fn set_orientation(&self, orientation: DisplayOrientation) {
        self.inner.set_orientation(orientation);
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscriber_count()
    }
}

impl OrientationSource for CountingOrientation {
    fn current_orientation(&self) -> DisplayOrientation {
        self.inner.current_orientation()
    }

    fn subscribe(&self, callback: OrientationCallback) -> SubscriptionId {
        self.subscribes.fetch_add(1, Ordering::SeqCst);
        self.inner.subscribe(callback)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.unsubscribes.fetch_add(1, Ordering::SeqCst);
        self.inner.unsubscribe(id);
    }
}

#[derive(Default)]
pub struct RecordingOverlay {
    pub shown: Mutex<Vec<OverlayMode>>,
    pub layouts: Mutex<Vec<(Rect, bool)>>,
    pub removals: AtomicUsize,
    pub clears: AtomicUsize,
}

impl OverlayHost for RecordingOverlay {
    fn show(&self, mode: OverlayMode, _overlay: &ScannerOverlay) {
        self.shown.lock().unwrap().push(mode);
    }

    fn set_preview_layout(&self, active_rect: Rect, mirrored: bool) {
        self.layouts.lock().unwrap().push((active_rect, mirrored));
    }

    fn remove_custom_overlay(&self) {
        self.removals.fetch_add(1, Ordering::SeqCst);
    }

    fn clear(&self) {
        self.clears.fetch_add(1, Ordering::SeqCst);
    }
}

/// Display request whose release always fails
#[derive(Default)]
pub struct FlakyDisplayRequest {
    pub requests: AtomicUsize,
    pub releases: AtomicUsize,
}

impl DisplayRequest for FlakyDisplayRequest {
    fn request_active(&self) -> BackendResult<()> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn request_release(&self) -> BackendResult<()> {
        self.releases.fetch_add(1, Ordering::SeqCst);
        Err(BackendError::Other("release refused".into()))
    }
}

/// A control wired to recording doubles
pub struct Harness {
    pub control: ScannerControl,
    pub record: Arc<Record>,
    pub orientation: Arc<CountingOrientation>,
    pub overlay: Arc<RecordingOverlay>,
    pub display: Arc<FlakyDisplayRequest>,
    pub decoder: ScriptedDecoder,
}

impl Harness {
    pub fn new(setup: MockSetup) -> Self {
        let record = Arc::new(Record::default());
        let orientation = Arc::new(CountingOrientation::default());
        let overlay = Arc::new(RecordingOverlay::default());
        let display = Arc::new(FlakyDisplayRequest::default());
        let backend = MockBackend {
            setup,
            record: record.clone(),
        };
        let control = ScannerControl::builder(Box::new(backend))
            .with_orientation_source(orientation.clone())
            .with_overlay_host(overlay.clone())
            .with_display_request(display.clone())
            .build();

        Self {
            control,
            record,
            orientation,
            overlay,
            display,
            decoder: ScriptedDecoder::default(),
        }
    }

    /// Options whose tick task stays asleep so tests drive `tick()` themselves
    pub fn manual_options(&self) -> ScanOptions {
        ScanOptions {
            initial_delay_before_analyzing_frames_ms: 3_600_000,
            delay_between_analyzing_frames_ms: 150,
            delay_between_continuous_scans_ms: 1000,
            decoder_factory: Some(self.decoder.factory()),
            ..Default::default()
        }
    }
}

// SPDX-License-Identifier: GPL-3.0-only
// Shared types for camera backend abstraction

//! Shared types for camera backends

use crate::geometry::Rect;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// Camera backend type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CameraBackendType {
    /// Video4Linux2 capture devices
    #[default]
    V4l2,
    /// Still images served as a camera (testing, offline scanning)
    Virtual,
}

impl std::fmt::Display for CameraBackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CameraBackendType::V4l2 => write!(f, "V4L2"),
            CameraBackendType::Virtual => write!(f, "virtual"),
        }
    }
}

/// Enclosure panel a camera is mounted on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Panel {
    /// No location information (external cameras)
    #[default]
    Unknown,
    /// Facing the user
    Front,
    /// Facing away from the user
    Back,
}

impl Panel {
    /// Parse a location hint such as "front", "back" or "external"
    pub fn from_location(location: &str) -> Self {
        match location.trim().to_lowercase().as_str() {
            "front" | "user" => Panel::Front,
            "back" | "rear" | "environment" => Panel::Back,
            _ => Panel::Unknown,
        }
    }
}

impl std::fmt::Display for Panel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Panel::Unknown => write!(f, "unknown"),
            Panel::Front => write!(f, "front"),
            Panel::Back => write!(f, "back"),
        }
    }
}

/// A capture device as reported by a backend's enumeration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Backend-specific identifier (device path, file path, ...)
    pub id: String,
    /// Human-readable name
    pub name: String,
    /// Enclosure panel
    pub panel: Panel,
    /// Driver name, when known
    pub driver: Option<String>,
}

impl DeviceInfo {
    pub fn new(id: impl Into<String>, name: impl Into<String>, panel: Panel) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            panel,
            driver: None,
        }
    }
}

/// A preview resolution offered by a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CameraResolution {
    pub width: u32,
    pub height: u32,
}

impl CameraResolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn pixel_count(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

impl std::fmt::Display for CameraResolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Pixel format for camera frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// 8-bit grayscale (already a luminance plane)
    Gray8,
    /// RGBA - 32-bit with alpha
    RGBA,
    /// BGRA - 32-bit with alpha (B G R A byte order)
    BGRA,
    /// RGB24 - 24-bit RGB, no alpha
    RGB24,
    /// YUYV - Packed 4:2:2 (Y0 U Y1 V interleaved)
    YUYV,
    /// UYVY - Packed 4:2:2 (U Y0 V Y1 interleaved)
    UYVY,
    /// NV12 - Semi-planar 4:2:0 (Y plane + interleaved UV plane)
    NV12,
}

impl PixelFormat {
    /// Average bytes per pixel (accounting for chroma subsampling)
    pub fn bytes_per_pixel(&self) -> f32 {
        match self {
            Self::Gray8 => 1.0,
            Self::RGBA | Self::BGRA => 4.0,
            Self::RGB24 => 3.0,
            Self::YUYV | Self::UYVY => 2.0,
            Self::NV12 => 1.5,
        }
    }

    /// Parse a V4L2 FourCC code
    pub fn from_fourcc(fourcc: &[u8; 4]) -> Option<Self> {
        match fourcc {
            b"GREY" | b"Y800" => Some(Self::Gray8),
            b"AB24" | b"RGBA" => Some(Self::RGBA),
            b"AR24" | b"BGRA" => Some(Self::BGRA),
            b"RGB3" => Some(Self::RGB24),
            b"YUYV" => Some(Self::YUYV),
            b"UYVY" => Some(Self::UYVY),
            b"NV12" => Some(Self::NV12),
            _ => None,
        }
    }
}

/// A single frame from the camera
#[derive(Debug, Clone)]
pub struct CameraFrame {
    pub width: u32,
    pub height: u32,
    /// Pixel data in `format`
    pub data: Arc<[u8]>,
    /// Pixel format of the data
    pub format: PixelFormat,
    /// Row stride in bytes of the first plane (may include padding)
    pub stride: u32,
    /// Timestamp when frame was captured
    pub captured_at: Instant,
}

impl CameraFrame {
    /// Wrap a tightly packed grayscale buffer
    pub fn from_gray(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            data: Arc::from(data.into_boxed_slice()),
            format: PixelFormat::Gray8,
            stride: width,
            captured_at: Instant::now(),
        }
    }
}

/// Streaming state of a capture device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamState {
    #[default]
    NotStreaming,
    Streaming,
    Shutdown,
}

/// Focus operating mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FocusMode {
    /// Focus once on request
    Auto,
    /// Single focus sweep, used for tap-to-focus
    Single,
    /// Continuous autofocus
    Continuous,
    /// Fixed lens position
    Manual,
}

/// Distance range the autofocus searches in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AutoFocusRange {
    FullRange,
    Normal,
    Macro,
}

/// Preset lens positions for manual focus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ManualFocusDistance {
    Infinity,
    Hyperfocal,
    Nearest,
}

/// Settings passed to a focus control's `configure`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FocusSettings {
    pub mode: Option<FocusMode>,
    pub auto_focus_range: Option<AutoFocusRange>,
    pub distance: Option<ManualFocusDistance>,
    /// Block frame delivery until focus settles
    pub wait_for_focus: bool,
}

/// A region the device should prioritize for focus/exposure
///
/// Bounds are normalized to `[0, 1]` in native stream orientation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionOfInterest {
    pub bounds: Rect,
    pub auto_focus_enabled: bool,
    pub weight: u32,
}

/// Result type for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Error types for backend operations
#[derive(Debug, Clone)]
pub enum BackendError {
    /// Backend is not available on this system
    NotAvailable(String),
    /// Failed to initialize the device
    InitializationFailed(String),
    /// Access to the camera was denied
    PermissionDenied(String),
    /// Camera device not found
    DeviceNotFound(String),
    /// Format not supported
    FormatNotSupported(String),
    /// Camera is busy or in use
    Busy,
    /// Operation requires an active preview stream
    NotStreaming,
    /// Capability not supported by this device
    Unsupported(String),
    /// General I/O error
    IoError(String),
    /// Other errors
    Other(String),
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendError::NotAvailable(msg) => write!(f, "Backend not available: {}", msg),
            BackendError::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            BackendError::PermissionDenied(msg) => write!(f, "Permission denied: {}", msg),
            BackendError::DeviceNotFound(msg) => write!(f, "Device not found: {}", msg),
            BackendError::FormatNotSupported(msg) => write!(f, "Format not supported: {}", msg),
            BackendError::Busy => write!(f, "Camera is busy"),
            BackendError::NotStreaming => write!(f, "Camera is not streaming"),
            BackendError::Unsupported(msg) => write!(f, "Not supported: {}", msg),
            BackendError::IoError(msg) => write!(f, "I/O error: {}", msg),
            BackendError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for BackendError {}

impl From<std::io::Error> for BackendError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::PermissionDenied => BackendError::PermissionDenied(err.to_string()),
            std::io::ErrorKind::NotFound => BackendError::DeviceNotFound(err.to_string()),
            _ if err.raw_os_error() == Some(16) => BackendError::Busy, // EBUSY
            _ => BackendError::IoError(err.to_string()),
        }
    }
}

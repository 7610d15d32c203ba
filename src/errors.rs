// SPDX-License-Identifier: MPL-2.0

//! Error types for the scanner control

use crate::backends::camera::BackendError;
use std::fmt;

/// Result type alias using ScanError
pub type ScanResult<T> = Result<T, ScanError>;

/// Scanner control error type
///
/// Device acquisition and preview errors abort `start()`. Frame, decode and
/// focus errors are produced per tick and only ever logged by the scan loop.
#[derive(Debug, Clone)]
pub enum ScanError {
    /// No capture device could be found
    NoCameraAvailable,
    /// Capture device initialization failed (permission denied, busy, ...)
    CaptureInit(BackendError),
    /// Preview stream could not be started
    PreviewStart(BackendError),
    /// The device reported no preview resolutions
    NoResolutionAvailable,
    /// A preview frame could not be fetched
    FrameFetch(BackendError),
    /// The decode engine failed on a frame
    Decode(String),
    /// A focus or region-of-interest request failed
    Focus(BackendError),
    /// `stop()` was requested while `start()` was still running
    Cancelled,
    /// Configuration errors
    Config(String),
}

impl ScanError {
    /// Whether this error means the scan session failed
    ///
    /// Per-tick failures and a requested cancellation are not fatal.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ScanError::NoCameraAvailable
                | ScanError::CaptureInit(_)
                | ScanError::PreviewStart(_)
                | ScanError::NoResolutionAvailable
        )
    }
}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanError::NoCameraAvailable => write!(f, "No camera available"),
            ScanError::CaptureInit(e) => write!(f, "Camera initialization failed: {}", e),
            ScanError::PreviewStart(e) => write!(f, "Failed to start preview: {}", e),
            ScanError::NoResolutionAvailable => write!(
                f,
                "Camera is busy. Try to close all applications that use the camera"
            ),
            ScanError::FrameFetch(e) => write!(f, "Failed to fetch preview frame: {}", e),
            ScanError::Decode(msg) => write!(f, "Decode failed: {}", msg),
            ScanError::Focus(e) => write!(f, "Focus request failed: {}", e),
            ScanError::Cancelled => write!(f, "Scanner start was cancelled"),
            ScanError::Config(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for ScanError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ScanError::CaptureInit(e)
            | ScanError::PreviewStart(e)
            | ScanError::FrameFetch(e)
            | ScanError::Focus(e) => Some(e),
            _ => None,
        }
    }
}

/// Device errors outside a more specific context count as acquisition failures
impl From<BackendError> for ScanError {
    fn from(err: BackendError) -> Self {
        ScanError::CaptureInit(err)
    }
}

impl From<std::io::Error> for ScanError {
    fn from(err: std::io::Error) -> Self {
        ScanError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for ScanError {
    fn from(err: serde_json::Error) -> Self {
        ScanError::Config(err.to_string())
    }
}

// SPDX-License-Identifier: MPL-2.0

//! Camera backend abstraction
//!
//! The scanner never talks to a concrete device type. Backends enumerate
//! devices and hand out [`CaptureDevice`] objects, which expose the optional
//! focus, torch and region-of-interest capabilities as separate traits.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────┐
//! │   ScannerControl    │
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │ CameraBackend Trait │  ← Enumeration + initialization
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │ CaptureDevice Trait │  ← Preview, frames, capabilities
//! └──────────┬──────────┘
//!            │
//!       ┌────┴─────┐
//!       ▼          ▼
//!    ┌──────┐  ┌───────┐
//!    │ V4L2 │  │Virtual│
//!    └──────┘  └───────┘
//! ```

pub mod format_converters;
pub mod types;
#[cfg(target_os = "linux")]
pub mod v4l2;
#[cfg(target_os = "linux")]
pub mod v4l2_controls;

pub use types::*;

use crate::geometry::VideoRotation;
use std::path::PathBuf;

/// Device enumeration and initialization
pub trait CameraBackend: Send + Sync {
    /// Enumerate available cameras on this backend
    fn enumerate_cameras(&self) -> Vec<DeviceInfo>;

    /// Open and initialize a device for video streaming
    ///
    /// # Returns
    /// * `Ok(device)` - Device initialized, preview not yet started
    /// * `Err(BackendError::PermissionDenied)` - Access denied
    /// * `Err(BackendError)` - Device busy or failed to open
    fn initialize(&self, device: &DeviceInfo) -> BackendResult<Box<dyn CaptureDevice>>;

    /// Get the backend type identifier
    fn backend_type(&self) -> CameraBackendType;
}

/// An initialized capture device
///
/// Dropping the device releases it; `close` does so explicitly and must be
/// safe to call more than once.
pub trait CaptureDevice: Send {
    // ===== Preview =====

    /// Start the preview stream
    fn start_preview(&mut self) -> BackendResult<()>;

    /// Stop the preview stream
    fn stop_preview(&mut self) -> BackendResult<()>;

    /// Current streaming state
    fn stream_state(&self) -> StreamState;

    /// Grab the latest preview frame, rotated per `set_rotation`
    fn preview_frame(&mut self) -> BackendResult<CameraFrame>;

    // ===== Format =====

    /// Resolutions offered for preview, in device-reported order
    fn available_resolutions(&self) -> Vec<CameraResolution>;

    /// Apply a preview resolution together with its rotation metadata
    fn set_preview_resolution(
        &mut self,
        resolution: CameraResolution,
        rotation: VideoRotation,
    ) -> BackendResult<()>;

    /// Currently configured preview resolution
    fn preview_resolution(&self) -> Option<CameraResolution>;

    /// Apply rotation to the preview stream
    fn set_rotation(&mut self, rotation: VideoRotation) -> BackendResult<()>;

    // ===== Capabilities =====

    fn focus_control(&mut self) -> Option<&mut dyn FocusControl> {
        None
    }

    fn torch_control(&mut self) -> Option<&mut dyn TorchControl> {
        None
    }

    fn region_of_interest_control(&mut self) -> Option<&mut dyn RegionOfInterestControl> {
        None
    }

    // ===== Lifecycle =====

    /// Release the device
    fn close(&mut self);
}

/// Lens focus capability
pub trait FocusControl: Send {
    fn supported(&self) -> bool;

    fn supported_modes(&self) -> Vec<FocusMode>;

    fn supported_ranges(&self) -> Vec<AutoFocusRange>;

    fn configure(&mut self, settings: &FocusSettings) -> BackendResult<()>;

    /// Run a focus operation with the configured settings
    fn focus(&mut self) -> BackendResult<()>;
}

/// Torch (continuous flash LED) capability
pub trait TorchControl: Send {
    fn supported(&self) -> bool;

    fn enabled(&self) -> bool;

    fn set_enabled(&mut self, on: bool) -> BackendResult<()>;
}

/// Focus/exposure region capability
pub trait RegionOfInterestControl: Send {
    fn auto_focus_supported(&self) -> bool;

    fn max_regions(&self) -> u32;

    /// Set regions, optionally replacing any previously set
    fn set_regions(&mut self, regions: &[RegionOfInterest], replace: bool) -> BackendResult<()>;

    fn clear_regions(&mut self) -> BackendResult<()>;
}

/// Get a backend instance for the given type
///
/// `image_paths` feeds the virtual backend and is ignored otherwise.
pub fn get_backend_for_type(
    backend_type: CameraBackendType,
    image_paths: Vec<PathBuf>,
) -> Box<dyn CameraBackend> {
    match backend_type {
        #[cfg(target_os = "linux")]
        CameraBackendType::V4l2 => Box::new(v4l2::V4l2Backend::new()),
        #[cfg(not(target_os = "linux"))]
        CameraBackendType::V4l2 => {
            tracing::warn!("V4L2 is only available on Linux, using virtual backend");
            Box::new(crate::backends::virtual_camera::VirtualCameraBackend::new(
                image_paths,
            ))
        }
        CameraBackendType::Virtual => Box::new(
            crate::backends::virtual_camera::VirtualCameraBackend::new(image_paths),
        ),
    }
}

/// Get the default backend type
pub fn get_default_backend() -> CameraBackendType {
    CameraBackendType::V4l2
}

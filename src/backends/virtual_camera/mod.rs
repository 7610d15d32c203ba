// SPDX-License-Identifier: GPL-3.0-only

//! Virtual camera backend serving still images
//!
//! Every image path becomes one device. Initializing a device decodes its
//! image once; the preview then delivers that image as a luminance frame on
//! every request, rotated the same way a real sensor stream would be.
//! There is no focus, torch or region-of-interest capability.

mod file_source;

pub use file_source::load_image_as_frame;

use crate::backends::camera::format_converters::rotate_gray;
use crate::backends::camera::{
    BackendError, BackendResult, CameraBackend, CameraBackendType, CameraFrame, CameraResolution,
    CaptureDevice, DeviceInfo, Panel, StreamState,
};
use crate::geometry::VideoRotation;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, info};

/// Backend exposing image files as cameras
#[derive(Debug, Clone, Default)]
pub struct VirtualCameraBackend {
    images: Vec<PathBuf>,
}

impl VirtualCameraBackend {
    pub fn new(images: Vec<PathBuf>) -> Self {
        Self { images }
    }
}

impl CameraBackend for VirtualCameraBackend {
    fn enumerate_cameras(&self) -> Vec<DeviceInfo> {
        self.images
            .iter()
            .map(|path| {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_else(|| path.display().to_string());
                let mut device =
                    DeviceInfo::new(path.to_string_lossy().to_string(), name, Panel::Unknown);
                device.driver = Some("virtual".to_string());
                device
            })
            .collect()
    }

    fn initialize(&self, device: &DeviceInfo) -> BackendResult<Box<dyn CaptureDevice>> {
        let path = PathBuf::from(&device.id);
        if !self.images.contains(&path) {
            return Err(BackendError::DeviceNotFound(device.id.clone()));
        }
        let frame = load_image_as_frame(&path)?;
        Ok(Box::new(VirtualDevice::new(device.id.clone(), frame)))
    }

    fn backend_type(&self) -> CameraBackendType {
        CameraBackendType::Virtual
    }
}

/// An initialized virtual device
pub struct VirtualDevice {
    id: String,
    image: CameraFrame,
    rotation: VideoRotation,
    state: StreamState,
    frames_served: u64,
}

impl VirtualDevice {
    /// Wrap a grayscale frame as a device
    pub fn new(id: String, image: CameraFrame) -> Self {
        Self {
            id,
            image,
            rotation: VideoRotation::None,
            state: StreamState::NotStreaming,
            frames_served: 0,
        }
    }

    fn native_resolution(&self) -> CameraResolution {
        CameraResolution::new(self.image.width, self.image.height)
    }
}

impl CaptureDevice for VirtualDevice {
    fn start_preview(&mut self) -> BackendResult<()> {
        if self.state == StreamState::Shutdown {
            return Err(BackendError::DeviceNotFound(format!("{} is closed", self.id)));
        }
        self.state = StreamState::Streaming;
        info!(id = %self.id, "Virtual preview started");
        Ok(())
    }

    fn stop_preview(&mut self) -> BackendResult<()> {
        if self.state == StreamState::Streaming {
            self.state = StreamState::NotStreaming;
        }
        Ok(())
    }

    fn stream_state(&self) -> StreamState {
        self.state
    }

    fn preview_frame(&mut self) -> BackendResult<CameraFrame> {
        if self.state != StreamState::Streaming {
            return Err(BackendError::NotStreaming);
        }
        self.frames_served += 1;
        if self.frames_served % 100 == 1 {
            debug!(id = %self.id, frames = self.frames_served, "Serving virtual frame");
        }

        let (data, width, height) = rotate_gray(
            self.image.data.to_vec(),
            self.image.width,
            self.image.height,
            self.rotation,
        );
        let mut frame = CameraFrame::from_gray(width, height, data);
        frame.captured_at = Instant::now();
        Ok(frame)
    }

    fn available_resolutions(&self) -> Vec<CameraResolution> {
        vec![self.native_resolution()]
    }

    fn set_preview_resolution(
        &mut self,
        resolution: CameraResolution,
        rotation: VideoRotation,
    ) -> BackendResult<()> {
        if resolution != self.native_resolution() {
            return Err(BackendError::FormatNotSupported(format!(
                "{} only serves {}",
                self.id,
                self.native_resolution()
            )));
        }
        self.rotation = rotation;
        Ok(())
    }

    fn preview_resolution(&self) -> Option<CameraResolution> {
        Some(self.native_resolution())
    }

    fn set_rotation(&mut self, rotation: VideoRotation) -> BackendResult<()> {
        self.rotation = rotation;
        Ok(())
    }

    fn close(&mut self) {
        self.state = StreamState::Shutdown;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device() -> VirtualDevice {
        VirtualDevice::new(
            "test".to_string(),
            CameraFrame::from_gray(3, 2, vec![1, 2, 3, 4, 5, 6]),
        )
    }

    #[test]
    fn test_frames_require_streaming() {
        let mut dev = device();
        assert!(matches!(dev.preview_frame(), Err(BackendError::NotStreaming)));
        dev.start_preview().unwrap();
        let frame = dev.preview_frame().unwrap();
        assert_eq!((frame.width, frame.height), (3, 2));
    }

    #[test]
    fn test_rotation_applied_to_frames() {
        let mut dev = device();
        dev.start_preview().unwrap();
        dev.set_preview_resolution(CameraResolution::new(3, 2), VideoRotation::Clockwise90)
            .unwrap();
        let frame = dev.preview_frame().unwrap();
        assert_eq!((frame.width, frame.height), (2, 3));
    }

    #[test]
    fn test_only_native_resolution() {
        let mut dev = device();
        assert_eq!(dev.available_resolutions(), vec![CameraResolution::new(3, 2)]);
        assert!(dev
            .set_preview_resolution(CameraResolution::new(640, 480), VideoRotation::None)
            .is_err());
    }

    #[test]
    fn test_closed_device_cannot_restart() {
        let mut dev = device();
        dev.close();
        assert!(dev.start_preview().is_err());
        assert_eq!(dev.stream_state(), StreamState::Shutdown);
    }

    #[test]
    fn test_enumerate_uses_file_names() {
        let backend = VirtualCameraBackend::new(vec![PathBuf::from("/tmp/codes/qr.png")]);
        let cameras = backend.enumerate_cameras();
        assert_eq!(cameras.len(), 1);
        assert_eq!(cameras[0].name, "qr.png");
        assert_eq!(cameras[0].panel, Panel::Unknown);
    }
}

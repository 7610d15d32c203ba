// SPDX-License-Identifier: GPL-3.0-only

//! Video4Linux2 capture backend
//!
//! Opens `/dev/video*` capture nodes directly through the `v4l` crate and
//! streams through memory-mapped buffers. Every delivered frame is reduced
//! to a luminance plane and rotated in software, since V4L2 has no stream
//! rotation metadata.
//!
//! Focus goes through camera-class controls ([`focus::V4l2Focus`]) and the
//! torch through sysfs flash LEDs ([`crate::flash::FlashTorch`]). V4L2 has
//! no focus-region API, so no region-of-interest control is offered.

pub mod focus;

use super::format_converters::{frame_to_luma, mjpeg_to_gray, rotate_gray};
use super::v4l2_controls::{
    self, V4L2_CAMERA_ORIENTATION_BACK, V4L2_CAMERA_ORIENTATION_FRONT, V4L2_CID_CAMERA_ORIENTATION,
};
use super::{
    BackendError, BackendResult, CameraBackend, CameraBackendType, CameraFrame, CameraResolution,
    CaptureDevice, DeviceInfo, FocusControl, Panel, PixelFormat, StreamState, TorchControl,
};
use crate::constants::capture::{BUFFER_COUNT, STEPWISE_SIZES};
use crate::flash::FlashTorch;
use crate::geometry::VideoRotation;
use focus::V4l2Focus;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};
use v4l::buffer::Type;
use v4l::framesize::FrameSizeEnum;
use v4l::io::mmap::Stream;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;
use v4l::{Format, FourCC};

/// Formats we can turn into luminance, most preferred first
const PREFERRED_FOURCCS: [&[u8; 4]; 6] = [b"YUYV", b"GREY", b"NV12", b"UYVY", b"RGB3", b"MJPG"];

/// Backend enumerating V4L2 capture nodes
#[derive(Debug, Default)]
pub struct V4l2Backend;

impl V4l2Backend {
    pub fn new() -> Self {
        Self
    }

    /// `/dev/videoN` nodes sorted by N
    fn video_nodes() -> Vec<(u32, String)> {
        let mut nodes: Vec<(u32, String)> = std::fs::read_dir("/dev")
            .into_iter()
            .flatten()
            .flatten()
            .filter_map(|entry| {
                let name = entry.file_name();
                let index = name.to_str()?.strip_prefix("video")?.parse::<u32>().ok()?;
                Some((index, entry.path().to_string_lossy().to_string()))
            })
            .collect();
        nodes.sort_by_key(|(index, _)| *index);
        nodes
    }

    /// Mounting panel from the orientation control, falling back to the card name
    fn detect_panel(path: &str, card: &str) -> Panel {
        match v4l2_controls::get_control(path, V4L2_CID_CAMERA_ORIENTATION) {
            Some(V4L2_CAMERA_ORIENTATION_FRONT) => return Panel::Front,
            Some(V4L2_CAMERA_ORIENTATION_BACK) => return Panel::Back,
            _ => {}
        }
        panel_from_card(card)
    }
}

/// Guess the panel from a card name like "Front Camera" or "ov5640 rear"
pub fn panel_from_card(card: &str) -> Panel {
    let card = card.to_lowercase();
    card.split(|c: char| !c.is_alphanumeric())
        .map(Panel::from_location)
        .find(|panel| *panel != Panel::Unknown)
        .unwrap_or(Panel::Unknown)
}

impl CameraBackend for V4l2Backend {
    fn enumerate_cameras(&self) -> Vec<DeviceInfo> {
        let mut cameras = Vec::new();

        for (_, path) in Self::video_nodes() {
            let Ok(dev) = Device::with_path(&path) else {
                continue;
            };
            let Ok(caps) = dev.query_caps() else {
                continue;
            };
            if !caps
                .capabilities
                .contains(v4l::capability::Flags::VIDEO_CAPTURE)
            {
                continue;
            }
            // Metadata nodes report capture capability but no usable formats
            let usable = dev
                .enum_formats()
                .map(|formats| formats.iter().any(|f| is_preferred(&f.fourcc)))
                .unwrap_or(false);
            if !usable {
                debug!(path = %path, "Skipping node without usable formats");
                continue;
            }

            let panel = Self::detect_panel(&path, &caps.card);
            info!(path = %path, card = %caps.card, %panel, "Found V4L2 camera");

            let mut device = DeviceInfo::new(path.clone(), caps.card.clone(), panel);
            device.driver = Some(caps.driver.clone());
            cameras.push(device);
        }

        cameras
    }

    fn initialize(&self, device: &DeviceInfo) -> BackendResult<Box<dyn CaptureDevice>> {
        info!(path = %device.id, name = %device.name, "Opening V4L2 device");

        let dev = Device::with_path(&device.id)?;
        let formats = dev.enum_formats()?;

        let fourcc = PREFERRED_FOURCCS
            .iter()
            .map(|code| FourCC::new(code))
            .find(|wanted| formats.iter().any(|f| f.fourcc == *wanted))
            .ok_or_else(|| {
                BackendError::FormatNotSupported(format!(
                    "{} offers no luminance-compatible format",
                    device.id
                ))
            })?;

        let resolutions = enumerate_resolutions(&dev, fourcc);
        debug!(path = %device.id, ?fourcc, count = resolutions.len(), "Enumerated resolutions");

        let current = dev.format().ok();

        Ok(Box::new(V4l2Device {
            path: device.id.clone(),
            device: Some(dev),
            fourcc,
            resolutions,
            current: current.as_ref().map(|f| CameraResolution::new(f.width, f.height)),
            stride: current.map(|f| f.stride).unwrap_or(0),
            rotation: VideoRotation::None,
            stream: None,
            state: StreamState::NotStreaming,
            focus: V4l2Focus::probe(&device.id),
            torch: FlashTorch::detect(),
        }))
    }

    fn backend_type(&self) -> CameraBackendType {
        CameraBackendType::V4l2
    }
}

fn is_preferred(fourcc: &FourCC) -> bool {
    PREFERRED_FOURCCS.iter().any(|code| FourCC::new(code) == *fourcc)
}

/// Frame sizes for a format in driver order
///
/// Stepwise ranges are sampled at common sizes that fit.
fn enumerate_resolutions(dev: &Device, fourcc: FourCC) -> Vec<CameraResolution> {
    let Ok(sizes) = dev.enum_framesizes(fourcc) else {
        return Vec::new();
    };

    let mut resolutions = Vec::new();
    for size in sizes {
        match size.size {
            FrameSizeEnum::Discrete(d) => resolutions.push(CameraResolution::new(d.width, d.height)),
            FrameSizeEnum::Stepwise(s) => {
                resolutions.extend(
                    STEPWISE_SIZES
                        .iter()
                        .filter(|(w, h)| {
                            (s.min_width..=s.max_width).contains(w)
                                && (s.min_height..=s.max_height).contains(h)
                        })
                        .map(|(w, h)| CameraResolution::new(*w, *h)),
                );
            }
        }
    }

    let mut seen = std::collections::HashSet::new();
    resolutions.retain(|r| seen.insert(*r));
    resolutions
}

/// An open V4L2 capture node
pub struct V4l2Device {
    path: String,
    device: Option<Device>,
    fourcc: FourCC,
    resolutions: Vec<CameraResolution>,
    current: Option<CameraResolution>,
    stride: u32,
    rotation: VideoRotation,
    stream: Option<Stream<'static>>,
    state: StreamState,
    focus: V4l2Focus,
    torch: FlashTorch,
}

impl V4l2Device {
    fn device(&self) -> BackendResult<&Device> {
        self.device
            .as_ref()
            .ok_or_else(|| BackendError::DeviceNotFound(format!("{} is closed", self.path)))
    }

    fn open_stream(&mut self) -> BackendResult<()> {
        let dev = self.device()?;
        let mut stream: Stream<'static> =
            Stream::with_buffers(dev, Type::VideoCapture, BUFFER_COUNT)?;
        // The first dequeue queues every buffer and issues STREAMON
        stream.next()?;
        self.stream = Some(stream);
        Ok(())
    }

    /// Reduce a raw buffer to a rotated luminance frame
    fn to_luma_frame(&self, buf: &[u8], captured_at: Instant) -> BackendResult<CameraFrame> {
        let resolution = self.current.ok_or(BackendError::NotStreaming)?;
        let (width, height) = (resolution.width, resolution.height);

        let (luma, width, height) = if self.fourcc == FourCC::new(b"MJPG") {
            let gray = mjpeg_to_gray(buf)?;
            let (width, height) = gray.dimensions();
            (gray.into_raw(), width, height)
        } else {
            let format = PixelFormat::from_fourcc(&self.fourcc.repr).ok_or_else(|| {
                BackendError::FormatNotSupported(format!("{:?}", self.fourcc))
            })?;
            let raw = CameraFrame {
                width,
                height,
                data: Arc::from(buf),
                format,
                stride: self.stride,
                captured_at,
            };
            (frame_to_luma(&raw), width, height)
        };

        let (luma, width, height) = rotate_gray(luma, width, height, self.rotation);
        let mut frame = CameraFrame::from_gray(width, height, luma);
        frame.captured_at = captured_at;
        Ok(frame)
    }
}

impl CaptureDevice for V4l2Device {
    fn start_preview(&mut self) -> BackendResult<()> {
        if self.stream.is_some() {
            return Ok(());
        }
        self.open_stream()?;
        self.state = StreamState::Streaming;
        info!(path = %self.path, "V4L2 preview started");
        Ok(())
    }

    fn stop_preview(&mut self) -> BackendResult<()> {
        // Dropping the stream issues STREAMOFF and unmaps the buffers
        if self.stream.take().is_some() {
            info!(path = %self.path, "V4L2 preview stopped");
        }
        if self.state == StreamState::Streaming {
            self.state = StreamState::NotStreaming;
        }
        Ok(())
    }

    fn stream_state(&self) -> StreamState {
        self.state
    }

    fn preview_frame(&mut self) -> BackendResult<CameraFrame> {
        let stream = self.stream.as_mut().ok_or(BackendError::NotStreaming)?;
        let (buf, meta) = stream.next()?;
        let captured_at = Instant::now();
        let used = (meta.bytesused as usize).min(buf.len());
        let data = buf[..used].to_vec();
        self.to_luma_frame(&data, captured_at)
    }

    fn available_resolutions(&self) -> Vec<CameraResolution> {
        self.resolutions.clone()
    }

    fn set_preview_resolution(
        &mut self,
        resolution: CameraResolution,
        rotation: VideoRotation,
    ) -> BackendResult<()> {
        // Buffers must be released before the format can change
        let was_streaming = self.stream.is_some();
        self.stream = None;

        let format = Format::new(resolution.width, resolution.height, self.fourcc);
        let actual = self.device()?.set_format(&format)?;
        if actual.fourcc != self.fourcc {
            return Err(BackendError::FormatNotSupported(format!(
                "driver switched format to {:?}",
                actual.fourcc
            )));
        }

        self.current = Some(CameraResolution::new(actual.width, actual.height));
        self.stride = actual.stride;
        self.rotation = rotation;
        info!(
            path = %self.path,
            requested = %resolution,
            width = actual.width,
            height = actual.height,
            rotation = rotation.degrees(),
            "V4L2 format configured"
        );

        if was_streaming {
            self.open_stream()?;
        }
        Ok(())
    }

    fn preview_resolution(&self) -> Option<CameraResolution> {
        self.current
    }

    fn set_rotation(&mut self, rotation: VideoRotation) -> BackendResult<()> {
        debug!(path = %self.path, degrees = rotation.degrees(), "Applying software rotation");
        self.rotation = rotation;
        Ok(())
    }

    fn focus_control(&mut self) -> Option<&mut dyn FocusControl> {
        Some(&mut self.focus)
    }

    fn torch_control(&mut self) -> Option<&mut dyn TorchControl> {
        Some(&mut self.torch)
    }

    fn close(&mut self) {
        if self.state == StreamState::Shutdown {
            return;
        }
        let _ = self.stop_preview();
        if self.torch.enabled() {
            let _ = self.torch.set_enabled(false);
        }
        self.device = None;
        self.state = StreamState::Shutdown;
        info!(path = %self.path, "V4L2 device closed");
    }
}

impl Drop for V4l2Device {
    fn drop(&mut self) {
        self.close();
    }
}

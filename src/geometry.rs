// SPDX-License-Identifier: GPL-3.0-only

//! Preview geometry: rotation, letterboxing and tap-to-region mapping
//!
//! Everything in this module is a pure function of its inputs. The scan loop
//! recomputes a [`PreviewGeometry`] whenever the display orientation or the
//! negotiated resolution changes and uses it to translate UI taps into
//! normalized sensor-space regions of interest.
//!
//! # Coordinate spaces
//!
//! - **UI space**: pixels of the preview control, origin at the top left.
//! - **Active preview rect**: the part of the control that actually shows
//!   video (the control minus its letterbox bars), in UI space.
//! - **Normalized stream space**: `[0, 1] x [0, 1]` in the orientation of the
//!   native sensor stream. Focus regions are handed to the device in this space.

use serde::{Deserialize, Serialize};

/// Orientation of the UI relative to the device's native landscape orientation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DisplayOrientation {
    /// Native orientation, no rotation needed
    #[default]
    Landscape,
    /// Rotated 90° from landscape
    Portrait,
    /// Upside-down landscape
    LandscapeFlipped,
    /// Upside-down portrait
    PortraitFlipped,
}

impl DisplayOrientation {
    pub const ALL: [DisplayOrientation; 4] = [
        DisplayOrientation::Landscape,
        DisplayOrientation::Portrait,
        DisplayOrientation::LandscapeFlipped,
        DisplayOrientation::PortraitFlipped,
    ];

    /// Portrait orientations swap stream width and height
    pub fn is_portrait(&self) -> bool {
        matches!(
            self,
            DisplayOrientation::Portrait | DisplayOrientation::PortraitFlipped
        )
    }
}

impl std::fmt::Display for DisplayOrientation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DisplayOrientation::Landscape => write!(f, "landscape"),
            DisplayOrientation::Portrait => write!(f, "portrait"),
            DisplayOrientation::LandscapeFlipped => write!(f, "landscape-flipped"),
            DisplayOrientation::PortraitFlipped => write!(f, "portrait-flipped"),
        }
    }
}

/// Rotation token handed to the capture device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum VideoRotation {
    #[default]
    None,
    Clockwise90,
    Clockwise180,
    Clockwise270,
}

impl VideoRotation {
    /// Get the rotation in degrees
    pub fn degrees(&self) -> u32 {
        match self {
            VideoRotation::None => 0,
            VideoRotation::Clockwise90 => 90,
            VideoRotation::Clockwise180 => 180,
            VideoRotation::Clockwise270 => 270,
        }
    }

    /// Check if rotation swaps width and height
    pub fn swaps_dimensions(&self) -> bool {
        matches!(self, VideoRotation::Clockwise90 | VideoRotation::Clockwise270)
    }
}

impl std::fmt::Display for VideoRotation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}°", self.degrees())
    }
}

/// A point in UI coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A width/height pair
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// True when either dimension is non-positive
    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

/// An axis-aligned rectangle
///
/// Used both for UI-space rectangles and for normalized regions.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// The unit square `[0, 1] x [0, 1]`
    pub fn unit() -> Self {
        Self::new(0.0, 0.0, 1.0, 1.0)
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x && point.x <= self.right() && point.y >= self.y && point.y <= self.bottom()
    }

    /// Check that this rectangle lies fully inside the unit square
    pub fn is_normalized(&self) -> bool {
        self.x >= 0.0
            && self.y >= 0.0
            && self.width >= 0.0
            && self.height >= 0.0
            && self.right() <= 1.0 + f64::EPSILON
            && self.bottom() <= 1.0 + f64::EPSILON
    }
}

/// Rotation to apply to the preview for a given UI orientation
///
/// Front-facing (mirrored) previews invert the direction of the portrait
/// rotations. A 180° rotation is the same either way.
pub fn compute_rotation(orientation: DisplayOrientation, mirrored: bool) -> (VideoRotation, u32) {
    let rotation = match orientation {
        DisplayOrientation::Portrait if mirrored => VideoRotation::Clockwise270,
        DisplayOrientation::Portrait => VideoRotation::Clockwise90,
        DisplayOrientation::LandscapeFlipped => VideoRotation::Clockwise180,
        DisplayOrientation::PortraitFlipped if mirrored => VideoRotation::Clockwise90,
        DisplayOrientation::PortraitFlipped => VideoRotation::Clockwise270,
        DisplayOrientation::Landscape => VideoRotation::None,
    };

    (rotation, rotation.degrees())
}

/// Stream size as seen by the UI
///
/// For portrait orientations the native width and height are swapped.
pub fn preview_stream_size(width: u32, height: u32, orientation: DisplayOrientation) -> Size {
    if orientation.is_portrait() {
        Size::new(height as f64, width as f64)
    } else {
        Size::new(width as f64, height as f64)
    }
}

/// Area of the preview control that actually shows video
///
/// The stream is scaled uniformly to fit the control. If the control is
/// relatively wider than the stream the bars are on the left and right,
/// otherwise on the top and bottom. Returns an empty rect when either size
/// has a non-positive dimension.
pub fn active_preview_rect(control: Size, stream: Size) -> Rect {
    if control.is_empty() || stream.is_empty() {
        return Rect::default();
    }

    let mut result = Rect::new(0.0, 0.0, control.width, control.height);

    if control.width / control.height > stream.width / stream.height {
        let scale = control.height / stream.height;
        let scaled_width = stream.width * scale;

        result.x = (control.width - scaled_width) / 2.0;
        result.width = scaled_width;
    } else {
        let scale = control.width / stream.width;
        let scaled_height = stream.height * scale;

        result.y = (control.height - scaled_height) / 2.0;
        result.height = scaled_height;
    }

    result
}

/// Map a UI tap to a normalized focus rectangle in native stream orientation
///
/// The box of `box_size` is centered on `tap`, rotated into stream space,
/// made relative to the active preview area and normalized. The result is
/// clamped so it never leaves the unit square. A box larger than the active
/// area is shrunk to the full extent of that axis. Without an active area
/// (layout not done yet) the whole frame is returned.
pub fn tap_to_region_of_interest(
    tap: Point,
    box_size: Size,
    active: Rect,
    orientation: DisplayOrientation,
) -> Rect {
    if active.is_empty() {
        return Rect::unit();
    }

    let mut left = tap.x - box_size.width / 2.0;
    let mut top = tap.y - box_size.height / 2.0;

    match orientation {
        DisplayOrientation::Portrait => {
            let original_left = left;
            left = top;
            top = active.width - original_left;
        }
        DisplayOrientation::LandscapeFlipped => {
            left = active.width - left;
            top = active.height - top;
        }
        DisplayOrientation::PortraitFlipped => {
            let original_top = top;
            top = left;
            left = active.width - original_top;
        }
        DisplayOrientation::Landscape => {}
    }

    let (preview_width, preview_height, preview_left, preview_top) = if orientation.is_portrait() {
        (active.height, active.width, active.y, active.x)
    } else {
        (active.width, active.height, active.x, active.y)
    };

    let width = (box_size.width.max(0.0) / preview_width).min(1.0);
    let height = (box_size.height.max(0.0) / preview_height).min(1.0);

    left = (left - preview_left) / preview_width;
    top = (top - preview_top) / preview_height;

    left = left.max(0.0).min(1.0 - width);
    top = top.max(0.0).min(1.0 - height);

    Rect::new(left, top, width, height)
}

/// Geometry of the running preview stream
///
/// Recomputed (never mutated) on every orientation or resolution change.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreviewGeometry {
    /// Native stream width in pixels
    pub stream_width: u32,
    /// Native stream height in pixels
    pub stream_height: u32,
    /// Rotation token applied to the device
    pub rotation: VideoRotation,
    /// Rotation in degrees, as tagged on the stream
    pub rotation_degrees: u32,
    /// Whether the preview is horizontally mirrored
    pub mirrored: bool,
    /// UI orientation this geometry was computed for
    pub orientation: DisplayOrientation,
}

impl PreviewGeometry {
    pub fn new(
        stream_width: u32,
        stream_height: u32,
        orientation: DisplayOrientation,
        mirrored: bool,
    ) -> Self {
        let (rotation, rotation_degrees) = compute_rotation(orientation, mirrored);
        Self {
            stream_width,
            stream_height,
            rotation,
            rotation_degrees,
            mirrored,
            orientation,
        }
    }

    /// Stream size in UI orientation
    pub fn oriented_stream_size(&self) -> Size {
        preview_stream_size(self.stream_width, self.stream_height, self.orientation)
    }

    /// Active preview rect for a control of the given size
    pub fn active_rect(&self, control: Size) -> Rect {
        active_preview_rect(control, self.oriented_stream_size())
    }

    /// Normalized focus region for a tap inside a control of the given size
    pub fn tap_region(&self, tap: Point, box_size: Size, control: Size) -> Rect {
        tap_to_region_of_interest(tap, box_size, self.active_rect(control), self.orientation)
    }
}

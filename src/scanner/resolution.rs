// SPDX-License-Identifier: GPL-3.0-only

//! Preview resolution selection

use crate::backends::camera::CameraResolution;
use crate::constants::resolution::{HEIGHT_RANGE, WIDTH_RANGE};
use std::sync::Arc;
use tracing::debug;

/// User-supplied resolution picker
///
/// Receives the device's resolutions in reported order. Returning `None`
/// defers to [`default_resolution`].
pub type ResolutionPicker =
    Arc<dyn Fn(&[CameraResolution]) -> Option<CameraResolution> + Send + Sync>;

/// First resolution inside the preferred window, else the last reported one
///
/// Device order is preserved on purpose: the fallback is the last entry,
/// not the largest.
pub fn default_resolution(available: &[CameraResolution]) -> Option<CameraResolution> {
    available
        .iter()
        .find(|r| WIDTH_RANGE.contains(&r.width) && HEIGHT_RANGE.contains(&r.height))
        .or_else(|| available.last())
        .copied()
}

/// Choose the preview resolution
///
/// `None` means the device offered nothing, which usually means another
/// application holds the camera.
pub fn choose_resolution(
    available: &[CameraResolution],
    picker: Option<&ResolutionPicker>,
) -> Option<CameraResolution> {
    if available.is_empty() {
        return None;
    }

    if let Some(picker) = picker {
        if let Some(picked) = picker(available) {
            debug!(resolution = %picked, "Resolution chosen by picker");
            return Some(picked);
        }
        debug!("Picker declined, using default heuristic");
    }

    let chosen = default_resolution(available);
    if let Some(resolution) = chosen {
        debug!(%resolution, "Resolution chosen by heuristic");
    }
    chosen
}

// SPDX-License-Identifier: GPL-3.0-only

//! Focus and torch control
//!
//! Thin policy layer over a device's optional capabilities. Every function
//! tolerates a device that lacks the capability and reports device errors
//! as [`ScanError::Focus`] for the caller to log.

use crate::backends::camera::{
    AutoFocusRange, CaptureDevice, FocusMode, FocusSettings, ManualFocusDistance,
    RegionOfInterest, StreamState,
};
use crate::constants::focus::REGION_WEIGHT;
use crate::errors::{ScanError, ScanResult};
use crate::geometry::Rect;
use tracing::{debug, info};

/// Whether the device exposes a usable focus control
pub fn is_focus_supported(device: &mut dyn CaptureDevice) -> bool {
    device.focus_control().is_some_and(|f| f.supported())
}

/// Whether the device exposes a usable torch
pub fn has_torch(device: &mut dyn CaptureDevice) -> bool {
    device.torch_control().is_some_and(|t| t.supported())
}

pub fn is_torch_on(device: &mut dyn CaptureDevice) -> bool {
    device
        .torch_control()
        .is_some_and(|t| t.supported() && t.enabled())
}

/// Preferred element if supported, else the first supported one
fn prefer<T: Copy + PartialEq>(supported: &[T], preferred: T) -> Option<T> {
    if supported.contains(&preferred) {
        Some(preferred)
    } else {
        supported.first().copied()
    }
}

/// Configure focus right after the preview starts
///
/// With autofocus disabled the lens is parked at its nearest position.
/// Otherwise continuous autofocus is preferred over one-shot autofocus,
/// over the full range when available, and one focus pass is requested.
pub fn configure_initial_focus(
    device: &mut dyn CaptureDevice,
    disable_autofocus: bool,
) -> ScanResult<()> {
    let Some(focus) = device.focus_control() else {
        return Ok(());
    };
    if !focus.supported() {
        return Ok(());
    }

    if disable_autofocus {
        info!("Autofocus disabled, using manual nearest focus");
        let settings = FocusSettings {
            mode: Some(FocusMode::Manual),
            distance: Some(ManualFocusDistance::Nearest),
            ..Default::default()
        };
        return focus.configure(&settings).map_err(ScanError::Focus);
    }

    let modes = focus.supported_modes();
    let mode = if modes.contains(&FocusMode::Continuous) {
        Some(FocusMode::Continuous)
    } else if modes.contains(&FocusMode::Auto) {
        Some(FocusMode::Auto)
    } else {
        None
    };

    let Some(mode) = mode else {
        debug!(?modes, "No autofocus mode available");
        return Ok(());
    };

    let settings = FocusSettings {
        mode: Some(mode),
        auto_focus_range: prefer(&focus.supported_ranges(), AutoFocusRange::FullRange),
        distance: None,
        wait_for_focus: false,
    };
    debug!(?settings, "Configuring initial focus");
    focus.configure(&settings).map_err(ScanError::Focus)?;
    focus.focus().map_err(ScanError::Focus)
}

/// Focus on a normalized region, or refocus generally when `region` is `None`
///
/// Regions are only submitted when the device supports autofocus regions.
/// A no-op unless the device is streaming and can focus.
pub fn focus_at(device: &mut dyn CaptureDevice, region: Option<Rect>) -> ScanResult<()> {
    if device.stream_state() != StreamState::Streaming || !is_focus_supported(device) {
        return Ok(());
    }

    let regions_supported = device
        .region_of_interest_control()
        .is_some_and(|roi| roi.auto_focus_supported() && roi.max_regions() > 0);

    if regions_supported {
        if let Some(roi) = device.region_of_interest_control() {
            match region {
                Some(bounds) => {
                    debug!(?bounds, "Setting focus region");
                    let region = RegionOfInterest {
                        bounds,
                        auto_focus_enabled: true,
                        weight: REGION_WEIGHT,
                    };
                    roi.set_regions(&[region], true).map_err(ScanError::Focus)?;
                }
                None => roi.clear_regions().map_err(ScanError::Focus)?,
            }
        }

        if region.is_some()
            && let Some(focus) = device.focus_control()
        {
            let settings = FocusSettings {
                mode: prefer(&focus.supported_modes(), FocusMode::Single),
                auto_focus_range: prefer(&focus.supported_ranges(), AutoFocusRange::FullRange),
                ..Default::default()
            };
            focus.configure(&settings).map_err(ScanError::Focus)?;
        }
    }

    match device.focus_control() {
        Some(focus) => focus.focus().map_err(ScanError::Focus),
        None => Ok(()),
    }
}

/// Switch the torch; returns `false` when the device has none
pub fn set_torch(device: &mut dyn CaptureDevice, on: bool) -> ScanResult<bool> {
    match device.torch_control() {
        Some(torch) if torch.supported() => {
            torch.set_enabled(on).map_err(ScanError::Focus)?;
            info!(on, "Torch switched");
            Ok(true)
        }
        _ => Ok(false),
    }
}

pub fn toggle_torch(device: &mut dyn CaptureDevice) -> ScanResult<bool> {
    let on = is_torch_on(device);
    set_torch(device, !on)
}

// SPDX-License-Identifier: GPL-3.0-only

//! Focus capability for V4L2 devices
//!
//! Maps the generic focus modes onto V4L2 camera-class controls:
//!
//! | Mode         | Control                         |
//! |--------------|---------------------------------|
//! | `Continuous` | `FOCUS_AUTO = 1`                |
//! | `Auto`       | `FOCUS_AUTO = 0` + `AUTO_FOCUS_START` on `focus()` |
//! | `Single`     | same as `Auto`                  |
//! | `Manual`     | `FOCUS_AUTO = 0` + `FOCUS_ABSOLUTE` |

use crate::backends::camera::v4l2_controls::{
    self, FocusCapabilities, V4L2_AUTO_FOCUS_RANGE_AUTO, V4L2_AUTO_FOCUS_RANGE_MACRO,
    V4L2_AUTO_FOCUS_RANGE_NORMAL, V4L2_CID_AUTO_FOCUS_RANGE, V4L2_CID_AUTO_FOCUS_START,
    V4L2_CID_FOCUS_ABSOLUTE, V4L2_CID_FOCUS_AUTO,
};
use crate::backends::camera::{
    AutoFocusRange, BackendError, BackendResult, FocusControl, FocusMode, FocusSettings,
    ManualFocusDistance,
};
use tracing::debug;

/// Focus control backed by V4L2 ioctls on the device node
pub struct V4l2Focus {
    path: String,
    caps: FocusCapabilities,
    settings: FocusSettings,
}

impl V4l2Focus {
    /// Probe the device's focus controls
    pub fn probe(path: &str) -> Self {
        Self {
            path: path.to_string(),
            caps: v4l2_controls::probe_focus(path),
            settings: FocusSettings::default(),
        }
    }

    fn range_value(range: AutoFocusRange) -> i32 {
        match range {
            AutoFocusRange::FullRange => V4L2_AUTO_FOCUS_RANGE_AUTO,
            AutoFocusRange::Normal => V4L2_AUTO_FOCUS_RANGE_NORMAL,
            AutoFocusRange::Macro => V4L2_AUTO_FOCUS_RANGE_MACRO,
        }
    }

    fn set_continuous(&self, enabled: bool) -> BackendResult<()> {
        if self.caps.continuous {
            v4l2_controls::set_control(&self.path, V4L2_CID_FOCUS_AUTO, enabled as i32)?;
        }
        Ok(())
    }
}

impl FocusControl for V4l2Focus {
    fn supported(&self) -> bool {
        self.caps.any()
    }

    fn supported_modes(&self) -> Vec<FocusMode> {
        let mut modes = Vec::new();
        if self.caps.continuous {
            modes.push(FocusMode::Continuous);
        }
        if self.caps.one_shot {
            modes.push(FocusMode::Auto);
            modes.push(FocusMode::Single);
        }
        if self.caps.absolute.is_some() {
            modes.push(FocusMode::Manual);
        }
        modes
    }

    fn supported_ranges(&self) -> Vec<AutoFocusRange> {
        self.caps
            .ranges
            .iter()
            .filter_map(|value| match *value {
                V4L2_AUTO_FOCUS_RANGE_AUTO => Some(AutoFocusRange::FullRange),
                V4L2_AUTO_FOCUS_RANGE_NORMAL => Some(AutoFocusRange::Normal),
                V4L2_AUTO_FOCUS_RANGE_MACRO => Some(AutoFocusRange::Macro),
                _ => None,
            })
            .collect()
    }

    fn configure(&mut self, settings: &FocusSettings) -> BackendResult<()> {
        debug!(path = %self.path, ?settings, "Configuring V4L2 focus");

        match settings.mode {
            Some(FocusMode::Continuous) => self.set_continuous(true)?,
            Some(FocusMode::Auto | FocusMode::Single) => self.set_continuous(false)?,
            Some(FocusMode::Manual) => {
                let info = self.caps.absolute.clone().ok_or_else(|| {
                    BackendError::Unsupported("manual focus".to_string())
                })?;
                self.set_continuous(false)?;
                let position = match settings.distance.unwrap_or(ManualFocusDistance::Nearest) {
                    ManualFocusDistance::Nearest => info.maximum,
                    ManualFocusDistance::Infinity => info.minimum,
                    ManualFocusDistance::Hyperfocal => info.default_value,
                };
                v4l2_controls::set_control(&self.path, V4L2_CID_FOCUS_ABSOLUTE, position)?;
            }
            None => {}
        }

        if let Some(range) = settings.auto_focus_range {
            let value = Self::range_value(range);
            if self.caps.ranges.contains(&value) {
                v4l2_controls::set_control(&self.path, V4L2_CID_AUTO_FOCUS_RANGE, value)?;
            }
        }

        self.settings = *settings;
        Ok(())
    }

    fn focus(&mut self) -> BackendResult<()> {
        match self.settings.mode {
            Some(FocusMode::Auto | FocusMode::Single) | None if self.caps.one_shot => {
                v4l2_controls::set_control(&self.path, V4L2_CID_AUTO_FOCUS_START, 1)
            }
            // Continuous and manual focus need no trigger
            _ => Ok(()),
        }
    }
}

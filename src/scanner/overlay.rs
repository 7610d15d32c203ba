// SPDX-License-Identifier: GPL-3.0-only

//! Host-side collaborators: overlay chrome and the keep-awake request
//!
//! The scanner does no rendering. It tells an [`OverlayHost`] which overlay
//! to show and where the video actually is, and asks a [`DisplayRequest`]
//! to keep the screen on while a session runs.

use crate::backends::camera::BackendResult;
use crate::constants::overlay::{DEFAULT_BOTTOM_TEXT, DEFAULT_TOP_TEXT};
use crate::geometry::Rect;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Which overlay the host should display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OverlayMode {
    /// Built-in overlay with the prompt texts
    #[default]
    Default,
    /// Host-provided overlay
    Custom,
}

/// Overlay configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerOverlay {
    /// Prompt shown above the viewfinder
    pub top_text: String,
    /// Prompt shown below the viewfinder
    pub bottom_text: String,
    /// Show the host's custom overlay instead of the default one
    pub use_custom_overlay: bool,
}

impl Default for ScannerOverlay {
    fn default() -> Self {
        Self {
            top_text: DEFAULT_TOP_TEXT.to_string(),
            bottom_text: DEFAULT_BOTTOM_TEXT.to_string(),
            use_custom_overlay: false,
        }
    }
}

impl ScannerOverlay {
    pub fn mode(&self) -> OverlayMode {
        if self.use_custom_overlay {
            OverlayMode::Custom
        } else {
            OverlayMode::Default
        }
    }
}

/// UI host rendering the preview chrome
pub trait OverlayHost: Send + Sync {
    /// Show the overlay for a starting session
    fn show(&self, mode: OverlayMode, overlay: &ScannerOverlay);

    /// Visible video area and mirroring changed
    fn set_preview_layout(&self, active_rect: Rect, mirrored: bool);

    /// Take down a custom overlay when the session stops
    fn remove_custom_overlay(&self);

    /// Drop all overlay content on dispose
    fn clear(&self);
}

/// Keep-screen-awake lock
pub trait DisplayRequest: Send + Sync {
    fn request_active(&self) -> BackendResult<()>;

    fn request_release(&self) -> BackendResult<()>;
}

/// Host that renders nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopOverlayHost;

impl OverlayHost for NoopOverlayHost {
    fn show(&self, mode: OverlayMode, _overlay: &ScannerOverlay) {
        debug!(?mode, "Overlay shown");
    }

    fn set_preview_layout(&self, active_rect: Rect, mirrored: bool) {
        debug!(?active_rect, mirrored, "Preview layout changed");
    }

    fn remove_custom_overlay(&self) {}

    fn clear(&self) {}
}

/// Display request that does nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopDisplayRequest;

impl DisplayRequest for NoopDisplayRequest {
    fn request_active(&self) -> BackendResult<()> {
        Ok(())
    }

    fn request_release(&self) -> BackendResult<()> {
        Ok(())
    }
}

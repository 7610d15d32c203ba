// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

/// Scan loop cadence defaults
pub mod timing {
    /// Delay between decode attempts while nothing has been found
    pub const DELAY_BETWEEN_FRAMES_MS: u64 = 150;

    /// Delay after a successful scan before the next attempt
    pub const DELAY_BETWEEN_CONTINUOUS_SCANS_MS: u64 = 1000;

    /// Delay between preview start and the first tick
    pub const INITIAL_DELAY_BEFORE_SCAN_MS: u64 = 300;

    /// Capacity of the scanned-event broadcast channel
    pub const EVENT_CHANNEL_CAPACITY: usize = 16;
}

/// Default resolution heuristic window
pub mod resolution {
    use std::ops::RangeInclusive;

    /// Acceptable preview widths, inclusive
    pub const WIDTH_RANGE: RangeInclusive<u32> = 640..=1000;

    /// Acceptable preview heights, inclusive
    pub const HEIGHT_RANGE: RangeInclusive<u32> = 360..=1000;
}

/// Tap-to-focus parameters
pub mod focus {
    /// Side of the focus box centered on a tap, in UI units
    pub const FOCUS_BOX_SIZE: f64 = 20.0;

    /// Weight given to a tap-derived region of interest
    pub const REGION_WEIGHT: u32 = 100;
}

/// Capture backend parameters
pub mod capture {
    /// Number of mmap buffers requested from V4L2 drivers
    pub const BUFFER_COUNT: u32 = 4;

    /// Sizes offered for drivers that report stepwise frame size ranges
    pub const STEPWISE_SIZES: [(u32, u32); 6] = [
        (640, 480),
        (800, 600),
        (960, 720),
        (1280, 720),
        (1280, 960),
        (1920, 1080),
    ];
}

/// Overlay defaults
pub mod overlay {
    pub const DEFAULT_TOP_TEXT: &str = "Hold the camera up to the barcode";

    pub const DEFAULT_BOTTOM_TEXT: &str = "About 6 inches away";
}

/// Supported file format extensions
pub mod file_formats {
    /// Image extensions the virtual camera can serve
    pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "webp"];

    /// Check if a path has a supported image extension
    pub fn is_image_extension(path: &std::path::Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| IMAGE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
            .unwrap_or(false)
    }
}

/// Application information utilities
pub mod app_info {
    /// Application name, also used as the config directory name
    pub const APP_NAME: &str = "camera-scanner";

    /// Get the application version from build-time environment
    pub fn version() -> &'static str {
        env!("GIT_VERSION")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_image_extensions() {
        assert!(file_formats::is_image_extension(Path::new("qr.PNG")));
        assert!(file_formats::is_image_extension(Path::new("/tmp/code.jpeg")));
        assert!(!file_formats::is_image_extension(Path::new("clip.mp4")));
        assert!(!file_formats::is_image_extension(Path::new("noext")));
    }

    #[test]
    fn test_resolution_window() {
        assert!(resolution::WIDTH_RANGE.contains(&640));
        assert!(resolution::WIDTH_RANGE.contains(&1000));
        assert!(!resolution::HEIGHT_RANGE.contains(&359));
    }
}

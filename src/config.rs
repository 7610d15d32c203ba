// SPDX-License-Identifier: GPL-3.0-only

use crate::backends::camera::CameraBackendType;
use crate::constants::app_info::APP_NAME;
use crate::constants::{focus, timing};
use crate::errors::{ScanError, ScanResult};
use crate::frame_processor::{
    BarcodeDecoder, BarcodeFormat, DecodeHints, DecoderFactory, default_decoder_factory,
};
use crate::scanner::{ResolutionPicker, ScannerOverlay};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Options for one scan session
///
/// Taken by value when a session starts; later changes only affect the next
/// session.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanOptions {
    /// Delay between decode attempts while nothing is found, in milliseconds
    pub delay_between_analyzing_frames_ms: u64,
    /// Delay after a successful scan, in milliseconds
    pub delay_between_continuous_scans_ms: u64,
    /// Delay before the first decode attempt, in milliseconds
    pub initial_delay_before_analyzing_frames_ms: u64,
    /// Report every symbol in a frame
    pub scan_multiple: bool,
    /// Park the lens at its nearest position instead of autofocusing
    pub disable_autofocus: bool,
    /// `Some(true)` prefers the front camera, otherwise the back camera
    pub use_front_camera: Option<bool>,
    /// Also try the inverted image
    pub try_inverted: bool,
    /// Restrict results to these formats; empty accepts all
    pub possible_formats: Vec<BarcodeFormat>,
    /// Overrides the default resolution heuristic
    #[serde(skip)]
    pub resolution_selector: Option<ResolutionPicker>,
    /// Builds the session's decoder; the QR decoder when unset
    #[serde(skip)]
    pub decoder_factory: Option<DecoderFactory>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            delay_between_analyzing_frames_ms: timing::DELAY_BETWEEN_FRAMES_MS,
            delay_between_continuous_scans_ms: timing::DELAY_BETWEEN_CONTINUOUS_SCANS_MS,
            initial_delay_before_analyzing_frames_ms: timing::INITIAL_DELAY_BEFORE_SCAN_MS,
            scan_multiple: false,
            disable_autofocus: false,
            use_front_camera: None,
            try_inverted: false,
            possible_formats: Vec::new(),
            resolution_selector: None,
            decoder_factory: None,
        }
    }
}

impl std::fmt::Debug for ScanOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanOptions")
            .field("delay_between_analyzing_frames_ms", &self.delay_between_analyzing_frames_ms)
            .field("delay_between_continuous_scans_ms", &self.delay_between_continuous_scans_ms)
            .field(
                "initial_delay_before_analyzing_frames_ms",
                &self.initial_delay_before_analyzing_frames_ms,
            )
            .field("scan_multiple", &self.scan_multiple)
            .field("disable_autofocus", &self.disable_autofocus)
            .field("use_front_camera", &self.use_front_camera)
            .field("try_inverted", &self.try_inverted)
            .field("possible_formats", &self.possible_formats)
            .field("resolution_selector", &self.resolution_selector.is_some())
            .field("decoder_factory", &self.decoder_factory.is_some())
            .finish()
    }
}

impl ScanOptions {
    pub fn delay_between_frames(&self) -> Duration {
        Duration::from_millis(self.delay_between_analyzing_frames_ms)
    }

    pub fn delay_between_continuous_scans(&self) -> Duration {
        Duration::from_millis(self.delay_between_continuous_scans_ms)
    }

    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_before_analyzing_frames_ms)
    }

    pub fn decode_hints(&self) -> DecodeHints {
        DecodeHints {
            scan_multiple: self.scan_multiple,
            try_inverted: self.try_inverted,
            possible_formats: self.possible_formats.clone(),
        }
    }

    /// Build the session's decoder
    pub fn build_decoder(&self) -> Box<dyn BarcodeDecoder> {
        let factory = self
            .decoder_factory
            .clone()
            .unwrap_or_else(default_decoder_factory);
        factory()
    }
}

/// Persisted command line settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Session options
    pub scan_options: ScanOptions,
    /// Last used camera device id
    pub last_camera_path: Option<String>,
    /// Camera backend to use
    pub backend: CameraBackendType,
    /// Side of the tap-to-focus box, in UI units
    pub focus_box_size: f64,
    /// Overlay prompts
    pub overlay: ScannerOverlay,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scan_options: ScanOptions::default(),
            last_camera_path: None,
            backend: CameraBackendType::default(),
            focus_box_size: focus::FOCUS_BOX_SIZE,
            overlay: ScannerOverlay::default(),
        }
    }
}

impl Config {
    /// `<config dir>/camera-scanner/config.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_NAME).join("config.json"))
    }

    /// Load from the default location, falling back to defaults
    pub fn load() -> Self {
        let Some(path) = Self::default_path() else {
            warn!("No config directory, using default settings");
            return Self::default();
        };

        match Self::load_from(&path) {
            Ok(config) => config,
            Err(e) => {
                // A missing file on first run is expected
                if path.exists() {
                    warn!(path = %path.display(), error = %e, "Failed to load config, using defaults");
                } else {
                    debug!(path = %path.display(), "No config file, using defaults");
                }
                Self::default()
            }
        }
    }

    pub fn load_from(path: &Path) -> ScanResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&contents)?;
        Ok(config)
    }

    /// Save to the default location, returning the path written
    pub fn save(&self) -> ScanResult<PathBuf> {
        let path = Self::default_path()
            .ok_or_else(|| ScanError::Config("no config directory".to_string()))?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> ScanResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        info!(path = %path.display(), "Config saved");
        Ok(())
    }
}

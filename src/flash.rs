// SPDX-License-Identifier: GPL-3.0-only

//! Torch control via Linux sysfs flash LEDs
//!
//! V4L2 webcams rarely expose a torch control, but phones and tablets running
//! mainline kernels do expose their flash LEDs at `/sys/class/leds/*:flash`.
//! Writing the `brightness` file drives the LED in torch mode, which is
//! group-writable (usually `feedbackd`) without root.

use crate::backends::camera::{BackendError, BackendResult, TorchControl};
use std::io;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const LEDS_DIR: &str = "/sys/class/leds";

/// A flash LED discovered via sysfs
#[derive(Debug, Clone)]
pub struct FlashDevice {
    /// Sysfs path, e.g. `/sys/class/leds/white:flash`
    path: PathBuf,
    /// Value of the `max_brightness` file
    max_brightness: u32,
    /// Directory basename
    name: String,
}

impl FlashDevice {
    /// Open an LED directory, validating its `max_brightness`
    fn open(led_path: PathBuf, name: &str) -> Option<Self> {
        let max_brightness_path = led_path.join("max_brightness");
        let max_brightness = match std::fs::read_to_string(&max_brightness_path) {
            Ok(s) => match s.trim().parse::<u32>() {
                Ok(v) if v > 0 => v,
                _ => {
                    warn!(path = %max_brightness_path.display(), "Invalid max_brightness value");
                    return None;
                }
            },
            Err(e) => {
                warn!(path = %max_brightness_path.display(), error = %e, "Cannot read max_brightness");
                return None;
            }
        };

        Some(Self {
            path: led_path,
            max_brightness,
            name: name.to_string(),
        })
    }

    /// Get the device name (e.g. "white:flash")
    pub fn name(&self) -> &str {
        &self.name
    }

    fn brightness_path(&self) -> PathBuf {
        self.path.join("brightness")
    }

    /// Set raw brightness (0 = off, max_brightness = full)
    pub fn set_brightness(&self, value: u32) -> io::Result<()> {
        let clamped = value.min(self.max_brightness);
        std::fs::write(self.brightness_path(), clamped.to_string())
    }

    pub fn off(&self) -> io::Result<()> {
        self.set_brightness(0)
    }

    /// Turn on at a fraction of max brightness (0.0 = off, 1.0 = full)
    pub fn torch(&self, intensity: f32) -> io::Result<()> {
        let clamped = intensity.clamp(0.0, 1.0);
        let value = (clamped * self.max_brightness as f32).round() as u32;
        self.set_brightness(value)
    }
}

/// Result of flash LED detection
///
/// Separates "hardware exists" from "we can control it" so callers can
/// report a permission problem instead of silently hiding the torch.
#[derive(Debug, Default)]
pub struct FlashHardware {
    /// LEDs we can write to
    pub devices: Vec<FlashDevice>,
    /// Set when LEDs exist but none is writable
    pub permission_error: Option<String>,
}

impl FlashHardware {
    /// Scan `/sys/class/leds/` for `*:flash` entries
    pub fn detect() -> Self {
        Self::detect_in(Path::new(LEDS_DIR))
    }

    /// Scan an arbitrary sysfs-style LED directory
    pub fn detect_in(leds_dir: &Path) -> Self {
        let Ok(entries) = std::fs::read_dir(leds_dir) else {
            debug!(dir = %leds_dir.display(), "Cannot read LED directory, no torch");
            return Self::default();
        };

        let mut devices = Vec::new();
        let mut permission_failures: Vec<PathBuf> = Vec::new();

        for entry in entries.flatten() {
            let name = entry.file_name();
            let Some(name_str) = name.to_str() else {
                continue;
            };
            if !name_str.ends_with(":flash") {
                continue;
            }

            let Some(device) = FlashDevice::open(entry.path(), name_str) else {
                continue;
            };

            match std::fs::OpenOptions::new()
                .write(true)
                .open(device.brightness_path())
            {
                Ok(_) => {
                    info!(name = name_str, max_brightness = device.max_brightness, "Discovered flash LED");
                    devices.push(device);
                }
                Err(e) => {
                    warn!(
                        path = %device.brightness_path().display(),
                        error = %e,
                        "Flash LED found but not writable"
                    );
                    permission_failures.push(device.brightness_path());
                }
            }
        }

        // Deterministic order (white before yellow)
        devices.sort_by(|a, b| a.name.cmp(&b.name));

        let permission_error = if devices.is_empty() && !permission_failures.is_empty() {
            Some(Self::build_permission_error(&permission_failures))
        } else {
            None
        };

        Self {
            devices,
            permission_error,
        }
    }

    pub fn has_devices(&self) -> bool {
        !self.devices.is_empty()
    }

    /// Explain how to get write access, naming the owning group when it can
    /// be resolved from `/etc/group`
    fn build_permission_error(failures: &[PathBuf]) -> String {
        let username = std::env::var("USER").unwrap_or_else(|_| "user".to_string());

        let escalation_tool = if Path::new("/usr/bin/doas").exists() {
            "doas"
        } else {
            "sudo"
        };

        let group = failures
            .first()
            .and_then(|path| {
                let gid = std::fs::metadata(path).ok()?.gid();
                let group_contents = std::fs::read_to_string("/etc/group").ok()?;
                group_contents.lines().find_map(|line| {
                    let parts: Vec<&str> = line.split(':').collect();
                    (parts.len() >= 3 && parts[2].parse::<u32>().ok() == Some(gid))
                        .then(|| parts[0].to_string())
                })
            })
            .unwrap_or_else(|| "feedbackd".to_string());

        format!(
            "Flash LEDs detected but cannot be controlled. \
             Run: {escalation_tool} adduser {username} {group}, then log in again."
        )
    }
}

/// Torch built from every writable flash LED
#[derive(Debug, Default)]
pub struct FlashTorch {
    devices: Vec<FlashDevice>,
    enabled: bool,
}

impl FlashTorch {
    pub fn new(hardware: FlashHardware) -> Self {
        if let Some(err) = &hardware.permission_error {
            warn!(%err, "Torch unavailable");
        }
        Self {
            devices: hardware.devices,
            enabled: false,
        }
    }

    /// Detect the system's flash LEDs
    pub fn detect() -> Self {
        Self::new(FlashHardware::detect())
    }
}

impl TorchControl for FlashTorch {
    fn supported(&self) -> bool {
        !self.devices.is_empty()
    }

    fn enabled(&self) -> bool {
        self.enabled
    }

    fn set_enabled(&mut self, on: bool) -> BackendResult<()> {
        if self.devices.is_empty() {
            return Err(BackendError::Unsupported("torch".to_string()));
        }

        let mut last_error = None;
        for dev in &self.devices {
            let result = if on { dev.torch(1.0) } else { dev.off() };
            if let Err(e) = result {
                warn!(device = %dev.name, error = %e, on, "Failed to switch flash LED");
                last_error = Some(e);
            }
        }

        match last_error {
            Some(e) if on => Err(BackendError::from(e)),
            _ => {
                self.enabled = on;
                Ok(())
            }
        }
    }
}

impl Drop for FlashTorch {
    fn drop(&mut self) {
        if self.enabled {
            for dev in &self.devices {
                let _ = dev.off();
            }
        }
    }
}

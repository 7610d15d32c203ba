// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands for scanner operations
//!
//! This module provides command-line functionality for:
//! - Listing available cameras and their resolutions
//! - Scanning barcodes from a camera or still images

use camera_scanner::backends::camera::{
    BackendResult, CameraBackend, CameraBackendType, CaptureDevice, DeviceInfo,
    get_backend_for_type,
};
use camera_scanner::geometry::Rect;
use camera_scanner::scanner::{OverlayHost, OverlayMode, ScannerOverlay};
use camera_scanner::{Config, ScannerControl};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

/// Arguments of the `scan` command
pub struct ScanArgs {
    pub camera: Option<usize>,
    pub front: bool,
    pub multiple: bool,
    pub once: bool,
    pub try_inverted: bool,
    pub timeout: Option<u64>,
    pub images: Vec<PathBuf>,
    pub save_config: bool,
}

fn backend_for(config: &Config, images: &[PathBuf]) -> Box<dyn CameraBackend> {
    let backend_type = if images.is_empty() {
        config.backend
    } else {
        CameraBackendType::Virtual
    };
    get_backend_for_type(backend_type, images.to_vec())
}

/// List all available cameras
pub fn list_cameras(images: Vec<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load();
    let backend = backend_for(&config, &images);
    let cameras = backend.enumerate_cameras();

    if cameras.is_empty() {
        println!("No cameras found.");
        return Ok(());
    }

    println!("Available cameras:");
    println!();
    for (index, camera) in cameras.iter().enumerate() {
        println!("  [{}] {} ({}, {})", index, camera.name, camera.id, camera.panel);

        match backend.initialize(camera) {
            Ok(mut device) => {
                let resolutions = device.available_resolutions();
                if resolutions.is_empty() {
                    println!("      Resolutions: none (camera busy?)");
                } else {
                    let res_strs: Vec<String> =
                        resolutions.iter().map(|r| r.to_string()).collect();
                    println!("      Resolutions: {}", res_strs.join(", "));
                }
                device.close();
            }
            Err(e) => println!("      Unavailable: {}", e),
        }
        println!();
    }

    Ok(())
}

/// Backend limited to a single camera
///
/// Lets `--camera N` pin the device while the scanner keeps its own
/// selection policy.
struct PinnedBackend {
    inner: Box<dyn CameraBackend>,
    camera: DeviceInfo,
}

impl CameraBackend for PinnedBackend {
    fn enumerate_cameras(&self) -> Vec<DeviceInfo> {
        self.inner
            .enumerate_cameras()
            .into_iter()
            .filter(|c| c.id == self.camera.id)
            .collect()
    }

    fn initialize(&self, device: &DeviceInfo) -> BackendResult<Box<dyn CaptureDevice>> {
        self.inner.initialize(device)
    }

    fn backend_type(&self) -> CameraBackendType {
        self.inner.backend_type()
    }
}

/// Prints overlay prompts to stderr
struct TerminalOverlay;

impl OverlayHost for TerminalOverlay {
    fn show(&self, mode: OverlayMode, overlay: &ScannerOverlay) {
        if mode == OverlayMode::Default {
            eprintln!("{}", overlay.top_text);
            eprintln!("{}", overlay.bottom_text);
        }
    }

    fn set_preview_layout(&self, active_rect: Rect, mirrored: bool) {
        debug!(?active_rect, mirrored, "Preview layout");
    }

    fn remove_custom_overlay(&self) {}

    fn clear(&self) {}
}

/// Scan until Ctrl+C, the timeout, or the first result with `--once`
pub fn scan(args: ScanArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = Config::load();
    let backend = backend_for(&config, &args.images);
    let cameras = backend.enumerate_cameras();

    let pinned = match args.camera {
        Some(index) => {
            let Some(camera) = cameras.get(index) else {
                if cameras.is_empty() {
                    return Err("No cameras found".into());
                }
                return Err(format!(
                    "Camera index {} out of range (0-{})",
                    index,
                    cameras.len() - 1
                )
                .into());
            };
            config.last_camera_path = Some(camera.id.clone());
            Some(camera.clone())
        }
        None if args.images.is_empty() => config
            .last_camera_path
            .as_ref()
            .and_then(|id| cameras.iter().find(|c| &c.id == id))
            .cloned(),
        None => None,
    };

    if args.front {
        config.scan_options.use_front_camera = Some(true);
    }
    if args.multiple {
        config.scan_options.scan_multiple = true;
    }
    if args.try_inverted {
        config.scan_options.try_inverted = true;
    }

    if args.save_config {
        let path = config.save()?;
        eprintln!("Settings saved: {}", path.display());
    }

    let backend: Box<dyn CameraBackend> = match pinned {
        Some(camera) => {
            eprintln!("Using camera: {}", camera.name);
            Box::new(PinnedBackend {
                inner: backend,
                camera,
            })
        }
        None => backend,
    };

    let control = ScannerControl::builder(backend)
        .with_overlay_host(Arc::new(TerminalOverlay))
        .with_overlay(config.overlay.clone())
        .with_focus_box_size(config.focus_box_size)
        .build();

    let stop_flag = Arc::new(AtomicBool::new(false));
    let stop_flag_clone = stop_flag.clone();
    ctrlc::set_handler(move || {
        stop_flag_clone.store(true, Ordering::SeqCst);
    })?;

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let mut events = control.subscribe();
        control.start(config.scan_options.clone()).await?;

        let start = Instant::now();
        let timeout = args.timeout.map(Duration::from_secs);

        loop {
            if stop_flag.load(Ordering::SeqCst) {
                eprintln!("Stopping...");
                break;
            }
            if timeout.is_some_and(|t| start.elapsed() >= t) {
                eprintln!("Timed out");
                break;
            }

            match tokio::time::timeout(Duration::from_millis(100), events.recv()).await {
                Ok(Ok(event)) => {
                    println!("{}", serde_json::to_string(&event)?);
                    if args.once {
                        break;
                    }
                }
                Ok(Err(RecvError::Lagged(skipped))) => {
                    warn!(skipped, "Output fell behind, events dropped");
                }
                Ok(Err(RecvError::Closed)) => break,
                Err(_) => {}
            }
        }

        control.dispose().await;
        Ok::<(), Box<dyn std::error::Error>>(())
    })?;

    Ok(())
}

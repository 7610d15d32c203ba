// SPDX-License-Identifier: MPL-2.0

//! Camera Scanner - live camera barcode scanning control
//!
//! This library pulls frames from a capture device, throttles and feeds them
//! to a barcode decoder, and reports matches, while keeping focus regions
//! and preview rotation aligned with the display orientation.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`geometry`]: Rotation, letterboxing and tap-to-region transforms
//! - [`backends`]: Capture device abstraction with V4L2 and still-image backends
//! - [`frame_processor`]: Luminance extraction and barcode decoding
//! - [`scanner`]: Scan loop, focus/torch handling and the public [`ScannerControl`]
//! - [`config`]: Scan options and persisted settings
//!
//! # Example
//!
//! ```ignore
//! // Scan from the first camera and print results as JSON lines:
//! // camera-scanner scan
//! ```

pub mod backends;
pub mod config;
pub mod constants;
pub mod errors;
#[cfg(target_os = "linux")]
pub mod flash;
pub mod frame_processor;
pub mod geometry;
pub mod scanner;

// Re-export commonly used types
pub use config::{Config, ScanOptions};
pub use errors::{ScanError, ScanResult};
pub use frame_processor::{BarcodeDecoder, BarcodeFormat, BarcodeResult};
pub use geometry::{DisplayOrientation, PreviewGeometry};
pub use scanner::{ScanState, ScannedEvent, ScannerControl};

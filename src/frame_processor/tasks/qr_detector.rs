// SPDX-License-Identifier: GPL-3.0-only

//! QR code decoding
//!
//! Default decode engine, backed by the `rqrr` crate. Large frames are
//! downscaled before grid detection to keep each tick short; reported corner
//! points are scaled back to source coordinates.

use super::BarcodeDecoder;
use crate::errors::ScanResult;
use crate::frame_processor::types::{BarcodeFormat, BarcodeResult, LuminanceSource, ResultPoint};
use image::{GrayImage, imageops};
use std::time::Instant;
use tracing::{debug, trace};

/// QR code decoder
pub struct QrDecoder {
    /// Frames larger than this in either dimension are downscaled
    max_dimension: u32,
}

impl Default for QrDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl QrDecoder {
    pub fn new() -> Self {
        Self {
            max_dimension: 1024,
        }
    }

    /// Create a decoder with a custom max dimension
    pub fn with_max_dimension(max_dimension: u32) -> Self {
        Self {
            max_dimension: max_dimension.max(64),
        }
    }
}

impl BarcodeDecoder for QrDecoder {
    fn decode(&self, source: &LuminanceSource) -> ScanResult<Option<BarcodeResult>> {
        Ok(detect_sync(source, self.max_dimension).into_iter().next())
    }

    fn decode_multiple(&self, source: &LuminanceSource) -> ScanResult<Vec<BarcodeResult>> {
        Ok(detect_sync(source, self.max_dimension))
    }
}

/// Prepare a grayscale image, downscaling when needed
///
/// Returns the image and the factor mapping its coordinates back to the source.
fn prepare_image(source: &LuminanceSource, max_dimension: u32) -> Option<(GrayImage, f32)> {
    let (width, height) = (source.width(), source.height());
    let len = width as usize * height as usize;
    let img = GrayImage::from_raw(width, height, source.data()[..len].to_vec())?;

    if width <= max_dimension && height <= max_dimension {
        return Some((img, 1.0));
    }

    let scale = (width as f32 / max_dimension as f32).max(height as f32 / max_dimension as f32);
    let new_width = ((width as f32 / scale) as u32).max(1);
    let new_height = ((height as f32 / scale) as u32).max(1);
    let resized = imageops::resize(&img, new_width, new_height, imageops::FilterType::Triangle);
    Some((resized, scale))
}

/// Synchronous QR detection (runs on the blocking pool)
fn detect_sync(source: &LuminanceSource, max_dimension: u32) -> Vec<BarcodeResult> {
    let start = Instant::now();

    let Some((gray, scale)) = prepare_image(source, max_dimension) else {
        return Vec::new();
    };
    let (proc_width, proc_height) = gray.dimensions();

    let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(
        proc_width as usize,
        proc_height as usize,
        |x, y| gray.get_pixel(x as u32, y as u32)[0],
    );
    let grids = prepared.detect_grids();

    trace!(
        proc_width,
        proc_height,
        scale,
        grids = grids.len(),
        detection_ms = start.elapsed().as_millis(),
        "QR grid detection complete"
    );

    let mut results = Vec::with_capacity(grids.len());
    for grid in grids {
        let content = match grid.decode() {
            Ok((_meta, content)) => content,
            Err(e) => {
                debug!(error = ?e, "Failed to decode QR grid");
                continue;
            }
        };

        let points = grid
            .bounds
            .iter()
            .map(|p| ResultPoint {
                x: p.x as f32 * scale,
                y: p.y as f32 * scale,
            })
            .collect();

        debug!(content = %content, "Decoded QR code");
        results.push(BarcodeResult::new(content, BarcodeFormat::QrCode).with_points(points));
    }

    if !results.is_empty() {
        debug!(
            count = results.len(),
            total_ms = start.elapsed().as_millis(),
            "QR decoding found codes"
        );
    }

    results
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_frame_has_no_codes() {
        let source = LuminanceSource::new(64, 48, vec![255u8; 64 * 48]).unwrap();
        let decoder = QrDecoder::new();
        assert!(decoder.decode(&source).unwrap().is_none());
        assert!(decoder.decode_multiple(&source).unwrap().is_empty());
    }

    #[test]
    fn test_large_frame_is_downscaled() {
        let source = LuminanceSource::new(2000, 1000, vec![128u8; 2000 * 1000]).unwrap();
        let (img, scale) = prepare_image(&source, 1000).unwrap();
        assert_eq!(img.dimensions(), (1000, 500));
        assert!((scale - 2.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_small_frame_kept() {
        let source = LuminanceSource::new(320, 240, vec![0u8; 320 * 240]).unwrap();
        let (img, scale) = prepare_image(&source, 640).unwrap();
        assert_eq!(img.dimensions(), (320, 240));
        assert_eq!(scale, 1.0);
    }
}

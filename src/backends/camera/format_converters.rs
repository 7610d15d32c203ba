// SPDX-License-Identifier: GPL-3.0-only
//! Pixel format to luminance conversion
//!
//! The decode engine only needs a grayscale plane. These helpers pull the
//! luma channel out of the formats capture devices commonly deliver, dropping
//! row stride padding on the way.

use super::types::{BackendError, BackendResult, CameraFrame, PixelFormat};
use crate::geometry::VideoRotation;
use image::{GrayImage, imageops};

/// BT.601 luma from 8-bit RGB
fn luma(r: u8, g: u8, b: u8) -> u8 {
    ((r as u32 * 299 + g as u32 * 587 + b as u32 * 114) / 1000) as u8
}

/// Copy a single-channel plane without stride padding
pub fn gray_without_stride(data: &[u8], width: u32, height: u32, stride: u32) -> Vec<u8> {
    let width = width as usize;
    let stride = (stride as usize).max(width);
    let mut result = Vec::with_capacity(width * height as usize);

    for y in 0..height as usize {
        let row_start = y * stride;
        let row_end = row_start + width;
        if row_end <= data.len() {
            result.extend_from_slice(&data[row_start..row_end]);
        }
    }

    result
}

/// Extract luma from interleaved RGB-like pixels
///
/// `offsets` gives the byte positions of R, G and B inside one pixel.
fn interleaved_to_luma(
    data: &[u8],
    width: u32,
    height: u32,
    stride: u32,
    bytes_per_pixel: usize,
    offsets: [usize; 3],
) -> Vec<u8> {
    let width = width as usize;
    let stride = (stride as usize).max(width * bytes_per_pixel);
    let mut result = Vec::with_capacity(width * height as usize);

    for y in 0..height as usize {
        let row_start = y * stride;
        let row_end = row_start + width * bytes_per_pixel;
        if row_end > data.len() {
            break;
        }
        for px in data[row_start..row_end].chunks_exact(bytes_per_pixel) {
            result.push(luma(px[offsets[0]], px[offsets[1]], px[offsets[2]]));
        }
    }

    result
}

/// Extract luma from packed 4:2:2 data
///
/// YUYV carries Y at bytes 0 and 2 of each 4-byte group, UYVY at 1 and 3.
fn packed_422_to_luma(data: &[u8], width: u32, height: u32, stride: u32, y_first: bool) -> Vec<u8> {
    let width = width as usize;
    let stride = (stride as usize).max(width * 2);
    let y_offset = if y_first { 0 } else { 1 };
    let mut result = Vec::with_capacity(width * height as usize);

    for y in 0..height as usize {
        let row_start = y * stride;
        let row_end = row_start + width * 2;
        if row_end > data.len() {
            break;
        }
        result.extend(
            data[row_start..row_end]
                .iter()
                .skip(y_offset)
                .step_by(2)
                .take(width),
        );
    }

    result
}

/// Convert any supported frame into a tightly packed luminance plane
pub fn frame_to_luma(frame: &CameraFrame) -> Vec<u8> {
    let data: &[u8] = &frame.data;
    let (w, h, stride) = (frame.width, frame.height, frame.stride);

    match frame.format {
        // NV12 starts with a full-resolution Y plane
        PixelFormat::Gray8 | PixelFormat::NV12 => gray_without_stride(data, w, h, stride),
        PixelFormat::RGBA => interleaved_to_luma(data, w, h, stride, 4, [0, 1, 2]),
        PixelFormat::BGRA => interleaved_to_luma(data, w, h, stride, 4, [2, 1, 0]),
        PixelFormat::RGB24 => interleaved_to_luma(data, w, h, stride, 3, [0, 1, 2]),
        PixelFormat::YUYV => packed_422_to_luma(data, w, h, stride, true),
        PixelFormat::UYVY => packed_422_to_luma(data, w, h, stride, false),
    }
}

/// Decode an MJPEG frame straight to grayscale
pub fn mjpeg_to_gray(data: &[u8]) -> BackendResult<GrayImage> {
    image::load_from_memory_with_format(data, image::ImageFormat::Jpeg)
        .map(|img| img.to_luma8())
        .map_err(|e| BackendError::FormatNotSupported(format!("MJPEG decode failed: {}", e)))
}

/// Rotate a luminance plane clockwise by the given rotation
///
/// Returns the rotated data with its new width and height.
pub fn rotate_gray(
    data: Vec<u8>,
    width: u32,
    height: u32,
    rotation: VideoRotation,
) -> (Vec<u8>, u32, u32) {
    // Truncated frames are passed through unrotated
    if rotation == VideoRotation::None || data.len() < width as usize * height as usize {
        return (data, width, height);
    }

    let Some(img) = GrayImage::from_raw(width, height, data) else {
        return (Vec::new(), width, height);
    };

    let rotated = match rotation {
        VideoRotation::Clockwise90 => imageops::rotate90(&img),
        VideoRotation::Clockwise180 => imageops::rotate180(&img),
        VideoRotation::Clockwise270 => imageops::rotate270(&img),
        VideoRotation::None => img,
    };

    let (w, h) = rotated.dimensions();
    (rotated.into_raw(), w, h)
}

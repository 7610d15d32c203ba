// SPDX-License-Identifier: GPL-3.0-only

//! Image files as camera frames

use crate::backends::camera::types::{BackendError, BackendResult, CameraFrame};
use crate::constants::file_formats;
use std::path::Path;
use tracing::info;

/// Load an image file and convert it to a grayscale CameraFrame
///
/// Supports common image formats: PNG, JPEG, GIF, BMP, WebP
pub fn load_image_as_frame(path: &Path) -> BackendResult<CameraFrame> {
    info!(path = %path.display(), "Loading image file");

    if !file_formats::is_image_extension(path) {
        return Err(BackendError::FormatNotSupported(format!(
            "'{}' is not a supported image",
            path.display()
        )));
    }

    let img = image::open(path).map_err(|e| match e {
        image::ImageError::IoError(io) => BackendError::from(io),
        other => BackendError::Other(format!(
            "Failed to load image '{}': {}",
            path.display(),
            other
        )),
    })?;

    let gray = img.to_luma8();
    let (width, height) = gray.dimensions();

    info!(width, height, "Image loaded successfully");

    Ok(CameraFrame::from_gray(width, height, gray.into_raw()))
}

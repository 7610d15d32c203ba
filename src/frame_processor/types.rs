// SPDX-License-Identifier: MPL-2.0

//! Core types for frame decoding
//!
//! A [`LuminanceSource`] is what the decode engine consumes; a
//! [`BarcodeResult`] is what it produces and what scanned events carry.

use crate::backends::camera::format_converters::frame_to_luma;
use crate::backends::camera::types::CameraFrame;
use crate::errors::{ScanError, ScanResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A grayscale pixel buffer, the input unit of the decode engine
#[derive(Debug, Clone)]
pub struct LuminanceSource {
    width: u32,
    height: u32,
    /// Tightly packed, one byte per pixel, row-major
    data: Arc<[u8]>,
}

impl LuminanceSource {
    /// Wrap a packed luminance plane, checking its size
    pub fn new(width: u32, height: u32, data: impl Into<Arc<[u8]>>) -> ScanResult<Self> {
        let data = data.into();
        let expected = width as usize * height as usize;
        if width == 0 || height == 0 || data.len() < expected {
            return Err(ScanError::Decode(format!(
                "luminance buffer of {} bytes does not cover {}x{}",
                data.len(),
                width,
                height
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Extract the luminance plane from a camera frame
    pub fn from_frame(frame: &CameraFrame) -> ScanResult<Self> {
        Self::new(frame.width, frame.height, frame_to_luma(frame))
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Luminance at (x, y); out-of-range reads return 0
    pub fn pixel(&self, x: u32, y: u32) -> u8 {
        if x >= self.width || y >= self.height {
            return 0;
        }
        self.data[y as usize * self.width as usize + x as usize]
    }

    /// Negative image, for light-on-dark codes
    pub fn inverted(&self) -> Self {
        let data: Vec<u8> = self.data.iter().map(|v| 255 - v).collect();
        Self {
            width: self.width,
            height: self.height,
            data: Arc::from(data.into_boxed_slice()),
        }
    }
}

/// Barcode symbologies a decoder may report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BarcodeFormat {
    QrCode,
    DataMatrix,
    Aztec,
    Pdf417,
    Ean8,
    Ean13,
    UpcA,
    UpcE,
    Code39,
    Code93,
    Code128,
    Itf,
    Codabar,
}

impl std::fmt::Display for BarcodeFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            BarcodeFormat::QrCode => "QR_CODE",
            BarcodeFormat::DataMatrix => "DATA_MATRIX",
            BarcodeFormat::Aztec => "AZTEC",
            BarcodeFormat::Pdf417 => "PDF_417",
            BarcodeFormat::Ean8 => "EAN_8",
            BarcodeFormat::Ean13 => "EAN_13",
            BarcodeFormat::UpcA => "UPC_A",
            BarcodeFormat::UpcE => "UPC_E",
            BarcodeFormat::Code39 => "CODE_39",
            BarcodeFormat::Code93 => "CODE_93",
            BarcodeFormat::Code128 => "CODE_128",
            BarcodeFormat::Itf => "ITF",
            BarcodeFormat::Codabar => "CODABAR",
        };
        write!(f, "{}", name)
    }
}

/// A corner or finder point of a decoded symbol, in frame pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResultPoint {
    pub x: f32,
    pub y: f32,
}

/// One decoded symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarcodeResult {
    /// Decoded payload text
    pub text: String,
    pub format: BarcodeFormat,
    /// Raw payload bytes, when the engine exposes them
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub raw_bytes: Vec<u8>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub points: Vec<ResultPoint>,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
}

impl BarcodeResult {
    pub fn new(text: impl Into<String>, format: BarcodeFormat) -> Self {
        let text = text.into();
        Self {
            raw_bytes: text.as_bytes().to_vec(),
            text,
            format,
            points: Vec::new(),
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn with_points(mut self, points: Vec<ResultPoint>) -> Self {
        self.points = points;
        self
    }

    /// Whether the payload carries any visible text
    pub fn has_text(&self) -> bool {
        !self.text.trim().is_empty()
    }
}

/// Drop missing results and results without text
pub fn filter_results(results: Vec<Option<BarcodeResult>>) -> Vec<BarcodeResult> {
    results
        .into_iter()
        .flatten()
        .filter(BarcodeResult::has_text)
        .collect()
}

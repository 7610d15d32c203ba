// SPDX-License-Identifier: GPL-3.0-only

//! Decode engine abstraction and implementations
//!
//! The scan loop only knows the [`BarcodeDecoder`] trait. A fresh decoder is
//! built for every scan session through a [`DecoderFactory`].

pub mod qr_detector;

pub use qr_detector::QrDecoder;

use super::types::{BarcodeResult, LuminanceSource};
use crate::errors::ScanResult;
use std::sync::Arc;

/// A barcode decode engine
pub trait BarcodeDecoder: Send + Sync {
    /// Decode the most prominent symbol, if any
    fn decode(&self, source: &LuminanceSource) -> ScanResult<Option<BarcodeResult>>;

    /// Decode every symbol in the frame
    fn decode_multiple(&self, source: &LuminanceSource) -> ScanResult<Vec<BarcodeResult>>;
}

/// Builds the decoder for a scan session
pub type DecoderFactory = Arc<dyn Fn() -> Box<dyn BarcodeDecoder> + Send + Sync>;

/// Factory producing the built-in QR decoder
pub fn default_decoder_factory() -> DecoderFactory {
    Arc::new(|| Box::new(QrDecoder::new()))
}

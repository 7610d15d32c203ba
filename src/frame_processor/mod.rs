// SPDX-License-Identifier: MPL-2.0

//! Frame decoding for the scan loop
//!
//! Turns a captured frame into filtered barcode results: the luminance
//! source is handed to the session's decoder, results without text or of an
//! unwanted format are dropped, and an inverted retry is made when asked.

pub mod tasks;
pub mod types;

pub use tasks::{BarcodeDecoder, DecoderFactory, QrDecoder, default_decoder_factory};
pub use types::{BarcodeFormat, BarcodeResult, LuminanceSource, ResultPoint, filter_results};

use crate::errors::ScanResult;
use tracing::trace;

/// Per-session decode behaviour
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodeHints {
    /// Report every symbol in a frame instead of the first
    pub scan_multiple: bool,
    /// Retry on the inverted image when nothing was found
    pub try_inverted: bool,
    /// Accepted formats; empty accepts all
    pub possible_formats: Vec<BarcodeFormat>,
}

impl DecodeHints {
    pub fn accepts(&self, format: BarcodeFormat) -> bool {
        self.possible_formats.is_empty() || self.possible_formats.contains(&format)
    }
}

/// Decode a luminance source and return the results worth reporting
pub fn decode_frame(
    decoder: &dyn BarcodeDecoder,
    source: &LuminanceSource,
    hints: &DecodeHints,
) -> ScanResult<Vec<BarcodeResult>> {
    let results = decode_once(decoder, source, hints)?;
    if !results.is_empty() || !hints.try_inverted {
        return Ok(results);
    }

    trace!("Nothing found, retrying on inverted frame");
    decode_once(decoder, &source.inverted(), hints)
}

fn decode_once(
    decoder: &dyn BarcodeDecoder,
    source: &LuminanceSource,
    hints: &DecodeHints,
) -> ScanResult<Vec<BarcodeResult>> {
    let raw: Vec<Option<BarcodeResult>> = if hints.scan_multiple {
        decoder.decode_multiple(source)?.into_iter().map(Some).collect()
    } else {
        vec![decoder.decode(source)?]
    };

    let accepted = raw
        .into_iter()
        .map(|result| result.filter(|r| hints.accepts(r.format)))
        .collect();
    Ok(filter_results(accepted))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Finds a code only in frames whose first pixel is dark
    struct DarkPixelDecoder {
        calls: Mutex<u32>,
        format: BarcodeFormat,
    }

    impl BarcodeDecoder for DarkPixelDecoder {
        fn decode(&self, source: &LuminanceSource) -> ScanResult<Option<BarcodeResult>> {
            *self.calls.lock().unwrap() += 1;
            Ok((source.pixel(0, 0) < 128).then(|| BarcodeResult::new("dark", self.format)))
        }

        fn decode_multiple(&self, source: &LuminanceSource) -> ScanResult<Vec<BarcodeResult>> {
            Ok(self.decode(source)?.into_iter().collect())
        }
    }

    fn decoder(format: BarcodeFormat) -> DarkPixelDecoder {
        DarkPixelDecoder {
            calls: Mutex::new(0),
            format,
        }
    }

    #[test]
    fn test_inverted_retry() {
        let light = LuminanceSource::new(1, 1, vec![250u8]).unwrap();
        let d = decoder(BarcodeFormat::QrCode);

        let plain = decode_frame(&d, &light, &DecodeHints::default()).unwrap();
        assert!(plain.is_empty());

        let hints = DecodeHints {
            try_inverted: true,
            ..Default::default()
        };
        let retried = decode_frame(&d, &light, &hints).unwrap();
        assert_eq!(retried.len(), 1);
        assert_eq!(*d.calls.lock().unwrap(), 3);
    }

    #[test]
    fn test_possible_formats_filter() {
        let dark = LuminanceSource::new(1, 1, vec![0u8]).unwrap();
        let d = decoder(BarcodeFormat::Ean13);
        let hints = DecodeHints {
            possible_formats: vec![BarcodeFormat::QrCode],
            ..Default::default()
        };
        assert!(decode_frame(&d, &dark, &hints).unwrap().is_empty());

        let hints = DecodeHints {
            possible_formats: vec![BarcodeFormat::Ean13],
            scan_multiple: true,
            ..Default::default()
        };
        assert_eq!(decode_frame(&d, &dark, &hints).unwrap().len(), 1);
    }
}

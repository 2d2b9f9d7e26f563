//! Barcode detection. A `Scanner` owns the detection backends enabled at
//! startup and runs every one of them over a decoded image

use crate::config::MAX_IMAGE_DIMENSION;
use crate::ServiceError;
use anyhow::{anyhow, Result};
use image::io::{Limits, Reader};
use image::GrayImage;
use serde::Serialize;
use std::fmt::Debug;
use std::io::Cursor;
use tracing::{debug, info, warn};

/// A polygon corner, in pixels
pub type Point = (i32, i32);

/// A single detected barcode
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Symbol {
    /// Symbology tag, e.g. `QRCODE` or `EAN13`
    #[serde(rename = "type")]
    pub kind: String,

    /// Decoded content
    pub data: String,

    /// Corners of the symbol's bounding region
    pub points: Vec<Point>,
}

/// A barcode detection library
pub trait Detector: Debug + Send + Sync {
    /// Backend name used in the `scan_backends` setting
    fn name(&self) -> &'static str;

    /// Find and decode every symbol in the image
    fn detect(&self, image: &GrayImage) -> Result<Vec<Symbol>>;
}

/// The set of enabled detection backends
#[derive(Debug)]
pub struct Scanner {
    detectors: Vec<Box<dyn Detector>>,
    max_dimension: u32,
}

impl Default for Scanner {
    fn default() -> Self {
        Scanner::new(vec![])
    }
}

impl Scanner {
    pub fn new(detectors: Vec<Box<dyn Detector>>) -> Self {
        Scanner {
            detectors,
            max_dimension: MAX_IMAGE_DIMENSION,
        }
    }

    /// Build a scanner from backend names. Unknown names are an error;
    /// backends that were not compiled in are skipped
    pub fn from_backends<S: AsRef<str>>(names: &[S]) -> Result<Self> {
        let mut detectors: Vec<Box<dyn Detector>> = vec![];

        for name in names {
            match name.as_ref() {
                "qr" => match qr_detector() {
                    Some(d) => detectors.push(d),
                    None => warn!("scan backend `qr` requested but the `qr-scan` feature is disabled"),
                },
                "zxing" => match zxing_detector() {
                    Some(d) => detectors.push(d),
                    None => warn!("scan backend `zxing` requested but the `zxing-scan` feature is disabled"),
                },
                other => return Err(anyhow!("unknown scan backend `{other}`")),
            }
        }

        let scanner = Scanner::new(detectors);
        if scanner.is_available() {
            info!("scanning with backends {:?}", scanner.backends());
        } else {
            warn!("no scan backend available: scan requests will be rejected");
        }
        Ok(scanner)
    }

    /// Reject images wider or taller than `max_dimension` pixels before
    /// their pixels are allocated
    pub fn with_max_dimension(mut self, max_dimension: u32) -> Self {
        self.max_dimension = max_dimension;
        self
    }

    /// Whether at least one backend is enabled
    pub fn is_available(&self) -> bool {
        !self.detectors.is_empty()
    }

    /// Names of the enabled backends
    pub fn backends(&self) -> Vec<&'static str> {
        self.detectors.iter().map(|d| d.name()).collect()
    }

    /// Decode `bytes` as an image and detect every symbol in it. An empty
    /// result means the image was readable but contained no barcode.
    /// A symbol reported by more than one backend is returned once
    pub fn scan(&self, bytes: &[u8]) -> Result<Vec<Symbol>, ServiceError> {
        if !self.is_available() {
            return Err(ServiceError::ScanUnavailable);
        }
        if bytes.is_empty() {
            return Err(ServiceError::InvalidImage("image is empty".into()));
        }

        let image = self.decode(bytes)?;
        debug!("scanning {}x{} image", image.width(), image.height());

        let mut symbols: Vec<Symbol> = vec![];
        for detector in &self.detectors {
            match detector.detect(&image) {
                Ok(found) => {
                    debug!("backend {} found {} symbols", detector.name(), found.len());
                    for symbol in found {
                        if !symbols.iter().any(|s| s.kind == symbol.kind && s.data == symbol.data) {
                            symbols.push(symbol);
                        }
                    }
                }
                Err(e) => warn!("backend {} failed: {e:#}", detector.name()),
            }
        }
        Ok(symbols)
    }

    fn decode(&self, bytes: &[u8]) -> Result<GrayImage, ServiceError> {
        let mut reader = Reader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| ServiceError::InvalidImage(e.to_string()))?;

        let mut limits = Limits::default();
        limits.max_image_width = Some(self.max_dimension);
        limits.max_image_height = Some(self.max_dimension);
        reader.limits(limits);

        Ok(reader.decode()?.to_luma8())
    }
}

/// Decoded text, or an escaped rendering of the raw bytes when they are not
/// valid UTF-8
pub fn decode_text(bytes: Vec<u8>) -> String {
    String::from_utf8(bytes).unwrap_or_else(|e| e.as_bytes().escape_ascii().to_string())
}

#[cfg(feature = "qr-scan")]
fn qr_detector() -> Option<Box<dyn Detector>> {
    Some(Box::new(qr::QrDetector))
}

#[cfg(not(feature = "qr-scan"))]
fn qr_detector() -> Option<Box<dyn Detector>> {
    None
}

#[cfg(feature = "zxing-scan")]
fn zxing_detector() -> Option<Box<dyn Detector>> {
    Some(Box::new(zxing::ZxingDetector))
}

#[cfg(not(feature = "zxing-scan"))]
fn zxing_detector() -> Option<Box<dyn Detector>> {
    None
}

/// QR codes, through `rqrr`
#[cfg(feature = "qr-scan")]
mod qr {
    use super::*;

    #[derive(Debug)]
    pub struct QrDetector;

    impl Detector for QrDetector {
        fn name(&self) -> &'static str {
            "qr"
        }

        fn detect(&self, image: &GrayImage) -> Result<Vec<Symbol>> {
            let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(
                image.width() as usize,
                image.height() as usize,
                |x, y| image.get_pixel(x as u32, y as u32).0[0],
            );

            let mut symbols = vec![];
            for grid in prepared.detect_grids() {
                let mut content = Vec::new();
                match grid.decode_to(&mut content) {
                    Ok(_) => symbols.push(Symbol {
                        kind: crate::symbology::Symbology::QrCode.tag().into(),
                        data: decode_text(content),
                        points: grid.bounds.iter().map(|p| (p.x, p.y)).collect(),
                    }),
                    Err(e) => debug!("skipping undecodable QR grid: {e}"),
                }
            }
            Ok(symbols)
        }
    }
}

/// Linear barcodes and 2D symbologies, through `rxing`
#[cfg(feature = "zxing-scan")]
mod zxing {
    use super::*;

    #[derive(Debug)]
    pub struct ZxingDetector;

    fn tag(format: &rxing::BarcodeFormat) -> String {
        use rxing::BarcodeFormat as F;

        let tag = match format {
            F::QR_CODE => "QRCODE",
            F::CODE_128 => "CODE128",
            F::CODE_39 => "CODE39",
            F::CODE_93 => "CODE93",
            F::EAN_13 => "EAN13",
            F::EAN_8 => "EAN8",
            F::UPC_A => "UPC-A",
            F::UPC_E => "UPC-E",
            F::CODABAR => "CODABAR",
            F::ITF => "I25",
            F::DATA_MATRIX => "DATAMATRIX",
            F::PDF_417 => "PDF417",
            F::AZTEC => "AZTEC",
            F::RSS_14 => "DATABAR",
            F::RSS_EXPANDED => "DATABAR-EXP",
            other => return format!("{other:?}"),
        };
        tag.into()
    }

    impl Detector for ZxingDetector {
        fn name(&self) -> &'static str {
            "zxing"
        }

        fn detect(&self, image: &GrayImage) -> Result<Vec<Symbol>> {
            let (width, height) = image.dimensions();
            let results = match rxing::helpers::detect_multiple_in_luma(image.as_raw().clone(), width, height) {
                Ok(results) => results,
                Err(rxing::Exceptions::NotFoundException(..)) => return Ok(vec![]),
                Err(e) => return Err(anyhow!("rxing detection failed: {e}")),
            };

            Ok(results
                .iter()
                .map(|r| Symbol {
                    kind: tag(r.getBarcodeFormat()),
                    data: r.getText().to_string(),
                    points: r
                        .getPoints()
                        .iter()
                        .map(|p| (p.x.round() as i32, p.y.round() as i32))
                        .collect(),
                })
                .collect())
        }
    }
}

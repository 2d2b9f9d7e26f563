//! The barcode types this service knows how to generate, and the tags used
//! to report them

use crate::ServiceError;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// A barcode symbology that can be generated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Symbology {
    #[serde(rename = "QRCODE")]
    QrCode,
    #[serde(rename = "CODE128")]
    Code128,
    #[serde(rename = "CODE39")]
    Code39,
    #[serde(rename = "EAN13")]
    Ean13,
    #[serde(rename = "EAN8")]
    Ean8,
    #[serde(rename = "UPC-A")]
    UpcA,
}

/// Every generatable symbology, in listing order
pub const SUPPORTED: [Symbology; 6] = [
    Symbology::QrCode,
    Symbology::Code128,
    Symbology::Code39,
    Symbology::Ean13,
    Symbology::Ean8,
    Symbology::UpcA,
];

impl Symbology {
    /// The tag clients send and receive
    pub fn tag(self) -> &'static str {
        match self {
            Symbology::QrCode => "QRCODE",
            Symbology::Code128 => "CODE128",
            Symbology::Code39 => "CODE39",
            Symbology::Ean13 => "EAN13",
            Symbology::Ean8 => "EAN8",
            Symbology::UpcA => "UPC-A",
        }
    }

    /// Human readable name
    pub fn label(self) -> &'static str {
        match self {
            Symbology::QrCode => "QR Code",
            Symbology::Code128 => "Code 128",
            Symbology::Code39 => "Code 39",
            Symbology::Ean13 => "EAN-13",
            Symbology::Ean8 => "EAN-8",
            Symbology::UpcA => "UPC-A",
        }
    }
}

impl fmt::Display for Symbology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for Symbology {
    type Err = ServiceError;

    /// Case-insensitive. Surrounding whitespace is ignored
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tag = s.trim().to_ascii_uppercase();
        match tag.as_str() {
            "QRCODE" | "QR" => Ok(Symbology::QrCode),
            "CODE128" => Ok(Symbology::Code128),
            "CODE39" => Ok(Symbology::Code39),
            "EAN13" => Ok(Symbology::Ean13),
            "EAN8" => Ok(Symbology::Ean8),
            "UPC-A" | "UPCA" => Ok(Symbology::UpcA),
            _ => Err(ServiceError::UnsupportedSymbology(tag)),
        }
    }
}

/// `(tag, label)` pairs for every generatable symbology
pub fn supported_types() -> Vec<(&'static str, &'static str)> {
    SUPPORTED.iter().map(|s| (s.tag(), s.label())).collect()
}

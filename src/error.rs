//! Errors produced while scanning or generating barcodes. Every variant is
//! converted into a `{success: false, message}` body at the HTTP boundary

use thiserror::Error;

/// Hint returned when no detection backend is available
pub const SCAN_UNAVAILABLE_HINT: &str = "barcode scanning is not available on this server: \
     rebuild with the `qr-scan` and/or `zxing-scan` features and enable them through \
     the `scan_backends` setting (BARCODE_SCAN_BACKENDS=qr,zxing)";

#[derive(Debug, Error)]
pub enum ServiceError {
    /// A required field is missing or empty
    #[error("{0}")]
    Validation(String),

    /// The uploaded bytes are not a readable image
    #[error("invalid image: {0}")]
    InvalidImage(String),

    /// No detection backend is compiled in or enabled
    #[error("{}", SCAN_UNAVAILABLE_HINT)]
    ScanUnavailable,

    /// The requested barcode type cannot be generated
    #[error("unsupported barcode type: {0}")]
    UnsupportedSymbology(String),

    /// The content is not valid for the requested barcode type
    #[error("barcode generation failed: {0}")]
    Render(String),

    #[error("request body exceeds the {limit} byte limit")]
    PayloadTooLarge { limit: usize },

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<base64::DecodeError> for ServiceError {
    fn from(err: base64::DecodeError) -> Self {
        ServiceError::InvalidImage(format!("base64 decoding failed: {err}"))
    }
}

impl From<image::ImageError> for ServiceError {
    fn from(err: image::ImageError) -> Self {
        ServiceError::InvalidImage(err.to_string())
    }
}

//! Barcode and QR code generation. Symbol construction is delegated to
//! `qrcode` and `barcoders`; this module only draws their module patterns
//! into a PNG

use crate::config::*;
use crate::symbology::Symbology;
use crate::ServiceError;
use barcoders::sym::{code128::Code128, code39::Code39, ean13::EAN13, ean8::EAN8};
use image::{GrayImage, ImageOutputFormat, Luma};
use qrcode::{EcLevel, QrCode};
use std::fmt::Debug;
use std::io::Cursor;

const BLACK: Luma<u8> = Luma([0]);
const WHITE: Luma<u8> = Luma([255]);

/// Selects Code 128 character set B (printable ASCII)
const CODE128_SET_B: char = 'Ɓ';

/// A rendered barcode, PNG encoded
pub struct GeneratedImage {
    pub png: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl Debug for GeneratedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "GeneratedImage {{ png: <{} bytes>, width: {}, height: {} }}",
            self.png.len(),
            self.width,
            self.height
        )
    }
}

/// Render `content` as the given symbology
pub fn render(symbology: Symbology, content: &str) -> Result<GeneratedImage, ServiceError> {
    let modules = match symbology {
        Symbology::QrCode => return finish(render_qr(content)?),
        Symbology::Code128 => Code128::new(format!("{CODE128_SET_B}{content}")).map(|b| b.encode()),
        Symbology::Code39 => Code39::new(content.to_ascii_uppercase()).map(|b| b.encode()),
        Symbology::Ean13 => EAN13::new(content).map(|b| b.encode()),
        Symbology::Ean8 => EAN8::new(content).map(|b| b.encode()),
        // UPC-A is EAN-13 with a leading zero
        Symbology::UpcA => EAN13::new(format!("0{content}")).map(|b| b.encode()),
    }
    .map_err(|e| ServiceError::Render(format!("{e} (content {content:?} is not valid {symbology})")))?;

    finish(render_linear(&modules))
}

fn finish(image: GrayImage) -> Result<GeneratedImage, ServiceError> {
    let (width, height) = image.dimensions();
    Ok(GeneratedImage {
        png: encode_png(&image)?,
        width,
        height,
    })
}

/// QR code with low error correction, the smallest version that fits,
/// `QR_BOX_SIZE` pixels per module and a `QR_BORDER` module quiet zone
fn render_qr(content: &str) -> Result<GrayImage, ServiceError> {
    let code = QrCode::with_error_correction_level(content.as_bytes(), EcLevel::L)
        .map_err(|e| ServiceError::Render(e.to_string()))?;
    let colors = code.to_colors();
    let modules = code.width() as u32;
    let size = (modules + 2 * QR_BORDER) * QR_BOX_SIZE;

    Ok(GrayImage::from_fn(size, size, |x, y| {
        let (mx, my) = (x / QR_BOX_SIZE, y / QR_BOX_SIZE);
        let inside = (QR_BORDER..QR_BORDER + modules).contains(&mx)
            && (QR_BORDER..QR_BORDER + modules).contains(&my);
        if !inside {
            return WHITE;
        }
        let index = ((my - QR_BORDER) * modules + (mx - QR_BORDER)) as usize;
        match colors[index] {
            qrcode::Color::Dark => BLACK,
            qrcode::Color::Light => WHITE,
        }
    }))
}

/// Draw bars for every set module, with a quiet zone on both sides
fn render_linear(modules: &[u8]) -> GrayImage {
    let width = (modules.len() as u32 + 2 * LINEAR_QUIET_ZONE) * LINEAR_MODULE_WIDTH;
    let margin = LINEAR_QUIET_ZONE * LINEAR_MODULE_WIDTH;
    let height = LINEAR_BAR_HEIGHT + 2 * margin;

    GrayImage::from_fn(width, height, |x, y| {
        let module = (x / LINEAR_MODULE_WIDTH).checked_sub(LINEAR_QUIET_ZONE);
        let bar = module
            .and_then(|m| modules.get(m as usize))
            .map_or(false, |m| *m == 1);
        if bar && (margin..margin + LINEAR_BAR_HEIGHT).contains(&y) {
            BLACK
        } else {
            WHITE
        }
    })
}

fn encode_png(image: &GrayImage) -> Result<Vec<u8>, ServiceError> {
    let mut png: Vec<u8> = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut png), ImageOutputFormat::Png)
        .map_err(|e| ServiceError::Internal(e.into()))?;
    Ok(png)
}

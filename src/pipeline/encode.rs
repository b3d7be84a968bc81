//! Image preparation for the two image-consuming stages.
//!
//! * OCR gets a grayscale PNG. Rasterised pages arrive as RGB; dropping
//!   colour normalises tesseract's binarisation regardless of how the page
//!   was scanned or printed.
//! * The vision model gets the untouched page PNG as a base64 `ImageData`.
//!   Colour matters there: diagrams often encode meaning in it.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use std::io::Cursor;
use tracing::debug;

/// Decode an encoded page image and re-encode it as an 8-bit grayscale PNG.
pub fn to_grayscale_png(image_bytes: &[u8]) -> Result<Vec<u8>, image::ImageError> {
    let img = image::load_from_memory(image_bytes)?;
    let gray = img.grayscale();

    let mut buf = Vec::new();
    gray.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    debug!(
        "Grayscale {}x{} → {} bytes",
        gray.width(),
        gray.height(),
        buf.len()
    );
    Ok(buf)
}

/// Wrap an encoded page image as base64 `ImageData` for the vision API.
///
/// The MIME type is sniffed from the bytes; anything unrecognised is sent
/// as PNG, which is what the rasteriser writes.
pub fn encode_page(image_bytes: &[u8]) -> ImageData {
    let mime = match image::guess_format(image_bytes) {
        Ok(image::ImageFormat::Jpeg) => "image/jpeg",
        _ => "image/png",
    };
    let b64 = STANDARD.encode(image_bytes);
    debug!("Encoded image → {} bytes base64", b64.len());

    ImageData::new(b64, mime).with_detail("high")
}

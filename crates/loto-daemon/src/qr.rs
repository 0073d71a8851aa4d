//! Scannable code returned to the bettor after a ticket purchase.

use std::io::Cursor;

use anyhow::{Context, Result};
use image::{DynamicImage, ImageFormat, Luma};
use qrcode::QrCode;

/// Turns a lookup URL into image bytes a phone camera can scan.
pub trait TicketCodeEncoder: Send + Sync {
    /// MIME type of the bytes returned by [`encode`](Self::encode).
    fn content_type(&self) -> &'static str;

    fn encode(&self, payload: &str) -> Result<Vec<u8>>;
}

/// QR code rendered as a greyscale PNG.
#[derive(Debug, Clone)]
pub struct QrPngEncoder {
    /// Lower bound for both edges, in pixels (quiet zone included).
    pub min_size: u32,
}

impl Default for QrPngEncoder {
    fn default() -> Self {
        Self { min_size: 256 }
    }
}

impl TicketCodeEncoder for QrPngEncoder {
    fn content_type(&self) -> &'static str {
        "image/png"
    }

    fn encode(&self, payload: &str) -> Result<Vec<u8>> {
        let code = QrCode::new(payload.as_bytes()).context("payload does not fit a QR code")?;
        let img = code
            .render::<Luma<u8>>()
            .min_dimensions(self.min_size, self.min_size)
            .build();

        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageLuma8(img)
            .write_to(&mut out, ImageFormat::Png)
            .context("png encoding failed")?;
        Ok(out.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

    #[test]
    fn encodes_lookup_url_as_png_of_at_least_min_size() {
        let enc = QrPngEncoder { min_size: 200 };
        let bytes = enc
            .encode("https://loto.example/ticket/6f1c1b9e-6a0e-4a43-9d53-3a1c1f0c2b7d")
            .unwrap();
        assert_eq!(&bytes[..8], &PNG_MAGIC);

        let img = image::load_from_memory_with_format(&bytes, ImageFormat::Png).unwrap();
        assert!(img.width() >= 200);
        assert_eq!(img.width(), img.height());
    }

    #[test]
    fn oversized_payload_is_an_error() {
        let huge = "x".repeat(8_000);
        assert!(QrPngEncoder::default().encode(&huge).is_err());
    }
}

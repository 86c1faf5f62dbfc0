//! Image encoding for the two consumers of a page image.
//!
//! * The vision API gets a JPEG (quality 90) as a base64 data URL. Photos and
//!   scans compress far better as JPEG, which keeps request bodies small.
//! * The document gets a lossless PNG so the embedded page looks exactly like
//!   the upload.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::{ImageFormat, RgbImage};
use std::io::Cursor;
use tracing::debug;

/// JPEG quality used for images sent to the model.
pub const JPEG_QUALITY: u8 = 90;

/// A base64-encoded image ready for a multimodal request body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub base64: String,
    pub mime_type: &'static str,
}

impl EncodedImage {
    /// `data:<mime>;base64,<payload>` form used by OpenAI-compatible APIs.
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.base64)
    }
}

/// Encode a page as a base64 JPEG for the vision API.
pub fn encode_jpeg(img: &RgbImage) -> Result<EncodedImage, image::ImageError> {
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, JPEG_QUALITY).encode_image(img)?;

    let b64 = STANDARD.encode(&buf);
    debug!("Encoded JPEG → {} bytes base64", b64.len());

    Ok(EncodedImage {
        base64: b64,
        mime_type: "image/jpeg",
    })
}

/// Encode a page as PNG bytes for embedding in the document.
pub fn encode_png(img: &RgbImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn encode_jpeg_data_url() {
        let img = RgbImage::from_pixel(10, 10, Rgb([255, 0, 0]));
        let data = encode_jpeg(&img).expect("encode should succeed");
        assert_eq!(data.mime_type, "image/jpeg");
        assert!(data.data_url().starts_with("data:image/jpeg;base64,"));

        let decoded = STANDARD.decode(&data.base64).expect("valid base64");
        // JPEG SOI marker
        assert_eq!(&decoded[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn encode_png_signature() {
        let img = RgbImage::from_pixel(3, 2, Rgb([0, 0, 0]));
        let png = encode_png(&img).unwrap();
        assert_eq!(&png[..4], b"\x89PNG");
    }
}

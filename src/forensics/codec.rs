//! Image codec collaborator: decode, lossy JPEG round trip, PNG encode.
//!
//! The engines never touch encoders directly. They receive a `&dyn ImageCodec`
//! so tests can substitute deterministic or failing implementations.

use std::io::Cursor;

use image::{DynamicImage, ImageFormat, ImageOutputFormat, RgbaImage};

use super::ForensicError;

pub trait ImageCodec: Send + Sync {
    /// Decode raw bytes (JPEG, PNG, WebP, TIFF) into a bitmap.
    fn decode(&self, bytes: &[u8]) -> Result<DynamicImage, ForensicError>;

    /// Encode as JPEG at `quality` (1..=100) and decode the result back.
    ///
    /// Alpha is not carried through JPEG; the returned buffer is opaque.
    fn jpeg_round_trip(&self, image: &RgbaImage, quality: u8) -> Result<RgbaImage, ForensicError>;

    /// Encode an RGBA raster as PNG bytes.
    fn encode_png(&self, image: &RgbaImage) -> Result<Vec<u8>, ForensicError>;
}

/// Production codec backed by the `image` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageCrateCodec;

impl ImageCodec for ImageCrateCodec {
    fn decode(&self, bytes: &[u8]) -> Result<DynamicImage, ForensicError> {
        if bytes.is_empty() {
            return Err(ForensicError::Decode("Image data is empty".into()));
        }
        image::load_from_memory(bytes)
            .map_err(|e| ForensicError::Decode(format!("Failed to decode image: {e}")))
    }

    fn jpeg_round_trip(&self, image: &RgbaImage, quality: u8) -> Result<RgbaImage, ForensicError> {
        let rgb = DynamicImage::ImageRgba8(image.clone()).to_rgb8();
        let mut cursor = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(rgb)
            .write_to(&mut cursor, ImageOutputFormat::Jpeg(quality.clamp(1, 100)))
            .map_err(|e| ForensicError::Encode(format!("JPEG encoding failed: {e}")))?;

        let jpeg = cursor.into_inner();
        let decoded = image::load_from_memory_with_format(&jpeg, ImageFormat::Jpeg)
            .map_err(|e| ForensicError::Decode(format!("Failed to decode re-encoded JPEG: {e}")))?;
        Ok(decoded.to_rgba8())
    }

    fn encode_png(&self, image: &RgbaImage) -> Result<Vec<u8>, ForensicError> {
        let dynamic = DynamicImage::ImageRgba8(image.clone());
        let mut cursor = Cursor::new(Vec::new());
        dynamic
            .write_to(&mut cursor, ImageOutputFormat::Png)
            .map_err(|e| ForensicError::Encode(format!("PNG encoding failed: {e}")))?;
        Ok(cursor.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn empty_bytes_is_decode_error() {
        let err = ImageCrateCodec.decode(&[]).unwrap_err();
        assert!(matches!(err, ForensicError::Decode(_)));
    }

    #[test]
    fn garbage_bytes_is_decode_error() {
        let err = ImageCrateCodec.decode(b"definitely not an image").unwrap_err();
        assert!(matches!(err, ForensicError::Decode(_)));
    }

    #[test]
    fn png_encode_decodes_to_same_pixels() {
        let img = RgbaImage::from_pixel(7, 5, Rgba([10, 20, 30, 255]));
        let png = ImageCrateCodec.encode_png(&img).unwrap();
        let back = ImageCrateCodec.decode(&png).unwrap().to_rgba8();
        assert_eq!(back, img);
    }

    #[test]
    fn jpeg_round_trip_keeps_dimensions_and_drops_alpha() {
        let img = RgbaImage::from_pixel(33, 17, Rgba([200, 100, 50, 40]));
        let back = ImageCrateCodec.jpeg_round_trip(&img, 90).unwrap();
        assert_eq!(back.dimensions(), (33, 17));
        assert!(back.pixels().all(|p| p.0[3] == 255));
    }
}

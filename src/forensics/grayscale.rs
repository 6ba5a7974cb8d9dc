use image::{GrayImage, Luma, RgbaImage};

/// Convert RGBA to grayscale using ITU-R BT.601 luminance, truncated to u8.
///
/// Alpha is ignored. Converts pixels directly rather than via `DynamicImage`.
pub fn rgba_to_gray(rgba: &RgbaImage) -> GrayImage {
    let (w, h) = rgba.dimensions();
    let mut gray = GrayImage::new(w, h);
    for (x, y, p) in rgba.enumerate_pixels() {
        gray.put_pixel(x, y, Luma([luma(p.0[0], p.0[1], p.0[2])]));
    }
    gray
}

#[inline]
pub fn luma(r: u8, g: u8, b: u8) -> u8 {
    (0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn primaries_use_bt601_weights() {
        assert_eq!(luma(255, 0, 0), 76);
        assert_eq!(luma(0, 255, 0), 149);
        assert_eq!(luma(0, 0, 255), 29);
    }

    #[test]
    fn gray_input_stays_close() {
        // 0.299 + 0.587 + 0.114 may land a hair under 1.0 in f32
        let v = luma(128, 128, 128);
        assert!(v == 127 || v == 128);
        assert_eq!(luma(0, 0, 0), 0);
    }

    #[test]
    fn conversion_keeps_dimensions_and_ignores_alpha() {
        let mut img = RgbaImage::from_pixel(5, 3, Rgba([255, 0, 0, 0]));
        img.put_pixel(4, 2, Rgba([0, 0, 255, 255]));
        let gray = rgba_to_gray(&img);
        assert_eq!(gray.dimensions(), (5, 3));
        assert_eq!(gray.get_pixel(0, 0).0[0], 76);
        assert_eq!(gray.get_pixel(4, 2).0[0], 29);
    }
}

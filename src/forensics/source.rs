//! Pixel buffer source: decode, orient and downscale to the working resolution.
//!
//! Pipeline flow:
//! 1. Validate bytes (size bounds)
//! 2. Decode via the codec
//! 3. Fix EXIF rotation (optional)
//! 4. Convert to RGBA
//! 5. Downscale so the longest edge fits `max_dimension`
//! 6. Derive the grayscale buffer shared by the edge/noise/residual engines

use std::borrow::Cow;
use std::io::Cursor;

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, GrayImage, RgbaImage};
use tracing::debug;

use super::grayscale::rgba_to_gray;
use super::{ForensicError, ImageCodec};
use crate::config::{ForensicConfig, ResizeQuality};

/// Capped, aspect-preserving resolution shared by all engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkingResolution {
    pub width: u32,
    pub height: u32,
}

impl WorkingResolution {
    /// Scale `(width, height)` so the longest edge equals `max_dim`.
    ///
    /// Images already within the cap pass through unchanged; nothing is
    /// upscaled. Each edge is rounded to the nearest pixel and kept >= 1.
    pub fn compute(width: u32, height: u32, max_dim: u32) -> Self {
        let largest = width.max(height);
        if largest <= max_dim || largest == 0 {
            return Self { width, height };
        }

        let scale = max_dim as f64 / largest as f64;
        let new_w = ((width as f64 * scale).round() as u32).clamp(1, max_dim);
        let new_h = ((height as f64 * scale).round() as u32).clamp(1, max_dim);
        Self {
            width: new_w,
            height: new_h,
        }
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// Decoded source at working resolution. Read-only once built.
#[derive(Debug, Clone)]
pub struct WorkingImage {
    rgba: RgbaImage,
    gray: GrayImage,
    original_width: u32,
    original_height: u32,
}

impl WorkingImage {
    /// Build from an RGBA buffer already at working resolution.
    pub fn from_rgba(rgba: RgbaImage, original_width: u32, original_height: u32) -> Self {
        let gray = rgba_to_gray(&rgba);
        Self {
            rgba,
            gray,
            original_width,
            original_height,
        }
    }

    pub fn rgba(&self) -> &RgbaImage {
        &self.rgba
    }

    pub fn gray(&self) -> &GrayImage {
        &self.gray
    }

    pub fn resolution(&self) -> WorkingResolution {
        WorkingResolution {
            width: self.rgba.width(),
            height: self.rgba.height(),
        }
    }

    pub fn original_dimensions(&self) -> (u32, u32) {
        (self.original_width, self.original_height)
    }
}

/// Produces `WorkingImage`s from encoded bytes or decoded bitmaps.
pub struct PixelBufferSource<'a> {
    codec: &'a dyn ImageCodec,
    config: &'a ForensicConfig,
}

impl<'a> PixelBufferSource<'a> {
    pub fn new(codec: &'a dyn ImageCodec, config: &'a ForensicConfig) -> Self {
        Self { codec, config }
    }

    /// Decode encoded image bytes into a working image.
    pub fn load(&self, bytes: &[u8]) -> Result<WorkingImage, ForensicError> {
        validate_image_bytes(bytes, self.config.max_input_bytes)?;

        let img = self.codec.decode(bytes)?;
        let img = if self.config.apply_exif_orientation {
            let orientation = Orientation::detect(bytes);
            if orientation != Orientation::Upright {
                debug!(?orientation, "Applying EXIF orientation");
            }
            orientation.apply(img)
        } else {
            img
        };

        self.from_dynamic(&img)
    }

    /// Build a working image from a bitmap the caller already decoded.
    pub fn from_dynamic(&self, img: &DynamicImage) -> Result<WorkingImage, ForensicError> {
        let (orig_w, orig_h) = img.dimensions();
        if orig_w == 0 || orig_h == 0 {
            return Err(ForensicError::Decode(format!(
                "Image has no pixels ({orig_w}x{orig_h})"
            )));
        }

        let rgba = img.to_rgba8();
        let working = downscale(&rgba, self.config.max_dimension, self.config.resize_quality);
        let working = working.into_owned();

        debug!(
            original = format!("{orig_w}x{orig_h}"),
            working = format!("{}x{}", working.width(), working.height()),
            "Prepared working image"
        );

        Ok(WorkingImage::from_rgba(working, orig_w, orig_h))
    }
}

/// Size bounds check, run before any decode is attempted.
pub fn validate_image_bytes(bytes: &[u8], max_bytes: usize) -> Result<(), ForensicError> {
    if bytes.is_empty() {
        return Err(ForensicError::Decode("Image data is empty".into()));
    }
    if bytes.len() > max_bytes {
        return Err(ForensicError::Decode(format!(
            "Image data exceeds {}MB limit",
            max_bytes / (1024 * 1024)
        )));
    }
    Ok(())
}

/// Downscale to the working resolution.
/// Uses `Cow` to avoid cloning when no downscale is needed.
pub fn downscale(img: &RgbaImage, max_dim: u32, quality: ResizeQuality) -> Cow<'_, RgbaImage> {
    let target = WorkingResolution::compute(img.width(), img.height(), max_dim);
    if (target.width, target.height) == img.dimensions() {
        return Cow::Borrowed(img);
    }

    let filter = match quality {
        ResizeQuality::High => FilterType::CatmullRom,
        ResizeQuality::Fast => FilterType::Triangle,
    };
    Cow::Owned(image::imageops::resize(img, target.width, target.height, filter))
}

/// Orientation tag (0x0112) from a camera's EXIF block.
///
/// Phones store the sensor readout as-is and record how the picture should be
/// turned for display. Analysing the unrotated buffer would put heatmap hot
/// spots in the wrong place relative to what the reviewer sees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Orientation {
    #[default]
    Upright,
    MirroredHorizontal,
    UpsideDown,
    MirroredVertical,
    /// Mirrored across the main diagonal.
    Transposed,
    RotatedCw,
    /// Mirrored across the anti-diagonal.
    Transversed,
    RotatedCcw,
}

impl Orientation {
    /// Map the raw tag value; anything outside 1..=8 is treated as upright.
    pub fn from_tag(value: u32) -> Self {
        match value {
            2 => Self::MirroredHorizontal,
            3 => Self::UpsideDown,
            4 => Self::MirroredVertical,
            5 => Self::Transposed,
            6 => Self::RotatedCw,
            7 => Self::Transversed,
            8 => Self::RotatedCcw,
            _ => Self::Upright,
        }
    }

    /// Orientation recorded in `bytes`, or `Upright` when there is no
    /// readable EXIF block.
    pub fn detect(bytes: &[u8]) -> Self {
        let reader = match exif::Reader::new().read_from_container(&mut Cursor::new(bytes)) {
            Ok(reader) => reader,
            Err(_) => return Self::Upright,
        };
        reader
            .get_field(exif::Tag::Orientation, exif::In::PRIMARY)
            .and_then(|field| field.value.get_uint(0))
            .map(Self::from_tag)
            .unwrap_or_default()
    }

    /// Whether displaying the image swaps its width and height.
    pub fn swaps_dimensions(self) -> bool {
        matches!(
            self,
            Self::Transposed | Self::RotatedCw | Self::Transversed | Self::RotatedCcw
        )
    }

    /// Turn a decoded bitmap upright.
    pub fn apply(self, img: DynamicImage) -> DynamicImage {
        match self {
            Self::Upright => img,
            Self::MirroredHorizontal => img.fliph(),
            Self::UpsideDown => img.rotate180(),
            Self::MirroredVertical => img.flipv(),
            Self::Transposed => img.rotate90().fliph(),
            Self::RotatedCw => img.rotate90(),
            Self::Transversed => img.rotate270().fliph(),
            Self::RotatedCcw => img.rotate270(),
        }
    }
}

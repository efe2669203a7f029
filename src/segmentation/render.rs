use std::path::{Path, PathBuf};

use image::{imageops::FilterType, Rgb, RgbImage};

use super::types::SegmentationMask;
use crate::error::Result;
use crate::persist;

pub const OVERLAY_COLOR: [u8; 3] = [255, 0, 0];
pub const OVERLAY_ALPHA: f32 = 0.5;

/// Photograph with the wheal mask blended over it, at the photograph's
/// native resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentedComposite {
    image: RgbImage,
}

impl SegmentedComposite {
    pub const MIME_TYPE: &'static str = "image/png";

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    pub fn as_image(&self) -> &RgbImage {
        &self.image
    }

    /// Write the composite as PNG. A failure leaves nothing at `path`.
    pub fn persist<P: AsRef<Path>>(&self, path: P) -> Result<PathBuf> {
        persist::write_png(&self.image, path.as_ref())
    }
}

/// Blends a working-resolution mask over the original photograph
#[derive(Debug, Clone, Copy)]
pub struct MaskRenderer {
    color: Rgb<u8>,
    alpha: f32,
    filter: FilterType,
}

impl Default for MaskRenderer {
    fn default() -> Self {
        Self::new(OVERLAY_COLOR, OVERLAY_ALPHA, FilterType::Nearest)
    }
}

impl MaskRenderer {
    pub fn new(color: [u8; 3], alpha: f32, filter: FilterType) -> Self {
        Self {
            color: Rgb(color),
            alpha: alpha.clamp(0.0, 1.0),
            filter,
        }
    }

    /// Upsample `mask` to the original's resolution and blend it.
    pub fn render(&self, original: &RgbImage, mask: &SegmentationMask) -> SegmentedComposite {
        let (width, height) = original.dimensions();
        let upsampled = self.upsample(mask, width, height);
        self.blend(original, &upsampled)
    }

    /// Resample the mask to `width` x `height` with the configured filter.
    pub fn upsample(&self, mask: &SegmentationMask, width: u32, height: u32) -> SegmentationMask {
        let _span = tracing::debug_span!("upsample").entered();
        mask.resized(width, height, self.filter)
    }

    /// Blend a mask over `original`, resampling it first if its size differs.
    ///
    /// Foreground pixels become `(1 - alpha) * pixel + alpha * color`,
    /// background pixels are copied unchanged.
    pub fn blend(&self, original: &RgbImage, mask: &SegmentationMask) -> SegmentedComposite {
        let (width, height) = original.dimensions();
        let resampled;
        let mask = if mask.dimensions() == (width, height) {
            mask
        } else {
            resampled = self.upsample(mask, width, height);
            &resampled
        };

        let _span = tracing::debug_span!("blend").entered();

        let mut image = original.clone();
        for (x, y, pixel) in image.enumerate_pixels_mut() {
            if !mask.is_foreground(x, y) {
                continue;
            }
            for c in 0..3 {
                let blended =
                    (1.0 - self.alpha) * pixel[c] as f32 + self.alpha * self.color[c] as f32;
                pixel[c] = blended.round().clamp(0.0, 255.0) as u8;
            }
        }

        SegmentedComposite { image }
    }
}

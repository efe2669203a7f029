use std::path::{Path, PathBuf};

use image::{imageops, GrayImage, Luma, RgbImage};
use ndarray::{Array4, ArrayD};

use super::device::ResolvedDevice;
use crate::error::{DermaError, Result};

/// Fixed input size (width, height) of the wheal segmentation network
pub const WORKING_RESOLUTION: (u32, u32) = (736, 736);

const FOREGROUND: u8 = 255;
const BACKGROUND: u8 = 0;

/// Raw network output, shaped `[1, C, H, W]`
pub type Logits = ArrayD<f32>;

/// Architecture descriptor carried by every loaded model.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModelDescriptor {
    pub architecture: String,
    pub encoder: String,
    pub checkpoint: PathBuf,
    pub device: ResolvedDevice,
}

/// Trait for segmentation networks
/// Allows swapping the ONNX Runtime backend for other implementations
pub trait SegmentationModel: Send {
    fn descriptor(&self) -> &ModelDescriptor;

    /// Run one forward pass over an NCHW tensor in [0, 1].
    ///
    /// Implementations must not keep state between calls; a failed pass
    /// leaves the model as it was.
    fn forward(&mut self, input: &Array4<f32>) -> Result<Logits>;

    /// Get the model's input dimensions
    ///
    /// Returns (width, height)
    fn input_size(&self) -> (u32, u32) {
        WORKING_RESOLUTION
    }
}

/// Uploaded skin-test photograph, decoded to RGB.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputPhotograph {
    image: RgbImage,
}

impl InputPhotograph {
    /// Decode raw upload bytes (PNG, JPEG, ...).
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let image = image::load_from_memory(bytes)
            .map_err(|e| DermaError::DecodeError(e.to_string()))?
            .to_rgb8();
        Ok(Self { image })
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(DermaError::MissingResource(path.to_path_buf()));
        }
        let image = image::open(path)
            .map_err(|e| DermaError::DecodeError(format!("{}: {e}", path.display())))?
            .to_rgb8();
        Ok(Self { image })
    }

    pub fn from_image(image: RgbImage) -> Self {
        Self { image }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    pub fn as_image(&self) -> &RgbImage {
        &self.image
    }
}

/// Binary wheal mask: 255 marks foreground, 0 background.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentationMask {
    mask: GrayImage,
}

impl SegmentationMask {
    /// Build a mask from per-pixel foreground decisions in row-major order.
    pub fn from_fn<F>(width: u32, height: u32, mut is_foreground: F) -> Self
    where
        F: FnMut(u32, u32) -> bool,
    {
        let mask = GrayImage::from_fn(width, height, |x, y| {
            Luma([if is_foreground(x, y) { FOREGROUND } else { BACKGROUND }])
        });
        Self { mask }
    }

    pub fn width(&self) -> u32 {
        self.mask.width()
    }

    pub fn height(&self) -> u32 {
        self.mask.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.mask.dimensions()
    }

    pub fn is_foreground(&self, x: u32, y: u32) -> bool {
        self.mask.get_pixel(x, y)[0] >= 128
    }

    pub fn foreground_pixels(&self) -> usize {
        self.mask.pixels().filter(|p| p[0] >= 128).count()
    }

    /// Share of pixels classified as wheal, in [0, 1]
    pub fn foreground_fraction(&self) -> f32 {
        let total = self.mask.width() as usize * self.mask.height() as usize;
        if total == 0 {
            return 0.0;
        }
        self.foreground_pixels() as f32 / total as f32
    }

    /// Resample to `width` x `height`. The result stays binary whatever the
    /// filter, values are re-thresholded at the midpoint.
    pub fn resized(&self, width: u32, height: u32, filter: imageops::FilterType) -> Self {
        if self.dimensions() == (width, height) {
            return self.clone();
        }
        let resized = imageops::resize(&self.mask, width, height, filter);
        Self::from_fn(width, height, |x, y| resized.get_pixel(x, y)[0] >= 128)
    }

    /// Mask as a grayscale image for inspection
    pub fn as_luma(&self) -> &GrayImage {
        &self.mask
    }
}

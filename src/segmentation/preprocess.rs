use image::{imageops, RgbImage};
use ndarray::{Array4, Axis};

use super::types::{Logits, SegmentationMask};
use crate::error::{DermaError, Result};

/// Converts photographs to model input tensors and model output back to masks
#[derive(Debug, Clone, Copy)]
pub struct Preprocessor {
    target_width: u32,
    target_height: u32,
}

impl Preprocessor {
    pub fn new(target_width: u32, target_height: u32) -> Self {
        Self {
            target_width,
            target_height,
        }
    }

    pub fn target_size(&self) -> (u32, u32) {
        (self.target_width, self.target_height)
    }

    /// Stretch to the working resolution with bilinear filtering.
    /// Aspect ratio is not preserved.
    pub fn resize(&self, image: &RgbImage) -> RgbImage {
        let _span = tracing::debug_span!("resize").entered();

        if image.dimensions() == (self.target_width, self.target_height) {
            return image.clone();
        }

        imageops::resize(
            image,
            self.target_width,
            self.target_height,
            imageops::FilterType::Triangle,
        )
    }

    /// Convert an image already at working resolution into a normalized NCHW tensor
    ///
    /// Returns: Array4<f32> with shape [1, 3, height, width], values in [0, 1]
    pub fn to_tensor(&self, resized: &RgbImage) -> Array4<f32> {
        let _span = tracing::debug_span!("to_tensor").entered();

        let (width, height) = resized.dimensions();
        let mut tensor = Array4::<f32>::zeros((1, 3, height as usize, width as usize));

        for (x, y, pixel) in resized.enumerate_pixels() {
            let (x, y) = (x as usize, y as usize);
            tensor[[0, 0, y, x]] = pixel[0] as f32 / 255.0;
            tensor[[0, 1, y, x]] = pixel[1] as f32 / 255.0;
            tensor[[0, 2, y, x]] = pixel[2] as f32 / 255.0;
        }

        tensor
    }

    /// Turn raw network output into a binary mask at working resolution.
    ///
    /// A single channel is read as logits: foreground where
    /// sigmoid(logit) > `threshold`. Several channels are read as class
    /// scores: foreground where the argmax is not class 0.
    pub fn threshold(&self, output: &Logits, threshold: f32) -> Result<SegmentationMask> {
        let _span = tracing::debug_span!("threshold").entered();

        let output = match output.ndim() {
            4 => {
                if output.shape()[0] != 1 {
                    return Err(DermaError::InferenceError(format!(
                        "expected batch of 1, got {:?}",
                        output.shape()
                    )));
                }
                output.index_axis(Axis(0), 0)
            }
            3 => output.view(),
            _ => {
                return Err(DermaError::InferenceError(format!(
                    "unexpected output shape {:?}",
                    output.shape()
                )))
            }
        };

        let shape = output.shape();
        let (channels, height, width) = (shape[0], shape[1], shape[2]);
        if channels == 0 {
            return Err(DermaError::InferenceError("model produced no channels".into()));
        }
        if (width as u32, height as u32) != self.target_size() {
            return Err(DermaError::InferenceError(format!(
                "output is {}x{}, expected {}x{}",
                width, height, self.target_width, self.target_height
            )));
        }

        let mask = if channels == 1 {
            SegmentationMask::from_fn(width as u32, height as u32, |x, y| {
                sigmoid(output[[0, y as usize, x as usize]]) > threshold
            })
        } else {
            SegmentationMask::from_fn(width as u32, height as u32, |x, y| {
                let (y, x) = (y as usize, x as usize);
                let mut best = 0;
                for c in 1..channels {
                    if output[[c, y, x]] > output[[best, y, x]] {
                        best = c;
                    }
                }
                best != 0
            })
        };

        Ok(mask)
    }
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use ndarray::{Array3, ArrayD, IxDyn};

    #[test]
    fn resize_stretches_to_target() {
        let pre = Preprocessor::new(8, 8);
        let wide = RgbImage::from_pixel(32, 4, Rgb([9, 9, 9]));
        let resized = pre.resize(&wide);
        assert_eq!(resized.dimensions(), (8, 8));
        assert!(resized.pixels().all(|p| *p == Rgb([9, 9, 9])));
    }

    #[test]
    fn tensor_is_nchw_and_normalized() {
        let pre = Preprocessor::new(2, 1);
        let mut image = RgbImage::new(2, 1);
        image.put_pixel(0, 0, Rgb([255, 0, 51]));
        image.put_pixel(1, 0, Rgb([0, 255, 0]));

        let tensor = pre.to_tensor(&image);
        assert_eq!(tensor.shape(), &[1, 3, 1, 2]);
        assert_eq!(tensor[[0, 0, 0, 0]], 1.0);
        assert_eq!(tensor[[0, 1, 0, 0]], 0.0);
        assert!((tensor[[0, 2, 0, 0]] - 0.2).abs() < 1e-6);
        assert_eq!(tensor[[0, 1, 0, 1]], 1.0);
    }

    #[test]
    fn single_channel_logits_use_sigmoid_threshold() {
        let pre = Preprocessor::new(2, 2);
        let logits = Array4::from_shape_vec((1, 1, 2, 2), vec![3.0, -3.0, 0.1, -0.1])
            .unwrap()
            .into_dyn();
        let mask = pre.threshold(&logits, 0.5).unwrap();
        assert!(mask.is_foreground(0, 0));
        assert!(!mask.is_foreground(1, 0));
        assert!(mask.is_foreground(0, 1));
        assert!(!mask.is_foreground(1, 1));

        let strict = pre.threshold(&logits, 0.9).unwrap();
        assert_eq!(strict.foreground_pixels(), 1);
    }

    #[test]
    fn multi_channel_output_uses_argmax() {
        let pre = Preprocessor::new(2, 1);
        // channel 0 background, channel 1 wheal
        let scores = Array4::from_shape_vec((1, 2, 1, 2), vec![0.9, 0.2, 0.1, 0.8])
            .unwrap()
            .into_dyn();
        let mask = pre.threshold(&scores, 0.5).unwrap();
        assert!(!mask.is_foreground(0, 0));
        assert!(mask.is_foreground(1, 0));
    }

    #[test]
    fn unbatched_output_is_accepted() {
        let pre = Preprocessor::new(2, 2);
        let logits = Array3::<f32>::from_elem((1, 2, 2), 5.0).into_dyn();
        assert_eq!(pre.threshold(&logits, 0.5).unwrap().foreground_pixels(), 4);
    }

    #[test]
    fn wrong_output_size_is_inference_error() {
        let pre = Preprocessor::new(4, 4);
        let logits = ArrayD::<f32>::zeros(IxDyn(&[1, 1, 2, 2]));
        assert!(matches!(
            pre.threshold(&logits, 0.5),
            Err(DermaError::InferenceError(_))
        ));
        let flat = ArrayD::<f32>::zeros(IxDyn(&[16]));
        assert!(pre.threshold(&flat, 0.5).is_err());
    }
}

use std::time::Duration;

use image::RgbImage;

use super::cache::ModelHandle;
use super::preprocess::Preprocessor;
use super::types::{InputPhotograph, SegmentationMask, WORKING_RESOLUTION};
use crate::cancel::CancellationToken;
use crate::error::{DermaError, Result};

pub const DEFAULT_THRESHOLD: f32 = 0.5;

/// Resize, forward pass and thresholding for one photograph.
#[derive(Debug, Clone)]
pub struct InferencePipeline {
    preprocessor: Preprocessor,
    threshold: f32,
    timeout: Option<Duration>,
}

impl Default for InferencePipeline {
    fn default() -> Self {
        Self::new(WORKING_RESOLUTION, DEFAULT_THRESHOLD, None)
    }
}

impl InferencePipeline {
    pub fn new(working_size: (u32, u32), threshold: f32, timeout: Option<Duration>) -> Self {
        Self {
            preprocessor: Preprocessor::new(working_size.0, working_size.1),
            threshold,
            timeout,
        }
    }

    pub fn working_size(&self) -> (u32, u32) {
        self.preprocessor.target_size()
    }

    /// Stretch the photograph to working resolution.
    pub fn resize(&self, photograph: &InputPhotograph) -> RgbImage {
        self.preprocessor.resize(photograph.as_image())
    }

    /// Forward pass plus thresholding over an already resized photograph.
    pub fn segment(&self, model: &ModelHandle, resized: &RgbImage) -> Result<SegmentationMask> {
        if model.input_size() != self.working_size() {
            return Err(DermaError::InferenceError(format!(
                "model expects {:?} input, pipeline works at {:?}",
                model.input_size(),
                self.working_size()
            )));
        }

        let tensor = self.preprocessor.to_tensor(resized);

        let _span = tracing::debug_span!("inference").entered();
        let output = model.forward(tensor, self.timeout)?;
        drop(_span);

        let mask = self.preprocessor.threshold(&output, self.threshold)?;
        tracing::debug!(
            "Mask {}x{}, foreground {:.2}%",
            mask.width(),
            mask.height(),
            mask.foreground_fraction() * 100.0
        );
        Ok(mask)
    }

    /// Returns the resized photograph together with its mask, both at
    /// working resolution. Cancellation is honored between resize and the
    /// forward pass.
    pub fn infer(
        &self,
        model: &ModelHandle,
        photograph: &InputPhotograph,
        cancel: &CancellationToken,
    ) -> Result<(RgbImage, SegmentationMask)> {
        let resized = self.resize(photograph);
        cancel.check()?;
        let mask = self.segment(model, &resized)?;
        Ok((resized, mask))
    }
}

use std::time::Duration;

use image::imageops::FilterType;

use crate::error::{DermaError, Result};
use crate::segmentation::{
    ComputeDevice, InferencePipeline, MaskRenderer, DEFAULT_ARCHITECTURE, DEFAULT_ENCODER,
    DEFAULT_THRESHOLD, OVERLAY_ALPHA, OVERLAY_COLOR, WORKING_RESOLUTION,
};

/// Settings for one analysis run. `Default` reproduces the observed
/// behavior of the bedside application.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub architecture: String,
    pub encoder: String,
    pub device: ComputeDevice,
    pub working_size: (u32, u32),
    pub threshold: f32,
    pub overlay_color: [u8; 3],
    pub overlay_alpha: f32,
    pub mask_filter: FilterType,
    /// `None` waits for inference indefinitely
    pub timeout: Option<Duration>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            architecture: DEFAULT_ARCHITECTURE.to_string(),
            encoder: DEFAULT_ENCODER.to_string(),
            device: ComputeDevice::Auto,
            working_size: WORKING_RESOLUTION,
            threshold: DEFAULT_THRESHOLD,
            overlay_color: OVERLAY_COLOR,
            overlay_alpha: OVERLAY_ALPHA,
            mask_filter: FilterType::Nearest,
            timeout: Some(Duration::from_secs(120)),
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(DermaError::InvalidConfig(format!(
                "threshold {} outside [0, 1]",
                self.threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.overlay_alpha) {
            return Err(DermaError::InvalidConfig(format!(
                "overlay alpha {} outside [0, 1]",
                self.overlay_alpha
            )));
        }
        if self.working_size.0 == 0 || self.working_size.1 == 0 {
            return Err(DermaError::InvalidConfig("working size must be non-zero".into()));
        }
        Ok(())
    }

    pub fn pipeline(&self) -> InferencePipeline {
        InferencePipeline::new(self.working_size, self.threshold, self.timeout)
    }

    pub fn renderer(&self) -> MaskRenderer {
        MaskRenderer::new(self.overlay_color, self.overlay_alpha, self.mask_filter)
    }
}

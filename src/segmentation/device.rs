use std::fmt;

use ort::execution_providers::{CUDAExecutionProvider, ExecutionProvider};

use crate::error::{DermaError, Result};

/// Requested compute device for the segmentation network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, clap::ValueEnum)]
pub enum ComputeDevice {
    /// Accelerator when one is available, CPU otherwise
    #[default]
    Auto,
    Cpu,
    Accelerator,
}

/// Device a model is actually placed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResolvedDevice {
    Cpu,
    Cuda,
}

impl fmt::Display for ResolvedDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolvedDevice::Cpu => f.write_str("cpu"),
            ResolvedDevice::Cuda => f.write_str("cuda"),
        }
    }
}

impl ComputeDevice {
    pub fn resolve(self) -> Result<ResolvedDevice> {
        match self {
            ComputeDevice::Cpu => Ok(ResolvedDevice::Cpu),
            _ => self.resolve_with(accelerator_available()),
        }
    }

    pub(crate) fn resolve_with(self, accelerator: bool) -> Result<ResolvedDevice> {
        match (self, accelerator) {
            (ComputeDevice::Cpu, _) => Ok(ResolvedDevice::Cpu),
            (ComputeDevice::Auto, true) | (ComputeDevice::Accelerator, true) => {
                Ok(ResolvedDevice::Cuda)
            }
            (ComputeDevice::Auto, false) => {
                tracing::info!("No accelerator available, falling back to CPU");
                Ok(ResolvedDevice::Cpu)
            }
            (ComputeDevice::Accelerator, false) => Err(DermaError::InvalidConfig(
                "accelerator requested but none is available".into(),
            )),
        }
    }
}

fn accelerator_available() -> bool {
    match CUDAExecutionProvider::default().is_available() {
        Ok(available) => available,
        Err(e) => {
            tracing::debug!("CUDA availability check failed: {}", e);
            false
        }
    }
}

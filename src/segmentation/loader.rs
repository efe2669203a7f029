use std::path::Path;

use ndarray::Array4;
use ort::execution_providers::{CUDAExecutionProvider, TensorRTExecutionProvider};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::tensor::TensorElementType;
use ort::value::{TensorRef, ValueType};

use super::device::{ComputeDevice, ResolvedDevice};
use super::types::{Logits, ModelDescriptor, SegmentationModel, WORKING_RESOLUTION};
use crate::error::{DermaError, Result};

const ARCHITECTURE_METADATA_KEY: &str = "architecture";
const ENCODER_METADATA_KEY: &str = "encoder";

/// Wheal segmentation network exported to ONNX and run with ONNX Runtime.
pub struct OnnxSegmenter {
    session: Session,
    descriptor: ModelDescriptor,
}

impl OnnxSegmenter {
    /// Build a session for `checkpoint` and check it against the requested
    /// architecture/encoder pair.
    ///
    /// The device is resolved once here; `Auto` picks CUDA when present.
    pub fn load<P: AsRef<Path>>(
        architecture: &str,
        encoder: &str,
        checkpoint: P,
        device: ComputeDevice,
    ) -> Result<Self> {
        let path = checkpoint.as_ref();

        if !path.exists() {
            return Err(DermaError::MissingResource(path.to_path_buf()));
        }

        Self::load_on(architecture, encoder, path, device.resolve()?)
    }

    /// Like [`OnnxSegmenter::load`] for a device that is already resolved.
    pub fn load_on<P: AsRef<Path>>(
        architecture: &str,
        encoder: &str,
        checkpoint: P,
        resolved: ResolvedDevice,
    ) -> Result<Self> {
        let path = checkpoint.as_ref();

        if !path.exists() {
            return Err(DermaError::MissingResource(path.to_path_buf()));
        }

        tracing::info!(
            "Loading {}/{} from {} on {}",
            architecture,
            encoder,
            path.display(),
            resolved
        );

        let session = build_session(path, resolved)?;
        check_session(&session, path, architecture, encoder)?;

        tracing::info!("Segmentation model loaded successfully");

        Ok(Self {
            session,
            descriptor: ModelDescriptor {
                architecture: architecture.to_string(),
                encoder: encoder.to_string(),
                checkpoint: path.to_path_buf(),
                device: resolved,
            },
        })
    }
}

fn build_session(path: &Path, device: ResolvedDevice) -> Result<Session> {
    let builder = Session::builder()
        .and_then(|b| b.with_optimization_level(GraphOptimizationLevel::Level3))
        .and_then(|b| b.with_intra_threads(4))
        .map_err(DermaError::inference)?;

    let builder = match device {
        ResolvedDevice::Cuda => builder
            .with_execution_providers([
                TensorRTExecutionProvider::default().build(),
                CUDAExecutionProvider::default().build().error_on_failure(),
            ])
            .map_err(DermaError::inference)?,
        ResolvedDevice::Cpu => builder,
    };

    builder.commit_from_file(path).map_err(|e| {
        DermaError::incompatible(path, format!("checkpoint could not be loaded: {e}"))
    })
}

fn check_session(session: &Session, path: &Path, architecture: &str, encoder: &str) -> Result<()> {
    let input = session
        .inputs
        .first()
        .ok_or_else(|| DermaError::incompatible(path, "graph has no inputs"))?;
    let output = session
        .outputs
        .first()
        .ok_or_else(|| DermaError::incompatible(path, "graph has no outputs"))?;

    let input_shape = float_tensor_shape(&input.input_type)
        .ok_or_else(|| DermaError::incompatible(path, "input is not a float tensor"))?;
    let output_shape = float_tensor_shape(&output.output_type)
        .ok_or_else(|| DermaError::incompatible(path, "output is not a float tensor"))?;

    check_io_shapes(&input_shape, &output_shape, WORKING_RESOLUTION)
        .map_err(|reason| DermaError::incompatible(path, reason))?;

    let metadata = session.metadata().map_err(DermaError::inference)?;
    for (key, expected) in [
        (ARCHITECTURE_METADATA_KEY, architecture),
        (ENCODER_METADATA_KEY, encoder),
    ] {
        let found = metadata.custom(key).map_err(DermaError::inference)?;
        check_metadata(key, expected, found.as_deref())
            .map_err(|reason| DermaError::incompatible(path, reason))?;
    }

    Ok(())
}

fn float_tensor_shape(value: &ValueType) -> Option<Vec<i64>> {
    match value {
        ValueType::Tensor { ty, shape, .. } if *ty == TensorElementType::Float32 => {
            Some(shape.iter().copied().collect())
        }
        _ => None,
    }
}

/// Input must be `[N, 3, H, W]` and output `[N, C, H, W]`; fixed (non
/// negative) spatial dims must equal the working resolution.
pub(crate) fn check_io_shapes(
    input: &[i64],
    output: &[i64],
    (width, height): (u32, u32),
) -> std::result::Result<(), String> {
    if input.len() != 4 {
        return Err(format!("expected 4-D input, graph declares {input:?}"));
    }
    if input[1] >= 0 && input[1] != 3 {
        return Err(format!("expected 3 input channels, graph declares {}", input[1]));
    }
    if output.len() != 4 {
        return Err(format!("expected 4-D output, graph declares {output:?}"));
    }
    if output[1] == 0 {
        return Err("output declares zero channels".into());
    }

    for (shape, what) in [(input, "input"), (output, "output")] {
        let (h, w) = (shape[2], shape[3]);
        if (h >= 0 && h != height as i64) || (w >= 0 && w != width as i64) {
            return Err(format!(
                "{what} is {w}x{h}, working resolution is {width}x{height}"
            ));
        }
    }

    Ok(())
}

/// Graphs without descriptor metadata are accepted as-is.
pub(crate) fn check_metadata(
    key: &str,
    expected: &str,
    found: Option<&str>,
) -> std::result::Result<(), String> {
    match found {
        Some(found) if !found.eq_ignore_ascii_case(expected) => Err(format!(
            "checkpoint {key} is '{found}', requested '{expected}'"
        )),
        _ => Ok(()),
    }
}

impl SegmentationModel for OnnxSegmenter {
    fn descriptor(&self) -> &ModelDescriptor {
        &self.descriptor
    }

    fn forward(&mut self, input: &Array4<f32>) -> Result<Logits> {
        let _span = tracing::debug_span!("onnx_forward").entered();

        let tensor = TensorRef::from_array_view(input.view()).map_err(DermaError::inference)?;
        let outputs = self
            .session
            .run(ort::inputs![tensor])
            .map_err(DermaError::inference)?;

        if outputs.len() == 0 {
            return Err(DermaError::InferenceError("model returned no outputs".into()));
        }

        let logits = outputs[0]
            .try_extract_array::<f32>()
            .map_err(DermaError::inference)?
            .to_owned();

        Ok(logits)
    }
}

/// Load a segmentation network without going through a cache.
pub fn load<P: AsRef<Path>>(
    architecture: &str,
    encoder: &str,
    checkpoint: P,
    device: ComputeDevice,
) -> Result<Box<dyn SegmentationModel>> {
    let model = OnnxSegmenter::load(architecture, encoder, checkpoint, device)?;
    Ok(Box::new(model))
}

/// [`load`] for a device that is already resolved.
pub fn load_on<P: AsRef<Path>>(
    architecture: &str,
    encoder: &str,
    checkpoint: P,
    device: ResolvedDevice,
) -> Result<Box<dyn SegmentationModel>> {
    let model = OnnxSegmenter::load_on(architecture, encoder, checkpoint, device)?;
    Ok(Box::new(model))
}

mod cache;
mod device;
mod loader;
mod pipeline;
mod preprocess;
mod render;
pub mod types;

pub use cache::{ModelCache, ModelHandle, ModelKey};
pub use device::{ComputeDevice, ResolvedDevice};
pub use loader::{load, load_on, OnnxSegmenter};
pub use pipeline::{InferencePipeline, DEFAULT_THRESHOLD};
pub use preprocess::Preprocessor;
pub use render::{MaskRenderer, SegmentedComposite, OVERLAY_ALPHA, OVERLAY_COLOR};
pub use types::{
    InputPhotograph, Logits, ModelDescriptor, SegmentationMask, SegmentationModel,
    WORKING_RESOLUTION,
};

pub const DEFAULT_ARCHITECTURE: &str = "UnetPlusPlus";
pub const DEFAULT_ENCODER: &str = "resnet34";

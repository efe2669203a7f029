//! Allergen overlay and wheal segmentation core for skin-prick testing.
//!
//! Two paths share this crate: the overlay compositor labels the applicator
//! template with a panel's allergens, and the analysis pipeline segments a
//! photograph of the test area and blends the wheal mask over it.

pub mod analysis;
pub mod cancel;
pub mod config;
pub mod error;
pub mod overlay;
pub mod panel;
mod persist;
pub mod segmentation;
pub mod session;

pub use analysis::{Analysis, AnalysisOutcome, AnalysisStage, FailedAt};
pub use cancel::CancellationToken;
pub use config::PipelineConfig;
pub use error::{DermaError, Result};
pub use overlay::{LabelFont, OverlayCompositor, OverlayImage};
pub use panel::{AllergenSlot, GeometryTable, PanelId, PanelLayout};
pub use segmentation::{
    ComputeDevice, InferencePipeline, InputPhotograph, MaskRenderer, ModelCache, ModelHandle,
    SegmentationMask, SegmentationModel, SegmentedComposite,
};
pub use session::SessionContext;

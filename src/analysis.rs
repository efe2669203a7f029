use std::fmt;
use std::path::{Path, PathBuf};

use crate::cancel::CancellationToken;
use crate::error::{DermaError, Result};
use crate::segmentation::{
    InferencePipeline, InputPhotograph, MaskRenderer, ModelHandle, SegmentationMask,
    SegmentedComposite,
};

/// Where a single analysis run stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisStage {
    Idle,
    PhotographReceived,
    Resized,
    Inferred,
    MaskUpsampled,
    Composited,
    Persisted,
    /// Terminal; `at` is the last stage reached before the error
    Failed { at: FailedAt },
}

/// Non-terminal stage a run failed from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailedAt {
    Idle,
    PhotographReceived,
    Resized,
    Inferred,
    MaskUpsampled,
    Composited,
}

impl fmt::Display for AnalysisStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisStage::Failed { at } => write!(f, "Failed({at:?})"),
            other => write!(f, "{other:?}"),
        }
    }
}

impl AnalysisStage {
    pub fn is_terminal(self) -> bool {
        matches!(self, AnalysisStage::Persisted | AnalysisStage::Failed { .. })
    }

    fn as_failed(self) -> FailedAt {
        match self {
            AnalysisStage::PhotographReceived => FailedAt::PhotographReceived,
            AnalysisStage::Resized => FailedAt::Resized,
            AnalysisStage::Inferred => FailedAt::Inferred,
            AnalysisStage::MaskUpsampled => FailedAt::MaskUpsampled,
            AnalysisStage::Composited => FailedAt::Composited,
            AnalysisStage::Idle | AnalysisStage::Persisted | AnalysisStage::Failed { .. } => {
                FailedAt::Idle
            }
        }
    }
}

/// Artifacts of a completed run.
#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    /// Mask at working resolution
    pub mask: SegmentationMask,
    pub composite: SegmentedComposite,
    pub output_path: PathBuf,
}

/// One operator-triggered analysis: photograph in, persisted composite out.
///
/// Runs are single-shot. After a failure the operator starts a new run
/// from a fresh photograph.
pub struct Analysis<'a> {
    pipeline: &'a InferencePipeline,
    renderer: &'a MaskRenderer,
    cancel: CancellationToken,
    stage: AnalysisStage,
    history: Vec<AnalysisStage>,
}

impl<'a> Analysis<'a> {
    pub fn new(pipeline: &'a InferencePipeline, renderer: &'a MaskRenderer) -> Self {
        Self {
            pipeline,
            renderer,
            cancel: CancellationToken::new(),
            stage: AnalysisStage::Idle,
            history: vec![AnalysisStage::Idle],
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn stage(&self) -> AnalysisStage {
        self.stage
    }

    /// Every stage entered so far, starting with `Idle`
    pub fn history(&self) -> &[AnalysisStage] {
        &self.history
    }

    /// Decode uploaded bytes and run the analysis on them.
    pub fn run_bytes(
        &mut self,
        model: &ModelHandle,
        bytes: &[u8],
        output: &Path,
    ) -> Result<AnalysisOutcome> {
        let photograph = self.track(InputPhotograph::from_bytes(bytes))?;
        self.run(model, photograph, output)
    }

    /// Segment `photograph` and persist the composite at `output`.
    ///
    /// Nothing is written unless every earlier stage succeeded.
    pub fn run(
        &mut self,
        model: &ModelHandle,
        photograph: InputPhotograph,
        output: &Path,
    ) -> Result<AnalysisOutcome> {
        let _span = tracing::info_span!("analysis", output = %output.display()).entered();

        if self.stage != AnalysisStage::Idle {
            return Err(DermaError::InvalidConfig(format!(
                "analysis already ran to {}; start a new one",
                self.stage
            )));
        }

        self.track(self.cancel.check())?;
        self.advance(AnalysisStage::PhotographReceived);
        let (width, height) = photograph.dimensions();
        tracing::info!("Analyzing {}x{} photograph", width, height);

        let resized = self.pipeline.resize(&photograph);
        self.advance(AnalysisStage::Resized);

        self.track(self.cancel.check())?;
        let mask = self.track(self.pipeline.segment(model, &resized))?;
        self.advance(AnalysisStage::Inferred);

        let upsampled = self.renderer.upsample(&mask, width, height);
        self.advance(AnalysisStage::MaskUpsampled);

        let composite = self.renderer.blend(photograph.as_image(), &upsampled);
        self.advance(AnalysisStage::Composited);

        self.track(self.cancel.check())?;
        let output_path = self.track(composite.persist(output))?;
        self.advance(AnalysisStage::Persisted);

        tracing::info!(
            "Wheal mask covers {:.2}% of the photograph",
            upsampled.foreground_fraction() * 100.0
        );

        Ok(AnalysisOutcome {
            mask,
            composite,
            output_path,
        })
    }

    fn advance(&mut self, next: AnalysisStage) {
        tracing::debug!("{} -> {}", self.stage, next);
        self.stage = next;
        self.history.push(next);
    }

    fn track<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            let failed = AnalysisStage::Failed {
                at: self.stage.as_failed(),
            };
            tracing::warn!("Analysis failed after {}: {}", self.stage, e);
            self.advance(failed);
        }
        result
    }
}

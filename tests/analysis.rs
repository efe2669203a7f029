use std::path::PathBuf;
use std::time::Duration;

use dermascope::segmentation::{
    Logits, ModelDescriptor, ResolvedDevice, WORKING_RESOLUTION,
};
use dermascope::{
    Analysis, AnalysisStage, CancellationToken, DermaError, FailedAt, InferencePipeline,
    InputPhotograph, MaskRenderer, ModelHandle, PipelineConfig, SegmentationModel,
};
use image::{Rgb, RgbImage};
use ndarray::{Array4, IxDyn};
use tempfile::tempdir;

fn descriptor() -> ModelDescriptor {
    ModelDescriptor {
        architecture: "UnetPlusPlus".into(),
        encoder: "resnet34".into(),
        checkpoint: PathBuf::from("test.onnx"),
        device: ResolvedDevice::Cpu,
    }
}

/// Marks strongly red pixels as wheal.
struct RednessModel {
    descriptor: ModelDescriptor,
}

impl SegmentationModel for RednessModel {
    fn descriptor(&self) -> &ModelDescriptor {
        &self.descriptor
    }

    fn forward(&mut self, input: &Array4<f32>) -> dermascope::Result<Logits> {
        let (h, w) = (input.shape()[2], input.shape()[3]);
        let mut logits = Logits::zeros(IxDyn(&[1, 1, h, w]));
        for y in 0..h {
            for x in 0..w {
                let redness = input[[0, 0, y, x]] - input[[0, 1, y, x]];
                logits[[0, 0, y, x]] = (redness - 0.5) * 20.0;
            }
        }
        Ok(logits)
    }
}

struct FailingModel {
    descriptor: ModelDescriptor,
}

impl SegmentationModel for FailingModel {
    fn descriptor(&self) -> &ModelDescriptor {
        &self.descriptor
    }

    fn forward(&mut self, _input: &Array4<f32>) -> dermascope::Result<Logits> {
        Err(DermaError::InferenceError("device lost".into()))
    }
}

struct SleepyModel {
    descriptor: ModelDescriptor,
}

impl SegmentationModel for SleepyModel {
    fn descriptor(&self) -> &ModelDescriptor {
        &self.descriptor
    }

    fn forward(&mut self, _input: &Array4<f32>) -> dermascope::Result<Logits> {
        std::thread::sleep(Duration::from_millis(500));
        Ok(Logits::zeros(IxDyn(&[1, 1, 736, 736])))
    }
}

struct SmallInputModel {
    descriptor: ModelDescriptor,
}

impl SegmentationModel for SmallInputModel {
    fn descriptor(&self) -> &ModelDescriptor {
        &self.descriptor
    }

    fn forward(&mut self, _input: &Array4<f32>) -> dermascope::Result<Logits> {
        Ok(Logits::zeros(IxDyn(&[1, 1, 512, 512])))
    }

    fn input_size(&self) -> (u32, u32) {
        (512, 512)
    }
}

fn redness_handle() -> ModelHandle {
    ModelHandle::new(Box::new(RednessModel {
        descriptor: descriptor(),
    }))
}

/// Left half red wheal, right half skin tone.
fn photograph(width: u32, height: u32) -> InputPhotograph {
    InputPhotograph::from_image(RgbImage::from_fn(width, height, |x, _| {
        if x < width / 2 {
            Rgb([230, 20, 20])
        } else {
            Rgb([200, 170, 150])
        }
    }))
}

#[test]
fn analysis_persists_composite_at_photo_resolution() {
    let dir = tempdir().unwrap();
    let output = dir.path().join("temp/segmented_image.png");
    let config = PipelineConfig::default();
    let (pipeline, renderer) = (config.pipeline(), config.renderer());
    let model = redness_handle();

    let mut analysis = Analysis::new(&pipeline, &renderer);
    let outcome = analysis
        .run(&model, photograph(1024, 768), &output)
        .unwrap();

    assert_eq!(outcome.mask.dimensions(), WORKING_RESOLUTION);
    assert_eq!(outcome.composite.dimensions(), (1024, 768));
    assert_eq!(outcome.output_path, output);
    assert_eq!(analysis.stage(), AnalysisStage::Persisted);
    assert_eq!(
        analysis.history(),
        [
            AnalysisStage::Idle,
            AnalysisStage::PhotographReceived,
            AnalysisStage::Resized,
            AnalysisStage::Inferred,
            AnalysisStage::MaskUpsampled,
            AnalysisStage::Composited,
            AnalysisStage::Persisted,
        ]
    );

    let written = image::open(&output).unwrap().to_rgb8();
    assert_eq!(written.dimensions(), (1024, 768));
    // wheal side is tinted, skin side untouched
    assert_eq!(*written.get_pixel(100, 300), Rgb([243, 10, 10]));
    assert_eq!(*written.get_pixel(900, 300), Rgb([200, 170, 150]));
}

#[test]
fn composite_matches_any_photo_resolution() {
    let pipeline = InferencePipeline::default();
    let renderer = MaskRenderer::default();
    let model = redness_handle();
    let cancel = CancellationToken::new();

    for (w, h) in [(480, 640), (1920, 1080)] {
        let photo = photograph(w, h);
        let (resized, mask) = pipeline.infer(&model, &photo, &cancel).unwrap();
        assert_eq!(resized.dimensions(), WORKING_RESOLUTION);
        assert_eq!(mask.dimensions(), WORKING_RESOLUTION);

        let composite = renderer.render(photo.as_image(), &mask);
        assert_eq!(composite.dimensions(), (w, h));
    }
}

#[test]
fn inference_is_repeatable() {
    let pipeline = InferencePipeline::default();
    let model = redness_handle();
    let cancel = CancellationToken::new();
    let photo = photograph(1024, 768);

    let (_, first) = pipeline.infer(&model, &photo, &cancel).unwrap();
    let (_, second) = pipeline.infer(&model, &photo, &cancel).unwrap();

    assert_eq!(first, second);
    assert!(first.foreground_fraction() > 0.4 && first.foreground_fraction() < 0.6);
}

#[test]
fn failed_inference_writes_nothing() {
    let dir = tempdir().unwrap();
    let output = dir.path().join("segmented_image.png");
    let (pipeline, renderer) = (InferencePipeline::default(), MaskRenderer::default());
    let model = ModelHandle::new(Box::new(FailingModel {
        descriptor: descriptor(),
    }));

    let mut analysis = Analysis::new(&pipeline, &renderer);
    let err = analysis
        .run(&model, photograph(640, 480), &output)
        .unwrap_err();

    assert!(matches!(err, DermaError::InferenceError(_)));
    assert_eq!(
        analysis.stage(),
        AnalysisStage::Failed {
            at: FailedAt::Resized
        }
    );
    assert!(analysis.stage().is_terminal());
    assert!(!output.exists());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn cancelled_analysis_writes_nothing() {
    let dir = tempdir().unwrap();
    let output = dir.path().join("segmented_image.png");
    let (pipeline, renderer) = (InferencePipeline::default(), MaskRenderer::default());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let mut analysis = Analysis::new(&pipeline, &renderer).with_cancellation(cancel);
    let err = analysis
        .run(&redness_handle(), photograph(64, 64), &output)
        .unwrap_err();

    assert!(matches!(err, DermaError::Cancelled));
    assert_eq!(analysis.stage(), AnalysisStage::Failed { at: FailedAt::Idle });
    assert!(!output.exists());
}

#[test]
fn cancellation_is_checked_before_inference() {
    let pipeline = InferencePipeline::default();
    let cancel = CancellationToken::new();
    cancel.cancel();
    let model = ModelHandle::new(Box::new(FailingModel {
        descriptor: descriptor(),
    }));

    // the failing model is never reached
    let err = pipeline
        .infer(&model, &photograph(32, 32), &cancel)
        .unwrap_err();
    assert!(matches!(err, DermaError::Cancelled));
}

#[test]
fn slow_inference_times_out() {
    let dir = tempdir().unwrap();
    let output = dir.path().join("segmented_image.png");
    let pipeline = InferencePipeline::new(WORKING_RESOLUTION, 0.5, Some(Duration::from_millis(20)));
    let renderer = MaskRenderer::default();
    let model = ModelHandle::new(Box::new(SleepyModel {
        descriptor: descriptor(),
    }));

    let mut analysis = Analysis::new(&pipeline, &renderer);
    let err = analysis
        .run(&model, photograph(100, 100), &output)
        .unwrap_err();

    assert!(matches!(err, DermaError::InferenceTimeout(_)));
    assert!(!output.exists());
}

#[test]
fn undecodable_upload_fails_before_receiving() {
    let dir = tempdir().unwrap();
    let output = dir.path().join("segmented_image.png");
    let (pipeline, renderer) = (InferencePipeline::default(), MaskRenderer::default());

    let mut analysis = Analysis::new(&pipeline, &renderer);
    let err = analysis
        .run_bytes(&redness_handle(), b"\x89PNG but not really", &output)
        .unwrap_err();

    assert!(matches!(err, DermaError::DecodeError(_)));
    assert_eq!(analysis.stage(), AnalysisStage::Failed { at: FailedAt::Idle });
    assert!(!output.exists());
}

#[test]
fn analysis_runs_only_once() {
    let dir = tempdir().unwrap();
    let output = dir.path().join("segmented_image.png");
    let (pipeline, renderer) = (InferencePipeline::default(), MaskRenderer::default());
    let model = redness_handle();

    let mut analysis = Analysis::new(&pipeline, &renderer);
    analysis.run(&model, photograph(50, 40), &output).unwrap();
    let err = analysis
        .run(&model, photograph(50, 40), &output)
        .unwrap_err();
    assert!(matches!(err, DermaError::InvalidConfig(_)));
    assert_eq!(analysis.stage(), AnalysisStage::Persisted);
}

#[test]
fn model_with_other_input_size_is_rejected() {
    let pipeline = InferencePipeline::default();
    let model = ModelHandle::new(Box::new(SmallInputModel {
        descriptor: descriptor(),
    }));
    let err = pipeline
        .infer(&model, &photograph(64, 64), &CancellationToken::new())
        .unwrap_err();
    assert!(matches!(err, DermaError::InferenceError(_)));
}

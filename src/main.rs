mod cli;

use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Args, Command};
use dermascope::{
    Analysis, CancellationToken, InputPhotograph, LabelFont, ModelCache, OverlayCompositor,
    PanelId, PipelineConfig, SegmentedComposite, SessionContext,
};

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    match args.command {
        Command::Overlay {
            template,
            panel,
            labels,
            panels,
            font,
            font_size,
            output,
        } => {
            let panel: PanelId = panel.parse().context("Invalid --panel")?;

            let mut session = SessionContext::default();
            if let Some(path) = &panels {
                session
                    .load_panel_config(path)
                    .with_context(|| format!("Failed to load panels from {}", path.display()))?;
            }
            if let Some(labels) = labels {
                session.set_labels(panel, labels.into_iter().map(|l| l.trim().to_string()));
            }

            let font = match &font {
                Some(path) => LabelFont::from_file(path, font_size)
                    .with_context(|| format!("Failed to load font {}", path.display()))?,
                None => LabelFont::default(),
            };

            run_overlay(&session, panel, &template, font, &output)
        }
        Command::Analyze {
            photo,
            checkpoint,
            architecture,
            encoder,
            device,
            threshold,
            timeout_secs,
            output,
        } => {
            let config = PipelineConfig {
                architecture,
                encoder,
                device,
                threshold,
                timeout: (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs)),
                ..PipelineConfig::default()
            };
            config.validate().context("Invalid analysis settings")?;

            run_analysis(&config, &photo, &checkpoint, &output)
        }
    }
}

fn run_overlay(
    session: &SessionContext,
    panel: PanelId,
    template: &Path,
    font: LabelFont,
    output: &Path,
) -> Result<()> {
    tracing::info!("Rendering {} onto {}", panel, template.display());

    let compositor = OverlayCompositor::new(font);
    let overlay = compositor
        .compose_file(panel, template, session.labels(panel))
        .context("Failed to compose allergen overlay")?;

    let path = overlay
        .save(output)
        .context("Failed to save allergen overlay")?;

    for (index, label) in session.labels(panel).iter().take(10).enumerate() {
        tracing::info!("{}. {}", index + 1, label);
    }
    println!("{}", path.display());

    Ok(())
}

fn run_analysis(
    config: &PipelineConfig,
    photo: &Path,
    checkpoint: &Path,
    output: &Path,
) -> Result<()> {
    let cancel = CancellationToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || {
        tracing::warn!("Interrupted, cancelling analysis");
        handler_token.cancel();
    })
    .context("Failed to install Ctrl-C handler")?;

    let load_start = Instant::now();
    let model = ModelCache::global()
        .load(&config.architecture, &config.encoder, checkpoint, config.device)
        .context("Failed to load segmentation model")?;
    tracing::info!(
        "Model ready on {} in {:.1}ms",
        model.descriptor().device,
        load_start.elapsed().as_secs_f64() * 1000.0
    );

    let photograph = InputPhotograph::open(photo)
        .with_context(|| format!("Failed to read photograph {}", photo.display()))?;

    let pipeline = config.pipeline();
    let renderer = config.renderer();
    let mut analysis = Analysis::new(&pipeline, &renderer).with_cancellation(cancel);

    let analyze_start = Instant::now();
    let outcome = analysis
        .run(&model, photograph, output)
        .with_context(|| format!("Analysis stopped at {}", analysis.stage()))?;

    tracing::info!(
        "Analysis finished in {:.1}ms",
        analyze_start.elapsed().as_secs_f64() * 1000.0
    );
    println!(
        "{} ({})",
        outcome.output_path.display(),
        SegmentedComposite::MIME_TYPE
    );

    Ok(())
}

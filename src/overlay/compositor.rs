use std::path::Path;

use image::{Rgb, RgbImage};

use super::font::LabelFont;
use crate::error::{DermaError, Result};
use crate::panel::{GeometryTable, PanelId, PanelLayout, CALIBRATED_TEMPLATE_SIZE};
use crate::persist;

const LABEL_COLOR: [u8; 3] = [0, 0, 0];

/// Labelled copy of the applicator template. Owned by whoever asked for it
/// and never cached, since panel labels can change between requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayImage {
    image: RgbImage,
}

impl OverlayImage {
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    pub fn as_image(&self) -> &RgbImage {
        &self.image
    }

    pub fn into_image(self) -> RgbImage {
        self.image
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<std::path::PathBuf> {
        persist::write_png(&self.image, path.as_ref())
    }
}

/// Draws allergen names onto the applicator template at the slot anchors.
#[derive(Debug)]
pub struct OverlayCompositor {
    geometry: GeometryTable,
    font: LabelFont,
    color: Rgb<u8>,
}

impl Default for OverlayCompositor {
    fn default() -> Self {
        Self::new(LabelFont::default())
    }
}

impl OverlayCompositor {
    pub fn new(font: LabelFont) -> Self {
        Self {
            geometry: GeometryTable,
            font,
            color: Rgb(LABEL_COLOR),
        }
    }

    pub fn with_color(mut self, color: [u8; 3]) -> Self {
        self.color = Rgb(color);
        self
    }

    /// Render `labels` onto a copy of `template`.
    ///
    /// Only the first ten labels are used; slots without a label stay blank.
    /// Labels are anchored by their top-left corner and may overlap.
    pub fn compose<S: AsRef<str>>(
        &self,
        panel: PanelId,
        template: &RgbImage,
        labels: &[S],
    ) -> OverlayImage {
        let _span = tracing::debug_span!("compose", %panel).entered();

        let (width, height) = template.dimensions();
        if !self.geometry.is_calibrated_for(width, height) {
            tracing::warn!(
                "Template is {}x{} but slot positions are calibrated for {}x{}",
                width,
                height,
                CALIBRATED_TEMPLATE_SIZE.0,
                CALIBRATED_TEMPLATE_SIZE.1
            );
        }

        let layout = PanelLayout::from_labels(panel, labels);
        let mut image = template.clone();

        for slot in layout.labelled() {
            let (x, y) = slot.position;
            self.font
                .draw(&mut image, x as i32, y as i32, &slot.label, self.color);
        }

        tracing::debug!("Composed {} labels for {}", layout.labelled().count(), panel);

        OverlayImage { image }
    }

    /// Load the template from `template_path` and compose onto it.
    pub fn compose_file<P: AsRef<Path>, S: AsRef<str>>(
        &self,
        panel: PanelId,
        template_path: P,
        labels: &[S],
    ) -> Result<OverlayImage> {
        let template = load_template(template_path.as_ref())?;
        Ok(self.compose(panel, &template, labels))
    }
}

fn load_template(path: &Path) -> Result<RgbImage> {
    if !path.exists() {
        return Err(DermaError::MissingResource(path.to_path_buf()));
    }

    let template = image::open(path)
        .map_err(|e| DermaError::DecodeError(format!("{}: {e}", path.display())))?
        .to_rgb8();

    tracing::debug!(
        "Loaded applicator template {} ({}x{})",
        path.display(),
        template.width(),
        template.height()
    );

    Ok(template)
}

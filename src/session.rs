use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use image::RgbImage;

use crate::error::{DermaError, Result};
use crate::overlay::{OverlayCompositor, OverlayImage};
use crate::panel::PanelId;

pub const COMPOSITE_FILE_NAME: &str = "segmented_image.png";

/// One operator's in-progress session: panel labels, the panel chosen for
/// the test, and where artifacts go. Passed explicitly to whoever needs it.
#[derive(Debug, Clone)]
pub struct SessionContext {
    panels: BTreeMap<PanelId, Vec<String>>,
    selected: Option<PanelId>,
    output_dir: PathBuf,
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new("temp")
    }
}

impl SessionContext {
    /// Fresh session with the default allergen panels.
    pub fn new<P: AsRef<Path>>(output_dir: P) -> Self {
        let panels = PanelId::ALL
            .into_iter()
            .map(|panel| (panel, defaults(panel)))
            .collect();

        Self {
            panels,
            selected: None,
            output_dir: output_dir.as_ref().to_path_buf(),
        }
    }

    pub fn labels(&self, panel: PanelId) -> &[String] {
        self.panels.get(&panel).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Store labels as given. Truncation to ten slots happens when the
    /// overlay is composed.
    pub fn set_labels<I, S>(&mut self, panel: PanelId, labels: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let labels: Vec<String> = labels.into_iter().map(Into::into).collect();
        tracing::debug!("{} now has {} labels", panel, labels.len());
        self.panels.insert(panel, labels);
    }

    pub fn reset_panel(&mut self, panel: PanelId) {
        self.panels.insert(panel, defaults(panel));
    }

    pub fn select_panel(&mut self, panel: PanelId) {
        tracing::info!("Selected {}", panel);
        self.selected = Some(panel);
    }

    pub fn selected_panel(&self) -> Option<PanelId> {
        self.selected
    }

    /// Labels of the selected panel, if one was chosen
    pub fn selected_labels(&self) -> Option<&[String]> {
        self.selected.map(|panel| self.labels(panel))
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Where the segmented composite of this session is written
    pub fn composite_path(&self) -> PathBuf {
        self.output_dir.join(COMPOSITE_FILE_NAME)
    }

    /// Overlay for each panel, regenerated on every call.
    pub fn panel_overlays(
        &self,
        compositor: &OverlayCompositor,
        template: &RgbImage,
    ) -> Vec<(PanelId, OverlayImage)> {
        PanelId::ALL
            .into_iter()
            .map(|panel| (panel, compositor.compose(panel, template, self.labels(panel))))
            .collect()
    }

    /// Apply a JSON panel configuration of the form
    /// `{"A": ["Cat", ...], "Panel B": [...]}`. Panels not mentioned keep
    /// their current labels.
    pub fn apply_panel_config(&mut self, json: &str) -> Result<()> {
        let config: HashMap<String, Vec<String>> = serde_json::from_str(json)
            .map_err(|e| DermaError::InvalidConfig(format!("panel configuration: {e}")))?;

        let mut parsed = Vec::with_capacity(config.len());
        for (name, labels) in config {
            parsed.push((name.parse::<PanelId>()?, labels));
        }
        for (panel, labels) in parsed {
            self.set_labels(panel, labels);
        }
        Ok(())
    }

    pub fn load_panel_config<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(DermaError::MissingResource(path.to_path_buf()));
        }
        let json = std::fs::read_to_string(path)
            .map_err(|e| DermaError::InvalidConfig(format!("{}: {e}", path.display())))?;
        self.apply_panel_config(&json)
    }

    /// Current labels as JSON keyed by panel letter.
    pub fn panel_config_json(&self) -> Result<String> {
        let config: BTreeMap<String, &Vec<String>> = self
            .panels
            .iter()
            .map(|(panel, labels)| (panel.letter().to_string(), labels))
            .collect();
        serde_json::to_string_pretty(&config)
            .map_err(|e| DermaError::InvalidConfig(format!("panel configuration: {e}")))
    }
}

fn defaults(panel: PanelId) -> Vec<String> {
    panel
        .default_allergens()
        .iter()
        .map(|s| s.to_string())
        .collect()
}

use super::{PanelId, SLOTS_PER_PANEL};

/// Size (width, height) of the applicator template the slot table was
/// calibrated against.
pub const CALIBRATED_TEMPLATE_SIZE: (u32, u32) = (600, 800);

/// Well label anchors on the 10-well applicator, slot 1 first.
///
/// Slots 1-5 run down the left column, 6-10 down the right one. All four
/// panels use the same applicator, so they share this table.
const APPLICATOR_SLOTS: [(u32, u32); SLOTS_PER_PANEL] = [
    (60, 120),
    (60, 250),
    (60, 380),
    (60, 510),
    (60, 640),
    (340, 120),
    (340, 250),
    (340, 380),
    (340, 510),
    (340, 640),
];

/// Static mapping of panel slot index to pixel coordinates on the template.
///
/// Coordinates are fixed offsets for [`CALIBRATED_TEMPLATE_SIZE`]. A template
/// of any other size needs [`GeometryTable::scaled_positions`]; nothing
/// rescales automatically.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeometryTable;

impl GeometryTable {
    pub fn positions_for(&self, panel: PanelId) -> [(u32, u32); SLOTS_PER_PANEL] {
        match panel {
            PanelId::A | PanelId::B | PanelId::C | PanelId::D => APPLICATOR_SLOTS,
        }
    }

    /// Position of a 1-based slot index, or `None` outside 1..=10.
    pub fn position(&self, panel: PanelId, index: usize) -> Option<(u32, u32)> {
        if index == 0 {
            return None;
        }
        self.positions_for(panel).get(index - 1).copied()
    }

    /// Re-derive the slot coordinates proportionally for a template of
    /// `width` x `height`.
    pub fn scaled_positions(
        &self,
        panel: PanelId,
        width: u32,
        height: u32,
    ) -> [(u32, u32); SLOTS_PER_PANEL] {
        let (base_w, base_h) = CALIBRATED_TEMPLATE_SIZE;
        let sx = width as f32 / base_w as f32;
        let sy = height as f32 / base_h as f32;

        self.positions_for(panel)
            .map(|(x, y)| ((x as f32 * sx).round() as u32, (y as f32 * sy).round() as u32))
    }

    pub fn is_calibrated_for(&self, width: u32, height: u32) -> bool {
        (width, height) == CALIBRATED_TEMPLATE_SIZE
    }
}

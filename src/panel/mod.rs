mod geometry;

pub use geometry::{GeometryTable, CALIBRATED_TEMPLATE_SIZE};

use std::fmt;
use std::str::FromStr;

use crate::error::DermaError;

/// Number of wells on one applicator
pub const SLOTS_PER_PANEL: usize = 10;

/// One of the four allergen panels tested with the applicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PanelId {
    A,
    B,
    C,
    D,
}

impl PanelId {
    pub const ALL: [PanelId; 4] = [PanelId::A, PanelId::B, PanelId::C, PanelId::D];

    pub fn letter(self) -> char {
        match self {
            PanelId::A => 'A',
            PanelId::B => 'B',
            PanelId::C => 'C',
            PanelId::D => 'D',
        }
    }

    /// Allergens a fresh session starts with.
    pub fn default_allergens(self) -> [&'static str; SLOTS_PER_PANEL] {
        match self {
            PanelId::A => [
                "Positive histamine",
                "Cat",
                "Dog",
                "Mouse",
                "Horse",
                "Cockroach",
                "Dust Mite Mix",
                "Penicill Chrys Mold",
                "Rhizopus Nigra Mold",
                "Negative Control",
            ],
            PanelId::B => [
                "Cladospor Sphaer Mold",
                "Alternaria Mold",
                "Mucor Mix Mold",
                "Cladospor Herbarum Mold",
                "Bipolans Mold",
                "Fusarium solani",
                "Sweet Gum Tree",
                "Sycamore East Tree",
                "Eastern Oak Tree",
                "Ash Red/Green Tree",
            ],
            PanelId::C => [
                "Birch River Tree",
                "Cedar Red Tree",
                "Cotton Wood East Tree",
                "Elm Amer Tree",
                "Hickory White Tree",
                "Maple Red Tree",
                "Mulberry Red Tree",
                "Pine White Tree",
                "Pigweed Rough",
                "Dock Sorrel Weed",
            ],
            PanelId::D => [
                "English Plantain Weed",
                "Ragweed Mix",
                "Baccharis Weed",
                "Cocklebur Weed",
                "Lambs Quarter Weed",
                "Mugwort Common Weed",
                "Nettle Weed",
                "Bermuda Grass",
                "KORT w/SV Grass Mix",
                "Johnson Grass",
            ],
        }
    }
}

impl fmt::Display for PanelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Panel {}", self.letter())
    }
}

impl FromStr for PanelId {
    type Err = DermaError;

    /// Accepts `A`, `a` and `Panel A`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let letter = trimmed
            .strip_prefix("Panel")
            .or_else(|| trimmed.strip_prefix("panel"))
            .unwrap_or(trimmed)
            .trim();

        match letter {
            "A" | "a" => Ok(PanelId::A),
            "B" | "b" => Ok(PanelId::B),
            "C" | "c" => Ok(PanelId::C),
            "D" | "d" => Ok(PanelId::D),
            _ => Err(DermaError::InvalidConfig(format!("unknown panel '{s}'"))),
        }
    }
}

/// A labelled well on the applicator. `index` is 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllergenSlot {
    pub index: usize,
    pub label: String,
    pub position: (u32, u32),
}

/// The ten slots of one panel, in slot order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelLayout {
    panel: PanelId,
    slots: Vec<AllergenSlot>,
}

impl PanelLayout {
    /// Bind labels to slots in order. Labels past the tenth are dropped and
    /// missing ones leave their slot blank.
    pub fn from_labels<S: AsRef<str>>(panel: PanelId, labels: &[S]) -> Self {
        Self::with_positions(panel, GeometryTable.positions_for(panel), labels)
    }

    pub(crate) fn with_positions<S: AsRef<str>>(
        panel: PanelId,
        positions: [(u32, u32); SLOTS_PER_PANEL],
        labels: &[S],
    ) -> Self {
        if labels.len() > SLOTS_PER_PANEL {
            tracing::debug!(
                "{}: dropping {} labels beyond slot {}",
                panel,
                labels.len() - SLOTS_PER_PANEL,
                SLOTS_PER_PANEL
            );
        }

        let slots = positions
            .iter()
            .enumerate()
            .map(|(i, &position)| AllergenSlot {
                index: i + 1,
                label: labels
                    .get(i)
                    .map(|l| l.as_ref().to_string())
                    .unwrap_or_default(),
                position,
            })
            .collect();

        Self { panel, slots }
    }

    pub fn panel(&self) -> PanelId {
        self.panel
    }

    pub fn slots(&self) -> &[AllergenSlot] {
        &self.slots
    }

    /// Slots that carry a non-empty label
    pub fn labelled(&self) -> impl Iterator<Item = &AllergenSlot> {
        self.slots.iter().filter(|s| !s.label.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_panel_names() {
        assert_eq!("A".parse::<PanelId>().unwrap(), PanelId::A);
        assert_eq!("b".parse::<PanelId>().unwrap(), PanelId::B);
        assert_eq!("Panel C".parse::<PanelId>().unwrap(), PanelId::C);
        assert_eq!(" panel d ".parse::<PanelId>().unwrap(), PanelId::D);
        assert!("E".parse::<PanelId>().is_err());
        assert!("".parse::<PanelId>().is_err());
    }

    #[test]
    fn displays_as_panel_name() {
        assert_eq!(PanelId::B.to_string(), "Panel B");
    }

    #[test]
    fn layout_pads_short_label_lists() {
        let layout = PanelLayout::from_labels(PanelId::A, &["Cat", "Dog"]);
        assert_eq!(layout.slots().len(), SLOTS_PER_PANEL);
        assert_eq!(layout.slots()[0].label, "Cat");
        assert_eq!(layout.slots()[1].label, "Dog");
        assert!(layout.slots()[2..].iter().all(|s| s.label.is_empty()));
        assert_eq!(layout.labelled().count(), 2);
    }

    #[test]
    fn layout_truncates_long_label_lists() {
        let labels: Vec<String> = (1..=13).map(|i| format!("Allergen {i}")).collect();
        let layout = PanelLayout::from_labels(PanelId::D, &labels);
        assert_eq!(layout.slots().len(), SLOTS_PER_PANEL);
        assert_eq!(layout.slots()[9].label, "Allergen 10");
    }

    #[test]
    fn slot_positions_follow_geometry() {
        let layout = PanelLayout::from_labels(PanelId::B, &["x"; 10]);
        let expected = GeometryTable.positions_for(PanelId::B);
        for (slot, pos) in layout.slots().iter().zip(expected) {
            assert_eq!(slot.position, pos);
        }
        assert_eq!(layout.slots()[0].index, 1);
        assert_eq!(layout.slots()[9].index, 10);
    }
}

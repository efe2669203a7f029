mod compositor;
mod font;

pub use compositor::{OverlayCompositor, OverlayImage};
pub use font::{bitmap_text_height, bitmap_text_width, LabelFont};

use dermascope::overlay::{bitmap_text_height, bitmap_text_width};
use dermascope::{GeometryTable, OverlayCompositor, PanelId, SessionContext};
use image::{Rgb, RgbImage};
use tempfile::tempdir;

const PAPER: Rgb<u8> = Rgb([250, 250, 250]);

fn inked_in(image: &RgbImage, (x, y): (u32, u32), w: u32, h: u32) -> usize {
    let mut count = 0;
    for py in y..(y + h).min(image.height()) {
        for px in x..(x + w).min(image.width()) {
            if *image.get_pixel(px, py) != PAPER {
                count += 1;
            }
        }
    }
    count
}

#[test]
fn session_labels_render_onto_template_file() {
    let dir = tempdir().unwrap();
    let template_path = dir.path().join("applicator.png");
    RgbImage::from_pixel(600, 800, PAPER).save(&template_path).unwrap();

    let mut session = SessionContext::new(dir.path());
    session.set_labels(PanelId::B, ["Cat", "Dog"]);

    let compositor = OverlayCompositor::default();
    let overlay = compositor
        .compose_file(PanelId::B, &template_path, session.labels(PanelId::B))
        .unwrap();
    assert_eq!(overlay.dimensions(), (600, 800));

    let positions = GeometryTable.positions_for(PanelId::B);
    let h = bitmap_text_height(2);
    assert!(inked_in(overlay.as_image(), positions[0], bitmap_text_width("Cat", 2), h) > 0);
    assert!(inked_in(overlay.as_image(), positions[1], bitmap_text_width("Dog", 2), h) > 0);
    let blank: usize = positions[2..]
        .iter()
        .map(|&p| inked_in(overlay.as_image(), p, 250, h))
        .sum();
    assert_eq!(blank, 0);

    let saved = overlay.save(dir.path().join("overlay.png")).unwrap();
    let reloaded = image::open(saved).unwrap().to_rgb8();
    assert_eq!(&reloaded, overlay.as_image());
}

#[test]
fn editing_labels_changes_the_next_overlay() {
    let template = RgbImage::from_pixel(600, 800, PAPER);
    let compositor = OverlayCompositor::default();
    let mut session = SessionContext::default();

    let before = compositor.compose(PanelId::A, &template, session.labels(PanelId::A));
    session.set_labels(PanelId::A, ["Peanut"]);
    let after = compositor.compose(PanelId::A, &template, session.labels(PanelId::A));

    assert_ne!(before, after);
    let positions = GeometryTable.positions_for(PanelId::A);
    assert_eq!(inked_in(after.as_image(), positions[1], 250, bitmap_text_height(2)), 0);
}

#[test]
fn default_panels_fit_their_columns() {
    // right-column labels may run off the edge but left-column ones must
    // not reach the right column
    let left_limit = GeometryTable.positions_for(PanelId::A)[5].0;
    for panel in PanelId::ALL {
        for (i, label) in panel.default_allergens().iter().take(5).enumerate() {
            let (x, _) = GeometryTable.positions_for(panel)[i];
            assert!(
                x + bitmap_text_width(label, 2) <= left_limit,
                "{panel} slot {} label '{label}' spills into the right column",
                i + 1
            );
        }
    }
}

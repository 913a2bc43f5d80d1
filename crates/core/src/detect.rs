//! Cross-reference detection
//!
//! Scans a page's text fragments for inline sheet references ("09/AC401")
//! and computes each match's on-screen bounding box in viewport pixels,
//! accounting for text rotation. Exact glyph metrics are unavailable from
//! the extraction collaborator, so box fitting is approximate: the contract
//! is only that the box overlaps the source glyphs closely enough for a
//! pointer click to land on it.

use lazy_static::lazy_static;
use regex::Regex;
use sheetlink_render::{TextFragment, Viewport};

/// The cross-reference pattern: detail number, slash, sheet tag
pub const REFERENCE_PATTERN: &str = r"(?i)\d{2}/(AC\d{3,4})";

/// Rotations within this many degrees of ±90° are treated as vertical runs
pub const VERTICAL_TOLERANCE_DEG: f32 = 10.0;

/// Monospace-width approximation: box width per character as a fraction of
/// the font size
pub const APPROX_CHAR_WIDTH: f32 = 0.5;

/// Empirical corrections for vertical glyph runs, which report their
/// baseline origin differently from horizontal runs
const VERTICAL_LEFT_SHIFT: f32 = 0.25;
const VERTICAL_TOP_LIFT: f32 = 0.9;

lazy_static! {
    static ref REFERENCE_RE: Regex = Regex::new(REFERENCE_PATTERN).unwrap();
}

/// Whether the text contains a cross-reference match anywhere
pub(crate) fn contains_reference(text: &str) -> bool {
    REFERENCE_RE.is_match(text)
}

/// Run direction of a detected reference on screen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Horizontal,
    Vertical,
}

/// Axis-aligned rectangle in viewport pixels, top-left origin
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewBox {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl ViewBox {
    pub fn new(left: f32, top: f32, width: f32, height: f32) -> Self {
        Self { left, top, width, height }
    }

    /// Hit test in viewport pixels
    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.left
            && x <= self.left + self.width
            && y >= self.top
            && y <= self.top + self.height
    }
}

/// One detected cross-reference on a displayed page
///
/// Transient: bounding boxes depend on the viewport scale, so candidates are
/// recomputed every time the page is displayed.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceCandidate {
    /// The matched substring, e.g. `09/AC401`
    pub raw_text: String,

    /// Normalized target sheet tag, e.g. `AC401`
    pub embedded_tag: String,

    /// Clickable region in viewport pixels
    pub bounding_box: ViewBox,

    pub orientation: Orientation,
}

/// Find all cross-references among a page's fragments
///
/// The set of `embedded_tag` values is scale-invariant; only the bounding
/// boxes change with the viewport.
pub fn detect_references(
    fragments: &[TextFragment],
    viewport: &Viewport,
) -> Vec<ReferenceCandidate> {
    let mut candidates = Vec::new();

    for fragment in fragments {
        for captures in REFERENCE_RE.captures_iter(&fragment.text) {
            let matched = captures.get(0).expect("match group 0 always present");
            let tag = captures.get(1).expect("tag group always present");

            let placement = viewport.transform.compose(&fragment.transform);
            let font_size = placement.font_size();
            let rotation = placement.rotation_deg();
            let orientation = classify_orientation(rotation);

            // Walk the baseline to the start of the match inside the run.
            let prefix_chars = fragment.text[..matched.start()].chars().count() as f32;
            let advance = prefix_chars * APPROX_CHAR_WIDTH * font_size;
            let radians = rotation.to_radians();
            let (mut origin_x, mut origin_y) = placement.origin();
            origin_x += advance * radians.cos();
            origin_y += advance * radians.sin();

            let char_count = matched.as_str().chars().count() as f32;
            let run_length = char_count * APPROX_CHAR_WIDTH * font_size;

            let (width, height, left, top) = match orientation {
                Orientation::Horizontal => {
                    (run_length, font_size, origin_x, origin_y - font_size)
                }
                Orientation::Vertical => {
                    let (width, height) = (font_size, run_length);
                    (
                        width,
                        height,
                        origin_x - VERTICAL_LEFT_SHIFT * width,
                        origin_y - VERTICAL_TOP_LIFT * height,
                    )
                }
            };

            candidates.push(ReferenceCandidate {
                raw_text: matched.as_str().to_owned(),
                embedded_tag: tag.as_str().to_uppercase(),
                bounding_box: ViewBox::new(left, top, width, height),
                orientation,
            });
        }
    }

    candidates
}

fn classify_orientation(rotation_deg: f32) -> Orientation {
    if (rotation_deg.abs() - 90.0).abs() <= VERTICAL_TOLERANCE_DEG {
        Orientation::Vertical
    } else {
        Orientation::Horizontal
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sheetlink_render::{GlyphTransform, PageSize};

    const PAGE: PageSize = PageSize { width_pt: 612.0, height_pt: 792.0 };

    #[test]
    fn test_detects_and_normalizes_tag() {
        let fragments = vec![TextFragment::upright("see 09/ac401 for detail", 100.0, 700.0, 10.0, 0)];
        let viewport = Viewport::new(PAGE, 1.0);

        let candidates = detect_references(&fragments, &viewport);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].raw_text, "09/ac401");
        assert_eq!(candidates[0].embedded_tag, "AC401");
        assert_eq!(candidates[0].orientation, Orientation::Horizontal);
    }

    #[test]
    fn test_non_reference_text_yields_nothing() {
        let fragments = vec![
            TextFragment::upright("AC401", 100.0, 700.0, 10.0, 0),
            TextFragment::upright("9/AC401", 100.0, 650.0, 10.0, 1),
            TextFragment::upright("SHEET NO.", 100.0, 600.0, 10.0, 2),
        ];
        let viewport = Viewport::new(PAGE, 1.0);
        assert!(detect_references(&fragments, &viewport).is_empty());
    }

    #[test]
    fn test_horizontal_box_geometry() {
        // 10pt fragment at page (100, 700); device y = 792 - 700 = 92.
        let fragments = vec![TextFragment::upright("09/AC401", 100.0, 700.0, 10.0, 0)];
        let viewport = Viewport::new(PAGE, 1.0);

        let candidate = &detect_references(&fragments, &viewport)[0];
        let bbox = candidate.bounding_box;
        assert!((bbox.left - 100.0).abs() < 1e-3);
        assert!((bbox.top - 82.0).abs() < 1e-3);
        // 8 chars × 10pt × 0.5
        assert!((bbox.width - 40.0).abs() < 1e-3);
        assert!((bbox.height - 10.0).abs() < 1e-3);
    }

    #[test]
    fn test_detection_is_scale_invariant_in_tag_set() {
        let fragments = vec![
            TextFragment::upright("09/AC401", 100.0, 700.0, 10.0, 0),
            TextFragment::upright("03/AC602", 300.0, 400.0, 10.0, 1),
        ];

        let at = |scale: f32| {
            detect_references(&fragments, &Viewport::new(PAGE, scale))
                .into_iter()
                .map(|c| c.embedded_tag)
                .collect::<Vec<_>>()
        };

        assert_eq!(at(1.0), at(2.5));
        assert_eq!(at(1.0), vec!["AC401", "AC602"]);
    }

    #[test]
    fn test_boxes_scale_with_viewport() {
        let fragments = vec![TextFragment::upright("09/AC401", 100.0, 700.0, 10.0, 0)];

        let small = detect_references(&fragments, &Viewport::new(PAGE, 1.0))[0].bounding_box;
        let large = detect_references(&fragments, &Viewport::new(PAGE, 2.0))[0].bounding_box;

        assert!((large.width - 2.0 * small.width).abs() < 1e-3);
        assert!((large.height - 2.0 * small.height).abs() < 1e-3);
    }

    #[test]
    fn test_vertical_reference_swaps_box_dimensions() {
        // 10pt run rotated 90° counter-clockwise in page space.
        let rotated = GlyphTransform::new(0.0, 10.0, -10.0, 0.0, 300.0, 200.0);
        let fragments = vec![TextFragment::new("09/AC401", rotated, 0)];
        let viewport = Viewport::new(PAGE, 1.0);

        let candidates = detect_references(&fragments, &viewport);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].orientation, Orientation::Vertical);

        let vertical = candidates[0].bounding_box;
        let horizontal = detect_references(
            &[TextFragment::upright("09/AC401", 300.0, 200.0, 10.0, 0)],
            &viewport,
        )[0]
        .bounding_box;

        assert!((vertical.width - horizontal.height).abs() < 1e-3);
        assert!((vertical.height - horizontal.width).abs() < 1e-3);
    }

    #[test]
    fn test_multiple_references_in_one_fragment() {
        let fragments =
            vec![TextFragment::upright("01/AC501 and 02/AC502", 100.0, 700.0, 10.0, 0)];
        let viewport = Viewport::new(PAGE, 1.0);

        let candidates = detect_references(&fragments, &viewport);
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].embedded_tag, "AC501");
        assert_eq!(candidates[1].embedded_tag, "AC502");

        // The second match sits further along the baseline.
        assert!(candidates[1].bounding_box.left > candidates[0].bounding_box.left);
    }

    #[test]
    fn test_view_box_hit_test() {
        let bbox = ViewBox::new(10.0, 20.0, 40.0, 10.0);
        assert!(bbox.contains(30.0, 25.0));
        assert!(!bbox.contains(5.0, 25.0));
        assert!(!bbox.contains(30.0, 35.0));
    }
}

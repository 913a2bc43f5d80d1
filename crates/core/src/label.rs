//! Sheet label extraction
//!
//! Infers a page's own sheet label ("AC401") from its title-block text.
//! Title blocks are not at fixed coordinates across drawing templates, so the
//! search is anchored on title-block keywords ("Sheet No.") rather than raw
//! corner proximity: a candidate is only accepted when it sits close to such
//! an anchor in the bottom-right quadrant of the page. No anchor on the page
//! means no label — a missing label is preferred over a wrong one.

use crate::detect::contains_reference;
use lazy_static::lazy_static;
use regex::Regex;
use sheetlink_render::{PageSize, TextFragment};

/// Title-block keywords that anchor the label search
pub const SHEET_HINT_KEYWORDS: [&str; 4] = ["SHEET", "NO.", "NO", "TITLE"];

/// Weight of proximity to the bottom-right page corner
///
/// The scoring constants here are heuristics calibrated against one
/// drawing-template family; they are not expected to be universal.
pub const CORNER_PROXIMITY_WEIGHT: f32 = 10_000.0;

/// Weight of proximity to a sheet hint; dominates over corner proximity
pub const HINT_PROXIMITY_WEIGHT: f32 = 50_000.0;

/// Candidates farther than this from every hint are rejected, in page units
pub const MAX_HINT_DISTANCE: f32 = 200.0;

/// How many following fragments to search when joining a bare "AC" fragment
/// with its digits
pub const JOIN_LOOKAHEAD: usize = 3;

lazy_static! {
    static ref SELF_LABEL_RE: Regex = Regex::new(r"(?i)^AC\s*\d{3,4}$").unwrap();
    static ref LABEL_DIGITS_RE: Regex = Regex::new(r"^\d{3,4}$").unwrap();
}

/// A scored self-label candidate
#[derive(Debug, Clone, PartialEq)]
struct Candidate {
    label: String,
    x: f32,
    y: f32,
}

/// Infer the page's own sheet label from its text fragments
///
/// Returns `None` when the page carries no sheet hint, no candidate survives
/// the quadrant and reference-pattern filters, or every candidate is too far
/// from the nearest hint.
pub fn extract_self_label(fragments: &[TextFragment], page: PageSize) -> Option<String> {
    let hints: Vec<(f32, f32)> = fragments
        .iter()
        .filter(|fragment| is_sheet_hint(&fragment.text))
        .map(|fragment| (fragment.origin_x(), fragment.origin_y()))
        .collect();

    if hints.is_empty() {
        log::debug!("no sheet hints on page; skipping label extraction");
        return None;
    }

    let mut best: Option<(Candidate, f32)> = None;
    for candidate in collect_candidates(fragments, page) {
        let Some(score) = score_candidate(&candidate, &hints, page) else {
            continue;
        };
        match &best {
            Some((_, best_score)) if *best_score >= score => {}
            _ => best = Some((candidate, score)),
        }
    }

    best.map(|(candidate, _)| candidate.label)
}

fn is_sheet_hint(text: &str) -> bool {
    let upper = text.to_uppercase();
    SHEET_HINT_KEYWORDS.iter().any(|keyword| upper.contains(keyword))
}

/// Bottom-left-origin convention: smaller y is lower on the page
fn in_bottom_right_quadrant(fragment: &TextFragment, page: PageSize) -> bool {
    fragment.origin_x() >= page.width_pt * 0.5 && fragment.origin_y() <= page.height_pt * 0.5
}

/// Uppercase with internal whitespace stripped
fn normalize_label(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect::<String>().to_uppercase()
}

fn collect_candidates(fragments: &[TextFragment], page: PageSize) -> Vec<Candidate> {
    let mut candidates = Vec::new();

    for fragment in fragments {
        if !in_bottom_right_quadrant(fragment, page) {
            continue;
        }
        // A cross-reference is never mistaken for a self-label.
        if contains_reference(&fragment.text) {
            continue;
        }

        let trimmed = fragment.text.trim();
        if SELF_LABEL_RE.is_match(trimmed) {
            candidates.push(Candidate {
                label: normalize_label(trimmed),
                x: fragment.origin_x(),
                y: fragment.origin_y(),
            });
        } else if trimmed.eq_ignore_ascii_case("AC") {
            // Some templates split the label across glyph runs: a bare "AC"
            // fragment followed shortly by its digits.
            let digits = fragments.iter().find_map(|next| {
                let window = next.sequence_index > fragment.sequence_index
                    && next.sequence_index <= fragment.sequence_index + JOIN_LOOKAHEAD;
                if !window {
                    return None;
                }
                let text = next.text.trim();
                LABEL_DIGITS_RE.is_match(text).then(|| text.to_owned())
            });

            if let Some(digits) = digits {
                candidates.push(Candidate {
                    label: format!("AC{digits}"),
                    x: fragment.origin_x(),
                    y: fragment.origin_y(),
                });
            }
        }
    }

    candidates
}

/// Score by corner and hint proximity; `None` when the candidate is out of
/// range of every hint
fn score_candidate(candidate: &Candidate, hints: &[(f32, f32)], page: PageSize) -> Option<f32> {
    let corner_distance = distance(candidate.x, candidate.y, page.width_pt, 0.0);
    let mut score = CORNER_PROXIMITY_WEIGHT / (1.0 + corner_distance);

    let mut nearest_hint = f32::INFINITY;
    for &(hx, hy) in hints {
        let hint_distance = distance(candidate.x, candidate.y, hx, hy);
        nearest_hint = nearest_hint.min(hint_distance);
        score += HINT_PROXIMITY_WEIGHT / (1.0 + hint_distance);
    }

    if nearest_hint > MAX_HINT_DISTANCE {
        log::debug!(
            "label candidate {} rejected: nearest hint {:.1} units away",
            candidate.label,
            nearest_hint
        );
        return None;
    }

    Some(score)
}

fn distance(x0: f32, y0: f32, x1: f32, y1: f32) -> f32 {
    ((x1 - x0).powi(2) + (y1 - y0).powi(2)).sqrt()
}

//! Tag index: optional sidecar data for search and highlights
//!
//! A tag index is a JSON file listing every occurrence of a cross-reference
//! tag in a sheet set, with page numbers, context snippets, and bounding
//! boxes in unscaled page coordinates (top-left origin). The viewer can run
//! without one; when present it drives sidebar search and explicit highlight
//! boxes.
//!
//! `build_tag_index` produces the same index natively from any fragment
//! source, replacing the offline extraction step.

use crate::detect::{detect_references, ViewBox, REFERENCE_PATTERN};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sheetlink_render::{FragmentSource, Viewport};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Characters of context kept on each side of a match in its snippet
pub const SNIPPET_CONTEXT_CHARS: usize = 50;

lazy_static! {
    static ref TAG_RE: Regex = Regex::new(REFERENCE_PATTERN).unwrap();
}

/// Errors loading, saving, or building a tag index
#[derive(Debug, thiserror::Error)]
pub enum TagIndexError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed tag index: {0}")]
    Json(#[from] serde_json::Error),
    #[error("collaborator error: {0}")]
    Render(#[from] sheetlink_render::RenderError),
}

/// Occurrence bounding box in unscaled page coordinates, top-left origin
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TagBBox {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

/// One occurrence of a tag in the document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagOccurrence {
    /// 1-based page number
    pub page: u32,

    /// Whitespace-collapsed context around the match, ellipsized when
    /// truncated
    pub snippet: String,

    pub bbox: TagBBox,
}

/// Index of every tag occurrence in one sheet set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagIndex {
    pub pdf_file: String,
    pub total_pages: u32,
    /// Number of unique tags
    pub total_tags: usize,
    /// Uppercased full tag ("09/AC401") → occurrences
    pub tags: BTreeMap<String, Vec<TagOccurrence>>,
}

impl TagIndex {
    /// Load an index from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, TagIndexError> {
        let json = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Write the index as pretty-printed JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), TagIndexError> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Occurrences of a tag, case-insensitive
    pub fn occurrences(&self, tag: &str) -> &[TagOccurrence] {
        self.tags.get(&tag.to_uppercase()).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Total occurrence count across all tags
    pub fn total_occurrences(&self) -> usize {
        self.tags.values().map(Vec::len).sum()
    }

    /// Highlight boxes for a tag on one page, scaled to viewport pixels
    pub fn highlight_boxes(&self, tag: &str, page: u32, scale: f32) -> Vec<ViewBox> {
        self.occurrences(tag)
            .iter()
            .filter(|occurrence| occurrence.page == page)
            .map(|occurrence| {
                let bbox = occurrence.bbox;
                ViewBox::new(
                    bbox.x0 * scale,
                    bbox.y0 * scale,
                    (bbox.x1 - bbox.x0) * scale,
                    (bbox.y1 - bbox.y0) * scale,
                )
            })
            .collect()
    }
}

/// Scan every page of a fragment source and build its tag index
pub fn build_tag_index<S: FragmentSource>(
    source: &S,
    pdf_file: &str,
) -> Result<TagIndex, TagIndexError> {
    let total_pages = source.page_count();
    let mut tags: BTreeMap<String, Vec<TagOccurrence>> = BTreeMap::new();

    for page in 1..=total_pages {
        let page_size = source.page_size(page)?;
        let fragments = source.text_fragments(page)?;

        // Scale 1.0 gives top-left-origin boxes in unscaled page units.
        let viewport = Viewport::new(page_size, 1.0);
        let candidates = detect_references(&fragments, &viewport);

        // Page text as chars, with each fragment's starting offset, for
        // snippet extraction.
        let mut page_chars: Vec<char> = Vec::new();
        let mut fragment_offsets = Vec::with_capacity(fragments.len());
        for fragment in &fragments {
            if !page_chars.is_empty() {
                page_chars.push(' ');
            }
            fragment_offsets.push(page_chars.len());
            page_chars.extend(fragment.text.chars());
        }

        // detect_references walks fragments and matches in order; mirror
        // that walk to pair each candidate with its text position.
        let mut candidates = candidates.into_iter();
        for (fragment, fragment_offset) in fragments.iter().zip(&fragment_offsets) {
            for matched in TAG_RE.find_iter(&fragment.text) {
                let candidate = candidates
                    .next()
                    .expect("one candidate per reference match");

                let start =
                    fragment_offset + fragment.text[..matched.start()].chars().count();
                let end = start + matched.as_str().chars().count();
                let snippet = snippet_around(&page_chars, start, end);

                let bbox = candidate.bounding_box;
                tags.entry(candidate.raw_text.to_uppercase()).or_default().push(
                    TagOccurrence {
                        page,
                        snippet,
                        bbox: TagBBox {
                            x0: round2(bbox.left),
                            y0: round2(bbox.top),
                            x1: round2(bbox.left + bbox.width),
                            y1: round2(bbox.top + bbox.height),
                        },
                    },
                );
            }
        }
    }

    let total_tags = tags.len();
    log::debug!(
        "indexed {total_tags} unique tags across {total_pages} pages of {pdf_file}"
    );

    Ok(TagIndex { pdf_file: pdf_file.to_owned(), total_pages, total_tags, tags })
}

/// Whitespace-collapsed context around `[start, end)`, ellipsized when the
/// window is truncated
fn snippet_around(page_chars: &[char], start: usize, end: usize) -> String {
    let from = start.saturating_sub(SNIPPET_CONTEXT_CHARS);
    let to = (end + SNIPPET_CONTEXT_CHARS).min(page_chars.len());

    let window: String = page_chars[from..to].iter().collect();
    let mut snippet = window.split_whitespace().collect::<Vec<_>>().join(" ");

    if from > 0 {
        snippet = format!("...{snippet}");
    }
    if to < page_chars.len() {
        snippet.push_str("...");
    }

    snippet
}

fn round2(value: f32) -> f32 {
    (value * 100.0).round() / 100.0
}

//! Viewer session and per-page display cycle
//!
//! Owns the label registry and drives the per-page state machine
//! `Unrendered → Rendering → Rendered → LinksOverlaid`. Display passes are
//! stamped with a generation counter: any navigation or zoom change bumps
//! the generation, so a completion arriving for a superseded request is
//! discarded instead of overlaying stale boxes onto the new page.
//!
//! The label-population pass visits pages strictly sequentially, one page's
//! fragments in memory at a time; a collaborator failure on one page
//! degrades to a committed "no label" and the pass continues.

use crate::detect::{detect_references, ReferenceCandidate};
use crate::label::extract_self_label;
use crate::registry::LabelRegistry;
use crate::resolve::{resolve, Resolution};
use sheetlink_render::{FragmentSource, PageSize, RenderResult, TextFragment, Viewport};

/// Display lifecycle of the active page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayPhase {
    Unrendered,
    Rendering,
    Rendered,
    LinksOverlaid,
}

/// Handle for one in-flight display pass
///
/// Issued by [`ViewerSession::begin_display`]; a completion presented with a
/// stale handle is ignored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayRequest {
    pub page: u32,
    pub scale: f32,
    generation: u64,
}

/// A resolved, clickable reference on the displayed page
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayLink {
    pub candidate: ReferenceCandidate,
    pub target_page: u32,
}

/// The overlay for one displayed page at one scale
///
/// Unresolvable candidates are counted but not included: they render inert.
#[derive(Debug, Clone, PartialEq)]
pub struct PageOverlay {
    pub page: u32,
    pub scale: f32,
    pub links: Vec<OverlayLink>,
    /// Candidates dropped because their tag did not resolve
    pub unresolved: usize,
}

/// Session controller owning the label registry and display state
pub struct ViewerSession {
    registry: LabelRegistry,
    generation: u64,
    phase: DisplayPhase,
    active_page: Option<u32>,
}

impl ViewerSession {
    /// Create a session for a document with `total_pages` pages
    pub fn new(total_pages: u32) -> Self {
        Self {
            registry: LabelRegistry::new(total_pages),
            generation: 0,
            phase: DisplayPhase::Unrendered,
            active_page: None,
        }
    }

    pub fn registry(&self) -> &LabelRegistry {
        &self.registry
    }

    pub fn phase(&self) -> DisplayPhase {
        self.phase
    }

    pub fn active_page(&self) -> Option<u32> {
        self.active_page
    }

    /// Run label extraction for one page and commit the outcome
    ///
    /// This is the per-page step of the thumbnail pass; it is idempotent per
    /// the registry's commit rules.
    pub fn scan_page(&mut self, page: u32, fragments: &[TextFragment], page_size: PageSize) {
        let label = extract_self_label(fragments, page_size);
        match &label {
            Some(label) => log::debug!("page {page}: sheet label {label}"),
            None => log::debug!("page {page}: no sheet label"),
        }
        self.registry.record(page, label);
    }

    /// Sequential label-population pass over the whole document
    ///
    /// Visits pages in ascending order, one at a time. A collaborator error
    /// on a page is logged and committed as "no label"; the pass never
    /// aborts.
    pub fn populate_labels<S: FragmentSource>(&mut self, source: &S) {
        for page in 1..=self.registry.total_pages() {
            match Self::fetch_page(source, page) {
                Ok((page_size, fragments)) => self.scan_page(page, &fragments, page_size),
                Err(err) => {
                    log::warn!("page {page}: fragment extraction failed: {err}");
                    self.registry.record(page, None);
                }
            }
        }
    }

    fn fetch_page<S: FragmentSource>(
        source: &S,
        page: u32,
    ) -> RenderResult<(PageSize, Vec<TextFragment>)> {
        let page_size = source.page_size(page)?;
        let fragments = source.text_fragments(page)?;
        Ok((page_size, fragments))
    }

    /// Start displaying a page at a scale
    ///
    /// Supersedes any in-flight display pass: its completion will be
    /// discarded.
    pub fn begin_display(&mut self, page: u32, scale: f32) -> DisplayRequest {
        self.generation += 1;
        self.phase = DisplayPhase::Rendering;
        self.active_page = Some(page);
        DisplayRequest { page, scale, generation: self.generation }
    }

    /// Finish a display pass with the page's extracted fragments
    ///
    /// Returns `None` when the request was superseded by a later
    /// `begin_display` or `invalidate` — its results must not be overlaid.
    pub fn complete_display(
        &mut self,
        request: DisplayRequest,
        fragments: &[TextFragment],
        page_size: PageSize,
    ) -> Option<PageOverlay> {
        if request.generation != self.generation {
            log::debug!("discarding superseded display pass for page {}", request.page);
            return None;
        }

        self.phase = DisplayPhase::Rendered;

        let viewport = Viewport::new(page_size, request.scale);
        let candidates = detect_references(fragments, &viewport);

        let mut links = Vec::new();
        let mut unresolved = 0;
        for candidate in candidates {
            match resolve(&self.registry, &candidate.embedded_tag) {
                Resolution::Resolved(target_page) => {
                    links.push(OverlayLink { candidate, target_page });
                }
                Resolution::Pending => {
                    log::debug!(
                        "tag {} not resolved yet; registry still populating",
                        candidate.embedded_tag
                    );
                    unresolved += 1;
                }
                Resolution::NotFound => {
                    log::debug!("tag {} has no matching sheet", candidate.embedded_tag);
                    unresolved += 1;
                }
            }
        }

        self.phase = DisplayPhase::LinksOverlaid;
        Some(PageOverlay { page: request.page, scale: request.scale, links, unresolved })
    }

    /// Drop the current overlay and any in-flight display pass
    ///
    /// Called on navigation or zoom change; all box geometry is
    /// scale-dependent, so overlays are never reused across changes.
    pub fn invalidate(&mut self) {
        self.generation += 1;
        self.phase = DisplayPhase::Unrendered;
        self.active_page = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sheetlink_render::{RenderError, TextFragment};

    const PAGE: PageSize = PageSize { width_pt: 1000.0, height_pt: 1000.0 };

    /// In-memory collaborator: one fragment list per page, with optional
    /// failure injection.
    struct StubSource {
        pages: Vec<Vec<TextFragment>>,
        fail_page: Option<u32>,
    }

    impl StubSource {
        fn new(pages: Vec<Vec<TextFragment>>) -> Self {
            Self { pages, fail_page: None }
        }
    }

    impl FragmentSource for StubSource {
        fn page_count(&self) -> u32 {
            self.pages.len() as u32
        }

        fn page_size(&self, _page: u32) -> RenderResult<PageSize> {
            Ok(PAGE)
        }

        fn text_fragments(&self, page: u32) -> RenderResult<Vec<TextFragment>> {
            if self.fail_page == Some(page) {
                return Err(RenderError::Backend("injected failure".to_owned()));
            }
            Ok(self.pages[page as usize - 1].clone())
        }
    }

    fn labeled_page(label: &str) -> Vec<TextFragment> {
        vec![
            TextFragment::upright("SHEET NO.", 900.0, 50.0, 10.0, 0),
            TextFragment::upright(label, 880.0, 70.0, 10.0, 1),
        ]
    }

    #[test]
    fn test_populate_labels_sequentially() {
        let source = StubSource::new(vec![
            labeled_page("AC100"),
            vec![TextFragment::upright("body text only", 100.0, 900.0, 10.0, 0)],
            labeled_page("AC401"),
        ]);

        let mut session = ViewerSession::new(source.page_count());
        session.populate_labels(&source);

        assert!(session.registry().is_complete());
        assert_eq!(session.registry().label(1), Some("AC100"));
        assert_eq!(session.registry().label(2), None);
        assert_eq!(session.registry().label(3), Some("AC401"));
    }

    #[test]
    fn test_collaborator_failure_degrades_to_no_label() {
        let mut source = StubSource::new(vec![labeled_page("AC100"), labeled_page("AC200")]);
        source.fail_page = Some(1);

        let mut session = ViewerSession::new(source.page_count());
        session.populate_labels(&source);

        // The failed page is committed, not left retryable forever.
        assert!(session.registry().is_complete());
        assert_eq!(session.registry().label(1), None);
        assert_eq!(session.registry().label(2), Some("AC200"));
    }

    #[test]
    fn test_display_cycle_resolves_references() {
        let mut session = ViewerSession::new(7);
        session.scan_page(7, &labeled_page("AC401"), PAGE);
        assert_eq!(session.phase(), DisplayPhase::Unrendered);

        let request = session.begin_display(3, 1.5);
        assert_eq!(session.phase(), DisplayPhase::Rendering);
        assert_eq!(session.active_page(), Some(3));

        let fragments = vec![TextFragment::upright("09/AC401", 120.0, 500.0, 10.0, 0)];
        let overlay =
            session.complete_display(request, &fragments, PAGE).expect("pass should complete");

        assert_eq!(session.phase(), DisplayPhase::LinksOverlaid);
        assert_eq!(overlay.page, 3);
        assert_eq!(overlay.links.len(), 1);
        assert_eq!(overlay.links[0].target_page, 7);
        assert_eq!(overlay.links[0].candidate.embedded_tag, "AC401");
    }

    #[test]
    fn test_unresolved_candidates_are_dropped() {
        let mut session = ViewerSession::new(2);
        session.scan_page(1, &labeled_page("AC100"), PAGE);

        let request = session.begin_display(1, 1.0);
        let fragments = vec![TextFragment::upright("09/AC401", 120.0, 500.0, 10.0, 0)];
        let overlay =
            session.complete_display(request, &fragments, PAGE).expect("pass should complete");

        // Registry incomplete: the miss is pending, rendered inert.
        assert!(overlay.links.is_empty());
        assert_eq!(overlay.unresolved, 1);
    }

    #[test]
    fn test_superseded_display_pass_is_discarded() {
        let mut session = ViewerSession::new(2);

        let stale = session.begin_display(1, 1.0);
        let current = session.begin_display(2, 1.0);

        let fragments = vec![TextFragment::upright("09/AC401", 120.0, 500.0, 10.0, 0)];
        assert_eq!(session.complete_display(stale, &fragments, PAGE), None);
        assert!(session.complete_display(current, &fragments, PAGE).is_some());
    }

    #[test]
    fn test_invalidate_discards_in_flight_pass() {
        let mut session = ViewerSession::new(2);
        let request = session.begin_display(1, 1.0);

        session.invalidate();
        assert_eq!(session.phase(), DisplayPhase::Unrendered);
        assert_eq!(session.active_page(), None);
        assert_eq!(session.complete_display(request, &[], PAGE), None);
    }
}

//! Label registry
//!
//! Maps page numbers to inferred sheet labels and supports the reverse
//! lookup the resolver needs. The registry is owned by the session — it is
//! an explicit context object, not process-global state — and is populated
//! lazily in ascending page order by the thumbnail pass.
//!
//! An absent entry means "not yet scanned" and may be retried; a committed
//! `NoLabel` means extraction ran and found no candidate. Committed entries
//! are immutable.

use std::collections::HashMap;

/// Outcome of label extraction for one page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LabelEntry {
    /// Normalized sheet label, e.g. `AC401`
    Label(String),

    /// Extraction completed and explicitly found no candidate
    NoLabel,
}

/// Page-number → sheet-label cache with reverse lookup
///
/// Pages are 1-based and dense in `1..=total_pages`.
#[derive(Debug)]
pub struct LabelRegistry {
    total_pages: u32,
    entries: HashMap<u32, LabelEntry>,
}

impl LabelRegistry {
    /// Create an empty registry for a document with `total_pages` pages
    pub fn new(total_pages: u32) -> Self {
        Self { total_pages, entries: HashMap::new() }
    }

    /// Number of pages in the document
    pub fn total_pages(&self) -> u32 {
        self.total_pages
    }

    /// Commit one page's extraction outcome
    ///
    /// Idempotent: re-recording the same outcome is a no-op. Committed
    /// entries are immutable, so a divergent re-record keeps the first value
    /// and logs the conflict.
    pub fn record(&mut self, page: u32, label: Option<String>) {
        let entry = match label {
            Some(label) => LabelEntry::Label(label),
            None => LabelEntry::NoLabel,
        };

        match self.entries.get(&page) {
            None => {
                self.entries.insert(page, entry);
            }
            Some(existing) if *existing == entry => {}
            Some(existing) => {
                log::warn!(
                    "page {page}: ignoring divergent label re-record {entry:?} (committed: {existing:?})"
                );
                debug_assert!(false, "label registry entries are immutable once committed");
            }
        }
    }

    /// Committed entry for a page, or `None` if the page is not yet scanned
    pub fn get(&self, page: u32) -> Option<&LabelEntry> {
        self.entries.get(&page)
    }

    /// Committed label text for a page, if one was found
    pub fn label(&self, page: u32) -> Option<&str> {
        match self.entries.get(&page) {
            Some(LabelEntry::Label(label)) => Some(label),
            _ => None,
        }
    }

    /// Reverse lookup: the page carrying `tag` as its sheet label
    ///
    /// Case-insensitive exact match over committed entries, lowest page
    /// first. Idempotent for a given registry state.
    pub fn find_page_by_label(&self, tag: &str) -> Option<u32> {
        (1..=self.total_pages)
            .find(|page| self.label(*page).is_some_and(|label| label.eq_ignore_ascii_case(tag)))
    }

    /// Number of pages with a committed entry
    pub fn scanned(&self) -> u32 {
        self.entries.len() as u32
    }

    /// Whether every page has been scanned
    ///
    /// The resolver uses this to distinguish "target page not yet labeled"
    /// from a definitive miss.
    pub fn is_complete(&self) -> bool {
        self.scanned() >= self.total_pages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_registry() {
        let registry = LabelRegistry::new(3);
        assert_eq!(registry.total_pages(), 3);
        assert_eq!(registry.scanned(), 0);
        assert!(!registry.is_complete());
        assert_eq!(registry.get(1), None);
        assert_eq!(registry.find_page_by_label("AC401"), None);
    }

    #[test]
    fn test_record_and_lookup() {
        let mut registry = LabelRegistry::new(3);
        registry.record(1, Some("AC401".to_owned()));
        registry.record(2, None);

        assert_eq!(registry.get(1), Some(&LabelEntry::Label("AC401".to_owned())));
        assert_eq!(registry.get(2), Some(&LabelEntry::NoLabel));
        assert_eq!(registry.get(3), None);
        assert_eq!(registry.label(1), Some("AC401"));
        assert_eq!(registry.label(2), None);
        assert_eq!(registry.scanned(), 2);
        assert!(!registry.is_complete());
    }

    #[test]
    fn test_find_page_by_label_is_case_insensitive() {
        let mut registry = LabelRegistry::new(2);
        registry.record(2, Some("AC512".to_owned()));

        assert_eq!(registry.find_page_by_label("ac512"), Some(2));
        assert_eq!(registry.find_page_by_label("AC512"), Some(2));
        assert_eq!(registry.find_page_by_label("AC513"), None);
    }

    #[test]
    fn test_find_page_by_label_is_idempotent() {
        let mut registry = LabelRegistry::new(2);
        registry.record(1, Some("AC401".to_owned()));

        let first = registry.find_page_by_label("AC401");
        let second = registry.find_page_by_label("AC401");
        assert_eq!(first, second);
        assert_eq!(first, Some(1));
    }

    #[test]
    fn test_record_same_value_is_a_no_op() {
        let mut registry = LabelRegistry::new(1);
        registry.record(1, Some("AC401".to_owned()));
        registry.record(1, Some("AC401".to_owned()));

        assert_eq!(registry.label(1), Some("AC401"));
        assert_eq!(registry.scanned(), 1);
    }

    #[test]
    fn test_no_label_is_a_committed_entry() {
        let mut registry = LabelRegistry::new(1);
        registry.record(1, None);

        assert!(registry.is_complete());
        assert_eq!(registry.label(1), None);
    }
}

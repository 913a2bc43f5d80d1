//! Reference resolution
//!
//! Resolves a detected reference's embedded tag to a target page using the
//! label registry. A miss while the registry is still populating is not a
//! permanent failure — the same tag may resolve once the thumbnail pass
//! reaches the target page — so the two cases are kept distinct.

use crate::registry::LabelRegistry;

/// Outcome of resolving an embedded tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// The tag maps to this page
    Resolved(u32),

    /// Not found, but the registry is still populating; worth retrying
    Pending,

    /// Not found, and every page has been scanned
    NotFound,
}

impl Resolution {
    /// The target page, if resolved
    pub fn page(&self) -> Option<u32> {
        match self {
            Resolution::Resolved(page) => Some(*page),
            _ => None,
        }
    }
}

/// Resolve an embedded tag against the current registry state
///
/// Pure function of the registry: no side effects, idempotent for a given
/// registry state.
pub fn resolve(registry: &LabelRegistry, tag: &str) -> Resolution {
    match registry.find_page_by_label(tag) {
        Some(page) => Resolution::Resolved(page),
        None if !registry.is_complete() => Resolution::Pending,
        None => Resolution::NotFound,
    }
}

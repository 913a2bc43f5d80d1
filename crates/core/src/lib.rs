//! Sheetlink Core Library
//!
//! Cross-reference detection and label-resolution engine for fixed-layout
//! sheet sets. Infers each page's sheet label from its title block, detects
//! inline references to other sheets, and resolves them to target pages so a
//! presenter can make them clickable.

pub mod detect;
pub mod label;
pub mod registry;
pub mod resolve;
pub mod session;
pub mod tag_index;

pub use detect::{detect_references, Orientation, ReferenceCandidate, ViewBox};
pub use label::extract_self_label;
pub use registry::{LabelEntry, LabelRegistry};
pub use resolve::{resolve, Resolution};
pub use session::{
    DisplayPhase, DisplayRequest, OverlayLink, PageOverlay, ViewerSession,
};
pub use tag_index::{build_tag_index, TagBBox, TagIndex, TagIndexError, TagOccurrence};

//! Page rendering collaborator seam
//!
//! Defines the interface the link engine consumes: positioned text fragments
//! with their glyph transforms, page geometry, and display viewports. The
//! default backend (`LopdfSource`) extracts fragments from real PDFs by
//! interpreting page content streams; anything that can produce positioned
//! text can stand in behind the `FragmentSource` trait.

use std::fs;
use std::path::{Path, PathBuf};

pub mod lopdf_source;

pub use lopdf_source::LopdfSource;

/// 2×3 affine transform `(a, b, c, d, e, f)`
///
/// Maps `(x, y)` to `(a·x + c·y + e, b·x + d·y + f)`. Glyph transforms carry
/// the font size folded into the scale columns, so the same type describes
/// text placement, viewport mapping, and their composition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlyphTransform(pub [f32; 6]);

impl GlyphTransform {
    /// The identity transform
    pub const IDENTITY: Self = Self([1.0, 0.0, 0.0, 1.0, 0.0, 0.0]);

    /// Create a transform from its six coefficients
    pub fn new(a: f32, b: f32, c: f32, d: f32, e: f32, f: f32) -> Self {
        Self([a, b, c, d, e, f])
    }

    /// Pure translation by `(tx, ty)`
    pub fn translation(tx: f32, ty: f32) -> Self {
        Self([1.0, 0.0, 0.0, 1.0, tx, ty])
    }

    /// Uniform scaling by `s`
    pub fn scaling(s: f32) -> Self {
        Self([s, 0.0, 0.0, s, 0.0, 0.0])
    }

    /// Compose with another transform, applying `inner` first
    ///
    /// `outer.compose(&inner)` maps a point through `inner`, then through
    /// `outer` — the usual matrix product `outer × inner`.
    pub fn compose(&self, inner: &GlyphTransform) -> GlyphTransform {
        let o = &self.0;
        let i = &inner.0;
        GlyphTransform([
            o[0] * i[0] + o[2] * i[1],
            o[1] * i[0] + o[3] * i[1],
            o[0] * i[2] + o[2] * i[3],
            o[1] * i[2] + o[3] * i[3],
            o[0] * i[4] + o[2] * i[5] + o[4],
            o[1] * i[4] + o[3] * i[5] + o[5],
        ])
    }

    /// Translation component — for a glyph run, the baseline origin
    pub fn origin(&self) -> (f32, f32) {
        (self.0[4], self.0[5])
    }

    /// Effective font size: magnitude of the y scale column
    pub fn font_size(&self) -> f32 {
        let c = self.0[2];
        let d = self.0[3];
        (c * c + d * d).sqrt()
    }

    /// Rotation in degrees, from the x basis vector
    pub fn rotation_deg(&self) -> f32 {
        self.0[1].atan2(self.0[0]).to_degrees()
    }
}

/// A positioned text fragment extracted from one page
///
/// Coordinates live in page space: bottom-left origin, y increasing upward,
/// units of points (1/72 inch). Fragments exist only for the duration of one
/// extraction pass and are never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct TextFragment {
    /// The text content of this glyph run
    pub text: String,

    /// Page-space placement, font size folded into the scale columns
    pub transform: GlyphTransform,

    /// Position among the page's fragments, used for neighbor lookahead
    pub sequence_index: usize,
}

impl TextFragment {
    /// Create a new text fragment
    pub fn new(text: impl Into<String>, transform: GlyphTransform, sequence_index: usize) -> Self {
        Self { text: text.into(), transform, sequence_index }
    }

    /// Convenience constructor for an unrotated fragment at `(x, y)`
    pub fn upright(
        text: impl Into<String>,
        x: f32,
        y: f32,
        font_size: f32,
        sequence_index: usize,
    ) -> Self {
        Self::new(
            text,
            GlyphTransform::new(font_size, 0.0, 0.0, font_size, x, y),
            sequence_index,
        )
    }

    /// Baseline origin x, in page space
    pub fn origin_x(&self) -> f32 {
        self.transform.origin().0
    }

    /// Baseline origin y, in page space
    pub fn origin_y(&self) -> f32 {
        self.transform.origin().1
    }

    /// Effective font size in page units
    pub fn font_size(&self) -> f32 {
        self.transform.font_size()
    }
}

/// Page dimensions in points
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width_pt: f32,
    pub height_pt: f32,
}

/// A display viewport for one page at one scale
///
/// `transform` maps page space (bottom-left origin, y up) to device space
/// (top-left origin, y down, scaled pixels). All reference bounding boxes are
/// computed through this transform and are invalid once the scale changes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    /// Viewport width in device pixels
    pub width: f32,

    /// Viewport height in device pixels
    pub height: f32,

    /// Page-space to device-space transform
    pub transform: GlyphTransform,
}

impl Viewport {
    /// Viewport for `page` displayed at `scale`
    pub fn new(page: PageSize, scale: f32) -> Self {
        let scale = if scale <= 0.0 { 1.0 } else { scale };
        Self {
            width: page.width_pt * scale,
            height: page.height_pt * scale,
            transform: GlyphTransform::new(scale, 0.0, 0.0, -scale, 0.0, page.height_pt * scale),
        }
    }

    /// Display scale encoded in this viewport
    pub fn scale(&self) -> f32 {
        self.transform.0[0]
    }
}

/// Where to load a document from
#[derive(Debug, Clone)]
pub enum OpenSource {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

impl From<PathBuf> for OpenSource {
    fn from(value: PathBuf) -> Self {
        Self::Path(value)
    }
}

impl From<&Path> for OpenSource {
    fn from(value: &Path) -> Self {
        Self::Path(value.to_path_buf())
    }
}

impl From<Vec<u8>> for OpenSource {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

impl OpenSource {
    pub(crate) fn into_bytes(self) -> Result<Vec<u8>, RenderError> {
        match self {
            OpenSource::Path(path) => Ok(fs::read(path)?),
            OpenSource::Bytes(bytes) => Ok(bytes),
        }
    }
}

/// Errors from the rendering collaborator
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PDF parse error: {0}")]
    Parse(#[from] lopdf::Error),
    #[error("page {page} out of range (page_count={page_count})")]
    PageOutOfRange { page: u32, page_count: u32 },
    #[error("encrypted PDFs are not supported in the default backend")]
    EncryptedUnsupported,
    #[error("backend error: {0}")]
    Backend(String),
}

/// Result type for collaborator operations
pub type RenderResult<T> = Result<T, RenderError>;

/// A source of positioned text fragments
///
/// Pages are numbered from 1 to `page_count()` inclusive, matching how sheet
/// sets are referenced by users. Implementations are expected to be cheap to
/// query repeatedly; fragment extraction runs once per page visit.
pub trait FragmentSource {
    /// Number of pages in the document
    fn page_count(&self) -> u32;

    /// Dimensions of a page in points
    fn page_size(&self, page: u32) -> RenderResult<PageSize>;

    /// Positioned text fragments of a page, in content order
    fn text_fragments(&self, page: u32) -> RenderResult<Vec<TextFragment>>;
}

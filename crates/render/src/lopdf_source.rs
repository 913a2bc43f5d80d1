//! lopdf-backed fragment source
//!
//! Default implementation of [`FragmentSource`]: loads a document with lopdf,
//! reads page sizes from each page's MediaBox, and extracts positioned text
//! fragments by interpreting the page content stream's text operators.
//!
//! The interpreter tracks the text matrix, text line matrix, and the CTM
//! (`q`/`Q`/`cm`), and emits one fragment per show-text operation with the
//! full composed placement transform. Glyph widths are not read from font
//! programs; the advance after a show is approximated at half the font size
//! per character, the same approximation the link engine uses for bounding
//! boxes.

use crate::{
    FragmentSource, GlyphTransform, OpenSource, PageSize, RenderError, RenderResult, TextFragment,
};
use lopdf::content::Content;
use lopdf::{Document, Object, ObjectId};

/// Approximate per-character advance as a fraction of the font size
///
/// Exact widths would require font metrics the collaborator contract does not
/// promise; this only affects the origins of later fragments on the same line.
const APPROX_CHAR_ADVANCE: f32 = 0.5;

/// A loaded PDF document serving positioned text fragments
#[derive(Debug)]
pub struct LopdfSource {
    document: Document,
    /// Page object ids in ascending 1-based page-number order
    page_ids: Vec<ObjectId>,
    sizes: Vec<PageSize>,
}

impl LopdfSource {
    /// Load a document from a path or bytes
    pub fn open(source: impl Into<OpenSource>) -> RenderResult<Self> {
        let bytes = source.into().into_bytes()?;

        if bytes.windows("/Encrypt".len()).any(|window| window == b"/Encrypt") {
            return Err(RenderError::EncryptedUnsupported);
        }

        let document = Document::load_mem(&bytes)?;
        let pages = document.get_pages();

        if pages.is_empty() {
            return Err(RenderError::Backend("document has no pages".to_owned()));
        }

        let mut page_ids = Vec::with_capacity(pages.len());
        let mut sizes = Vec::with_capacity(pages.len());

        // get_pages() yields a map ordered by 1-based page number.
        for (_, object_id) in pages {
            let size = media_box(&document, object_id)
                .unwrap_or(PageSize { width_pt: 612.0, height_pt: 792.0 });

            page_ids.push(object_id);
            sizes.push(size);
        }

        Ok(Self { document, page_ids, sizes })
    }

    fn page_id(&self, page: u32) -> RenderResult<ObjectId> {
        if page == 0 {
            return Err(RenderError::PageOutOfRange { page, page_count: self.page_count() });
        }
        self.page_ids
            .get(page as usize - 1)
            .copied()
            .ok_or(RenderError::PageOutOfRange { page, page_count: self.page_count() })
    }
}

impl FragmentSource for LopdfSource {
    fn page_count(&self) -> u32 {
        self.page_ids.len() as u32
    }

    fn page_size(&self, page: u32) -> RenderResult<PageSize> {
        let _ = self.page_id(page)?;
        Ok(self.sizes[page as usize - 1])
    }

    fn text_fragments(&self, page: u32) -> RenderResult<Vec<TextFragment>> {
        let page_id = self.page_id(page)?;
        let content = self.document.get_page_content(page_id)?;
        let content = Content::decode(&content)?;

        let mut interpreter = TextInterpreter::new();
        for operation in &content.operations {
            interpreter.apply(&operation.operator, &operation.operands);
        }

        log::debug!("page {page}: extracted {} text fragments", interpreter.fragments.len());
        Ok(interpreter.fragments)
    }
}

/// Minimal content-stream text interpreter
///
/// Tracks only the state that affects glyph placement. Color, clipping, and
/// path operators are ignored.
struct TextInterpreter {
    ctm: GlyphTransform,
    ctm_stack: Vec<GlyphTransform>,
    text_matrix: GlyphTransform,
    line_matrix: GlyphTransform,
    font_size: f32,
    leading: f32,
    fragments: Vec<TextFragment>,
}

impl TextInterpreter {
    fn new() -> Self {
        Self {
            ctm: GlyphTransform::IDENTITY,
            ctm_stack: Vec::new(),
            text_matrix: GlyphTransform::IDENTITY,
            line_matrix: GlyphTransform::IDENTITY,
            font_size: 0.0,
            leading: 0.0,
            fragments: Vec::new(),
        }
    }

    fn apply(&mut self, operator: &str, operands: &[Object]) {
        match operator {
            "q" => self.ctm_stack.push(self.ctm),
            "Q" => {
                if let Some(saved) = self.ctm_stack.pop() {
                    self.ctm = saved;
                }
            }
            "cm" => {
                if let Some(matrix) = matrix_operands(operands) {
                    self.ctm = self.ctm.compose(&matrix);
                }
            }
            "BT" => {
                self.text_matrix = GlyphTransform::IDENTITY;
                self.line_matrix = GlyphTransform::IDENTITY;
            }
            "ET" => {}
            "Tf" => {
                if let Some(size) = operands.get(1).and_then(number) {
                    self.font_size = size;
                }
            }
            "TL" => {
                if let Some(leading) = operands.first().and_then(number) {
                    self.leading = leading;
                }
            }
            "Td" => {
                if let (Some(tx), Some(ty)) =
                    (operands.first().and_then(number), operands.get(1).and_then(number))
                {
                    self.next_line(tx, ty);
                }
            }
            "TD" => {
                if let (Some(tx), Some(ty)) =
                    (operands.first().and_then(number), operands.get(1).and_then(number))
                {
                    self.leading = -ty;
                    self.next_line(tx, ty);
                }
            }
            "Tm" => {
                if let Some(matrix) = matrix_operands(operands) {
                    self.text_matrix = matrix;
                    self.line_matrix = matrix;
                }
            }
            "T*" => self.next_line(0.0, -self.leading),
            "Tj" => {
                if let Some(text) = operands.first().and_then(string_operand) {
                    self.show_text(&text);
                }
            }
            "TJ" => {
                // Kerning adjustments between array elements are dropped; the
                // strings are shown as one run.
                if let Some(Ok(elements)) = operands.first().map(Object::as_array) {
                    let text: String =
                        elements.iter().filter_map(string_operand).collect::<Vec<_>>().concat();
                    self.show_text(&text);
                }
            }
            "'" => {
                self.next_line(0.0, -self.leading);
                if let Some(text) = operands.first().and_then(string_operand) {
                    self.show_text(&text);
                }
            }
            "\"" => {
                self.next_line(0.0, -self.leading);
                if let Some(text) = operands.get(2).and_then(string_operand) {
                    self.show_text(&text);
                }
            }
            _ => {}
        }
    }

    fn next_line(&mut self, tx: f32, ty: f32) {
        self.line_matrix = self.line_matrix.compose(&GlyphTransform::translation(tx, ty));
        self.text_matrix = self.line_matrix;
    }

    fn show_text(&mut self, text: &str) {
        if !text.is_empty() {
            let placement = self
                .ctm
                .compose(&self.text_matrix)
                .compose(&GlyphTransform::scaling(self.font_size));

            let sequence_index = self.fragments.len();
            self.fragments.push(TextFragment::new(text, placement, sequence_index));
        }

        // Advance the text matrix past the run.
        let advance = text.chars().count() as f32 * APPROX_CHAR_ADVANCE * self.font_size;
        self.text_matrix = self.text_matrix.compose(&GlyphTransform::translation(advance, 0.0));
    }
}

/// Read a page's MediaBox, walking up the page tree for inherited values
fn media_box(document: &Document, page_id: ObjectId) -> Option<PageSize> {
    let mut current = page_id;
    loop {
        let dict = document.get_object(current).ok()?.as_dict().ok()?;

        if let Ok(object) = dict.get(b"MediaBox") {
            let object = match object {
                Object::Reference(id) => document.get_object(*id).ok()?,
                other => other,
            };
            let array = object.as_array().ok()?;
            if array.len() != 4 {
                return None;
            }
            let x0 = number(&array[0])?;
            let y0 = number(&array[1])?;
            let x1 = number(&array[2])?;
            let y1 = number(&array[3])?;
            return Some(PageSize { width_pt: (x1 - x0).abs(), height_pt: (y1 - y0).abs() });
        }

        current = dict.get(b"Parent").ok()?.as_reference().ok()?;
    }
}

/// Convert a numeric operand (Integer or Real) to f32
fn number(object: &Object) -> Option<f32> {
    match object {
        Object::Integer(value) => Some(*value as f32),
        Object::Real(value) => Some(*value),
        _ => None,
    }
}

fn matrix_operands(operands: &[Object]) -> Option<GlyphTransform> {
    if operands.len() != 6 {
        return None;
    }
    let mut coefficients = [0.0f32; 6];
    for (slot, operand) in coefficients.iter_mut().zip(operands) {
        *slot = number(operand)?;
    }
    Some(GlyphTransform(coefficients))
}

fn string_operand(object: &Object) -> Option<String> {
    match object {
        Object::String(bytes, _) => Some(decode_text(bytes)),
        _ => None,
    }
}

/// Decode PDF string bytes to text
///
/// UTF-16BE strings (BOM-prefixed) are decoded properly; simple-font byte
/// codes are treated as Latin-1, which is faithful for the standard fonts
/// used in title blocks.
fn decode_text(bytes: &[u8]) -> String {
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        bytes[2..]
            .chunks_exact(2)
            .filter_map(|pair| {
                char::from_u32(u32::from(u16::from_be_bytes([pair[0], pair[1]])))
            })
            .collect()
    } else {
        bytes.iter().map(|&b| b as char).collect()
    }
}

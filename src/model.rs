//! Data structures describing the logical content of a parsed HTML fixture.
//!
//! The HTML converter in [`crate::html`] flattens the DOM into a list of [`Block`]s.  Both output
//! paths consume the same model: the PDF builder maps blocks onto [`genpdf::elements`] and the
//! rasterizer lays them out on a pixel canvas.  Sizes are stored in millimetres, the unit `genpdf`
//! works in; [`px_to_mm`] and [`mm_to_px`] convert from and to CSS pixels.

use std::collections::BTreeMap;

use genpdf::style::Color;

use crate::bidi::TextDirection;
use crate::richtext::Span;

/// Millimetres per CSS pixel (96 pixels per inch).
pub const MM_PER_PX: f64 = 25.4 / 96.0;

/// Converts CSS pixels to millimetres.
pub fn px_to_mm(px: f64) -> f64 {
    px * MM_PER_PX
}

/// Converts millimetres to CSS pixels.
pub fn mm_to_px(mm: f64) -> f64 {
    mm / MM_PER_PX
}

/// Width of an A4 page in millimetres.
pub const A4_WIDTH_MM: f64 = 210.0;
/// Height of an A4 page in millimetres.
pub const A4_HEIGHT_MM: f64 = 297.0;
/// Margin applied on every side of a page by both renderers.
pub const PAGE_MARGIN_MM: f64 = 15.0;

/// Base font size in points applied to body text.
pub const BODY_FONT_SIZE: u8 = 12;

/// Font size in points used for a heading of the given level (1-6).
pub fn heading_font_size(level: u8) -> u8 {
    match level {
        1 => 24,
        2 => 18,
        3 => 15,
        4 => 13,
        5 => 12,
        _ => 11,
    }
}

/// Horizontal alignment of text and replaced content.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum HorizontalAlignment {
    /// Left aligned content.
    #[default]
    Left,
    /// Center aligned content.
    Center,
    /// Right aligned content.
    Right,
    /// Fully justified paragraphs.  Rendered left aligned.
    Justified,
}

impl HorizontalAlignment {
    /// Maps the alignment onto [`genpdf::Alignment`].
    pub fn to_genpdf(self) -> genpdf::Alignment {
        match self {
            Self::Left | Self::Justified => genpdf::Alignment::Left,
            Self::Center => genpdf::Alignment::Center,
            Self::Right => genpdf::Alignment::Right,
        }
    }
}

/// Rich text paragraph carrying inline styling information and block level metadata.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RichParagraph {
    spans: Vec<Span>,
    alignment: HorizontalAlignment,
    direction: TextDirection,
    font_size: Option<u8>,
    background: Option<Color>,
}

impl RichParagraph {
    /// Creates a paragraph from the provided spans using left alignment.
    pub fn new(spans: impl Into<Vec<Span>>) -> Self {
        Self {
            spans: spans.into(),
            ..Self::default()
        }
    }

    /// Returns the spans that make up the paragraph.
    pub fn spans(&self) -> &[Span] {
        &self.spans
    }

    /// Returns the configured alignment.
    pub fn alignment(&self) -> HorizontalAlignment {
        self.alignment
    }

    /// Base direction of the paragraph.
    pub fn direction(&self) -> TextDirection {
        self.direction
    }

    /// Font size in points, if it differs from the document default.
    pub fn font_size(&self) -> Option<u8> {
        self.font_size
    }

    /// Background colour painted behind the paragraph box.
    pub fn background(&self) -> Option<Color> {
        self.background
    }

    /// Returns true when no span carries any text.
    pub fn is_empty(&self) -> bool {
        self.spans.iter().all(|span| span.text().is_empty())
    }

    /// Sets the alignment and returns the updated paragraph.
    pub fn with_alignment(mut self, alignment: HorizontalAlignment) -> Self {
        self.alignment = alignment;
        self
    }

    /// Sets the base direction and returns the updated paragraph.
    pub fn with_direction(mut self, direction: TextDirection) -> Self {
        self.direction = direction;
        self
    }

    /// Sets the font size and returns the updated paragraph.
    pub fn with_font_size(mut self, font_size: impl Into<Option<u8>>) -> Self {
        self.font_size = font_size.into();
        self
    }

    /// Sets the background colour and returns the updated paragraph.
    pub fn with_background(mut self, background: impl Into<Option<Color>>) -> Self {
        self.background = background.into();
        self
    }

    pub(crate) fn spans_mut(&mut self) -> &mut Vec<Span> {
        &mut self.spans
    }
}

/// Decoded-on-demand image together with layout metadata.
#[derive(Clone, Debug, PartialEq)]
pub struct ImageBlock {
    bytes: Vec<u8>,
    caption: Option<RichParagraph>,
    alignment: HorizontalAlignment,
    width_mm: Option<f64>,
}

impl ImageBlock {
    /// Creates a new image block from encoded image bytes.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
            caption: None,
            alignment: HorizontalAlignment::Left,
            width_mm: None,
        }
    }

    /// Encoded image bytes (PNG, JPEG, ...).
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Returns the caption paragraph, if any.
    pub fn caption(&self) -> Option<&RichParagraph> {
        self.caption.as_ref()
    }

    /// Returns the configured alignment.
    pub fn alignment(&self) -> HorizontalAlignment {
        self.alignment
    }

    /// Returns the requested rendered width in millimetres, if any.
    pub fn width_mm(&self) -> Option<f64> {
        self.width_mm
    }

    /// Sets the caption and returns the updated image block.
    pub fn with_caption(mut self, caption: impl Into<Option<RichParagraph>>) -> Self {
        self.caption = caption.into();
        self
    }

    /// Sets the alignment and returns the updated image block.
    pub fn with_alignment(mut self, alignment: HorizontalAlignment) -> Self {
        self.alignment = alignment;
        self
    }

    /// Constrains the rendered width (in millimetres) and returns the updated block.
    pub fn with_width_mm(mut self, width_mm: impl Into<Option<f64>>) -> Self {
        self.width_mm = width_mm.into();
        self
    }
}

/// Inline `<svg>` markup and the box it should occupy.
#[derive(Clone, Debug, PartialEq)]
pub struct SvgBlock {
    /// Serialized SVG document.
    pub source: String,
    /// Box width in millimetres.
    pub width_mm: f64,
    /// Box height in millimetres.
    pub height_mm: f64,
}

/// A replaced element painted by an [`ObjectDrawer`](crate::drawing::ObjectDrawer).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CustomObject {
    content_type: String,
    attributes: BTreeMap<String, String>,
    width_mm: f64,
    height_mm: f64,
}

impl CustomObject {
    /// Creates an object of the given MIME-like type occupying `width_mm` x `height_mm`.
    pub fn new(content_type: impl Into<String>, width_mm: f64, height_mm: f64) -> Self {
        Self {
            content_type: content_type.into(),
            attributes: BTreeMap::new(),
            width_mm,
            height_mm,
        }
    }

    /// The `type` attribute the drawer is registered under.
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// Looks up an attribute of the source element.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// All attributes of the source element.
    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }

    /// Box width in millimetres.
    pub fn width_mm(&self) -> f64 {
        self.width_mm
    }

    /// Box height in millimetres.
    pub fn height_mm(&self) -> f64 {
        self.height_mm
    }

    /// Adds an attribute and returns the updated object.
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }
}

/// An ordered or unordered list of single paragraph items.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ListBlock {
    /// Whether items are numbered.
    pub ordered: bool,
    /// List items in document order.
    pub items: Vec<RichParagraph>,
}

/// A row of a [`TableBlock`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TableRow {
    /// Row belongs to `<thead>` or consists of `<th>` cells only.
    pub header: bool,
    /// Cell contents.
    pub cells: Vec<RichParagraph>,
}

/// A simple grid table.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TableBlock {
    /// Rows in document order.
    pub rows: Vec<TableRow>,
}

impl TableBlock {
    /// Number of columns, taken from the widest row.
    pub fn column_count(&self) -> usize {
        self.rows.iter().map(|row| row.cells.len()).max().unwrap_or(0)
    }
}

/// The kind of a form control.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldKind {
    /// Single line text input.
    Text,
    /// Password input, rendered masked.
    Password,
    /// Checkbox input.
    Checkbox {
        /// Whether the `checked` attribute is present.
        checked: bool,
    },
    /// Radio button input.
    Radio {
        /// Whether the `checked` attribute is present.
        checked: bool,
    },
    /// Multi-line `<textarea>`.
    TextArea,
    /// `<select>` showing the selected option.
    Select,
    /// `<button>` or a submit/reset input.
    Button,
}

/// A form control rendered as a static field.
#[derive(Clone, Debug, PartialEq)]
pub struct FormField {
    /// Control kind.
    pub kind: FieldKind,
    /// Displayed value.
    pub value: String,
}

impl FormField {
    /// Text shown inside the field box.
    pub fn display_text(&self) -> String {
        let text = match self.kind {
            FieldKind::Password => "\u{2022}".repeat(self.value.chars().count()),
            FieldKind::Checkbox { checked } => {
                format!("[{}] {}", if checked { "x" } else { " " }, self.value)
            }
            FieldKind::Radio { checked } => {
                format!("({}) {}", if checked { "o" } else { " " }, self.value)
            }
            FieldKind::Select => format!("{} \u{25be}", self.value),
            FieldKind::Text | FieldKind::TextArea | FieldKind::Button => self.value.clone(),
        };
        text.trim_end().to_owned()
    }
}

/// Individual content blocks of a document.
#[derive(Clone, Debug, PartialEq)]
pub enum Block {
    /// `<h1>` to `<h6>`.
    Heading {
        /// Heading level, 1 to 6.
        level: u8,
        /// Heading text.
        text: RichParagraph,
    },
    /// Styled paragraph content.
    Paragraph(RichParagraph),
    /// `<ul>`/`<ol>` content.
    List(ListBlock),
    /// `<table>` content.
    Table(TableBlock),
    /// Raster image, optionally captioned.
    Image(ImageBlock),
    /// Inline SVG.
    Svg(SvgBlock),
    /// Custom object painted by a registered drawer.
    Object(CustomObject),
    /// Form control.
    Field(FormField),
    /// `<hr>`.
    Rule,
    /// Explicit page break request.
    PageBreak,
    /// Breaks the page when less than the given height (mm) is left.
    MinHeightBreak(f64),
}

impl Block {
    /// Convenience helper for building a paragraph block.
    pub fn paragraph(spans: impl Into<Vec<Span>>) -> Self {
        Self::Paragraph(RichParagraph::new(spans))
    }

    /// Convenience helper for building an image block.
    pub fn image(bytes: impl Into<Vec<u8>>) -> Self {
        Self::Image(ImageBlock::new(bytes))
    }

    /// Convenience helper that yields an explicit page break block.
    pub fn page_break() -> Self {
        Self::PageBreak
    }
}

/// A parsed HTML document.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Document {
    title: Option<String>,
    blocks: Vec<Block>,
}

impl Document {
    /// Creates an empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Contents of `<title>`, if present.
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// Blocks in document order.
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Sets the title and returns the updated document.
    pub fn with_title(mut self, title: impl Into<Option<String>>) -> Self {
        self.title = title.into();
        self
    }

    /// Appends a block and returns the updated document.
    pub fn with_block(mut self, block: Block) -> Self {
        self.blocks.push(block);
        self
    }

    pub(crate) fn push(&mut self, block: Block) {
        // Consecutive page breaks collapse into one.
        if matches!(block, Block::PageBreak)
            && matches!(self.blocks.last(), Some(Block::PageBreak) | None)
        {
            return;
        }
        self.blocks.push(block);
    }

    pub(crate) fn set_title(&mut self, title: Option<String>) {
        self.title = title;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn px_and_mm_round_trip() {
        assert!((px_to_mm(96.0) - 25.4).abs() < 1e-9);
        assert!((mm_to_px(px_to_mm(123.0)) - 123.0).abs() < 1e-9);
    }

    #[test]
    fn leading_and_repeated_page_breaks_are_dropped() {
        let mut document = Document::new();
        document.push(Block::PageBreak);
        document.push(Block::paragraph(vec![Span::new("a")]));
        document.push(Block::PageBreak);
        document.push(Block::PageBreak);
        assert_eq!(document.blocks().len(), 2);
    }

    #[test]
    fn table_column_count_uses_widest_row() {
        let table = TableBlock {
            rows: vec![
                TableRow {
                    header: true,
                    cells: vec![RichParagraph::default(); 3],
                },
                TableRow {
                    header: false,
                    cells: vec![RichParagraph::default(); 2],
                },
            ],
        };
        assert_eq!(table.column_count(), 3);
    }

    #[test]
    fn form_fields_render_their_state() {
        let checkbox = FormField {
            kind: FieldKind::Checkbox { checked: true },
            value: "Agree".into(),
        };
        assert_eq!(checkbox.display_text(), "[x] Agree");

        let password = FormField {
            kind: FieldKind::Password,
            value: "abc".into(),
        };
        assert_eq!(password.display_text().chars().count(), 3);
    }
}

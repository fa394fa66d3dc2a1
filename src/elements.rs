//! Extended element implementations built on top of `genpdf` primitives.
//!
//! `genpdf` ships paragraphs, images and tables, but an HTML page needs a few more things: wrapped
//! text with underlines and background colours, replaced content painted by object drawers or by an
//! SVG delegate, static form fields, and tables that repeat their header rows on every page.

#[cfg(feature = "bookmarks")]
use std::cell::{Cell, RefCell};
#[cfg(feature = "bookmarks")]
use std::rc::Rc;
use std::sync::Arc;

use image::{ColorType, DynamicImage, GenericImageView};
use log::warn;

use genpdf::elements::{FrameCellDecorator, Image, TableLayout};
use genpdf::error::{Context as _, Error};
use genpdf::style::{Color, LineStyle, Style, StyledString};
use genpdf::{render, Alignment, Element, Margins, Mm, Position, RenderResult, Scale, Size};

#[cfg(feature = "bookmarks")]
use crate::bookmarks::HeadingEntry;
use crate::drawing::{paint_object, Graphics, ObjectDrawerFactory, Point, Stroke};
use crate::model::{mm_to_px, px_to_mm, CustomObject, FieldKind, FormField, RichParagraph, SvgBlock, TableBlock, TableRow};
use crate::richtext::{spans_to_styled_strings, StyledSpan};
use crate::svg::{pixmap_to_rgba, SvgDrawer};

/// Resolution `genpdf` assumes for images without an explicit scale.
const GENPDF_IMAGE_DPI: f64 = 300.0;
/// Resolution of decoded HTML images: one image pixel per CSS pixel.
const CSS_PIXEL_DPI: f64 = 96.0;
/// Resolution SVG content is rasterized at before embedding.
const SVG_RASTER_DPI: f64 = 192.0;
const MM_PER_INCH: f64 = 25.4;
const DEFAULT_CAPTION_SPACING_MM: f64 = 2.0;
const DEFAULT_UNDERLINE_OFFSET_MM: f64 = 0.4;
const FIELD_PADDING_MM: f64 = 1.5;
const FIELD_MIN_WIDTH_MM: f64 = 60.0;
const TEXTAREA_LINES: f64 = 3.0;
const RULE_HEIGHT_MM: f64 = 3.0;

pub(crate) fn mm_from_f64(value: f64) -> Mm {
    Mm::from(printpdf::Mm(value))
}

pub(crate) fn mm_to_f64(value: Mm) -> f64 {
    let mm: printpdf::Mm = value.into();
    mm.0
}

fn natural_image_width_mm(image: &DynamicImage, dpi: f64) -> f64 {
    let (px_width, _) = image.dimensions();
    MM_PER_INCH * f64::from(px_width) / dpi
}

fn fill_rect(area: &render::Area<'_>, origin: Position, size: Size, color: Color) {
    // A stroke as thick as the rectangle is tall paints the rectangle.
    let middle = origin.y + size.height / 2.0;
    area.draw_line(
        vec![
            Position::new(origin.x, middle),
            Position::new(origin.x + size.width, middle),
        ],
        LineStyle::new().with_thickness(size.height).with_color(color),
    );
}

fn stroke_rect(area: &render::Area<'_>, origin: Position, size: Size, line_style: LineStyle) {
    let right = origin.x + size.width;
    let bottom = origin.y + size.height;
    area.draw_line(
        vec![
            origin,
            Position::new(right, origin.y),
            Position::new(right, bottom),
            Position::new(origin.x, bottom),
            origin,
        ],
        line_style,
    );
}

fn aligned_offset(alignment: Alignment, available: Mm, width: Mm) -> Mm {
    let offset = match alignment {
        Alignment::Left => Mm::default(),
        Alignment::Center => (available - width) / 2.0,
        Alignment::Right => available - width,
    };
    offset.max(Mm::default())
}

/// Loads an image from in-memory bytes using the [`image`] crate with descriptive errors.
pub fn decode_image_from_bytes(bytes: impl AsRef<[u8]>) -> Result<DynamicImage, Error> {
    image::load_from_memory(bytes.as_ref()).context("Failed to decode image from provided bytes")
}

/// Composites images with an alpha channel onto white and converts other layouts to 8-bit RGB.
///
/// `genpdf` only embeds 8-bit grey and RGB images.
pub fn flatten_alpha(image: DynamicImage) -> DynamicImage {
    match image.color() {
        ColorType::L8 | ColorType::Rgb8 => image,
        color if color.has_alpha() => {
            let rgba = image.to_rgba8();
            let (width, height) = rgba.dimensions();
            let mut rgb = image::RgbImage::new(width, height);
            for (x, y, pixel) in rgba.enumerate_pixels() {
                let alpha = f64::from(pixel[3]) / 255.0;
                let blend =
                    |channel: u8| (f64::from(channel) * alpha + 255.0 * (1.0 - alpha)).round() as u8;
                rgb.put_pixel(x, y, image::Rgb([blend(pixel[0]), blend(pixel[1]), blend(pixel[2])]));
            }
            DynamicImage::ImageRgb8(rgb)
        }
        _ => DynamicImage::ImageRgb8(image.to_rgb8()),
    }
}

/// Converts the provided image bytes into a `genpdf` image together with its width in
/// millimetres at one image pixel per CSS pixel.
pub fn image_from_bytes(bytes: impl AsRef<[u8]>) -> Result<(Image, f64), Error> {
    let dynamic = flatten_alpha(decode_image_from_bytes(bytes)?);
    let width_mm = natural_image_width_mm(&dynamic, CSS_PIXEL_DPI);
    let genpdf_width_mm = natural_image_width_mm(&dynamic, GENPDF_IMAGE_DPI);
    let mut image = Image::from_dynamic_image(dynamic)?;
    let scale = width_mm / genpdf_width_mm;
    image.set_scale(Scale::new(scale, scale));
    Ok((image, width_mm))
}

/// Wrapped rich text with underline and background support.
///
/// Lines are broken at spaces.  A word wider than the available width gets a line of its own.
/// When the page runs out, the remaining lines are rendered on the next page.
pub struct RichText {
    spans: Vec<StyledSpan>,
    alignment: Alignment,
    font_size: Option<u8>,
    background: Option<Color>,
    underline_offset: Mm,
    rendered_lines: usize,
}

struct Chunk {
    string: StyledString,
    underline: bool,
    width: Mm,
}

struct Line {
    chunks: Vec<Chunk>,
    advance: Mm,
    content_width: Mm,
    height: Mm,
    glyph_height: Mm,
    metrics: Style,
}

impl Line {
    fn new(metrics: Style, context: &genpdf::Context) -> Self {
        Self {
            chunks: Vec::new(),
            advance: Mm::default(),
            content_width: Mm::default(),
            height: metrics.line_height(&context.font_cache),
            glyph_height: Mm::default(),
            metrics,
        }
    }
}

impl RichText {
    /// Creates a left-aligned text element from the provided spans.
    pub fn new(spans: Vec<StyledSpan>) -> Self {
        Self {
            spans,
            alignment: Alignment::Left,
            font_size: None,
            background: None,
            underline_offset: mm_from_f64(DEFAULT_UNDERLINE_OFFSET_MM),
            rendered_lines: 0,
        }
    }

    /// Creates an element without text.
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Creates the element for a model paragraph.
    pub fn from_paragraph(paragraph: &RichParagraph) -> Self {
        let mut text = Self::new(spans_to_styled_strings(paragraph.spans()))
            .with_alignment(paragraph.alignment().to_genpdf());
        text.font_size = paragraph.font_size();
        text.background = paragraph.background();
        text
    }

    /// Sets the alignment and returns the updated element.
    pub fn with_alignment(mut self, alignment: Alignment) -> Self {
        self.alignment = alignment;
        self
    }

    /// Sets the font size in points and returns the updated element.
    pub fn with_font_size(mut self, font_size: u8) -> Self {
        self.font_size = Some(font_size);
        self
    }

    fn layout(&self, context: &genpdf::Context, style: Style, max_width: Mm) -> Vec<Line> {
        let mut lines = Vec::new();
        let mut line = Line::new(style, context);

        for span in &self.spans {
            let chunk_style = style.and(span.string.style);
            for word in span.string.s.split_inclusive(' ') {
                let trimmed = word.trim_end_matches(' ');
                if line.chunks.is_empty() && trimmed.is_empty() {
                    continue;
                }
                let trimmed_width = StyledString::new(trimmed, chunk_style).width(&context.font_cache);
                if !line.chunks.is_empty() && line.advance + trimmed_width > max_width {
                    lines.push(std::mem::replace(&mut line, Line::new(style, context)));
                    if trimmed.is_empty() {
                        continue;
                    }
                }

                let string = StyledString::new(word, chunk_style);
                let width = string.width(&context.font_cache);
                let line_height = chunk_style.line_height(&context.font_cache);
                if line_height > line.height {
                    line.height = line_height;
                    line.metrics = chunk_style;
                }
                let glyph_height = chunk_style
                    .font(&context.font_cache)
                    .glyph_height(chunk_style.font_size());
                line.glyph_height = line.glyph_height.max(glyph_height);
                line.content_width = line.advance + trimmed_width;
                line.advance += width;
                line.chunks.push(Chunk {
                    string,
                    underline: span.underline,
                    width,
                });
            }
        }
        if !line.chunks.is_empty() {
            lines.push(line);
        }
        lines
    }
}

impl Element for RichText {
    fn render(
        &mut self,
        context: &genpdf::Context,
        area: render::Area<'_>,
        style: Style,
    ) -> Result<RenderResult, Error> {
        let style = match self.font_size {
            Some(size) => style.with_font_size(size),
            None => style,
        };
        let available = area.size();
        let lines = self.layout(context, style, available.width);

        let mut result = RenderResult::default();
        let mut top = Mm::default();
        for line in lines.iter().skip(self.rendered_lines) {
            if top + line.height > available.height {
                result.has_more = true;
                break;
            }
            if let Some(color) = self.background {
                fill_rect(
                    &area,
                    Position::new(0, top),
                    Size::new(available.width, line.height),
                    color,
                );
            }

            let left = aligned_offset(self.alignment, available.width, line.content_width);
            match area.text_section(&context.font_cache, Position::new(left, top), line.metrics) {
                Some(mut section) => {
                    for chunk in &line.chunks {
                        section.print_str(&chunk.string.s, chunk.string.style)?;
                    }
                }
                None => {
                    result.has_more = true;
                    break;
                }
            }

            let baseline = top + line.glyph_height + self.underline_offset;
            let mut cursor = left;
            for chunk in &line.chunks {
                if chunk.underline {
                    let underlined = chunk.string.s.trim_end_matches(' ');
                    let width = StyledString::new(underlined, chunk.string.style).width(&context.font_cache);
                    let mut line_style = LineStyle::new();
                    if let Some(color) = chunk.string.style.color().or(style.color()) {
                        line_style = line_style.with_color(color);
                    }
                    area.draw_line(
                        vec![
                            Position::new(cursor, baseline),
                            Position::new(cursor + width, baseline),
                        ],
                        line_style,
                    );
                }
                cursor += chunk.width;
            }

            top += line.height;
            self.rendered_lines += 1;
        }

        result.size = Size::new(available.width, top);
        Ok(result)
    }
}

/// An image with an optional caption stacked underneath.
///
/// The image and the caption share the same alignment and the image can be rescaled to a specific
/// width while keeping the aspect ratio.
pub struct CaptionedImage {
    image: Image,
    caption: Option<RichText>,
    alignment: Alignment,
    natural_width_mm: f64,
    requested_width: Option<Mm>,
    spacing: Mm,
    image_done: bool,
}

impl CaptionedImage {
    /// Creates a captioned image from the contents of `bytes`.
    pub fn from_bytes(bytes: impl AsRef<[u8]>, caption: Option<RichText>) -> Result<Self, Error> {
        let (image, natural_width_mm) = image_from_bytes(bytes)?;
        Ok(Self {
            image,
            caption,
            alignment: Alignment::Left,
            natural_width_mm,
            requested_width: None,
            spacing: mm_from_f64(DEFAULT_CAPTION_SPACING_MM),
            image_done: false,
        })
    }

    /// Sets the horizontal alignment and returns the updated element.
    pub fn with_alignment(mut self, alignment: Alignment) -> Self {
        self.alignment = alignment;
        self
    }

    /// Constrains the rendered width and returns the updated element.
    pub fn with_width(mut self, width: impl Into<Option<Mm>>) -> Self {
        self.requested_width = width.into();
        self
    }

    fn apply_layout(&mut self, available_width: Mm) {
        self.image.set_alignment(self.alignment);
        let natural = self.natural_width_mm;
        if natural <= f64::EPSILON {
            return;
        }
        let desired = self
            .requested_width
            .map(mm_to_f64)
            .unwrap_or(natural)
            .min(mm_to_f64(available_width));
        // Scale relative to genpdf's own resolution assumption.
        let scale = desired / natural * (GENPDF_IMAGE_DPI / CSS_PIXEL_DPI);
        self.image.set_scale(Scale::new(scale, scale));
    }
}

impl Element for CaptionedImage {
    fn render(
        &mut self,
        context: &genpdf::Context,
        mut area: render::Area<'_>,
        style: Style,
    ) -> Result<RenderResult, Error> {
        let mut result = RenderResult::default();

        if !self.image_done {
            self.apply_layout(area.size().width);
            let image_result = self.image.render(context, area.clone(), style)?;
            if image_result.has_more {
                result.has_more = true;
                return Ok(result);
            }
            self.image_done = true;
            result.size = result.size.stack_vertical(image_result.size);
            area.add_offset(Position::new(0, image_result.size.height + self.spacing));
            if self.caption.is_some() {
                result.size = result.size.stack_vertical(Size::new(0, self.spacing));
            }
        }

        if let Some(caption) = &mut self.caption {
            caption.alignment = self.alignment;
            let caption_result = caption.render(context, area, style)?;
            result.size = result.size.stack_vertical(caption_result.size);
            result.has_more |= caption_result.has_more;
        }

        Ok(result)
    }
}

/// [`Graphics`] implementation drawing onto a `genpdf` area.
struct PdfGraphics<'r, 'p> {
    area: &'r render::Area<'p>,
    left_mm: f64,
    top_mm: f64,
}

impl Graphics for PdfGraphics<'_, '_> {
    fn draw_line(&mut self, from: Point, to: Point, stroke: Stroke) {
        let position = |point: Point| {
            Position::new(
                mm_from_f64(self.left_mm + px_to_mm(point.x)),
                mm_from_f64(self.top_mm + px_to_mm(point.y)),
            )
        };
        let line_style = LineStyle::new()
            .with_thickness(mm_from_f64(px_to_mm(stroke.width)))
            .with_color(stroke.color);
        self.area.draw_line(vec![position(from), position(to)], line_style);
    }
}

/// A box painted by the object drawer registered for its type.
pub struct DrawnObject {
    object: CustomObject,
    drawers: Option<Arc<dyn ObjectDrawerFactory>>,
}

impl DrawnObject {
    /// Creates the element; without a factory the box stays empty.
    pub fn new(object: CustomObject, drawers: Option<Arc<dyn ObjectDrawerFactory>>) -> Self {
        Self { object, drawers }
    }
}

impl Element for DrawnObject {
    fn render(
        &mut self,
        _context: &genpdf::Context,
        area: render::Area<'_>,
        _style: Style,
    ) -> Result<RenderResult, Error> {
        let mut result = RenderResult::default();
        let width = mm_from_f64(self.object.width_mm());
        let height = mm_from_f64(self.object.height_mm());
        if height > area.size().height {
            result.has_more = true;
            return Ok(result);
        }

        let mut graphics = PdfGraphics {
            area: &area,
            left_mm: 0.0,
            top_mm: 0.0,
        };
        paint_object(
            self.drawers.as_deref(),
            &self.object,
            mm_to_px(self.object.width_mm()),
            mm_to_px(self.object.height_mm()),
            &mut graphics,
        );

        result.size = Size::new(width, height);
        Ok(result)
    }
}

/// Inline SVG rasterized through an [`SvgDrawer`] and embedded as an image.
///
/// Without a drawer, or when the markup cannot be rendered, a warning is logged and the box is
/// left empty.
pub struct SvgElement {
    image: Option<Image>,
    size: Size,
}

impl SvgElement {
    /// Rasterizes `block` with `drawer`.
    pub fn new(block: &SvgBlock, drawer: Option<&dyn SvgDrawer>) -> Self {
        let size = Size::new(mm_from_f64(block.width_mm), mm_from_f64(block.height_mm));
        let image = match drawer {
            Some(drawer) => Self::rasterize(block, drawer),
            None => {
                warn!("No SVG drawer configured; leaving an empty {:.1}x{:.1}mm box", block.width_mm, block.height_mm);
                None
            }
        };
        Self { image, size }
    }

    fn rasterize(block: &SvgBlock, drawer: &dyn SvgDrawer) -> Option<Image> {
        let to_px = |mm: f64| (mm / MM_PER_INCH * SVG_RASTER_DPI).round().max(1.0) as u32;
        let pixmap = match drawer.render(&block.source, to_px(block.width_mm), to_px(block.height_mm)) {
            Ok(pixmap) => pixmap,
            Err(err) => {
                warn!("Unable to render inline SVG: {}", err);
                return None;
            }
        };
        let dynamic = flatten_alpha(DynamicImage::ImageRgba8(pixmap_to_rgba(&pixmap)));
        let natural = natural_image_width_mm(&dynamic, GENPDF_IMAGE_DPI);
        match Image::from_dynamic_image(dynamic) {
            Ok(mut image) => {
                let scale = block.width_mm / natural;
                image.set_scale(Scale::new(scale, scale));
                Some(image)
            }
            Err(err) => {
                warn!("Unable to embed rendered SVG: {}", err);
                None
            }
        }
    }
}

impl Element for SvgElement {
    fn render(
        &mut self,
        context: &genpdf::Context,
        area: render::Area<'_>,
        style: Style,
    ) -> Result<RenderResult, Error> {
        let mut result = RenderResult::default();
        if self.size.height > area.size().height {
            result.has_more = true;
            return Ok(result);
        }
        if let Some(image) = &mut self.image {
            image.render(context, area, style)?;
        }
        result.size = self.size;
        Ok(result)
    }
}

/// Starts a new page when less than a minimum height is left on the current one.
pub struct MinHeightBreak {
    min_height: Mm,
    triggered: bool,
}

impl MinHeightBreak {
    /// Creates a break requiring `min_height_mm` of free space.
    pub fn new(min_height_mm: f64) -> Self {
        Self {
            min_height: mm_from_f64(min_height_mm),
            triggered: false,
        }
    }
}

impl Element for MinHeightBreak {
    fn render(
        &mut self,
        _context: &genpdf::Context,
        area: render::Area<'_>,
        _style: Style,
    ) -> Result<RenderResult, Error> {
        let mut result = RenderResult::default();
        if !self.triggered && area.size().height < self.min_height {
            self.triggered = true;
            result.has_more = true;
        }
        Ok(result)
    }
}

/// `<hr>`: a thin grey line across the full width.
#[derive(Clone, Copy, Debug, Default)]
pub struct HorizontalRule;

impl Element for HorizontalRule {
    fn render(
        &mut self,
        _context: &genpdf::Context,
        area: render::Area<'_>,
        _style: Style,
    ) -> Result<RenderResult, Error> {
        let mut result = RenderResult::default();
        let height = mm_from_f64(RULE_HEIGHT_MM);
        if height > area.size().height {
            result.has_more = true;
            return Ok(result);
        }
        let middle = height / 2.0;
        area.draw_line(
            vec![
                Position::new(0, middle),
                Position::new(area.size().width, middle),
            ],
            LineStyle::new()
                .with_thickness(mm_from_f64(0.3))
                .with_color(Color::Greyscale(128)),
        );
        result.size = Size::new(area.size().width, height);
        Ok(result)
    }
}

/// A form control rendered as a static, framed field.
pub struct FormFieldElement {
    field: FormField,
}

impl FormFieldElement {
    /// Creates the element.
    pub fn new(field: FormField) -> Self {
        Self { field }
    }
}

impl Element for FormFieldElement {
    fn render(
        &mut self,
        context: &genpdf::Context,
        area: render::Area<'_>,
        style: Style,
    ) -> Result<RenderResult, Error> {
        let mut result = RenderResult::default();
        let text = self.field.display_text();
        let padding = FIELD_PADDING_MM;
        let line_height = mm_to_f64(style.line_height(&context.font_cache));
        let text_width = mm_to_f64(StyledString::new(text.as_str(), style).width(&context.font_cache));
        let available = area.size();

        let (framed, lines, min_width) = match self.field.kind {
            FieldKind::Checkbox { .. } | FieldKind::Radio { .. } => (false, 1.0, 0.0),
            FieldKind::TextArea => (true, TEXTAREA_LINES, FIELD_MIN_WIDTH_MM),
            FieldKind::Button => (true, 1.0, 0.0),
            FieldKind::Text | FieldKind::Password | FieldKind::Select => {
                (true, 1.0, FIELD_MIN_WIDTH_MM)
            }
        };
        let width = (text_width + 2.0 * padding)
            .max(min_width)
            .min(mm_to_f64(available.width));
        let height = line_height * lines + 2.0 * padding;
        if mm_from_f64(height) > available.height {
            result.has_more = true;
            return Ok(result);
        }

        let size = Size::new(mm_from_f64(width), mm_from_f64(height));
        if self.field.kind == FieldKind::Button {
            fill_rect(&area, Position::new(0, 0), size, Color::Greyscale(230));
        }
        if framed {
            stroke_rect(
                &area,
                Position::new(0, 0),
                size,
                LineStyle::new()
                    .with_thickness(mm_from_f64(0.2))
                    .with_color(Color::Greyscale(96)),
            );
        }
        if let Some(mut section) = area.text_section(
            &context.font_cache,
            Position::new(mm_from_f64(padding), mm_from_f64(padding)),
            style,
        ) {
            section.print_str(&text, style)?;
        }

        result.size = size;
        Ok(result)
    }
}

fn build_table(columns: usize, rows: &[TableRow]) -> Result<TableLayout, Error> {
    let mut layout = TableLayout::new(vec![1; columns.max(1)]);
    layout.set_cell_decorator(FrameCellDecorator::new(true, true, false));
    for row in rows {
        let mut table_row = layout.row();
        for index in 0..columns.max(1) {
            let cell = row
                .cells
                .get(index)
                .map(RichText::from_paragraph)
                .unwrap_or_else(RichText::empty);
            table_row.push_element(cell.padded(Margins::trbl(1, 2, 1, 2)));
        }
        table_row.push()?;
    }
    Ok(layout)
}

/// A framed table whose leading header rows are repeated at the top of every page it spans.
pub struct RepeatingHeaderTable {
    columns: usize,
    header: Vec<TableRow>,
    body: TableLayout,
}

impl RepeatingHeaderTable {
    /// Builds the element from a table block.
    pub fn new(table: &TableBlock) -> Result<Self, Error> {
        let columns = table.column_count();
        let header_len = table.rows.iter().take_while(|row| row.header).count();
        let (header, body) = table.rows.split_at(header_len);
        Ok(Self {
            columns,
            header: header.to_vec(),
            body: build_table(columns, body)?,
        })
    }
}

impl Element for RepeatingHeaderTable {
    fn render(
        &mut self,
        context: &genpdf::Context,
        mut area: render::Area<'_>,
        style: Style,
    ) -> Result<RenderResult, Error> {
        let mut result = RenderResult::default();

        if !self.header.is_empty() {
            let mut header = build_table(self.columns, &self.header)?;
            let header_result = header.render(context, area.clone(), style)?;
            if header_result.has_more {
                result.has_more = true;
                return Ok(result);
            }
            area.add_offset(Position::new(0, header_result.size.height));
            result.size = header_result.size;
        }

        let body_result = self.body.render(context, area, style)?;
        result.size = result.size.stack_vertical(body_result.size);
        result.has_more = body_result.has_more;
        Ok(result)
    }
}

/// Records the page a heading is rendered on for the PDF outline.
#[cfg(feature = "bookmarks")]
pub struct HeadingMarker<E> {
    inner: E,
    title: String,
    level: u8,
    pages: Rc<Cell<usize>>,
    headings: Rc<RefCell<Vec<HeadingEntry>>>,
    recorded: bool,
}

#[cfg(feature = "bookmarks")]
impl<E: Element> HeadingMarker<E> {
    /// Wraps `inner`; `pages` holds the number of the page currently being rendered.
    pub fn new(
        inner: E,
        title: impl Into<String>,
        level: u8,
        pages: Rc<Cell<usize>>,
        headings: Rc<RefCell<Vec<HeadingEntry>>>,
    ) -> Self {
        Self {
            inner,
            title: title.into(),
            level,
            pages,
            headings,
            recorded: false,
        }
    }
}

#[cfg(feature = "bookmarks")]
impl<E: Element> Element for HeadingMarker<E> {
    fn render(
        &mut self,
        context: &genpdf::Context,
        area: render::Area<'_>,
        style: Style,
    ) -> Result<RenderResult, Error> {
        let result = self.inner.render(context, area, style)?;
        if !self.recorded && result.size.height > Mm::default() {
            self.recorded = true;
            self.headings.borrow_mut().push(HeadingEntry {
                title: self.title.clone(),
                level: self.level,
                page: self.pages.get(),
            });
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn alpha_is_composited_onto_white() {
        let mut rgba = RgbaImage::new(2, 1);
        rgba.put_pixel(0, 0, Rgba([0, 0, 0, 0]));
        rgba.put_pixel(1, 0, Rgba([255, 0, 0, 255]));
        let flattened = flatten_alpha(DynamicImage::ImageRgba8(rgba));
        assert_eq!(flattened.color(), ColorType::Rgb8);
        let rgb = flattened.to_rgb8();
        assert_eq!(rgb.get_pixel(0, 0).0, [255, 255, 255]);
        assert_eq!(rgb.get_pixel(1, 0).0, [255, 0, 0]);
    }

    #[test]
    fn rgb_images_are_kept() {
        let image = DynamicImage::ImageRgb8(image::RgbImage::new(3, 3));
        assert_eq!(flatten_alpha(image).color(), ColorType::Rgb8);
    }

    #[test]
    fn image_width_follows_css_pixels() {
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(image::RgbImage::new(96, 10))
            .write_to(&mut bytes, image::ImageOutputFormat::Png)
            .expect("encode png");
        let (_, width_mm) = image_from_bytes(&bytes).expect("decode png");
        assert!((width_mm - 25.4).abs() < 1e-9);
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        assert!(decode_image_from_bytes(b"definitely not an image").is_err());
    }

    #[test]
    fn mm_helpers_round_trip() {
        assert!((mm_to_f64(mm_from_f64(12.5)) - 12.5).abs() < 1e-9);
    }

    #[test]
    fn header_rows_are_split_from_the_body() {
        let table = TableBlock {
            rows: vec![
                TableRow {
                    header: true,
                    cells: vec![RichParagraph::default(); 2],
                },
                TableRow {
                    header: false,
                    cells: vec![RichParagraph::default(); 2],
                },
                TableRow {
                    header: true,
                    cells: vec![RichParagraph::default(); 1],
                },
            ],
        };
        let element = RepeatingHeaderTable::new(&table).expect("table");
        assert_eq!(element.header.len(), 1);
        assert_eq!(element.columns, 2);
    }
}

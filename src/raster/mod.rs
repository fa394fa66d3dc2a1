//! Rasterization of a parsed document into a single page image.
//!
//! The PNG output of a test case is a preview of the first page. Blocks are laid out top to bottom
//! on an A4 sized canvas with the same margins the PDF builder uses. Text is painted from the
//! glyph outlines of the bundled font family, so the preview wraps lines close to the PDF.
//! Everything after the first page break, or after the first block that no longer fits, is
//! dropped.

mod text;

use std::path::Path;
use std::sync::Arc;

use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageFormat, RgbaImage};
use log::{debug, warn};
use resvg::tiny_skia::{
    self as skia, Color, ColorU8, LineCap, Paint, PathBuilder, Pixmap, PixmapPaint, Rect, Transform,
};

use crate::bidi::TextDirection;
use crate::css::color_to_rgb;
use crate::drawing::{paint_object, Graphics, ObjectDrawerFactory, Point, Stroke};
use crate::error::{Error, Result};
use crate::fonts;
use crate::html::{self, ParseOptions};
use crate::model::{
    heading_font_size, mm_to_px, px_to_mm, Block, CustomObject, Document, FieldKind, FormField,
    HorizontalAlignment, ImageBlock, ListBlock, RichParagraph, SvgBlock, TableBlock,
    A4_HEIGHT_MM, A4_WIDTH_MM, BODY_FONT_SIZE, MM_PER_PX, PAGE_MARGIN_MM,
};
use crate::richtext::Span;
use crate::svg::{pixmap_to_rgba, SvgDrawer};

use self::text::{FontKey, GlyphFonts};

const LINE_HEIGHT: f32 = 1.2;
const PT_TO_MM: f64 = 25.4 / 72.0;
const CELL_PADDING_MM: f64 = 1.0;
const LIST_INDENT_MM: f64 = 8.0;
const FIELD_PADDING_MM: f64 = 1.5;
const FIELD_MIN_WIDTH_MM: f64 = 60.0;
const TEXTAREA_LINES: f32 = 3.0;
const RULE_HEIGHT_MM: f64 = 3.0;
const CAPTION_SPACING_MM: f64 = 2.0;
const BLACK: (u8, u8, u8) = (0, 0, 0);

/// Pixel layout of a rendered page.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ImageType {
    /// 8-bit RGB without alpha.
    #[default]
    Rgb8,
    /// 8-bit RGB with straight alpha.
    Rgba8,
    /// 8-bit greyscale.
    Luma8,
}

impl ImageType {
    fn convert(self, image: RgbaImage) -> DynamicImage {
        let image = DynamicImage::ImageRgba8(image);
        match self {
            Self::Rgb8 => DynamicImage::ImageRgb8(image.to_rgb8()),
            Self::Rgba8 => image,
            Self::Luma8 => DynamicImage::ImageLuma8(image.to_luma8()),
        }
    }
}

/// Builder for [`ImageRenderer`].
#[derive(Default)]
pub struct ImageRendererBuilder {
    svg_drawer: Option<Arc<dyn SvgDrawer>>,
    drawers: Option<Arc<dyn ObjectDrawerFactory>>,
    html: Option<(String, String)>,
    direction: TextDirection,
}

impl ImageRendererBuilder {
    /// Creates a builder without any input.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rasterizes inline `<svg>` elements with `drawer`.
    pub fn use_svg_drawer(mut self, drawer: Arc<dyn SvgDrawer>) -> Self {
        self.svg_drawer = Some(drawer);
        self
    }

    /// Paints `<object>` elements with the drawers `factory` provides.
    pub fn use_object_drawer_factory(mut self, factory: Arc<dyn ObjectDrawerFactory>) -> Self {
        self.drawers = Some(factory);
        self
    }

    /// Sets the document and the URI relative references are resolved against.
    pub fn with_html_content(mut self, html: impl Into<String>, base_uri: impl Into<String>) -> Self {
        self.html = Some((html.into(), base_uri.into()));
        self
    }

    /// Base direction of paragraphs without a `dir` attribute.
    pub fn default_text_direction(mut self, direction: TextDirection) -> Self {
        self.direction = direction;
        self
    }

    /// Parses the document.
    ///
    /// Problems with the content itself are logged, not returned.
    pub fn build(self) -> Result<ImageRenderer> {
        let (html, base_uri) = self.html.ok_or(Error::MissingInput("HTML content"))?;
        let options = ParseOptions::new(base_uri).with_default_direction(self.direction);
        Ok(ImageRenderer {
            document: html::parse(&html, &options),
            svg_drawer: self.svg_drawer,
            drawers: self.drawers,
        })
    }
}

/// Paints the first page of a parsed document.
pub struct ImageRenderer {
    document: Document,
    svg_drawer: Option<Arc<dyn SvgDrawer>>,
    drawers: Option<Arc<dyn ObjectDrawerFactory>>,
}

impl ImageRenderer {
    /// The parsed document.
    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Renders the first page `width` pixels wide; the height follows the A4 aspect ratio.
    pub fn render_to_image(&self, width: u32, image_type: ImageType) -> Result<DynamicImage> {
        if width == 0 {
            return Err(Error::Raster("image width must be positive".into()));
        }
        let font_bytes =
            fonts::default_font_bytes().map_err(|err| Error::Raster(err.to_string()))?;
        let glyphs = GlyphFonts::parse(&font_bytes).map_err(Error::Raster)?;

        let height = (f64::from(width) * A4_HEIGHT_MM / A4_WIDTH_MM).round() as u32;
        let mut pixmap = Pixmap::new(width, height)
            .ok_or_else(|| Error::Raster(format!("cannot allocate a {width}x{height} page")))?;
        pixmap.fill(Color::WHITE);

        let mut painter = Painter {
            pixmap,
            glyphs: &glyphs,
            scale: (f64::from(width) / A4_WIDTH_MM) as f32,
            cursor: 0.0,
            svg_drawer: self.svg_drawer.as_deref(),
            drawers: self.drawers.as_deref(),
        };
        painter.cursor = painter.mm(PAGE_MARGIN_MM);

        let blocks = self.document.blocks();
        let painted = blocks.iter().take_while(|block| painter.block(block)).count();
        debug!("Rasterized {} of {} blocks on the first page", painted, blocks.len());

        Ok(image_type.convert(pixmap_to_rgba(&painter.pixmap)))
    }
}

/// Writes `image` as a PNG file.
pub fn write_png(image: &DynamicImage, path: &Path) -> Result<()> {
    image.save_with_format(path, ImageFormat::Png)?;
    Ok(())
}

struct Piece {
    text: String,
    key: FontKey,
    size: f32,
    color: (u8, u8, u8),
    underline: bool,
    ink: f32,
}

struct TextLine {
    pieces: Vec<Piece>,
    advance: f32,
    width: f32,
    height: f32,
    ascent: f32,
}

impl TextLine {
    fn new(height: f32) -> Self {
        Self {
            pieces: Vec::new(),
            advance: 0.0,
            width: 0.0,
            height,
            ascent: 0.0,
        }
    }
}

fn total_height(lines: &[TextLine]) -> f32 {
    lines.iter().map(|line| line.height).sum()
}

fn align_offset(alignment: HorizontalAlignment, available: f32, width: f32) -> f32 {
    match alignment {
        HorizontalAlignment::Left | HorizontalAlignment::Justified => 0.0,
        HorizontalAlignment::Center => ((available - width) / 2.0).max(0.0),
        HorizontalAlignment::Right => (available - width).max(0.0),
    }
}

fn paint(color: (u8, u8, u8)) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color_rgba8(color.0, color.1, color.2, 255);
    paint.anti_alias = true;
    paint
}

fn rgba_to_pixmap(image: &RgbaImage) -> Option<Pixmap> {
    let mut pixmap = Pixmap::new(image.width(), image.height())?;
    for (target, source) in pixmap.pixels_mut().iter_mut().zip(image.pixels()) {
        let [r, g, b, a] = source.0;
        *target = ColorU8::from_rgba(r, g, b, a).premultiply();
    }
    Some(pixmap)
}

/// [`Graphics`] over a region of the page pixmap.
struct PixmapGraphics<'p> {
    pixmap: &'p mut Pixmap,
    origin: (f32, f32),
    /// Device pixels per CSS pixel.
    scale: f32,
}

impl PixmapGraphics<'_> {
    fn map(&self, point: Point) -> (f32, f32) {
        (
            self.origin.0 + point.x as f32 * self.scale,
            self.origin.1 + point.y as f32 * self.scale,
        )
    }
}

impl Graphics for PixmapGraphics<'_> {
    fn draw_line(&mut self, from: Point, to: Point, stroke: Stroke) {
        let (x0, y0) = self.map(from);
        let (x1, y1) = self.map(to);
        let mut builder = PathBuilder::new();
        builder.move_to(x0, y0);
        builder.line_to(x1, y1);
        let Some(path) = builder.finish() else {
            return;
        };
        let line = skia::Stroke {
            width: (stroke.width as f32 * self.scale).max(0.5),
            line_cap: LineCap::Round,
            ..skia::Stroke::default()
        };
        self.pixmap.stroke_path(
            &path,
            &paint(color_to_rgb(stroke.color)),
            &line,
            Transform::identity(),
            None,
        );
    }
}

struct Painter<'a> {
    pixmap: Pixmap,
    glyphs: &'a GlyphFonts<'a>,
    /// Device pixels per millimetre.
    scale: f32,
    cursor: f32,
    svg_drawer: Option<&'a dyn SvgDrawer>,
    drawers: Option<&'a dyn ObjectDrawerFactory>,
}

impl Painter<'_> {
    fn mm(&self, value: f64) -> f32 {
        value as f32 * self.scale
    }

    fn font_px(&self, points: u8) -> f32 {
        self.mm(f64::from(points) * PT_TO_MM)
    }

    fn left(&self) -> f32 {
        self.mm(PAGE_MARGIN_MM)
    }

    fn content_width(&self) -> f32 {
        self.mm(A4_WIDTH_MM - 2.0 * PAGE_MARGIN_MM)
    }

    fn bottom(&self) -> f32 {
        self.mm(A4_HEIGHT_MM - PAGE_MARGIN_MM)
    }

    fn fits(&self, height: f32) -> bool {
        self.cursor + height <= self.bottom()
    }

    fn fill_rect(&mut self, x: f32, y: f32, width: f32, height: f32, color: (u8, u8, u8)) {
        if let Some(rect) = Rect::from_xywh(x, y, width, height) {
            self.pixmap
                .fill_rect(rect, &paint(color), Transform::identity(), None);
        }
    }

    fn stroke_rect(&mut self, x: f32, y: f32, width: f32, height: f32) {
        let Some(rect) = Rect::from_xywh(x, y, width, height) else {
            return;
        };
        let path = PathBuilder::from_rect(rect);
        let line = skia::Stroke {
            width: self.mm(0.2).max(1.0),
            ..skia::Stroke::default()
        };
        self.pixmap
            .stroke_path(&path, &paint(BLACK), &line, Transform::identity(), None);
    }

    fn layout(&self, spans: &[Span], font_size: u8, max_width: f32) -> Vec<TextLine> {
        let size = self.font_px(font_size);
        let line_height = size * LINE_HEIGHT;
        let mut lines = Vec::new();
        let mut line = TextLine::new(line_height);

        for span in spans {
            let key = FontKey {
                bold: span.is_bold(),
                italic: span.is_italic(),
            };
            let color = span.color().map(color_to_rgb).unwrap_or(BLACK);
            for word in span.text().split_inclusive(' ') {
                let trimmed = word.trim_end_matches(' ');
                if line.pieces.is_empty() && trimmed.is_empty() {
                    continue;
                }
                let ink = self.glyphs.measure(trimmed, key, size);
                if !line.pieces.is_empty() && line.advance + ink > max_width {
                    lines.push(std::mem::replace(&mut line, TextLine::new(line_height)));
                    if trimmed.is_empty() {
                        continue;
                    }
                }
                line.ascent = line.ascent.max(self.glyphs.ascent(key, size));
                line.width = line.advance + ink;
                line.advance += self.glyphs.measure(word, key, size);
                line.pieces.push(Piece {
                    text: word.to_owned(),
                    key,
                    size,
                    color,
                    underline: span.is_underlined(),
                    ink,
                });
            }
        }
        if !line.pieces.is_empty() {
            lines.push(line);
        }
        lines
    }

    fn paint_line(&mut self, line: &TextLine, x: f32, top: f32, width: f32, alignment: HorizontalAlignment) {
        let mut pen = x + align_offset(alignment, width, line.width);
        let baseline = top + line.ascent + (line.height - line.ascent) * 0.2;
        for piece in &line.pieces {
            let advance = self.glyphs.draw(
                &mut self.pixmap,
                &piece.text,
                piece.key,
                piece.size,
                (pen, baseline),
                piece.color,
            );
            if piece.underline {
                let thickness = (piece.size * 0.06).max(1.0);
                self.fill_rect(pen, baseline + piece.size * 0.1, piece.ink, thickness, piece.color);
            }
            pen += advance;
        }
    }

    /// Paints wrapped lines at the cursor; false once a line no longer fits.
    fn paint_flow(&mut self, lines: &[TextLine], x: f32, width: f32, alignment: HorizontalAlignment) -> bool {
        for line in lines {
            if !self.fits(line.height) {
                return false;
            }
            self.paint_line(line, x, self.cursor, width, alignment);
            self.cursor += line.height;
        }
        true
    }

    fn block(&mut self, block: &Block) -> bool {
        match block {
            Block::Heading { level, text } => {
                let size = text.font_size().unwrap_or_else(|| heading_font_size(*level));
                self.paragraph(text, size)
            }
            Block::Paragraph(paragraph) => {
                self.paragraph(paragraph, paragraph.font_size().unwrap_or(BODY_FONT_SIZE))
            }
            Block::List(list) => self.list(list),
            Block::Table(table) => self.table(table),
            Block::Image(image) => self.image(image),
            Block::Svg(svg) => self.svg(svg),
            Block::Object(object) => self.object(object),
            Block::Field(field) => self.field(field),
            Block::Rule => self.rule(),
            Block::PageBreak => false,
            Block::MinHeightBreak(min_height) => self.fits(self.mm(*min_height)),
        }
    }

    fn paragraph(&mut self, paragraph: &RichParagraph, font_size: u8) -> bool {
        let (x, width) = (self.left(), self.content_width());
        let lines = self.layout(paragraph.spans(), font_size, width);
        if let Some(background) = paragraph.background() {
            let height = total_height(&lines).min(self.bottom() - self.cursor);
            self.fill_rect(x, self.cursor, width, height, color_to_rgb(background));
        }
        if !self.paint_flow(&lines, x, width, paragraph.alignment()) {
            return false;
        }
        self.cursor += self.font_px(font_size) * LINE_HEIGHT * 0.5;
        true
    }

    fn list(&mut self, list: &ListBlock) -> bool {
        let indent = self.mm(LIST_INDENT_MM);
        let (x, width) = (self.left() + indent, self.content_width() - indent);
        let size = self.font_px(BODY_FONT_SIZE);

        for (index, item) in list.items.iter().enumerate() {
            let lines = self.layout(item.spans(), item.font_size().unwrap_or(BODY_FONT_SIZE), width);
            let Some(first) = lines.first() else {
                continue;
            };
            if !self.fits(first.height) {
                return false;
            }
            let marker = if list.ordered {
                format!("{}.", index + 1)
            } else {
                "\u{2022}".to_owned()
            };
            let origin = (
                self.left(),
                self.cursor + first.ascent + (first.height - first.ascent) * 0.2,
            );
            self.glyphs
                .draw(&mut self.pixmap, &marker, FontKey::default(), size, origin, BLACK);
            if !self.paint_flow(&lines, x, width, item.alignment()) {
                return false;
            }
        }
        self.cursor += size * LINE_HEIGHT * 0.5;
        true
    }

    fn table(&mut self, table: &TableBlock) -> bool {
        let columns = table.column_count();
        if columns == 0 {
            return true;
        }
        let padding = self.mm(CELL_PADDING_MM);
        let column_width = self.content_width() / columns as f32;

        for row in &table.rows {
            let cells: Vec<(Vec<TextLine>, HorizontalAlignment)> = row
                .cells
                .iter()
                .map(|cell| {
                    let size = cell.font_size().unwrap_or(BODY_FONT_SIZE);
                    (self.layout(cell.spans(), size, column_width - 2.0 * padding), cell.alignment())
                })
                .collect();
            let row_height = cells
                .iter()
                .map(|(lines, _)| total_height(lines))
                .fold(self.font_px(BODY_FONT_SIZE) * LINE_HEIGHT, f32::max)
                + 2.0 * padding;
            if !self.fits(row_height) {
                return false;
            }

            for column in 0..columns {
                let x = self.left() + column as f32 * column_width;
                if let Some(background) = row.cells.get(column).and_then(RichParagraph::background) {
                    self.fill_rect(x, self.cursor, column_width, row_height, color_to_rgb(background));
                }
                if let Some((lines, alignment)) = cells.get(column) {
                    let mut top = self.cursor + padding;
                    for line in lines {
                        self.paint_line(line, x + padding, top, column_width - 2.0 * padding, *alignment);
                        top += line.height;
                    }
                }
                self.stroke_rect(x, self.cursor, column_width, row_height);
            }
            self.cursor += row_height;
        }
        self.cursor += self.mm(CAPTION_SPACING_MM);
        true
    }

    fn image(&mut self, block: &ImageBlock) -> bool {
        let decoded = match image::load_from_memory(block.bytes()) {
            Ok(decoded) => decoded,
            Err(err) => {
                warn!("Skipping image that cannot be decoded: {}", err);
                return true;
            }
        };
        let rgba = decoded.to_rgba8();
        let natural_mm = px_to_mm(f64::from(rgba.width()));
        let width = self
            .mm(block.width_mm().unwrap_or(natural_mm))
            .min(self.content_width())
            .max(1.0);
        let height = (width * rgba.height() as f32 / rgba.width().max(1) as f32).max(1.0);
        if !self.fits(height) {
            return false;
        }

        let resized = imageops::resize(&rgba, width.round() as u32, height.round() as u32, FilterType::Triangle);
        let x = self.left() + align_offset(block.alignment(), self.content_width(), width);
        let y = self.cursor.round() as i32;
        if let Some(pixmap) = rgba_to_pixmap(&resized) {
            self.pixmap.draw_pixmap(
                x.round() as i32,
                y,
                pixmap.as_ref(),
                &PixmapPaint::default(),
                Transform::identity(),
                None,
            );
        }
        self.cursor += height;

        if let Some(caption) = block.caption() {
            self.cursor += self.mm(CAPTION_SPACING_MM);
            return self.paragraph(caption, caption.font_size().unwrap_or(BODY_FONT_SIZE));
        }
        true
    }

    fn svg(&mut self, block: &SvgBlock) -> bool {
        let width = self.mm(block.width_mm).min(self.content_width());
        let height = self.mm(block.height_mm);
        if !self.fits(height) {
            return false;
        }
        let (x, y) = (self.left().round() as i32, self.cursor.round() as i32);
        if let Some(drawer) = self.svg_drawer {
            match drawer.render(&block.source, width.round() as u32, height.round() as u32) {
                Ok(rendered) => self.pixmap.draw_pixmap(
                    x,
                    y,
                    rendered.as_ref(),
                    &PixmapPaint::default(),
                    Transform::identity(),
                    None,
                ),
                Err(err) => warn!("Leaving inline SVG empty: {}", err),
            }
        } else {
            warn!("No SVG drawer configured; leaving inline SVG empty");
        }
        self.cursor += height;
        true
    }

    fn object(&mut self, object: &CustomObject) -> bool {
        let height = self.mm(object.height_mm());
        if !self.fits(height) {
            return false;
        }
        let mut graphics = PixmapGraphics {
            origin: (self.left(), self.cursor),
            scale: self.scale * MM_PER_PX as f32,
            pixmap: &mut self.pixmap,
        };
        paint_object(
            self.drawers,
            object,
            mm_to_px(object.width_mm()),
            mm_to_px(object.height_mm()),
            &mut graphics,
        );
        self.cursor += height;
        true
    }

    fn field(&mut self, field: &FormField) -> bool {
        let padding = self.mm(FIELD_PADDING_MM);
        let size = self.font_px(BODY_FONT_SIZE);
        let label = field.display_text();
        let lines = self.layout(&[Span::new(label)], BODY_FONT_SIZE, self.content_width() - 2.0 * padding);
        let text_height = match field.kind {
            FieldKind::TextArea => (size * LINE_HEIGHT * TEXTAREA_LINES).max(total_height(&lines)),
            _ => lines.first().map_or(size * LINE_HEIGHT, |line| line.height),
        };
        let text_width = lines.iter().map(|line| line.width).fold(0.0, f32::max);
        let width = (text_width + 2.0 * padding)
            .max(self.mm(FIELD_MIN_WIDTH_MM))
            .min(self.content_width());
        let height = text_height + 2.0 * padding;
        if !self.fits(height) {
            return false;
        }

        let (x, top) = (self.left(), self.cursor);
        if field.kind == FieldKind::Button {
            self.fill_rect(x, top, width, height, (221, 221, 221));
        }
        self.stroke_rect(x, top, width, height);
        let mut line_top = top + padding;
        for line in &lines {
            if line_top + line.height > top + height {
                break;
            }
            self.paint_line(line, x + padding, line_top, width - 2.0 * padding, HorizontalAlignment::Left);
            line_top += line.height;
        }
        self.cursor += height + self.mm(CELL_PADDING_MM);
        true
    }

    fn rule(&mut self) -> bool {
        let height = self.mm(RULE_HEIGHT_MM);
        if !self.fits(height) {
            return false;
        }
        let thickness = self.mm(0.3).max(1.0);
        let (x, width) = (self.left(), self.content_width());
        self.fill_rect(x, self.cursor + height / 2.0, width, thickness, (128, 128, 128));
        self.cursor += height;
        true
    }
}

//! PDF renderer builder.
//!
//! [`PdfRendererBuilder`] collects the document, the drawing delegates and an output stream, then
//! [`run`](PdfRendererBuilder::run) parses the HTML, maps every block onto a `genpdf` element and
//! writes the rendered PDF.  Pages are A4 with [`PAGE_MARGIN_MM`] margins unless configured
//! otherwise.

use std::cell::Cell;
#[cfg(feature = "bookmarks")]
use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;
use std::sync::Arc;

use genpdf::elements::{Break, OrderedList, PageBreak, Paragraph, UnorderedList};
use genpdf::error::{Error as PdfError, ErrorKind};
use genpdf::style::Style;
use genpdf::{Alignment, Element, Margins, Mm, PageDecorator, PaperSize, Position, Size};
use log::{debug, warn};

use crate::bidi::{BidiPipeline, BidiReorderer, BidiSplitter, TextDirection};
#[cfg(feature = "bookmarks")]
use crate::bookmarks::{apply_heading_bookmarks, HeadingEntry};
use crate::drawing::ObjectDrawerFactory;
#[cfg(feature = "bookmarks")]
use crate::elements::HeadingMarker;
use crate::elements::{
    mm_from_f64, CaptionedImage, DrawnObject, FormFieldElement, HorizontalRule, MinHeightBreak,
    RepeatingHeaderTable, RichText, SvgElement,
};
use crate::error::{Error, Result};
use crate::fonts;
use crate::html::{self, ParseOptions};
use crate::model::{heading_font_size, Block, ImageBlock, ListBlock, BODY_FONT_SIZE, PAGE_MARGIN_MM};
#[cfg(feature = "bookmarks")]
use crate::richtext::plain_text;
use crate::svg::SvgDrawer;

const BLOCK_SPACING_LINES: f64 = 0.5;
const PAGE_NUMBER_FOOTER_MM: f64 = 10.0;
const PAGE_NUMBER_FONT_SIZE: u8 = 8;

/// Outcome of a successful [`PdfRendererBuilder::run`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderSummary {
    /// Number of pages in the document.
    pub pages: usize,
    /// Number of bytes written to the stream.
    pub bytes: usize,
}

/// Builder that renders an HTML document into a PDF stream.
#[derive(Default)]
pub struct PdfRendererBuilder<'w> {
    splitter: Option<Arc<dyn BidiSplitter>>,
    reorderer: Option<Arc<dyn BidiReorderer>>,
    direction: TextDirection,
    svg_drawer: Option<Arc<dyn SvgDrawer>>,
    drawers: Option<Arc<dyn ObjectDrawerFactory>>,
    html: Option<(String, String)>,
    stream: Option<Box<dyn Write + 'w>>,
    paper_size: Option<Size>,
    margins: Option<Margins>,
    page_numbers: bool,
    title: Option<String>,
    #[cfg(feature = "bookmarks")]
    bookmarks: bool,
}

impl<'w> PdfRendererBuilder<'w> {
    /// Creates a builder with no input and no output configured.
    pub fn new() -> Self {
        Self::default()
    }

    /// Splits paragraph text into directional runs.
    ///
    /// Text is only reordered when a reorderer is configured as well.
    pub fn use_unicode_bidi_splitter(mut self, splitter: Arc<dyn BidiSplitter>) -> Self {
        self.splitter = Some(splitter);
        self
    }

    /// Puts the runs produced by the splitter into visual order.
    pub fn use_unicode_bidi_reorderer(mut self, reorderer: Arc<dyn BidiReorderer>) -> Self {
        self.reorderer = Some(reorderer);
        self
    }

    /// Base direction of paragraphs without a `dir` attribute.
    pub fn default_text_direction(mut self, direction: TextDirection) -> Self {
        self.direction = direction;
        self
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

    /// Sets the stream the PDF is written to.
    pub fn to_stream(mut self, stream: impl Write + 'w) -> Self {
        self.stream = Some(Box::new(stream));
        self
    }

    /// Sets the paper size; A4 by default.
    pub fn with_paper_size(mut self, paper_size: impl Into<Size>) -> Self {
        self.paper_size = Some(paper_size.into());
        self
    }

    /// Sets the page margins.
    pub fn with_margins(mut self, margins: impl Into<Margins>) -> Self {
        self.margins = Some(margins.into());
        self
    }

    /// Prints "Page N" centred at the bottom of every page.
    pub fn with_page_numbers(mut self, enabled: bool) -> Self {
        self.page_numbers = enabled;
        self
    }

    /// Sets the document title, overriding the `<title>` element.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Adds an outline entry for every `h1` to `h3` heading.
    #[cfg(feature = "bookmarks")]
    pub fn with_bookmarks(mut self, enabled: bool) -> Self {
        self.bookmarks = enabled;
        self
    }

    /// Parses the document, renders it and writes the PDF to the configured stream.
    ///
    /// Content problems such as unloadable images are logged as warnings and do not fail the run.
    pub fn run(self) -> Result<RenderSummary> {
        let (html, base_uri) = self.html.ok_or(Error::MissingInput("HTML content"))?;
        let mut stream = self.stream.ok_or(Error::MissingInput("an output stream"))?;

        let bidi = match (self.splitter, self.reorderer) {
            (Some(splitter), Some(reorderer)) => Some(BidiPipeline::new(splitter, reorderer)),
            _ => None,
        };
        let options = ParseOptions::new(base_uri)
            .with_default_direction(self.direction)
            .with_bidi(bidi);
        let parsed = html::parse(&html, &options);
        debug!("Parsed {} blocks", parsed.blocks().len());

        let mut document = genpdf::Document::new(fonts::default_font_family()?);
        document.set_paper_size(self.paper_size.unwrap_or_else(|| PaperSize::A4.into()));
        document.set_font_size(BODY_FONT_SIZE);
        if let Some(title) = self.title.or_else(|| parsed.title().map(str::to_owned)) {
            document.set_title(title);
        }

        let pages = Rc::new(Cell::new(0));
        let footer = self.page_numbers.then(|| {
            FooterSpec::new(mm_from_f64(PAGE_NUMBER_FOOTER_MM), |page| {
                Paragraph::new(format!("Page {page}"))
                    .aligned(Alignment::Center)
                    .styled(Style::new().with_font_size(PAGE_NUMBER_FONT_SIZE))
            })
        });
        let margins = self
            .margins
            .unwrap_or_else(|| Margins::all(mm_from_f64(PAGE_MARGIN_MM)));
        document.set_page_decorator(ConfiguredPageDecorator::new(
            Some(margins),
            footer,
            Rc::clone(&pages),
        ));

        let mut sink = ElementSink {
            document: &mut document,
            svg_drawer: self.svg_drawer,
            drawers: self.drawers,
            #[cfg(feature = "bookmarks")]
            pages: Rc::clone(&pages),
            #[cfg(feature = "bookmarks")]
            headings: Rc::new(RefCell::new(Vec::new())),
        };
        for block in parsed.blocks() {
            sink.push(block)?;
        }
        #[cfg(feature = "bookmarks")]
        let headings = Rc::clone(&sink.headings);

        let mut bytes = Vec::new();
        document.render(&mut bytes)?;

        #[cfg(feature = "bookmarks")]
        if self.bookmarks {
            bytes = apply_heading_bookmarks(&bytes, &headings.borrow())?;
        }

        stream
            .write_all(&bytes)
            .and_then(|()| stream.flush())
            .map_err(|err| Error::io("Failed to write the PDF to the output stream", err))?;

        Ok(RenderSummary {
            pages: pages.get(),
            bytes: bytes.len(),
        })
    }
}

/// Pushes the `genpdf` element for each block onto a document.
struct ElementSink<'d> {
    document: &'d mut genpdf::Document,
    svg_drawer: Option<Arc<dyn SvgDrawer>>,
    drawers: Option<Arc<dyn ObjectDrawerFactory>>,
    #[cfg(feature = "bookmarks")]
    pages: Rc<Cell<usize>>,
    #[cfg(feature = "bookmarks")]
    headings: Rc<RefCell<Vec<HeadingEntry>>>,
}

impl ElementSink<'_> {
    fn spacing(&mut self) {
        self.document.push(Break::new(BLOCK_SPACING_LINES));
    }

    fn push(&mut self, block: &Block) -> Result<()> {
        match block {
            Block::Heading { level, text } => {
                let size = text.font_size().unwrap_or_else(|| heading_font_size(*level));
                let element = RichText::from_paragraph(text).with_font_size(size);
                #[cfg(feature = "bookmarks")]
                let element = HeadingMarker::new(
                    element,
                    plain_text(text.spans()),
                    *level,
                    Rc::clone(&self.pages),
                    Rc::clone(&self.headings),
                );
                self.document.push(element);
                self.spacing();
            }
            Block::Paragraph(paragraph) => {
                self.document.push(RichText::from_paragraph(paragraph));
                self.spacing();
            }
            Block::List(list) => {
                self.list(list);
                self.spacing();
            }
            Block::Table(table) => {
                self.document.push(RepeatingHeaderTable::new(table)?);
                self.spacing();
            }
            Block::Image(image) => {
                self.image(image);
                self.spacing();
            }
            Block::Svg(svg) => {
                let element = SvgElement::new(svg, self.svg_drawer.as_deref());
                self.document.push(element);
            }
            Block::Object(object) => {
                self.document
                    .push(DrawnObject::new(object.clone(), self.drawers.clone()));
            }
            Block::Field(field) => self.document.push(FormFieldElement::new(field.clone())),
            Block::Rule => self.document.push(HorizontalRule),
            Block::PageBreak => self.document.push(PageBreak::new()),
            Block::MinHeightBreak(min_height) => self.document.push(MinHeightBreak::new(*min_height)),
        }
        Ok(())
    }

    fn list(&mut self, list: &ListBlock) {
        if list.ordered {
            let mut element = OrderedList::new();
            for item in &list.items {
                element.push(RichText::from_paragraph(item));
            }
            self.document.push(element);
        } else {
            let mut element = UnorderedList::new();
            for item in &list.items {
                element.push(RichText::from_paragraph(item));
            }
            self.document.push(element);
        }
    }

    fn image(&mut self, block: &ImageBlock) {
        let caption = block.caption().map(RichText::from_paragraph);
        match CaptionedImage::from_bytes(block.bytes(), caption) {
            Ok(image) => self.document.push(
                image
                    .with_alignment(block.alignment().to_genpdf())
                    .with_width(block.width_mm().map(mm_from_f64)),
            ),
            Err(err) => warn!("Skipping image: {}", err),
        }
    }
}

type FooterFactory = dyn Fn(usize) -> Box<dyn Element>;

/// Definition of a footer rendered through the page decorator.
pub struct FooterSpec {
    height: Mm,
    factory: Box<FooterFactory>,
}

impl FooterSpec {
    /// Creates a footer of fixed `height` whose content is built per page number.
    pub fn new<F, E>(height: impl Into<Mm>, factory: F) -> Self
    where
        F: Fn(usize) -> E + 'static,
        E: Element + 'static,
    {
        Self {
            height: height.into(),
            factory: Box::new(move |page| Box::new(factory(page)) as Box<dyn Element>),
        }
    }
}

/// Applies margins, reserves the footer area and counts pages.
struct ConfiguredPageDecorator {
    page: usize,
    margins: Option<Margins>,
    footer: Option<FooterSpec>,
    pages: Rc<Cell<usize>>,
}

impl ConfiguredPageDecorator {
    fn new(margins: Option<Margins>, footer: Option<FooterSpec>, pages: Rc<Cell<usize>>) -> Self {
        Self {
            page: 0,
            margins,
            footer,
            pages,
        }
    }
}

impl PageDecorator for ConfiguredPageDecorator {
    fn decorate_page<'a>(
        &mut self,
        context: &genpdf::Context,
        mut area: genpdf::render::Area<'a>,
        style: Style,
    ) -> std::result::Result<genpdf::render::Area<'a>, PdfError> {
        self.page += 1;
        self.pages.set(self.page);

        if let Some(margins) = self.margins {
            area.add_margins(margins);
        }

        if let Some(footer) = &self.footer {
            let available = area.size().height;
            if footer.height > available {
                return Err(PdfError::new(
                    "Footer height exceeds available space",
                    ErrorKind::InvalidData,
                ));
            }

            let mut footer_area = area.clone();
            footer_area.add_offset(Position::new(0, available - footer.height));
            let mut element = (footer.factory)(self.page);
            let result = element.render(context, footer_area, style)?;
            if result.has_more {
                return Err(PdfError::new(
                    "Footer element does not fit into the reserved space",
                    ErrorKind::PageSizeExceeded,
                ));
            }

            area.set_height(available - footer.height);
        }

        Ok(area)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn running_without_html_fails() {
        let mut out = Vec::new();
        let err = PdfRendererBuilder::new().to_stream(&mut out).run().unwrap_err();
        assert!(matches!(err, Error::MissingInput("HTML content")));
    }

    #[test]
    fn running_without_a_stream_fails() {
        let err = PdfRendererBuilder::new()
            .with_html_content("<p>Hi</p>", "file:///")
            .run()
            .unwrap_err();
        assert!(matches!(err, Error::MissingInput("an output stream")));
    }

    #[test]
    fn renders_into_the_stream() {
        if !fonts::default_fonts_available() {
            eprintln!("skipping PDF builder test: bundled fonts are not available");
            return;
        }
        let mut out = Vec::new();
        let summary = PdfRendererBuilder::new()
            .with_html_content(
                "<h1>Title</h1><p>First page</p><p style=\"page-break-before: always\">Second</p>",
                "file:///",
            )
            .with_page_numbers(true)
            .to_stream(&mut out)
            .run()
            .expect("render");
        assert_eq!(summary.pages, 2);
        assert_eq!(summary.bytes, out.len());
        assert!(out.starts_with(b"%PDF"));
    }
}

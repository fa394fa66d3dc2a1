//! Conversion of an HTML fixture into the block [`Document`] model.
//!
//! The DOM produced by `scraper` is walked once.  Block-level elements become [`Block`]s, inline
//! content is gathered into [`Span`]s and flushed as a paragraph whenever a block boundary is
//! reached.  Problems a full renderer would report (unloadable images, invalid CSS values, objects
//! without a type) are logged with `warn!`.

use log::{debug, warn};
use scraper::{ElementRef, Html, Node, Selector};

use crate::bidi::{BidiPipeline, TextDirection};
use crate::css::{parse_declarations, parse_length_mm, ComputedStyle, Declaration, InheritedStyle, StyleSheet};
use crate::model::{
    heading_font_size, px_to_mm, Block, CustomObject, Document, FieldKind, FormField,
    HorizontalAlignment, ImageBlock, ListBlock, RichParagraph, SvgBlock, TableBlock, TableRow,
};
use crate::resources;
use crate::richtext::{collapse_whitespace, Span, TextStyle};

/// Default size of replaced content (`<object>`, `<svg>`) without explicit dimensions.
const DEFAULT_REPLACED_WIDTH_PX: f64 = 300.0;
const DEFAULT_REPLACED_HEIGHT_PX: f64 = 150.0;

/// Settings for [`parse`].
#[derive(Clone, Debug)]
pub struct ParseOptions {
    base_uri: String,
    default_direction: TextDirection,
    bidi: Option<BidiPipeline>,
}

impl ParseOptions {
    /// Options resolving relative references against `base_uri`.
    pub fn new(base_uri: impl Into<String>) -> Self {
        Self {
            base_uri: base_uri.into(),
            default_direction: TextDirection::Ltr,
            bidi: None,
        }
    }

    /// Sets the direction used when no `dir` attribute or `direction` property applies.
    pub fn with_default_direction(mut self, direction: TextDirection) -> Self {
        self.default_direction = direction;
        self
    }

    /// Enables conversion of text to visual order.
    pub fn with_bidi(mut self, bidi: impl Into<Option<BidiPipeline>>) -> Self {
        self.bidi = bidi.into();
        self
    }

    /// Base URI of the document.
    pub fn base_uri(&self) -> &str {
        &self.base_uri
    }

    /// Default base direction.
    pub fn default_direction(&self) -> TextDirection {
        self.default_direction
    }
}

/// Parses `html` into a [`Document`].
pub fn parse(html: &str, options: &ParseOptions) -> Document {
    let dom = Html::parse_document(html);
    for error in &dom.errors {
        debug!("HTML parse error: {}", error);
    }

    let mut sheet = StyleSheet::new();
    for style in select_all(&dom, "style") {
        sheet.add_source(&style.text().collect::<String>());
    }

    let mut converter = Converter {
        options,
        sheet,
        document: Document::new(),
        pending: Vec::new(),
        pending_context: None,
    };

    let title = select_all(&dom, "title")
        .next()
        .map(|title| title.text().collect::<String>().trim().to_owned())
        .filter(|title| !title.is_empty());
    converter.document.set_title(title);

    let root_style = InheritedStyle::root(options.default_direction);
    let root = BlockContext {
        inherited: root_style,
        background: None,
        heading: None,
    };
    match select_all(&dom, "body").next() {
        Some(body) => converter.walk_element(body, &root, &root.inherited),
        None => converter.walk_children(dom.root_element(), &root),
    }
    converter.flush();

    let mut document = converter.document;
    trim_trailing_breaks(&mut document);
    document
}

fn select_all<'a>(dom: &'a Html, selector: &str) -> impl Iterator<Item = ElementRef<'a>> + 'a {
    let selector = Selector::parse(selector).ok();
    let mut matches = Vec::new();
    if let Some(selector) = selector {
        matches.extend(dom.select(&selector));
    }
    matches.into_iter()
}

fn trim_trailing_breaks(document: &mut Document) {
    let mut blocks = document.blocks().to_vec();
    while matches!(blocks.last(), Some(Block::PageBreak) | Some(Block::MinHeightBreak(_))) {
        blocks.pop();
    }
    let mut trimmed = Document::new().with_title(document.title().map(str::to_owned));
    for block in blocks {
        trimmed = trimmed.with_block(block);
    }
    *document = trimmed;
}

/// Styling shared by the inline content of one block.
#[derive(Clone, Debug)]
struct BlockContext {
    inherited: InheritedStyle,
    background: Option<genpdf::style::Color>,
    heading: Option<u8>,
}

struct Converter<'o> {
    options: &'o ParseOptions,
    sheet: StyleSheet,
    document: Document,
    pending: Vec<Span>,
    pending_context: Option<BlockContext>,
}

fn heading_level(tag: &str) -> Option<u8> {
    match tag {
        "h1" => Some(1),
        "h2" => Some(2),
        "h3" => Some(3),
        "h4" => Some(4),
        "h5" => Some(5),
        "h6" => Some(6),
        _ => None,
    }
}

fn is_inline(tag: &str) -> bool {
    matches!(
        tag,
        "a" | "abbr"
            | "b"
            | "cite"
            | "code"
            | "em"
            | "font"
            | "i"
            | "ins"
            | "kbd"
            | "label"
            | "mark"
            | "q"
            | "s"
            | "samp"
            | "small"
            | "span"
            | "strong"
            | "sub"
            | "sup"
            | "tt"
            | "u"
            | "var"
    )
}

fn is_ignored(tag: &str) -> bool {
    matches!(
        tag,
        "head" | "script" | "style" | "title" | "meta" | "link" | "template" | "noscript"
    )
}

fn declaration(property: &str, value: &str) -> Declaration {
    Declaration {
        property: property.to_owned(),
        value: value.trim().to_owned(),
    }
}

fn span_for(text: &str, style: &InheritedStyle) -> Span {
    Span::styled(
        text,
        TextStyle {
            bold: style.bold,
            italic: style.italic,
            underline: style.underline,
            color: style.color,
        },
    )
}

impl<'o> Converter<'o> {
    /// Computes the style of `element` from tag defaults, presentational attributes, matching
    /// style sheet rules and the `style` attribute, in that order.
    fn compute_style(&self, element: ElementRef<'_>, parent: &InheritedStyle) -> ComputedStyle {
        let mut style = ComputedStyle::inherit(parent);
        let tag = element.value().name();

        match tag {
            "b" | "strong" | "th" => style.inherited.bold = true,
            "i" | "em" | "cite" | "var" => style.inherited.italic = true,
            "u" | "ins" | "a" => style.inherited.underline = true,
            "center" => style.inherited.align = HorizontalAlignment::Center,
            _ => {}
        }
        if let Some(level) = heading_level(tag) {
            style.inherited.bold = true;
            style.inherited.font_size = heading_font_size(level);
        }

        let attributes = element.value();
        if let Some(align) = attributes.attr("align") {
            style.apply(&declaration("text-align", align));
        }
        if let Some(dir) = attributes.attr("dir") {
            style.apply(&declaration("direction", dir));
        }
        if let Some(color) = attributes.attr("color").filter(|_| tag == "font") {
            style.apply(&declaration("color", color));
        }
        if let Some(color) = attributes.attr("bgcolor") {
            style.apply(&declaration("background-color", color));
        }

        for rule in self.sheet.matching(&element) {
            style.apply(rule);
        }
        if let Some(inline) = attributes.attr("style") {
            for declaration in parse_declarations(inline) {
                style.apply(&declaration);
            }
        }
        style
    }

    fn child_context(&self, style: &ComputedStyle, parent: &BlockContext) -> BlockContext {
        BlockContext {
            inherited: style.inherited.clone(),
            background: style.background_color.or(parent.background),
            heading: parent.heading,
        }
    }

    fn walk_children(&mut self, element: ElementRef<'_>, context: &BlockContext) {
        self.walk_inline(element, context, &context.inherited);
    }

    /// Text below `element` is styled with `inline`, while the paragraph it is collected into
    /// keeps the alignment, size, direction and background of `block`.
    fn walk_inline(&mut self, element: ElementRef<'_>, block: &BlockContext, inline: &InheritedStyle) {
        for child in element.children() {
            match child.value() {
                Node::Text(text) => {
                    if self.pending_context.is_none() {
                        if text.trim().is_empty() {
                            continue;
                        }
                        self.pending_context = Some(block.clone());
                    }
                    self.pending.push(span_for(text, inline));
                }
                Node::Element(_) => {
                    if let Some(child) = ElementRef::wrap(child) {
                        self.walk_element(child, block, inline);
                    }
                }
                _ => {}
            }
        }
    }

    fn walk_element(&mut self, element: ElementRef<'_>, parent: &BlockContext, inline: &InheritedStyle) {
        let tag = element.value().name();
        if is_ignored(tag) {
            return;
        }
        let style = self.compute_style(element, inline);
        if style.hidden {
            return;
        }
        if is_inline(tag) {
            self.walk_inline(element, parent, &style.inherited);
            return;
        }
        let context = self.child_context(&style, parent);

        if tag == "br" {
            self.flush();
            return;
        }

        self.flush();
        if style.page_break_before {
            self.document.push(Block::PageBreak);
        }
        if let Some(min_height) = style.min_height_break_mm {
            self.document.push(Block::MinHeightBreak(min_height));
        }
        if let Some(reference) = &style.background_image {
            if let Some(bytes) = self.load_image(reference, "background image") {
                self.document.push(Block::Image(
                    ImageBlock::new(bytes).with_width_mm(style.width_mm),
                ));
            }
        }

        match tag {
            "p" | "div" | "section" | "article" | "body" | "main" | "header" | "footer"
            | "nav" | "aside" | "blockquote" | "address" | "center" | "form" | "fieldset"
            | "dl" | "dt" | "dd" | "li" | "legend" | "html" => {
                self.walk_children(element, &context);
            }
            "caption" | "figcaption" => self.walk_children(element, &context),
            _ if heading_level(tag).is_some() => {
                let context = BlockContext {
                    heading: heading_level(tag),
                    ..context
                };
                self.walk_children(element, &context);
            }
            "ul" | "ol" => self.list(element, &context, tag == "ol"),
            "table" => self.table(element, &context),
            "img" => self.image(element, &style),
            "figure" => self.figure(element, &context),
            "svg" => self.svg(element, &style),
            "object" | "embed" => self.object(element, &style),
            "input" | "textarea" | "select" | "button" => self.field(element, tag),
            "hr" => self.document.push(Block::Rule),
            "pre" => self.preformatted(element, &context),
            other => {
                debug!("Treating <{}> as a generic block", other);
                self.walk_children(element, &context);
            }
        }

        self.flush();
        if style.page_break_after {
            self.document.push(Block::PageBreak);
        }
    }

    /// Turns raw spans into display spans: collapsed whitespace, visual order.
    fn finish_spans(&self, spans: Vec<Span>, direction: TextDirection) -> Vec<Span> {
        let spans = collapse_whitespace(spans);
        match &self.options.bidi {
            Some(bidi) => bidi.visual_spans(&spans, direction),
            None => spans,
        }
    }

    fn paragraph_from(&self, spans: Vec<Span>, context: &BlockContext) -> RichParagraph {
        let font_size = context.inherited.font_size;
        let mut paragraph = RichParagraph::new(self.finish_spans(spans, context.inherited.direction))
            .with_alignment(context.inherited.align)
            .with_direction(context.inherited.direction)
            .with_background(context.background);
        if font_size != crate::model::BODY_FONT_SIZE {
            paragraph = paragraph.with_font_size(font_size);
        }
        paragraph
    }

    fn flush(&mut self) {
        let spans = std::mem::take(&mut self.pending);
        let Some(context) = self.pending_context.take() else {
            return;
        };
        let paragraph = self.paragraph_from(spans, &context);
        if paragraph.is_empty() {
            return;
        }
        match context.heading {
            Some(level) => self.document.push(Block::Heading {
                level,
                text: paragraph,
            }),
            None => self.document.push(Block::Paragraph(paragraph)),
        }
    }

    /// Collects the text below `element` as inline spans, treating nested blocks as inline.
    fn inline_spans(&self, element: ElementRef<'_>, style: &InheritedStyle, out: &mut Vec<Span>) {
        for child in element.children() {
            match child.value() {
                Node::Text(text) => out.push(span_for(text, style)),
                Node::Element(_) => {
                    let Some(child) = ElementRef::wrap(child) else {
                        continue;
                    };
                    let tag = child.value().name();
                    if is_ignored(tag) {
                        continue;
                    }
                    let computed = self.compute_style(child, style);
                    if computed.hidden {
                        continue;
                    }
                    if !is_inline(tag) {
                        out.push(Span::new(" "));
                    }
                    self.inline_spans(child, &computed.inherited, out);
                    if !is_inline(tag) {
                        out.push(Span::new(" "));
                    }
                }
                _ => {}
            }
        }
    }

    fn inline_paragraph(&self, element: ElementRef<'_>, context: &BlockContext) -> RichParagraph {
        let style = self.compute_style(element, &context.inherited);
        let mut spans = Vec::new();
        self.inline_spans(element, &style.inherited, &mut spans);
        let context = BlockContext {
            inherited: style.inherited.clone(),
            background: style.background_color.or(context.background),
            heading: None,
        };
        self.paragraph_from(spans, &context)
    }

    fn list(&mut self, element: ElementRef<'_>, context: &BlockContext, ordered: bool) {
        let items = element
            .children()
            .filter_map(ElementRef::wrap)
            .filter(|child| child.value().name() == "li")
            .map(|item| self.inline_paragraph(item, context))
            .filter(|item| !item.is_empty())
            .collect::<Vec<_>>();
        if !items.is_empty() {
            self.document.push(Block::List(ListBlock { ordered, items }));
        }
    }

    fn table(&mut self, element: ElementRef<'_>, context: &BlockContext) {
        let mut table = TableBlock::default();
        let mut caption = None;
        self.table_rows(element, context, false, &mut table, &mut caption);

        if let Some(caption) = caption.filter(|caption: &RichParagraph| !caption.is_empty()) {
            self.document.push(Block::Paragraph(caption));
        }
        if table.column_count() > 0 {
            self.document.push(Block::Table(table));
        }
    }

    fn table_rows(
        &self,
        element: ElementRef<'_>,
        context: &BlockContext,
        in_head: bool,
        table: &mut TableBlock,
        caption: &mut Option<RichParagraph>,
    ) {
        for child in element.children().filter_map(ElementRef::wrap) {
            match child.value().name() {
                "caption" => *caption = Some(self.inline_paragraph(child, context)),
                "thead" => self.table_rows(child, context, true, table, caption),
                "tbody" | "tfoot" => self.table_rows(child, context, false, table, caption),
                "tr" => {
                    let row_style = self.compute_style(child, &context.inherited);
                    let row_context = self.child_context(&row_style, context);
                    let cells: Vec<ElementRef<'_>> = child
                        .children()
                        .filter_map(ElementRef::wrap)
                        .filter(|cell| matches!(cell.value().name(), "td" | "th"))
                        .collect();
                    let all_th = !cells.is_empty()
                        && cells.iter().all(|cell| cell.value().name() == "th");
                    let mut paragraphs = Vec::with_capacity(cells.len());
                    for cell in cells {
                        let span = cell
                            .value()
                            .attr("colspan")
                            .and_then(|value| value.trim().parse::<usize>().ok())
                            .unwrap_or(1)
                            .max(1);
                        paragraphs.push(self.inline_paragraph(cell, &row_context));
                        for _ in 1..span {
                            paragraphs.push(RichParagraph::default());
                        }
                    }
                    table.rows.push(TableRow {
                        header: in_head || all_th,
                        cells: paragraphs,
                    });
                }
                other => debug!("Ignoring <{}> inside a table", other),
            }
        }
    }

    fn load_image(&self, reference: &str, what: &str) -> Option<Vec<u8>> {
        match resources::fetch(&self.options.base_uri, reference) {
            Ok(bytes) => match image::guess_format(&bytes) {
                Ok(_) => Some(bytes),
                Err(err) => {
                    warn!("Unsupported {} data at '{}': {}", what, reference, err);
                    None
                }
            },
            Err(err) => {
                warn!("Unable to load {} '{}': {}", what, reference, err);
                None
            }
        }
    }

    fn image_block(&self, element: ElementRef<'_>, style: &ComputedStyle) -> Option<ImageBlock> {
        let Some(src) = element.value().attr("src") else {
            warn!("Ignoring <img> without a src attribute");
            return None;
        };
        let bytes = self.load_image(src, "image")?;
        let width = style.width_mm.or_else(|| {
            element
                .value()
                .attr("width")
                .and_then(|width| parse_length_mm(width, f64::from(style.inherited.font_size)))
        });
        Some(
            ImageBlock::new(bytes)
                .with_alignment(style.inherited.align)
                .with_width_mm(width),
        )
    }

    fn image(&mut self, element: ElementRef<'_>, style: &ComputedStyle) {
        if let Some(block) = self.image_block(element, style) {
            self.document.push(Block::Image(block));
        }
    }

    fn figure(&mut self, element: ElementRef<'_>, context: &BlockContext) {
        let mut image = None;
        let mut caption = None;
        for child in element.descendants().filter_map(ElementRef::wrap) {
            match child.value().name() {
                "img" if image.is_none() => {
                    let style = self.compute_style(child, &context.inherited);
                    image = self.image_block(child, &style);
                }
                "figcaption" if caption.is_none() => {
                    caption = Some(self.inline_paragraph(child, context));
                }
                _ => {}
            }
        }
        match image {
            Some(image) => self
                .document
                .push(Block::Image(image.with_caption(caption.filter(|c| !c.is_empty())))),
            None => {
                if let Some(caption) = caption.filter(|c| !c.is_empty()) {
                    self.document.push(Block::Paragraph(caption));
                }
            }
        }
    }

    fn replaced_size(&self, element: ElementRef<'_>, style: &ComputedStyle) -> (f64, f64) {
        let font_size = f64::from(style.inherited.font_size);
        let attribute = |name: &str| {
            element
                .value()
                .attr(name)
                .and_then(|value| parse_length_mm(value, font_size))
        };
        let width = style
            .width_mm
            .or_else(|| attribute("width"))
            .unwrap_or_else(|| px_to_mm(DEFAULT_REPLACED_WIDTH_PX));
        let height = style
            .height_mm
            .or_else(|| attribute("height"))
            .unwrap_or_else(|| px_to_mm(DEFAULT_REPLACED_HEIGHT_PX));
        (width, height)
    }

    fn svg(&mut self, element: ElementRef<'_>, style: &ComputedStyle) {
        let (width_mm, height_mm) = self.replaced_size(element, style);
        self.document.push(Block::Svg(SvgBlock {
            source: element.html(),
            width_mm,
            height_mm,
        }));
    }

    fn object(&mut self, element: ElementRef<'_>, style: &ComputedStyle) {
        let Some(content_type) = element.value().attr("type").filter(|t| !t.trim().is_empty())
        else {
            warn!("Ignoring <{}> without a type attribute", element.value().name());
            return;
        };
        let (width_mm, height_mm) = self.replaced_size(element, style);
        let object = element
            .value()
            .attrs()
            .fold(
                CustomObject::new(content_type.trim(), width_mm, height_mm),
                |object, (name, value)| object.with_attribute(name, value),
            );
        self.document.push(Block::Object(object));
    }

    fn field(&mut self, element: ElementRef<'_>, tag: &str) {
        let attributes = element.value();
        let value = attributes.attr("value").unwrap_or_default().to_owned();
        let checked = attributes.attr("checked").is_some();
        let text = || element.text().collect::<String>().trim().to_owned();

        let field = match tag {
            "textarea" => FormField {
                kind: FieldKind::TextArea,
                value: text(),
            },
            "button" => FormField {
                kind: FieldKind::Button,
                value: text(),
            },
            "select" => {
                let options: Vec<ElementRef<'_>> = element
                    .descendants()
                    .filter_map(ElementRef::wrap)
                    .filter(|option| option.value().name() == "option")
                    .collect();
                let selected = options
                    .iter()
                    .find(|option| option.value().attr("selected").is_some())
                    .or_else(|| options.first());
                FormField {
                    kind: FieldKind::Select,
                    value: selected
                        .map(|option| option.text().collect::<String>().trim().to_owned())
                        .unwrap_or_default(),
                }
            }
            _ => {
                let input_type = attributes.attr("type").unwrap_or("text").to_ascii_lowercase();
                let kind = match input_type.as_str() {
                    "hidden" => return,
                    "password" => FieldKind::Password,
                    "checkbox" => FieldKind::Checkbox { checked },
                    "radio" => FieldKind::Radio { checked },
                    "submit" | "reset" | "button" => FieldKind::Button,
                    _ => FieldKind::Text,
                };
                let value = match (kind, value.is_empty()) {
                    (FieldKind::Button, true) if input_type == "reset" => "Reset".to_owned(),
                    (FieldKind::Button, true) => "Submit".to_owned(),
                    (FieldKind::Text, true) => attributes
                        .attr("placeholder")
                        .unwrap_or_default()
                        .to_owned(),
                    _ => value,
                };
                FormField { kind, value }
            }
        };
        self.document.push(Block::Field(field));
    }

    fn preformatted(&mut self, element: ElementRef<'_>, context: &BlockContext) {
        let text: String = element.text().collect();
        let style = &context.inherited;
        for line in text.trim_matches('\n').lines() {
            if line.trim().is_empty() {
                continue;
            }
            let span = span_for(line.trim_end(), style);
            let spans = match &self.options.bidi {
                Some(bidi) => bidi.visual_spans(&[span], style.direction),
                None => vec![span],
            };
            self.document.push(Block::Paragraph(
                RichParagraph::new(spans)
                    .with_alignment(style.align)
                    .with_direction(style.direction)
                    .with_background(context.background),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging;
    use crate::richtext::plain_text;

    fn parse_html(html: &str) -> Document {
        parse(html, &ParseOptions::new("file:///nonexistent/"))
    }

    fn paragraph_text(block: &Block) -> String {
        match block {
            Block::Paragraph(paragraph) | Block::Heading { text: paragraph, .. } => {
                plain_text(paragraph.spans())
            }
            other => panic!("expected text block, got {other:?}"),
        }
    }

    #[test]
    fn headings_and_paragraphs_become_blocks() {
        let document = parse_html(
            "<html><head><title> Demo </title></head><body>\
             <h1>Title</h1><p>Hello <b>bold</b>   world</p></body></html>",
        );
        assert_eq!(document.title(), Some("Demo"));
        assert_eq!(document.blocks().len(), 2);
        assert!(matches!(document.blocks()[0], Block::Heading { level: 1, .. }));
        assert_eq!(paragraph_text(&document.blocks()[1]), "Hello bold world");

        let Block::Paragraph(paragraph) = &document.blocks()[1] else {
            unreachable!()
        };
        assert!(paragraph.spans()[1].is_bold());
    }

    #[test]
    fn nested_blocks_split_inline_content() {
        let document = parse_html("<div>before<p>inside</p>after<br>next</div>");
        let texts: Vec<String> = document.blocks().iter().map(paragraph_text).collect();
        assert_eq!(texts, vec!["before", "inside", "after", "next"]);
    }

    #[test]
    fn style_sheet_and_inline_style_cascade() {
        let document = parse_html(
            "<style>p { color: red; text-align: center } .blue { color: blue }</style>\
             <p class=\"blue\" style=\"text-align: right\">x</p>",
        );
        let Block::Paragraph(paragraph) = &document.blocks()[0] else {
            panic!("expected paragraph")
        };
        assert_eq!(paragraph.alignment(), HorizontalAlignment::Right);
        assert_eq!(
            paragraph.spans()[0].color(),
            Some(genpdf::style::Color::Rgb(0, 0, 255))
        );
    }

    #[test]
    fn inline_styles_stay_on_their_spans() {
        let document = parse_html(
            "<p><b style=\"font-size: 20pt; text-align: right\">Big</b> small</p>\
             <p><span style=\"background-color: yellow\">x</span> rest</p>",
        );
        let (Block::Paragraph(first), Block::Paragraph(second)) =
            (&document.blocks()[0], &document.blocks()[1])
        else {
            panic!("expected two paragraphs")
        };
        assert_eq!(first.font_size(), None);
        assert_eq!(first.alignment(), HorizontalAlignment::Left);
        assert!(first.spans()[0].is_bold());
        assert!(!first.spans()[1].is_bold());
        assert_eq!(second.background(), None);
        assert_eq!(plain_text(second.spans()), "x rest");
    }

    #[test]
    fn tables_keep_header_rows() {
        let document = parse_html(
            "<table><thead><tr><td>A</td><td>B</td></tr></thead>\
             <tbody><tr><td>1</td><td colspan=\"2\">2</td></tr></tbody></table>",
        );
        let Block::Table(table) = &document.blocks()[0] else {
            panic!("expected table")
        };
        assert!(table.rows[0].header);
        assert!(!table.rows[1].header);
        assert_eq!(table.column_count(), 3);
    }

    #[test]
    fn objects_carry_attributes_and_size() {
        let document = parse_html(
            "<object type=\"custom/binary-tree\" data-depth=\"3\" \
             style=\"width: 40mm; height: 20mm\"></object>",
        );
        let Block::Object(object) = &document.blocks()[0] else {
            panic!("expected object")
        };
        assert_eq!(object.content_type(), "custom/binary-tree");
        assert_eq!(object.attribute("data-depth"), Some("3"));
        assert_eq!(object.width_mm(), 40.0);
        assert_eq!(object.height_mm(), 20.0);
    }

    #[test]
    fn page_break_styles_emit_breaks() {
        let document = parse_html(
            "<p>one</p><p style=\"page-break-before: always\">two</p>\
             <div style=\"-fs-pagebreak-min-height: 30mm\">three</div>",
        );
        assert!(matches!(document.blocks()[1], Block::PageBreak));
        assert!(matches!(document.blocks()[3], Block::MinHeightBreak(h) if h == 30.0));
    }

    #[test]
    fn unloadable_background_image_warns() {
        if logging::install(log::LevelFilter::Off).is_err() {
            return;
        }
        let (document, warnings) = logging::capture_warnings(|| {
            parse_html("<div style=\"background-image: url('missing.png')\">text</div>")
        });
        assert_eq!(document.blocks().len(), 1);
        assert!(warnings
            .iter()
            .any(|warning| warning.message().contains("missing.png")));
    }

    #[test]
    fn data_uri_images_are_loaded() {
        let png = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mP8z8DwHwAFBQIAX8jx0gAAAABJRU5ErkJggg==";
        let document = parse_html(&format!("<img src=\"data:image/png;base64,{png}\" width=\"96\">"));
        let Block::Image(image) = &document.blocks()[0] else {
            panic!("expected image")
        };
        assert!((image.width_mm().unwrap_or_default() - 25.4).abs() < 1e-9);
    }

    #[test]
    fn data_uri_background_images_load_without_warnings() {
        if logging::install(log::LevelFilter::Off).is_err() {
            return;
        }
        let png = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mP8z8DwHwAFBQIAX8jx0gAAAABJRU5ErkJggg==";
        let (document, warnings) = logging::capture_warnings(|| {
            parse_html(&format!(
                "<div style=\"background-image: url(data:image/png;base64,{png}); color: red\">text</div>"
            ))
        });
        assert!(warnings.is_empty(), "unexpected warnings: {warnings:?}");
        assert!(matches!(document.blocks()[0], Block::Image(_)));
        assert_eq!(paragraph_text(&document.blocks()[1]), "text");
    }

    #[test]
    fn form_controls_become_fields() {
        let document = parse_html(
            "<form><input type=\"text\" value=\"abc\"><input type=\"checkbox\" checked>\
             <input type=\"hidden\" value=\"x\"><select><option>a</option>\
             <option selected>b</option></select><textarea>long text</textarea></form>",
        );
        let fields: Vec<&FormField> = document
            .blocks()
            .iter()
            .filter_map(|block| match block {
                Block::Field(field) => Some(field),
                _ => None,
            })
            .collect();
        assert_eq!(fields.len(), 4);
        assert_eq!(fields[0].value, "abc");
        assert_eq!(fields[1].kind, FieldKind::Checkbox { checked: true });
        assert_eq!(fields[2].value, "b");
        assert_eq!(fields[3].kind, FieldKind::TextArea);
    }

    #[test]
    fn rtl_paragraphs_are_reordered_when_bidi_is_enabled() {
        use crate::bidi::{UnicodeBidiReorderer, UnicodeBidiSplitter};
        use std::sync::Arc;

        let options = ParseOptions::new("file:///").with_bidi(BidiPipeline::new(
            Arc::new(UnicodeBidiSplitter),
            Arc::new(UnicodeBidiReorderer),
        ));
        let document = parse("<p dir=\"rtl\">\u{05d0}\u{05d1}</p>", &options);
        let Block::Paragraph(paragraph) = &document.blocks()[0] else {
            panic!("expected paragraph")
        };
        assert_eq!(paragraph.direction(), TextDirection::Rtl);
        assert_eq!(plain_text(paragraph.spans()), "\u{05d1}\u{05d0}");
    }

    #[test]
    fn rtl_paragraphs_keep_latin_spans_in_reading_order() {
        use crate::bidi::{UnicodeBidiReorderer, UnicodeBidiSplitter};
        use std::sync::Arc;

        let options = ParseOptions::new("file:///").with_bidi(BidiPipeline::new(
            Arc::new(UnicodeBidiSplitter),
            Arc::new(UnicodeBidiReorderer),
        ));
        let document = parse("<p dir=\"rtl\">abc <b>def</b></p>", &options);
        let Block::Paragraph(paragraph) = &document.blocks()[0] else {
            panic!("expected paragraph")
        };
        assert_eq!(plain_text(paragraph.spans()), "abc def");
        let bold: Vec<&str> = paragraph
            .spans()
            .iter()
            .filter(|span| span.is_bold())
            .map(|span| span.text())
            .collect();
        assert_eq!(bold, vec!["def"]);
    }

    #[test]
    fn inline_svg_keeps_its_markup() {
        let document = parse_html("<svg width=\"96\" height=\"48\"><circle r=\"4\"/></svg>");
        let Block::Svg(svg) = &document.blocks()[0] else {
            panic!("expected svg")
        };
        assert!(svg.source.contains("circle"));
        assert!((svg.width_mm - 25.4).abs() < 1e-9);
        assert!((svg.height_mm - 12.7).abs() < 1e-9);
    }
}

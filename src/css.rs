//! The small CSS subset the converter understands.
//!
//! Declarations come from `<style>` blocks (applied in source order, matched with
//! [`scraper::Selector`]) and from `style` attributes (applied last).  Both are tokenized with
//! `cssparser`, so `;` or `}` inside `url(...)` and strings never split a declaration.  Only the
//! properties listed in [`ComputedStyle::apply`] have an effect; other properties are logged at
//! debug level.  A supported property with a value that cannot be parsed is reported as a warning,
//! like the CSS parser of a full renderer would.

use cssparser::{Delimiter, ParseError, Parser, ParserInput, Token};
use genpdf::style::Color;
use log::{debug, warn};
use scraper::{ElementRef, Selector};

use crate::bidi::TextDirection;
use crate::model::{px_to_mm, HorizontalAlignment, BODY_FONT_SIZE};

/// A single `property: value` pair.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Declaration {
    /// Lower-cased property name.
    pub property: String,
    /// Trimmed value, with any `!important` suffix removed.
    pub value: String,
}

/// Parses a declaration block (`color: red; font-weight: bold`).
///
/// Malformed declarations are skipped up to the next `;`.
pub fn parse_declarations(input: &str) -> Vec<Declaration> {
    let mut input = ParserInput::new(input);
    let mut parser = Parser::new(&mut input);
    declaration_list(&mut parser)
}

fn declaration_list(parser: &mut Parser<'_, '_>) -> Vec<Declaration> {
    let mut declarations = Vec::new();
    while !parser.is_exhausted() {
        let parsed: Result<Option<Declaration>, ParseError<'_, ()>> =
            parser.parse_until_after(Delimiter::Semicolon, |parser| {
                if parser.is_exhausted() {
                    return Ok(None);
                }
                let property = parser.expect_ident()?.to_ascii_lowercase();
                parser.expect_colon()?;
                parser.skip_whitespace();
                let start = parser.position();
                let mut end = start;
                loop {
                    match parser.next() {
                        Err(_) | Ok(Token::Delim('!')) => break,
                        Ok(_) => end = parser.position(),
                    }
                }
                while parser.next().is_ok() {}
                let value = parser.slice(start..end).trim().to_owned();
                Ok((!value.is_empty()).then(|| Declaration { property, value }))
            });
        match parsed {
            Ok(Some(declaration)) => declarations.push(declaration),
            Ok(None) => {}
            Err(err) => debug!("Skipping malformed CSS declaration: {:?}", err.kind),
        }
    }
    declarations
}

struct StyleRule {
    selector: Selector,
    declarations: Vec<Declaration>,
}

/// Rules collected from the `<style>` elements of a document.
#[derive(Default)]
pub struct StyleSheet {
    rules: Vec<StyleRule>,
}

impl std::fmt::Debug for StyleSheet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StyleSheet")
            .field("rules", &self.rules.len())
            .finish()
    }
}

impl StyleSheet {
    /// Creates an empty style sheet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses `css` and appends its rules.
    ///
    /// At-rules such as `@page` or `@media` are skipped.
    pub fn add_source(&mut self, css: &str) {
        let mut input = ParserInput::new(css);
        let mut parser = Parser::new(&mut input);

        while !parser.is_exhausted() {
            let prelude: Result<String, ParseError<'_, ()>> = parser.parse_until_before(
                Delimiter::CurlyBracketBlock | Delimiter::Semicolon,
                |parser| {
                    parser.skip_whitespace();
                    let start = parser.position();
                    while parser.next().is_ok() {}
                    Ok(parser.slice_from(start).trim().to_owned())
                },
            );
            let prelude = prelude.unwrap_or_default();

            let has_block = match parser.next() {
                Ok(Token::CurlyBracketBlock) => true,
                Ok(_) => false,
                Err(_) if prelude.is_empty() => break,
                Err(_) => {
                    warn!("Ignoring trailing CSS without a declaration block: '{}'", prelude);
                    break;
                }
            };

            if prelude.starts_with('@') {
                debug!("Skipping unsupported at-rule {}", prelude);
                continue;
            }
            if !has_block {
                if !prelude.is_empty() {
                    warn!("Ignoring CSS without a declaration block: '{}'", prelude);
                }
                continue;
            }

            let declarations: Result<Vec<Declaration>, ParseError<'_, ()>> =
                parser.parse_nested_block(|parser| Ok(declaration_list(parser)));
            let declarations = declarations.unwrap_or_default();
            match Selector::parse(&prelude) {
                Ok(selector) => self.rules.push(StyleRule {
                    selector,
                    declarations,
                }),
                Err(_) => warn!("Ignoring CSS rule with unsupported selector '{}'", prelude),
            };
        }
    }

    /// Number of parsed rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether no rules were parsed.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Declarations of every rule matching `element`, in source order.
    pub fn matching<'a>(&'a self, element: &ElementRef<'_>) -> Vec<&'a Declaration> {
        self.rules
            .iter()
            .filter(|rule| rule.selector.matches(element))
            .flat_map(|rule| rule.declarations.iter())
            .collect()
    }
}

/// Runs `parse` over the whole of `value`; trailing tokens make it fail.
fn parse_value<T>(value: &str, parse: impl FnOnce(&mut Parser<'_, '_>) -> Option<T>) -> Option<T> {
    let mut input = ParserInput::new(value);
    let mut parser = Parser::new(&mut input);
    let parsed = parse(&mut parser)?;
    parser.is_exhausted().then(|| parsed)
}

fn next_color(parser: &mut Parser<'_, '_>) -> Option<Color> {
    match cssparser::Color::parse(parser).ok()? {
        cssparser::Color::RGBA(rgba) => Some(Color::Rgb(rgba.red, rgba.green, rgba.blue)),
        cssparser::Color::CurrentColor => None,
    }
}

/// Parses a CSS colour: any keyword, hex notation, `rgb()`/`rgba()` or `hsl()`/`hsla()`.
///
/// Alpha is dropped.
pub fn parse_color(value: &str) -> Option<Color> {
    parse_value(value, next_color)
}

/// Converts any `genpdf` colour to 8-bit RGB.
pub fn color_to_rgb(color: Color) -> (u8, u8, u8) {
    match color {
        Color::Rgb(r, g, b) => (r, g, b),
        Color::Greyscale(value) => (value, value, value),
        Color::Cmyk(c, m, y, k) => {
            let channel = |v: u8| {
                let v = f64::from(v) / 255.0;
                let k = f64::from(k) / 255.0;
                (255.0 * (1.0 - v) * (1.0 - k)).round() as u8
            };
            (channel(c), channel(m), channel(y))
        }
    }
}

fn length_to_mm(number: f64, unit: &str, font_size_pt: f64) -> Option<f64> {
    let mm = match unit.to_ascii_lowercase().as_str() {
        "" | "px" => px_to_mm(number),
        "pt" => number * 25.4 / 72.0,
        "mm" => number,
        "cm" => number * 10.0,
        "in" => number * 25.4,
        "pc" => number * 25.4 / 6.0,
        "em" | "rem" => number * font_size_pt * 25.4 / 72.0,
        _ => return None,
    };
    Some(mm)
}

/// Parses a length into millimetres. `em` is relative to `font_size_pt`; unitless numbers are
/// pixels.  Percentages and `auto` are not supported.
pub fn parse_length_mm(value: &str, font_size_pt: f64) -> Option<f64> {
    parse_value(value, |parser| match parser.next().ok()? {
        Token::Dimension { value, unit, .. } => length_to_mm(f64::from(*value), unit, font_size_pt),
        Token::Number { value, .. } => length_to_mm(f64::from(*value), "", font_size_pt),
        _ => None,
    })
}

fn parse_font_size(value: &str, parent_pt: u8) -> Option<u8> {
    let parent = f64::from(parent_pt);
    let points = parse_value(value, |parser| match parser.next().ok()? {
        Token::Ident(keyword) => match keyword.to_ascii_lowercase().as_str() {
            "xx-small" => Some(7.0),
            "x-small" => Some(8.0),
            "small" => Some(10.0),
            "medium" => Some(f64::from(BODY_FONT_SIZE)),
            "large" => Some(14.0),
            "x-large" => Some(18.0),
            "xx-large" => Some(24.0),
            "smaller" => Some(parent / 1.2),
            "larger" => Some(parent * 1.2),
            _ => None,
        },
        Token::Percentage { unit_value, .. } => Some(parent * f64::from(*unit_value)),
        Token::Dimension { value, unit, .. } => {
            length_to_mm(f64::from(*value), unit, parent).map(|mm| mm * 72.0 / 25.4)
        }
        Token::Number { value, .. } => Some(px_to_mm(f64::from(*value)) * 72.0 / 25.4),
        _ => None,
    })?;
    Some(points.round().clamp(4.0, 96.0) as u8)
}

/// Extracts the reference of the first `url(...)` in `value`, quoted or not.
pub fn parse_url(value: &str) -> Option<String> {
    let mut input = ParserInput::new(value);
    let mut parser = Parser::new(&mut input);
    loop {
        if let Ok(url) = parser.try_parse(|parser| parser.expect_url()) {
            return Some(url.trim().to_owned());
        }
        parser.next().ok()?;
    }
}

/// Colour and image of the `background` shorthand; other components are ignored.
fn parse_background(value: &str) -> (Option<Color>, Option<String>) {
    let mut input = ParserInput::new(value);
    let mut parser = Parser::new(&mut input);
    let (mut color, mut image) = (None, None);
    while !parser.is_exhausted() {
        if let Ok(url) = parser.try_parse(|parser| parser.expect_url()) {
            image = Some(url.trim().to_owned());
        } else if let Some(parsed) = parser.try_parse(|parser| next_color(parser).ok_or(())).ok() {
            color = Some(parsed);
        } else if parser.next().is_err() {
            break;
        }
    }
    (color, image)
}

/// Style properties inherited by descendants.
#[derive(Clone, Debug, PartialEq)]
pub struct InheritedStyle {
    /// Text colour.
    pub color: Option<Color>,
    /// Bold weight.
    pub bold: bool,
    /// Italic style.
    pub italic: bool,
    /// Underline decoration.
    pub underline: bool,
    /// Font size in points.
    pub font_size: u8,
    /// Text alignment.
    pub align: HorizontalAlignment,
    /// Base direction.
    pub direction: TextDirection,
}

impl InheritedStyle {
    /// Root style for a document with the given default direction.
    pub fn root(direction: TextDirection) -> Self {
        Self {
            color: None,
            bold: false,
            italic: false,
            underline: false,
            font_size: BODY_FONT_SIZE,
            align: HorizontalAlignment::Left,
            direction,
        }
    }
}

/// The style of one element: inherited properties plus its own box properties.
#[derive(Clone, Debug, PartialEq)]
pub struct ComputedStyle {
    /// Properties passed on to children.
    pub inherited: InheritedStyle,
    /// Background colour of the element box.
    pub background_color: Option<Color>,
    /// Unresolved `background-image` reference.
    pub background_image: Option<String>,
    /// Explicit width in millimetres.
    pub width_mm: Option<f64>,
    /// Explicit height in millimetres.
    pub height_mm: Option<f64>,
    /// Start the element on a new page.
    pub page_break_before: bool,
    /// Start the next sibling on a new page.
    pub page_break_after: bool,
    /// `-fs-pagebreak-min-height` in millimetres.
    pub min_height_break_mm: Option<f64>,
    /// `display: none`.
    pub hidden: bool,
    /// Whether `text-align` was set explicitly on this element.
    pub explicit_align: bool,
}

impl ComputedStyle {
    /// Starts from the inherited properties of the parent.
    pub fn inherit(parent: &InheritedStyle) -> Self {
        Self {
            inherited: parent.clone(),
            background_color: None,
            background_image: None,
            width_mm: None,
            height_mm: None,
            page_break_before: false,
            page_break_after: false,
            min_height_break_mm: None,
            hidden: false,
            explicit_align: false,
        }
    }

    fn invalid(declaration: &Declaration) {
        warn!(
            "Invalid value '{}' for CSS property '{}'",
            declaration.value, declaration.property
        );
    }

    /// Applies one declaration.
    pub fn apply(&mut self, declaration: &Declaration) {
        let value = declaration.value.as_str();
        let keyword = value.to_ascii_lowercase();
        let font_pt = f64::from(self.inherited.font_size);

        match declaration.property.as_str() {
            "color" => match parse_color(value) {
                Some(color) => self.inherited.color = Some(color),
                None => Self::invalid(declaration),
            },
            "background-color" => {
                if keyword == "transparent" {
                    self.background_color = None;
                } else {
                    match parse_color(value) {
                        Some(color) => self.background_color = Some(color),
                        None => Self::invalid(declaration),
                    }
                }
            }
            "background-image" => {
                if keyword == "none" {
                    self.background_image = None;
                } else {
                    match parse_url(value) {
                        Some(url) => self.background_image = Some(url),
                        None => Self::invalid(declaration),
                    }
                }
            }
            "background" => {
                let (color, image) = parse_background(value);
                if color.is_some() {
                    self.background_color = color;
                }
                if image.is_some() {
                    self.background_image = image;
                }
            }
            "text-align" => {
                let align = match keyword.as_str() {
                    "left" => Some(HorizontalAlignment::Left),
                    "right" => Some(HorizontalAlignment::Right),
                    "center" => Some(HorizontalAlignment::Center),
                    "justify" => Some(HorizontalAlignment::Justified),
                    "start" => Some(match self.inherited.direction {
                        TextDirection::Ltr => HorizontalAlignment::Left,
                        TextDirection::Rtl => HorizontalAlignment::Right,
                    }),
                    "end" => Some(match self.inherited.direction {
                        TextDirection::Ltr => HorizontalAlignment::Right,
                        TextDirection::Rtl => HorizontalAlignment::Left,
                    }),
                    _ => None,
                };
                match align {
                    Some(align) => {
                        self.inherited.align = align;
                        self.explicit_align = true;
                    }
                    None => Self::invalid(declaration),
                }
            }
            "font-weight" => match keyword.as_str() {
                "bold" | "bolder" => self.inherited.bold = true,
                "normal" | "lighter" => self.inherited.bold = false,
                other => match other.parse::<u16>() {
                    Ok(weight) => self.inherited.bold = weight >= 600,
                    Err(_) => Self::invalid(declaration),
                },
            },
            "font-style" => match keyword.as_str() {
                "italic" | "oblique" => self.inherited.italic = true,
                "normal" => self.inherited.italic = false,
                _ => Self::invalid(declaration),
            },
            "text-decoration" | "text-decoration-line" => {
                if keyword.contains("underline") {
                    self.inherited.underline = true;
                } else if keyword.contains("none") {
                    self.inherited.underline = false;
                }
            }
            "font-size" => match parse_font_size(value, self.inherited.font_size) {
                Some(size) => self.inherited.font_size = size,
                None => Self::invalid(declaration),
            },
            "font-family" => {
                debug!(
                    "Substituting the default family for font-family '{}'",
                    value
                );
            }
            "direction" => match TextDirection::parse(value) {
                Some(direction) => self.inherited.direction = direction,
                None => Self::invalid(declaration),
            },
            "width" | "height" => {
                if keyword == "auto" || keyword.ends_with('%') {
                    debug!("Ignoring relative {}: {}", declaration.property, value);
                    return;
                }
                match parse_length_mm(value, font_pt) {
                    Some(mm) if declaration.property == "width" => self.width_mm = Some(mm),
                    Some(mm) => self.height_mm = Some(mm),
                    None => Self::invalid(declaration),
                }
            }
            "page-break-before" | "break-before" => {
                self.page_break_before = matches!(keyword.as_str(), "always" | "page" | "left" | "right");
            }
            "page-break-after" | "break-after" => {
                self.page_break_after = matches!(keyword.as_str(), "always" | "page" | "left" | "right");
            }
            "-fs-pagebreak-min-height" => match parse_length_mm(value, font_pt) {
                Some(mm) => self.min_height_break_mm = Some(mm),
                None => Self::invalid(declaration),
            },
            "display" => self.hidden = keyword == "none",
            other => debug!("Ignoring unsupported CSS property '{}'", other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    #[test]
    fn parses_colour_notations() {
        assert_eq!(parse_color("#f00"), Some(Color::Rgb(255, 0, 0)));
        assert_eq!(parse_color("#00FF7f"), Some(Color::Rgb(0, 255, 127)));
        assert_eq!(parse_color("rgb(1, 2, 3)"), Some(Color::Rgb(1, 2, 3)));
        assert_eq!(parse_color("rgb(100%, 0%, 50%)"), Some(Color::Rgb(255, 0, 128)));
        assert_eq!(parse_color("Navy"), Some(Color::Rgb(0, 0, 128)));
        assert_eq!(parse_color("hsl(120, 100%, 25%)"), Some(Color::Rgb(0, 128, 0)));
        assert_eq!(parse_color("red blue"), None);
        assert_eq!(parse_color("#12fg34"), None);
        assert_eq!(parse_color("blurple"), None);
    }

    #[test]
    fn parses_lengths_into_millimetres() {
        assert_eq!(parse_length_mm("10mm", 12.0), Some(10.0));
        assert_eq!(parse_length_mm("2cm", 12.0), Some(20.0));
        assert!((parse_length_mm("96px", 12.0).unwrap() - 25.4).abs() < 1e-9);
        assert!((parse_length_mm("72pt", 12.0).unwrap() - 25.4).abs() < 1e-9);
        assert!((parse_length_mm("2em", 12.0).unwrap() - 24.0 * 25.4 / 72.0).abs() < 1e-9);
        assert_eq!(parse_length_mm("wide", 12.0), None);
    }

    #[test]
    fn splits_declarations() {
        let declarations = parse_declarations("color: red ; FONT-WEIGHT:bold !important;;bogus");
        assert_eq!(
            declarations,
            vec![
                Declaration {
                    property: "color".into(),
                    value: "red".into()
                },
                Declaration {
                    property: "font-weight".into(),
                    value: "bold".into()
                },
            ]
        );
    }

    #[test]
    fn semicolons_inside_urls_and_strings_stay_in_the_value() {
        let declarations = parse_declarations(
            "background-image: url(data:image/png;base64,AAAA); font-family: \"a;b\"; color: red",
        );
        let values: Vec<_> = declarations.iter().map(|d| d.value.as_str()).collect();
        assert_eq!(values, vec!["url(data:image/png;base64,AAAA)", "\"a;b\"", "red"]);
        assert_eq!(
            parse_url(values[0]).as_deref(),
            Some("data:image/png;base64,AAAA")
        );

        let mut sheet = StyleSheet::new();
        sheet.add_source("p { background: url('x}.png') #fff; color: red } h1 { color: blue }");
        assert_eq!(sheet.len(), 2);
    }

    #[test]
    fn background_shorthand_yields_colour_and_image() {
        assert_eq!(
            parse_background("#00f url(\"tile.png\") no-repeat"),
            (Some(Color::Rgb(0, 0, 255)), Some("tile.png".to_owned()))
        );
        assert_eq!(parse_background("none"), (None, None));
    }

    #[test]
    fn extracts_urls() {
        assert_eq!(parse_url("url('a b.png')"), Some("a b.png".into()));
        assert_eq!(parse_url("#fff url(x.png) no-repeat"), Some("x.png".into()));
        assert_eq!(parse_url("none"), None);
    }

    #[test]
    fn style_sheet_matches_selectors_and_skips_at_rules() {
        let mut sheet = StyleSheet::new();
        sheet.add_source(
            "/* page */ @page { size: A4; margin: 1cm; }\n@import url(x.css);\n\
             p.note, h1 { color: blue }\n@media print { p { color: red } }\n#x { font-weight: bold }",
        );
        assert_eq!(sheet.len(), 2);

        let html = Html::parse_fragment("<p class=\"note\" id=\"x\">hi</p>");
        let selector = Selector::parse("p").unwrap();
        let element = html.select(&selector).next().unwrap();
        let matched: Vec<_> = sheet
            .matching(&element)
            .into_iter()
            .map(|d| d.property.as_str())
            .collect();
        assert_eq!(matched, vec!["color", "font-weight"]);
    }

    #[test]
    fn computed_style_applies_supported_properties() {
        let mut style = ComputedStyle::inherit(&InheritedStyle::root(TextDirection::Ltr));
        for declaration in parse_declarations(
            "color:#123456; text-align:center; font-size:18pt; page-break-before:always; \
             -fs-pagebreak-min-height: 5cm; background-image: url(bg.png); font-weight: 700",
        ) {
            style.apply(&declaration);
        }
        assert_eq!(style.inherited.color, Some(Color::Rgb(0x12, 0x34, 0x56)));
        assert_eq!(style.inherited.align, HorizontalAlignment::Center);
        assert_eq!(style.inherited.font_size, 18);
        assert!(style.inherited.bold);
        assert!(style.page_break_before);
        assert_eq!(style.min_height_break_mm, Some(50.0));
        assert_eq!(style.background_image.as_deref(), Some("bg.png"));
    }

    #[test]
    fn cmyk_and_grey_convert_to_rgb() {
        assert_eq!(color_to_rgb(Color::Greyscale(40)), (40, 40, 40));
        assert_eq!(color_to_rgb(Color::Cmyk(0, 0, 0, 0)), (255, 255, 255));
        assert_eq!(color_to_rgb(Color::Cmyk(255, 0, 0, 0)), (0, 255, 255));
    }
}

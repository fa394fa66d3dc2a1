//! Styled inline text.
//!
//! A [`Span`] is a run of text sharing one [`TextStyle`].  The HTML converter produces spans from
//! the inherited style of each text node; the PDF path turns them into [`StyledSpan`]s for
//! [`crate::elements::RichText`] and the PNG path measures them glyph by glyph in
//! [`crate::raster`].

use genpdf::style::{Color, Style, StyledString};

/// Inline style attributes of a span.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TextStyle {
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub color: Option<Color>,
}

impl TextStyle {
    /// The `genpdf` style of the span; underline is not part of it.
    fn to_genpdf(self) -> Style {
        let mut style = Style::new();
        if let Some(color) = self.color {
            style.set_color(color);
        }
        if self.bold {
            style.set_bold();
        }
        if self.italic {
            style.set_italic();
        }
        style
    }
}

/// A run of text with one inline style.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Span {
    text: String,
    style: TextStyle,
}

impl Span {
    /// An unstyled span.
    pub fn new(text: impl Into<String>) -> Self {
        Self::styled(text, TextStyle::default())
    }

    /// A span rendered with `style`.
    pub fn styled(text: impl Into<String>, style: TextStyle) -> Self {
        Self {
            text: text.into(),
            style,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Replaces the text, keeping the style.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    pub fn style(&self) -> TextStyle {
        self.style
    }

    pub fn is_bold(&self) -> bool {
        self.style.bold
    }

    pub fn is_italic(&self) -> bool {
        self.style.italic
    }

    pub fn is_underlined(&self) -> bool {
        self.style.underline
    }

    pub fn color(&self) -> Option<Color> {
        self.style.color
    }
}

/// A `genpdf` string plus the underline flag `genpdf` cannot express.
#[derive(Clone, Debug)]
pub struct StyledSpan {
    pub string: StyledString,
    pub underline: bool,
}

impl From<&Span> for StyledSpan {
    fn from(span: &Span) -> Self {
        StyledSpan {
            string: StyledString::new(span.text.clone(), span.style.to_genpdf()),
            underline: span.style.underline,
        }
    }
}

/// Converts spans for [`crate::elements::RichText`].
pub fn spans_to_styled_strings<'a, I>(spans: I) -> Vec<StyledSpan>
where
    I: IntoIterator<Item = &'a Span>,
{
    spans.into_iter().map(StyledSpan::from).collect()
}

/// Concatenates the text of all spans.
pub fn plain_text(spans: &[Span]) -> String {
    spans.iter().map(Span::text).collect()
}

/// Collapses runs of HTML whitespace inside and across spans, the way `white-space: normal` does.
///
/// Leading whitespace of the first span and trailing whitespace of the last span are removed;
/// spans left empty are dropped.
pub fn collapse_whitespace(spans: Vec<Span>) -> Vec<Span> {
    let mut collapsed: Vec<Span> = Vec::with_capacity(spans.len());
    let mut previous_was_space = true;

    for mut span in spans {
        let mut text = String::with_capacity(span.text.len());
        for ch in span.text.chars() {
            if ch.is_whitespace() {
                if !previous_was_space {
                    text.push(' ');
                    previous_was_space = true;
                }
            } else {
                text.push(ch);
                previous_was_space = false;
            }
        }
        if !text.is_empty() {
            span.text = text;
            collapsed.push(span);
        }
    }

    if let Some(last) = collapsed.last_mut() {
        let trimmed = last.text.trim_end().to_owned();
        last.text = trimmed;
    }
    collapsed.retain(|span| !span.text.is_empty());
    collapsed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bold() -> TextStyle {
        TextStyle {
            bold: true,
            ..TextStyle::default()
        }
    }

    #[test]
    fn styled_span_carries_font_flags_and_underline() {
        let style = TextStyle {
            bold: true,
            italic: true,
            underline: true,
            color: Some(Color::Rgb(10, 20, 30)),
        };
        let styled = StyledSpan::from(&Span::styled("Hello", style));
        assert_eq!(styled.string.s, "Hello");
        assert!(styled.string.style.is_bold());
        assert!(styled.string.style.is_italic());
        assert_eq!(styled.string.style.color(), Some(Color::Rgb(10, 20, 30)));
        assert!(styled.underline);
    }

    #[test]
    fn collapses_whitespace_across_spans() {
        let spans = collapse_whitespace(vec![
            Span::new("\n   Hello  "),
            Span::styled("  big ", bold()),
            Span::new(" world \n"),
        ]);
        assert_eq!(plain_text(&spans), "Hello big world");
        assert_eq!(spans[1].text(), "big ");
        assert!(spans[1].is_bold());
    }

    #[test]
    fn whitespace_only_spans_disappear() {
        let spans = collapse_whitespace(vec![Span::new("   "), Span::new("\t")]);
        assert!(spans.is_empty());
    }

    #[test]
    fn set_text_keeps_the_style() {
        let mut span = Span::styled("abc", bold());
        span.set_text("cba");
        assert_eq!(span.text(), "cba");
        assert_eq!(span.style(), bold());
    }
}

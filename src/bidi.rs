//! Bidirectional text support.
//!
//! Neither `genpdf` nor the glyph painter understand right-to-left scripts, so text is converted
//! from logical to visual order before it reaches them.  The work is split in two pluggable steps:
//! a [`BidiSplitter`] cuts text into runs of uniform embedding level, and a [`BidiReorderer`]
//! arranges those runs in visual order.  Without either step, text is emitted in logical order.

use std::ops::Range;
use std::sync::Arc;

use unicode_bidi::{BidiInfo, Level};

use crate::richtext::{plain_text, Span};

/// Base direction of a paragraph.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TextDirection {
    /// Left to right.
    #[default]
    Ltr,
    /// Right to left.
    Rtl,
}

impl TextDirection {
    /// Parses the value of a `dir` attribute or `direction` property.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "ltr" => Some(Self::Ltr),
            "rtl" => Some(Self::Rtl),
            _ => None,
        }
    }
}

/// A run of text sharing one embedding level, as a byte range of the analysed text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BidiRun {
    pub range: Range<usize>,
    /// Embedding level; odd levels are right to left.
    pub level: u8,
}

impl BidiRun {
    /// Creates a run.
    pub fn new(range: Range<usize>, level: u8) -> Self {
        Self { range, level }
    }

    /// Whether the run is right to left.
    pub fn is_rtl(&self) -> bool {
        self.level % 2 == 1
    }

    /// The run's slice of `text` as it is displayed: reversed when right to left.
    pub fn visual_text(&self, text: &str) -> String {
        let slice = text.get(self.range.clone()).unwrap_or_default();
        if self.is_rtl() {
            slice.chars().rev().collect()
        } else {
            slice.to_owned()
        }
    }
}

/// Splits a paragraph into directional runs.
pub trait BidiSplitter: Send + Sync {
    /// Returns the runs of `text` in logical order.
    fn split(&self, text: &str, base: TextDirection) -> Vec<BidiRun>;
}

/// Reorders directional runs for display.
pub trait BidiReorderer: Send + Sync {
    /// Returns the indices of `runs` in visual order, left to right.
    fn reorder(&self, runs: &[BidiRun]) -> Vec<usize>;
}

/// Splitter backed by the Unicode Bidirectional Algorithm from `unicode-bidi`.
///
/// Levels are taken after rule L1, so trailing whitespace follows the paragraph direction.
#[derive(Clone, Copy, Debug, Default)]
pub struct UnicodeBidiSplitter;

impl BidiSplitter for UnicodeBidiSplitter {
    fn split(&self, text: &str, base: TextDirection) -> Vec<BidiRun> {
        if text.is_empty() {
            return Vec::new();
        }
        let level = match base {
            TextDirection::Ltr => Level::ltr(),
            TextDirection::Rtl => Level::rtl(),
        };
        let info = BidiInfo::new(text, Some(level));

        let mut runs = Vec::new();
        for paragraph in &info.paragraphs {
            let line = paragraph.range.clone();
            if line.is_empty() {
                continue;
            }
            let levels = info.reordered_levels(paragraph, line.clone());
            let mut start = line.start;
            for (offset, _) in text[line.clone()].char_indices() {
                let index = line.start + offset;
                if levels[index] != levels[start] {
                    runs.push(BidiRun::new(start..index, levels[start].number()));
                    start = index;
                }
            }
            runs.push(BidiRun::new(start..line.end, levels[start].number()));
        }
        runs
    }
}

/// Reorderer applying rule L2 through [`BidiInfo::reorder_visual`].
///
/// Mirrored glyphs (rule L4) are not substituted.
#[derive(Clone, Copy, Debug, Default)]
pub struct UnicodeBidiReorderer;

impl BidiReorderer for UnicodeBidiReorderer {
    fn reorder(&self, runs: &[BidiRun]) -> Vec<usize> {
        let levels: Vec<Level> = runs.iter().map(|run| Level::from(run.level)).collect();
        BidiInfo::reorder_visual(&levels)
    }
}

/// A configured splitter/reorderer pair applied to paragraph spans.
#[derive(Clone)]
pub struct BidiPipeline {
    splitter: Arc<dyn BidiSplitter>,
    reorderer: Arc<dyn BidiReorderer>,
}

impl BidiPipeline {
    /// Combines a splitter and a reorderer.
    pub fn new(splitter: Arc<dyn BidiSplitter>, reorderer: Arc<dyn BidiReorderer>) -> Self {
        Self {
            splitter,
            reorderer,
        }
    }

    /// Converts the text of one string to visual order.
    pub fn visual_text(&self, text: &str, base: TextDirection) -> String {
        let runs = self.splitter.split(text, base);
        self.reorderer
            .reorder(&runs)
            .into_iter()
            .filter_map(|index| runs.get(index))
            .map(|run| run.visual_text(text))
            .collect()
    }

    /// Converts the spans of one paragraph to visual order.
    ///
    /// The paragraph text is analysed as a whole; runs are then cut at span boundaries so every
    /// piece keeps the style of the span it came from.
    pub fn visual_spans(&self, spans: &[Span], base: TextDirection) -> Vec<Span> {
        let text = plain_text(spans);
        let mut bounds = Vec::with_capacity(spans.len());
        let mut offset = 0;
        for span in spans {
            bounds.push(offset..offset + span.text().len());
            offset += span.text().len();
        }

        let mut owners = Vec::new();
        let mut pieces = Vec::new();
        for run in self.splitter.split(&text, base) {
            for (owner, bound) in bounds.iter().enumerate() {
                let start = run.range.start.max(bound.start);
                let end = run.range.end.min(bound.end);
                if start < end {
                    owners.push(owner);
                    pieces.push(BidiRun::new(start..end, run.level));
                }
            }
        }

        self.reorderer
            .reorder(&pieces)
            .into_iter()
            .filter(|&index| index < pieces.len())
            .map(|index| {
                let mut span = spans[owners[index]].clone();
                span.set_text(pieces[index].visual_text(&text));
                span
            })
            .collect()
    }
}

impl std::fmt::Debug for BidiPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BidiPipeline").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::richtext::TextStyle;

    fn pipeline() -> BidiPipeline {
        BidiPipeline::new(Arc::new(UnicodeBidiSplitter), Arc::new(UnicodeBidiReorderer))
    }

    fn bold() -> TextStyle {
        TextStyle {
            bold: true,
            ..TextStyle::default()
        }
    }

    #[test]
    fn latin_text_is_a_single_ltr_run() {
        let runs = UnicodeBidiSplitter.split("hello world", TextDirection::Ltr);
        assert_eq!(runs, vec![BidiRun::new(0..11, 0)]);
    }

    #[test]
    fn hebrew_inside_latin_is_split_out() {
        let text = "abc \u{05d0}\u{05d1}\u{05d2} def";
        let runs = UnicodeBidiSplitter.split(text, TextDirection::Ltr);
        assert_eq!(runs.len(), 3);
        assert!(!runs[0].is_rtl());
        assert!(runs[1].is_rtl());
        assert_eq!(&text[runs[1].range.clone()], "\u{05d0}\u{05d1}\u{05d2}");
    }

    #[test]
    fn rtl_runs_are_reversed_for_display() {
        let visual = pipeline().visual_text("abc \u{05d0}\u{05d1}\u{05d2} def", TextDirection::Ltr);
        assert_eq!(visual, "abc \u{05d2}\u{05d1}\u{05d0} def");
    }

    #[test]
    fn reorderer_reverses_run_order_at_odd_levels() {
        let runs = vec![
            BidiRun::new(0..2, 1),
            BidiRun::new(2..4, 2),
            BidiRun::new(4..6, 1),
        ];
        assert_eq!(UnicodeBidiReorderer.reorder(&runs), vec![2, 1, 0]);
    }

    #[test]
    fn latin_spans_keep_their_order_in_rtl_paragraphs() {
        let spans = [Span::new("abc "), Span::styled("def", bold())];
        let visual = pipeline().visual_spans(&spans, TextDirection::Rtl);
        assert_eq!(plain_text(&visual), "abc def");
        assert_eq!(visual[1].text(), "def");
        assert!(visual[1].is_bold());
    }

    #[test]
    fn hebrew_split_across_spans_reads_right_to_left() {
        let spans = [
            Span::new("\u{05d0}\u{05d1} "),
            Span::styled("\u{05d2}\u{05d3}", bold()),
        ];
        let visual = pipeline().visual_spans(&spans, TextDirection::Rtl);
        assert_eq!(plain_text(&visual), "\u{05d3}\u{05d2} \u{05d1}\u{05d0}");
        assert!(visual[0].is_bold());
        assert!(!visual[1].is_bold());
    }

    #[test]
    fn mixed_runs_in_one_span_follow_the_paragraph_direction() {
        let spans = [Span::new("\u{05d0}\u{05d1} abc")];
        let visual = pipeline().visual_spans(&spans, TextDirection::Rtl);
        assert_eq!(plain_text(&visual), "abc \u{05d1}\u{05d0}");
    }

    #[test]
    fn empty_text_has_no_runs() {
        assert!(UnicodeBidiSplitter.split("", TextDirection::Rtl).is_empty());
        assert!(pipeline().visual_spans(&[], TextDirection::Rtl).is_empty());
    }

    #[test]
    fn parses_direction_keywords() {
        assert_eq!(TextDirection::parse("RTL"), Some(TextDirection::Rtl));
        assert_eq!(TextDirection::parse("auto"), None);
    }
}

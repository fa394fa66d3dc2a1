//! Glyph measuring and painting from TrueType outlines.

use resvg::tiny_skia::{FillRule, Paint, Path, PathBuilder, Pixmap, Transform};
use ttf_parser::{Face, GlyphId, OutlineBuilder};

use crate::fonts::FontBytes;

/// Selects one of the four faces of a family.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct FontKey {
    pub bold: bool,
    pub italic: bool,
}

/// The parsed faces of the default family.
pub(crate) struct GlyphFonts<'a> {
    faces: [Face<'a>; 4],
}

impl<'a> GlyphFonts<'a> {
    /// Parses regular, bold, italic and bold italic faces.
    pub(crate) fn parse(bytes: &'a FontBytes) -> Result<Self, String> {
        let parse = |data: &'a [u8], name: &str| {
            Face::parse(data, 0).map_err(|err| format!("invalid {name} font: {err}"))
        };
        Ok(Self {
            faces: [
                parse(&bytes.regular, "regular")?,
                parse(&bytes.bold, "bold")?,
                parse(&bytes.italic, "italic")?,
                parse(&bytes.bold_italic, "bold italic")?,
            ],
        })
    }

    fn face(&self, key: FontKey) -> &Face<'a> {
        &self.faces[usize::from(key.bold) + 2 * usize::from(key.italic)]
    }

    fn scale(&self, key: FontKey, size: f32) -> f32 {
        size / f32::from(self.face(key).units_per_em().max(1))
    }

    fn glyph(&self, key: FontKey, ch: char) -> GlyphId {
        self.face(key).glyph_index(ch).unwrap_or(GlyphId(0))
    }

    /// Advance width of `text` at `size` pixels.
    pub(crate) fn measure(&self, text: &str, key: FontKey, size: f32) -> f32 {
        let face = self.face(key);
        let scale = self.scale(key, size);
        text.chars()
            .map(|ch| f32::from(face.glyph_hor_advance(self.glyph(key, ch)).unwrap_or(0)) * scale)
            .sum()
    }

    /// Distance from the top of the line box to the baseline.
    pub(crate) fn ascent(&self, key: FontKey, size: f32) -> f32 {
        f32::from(self.face(key).ascender()) * self.scale(key, size)
    }

    /// Fills the glyphs of `text` with their baseline at `baseline` and returns the advance.
    pub(crate) fn draw(
        &self,
        pixmap: &mut Pixmap,
        text: &str,
        key: FontKey,
        size: f32,
        origin: (f32, f32),
        color: (u8, u8, u8),
    ) -> f32 {
        let face = self.face(key);
        let scale = self.scale(key, size);
        let (mut x, baseline) = origin;
        let mut builder = PathBuilder::new();

        for ch in text.chars() {
            let glyph = self.glyph(key, ch);
            if !ch.is_whitespace() {
                let mut sink = GlyphSink {
                    builder: &mut builder,
                    x,
                    y: baseline,
                    scale,
                };
                face.outline_glyph(glyph, &mut sink);
            }
            x += f32::from(face.glyph_hor_advance(glyph).unwrap_or(0)) * scale;
        }

        if let Some(path) = builder.finish() {
            fill(pixmap, &path, color);
        }
        x - origin.0
    }
}

fn fill(pixmap: &mut Pixmap, path: &Path, (r, g, b): (u8, u8, u8)) {
    let mut paint = Paint::default();
    paint.set_color_rgba8(r, g, b, 255);
    paint.anti_alias = true;
    pixmap.fill_path(path, &paint, FillRule::Winding, Transform::identity(), None);
}

/// Forwards font units into a path in pixel space, flipping the y axis.
struct GlyphSink<'b> {
    builder: &'b mut PathBuilder,
    x: f32,
    y: f32,
    scale: f32,
}

impl GlyphSink<'_> {
    fn tx(&self, x: f32) -> f32 {
        self.x + x * self.scale
    }

    fn ty(&self, y: f32) -> f32 {
        self.y - y * self.scale
    }
}

impl OutlineBuilder for GlyphSink<'_> {
    fn move_to(&mut self, x: f32, y: f32) {
        let (x, y) = (self.tx(x), self.ty(y));
        self.builder.move_to(x, y);
    }

    fn line_to(&mut self, x: f32, y: f32) {
        let (x, y) = (self.tx(x), self.ty(y));
        self.builder.line_to(x, y);
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        let (x1, y1, x, y) = (self.tx(x1), self.ty(y1), self.tx(x), self.ty(y));
        self.builder.quad_to(x1, y1, x, y);
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        let (x1, y1) = (self.tx(x1), self.ty(y1));
        let (x2, y2) = (self.tx(x2), self.ty(y2));
        let (x, y) = (self.tx(x), self.ty(y));
        self.builder.cubic_to(x1, y1, x2, y2, x, y);
    }

    fn close(&mut self) {
        self.builder.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fonts;

    #[test]
    fn measures_and_paints_with_the_default_family() {
        if !fonts::default_fonts_available() {
            eprintln!("skipping glyph test: bundled fonts are not available");
            return;
        }
        let bytes = fonts::default_font_bytes().expect("font bytes");
        let glyphs = GlyphFonts::parse(&bytes).expect("parse faces");
        let regular = FontKey::default();

        let short = glyphs.measure("i", regular, 16.0);
        let long = glyphs.measure("iiii", regular, 16.0);
        assert!(short > 0.0);
        assert!((long - 4.0 * short).abs() < 1e-3);
        assert!(glyphs.measure("W", regular, 32.0) > glyphs.measure("W", regular, 16.0));

        let mut pixmap = Pixmap::new(64, 32).expect("pixmap");
        let ascent = glyphs.ascent(regular, 20.0);
        let advance = glyphs.draw(&mut pixmap, "Hi", regular, 20.0, (2.0, ascent), (0, 0, 0));
        assert!(advance > 0.0);
        assert!(pixmap.pixels().iter().any(|pixel| pixel.alpha() > 0));
    }
}

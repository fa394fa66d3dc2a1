//! SVG drawing delegate backed by `resvg`.

use std::fmt;

use resvg::tiny_skia::{Pixmap, Transform};
use resvg::usvg::{self, fontdb};

const SVG_NAMESPACE: &str = "http://www.w3.org/2000/svg";

/// Failure to turn SVG markup into pixels.
#[derive(Debug)]
pub enum SvgError {
    /// `usvg` rejected the markup.
    Parse(usvg::Error),
    /// The document or the requested pixmap has no area.
    EmptySize {
        /// Requested width in pixels.
        width: u32,
        /// Requested height in pixels.
        height: u32,
    },
}

impl fmt::Display for SvgError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(err) => write!(f, "failed to parse SVG: {err}"),
            Self::EmptySize { width, height } => {
                write!(f, "cannot render SVG into a {width}x{height} pixmap")
            }
        }
    }
}

impl std::error::Error for SvgError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Parse(err) => Some(err),
            Self::EmptySize { .. } => None,
        }
    }
}

/// Rasterizes SVG markup.
pub trait SvgDrawer: Send + Sync {
    /// Renders `source` scaled to fill a `width` x `height` pixmap.
    fn render(&self, source: &str, width: u32, height: u32) -> Result<Pixmap, SvgError>;
}

/// [`SvgDrawer`] using `usvg` for parsing and `resvg` for rendering.
pub struct ResvgDrawer {
    fontdb: fontdb::Database,
}

impl ResvgDrawer {
    /// Creates a drawer with the system fonts loaded for `<text>` elements.
    pub fn new() -> Self {
        let mut fontdb = fontdb::Database::new();
        fontdb.load_system_fonts();
        Self { fontdb }
    }

    /// Creates a drawer without any fonts; `<text>` elements are skipped.
    pub fn without_fonts() -> Self {
        Self {
            fontdb: fontdb::Database::new(),
        }
    }
}

impl Default for ResvgDrawer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ResvgDrawer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResvgDrawer")
            .field("faces", &self.fontdb.len())
            .finish()
    }
}

/// Adds the SVG namespace to the root element when inline markup omits it.
pub fn with_svg_namespace(source: &str) -> String {
    let trimmed = source.trim_start();
    let Some(rest) = trimmed.strip_prefix("<svg") else {
        return source.to_owned();
    };
    let root_end = rest.find('>').unwrap_or(rest.len());
    if rest[..root_end].contains("xmlns=") {
        return source.to_owned();
    }
    format!("<svg xmlns=\"{SVG_NAMESPACE}\"{rest}")
}

/// Converts a premultiplied pixmap into a straight-alpha RGBA image.
pub fn pixmap_to_rgba(pixmap: &Pixmap) -> image::RgbaImage {
    let data = pixmap
        .pixels()
        .iter()
        .flat_map(|pixel| {
            let color = pixel.demultiply();
            [color.red(), color.green(), color.blue(), color.alpha()]
        })
        .collect::<Vec<u8>>();
    image::RgbaImage::from_raw(pixmap.width(), pixmap.height(), data)
        .unwrap_or_else(|| image::RgbaImage::new(pixmap.width(), pixmap.height()))
}

impl SvgDrawer for ResvgDrawer {
    fn render(&self, source: &str, width: u32, height: u32) -> Result<Pixmap, SvgError> {
        let source = with_svg_namespace(source);
        let tree = usvg::Tree::from_str(&source, &usvg::Options::default(), &self.fontdb)
            .map_err(SvgError::Parse)?;

        let size = tree.size();
        if size.width() <= 0.0 || size.height() <= 0.0 {
            return Err(SvgError::EmptySize { width, height });
        }
        let mut pixmap = Pixmap::new(width, height).ok_or(SvgError::EmptySize { width, height })?;

        let transform = Transform::from_scale(
            width as f32 / size.width(),
            height as f32 / size.height(),
        );
        resvg::render(&tree, transform, &mut pixmap.as_mut());
        Ok(pixmap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespace_is_added_once() {
        let fixed = with_svg_namespace("<svg width=\"10\"><rect/></svg>");
        assert!(fixed.starts_with("<svg xmlns=\"http://www.w3.org/2000/svg\" width"));

        let untouched = with_svg_namespace(&fixed);
        assert_eq!(untouched.matches("xmlns=").count(), 1);
    }

    #[test]
    fn renders_a_filled_rectangle() {
        let drawer = ResvgDrawer::without_fonts();
        let pixmap = drawer
            .render(
                "<svg width=\"10\" height=\"10\"><rect width=\"10\" height=\"10\" fill=\"#ff0000\"/></svg>",
                20,
                20,
            )
            .expect("render svg");
        assert_eq!(pixmap.width(), 20);
        let centre = pixmap.pixel(10, 10).expect("pixel in range");
        assert_eq!((centre.red(), centre.green(), centre.blue(), centre.alpha()), (255, 0, 0, 255));
    }

    #[test]
    fn pixmaps_convert_to_straight_alpha() {
        let mut pixmap = Pixmap::new(2, 1).expect("pixmap");
        pixmap.fill(resvg::tiny_skia::Color::from_rgba8(200, 100, 50, 128));
        let image = pixmap_to_rgba(&pixmap);
        let pixel = image.get_pixel(1, 0);
        assert_eq!(pixel[3], 128);
        assert!((i32::from(pixel[0]) - 200).abs() <= 2);
    }

    #[test]
    fn invalid_markup_is_a_parse_error() {
        let drawer = ResvgDrawer::without_fonts();
        let err = drawer.render("<svg", 10, 10).unwrap_err();
        assert!(matches!(err, SvgError::Parse(_)));
    }
}

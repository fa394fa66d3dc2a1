//! Pluggable painting of custom objects.
//!
//! An `<object type="...">` element whose type has a registered [`ObjectDrawer`] is painted by that
//! drawer instead of its fallback content.  Drawers paint through the [`Graphics`] trait, which the
//! PDF and raster back ends implement on top of their own canvases.  Coordinates are CSS pixels
//! relative to the top-left corner of the object box, with y growing downwards.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use genpdf::style::Color;
use log::warn;

use crate::model::CustomObject;

/// A point in object-local CSS pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Point {
    /// Horizontal offset from the left edge.
    pub x: f64,
    /// Vertical offset from the top edge.
    pub y: f64,
}

impl Point {
    /// Creates a point.
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Line width and colour.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Stroke {
    /// Width in CSS pixels.
    pub width: f64,
    /// Line colour.
    pub color: Color,
}

impl Stroke {
    /// Creates a stroke.
    pub fn new(width: f64, color: Color) -> Self {
        Self { width, color }
    }
}

/// Minimal vector canvas handed to object drawers.
pub trait Graphics {
    /// Strokes a straight line.
    fn draw_line(&mut self, from: Point, to: Point, stroke: Stroke);
}

/// Paints a custom object.
pub trait ObjectDrawer: Send + Sync {
    /// Paints `object` into a `width` x `height` (CSS pixel) box.
    fn draw_object(&self, object: &CustomObject, width: f64, height: f64, graphics: &mut dyn Graphics);
}

/// Looks up the drawer responsible for an object.
pub trait ObjectDrawerFactory: Send + Sync {
    /// Returns the drawer for `object`, if one is registered for its type.
    fn create_drawer(&self, object: &CustomObject) -> Option<Arc<dyn ObjectDrawer>>;

    /// Whether objects of `content_type` are painted by a drawer.
    fn is_replaced_object(&self, content_type: &str) -> bool;
}

/// Factory mapping exact MIME-like type strings to drawers.
#[derive(Clone, Default)]
pub struct DefaultObjectDrawerFactory {
    drawers: HashMap<String, Arc<dyn ObjectDrawer>>,
}

impl DefaultObjectDrawerFactory {
    /// Creates an empty factory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `drawer` for objects whose `type` attribute equals `content_type`.
    ///
    /// A later registration for the same type replaces the earlier one.
    pub fn register_drawer(
        &mut self,
        content_type: impl Into<String>,
        drawer: impl ObjectDrawer + 'static,
    ) -> &mut Self {
        self.drawers.insert(content_type.into(), Arc::new(drawer));
        self
    }

    /// Registered type strings, sorted.
    pub fn registered_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.drawers.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }
}

impl fmt::Debug for DefaultObjectDrawerFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DefaultObjectDrawerFactory")
            .field("types", &self.registered_types())
            .finish()
    }
}

impl ObjectDrawerFactory for DefaultObjectDrawerFactory {
    fn create_drawer(&self, object: &CustomObject) -> Option<Arc<dyn ObjectDrawer>> {
        self.drawers.get(object.content_type()).cloned()
    }

    fn is_replaced_object(&self, content_type: &str) -> bool {
        self.drawers.contains_key(content_type)
    }
}

/// Paints `object` with the drawer the factory provides.
///
/// Returns false, after logging a warning, when no drawer is registered for the object type.
pub fn paint_object(
    factory: Option<&dyn ObjectDrawerFactory>,
    object: &CustomObject,
    width: f64,
    height: f64,
    graphics: &mut dyn Graphics,
) -> bool {
    match factory.and_then(|factory| factory.create_drawer(object)) {
        Some(drawer) => {
            drawer.draw_object(object, width, height, graphics);
            true
        }
        None => {
            warn!(
                "No object drawer registered for type '{}'; leaving an empty box",
                object.content_type()
            );
            false
        }
    }
}

/// A line captured by [`RecordingGraphics`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RecordedLine {
    /// Start point.
    pub from: Point,
    /// End point.
    pub to: Point,
    /// Stroke used.
    pub stroke: Stroke,
}

impl RecordedLine {
    /// Euclidean length of the line.
    pub fn length(&self) -> f64 {
        (self.to.x - self.from.x).hypot(self.to.y - self.from.y)
    }
}

/// Graphics implementation that records every call instead of painting.
#[derive(Clone, Debug, Default)]
pub struct RecordingGraphics {
    lines: Vec<RecordedLine>,
}

impl RecordingGraphics {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines drawn so far, in call order.
    pub fn lines(&self) -> &[RecordedLine] {
        &self.lines
    }
}

impl Graphics for RecordingGraphics {
    fn draw_line(&mut self, from: Point, to: Point, stroke: Stroke) {
        self.lines.push(RecordedLine { from, to, stroke });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Cross;

    impl ObjectDrawer for Cross {
        fn draw_object(&self, _: &CustomObject, width: f64, height: f64, graphics: &mut dyn Graphics) {
            let stroke = Stroke::new(1.0, Color::Greyscale(0));
            graphics.draw_line(Point::new(0.0, 0.0), Point::new(width, height), stroke);
            graphics.draw_line(Point::new(width, 0.0), Point::new(0.0, height), stroke);
        }
    }

    #[test]
    fn factory_dispatches_on_exact_type() {
        let mut factory = DefaultObjectDrawerFactory::new();
        factory.register_drawer("custom/cross", Cross);

        assert!(factory.is_replaced_object("custom/cross"));
        assert!(!factory.is_replaced_object("custom/Cross"));

        let mut graphics = RecordingGraphics::new();
        let object = CustomObject::new("custom/cross", 10.0, 10.0);
        assert!(paint_object(Some(&factory), &object, 30.0, 40.0, &mut graphics));
        assert_eq!(graphics.lines().len(), 2);
        assert!((graphics.lines()[0].length() - 50.0).abs() < 1e-9);
    }

    #[test]
    fn unknown_type_paints_nothing() {
        let factory = DefaultObjectDrawerFactory::new();
        let mut graphics = RecordingGraphics::new();
        let object = CustomObject::new("custom/unknown", 10.0, 10.0);
        assert!(!paint_object(Some(&factory), &object, 10.0, 10.0, &mut graphics));
        assert!(graphics.lines().is_empty());
    }
}

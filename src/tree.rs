//! Sample object drawer painting a recursive fractal tree.
//!
//! Registered under [`BINARY_TREE_TYPE`], it reads three integer attributes from the object
//! element: `data-depth` (number of levels), `data-fanout` (children per branch) and `data-angle`
//! (degrees between sibling branches).

use genpdf::style::Color;
use log::warn;

use crate::drawing::{Graphics, ObjectDrawer, Point, Stroke};
use crate::model::CustomObject;

/// Object type the tree drawer is registered under.
pub const BINARY_TREE_TYPE: &str = "custom/binary-tree";

/// Length ratio between a branch and its parent.
pub const BRANCH_SHRINK: f64 = 0.95;

/// Trees with more segments than this are not drawn.
pub const MAX_TREE_SEGMENTS: u64 = 1 << 20;

const STROKE_WIDTH: f64 = 2.0;

/// Parameters of one tree, read from element attributes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TreeParams {
    /// Number of levels; the trunk is level one.
    pub depth: u32,
    /// Number of children per branch.
    pub fanout: u32,
    /// Angle in degrees between neighbouring children.
    pub angle: i32,
}

impl TreeParams {
    /// Reads `data-depth`, `data-fanout` and `data-angle` from `object`.
    ///
    /// Logs a warning and returns `None` when an attribute is missing or not an integer.
    pub fn from_object(object: &CustomObject) -> Option<Self> {
        Some(Self {
            depth: int_attribute(object, "data-depth")?,
            fanout: int_attribute(object, "data-fanout")?,
            angle: int_attribute(object, "data-angle")?,
        })
    }

    /// Number of segments a tree with these parameters consists of, saturating at `u64::MAX`.
    pub fn segment_count(&self) -> u64 {
        let fanout = u64::from(self.fanout);
        let mut total = 0u64;
        let mut level = 1u64;
        for _ in 0..self.depth {
            total = total.saturating_add(level);
            level = level.saturating_mul(fanout);
            if total == u64::MAX || level == 0 {
                break;
            }
        }
        total
    }
}

fn int_attribute<T: std::str::FromStr>(object: &CustomObject, name: &str) -> Option<T> {
    let Some(raw) = object.attribute(name) else {
        warn!(
            "Object of type '{}' is missing the {} attribute",
            object.content_type(),
            name
        );
        return None;
    };
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(
                "Object of type '{}' has a non-integer {} attribute: '{}'",
                object.content_type(),
                name,
                raw
            );
            None
        }
    }
}

/// Draws a branching line figure whose branches shrink by [`BRANCH_SHRINK`] at every level.
#[derive(Clone, Copy, Debug, Default)]
pub struct BinaryTreeDrawer;

impl ObjectDrawer for BinaryTreeDrawer {
    fn draw_object(&self, object: &CustomObject, width: f64, height: f64, graphics: &mut dyn Graphics) {
        let Some(params) = TreeParams::from_object(object) else {
            return;
        };
        if params.segment_count() > MAX_TREE_SEGMENTS {
            warn!(
                "Object of type '{}' would draw more than {} segments; skipping it",
                object.content_type(),
                MAX_TREE_SEGMENTS
            );
            return;
        }
        draw_tree(graphics, params, width, height);
    }
}

/// Draws a tree rooted at the bottom centre of a `width` x `height` box, growing upwards.
pub fn draw_tree(graphics: &mut dyn Graphics, params: TreeParams, width: f64, height: f64) {
    if params.depth == 0 {
        return;
    }
    let trunk = height / f64::from(params.depth);
    render_branch(
        graphics,
        &params,
        Point::new(width / 2.0, height),
        trunk,
        -90.0,
        params.depth,
    );
}

fn render_branch(
    graphics: &mut dyn Graphics,
    params: &TreeParams,
    start: Point,
    length: f64,
    angle_deg: f64,
    depth: u32,
) {
    let radians = angle_deg.to_radians();
    let end = Point::new(
        start.x + radians.cos() * length,
        start.y + radians.sin() * length,
    );
    let red = (255 / depth) as u8;
    graphics.draw_line(start, end, Stroke::new(STROKE_WIDTH, Color::Rgb(red, 128, 128)));

    if depth > 1 {
        let spread = f64::from(params.angle);
        let fanout = params.fanout as i64;
        let mut child_angle = angle_deg - ((fanout - 1) * i64::from(params.angle)) as f64 / 2.0;
        for _ in 0..params.fanout {
            render_branch(graphics, params, end, length * BRANCH_SHRINK, child_angle, depth - 1);
            child_angle += spread;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drawing::RecordingGraphics;

    fn tree_object(depth: &str, fanout: &str, angle: &str) -> CustomObject {
        CustomObject::new(BINARY_TREE_TYPE, 50.0, 50.0)
            .with_attribute("data-depth", depth)
            .with_attribute("data-fanout", fanout)
            .with_attribute("data-angle", angle)
    }

    fn draw(depth: &str, fanout: &str, angle: &str) -> RecordingGraphics {
        let mut graphics = RecordingGraphics::new();
        BinaryTreeDrawer.draw_object(&tree_object(depth, fanout, angle), 200.0, 300.0, &mut graphics);
        graphics
    }

    #[test]
    fn depth_one_draws_only_the_trunk() {
        let graphics = draw("1", "3", "30");
        assert_eq!(graphics.lines().len(), 1);

        let trunk = graphics.lines()[0];
        assert_eq!(trunk.from, Point::new(100.0, 300.0));
        assert!((trunk.to.x - 100.0).abs() < 1e-9);
        assert!(trunk.to.y.abs() < 1e-9);
    }

    #[test]
    fn draws_a_perfect_f_ary_tree() {
        for (depth, fanout) in [(2u32, 2u32), (4, 2), (3, 3), (5, 4)] {
            let graphics = draw(&depth.to_string(), &fanout.to_string(), "20");
            let expected = (fanout.pow(depth) - 1) / (fanout - 1);
            assert_eq!(graphics.lines().len() as u32, expected, "depth {depth} fanout {fanout}");
            let params = TreeParams { depth, fanout, angle: 20 };
            assert_eq!(params.segment_count(), u64::from(expected));
        }
    }

    #[test]
    fn each_level_shrinks_by_the_branch_ratio() {
        let graphics = draw("3", "2", "40");
        let lines = graphics.lines();
        // Depth-first order: trunk, first child, its two grandchildren, second child, ...
        let trunk = lines[0].length();
        let child = lines[1].length();
        let grandchild = lines[2].length();
        assert!((trunk - 100.0).abs() < 1e-9);
        assert!((child - trunk * BRANCH_SHRINK).abs() < 1e-9);
        assert!((grandchild - child * BRANCH_SHRINK).abs() < 1e-9);
    }

    #[test]
    fn children_start_at_the_parent_end_and_spread_evenly() {
        let graphics = draw("2", "3", "30");
        let lines = graphics.lines();
        let trunk_end = lines[0].to;
        let angles: Vec<f64> = lines[1..]
            .iter()
            .map(|line| {
                assert!((line.from.x - trunk_end.x).abs() < 1e-9);
                assert!((line.from.y - trunk_end.y).abs() < 1e-9);
                (line.to.y - line.from.y).atan2(line.to.x - line.from.x).to_degrees()
            })
            .collect();
        assert!((angles[0] + 120.0).abs() < 1e-6);
        assert!((angles[1] + 90.0).abs() < 1e-6);
        assert!((angles[2] + 60.0).abs() < 1e-6);
    }

    #[test]
    fn colour_darkens_towards_the_leaves() {
        let graphics = draw("2", "1", "0");
        assert_eq!(graphics.lines()[0].stroke.color, Color::Rgb(127, 128, 128));
        assert_eq!(graphics.lines()[1].stroke.color, Color::Rgb(255, 128, 128));
        assert_eq!(graphics.lines()[0].stroke.width, 2.0);
    }

    #[test]
    fn invalid_attributes_draw_nothing() {
        assert!(draw("deep", "2", "30").lines().is_empty());

        let mut graphics = RecordingGraphics::new();
        let object = CustomObject::new(BINARY_TREE_TYPE, 10.0, 10.0);
        BinaryTreeDrawer.draw_object(&object, 10.0, 10.0, &mut graphics);
        assert!(graphics.lines().is_empty());
    }

    #[test]
    fn huge_trees_saturate_instead_of_overflowing() {
        let params = TreeParams {
            depth: u32::MAX,
            fanout: u32::MAX,
            angle: 10,
        };
        assert_eq!(params.segment_count(), u64::MAX);

        let linear = TreeParams {
            depth: 70,
            fanout: 1,
            angle: 0,
        };
        assert_eq!(linear.segment_count(), 70);

        let stump = TreeParams {
            depth: u32::MAX,
            fanout: 0,
            angle: 0,
        };
        assert_eq!(stump.segment_count(), 1);
    }

    #[test]
    fn oversized_trees_are_skipped() {
        assert!(draw("40", "4", "10").lines().is_empty());
        assert_eq!(draw("30", "1", "0").lines().len(), 30);
    }

    #[test]
    fn zero_depth_is_empty() {
        assert!(draw("0", "2", "30").lines().is_empty());
    }
}

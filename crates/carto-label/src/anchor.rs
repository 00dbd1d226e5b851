//! Label anchors.

use glam::Vec2;

/// Geometric reference a label is placed relative to.
///
/// Point features and polygon centroids anchor to a single point; road
/// labels anchor to a sampled line segment so the label can run along it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Anchor {
    Point(Vec2),
    Segment(Vec2, Vec2),
}

impl Anchor {
    /// Placement position: the point itself, or the segment midpoint.
    pub fn position(&self) -> Vec2 {
        match *self {
            Anchor::Point(p) => p,
            Anchor::Segment(a, b) => (a + b) * 0.5,
        }
    }

    /// Placement rotation in radians; zero for point anchors.
    pub fn rotation(&self) -> f32 {
        match *self {
            Anchor::Point(_) => 0.0,
            Anchor::Segment(a, b) => {
                let d = b - a;
                d.y.atan2(d.x)
            }
        }
    }
}

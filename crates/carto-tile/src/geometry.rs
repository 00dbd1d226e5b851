//! Feature geometry in tile-local coordinates.

use glam::Vec2;

/// A single point feature (POI).
pub type Point = Vec2;

/// An ordered run of points (road, path, boundary).
#[derive(Clone, Debug, Default)]
pub struct Line {
    pub points: Vec<Vec2>,
}

impl Line {
    pub fn new(points: Vec<Vec2>) -> Self {
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// A polygon as a sequence of rings; the first ring is the outer boundary,
/// any further rings are holes.
#[derive(Clone, Debug, Default)]
pub struct Polygon {
    pub rings: Vec<Vec<Vec2>>,
}

impl Polygon {
    pub fn new(rings: Vec<Vec<Vec2>>) -> Self {
        Self { rings }
    }

    /// Total vertex count across all rings.
    pub fn vertex_count(&self) -> usize {
        self.rings.iter().map(Vec::len).sum()
    }
}

/// String-valued feature properties, in source order.
///
/// Duplicate keys are kept; lookups return the first match.
#[derive(Clone, Debug, Default)]
pub struct Properties {
    entries: Vec<(String, String)>,
}

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.entries.push((key.to_string(), value.to_string()));
        self
    }

    pub fn string(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Feature geometry variants a layer can carry.
#[derive(Clone, Debug)]
pub enum Geometry {
    Point(Point),
    Line(Line),
    Polygon(Polygon),
}

/// One map feature: geometry plus its tag properties.
#[derive(Clone, Debug)]
pub struct Feature {
    pub geometry: Geometry,
    pub properties: Properties,
}

impl Feature {
    pub fn new(geometry: Geometry, properties: Properties) -> Self {
        Self {
            geometry,
            properties,
        }
    }
}

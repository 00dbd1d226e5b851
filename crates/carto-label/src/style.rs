//! Label styles: per-geometry label extraction policies.

use carto_tile::{Feature, Geometry, Line, Point, Polygon, Properties, RawMesh, TileId};
use glam::Vec2;

use crate::anchor::Anchor;
use crate::registry::{LabelContext, LabelRequest};
use crate::session::LabelSession;

/// Segments shorter than this (tile-local units) never get a road label;
/// there is no room for readable text on them.
pub const MIN_SEGMENT_LENGTH: f32 = 0.15;

/// Polygon (centroid) labels read better a step larger than the style size.
const POLYGON_FONT_SCALE: f32 = 1.5;

/// Default SDF blur spread in pixels.
const DEFAULT_SDF_SPREAD: f32 = 2.5;

/// What a build call did to the mesh.
///
/// `NothingToDo` is the normal quiet path: the feature didn't match the
/// selector, or its geometry offered no usable anchor. It is not an error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BuildOutcome {
    /// Labels were registered; `vertices` glyph vertices were appended to
    /// the mesh (zero when no font could shape the text).
    Built { labels: usize, vertices: usize },
    /// Feature not selected or geometry degenerate; mesh untouched.
    NothingToDo,
}

/// Tag-based label selection rule.
///
/// Only features on `layer` emit labels, and the property named `text_key`
/// supplies the label text. This mirrors the classic "layer + name tag"
/// policy but is a plain value so styles can carry any rule.
#[derive(Clone, Debug)]
pub struct LabelSelector {
    pub layer: String,
    pub text_key: String,
}

impl LabelSelector {
    pub fn new(layer: &str, text_key: &str) -> Self {
        Self {
            layer: layer.to_string(),
            text_key: text_key.to_string(),
        }
    }

    fn select<'p>(&self, layer: &str, properties: &'p Properties) -> Option<&'p str> {
        if layer != self.layer {
            return None;
        }
        properties.string(&self.text_key)
    }
}

/// A label-producing style definition.
///
/// One instance per style in the scene; shared read-only across tile
/// workers. All mutation during tile processing goes through the
/// [`LabelSession`] the style opens per tile.
#[derive(Clone, Debug)]
pub struct LabelStyle {
    name: String,
    font_family: String,
    font_px: f32,
    pixel_scale: f32,
    sdf_spread: Option<f32>,
    selector: LabelSelector,
}

impl LabelStyle {
    pub fn new(name: &str, font_family: &str, font_px: f32, selector: LabelSelector) -> Self {
        Self {
            name: name.to_string(),
            font_family: font_family.to_string(),
            font_px,
            pixel_scale: 1.0,
            sdf_spread: None,
            selector,
        }
    }

    /// Render this style's glyphs as signed distance fields.
    pub fn with_sdf(mut self) -> Self {
        self.sdf_spread = Some(DEFAULT_SDF_SPREAD);
        self
    }

    /// Device pixel ratio multiplier for the font size.
    pub fn with_pixel_scale(mut self, pixel_scale: f32) -> Self {
        self.pixel_scale = pixel_scale;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_sdf(&self) -> bool {
        self.sdf_spread.is_some()
    }

    /// Begin processing one tile with this style.
    ///
    /// Blocks until the shared font context is free; the returned session
    /// must be [`finish`](LabelSession::finish)ed (or dropped, on abort)
    /// before any other tile can process labels.
    pub fn begin_tile<'a>(&self, ctx: &'a LabelContext, tile: TileId) -> LabelSession<'a> {
        log::debug!("label style {} processing tile {}", self.name, tile);
        LabelSession {
            shape: ctx.font().session(),
            ctx,
            tile,
            style_name: self.name.clone(),
            requests: Vec::new(),
        }
    }

    /// Label a point feature (POI): the anchor is the point itself.
    pub fn build_point(
        &self,
        point: Point,
        layer: &str,
        properties: &Properties,
        session: &mut LabelSession<'_>,
        mesh: &mut RawMesh,
    ) -> BuildOutcome {
        self.configure(session, 1.0);

        let mut labels = 0;
        if let Some(text) = self.selector.select(layer, properties) {
            self.emit(session, Anchor::Point(point), text);
            labels += 1;
        }

        session.shape.clear_state();
        self.harvest(session, mesh, labels)
    }

    /// Label a line feature (road) on sampled segments.
    ///
    /// Sampling steps through the line at `floor(n / 2)` vertices per step
    /// and keeps each step's leading segment, so a line yields at most two
    /// candidates. This is a cheap anti-overlap heuristic, not collision
    /// detection. Segments below [`MIN_SEGMENT_LENGTH`] are discarded.
    pub fn build_line(
        &self,
        line: &Line,
        layer: &str,
        properties: &Properties,
        session: &mut LabelSession<'_>,
        mesh: &mut RawMesh,
    ) -> BuildOutcome {
        self.configure(session, 1.0);

        let mut labels = 0;
        if let Some(text) = self.selector.select(layer, properties) {
            let points = &line.points;
            let n = points.len();
            let skip = (n / 2).max(1);

            let mut i = 0;
            while i + 1 < n {
                let p1 = points[i];
                let p2 = points[i + 1];

                if (p2 - p1).length() >= MIN_SEGMENT_LENGTH {
                    self.emit(session, Anchor::Segment(p1, p2), text);
                    labels += 1;
                }

                i += skip;
            }
        }

        session.shape.clear_state();
        self.harvest(session, mesh, labels)
    }

    /// Label a polygon feature at its vertex centroid.
    ///
    /// The centroid is the unweighted average of every boundary vertex
    /// across all rings, holes included. Area weighting would move labels
    /// on lopsided outlines; this approximation is kept deliberately so
    /// label positions stay stable with the rest of the pipeline.
    pub fn build_polygon(
        &self,
        polygon: &Polygon,
        layer: &str,
        properties: &Properties,
        session: &mut LabelSession<'_>,
        mesh: &mut RawMesh,
    ) -> BuildOutcome {
        let n = polygon.vertex_count();
        if n == 0 {
            return BuildOutcome::NothingToDo;
        }

        let mut centroid = Vec2::ZERO;
        for ring in &polygon.rings {
            for point in ring {
                centroid += *point;
            }
        }
        centroid /= n as f32;

        self.configure(session, POLYGON_FONT_SCALE);

        let mut labels = 0;
        if let Some(text) = self.selector.select(layer, properties) {
            self.emit(session, Anchor::Point(centroid), text);
            labels += 1;
        }

        session.shape.clear_state();
        self.harvest(session, mesh, labels)
    }

    /// Dispatch on a feature's geometry kind.
    pub fn build(
        &self,
        feature: &Feature,
        layer: &str,
        session: &mut LabelSession<'_>,
        mesh: &mut RawMesh,
    ) -> BuildOutcome {
        match &feature.geometry {
            Geometry::Point(point) => {
                self.build_point(*point, layer, &feature.properties, session, mesh)
            }
            Geometry::Line(line) => self.build_line(line, layer, &feature.properties, session, mesh),
            Geometry::Polygon(polygon) => {
                self.build_polygon(polygon, layer, &feature.properties, session, mesh)
            }
        }
    }

    fn configure(&self, session: &mut LabelSession<'_>, geometry_scale: f32) {
        session
            .shape
            .set_font(&self.font_family, self.font_px * self.pixel_scale * geometry_scale);
        if let Some(spread) = self.sdf_spread {
            session.shape.set_signed_distance_field(spread);
        }
    }

    fn emit(&self, session: &mut LabelSession<'_>, anchor: Anchor, text: &str) {
        let slot = session.shape.shape(text);
        let pos = anchor.position();
        session.shape.place(slot, [pos.x, pos.y], anchor.rotation());

        session.requests.push(LabelRequest {
            tile: session.tile,
            style: self.name.clone(),
            anchor,
            text: text.to_string(),
        });
    }

    fn harvest(
        &self,
        session: &mut LabelSession<'_>,
        mesh: &mut RawMesh,
        labels: usize,
    ) -> BuildOutcome {
        if labels == 0 {
            return BuildOutcome::NothingToDo;
        }

        let vertices = session.shape.take_vertices();
        if !vertices.is_empty() {
            mesh.add_vertices(bytemuck::cast_slice(&vertices), vertices.len());
        }

        BuildOutcome::Built {
            labels,
            vertices: vertices.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use carto_tile::Tile;

    fn context() -> LabelContext {
        LabelContext::new()
    }

    fn road_style() -> LabelStyle {
        LabelStyle::new("roads", "Sans", 14.0, LabelSelector::new("roads", "name"))
    }

    fn named(name: &str) -> Properties {
        Properties::new().with("name", name)
    }

    fn line(points: &[(f32, f32)]) -> Line {
        Line::new(points.iter().map(|&(x, y)| Vec2::new(x, y)).collect())
    }

    fn segments(requests: &[LabelRequest]) -> Vec<(Vec2, Vec2)> {
        requests
            .iter()
            .map(|r| match r.anchor {
                Anchor::Segment(a, b) => (a, b),
                Anchor::Point(_) => panic!("expected segment anchor"),
            })
            .collect()
    }

    #[test]
    fn test_line_sampling_five_points() {
        let ctx = context();
        let style = road_style();
        let tile_id = TileId::new(0, 0, 14);
        let mut tile = Tile::new(tile_id);
        let mut mesh = RawMesh::new();

        // n = 5 -> skip 2 -> segments (0,1) and (2,3).
        let road = line(&[(0.0, 0.0), (0.3, 0.0), (0.6, 0.0), (0.9, 0.0), (1.0, 0.0)]);

        let mut session = style.begin_tile(&ctx, tile_id);
        let outcome = style.build_line(&road, "roads", &named("5th Ave"), &mut session, &mut mesh);
        assert!(matches!(outcome, BuildOutcome::Built { labels: 2, .. }));
        session.finish(&mut tile);

        let requests = ctx.labels().take();
        let anchors = segments(&requests);
        assert_eq!(anchors.len(), 2);
        assert_eq!(anchors[0], (Vec2::new(0.0, 0.0), Vec2::new(0.3, 0.0)));
        assert_eq!(anchors[1], (Vec2::new(0.6, 0.0), Vec2::new(0.9, 0.0)));
        assert!(requests.iter().all(|r| r.tile == tile_id));
    }

    #[test]
    fn test_line_sampling_two_points() {
        let ctx = context();
        let style = road_style();
        let mut mesh = RawMesh::new();

        let road = line(&[(0.0, 0.0), (0.2, 0.0)]);

        let mut session = style.begin_tile(&ctx, TileId::new(0, 0, 0));
        let outcome = style.build_line(&road, "roads", &named("Lane"), &mut session, &mut mesh);

        assert!(matches!(outcome, BuildOutcome::Built { labels: 1, .. }));
        assert_eq!(session.label_count(), 1);
    }

    #[test]
    fn test_short_segments_are_filtered() {
        let ctx = context();
        let style = road_style();
        let mut mesh = RawMesh::new();

        let too_short = line(&[(0.0, 0.0), (0.05, 0.0)]);
        let long_enough = line(&[(0.0, 0.0), (0.2, 0.0)]);

        let mut session = style.begin_tile(&ctx, TileId::new(0, 0, 0));
        assert_eq!(
            style.build_line(&too_short, "roads", &named("x"), &mut session, &mut mesh),
            BuildOutcome::NothingToDo
        );
        assert!(mesh.is_empty());

        let outcome =
            style.build_line(&long_enough, "roads", &named("x"), &mut session, &mut mesh);
        assert!(matches!(outcome, BuildOutcome::Built { labels: 1, .. }));
    }

    #[test]
    fn test_polygon_centroid_square() {
        let ctx = context();
        let style = LabelStyle::new(
            "landuse",
            "Sans",
            14.0,
            LabelSelector::new("landuse", "name"),
        );
        let mut mesh = RawMesh::new();

        let square = Polygon::new(vec![vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(2.0, 0.0),
            Vec2::new(2.0, 2.0),
            Vec2::new(0.0, 2.0),
        ]]);

        let mut session = style.begin_tile(&ctx, TileId::new(0, 0, 0));
        let outcome =
            style.build_polygon(&square, "landuse", &named("Park"), &mut session, &mut mesh);
        assert!(matches!(outcome, BuildOutcome::Built { labels: 1, .. }));

        let mut tile = Tile::new(TileId::new(0, 0, 0));
        session.finish(&mut tile);

        let requests = ctx.labels().take();
        assert_eq!(requests[0].anchor, Anchor::Point(Vec2::new(1.0, 1.0)));

        // The centroid transform landed in the tile's buffer too.
        let buffer = tile.text_buffer("landuse").expect("buffer attached");
        assert_eq!(buffer.transforms()[0].pos, [1.0, 1.0]);
    }

    #[test]
    fn test_polygon_centroid_includes_hole_vertices() {
        let ctx = context();
        let style = LabelStyle::new(
            "landuse",
            "Sans",
            14.0,
            LabelSelector::new("landuse", "name"),
        );
        let mut mesh = RawMesh::new();

        // Outer square centered on (2,2) plus a hole ring far to one side;
        // the hole's vertices pull the average off the outer centroid.
        let donut = Polygon::new(vec![
            vec![
                Vec2::new(0.0, 0.0),
                Vec2::new(4.0, 0.0),
                Vec2::new(4.0, 4.0),
                Vec2::new(0.0, 4.0),
            ],
            vec![
                Vec2::new(3.0, 2.0),
                Vec2::new(4.0, 2.0),
                Vec2::new(4.0, 3.0),
                Vec2::new(3.0, 3.0),
            ],
        ]);

        let mut session = style.begin_tile(&ctx, TileId::new(0, 0, 0));
        let outcome =
            style.build_polygon(&donut, "landuse", &named("Commons"), &mut session, &mut mesh);
        assert!(matches!(outcome, BuildOutcome::Built { labels: 1, .. }));

        let mut tile = Tile::new(TileId::new(0, 0, 0));
        session.finish(&mut tile);

        let requests = ctx.labels().take();
        // (8 + 14) / 8 = 2.75 in x, (8 + 10) / 8 = 2.25 in y.
        assert_eq!(requests[0].anchor, Anchor::Point(Vec2::new(2.75, 2.25)));
    }

    #[test]
    fn test_empty_polygon_is_nothing_to_do() {
        let ctx = context();
        let style = LabelStyle::new(
            "landuse",
            "Sans",
            14.0,
            LabelSelector::new("landuse", "name"),
        );
        let mut mesh = RawMesh::new();

        let mut session = style.begin_tile(&ctx, TileId::new(0, 0, 0));
        let outcome = style.build_polygon(
            &Polygon::default(),
            "landuse",
            &named("void"),
            &mut session,
            &mut mesh,
        );

        assert_eq!(outcome, BuildOutcome::NothingToDo);
        assert!(mesh.is_empty());
    }

    #[test]
    fn test_unmatched_layer_emits_nothing() {
        let ctx = context();
        let style = road_style();
        let mut mesh = RawMesh::new();

        let mut session = style.begin_tile(&ctx, TileId::new(0, 0, 0));
        let outcome = style.build_point(
            Vec2::new(0.5, 0.5),
            "buildings",
            &named("Warehouse"),
            &mut session,
            &mut mesh,
        );

        assert_eq!(outcome, BuildOutcome::NothingToDo);
        assert!(mesh.is_empty());
        assert_eq!(session.label_count(), 0);
    }

    #[test]
    fn test_missing_text_property_emits_nothing() {
        let ctx = context();
        let style = road_style();
        let mut mesh = RawMesh::new();
        let props = Properties::new().with("surface", "asphalt");

        let mut session = style.begin_tile(&ctx, TileId::new(0, 0, 0));
        let outcome = style.build_line(
            &line(&[(0.0, 0.0), (1.0, 0.0)]),
            "roads",
            &props,
            &mut session,
            &mut mesh,
        );

        assert_eq!(outcome, BuildOutcome::NothingToDo);
    }

    #[test]
    fn test_aborted_session_registers_nothing_and_releases_lock() {
        let ctx = context();
        let style = road_style();
        let mut mesh = RawMesh::new();

        {
            let mut session = style.begin_tile(&ctx, TileId::new(1, 1, 1));
            style.build_line(
                &line(&[(0.0, 0.0), (1.0, 0.0)]),
                "roads",
                &named("Doomed St"),
                &mut session,
                &mut mesh,
            );
            // Dropped without finish: tile processing aborted.
        }

        assert!(ctx.labels().is_empty());

        // Next tile must proceed without deadlock.
        let mut tile = Tile::new(TileId::new(2, 2, 2));
        let session = style.begin_tile(&ctx, tile.id());
        session.finish(&mut tile);
    }

    #[test]
    fn test_point_label_custom_selector() {
        let ctx = context();
        let style = LabelStyle::new(
            "peaks",
            "Sans",
            12.0,
            LabelSelector::new("mountains", "ele"),
        );
        let mut mesh = RawMesh::new();
        let props = Properties::new().with("ele", "4810");

        let mut session = style.begin_tile(&ctx, TileId::new(0, 0, 0));
        let outcome =
            style.build_point(Vec2::new(0.3, 0.7), "mountains", &props, &mut session, &mut mesh);
        assert!(matches!(outcome, BuildOutcome::Built { labels: 1, .. }));

        let mut tile = Tile::new(TileId::new(0, 0, 0));
        session.finish(&mut tile);

        let requests = ctx.labels().take();
        assert_eq!(requests[0].text, "4810");
        assert_eq!(requests[0].style, "peaks");
    }
}

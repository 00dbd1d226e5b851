//! Headless carto demo.
//!
//! Processes a few synthetic map tiles on worker threads (serialized
//! through the shared font context), logs the resulting label requests,
//! then renders the labels and a debug overlay into an offscreen texture
//! if a GPU adapter is available.

use std::collections::HashMap;
use std::sync::Arc;

use carto_label::{BuildOutcome, LabelContext, LabelSelector, LabelStyle};
use carto_tile::{Feature, Geometry, Line, Polygon, Properties, RawMesh, Tile, TileId};
use carto_wgpu::{DebugOverlay, LabelRenderer};
use glam::Vec2;

const SCREEN_WIDTH: u32 = 800;
const SCREEN_HEIGHT: u32 = 600;
const TILE_SIZE_PX: f32 = 256.0;

/// Styles for the demo scene: SDF points of interest, plain road labels,
/// and enlarged polygon (landuse) labels.
fn demo_styles() -> Vec<LabelStyle> {
    vec![
        LabelStyle::new("pois", "Sans", 16.0, LabelSelector::new("pois", "name")).with_sdf(),
        LabelStyle::new("roads", "Sans", 13.0, LabelSelector::new("roads", "name")),
        LabelStyle::new(
            "landuse",
            "Sans",
            12.0,
            LabelSelector::new("landuse", "name"),
        ),
    ]
}

/// Synthetic tile content, in tile-local [0, 1] coordinates.
fn demo_features(tile: TileId) -> Vec<(String, Feature)> {
    let shift = (tile.x % 2) as f32 * 0.1;

    vec![
        (
            "pois".to_string(),
            Feature::new(
                Geometry::Point(Vec2::new(0.3 + shift, 0.25)),
                Properties::new().with("name", "Fountain").with("kind", "amenity"),
            ),
        ),
        (
            "pois".to_string(),
            Feature::new(
                Geometry::Point(Vec2::new(0.7, 0.6 + shift)),
                Properties::new().with("name", "Museum"),
            ),
        ),
        (
            "roads".to_string(),
            Feature::new(
                Geometry::Line(Line::new(vec![
                    Vec2::new(0.05, 0.8),
                    Vec2::new(0.35, 0.75),
                    Vec2::new(0.55, 0.7),
                    Vec2::new(0.8, 0.72),
                    Vec2::new(0.95, 0.78),
                ])),
                Properties::new().with("name", "Harbor Road"),
            ),
        ),
        (
            "landuse".to_string(),
            Feature::new(
                Geometry::Polygon(Polygon::new(vec![vec![
                    Vec2::new(0.1, 0.1),
                    Vec2::new(0.5, 0.1),
                    Vec2::new(0.5, 0.45),
                    Vec2::new(0.1, 0.45),
                ]])),
                Properties::new().with("name", "City Park"),
            ),
        ),
    ]
}

/// Extract labels for one tile across all styles.
///
/// Each style's session blocks on the shared font context, so concurrent
/// calls from different worker threads serialize here.
fn process_tile(
    ctx: &LabelContext,
    styles: &[LabelStyle],
    id: TileId,
) -> (Tile, HashMap<String, RawMesh>) {
    let mut tile = Tile::new(id);
    let mut meshes = HashMap::new();

    for style in styles {
        let mut mesh = RawMesh::new();
        let mut session = style.begin_tile(ctx, id);
        let mut built = 0;

        for (layer, feature) in demo_features(id) {
            match style.build(&feature, &layer, &mut session, &mut mesh) {
                BuildOutcome::Built { labels, vertices } => {
                    built += labels;
                    log::debug!(
                        "tile {id} style {}: {labels} labels, {vertices} vertices",
                        style.name()
                    );
                }
                BuildOutcome::NothingToDo => {}
            }
        }

        session.finish(&mut tile);
        log::info!("✓ tile {id} style {}: {built} labels", style.name());
        meshes.insert(style.name().to_string(), mesh);
    }

    (tile, meshes)
}

fn draw_frame(ctx: &LabelContext, styles: &[LabelStyle], tiles: &[(Tile, HashMap<String, RawMesh>)]) {
    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());

    let adapter = match pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
        power_preference: wgpu::PowerPreference::HighPerformance,
        compatible_surface: None,
        force_fallback_adapter: false,
    })) {
        Ok(adapter) => adapter,
        Err(err) => {
            log::warn!("no GPU adapter available ({err}); skipping the draw pass");
            return;
        }
    };

    log::info!("✓ Using GPU: {}", adapter.get_info().name);

    let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
        label: Some("Device"),
        required_features: wgpu::Features::empty(),
        required_limits: wgpu::Limits::default(),
        memory_hints: wgpu::MemoryHints::default(),
        experimental_features: wgpu::ExperimentalFeatures::default(),
        trace: wgpu::Trace::Off,
    }))
    .expect("device request failed");

    let format = wgpu::TextureFormat::Rgba8UnormSrgb;
    let frame_texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Offscreen Frame"),
        size: wgpu::Extent3d {
            width: SCREEN_WIDTH,
            height: SCREEN_HEIGHT,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    });
    let frame_view = frame_texture.create_view(&wgpu::TextureViewDescriptor::default());

    let mut renderer = LabelRenderer::new(&device, format, Arc::clone(ctx.font()));
    let mut overlay = DebugOverlay::new(&device, format);

    renderer.begin_frame(&queue, SCREEN_WIDTH as f32, SCREEN_HEIGHT as f32);

    for (index, (tile, meshes)) in tiles.iter().enumerate() {
        let origin = Vec2::new(144.0 + index as f32 * (TILE_SIZE_PX + 32.0), 172.0);

        for style in styles {
            if let Some(mesh) = meshes.get(style.name()) {
                renderer.prepare_tile(&device, &queue, tile, style, mesh, origin, TILE_SIZE_PX);
            }
        }

        overlay.rect(origin, origin + Vec2::splat(TILE_SIZE_PX));
    }

    log::info!("✓ {} tile meshes prepared", renderer.prepared_count());

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("Frame Encoder"),
    });

    // Clear to a dark background before the label overlay draws on top.
    encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some("Clear Pass"),
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
            view: &frame_view,
            resolve_target: None,
            ops: wgpu::Operations {
                load: wgpu::LoadOp::Clear(wgpu::Color {
                    r: 0.08,
                    g: 0.09,
                    b: 0.11,
                    a: 1.0,
                }),
                store: wgpu::StoreOp::Store,
            },
            depth_slice: None,
        })],
        depth_stencil_attachment: None,
        timestamp_writes: None,
        occlusion_query_set: None,
    });

    renderer.render(&mut encoder, &frame_view);
    overlay.render(&device, &queue, &mut encoder, &frame_view, ctx.font().projection());

    queue.submit(std::iter::once(encoder.finish()));
    log::info!("✓ Frame submitted");
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("Starting carto label pipeline demo...");

    let ctx = LabelContext::new();
    let styles = demo_styles();

    let tile_ids = [TileId::new(4, 6, 4), TileId::new(5, 6, 4)];

    // Tile processing runs in parallel; shaping serializes on the shared
    // font context inside each style session.
    let ctx_ref = &ctx;
    let styles_ref = &styles[..];
    let tiles: Vec<(Tile, HashMap<String, RawMesh>)> = std::thread::scope(|scope| {
        let handles: Vec<_> = tile_ids
            .iter()
            .map(|&id| scope.spawn(move || process_tile(ctx_ref, styles_ref, id)))
            .collect();

        handles
            .into_iter()
            .map(|handle| handle.join().expect("tile worker panicked"))
            .collect()
    });

    let requests = ctx.labels().take();
    log::info!("✓ {} label requests registered", requests.len());
    for request in &requests {
        log::debug!(
            "label {:?} on tile {} ({}): {:?}",
            request.text,
            request.tile,
            request.style,
            request.anchor
        );
    }

    draw_frame(&ctx, &styles, &tiles);
}

//! # carto-wgpu
//!
//! WGPU rendering backend for carto labels.
//!
//! [`LabelRenderer`] owns the GPU side of the label pipeline: the shared
//! glyph atlas texture, the text pipelines (plain coverage and SDF), the
//! frame globals, and one vertex buffer + transform texture per prepared
//! (tile, style) pair. Labels draw as a screen-space overlay: alpha
//! blending on, depth testing off. Both are baked into the pipelines and
//! scoped to the label render pass, so no state can leak into other
//! passes.

mod overlay;
mod vertex;

pub use overlay::DebugOverlay;
pub use vertex::{glyph_vertex_layout, OverlayVertex};

use std::collections::HashMap;
use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use carto_label::LabelStyle;
use carto_text::{FontContext, LabelTransform};
use carto_tile::{RawMesh, Tile, TileId};
use glam::Vec2;

/// Frame-level shader inputs shared by every label draw.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
struct Globals {
    proj: [[f32; 4]; 4],
    color: [f32; 4],
    resolution: [f32; 2],
    _pad: [f32; 2],
}

/// GPU state for one prepared (tile, style) pair.
struct TileSlot {
    vertex_buffer: wgpu::Buffer,
    vertex_count: u32,
    transforms_bind_group: wgpu::BindGroup,
    // Texture must outlive its bind group.
    _transforms_texture: wgpu::Texture,
    sdf: bool,
}

/// WGPU renderer for carto label meshes.
pub struct LabelRenderer {
    font: Arc<FontContext>,

    text_pipeline: wgpu::RenderPipeline,
    sdf_pipeline: wgpu::RenderPipeline,

    globals_buffer: wgpu::Buffer,
    globals_bind_group: wgpu::BindGroup,

    atlas_texture: wgpu::Texture,
    atlas_bind_group: wgpu::BindGroup,

    transforms_layout: wgpu::BindGroupLayout,
    tiles: HashMap<(TileId, String), TileSlot>,

    color: [f32; 4],
}

impl LabelRenderer {
    pub fn new(
        device: &wgpu::Device,
        target_format: wgpu::TextureFormat,
        font: Arc<FontContext>,
    ) -> Self {
        let atlas_size = font.atlas_size();

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Carto Text Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/text.wgsl").into()),
        });

        // Globals: projection + base color + resolution.
        let globals_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Carto Text Globals Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let globals_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Carto Text Globals Buffer"),
            size: std::mem::size_of::<Globals>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let globals_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Carto Text Globals Bind Group"),
            layout: &globals_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: globals_buffer.as_entire_binding(),
            }],
        });

        // Shared glyph atlas (R8 coverage / SDF).
        let atlas_texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Carto Glyph Atlas"),
            size: wgpu::Extent3d {
                width: atlas_size,
                height: atlas_size,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::R8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        let atlas_view = atlas_texture.create_view(&wgpu::TextureViewDescriptor::default());

        // Linear filtering: SDF decoding needs smooth distance samples, and
        // plain coverage tolerates it.
        let atlas_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Carto Glyph Atlas Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let atlas_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Carto Glyph Atlas Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let atlas_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Carto Glyph Atlas Bind Group"),
            layout: &atlas_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&atlas_view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&atlas_sampler),
                },
            ],
        });

        // Per-tile transform texture, read in the vertex stage by slot.
        let transforms_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Carto Label Transforms Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: false },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            }],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Carto Text Pipeline Layout"),
            bind_group_layouts: &[&globals_layout, &atlas_layout, &transforms_layout],
            push_constant_ranges: &[],
        });

        let make_pipeline = |label: &str, fragment_entry: &str| {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(label),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: Some("vs_main"),
                    buffers: &[vertex::glyph_vertex_layout()],
                    compilation_options: Default::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: Some(fragment_entry),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: target_format,
                        blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: Default::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    strip_index_format: None,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: None,
                    polygon_mode: wgpu::PolygonMode::Fill,
                    unclipped_depth: false,
                    conservative: false,
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            })
        };

        let text_pipeline = make_pipeline("Carto Text Pipeline", "fs_main");
        let sdf_pipeline = make_pipeline("Carto Text SDF Pipeline", "fs_sdf");

        Self {
            font,
            text_pipeline,
            sdf_pipeline,
            globals_buffer,
            globals_bind_group,
            atlas_texture,
            atlas_bind_group,
            transforms_layout,
            tiles: HashMap::new(),
            color: [1.0, 1.0, 1.0, 1.0],
        }
    }

    /// Base label color for subsequent frames.
    pub fn set_color(&mut self, color: [f32; 4]) {
        self.color = color;
    }

    /// Per-frame setup: push the screen size into the font context, write
    /// the frame globals, and flush any glyph bitmaps rasterized since the
    /// last frame into the atlas texture.
    pub fn begin_frame(&mut self, queue: &wgpu::Queue, width: f32, height: f32) {
        self.font.set_screen_size(width, height);

        let globals = Globals {
            proj: self.font.projection().to_cols_array_2d(),
            color: self.color,
            resolution: [width, height],
            _pad: [0.0; 2],
        };
        queue.write_buffer(&self.globals_buffer, 0, bytemuck::bytes_of(&globals));

        let uploads = self.font.take_atlas_uploads();
        if !uploads.is_empty() {
            log::debug!("uploading {} glyph bitmaps to the atlas", uploads.len());
        }
        for upload in uploads {
            queue.write_texture(
                wgpu::TexelCopyTextureInfo {
                    texture: &self.atlas_texture,
                    mip_level: 0,
                    origin: wgpu::Origin3d {
                        x: upload.x,
                        y: upload.y,
                        z: 0,
                    },
                    aspect: wgpu::TextureAspect::All,
                },
                &upload.pixels,
                wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(upload.width),
                    rows_per_image: Some(upload.height),
                },
                wgpu::Extent3d {
                    width: upload.width,
                    height: upload.height,
                    depth_or_array_layers: 1,
                },
            );
        }
    }

    /// Upload one tile's label mesh and transform texture.
    ///
    /// `tile_origin_px`/`tile_scale_px` map the buffer's tile-local anchor
    /// coordinates into screen pixels for the transform texture. Tiles
    /// whose buffer holds no labels are dropped from the draw set.
    pub fn prepare_tile(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        tile: &Tile,
        style: &LabelStyle,
        mesh: &RawMesh,
        tile_origin_px: Vec2,
        tile_scale_px: f32,
    ) {
        let key = (tile.id(), style.name().to_string());

        let Some(buffer) = tile.text_buffer(style.name()) else {
            self.tiles.remove(&key);
            return;
        };
        if mesh.is_empty() || buffer.transforms().is_empty() {
            self.tiles.remove(&key);
            return;
        }

        let vertex_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Carto Label Vertex Buffer"),
            size: mesh.bytes().len() as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        queue.write_buffer(&vertex_buffer, 0, mesh.bytes());

        // Anchor positions go from tile-local units to screen pixels here;
        // rotation and alpha pass through.
        let texels: Vec<LabelTransform> = buffer
            .transforms()
            .iter()
            .map(|t| LabelTransform {
                pos: [
                    tile_origin_px.x + t.pos[0] * tile_scale_px,
                    tile_origin_px.y + t.pos[1] * tile_scale_px,
                ],
                rotation: t.rotation,
                alpha: t.alpha,
            })
            .collect();

        let transforms_texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Carto Label Transform Texture"),
            size: wgpu::Extent3d {
                width: texels.len() as u32,
                height: 1,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba32Float,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &transforms_texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            bytemuck::cast_slice(&texels),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(std::mem::size_of::<LabelTransform>() as u32
                    * texels.len() as u32),
                rows_per_image: Some(1),
            },
            wgpu::Extent3d {
                width: texels.len() as u32,
                height: 1,
                depth_or_array_layers: 1,
            },
        );

        let transforms_view =
            transforms_texture.create_view(&wgpu::TextureViewDescriptor::default());
        let transforms_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Carto Label Transforms Bind Group"),
            layout: &self.transforms_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&transforms_view),
            }],
        });

        self.tiles.insert(
            key,
            TileSlot {
                vertex_buffer,
                vertex_count: mesh.vertex_count() as u32,
                transforms_bind_group,
                _transforms_texture: transforms_texture,
                sdf: style.is_sdf(),
            },
        );
    }

    /// Draw every prepared tile in one label pass over `target`.
    ///
    /// The pass loads the existing frame content; blending and depth state
    /// live in the pipelines and end with the pass.
    pub fn render(&self, encoder: &mut wgpu::CommandEncoder, target: &wgpu::TextureView) {
        if self.tiles.is_empty() {
            return;
        }

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Carto Label Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        pass.set_bind_group(0, &self.globals_bind_group, &[]);
        pass.set_bind_group(1, &self.atlas_bind_group, &[]);

        for slot in self.tiles.values() {
            pass.set_pipeline(if slot.sdf {
                &self.sdf_pipeline
            } else {
                &self.text_pipeline
            });
            pass.set_bind_group(2, &slot.transforms_bind_group, &[]);
            pass.set_vertex_buffer(0, slot.vertex_buffer.slice(..));
            pass.draw(0..slot.vertex_count, 0..1);
        }
    }

    /// Free GPU state for a tile that left the view.
    pub fn drop_tile(&mut self, id: TileId) {
        self.tiles.retain(|(tile, _), _| *tile != id);
    }

    /// Number of (tile, style) pairs currently prepared for drawing.
    pub fn prepared_count(&self) -> usize {
        self.tiles.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_globals_layout_matches_shader_struct() {
        // text.wgsl Globals: mat4x4 + vec4 color + vec2 resolution + pad.
        assert_eq!(std::mem::size_of::<Globals>(), 64 + 16 + 8 + 8);
    }

    #[test]
    fn test_transform_texel_is_one_rgba32f() {
        assert_eq!(std::mem::size_of::<carto_text::LabelTransform>(), 16);
    }
}

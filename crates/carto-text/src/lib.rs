//! Text shaping and glyph management for carto map tiles.
//!
//! This crate owns the one shared, stateful text resource of the renderer:
//! the [`FontContext`]. Tile workers acquire a [`ShapeSession`] (a scoped
//! lock over the context), shape label text into a per-tile [`TextBuffer`],
//! and hand the finished buffer back to the tile. The context also owns the
//! process-wide [`atlas::GlyphAtlas`]; rasterized glyph coverage (or SDF)
//! bitmaps are queued there until the renderer flushes them into the GPU
//! texture.
//!
//! Nothing in here knows about tiles or wgpu; the tile model lives in
//! `carto-tile` and GPU upload in `carto-wgpu`.

pub mod atlas;
pub mod buffer;
pub mod context;
pub mod sdf;

pub use buffer::{GlyphVertex, LabelTransform, TextBuffer};
pub use context::{FontContext, ShapeSession};

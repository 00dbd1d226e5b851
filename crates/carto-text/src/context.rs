//! The shared font context and its per-tile shaping session.
//!
//! Tile geometry processing runs on worker threads, but shaping goes
//! through exactly one stateful engine (`cosmic-text`'s `FontSystem` plus
//! the swash raster cache) and one glyph atlas. [`FontContext`] wraps both
//! behind a mutex; [`FontContext::session`] is the only way in. The
//! returned [`ShapeSession`] holds the guard, so at most one tile shapes at
//! a time and the lock is released on any exit path, including panics.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use cosmic_text::{
    fontdb, Attrs, Buffer, Family, FontSystem, Metrics, Shaping, SwashCache, SwashContent,
};
use glam::Mat4;

use crate::atlas::{AtlasInsert, GlyphAtlas, GlyphKey, PendingUpload};
use crate::buffer::{GlyphVertex, TextBuffer};
use crate::sdf;

const ATLAS_SIZE_PX: u32 = 1024;
const ATLAS_PADDING_PX: u32 = 1;
const DEFAULT_FONT_PX: f32 = 14.0;

struct FontCore {
    font_system: FontSystem,
    swash_cache: SwashCache,
    atlas: GlyphAtlas,

    // Stable atlas ids for resolved faces; glyph indices are face-local.
    font_keys: HashMap<fontdb::ID, u64>,

    // Transient shaping state, reset by `clear_state`.
    family: Option<String>,
    font_px: f32,
    sdf_spread: Option<f32>,

    screen_size: [f32; 2],
}

/// Process-wide text shaping resource.
///
/// Constructed once by the renderer and shared (via `Arc`) with every tile
/// worker. All font/atlas state lives behind one mutex; see the module docs
/// for the locking discipline.
pub struct FontContext {
    core: Mutex<FontCore>,
}

impl FontContext {
    /// Create a context backed by the system font database.
    pub fn new() -> Self {
        Self {
            core: Mutex::new(FontCore {
                font_system: FontSystem::new(),
                swash_cache: SwashCache::new(),
                atlas: GlyphAtlas::new(ATLAS_SIZE_PX, ATLAS_PADDING_PX),
                font_keys: HashMap::new(),
                family: None,
                font_px: DEFAULT_FONT_PX,
                sdf_spread: None,
                screen_size: [0.0, 0.0],
            }),
        }
    }

    /// Register a font from raw TTF/OTF bytes.
    pub fn load_font_data(&self, bytes: Vec<u8>) {
        self.lock_core().font_system.db_mut().load_font_data(bytes);
    }

    /// Acquire the shaping lock and start a fresh [`TextBuffer`].
    ///
    /// Blocks until any previous session (on any thread) has been dropped.
    pub fn session(&self) -> ShapeSession<'_> {
        ShapeSession {
            core: self.lock_core(),
            buffer: TextBuffer::new(),
        }
    }

    /// Frame-level screen size, pushed by the renderer each frame.
    pub fn set_screen_size(&self, width: f32, height: f32) {
        self.lock_core().screen_size = [width, height];
    }

    /// Top-left-origin orthographic projection over the current screen.
    ///
    /// Valid between `set_screen_size` calls; identity while the screen
    /// size is still zero.
    pub fn projection(&self) -> Mat4 {
        let [w, h] = self.lock_core().screen_size;
        if w <= 0.0 || h <= 0.0 {
            return Mat4::IDENTITY;
        }
        Mat4::orthographic_rh(0.0, w, h, 0.0, -1.0, 1.0)
    }

    /// Atlas texture dimensions (square), for the GPU side.
    pub fn atlas_size(&self) -> u32 {
        self.lock_core().atlas.size()
    }

    /// Drain glyph bitmaps waiting for atlas-texture upload.
    pub fn take_atlas_uploads(&self) -> Vec<PendingUpload> {
        self.lock_core().atlas.take_pending()
    }

    fn lock_core(&self) -> MutexGuard<'_, FontCore> {
        // A panic while shaping is a broken engine; propagate it.
        self.core.lock().expect("font context poisoned")
    }
}

impl Default for FontContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Exclusive shaping access for one tile's label extraction.
///
/// Owns the context guard and the tile's in-progress buffer. Dropping the
/// session without [`finish`](Self::finish) discards the buffer but still
/// releases the lock, so aborted tile processing can never deadlock the
/// next tile.
pub struct ShapeSession<'a> {
    core: MutexGuard<'a, FontCore>,
    buffer: TextBuffer,
}

impl ShapeSession<'_> {
    /// Select font face and pixel size for subsequent shaping.
    pub fn set_font(&mut self, family: &str, font_px: f32) {
        self.core.family = Some(family.to_string());
        self.core.font_px = font_px.max(1.0);
    }

    /// Switch subsequent shaping to SDF glyphs with the given blur spread.
    pub fn set_signed_distance_field(&mut self, spread: f32) {
        self.core.sdf_spread = Some(spread);
    }

    /// Reset transient font/SDF state after a shaping batch.
    ///
    /// Does not touch the buffer.
    pub fn clear_state(&mut self) {
        self.core.family = None;
        self.core.font_px = DEFAULT_FONT_PX;
        self.core.sdf_spread = None;
    }

    /// Shape one line of label text into the buffer.
    ///
    /// Allocates and returns the label's transform slot. Glyph quads are
    /// centered on the (future) anchor; the transform texture moves them
    /// into place at draw time. Missing fonts shape to zero glyphs, which
    /// leaves the vertex stream untouched; the slot is still allocated so
    /// slot numbering stays in step with registered labels.
    pub fn shape(&mut self, text: &str) -> u32 {
        let slot = self.buffer.alloc_slot();
        let quads = self.core.shape_line(text, slot);
        self.buffer.push_vertices(&quads);
        slot
    }

    /// Record placement for a shaped label's transform slot.
    pub fn place(&mut self, slot: u32, pos: [f32; 2], rotation: f32) {
        self.buffer.place(slot, pos, rotation);
    }

    /// Drain vertices shaped since the last harvest.
    pub fn take_vertices(&mut self) -> Vec<GlyphVertex> {
        self.buffer.take_vertices()
    }

    /// Number of labels shaped into this session's buffer so far.
    pub fn label_count(&self) -> usize {
        self.buffer.label_count()
    }

    /// End the session, releasing the lock and yielding the buffer for
    /// attachment to its tile.
    pub fn finish(self) -> TextBuffer {
        self.buffer
    }
}

impl FontCore {
    /// Atlas-side id for a resolved face.
    ///
    /// Glyph indices only mean something within their face, so the atlas
    /// key must carry which face shaped the glyph or two families at the
    /// same pixel size would share cache entries.
    fn font_key(&mut self, id: fontdb::ID) -> u64 {
        let next = self.font_keys.len() as u64;
        *self.font_keys.entry(id).or_insert(next)
    }

    fn shape_line(&mut self, text: &str, slot: u32) -> Vec<GlyphVertex> {
        let font_px = self.font_px;
        let metrics = Metrics::new(font_px, font_px * 1.2);
        let mut buffer = Buffer::new(&mut self.font_system, metrics);

        // Single-line labels: prevent wrapping with an unbounded width.
        buffer.set_size(
            &mut self.font_system,
            Some(f32::MAX),
            Some(metrics.line_height),
        );

        let attrs = match &self.family {
            Some(name) => Attrs::new().family(Family::Name(name)),
            None => Attrs::new().family(Family::SansSerif),
        };
        buffer.set_text(&mut self.font_system, text, &attrs, Shaping::Advanced, None);
        buffer.shape_until_scroll(&mut self.font_system, false);

        let mut out = Vec::new();

        let Some(run) = buffer.layout_runs().next() else {
            return out;
        };

        // Center the line box on the anchor; the transform texture supplies
        // the anchor position and rotation at draw time.
        let x_off = -run.line_w * 0.5;
        let y_off = -run.line_height * 0.5;

        let glyphs: Vec<_> = run
            .glyphs
            .iter()
            .map(|glyph| (glyph.physical((0.0, 0.0), 1.0), run.line_y))
            .collect();

        for (physical, line_y) in glyphs {
            let px = f32::from_bits(physical.cache_key.font_size_bits)
                .round()
                .max(1.0) as u16;
            let variant = match self.sdf_spread {
                Some(spread) => GlyphKey::sdf_variant(spread),
                None => 0,
            };
            let font = self.font_key(physical.cache_key.font_id);
            let key = GlyphKey::new(font, physical.cache_key.glyph_id as u32, px, variant);

            let placed = match self.atlas.get(&key) {
                Some(placed) => Some(placed),
                None => self.rasterize(key, physical.cache_key),
            };
            let Some(placed) = placed else {
                continue;
            };
            if placed.size_px[0] == 0 || placed.size_px[1] == 0 {
                // Whitespace glyph: advances the pen, draws nothing.
                continue;
            }

            let min_x = x_off + physical.x as f32 + placed.bearing_px[0] as f32;
            let min_y = y_off + line_y + physical.y as f32 + placed.bearing_px[1] as f32;
            let max_x = min_x + placed.size_px[0] as f32;
            let max_y = min_y + placed.size_px[1] as f32;

            let uv = placed.uv;
            let s = slot as f32;

            out.push(GlyphVertex::new([min_x, min_y], [uv.min[0], uv.min[1]], s));
            out.push(GlyphVertex::new([min_x, max_y], [uv.min[0], uv.max[1]], s));
            out.push(GlyphVertex::new([max_x, max_y], [uv.max[0], uv.max[1]], s));
            out.push(GlyphVertex::new([min_x, min_y], [uv.min[0], uv.min[1]], s));
            out.push(GlyphVertex::new([max_x, max_y], [uv.max[0], uv.max[1]], s));
            out.push(GlyphVertex::new([max_x, min_y], [uv.max[0], uv.min[1]], s));
        }

        out
    }

    fn rasterize(
        &mut self,
        key: GlyphKey,
        cache_key: cosmic_text::CacheKey,
    ) -> Option<crate::atlas::PlacedGlyph> {
        let image = self
            .swash_cache
            .get_image(&mut self.font_system, cache_key)
            .clone()?;

        // Color glyphs (emoji) would need an RGBA atlas; skip them.
        if image.content != SwashContent::Mask {
            return None;
        }

        let w = image.placement.width as usize;
        let h = image.placement.height as usize;

        // Swash placement: `left` is the x bearing, `top` is measured up
        // from the baseline, so it flips sign in our y-down space.
        let mut bearing = [image.placement.left, -image.placement.top];

        let (pixels, out_w, out_h) = match self.sdf_spread {
            Some(spread) => {
                let pad = spread.ceil().max(1.0) as usize;
                let (padded, pw, ph) = sdf::pad_mask(&image.data, w, h, pad);
                bearing[0] -= pad as i32;
                bearing[1] -= pad as i32;
                (sdf::distance_field(&padded, pw, ph, spread), pw, ph)
            }
            None => (image.data, w, h),
        };

        match self
            .atlas
            .insert(key, [out_w as u32, out_h as u32], bearing, &pixels)
        {
            AtlasInsert::Placed(placed) | AtlasInsert::AlreadyPresent(placed) => Some(placed),
            AtlasInsert::Full => {
                log::warn!(
                    "glyph atlas full; dropping glyph {} at {}px",
                    key.glyph_id,
                    key.font_px
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_sessions_are_mutually_exclusive() {
        let context = Arc::new(FontContext::new());
        let active = Arc::new(AtomicUsize::new(0));
        let mut handles = Vec::new();

        for _ in 0..4 {
            let context = Arc::clone(&context);
            let active = Arc::clone(&active);
            handles.push(std::thread::spawn(move || {
                for _ in 0..10 {
                    let mut session = context.session();
                    let now = active.fetch_add(1, Ordering::SeqCst);
                    assert_eq!(now, 0, "two sessions active at once");

                    session.set_font("Sans", 12.0);
                    let slot = session.shape("road");
                    session.place(slot, [0.5, 0.5], 0.0);

                    active.fetch_sub(1, Ordering::SeqCst);
                    drop(session);
                }
            }));
        }

        for handle in handles {
            handle.join().expect("worker panicked");
        }
    }

    #[test]
    fn test_dropped_session_releases_lock() {
        let context = FontContext::new();

        {
            let mut session = context.session();
            session.set_font("Sans", 12.0);
            session.shape("abandoned");
            // No finish: simulate tile processing aborting partway.
        }

        // Must not deadlock, and must start from a clean buffer.
        let session = context.session();
        assert_eq!(session.label_count(), 0);
    }

    #[test]
    fn test_finish_returns_buffer_with_slots() {
        let context = FontContext::new();
        let mut session = context.session();

        let slot = session.shape("Museum");
        session.place(slot, [1.0, 2.0], 0.0);
        let buffer = session.finish();

        assert_eq!(buffer.label_count(), 1);
        assert_eq!(buffer.transforms()[0].pos, [1.0, 2.0]);
    }

    #[test]
    fn test_clear_state_resets_font_selection() {
        let context = FontContext::new();
        let mut session = context.session();

        session.set_font("Sans", 32.0);
        session.set_signed_distance_field(2.5);
        session.clear_state();

        assert_eq!(session.core.font_px, DEFAULT_FONT_PX);
        assert!(session.core.family.is_none());
        assert!(session.core.sdf_spread.is_none());
    }

    #[test]
    fn test_font_keys_are_stable_and_per_face() {
        let context = FontContext::new();
        let mut core = context.lock_core();

        let faces: Vec<fontdb::ID> = core
            .font_system
            .db()
            .faces()
            .map(|face| face.id)
            .take(2)
            .collect();

        // Works with whatever faces the host has; skip quietly without any.
        if let Some(&first) = faces.first() {
            assert_eq!(core.font_key(first), core.font_key(first));
        }
        if let [a, b] = faces[..] {
            assert_ne!(core.font_key(a), core.font_key(b));
        }
    }

    #[test]
    fn test_projection_tracks_screen_size() {
        let context = FontContext::new();
        assert_eq!(context.projection(), Mat4::IDENTITY);

        context.set_screen_size(800.0, 600.0);
        let proj = context.projection();

        // Top-left origin: (0,0) maps to clip (-1, 1).
        let corner = proj * glam::Vec4::new(0.0, 0.0, 0.0, 1.0);
        assert!((corner.x + 1.0).abs() < 1e-6);
        assert!((corner.y - 1.0).abs() < 1e-6);
    }
}

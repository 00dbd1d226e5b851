//! Glyph atlas placement + CPU-side cache.
//!
//! One atlas serves the whole process; it grows only in content, never in
//! size. The allocator is a row-based shelf packer:
//! - the atlas is partitioned into horizontal shelves (rows)
//! - each insertion goes into the first shelf that fits, otherwise a new
//!   shelf is opened
//!
//! Not optimal packing, but fast and predictable, which matters because
//! insertions happen under the font-context lock during tile processing.
//!
//! The atlas itself is GPU-agnostic. Accepted bitmaps are kept in a pending
//! queue until the renderer drains it ([`GlyphAtlas::take_pending`]) and
//! copies each rect into the atlas texture.

use std::collections::HashMap;

/// Key identifying a cached glyph bitmap.
///
/// `variant` separates rendering modes that rasterize differently from the
/// same glyph id (plain coverage vs. SDF at a given spread).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GlyphKey {
    /// Stable per-face identifier assigned by the font context.
    pub font_id: u64,
    /// Glyph index within the font (not a Unicode scalar).
    pub glyph_id: u32,
    /// Rasterized size in pixels (rounded).
    pub font_px: u16,
    /// Mode bits, see [`GlyphKey::sdf_variant`].
    pub variant: u16,
}

impl GlyphKey {
    pub const fn new(font_id: u64, glyph_id: u32, font_px: u16, variant: u16) -> Self {
        Self {
            font_id,
            glyph_id,
            font_px,
            variant,
        }
    }

    /// Variant bits for SDF mode at the given blur spread.
    ///
    /// Spread is quantized to quarter pixels; 0 is reserved for plain
    /// coverage so the two modes never share cache entries.
    pub fn sdf_variant(spread: f32) -> u16 {
        1 + (spread.max(0.0) * 4.0).round() as u16
    }
}

/// UV rectangle in normalized atlas coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct UvRect {
    pub min: [f32; 2],
    pub max: [f32; 2],
}

/// A cached glyph placement.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlacedGlyph {
    /// Bitmap size in pixels (excluding atlas padding).
    pub size_px: [u32; 2],
    /// Bearing from the pen position to the bitmap's top-left, y-down.
    pub bearing_px: [i32; 2],
    /// UVs of the bitmap area (excluding padding).
    pub uv: UvRect,
}

/// A bitmap accepted by the allocator but not yet on the GPU.
#[derive(Clone, Debug)]
pub struct PendingUpload {
    /// Destination rect origin in atlas pixels.
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    /// Row-major coverage/SDF bytes, `width * height` long.
    pub pixels: Vec<u8>,
}

/// Result of an insertion attempt.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum AtlasInsert {
    /// Cache hit; nothing to upload.
    AlreadyPresent(PlacedGlyph),
    /// Placed; the bitmap was queued for upload.
    Placed(PlacedGlyph),
    /// No space left. The glyph is skipped (no eviction strategy).
    Full,
}

#[derive(Clone, Copy, Debug)]
struct Shelf {
    y: u32,
    height: u32,
    x_cursor: u32,
}

/// Shelf-packing allocator + placement cache for one atlas texture.
pub struct GlyphAtlas {
    size: u32,
    padding: u32,

    shelves: Vec<Shelf>,
    next_shelf_y: u32,

    cache: HashMap<GlyphKey, PlacedGlyph>,
    pending: Vec<PendingUpload>,
}

impl GlyphAtlas {
    /// Create a square atlas. `padding` pixels are reserved around each
    /// glyph so linear sampling never bleeds between neighbors.
    pub fn new(size: u32, padding: u32) -> Self {
        Self {
            size,
            padding,
            shelves: Vec::new(),
            next_shelf_y: 0,
            cache: HashMap::new(),
            pending: Vec::new(),
        }
    }

    #[inline]
    pub const fn size(&self) -> u32 {
        self.size
    }

    /// Lookup an existing placement.
    #[inline]
    pub fn get(&self, key: &GlyphKey) -> Option<PlacedGlyph> {
        self.cache.get(key).copied()
    }

    /// Insert a rasterized glyph if absent.
    ///
    /// `pixels` must be `size_px[0] * size_px[1]` bytes. Empty bitmaps
    /// (whitespace glyphs) are cached with a zero-area rect and produce no
    /// upload.
    pub fn insert(
        &mut self,
        key: GlyphKey,
        size_px: [u32; 2],
        bearing_px: [i32; 2],
        pixels: &[u8],
    ) -> AtlasInsert {
        if let Some(placed) = self.cache.get(&key) {
            return AtlasInsert::AlreadyPresent(*placed);
        }

        let [w, h] = size_px;
        if w == 0 || h == 0 {
            let placed = PlacedGlyph {
                size_px: [0, 0],
                bearing_px,
                uv: UvRect {
                    min: [0.0, 0.0],
                    max: [0.0, 0.0],
                },
            };
            self.cache.insert(key, placed);
            return AtlasInsert::Placed(placed);
        }

        debug_assert_eq!(pixels.len(), (w * h) as usize);

        let pad = self.padding;
        let reserved_w = w + pad * 2;
        let reserved_h = h + pad * 2;

        if reserved_w > self.size || reserved_h > self.size {
            return AtlasInsert::Full;
        }

        let origin = match self.allocate(reserved_w, reserved_h) {
            Some(origin) => origin,
            None => return AtlasInsert::Full,
        };

        let glyph_x = origin.0 + pad;
        let glyph_y = origin.1 + pad;

        let inv = 1.0 / self.size as f32;
        let placed = PlacedGlyph {
            size_px,
            bearing_px,
            uv: UvRect {
                min: [glyph_x as f32 * inv, glyph_y as f32 * inv],
                max: [(glyph_x + w) as f32 * inv, (glyph_y + h) as f32 * inv],
            },
        };

        self.cache.insert(key, placed);
        self.pending.push(PendingUpload {
            x: glyph_x,
            y: glyph_y,
            width: w,
            height: h,
            pixels: pixels.to_vec(),
        });

        AtlasInsert::Placed(placed)
    }

    /// Drain bitmaps waiting for GPU upload.
    pub fn take_pending(&mut self) -> Vec<PendingUpload> {
        std::mem::take(&mut self.pending)
    }

    fn allocate(&mut self, reserved_w: u32, reserved_h: u32) -> Option<(u32, u32)> {
        // First shelf that is tall enough and has horizontal room.
        for shelf in &mut self.shelves {
            if reserved_h <= shelf.height && shelf.x_cursor + reserved_w <= self.size {
                let x = shelf.x_cursor;
                shelf.x_cursor += reserved_w;
                return Some((x, shelf.y));
            }
        }

        // Open a new shelf.
        if self.next_shelf_y + reserved_h > self.size {
            return None;
        }

        let shelf = Shelf {
            y: self.next_shelf_y,
            height: reserved_h,
            x_cursor: reserved_w,
        };
        self.next_shelf_y += reserved_h;
        let y = shelf.y;
        self.shelves.push(shelf);
        Some((0, y))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(id: u32) -> GlyphKey {
        GlyphKey::new(0, id, 16, 0)
    }

    #[test]
    fn test_insert_then_hit() {
        let mut atlas = GlyphAtlas::new(64, 1);
        let pixels = vec![255u8; 4 * 4];

        let first = atlas.insert(key(1), [4, 4], [0, -3], &pixels);
        assert!(matches!(first, AtlasInsert::Placed(_)));

        let second = atlas.insert(key(1), [4, 4], [0, -3], &pixels);
        assert!(matches!(second, AtlasInsert::AlreadyPresent(_)));

        // Only the first insertion queued an upload.
        assert_eq!(atlas.take_pending().len(), 1);
        assert!(atlas.take_pending().is_empty());
    }

    #[test]
    fn test_placements_do_not_overlap() {
        let mut atlas = GlyphAtlas::new(64, 1);
        let pixels = vec![255u8; 8 * 8];

        let mut rects = Vec::new();
        for id in 0..16 {
            match atlas.insert(key(id), [8, 8], [0, 0], &pixels) {
                AtlasInsert::Placed(_) => {}
                other => panic!("unexpected insert result: {other:?}"),
            }
        }
        for upload in atlas.take_pending() {
            rects.push((upload.x, upload.y, upload.width, upload.height));
        }

        for (i, a) in rects.iter().enumerate() {
            for b in rects.iter().skip(i + 1) {
                let disjoint =
                    a.0 + a.2 <= b.0 || b.0 + b.2 <= a.0 || a.1 + a.3 <= b.1 || b.1 + b.3 <= a.1;
                assert!(disjoint, "overlapping placements {a:?} and {b:?}");
            }
        }
    }

    #[test]
    fn test_full_when_exhausted() {
        let mut atlas = GlyphAtlas::new(16, 1);
        let pixels = vec![255u8; 10 * 10];

        assert!(matches!(
            atlas.insert(key(1), [10, 10], [0, 0], &pixels),
            AtlasInsert::Placed(_)
        ));
        // A second 12x12 reservation cannot fit a 16x16 atlas anymore.
        assert_eq!(
            atlas.insert(key(2), [10, 10], [0, 0], &pixels),
            AtlasInsert::Full
        );
    }

    #[test]
    fn test_zero_size_glyph_is_cached_without_upload() {
        let mut atlas = GlyphAtlas::new(64, 1);

        let result = atlas.insert(key(7), [0, 0], [0, 0], &[]);
        match result {
            AtlasInsert::Placed(placed) => assert_eq!(placed.size_px, [0, 0]),
            other => panic!("unexpected insert result: {other:?}"),
        }
        assert!(atlas.take_pending().is_empty());
        assert!(atlas.get(&key(7)).is_some());
    }

    #[test]
    fn test_same_glyph_id_in_different_faces_is_distinct() {
        let mut atlas = GlyphAtlas::new(64, 1);
        let pixels = vec![255u8; 4 * 4];

        // Glyph indices are face-local: index 36 in one face is a different
        // glyph in another, so both must get their own placement.
        let first = atlas.insert(GlyphKey::new(1, 36, 16, 0), [4, 4], [0, 0], &pixels);
        let second = atlas.insert(GlyphKey::new(2, 36, 16, 0), [4, 4], [0, 0], &pixels);

        match (first, second) {
            (AtlasInsert::Placed(a), AtlasInsert::Placed(b)) => assert_ne!(a.uv, b.uv),
            other => panic!("expected two placements, got {other:?}"),
        }
        assert_eq!(atlas.take_pending().len(), 2);
    }

    #[test]
    fn test_sdf_variant_distinct_from_plain() {
        assert_ne!(GlyphKey::sdf_variant(2.5), 0);
        assert_ne!(GlyphKey::sdf_variant(2.5), GlyphKey::sdf_variant(3.0));
    }
}

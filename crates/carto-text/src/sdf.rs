//! Coverage-mask to signed-distance-field conversion.
//!
//! SDF labels sample a distance-encoded glyph texture instead of raw
//! coverage, which keeps edges crisp under scaling and enables cheap halo
//! blur in the fragment shader. The conversion runs once per glyph at
//! rasterization time (under the font-context lock), so a brute-force
//! window search is fine: glyph bitmaps are tens of pixels wide and the
//! search radius is the blur spread.

/// Pad a row-major mask by `pad` pixels of empty space on every side.
///
/// SDF glyphs need room for the distance ramp outside the ink, so the
/// rasterized mask is padded before conversion.
pub fn pad_mask(mask: &[u8], width: usize, height: usize, pad: usize) -> (Vec<u8>, usize, usize) {
    let out_w = width + pad * 2;
    let out_h = height + pad * 2;
    let mut out = vec![0u8; out_w * out_h];

    for row in 0..height {
        let src = row * width;
        let dst = (row + pad) * out_w + pad;
        out[dst..dst + width].copy_from_slice(&mask[src..src + width]);
    }

    (out, out_w, out_h)
}

/// Convert a coverage mask into a signed distance field.
///
/// Output bytes encode distance to the glyph outline: 128 on the edge,
/// above inside the ink, below outside, saturating at `spread` pixels.
pub fn distance_field(mask: &[u8], width: usize, height: usize, spread: f32) -> Vec<u8> {
    let spread = spread.max(0.5);
    let radius = spread.ceil() as i32;
    let mut out = vec![0u8; width * height];

    let inside = |x: i32, y: i32| -> bool {
        if x < 0 || y < 0 || x >= width as i32 || y >= height as i32 {
            return false;
        }
        mask[y as usize * width + x as usize] >= 128
    };

    for y in 0..height as i32 {
        for x in 0..width as i32 {
            let here = inside(x, y);

            // Distance to the nearest pixel of opposite coverage within the
            // search window; pixels further than `spread` saturate.
            let mut best = spread;
            for dy in -radius..=radius {
                for dx in -radius..=radius {
                    if inside(x + dx, y + dy) != here {
                        let d = ((dx * dx + dy * dy) as f32).sqrt();
                        if d < best {
                            best = d;
                        }
                    }
                }
            }

            let signed = if here { best } else { -best };
            let normalized = 0.5 + 0.5 * (signed / spread);
            out[y as usize * width + x as usize] =
                (normalized.clamp(0.0, 1.0) * 255.0).round() as u8;
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    // A 6x6 block of ink in a 12x12 mask.
    fn block_mask() -> (Vec<u8>, usize, usize) {
        let (w, h) = (12usize, 12usize);
        let mut mask = vec![0u8; w * h];
        for y in 3..9 {
            for x in 3..9 {
                mask[y * w + x] = 255;
            }
        }
        (mask, w, h)
    }

    #[test]
    fn test_interior_above_half_exterior_below() {
        let (mask, w, h) = block_mask();
        let field = distance_field(&mask, w, h, 2.5);

        // Deep interior and far exterior saturate.
        assert!(field[6 * w + 6] > 200);
        assert!(field[0] < 60);
        // Just inside the edge stays above the midpoint, just outside below.
        assert!(field[6 * w + 3] >= 128);
        assert!(field[6 * w + 2] < 128);
    }

    #[test]
    fn test_pad_mask_centers_content() {
        let mask = vec![255u8; 4];
        let (padded, w, h) = pad_mask(&mask, 2, 2, 3);

        assert_eq!((w, h), (8, 8));
        assert_eq!(padded[3 * w + 3], 255);
        assert_eq!(padded[0], 0);
        assert_eq!(padded[w * h - 1], 0);
    }

    #[test]
    fn test_empty_mask_is_all_outside() {
        let field = distance_field(&[0u8; 16], 4, 4, 2.0);
        assert!(field.iter().all(|&v| v < 128));
    }
}

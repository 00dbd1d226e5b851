//! Per-tile accumulators for shaped label data.

use bytemuck::{Pod, Zeroable};

/// Vertex format for label glyph quads.
///
/// Positions are label-local pixels (origin at the label anchor, y down).
/// UVs index the glyph atlas. `slot` selects the label's texel in the
/// per-tile transform texture, so one buffer can hold many independently
/// placed labels.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct GlyphVertex {
    pub pos: [f32; 2],
    pub uv: [f32; 2],
    pub slot: f32,
}

impl GlyphVertex {
    pub const fn new(pos: [f32; 2], uv: [f32; 2], slot: f32) -> Self {
        Self { pos, uv, slot }
    }
}

/// One texel of the per-tile transform texture: label placement data the
/// vertex shader applies to every glyph carrying the matching slot.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct LabelTransform {
    /// Anchor position in tile-local units.
    pub pos: [f32; 2],
    /// Rotation around the anchor, radians.
    pub rotation: f32,
    /// Opacity multiplier; placement/animation code fades labels in and out
    /// by rewriting this channel.
    pub alpha: f32,
}

/// Accumulated glyph data for one tile and one label style.
///
/// A buffer is writable only through the [`ShapeSession`] that created it;
/// once the session finishes, the buffer moves into its tile and is plain
/// read-only data from then on.
///
/// [`ShapeSession`]: crate::context::ShapeSession
#[derive(Debug, Default)]
pub struct TextBuffer {
    pending: Vec<GlyphVertex>,
    transforms: Vec<LabelTransform>,
}

impl TextBuffer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Reserve the next transform slot.
    pub(crate) fn alloc_slot(&mut self) -> u32 {
        let slot = self.transforms.len() as u32;
        self.transforms.push(LabelTransform {
            pos: [0.0, 0.0],
            rotation: 0.0,
            alpha: 1.0,
        });
        slot
    }

    pub(crate) fn place(&mut self, slot: u32, pos: [f32; 2], rotation: f32) {
        if let Some(transform) = self.transforms.get_mut(slot as usize) {
            transform.pos = pos;
            transform.rotation = rotation;
        }
    }

    pub(crate) fn push_vertices(&mut self, vertices: &[GlyphVertex]) {
        self.pending.extend_from_slice(vertices);
    }

    /// Drain vertices shaped since the last call.
    ///
    /// Builders harvest after every feature so the tile mesh receives data
    /// feature by feature; the transforms stay behind in the buffer.
    pub(crate) fn take_vertices(&mut self) -> Vec<GlyphVertex> {
        std::mem::take(&mut self.pending)
    }

    /// Per-label transform records, one per registered label.
    pub fn transforms(&self) -> &[LabelTransform] {
        &self.transforms
    }

    pub fn label_count(&self) -> usize {
        self.transforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty() && self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slots_are_sequential() {
        let mut buffer = TextBuffer::new();
        assert_eq!(buffer.alloc_slot(), 0);
        assert_eq!(buffer.alloc_slot(), 1);
        assert_eq!(buffer.label_count(), 2);
    }

    #[test]
    fn test_place_writes_transform() {
        let mut buffer = TextBuffer::new();
        let slot = buffer.alloc_slot();
        buffer.place(slot, [3.0, 4.0], 0.5);

        let transform = buffer.transforms()[slot as usize];
        assert_eq!(transform.pos, [3.0, 4.0]);
        assert_eq!(transform.rotation, 0.5);
        assert_eq!(transform.alpha, 1.0);
    }

    #[test]
    fn test_take_vertices_drains() {
        let mut buffer = TextBuffer::new();
        buffer.push_vertices(&[GlyphVertex::new([0.0, 0.0], [0.0, 0.0], 0.0)]);

        assert_eq!(buffer.take_vertices().len(), 1);
        assert!(buffer.take_vertices().is_empty());
    }

    #[test]
    fn test_place_out_of_range_is_ignored() {
        let mut buffer = TextBuffer::new();
        buffer.place(5, [1.0, 1.0], 0.0);
        assert_eq!(buffer.label_count(), 0);
    }
}

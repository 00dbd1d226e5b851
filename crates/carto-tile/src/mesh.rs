//! Raw appendable vertex store.

/// A mesh that accepts pre-formatted vertex bytes.
///
/// Label styles shape glyph quads elsewhere and append the finished bytes
/// here; the mesh neither knows nor cares about the vertex layout, it only
/// keeps bytes and a vertex count for the draw call.
#[derive(Clone, Debug, Default)]
pub struct RawMesh {
    bytes: Vec<u8>,
    vertex_count: usize,
}

impl RawMesh {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `count` vertices worth of pre-formatted data.
    pub fn add_vertices(&mut self, bytes: &[u8], count: usize) {
        self.bytes.extend_from_slice(bytes);
        self.vertex_count += count;
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn vertex_count(&self) -> usize {
        self.vertex_count
    }

    pub fn is_empty(&self) -> bool {
        self.vertex_count == 0
    }
}

//! Tiles and tile identifiers.

use std::collections::HashMap;
use std::fmt;

use carto_text::TextBuffer;

/// Slippy-map tile address.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct TileId {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl TileId {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }
}

impl fmt::Display for TileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.z, self.x, self.y)
    }
}

/// One tile's worth of processed label data.
///
/// Each label-producing style attaches at most one [`TextBuffer`] per tile;
/// buffers arrive read-only (the writing happened inside the style's
/// processing session) and are dropped with the tile.
#[derive(Debug, Default)]
pub struct Tile {
    id: TileId,
    text_buffers: HashMap<String, TextBuffer>,
}

impl Tile {
    pub fn new(id: TileId) -> Self {
        Self {
            id,
            text_buffers: HashMap::new(),
        }
    }

    pub fn id(&self) -> TileId {
        self.id
    }

    /// Attach a finished text buffer for the given style, replacing any
    /// previous one.
    pub fn set_text_buffer(&mut self, style: &str, buffer: TextBuffer) {
        self.text_buffers.insert(style.to_string(), buffer);
    }

    pub fn text_buffer(&self, style: &str) -> Option<&TextBuffer> {
        self.text_buffers.get(style)
    }
}

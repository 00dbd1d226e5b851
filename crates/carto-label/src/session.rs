//! Per-tile label processing session.

use carto_text::ShapeSession;
use carto_tile::{Tile, TileId};

use crate::registry::{LabelContext, LabelRequest};

/// Exclusive label-extraction access for one (tile, style) pair.
///
/// Holds the font-context lock for its whole lifetime, carries the tile id
/// every request gets stamped with, and buffers the requests so they reach
/// the registry in one batch on [`finish`](Self::finish). Dropping the
/// session without finishing releases the lock and discards both the
/// buffer and the pending requests, so aborted tiles leave no trace.
pub struct LabelSession<'a> {
    pub(crate) shape: ShapeSession<'a>,
    pub(crate) ctx: &'a LabelContext,
    pub(crate) tile: TileId,
    pub(crate) style_name: String,
    pub(crate) requests: Vec<LabelRequest>,
}

impl LabelSession<'_> {
    /// Tile this session stamps onto label requests.
    pub fn tile(&self) -> TileId {
        self.tile
    }

    /// Labels produced so far in this session.
    pub fn label_count(&self) -> usize {
        self.requests.len()
    }

    /// Complete tile processing: flush requests to the registry and attach
    /// the text buffer to the tile, then release the lock.
    pub fn finish(self, tile: &mut Tile) {
        debug_assert_eq!(tile.id(), self.tile, "session finished on wrong tile");

        let LabelSession {
            shape,
            ctx,
            style_name,
            requests,
            ..
        } = self;

        ctx.labels().add_all(requests);
        tile.set_text_buffer(&style_name, shape.finish());
    }
}

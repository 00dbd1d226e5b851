//! Label request registry and the shared label context.

use std::sync::{Arc, Mutex};

use carto_text::FontContext;
use carto_tile::TileId;

use crate::anchor::Anchor;

/// A label placement request, consumed by downstream placement logic.
#[derive(Clone, Debug)]
pub struct LabelRequest {
    pub tile: TileId,
    pub style: String,
    pub anchor: Anchor,
    pub text: String,
}

/// Accumulated label requests across tiles.
///
/// Duplicate requests for the same anchor/text are allowed; deduplication
/// belongs to the placement stage that consumes them.
#[derive(Default)]
pub struct LabelRegistry {
    requests: Mutex<Vec<LabelRequest>>,
}

impl LabelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a request. Empty text is dropped; it can never render.
    pub fn add(&self, request: LabelRequest) {
        if request.text.is_empty() {
            log::debug!(
                "ignoring empty label text for style {} on tile {}",
                request.style,
                request.tile
            );
            return;
        }
        self.lock().push(request);
    }

    pub fn add_all(&self, requests: impl IntoIterator<Item = LabelRequest>) {
        for request in requests {
            self.add(request);
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Drain all pending requests for the placement stage.
    pub fn take(&self) -> Vec<LabelRequest> {
        std::mem::take(&mut *self.lock())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<LabelRequest>> {
        self.requests.lock().expect("label registry poisoned")
    }
}

/// The explicitly owned label pipeline context.
///
/// Created once at renderer startup and passed by reference to tile
/// processing and draw code; owns the font context and the request
/// registry (formerly process-wide singletons).
pub struct LabelContext {
    font: Arc<FontContext>,
    labels: LabelRegistry,
}

impl LabelContext {
    pub fn new() -> Self {
        Self::with_font_context(Arc::new(FontContext::new()))
    }

    pub fn with_font_context(font: Arc<FontContext>) -> Self {
        Self {
            font,
            labels: LabelRegistry::new(),
        }
    }

    pub fn font(&self) -> &Arc<FontContext> {
        &self.font
    }

    pub fn labels(&self) -> &LabelRegistry {
        &self.labels
    }
}

impl Default for LabelContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;

    fn request(text: &str) -> LabelRequest {
        LabelRequest {
            tile: TileId::new(0, 0, 0),
            style: "labels".to_string(),
            anchor: Anchor::Point(Vec2::ZERO),
            text: text.to_string(),
        }
    }

    #[test]
    fn test_empty_text_is_rejected() {
        let registry = LabelRegistry::new();
        registry.add(request(""));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_duplicates_are_kept() {
        let registry = LabelRegistry::new();
        registry.add(request("Main St"));
        registry.add(request("Main St"));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_add_all_validates_like_add() {
        let registry = LabelRegistry::new();
        registry.add_all([request(""), request("Main St"), request("")]);

        let kept = registry.take();
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].text, "Main St");
    }

    #[test]
    fn test_take_drains() {
        let registry = LabelRegistry::new();
        registry.add_all([request("a"), request("b"), request("")]);

        assert_eq!(registry.take().len(), 2);
        assert!(registry.is_empty());
    }
}

//! Label extraction and registration for carto tiles.
//!
//! A [`LabelStyle`] turns tile feature geometry into label placement
//! requests and shaped glyph vertex data. All shaping for one tile happens
//! inside a [`LabelSession`], which serializes tile workers against the
//! shared [`carto_text::FontContext`] and guarantees the lock is released
//! even when processing aborts partway.
//!
//! The flow per tile and style:
//!
//! ```text
//! style.begin_tile(ctx, tile_id)          // blocks on the font lock
//!   style.build_point / build_line / build_polygon ...  // per feature
//! session.finish(&mut tile)               // registry flush + buffer attach
//! ```

pub mod anchor;
pub mod registry;
pub mod session;
pub mod style;

pub use anchor::Anchor;
pub use registry::{LabelContext, LabelRegistry, LabelRequest};
pub use session::LabelSession;
pub use style::{BuildOutcome, LabelSelector, LabelStyle};

//! Tile and feature data model for the carto label pipeline.
//!
//! Tiles are spatially bounded units of map geometry, processed and
//! rendered independently. This crate is deliberately small: geometry and
//! properties as plain values, plus the raw vertex mesh that styles append
//! pre-formatted vertex data into.

pub mod geometry;
pub mod mesh;
pub mod tile;

pub use geometry::{Feature, Geometry, Line, Point, Polygon, Properties};
pub use mesh::RawMesh;
pub use tile::{Tile, TileId};

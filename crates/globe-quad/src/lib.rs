//! Quadtree tile addressing for Web Mercator imagery layers.
//!
//! A quadcode is the path from the root of the tile quadtree to a tile, one
//! character per level. This crate converts between quadcodes and integer
//! tile coordinates.
//!
//! # Design principles
//!
//! - **Pure**: No I/O, no state, no threading primitives
//! - **Invertible**: [`encode`] is the exact inverse of [`decode`]
//! - **Web-compatible**: Compiles to WASM

mod error;
mod quadcode;

pub use error::{QuadError, QuadResult};
pub use quadcode::{MAX_DEPTH, Quadcode, TileCoord, decode, encode};

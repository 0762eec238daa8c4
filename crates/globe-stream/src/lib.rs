//! Tile streaming and surface objects for a virtual globe.
//!
//! This crate provides the two halves of getting content onto a globe:
//! imagery layers that turn quadcodes into load-balanced tile downloads, and
//! surface objects that build a mesh resource in the background and anchor
//! it at a geodetic position.
//!
//! # Design principles
//!
//! - **Non-blocking**: Requests and builds return immediately; results
//!   arrive later as exactly one channel message
//! - **Executor-injected**: Work runs on whatever [`Spawn`] the caller
//!   provides, Tokio by default
//! - **Single-owner state**: Layers and surface objects are mutated only by
//!   their owner; background tasks never touch them
//!
//! # Example
//!
//! ```ignore
//! use globe_stream::{
//!     CallerId, HttpFetcher, LayerConfig, LayerId, RenderContext, TileRequest, TokioSpawner,
//!     create_layer,
//! };
//!
//! let config = LayerConfig::from_json(r#"{ "servers": ["http://mt0.google.com"] }"#)?;
//! let mut layer = create_layer(&config)?;
//! let ctx = RenderContext::new(Arc::new(HttpFetcher::new()), Arc::new(TokioSpawner::current()?));
//!
//! let (tx, rx) = async_channel::unbounded();
//! layer.request_tile(&ctx, TileRequest::new("0231", LayerId(0), CallerId(1)), tx);
//! let response = rx.recv().await?;
//! ```

pub mod cache;
mod error;
mod fetch;
pub mod geodesy;
mod hybrid;
mod layer;
mod runtime;
pub mod surface;

pub use cache::{Cache, MemoryCache, NoCache};
pub use error::{Error, Result};
pub use fetch::{FetchFuture, HttpFetcher, TileFetcher};
pub use geodesy::Orientation;
pub use hybrid::{HybridTileLayer, MAX_LOD, MIN_LOD, SUBDOMAIN_ROTATION, SUBDOMAINS};
pub use layer::{
    CallerId, CompletionSender, ImageLayer, LayerConfig, LayerId, LayerKind, TileOutcome,
    TileRequest, TileResponse, create_layer,
};
pub use runtime::{RenderContext, Spawn, TaskFuture, TokioSpawner};
pub use surface::{
    ObjectId, ObjectKind, SurfaceEvent, SurfaceObject, SurfaceOptions, SurfaceStatus,
};

// Re-export the quadcode types for convenience.
pub use globe_quad::{Quadcode, TileCoord};

//! The image layer contract.
//!
//! An image layer turns quadcodes into tile downloads. Requests are
//! fire-and-forget: [`ImageLayer::request_tile`] returns immediately and the
//! outcome arrives later as exactly one [`TileResponse`] on the channel the
//! caller supplied.

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::fetch::FetchFuture;
use crate::hybrid::HybridTileLayer;
use crate::runtime::RenderContext;

/// Identifies the layer slot a request was made for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct LayerId(pub u32);

/// Identifies the requester, so it can match responses to requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CallerId(pub u64);

/// A tile request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileRequest {
    /// Quadcode of the requested tile.
    pub quadcode: String,
    /// Layer slot the tile is for.
    pub layer: LayerId,
    /// Who asked.
    pub caller: CallerId,
}

impl TileRequest {
    /// Create a new tile request.
    #[must_use]
    pub fn new(quadcode: impl Into<String>, layer: LayerId, caller: CallerId) -> Self {
        Self {
            quadcode: quadcode.into(),
            layer,
            caller,
        }
    }

    fn into_response(self, outcome: TileOutcome) -> TileResponse {
        TileResponse {
            quadcode: self.quadcode,
            layer: self.layer,
            caller: self.caller,
            outcome,
        }
    }
}

/// What happened to a tile request.
#[derive(Debug)]
pub enum TileOutcome {
    /// The encoded tile image.
    Ready(Vec<u8>),
    /// The request failed.
    Failed(Error),
}

/// The single completion message for a tile request.
#[derive(Debug)]
pub struct TileResponse {
    /// Quadcode of the requested tile.
    pub quadcode: String,
    /// Layer slot the tile is for.
    pub layer: LayerId,
    /// Who asked.
    pub caller: CallerId,
    /// The result.
    pub outcome: TileOutcome,
}

impl TileResponse {
    /// Whether the tile was downloaded.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        matches!(self.outcome, TileOutcome::Ready(_))
    }
}

/// Sending half of a tile completion channel.
pub type CompletionSender = async_channel::Sender<TileResponse>;

/// A source of imagery tiles addressed by quadcode.
///
/// Callers must consult [`ImageLayer::contains`] before requesting a tile.
pub trait ImageLayer: Send {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Whether the layer can serve requests.
    fn ready(&self) -> bool;

    /// Whether the layer has failed permanently.
    fn failed(&self) -> bool;

    /// Request a tile.
    ///
    /// Returns immediately. Exactly one [`TileResponse`] carrying the
    /// request's identity is sent on `completion` later.
    fn request_tile(
        &mut self,
        ctx: &RenderContext,
        request: TileRequest,
        completion: CompletionSender,
    );

    /// Shallowest requestable level (inclusive).
    fn min_lod(&self) -> u32;

    /// Deepest requestable level (inclusive).
    fn max_lod(&self) -> u32;

    /// Whether the layer serves the tile at `quadcode`.
    fn contains(&self, quadcode: &str) -> bool;

    /// Apply configuration. Layers without external configuration may ignore it.
    fn setup(&mut self, config: &LayerConfig) -> Result<()>;
}

/// The concrete layer variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LayerKind {
    /// Satellite imagery with labels from Google-style `/vt/` servers.
    #[default]
    GoogleHybrid,
}

/// Layer configuration, usually loaded from JSON.
///
/// ```json
/// { "kind": "google-hybrid", "servers": ["http://mt0.google.com", "http://mt1.google.com"] }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LayerConfig {
    /// Which layer to build.
    #[serde(default)]
    pub kind: LayerKind,
    /// Base URLs of the tile servers, in rotation order.
    #[serde(default)]
    pub servers: Vec<String>,
}

impl LayerConfig {
    /// Configuration for the given layer kind and servers.
    #[must_use]
    pub fn new(kind: LayerKind, servers: Vec<String>) -> Self {
        Self { kind, servers }
    }

    /// Parse a configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Config {
            message: e.to_string(),
        })
    }
}

/// Build and configure the layer named by `config.kind`.
pub fn create_layer(config: &LayerConfig) -> Result<Box<dyn ImageLayer>> {
    let mut layer: Box<dyn ImageLayer> = match config.kind {
        LayerKind::GoogleHybrid => Box::new(HybridTileLayer::new()),
    };
    layer.setup(config)?;
    tracing::info!(
        layer = layer.name(),
        servers = config.servers.len(),
        "created image layer"
    );
    Ok(layer)
}

/// Run `fetch` in the background and report its outcome on `completion`.
pub(crate) fn dispatch(
    ctx: &RenderContext,
    request: TileRequest,
    fetch: FetchFuture,
    completion: CompletionSender,
) {
    ctx.spawn(Box::pin(async move {
        let outcome = match fetch.await {
            Ok(data) => TileOutcome::Ready(data),
            Err(e) => {
                tracing::debug!(quadcode = %request.quadcode, "tile failed: {e}");
                TileOutcome::Failed(e)
            }
        };
        if completion.send(request.into_response(outcome)).await.is_err() {
            tracing::debug!("tile requester stopped listening");
        }
    }));
}

/// Report `error` for `request` without touching the network.
pub(crate) fn dispatch_failure(
    ctx: &RenderContext,
    request: TileRequest,
    error: Error,
    completion: CompletionSender,
) {
    dispatch(
        ctx,
        request,
        Box::pin(std::future::ready(Err(error))),
        completion,
    );
}

//! Google-style hybrid imagery layer.
//!
//! # URL pattern
//!
//! `{server}/vt/lyrs=y&x={x}&y={y}&z={lod}&s={subdomain}`
//!
//! - `{server}` rotates through the configured server list
//! - `{subdomain}` rotates through the first five entries of [`SUBDOMAINS`]
//! - `lyrs=y` selects satellite imagery with labels
//!
//! Both rotations advance on every request, whatever its outcome, so a burst
//! of requests is spread evenly across hosts in call order.

use globe_quad::TileCoord;

use crate::error::{Error, Result};
use crate::layer::{
    CompletionSender, ImageLayer, LayerConfig, TileRequest, dispatch, dispatch_failure,
};
use crate::runtime::RenderContext;

/// Subdomain aliases appended to every request.
pub const SUBDOMAINS: [&str; 6] = ["Galile", "Galil", "Gali", "Gal", "Ga", "G"];

/// Only the first five aliases take part in the rotation; `"G"` is never sent.
pub const SUBDOMAIN_ROTATION: usize = 5;

/// Shallowest level served.
pub const MIN_LOD: u32 = 0;

/// Deepest level served.
pub const MAX_LOD: u32 = 19;

/// Hybrid satellite imagery layer with round-robin load balancing.
///
/// The rotation counters are private and only `request_tile` advances them.
#[derive(Debug, Default)]
pub struct HybridTileLayer {
    servers: Vec<String>,
    current_server: usize,
    current_subdomain: usize,
}

impl HybridTileLayer {
    /// Create an unconfigured layer. Call [`ImageLayer::setup`] before use.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a layer already configured with `servers`.
    pub fn with_servers(servers: Vec<String>) -> Result<Self> {
        let mut layer = Self::new();
        layer.setup(&LayerConfig {
            servers,
            ..LayerConfig::default()
        })?;
        Ok(layer)
    }

    /// The configured servers, in rotation order.
    #[must_use]
    pub fn servers(&self) -> &[String] {
        &self.servers
    }

    /// Index of the server the next request will use.
    #[must_use]
    pub fn current_server(&self) -> usize {
        self.current_server
    }

    /// Index into [`SUBDOMAINS`] the next request will use.
    #[must_use]
    pub fn current_subdomain_index(&self) -> usize {
        self.current_subdomain
    }

    /// The URL the next request for `coord` would use, without advancing.
    #[must_use]
    pub fn tile_url(&self, coord: TileCoord) -> Option<String> {
        let server = self.servers.get(self.current_server)?;
        Some(build_url(server, coord, SUBDOMAINS[self.current_subdomain]))
    }
}

fn build_url(server: &str, coord: TileCoord, subdomain: &str) -> String {
    format!(
        "{server}/vt/lyrs=y&x={}&y={}&z={}&s={subdomain}",
        coord.x, coord.y, coord.lod
    )
}

impl ImageLayer for HybridTileLayer {
    fn name(&self) -> &'static str {
        "google-hybrid"
    }

    fn ready(&self) -> bool {
        true
    }

    fn failed(&self) -> bool {
        false
    }

    fn request_tile(
        &mut self,
        ctx: &RenderContext,
        request: TileRequest,
        completion: CompletionSender,
    ) {
        let coord = match globe_quad::decode(&request.quadcode) {
            Ok(coord) => coord,
            Err(e) => {
                tracing::warn!(quadcode = %request.quadcode, "undecodable quadcode: {e}");
                dispatch_failure(ctx, request, e.into(), completion);
                return;
            }
        };

        let Some(url) = self.tile_url(coord) else {
            let error = Error::NotConfigured { layer: self.name() };
            tracing::warn!(quadcode = %request.quadcode, "{error}");
            dispatch_failure(ctx, request, error, completion);
            return;
        };
        self.current_subdomain = (self.current_subdomain + 1) % SUBDOMAIN_ROTATION;

        tracing::debug!(quadcode = %request.quadcode, %url, "requesting tile");
        let fetch = ctx.fetcher().fetch(&url);
        dispatch(ctx, request, fetch, completion);

        self.current_server = (self.current_server + 1) % self.servers.len();
    }

    fn min_lod(&self) -> u32 {
        MIN_LOD
    }

    fn max_lod(&self) -> u32 {
        MAX_LOD
    }

    fn contains(&self, quadcode: &str) -> bool {
        quadcode.len() <= MAX_LOD as usize
    }

    fn setup(&mut self, config: &LayerConfig) -> Result<()> {
        if config.servers.is_empty() {
            return Err(Error::EmptyServerPool);
        }
        self.servers.clone_from(&config.servers);
        if self.current_server >= self.servers.len() {
            self.current_server = 0;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::fetch::{FetchFuture, TileFetcher};
    use crate::layer::{CallerId, LayerId, TileOutcome};
    use crate::runtime::TokioSpawner;

    /// Records every URL and answers from a fixed table.
    #[derive(Default)]
    struct RecordingFetcher {
        urls: Mutex<Vec<String>>,
        fail: bool,
    }

    impl TileFetcher for RecordingFetcher {
        fn fetch(&self, url: &str) -> FetchFuture {
            self.urls.lock().unwrap().push(url.to_string());
            let result = if self.fail {
                Err(Error::HttpStatus {
                    url: url.to_string(),
                    status: 404,
                })
            } else {
                Ok(url.as_bytes().to_vec())
            };
            Box::pin(async move { result })
        }
    }

    fn context(fetcher: &Arc<RecordingFetcher>) -> RenderContext {
        let spawner = TokioSpawner::current().expect("inside a tokio runtime");
        RenderContext::new(fetcher.clone(), Arc::new(spawner))
    }

    fn servers(names: &[&str]) -> Vec<String> {
        names.iter().map(ToString::to_string).collect()
    }

    fn request(quadcode: &str, caller: u64) -> TileRequest {
        TileRequest::new(quadcode, LayerId(7), CallerId(caller))
    }

    #[test]
    fn test_lod_bounds_and_contains() {
        let layer = HybridTileLayer::new();
        assert_eq!(layer.min_lod(), 0);
        assert_eq!(layer.max_lod(), 19);
        assert!(layer.contains(""));
        assert!(layer.contains(&"3".repeat(19)));
        assert!(!layer.contains(&"3".repeat(20)));
    }

    #[test]
    fn test_setup_rejects_empty_list() {
        let mut layer = HybridTileLayer::new();
        let err = layer.setup(&LayerConfig::default()).unwrap_err();
        assert!(matches!(err, Error::EmptyServerPool));
    }

    #[tokio::test]
    async fn test_sixth_subdomain_is_never_used() {
        let fetcher = Arc::new(RecordingFetcher::default());
        let ctx = context(&fetcher);
        let mut layer = HybridTileLayer::with_servers(servers(&["http://a"])).unwrap();
        let (tx, _rx) = async_channel::unbounded();

        for i in 0..12 {
            layer.request_tile(&ctx, request("3", i), tx.clone());
        }

        let urls = fetcher.urls.lock().unwrap();
        assert_eq!(urls.len(), 12);
        assert!(urls.iter().all(|u| !u.ends_with("&s=G")));
        assert!(urls[5].ends_with("&s=Galile"));
    }

    #[tokio::test]
    async fn test_first_request_url() {
        let fetcher = Arc::new(RecordingFetcher::default());
        let ctx = context(&fetcher);
        let mut layer = HybridTileLayer::with_servers(servers(&["http://a"])).unwrap();
        let (tx, rx) = async_channel::unbounded();

        layer.request_tile(&ctx, request("12", 1), tx);

        let coord = globe_quad::decode("12").unwrap();
        let expected = format!(
            "http://a/vt/lyrs=y&x={}&y={}&z=2&s=Galile",
            coord.x, coord.y
        );
        assert_eq!(*fetcher.urls.lock().unwrap(), vec![expected.clone()]);

        let response = rx.recv().await.unwrap();
        assert_eq!(response.quadcode, "12");
        assert_eq!(response.layer, LayerId(7));
        assert_eq!(response.caller, CallerId(1));
        match response.outcome {
            TileOutcome::Ready(data) => assert_eq!(data, expected.into_bytes()),
            TileOutcome::Failed(e) => panic!("unexpected failure: {e}"),
        }
    }

    #[tokio::test]
    async fn test_rotation_wraps() {
        let fetcher = Arc::new(RecordingFetcher::default());
        let ctx = context(&fetcher);
        let mut layer =
            HybridTileLayer::with_servers(servers(&["http://a", "http://b", "http://c"])).unwrap();
        assert_eq!(layer.servers(), ["http://a", "http://b", "http://c"]);
        let (tx, _rx) = async_channel::unbounded();

        for i in 0..3 {
            layer.request_tile(&ctx, request("0", i), tx.clone());
        }
        assert_eq!(layer.current_server(), 0);
        assert_eq!(layer.current_subdomain_index(), 3);

        for i in 3..5 {
            layer.request_tile(&ctx, request("0", i), tx.clone());
        }
        assert_eq!(layer.current_subdomain_index(), 0);

        let urls = fetcher.urls.lock().unwrap();
        let hosts: Vec<&str> = urls.iter().map(|u| &u[..8]).collect();
        assert_eq!(
            hosts,
            vec!["http://a", "http://b", "http://c", "http://a", "http://b"]
        );
        let subs: Vec<&str> = urls.iter().map(|u| u.rsplit("&s=").next().unwrap()).collect();
        assert_eq!(subs, vec!["Galile", "Galil", "Gali", "Gal", "Ga"]);
    }

    #[tokio::test]
    async fn test_counters_advance_on_failure() {
        let fetcher = Arc::new(RecordingFetcher {
            fail: true,
            ..RecordingFetcher::default()
        });
        let ctx = context(&fetcher);
        let mut layer = HybridTileLayer::with_servers(servers(&["http://a", "http://b"])).unwrap();
        let (tx, rx) = async_channel::unbounded();

        layer.request_tile(&ctx, request("01", 9), tx);
        assert_eq!(layer.current_server(), 1);
        assert_eq!(layer.current_subdomain_index(), 1);

        let response = rx.recv().await.unwrap();
        assert_eq!(response.caller, CallerId(9));
        assert!(matches!(
            response.outcome,
            TileOutcome::Failed(Error::HttpStatus { status: 404, .. })
        ));
    }

    #[tokio::test]
    async fn test_unconfigured_layer_reports_failure() {
        let fetcher = Arc::new(RecordingFetcher::default());
        let ctx = context(&fetcher);
        let mut layer = HybridTileLayer::new();
        let (tx, rx) = async_channel::unbounded();

        layer.request_tile(&ctx, request("0", 1), tx);

        let response = rx.recv().await.unwrap();
        assert!(matches!(
            response.outcome,
            TileOutcome::Failed(Error::NotConfigured { .. })
        ));
        assert!(fetcher.urls.lock().unwrap().is_empty());
        assert_eq!(layer.current_subdomain_index(), 0);
    }

    #[tokio::test]
    async fn test_bad_quadcode_reports_failure() {
        let fetcher = Arc::new(RecordingFetcher::default());
        let ctx = context(&fetcher);
        let mut layer = HybridTileLayer::with_servers(servers(&["http://a"])).unwrap();
        let (tx, rx) = async_channel::unbounded();

        layer.request_tile(&ctx, request("09", 1), tx);

        let response = rx.recv().await.unwrap();
        assert!(matches!(
            response.outcome,
            TileOutcome::Failed(Error::Quadcode(_))
        ));
        assert!(fetcher.urls.lock().unwrap().is_empty());
    }
}

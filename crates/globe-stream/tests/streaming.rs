//! End-to-end flows through the public API.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use globe_stream::surface::{MeshEngine, SurfaceResource};
use globe_stream::{
    CallerId, Error, FetchFuture, LayerConfig, LayerId, ObjectId, ObjectKind, RenderContext,
    SurfaceEvent, SurfaceObject, SurfaceOptions, SurfaceStatus, TileFetcher, TileOutcome,
    TileRequest, TokioSpawner, create_layer,
};
use serde_json::json;

/// Serves tiles from memory, keyed by host.
#[derive(Default)]
struct HostFetcher {
    hits: Mutex<HashMap<String, usize>>,
    broken_host: Option<&'static str>,
}

impl TileFetcher for HostFetcher {
    fn fetch(&self, url: &str) -> FetchFuture {
        let host = url.split("/vt/").next().unwrap_or_default().to_string();
        *self.hits.lock().unwrap().entry(host.clone()).or_default() += 1;

        let result = if self.broken_host == Some(host.as_str()) {
            Err(Error::HttpStatus {
                url: url.to_string(),
                status: 503,
            })
        } else {
            Ok(b"\xff\xd8jpeg".to_vec())
        };
        Box::pin(async move { result })
    }
}

fn spawner() -> Arc<TokioSpawner> {
    Arc::new(TokioSpawner::current().expect("inside a tokio runtime"))
}

#[tokio::test(flavor = "multi_thread")]
async fn layer_spreads_requests_and_answers_each_once() {
    let fetcher = Arc::new(HostFetcher {
        broken_host: Some("http://b"),
        ..HostFetcher::default()
    });
    let ctx = RenderContext::new(fetcher.clone(), spawner());

    let config = LayerConfig::from_json(
        r#"{ "kind": "google-hybrid", "servers": ["http://a", "http://b", "http://c"] }"#,
    )
    .unwrap();
    let mut layer = create_layer(&config).unwrap();

    let (tx, rx) = async_channel::unbounded();
    let quadcodes = ["0", "1", "2", "3", "01", "23"];
    for (i, quadcode) in quadcodes.iter().enumerate() {
        assert!(layer.contains(quadcode));
        layer.request_tile(
            &ctx,
            TileRequest::new(*quadcode, LayerId(0), CallerId(i as u64)),
            tx.clone(),
        );
    }
    drop(tx);

    let mut responses = Vec::new();
    while let Ok(response) = rx.recv().await {
        responses.push(response);
    }
    responses.sort_by_key(|r| r.caller.0);

    assert_eq!(responses.len(), quadcodes.len());
    for (i, response) in responses.iter().enumerate() {
        assert_eq!(response.quadcode, quadcodes[i]);
        // Servers rotate a, b, c, a, b, c; every request to b fails.
        let expect_ready = i % 3 != 1;
        assert_eq!(response.is_ready(), expect_ready, "request {i}");
    }
    assert!(matches!(
        responses[1].outcome,
        TileOutcome::Failed(Error::HttpStatus { status: 503, .. })
    ));

    let hits = fetcher.hits.lock().unwrap();
    assert_eq!(hits.get("http://a"), Some(&2));
    assert_eq!(hits.get("http://b"), Some(&2));
    assert_eq!(hits.get("http://c"), Some(&2));
}

#[tokio::test]
async fn mesh_surface_lifecycle() {
    let engine = MeshEngine::new(spawner());
    let (events_tx, events_rx) = async_channel::unbounded();
    let mut object = SurfaceObject::new(ObjectId(42)).with_events(events_tx);

    let options = SurfaceOptions::with_payload(json!({
        "VertexSemantic": "pn",
        "Vertices": [0, 0, 0, 0, 0, 1,  1, 0, 0, 0, 0, 1,  0, 1, 0, 0, 0, 1],
        "IndexSemantic": "TRIANGLES",
        "Indices": [0, 1, 2],
        "VisibilityDistance": 6378137.0
    }))
    .at(8.54, 47.37, 408.0);

    object
        .parse_options(Some(ObjectKind::Mesh), Some(options), &engine)
        .unwrap();
    assert_eq!(object.status(), SurfaceStatus::Busy);

    assert_eq!(object.wait().await, SurfaceStatus::Ready);
    assert_eq!(events_rx.recv().await.unwrap(), SurfaceEvent::Ready(ObjectId(42)));

    let surface = object.surface().unwrap();
    assert_eq!(surface.mesh().unwrap().vertex_count(), 3);
    assert!(surface.frame().is_some());
    assert!((surface.visibility_distance() - 1.0).abs() < 1e-12);

    object.destroy();
    assert_eq!(object.status(), SurfaceStatus::Failed);
    assert!(object.surface().is_none());
}

#[tokio::test]
async fn malformed_mesh_fails_surface() {
    let engine = MeshEngine::new(spawner());
    let (events_tx, events_rx) = async_channel::unbounded();
    let mut object = SurfaceObject::new(ObjectId(7)).with_events(events_tx);

    object
        .parse_options(
            Some(ObjectKind::Mesh),
            Some(SurfaceOptions::with_payload(json!({
                "VertexSemantic": "p",
                "Vertices": [0, 0]
            }))),
            &engine,
        )
        .unwrap();

    assert_eq!(object.wait().await, SurfaceStatus::Failed);
    assert_eq!(events_rx.recv().await.unwrap(), SurfaceEvent::Failed(ObjectId(7)));
}

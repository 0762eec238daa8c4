//! JSON mesh surfaces.
//!
//! # Payload format
//!
//! ```json
//! {
//!   "VertexSemantic": "pnt",
//!   "Vertices": [0.0, 0.0, 0.0,  0.0, 0.0, 1.0,  0.5, 0.5, ...],
//!   "IndexSemantic": "TRIANGLES",
//!   "Indices": [0, 1, 2],
//!   "VisibilityDistance": 20000
//! }
//! ```
//!
//! Each character of `VertexSemantic` names one interleaved attribute:
//! `p` position (3), `n` normal (3), `t` texture coordinate (2), `c` color (4).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use glam::{DMat4, DQuat};
use serde::Deserialize;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::geodesy::{Orientation, navigation_frame_euler, navigation_frame_quat};
use crate::runtime::Spawn;
use crate::surface::ObjectId;
use crate::surface::resource::{BuildCompletion, SurfaceEngine, SurfaceResource};

/// How indices are assembled into primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum Primitive {
    #[default]
    #[serde(rename = "TRIANGLES")]
    Triangles,
    #[serde(rename = "TRIANGLESTRIP")]
    TriangleStrip,
    #[serde(rename = "LINES")]
    Lines,
    #[serde(rename = "POINTS")]
    Points,
}

/// The raw mesh payload.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MeshPayload {
    pub vertex_semantic: String,
    #[serde(default)]
    pub vertices: Vec<f32>,
    #[serde(default)]
    pub index_semantic: Primitive,
    #[serde(default)]
    pub indices: Vec<u32>,
}

/// A decoded, validated mesh.
#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    /// The attributes each vertex carries, in order.
    pub semantic: String,
    /// Floats per vertex.
    pub stride: usize,
    /// Interleaved vertex data.
    pub vertices: Vec<f32>,
    pub indices: Vec<u32>,
    pub primitive: Primitive,
}

impl Mesh {
    /// Number of vertices.
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        if self.stride == 0 {
            0
        } else {
            self.vertices.len() / self.stride
        }
    }
}

fn attribute_width(attribute: char) -> Option<usize> {
    match attribute {
        'p' | 'n' => Some(3),
        't' => Some(2),
        'c' => Some(4),
        _ => None,
    }
}

impl MeshPayload {
    /// Parse a payload from a JSON value.
    pub fn from_value(value: Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    /// Validate the payload and turn it into a mesh.
    pub fn decode(self) -> Result<Mesh> {
        if !self.vertex_semantic.contains('p') {
            return Err(Error::Payload {
                context: "vertex semantic",
                detail: format!("{:?} has no position attribute", self.vertex_semantic),
            });
        }

        let mut stride = 0;
        for attribute in self.vertex_semantic.chars() {
            stride += attribute_width(attribute).ok_or_else(|| Error::Payload {
                context: "vertex semantic",
                detail: format!("unknown attribute {attribute:?}"),
            })?;
        }

        if self.vertices.len() % stride != 0 {
            return Err(Error::Payload {
                context: "vertices",
                detail: format!(
                    "{} floats is not a multiple of the {stride}-float stride",
                    self.vertices.len()
                ),
            });
        }

        let vertex_count = self.vertices.len() / stride;
        if let Some(index) = self.indices.iter().find(|&&i| i as usize >= vertex_count) {
            return Err(Error::Payload {
                context: "indices",
                detail: format!("index {index} out of bounds for {vertex_count} vertices"),
            });
        }

        Ok(Mesh {
            semantic: self.vertex_semantic,
            stride,
            vertices: self.vertices,
            indices: self.indices,
            primitive: self.index_semantic,
        })
    }
}

/// Builds [`MeshSurface`]s, decoding payloads on the given spawner.
#[derive(Clone)]
pub struct MeshEngine {
    spawner: Arc<dyn Spawn>,
}

impl MeshEngine {
    #[must_use]
    pub fn new(spawner: Arc<dyn Spawn>) -> Self {
        Self { spawner }
    }
}

impl SurfaceEngine for MeshEngine {
    type Resource = MeshSurface;

    fn create_surface(&self, owner: ObjectId) -> MeshSurface {
        MeshSurface {
            owner,
            spawner: Arc::clone(&self.spawner),
            mesh: Arc::new(Mutex::new(None)),
            cancelled: Arc::new(AtomicBool::new(false)),
            frame: None,
            hidden: true,
            visibility_distance: 0.0,
            highlight: [1.0; 4],
        }
    }
}

/// A mesh decoded from a JSON payload and anchored on the globe.
pub struct MeshSurface {
    owner: ObjectId,
    spawner: Arc<dyn Spawn>,
    mesh: Arc<Mutex<Option<Mesh>>>,
    cancelled: Arc<AtomicBool>,
    frame: Option<DMat4>,
    hidden: bool,
    visibility_distance: f64,
    highlight: [f32; 4],
}

impl MeshSurface {
    /// The object that owns this surface.
    #[must_use]
    pub fn owner(&self) -> ObjectId {
        self.owner
    }

    /// A copy of the decoded mesh, once the build has finished.
    #[must_use]
    pub fn mesh(&self) -> Option<Mesh> {
        self.mesh.lock().ok().and_then(|mesh| mesh.clone())
    }

    /// The model matrix, once the surface has been positioned.
    #[must_use]
    pub fn frame(&self) -> Option<DMat4> {
        self.frame
    }

    /// The highlight tint.
    #[must_use]
    pub fn highlight(&self) -> [f32; 4] {
        self.highlight
    }
}

impl SurfaceResource for MeshSurface {
    fn create_from_payload(&mut self, payload: Value, completion: BuildCompletion) {
        let slot = Arc::clone(&self.mesh);
        let cancelled = Arc::clone(&self.cancelled);
        let owner = self.owner;

        self.spawner.spawn(Box::pin(async move {
            let mesh = match MeshPayload::from_value(payload).and_then(MeshPayload::decode) {
                Ok(mesh) => mesh,
                Err(e) => {
                    tracing::debug!(%owner, "mesh decode failed: {e}");
                    completion.failed(e);
                    return;
                }
            };
            if cancelled.load(Ordering::Acquire) {
                return;
            }

            tracing::debug!(
                %owner,
                vertices = mesh.vertex_count(),
                indices = mesh.indices.len(),
                "mesh decoded"
            );
            match slot.lock() {
                Ok(mut slot) => {
                    *slot = Some(mesh);
                    drop(slot);
                    completion.ready();
                }
                Err(e) => completion.failed(Error::Payload {
                    context: "mesh storage",
                    detail: e.to_string(),
                }),
            }
        }));
    }

    fn set_as_navigation_frame(
        &mut self,
        lng: f64,
        lat: f64,
        elevation: f64,
        orientation: Orientation,
    ) {
        self.frame = Some(navigation_frame_euler(lng, lat, elevation, orientation));
    }

    fn set_as_navigation_frame_quat(
        &mut self,
        lng: f64,
        lat: f64,
        elevation: f64,
        rotation: DQuat,
    ) {
        self.frame = Some(navigation_frame_quat(lng, lat, elevation, rotation));
    }

    fn set_highlight_color(&mut self, color: [f32; 4]) {
        self.highlight = color;
    }

    fn set_hidden(&mut self, hidden: bool) {
        self.hidden = hidden;
    }

    fn is_hidden(&self) -> bool {
        self.hidden
    }

    fn set_visibility_distance(&mut self, distance: f64) {
        self.visibility_distance = distance;
    }

    fn visibility_distance(&self) -> f64 {
        self.visibility_distance
    }

    fn destroy(&mut self) {
        self.cancelled.store(true, Ordering::Release);
        if let Ok(mut mesh) = self.mesh.lock() {
            *mesh = None;
        }
        self.frame = None;
    }
}

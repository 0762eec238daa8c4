//! Positioned surface objects with an asynchronous build.
//!
//! A [`SurfaceObject`] wraps a [`SurfaceResource`] whose construction
//! finishes later. Its status moves:
//!
//! - `Busy` → `Ready` when the build succeeds
//! - `Busy` → `Failed` when the build fails
//! - `Ready` → `Failed` when the object is destroyed
//!
//! and never returns to `Busy`. Invalid options abort construction and leave
//! the object `Busy` for good; the error is logged and returned, but the
//! status does not change.
//!
//! Build completion is not pushed into the object. The owner calls
//! [`SurfaceObject::poll`] (or awaits [`SurfaceObject::wait`]) and the ready or
//! failed handling runs there, on the owner's thread.

mod mesh;
mod resource;

use std::fmt;

use glam::DQuat;
use serde::Deserialize;
use serde_json::Value;

pub use mesh::{Mesh, MeshEngine, MeshPayload, MeshSurface, Primitive};
pub use resource::{BuildCompletion, BuildOutcome, SurfaceEngine, SurfaceResource};

use crate::error::{Error, Result};
use crate::geodesy::{CARTESIAN_SCALE_INV, Orientation};

/// Visibility distance in meters when the payload does not specify one.
pub const DEFAULT_VISIBILITY_DISTANCE: f64 = 50_000.0;

/// Identifier of an object in the scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ObjectId(pub u64);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Kinds of scene objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Context,
    Scene,
    Geometry,
    Mesh,
    Surface,
    Texture,
    Image,
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Context => "context",
            Self::Scene => "scene",
            Self::Geometry => "geometry",
            Self::Mesh => "mesh",
            Self::Surface => "surface",
            Self::Texture => "texture",
            Self::Image => "image",
        };
        f.write_str(name)
    }
}

/// Lifecycle state of a surface object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SurfaceStatus {
    /// Building, or construction was aborted.
    #[default]
    Busy,
    /// Built and renderable.
    Ready,
    /// Build failed or the object was destroyed.
    Failed,
}

/// Notification sent to the owner when a surface finishes building.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceEvent {
    Ready(ObjectId),
    Failed(ObjectId),
}

/// Options for creating a surface.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SurfaceOptions {
    /// Where the payload came from.
    #[serde(default)]
    pub url: Option<String>,
    /// Initial longitude in degrees.
    #[serde(default)]
    pub longitude: Option<f64>,
    /// Initial latitude in degrees.
    #[serde(default)]
    pub latitude: Option<f64>,
    /// Initial elevation in meters.
    #[serde(default)]
    pub elevation: Option<f64>,
    /// The mesh payload.
    #[serde(default)]
    pub jsonobject: Option<Value>,
}

impl SurfaceOptions {
    /// Options carrying a mesh payload.
    #[must_use]
    pub fn with_payload(payload: Value) -> Self {
        Self {
            jsonobject: Some(payload),
            ..Self::default()
        }
    }

    /// Set the initial position.
    #[must_use]
    pub fn at(mut self, longitude: f64, latitude: f64, elevation: f64) -> Self {
        self.longitude = Some(longitude);
        self.latitude = Some(latitude);
        self.elevation = Some(elevation);
        self
    }

    /// Record the payload's source URL.
    #[must_use]
    pub fn from_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }
}

/// Zero, NaN and absent values do not count as set.
#[allow(clippy::float_cmp)]
fn is_set(value: f64) -> bool {
    value != 0.0 && !value.is_nan()
}

/// A JSON number, or a string holding one.
fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn set_value(value: Option<f64>) -> Option<f64> {
    value.filter(|v| is_set(*v))
}

/// A positioned surface built asynchronously from a payload.
pub struct SurfaceObject<R: SurfaceResource> {
    id: ObjectId,
    status: SurfaceStatus,
    resource: Option<R>,
    longitude: f64,
    latitude: f64,
    elevation: f64,
    json_url: Option<String>,
    build: Option<async_channel::Receiver<BuildOutcome>>,
    events: Option<async_channel::Sender<SurfaceEvent>>,
}

impl<R: SurfaceResource> SurfaceObject<R> {
    /// Create an empty, busy surface object.
    #[must_use]
    pub fn new(id: ObjectId) -> Self {
        Self {
            id,
            status: SurfaceStatus::Busy,
            resource: None,
            longitude: 0.0,
            latitude: 0.0,
            elevation: 0.0,
            json_url: None,
            build: None,
            events: None,
        }
    }

    /// Send [`SurfaceEvent`]s to `events` when the build finishes.
    ///
    /// # Panics
    ///
    /// Panics if `events` is bounded. Events are sent without waiting, so a
    /// full channel would lose one.
    #[must_use]
    pub fn with_events(mut self, events: async_channel::Sender<SurfaceEvent>) -> Self {
        assert!(events.capacity().is_none(), "surface events need an unbounded channel");
        self.events = Some(events);
        self
    }

    /// The object's identifier.
    #[must_use]
    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn status(&self) -> SurfaceStatus {
        self.status
    }

    /// The wrapped resource, if one was created and not destroyed.
    #[must_use]
    pub fn surface(&self) -> Option<&R> {
        self.resource.as_ref()
    }

    /// Mutable access to the wrapped resource.
    pub fn surface_mut(&mut self) -> Option<&mut R> {
        self.resource.as_mut()
    }

    /// Source URL of the payload.
    #[must_use]
    pub fn json_url(&self) -> Option<&str> {
        self.json_url.as_deref()
    }

    /// Stored initial position as (longitude, latitude, elevation).
    #[must_use]
    pub fn initial_position(&self) -> (f64, f64, f64) {
        (self.longitude, self.latitude, self.elevation)
    }

    /// Validate the options and start building the resource.
    ///
    /// `parent` is the kind of the object this surface hangs under; it must be
    /// a mesh. `engine` is the rendering context the resource is built with.
    ///
    /// On an error nothing is built and the status stays `Busy`. Once a
    /// resource exists, or the object has left `Busy`, further calls are
    /// rejected with [`Error::AlreadyInitialized`] and change nothing.
    pub fn parse_options<E>(
        &mut self,
        parent: Option<ObjectKind>,
        options: Option<SurfaceOptions>,
        engine: &E,
    ) -> Result<()>
    where
        E: SurfaceEngine<Resource = R>,
    {
        if self.status != SurfaceStatus::Busy || self.resource.is_some() || self.build.is_some() {
            return Err(self.abort(Error::AlreadyInitialized));
        }
        let Some(options) = options else {
            return Err(self.abort(Error::MissingOptions));
        };
        let Some(parent) = parent else {
            return Err(self.abort(Error::MissingParent));
        };
        if parent != ObjectKind::Mesh {
            return Err(self.abort(Error::WrongParentKind {
                expected: ObjectKind::Mesh,
                found: parent,
            }));
        }

        if let Some(payload) = options.jsonobject {
            let visibility = payload
                .get("VisibilityDistance")
                .and_then(numeric)
                .filter(|d| is_set(*d))
                .unwrap_or(DEFAULT_VISIBILITY_DISTANCE);

            let mut resource = engine.create_surface(self.id);
            resource.set_hidden(false);

            let (completion, build) = BuildCompletion::channel();
            self.build = Some(build);
            resource.create_from_payload(payload, completion);
            resource.set_visibility_distance(visibility * CARTESIAN_SCALE_INV);

            self.resource = Some(resource);
            self.json_url = options.url;
            tracing::debug!(id = %self.id, url = ?self.json_url, "building surface");
        }

        if let (Some(lng), Some(lat), Some(elv)) = (
            set_value(options.longitude),
            set_value(options.latitude),
            set_value(options.elevation),
        ) {
            self.longitude = lng;
            self.latitude = lat;
            self.elevation = elv;
        }

        Ok(())
    }

    fn abort(&self, error: Error) -> Error {
        tracing::warn!(id = %self.id, "surface creation aborted: {error}");
        error
    }

    /// Apply a finished build, if one is waiting.
    ///
    /// Returns `true` if the status changed.
    pub fn poll(&mut self) -> bool {
        let Some(build) = &self.build else {
            return false;
        };
        let Ok(outcome) = build.try_recv() else {
            return false;
        };
        self.finish_build(outcome);
        true
    }

    /// Wait for the build to finish and return the resulting status.
    ///
    /// Returns the current status straight away if no build is pending.
    pub async fn wait(&mut self) -> SurfaceStatus {
        if let Some(build) = &self.build {
            let outcome = build.recv().await.unwrap_or(BuildOutcome::Failed(Error::Abandoned));
            self.finish_build(outcome);
        }
        self.status
    }

    fn finish_build(&mut self, outcome: BuildOutcome) {
        self.build = None;
        match outcome {
            BuildOutcome::Ready => self.on_ready(),
            BuildOutcome::Failed(error) => self.on_failed(&error),
        }
    }

    fn on_ready(&mut self) {
        if is_set(self.longitude) && is_set(self.latitude) {
            self.set_position_wgs84(self.longitude, self.latitude, self.elevation, None);
        }
        self.status = SurfaceStatus::Ready;
        tracing::info!(id = %self.id, "surface ready");
        self.notify(SurfaceEvent::Ready(self.id));
    }

    fn on_failed(&mut self, error: &Error) {
        self.status = SurfaceStatus::Failed;
        tracing::warn!(id = %self.id, "surface build failed: {error}");
        self.notify(SurfaceEvent::Failed(self.id));
    }

    fn notify(&self, event: SurfaceEvent) {
        let Some(events) = &self.events else {
            return;
        };
        if events.try_send(event).is_err() {
            tracing::debug!(id = %self.id, "surface event receiver closed");
        }
    }

    /// Place the surface at a geodetic position, optionally rotated.
    pub fn set_position_wgs84(
        &mut self,
        lng: f64,
        lat: f64,
        elevation: f64,
        orientation: Option<Orientation>,
    ) {
        let Some(resource) = &mut self.resource else {
            tracing::debug!(id = %self.id, "cannot position surface without a resource");
            return;
        };
        resource.set_as_navigation_frame(lng, lat, elevation, orientation.unwrap_or_default());
    }

    /// Place the surface at a geodetic position with a quaternion rotation.
    pub fn set_position_wgs84_quat(&mut self, lng: f64, lat: f64, elevation: f64, rotation: DQuat) {
        let Some(resource) = &mut self.resource else {
            tracing::debug!(id = %self.id, "cannot position surface without a resource");
            return;
        };
        resource.set_as_navigation_frame_quat(lng, lat, elevation, rotation);
    }

    /// Show the surface.
    pub fn show(&mut self) {
        if let Some(resource) = &mut self.resource {
            resource.set_hidden(false);
        }
    }

    /// Hide the surface.
    pub fn hide(&mut self) {
        if let Some(resource) = &mut self.resource {
            resource.set_hidden(true);
        }
    }

    /// Tint the surface.
    pub fn set_highlight_color(&mut self, r: f32, g: f32, b: f32, a: f32) {
        if let Some(resource) = &mut self.resource {
            resource.set_highlight_color([r, g, b, a]);
        }
    }

    /// Release the resource.
    ///
    /// A destroyed surface reports `Failed`, even if it was `Ready`. Builds
    /// that finish afterwards are ignored. Calling this again does nothing.
    pub fn destroy(&mut self) {
        let Some(mut resource) = self.resource.take() else {
            return;
        };
        resource.destroy();
        self.build = None;
        self.status = SurfaceStatus::Failed;
        tracing::debug!(id = %self.id, "surface destroyed");
    }
}

impl<R: SurfaceResource> fmt::Debug for SurfaceObject<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SurfaceObject")
            .field("id", &self.id)
            .field("status", &self.status)
            .field("has_resource", &self.resource.is_some())
            .field("json_url", &self.json_url)
            .finish_non_exhaustive()
    }
}

//! The engine-side resource a surface object wraps.

use glam::DQuat;
use serde_json::Value;

use crate::error::Error;
use crate::geodesy::Orientation;
use crate::surface::ObjectId;

/// How a resource build ended.
#[derive(Debug)]
pub enum BuildOutcome {
    /// The resource is ready to render.
    Ready,
    /// The resource could not be built.
    Failed(Error),
}

/// One-shot handle a resource uses to report the end of its build.
///
/// Calling [`BuildCompletion::ready`] or [`BuildCompletion::failed`] consumes
/// the handle, so a build reports at most once. Dropping it unused reports
/// [`Error::Abandoned`], so a build always reports exactly once.
#[derive(Debug)]
pub struct BuildCompletion {
    tx: Option<async_channel::Sender<BuildOutcome>>,
}

impl BuildCompletion {
    pub(crate) fn channel() -> (Self, async_channel::Receiver<BuildOutcome>) {
        let (tx, rx) = async_channel::bounded(1);
        (Self { tx: Some(tx) }, rx)
    }

    /// Report a successful build.
    pub fn ready(mut self) {
        self.finish(BuildOutcome::Ready);
    }

    /// Report a failed build.
    pub fn failed(mut self, error: Error) {
        self.finish(BuildOutcome::Failed(error));
    }

    fn finish(&mut self, outcome: BuildOutcome) {
        let Some(tx) = self.tx.take() else {
            return;
        };
        if tx.try_send(outcome).is_err() {
            tracing::debug!("surface owner stopped listening before build finished");
        }
    }
}

impl Drop for BuildCompletion {
    fn drop(&mut self) {
        self.finish(BuildOutcome::Failed(Error::Abandoned));
    }
}

/// A renderable mesh resource owned by a surface object.
pub trait SurfaceResource: Send {
    /// Start building the resource from a JSON payload.
    ///
    /// Must not block. `completion` is signalled once the build ends.
    fn create_from_payload(&mut self, payload: Value, completion: BuildCompletion);

    /// Anchor the resource in the local tangent frame at a geodetic position
    /// with Euler angles.
    fn set_as_navigation_frame(
        &mut self,
        lng: f64,
        lat: f64,
        elevation: f64,
        orientation: Orientation,
    );

    /// Anchor the resource in the local tangent frame at a geodetic position
    /// with a quaternion.
    fn set_as_navigation_frame_quat(&mut self, lng: f64, lat: f64, elevation: f64, rotation: DQuat);

    /// Tint the resource, RGBA in `0.0..=1.0`.
    fn set_highlight_color(&mut self, color: [f32; 4]);

    /// Hide or show the resource.
    fn set_hidden(&mut self, hidden: bool);

    /// Whether the resource is hidden.
    fn is_hidden(&self) -> bool;

    /// Set the distance (scene units) beyond which the resource is culled.
    fn set_visibility_distance(&mut self, distance: f64);

    /// The culling distance in scene units.
    fn visibility_distance(&self) -> f64;

    /// Release engine-side storage.
    fn destroy(&mut self);
}

/// The rendering context a surface object builds its resource with.
pub trait SurfaceEngine {
    /// The resource type this engine builds.
    type Resource: SurfaceResource;

    /// Create an empty resource owned by `owner`.
    fn create_surface(&self, owner: ObjectId) -> Self::Resource;
}

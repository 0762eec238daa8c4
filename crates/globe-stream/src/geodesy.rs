//! WGS84 geodesy and local navigation frames.
//!
//! Scene coordinates are ECEF divided by [`CARTESIAN_SCALE`], so the globe
//! has a radius of roughly one unit.

use glam::{DMat3, DMat4, DQuat, DVec3};

/// WGS84 semi-major axis in meters.
pub const WGS84_A: f64 = 6_378_137.0;

/// WGS84 flattening.
pub const WGS84_F: f64 = 1.0 / 298.257_223_563;

/// WGS84 first eccentricity squared.
pub const WGS84_E2: f64 = WGS84_F * (2.0 - WGS84_F);

/// Meters per scene unit.
pub const CARTESIAN_SCALE: f64 = WGS84_A;

/// Scene units per meter.
pub const CARTESIAN_SCALE_INV: f64 = 1.0 / CARTESIAN_SCALE;

/// Orientation of an object in its local east-north-up frame, in degrees.
///
/// Yaw turns clockwise from north about the up axis, pitch raises the nose
/// about the east axis, and roll banks about the north axis. They are
/// applied in that order.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Orientation {
    /// Heading in degrees, clockwise from north.
    pub yaw: f64,
    /// Pitch in degrees, positive up.
    pub pitch: f64,
    /// Roll in degrees.
    pub roll: f64,
}

impl Orientation {
    /// Create an orientation from yaw, pitch and roll in degrees.
    #[must_use]
    pub fn new(yaw: f64, pitch: f64, roll: f64) -> Self {
        Self { yaw, pitch, roll }
    }

    /// The rotation from body axes to east-north-up axes.
    #[must_use]
    pub fn to_quat(&self) -> DQuat {
        DQuat::from_rotation_z(-self.yaw.to_radians())
            * DQuat::from_rotation_x(self.pitch.to_radians())
            * DQuat::from_rotation_y(self.roll.to_radians())
    }
}

/// Convert geodetic coordinates (degrees, meters above the ellipsoid) to
/// ECEF meters.
#[must_use]
pub fn geodetic_to_ecef(lng_deg: f64, lat_deg: f64, elevation: f64) -> DVec3 {
    let (sin_lat, cos_lat) = lat_deg.to_radians().sin_cos();
    let (sin_lng, cos_lng) = lng_deg.to_radians().sin_cos();

    // Prime vertical radius of curvature.
    let n = WGS84_A / (1.0 - WGS84_E2 * sin_lat * sin_lat).sqrt();

    DVec3::new(
        (n + elevation) * cos_lat * cos_lng,
        (n + elevation) * cos_lat * sin_lng,
        (n * (1.0 - WGS84_E2) + elevation) * sin_lat,
    )
}

/// East, north and up unit vectors at a geodetic position, as matrix columns.
#[must_use]
pub fn enu_basis(lng_deg: f64, lat_deg: f64) -> DMat3 {
    let (sin_lat, cos_lat) = lat_deg.to_radians().sin_cos();
    let (sin_lng, cos_lng) = lng_deg.to_radians().sin_cos();

    let east = DVec3::new(-sin_lng, cos_lng, 0.0);
    let north = DVec3::new(-sin_lat * cos_lng, -sin_lat * sin_lng, cos_lat);
    let up = DVec3::new(cos_lat * cos_lng, cos_lat * sin_lng, sin_lat);
    DMat3::from_cols(east, north, up)
}

/// Model matrix placing an object at a geodetic position with a rotation
/// relative to the local east-north-up frame. Output is in scene units.
#[must_use]
pub fn navigation_frame_quat(lng_deg: f64, lat_deg: f64, elevation: f64, rotation: DQuat) -> DMat4 {
    let basis = enu_basis(lng_deg, lat_deg) * DMat3::from_quat(rotation.normalize());
    let origin = geodetic_to_ecef(lng_deg, lat_deg, elevation) * CARTESIAN_SCALE_INV;

    DMat4::from_cols(
        basis.x_axis.extend(0.0),
        basis.y_axis.extend(0.0),
        basis.z_axis.extend(0.0),
        origin.extend(1.0),
    )
}

/// Model matrix placing an object at a geodetic position with Euler angles
/// relative to the local east-north-up frame. Output is in scene units.
#[must_use]
pub fn navigation_frame_euler(
    lng_deg: f64,
    lat_deg: f64,
    elevation: f64,
    orientation: Orientation,
) -> DMat4 {
    navigation_frame_quat(lng_deg, lat_deg, elevation, orientation.to_quat())
}

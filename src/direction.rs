use serde::{Deserialize, Serialize};
use uom::si::{
    angle::{degree, radian},
    f64::Angle,
};

/// A direction in the sky as seen by an observer on the ground.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SkyDirection {
    /// Azimuth angle clock-wise from north.
    azimuth: Angle,

    /// Altitude angle above the horizon.
    altitude: Angle,
}

impl SkyDirection {
    pub fn new(azimuth: Angle, altitude: Angle) -> Self {
        Self { azimuth, altitude }
    }

    /// Create a `SkyDirection` from an azimuth and altitude in degrees.
    pub fn from_degrees(azimuth: f64, altitude: f64) -> Self {
        Self::new(
            Angle::new::<degree>(azimuth),
            Angle::new::<degree>(altitude),
        )
    }

    /// Create a `SkyDirection` pointing straight up.
    pub fn zenith() -> Self {
        Self::from_degrees(0.0, 90.0)
    }

    pub fn azimuth(&self) -> Angle {
        self.azimuth
    }

    pub fn altitude(&self) -> Angle {
        self.altitude
    }

    /// Angle between the zenith and this direction.
    pub fn zenith_angle(&self) -> Angle {
        Angle::new::<degree>(90.0) - self.altitude
    }

    /// Returns `(azimuth, altitude)` in degrees.
    pub fn to_degrees(&self) -> (f64, f64) {
        (self.azimuth.get::<degree>(), self.altitude.get::<degree>())
    }

    /// Returns `(azimuth, altitude)` in radians.
    pub fn to_radians(&self) -> (f64, f64) {
        (self.azimuth.get::<radian>(), self.altitude.get::<radian>())
    }

    /// Returns `true` if the direction is on or above the horizon.
    pub fn is_visible(&self) -> bool {
        self.altitude.get::<degree>() >= 0.0
    }
}

impl From<(f64, f64)> for SkyDirection {
    fn from(degrees: (f64, f64)) -> Self {
        let (azimuth, altitude) = degrees;
        Self::from_degrees(azimuth, altitude)
    }
}

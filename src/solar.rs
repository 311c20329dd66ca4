use crate::{direction::SkyDirection, error::ErrorKind};
use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::trace;
use uom::si::{angle::degree, f64::Angle};

#[derive(Debug, Error)]
pub enum SolarError {
    #[error("instant {instant} cannot be shifted into universal time")]
    InstantOutOfRange { instant: NaiveDateTime },
    #[error("solar ephemeris rejected the site parameters: {reason}")]
    Ephemeris { reason: String },
}

impl SolarError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::UnsupportedParameter
    }
}

/// Observer site parameters for solar position calculations.
///
/// Instants passed alongside a `SiteParams` are local civil time at the site,
/// offset from UTC by `time_zone` hours.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SiteParams {
    /// Offset from UTC in hours, negative west of Greenwich.
    pub time_zone: f64,
    /// Difference between UT1 and UTC in seconds.
    pub delta_ut1: f64,
    /// Difference between terrestrial time and UT1 in seconds.
    pub delta_t: f64,
    /// Degrees, negative west of Greenwich.
    pub longitude: f64,
    /// Degrees, negative south of the equator.
    pub latitude: f64,
    /// Meters above sea level.
    pub elevation: f64,
    /// Millibars.
    pub pressure: f64,
    /// Degrees Celsius.
    pub temperature: f64,
    /// Surface slope in degrees from horizontal.
    pub slope: f64,
    /// Surface azimuth rotation in degrees from south.
    pub azm_rotation: f64,
    /// Atmospheric refraction at sunrise and sunset in degrees.
    pub atmos_refract: f64,
}

impl SiteParams {
    /// Offset that converts a local instant at the site into UT1.
    ///
    /// `None` when the offset does not fit a [`TimeDelta`].
    fn ut1_offset(&self) -> Option<TimeDelta> {
        let seconds = self.delta_ut1 - self.time_zone * 3600.;
        if !seconds.is_finite() {
            return None;
        }
        TimeDelta::try_milliseconds((seconds * 1000.).round() as i64)
    }
}

impl Default for SiteParams {
    /// The worked example site published alongside the NREL solar position
    /// algorithm.
    fn default() -> Self {
        Self {
            time_zone: -7.0,
            delta_ut1: 0.0,
            delta_t: 67.0,
            longitude: -105.1786,
            latitude: 39.742476,
            elevation: 1830.14,
            pressure: 820.0,
            temperature: 11.0,
            slope: 30.0,
            azm_rotation: -10.0,
            atmos_refract: 0.5667,
        }
    }
}

/// Location of the sun's center for an observer at a given instant.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SunPosition {
    /// Measured clock-wise from north.
    azimuth: Angle,
    /// Measured from the horizon towards the zenith.
    altitude: Angle,
    /// Local instant at the site.
    instant: NaiveDateTime,
}

impl SunPosition {
    pub fn azimuth(&self) -> Angle {
        self.azimuth
    }

    pub fn altitude(&self) -> Angle {
        self.altitude
    }

    pub fn instant(&self) -> NaiveDateTime {
        self.instant
    }

    pub fn direction(&self) -> SkyDirection {
        SkyDirection::new(self.azimuth, self.altitude)
    }

    /// Returns `true` if the sun is between the horizon and the zenith.
    pub fn is_visible(&self) -> bool {
        (0.0..=90.0).contains(&self.altitude.get::<degree>())
    }
}

/// Compute the position of the sun as seen from `site` at the local `instant`.
pub fn compute_position(
    site: SiteParams,
    instant: NaiveDateTime,
) -> Result<SunPosition, SolarError> {
    let ut1 = site
        .ut1_offset()
        .and_then(|offset| instant.checked_add_signed(offset))
        .ok_or(SolarError::InstantOutOfRange { instant })?
        .and_utc();

    let solar_pos = spa::solar_position::<spa::StdFloatOps>(ut1, site.latitude, site.longitude)
        .map_err(|err| SolarError::Ephemeris {
            reason: format!("{err:?}"),
        })?;

    trace!(
        %instant,
        azimuth = solar_pos.azimuth,
        zenith = solar_pos.zenith_angle,
        "computed solar position"
    );

    Ok(SunPosition {
        azimuth: Angle::new::<degree>(solar_pos.azimuth),
        // This crate works with altitude rather than zenith angle.
        altitude: Angle::new::<degree>(90. - solar_pos.zenith_angle),
        instant,
    })
}

/// Compute the hourly path of the sun over `date` as seen from `site`.
///
/// Samples every hour of the local day on the hour and keeps the samples
/// where the sun is above the horizon, in order of the hour.
pub fn compute_sun_path(
    site: SiteParams,
    date: NaiveDate,
) -> Result<Vec<SunPosition>, SolarError> {
    let mut path = Vec::with_capacity(24);
    for instant in (0..24).filter_map(|hour| date.and_hms_opt(hour, 0, 0)) {
        let position = compute_position(site, instant)?;
        if position.is_visible() {
            path.push(position);
        }
    }

    trace!(%date, samples = path.len(), "computed sun path");
    Ok(path)
}

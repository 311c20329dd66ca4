//! Dataset configuration.
//!
//! Every dataset carries a JSON configuration file at its root describing how
//! the data was captured. The file is validated as a whole when it is loaded
//! and is immutable afterwards. A configuration that fails any check is
//! rejected entirely.

use crate::{
    cover::{CoverInterval, SkyCover, SkyCoverCalendar},
    direction::SkyDirection,
    error::ErrorKind,
    projection::{FisheyeProjector, LENS_COEFFICIENTS, LensModel},
    solar::SiteParams,
};
use chrono::NaiveDateTime;
use serde::Deserialize;
use std::{
    io,
    ops::RangeInclusive,
    path::{Path, PathBuf},
    sync::{Arc, PoisonError, RwLock},
};
use thiserror::Error;
use tracing::{info, warn};

/// Name of the configuration file at the root of a dataset.
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Format of a sky cover calendar date joined with one of its times.
const CALENDAR_FORMAT: &str = "%m/%d/%Y %H:%M";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration {path:?}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("capture epsilon must be a non-negative number of seconds but got: {epsilon}")]
    CaptureEpsilon { epsilon: f64 },
    #[error("spectral range start {start} is greater than end {end}")]
    SpectralRange { start: f64, end: f64 },
    #[error("sampling pattern is empty")]
    EmptySamplingPattern,
    #[error("sampling pattern entry {index} repeats ({azimuth}, {altitude})")]
    DuplicateSample {
        index: usize,
        azimuth: f64,
        altitude: f64,
    },
    #[error("sampling pattern entry {index} has altitude {altitude} outside [-90, 90]")]
    SampleAltitude { index: usize, altitude: f64 },
    #[error("exposure list is empty")]
    EmptyExposures,
    #[error("exposure {exposure} is listed more than once")]
    DuplicateExposure { exposure: f64 },
    #[error("sky cover entry {index} is malformed: {reason}")]
    MalformedCalendarEntry { index: usize, reason: String },
    #[error("site position ({latitude}, {longitude}) is not a valid latitude and longitude")]
    SitePosition { latitude: f64, longitude: f64 },
    #[error("site time zone {time_zone} or UT1 offset {delta_ut1} is out of range")]
    SiteTime { time_zone: f64, delta_ut1: f64 },
}

impl ConfigError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::ConfigInvalid
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawConfig {
    capture_epsilon: f64,
    spectrum_start: f64,
    spectrum_end: f64,
    sampling_pattern: Vec<[f64; 2]>,
    exposures: Vec<f64>,
    lens: RawLens,
    sky_cover: Vec<Vec<String>>,
    #[serde(rename = "SPA")]
    spa: SiteParams,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawLens {
    linearity: [f64; LENS_COEFFICIENTS],
    inverse: [f64; LENS_COEFFICIENTS],
}

/// Validated, immutable description of how a dataset was captured.
#[derive(Clone, Debug, PartialEq)]
pub struct Configuration {
    capture_epsilon: f64,
    spectral_range: RangeInclusive<f64>,
    sampling_pattern: Vec<SkyDirection>,
    sampling_pattern_radians: Vec<(f64, f64)>,
    altitude_rings: Vec<f64>,
    exposures: Vec<f64>,
    lens: LensModel,
    sky_cover: SkyCoverCalendar,
    site: SiteParams,
}

impl Configuration {
    /// Load and validate the configuration file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let config = Self::from_json_str(&json).inspect_err(|err| {
            warn!(?path, %err, "rejected dataset configuration");
        })?;

        info!(
            ?path,
            samples = config.sampling_pattern.len(),
            exposures = config.exposures.len(),
            sky_cover = config.sky_cover.len(),
            "loaded dataset configuration"
        );
        Ok(config)
    }

    /// Load the configuration stored at the root of the dataset at `root`.
    pub fn load_from_dataset(root: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::load(root.as_ref().join(CONFIG_FILE_NAME))
    }

    /// Parse and validate a configuration from JSON text.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = serde_json::from_str(json)?;
        Self::try_from(raw)
    }

    /// Maximum difference in seconds between a photograph and a scan of the
    /// same capture.
    pub fn capture_epsilon(&self) -> f64 {
        self.capture_epsilon
    }

    /// Wavelength range in nanometers measured by the spectroradiometer.
    pub fn spectral_range(&self) -> &RangeInclusive<f64> {
        &self.spectral_range
    }

    /// Sky directions scanned at every capture, in scan order.
    pub fn sampling_pattern(&self) -> &[SkyDirection] {
        &self.sampling_pattern
    }

    /// `(azimuth, altitude)` of every sampling pattern entry in radians.
    pub fn sampling_pattern_radians(&self) -> &[(f64, f64)] {
        &self.sampling_pattern_radians
    }

    /// Distinct sampling pattern altitudes in degrees, ascending.
    pub fn altitude_rings(&self) -> &[f64] {
        &self.altitude_rings
    }

    pub fn exposures(&self) -> &[f64] {
        &self.exposures
    }

    /// Position of `exposure` within the exposure list.
    pub fn exposure_index(&self, exposure: f64) -> Option<usize> {
        self.exposures.iter().position(|e| *e == exposure)
    }

    /// The calibrated lens of the camera.
    pub fn lens(&self) -> &LensModel {
        &self.lens
    }

    pub fn projector(&self) -> FisheyeProjector {
        FisheyeProjector::new(self.lens)
    }

    pub fn sky_cover(&self) -> &SkyCoverCalendar {
        &self.sky_cover
    }

    pub fn site(&self) -> SiteParams {
        self.site
    }
}

impl TryFrom<RawConfig> for Configuration {
    type Error = ConfigError;

    fn try_from(raw: RawConfig) -> Result<Self, Self::Error> {
        if !raw.capture_epsilon.is_finite() || raw.capture_epsilon < 0. {
            return Err(ConfigError::CaptureEpsilon {
                epsilon: raw.capture_epsilon,
            });
        }

        if raw.spectrum_start > raw.spectrum_end {
            return Err(ConfigError::SpectralRange {
                start: raw.spectrum_start,
                end: raw.spectrum_end,
            });
        }

        let sampling_pattern = validate_sampling_pattern(&raw.sampling_pattern)?;
        let sampling_pattern_radians = sampling_pattern
            .iter()
            .map(SkyDirection::to_radians)
            .collect();

        let mut altitude_rings: Vec<f64> = raw.sampling_pattern.iter().map(|s| s[1]).collect();
        altitude_rings.sort_by(f64::total_cmp);
        altitude_rings.dedup();

        if raw.exposures.is_empty() {
            return Err(ConfigError::EmptyExposures);
        }
        for (index, exposure) in raw.exposures.iter().enumerate() {
            if raw.exposures[..index].contains(exposure) {
                return Err(ConfigError::DuplicateExposure {
                    exposure: *exposure,
                });
            }
        }

        let sky_cover = raw
            .sky_cover
            .iter()
            .enumerate()
            .map(|(index, row)| {
                parse_calendar_row(row)
                    .map_err(|reason| ConfigError::MalformedCalendarEntry { index, reason })
            })
            .collect::<Result<Vec<_>, _>>()?;

        if !(-90.0..=90.0).contains(&raw.spa.latitude)
            || !(-180.0..=180.0).contains(&raw.spa.longitude)
        {
            return Err(ConfigError::SitePosition {
                latitude: raw.spa.latitude,
                longitude: raw.spa.longitude,
            });
        }

        // Time zones span UTC-12 to UTC+14 and |UT1 - UTC| stays below a second.
        if !(-18.0..=18.0).contains(&raw.spa.time_zone) || !(raw.spa.delta_ut1.abs() < 1.) {
            return Err(ConfigError::SiteTime {
                time_zone: raw.spa.time_zone,
                delta_ut1: raw.spa.delta_ut1,
            });
        }

        Ok(Self {
            capture_epsilon: raw.capture_epsilon,
            spectral_range: raw.spectrum_start..=raw.spectrum_end,
            sampling_pattern,
            sampling_pattern_radians,
            altitude_rings,
            exposures: raw.exposures,
            lens: LensModel::new(raw.lens.linearity, raw.lens.inverse),
            sky_cover: SkyCoverCalendar::new(sky_cover),
            site: raw.spa,
        })
    }
}

fn validate_sampling_pattern(pattern: &[[f64; 2]]) -> Result<Vec<SkyDirection>, ConfigError> {
    if pattern.is_empty() {
        return Err(ConfigError::EmptySamplingPattern);
    }

    for (index, &[azimuth, altitude]) in pattern.iter().enumerate() {
        if !(-90.0..=90.0).contains(&altitude) {
            return Err(ConfigError::SampleAltitude { index, altitude });
        }
        if pattern[..index].contains(&[azimuth, altitude]) {
            return Err(ConfigError::DuplicateSample {
                index,
                azimuth,
                altitude,
            });
        }
    }

    Ok(pattern
        .iter()
        .map(|&[azimuth, altitude]| SkyDirection::from_degrees(azimuth, altitude))
        .collect())
}

/// Parse a `[date, start, end, code]` sky cover row.
fn parse_calendar_row(row: &[String]) -> Result<CoverInterval, String> {
    let [date, start, end, code] = row else {
        return Err(format!("expected 4 fields but got {}", row.len()));
    };

    let parse = |time: &str| {
        NaiveDateTime::parse_from_str(&format!("{date} {time}"), CALENDAR_FORMAT)
            .map_err(|err| format!("{date} {time}: {err}"))
    };

    Ok(CoverInterval::new(
        parse(start)?,
        parse(end)?,
        code.parse::<SkyCover>()?,
    ))
}

/// Shared handle to the configuration of the currently loaded dataset.
///
/// Readers take a snapshot with [`ConfigHandle::current`] and keep using it
/// even if the dataset is reloaded in the meantime. A failed reload leaves
/// the previous configuration in place.
#[derive(Debug)]
pub struct ConfigHandle {
    current: RwLock<Arc<Configuration>>,
}

impl ConfigHandle {
    pub fn new(config: Configuration) -> Self {
        Self {
            current: RwLock::new(Arc::new(config)),
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Ok(Self::new(Configuration::load(path)?))
    }

    /// A snapshot of the current configuration.
    pub fn current(&self) -> Arc<Configuration> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Swap in `config` and return the configuration it replaced.
    pub fn replace(&self, config: Configuration) -> Arc<Configuration> {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *current, Arc::new(config))
    }

    /// Load the configuration at `path` and swap it in if it is valid.
    pub fn reload(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let config = Configuration::load(path)?;
        let previous = self.replace(config);
        info!(
            epsilon = previous.capture_epsilon,
            "replaced dataset configuration"
        );
        Ok(())
    }
}

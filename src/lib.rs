//! Sky Data Correlation Utilities
//!
//! Correlates fisheye sky photographs with spectroradiometer scans taken at
//! the same site and extracts radiometric samples at the scanned sky
//! directions, annotated with the sun's position and the recorded sky cover.

#[allow(missing_docs)]
pub mod error;

pub mod capture;
pub mod config;
pub mod correlate;
pub mod cover;
pub mod direction;
pub mod exif;
pub mod projection;
pub mod sampler;
pub mod scan;
pub mod solar;

pub mod prelude {
    pub use crate::{
        capture::{CaptureReport, CaptureSampler, DirectionSample},
        config::{ConfigHandle, Configuration},
        correlate::{Correlator, DatasetLayout, Photo, ScanSet, Timed, find_photo_groups},
        cover::{SkyCover, SkyCoverCalendar},
        direction::SkyDirection,
        error::{Error, ErrorKind},
        exif::{ExifLookup, capture_time},
        projection::{FisheyeProjector, LensModel, PixelCoordinate, Projection},
        sampler::{PixelSampler, PixelWeighting},
        scan::Spectrum,
        solar::{SiteParams, SunPosition, compute_position, compute_sun_path},
    };
}

//! Sampling of a whole capture.
//!
//! For one capture instant the sampling pattern is projected into the
//! photograph, sampled, paired with the matching scans and annotated with
//! the sun's position and the recorded sky cover.

use crate::{
    config::Configuration,
    correlate::{CorrelateError, Correlator},
    cover::SkyCover,
    direction::SkyDirection,
    error::Error,
    projection::{FisheyeProjector, PixelCoordinate, Projection},
    sampler::{PixelSampler, PixelWeighting, SampleError},
    solar::{SunPosition, compute_position},
};
use chrono::NaiveDateTime;
use image::{ImageBuffer, Pixel};
use num_traits::PrimInt;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// The sample and scan of one sampling pattern entry.
#[derive(Clone, Debug)]
pub struct DirectionSample<P> {
    /// Position within the sampling pattern.
    pub index: usize,
    pub direction: SkyDirection,
    pub pixel: PixelCoordinate,
    pub sample: Result<P, SampleError>,
    pub scan: Result<PathBuf, CorrelateError>,
}

/// Everything known about one capture.
#[derive(Clone, Debug)]
pub struct CaptureReport<P> {
    pub capture: NaiveDateTime,
    pub sun: SunPosition,
    pub sky_cover: SkyCover,
    pub samples: Vec<DirectionSample<P>>,
}

impl<P> CaptureReport<P> {
    /// Directions with both a pixel sample and a scan.
    pub fn complete(&self) -> impl Iterator<Item = &DirectionSample<P>> {
        self.samples
            .iter()
            .filter(|sample| sample.sample.is_ok() && sample.scan.is_ok())
    }
}

/// Samples captures of one dataset.
#[derive(Clone, Debug)]
pub struct CaptureSampler {
    config: Configuration,
    projector: FisheyeProjector,
    projection: Projection,
    sampler: PixelSampler,
    region: u32,
}

impl CaptureSampler {
    pub fn new(
        config: &Configuration,
        projection: Projection,
        weighting: PixelWeighting,
        region: u32,
    ) -> Self {
        Self {
            config: config.clone(),
            projector: config.projector(),
            projection,
            sampler: PixelSampler::new(weighting),
            region,
        }
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    /// Sample `photo`, taken at `capture`, against the dataset at `root`.
    ///
    /// Missing scans and samples that cannot be taken are recorded per
    /// direction. Fails only if the sun cannot be placed or the sampler
    /// rejects its input as a whole.
    pub fn sample_capture<P>(
        &self,
        root: impl Into<PathBuf>,
        capture: NaiveDateTime,
        photo: &ImageBuffer<P, Vec<P::Subpixel>>,
    ) -> Result<CaptureReport<P>, Error>
    where
        P: Pixel + Send + Sync,
        P::Subpixel: PrimInt + Send + Sync,
    {
        let sun = compute_position(self.config.site(), capture)?;
        let sky_cover = self.config.sky_cover().classify(capture);

        let (width, height) = photo.dimensions();
        let pattern = self.config.sampling_pattern();
        let pixels = self
            .projector
            .points_in_image(pattern, width, height, self.projection);
        let regions = vec![self.region; pixels.len()];
        let samples = self.sampler.par_sample(photo, &pixels, &regions)?;

        let root = root.into();
        let scans = Correlator::new(&root, &self.config).find_scan_set(capture);
        if let Err(err) = &scans {
            warn!(%capture, ?root, %err, "capture has no scans");
        }

        let samples: Vec<_> = pattern
            .iter()
            .zip(pixels)
            .zip(samples)
            .enumerate()
            .map(|(index, ((direction, pixel), sample))| DirectionSample {
                index,
                direction: *direction,
                pixel,
                sample,
                scan: scans
                    .as_ref()
                    .map_err(Clone::clone)
                    .and_then(|set| set.file(index).map(Path::to_path_buf)),
            })
            .collect();

        let report = CaptureReport {
            capture,
            sun,
            sky_cover,
            samples,
        };
        info!(
            %capture,
            %sky_cover,
            directions = report.samples.len(),
            complete = report.complete().count(),
            "sampled capture"
        );
        Ok(report)
    }
}

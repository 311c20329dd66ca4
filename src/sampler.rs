//! Radiometric samples from photograph pixel buffers.
//!
//! A sample is a single pixel value per sky direction. Sampling a region
//! larger than one pixel convolves the square neighborhood centered on the
//! point with a normalized kernel and rounds the result back into the
//! image's channel type.

use crate::{error::ErrorKind, projection::PixelCoordinate};
use image::{ImageBuffer, Pixel};
use num_traits::{NumCast, PrimInt, ToPrimitive};
use once_cell::sync::Lazy;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error;

/// Smallest supported neighborhood edge in pixels.
pub const PIXEL_REGION_MIN: u32 = 1;

/// Largest supported neighborhood edge in pixels.
pub const PIXEL_REGION_MAX: u32 = 25;

#[derive(Clone, Debug, Error)]
pub enum SampleError {
    #[error("got {points} points but {regions} region sizes")]
    LengthMismatch { points: usize, regions: usize },
    #[error("region size {size} is not 1 or an odd size from 3 to 25")]
    UnsupportedRegion { size: u32 },
    #[error("{weighting} weighting is not supported for region size {size}")]
    UnsupportedWeighting { weighting: PixelWeighting, size: u32 },
    #[error("{size}x{size} region at ({x}, {y}) is not inside the {width}x{height} image")]
    OutOfBounds {
        x: i64,
        y: i64,
        size: u32,
        width: u32,
        height: u32,
    },
}

impl SampleError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SampleError::OutOfBounds { .. } => ErrorKind::OutOfBounds,
            _ => ErrorKind::UnsupportedParameter,
        }
    }
}

/// How the pixels of a neighborhood are combined into one sample.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PixelWeighting {
    /// Every pixel has the same weight.
    Mean,
    /// Reserved. Only region size 1 can be sampled.
    Median,
    /// Pixels are weighted by a normal distribution centered on the point.
    #[default]
    Gaussian,
}

impl fmt::Display for PixelWeighting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PixelWeighting::Mean => "mean",
            PixelWeighting::Median => "median",
            PixelWeighting::Gaussian => "gaussian",
        };
        f.write_str(name)
    }
}

impl FromStr for PixelWeighting {
    type Err = String;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name.trim().to_ascii_lowercase().as_str() {
            "mean" => Ok(PixelWeighting::Mean),
            "median" => Ok(PixelWeighting::Median),
            "gaussian" => Ok(PixelWeighting::Gaussian),
            other => Err(format!("unknown pixel weighting: {other:?}")),
        }
    }
}

/// Square convolution kernel with weights in row-major order.
#[derive(Clone, Debug, PartialEq)]
pub struct Kernel {
    size: u32,
    weights: Vec<f64>,
}

/// Fails unless `size` is an odd region size from 3 to the maximum.
fn check_kernel_size(size: u32) -> Result<(), SampleError> {
    match size >= PIXEL_REGION_MIN + 2 && size <= PIXEL_REGION_MAX && size % 2 == 1 {
        true => Ok(()),
        false => Err(SampleError::UnsupportedRegion { size }),
    }
}

impl Kernel {
    /// Uniform kernel with every weight `1 / size²`.
    pub fn mean(size: u32) -> Result<Self, SampleError> {
        check_kernel_size(size)?;
        let len = (size * size) as usize;
        Ok(Self {
            size,
            weights: vec![1. / len as f64; len],
        })
    }

    /// Normalized Gaussian kernel.
    ///
    /// The standard deviation is half of the kernel radius so the kernel
    /// spans two standard deviations either side of its center.
    pub fn gaussian(size: u32) -> Result<Self, SampleError> {
        check_kernel_size(size)?;
        let radius = (size / 2) as f64;
        let sigma = radius / 2.;

        let mut weights: Vec<f64> = (0..size)
            .flat_map(|row| (0..size).map(move |col| (row as f64, col as f64)))
            .map(|(row, col)| {
                let (dx, dy) = ((col - radius) / sigma, (row - radius) / sigma);
                (-0.5 * (dx * dx + dy * dy)).exp()
            })
            .collect();

        let total: f64 = weights.iter().sum();
        weights.iter_mut().for_each(|w| *w /= total);

        Ok(Self { size, weights })
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn radius(&self) -> u32 {
        self.size / 2
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Weight of the pixel at `row`, `col` within the kernel.
    pub fn weight(&self, row: u32, col: u32) -> f64 {
        self.weights[(row * self.size + col) as usize]
    }
}

/// Kernels for every supported region size larger than one pixel.
#[derive(Debug)]
pub struct KernelTable {
    mean: Vec<Kernel>,
    gaussian: Vec<Kernel>,
}

static KERNELS: Lazy<KernelTable> = Lazy::new(KernelTable::new);

impl KernelTable {
    fn new() -> Self {
        let sizes = || (PIXEL_REGION_MIN + 2..=PIXEL_REGION_MAX).step_by(2);
        Self {
            mean: sizes().flat_map(Kernel::mean).collect(),
            gaussian: sizes().flat_map(Kernel::gaussian).collect(),
        }
    }

    /// The shared table, built on first use.
    pub fn shared() -> &'static KernelTable {
        &KERNELS
    }

    /// The kernel applying `weighting` to a `size` by `size` region.
    pub fn get(&self, weighting: PixelWeighting, size: u32) -> Result<&Kernel, SampleError> {
        check_kernel_size(size)?;
        let index = ((size - PIXEL_REGION_MIN - 2) / 2) as usize;
        let kernels = match weighting {
            PixelWeighting::Mean => &self.mean,
            PixelWeighting::Gaussian => &self.gaussian,
            PixelWeighting::Median => {
                return Err(SampleError::UnsupportedWeighting { weighting, size });
            }
        };

        kernels
            .get(index)
            .ok_or(SampleError::UnsupportedRegion { size })
    }
}

/// Extracts one sample per point from an image.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PixelSampler {
    weighting: PixelWeighting,
}

impl PixelSampler {
    pub fn new(weighting: PixelWeighting) -> Self {
        Self { weighting }
    }

    pub fn weighting(&self) -> PixelWeighting {
        self.weighting
    }

    /// Sample the `size` by `size` region of `image` centered on `point`.
    ///
    /// A region of one pixel returns the pixel unchanged whatever the
    /// weighting.
    pub fn sample_one<P>(
        &self,
        image: &ImageBuffer<P, Vec<P::Subpixel>>,
        point: PixelCoordinate,
        size: u32,
    ) -> Result<P, SampleError>
    where
        P: Pixel,
        P::Subpixel: PrimInt,
    {
        let (width, height) = image.dimensions();
        let out_of_bounds = || SampleError::OutOfBounds {
            x: point.x(),
            y: point.y(),
            size,
            width,
            height,
        };

        if size == PIXEL_REGION_MIN {
            let (x, y) = checked_position(point, width, height).ok_or_else(out_of_bounds)?;
            return Ok(*image.get_pixel(x, y));
        }

        let kernel = KernelTable::shared().get(self.weighting, size)?;
        let radius = kernel.radius() as i64;
        let corner = point
            .x()
            .checked_sub(radius)
            .zip(point.y().checked_sub(radius))
            .map(|(x, y)| PixelCoordinate::new(x, y));
        let far = point
            .x()
            .checked_add(radius)
            .zip(point.y().checked_add(radius))
            .map(|(x, y)| PixelCoordinate::new(x, y));
        let (left, top) = corner
            .and_then(|corner| checked_position(corner, width, height))
            .ok_or_else(out_of_bounds)?;
        far.and_then(|far| checked_position(far, width, height))
            .ok_or_else(out_of_bounds)?;

        Ok(convolve(image, left, top, kernel))
    }

    /// Sample every point with the region size at the same position.
    ///
    /// Fails as a whole only if `points` and `regions` differ in length.
    /// Individual samples fail when their region is unsupported or falls
    /// outside of the image.
    pub fn sample<P>(
        &self,
        image: &ImageBuffer<P, Vec<P::Subpixel>>,
        points: &[PixelCoordinate],
        regions: &[u32],
    ) -> Result<Vec<Result<P, SampleError>>, SampleError>
    where
        P: Pixel,
        P::Subpixel: PrimInt,
    {
        check_lengths(points, regions)?;
        Ok(points
            .iter()
            .zip(regions)
            .map(|(point, size)| self.sample_one(image, *point, *size))
            .collect())
    }

    /// Parallel [`PixelSampler::sample`].
    pub fn par_sample<P>(
        &self,
        image: &ImageBuffer<P, Vec<P::Subpixel>>,
        points: &[PixelCoordinate],
        regions: &[u32],
    ) -> Result<Vec<Result<P, SampleError>>, SampleError>
    where
        P: Pixel + Send + Sync,
        P::Subpixel: PrimInt + Send + Sync,
    {
        check_lengths(points, regions)?;
        Ok(points
            .par_iter()
            .zip(regions)
            .map(|(point, size)| self.sample_one(image, *point, *size))
            .collect())
    }
}

fn check_lengths(points: &[PixelCoordinate], regions: &[u32]) -> Result<(), SampleError> {
    match points.len() == regions.len() {
        true => Ok(()),
        false => Err(SampleError::LengthMismatch {
            points: points.len(),
            regions: regions.len(),
        }),
    }
}

fn checked_position(point: PixelCoordinate, width: u32, height: u32) -> Option<(u32, u32)> {
    match point.is_within(width, height) {
        true => Some((point.x() as u32, point.y() as u32)),
        false => None,
    }
}

/// Weighted sum of the kernel sized region whose top left pixel is at
/// (`left`, `top`). The region must be inside the image.
fn convolve<P>(
    image: &ImageBuffer<P, Vec<P::Subpixel>>,
    left: u32,
    top: u32,
    kernel: &Kernel,
) -> P
where
    P: Pixel,
    P::Subpixel: PrimInt,
{
    let mut sums = vec![0.0; P::CHANNEL_COUNT as usize];
    for row in 0..kernel.size() {
        for col in 0..kernel.size() {
            let weight = kernel.weight(row, col);
            let pixel = image.get_pixel(left + col, top + row);
            for (sum, channel) in sums.iter_mut().zip(pixel.channels()) {
                *sum += weight * channel.to_f64().unwrap_or_default();
            }
        }
    }

    let mut sample = *image.get_pixel(left + kernel.radius(), top + kernel.radius());
    for (channel, sum) in sample.channels_mut().iter_mut().zip(sums) {
        *channel = round_channel(sum);
    }
    sample
}

/// Round `value` to the nearest integer, saturating at the bounds of `T`.
fn round_channel<T: PrimInt>(value: f64) -> T {
    let value = value.round();
    <T as NumCast>::from(value).unwrap_or(match value < 0. {
        true => T::min_value(),
        false => T::max_value(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use image::{Luma, Rgb, Rgba};
    use quickcheck_macros::quickcheck;
    use rstest::rstest;

    const WEIGHTINGS: [PixelWeighting; 3] = [
        PixelWeighting::Mean,
        PixelWeighting::Median,
        PixelWeighting::Gaussian,
    ];

    fn supported_sizes() -> impl Iterator<Item = u32> {
        (3..=PIXEL_REGION_MAX).step_by(2)
    }

    /// 9x9 image whose pixel at (x, y) is (x, y, x + y).
    fn gradient() -> ImageBuffer<Rgb<u8>, Vec<u8>> {
        ImageBuffer::from_fn(9, 9, |x, y| Rgb([x as u8, y as u8, (x + y) as u8]))
    }

    #[test]
    fn kernels_are_normalized() {
        for size in supported_sizes() {
            for weighting in [PixelWeighting::Mean, PixelWeighting::Gaussian] {
                let kernel = KernelTable::shared().get(weighting, size).unwrap();
                assert_eq!(kernel.weights().len(), (size * size) as usize);
                assert_abs_diff_eq!(kernel.weights().iter().sum::<f64>(), 1.0, epsilon = 1e-6);
            }
        }
    }

    #[test]
    fn gaussian_kernel_peaks_at_center() {
        let kernel = Kernel::gaussian(5).unwrap();
        let center = kernel.weight(2, 2);
        for row in 0..5 {
            for col in 0..5 {
                assert!(kernel.weight(row, col) <= center);
                // Symmetric about both axes and the diagonal.
                assert_abs_diff_eq!(kernel.weight(row, col), kernel.weight(4 - row, col));
                assert_abs_diff_eq!(kernel.weight(row, col), kernel.weight(col, row));
            }
        }
        assert!(kernel.weight(0, 0) < kernel.weight(1, 1));
    }

    #[rstest]
    #[case(0)]
    #[case(2)]
    #[case(4)]
    #[case(27)]
    fn unsupported_region(#[case] size: u32) {
        let err = KernelTable::shared()
            .get(PixelWeighting::Gaussian, size)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedParameter);
    }

    #[rstest]
    #[case(0)]
    #[case(1)]
    #[case(2)]
    #[case(27)]
    fn kernels_reject_unsupported_sizes(#[case] size: u32) {
        assert!(matches!(
            Kernel::mean(size),
            Err(SampleError::UnsupportedRegion { .. })
        ));
        assert!(matches!(
            Kernel::gaussian(size),
            Err(SampleError::UnsupportedRegion { .. })
        ));
    }

    #[quickcheck]
    fn single_pixel_is_exact(r: u8, g: u8, b: u8, a: u8) -> bool {
        let mut image = ImageBuffer::from_pixel(5, 5, Rgba([0, 0, 0, 255]));
        image.put_pixel(2, 3, Rgba([r, g, b, a]));

        WEIGHTINGS.iter().all(|weighting| {
            PixelSampler::new(*weighting)
                .sample_one(&image, PixelCoordinate::new(2, 3), 1)
                .is_ok_and(|pixel| pixel == Rgba([r, g, b, a]))
        })
    }

    #[rstest]
    #[case(PixelWeighting::Mean)]
    #[case(PixelWeighting::Gaussian)]
    fn uniform_region_is_unchanged(#[case] weighting: PixelWeighting) {
        let image = ImageBuffer::from_pixel(30, 30, Rgb([200u8, 17, 255]));
        let sampler = PixelSampler::new(weighting);
        for size in supported_sizes() {
            let pixel = sampler
                .sample_one(&image, PixelCoordinate::new(15, 15), size)
                .unwrap();
            assert_eq!(pixel, Rgb([200, 17, 255]), "size {size}");
        }
    }

    #[test]
    fn mean_of_gradient() {
        let sampler = PixelSampler::new(PixelWeighting::Mean);
        // A linear gradient averages to its center value.
        let pixel = sampler
            .sample_one(&gradient(), PixelCoordinate::new(4, 5), 3)
            .unwrap();
        assert_eq!(pixel, Rgb([4, 5, 9]));
    }

    #[test]
    fn mean_rounds_to_nearest() {
        // Five ones and four zeros average to 0.56.
        let image = ImageBuffer::from_fn(3, 3, |x, y| Luma([((x + y) % 2 == 0) as u8]));
        let pixel = PixelSampler::new(PixelWeighting::Mean)
            .sample_one(&image, PixelCoordinate::new(1, 1), 3)
            .unwrap();
        assert_eq!(pixel, Luma([1]));

        let image = ImageBuffer::from_fn(3, 3, |x, y| Luma([((x + y) % 2 == 1) as u8]));
        let pixel = PixelSampler::new(PixelWeighting::Mean)
            .sample_one(&image, PixelCoordinate::new(1, 1), 3)
            .unwrap();
        assert_eq!(pixel, Luma([0]));
    }

    #[test]
    fn gaussian_favors_center() {
        let mut image = ImageBuffer::from_pixel(5, 5, Luma([0u16]));
        image.put_pixel(2, 2, Luma([9000]));

        let gaussian = PixelSampler::new(PixelWeighting::Gaussian)
            .sample_one(&image, PixelCoordinate::new(2, 2), 5)
            .unwrap();
        let mean = PixelSampler::new(PixelWeighting::Mean)
            .sample_one(&image, PixelCoordinate::new(2, 2), 5)
            .unwrap();
        assert_eq!(mean, Luma([360]));
        assert!(gaussian.0[0] > mean.0[0]);
    }

    #[test]
    fn gaussian_impulse_takes_center_weight() {
        // sigma = 0.5 gives weights exp(-2 (dx² + dy²)) before normalizing.
        let kernel = Kernel::gaussian(3).unwrap();
        let edge = (-2f64).exp();
        let center = 1. / ((1. + 2. * edge) * (1. + 2. * edge));
        assert_abs_diff_eq!(kernel.weight(1, 1), center, epsilon = 1e-12);
        assert_abs_diff_eq!(kernel.weight(0, 1), center * edge, epsilon = 1e-12);

        let mut image = ImageBuffer::from_pixel(3, 3, Luma([0u16]));
        image.put_pixel(1, 1, Luma([9000]));
        let pixel = PixelSampler::new(PixelWeighting::Gaussian)
            .sample_one(&image, PixelCoordinate::new(1, 1), 3)
            .unwrap();
        assert_eq!(pixel, Luma([(9000. * center).round() as u16]));
        assert_eq!(pixel, Luma([5574]));
    }

    #[rstest]
    #[case(u8::MAX as f64 + 0.4, u8::MAX)]
    #[case(300., u8::MAX)]
    #[case(-3., 0)]
    #[case(12.5, 13)]
    #[case(12.49, 12)]
    fn rounding_saturates(#[case] value: f64, #[case] expected: u8) {
        assert_eq!(round_channel::<u8>(value), expected);
    }

    #[rstest]
    #[case(PixelCoordinate::new(0, 4), 3)]
    #[case(PixelCoordinate::new(4, 8), 3)]
    #[case(PixelCoordinate::new(4, 4), 11)]
    #[case(PixelCoordinate::new(-1, 4), 1)]
    #[case(PixelCoordinate::new(4, 9), 1)]
    #[case(PixelCoordinate::new(i64::MAX, 0), 3)]
    #[case(PixelCoordinate::new(0, i64::MAX), 25)]
    #[case(PixelCoordinate::new(i64::MIN, i64::MIN), 3)]
    #[case(PixelCoordinate::new(i64::MAX, i64::MAX), 1)]
    fn region_outside_image(#[case] point: PixelCoordinate, #[case] size: u32) {
        let err = PixelSampler::default()
            .sample_one(&gradient(), point, size)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OutOfBounds);
    }

    #[test]
    fn region_touching_edges_is_inside() {
        let pixel = PixelSampler::new(PixelWeighting::Mean)
            .sample_one(&gradient(), PixelCoordinate::new(4, 4), 9)
            .unwrap();
        assert_eq!(pixel, Rgb([4, 4, 8]));
    }

    #[test]
    fn median_is_unsupported() {
        let sampler = PixelSampler::new(PixelWeighting::Median);
        let err = sampler
            .sample_one(&gradient(), PixelCoordinate::new(4, 4), 3)
            .unwrap_err();
        assert!(matches!(err, SampleError::UnsupportedWeighting { size: 3, .. }));
        assert_eq!(err.kind(), ErrorKind::UnsupportedParameter);
    }

    #[test]
    fn mismatched_lengths() {
        let points = [PixelCoordinate::new(4, 4); 3];
        let err = PixelSampler::default()
            .sample(&gradient(), &points, &[1, 3])
            .unwrap_err();
        assert!(matches!(
            err,
            SampleError::LengthMismatch {
                points: 3,
                regions: 2
            }
        ));
    }

    #[test]
    fn failed_samples_are_skipped_individually() {
        let points = [
            PixelCoordinate::new(4, 4),
            PixelCoordinate::new(0, 0),
            PixelCoordinate::new(2, 7),
        ];
        let samples = PixelSampler::new(PixelWeighting::Mean)
            .sample(&gradient(), &points, &[3, 3, 1])
            .unwrap();

        assert_eq!(samples.len(), 3);
        assert_eq!(*samples[0].as_ref().unwrap(), Rgb([4, 4, 8]));
        assert_eq!(samples[1].as_ref().unwrap_err().kind(), ErrorKind::OutOfBounds);
        assert_eq!(*samples[2].as_ref().unwrap(), Rgb([2, 7, 9]));
    }

    #[test]
    fn parallel_matches_sequential() {
        let image = gradient();
        let points: Vec<_> = (1..8)
            .flat_map(|x| (1..8).map(move |y| PixelCoordinate::new(x, y)))
            .collect();
        let regions: Vec<u32> = (0..points.len()).map(|i| [1, 3, 5][i % 3]).collect();
        let sampler = PixelSampler::new(PixelWeighting::Gaussian);

        let sequential = sampler.sample(&image, &points, &regions).unwrap();
        let parallel = sampler.par_sample(&image, &points, &regions).unwrap();
        assert_eq!(sequential.len(), parallel.len());
        for (a, b) in sequential.iter().zip(&parallel) {
            assert_eq!(a.as_ref().ok(), b.as_ref().ok());
        }
    }

    #[rstest]
    #[case("mean", PixelWeighting::Mean)]
    #[case("Gaussian", PixelWeighting::Gaussian)]
    #[case("MEDIAN", PixelWeighting::Median)]
    fn weighting_from_name(#[case] name: &str, #[case] expected: PixelWeighting) {
        assert_eq!(name.parse::<PixelWeighting>().unwrap(), expected);
        assert_eq!(expected.to_string(), name.to_ascii_lowercase());
    }
}

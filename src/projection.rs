use crate::direction::SkyDirection;
use serde::{Deserialize, Serialize};
use std::f64::consts::{FRAC_PI_2, TAU};
use uom::si::{
    angle::{degree, radian},
    f64::Angle,
};

/// Number of coefficients in a lens polynomial.
pub const LENS_COEFFICIENTS: usize = 5;

/// Polynomial model of a fisheye lens.
///
/// `linearity` maps a zenith angle in radians to a normalized radial distance
/// on the image disc, where 1.0 is the edge of the disc. `inverse` maps the
/// radial distance back to a zenith angle. Coefficients are ordered from the
/// highest degree term to the constant term.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LensModel {
    linearity: [f64; LENS_COEFFICIENTS],
    inverse: [f64; LENS_COEFFICIENTS],
}

impl LensModel {
    pub fn new(linearity: [f64; LENS_COEFFICIENTS], inverse: [f64; LENS_COEFFICIENTS]) -> Self {
        Self { linearity, inverse }
    }

    /// An undistorted lens where the radial distance grows linearly with
    /// zenith angle.
    pub fn ideal() -> Self {
        Self::new([0., 0., 0., 1. / FRAC_PI_2, 0.], [0., 0., 0., FRAC_PI_2, 0.])
    }

    pub fn linearity(&self) -> &[f64; LENS_COEFFICIENTS] {
        &self.linearity
    }

    pub fn inverse(&self) -> &[f64; LENS_COEFFICIENTS] {
        &self.inverse
    }

    /// Normalized radial distance of a ray at `zenith` radians.
    pub fn radius(&self, zenith: f64) -> f64 {
        horner(&self.linearity, zenith)
    }

    /// Zenith angle in radians of a ray at normalized radial distance `radius`.
    pub fn zenith(&self, radius: f64) -> f64 {
        horner(&self.inverse, radius)
    }
}

impl Default for LensModel {
    fn default() -> Self {
        Self::ideal()
    }
}

fn horner(coefficients: &[f64], x: f64) -> f64 {
    coefficients.iter().fold(0.0, |acc, c| acc * x + c)
}

/// Selects which lens model a projection uses.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Projection {
    /// The undistorted lens.
    #[default]
    Ideal,
    /// The lens calibrated for the dataset.
    Calibrated,
}

/// A pixel location in an image.
///
/// The location may fall outside of the image so callers must check bounds
/// before reading pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PixelCoordinate {
    x: i64,
    y: i64,
}

impl PixelCoordinate {
    pub fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }

    /// Column of the pixel.
    pub fn x(&self) -> i64 {
        self.x
    }

    /// Row of the pixel.
    pub fn y(&self) -> i64 {
        self.y
    }

    /// Returns `true` if the pixel is inside an image of `width` by `height`.
    pub fn is_within(&self, width: u32, height: u32) -> bool {
        (0..width as i64).contains(&self.x) && (0..height as i64).contains(&self.y)
    }
}

impl AsRef<PixelCoordinate> for PixelCoordinate {
    fn as_ref(&self) -> &PixelCoordinate {
        self
    }
}

/// Normalized coordinate on the square enclosing the fisheye disc.
///
/// `(0.5, 0.5)` is the center of the disc.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DiscCoordinate {
    pub u: f64,
    pub v: f64,
}

/// Circular fisheye disc inscribed in the height of an image.
#[derive(Clone, Copy, Debug, PartialEq)]
struct ImageDisc {
    left: f64,
    top: f64,
    diameter: f64,
}

impl ImageDisc {
    fn new(width: u32, height: u32) -> Self {
        let diameter = height as f64;
        let radius = diameter / 2.;
        let center = ((width / 2) as f64, (height / 2) as f64);
        Self {
            left: center.0 - radius,
            top: center.1 - radius,
            diameter,
        }
    }
}

/// Projects sky directions into fisheye photographs and back.
///
/// The photograph is looking straight up with north at the top of the image
/// and east on the left.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FisheyeProjector {
    ideal: LensModel,
    calibrated: LensModel,
}

impl FisheyeProjector {
    pub fn new(calibrated: LensModel) -> Self {
        Self {
            ideal: LensModel::ideal(),
            calibrated,
        }
    }

    pub fn lens(&self, projection: Projection) -> &LensModel {
        match projection {
            Projection::Ideal => &self.ideal,
            Projection::Calibrated => &self.calibrated,
        }
    }

    /// Map `direction` onto the unit square enclosing the fisheye disc.
    pub fn direction_to_disc(
        &self,
        direction: &SkyDirection,
        projection: Projection,
    ) -> DiscCoordinate {
        let (azimuth, _) = direction.to_radians();
        let zenith = direction.zenith_angle().get::<radian>();
        let radius = self.lens(projection).radius(zenith);

        DiscCoordinate {
            u: 0.5 - radius / 2. * azimuth.sin(),
            v: 0.5 - radius / 2. * azimuth.cos(),
        }
    }

    /// Map a coordinate on the unit square back into a sky direction.
    pub fn disc_to_direction(&self, disc: DiscCoordinate, projection: Projection) -> SkyDirection {
        let du = disc.u - 0.5;
        let dv = disc.v - 0.5;
        let radius = 2. * du.hypot(dv);
        let zenith = self.lens(projection).zenith(radius);
        let azimuth = (-du).atan2(-dv).rem_euclid(TAU);

        SkyDirection::new(
            Angle::new::<radian>(azimuth),
            Angle::new::<degree>(90.) - Angle::new::<radian>(zenith),
        )
    }

    /// Project `direction` into an image of `width` by `height` pixels.
    ///
    /// The result is truncated towards zero and is not bounds checked.
    /// Directions below the horizon, or a poorly calibrated lens, can produce
    /// pixels outside of the image.
    pub fn direction_to_pixel(
        &self,
        direction: &SkyDirection,
        width: u32,
        height: u32,
        projection: Projection,
    ) -> PixelCoordinate {
        let disc = ImageDisc::new(width, height);
        let uv = self.direction_to_disc(direction, projection);

        PixelCoordinate::new(
            (disc.left + uv.u * disc.diameter).trunc() as i64,
            (disc.top + uv.v * disc.diameter).trunc() as i64,
        )
    }

    /// Recover the sky direction seen by `pixel` in an image of `width` by
    /// `height` pixels.
    pub fn pixel_to_direction(
        &self,
        pixel: impl AsRef<PixelCoordinate>,
        width: u32,
        height: u32,
        projection: Projection,
    ) -> SkyDirection {
        let disc = ImageDisc::new(width, height);
        let pixel = pixel.as_ref();

        self.disc_to_direction(
            DiscCoordinate {
                u: (pixel.x() as f64 - disc.left) / disc.diameter,
                v: (pixel.y() as f64 - disc.top) / disc.diameter,
            },
            projection,
        )
    }

    /// Project every direction in `directions` into an image of `width` by
    /// `height` pixels.
    pub fn points_in_image<'a>(
        &self,
        directions: impl IntoIterator<Item = &'a SkyDirection>,
        width: u32,
        height: u32,
        projection: Projection,
    ) -> Vec<PixelCoordinate> {
        directions
            .into_iter()
            .map(|direction| self.direction_to_pixel(direction, width, height, projection))
            .collect()
    }
}

impl Default for FisheyeProjector {
    fn default() -> Self {
        Self::new(LensModel::ideal())
    }
}

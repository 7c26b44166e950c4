use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI};

use tracing::warn;

use super::geodetic::GlobalGeodeticCrsProfile;
use super::{
    check_crs, check_tile, proportional_crs_to_tile, proportional_tile_to_crs, BoundingBox,
    CoordinateReferenceSystem, CrsCoordinate, CrsProfile, TileCoordinate, TileMatrixDimensions,
    TileOrigin,
};
use crate::error::{invalid, Result};
use crate::wgs84;

pub(crate) const SPHERICAL_EPSG_CODE: i32 = 3857;
pub(crate) const ELLIPSOIDAL_EPSG_CODE: i32 = 3395;

/// Convergence threshold of the inverse latitude iteration.
const INVERSE_EPSILON: f64 = 1.0e-20;
/// The iteration contracts by roughly e^2 per step; this is far more than
/// any finite input needs.
const MAX_INVERSE_ITERATIONS: usize = 64;

fn square_bounds(radius: f64) -> BoundingBox {
    BoundingBox::new_unchecked(-PI * radius, -PI * radius, PI * radius, PI * radius)
}

/// Web Mercator on a sphere of the WGS-84 equatorial radius (EPSG:3857).
#[derive(Debug, Clone, Copy, Default)]
pub struct SphericalMercatorCrsProfile;

impl SphericalMercatorCrsProfile {
    pub const BOUNDS: BoundingBox = BoundingBox::new_unchecked(
        -PI * wgs84::A,
        -PI * wgs84::A,
        PI * wgs84::A,
        PI * wgs84::A,
    );

    /// `(longitude, latitude)` degrees to meters.
    pub fn from_global_geodetic(longitude: f64, latitude: f64) -> (f64, f64) {
        let x = wgs84::A * longitude.to_radians();
        let y = wgs84::A * (FRAC_PI_4 + latitude.to_radians() / 2.0).tan().ln();
        (x, y)
    }
}

impl CrsProfile for SphericalMercatorCrsProfile {
    fn coordinate_reference_system(&self) -> CoordinateReferenceSystem {
        CoordinateReferenceSystem::epsg(SPHERICAL_EPSG_CODE)
    }

    fn bounds(&self) -> BoundingBox {
        Self::BOUNDS
    }

    fn crs_to_tile(
        &self,
        coordinate: &CrsCoordinate,
        bounds: &BoundingBox,
        dimensions: TileMatrixDimensions,
        origin: TileOrigin,
    ) -> Result<TileCoordinate> {
        check_crs(&self.coordinate_reference_system(), coordinate)?;
        proportional_crs_to_tile(coordinate.x, coordinate.y, bounds, dimensions, origin)
    }

    fn tile_to_crs(
        &self,
        column: u32,
        row: u32,
        bounds: &BoundingBox,
        dimensions: TileMatrixDimensions,
        origin: TileOrigin,
    ) -> Result<CrsCoordinate> {
        let (x, y) = proportional_tile_to_crs(column, row, bounds, dimensions, origin);
        Ok(CrsCoordinate::new(x, y, self.coordinate_reference_system()))
    }

    fn tile_bounds(
        &self,
        column: u32,
        row: u32,
        bounds: &BoundingBox,
        dimensions: TileMatrixDimensions,
        origin: TileOrigin,
    ) -> Result<BoundingBox> {
        check_tile(column, row, dimensions)?;
        let (min_x, min_y, max_x, max_y) =
            super::proportional_tile_bounds(column, row, bounds, dimensions, origin);
        BoundingBox::new(min_x, min_y, max_x, max_y)
    }

    fn to_global_geodetic(&self, x: f64, y: f64) -> (f64, f64) {
        let longitude = (x / wgs84::A).to_degrees();
        let latitude = (FRAC_PI_2 - 2.0 * (-y / wgs84::A).exp().atan()).to_degrees();
        (longitude, latitude)
    }

    fn name(&self) -> &'static str {
        "Web Mercator"
    }

    fn precision(&self) -> u32 {
        2
    }
}

/// Mercator on the WGS-84 ellipsoid (EPSG:3395).
///
/// Tiling happens in latitude/longitude: a coordinate is first converted to
/// degrees and then located on the geodetic image of the tile matrix
/// bounds.
#[derive(Debug, Clone)]
pub struct EllipsoidalMercatorCrsProfile {
    radius: f64,
    bounds: BoundingBox,
    crs: CoordinateReferenceSystem,
}

impl Default for EllipsoidalMercatorCrsProfile {
    fn default() -> Self {
        Self::new()
    }
}

impl EllipsoidalMercatorCrsProfile {
    pub fn new() -> Self {
        Self {
            radius: wgs84::A,
            bounds: square_bounds(wgs84::A),
            crs: CoordinateReferenceSystem::epsg(ELLIPSOIDAL_EPSG_CODE),
        }
    }

    /// A variant whose equatorial radius is scaled by `scale_factor`,
    /// published under `crs`.
    pub fn with_scale_factor(scale_factor: f64, crs: CoordinateReferenceSystem) -> Result<Self> {
        if !(scale_factor.is_finite() && scale_factor > 0.0) {
            return Err(invalid(format!(
                "radius scale factor must be positive and finite, got {scale_factor}"
            )));
        }
        let radius = wgs84::A * scale_factor;
        Ok(Self {
            radius,
            bounds: square_bounds(radius),
            crs,
        })
    }

    /// `(longitude, latitude)` degrees to meters.
    pub fn from_global_geodetic(&self, longitude: f64, latitude: f64) -> (f64, f64) {
        let e = wgs84::eccentricity();
        let sin_lat = latitude.to_radians().sin();
        let x = self.radius * longitude.to_radians();
        let y = self.radius * sin_lat.atanh() - self.radius * e * (e * sin_lat).atanh();
        (x, y)
    }

    /// Latitude in radians for a northing in meters, by fixed-point
    /// iteration on `s = sin(latitude)`.
    pub fn inverse_latitude(&self, y: f64) -> f64 {
        let e = wgs84::eccentricity();
        let ratio = y / self.radius;
        let mut previous = ratio.tanh();
        let mut next = previous;
        for _ in 0..MAX_INVERSE_ITERATIONS {
            next = (ratio + e * (e * previous).atanh()).tanh();
            let difference = next - previous;
            previous = next;
            if difference.abs() <= INVERSE_EPSILON {
                return next.asin();
            }
        }
        warn!(y, "inverse latitude did not converge; using last iterate");
        next.asin()
    }

    fn geodetic_bounds(&self, bounds: &BoundingBox) -> Result<BoundingBox> {
        let (min_x, min_y) = self.to_global_geodetic(bounds.min_x(), bounds.min_y());
        let (max_x, max_y) = self.to_global_geodetic(bounds.max_x(), bounds.max_y());
        BoundingBox::new(min_x, min_y, max_x, max_y)
    }

    fn round(&self, v: f64) -> f64 {
        let divisor = 10f64.powi(self.precision() as i32);
        (v * divisor).round() / divisor
    }
}

impl CrsProfile for EllipsoidalMercatorCrsProfile {
    fn coordinate_reference_system(&self) -> CoordinateReferenceSystem {
        self.crs.clone()
    }

    fn bounds(&self) -> BoundingBox {
        self.bounds
    }

    fn crs_to_tile(
        &self,
        coordinate: &CrsCoordinate,
        bounds: &BoundingBox,
        dimensions: TileMatrixDimensions,
        origin: TileOrigin,
    ) -> Result<TileCoordinate> {
        check_crs(&self.crs, coordinate)?;

        // Bounds check at the profile's precision, so a coordinate that
        // went through a lossy conversion is still accepted at the edges.
        let rounded = BoundingBox::new(
            self.round(bounds.min_x()),
            self.round(bounds.min_y()),
            self.round(bounds.max_x()),
            self.round(bounds.max_y()),
        )?;
        if !origin.contains(&rounded, self.round(coordinate.x), self.round(coordinate.y)) {
            return Err(invalid(format!(
                "coordinate ({}, {}) is outside the tile matrix bounds for origin {origin:?}",
                coordinate.x, coordinate.y
            )));
        }

        let geodetic_bounds = self.geodetic_bounds(bounds)?;
        let (longitude, latitude) = self.to_global_geodetic(coordinate.x, coordinate.y);
        proportional_crs_to_tile(longitude, latitude, &geodetic_bounds, dimensions, origin)
    }

    fn tile_to_crs(
        &self,
        column: u32,
        row: u32,
        bounds: &BoundingBox,
        dimensions: TileMatrixDimensions,
        origin: TileOrigin,
    ) -> Result<CrsCoordinate> {
        let geodetic_bounds = self.geodetic_bounds(bounds)?;
        let (longitude, latitude) =
            proportional_tile_to_crs(column, row, &geodetic_bounds, dimensions, origin);
        let (x, y) = self.from_global_geodetic(longitude, latitude);
        Ok(CrsCoordinate::new(x, y, self.coordinate_reference_system()))
    }

    fn tile_bounds(
        &self,
        column: u32,
        row: u32,
        bounds: &BoundingBox,
        dimensions: TileMatrixDimensions,
        origin: TileOrigin,
    ) -> Result<BoundingBox> {
        let geodetic_bounds = self.geodetic_bounds(bounds)?;
        let tile = GlobalGeodeticCrsProfile.tile_bounds(
            column,
            row,
            &geodetic_bounds,
            dimensions,
            origin,
        )?;
        let (min_x, min_y) = self.from_global_geodetic(tile.min_x(), tile.min_y());
        let (max_x, max_y) = self.from_global_geodetic(tile.max_x(), tile.max_y());
        BoundingBox::new(min_x, min_y, max_x, max_y)
    }

    fn to_global_geodetic(&self, x: f64, y: f64) -> (f64, f64) {
        (
            (x / self.radius).to_degrees(),
            self.inverse_latitude(y).to_degrees(),
        )
    }

    fn name(&self) -> &'static str {
        "World Mercator"
    }

    fn precision(&self) -> u32 {
        2
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() < tol
    }

    #[test]
    fn test_inverse_latitude_at_equator() {
        let p = EllipsoidalMercatorCrsProfile::new();
        assert_eq!(p.inverse_latitude(0.0), 0.0);
    }

    #[test]
    fn test_ellipsoidal_forward_inverse() {
        let p = EllipsoidalMercatorCrsProfile::new();
        for lat in [-80.0, -45.0, -1.0, 0.5, 30.0, 60.0, 84.0] {
            let (x, y) = p.from_global_geodetic(12.5, lat);
            let (lon, lat2) = p.to_global_geodetic(x, y);
            assert!(approx_eq(lon, 12.5, 1e-9), "lon {lon}");
            assert!(approx_eq(lat2, lat, 1e-9), "lat {lat} -> {lat2}");
        }
    }

    #[test]
    fn test_ellipsoidal_northing_is_below_spherical() {
        let p = EllipsoidalMercatorCrsProfile::new();
        let (_, ellipsoidal) = p.from_global_geodetic(0.0, 45.0);
        let (_, spherical) = SphericalMercatorCrsProfile::from_global_geodetic(0.0, 45.0);
        // Known EPSG:3395 northing for 45N.
        assert!(approx_eq(ellipsoidal, 5_591_295.92, 1.0), "{ellipsoidal}");
        assert!(ellipsoidal < spherical);
    }

    #[test]
    fn test_spherical_round_trip() {
        let p = SphericalMercatorCrsProfile;
        let (x, y) = SphericalMercatorCrsProfile::from_global_geodetic(-122.0, 47.5);
        let (lon, lat) = p.to_global_geodetic(x, y);
        assert!(approx_eq(lon, -122.0, 1e-9));
        assert!(approx_eq(lat, 47.5, 1e-9));
    }

    #[test]
    fn test_spherical_tiles() {
        let p = SphericalMercatorCrsProfile;
        let crs = p.coordinate_reference_system();
        let b = SphericalMercatorCrsProfile::BOUNDS;
        let d = TileMatrixDimensions::new(2, 2).unwrap();

        let c = CrsCoordinate::new(0.0, 0.0, crs.clone());
        assert_eq!(
            p.crs_to_tile(&c, &b, d, TileOrigin::UpperLeft).unwrap(),
            TileCoordinate::new(1, 1)
        );
        let c = CrsCoordinate::new(-1.0, 1.0, crs.clone());
        assert_eq!(
            p.crs_to_tile(&c, &b, d, TileOrigin::UpperLeft).unwrap(),
            TileCoordinate::new(0, 0)
        );
        let c = CrsCoordinate::new(b.max_x(), 0.0, crs);
        assert!(p.crs_to_tile(&c, &b, d, TileOrigin::LowerLeft).is_err());
    }

    #[test]
    fn test_ellipsoidal_tiles() {
        let p = EllipsoidalMercatorCrsProfile::new();
        let crs = p.coordinate_reference_system();
        let b = p.bounds();
        let d = TileMatrixDimensions::new(2, 2).unwrap();

        let c = CrsCoordinate::new(0.0, 0.0, crs.clone());
        assert_eq!(
            p.crs_to_tile(&c, &b, d, TileOrigin::UpperLeft).unwrap(),
            TileCoordinate::new(1, 1)
        );
        let c = CrsCoordinate::new(-10.0, -10.0, crs);
        assert_eq!(
            p.crs_to_tile(&c, &b, d, TileOrigin::LowerLeft).unwrap(),
            TileCoordinate::new(0, 0)
        );
    }

    #[test]
    fn test_ellipsoidal_tile_centres_map_back() {
        let p = EllipsoidalMercatorCrsProfile::new();
        let b = p.bounds();
        let d = TileMatrixDimensions::new(8, 8).unwrap();
        for (column, row) in [(0, 0), (3, 5), (7, 7), (2, 6)] {
            let tb = p.tile_bounds(column, row, &b, d, TileOrigin::UpperLeft).unwrap();
            let centre = CrsCoordinate::new(
                (tb.min_x() + tb.max_x()) / 2.0,
                (tb.min_y() + tb.max_y()) / 2.0,
                p.coordinate_reference_system(),
            );
            let t = p.crs_to_tile(&centre, &b, d, TileOrigin::UpperLeft).unwrap();
            assert_eq!(t, TileCoordinate::new(column, row));
        }
    }

    #[test]
    fn test_scale_factor_validation() {
        let crs = CoordinateReferenceSystem::epsg(ELLIPSOIDAL_EPSG_CODE);
        assert!(EllipsoidalMercatorCrsProfile::with_scale_factor(0.0, crs.clone()).is_err());
        let p = EllipsoidalMercatorCrsProfile::with_scale_factor(2.0, crs).unwrap();
        assert_eq!(p.bounds().max_x(), 2.0 * PI * wgs84::A);
    }
}

//! WGS-84 ellipsoid constants.

/// Semi-major axis (equatorial radius) in meters.
pub const A: f64 = 6_378_137.0;

/// Inverse flattening.
pub const INVERSE_FLATTENING: f64 = 298.257_223_563;

/// Flattening factor (1 / 298.257223563).
pub const F: f64 = 1.0 / INVERSE_FLATTENING;

/// First eccentricity squared.
pub const E2: f64 = F * (2.0 - F);

/// Semi-minor axis (polar radius) in meters.
pub const B: f64 = A * (1.0 - F);

/// First eccentricity.
#[inline]
pub fn eccentricity() -> f64 {
    E2.sqrt()
}

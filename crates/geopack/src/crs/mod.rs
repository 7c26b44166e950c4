//! Coordinate reference systems and the tile grid they are cut into.
//!
//! A tile matrix divides a [`BoundingBox`] into `width x height` equally
//! sized tiles. Tiles are addressed by `(column, row)` counted from one of
//! the four corners, the [`TileOrigin`]. A coordinate lying exactly on the
//! edge opposite the origin belongs to no tile of the matrix.

use std::fmt;

use crate::error::{invalid, Result};

mod geodetic;
mod mercator;

pub use geodetic::GlobalGeodeticCrsProfile;
pub use mercator::{EllipsoidalMercatorCrsProfile, SphericalMercatorCrsProfile};

/// An (authority, identifier) pair such as `EPSG:3857`. The authority is
/// stored upper-case so comparisons ignore case.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CoordinateReferenceSystem {
    authority: String,
    identifier: i32,
}

impl CoordinateReferenceSystem {
    pub fn new(authority: &str, identifier: i32) -> Result<Self> {
        let authority = authority.trim();
        if authority.is_empty() {
            return Err(invalid("coordinate reference system authority may not be empty"));
        }
        Ok(Self {
            authority: authority.to_uppercase(),
            identifier,
        })
    }

    pub(crate) fn epsg(identifier: i32) -> Self {
        Self {
            authority: "EPSG".to_owned(),
            identifier,
        }
    }

    pub fn authority(&self) -> &str {
        &self.authority
    }

    pub fn identifier(&self) -> i32 {
        self.identifier
    }
}

impl fmt::Display for CoordinateReferenceSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.authority, self.identifier)
    }
}

/// A position in a particular reference system.
#[derive(Debug, Clone, PartialEq)]
pub struct CrsCoordinate {
    pub x: f64,
    pub y: f64,
    pub crs: CoordinateReferenceSystem,
}

impl CrsCoordinate {
    pub fn new(x: f64, y: f64, crs: CoordinateReferenceSystem) -> Self {
        Self { x, y, crs }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    min_x: f64,
    min_y: f64,
    max_x: f64,
    max_y: f64,
}

impl BoundingBox {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Result<Self> {
        if min_x.is_nan() || min_y.is_nan() || max_x.is_nan() || max_y.is_nan() {
            return Err(invalid("bounding box values may not be NaN"));
        }
        if min_x > max_x || min_y > max_y {
            return Err(invalid(format!(
                "bounding box minimum ({min_x}, {min_y}) exceeds maximum ({max_x}, {max_y})"
            )));
        }
        Ok(Self {
            min_x,
            min_y,
            max_x,
            max_y,
        })
    }

    pub(crate) const fn new_unchecked(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    #[inline]
    pub fn min_x(&self) -> f64 {
        self.min_x
    }

    #[inline]
    pub fn min_y(&self) -> f64 {
        self.min_y
    }

    #[inline]
    pub fn max_x(&self) -> f64 {
        self.max_x
    }

    #[inline]
    pub fn max_y(&self) -> f64 {
        self.max_y
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Inclusive on every edge.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }

    /// The corner `origin` names, as `(x, y)`.
    pub fn corner(&self, origin: TileOrigin) -> (f64, f64) {
        match origin {
            TileOrigin::UpperLeft => (self.min_x, self.max_y),
            TileOrigin::LowerLeft => (self.min_x, self.min_y),
            TileOrigin::UpperRight => (self.max_x, self.max_y),
            TileOrigin::LowerRight => (self.max_x, self.min_y),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileMatrixDimensions {
    width: u32,
    height: u32,
}

impl TileMatrixDimensions {
    pub fn new(width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(invalid("tile matrix dimensions must be positive"));
        }
        Ok(Self { width, height })
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn contains(&self, column: u32, row: u32) -> bool {
        column < self.width && row < self.height
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileCoordinate {
    pub column: u32,
    pub row: u32,
}

impl TileCoordinate {
    pub const fn new(column: u32, row: u32) -> Self {
        Self { column, row }
    }
}

/// Corner of the tile matrix holding tile `(0, 0)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TileOrigin {
    UpperLeft,
    LowerLeft,
    UpperRight,
    LowerRight,
}

impl TileOrigin {
    /// 1 when rows count down from the top.
    #[inline]
    pub const fn vertical(self) -> u32 {
        match self {
            TileOrigin::UpperLeft | TileOrigin::UpperRight => 1,
            TileOrigin::LowerLeft | TileOrigin::LowerRight => 0,
        }
    }

    /// 1 when columns count leftwards from the right.
    #[inline]
    pub const fn horizontal(self) -> u32 {
        match self {
            TileOrigin::UpperRight | TileOrigin::LowerRight => 1,
            TileOrigin::UpperLeft | TileOrigin::LowerLeft => 0,
        }
    }

    pub fn transform_horizontal(self, to: TileOrigin, column: u32, width: u32) -> u32 {
        flip(self.horizontal(), to.horizontal(), i64::from(column), width) as u32
    }

    pub fn transform_vertical(self, to: TileOrigin, row: u32, height: u32) -> u32 {
        flip(self.vertical(), to.vertical(), i64::from(row), height) as u32
    }

    /// Re-addresses a tile counted from `self` as counted from `to`.
    pub fn transform(
        self,
        to: TileOrigin,
        tile: TileCoordinate,
        dimensions: TileMatrixDimensions,
    ) -> TileCoordinate {
        TileCoordinate::new(
            self.transform_horizontal(to, tile.column, dimensions.width()),
            self.transform_vertical(to, tile.row, dimensions.height()),
        )
    }

    /// Whether `(x, y)` lies in `bounds` with the edges opposite this origin
    /// excluded.
    pub fn contains(self, bounds: &BoundingBox, x: f64, y: f64) -> bool {
        let on_far_edge = match self {
            TileOrigin::LowerLeft => y == bounds.max_y() || x == bounds.max_x(),
            TileOrigin::LowerRight => y == bounds.max_y() || x == bounds.min_x(),
            TileOrigin::UpperLeft => y == bounds.min_y() || x == bounds.max_x(),
            TileOrigin::UpperRight => y == bounds.min_y() || x == bounds.min_x(),
        };
        !on_far_edge && bounds.contains(x, y)
    }
}

// Mirrors `index` within `0..size` when the two directions differ.
fn flip(from: u32, to: u32, index: i64, size: u32) -> i64 {
    let max = i64::from(size) - 1;
    index + i64::from(from ^ to) * (max - 2 * index)
}

/// Maps between CRS coordinates and tile addresses for one reference system.
pub trait CrsProfile: fmt::Debug + Send + Sync {
    fn coordinate_reference_system(&self) -> CoordinateReferenceSystem;

    /// Valid extent of the reference system in its own units.
    fn bounds(&self) -> BoundingBox;

    /// Tile of a `dimensions` matrix over `bounds` containing `coordinate`.
    ///
    /// Tiles include their origin-side edges and exclude their far edges.
    /// Tile positions are rounded to 1e-9 of a tile first, so a coordinate
    /// closer than that below a tile edge maps to the tile past the edge.
    fn crs_to_tile(
        &self,
        coordinate: &CrsCoordinate,
        bounds: &BoundingBox,
        dimensions: TileMatrixDimensions,
        origin: TileOrigin,
    ) -> Result<TileCoordinate>;

    /// Corner of tile `(column, row)` on the origin side.
    fn tile_to_crs(
        &self,
        column: u32,
        row: u32,
        bounds: &BoundingBox,
        dimensions: TileMatrixDimensions,
        origin: TileOrigin,
    ) -> Result<CrsCoordinate>;

    /// Full extent of tile `(column, row)`.
    fn tile_bounds(
        &self,
        column: u32,
        row: u32,
        bounds: &BoundingBox,
        dimensions: TileMatrixDimensions,
        origin: TileOrigin,
    ) -> Result<BoundingBox>;

    /// Converts `(x, y)` in this system to `(longitude, latitude)` degrees.
    fn to_global_geodetic(&self, x: f64, y: f64) -> (f64, f64);

    fn name(&self) -> &'static str;

    /// Decimal places meaningful in this system's units.
    fn precision(&self) -> u32;
}

/// Returns the built-in profile for `crs`, if there is one.
pub fn profile_for(crs: &CoordinateReferenceSystem) -> Option<Box<dyn CrsProfile>> {
    if crs.authority() != "EPSG" {
        return None;
    }
    match crs.identifier() {
        geodetic::EPSG_CODE => Some(Box::new(GlobalGeodeticCrsProfile)),
        mercator::SPHERICAL_EPSG_CODE => Some(Box::new(SphericalMercatorCrsProfile)),
        mercator::ELLIPSOIDAL_EPSG_CODE => Some(Box::new(EllipsoidalMercatorCrsProfile::new())),
        _ => None,
    }
}

pub(crate) fn check_crs(expected: &CoordinateReferenceSystem, coordinate: &CrsCoordinate) -> Result<()> {
    if &coordinate.crs != expected {
        return Err(invalid(format!(
            "coordinate is in {} but the profile is {expected}",
            coordinate.crs
        )));
    }
    Ok(())
}

/// Tile lookup for systems whose tiles are equal-sized in CRS units.
pub(crate) fn proportional_crs_to_tile(
    x: f64,
    y: f64,
    bounds: &BoundingBox,
    dimensions: TileMatrixDimensions,
    origin: TileOrigin,
) -> Result<TileCoordinate> {
    if !origin.contains(bounds, x, y) {
        return Err(invalid(format!(
            "coordinate ({x}, {y}) is outside the tile matrix bounds for origin {origin:?}"
        )));
    }
    let (corner_x, corner_y) = bounds.corner(origin);
    let tile_width = bounds.width() / f64::from(dimensions.width());
    let tile_height = bounds.height() / f64::from(dimensions.height());

    // Snap to 1e-9 of a tile so float noise right below an edge lands past it.
    const DIVISOR: f64 = 1.0e9;
    let snap = |v: f64| ((v * DIVISOR).round() / DIVISOR).floor();
    let column = snap((x - corner_x).abs() / tile_width) as u32;
    let row = snap((y - corner_y).abs() / tile_height) as u32;

    Ok(TileCoordinate::new(
        column.min(dimensions.width() - 1),
        row.min(dimensions.height() - 1),
    ))
}

/// Lower-left based extent of a tile in a proportional system.
pub(crate) fn proportional_tile_bounds(
    column: u32,
    row: u32,
    bounds: &BoundingBox,
    dimensions: TileMatrixDimensions,
    origin: TileOrigin,
) -> (f64, f64, f64, f64) {
    let tile_width = bounds.width() / f64::from(dimensions.width());
    let tile_height = bounds.height() / f64::from(dimensions.height());
    let tile = origin.transform(
        TileOrigin::LowerLeft,
        TileCoordinate::new(column, row),
        dimensions,
    );
    let min_x = bounds.min_x() + f64::from(tile.column) * tile_width;
    let min_y = bounds.min_y() + f64::from(tile.row) * tile_height;
    (min_x, min_y, min_x + tile_width, min_y + tile_height)
}

pub(crate) fn proportional_tile_to_crs(
    column: u32,
    row: u32,
    bounds: &BoundingBox,
    dimensions: TileMatrixDimensions,
    origin: TileOrigin,
) -> (f64, f64) {
    let tile_width = bounds.width() / f64::from(dimensions.width());
    let tile_height = bounds.height() / f64::from(dimensions.height());
    // Signed: a row or column one past the matrix addresses its far edge.
    let column = flip(
        origin.horizontal(),
        TileOrigin::LowerLeft.horizontal(),
        i64::from(column),
        dimensions.width(),
    ) + i64::from(origin.horizontal());
    let row = flip(
        origin.vertical(),
        TileOrigin::LowerLeft.vertical(),
        i64::from(row),
        dimensions.height(),
    ) + i64::from(origin.vertical());
    (
        bounds.min_x() + column as f64 * tile_width,
        bounds.min_y() + row as f64 * tile_height,
    )
}

pub(crate) fn check_tile(column: u32, row: u32, dimensions: TileMatrixDimensions) -> Result<()> {
    if !dimensions.contains(column, row) {
        return Err(invalid(format!(
            "tile ({column}, {row}) is outside a {}x{} tile matrix",
            dimensions.width(),
            dimensions.height()
        )));
    }
    Ok(())
}

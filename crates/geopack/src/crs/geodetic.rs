use super::{
    check_crs, check_tile, proportional_crs_to_tile, proportional_tile_bounds,
    proportional_tile_to_crs, BoundingBox, CoordinateReferenceSystem, CrsCoordinate, CrsProfile,
    TileCoordinate, TileMatrixDimensions, TileOrigin,
};
use crate::error::Result;

pub(crate) const EPSG_CODE: i32 = 4326;

/// Plate carrée over WGS-84 longitude and latitude in degrees (EPSG:4326).
#[derive(Debug, Clone, Copy, Default)]
pub struct GlobalGeodeticCrsProfile;

impl GlobalGeodeticCrsProfile {
    pub const BOUNDS: BoundingBox = BoundingBox::new_unchecked(-180.0, -90.0, 180.0, 90.0);
}

impl CrsProfile for GlobalGeodeticCrsProfile {
    fn coordinate_reference_system(&self) -> CoordinateReferenceSystem {
        CoordinateReferenceSystem::epsg(EPSG_CODE)
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
            proportional_tile_bounds(column, row, bounds, dimensions, origin);
        BoundingBox::new(min_x, min_y, max_x, max_y)
    }

    fn to_global_geodetic(&self, x: f64, y: f64) -> (f64, f64) {
        (x, y)
    }

    fn name(&self) -> &'static str {
        "World Geodetic System 1984"
    }

    fn precision(&self) -> u32 {
        7
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(x: f64, y: f64) -> CrsCoordinate {
        CrsCoordinate::new(x, y, CoordinateReferenceSystem::epsg(EPSG_CODE))
    }

    #[test]
    fn test_corner_tiles() {
        let p = GlobalGeodeticCrsProfile;
        let b = GlobalGeodeticCrsProfile::BOUNDS;
        let d = TileMatrixDimensions::new(2, 1).unwrap();

        let t = p.crs_to_tile(&at(-180.0, 90.0), &b, d, TileOrigin::UpperLeft).unwrap();
        assert_eq!(t, TileCoordinate::new(0, 0));

        let t = p.crs_to_tile(&at(0.0, 0.0), &b, d, TileOrigin::UpperLeft).unwrap();
        assert_eq!(t, TileCoordinate::new(1, 0));

        let t = p.crs_to_tile(&at(-0.5, -89.0), &b, d, TileOrigin::LowerRight).unwrap();
        assert_eq!(t, TileCoordinate::new(1, 0));
    }

    #[test]
    fn test_far_edge_rejected() {
        let p = GlobalGeodeticCrsProfile;
        let b = GlobalGeodeticCrsProfile::BOUNDS;
        let d = TileMatrixDimensions::new(2, 1).unwrap();
        assert!(p.crs_to_tile(&at(180.0, 0.0), &b, d, TileOrigin::UpperLeft).is_err());
        assert!(p.crs_to_tile(&at(0.0, -90.0), &b, d, TileOrigin::UpperLeft).is_err());
        assert!(p.crs_to_tile(&at(0.0, -90.0), &b, d, TileOrigin::LowerLeft).is_ok());
    }

    #[test]
    fn test_edge_tolerance() {
        let p = GlobalGeodeticCrsProfile;
        let b = GlobalGeodeticCrsProfile::BOUNDS;
        let d = TileMatrixDimensions::new(2, 1).unwrap();
        let column = |x: f64| p.crs_to_tile(&at(x, 0.0), &b, d, TileOrigin::LowerLeft).unwrap().column;
        assert_eq!(column(0.0), 1);
        assert_eq!(column(-1.0e-12), 1);
        assert_eq!(column(-1.0e-6), 0);
    }

    #[test]
    fn test_wrong_crs_rejected() {
        let p = GlobalGeodeticCrsProfile;
        let c = CrsCoordinate::new(0.0, 0.0, CoordinateReferenceSystem::epsg(3857));
        let d = TileMatrixDimensions::new(1, 1).unwrap();
        let err = p
            .crs_to_tile(&c, &GlobalGeodeticCrsProfile::BOUNDS, d, TileOrigin::LowerLeft)
            .unwrap_err();
        assert!(matches!(err, crate::Error::InvalidArgument(_)));
    }

    #[test]
    fn test_tile_to_crs_returns_origin_corner() {
        let p = GlobalGeodeticCrsProfile;
        let b = GlobalGeodeticCrsProfile::BOUNDS;
        let d = TileMatrixDimensions::new(4, 2).unwrap();

        let c = p.tile_to_crs(0, 0, &b, d, TileOrigin::UpperLeft).unwrap();
        assert_eq!((c.x, c.y), (-180.0, 90.0));

        let c = p.tile_to_crs(1, 1, &b, d, TileOrigin::LowerLeft).unwrap();
        assert_eq!((c.x, c.y), (-90.0, 0.0));

        let c = p.tile_to_crs(0, 0, &b, d, TileOrigin::LowerRight).unwrap();
        assert_eq!((c.x, c.y), (180.0, -90.0));

        // One past the last row addresses the far edge.
        let c = p.tile_to_crs(0, 2, &b, d, TileOrigin::UpperLeft).unwrap();
        assert_eq!(c.y, -90.0);
    }

    #[test]
    fn test_tile_bounds() {
        let p = GlobalGeodeticCrsProfile;
        let b = GlobalGeodeticCrsProfile::BOUNDS;
        let d = TileMatrixDimensions::new(4, 2).unwrap();
        let tb = p.tile_bounds(3, 0, &b, d, TileOrigin::UpperLeft).unwrap();
        assert_eq!(
            (tb.min_x(), tb.min_y(), tb.max_x(), tb.max_y()),
            (90.0, 0.0, 180.0, 90.0)
        );
        assert!(p.tile_bounds(4, 0, &b, d, TileOrigin::UpperLeft).is_err());
    }
}

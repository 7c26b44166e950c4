use geopack::TileMatrixDimensions;

use crate::error::{invalid, Result};

/// Tile matrix size per zoom level.
pub trait TileScheme {
    fn dimensions(&self, zoom: u32) -> Result<TileMatrixDimensions>;
}

/// Each zoom level doubles the matrix of the level above in both
/// directions.
#[derive(Debug, Clone)]
pub struct ZoomTimesTwo {
    minimum_zoom: u32,
    maximum_zoom: u32,
    base_width: u32,
    base_height: u32,
}

impl ZoomTimesTwo {
    pub fn new(minimum_zoom: u32, maximum_zoom: u32, base_width: u32, base_height: u32) -> Result<Self> {
        if minimum_zoom > maximum_zoom {
            return Err(invalid(format!(
                "minimum zoom level {minimum_zoom} exceeds maximum zoom level {maximum_zoom}"
            )));
        }
        if base_width == 0 || base_height == 0 {
            return Err(invalid("base tile matrix dimensions must be positive"));
        }
        let span = maximum_zoom - minimum_zoom;
        let fits = |base: u32| span < 32 && (u64::from(base) << span) <= u64::from(u32::MAX);
        if !fits(base_width) || !fits(base_height) {
            return Err(invalid(format!(
                "a {base_width}x{base_height} base matrix doubled over {span} levels overflows 32 bits"
            )));
        }
        Ok(Self {
            minimum_zoom,
            maximum_zoom,
            base_width,
            base_height,
        })
    }

    /// Zoom levels 0 to 31 starting from a single tile.
    pub fn global() -> Self {
        Self {
            minimum_zoom: 0,
            maximum_zoom: 31,
            base_width: 1,
            base_height: 1,
        }
    }

    pub fn minimum_zoom(&self) -> u32 {
        self.minimum_zoom
    }

    pub fn maximum_zoom(&self) -> u32 {
        self.maximum_zoom
    }
}

impl TileScheme for ZoomTimesTwo {
    fn dimensions(&self, zoom: u32) -> Result<TileMatrixDimensions> {
        if zoom < self.minimum_zoom || zoom > self.maximum_zoom {
            return Err(invalid(format!(
                "zoom level {zoom} is outside [{}, {}]",
                self.minimum_zoom, self.maximum_zoom
            )));
        }
        let shift = zoom - self.minimum_zoom;
        Ok(TileMatrixDimensions::new(
            self.base_width << shift,
            self.base_height << shift,
        )?)
    }
}

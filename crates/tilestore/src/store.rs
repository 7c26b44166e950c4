use std::collections::BTreeSet;

use geopack::{CoordinateReferenceSystem, CrsCoordinate, CrsProfile, TileCoordinate, TileOrigin};

use crate::error::Result;
use crate::scheme::TileScheme;

/// Read access to a tile set. Tile payloads are opaque bytes.
pub trait TileStoreReader {
    /// `Ok(None)` when the store has no tile at that address.
    fn tile(&self, column: u32, row: u32, zoom: u32) -> Result<Option<Vec<u8>>>;

    /// The tile at `zoom` containing `coordinate`.
    fn tile_at(&self, coordinate: &CrsCoordinate, zoom: u32) -> Result<Option<Vec<u8>>>;

    fn count_tiles(&self) -> Result<u64>;

    /// Total bytes of stored tile payloads and their bookkeeping on disk.
    fn byte_size(&self) -> Result<u64>;

    /// Zoom levels holding at least one stored tile.
    fn zoom_levels(&self) -> Result<BTreeSet<u32>>;

    fn coordinate_reference_system(&self) -> CoordinateReferenceSystem;
}

/// Write access to a tile set.
pub trait TileStoreWriter {
    fn add_tile(&self, column: u32, row: u32, zoom: u32, data: &[u8]) -> Result<()>;

    fn add_tile_at(&self, coordinate: &CrsCoordinate, zoom: u32, data: &[u8]) -> Result<()>;
}

/// Tile address of `coordinate` in the whole-world matrix of `zoom`.
pub(crate) fn locate(
    profile: &dyn CrsProfile,
    scheme: &dyn TileScheme,
    origin: TileOrigin,
    coordinate: &CrsCoordinate,
    zoom: u32,
) -> Result<TileCoordinate> {
    let dimensions = scheme.dimensions(zoom)?;
    Ok(profile.crs_to_tile(coordinate, &profile.bounds(), dimensions, origin)?)
}

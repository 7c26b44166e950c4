//! Tile clusters: many tiles of a tile set packed into a few files.
//!
//! The zoom range `[1, total_levels]` is split at the break point into an
//! upper range `[1, break_point - 1]` and a lower range
//! `[break_point, total_levels]`. Within a range, every tile of the range's
//! first level owns one cluster file holding itself and all of its
//! descendants down to the range's last level.
//!
//! Cluster file layout (big-endian):
//!   00  : index, one 12-byte entry per tile slot, quad-tree breadth first
//!           i64  record offset  (-1 = no tile)
//!           i32  payload length (-1 = no tile)
//!   ..  : tile records, appended in write order
//!           i64  magic 0x772211ee
//!           i64  magic 0x772211ee
//!           i64  column
//!           i64  row
//!           i32  payload length
//!           [u8] payload
//!
//! Slot of a tile at local level `L` (1-based, the cluster's first level
//! being 1) is `cumulative_tile_count(L - 1) + local_row * 2^(L-1) +
//! local_column`.
//!
//! Files from writers that count the cluster's first level as 0 in this
//! formula (so its root and the first row of the next level overlap) are
//! not slot-compatible with this layout and read back the wrong tiles.

use std::path::{Path, PathBuf};

use geopack::{CrsCoordinate, CrsProfile, TileCoordinate, TileOrigin};

use crate::error::{invalid, Result};
use crate::scheme::ZoomTimesTwo;
use crate::store;

mod reader;
mod writer;

pub use reader::ClusterReader;
pub use writer::ClusterWriter;

pub const INDEX_ENTRY_SIZE: u64 = 12;
pub const NO_DATA_OFFSET: i64 = -1;
pub const NO_DATA_LENGTH: i32 = -1;
pub const TILE_MAGIC: i64 = 0x7722_11ee;
/// Two magic numbers, column, row and length.
pub const TILE_HEADER_SIZE: u64 = 8 + 8 + 8 + 8 + 4;
pub const CLUSTER_ORIGIN: TileOrigin = TileOrigin::LowerLeft;
pub const CLUSTER_FILE_EXTENSION: &str = "cluster";

/// Deepest zoom level a cluster store addresses.
pub const MAX_LEVELS: u32 = 31;
/// Most zoom levels one cluster file may span; the index of a cluster
/// spanning `n` levels holds `(4^n - 1) / 3` entries.
pub const MAX_CLUSTER_LEVELS: u32 = 16;

/// Number of tiles in the first `levels` levels of a quad tree with a
/// single root: `1 + 4 + ... + 4^(levels - 1)`. `None` past 32 levels,
/// where the count no longer fits in a `u64`.
#[inline]
pub const fn cumulative_tile_count(levels: u32) -> Option<u64> {
    if levels > 32 {
        return None;
    }
    Some((((1u128 << (2 * levels)) - 1) / 3) as u64)
}

/// [`cumulative_tile_count`] for level counts a valid layout produces.
#[inline]
fn tiles_through(levels: u32) -> u64 {
    cumulative_tile_count(levels).unwrap_or(u64::MAX)
}

/// Which cluster file holds a tile, and the zoom range that file covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClusterAddress {
    pub row: u64,
    pub column: u64,
    pub start_level: u32,
    pub end_level: u32,
}

impl ClusterAddress {
    pub fn levels(&self) -> u32 {
        self.end_level - self.start_level + 1
    }

    /// Index entries a fresh file of this cluster is filled with.
    pub fn index_entries(&self) -> u64 {
        tiles_through(self.levels())
    }

    pub fn index_size(&self) -> u64 {
        self.index_entries() * INDEX_ENTRY_SIZE
    }

    /// Zoom level owning index slot `slot`, if the slot is in range.
    pub fn zoom_of_slot(&self, slot: u64) -> Option<u32> {
        (1..=self.levels())
            .find(|&level| slot < tiles_through(level))
            .map(|level| self.start_level + level - 1)
    }
}

/// Naming and addressing rules of one cluster tile set.
#[derive(Debug, Clone)]
pub struct ClusterLayout {
    location: PathBuf,
    set_name: String,
    total_levels: u32,
    break_point: u32,
}

impl ClusterLayout {
    pub fn new(
        location: impl Into<PathBuf>,
        set_name: &str,
        total_levels: u32,
        break_point: u32,
    ) -> Result<Self> {
        if set_name.is_empty() {
            return Err(invalid("tile set name may not be empty"));
        }
        if set_name.contains(['/', '\\']) {
            return Err(invalid(format!(
                "tile set name {set_name:?} may not contain path separators"
            )));
        }
        if total_levels == 0 || total_levels > MAX_LEVELS {
            return Err(invalid(format!(
                "total levels must be in [1, {MAX_LEVELS}], got {total_levels}"
            )));
        }
        if break_point == 0 || break_point >= total_levels {
            return Err(invalid(format!(
                "break point must be in [1, {}), got {break_point}",
                total_levels
            )));
        }
        let upper = break_point - 1;
        let lower = total_levels - break_point + 1;
        if upper.max(lower) > MAX_CLUSTER_LEVELS {
            return Err(invalid(format!(
                "a cluster may span at most {MAX_CLUSTER_LEVELS} levels; break point {break_point} of {total_levels} gives {upper} and {lower}"
            )));
        }
        Ok(Self {
            location: location.into(),
            set_name: set_name.to_owned(),
            total_levels,
            break_point,
        })
    }

    pub fn location(&self) -> &Path {
        &self.location
    }

    pub fn set_name(&self) -> &str {
        &self.set_name
    }

    pub fn total_levels(&self) -> u32 {
        self.total_levels
    }

    pub fn break_point(&self) -> u32 {
        self.break_point
    }

    /// Zoom range of the cluster starting at `start_level`, if any does.
    pub fn range_starting_at(&self, start_level: u32) -> Option<(u32, u32)> {
        if start_level == 1 && self.break_point > 1 {
            Some((1, self.break_point - 1))
        } else if start_level == self.break_point {
            Some((self.break_point, self.total_levels))
        } else {
            None
        }
    }

    pub fn cluster_address(&self, column: u32, row: u32, zoom: u32) -> Result<ClusterAddress> {
        if zoom == 0 || zoom > self.total_levels {
            return Err(invalid(format!(
                "zoom level {zoom} is outside [1, {}]",
                self.total_levels
            )));
        }
        let side = 1u64 << zoom;
        if u64::from(column) >= side || u64::from(row) >= side {
            return Err(invalid(format!(
                "tile ({column}, {row}) is outside the {side}x{side} matrix of zoom level {zoom}"
            )));
        }
        let (start_level, end_level) = if zoom < self.break_point {
            (1, self.break_point - 1)
        } else {
            (self.break_point, self.total_levels)
        };
        let shift = zoom - start_level;
        Ok(ClusterAddress {
            row: u64::from(row) >> shift,
            column: u64::from(column) >> shift,
            start_level,
            end_level,
        })
    }

    pub fn cluster_file(&self, address: &ClusterAddress) -> PathBuf {
        self.location.join(format!(
            "{}-{}-{}-{}.{CLUSTER_FILE_EXTENSION}",
            self.set_name, address.start_level, address.row, address.column
        ))
    }

    /// Inverse of [`ClusterLayout::cluster_file`] on a bare file name:
    /// `(start_level, row, column)`.
    pub fn parse_cluster_file_name(&self, name: &str) -> Option<(u32, u64, u64)> {
        let rest = name
            .strip_prefix(self.set_name.as_str())?
            .strip_prefix('-')?
            .strip_suffix(CLUSTER_FILE_EXTENSION)?
            .strip_suffix('.')?;
        let mut parts = rest.split('-');
        let start = parts.next()?.parse().ok()?;
        let row = parts.next()?.parse().ok()?;
        let column = parts.next()?.parse().ok()?;
        if parts.next().is_some() {
            return None;
        }
        Some((start, row, column))
    }

    /// Index slot of a tile inside its cluster file.
    pub fn index_slot(&self, column: u32, row: u32, zoom: u32) -> Result<u64> {
        let address = self.cluster_address(column, row, zoom)?;
        let local_zoom = zoom - address.start_level;
        let local_row = u64::from(row) - (address.row << local_zoom);
        let local_column = u64::from(column) - (address.column << local_zoom);
        let columns = 1u64 << local_zoom;
        Ok(tiles_through(local_zoom) + local_row * columns + local_column)
    }

    /// Byte offset of a tile's index entry inside its cluster file.
    pub fn index_offset(&self, column: u32, row: u32, zoom: u32) -> Result<u64> {
        Ok(self.index_slot(column, row, zoom)? * INDEX_ENTRY_SIZE)
    }
}

/// One index entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct IndexEntry {
    pub offset: i64,
    pub length: i32,
}

impl IndexEntry {
    pub const EMPTY: IndexEntry = IndexEntry {
        offset: NO_DATA_OFFSET,
        length: NO_DATA_LENGTH,
    };

    pub fn is_empty(&self) -> bool {
        self.offset == NO_DATA_OFFSET
    }

    pub fn encode(&self) -> [u8; INDEX_ENTRY_SIZE as usize] {
        let mut out = [0u8; INDEX_ENTRY_SIZE as usize];
        out[..8].copy_from_slice(&self.offset.to_be_bytes());
        out[8..].copy_from_slice(&self.length.to_be_bytes());
        out
    }

    pub fn decode(bytes: &[u8; INDEX_ENTRY_SIZE as usize]) -> Self {
        let mut offset = [0u8; 8];
        let mut length = [0u8; 4];
        offset.copy_from_slice(&bytes[..8]);
        length.copy_from_slice(&bytes[8..]);
        Self {
            offset: i64::from_be_bytes(offset),
            length: i32::from_be_bytes(length),
        }
    }
}

/// Fixed-size prefix of a tile record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RecordHeader {
    pub column: i64,
    pub row: i64,
    pub length: i32,
}

impl RecordHeader {
    pub fn encode(&self) -> [u8; TILE_HEADER_SIZE as usize] {
        let mut out = [0u8; TILE_HEADER_SIZE as usize];
        out[0..8].copy_from_slice(&TILE_MAGIC.to_be_bytes());
        out[8..16].copy_from_slice(&TILE_MAGIC.to_be_bytes());
        out[16..24].copy_from_slice(&self.column.to_be_bytes());
        out[24..32].copy_from_slice(&self.row.to_be_bytes());
        out[32..36].copy_from_slice(&self.length.to_be_bytes());
        out
    }

    /// `None` when either magic number is wrong.
    pub fn decode(bytes: &[u8; TILE_HEADER_SIZE as usize]) -> Option<Self> {
        let i64_at = |at: usize| {
            let mut b = [0u8; 8];
            b.copy_from_slice(&bytes[at..at + 8]);
            i64::from_be_bytes(b)
        };
        if i64_at(0) != TILE_MAGIC || i64_at(8) != TILE_MAGIC {
            return None;
        }
        let mut length = [0u8; 4];
        length.copy_from_slice(&bytes[32..36]);
        Some(Self {
            column: i64_at(16),
            row: i64_at(24),
            length: i32::from_be_bytes(length),
        })
    }
}

/// State shared by the cluster reader and writer.
#[derive(Debug)]
pub(crate) struct TileCluster {
    layout: ClusterLayout,
    profile: Box<dyn CrsProfile>,
    scheme: ZoomTimesTwo,
}

impl TileCluster {
    pub fn new(layout: ClusterLayout, profile: Box<dyn CrsProfile>) -> Result<Self> {
        let scheme = ZoomTimesTwo::new(0, layout.total_levels(), 1, 1)?;
        Ok(Self {
            layout,
            profile,
            scheme,
        })
    }

    pub fn layout(&self) -> &ClusterLayout {
        &self.layout
    }

    pub fn profile(&self) -> &dyn CrsProfile {
        self.profile.as_ref()
    }

    pub fn locate(&self, coordinate: &CrsCoordinate, zoom: u32) -> Result<TileCoordinate> {
        store::locate(
            self.profile.as_ref(),
            &self.scheme,
            CLUSTER_ORIGIN,
            coordinate,
            zoom,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn layout(total: u32, break_point: u32) -> ClusterLayout {
        ClusterLayout::new("/tiles", "set", total, break_point).unwrap()
    }

    #[test]
    fn test_cumulative_tile_count() {
        assert_eq!(cumulative_tile_count(0), Some(0));
        assert_eq!(cumulative_tile_count(1), Some(1));
        assert_eq!(cumulative_tile_count(2), Some(5));
        assert_eq!(cumulative_tile_count(3), Some(21));
        let mut sum = 0u64;
        for n in 1..=MAX_LEVELS {
            sum += 4u64.pow(n - 1);
            assert_eq!(cumulative_tile_count(n), Some(sum));
        }
    }

    #[test]
    fn test_cumulative_tile_count_limit() {
        assert_eq!(cumulative_tile_count(32), Some(u64::MAX / 3));
        assert_eq!(cumulative_tile_count(33), None);
        assert_eq!(cumulative_tile_count(u32::MAX), None);
    }

    #[test]
    fn test_reference_address() {
        let a = layout(10, 5).cluster_address(5, 3, 4).unwrap();
        assert_eq!(
            a,
            ClusterAddress {
                row: 0,
                column: 0,
                start_level: 1,
                end_level: 4
            }
        );
        assert_eq!(a.index_entries(), 85);
    }

    #[test]
    fn test_lower_range_address_and_file() {
        let l = layout(10, 5);
        let a = l.cluster_address(37, 18, 7).unwrap();
        assert_eq!((a.start_level, a.end_level), (5, 10));
        assert_eq!((a.row, a.column), (4, 9));
        assert_eq!(l.cluster_file(&a), Path::new("/tiles/set-5-4-9.cluster"));
        assert_eq!(l.parse_cluster_file_name("set-5-4-9.cluster"), Some((5, 4, 9)));
        assert_eq!(l.parse_cluster_file_name("other-5-4-9.cluster"), None);
        assert_eq!(l.parse_cluster_file_name("set-5-4.cluster"), None);
    }

    #[test]
    fn test_slots_do_not_collide() {
        let l = layout(6, 4);
        // Root of the upper cluster and the first tile of its second level.
        assert_eq!(l.index_slot(0, 0, 1).unwrap(), 0);
        assert_eq!(l.index_slot(0, 0, 2).unwrap(), 1);
        assert_eq!(l.index_slot(1, 1, 2).unwrap(), 4);
        assert_eq!(l.index_slot(0, 0, 3).unwrap(), 5);
        assert_eq!(l.index_offset(0, 0, 3).unwrap(), 60);
    }

    #[test]
    fn test_zoom_bounds() {
        let l = layout(10, 5);
        assert!(matches!(
            l.cluster_address(0, 0, 0),
            Err(crate::TileStoreError::InvalidArgument(_))
        ));
        assert!(l.cluster_address(0, 0, 11).is_err());
        assert!(l.cluster_address(0, 0, 10).is_ok());
        assert!(l.cluster_address(3, 3, 2).is_ok());
        assert!(l.cluster_address(4, 0, 2).is_err());
        assert!(l.index_slot(0, 4, 2).is_err());
    }

    #[test]
    fn test_layout_validation() {
        assert!(ClusterLayout::new("/t", "", 10, 5).is_err());
        assert!(ClusterLayout::new("/t", "a/b", 10, 5).is_err());
        assert!(ClusterLayout::new("/t", "s", 0, 0).is_err());
        assert!(ClusterLayout::new("/t", "s", 10, 10).is_err());
        assert!(ClusterLayout::new("/t", "s", 10, 0).is_err());
        assert!(ClusterLayout::new("/t", "s", 31, 16).is_ok());
        assert!(ClusterLayout::new("/t", "s", 31, 2).is_err());
    }

    #[test]
    fn test_zoom_of_slot() {
        let a = layout(10, 5).cluster_address(0, 0, 5).unwrap();
        assert_eq!(a.zoom_of_slot(0), Some(5));
        assert_eq!(a.zoom_of_slot(4), Some(6));
        assert_eq!(a.zoom_of_slot(5), Some(7));
        assert_eq!(a.zoom_of_slot(a.index_entries()), None);
    }

    #[test]
    fn test_entry_and_header_codecs() {
        assert_eq!(IndexEntry::EMPTY.encode(), [0xff; 12]);
        let e = IndexEntry { offset: 1020, length: 7 };
        assert_eq!(IndexEntry::decode(&e.encode()), e);

        let h = RecordHeader { column: 5, row: 3, length: 9 };
        let bytes = h.encode();
        assert_eq!(&bytes[..8], &0x7722_11eei64.to_be_bytes());
        assert_eq!(RecordHeader::decode(&bytes), Some(h));
        let mut broken = bytes;
        broken[9] ^= 1;
        assert_eq!(RecordHeader::decode(&broken), None);
    }

    fn layout_and_tile() -> impl Strategy<Value = (ClusterLayout, u32, u32, u32)> {
        (2u32..=16)
            .prop_flat_map(|total| (Just(total), 1..total, 1..=total))
            .prop_flat_map(|(total, bp, zoom)| {
                let side = 1u64 << zoom;
                (
                    Just(layout(total, bp)),
                    0..side,
                    0..side,
                    Just(zoom),
                )
            })
            .prop_map(|(l, column, row, zoom)| (l, column as u32, row as u32, zoom))
    }

    proptest! {
        #[test]
        fn prop_address_covers_tile((l, column, row, zoom) in layout_and_tile()) {
            let a = l.cluster_address(column, row, zoom).unwrap();
            prop_assert!(a.start_level <= zoom && zoom <= a.end_level);
            let factor = 1u64 << (zoom - a.start_level);
            prop_assert!(a.row * factor <= u64::from(row) && u64::from(row) < (a.row + 1) * factor);
            prop_assert!(a.column * factor <= u64::from(column) && u64::from(column) < (a.column + 1) * factor);
        }

        #[test]
        fn prop_slot_inside_index((l, column, row, zoom) in layout_and_tile()) {
            let a = l.cluster_address(column, row, zoom).unwrap();
            let slot = l.index_slot(column, row, zoom).unwrap();
            prop_assert!(slot < a.index_entries());
            prop_assert_eq!(a.zoom_of_slot(slot), Some(zoom));
        }
    }
}

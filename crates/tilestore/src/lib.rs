//! tilestore: on-disk tile sets addressed by zoom, column and row.
//!
//! Two layouts are provided:
//! - cluster files bundling a pyramid of zoom levels per file, with a
//!   fixed-size index of (offset, length) entries followed by appended
//!   tile records (see [`cluster`]);
//! - TMS directory trees, one file per tile (see [`tms`]).
//!
//! Tiles are opaque byte payloads. Coordinates are mapped to tiles
//! through the CRS profiles of `geopack`.

pub mod cluster;
pub mod config;
pub mod error;
pub mod scheme;
pub mod store;
pub mod tms;

pub use cluster::{
    cumulative_tile_count, ClusterAddress, ClusterLayout, ClusterReader, ClusterWriter,
};
pub use config::{ProfileKind, StoreConfig, StoreKind};
pub use error::{Result, TileStoreError};
pub use scheme::{TileScheme, ZoomTimesTwo};
pub use store::{TileStoreReader, TileStoreWriter};
pub use tms::{TmsReader, TmsWriter};

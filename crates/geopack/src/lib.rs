//! geopack: GeoPackage geometry encoding and tile-matrix math.
//!
//! - Coordinates in four dimensionalities (XY, XYZ, XYM, XYZM).
//! - Envelopes with NaN as the "no bound" sentinel.
//! - OGC simple feature geometries, generic over dimensionality.
//! - Well-known binary (WKB) codec with a type-code keyed reader registry.
//! - GeoPackage binary blobs (`GP` header + WKB).
//! - CRS profiles mapping coordinates to tiles for EPSG:4326, EPSG:3857
//!   and EPSG:3395.
//!
//! WKB geometry layout (per geometry, byte order chosen by its marker):
//!   00  : u8      byte order (0 = big-endian, 1 = little-endian)
//!   01  : u32     type code = kind + dimensionality base
//!                 kind 1 Point .. 7 GeometryCollection
//!                 base 0 XY, 1000 XYZ, 2000 XYM, 3000 XYZM
//!   05  : payload (see [`wkb`])
//!
//! GeoPackage blob layout (see [`blob`]):
//!   00  : [u8;2]  magic = b"GP"
//!   02  : u8      version (0)
//!   03  : u8      flags
//!   04  : i32     srs_id
//!   08  : f64[n]  envelope, n in {0, 4, 6, 8}
//!   ..  : WKB geometry

pub mod blob;
pub mod bytes;
pub mod coordinate;
pub mod crs;
pub mod envelope;
pub mod error;
pub mod geometry;
pub mod wgs84;
pub mod wkb;

pub use blob::{read_blob, write_blob, BinaryHeader, BinaryType, EnvelopeContents, GeoPackageGeometry};
pub use bytes::{ByteOrder, ByteReader, ByteWriter};
pub use coordinate::{Coord, Coordinate, CoordinateM, CoordinateZ, CoordinateZM, Dimension};
pub use crs::{
    BoundingBox, CoordinateReferenceSystem, CrsCoordinate, CrsProfile,
    EllipsoidalMercatorCrsProfile, GlobalGeodeticCrsProfile, SphericalMercatorCrsProfile,
    TileCoordinate, TileMatrixDimensions, TileOrigin,
};
pub use envelope::Envelope;
pub use error::{Error, Result};
pub use geometry::{
    AnyGeometry, Geometry, GeometryCollection, GeometryType, LineString, LinearRing,
    MultiLineString, MultiPoint, MultiPolygon, Point, Polygon,
};
pub use wkb::{GeometryFactory, GeometryReader, WellKnownBinary};

//! Coordinate value types for the four WKB dimensionalities.

use std::fmt;
use std::hash::{Hash, Hasher};

use crate::bytes::{ByteReader, ByteWriter};
use crate::envelope::Envelope;
use crate::error::Result;
use crate::geometry::{AnyGeometry, Geometry};

/// Coordinate dimensionality. Each one offsets the WKB geometry type code
/// by a fixed base (0, 1000, 2000, 3000).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dimension {
    Xy,
    Xyz,
    Xym,
    Xyzm,
}

impl Dimension {
    pub const fn from_flags(has_z: bool, has_m: bool) -> Self {
        match (has_z, has_m) {
            (false, false) => Dimension::Xy,
            (true, false) => Dimension::Xyz,
            (false, true) => Dimension::Xym,
            (true, true) => Dimension::Xyzm,
        }
    }

    /// Value added to every base geometry type code for this dimensionality.
    pub const fn type_code_base(self) -> u32 {
        match self {
            Dimension::Xy => 0,
            Dimension::Xyz => 1000,
            Dimension::Xym => 2000,
            Dimension::Xyzm => 3000,
        }
    }

    /// Splits a WKB type code into its dimensionality and base code.
    pub const fn split_type_code(code: u32) -> Option<(Dimension, u32)> {
        let dimension = match code / 1000 {
            0 => Dimension::Xy,
            1 => Dimension::Xyz,
            2 => Dimension::Xym,
            3 => Dimension::Xyzm,
            _ => return None,
        };
        Some((dimension, code % 1000))
    }

    #[inline]
    pub const fn has_z(self) -> bool {
        matches!(self, Dimension::Xyz | Dimension::Xyzm)
    }

    #[inline]
    pub const fn has_m(self) -> bool {
        matches!(self, Dimension::Xym | Dimension::Xyzm)
    }

    /// Smallest dimensionality carrying every axis of both inputs.
    #[inline]
    pub const fn union(self, other: Dimension) -> Dimension {
        Dimension::from_flags(self.has_z() || other.has_z(), self.has_m() || other.has_m())
    }
}

/// A coordinate of one fixed dimensionality.
///
/// Geometries are generic over this trait, which makes "a Z collection
/// holding an XY point" unrepresentable once a value has been built.
pub trait Coord: Copy + fmt::Debug + PartialEq + Eq + Hash + 'static {
    const DIMENSION: Dimension;

    /// Encoded size of one coordinate in bytes.
    const BYTE_SIZE: usize;

    fn x(&self) -> f64;
    fn y(&self) -> f64;

    fn read(reader: &mut ByteReader<'_>) -> Result<Self>;
    fn write(&self, writer: &mut ByteWriter);

    /// True when every component is NaN.
    fn is_empty(&self) -> bool;

    fn envelope(&self) -> Envelope;

    fn into_any(geometry: Geometry<Self>) -> AnyGeometry;
    fn from_any(geometry: AnyGeometry) -> Option<Geometry<Self>>;
}

// Components compare by bit pattern (NaN equals NaN, 0.0 differs from -0.0),
// so an empty coordinate is equal to itself after a round trip.
macro_rules! bitwise_eq {
    ($ty:ident { $($field:ident),+ }) => {
        impl PartialEq for $ty {
            fn eq(&self, other: &Self) -> bool {
                $(self.$field.to_bits() == other.$field.to_bits())&&+
            }
        }

        impl Eq for $ty {}

        impl Hash for $ty {
            fn hash<H: Hasher>(&self, state: &mut H) {
                $(self.$field.to_bits().hash(state);)+
            }
        }
    };
}

/// Two dimensional coordinate.
#[derive(Debug, Clone, Copy)]
pub struct Coordinate {
    pub x: f64,
    pub y: f64,
}

/// Coordinate with elevation.
#[derive(Debug, Clone, Copy)]
pub struct CoordinateZ {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Coordinate with a measure.
#[derive(Debug, Clone, Copy)]
pub struct CoordinateM {
    pub x: f64,
    pub y: f64,
    pub m: f64,
}

/// Coordinate with elevation and measure.
#[derive(Debug, Clone, Copy)]
pub struct CoordinateZM {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub m: f64,
}

bitwise_eq!(Coordinate { x, y });
bitwise_eq!(CoordinateZ { x, y, z });
bitwise_eq!(CoordinateM { x, y, m });
bitwise_eq!(CoordinateZM { x, y, z, m });

impl Coordinate {
    #[inline]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// The all-NaN coordinate used for empty points.
    pub const EMPTY: Coordinate = Coordinate::new(f64::NAN, f64::NAN);
}

impl CoordinateZ {
    #[inline]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub const EMPTY: CoordinateZ = CoordinateZ::new(f64::NAN, f64::NAN, f64::NAN);
}

impl CoordinateM {
    #[inline]
    pub const fn new(x: f64, y: f64, m: f64) -> Self {
        Self { x, y, m }
    }

    pub const EMPTY: CoordinateM = CoordinateM::new(f64::NAN, f64::NAN, f64::NAN);
}

impl CoordinateZM {
    #[inline]
    pub const fn new(x: f64, y: f64, z: f64, m: f64) -> Self {
        Self { x, y, z, m }
    }

    pub const EMPTY: CoordinateZM = CoordinateZM::new(f64::NAN, f64::NAN, f64::NAN, f64::NAN);
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

impl fmt::Display for CoordinateZ {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

impl fmt::Display for CoordinateM {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, m={})", self.x, self.y, self.m)
    }
}

impl fmt::Display for CoordinateZM {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {}, m={})", self.x, self.y, self.z, self.m)
    }
}

impl Coord for Coordinate {
    const DIMENSION: Dimension = Dimension::Xy;
    const BYTE_SIZE: usize = 16;

    #[inline]
    fn x(&self) -> f64 {
        self.x
    }

    #[inline]
    fn y(&self) -> f64 {
        self.y
    }

    fn read(reader: &mut ByteReader<'_>) -> Result<Self> {
        reader.need(Self::BYTE_SIZE)?;
        Ok(Self::new(reader.f64()?, reader.f64()?))
    }

    fn write(&self, writer: &mut ByteWriter) {
        writer.write_f64(self.x);
        writer.write_f64(self.y);
    }

    fn is_empty(&self) -> bool {
        self.x.is_nan() && self.y.is_nan()
    }

    fn envelope(&self) -> Envelope {
        if self.is_empty() {
            return Envelope::EMPTY;
        }
        Envelope::new(self.x, self.y, self.x, self.y)
    }

    fn into_any(geometry: Geometry<Self>) -> AnyGeometry {
        AnyGeometry::Xy(geometry)
    }

    fn from_any(geometry: AnyGeometry) -> Option<Geometry<Self>> {
        match geometry {
            AnyGeometry::Xy(g) => Some(g),
            _ => None,
        }
    }
}

impl Coord for CoordinateZ {
    const DIMENSION: Dimension = Dimension::Xyz;
    const BYTE_SIZE: usize = 24;

    #[inline]
    fn x(&self) -> f64 {
        self.x
    }

    #[inline]
    fn y(&self) -> f64 {
        self.y
    }

    fn read(reader: &mut ByteReader<'_>) -> Result<Self> {
        reader.need(Self::BYTE_SIZE)?;
        Ok(Self::new(reader.f64()?, reader.f64()?, reader.f64()?))
    }

    fn write(&self, writer: &mut ByteWriter) {
        writer.write_f64(self.x);
        writer.write_f64(self.y);
        writer.write_f64(self.z);
    }

    fn is_empty(&self) -> bool {
        self.x.is_nan() && self.y.is_nan() && self.z.is_nan()
    }

    fn envelope(&self) -> Envelope {
        if self.is_empty() {
            return Envelope::empty(Dimension::Xyz);
        }
        Envelope::new_z(self.x, self.y, self.z, self.x, self.y, self.z)
    }

    fn into_any(geometry: Geometry<Self>) -> AnyGeometry {
        AnyGeometry::Z(geometry)
    }

    fn from_any(geometry: AnyGeometry) -> Option<Geometry<Self>> {
        match geometry {
            AnyGeometry::Z(g) => Some(g),
            _ => None,
        }
    }
}

impl Coord for CoordinateM {
    const DIMENSION: Dimension = Dimension::Xym;
    const BYTE_SIZE: usize = 24;

    #[inline]
    fn x(&self) -> f64 {
        self.x
    }

    #[inline]
    fn y(&self) -> f64 {
        self.y
    }

    fn read(reader: &mut ByteReader<'_>) -> Result<Self> {
        reader.need(Self::BYTE_SIZE)?;
        Ok(Self::new(reader.f64()?, reader.f64()?, reader.f64()?))
    }

    fn write(&self, writer: &mut ByteWriter) {
        writer.write_f64(self.x);
        writer.write_f64(self.y);
        writer.write_f64(self.m);
    }

    fn is_empty(&self) -> bool {
        self.x.is_nan() && self.y.is_nan() && self.m.is_nan()
    }

    fn envelope(&self) -> Envelope {
        if self.is_empty() {
            return Envelope::empty(Dimension::Xym);
        }
        Envelope::new_m(self.x, self.y, self.m, self.x, self.y, self.m)
    }

    fn into_any(geometry: Geometry<Self>) -> AnyGeometry {
        AnyGeometry::M(geometry)
    }

    fn from_any(geometry: AnyGeometry) -> Option<Geometry<Self>> {
        match geometry {
            AnyGeometry::M(g) => Some(g),
            _ => None,
        }
    }
}

impl Coord for CoordinateZM {
    const DIMENSION: Dimension = Dimension::Xyzm;
    const BYTE_SIZE: usize = 32;

    #[inline]
    fn x(&self) -> f64 {
        self.x
    }

    #[inline]
    fn y(&self) -> f64 {
        self.y
    }

    fn read(reader: &mut ByteReader<'_>) -> Result<Self> {
        reader.need(Self::BYTE_SIZE)?;
        Ok(Self::new(reader.f64()?, reader.f64()?, reader.f64()?, reader.f64()?))
    }

    fn write(&self, writer: &mut ByteWriter) {
        writer.write_f64(self.x);
        writer.write_f64(self.y);
        writer.write_f64(self.z);
        writer.write_f64(self.m);
    }

    fn is_empty(&self) -> bool {
        self.x.is_nan() && self.y.is_nan() && self.z.is_nan() && self.m.is_nan()
    }

    fn envelope(&self) -> Envelope {
        if self.is_empty() {
            return Envelope::empty(Dimension::Xyzm);
        }
        Envelope::new_zm(
            self.x, self.y, self.z, self.m, self.x, self.y, self.z, self.m,
        )
    }

    fn into_any(geometry: Geometry<Self>) -> AnyGeometry {
        AnyGeometry::Zm(geometry)
    }

    fn from_any(geometry: AnyGeometry) -> Option<Geometry<Self>> {
        match geometry {
            AnyGeometry::Zm(g) => Some(g),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nan_coordinates_compare_equal() {
        assert_eq!(Coordinate::EMPTY, Coordinate::EMPTY);
        assert!(Coordinate::EMPTY.is_empty());
        assert_ne!(Coordinate::new(0.0, 0.0), Coordinate::new(-0.0, 0.0));
    }

    #[test]
    fn test_split_type_code() {
        assert_eq!(Dimension::split_type_code(1003), Some((Dimension::Xyz, 3)));
        assert_eq!(Dimension::split_type_code(7), Some((Dimension::Xy, 7)));
        assert_eq!(Dimension::split_type_code(3001), Some((Dimension::Xyzm, 1)));
        assert_eq!(Dimension::split_type_code(4001), None);
    }

    #[test]
    fn test_point_envelope_is_degenerate() {
        let env = CoordinateZ::new(1.0, 2.0, 3.0).envelope();
        assert_eq!(env.min_x(), 1.0);
        assert_eq!(env.max_x(), 1.0);
        assert_eq!(env.z_range(), Some((3.0, 3.0)));
        assert!(CoordinateZ::EMPTY.envelope().is_empty());
    }

    #[test]
    fn test_dimension_union() {
        assert_eq!(Dimension::Xyz.union(Dimension::Xym), Dimension::Xyzm);
        assert_eq!(Dimension::Xy.union(Dimension::Xy), Dimension::Xy);
    }
}

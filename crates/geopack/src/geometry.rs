//! Geometry value types.
//!
//! Every type is generic over its coordinate dimensionality `C`, so the
//! type system enforces that a collection's members share one
//! dimensionality. [`AnyGeometry`] tags the dimensionality of a decoded
//! geometry whose kind was not known in advance.

use std::fmt;

use crate::coordinate::{Coord, Coordinate, CoordinateM, CoordinateZ, CoordinateZM, Dimension};
use crate::envelope::Envelope;
use crate::error::{invalid, Result};

/// OGC geometry kinds with their WKB base type codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum GeometryType {
    /// Abstract root type; never valid on the wire.
    Geometry = 0,
    Point = 1,
    LineString = 2,
    Polygon = 3,
    MultiPoint = 4,
    MultiLineString = 5,
    MultiPolygon = 6,
    GeometryCollection = 7,
}

impl GeometryType {
    pub const ALL: [GeometryType; 8] = [
        GeometryType::Geometry,
        GeometryType::Point,
        GeometryType::LineString,
        GeometryType::Polygon,
        GeometryType::MultiPoint,
        GeometryType::MultiLineString,
        GeometryType::MultiPolygon,
        GeometryType::GeometryCollection,
    ];

    #[inline]
    pub const fn code(self) -> u32 {
        self as u32
    }

    pub fn from_code(code: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.code() == code)
    }

    /// OGC name, e.g. `"LineString"`.
    pub const fn name(self) -> &'static str {
        match self {
            GeometryType::Geometry => "Geometry",
            GeometryType::Point => "Point",
            GeometryType::LineString => "LineString",
            GeometryType::Polygon => "Polygon",
            GeometryType::MultiPoint => "MultiPoint",
            GeometryType::MultiLineString => "MultiLineString",
            GeometryType::MultiPolygon => "MultiPolygon",
            GeometryType::GeometryCollection => "GeometryCollection",
        }
    }

    /// Full WKB type code for this kind at the given dimensionality.
    #[inline]
    pub const fn type_code(self, dimension: Dimension) -> u32 {
        self.code() + dimension.type_code_base()
    }
}

impl fmt::Display for GeometryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn envelope_of<'a, C: Coord>(coordinates: impl IntoIterator<Item = &'a C>) -> Envelope {
    coordinates
        .into_iter()
        .fold(Envelope::empty(C::DIMENSION), |acc, c| acc.combine(&c.envelope()))
}

fn combined<I: IntoIterator<Item = Envelope>>(dimension: Dimension, envelopes: I) -> Envelope {
    envelopes
        .into_iter()
        .fold(Envelope::empty(dimension), |acc, e| acc.combine(&e))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Point<C: Coord> {
    coordinate: C,
}

impl<C: Coord> Point<C> {
    pub fn new(coordinate: C) -> Self {
        Self { coordinate }
    }

    #[inline]
    pub fn coordinate(&self) -> C {
        self.coordinate
    }

    /// A point is empty when all of its components are NaN.
    pub fn is_empty(&self) -> bool {
        self.coordinate.is_empty()
    }

    pub fn envelope(&self) -> Envelope {
        self.coordinate.envelope()
    }
}

impl<C: Coord> From<C> for Point<C> {
    fn from(coordinate: C) -> Self {
        Point::new(coordinate)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LineString<C: Coord> {
    points: Vec<C>,
}

impl<C: Coord> LineString<C> {
    pub fn new(points: Vec<C>) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[C] {
        &self.points
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn envelope(&self) -> Envelope {
        envelope_of(&self.points)
    }
}

/// Ring of a polygon. Closure is not enforced; the codec stores whatever
/// coordinates it is given.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LinearRing<C: Coord> {
    points: Vec<C>,
}

impl<C: Coord> Default for LinearRing<C> {
    fn default() -> Self {
        Self { points: Vec::new() }
    }
}

impl<C: Coord> LinearRing<C> {
    pub fn new(points: Vec<C>) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[C] {
        &self.points
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn envelope(&self) -> Envelope {
        envelope_of(&self.points)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Polygon<C: Coord> {
    exterior: LinearRing<C>,
    interiors: Vec<LinearRing<C>>,
}

impl<C: Coord> Polygon<C> {
    /// Fails when interior rings are given without an exterior ring: an
    /// empty exterior is encoded as a zero ring count, which would drop
    /// the interiors.
    pub fn new(exterior: LinearRing<C>, interiors: Vec<LinearRing<C>>) -> Result<Self> {
        if exterior.is_empty() && !interiors.is_empty() {
            return Err(invalid(
                "a polygon with an empty exterior ring may not have interior rings",
            ));
        }
        Ok(Self {
            exterior,
            interiors,
        })
    }

    pub fn empty() -> Self {
        Self {
            exterior: LinearRing::default(),
            interiors: Vec::new(),
        }
    }

    pub fn exterior(&self) -> &LinearRing<C> {
        &self.exterior
    }

    pub fn interiors(&self) -> &[LinearRing<C>] {
        &self.interiors
    }

    /// Rings in encoding order; none for an empty polygon.
    pub fn rings(&self) -> impl Iterator<Item = &LinearRing<C>> {
        let exterior = (!self.exterior.is_empty()).then_some(&self.exterior);
        exterior.into_iter().chain(self.interiors.iter())
    }

    pub fn is_empty(&self) -> bool {
        self.exterior.is_empty()
    }

    /// The exterior ring bounds the polygon.
    pub fn envelope(&self) -> Envelope {
        self.exterior.envelope()
    }
}

macro_rules! multi {
    ($(#[$doc:meta])* $name:ident, $member:ident, $accessor:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        pub struct $name<C: Coord> {
            members: Vec<$member<C>>,
        }

        impl<C: Coord> $name<C> {
            pub fn new(members: Vec<$member<C>>) -> Self {
                Self { members }
            }

            pub fn $accessor(&self) -> &[$member<C>] {
                &self.members
            }

            pub fn is_empty(&self) -> bool {
                self.members.is_empty()
            }

            pub fn envelope(&self) -> Envelope {
                combined(C::DIMENSION, self.members.iter().map(|m| m.envelope()))
            }
        }

        impl<C: Coord> FromIterator<$member<C>> for $name<C> {
            fn from_iter<I: IntoIterator<Item = $member<C>>>(iter: I) -> Self {
                Self::new(iter.into_iter().collect())
            }
        }
    };
}

multi!(MultiPoint, Point, points);
multi!(MultiLineString, LineString, line_strings);
multi!(MultiPolygon, Polygon, polygons);
multi!(
    /// Heterogeneous collection of geometries sharing one dimensionality.
    GeometryCollection,
    Geometry,
    geometries
);

/// Any geometry of dimensionality `C`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Geometry<C: Coord> {
    Point(Point<C>),
    LineString(LineString<C>),
    Polygon(Polygon<C>),
    MultiPoint(MultiPoint<C>),
    MultiLineString(MultiLineString<C>),
    MultiPolygon(MultiPolygon<C>),
    GeometryCollection(GeometryCollection<C>),
}

impl<C: Coord> Geometry<C> {
    pub fn geometry_type(&self) -> GeometryType {
        match self {
            Geometry::Point(_) => GeometryType::Point,
            Geometry::LineString(_) => GeometryType::LineString,
            Geometry::Polygon(_) => GeometryType::Polygon,
            Geometry::MultiPoint(_) => GeometryType::MultiPoint,
            Geometry::MultiLineString(_) => GeometryType::MultiLineString,
            Geometry::MultiPolygon(_) => GeometryType::MultiPolygon,
            Geometry::GeometryCollection(_) => GeometryType::GeometryCollection,
        }
    }

    #[inline]
    pub fn dimension(&self) -> Dimension {
        C::DIMENSION
    }

    /// WKB type code, dimensionality base included.
    pub fn type_code(&self) -> u32 {
        self.geometry_type().type_code(C::DIMENSION)
    }

    pub fn geometry_type_name(&self) -> &'static str {
        self.geometry_type().name()
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Geometry::Point(g) => g.is_empty(),
            Geometry::LineString(g) => g.is_empty(),
            Geometry::Polygon(g) => g.is_empty(),
            Geometry::MultiPoint(g) => g.is_empty(),
            Geometry::MultiLineString(g) => g.is_empty(),
            Geometry::MultiPolygon(g) => g.is_empty(),
            Geometry::GeometryCollection(g) => g.is_empty(),
        }
    }

    pub fn envelope(&self) -> Envelope {
        match self {
            Geometry::Point(g) => g.envelope(),
            Geometry::LineString(g) => g.envelope(),
            Geometry::Polygon(g) => g.envelope(),
            Geometry::MultiPoint(g) => g.envelope(),
            Geometry::MultiLineString(g) => g.envelope(),
            Geometry::MultiPolygon(g) => g.envelope(),
            Geometry::GeometryCollection(g) => g.envelope(),
        }
    }
}

macro_rules! geometry_from {
    ($($variant:ident),+) => {$(
        impl<C: Coord> From<$variant<C>> for Geometry<C> {
            fn from(g: $variant<C>) -> Self {
                Geometry::$variant(g)
            }
        }
    )+};
}

geometry_from!(
    Point,
    LineString,
    Polygon,
    MultiPoint,
    MultiLineString,
    MultiPolygon,
    GeometryCollection
);

/// A geometry of any dimensionality.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AnyGeometry {
    Xy(Geometry<Coordinate>),
    Z(Geometry<CoordinateZ>),
    M(Geometry<CoordinateM>),
    Zm(Geometry<CoordinateZM>),
}

macro_rules! each {
    ($any:expr, $g:ident => $body:expr) => {
        match $any {
            AnyGeometry::Xy($g) => $body,
            AnyGeometry::Z($g) => $body,
            AnyGeometry::M($g) => $body,
            AnyGeometry::Zm($g) => $body,
        }
    };
}

impl AnyGeometry {
    pub fn dimension(&self) -> Dimension {
        each!(self, g => g.dimension())
    }

    pub fn geometry_type(&self) -> GeometryType {
        each!(self, g => g.geometry_type())
    }

    pub fn type_code(&self) -> u32 {
        each!(self, g => g.type_code())
    }

    pub fn geometry_type_name(&self) -> &'static str {
        each!(self, g => g.geometry_type_name())
    }

    pub fn is_empty(&self) -> bool {
        each!(self, g => g.is_empty())
    }

    pub fn envelope(&self) -> Envelope {
        each!(self, g => g.envelope())
    }

    /// Narrows to a geometry of dimensionality `C`.
    pub fn into_geometry<C: Coord>(self) -> Option<Geometry<C>> {
        C::from_any(self)
    }
}

impl<C: Coord> From<Geometry<C>> for AnyGeometry {
    fn from(g: Geometry<C>) -> Self {
        C::into_any(g)
    }
}

//! Well-known binary encoding.
//!
//! ```text
//! geometry   = byte_order:u8  type_code:u32  payload
//! Point      = coordinate
//! LineString = count:u32  coordinate{count}
//! Polygon    = rings:u32  (count:u32 coordinate{count}){rings}
//! Multi*     = count:u32  geometry{count}      // members of one kind
//! Collection = count:u32  geometry{count}      // any kind, same dimension
//! coordinate = x:f64 y:f64 [z:f64] [m:f64]
//! ```
//!
//! `byte_order` is 0 for big-endian and 1 for little-endian and applies to
//! the geometry it prefixes; nested geometries carry their own marker. The
//! type code is the base kind (1..=7) plus 0, 1000, 2000 or 3000 for XY,
//! XYZ, XYM and XYZM.

use std::collections::HashMap;
use std::fmt;

use tracing::trace;

use crate::bytes::{ByteOrder, ByteReader, ByteWriter};
use crate::coordinate::{Coord, Coordinate, CoordinateM, CoordinateZ, CoordinateZM};
use crate::error::{bad, Result};
use crate::geometry::{
    AnyGeometry, Geometry, GeometryCollection, GeometryType, LineString, LinearRing,
    MultiLineString, MultiPoint, MultiPolygon, Point, Polygon,
};

/// Size of the marker byte plus the type code.
pub const WKB_HEADER_SIZE: usize = 5;

/// Binary encoding of a geometry value.
pub trait WellKnownBinary: Sized {
    /// Appends the encoding using the writer's byte order.
    fn write_wkb(&self, writer: &mut ByteWriter);

    /// Decodes one geometry at the reader's position. Collections resolve
    /// their members through `factory`.
    fn read_wkb(factory: &GeometryFactory, reader: &mut ByteReader<'_>) -> Result<Self>;

    fn to_wkb(&self, order: ByteOrder) -> Vec<u8> {
        let mut writer = ByteWriter::new(order);
        self.write_wkb(&mut writer);
        writer.into_inner()
    }
}

fn write_header(writer: &mut ByteWriter, type_code: u32) {
    writer.write_u8(writer.order().marker());
    writer.write_u32(type_code);
}

/// Reads the marker and type code, switching the reader to the geometry's
/// byte order, and checks the code against `expected`.
fn read_header(reader: &mut ByteReader<'_>, expected: u32) -> Result<()> {
    let order = ByteOrder::from_marker(reader.u8()?)?;
    reader.set_order(order);
    let code = reader.u32()?;
    if code != expected {
        return Err(bad(format!(
            "unexpected geometry type code {code}, expected {expected}"
        )));
    }
    Ok(())
}

fn write_coordinates<C: Coord>(writer: &mut ByteWriter, points: &[C]) {
    writer.write_u32(points.len() as u32);
    for p in points {
        p.write(writer);
    }
}

fn read_coordinates<C: Coord>(reader: &mut ByteReader<'_>) -> Result<Vec<C>> {
    let count = reader.u32()?;
    let mut points = Vec::with_capacity(reader.capacity_for(count, C::BYTE_SIZE));
    for _ in 0..count {
        points.push(C::read(reader)?);
    }
    Ok(points)
}

fn read_members<T: WellKnownBinary>(
    factory: &GeometryFactory,
    reader: &mut ByteReader<'_>,
) -> Result<Vec<T>> {
    let count = reader.u32()?;
    let mut members = Vec::with_capacity(reader.capacity_for(count, WKB_HEADER_SIZE));
    for _ in 0..count {
        members.push(T::read_wkb(factory, reader)?);
    }
    Ok(members)
}

impl<C: Coord> WellKnownBinary for Point<C> {
    fn write_wkb(&self, writer: &mut ByteWriter) {
        write_header(writer, GeometryType::Point.type_code(C::DIMENSION));
        self.coordinate().write(writer);
    }

    fn read_wkb(_: &GeometryFactory, reader: &mut ByteReader<'_>) -> Result<Self> {
        read_header(reader, GeometryType::Point.type_code(C::DIMENSION))?;
        Ok(Point::new(C::read(reader)?))
    }
}

impl<C: Coord> WellKnownBinary for LineString<C> {
    fn write_wkb(&self, writer: &mut ByteWriter) {
        write_header(writer, GeometryType::LineString.type_code(C::DIMENSION));
        write_coordinates(writer, self.points());
    }

    fn read_wkb(_: &GeometryFactory, reader: &mut ByteReader<'_>) -> Result<Self> {
        read_header(reader, GeometryType::LineString.type_code(C::DIMENSION))?;
        Ok(LineString::new(read_coordinates(reader)?))
    }
}

impl<C: Coord> WellKnownBinary for Polygon<C> {
    fn write_wkb(&self, writer: &mut ByteWriter) {
        write_header(writer, GeometryType::Polygon.type_code(C::DIMENSION));
        let rings: Vec<&LinearRing<C>> = self.rings().collect();
        writer.write_u32(rings.len() as u32);
        for ring in rings {
            write_coordinates(writer, ring.points());
        }
    }

    fn read_wkb(_: &GeometryFactory, reader: &mut ByteReader<'_>) -> Result<Self> {
        read_header(reader, GeometryType::Polygon.type_code(C::DIMENSION))?;
        let count = reader.u32()?;
        if count == 0 {
            return Ok(Polygon::empty());
        }
        let exterior = LinearRing::new(read_coordinates(reader)?);
        let mut interiors = Vec::with_capacity(reader.capacity_for(count - 1, 4));
        for _ in 1..count {
            interiors.push(LinearRing::new(read_coordinates(reader)?));
        }
        if exterior.is_empty() && !interiors.is_empty() {
            return Err(bad("polygon has interior rings but an empty exterior ring"));
        }
        Polygon::new(exterior, interiors)
    }
}

macro_rules! multi_wkb {
    ($name:ident, $member:ident, $accessor:ident) => {
        impl<C: Coord> WellKnownBinary for $name<C> {
            fn write_wkb(&self, writer: &mut ByteWriter) {
                write_header(writer, GeometryType::$name.type_code(C::DIMENSION));
                writer.write_u32(self.$accessor().len() as u32);
                for member in self.$accessor() {
                    member.write_wkb(writer);
                }
            }

            fn read_wkb(factory: &GeometryFactory, reader: &mut ByteReader<'_>) -> Result<Self> {
                read_header(reader, GeometryType::$name.type_code(C::DIMENSION))?;
                Ok($name::new(read_members::<$member<C>>(factory, reader)?))
            }
        }
    };
}

multi_wkb!(MultiPoint, Point, points);
multi_wkb!(MultiLineString, LineString, line_strings);
multi_wkb!(MultiPolygon, Polygon, polygons);

impl<C: Coord> WellKnownBinary for GeometryCollection<C> {
    fn write_wkb(&self, writer: &mut ByteWriter) {
        write_header(writer, GeometryType::GeometryCollection.type_code(C::DIMENSION));
        writer.write_u32(self.geometries().len() as u32);
        for member in self.geometries() {
            member.write_wkb(writer);
        }
    }

    fn read_wkb(factory: &GeometryFactory, reader: &mut ByteReader<'_>) -> Result<Self> {
        read_header(reader, GeometryType::GeometryCollection.type_code(C::DIMENSION))?;
        let count = reader.u32()?;
        reader.descend()?;
        let mut members = Vec::with_capacity(reader.capacity_for(count, WKB_HEADER_SIZE));
        for index in 0..count {
            let member = C::from_any(factory.read(reader)?).ok_or_else(|| {
                bad(format!(
                    "Geometry at index {index} is not in dimensionality agreement with its parent geometry collection"
                ))
            })?;
            members.push(member);
        }
        reader.ascend();
        Ok(GeometryCollection::new(members))
    }
}

impl<C: Coord> WellKnownBinary for Geometry<C> {
    fn write_wkb(&self, writer: &mut ByteWriter) {
        match self {
            Geometry::Point(g) => g.write_wkb(writer),
            Geometry::LineString(g) => g.write_wkb(writer),
            Geometry::Polygon(g) => g.write_wkb(writer),
            Geometry::MultiPoint(g) => g.write_wkb(writer),
            Geometry::MultiLineString(g) => g.write_wkb(writer),
            Geometry::MultiPolygon(g) => g.write_wkb(writer),
            Geometry::GeometryCollection(g) => g.write_wkb(writer),
        }
    }

    fn read_wkb(factory: &GeometryFactory, reader: &mut ByteReader<'_>) -> Result<Self> {
        let any = factory.read(reader)?;
        let dimension = any.dimension();
        C::from_any(any).ok_or_else(|| {
            bad(format!(
                "expected a {:?} geometry, found {dimension:?}",
                C::DIMENSION
            ))
        })
    }
}

impl WellKnownBinary for AnyGeometry {
    fn write_wkb(&self, writer: &mut ByteWriter) {
        match self {
            AnyGeometry::Xy(g) => g.write_wkb(writer),
            AnyGeometry::Z(g) => g.write_wkb(writer),
            AnyGeometry::M(g) => g.write_wkb(writer),
            AnyGeometry::Zm(g) => g.write_wkb(writer),
        }
    }

    fn read_wkb(factory: &GeometryFactory, reader: &mut ByteReader<'_>) -> Result<Self> {
        factory.read(reader)
    }
}

/// Reader registered for one type code. It is handed the reader positioned
/// at the geometry's byte-order marker.
pub type GeometryReader = fn(&GeometryFactory, &mut ByteReader<'_>) -> Result<AnyGeometry>;

/// Dispatch table from WKB type code to reader.
///
/// A fresh factory knows every built-in kind in all four dimensionalities.
/// Codes 0, 1000, 2000 and 3000 (the abstract `Geometry` type) are
/// registered to fail.
#[derive(Clone)]
pub struct GeometryFactory {
    readers: HashMap<u32, GeometryReader>,
}

fn read_as<C, T>(factory: &GeometryFactory, reader: &mut ByteReader<'_>) -> Result<AnyGeometry>
where
    C: Coord,
    T: WellKnownBinary + Into<Geometry<C>>,
{
    Ok(C::into_any(T::read_wkb(factory, reader)?.into()))
}

fn read_abstract(_: &GeometryFactory, reader: &mut ByteReader<'_>) -> Result<AnyGeometry> {
    let marker = reader.u8()?;
    reader.set_order(ByteOrder::from_marker(marker)?);
    let code = reader.u32()?;
    Err(bad(format!(
        "cannot instantiate abstract 'Geometry' type (geometry type code {code})"
    )))
}

impl GeometryFactory {
    pub fn new() -> Self {
        let mut factory = Self {
            readers: HashMap::with_capacity(32),
        };
        factory.register_builtins::<Coordinate>();
        factory.register_builtins::<CoordinateZ>();
        factory.register_builtins::<CoordinateM>();
        factory.register_builtins::<CoordinateZM>();
        factory
    }

    fn register_builtins<C: Coord>(&mut self) {
        let d = C::DIMENSION;
        self.register(GeometryType::Geometry.type_code(d), read_abstract);
        self.register(GeometryType::Point.type_code(d), read_as::<C, Point<C>>);
        self.register(GeometryType::LineString.type_code(d), read_as::<C, LineString<C>>);
        self.register(GeometryType::Polygon.type_code(d), read_as::<C, Polygon<C>>);
        self.register(GeometryType::MultiPoint.type_code(d), read_as::<C, MultiPoint<C>>);
        self.register(
            GeometryType::MultiLineString.type_code(d),
            read_as::<C, MultiLineString<C>>,
        );
        self.register(GeometryType::MultiPolygon.type_code(d), read_as::<C, MultiPolygon<C>>);
        self.register(
            GeometryType::GeometryCollection.type_code(d),
            read_as::<C, GeometryCollection<C>>,
        );
    }

    /// Installs `reader` for `type_code`, replacing any previous reader.
    pub fn register(&mut self, type_code: u32, reader: GeometryReader) -> Option<GeometryReader> {
        self.readers.insert(type_code, reader)
    }

    pub fn is_registered(&self, type_code: u32) -> bool {
        self.readers.contains_key(&type_code)
    }

    /// Decodes the geometry at the reader's position, dispatching on its
    /// type code.
    pub fn read(&self, reader: &mut ByteReader<'_>) -> Result<AnyGeometry> {
        if reader.remaining() < WKB_HEADER_SIZE {
            return Err(bad(format!(
                "well-known binary geometry needs at least {WKB_HEADER_SIZE} bytes (byte order marker and type code), {} remaining",
                reader.remaining()
            )));
        }
        let mut peek = reader.clone();
        let marker = peek.u8()?;
        peek.set_order(ByteOrder::from_marker(marker)?);
        let code = peek.u32()?;
        let read = self.readers.get(&code).ok_or_else(|| {
            let mut known: Vec<u32> = self.readers.keys().copied().collect();
            known.sort_unstable();
            bad(format!(
                "unrecognized geometry type code {code}; recognized codes are {known:?}"
            ))
        })?;
        trace!(code, position = reader.position(), "reading geometry");
        read(self, reader)
    }

    /// Decodes exactly one top-level geometry from `bytes`.
    pub fn from_wkb(&self, bytes: &[u8]) -> Result<AnyGeometry> {
        self.decode(bytes)
    }

    /// Decodes exactly one geometry of type `T` from `bytes`. Bytes left
    /// over after the geometry are an error.
    pub fn decode<T: WellKnownBinary>(&self, bytes: &[u8]) -> Result<T> {
        let mut reader = ByteReader::new(bytes, ByteOrder::BigEndian);
        let value = T::read_wkb(self, &mut reader)?;
        if reader.remaining() != 0 {
            return Err(bad(format!(
                "{} trailing bytes after well-known binary geometry",
                reader.remaining()
            )));
        }
        Ok(value)
    }
}

impl Default for GeometryFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for GeometryFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeometryFactory")
            .field("type_codes", &self.readers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use proptest::prelude::*;

    trait ArbitraryCoord: Coord {
        fn strategy() -> BoxedStrategy<Self>;
    }

    fn component() -> impl Strategy<Value = f64> {
        prop_oneof![
            8 => -1.0e9..1.0e9f64,
            1 => Just(f64::NAN),
            1 => prop::num::f64::ANY,
        ]
    }

    impl ArbitraryCoord for Coordinate {
        fn strategy() -> BoxedStrategy<Self> {
            (component(), component())
                .prop_map(|(x, y)| Coordinate::new(x, y))
                .boxed()
        }
    }

    impl ArbitraryCoord for CoordinateZ {
        fn strategy() -> BoxedStrategy<Self> {
            (component(), component(), component())
                .prop_map(|(x, y, z)| CoordinateZ::new(x, y, z))
                .boxed()
        }
    }

    impl ArbitraryCoord for CoordinateM {
        fn strategy() -> BoxedStrategy<Self> {
            (component(), component(), component())
                .prop_map(|(x, y, m)| CoordinateM::new(x, y, m))
                .boxed()
        }
    }

    impl ArbitraryCoord for CoordinateZM {
        fn strategy() -> BoxedStrategy<Self> {
            (component(), component(), component(), component())
                .prop_map(|(x, y, z, m)| CoordinateZM::new(x, y, z, m))
                .boxed()
        }
    }

    fn polygon<C: ArbitraryCoord>() -> BoxedStrategy<Polygon<C>> {
        (
            prop::collection::vec(C::strategy(), 0..6),
            prop::collection::vec(prop::collection::vec(C::strategy(), 0..5), 0..3),
        )
            .prop_map(|(exterior, interiors)| {
                if exterior.is_empty() {
                    Polygon::empty()
                } else {
                    let interiors = interiors.into_iter().map(LinearRing::new).collect();
                    Polygon::new(LinearRing::new(exterior), interiors).unwrap()
                }
            })
            .boxed()
    }

    fn geometry<C: ArbitraryCoord>() -> BoxedStrategy<Geometry<C>> {
        let leaf = prop_oneof![
            C::strategy().prop_map(|c| Geometry::from(Point::new(c))),
            prop::collection::vec(C::strategy(), 0..6)
                .prop_map(|p| Geometry::from(LineString::new(p))),
            polygon::<C>().prop_map(|p| Geometry::from(p)),
            prop::collection::vec(C::strategy().prop_map(Point::new), 0..4)
                .prop_map(|p| Geometry::from(MultiPoint::new(p))),
            prop::collection::vec(
                prop::collection::vec(C::strategy(), 0..4).prop_map(LineString::new),
                0..3
            )
            .prop_map(|l| Geometry::from(MultiLineString::new(l))),
            prop::collection::vec(polygon::<C>(), 0..3)
                .prop_map(|p| Geometry::from(MultiPolygon::new(p))),
        ];
        leaf.prop_recursive(3, 24, 4, |inner| {
            prop::collection::vec(inner, 0..4)
                .prop_map(|members| Geometry::from(GeometryCollection::new(members)))
        })
        .boxed()
    }

    fn order() -> impl Strategy<Value = ByteOrder> {
        prop_oneof![Just(ByteOrder::BigEndian), Just(ByteOrder::LittleEndian)]
    }

    fn round_trip<C: Coord>(g: &Geometry<C>, order: ByteOrder) -> Geometry<C> {
        GeometryFactory::new().decode(&g.to_wkb(order)).unwrap()
    }

    proptest! {
        #[test]
        fn prop_round_trip_xy(g in geometry::<Coordinate>(), o in order()) {
            prop_assert_eq!(round_trip(&g, o), g);
        }

        #[test]
        fn prop_round_trip_z(g in geometry::<CoordinateZ>(), o in order()) {
            prop_assert_eq!(round_trip(&g, o), g);
        }

        #[test]
        fn prop_round_trip_m(g in geometry::<CoordinateM>(), o in order()) {
            prop_assert_eq!(round_trip(&g, o), g);
        }

        #[test]
        fn prop_round_trip_zm(g in geometry::<CoordinateZM>(), o in order()) {
            prop_assert_eq!(round_trip(&g, o), g);
        }

        #[test]
        fn prop_truncation_is_rejected(g in geometry::<CoordinateZ>(), cut in 1usize..64) {
            let bytes = g.to_wkb(ByteOrder::LittleEndian);
            let keep = bytes.len().saturating_sub(cut);
            let err = GeometryFactory::new().from_wkb(&bytes[..keep]).unwrap_err();
            prop_assert!(matches!(err, Error::WellKnownBinaryFormat(_)));
        }
    }

    #[test]
    fn test_point_bit_exact() {
        let point = Point::new(Coordinate::new(1.5, -2.25));
        let bytes = point.to_wkb(ByteOrder::BigEndian);

        let mut expected = vec![0u8];
        expected.extend_from_slice(&1u32.to_be_bytes());
        expected.extend_from_slice(&1.5f64.to_be_bytes());
        expected.extend_from_slice(&(-2.25f64).to_be_bytes());
        assert_eq!(bytes, expected);

        let decoded: Point<Coordinate> = GeometryFactory::new().decode(&bytes).unwrap();
        assert_eq!(decoded.coordinate().x.to_bits(), 1.5f64.to_bits());
        assert_eq!(decoded.coordinate().y.to_bits(), (-2.25f64).to_bits());
    }

    #[test]
    fn test_empty_polygon_writes_zero_rings() {
        let bytes = Polygon::<Coordinate>::empty().to_wkb(ByteOrder::LittleEndian);
        assert_eq!(bytes, [1, 3, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_collection_rejects_member_of_other_dimension() {
        let mut writer = ByteWriter::new(ByteOrder::BigEndian);
        writer.write_u8(0);
        writer.write_u32(1007);
        writer.write_u32(2);
        Point::new(CoordinateZ::new(1.0, 2.0, 3.0)).write_wkb(&mut writer);
        Point::new(Coordinate::new(1.0, 2.0)).write_wkb(&mut writer);

        let err = GeometryFactory::new()
            .from_wkb(&writer.into_inner())
            .unwrap_err();
        match err {
            Error::WellKnownBinaryFormat(msg) => assert!(msg.contains("index 1"), "{msg}"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_nested_byte_orders_are_honoured() {
        let mut writer = ByteWriter::new(ByteOrder::BigEndian);
        writer.write_u8(0);
        writer.write_u32(7);
        writer.write_u32(2);
        writer.set_order(ByteOrder::LittleEndian);
        Point::new(Coordinate::new(3.0, 4.0)).write_wkb(&mut writer);
        writer.set_order(ByteOrder::BigEndian);
        Point::new(Coordinate::new(5.0, 6.0)).write_wkb(&mut writer);

        let decoded: GeometryCollection<Coordinate> =
            GeometryFactory::new().decode(&writer.into_inner()).unwrap();
        assert_eq!(
            decoded.geometries(),
            &[
                Geometry::from(Point::new(Coordinate::new(3.0, 4.0))),
                Geometry::from(Point::new(Coordinate::new(5.0, 6.0))),
            ]
        );
    }

    #[test]
    fn test_abstract_and_unknown_codes_rejected() {
        let factory = GeometryFactory::new();
        for code in [0u32, 1000, 2000, 3000, 8, 4001, 99] {
            let mut bytes = vec![0u8];
            bytes.extend_from_slice(&code.to_be_bytes());
            bytes.extend_from_slice(&[0u8; 16]);
            let err = factory.from_wkb(&bytes).unwrap_err();
            assert!(matches!(err, Error::WellKnownBinaryFormat(_)), "code {code}");
        }
    }

    #[test]
    fn test_abstract_code_read_in_marker_order() {
        let mut bytes = vec![1u8];
        bytes.extend_from_slice(&1000u32.to_le_bytes());
        match GeometryFactory::new().from_wkb(&bytes).unwrap_err() {
            Error::WellKnownBinaryFormat(msg) => assert!(msg.contains("code 1000"), "{msg}"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_header_mismatch_rejected() {
        let bytes = LineString::new(vec![Coordinate::new(0.0, 0.0)]).to_wkb(ByteOrder::BigEndian);
        let err = GeometryFactory::new().decode::<Point<Coordinate>>(&bytes).unwrap_err();
        assert!(matches!(err, Error::WellKnownBinaryFormat(_)));
    }

    #[test]
    fn test_multi_point_rejects_line_member() {
        let mut writer = ByteWriter::new(ByteOrder::BigEndian);
        writer.write_u8(0);
        writer.write_u32(4);
        writer.write_u32(1);
        LineString::new(vec![Coordinate::new(0.0, 0.0)]).write_wkb(&mut writer);
        assert!(GeometryFactory::new().from_wkb(&writer.into_inner()).is_err());
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let mut bytes = Point::new(Coordinate::new(0.0, 0.0)).to_wkb(ByteOrder::BigEndian);
        bytes.push(0);
        assert!(GeometryFactory::new().from_wkb(&bytes).is_err());
    }

    #[test]
    fn test_bad_marker_and_short_buffer() {
        let factory = GeometryFactory::new();
        assert!(factory.from_wkb(&[2, 0, 0, 0, 1]).is_err());
        assert!(factory.from_wkb(&[0, 0, 0]).is_err());
    }

    #[test]
    fn test_deep_nesting_rejected() {
        let mut writer = ByteWriter::new(ByteOrder::BigEndian);
        for _ in 0..200 {
            writer.write_u8(0);
            writer.write_u32(7);
            writer.write_u32(1);
        }
        writer.write_u8(0);
        writer.write_u32(7);
        writer.write_u32(0);
        assert!(GeometryFactory::new().from_wkb(&writer.into_inner()).is_err());
    }

    #[test]
    fn test_registered_reader_overrides_builtin() {
        fn always_origin(_: &GeometryFactory, reader: &mut ByteReader<'_>) -> Result<AnyGeometry> {
            reader.take(WKB_HEADER_SIZE)?;
            Ok(AnyGeometry::Xy(Point::new(Coordinate::new(0.0, 0.0)).into()))
        }

        let mut factory = GeometryFactory::new();
        assert!(!factory.is_registered(17));
        assert!(factory.register(17, always_origin).is_none());

        let mut bytes = vec![0u8];
        bytes.extend_from_slice(&17u32.to_be_bytes());
        let g = factory.from_wkb(&bytes).unwrap();
        assert_eq!(g.geometry_type(), GeometryType::Point);
    }
}

//! GeoPackage binary geometry blobs: a `GP` header followed by WKB.
//!
//! ```text
//! offset  size  field
//! 0       2     magic "GP"
//! 2       1     version (0 = version 1)
//! 3       1     flags
//! 4       4     srs_id (i32, header byte order)
//! 8       8*n   envelope doubles, n in {0, 4, 6, 8}
//! ```
//!
//! Flags: bit 0 header byte order (1 = little-endian), bits 1-3 envelope
//! contents indicator, bit 4 empty geometry, bit 5 extended binary type.

use crate::bytes::{ByteOrder, ByteReader, ByteWriter};
use crate::coordinate::Dimension;
use crate::envelope::Envelope;
use crate::error::{bad, Result};
use crate::geometry::AnyGeometry;
use crate::wkb::{GeometryFactory, WellKnownBinary};

pub const MAGIC: [u8; 2] = *b"GP";
pub const DEFAULT_VERSION: u8 = 0;
/// Header size without envelope.
pub const MIN_HEADER_SIZE: usize = 8;

const FLAG_LITTLE_ENDIAN: u8 = 0b0000_0001;
const FLAG_ENVELOPE_MASK: u8 = 0b0000_1110;
const FLAG_EMPTY: u8 = 0b0001_0000;
const FLAG_EXTENDED: u8 = 0b0010_0000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryType {
    /// The body is plain WKB.
    Standard,
    /// The body uses an extension encoding; not decodable here.
    Extended,
}

/// Which bounds follow the srs id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnvelopeContents {
    NoEnvelope = 0,
    Xy = 1,
    Xyz = 2,
    Xym = 3,
    Xyzm = 4,
}

impl EnvelopeContents {
    pub fn from_code(code: u8) -> Result<Self> {
        Ok(match code {
            0 => EnvelopeContents::NoEnvelope,
            1 => EnvelopeContents::Xy,
            2 => EnvelopeContents::Xyz,
            3 => EnvelopeContents::Xym,
            4 => EnvelopeContents::Xyzm,
            x => return Err(bad(format!("invalid envelope contents indicator {x}"))),
        })
    }

    #[inline]
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Number of doubles in the header envelope.
    pub fn array_size(self) -> usize {
        match self {
            EnvelopeContents::NoEnvelope => 0,
            EnvelopeContents::Xy => 4,
            EnvelopeContents::Xyz | EnvelopeContents::Xym => 6,
            EnvelopeContents::Xyzm => 8,
        }
    }

    pub fn dimension(self) -> Option<Dimension> {
        match self {
            EnvelopeContents::NoEnvelope => None,
            EnvelopeContents::Xy => Some(Dimension::Xy),
            EnvelopeContents::Xyz => Some(Dimension::Xyz),
            EnvelopeContents::Xym => Some(Dimension::Xym),
            EnvelopeContents::Xyzm => Some(Dimension::Xyzm),
        }
    }

    /// Indicator for storing `envelope`; empty envelopes are not stored.
    pub fn for_envelope(envelope: &Envelope) -> Self {
        if envelope.is_empty() {
            return EnvelopeContents::NoEnvelope;
        }
        match envelope.dimension() {
            Dimension::Xy => EnvelopeContents::Xy,
            Dimension::Xyz => EnvelopeContents::Xyz,
            Dimension::Xym => EnvelopeContents::Xym,
            Dimension::Xyzm => EnvelopeContents::Xyzm,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BinaryHeader {
    version: u8,
    binary_type: BinaryType,
    empty: bool,
    byte_order: ByteOrder,
    srs_id: i32,
    envelope_contents: EnvelopeContents,
    envelope: Option<Envelope>,
}

impl BinaryHeader {
    /// An empty `envelope` is stored as "no envelope".
    pub fn new(
        version: u8,
        binary_type: BinaryType,
        empty: bool,
        byte_order: ByteOrder,
        srs_id: i32,
        envelope: Option<Envelope>,
    ) -> Self {
        let envelope = envelope.filter(|e| !e.is_empty());
        Self {
            version,
            binary_type,
            empty,
            byte_order,
            srs_id,
            envelope_contents: envelope
                .as_ref()
                .map_or(EnvelopeContents::NoEnvelope, EnvelopeContents::for_envelope),
            envelope,
        }
    }

    /// Big-endian standard header describing `geometry`.
    pub fn for_geometry(geometry: &AnyGeometry, srs_id: i32) -> Self {
        Self::new(
            DEFAULT_VERSION,
            BinaryType::Standard,
            geometry.is_empty(),
            ByteOrder::BigEndian,
            srs_id,
            Some(geometry.envelope()),
        )
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn binary_type(&self) -> BinaryType {
        self.binary_type
    }

    pub fn is_empty(&self) -> bool {
        self.empty
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    pub fn srs_id(&self) -> i32 {
        self.srs_id
    }

    pub fn envelope(&self) -> Option<&Envelope> {
        self.envelope.as_ref()
    }

    /// The indicator as stored in the flags. A parsed header keeps it even
    /// when every envelope value is NaN.
    pub fn envelope_contents(&self) -> EnvelopeContents {
        self.envelope_contents
    }

    pub fn flags(&self) -> u8 {
        let mut flags = self.envelope_contents.code() << 1;
        if self.byte_order == ByteOrder::LittleEndian {
            flags |= FLAG_LITTLE_ENDIAN;
        }
        if self.empty {
            flags |= FLAG_EMPTY;
        }
        if self.binary_type == BinaryType::Extended {
            flags |= FLAG_EXTENDED;
        }
        flags
    }

    /// Encoded header length in bytes.
    pub fn byte_size(&self) -> usize {
        MIN_HEADER_SIZE + 8 * self.envelope_contents.array_size()
    }

    /// Parses the header at the start of `bytes`.
    pub fn read(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < MIN_HEADER_SIZE {
            return Err(bad(format!(
                "GeoPackage binary header needs at least {MIN_HEADER_SIZE} bytes, got {}",
                bytes.len()
            )));
        }
        if bytes[..2] != MAGIC {
            return Err(bad("GeoPackage binary header must start with 'G', 'P'"));
        }
        let version = bytes[2];
        let flags = bytes[3];
        let byte_order = if flags & FLAG_LITTLE_ENDIAN == 0 {
            ByteOrder::BigEndian
        } else {
            ByteOrder::LittleEndian
        };
        let contents = EnvelopeContents::from_code((flags & FLAG_ENVELOPE_MASK) >> 1)?;

        let mut reader = ByteReader::new(&bytes[4..], byte_order);
        let srs_id = reader.i32()?;
        reader
            .need(8 * contents.array_size())
            .map_err(|_| bad("GeoPackage binary header is shorter than its envelope indicator implies"))?;
        let mut values = Vec::with_capacity(contents.array_size());
        for _ in 0..contents.array_size() {
            values.push(reader.f64()?);
        }
        let envelope = contents
            .dimension()
            .and_then(|d| Envelope::from_array(d, &values));

        Ok(Self {
            version,
            binary_type: if flags & FLAG_EXTENDED == 0 {
                BinaryType::Standard
            } else {
                BinaryType::Extended
            },
            empty: flags & FLAG_EMPTY != 0,
            byte_order,
            srs_id,
            envelope_contents: contents,
            envelope,
        })
    }

    pub fn write(&self, writer: &mut ByteWriter) {
        writer.set_order(self.byte_order);
        writer.write_bytes(&MAGIC);
        writer.write_u8(self.version);
        writer.write_u8(self.flags());
        writer.write_i32(self.srs_id);
        if let Some(envelope) = &self.envelope {
            for v in envelope.to_array() {
                writer.write_f64(v);
            }
        }
    }
}

/// A decoded GeoPackage geometry column value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeoPackageGeometry {
    pub header: BinaryHeader,
    pub geometry: AnyGeometry,
}

/// Encodes `geometry` as a big-endian header and big-endian WKB body.
pub fn write_blob(geometry: &AnyGeometry, srs_id: i32) -> Vec<u8> {
    let header = BinaryHeader::for_geometry(geometry, srs_id);
    let mut writer = ByteWriter::new(ByteOrder::BigEndian);
    header.write(&mut writer);
    writer.set_order(ByteOrder::BigEndian);
    geometry.write_wkb(&mut writer);
    writer.into_inner()
}

/// Decodes a GeoPackage geometry blob. Extended binary types are rejected.
pub fn read_blob(factory: &GeometryFactory, bytes: &[u8]) -> Result<GeoPackageGeometry> {
    let header = BinaryHeader::read(bytes)?;
    if header.binary_type() == BinaryType::Extended {
        return Err(bad("extended GeoPackage geometry encodings are not supported"));
    }
    let geometry = factory.from_wkb(&bytes[header.byte_size()..])?;
    Ok(GeoPackageGeometry { header, geometry })
}

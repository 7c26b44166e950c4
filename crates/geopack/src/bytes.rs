//! Byte-order aware cursor and sink used by the WKB and GeoPackage codecs.

use crate::error::{bad, Result};

/// Byte order of a WKB geometry or GeoPackage binary header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ByteOrder {
    /// Network order; marker byte `0`.
    #[default]
    BigEndian,
    /// Marker byte `1`.
    LittleEndian,
}

impl ByteOrder {
    /// Decodes a WKB byte-order marker.
    pub fn from_marker(marker: u8) -> Result<Self> {
        match marker {
            0 => Ok(ByteOrder::BigEndian),
            1 => Ok(ByteOrder::LittleEndian),
            x => Err(bad(format!("unknown byte order marker {x}"))),
        }
    }

    #[inline]
    pub fn marker(self) -> u8 {
        match self {
            ByteOrder::BigEndian => 0,
            ByteOrder::LittleEndian => 1,
        }
    }
}

/// Read cursor over a contiguous byte slice.
///
/// The byte order can change mid-stream: every WKB geometry (including
/// nested ones) carries its own marker.
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    buf: &'a [u8],
    position: usize,
    order: ByteOrder,
    depth: u32,
}

/// Deepest nesting of geometry collections accepted on read.
pub const MAX_NESTING_DEPTH: u32 = 64;

impl<'a> ByteReader<'a> {
    pub fn new(buf: &'a [u8], order: ByteOrder) -> Self {
        Self {
            buf,
            position: 0,
            order,
            depth: 0,
        }
    }

    #[inline]
    pub fn order(&self) -> ByteOrder {
        self.order
    }

    #[inline]
    pub fn set_order(&mut self, order: ByteOrder) {
        self.order = order;
    }

    #[inline]
    pub fn position(&self) -> usize {
        self.position
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.position
    }

    #[inline(always)]
    pub fn need(&self, want: usize) -> Result<()> {
        if self.remaining() < want {
            Err(bad(format!(
                "truncated buffer: needed {want} bytes at offset {}, {} remaining",
                self.position,
                self.remaining()
            )))
        } else {
            Ok(())
        }
    }

    #[inline(always)]
    pub fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        self.need(n)?;
        let head = &self.buf[self.position..self.position + n];
        self.position += n;
        Ok(head)
    }

    #[inline(always)]
    fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    #[inline(always)]
    pub fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    #[inline(always)]
    pub fn u32(&mut self) -> Result<u32> {
        let b = self.array::<4>()?;
        Ok(match self.order {
            ByteOrder::BigEndian => u32::from_be_bytes(b),
            ByteOrder::LittleEndian => u32::from_le_bytes(b),
        })
    }

    #[inline(always)]
    pub fn i32(&mut self) -> Result<i32> {
        let b = self.array::<4>()?;
        Ok(match self.order {
            ByteOrder::BigEndian => i32::from_be_bytes(b),
            ByteOrder::LittleEndian => i32::from_le_bytes(b),
        })
    }

    #[inline(always)]
    pub fn f64(&mut self) -> Result<f64> {
        let b = self.array::<8>()?;
        Ok(match self.order {
            ByteOrder::BigEndian => f64::from_be_bytes(b),
            ByteOrder::LittleEndian => f64::from_le_bytes(b),
        })
    }

    /// Enters one level of collection nesting.
    pub(crate) fn descend(&mut self) -> Result<()> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(bad(format!(
                "geometry collections nested deeper than {MAX_NESTING_DEPTH} levels"
            )));
        }
        self.depth += 1;
        Ok(())
    }

    pub(crate) fn ascend(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    /// Upper bound for pre-allocating `count` records of at least
    /// `min_record` bytes each, so a corrupt count cannot force a huge
    /// allocation.
    #[inline]
    pub(crate) fn capacity_for(&self, count: u32, min_record: usize) -> usize {
        (count as usize).min(self.remaining() / min_record.max(1))
    }
}

/// Growable output buffer with a configurable byte order.
#[derive(Debug, Clone, Default)]
pub struct ByteWriter {
    buf: Vec<u8>,
    order: ByteOrder,
}

impl ByteWriter {
    pub fn new(order: ByteOrder) -> Self {
        Self {
            buf: Vec::with_capacity(32),
            order,
        }
    }

    #[inline]
    pub fn order(&self) -> ByteOrder {
        self.order
    }

    #[inline]
    pub fn set_order(&mut self, order: ByteOrder) {
        self.order = order;
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    #[inline]
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    #[inline]
    pub fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    #[inline]
    pub fn write_u32(&mut self, v: u32) {
        match self.order {
            ByteOrder::BigEndian => self.buf.extend_from_slice(&v.to_be_bytes()),
            ByteOrder::LittleEndian => self.buf.extend_from_slice(&v.to_le_bytes()),
        }
    }

    #[inline]
    pub fn write_i32(&mut self, v: i32) {
        match self.order {
            ByteOrder::BigEndian => self.buf.extend_from_slice(&v.to_be_bytes()),
            ByteOrder::LittleEndian => self.buf.extend_from_slice(&v.to_le_bytes()),
        }
    }

    #[inline]
    pub fn write_f64(&mut self, v: f64) {
        match self.order {
            ByteOrder::BigEndian => self.buf.extend_from_slice(&v.to_be_bytes()),
            ByteOrder::LittleEndian => self.buf.extend_from_slice(&v.to_le_bytes()),
        }
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }
}

// Property schemas and presence bitmaps.
//
// A schema is the ordered property list declared once in the file
// metadata. Position `i` in the schema is bit `i` of every record's
// presence bitmap, so the order is never changed after reading.

use std::io::{self, Write};

use crate::cursor::ByteCursor;
use crate::error::{Error, Result};
use crate::oab::props::PropertyId;

/// Separator used by `export_string` / `parse_string`.
pub const SCHEMA_SEPARATOR: char = ';';

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertySchema {
    ids: Vec<PropertyId>,
}

impl PropertySchema {
    pub fn new(ids: Vec<PropertyId>) -> Self {
        Self { ids }
    }

    /// Read `{count:u32}` followed by `count` `{id:u32, flags:u32}` pairs.
    /// The flags carry server-side search hints and are dropped.
    pub fn read(cursor: &mut ByteCursor<'_>) -> Result<Self> {
        let count = cursor.read_u32_le()? as usize;
        // Each entry is 8 bytes; refuse counts the buffer cannot hold before
        // allocating for them.
        let needed = count.saturating_mul(8);
        let available = cursor.remaining().len();
        if needed > available {
            return Err(Error::Truncated {
                offset: cursor.position(),
                needed: needed - available,
            });
        }
        let mut ids = Vec::with_capacity(count);
        for _ in 0..count {
            let id = cursor.read_u32_le()?;
            let _flags = cursor.read_u32_le()?;
            ids.push(PropertyId(id));
        }
        Ok(Self { ids })
    }

    /// Write the schema in the form `read` accepts, with zero flags.
    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        let count = u32::try_from(self.ids.len())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "schema too large"))?;
        w.write_all(&count.to_le_bytes())?;
        for id in &self.ids {
            w.write_all(&id.raw().to_le_bytes())?;
            w.write_all(&0u32.to_le_bytes())?;
        }
        Ok(())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    #[inline]
    pub fn ids(&self) -> &[PropertyId] {
        &self.ids
    }

    pub fn iter(&self) -> impl Iterator<Item = PropertyId> + '_ {
        self.ids.iter().copied()
    }

    /// Bytes in this schema's presence bitmap.
    #[inline]
    pub fn bitmap_len(&self) -> usize {
        PresenceBitmap::byte_len(self.ids.len())
    }

    /// Decimal ids joined by `;`.
    pub fn export_string(&self) -> String {
        let mut out = String::with_capacity(self.ids.len() * 11);
        for (i, id) in self.ids.iter().enumerate() {
            if i > 0 {
                out.push(SCHEMA_SEPARATOR);
            }
            out.push_str(&id.raw().to_string());
        }
        out
    }

    /// Inverse of `export_string`. Empty pieces (including a trailing `;`)
    /// are skipped; an empty result is rejected.
    pub fn parse_string(s: &str) -> Result<Self> {
        let ids = s
            .split(SCHEMA_SEPARATOR)
            .map(str::trim)
            .filter(|piece| !piece.is_empty())
            .map(|piece| {
                if !piece.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(Error::format(format!(
                        "schema entry {piece:?} is not a decimal property id"
                    )));
                }
                piece.parse::<u32>().map(PropertyId).map_err(|e| {
                    Error::format(format!("schema entry {piece:?} out of range: {e}"))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        if ids.is_empty() {
            return Err(Error::format("schema string lists no properties"));
        }
        Ok(Self { ids })
    }
}

// ---------------------------------------------------------------------------
// Presence bitmap
// ---------------------------------------------------------------------------

/// Borrowed view of a record's presence bits. Bits are MSB-first per byte.
#[derive(Debug, Clone, Copy)]
pub struct PresenceBitmap<'a> {
    bytes: &'a [u8],
}

impl<'a> PresenceBitmap<'a> {
    #[inline]
    pub const fn byte_len(properties: usize) -> usize {
        properties.div_ceil(8)
    }

    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    /// Out-of-range bits read as absent.
    #[inline]
    pub fn is_set(&self, i: usize) -> bool {
        self.bytes
            .get(i / 8)
            .is_some_and(|&b| (b << (i % 8)) & 0x80 != 0)
    }

    pub fn encode(bits: &[bool]) -> Vec<u8> {
        let mut out = vec![0u8; Self::byte_len(bits.len())];
        for (i, _) in bits.iter().enumerate().filter(|(_, set)| **set) {
            out[i / 8] |= 0x80 >> (i % 8);
        }
        out
    }
}

// Property values and their wire encoding.

use std::io::{self, Write};

use crate::cursor::ByteCursor;
use crate::error::{Error, Result};
use crate::oab::props::{PropType, PropertyId};
use crate::oab::varint;

/// One decoded property value. Multi-valued variants keep wire order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Int32(u32),
    Bool(bool),
    String8(String),
    Unicode(String),
    Binary(Vec<u8>),
    MultiInt32(Vec<u32>),
    MultiString8(Vec<String>),
    MultiUnicode(Vec<String>),
    MultiBinary(Vec<Vec<u8>>),
}

impl Value {
    pub fn prop_type(&self) -> PropType {
        match self {
            Self::Int32(_) => PropType::Int32,
            Self::Bool(_) => PropType::Bool,
            Self::String8(_) => PropType::String8,
            Self::Unicode(_) => PropType::Unicode,
            Self::Binary(_) => PropType::Binary,
            Self::MultiInt32(_) => PropType::MultiInt32,
            Self::MultiString8(_) => PropType::MultiString8,
            Self::MultiUnicode(_) => PropType::MultiUnicode,
            Self::MultiBinary(_) => PropType::MultiBinary,
        }
    }

    /// Text of a scalar string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String8(s) | Self::Unicode(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Self::Int32(v) => Some(*v),
            _ => None,
        }
    }

    /// Re-encode this value in wire form.
    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        match self {
            Self::Int32(v) => w.write_all(&v.to_le_bytes()),
            Self::Bool(b) => w.write_all(&[u8::from(*b)]),
            Self::String8(s) | Self::Unicode(s) => write_cstr(w, s),
            Self::Binary(b) => write_blob(w, b),
            Self::MultiInt32(items) => {
                write_count(w, items.len())?;
                items.iter().try_for_each(|v| w.write_all(&v.to_le_bytes()))
            }
            Self::MultiString8(items) | Self::MultiUnicode(items) => {
                write_count(w, items.len())?;
                items.iter().try_for_each(|s| write_cstr(w, s))
            }
            Self::MultiBinary(items) => {
                write_count(w, items.len())?;
                items.iter().try_for_each(|b| write_blob(w, b))
            }
        }
    }
}

fn write_cstr<W: Write>(w: &mut W, s: &str) -> io::Result<()> {
    w.write_all(s.as_bytes())?;
    w.write_all(&[0])
}

fn write_blob<W: Write>(w: &mut W, b: &[u8]) -> io::Result<()> {
    write_count(w, b.len())?;
    w.write_all(b)
}

fn write_count<W: Write>(w: &mut W, n: usize) -> io::Result<()> {
    let n = u32::try_from(n)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "length exceeds u32"))?;
    varint::write_u32(w, n)
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Wire form of `Int32` values and `MultiInt32` items.
///
/// Files written by Exchange varint-encode them; `Fixed` reads four
/// little-endian bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Int32Encoding {
    #[default]
    Fixed,
    Varint,
}

/// Decode the value of `id` at the cursor, with fixed-width integers.
///
/// `Object` properties have no wire representation; callers must skip them
/// before getting here.
pub fn decode_value(cursor: &mut ByteCursor<'_>, id: PropertyId) -> Result<Value> {
    decode_value_as(cursor, id, Int32Encoding::Fixed)
}

/// [`decode_value`] with an explicit integer encoding.
pub fn decode_value_as(
    cursor: &mut ByteCursor<'_>,
    id: PropertyId,
    int32: Int32Encoding,
) -> Result<Value> {
    let ty = id
        .prop_type()
        .ok_or(Error::UnsupportedPropertyType { id: id.raw() })?;
    Ok(match ty {
        PropType::Int32 => Value::Int32(read_int32(cursor, int32)?),
        PropType::Bool => Value::Bool(cursor.read_u8()? != 0),
        PropType::String8 => Value::String8(read_string(cursor)?),
        PropType::Unicode => Value::Unicode(read_string(cursor)?),
        PropType::Binary => Value::Binary(read_blob(cursor)?),
        PropType::MultiInt32 => {
            Value::MultiInt32(read_list(cursor, |c| read_int32(c, int32))?)
        }
        PropType::MultiString8 => Value::MultiString8(read_list(cursor, read_string)?),
        PropType::MultiUnicode => Value::MultiUnicode(read_list(cursor, read_string)?),
        PropType::MultiBinary => Value::MultiBinary(read_list(cursor, read_blob)?),
        PropType::Object => {
            return Err(Error::format(format!(
                "object property {id} has no wire value"
            )));
        }
    })
}

fn read_int32(cursor: &mut ByteCursor<'_>, encoding: Int32Encoding) -> Result<u32> {
    match encoding {
        Int32Encoding::Fixed => cursor.read_u32_le(),
        Int32Encoding::Varint => cursor.read_varint(),
    }
}

fn read_string(cursor: &mut ByteCursor<'_>) -> Result<String> {
    let bytes = cursor.read_until(0)?;
    Ok(String::from_utf8_lossy(bytes).into_owned())
}

fn read_blob(cursor: &mut ByteCursor<'_>) -> Result<Vec<u8>> {
    let len = cursor.read_varint()? as usize;
    Ok(cursor.read_exact(len)?.to_vec())
}

fn read_list<'a, T>(
    cursor: &mut ByteCursor<'a>,
    mut item: impl FnMut(&mut ByteCursor<'a>) -> Result<T>,
) -> Result<Vec<T>> {
    let count = cursor.read_varint()? as usize;
    // Every item takes at least one byte, so cap the preallocation by what
    // is left in the buffer.
    let mut out = Vec::with_capacity(count.min(cursor.remaining().len()));
    for _ in 0..count {
        out.push(item(cursor)?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::oab::props::*;

    fn decode(bytes: &[u8], id: PropertyId) -> Result<Value> {
        decode_value(&mut ByteCursor::new(bytes), id)
    }

    #[test]
    fn scalars() {
        assert_eq!(
            decode(&[0x2A, 0, 0, 0], PT_DISPLAY_TYPE).unwrap(),
            Value::Int32(42)
        );
        assert_eq!(
            decode(&[1], PropertyId(0x3A40_000B)).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            decode(b"Ann\0rest", PT_DISPLAY_NAME).unwrap(),
            Value::Unicode("Ann".into())
        );
        assert_eq!(
            decode(&[3, 9, 8, 7], PT_THUMBNAIL_PHOTO).unwrap(),
            Value::Binary(vec![9, 8, 7])
        );
    }

    #[test]
    fn multi_valued_keep_order() {
        assert_eq!(
            decode(b"\x02+1 555\0+1 556\0", PT_BUS_TEL_NUMBERS).unwrap(),
            Value::MultiUnicode(vec!["+1 555".into(), "+1 556".into()])
        );
        assert_eq!(
            decode(&[2, 1, 0xAA, 2, 0xBB, 0xCC], PT_X509_CERTIFICATE).unwrap(),
            Value::MultiBinary(vec![vec![0xAA], vec![0xBB, 0xCC]])
        );
        assert_eq!(
            decode(&[0], PT_PROXY_ADDRESSES).unwrap(),
            Value::MultiUnicode(vec![])
        );
    }

    #[test]
    fn invalid_utf8_is_lossy() {
        let v = decode(b"a\xFFb\0", PT_DISPLAY_NAME).unwrap();
        assert_eq!(v.as_str(), Some("a\u{FFFD}b"));
    }

    #[test]
    fn unknown_type_is_format() {
        let err = decode(&[0; 8], PropertyId(0x1234_0040)).unwrap_err();
        assert!(matches!(err, Error::UnsupportedPropertyType { id: 0x1234_0040 }));
        assert_eq!(err.kind(), ErrorKind::Format);
    }

    #[test]
    fn short_blob_is_io() {
        let err = decode(&[5, 1, 2], PT_THUMBNAIL_PHOTO).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn varint_integers() {
        let mut c = ByteCursor::new(&[0x2A, 0x82, 0x01, 0x00, 0x02, 0x05, 0x82, 0x10, 0x27]);
        assert_eq!(
            decode_value_as(&mut c, PT_DISPLAY_TYPE, Int32Encoding::Varint).unwrap(),
            Value::Int32(42)
        );
        assert_eq!(
            decode_value_as(&mut c, PT_OAB_SEQUENCE, Int32Encoding::Varint).unwrap(),
            Value::Int32(1)
        );
        let multi = PropertyId(0x8000_1003);
        assert_eq!(
            decode_value_as(&mut c, multi, Int32Encoding::Varint).unwrap(),
            Value::MultiInt32(vec![5, 10000])
        );
        assert!(c.remaining().is_empty());

        // The same bytes read fixed-width give a different value.
        assert_eq!(
            decode(&[0x2A, 0x82, 0x01, 0x00], PT_DISPLAY_TYPE).unwrap(),
            Value::Int32(0x0001_822A)
        );
    }

    #[test]
    fn write_then_decode() {
        let values = [
            (PT_DISPLAY_TYPE, Value::Int32(0x0102_0304)),
            (PT_DISPLAY_NAME, Value::Unicode("Zoë".into())),
            (PT_OAB_DN, Value::String8("/o=Org".into())),
            (PT_THUMBNAIL_PHOTO, Value::Binary(vec![0u8; 300])),
            (PropertyId(0x8000_1003), Value::MultiInt32(vec![1, 2, 3])),
        ];
        for (id, v) in values {
            let mut buf = Vec::new();
            v.write_to(&mut buf).unwrap();
            let mut c = ByteCursor::new(&buf);
            assert_eq!(decode_value(&mut c, id).unwrap(), v);
            assert!(c.remaining().is_empty(), "{id} left bytes behind");
        }
    }
}

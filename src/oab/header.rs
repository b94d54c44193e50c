// OAB v4 file header and the header pseudo-record.

use std::io::{self, Write};

use log::debug;

use crate::cursor::ByteCursor;
use crate::error::{Error, Result};
use crate::oab::props::{
    PT_OAB_CONTAINER_GUID, PT_OAB_DN, PT_OAB_NAME, PT_OAB_SEQUENCE, PropertyId,
};
use crate::oab::value::Value;

/// The only plaintext version this decoder understands.
pub const OAB_VERSION: u32 = 0x0000_0020;

/// Size of [`FileHeader`] on the wire.
pub const FILE_HEADER_SIZE: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHeader {
    pub version: u32,
    pub serial: u32,
    pub total_records: u32,
}

impl FileHeader {
    pub fn new(serial: u32, total_records: u32) -> Self {
        Self {
            version: OAB_VERSION,
            serial,
            total_records,
        }
    }

    pub fn read(cursor: &mut ByteCursor<'_>) -> Result<Self> {
        let version = cursor.read_u32_le()?;
        if version != OAB_VERSION {
            return Err(Error::format(format!(
                "unsupported OAB version {version:#010X} (expected {OAB_VERSION:#010X})"
            )));
        }
        let serial = cursor.read_u32_le()?;
        let total_records = cursor.read_u32_le()?;
        debug!("OAB v4 header: serial={serial:#010X} records={total_records}");
        Ok(Self {
            version,
            serial,
            total_records,
        })
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(&self.version.to_le_bytes())?;
        w.write_all(&self.serial.to_le_bytes())?;
        w.write_all(&self.total_records.to_le_bytes())
    }
}

/// Properties of the header pseudo-record that describe the address list
/// itself rather than any contact.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderRecord {
    pub name: Option<String>,
    pub sequence: Option<u32>,
    pub container_guid: Option<String>,
    pub dn: Option<String>,
    /// Every present property, well-known or not, in schema order.
    pub properties: Vec<(PropertyId, Value)>,
}

impl HeaderRecord {
    pub fn from_properties(properties: Vec<(PropertyId, Value)>) -> Self {
        let mut out = Self::default();
        for (id, value) in &properties {
            let text = || value.as_str().map(str::to_owned);
            match id.tag() {
                t if t == PT_OAB_NAME.tag() => out.name = text(),
                t if t == PT_OAB_SEQUENCE.tag() => out.sequence = value.as_u32(),
                t if t == PT_OAB_CONTAINER_GUID.tag() => out.container_guid = text(),
                t if t == PT_OAB_DN.tag() => out.dn = text(),
                _ => {}
            }
        }
        out.properties = properties;
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn header_roundtrip() {
        let hdr = FileHeader::new(0xDEAD_BEEF, 42);
        let mut buf = Vec::new();
        hdr.write_to(&mut buf).unwrap();
        assert_eq!(buf.len(), FILE_HEADER_SIZE);
        assert_eq!(&buf[..4], &[0x20, 0, 0, 0]);
        assert_eq!(FileHeader::read(&mut ByteCursor::new(&buf)).unwrap(), hdr);
    }

    #[test]
    fn wrong_version_is_format() {
        let mut buf = Vec::new();
        FileHeader {
            version: 0x17,
            serial: 1,
            total_records: 0,
        }
        .write_to(&mut buf)
        .unwrap();
        let err = FileHeader::read(&mut ByteCursor::new(&buf)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
    }

    #[test]
    fn header_record_picks_known_properties() {
        let rec = HeaderRecord::from_properties(vec![
            (PT_OAB_NAME, Value::Unicode("\\Global Address List".into())),
            (PT_OAB_SEQUENCE, Value::Int32(77)),
            (PT_OAB_DN, Value::String8("/o=Org/cn=gal".into())),
            (PropertyId(0x6805_0003), Value::Int32(1)),
        ]);
        assert_eq!(rec.name.as_deref(), Some("\\Global Address List"));
        assert_eq!(rec.sequence, Some(77));
        assert_eq!(rec.container_guid, None);
        assert_eq!(rec.dn.as_deref(), Some("/o=Org/cn=gal"));
        assert_eq!(rec.properties.len(), 4);
    }
}

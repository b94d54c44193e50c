// MAPI property identifiers as they appear in OAB schemas.
//
// A property id packs a semantic tag into the high 16 bits and a wire type
// into the low 16 bits. The decoder only ever interprets the type; the tag
// is looked up in the field map.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PropertyId(pub u32);

impl PropertyId {
    #[inline]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Wire type tag (low 16 bits).
    #[inline]
    pub const fn prop_type_tag(self) -> u16 {
        (self.0 & 0xFFFF) as u16
    }

    /// Semantic tag (high 16 bits).
    #[inline]
    pub const fn tag(self) -> u16 {
        (self.0 >> 16) as u16
    }

    /// `None` when the low 16 bits name a type this decoder cannot size.
    #[inline]
    pub fn prop_type(self) -> Option<PropType> {
        PropType::from_tag(self.prop_type_tag())
    }
}

impl From<u32> for PropertyId {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

impl fmt::Display for PropertyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08X}", self.0)
    }
}

/// Wire types a schema entry can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum PropType {
    Int32 = 0x0003,
    Bool = 0x000B,
    /// Occupies a schema slot but never carries bytes on the wire.
    Object = 0x000D,
    String8 = 0x001E,
    Unicode = 0x001F,
    Binary = 0x0102,
    MultiInt32 = 0x1003,
    MultiString8 = 0x101E,
    MultiUnicode = 0x101F,
    MultiBinary = 0x1102,
}

/// Flag distinguishing multi-valued types from their scalar base.
pub const MV_FLAG: u16 = 0x1000;

impl PropType {
    pub const fn from_tag(tag: u16) -> Option<Self> {
        Some(match tag {
            0x0003 => Self::Int32,
            0x000B => Self::Bool,
            0x000D => Self::Object,
            0x001E => Self::String8,
            0x001F => Self::Unicode,
            0x0102 => Self::Binary,
            0x1003 => Self::MultiInt32,
            0x101E => Self::MultiString8,
            0x101F => Self::MultiUnicode,
            0x1102 => Self::MultiBinary,
            _ => return None,
        })
    }

    #[inline]
    pub const fn tag(self) -> u16 {
        self as u16
    }

    #[inline]
    pub const fn is_multi(self) -> bool {
        self.tag() & MV_FLAG != 0
    }
}

// ---------------------------------------------------------------------------
// Well-known property ids
// ---------------------------------------------------------------------------

// Addressing and identity.
pub const PT_SMTP_ADDRESS: PropertyId = PropertyId(0x39FE_001F);
pub const PT_DISPLAY_NAME: PropertyId = PropertyId(0x3001_001F);
pub const PT_ACCOUNT: PropertyId = PropertyId(0x3A00_001F);
pub const PT_SURNAME: PropertyId = PropertyId(0x3A11_001F);
pub const PT_GIVEN_NAME: PropertyId = PropertyId(0x3A06_001F);
pub const PT_PROXY_ADDRESSES: PropertyId = PropertyId(0x800F_101F);
pub const PT_COMMENT: PropertyId = PropertyId(0x3004_001F);

// Telephony.
pub const PT_BUS_TEL_NUMBER: PropertyId = PropertyId(0x3A08_001F);
pub const PT_HOME_TEL_NUMBER: PropertyId = PropertyId(0x3A09_001F);
pub const PT_BUS_TEL_NUMBERS: PropertyId = PropertyId(0x3A1B_101F);
pub const PT_HOME_TEL_NUMBERS: PropertyId = PropertyId(0x3A2F_101F);
pub const PT_MOBILE_TEL_NUMBER: PropertyId = PropertyId(0x3A1C_001F);
pub const PT_PRIMARY_FAX_NUMBER: PropertyId = PropertyId(0x3A23_001F);
pub const PT_ASSISTANT_TEL_NUMBER: PropertyId = PropertyId(0x3A2E_001F);
pub const PT_PAGER_TEL_NUMBER: PropertyId = PropertyId(0x3A21_001F);

// Organisation.
pub const PT_TITLE: PropertyId = PropertyId(0x3A17_001F);
pub const PT_COMPANY_NAME: PropertyId = PropertyId(0x3A16_001F);
pub const PT_ASSISTANT: PropertyId = PropertyId(0x3A30_001F);
pub const PT_DEPARTMENT_NAME: PropertyId = PropertyId(0x3A18_001F);
pub const PT_OFFICE_LOCATION: PropertyId = PropertyId(0x3A19_001F);

// Postal address components; folded into one composite field.
pub const PT_STREET_ADDRESS: PropertyId = PropertyId(0x3A29_001F);
pub const PT_LOCALITY: PropertyId = PropertyId(0x3A27_001F);
pub const PT_STATE_OR_PROVINCE: PropertyId = PropertyId(0x3A28_001F);
pub const PT_POSTAL_CODE: PropertyId = PropertyId(0x3A2A_001F);
pub const PT_COUNTRY: PropertyId = PropertyId(0x3A26_001F);

// Binary payloads.
pub const PT_THUMBNAIL_PHOTO: PropertyId = PropertyId(0x8C9E_0102);
pub const PT_X509_CERTIFICATE: PropertyId = PropertyId(0x8C6A_1102);

// Record kind.
pub const PT_DISPLAY_TYPE: PropertyId = PropertyId(0x3900_0003);
pub const PT_DISPLAY_TYPE_EX: PropertyId = PropertyId(0x3905_0003);

// Header pseudo-record.
pub const PT_OAB_NAME: PropertyId = PropertyId(0x6800_001F);
pub const PT_OAB_SEQUENCE: PropertyId = PropertyId(0x6801_0003);
pub const PT_OAB_CONTAINER_GUID: PropertyId = PropertyId(0x6802_001E);
pub const PT_OAB_DN: PropertyId = PropertyId(0x6804_001E);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_tag_and_type() {
        assert_eq!(PT_SMTP_ADDRESS.tag(), 0x39FE);
        assert_eq!(PT_SMTP_ADDRESS.prop_type(), Some(PropType::Unicode));
        assert_eq!(PT_X509_CERTIFICATE.prop_type(), Some(PropType::MultiBinary));
        assert_eq!(PropertyId(0x1234_0040).prop_type(), None);
    }

    #[test]
    fn multi_flag() {
        assert!(PropType::MultiInt32.is_multi());
        assert!(PropType::MultiUnicode.is_multi());
        assert!(!PropType::Binary.is_multi());
        assert!(!PropType::Object.is_multi());
    }

    #[test]
    fn display_is_fixed_width_hex() {
        assert_eq!(PropertyId(0x3A08_001F).to_string(), "0x3A08001F");
        assert_eq!(PropertyId(3).to_string(), "0x00000003");
    }
}

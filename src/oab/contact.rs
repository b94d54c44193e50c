// Contact records produced by the decoder.

use std::collections::BTreeMap;
use std::fmt;

use crate::oab::value::Value;

/// Semantic fields a contact can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ContactField {
    Uid,
    Email,
    DisplayName,
    Account,
    GivenName,
    FamilyName,
    Title,
    Company,
    Department,
    Office,
    Assistant,
    BusinessPhone,
    OtherBusinessPhones,
    HomePhone,
    OtherHomePhones,
    MobilePhone,
    BusinessFax,
    AssistantPhone,
    Pager,
    WorkAddress,
    ProxyAddresses,
    Notes,
    Photo,
    Certificates,
}

impl ContactField {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Uid => "uid",
            Self::Email => "email",
            Self::DisplayName => "display_name",
            Self::Account => "account",
            Self::GivenName => "given_name",
            Self::FamilyName => "family_name",
            Self::Title => "title",
            Self::Company => "company",
            Self::Department => "department",
            Self::Office => "office",
            Self::Assistant => "assistant",
            Self::BusinessPhone => "business_phone",
            Self::OtherBusinessPhones => "other_business_phones",
            Self::HomePhone => "home_phone",
            Self::OtherHomePhones => "other_home_phones",
            Self::MobilePhone => "mobile_phone",
            Self::BusinessFax => "business_fax",
            Self::AssistantPhone => "assistant_phone",
            Self::Pager => "pager",
            Self::WorkAddress => "work_address",
            Self::ProxyAddresses => "proxy_addresses",
            Self::Notes => "notes",
            Self::Photo => "photo",
            Self::Certificates => "certificates",
        }
    }
}

impl fmt::Display for ContactField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Value stored against a [`ContactField`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    TextList(Vec<String>),
    Integer(u32),
    IntegerList(Vec<u32>),
    Bool(bool),
    Binary(Vec<u8>),
    BinaryList(Vec<Vec<u8>>),
    Address(PostalAddress),
}

impl From<Value> for FieldValue {
    fn from(v: Value) -> Self {
        match v {
            Value::Int32(n) => Self::Integer(n),
            Value::Bool(b) => Self::Bool(b),
            Value::String8(s) | Value::Unicode(s) => Self::Text(s),
            Value::Binary(b) => Self::Binary(b),
            Value::MultiInt32(v) => Self::IntegerList(v),
            Value::MultiString8(v) | Value::MultiUnicode(v) => Self::TextList(v),
            Value::MultiBinary(v) => Self::BinaryList(v),
        }
    }
}

// ---------------------------------------------------------------------------
// Postal addresses
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostalAddress {
    pub street: Option<String>,
    pub locality: Option<String>,
    pub region: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
}

impl fmt::Display for PostalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts = [
            &self.street,
            &self.locality,
            &self.region,
            &self.postal_code,
            &self.country,
        ];
        let mut first = true;
        for part in parts.into_iter().flatten() {
            if !first {
                f.write_str(", ")?;
            }
            f.write_str(part)?;
            first = false;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressPart {
    Street,
    Locality,
    Region,
    PostalCode,
    Country,
}

/// Address components collected while a record is decoded, committed once
/// the whole record has been read.
#[derive(Debug, Default)]
pub struct PendingAddress {
    address: PostalAddress,
    touched: bool,
}

impl PendingAddress {
    pub fn set(&mut self, part: AddressPart, text: String) {
        let slot = match part {
            AddressPart::Street => &mut self.address.street,
            AddressPart::Locality => &mut self.address.locality,
            AddressPart::Region => &mut self.address.region,
            AddressPart::PostalCode => &mut self.address.postal_code,
            AddressPart::Country => &mut self.address.country,
        };
        *slot = Some(text);
        self.touched = true;
    }

    /// The assembled address, or `None` if no component was seen. Resets the
    /// pending state.
    pub fn take(&mut self) -> Option<PostalAddress> {
        let touched = std::mem::take(&mut self.touched);
        let address = std::mem::take(&mut self.address);
        touched.then_some(address)
    }
}

// ---------------------------------------------------------------------------
// Record kind
// ---------------------------------------------------------------------------

/// Directory object class, from the display-type properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    MailUser,
    DistList,
    Forum,
    Agent,
    Organization,
    PrivateDistList,
    RemoteMailUser,
    Room,
    Equipment,
    SecurityDistList,
    Other(u32),
}

impl RecordKind {
    /// Only the low byte is significant; the upper bytes carry flags.
    pub fn from_display_type(raw: u32) -> Self {
        match raw & 0xFF {
            0 => Self::MailUser,
            1 => Self::DistList,
            2 => Self::Forum,
            3 => Self::Agent,
            4 => Self::Organization,
            5 => Self::PrivateDistList,
            6 => Self::RemoteMailUser,
            7 => Self::Room,
            8 => Self::Equipment,
            9 => Self::SecurityDistList,
            _ => Self::Other(raw),
        }
    }

    pub fn is_group(self) -> bool {
        matches!(
            self,
            Self::DistList | Self::PrivateDistList | Self::SecurityDistList
        )
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MailUser => f.write_str("mail-user"),
            Self::DistList => f.write_str("dist-list"),
            Self::Forum => f.write_str("forum"),
            Self::Agent => f.write_str("agent"),
            Self::Organization => f.write_str("organization"),
            Self::PrivateDistList => f.write_str("private-dist-list"),
            Self::RemoteMailUser => f.write_str("remote-mail-user"),
            Self::Room => f.write_str("room"),
            Self::Equipment => f.write_str("equipment"),
            Self::SecurityDistList => f.write_str("security-dist-list"),
            Self::Other(raw) => write!(f, "other({raw:#x})"),
        }
    }
}

// ---------------------------------------------------------------------------
// ContactRecord
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactRecord {
    fields: BTreeMap<ContactField, FieldValue>,
    kind: Option<RecordKind>,
}

impl ContactRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: ContactField) -> Option<&FieldValue> {
        self.fields.get(&field)
    }

    pub fn set(&mut self, field: ContactField, value: FieldValue) {
        self.fields.insert(field, value);
    }

    pub fn remove(&mut self, field: ContactField) -> Option<FieldValue> {
        self.fields.remove(&field)
    }

    pub fn contains(&self, field: ContactField) -> bool {
        self.fields.contains_key(&field)
    }

    pub fn fields(&self) -> impl Iterator<Item = (ContactField, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (*k, v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn text(&self, field: ContactField) -> Option<&str> {
        match self.fields.get(&field)? {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn text_list(&self, field: ContactField) -> Option<&[String]> {
        match self.fields.get(&field)? {
            FieldValue::TextList(v) => Some(v),
            _ => None,
        }
    }

    pub fn uid(&self) -> Option<&str> {
        self.text(ContactField::Uid)
    }

    pub fn email(&self) -> Option<&str> {
        self.text(ContactField::Email)
    }

    pub fn display_name(&self) -> Option<&str> {
        self.text(ContactField::DisplayName)
    }

    pub fn address(&self) -> Option<&PostalAddress> {
        match self.fields.get(&ContactField::WorkAddress)? {
            FieldValue::Address(a) => Some(a),
            _ => None,
        }
    }

    pub fn kind(&self) -> Option<RecordKind> {
        self.kind
    }

    pub fn set_kind(&mut self, kind: RecordKind) {
        self.kind = Some(kind);
    }
}

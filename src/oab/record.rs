// Record decoding: presence bitmap, property values, field mapping.

use std::collections::HashMap;

use log::trace;

use crate::cursor::ByteCursor;
use crate::error::{Error, Result};
use crate::oab::contact::{
    AddressPart, ContactField, ContactRecord, FieldValue, PendingAddress, RecordKind,
};
use crate::oab::props::*;
use crate::oab::schema::{PresenceBitmap, PropertySchema};
use crate::oab::value::{Int32Encoding, Value, decode_value_as};

/// Where a decoded property lands on a [`ContactRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldTarget {
    Field(ContactField),
    /// One component of the composite work address.
    Address(AddressPart),
}

/// Maps property tags (high 16 bits of the id) to contact fields.
///
/// Keying on the tag makes the String8 and Unicode flavours of the same
/// property land in the same field.
#[derive(Debug, Clone)]
pub struct FieldMap {
    targets: HashMap<u16, FieldTarget>,
}

impl FieldMap {
    /// A map with no entries; every property is decoded and discarded.
    pub fn empty() -> Self {
        Self {
            targets: HashMap::new(),
        }
    }

    pub fn insert(&mut self, id: PropertyId, target: FieldTarget) -> Option<FieldTarget> {
        self.targets.insert(id.tag(), target)
    }

    pub fn remove(&mut self, id: PropertyId) -> Option<FieldTarget> {
        self.targets.remove(&id.tag())
    }

    pub fn get(&self, id: PropertyId) -> Option<FieldTarget> {
        self.targets.get(&id.tag()).copied()
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

impl Default for FieldMap {
    fn default() -> Self {
        use ContactField as F;
        use FieldTarget::{Address, Field};

        let entries = [
            (PT_SMTP_ADDRESS, Field(F::Email)),
            (PT_DISPLAY_NAME, Field(F::DisplayName)),
            (PT_ACCOUNT, Field(F::Account)),
            (PT_SURNAME, Field(F::FamilyName)),
            (PT_GIVEN_NAME, Field(F::GivenName)),
            (PT_BUS_TEL_NUMBER, Field(F::BusinessPhone)),
            (PT_HOME_TEL_NUMBER, Field(F::HomePhone)),
            (PT_BUS_TEL_NUMBERS, Field(F::OtherBusinessPhones)),
            (PT_HOME_TEL_NUMBERS, Field(F::OtherHomePhones)),
            (PT_MOBILE_TEL_NUMBER, Field(F::MobilePhone)),
            (PT_PRIMARY_FAX_NUMBER, Field(F::BusinessFax)),
            (PT_ASSISTANT_TEL_NUMBER, Field(F::AssistantPhone)),
            (PT_PAGER_TEL_NUMBER, Field(F::Pager)),
            (PT_TITLE, Field(F::Title)),
            (PT_COMPANY_NAME, Field(F::Company)),
            (PT_ASSISTANT, Field(F::Assistant)),
            (PT_DEPARTMENT_NAME, Field(F::Department)),
            (PT_OFFICE_LOCATION, Field(F::Office)),
            (PT_PROXY_ADDRESSES, Field(F::ProxyAddresses)),
            (PT_THUMBNAIL_PHOTO, Field(F::Photo)),
            (PT_X509_CERTIFICATE, Field(F::Certificates)),
            (PT_COMMENT, Field(F::Notes)),
            (PT_STREET_ADDRESS, Address(AddressPart::Street)),
            (PT_LOCALITY, Address(AddressPart::Locality)),
            (PT_STATE_OR_PROVINCE, Address(AddressPart::Region)),
            (PT_POSTAL_CODE, Address(AddressPart::PostalCode)),
            (PT_COUNTRY, Address(AddressPart::Country)),
        ];
        let mut map = Self::empty();
        for (id, target) in entries {
            map.insert(id, target);
        }
        map
    }
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Walk the presence bitmap at the cursor and hand every present value to
/// `f` in schema order. `Object` slots carry no bytes and are skipped.
pub fn for_each_present<F>(
    cursor: &mut ByteCursor<'_>,
    schema: &PropertySchema,
    int32: Int32Encoding,
    mut f: F,
) -> Result<()>
where
    F: FnMut(PropertyId, Value) -> Result<()>,
{
    let bitmap = PresenceBitmap::new(cursor.read_exact(schema.bitmap_len())?);
    for (i, id) in schema.iter().enumerate() {
        if !bitmap.is_set(i) {
            continue;
        }
        if id.prop_type_tag() == PropType::Object.tag() {
            continue;
        }
        let value = decode_value_as(cursor, id, int32)?;
        f(id, value)?;
    }
    Ok(())
}

/// All present properties of one record, in schema order.
pub fn read_properties(
    cursor: &mut ByteCursor<'_>,
    schema: &PropertySchema,
    int32: Int32Encoding,
) -> Result<Vec<(PropertyId, Value)>> {
    let mut out = Vec::new();
    for_each_present(cursor, schema, int32, |id, value| {
        out.push((id, value));
        Ok(())
    })?;
    Ok(out)
}

/// Decode one record at the cursor.
///
/// With `sink == None` the values are still decoded, so the cursor ends up
/// after the record, but nothing is kept. Otherwise values are folded into
/// the sink through `field_map`; a record that ends up with no uid fails
/// with [`Error::IdentityMissing`].
pub fn decode_record(
    cursor: &mut ByteCursor<'_>,
    schema: &PropertySchema,
    field_map: &FieldMap,
    sink: Option<&mut ContactRecord>,
) -> Result<()> {
    decode_record_as(cursor, schema, field_map, Int32Encoding::Fixed, sink)
}

/// [`decode_record`] with an explicit integer encoding.
pub fn decode_record_as(
    cursor: &mut ByteCursor<'_>,
    schema: &PropertySchema,
    field_map: &FieldMap,
    int32: Int32Encoding,
    sink: Option<&mut ContactRecord>,
) -> Result<()> {
    let Some(record) = sink else {
        return for_each_present(cursor, schema, int32, |_, _| Ok(()));
    };

    let mut pending = PendingAddress::default();
    let mut display_type = None;
    let mut display_type_ex = None;

    for_each_present(cursor, schema, int32, |id, value| {
        match id.tag() {
            t if t == PT_DISPLAY_TYPE.tag() => display_type = value.as_u32(),
            t if t == PT_DISPLAY_TYPE_EX.tag() => display_type_ex = value.as_u32(),
            _ => match field_map.get(id) {
                Some(FieldTarget::Field(field)) => record.set(field, value.into()),
                Some(FieldTarget::Address(part)) => match value {
                    Value::String8(s) | Value::Unicode(s) => pending.set(part, s),
                    other => trace!("{id}: non-text address component {:?}", other.prop_type()),
                },
                None => trace!("{id}: unmapped, dropped"),
            },
        }
        Ok(())
    })?;

    if let Some(address) = pending.take() {
        record.set(ContactField::WorkAddress, FieldValue::Address(address));
    }
    if let Some(raw) = display_type_ex.or(display_type) {
        record.set_kind(RecordKind::from_display_type(raw));
    }
    if !record.contains(ContactField::Uid) {
        let uid = record
            .email()
            .filter(|e| !e.is_empty())
            .map(str::to_owned)
            .ok_or(Error::IdentityMissing)?;
        record.set(ContactField::Uid, FieldValue::Text(uid));
    }
    Ok(())
}

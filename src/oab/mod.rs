// Offline Address Book (OAB v4) plaintext format.
//
// - varint:   compact unsigned integers used for lengths and counts
// - props:    property ids, wire types, well-known ids
// - value:    typed property values and their wire form
// - schema:   property schemas and presence bitmaps
// - contact:  the contact record produced per directory entry
// - record:   field mapping and single-record decoding
// - header:   file header and header pseudo-record
// - decoder:  file-level decoder and record iterator

pub mod contact;
pub mod decoder;
pub mod header;
pub mod props;
pub mod record;
pub mod schema;
pub mod value;
pub mod varint;

pub use contact::{ContactField, ContactRecord, FieldValue, PostalAddress, RecordKind};
pub use decoder::{
    DecodeOptions, DecodeStats, DecodedRecord, MissingIdentityPolicy, OabDecoder, Records,
};
pub use header::{FileHeader, HeaderRecord, OAB_VERSION};
pub use props::{PropType, PropertyId};
pub use record::{FieldMap, FieldTarget, decode_record, decode_record_as};
pub use schema::{PresenceBitmap, PropertySchema};
pub use value::{Int32Encoding, Value, decode_value, decode_value_as};

// OAB v4 plaintext decoder.
//
// Layout of a plaintext file:
//
//   FileHeader      {version, serial, total_records}
//   metadata        {size:u32, header schema, per-contact schema}
//   header record   {size:u32, bitmap + values}
//   records         total_records x {size:u32, bitmap + values}
//
// Record sizes include their own 4-byte prefix. The header section is
// parsed on first use and then kept for the lifetime of the decoder.

use std::io::SeekFrom;
use std::path::Path;

use log::{debug, trace, warn};

use crate::cancel::CancelToken;
use crate::cursor::ByteCursor;
use crate::error::{Error, Result};
use crate::io::sha256_hex;
use crate::oab::contact::ContactRecord;
use crate::oab::header::{FileHeader, HeaderRecord};
use crate::oab::record::{FieldMap, decode_record_as, read_properties};
use crate::oab::schema::PropertySchema;
use crate::oab::value::Int32Encoding;

/// Size prefix in front of every record.
const RECORD_PREFIX: u32 = 4;

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// What to do with a record that decodes cleanly but has no uid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingIdentityPolicy {
    /// Count the record and carry on with the next one.
    #[default]
    Skip,
    /// Stop the pass with [`Error::IdentityMissing`].
    Abort,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DecodeOptions {
    pub missing_identity: MissingIdentityPolicy,
    /// Wire form of integer properties in header and contact records.
    pub int32: Int32Encoding,
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// One record yielded by [`Records`].
#[derive(Debug, Clone)]
pub struct DecodedRecord {
    pub contact: ContactRecord,
    /// Stream offset of the record's size prefix; pass it back to
    /// [`OabDecoder::contact_at_offset`].
    pub offset: u64,
    /// Lowercase hex SHA-256 of the record bytes after the size prefix.
    pub content_hash: String,
    /// Progress through the file, 0..=100.
    pub percent: u8,
}

/// Counters for one decode pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeStats {
    pub total_records: u32,
    /// Records handed to the caller.
    pub emitted: u64,
    /// Records the filter declined.
    pub filtered: u64,
    /// Records dropped under [`MissingIdentityPolicy::Skip`].
    pub missing_identity: u64,
}

// ---------------------------------------------------------------------------
// Decoder
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct Layout {
    header: FileHeader,
    header_schema: PropertySchema,
    oab_schema: PropertySchema,
    header_record: HeaderRecord,
    records_start: u64,
}

/// Decoder over one plaintext OAB file held in memory.
#[derive(Debug)]
pub struct OabDecoder {
    data: Vec<u8>,
    options: DecodeOptions,
    field_map: FieldMap,
    layout: Option<Layout>,
    imported_schema: Option<PropertySchema>,
}

impl OabDecoder {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path)?;
        debug!("opened {} ({} bytes)", path.display(), data.len());
        Ok(Self::from_bytes(data))
    }

    pub fn from_bytes(data: Vec<u8>) -> Self {
        Self {
            data,
            options: DecodeOptions::default(),
            field_map: FieldMap::default(),
            layout: None,
            imported_schema: None,
        }
    }

    pub fn with_options(mut self, options: DecodeOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_field_map(mut self, field_map: FieldMap) -> Self {
        self.field_map = field_map;
        self
    }

    pub fn options(&self) -> DecodeOptions {
        self.options
    }

    pub fn file_header(&mut self) -> Result<FileHeader> {
        Ok(self.layout()?.header)
    }

    pub fn header_record(&mut self) -> Result<&HeaderRecord> {
        Ok(&self.layout()?.header_record)
    }

    pub fn header_schema(&mut self) -> Result<&PropertySchema> {
        Ok(&self.layout()?.header_schema)
    }

    /// Per-contact schema read from the file.
    pub fn oab_schema(&mut self) -> Result<&PropertySchema> {
        Ok(&self.layout()?.oab_schema)
    }

    fn layout(&mut self) -> Result<&Layout> {
        if self.layout.is_none() {
            self.layout = Some(parse_layout(&self.data, self.options.int32)?);
        }
        self.layout
            .as_ref()
            .ok_or_else(|| Error::format("header section unavailable"))
    }

    /// Schema used for single-record lookups: the imported one if present,
    /// otherwise the file's own.
    fn active_schema(&mut self) -> Result<&PropertySchema> {
        if self.imported_schema.is_some() {
            return self
                .imported_schema
                .as_ref()
                .ok_or_else(|| Error::format("imported schema unavailable"));
        }
        self.oab_schema()
    }

    pub fn export_schema_string(&mut self) -> Result<String> {
        Ok(self.active_schema()?.export_string())
    }

    /// Install a schema saved by [`export_schema_string`](Self::export_schema_string)
    /// so `contact_at_offset` can run without parsing the header section.
    pub fn import_schema_string(&mut self, s: &str) -> Result<()> {
        let schema = PropertySchema::parse_string(s)?;
        debug!("imported per-contact schema of {} properties", schema.len());
        self.imported_schema = Some(schema);
        Ok(())
    }

    /// Decode the single record whose size prefix starts at `offset`.
    pub fn contact_at_offset(&mut self, offset: u64) -> Result<ContactRecord> {
        let schema = self.active_schema()?.clone();
        let mut cursor = ByteCursor::new(&self.data);
        cursor.seek(SeekFrom::Start(offset))?;
        let body = read_record_body(&mut cursor)?;
        let mut contact = ContactRecord::new();
        decode_record_as(
            &mut ByteCursor::new(body),
            &schema,
            &self.field_map,
            self.options.int32,
            Some(&mut contact),
        )?;
        Ok(contact)
    }

    /// Lazy pass over every contact record.
    ///
    /// `filter(offset, content_hash)` runs before a record is decoded;
    /// returning `false` skips it. The token is checked before each record.
    pub fn records<F>(&mut self, filter: F, cancel: &CancelToken) -> Result<Records<'_, F>>
    where
        F: FnMut(u64, &str) -> bool,
    {
        self.layout()?;
        let this = &*self;
        let layout = this
            .layout
            .as_ref()
            .ok_or_else(|| Error::format("header section unavailable"))?;

        let mut cursor = ByteCursor::new(&this.data);
        cursor.seek(SeekFrom::Start(layout.records_start))?;
        Ok(Records {
            cursor,
            schema: &layout.oab_schema,
            field_map: &this.field_map,
            policy: this.options.missing_identity,
            int32: this.options.int32,
            filter,
            cancel: cancel.clone(),
            index: 0,
            stats: DecodeStats {
                total_records: layout.header.total_records,
                ..DecodeStats::default()
            },
            done: false,
        })
    }

    /// Run a whole pass, handing each record to `sink`.
    ///
    /// Stops at the first sink error. Cancellation surfaces as
    /// `Err(Error::Cancelled)` after the sink call that was in progress.
    pub fn decode<F, S>(
        &mut self,
        filter: F,
        mut sink: S,
        cancel: &CancelToken,
    ) -> Result<DecodeStats>
    where
        F: FnMut(u64, &str) -> bool,
        S: FnMut(DecodedRecord) -> Result<()>,
    {
        let mut records = self.records(filter, cancel)?;
        for item in records.by_ref() {
            sink(item?)?;
        }
        let stats = records.stats();
        debug!(
            "decode pass done: {} emitted, {} filtered, {} without identity",
            stats.emitted, stats.filtered, stats.missing_identity
        );
        Ok(stats)
    }
}

fn parse_layout(data: &[u8], int32: Int32Encoding) -> Result<Layout> {
    let mut cursor = ByteCursor::new(data);
    let header = FileHeader::read(&mut cursor)?;

    let _metadata_size = cursor.read_u32_le()?;
    let header_schema = PropertySchema::read(&mut cursor)?;
    let oab_schema = PropertySchema::read(&mut cursor)?;
    debug!(
        "schemas: {} header properties, {} contact properties",
        header_schema.len(),
        oab_schema.len()
    );

    let body = read_record_body(&mut cursor)?;
    let header_record = HeaderRecord::from_properties(read_properties(
        &mut ByteCursor::new(body),
        &header_schema,
        int32,
    )?);
    if let Some(name) = &header_record.name {
        debug!("address list {name:?} sequence {:?}", header_record.sequence);
    }

    Ok(Layout {
        header,
        header_schema,
        oab_schema,
        header_record,
        records_start: cursor.position(),
    })
}

/// Read a `{size:u32}` prefixed record and return the bytes after the
/// prefix, leaving the cursor at the next record.
fn read_record_body<'a>(cursor: &mut ByteCursor<'a>) -> Result<&'a [u8]> {
    let offset = cursor.position();
    let size = cursor.read_u32_le()?;
    if size < RECORD_PREFIX {
        return Err(Error::format(format!(
            "record at offset {offset} declares size {size}, smaller than its prefix"
        )));
    }
    cursor.read_exact((size - RECORD_PREFIX) as usize)
}

// ---------------------------------------------------------------------------
// Records iterator
// ---------------------------------------------------------------------------

/// Finite, non-restartable sequence of decoded records.
///
/// After the first error the iterator is fused.
pub struct Records<'a, F> {
    cursor: ByteCursor<'a>,
    schema: &'a PropertySchema,
    field_map: &'a FieldMap,
    policy: MissingIdentityPolicy,
    int32: Int32Encoding,
    filter: F,
    cancel: CancelToken,
    index: u32,
    stats: DecodeStats,
    done: bool,
}

impl<F> Records<'_, F>
where
    F: FnMut(u64, &str) -> bool,
{
    pub fn stats(&self) -> DecodeStats {
        self.stats
    }

    fn advance(&mut self) -> Result<Option<DecodedRecord>> {
        let total = self.stats.total_records;
        while self.index < total {
            self.cancel.check()?;

            let offset = self.cursor.position();
            let body = read_record_body(&mut self.cursor)?;
            self.index += 1;
            let percent = (u64::from(self.index) * 100 / u64::from(total)) as u8;
            let content_hash = sha256_hex(body);

            if !(self.filter)(offset, &content_hash) {
                trace!("record {} at {offset} filtered", self.index);
                self.stats.filtered += 1;
                continue;
            }

            let mut contact = ContactRecord::new();
            match decode_record_as(
                &mut ByteCursor::new(body),
                self.schema,
                self.field_map,
                self.int32,
                Some(&mut contact),
            ) {
                Ok(()) => {
                    trace!("record {} at {offset}: {:?}", self.index, contact.uid());
                    self.stats.emitted += 1;
                    return Ok(Some(DecodedRecord {
                        contact,
                        offset,
                        content_hash,
                        percent,
                    }));
                }
                Err(Error::IdentityMissing) if self.policy == MissingIdentityPolicy::Skip => {
                    warn!("record {} at offset {offset} has no identifier, skipped", self.index);
                    self.stats.missing_identity += 1;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(None)
    }
}

impl<F> Iterator for Records<'_, F>
where
    F: FnMut(u64, &str) -> bool,
{
    type Item = Result<DecodedRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.advance() {
            Ok(Some(rec)) => Some(Ok(rec)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

impl<F> std::iter::FusedIterator for Records<'_, F> where F: FnMut(u64, &str) -> bool {}

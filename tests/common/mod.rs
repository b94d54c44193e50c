// Fixture builders shared by the integration tests and benches.
//
// - OabBuilder: plaintext OAB v4 files from schemas and property values
// - LzxWriter:  a small LZX DELTA encoder (verbatim or aligned blocks with
//   fixed code lengths and a greedy matcher, or uncompressed blocks)
// - full_container / patch_container: the compressed file wrappers

#![allow(dead_code)]

use std::collections::HashMap;

use oabkit::lzx::{BlockHeader, FRAME_SIZE, LzxHeader, PatchBlockHeader, PatchHeader};
use oabkit::oab::props::*;
use oabkit::oab::{FileHeader, PresenceBitmap, PropertyId, PropertySchema, Value};

// ---------------------------------------------------------------------------
// OAB files
// ---------------------------------------------------------------------------

pub struct OabBuilder {
    serial: u32,
    header_schema: PropertySchema,
    oab_schema: PropertySchema,
    header_values: Vec<Option<Value>>,
    records: Vec<Vec<u8>>,
}

impl OabBuilder {
    pub fn new(oab_schema: Vec<PropertyId>) -> Self {
        Self {
            serial: 0x1234,
            header_schema: PropertySchema::new(vec![PT_OAB_NAME, PT_OAB_SEQUENCE]),
            oab_schema: PropertySchema::new(oab_schema),
            header_values: vec![
                Some(Value::Unicode("Global Address List".into())),
                Some(Value::Int32(1)),
            ],
            records: Vec::new(),
        }
    }

    pub fn serial(mut self, serial: u32) -> Self {
        self.serial = serial;
        self
    }

    pub fn header(mut self, schema: Vec<PropertyId>, values: Vec<Option<Value>>) -> Self {
        self.header_schema = PropertySchema::new(schema);
        self.header_values = values;
        self
    }

    /// Add a record; `None` slots are absent from the bitmap.
    pub fn record(mut self, values: Vec<Option<Value>>) -> Self {
        self.records.push(record_body(&values));
        self
    }

    /// Add a record body (bitmap + values) verbatim.
    pub fn raw_record(mut self, body: Vec<u8>) -> Self {
        self.records.push(body);
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut out = Vec::new();
        FileHeader::new(self.serial, self.records.len() as u32)
            .write_to(&mut out)
            .unwrap();

        let mut meta = Vec::new();
        self.header_schema.write_to(&mut meta).unwrap();
        self.oab_schema.write_to(&mut meta).unwrap();
        out.extend_from_slice(&((meta.len() + 4) as u32).to_le_bytes());
        out.extend_from_slice(&meta);

        push_sized(&mut out, &record_body(&self.header_values));
        for body in &self.records {
            push_sized(&mut out, body);
        }
        out
    }

    /// Offsets of each record's size prefix in `build()` output.
    pub fn record_offsets(&self) -> Vec<u64> {
        let total = self.build().len() as u64;
        let mut offsets = Vec::with_capacity(self.records.len());
        let tail: u64 = self.records.iter().map(|r| r.len() as u64 + 4).sum();
        let mut at = total - tail;
        for r in &self.records {
            offsets.push(at);
            at += r.len() as u64 + 4;
        }
        offsets
    }
}

pub fn record_body(values: &[Option<Value>]) -> Vec<u8> {
    let bits: Vec<bool> = values.iter().map(Option::is_some).collect();
    let mut body = PresenceBitmap::encode(&bits);
    for v in values.iter().flatten() {
        v.write_to(&mut body).unwrap();
    }
    body
}

fn push_sized(out: &mut Vec<u8>, body: &[u8]) {
    out.extend_from_slice(&((body.len() + 4) as u32).to_le_bytes());
    out.extend_from_slice(body);
}

pub fn text(s: &str) -> Option<Value> {
    Some(Value::Unicode(s.to_string()))
}

/// A directory of `n` mail users with a few populated fields each.
pub fn sample_directory(n: usize) -> OabBuilder {
    let mut b = OabBuilder::new(vec![
        PT_SMTP_ADDRESS,
        PT_DISPLAY_NAME,
        PT_BUS_TEL_NUMBER,
        PT_COMPANY_NAME,
        PT_DISPLAY_TYPE,
    ]);
    for i in 0..n {
        b = b.record(vec![
            text(&format!("user{i}@example.com")),
            text(&format!("User Number {i}")),
            if i % 3 == 0 { text(&format!("555-{i:04}")) } else { None },
            text("Example Corp"),
            Some(Value::Int32(0)),
        ]);
    }
    b
}

// ---------------------------------------------------------------------------
// LZX bit writer
// ---------------------------------------------------------------------------

/// MSB-first bit packer producing 16-bit little-endian words.
pub struct BitWriter {
    out: Vec<u8>,
    acc: u32,
    n: u32,
}

impl BitWriter {
    pub fn new() -> Self {
        Self {
            out: Vec::new(),
            acc: 0,
            n: 0,
        }
    }

    pub fn put(&mut self, value: u32, bits: u32) {
        for i in (0..bits).rev() {
            self.acc = (self.acc << 1) | ((value >> i) & 1);
            self.n += 1;
            if self.n == 16 {
                self.out.extend_from_slice(&(self.acc as u16).to_le_bytes());
                self.acc = 0;
                self.n = 0;
            }
        }
    }

    pub fn align(&mut self) {
        if self.n > 0 {
            self.put(0, 16 - self.n);
        }
    }

    /// Raw bytes; the writer must be word aligned.
    pub fn raw(&mut self, bytes: &[u8]) {
        assert_eq!(self.n, 0, "raw bytes need word alignment");
        self.out.extend_from_slice(bytes);
    }

    pub fn finish(mut self) -> Vec<u8> {
        self.align();
        self.out
    }
}

/// Canonical codes for a set of lengths, in (length, symbol) order.
fn canonical_codes(lens: &[u8]) -> Vec<u32> {
    let mut count = [0u32; 17];
    for &l in lens {
        count[usize::from(l)] += 1;
    }
    count[0] = 0;
    let mut next = [0u32; 17];
    let mut code = 0;
    for bits in 1..17 {
        code = (code + count[bits - 1]) << 1;
        next[bits] = code;
    }
    lens.iter()
        .map(|&l| {
            if l == 0 {
                return 0;
            }
            let c = next[usize::from(l)];
            next[usize::from(l)] += 1;
            c
        })
        .collect()
}

// ---------------------------------------------------------------------------
// LZX stream writer
// ---------------------------------------------------------------------------

const POSITION_SLOTS: [usize; 11] = [30, 32, 34, 36, 38, 42, 50, 66, 98, 162, 290];
const MAX_DISTANCE: usize = 65533;
/// One frame; the extended length code covers up to 257 + 32767.
const MAX_LEN: usize = FRAME_SIZE;
const MIN_LEN: usize = 3;
const MAX_MATCH: usize = 257;

fn extra_bits(slot: usize) -> u32 {
    if slot < 4 {
        0
    } else if slot < 36 {
        (slot / 2 - 1) as u32
    } else {
        17
    }
}

fn position_base(slot: usize) -> u32 {
    (0..slot).map(|s| 1u32 << extra_bits(s)).sum()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LzxMode {
    /// Verbatim blocks with a greedy matcher.
    Verbatim,
    /// Aligned offset blocks: same matcher, low 3 offset bits through the
    /// aligned tree (all lengths 3, so code == value).
    Aligned,
    /// Uncompressed blocks.
    Uncompressed,
}

/// What the writer emitted, so tests can tell which decoder paths ran.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenCounts {
    pub literals: usize,
    pub matches: usize,
    /// Matches coded as repeat slot 0, 1 and 2.
    pub repeats: [usize; 3],
    /// Offsets whose low bits went through the aligned tree.
    pub aligned: usize,
    /// Matches of 257+ bytes, per extended length prefix (0, 10, 110, 111).
    pub long_lengths: [usize; 4],
}

enum Token {
    Literal(u8),
    Match { offset: usize, length: usize },
}

struct Codes<'a> {
    main: &'a [u32],
    main_lens: &'a [u8],
    length: &'a [u32],
    aligned: bool,
}

pub struct LzxWriter {
    mode: LzxMode,
    window_bits: u32,
    /// Output bytes per LZX block; `None` for a single block.
    block_len: Option<usize>,
    e8_filesize: Option<i32>,
}

impl LzxWriter {
    pub fn new(mode: LzxMode, window_bits: u32) -> Self {
        Self {
            mode,
            window_bits,
            block_len: None,
            e8_filesize: None,
        }
    }

    pub fn block_len(mut self, len: usize) -> Self {
        self.block_len = Some(len);
        self
    }

    /// Announce E8 translation with `filesize` in the stream header and
    /// pre-translate the input with [`e8_encode`].
    pub fn e8(mut self, filesize: i32) -> Self {
        self.e8_filesize = Some(filesize);
        self
    }

    /// Compress `data`, optionally matching against `reference`.
    pub fn compress(&self, reference: &[u8], data: &[u8]) -> Vec<u8> {
        self.compress_counted(reference, data).0
    }

    pub fn compress_counted(&self, reference: &[u8], data: &[u8]) -> (Vec<u8>, TokenCounts) {
        let translated;
        let data = match self.e8_filesize {
            Some(filesize) => {
                translated = e8_encode(data, filesize);
                &translated[..]
            }
            None => data,
        };

        let num_offsets = POSITION_SLOTS[(self.window_bits - 15) as usize] << 3;
        let main_size = 256 + num_offsets;
        let mut main_lens = vec![9u8; 256];
        main_lens.resize(main_size, 13);
        let length_lens = vec![8u8; 249];
        let main_codes = canonical_codes(&main_lens);
        let length_codes = canonical_codes(&length_lens);
        let codes = Codes {
            main: &main_codes,
            main_lens: &main_lens,
            length: &length_codes,
            aligned: self.mode == LzxMode::Aligned,
        };
        let mut main_prev = vec![0u8; main_size];
        let mut length_prev = vec![0u8; 249];

        let mut virt = reference.to_vec();
        virt.extend_from_slice(data);
        let mut index: HashMap<[u8; 3], usize> = HashMap::new();
        for v in 0..reference.len() {
            insert_hash(&virt, v, &mut index);
        }

        let block_len = self.block_len.unwrap_or(data.len()).max(1);
        let mut bw = BitWriter::new();
        let mut counts = TokenCounts::default();
        let mut r = [1usize; 3];
        let mut t = 0;
        let mut frame_end = 0;
        let mut block_end = 0;
        let mut last_uncompressed_odd = false;

        while t < data.len() {
            if t == frame_end {
                // Frame start: align, chunk-size word, E8 header on the first.
                bw.align();
                bw.put(0, 16);
                if t == 0 {
                    match self.e8_filesize {
                        Some(filesize) => {
                            bw.put(1, 1);
                            bw.put(filesize as u32 >> 16, 16);
                            bw.put(filesize as u32 & 0xFFFF, 16);
                        }
                        None => bw.put(0, 1),
                    }
                }
                frame_end = (t + FRAME_SIZE).min(data.len());
            }
            if t == block_end {
                if last_uncompressed_odd {
                    bw.raw(&[0]);
                }
                block_end = (t + block_len).min(data.len());
                let len = (block_end - t) as u32;
                let kind = match self.mode {
                    LzxMode::Verbatim => 1,
                    LzxMode::Aligned => 2,
                    LzxMode::Uncompressed => 3,
                };
                bw.put(kind, 3);
                bw.put(len >> 8, 16);
                bw.put(len & 0xFF, 8);
                if self.mode == LzxMode::Aligned {
                    for _ in 0..8 {
                        bw.put(3, 3);
                    }
                }
                match self.mode {
                    LzxMode::Verbatim | LzxMode::Aligned => {
                        write_lengths(&mut bw, &mut main_prev, &main_lens, 0, 256);
                        write_lengths(&mut bw, &mut main_prev, &main_lens, 256, main_size);
                        write_lengths(&mut bw, &mut length_prev, &length_lens, 0, 249);
                    }
                    LzxMode::Uncompressed => {
                        if bw.n == 0 {
                            bw.put(0, 16);
                        } else {
                            bw.align();
                        }
                        for _ in 0..3 {
                            bw.raw(&1u32.to_le_bytes());
                        }
                        r = [1; 3];
                        last_uncompressed_odd = len % 2 == 1;
                    }
                }
            }

            let limit = frame_end.min(block_end);
            if self.mode == LzxMode::Uncompressed {
                bw.raw(&data[t..limit]);
                t = limit;
                continue;
            }
            while t < limit {
                let v = reference.len() + t;
                let token = find_match(&virt, v, limit - t, &index, &r);
                let step = match token {
                    Token::Literal(b) => {
                        let sym = usize::from(b);
                        bw.put(main_codes[sym], u32::from(main_lens[sym]));
                        counts.literals += 1;
                        1
                    }
                    Token::Match { offset, length } => {
                        write_match(&mut bw, &codes, &mut r, offset, length, &mut counts);
                        length
                    }
                };
                for k in v..v + step {
                    insert_hash(&virt, k, &mut index);
                }
                t += step;
            }
        }
        (bw.finish(), counts)
    }
}

fn insert_hash(virt: &[u8], v: usize, index: &mut HashMap<[u8; 3], usize>) {
    if v + 3 <= virt.len() {
        index.insert([virt[v], virt[v + 1], virt[v + 2]], v);
    }
}

/// Longest match among the repeat offsets and the last occurrence of the
/// next three bytes. Ties go to the repeat offsets, in slot order.
fn find_match(
    virt: &[u8],
    v: usize,
    room: usize,
    index: &HashMap<[u8; 3], usize>,
    r: &[usize; 3],
) -> Token {
    let literal = Token::Literal(virt[v]);
    if room < MIN_LEN || v + 3 > virt.len() {
        return literal;
    }
    let hashed = index
        .get(&[virt[v], virt[v + 1], virt[v + 2]])
        .map(|&cand| v - cand);
    let max = room.min(MAX_LEN);
    let mut best = literal;
    let mut best_len = MIN_LEN - 1;
    for offset in r.iter().copied().chain(hashed) {
        if offset == 0 || offset > v || offset > MAX_DISTANCE {
            continue;
        }
        let cand = v - offset;
        let mut length = 0;
        while length < max && virt[cand + length] == virt[v + length] {
            length += 1;
        }
        if length > best_len {
            best = Token::Match { offset, length };
            best_len = length;
        }
    }
    best
}

fn write_lengths(bw: &mut BitWriter, prev: &mut [u8], lens: &[u8], first: usize, last: usize) {
    // Flat pretree: every symbol 5 bits, code == symbol.
    for _ in 0..20 {
        bw.put(5, 4);
    }
    for x in first..last {
        let z = (i32::from(prev[x]) - i32::from(lens[x])).rem_euclid(17) as u32;
        bw.put(z, 5);
        prev[x] = lens[x];
    }
}

fn write_match(
    bw: &mut BitWriter,
    codes: &Codes<'_>,
    r: &mut [usize; 3],
    offset: usize,
    length: usize,
    counts: &mut TokenCounts,
) {
    counts.matches += 1;
    let slot = if offset == r[0] {
        0
    } else if offset == r[1] {
        r.swap(0, 1);
        1
    } else if offset == r[2] {
        r.swap(0, 2);
        2
    } else {
        let formatted = offset as u32 + 2;
        let slot = (3..)
            .take_while(|&s| position_base(s) <= formatted)
            .last()
            .unwrap();
        *r = [offset, r[0], r[1]];
        slot
    };
    if slot < 3 {
        counts.repeats[slot] += 1;
    }

    let len_header = (length - 2).min(7);
    let sym = 256 + ((slot << 3) | len_header);
    bw.put(codes.main[sym], u32::from(codes.main_lens[sym]));
    if len_header == 7 {
        bw.put(codes.length[length.min(MAX_MATCH) - 9], 8);
    }

    let extra = extra_bits(slot);
    if slot >= 3 && extra > 0 {
        let v = offset as u32 + 2 - position_base(slot);
        if codes.aligned && extra >= 3 {
            bw.put(v >> 3, extra - 3);
            bw.put(v & 7, 3);
            counts.aligned += 1;
        } else {
            bw.put(v, extra);
        }
    }

    if length >= MAX_MATCH {
        let extra = (length - MAX_MATCH) as u32;
        let arm = match extra {
            0..0x100 => {
                bw.put(0, 1);
                bw.put(extra, 8);
                0
            }
            0x100..0x500 => {
                bw.put(0b10, 2);
                bw.put(extra - 0x100, 10);
                1
            }
            0x500..0x1500 => {
                bw.put(0b110, 3);
                bw.put(extra - 0x500, 12);
                2
            }
            _ => {
                bw.put(0b111, 3);
                bw.put(extra, 15);
                3
            }
        };
        counts.long_lengths[arm] += 1;
    }
}

/// Forward E8 call translation, the inverse of what the decoder undoes per
/// 32 KiB frame: relative `call` operands become absolute ones.
pub fn e8_encode(data: &[u8], filesize: i32) -> Vec<u8> {
    let mut out = data.to_vec();
    for (k, frame) in out.chunks_mut(FRAME_SIZE).enumerate() {
        if frame.len() <= 10 {
            continue;
        }
        let mut curpos = (k * FRAME_SIZE) as i32;
        let end = frame.len() - 10;
        let mut i = 0;
        while i < end {
            let b = frame[i];
            i += 1;
            if b != 0xE8 {
                curpos += 1;
                continue;
            }
            let rel = i32::from_le_bytes([frame[i], frame[i + 1], frame[i + 2], frame[i + 3]]);
            if rel >= -curpos && rel < filesize {
                let abs = if rel < filesize - curpos {
                    rel + curpos
                } else {
                    rel - filesize
                };
                frame[i..i + 4].copy_from_slice(&abs.to_le_bytes());
            }
            i += 4;
            curpos += 5;
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Containers
// ---------------------------------------------------------------------------

/// Full container; each block of up to `max_block` bytes is LZX-compressed
/// with `mode`, or stored when `mode` is `None`.
pub fn full_container(data: &[u8], max_block: usize, mode: Option<LzxMode>) -> Vec<u8> {
    let mut out = Vec::new();
    LzxHeader {
        max_block_size: max_block as u32,
        target_size: data.len() as u32,
    }
    .write_to(&mut out)
    .unwrap();
    for chunk in data.chunks(max_block) {
        let (flags, payload) = match mode {
            None => (0, chunk.to_vec()),
            Some(mode) => {
                let bits = oabkit::lzx::window_bits_for(chunk.len()).unwrap();
                (1, LzxWriter::new(mode, bits).compress(&[], chunk))
            }
        };
        BlockHeader {
            flags,
            compressed_size: payload.len() as u32,
            uncompressed_size: chunk.len() as u32,
            crc: 0,
        }
        .write_to(&mut out)
        .unwrap();
        out.extend_from_slice(&payload);
    }
    out
}

/// Patch container turning `source` into `target` in one block.
pub fn patch_container(source: &[u8], target: &[u8], mode: LzxMode) -> Vec<u8> {
    let window = source.len().next_multiple_of(FRAME_SIZE) + target.len();
    let bits = oabkit::lzx::window_bits_for(window).unwrap();
    let payload = LzxWriter::new(mode, bits).compress(source, target);

    let mut out = Vec::new();
    PatchHeader {
        max_block_size: target.len().max(1) as u32,
        source_size: source.len() as u32,
        target_size: target.len() as u32,
        source_crc: 0,
        target_crc: 0,
    }
    .write_to(&mut out)
    .unwrap();
    PatchBlockHeader {
        patch_size: payload.len() as u32,
        target_size: target.len() as u32,
        source_size: source.len() as u32,
        crc: 0,
    }
    .write_to(&mut out)
    .unwrap();
    out.extend_from_slice(&payload);
    out
}

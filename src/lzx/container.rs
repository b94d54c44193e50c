// OAB compressed container.
//
// Full file:   LzxHeader,   then {BlockHeader, payload}*
// Patch file:  PatchHeader, then {PatchBlockHeader, payload}*
//
// Blocks are decoded independently with a fresh LZX decoder. Patch blocks
// use consecutive slices of the source file as reference data. Block CRCs
// are carried on the header structs but not checked.

use std::io::{self, SeekFrom, Write};

use log::{debug, trace, warn};

use super::{FRAME_SIZE, LzxDecoder, LzxError, MAX_WINDOW_BITS, MIN_WINDOW_BITS};
use crate::cursor::ByteCursor;
use crate::error::{Error, Result};

pub const LZX_H_VERSION: u32 = 3;
pub const LZX_FULL_VERSION: u32 = 1;
pub const LZX_PATCH_VERSION: u32 = 2;

/// Block flag: payload stored as-is.
const BLOCK_STORED: u32 = 0;
/// Block flag: payload is an LZX DELTA stream.
const BLOCK_LZX: u32 = 1;

fn read_versions(c: &mut ByteCursor<'_>, expected_l: u32) -> Result<()> {
    let h_version = c.read_u32_le()?;
    let l_version = c.read_u32_le()?;
    if h_version != LZX_H_VERSION || l_version != expected_l {
        return Err(Error::format(format!(
            "unexpected container version {h_version}.{l_version}, \
             expected {LZX_H_VERSION}.{expected_l}"
        )));
    }
    Ok(())
}

fn write_u32s<W: Write>(w: &mut W, fields: &[u32]) -> io::Result<()> {
    fields.iter().try_for_each(|f| w.write_all(&f.to_le_bytes()))
}

// ---------------------------------------------------------------------------
// Headers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LzxHeader {
    pub max_block_size: u32,
    pub target_size: u32,
}

impl LzxHeader {
    pub const SIZE: usize = 16;

    pub fn read(c: &mut ByteCursor<'_>) -> Result<Self> {
        read_versions(c, LZX_FULL_VERSION)?;
        Ok(Self {
            max_block_size: c.read_u32_le()?,
            target_size: c.read_u32_le()?,
        })
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        write_u32s(
            w,
            &[LZX_H_VERSION, LZX_FULL_VERSION, self.max_block_size, self.target_size],
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    pub flags: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub crc: u32,
}

impl BlockHeader {
    pub const SIZE: usize = 16;

    pub fn read(c: &mut ByteCursor<'_>) -> Result<Self> {
        Ok(Self {
            flags: c.read_u32_le()?,
            compressed_size: c.read_u32_le()?,
            uncompressed_size: c.read_u32_le()?,
            crc: c.read_u32_le()?,
        })
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        write_u32s(
            w,
            &[self.flags, self.compressed_size, self.uncompressed_size, self.crc],
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatchHeader {
    pub max_block_size: u32,
    pub source_size: u32,
    pub target_size: u32,
    pub source_crc: u32,
    pub target_crc: u32,
}

impl PatchHeader {
    pub const SIZE: usize = 28;

    pub fn read(c: &mut ByteCursor<'_>) -> Result<Self> {
        read_versions(c, LZX_PATCH_VERSION)?;
        Ok(Self {
            max_block_size: c.read_u32_le()?,
            source_size: c.read_u32_le()?,
            target_size: c.read_u32_le()?,
            source_crc: c.read_u32_le()?,
            target_crc: c.read_u32_le()?,
        })
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        write_u32s(
            w,
            &[
                LZX_H_VERSION,
                LZX_PATCH_VERSION,
                self.max_block_size,
                self.source_size,
                self.target_size,
                self.source_crc,
                self.target_crc,
            ],
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatchBlockHeader {
    pub patch_size: u32,
    pub target_size: u32,
    pub source_size: u32,
    pub crc: u32,
}

impl PatchBlockHeader {
    pub const SIZE: usize = 16;

    pub fn read(c: &mut ByteCursor<'_>) -> Result<Self> {
        Ok(Self {
            patch_size: c.read_u32_le()?,
            target_size: c.read_u32_le()?,
            source_size: c.read_u32_le()?,
            crc: c.read_u32_le()?,
        })
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        write_u32s(
            w,
            &[self.patch_size, self.target_size, self.source_size, self.crc],
        )
    }
}

// ---------------------------------------------------------------------------
// Window sizing
// ---------------------------------------------------------------------------

/// Smallest window exponent in 17..=25 whose window holds `size` bytes.
pub fn window_bits_for(size: usize) -> Result<u32> {
    let mut bits = MIN_WINDOW_BITS;
    while bits < MAX_WINDOW_BITS && (1usize << bits) < size {
        bits += 1;
    }
    if (1usize << bits) < size {
        return Err(Error::Decompression(LzxError::WindowTooSmall {
            len: size,
            window: 1 << MAX_WINDOW_BITS,
        }));
    }
    Ok(bits)
}

fn check_block_size(target: u32, max_block: u32, remaining: u64) -> Result<()> {
    if target == 0 {
        return Err(Error::format("block declares zero output bytes"));
    }
    if target > max_block {
        return Err(Error::format(format!(
            "block of {target} bytes exceeds the {max_block}-byte maximum"
        )));
    }
    if u64::from(target) > remaining {
        return Err(Error::format(format!(
            "block of {target} bytes overruns the {remaining} bytes left in the file"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Full files
// ---------------------------------------------------------------------------

/// Decompress a full container into `out`, returning the bytes written.
pub fn decompress_full_to<W: Write>(input: &[u8], out: &mut W) -> Result<u64> {
    let mut c = ByteCursor::new(input);
    let header = LzxHeader::read(&mut c)?;
    let target = u64::from(header.target_size);
    debug!(
        "lzx full: target {} bytes, max block {}",
        header.target_size, header.max_block_size
    );

    let mut written = 0u64;
    let mut blocks = 0u32;
    while written < target {
        let block = BlockHeader::read(&mut c)?;
        let dsize = block.uncompressed_size;
        check_block_size(dsize, header.max_block_size, target - written)?;

        let start = c.position();
        let payload = c.read_exact(block.compressed_size as usize)?;
        match block.flags {
            BLOCK_STORED => {
                if block.compressed_size != dsize {
                    return Err(Error::format(format!(
                        "stored block sizes differ: {} compressed vs {dsize}",
                        block.compressed_size
                    )));
                }
                out.write_all(payload)?;
            }
            BLOCK_LZX => {
                let bits = window_bits_for(dsize as usize)?;
                trace!(
                    "lzx block {blocks}: {} -> {dsize} bytes, window 2^{bits}",
                    block.compressed_size
                );
                let data = LzxDecoder::new(bits)?.decompress(payload, dsize as usize)?;
                out.write_all(&data)?;
            }
            other => {
                return Err(Error::format(format!("unknown block flags {other:#x}")));
            }
        }
        // The decoder may have looked past its payload; the next header
        // always starts right after it.
        c.seek(SeekFrom::Start(start + u64::from(block.compressed_size)))?;
        written += u64::from(dsize);
        blocks += 1;
    }
    debug!("lzx full: {blocks} block(s), {written} bytes");
    Ok(written)
}

pub fn decompress_full(input: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    decompress_full_to(input, &mut out)?;
    Ok(out)
}

// ---------------------------------------------------------------------------
// Patch files
// ---------------------------------------------------------------------------

/// Apply a patch container to `source`, writing the new file to `out`.
pub fn decompress_patch_to<W: Write>(source: &[u8], patch: &[u8], out: &mut W) -> Result<u64> {
    let mut c = ByteCursor::new(patch);
    let header = PatchHeader::read(&mut c)?;
    let target = u64::from(header.target_size);
    debug!(
        "lzx patch: source {} -> target {} bytes, max block {}",
        header.source_size, header.target_size, header.max_block_size
    );
    if source.len() as u64 != u64::from(header.source_size) {
        warn!(
            "patch expects a {}-byte source, got {} bytes",
            header.source_size,
            source.len()
        );
    }

    let mut written = 0u64;
    let mut src_pos = 0usize;
    let mut blocks = 0u32;
    while written < target {
        let block = PatchBlockHeader::read(&mut c)?;
        let tsize = block.target_size;
        check_block_size(tsize, header.max_block_size, target - written)?;

        let ssize = block.source_size as usize;
        let window = ssize.next_multiple_of(FRAME_SIZE) + tsize as usize;
        let bits = window_bits_for(window)?;

        let reference = source.get(src_pos..src_pos + ssize).ok_or_else(|| {
            Error::format(format!(
                "patch block {blocks} needs source bytes {src_pos}..{} of {}",
                src_pos + ssize,
                source.len()
            ))
        })?;

        let start = c.position();
        let payload = c.read_exact(block.patch_size as usize)?;
        trace!(
            "patch block {blocks}: {} patch bytes, {ssize} reference, {tsize} out, window 2^{bits}",
            block.patch_size
        );
        let mut decoder = LzxDecoder::new(bits)?;
        decoder.set_reference_data(reference)?;
        let data = decoder.decompress(payload, tsize as usize)?;
        out.write_all(&data)?;

        c.seek(SeekFrom::Start(start + u64::from(block.patch_size)))?;
        src_pos += ssize;
        written += u64::from(tsize);
        blocks += 1;
    }
    debug!("lzx patch: {blocks} block(s), {written} bytes");
    Ok(written)
}

pub fn decompress_patch(source: &[u8], patch: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    decompress_patch_to(source, patch, &mut out)?;
    Ok(out)
}

// File-level helpers for OAB container files.
//
// `inflate_file()` and `patch_file()` wrap the in-memory container decoders
// with buffered output and a streaming SHA-256 of whatever was written. On
// failure the partially written output is left for the caller to remove.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use log::debug;
use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::lzx;

const BUF_SIZE: usize = 64 * 1024;

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Statistics returned by `inflate_file()`.
#[derive(Debug, Clone)]
pub struct InflateStats {
    /// Compressed input size in bytes.
    pub input_size: u64,
    /// Decompressed output size in bytes.
    pub output_size: u64,
    /// SHA-256 of the output file.
    pub output_sha256: [u8; 32],
}

/// Statistics returned by `patch_file()`.
#[derive(Debug, Clone)]
pub struct PatchStats {
    pub source_size: u64,
    pub patch_size: u64,
    pub output_size: u64,
    pub output_sha256: [u8; 32],
}

/// Lowercase hex SHA-256 of `data`.
pub fn sha256_hex(data: &[u8]) -> String {
    to_hex(&Sha256::digest(data))
}

pub fn to_hex(bytes: &[u8]) -> String {
    use std::fmt::Write as _;
    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut s, b| {
        let _ = write!(s, "{b:02x}");
        s
    })
}

// ---------------------------------------------------------------------------
// inflate_file / patch_file
// ---------------------------------------------------------------------------

/// Decompress a full OAB container at `input` into `output`.
pub fn inflate_file(input: &Path, output: &Path) -> Result<InflateStats> {
    let data = std::fs::read(input)?;
    let (output_size, output_sha256) =
        write_hashed(output, |w| lzx::decompress_full_to(&data, w))?;
    debug!(
        "inflated {} ({} bytes) -> {} ({output_size} bytes)",
        input.display(),
        data.len(),
        output.display()
    );
    Ok(InflateStats {
        input_size: data.len() as u64,
        output_size,
        output_sha256,
    })
}

/// Apply the patch container at `patch` to `source`, writing `output`.
pub fn patch_file(source: &Path, patch: &Path, output: &Path) -> Result<PatchStats> {
    let source_data = std::fs::read(source)?;
    let patch_data = std::fs::read(patch)?;
    let (output_size, output_sha256) = write_hashed(output, |w| {
        lzx::decompress_patch_to(&source_data, &patch_data, w)
    })?;
    debug!(
        "patched {} with {} -> {} ({output_size} bytes)",
        source.display(),
        patch.display(),
        output.display()
    );
    Ok(PatchStats {
        source_size: source_data.len() as u64,
        patch_size: patch_data.len() as u64,
        output_size,
        output_sha256,
    })
}

fn write_hashed<F>(output: &Path, produce: F) -> Result<(u64, [u8; 32])>
where
    F: FnOnce(&mut HashingWriter<BufWriter<File>>) -> Result<u64>,
{
    let file = File::create(output)?;
    let mut writer = HashingWriter {
        inner: BufWriter::with_capacity(BUF_SIZE, file),
        hasher: Sha256::new(),
    };
    let size = produce(&mut writer)?;
    writer.flush()?;
    Ok((size, writer.hasher.finalize().into()))
}

// ---------------------------------------------------------------------------
// Hashing writer
// ---------------------------------------------------------------------------

struct HashingWriter<W: Write> {
    inner: W,
    hasher: Sha256,
}

impl<W: Write> Write for HashingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.hasher.update(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

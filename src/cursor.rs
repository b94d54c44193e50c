// Bounds-checked cursor over an in-memory byte buffer.
//
// Every read either returns the requested bytes or fails with
// `Error::Truncated` naming the offset; nothing ever reads past the slice.
// A seek outside the buffer is an I/O error, like a failed file seek.

use std::io::{self, SeekFrom};

use crate::error::{Error, Result};
use crate::oab::varint::{self, VarIntError};

#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Current offset from the start of the buffer.
    #[inline]
    pub fn position(&self) -> u64 {
        self.pos as u64
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Bytes not yet consumed.
    #[inline]
    pub fn remaining(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }

    pub fn seek(&mut self, to: SeekFrom) -> Result<u64> {
        let target = match to {
            SeekFrom::Start(off) => i128::from(off),
            SeekFrom::Current(delta) => self.pos as i128 + i128::from(delta),
            SeekFrom::End(delta) => self.data.len() as i128 + i128::from(delta),
        };
        if target < 0 || target > self.data.len() as i128 {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("seek to {target} outside buffer of {} bytes", self.data.len()),
            )));
        }
        self.pos = target as usize;
        Ok(self.pos as u64)
    }

    pub fn read_exact(&mut self, n: usize) -> Result<&'a [u8]> {
        let available = self.data.len() - self.pos;
        if n > available {
            return Err(Error::Truncated {
                offset: self.pos as u64,
                needed: n - available,
            });
        }
        let out = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let bytes = self.read_exact(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    #[inline]
    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_array::<1>()?[0])
    }

    #[inline]
    pub fn read_u16_le(&mut self) -> Result<u16> {
        self.read_array().map(u16::from_le_bytes)
    }

    #[inline]
    pub fn read_u32_le(&mut self) -> Result<u32> {
        self.read_array().map(u32::from_le_bytes)
    }

    #[inline]
    pub fn read_u32_be(&mut self) -> Result<u32> {
        self.read_array().map(u32::from_be_bytes)
    }

    /// Bytes up to (excluding) `terminator`; the cursor ends past it.
    pub fn read_until(&mut self, terminator: u8) -> Result<&'a [u8]> {
        let rest = self.remaining();
        match rest.iter().position(|&b| b == terminator) {
            Some(len) => {
                self.pos += len + 1;
                Ok(&rest[..len])
            }
            None => Err(Error::Truncated {
                offset: self.data.len() as u64,
                needed: 1,
            }),
        }
    }

    /// OAB compact unsigned integer (see `oab::varint`).
    pub fn read_varint(&mut self) -> Result<u32> {
        let start = self.pos as u64;
        match varint::read_u32(self.remaining()) {
            Ok((value, used)) => {
                self.pos += used;
                Ok(value)
            }
            Err(VarIntError::Truncated { needed }) => Err(Error::Truncated {
                offset: start,
                needed,
            }),
            Err(e @ VarIntError::InvalidArm(_)) => {
                Err(Error::format(format!("{e} at offset {start}")))
            }
        }
    }
}

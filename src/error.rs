// Crate-wide error type.
//
// Every fallible operation in the decoder, the LZX engine and the update
// driver reports through `Error`. `Error::kind()` folds the variants onto the
// five failure classes callers act on: I/O, format, decompression, missing
// identity and cancellation.

use std::io;

use crate::lzx::LzxError;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Underlying stream or filesystem failure.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A read ran past the end of the buffer.
    #[error("truncated input: needed {needed} more byte(s) at offset {offset}")]
    Truncated { offset: u64, needed: usize },

    /// Structurally invalid data: bad magic, bad version, malformed varint.
    #[error("format error: {0}")]
    Format(String),

    /// A present property carries a type tag this decoder cannot size.
    #[error("unsupported property type {:#06X} in property {id:#010X}", .id & 0xFFFF)]
    UnsupportedPropertyType { id: u32 },

    /// The LZX engine rejected a compressed block.
    #[error("decompression failed: {0}")]
    Decompression(#[from] LzxError),

    /// A contact record decoded cleanly but has no field usable as its uid.
    #[error("record has no usable identifier")]
    IdentityMissing,

    #[error("operation cancelled")]
    Cancelled,
}

/// Coarse failure class of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Io,
    Format,
    Decompression,
    IdentityMissing,
    Cancelled,
}

impl Error {
    pub fn format(msg: impl Into<String>) -> Self {
        Self::Format(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Io(_) | Self::Truncated { .. } => ErrorKind::Io,
            Self::Format(_) | Self::UnsupportedPropertyType { .. } => ErrorKind::Format,
            Self::Decompression(_) => ErrorKind::Decompression,
            Self::IdentityMissing => ErrorKind::IdentityMissing,
            Self::Cancelled => ErrorKind::Cancelled,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

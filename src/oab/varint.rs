// OAB compact unsigned integer encoding.
//
// One lead byte. With bit 7 clear the byte is the value (0..=127). With
// bit 7 set, the low nibble selects how many bytes follow:
//   1 -> one raw byte
//   2 -> u16 little-endian
//   3 -> three bytes read as a decimal string (see `decimal_arm`)
//   4 -> u32 little-endian
// Any other nibble is malformed.

use std::io::{self, Write};

/// Maximum encoded length (lead byte + 4).
pub const MAX_VARINT_LEN: usize = 5;

const LONG_FORM: u8 = 0x80;

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Encode `num` into the front of `buf`, returning the number of bytes used.
///
/// Always picks the shortest binary form; the decimal arm is never emitted.
#[inline]
pub fn encode_u32(num: u32, buf: &mut [u8; MAX_VARINT_LEN]) -> usize {
    if num < 0x80 {
        buf[0] = num as u8;
        1
    } else if num <= 0xFF {
        buf[0] = LONG_FORM | 1;
        buf[1] = num as u8;
        2
    } else if num <= 0xFFFF {
        buf[0] = LONG_FORM | 2;
        buf[1..3].copy_from_slice(&(num as u16).to_le_bytes());
        3
    } else {
        buf[0] = LONG_FORM | 4;
        buf[1..5].copy_from_slice(&num.to_le_bytes());
        5
    }
}

/// Encode a `u32` and write it to a `Write` sink.
pub fn write_u32<W: Write>(w: &mut W, num: u32) -> io::Result<()> {
    let mut buf = [0u8; MAX_VARINT_LEN];
    let len = encode_u32(num, &mut buf);
    w.write_all(&buf[..len])
}

/// Encoded byte length of `num`.
#[inline]
pub fn sizeof_u32(num: u32) -> usize {
    match num {
        0..=0x7F => 1,
        0x80..=0xFF => 2,
        0x100..=0xFFFF => 3,
        _ => 5,
    }
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Decode a value from the front of `data`.
/// Returns `(value, bytes_consumed)`.
pub fn read_u32(data: &[u8]) -> Result<(u32, usize), VarIntError> {
    let Some(&lead) = data.first() else {
        return Err(VarIntError::Truncated { needed: 1 });
    };
    if lead & LONG_FORM == 0 {
        return Ok((u32::from(lead), 1));
    }

    let arm = lead & 0x0F;
    let width = match arm {
        1..=4 => arm as usize,
        _ => return Err(VarIntError::InvalidArm(lead)),
    };
    let body = data
        .get(1..1 + width)
        .ok_or(VarIntError::Truncated {
            needed: 1 + width - data.len(),
        })?;

    let value = match width {
        1 => u32::from(body[0]),
        2 => u32::from(u16::from_le_bytes([body[0], body[1]])),
        3 => decimal_arm([body[0], body[1], body[2]]),
        _ => u32::from_le_bytes([body[0], body[1], body[2], body[3]]),
    };
    Ok((value, 1 + width))
}

/// The three-byte arm treats its payload as a NUL-terminated string,
/// prefixes a `'0'`, takes the leading run of ASCII digits as a decimal
/// number, then byte-swaps the 32-bit result and shifts right by 8.
///
/// Payloads that are not digits therefore decode to 0. Writers in the wild
/// never produce this arm for binary data; it is reproduced as-is so that
/// streams which do use it stay byte-compatible with existing readers.
fn decimal_arm(raw: [u8; 3]) -> u32 {
    let text = raw.split(|&b| b == 0).next().unwrap_or(&[]);
    let digits = std::iter::once(b'0')
        .chain(text.iter().copied())
        .take_while(u8::is_ascii_digit);
    // At most four digits, so this never overflows.
    let parsed = digits.fold(0u32, |acc, d| acc * 10 + u32::from(d - b'0'));
    parsed.swap_bytes() >> 8
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum VarIntError {
    /// Not enough input bytes to complete the integer.
    #[error("varint truncated: {needed} more byte(s) needed")]
    Truncated { needed: usize },
    /// Lead byte selects a width other than 1..=4.
    #[error("invalid varint lead byte {0:#04X}")]
    InvalidArm(u8),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

// Bit reader for LZX.
//
// Input is consumed as 16-bit little-endian words; bits within the buffer are
// taken most-significant first. Reads past the end of the input are served
// zero words up to a small limit, because the encoder is allowed to end a
// block in the middle of the last word and the Huffman decoder always peeks
// a full 16 bits.

use super::LzxError;

/// Zero bytes handed out past the end of input before giving up.
const MAX_PADDING: usize = 8;

pub struct Bitstream<'a> {
    data: &'a [u8],
    pos: usize,
    /// Valid bits are left-aligned (MSB first).
    buf: u64,
    bits: u32,
    padding: usize,
}

impl<'a> Bitstream<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            buf: 0,
            bits: 0,
            padding: 0,
        }
    }

    /// Byte offset of the next word to be loaded.
    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    #[inline]
    pub fn bits_left(&self) -> u32 {
        self.bits
    }

    fn refill(&mut self) -> Result<(), LzxError> {
        let word = match self.data.get(self.pos..self.pos + 2) {
            Some(w) => {
                self.pos += 2;
                u16::from_le_bytes([w[0], w[1]])
            }
            None => {
                if self.padding >= MAX_PADDING {
                    return Err(LzxError::UnexpectedEof);
                }
                // An odd trailing byte still counts as the low half.
                let lo = self.data.get(self.pos).copied().unwrap_or(0);
                self.pos = self.data.len();
                self.padding += 2;
                u16::from(lo)
            }
        };
        self.buf |= u64::from(word) << (48 - self.bits);
        self.bits += 16;
        Ok(())
    }

    /// Make at least `n` (<= 32) bits available.
    #[inline]
    pub fn ensure(&mut self, n: u32) -> Result<(), LzxError> {
        while self.bits < n {
            self.refill()?;
        }
        Ok(())
    }

    /// Top `n` buffered bits without consuming them. Call `ensure` first.
    #[inline]
    pub fn peek(&self, n: u32) -> u32 {
        if n == 0 { 0 } else { (self.buf >> (64 - n)) as u32 }
    }

    #[inline]
    pub fn remove(&mut self, n: u32) {
        debug_assert!(n <= self.bits);
        self.buf <<= n;
        self.bits -= n;
    }

    #[inline]
    pub fn read_bits(&mut self, n: u32) -> Result<u32, LzxError> {
        if n == 0 {
            return Ok(0);
        }
        self.ensure(n)?;
        let v = self.peek(n);
        self.remove(n);
        Ok(v)
    }

    /// Drop whatever is buffered; the next read starts at `position()`.
    #[inline]
    pub fn discard(&mut self) {
        self.buf = 0;
        self.bits = 0;
    }

    /// One byte straight from the input, bypassing the bit buffer.
    pub fn read_raw_byte(&mut self) -> Result<u8, LzxError> {
        let b = *self.data.get(self.pos).ok_or(LzxError::UnexpectedEof)?;
        self.pos += 1;
        Ok(b)
    }

    /// Fill `dst` straight from the input.
    pub fn read_raw(&mut self, dst: &mut [u8]) -> Result<(), LzxError> {
        let src = self
            .data
            .get(self.pos..self.pos + dst.len())
            .ok_or(LzxError::UnexpectedEof)?;
        dst.copy_from_slice(src);
        self.pos += dst.len();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn words_are_little_endian_bits_msb_first() {
        // Word 0x8001 -> bits 1000 0000 0000 0001.
        let data = [0x01, 0x80, 0xFF, 0x00];
        let mut bs = Bitstream::new(&data);
        assert_eq!(bs.read_bits(1).unwrap(), 1);
        assert_eq!(bs.read_bits(14).unwrap(), 0);
        assert_eq!(bs.read_bits(1).unwrap(), 1);
        assert_eq!(bs.read_bits(8).unwrap(), 0x00);
        assert_eq!(bs.read_bits(8).unwrap(), 0xFF);
    }

    #[test]
    fn reads_spanning_words() {
        let data = [0x34, 0x12, 0x78, 0x56];
        let mut bs = Bitstream::new(&data);
        assert_eq!(bs.read_bits(4).unwrap(), 0x1);
        assert_eq!(bs.read_bits(24).unwrap(), 0x23_4567);
        assert_eq!(bs.bits_left(), 4);
        assert_eq!(bs.read_bits(4).unwrap(), 0x8);
    }

    #[test]
    fn padding_is_bounded() {
        let data = [0xFF, 0xFF];
        let mut bs = Bitstream::new(&data);
        assert_eq!(bs.read_bits(16).unwrap(), 0xFFFF);
        for _ in 0..MAX_PADDING / 2 {
            assert_eq!(bs.read_bits(16).unwrap(), 0);
        }
        assert_eq!(bs.read_bits(1), Err(LzxError::UnexpectedEof));
    }

    #[test]
    fn raw_bytes_after_discard() {
        let data = [0x00, 0x80, 0xAA, 0xBB, 0xCC];
        let mut bs = Bitstream::new(&data);
        assert_eq!(bs.read_bits(1).unwrap(), 1);
        bs.discard();
        assert_eq!(bs.read_raw_byte().unwrap(), 0xAA);
        let mut two = [0u8; 2];
        bs.read_raw(&mut two).unwrap();
        assert_eq!(two, [0xBB, 0xCC]);
        assert_eq!(bs.read_raw_byte(), Err(LzxError::UnexpectedEof));
    }
}

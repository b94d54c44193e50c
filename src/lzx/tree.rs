// Canonical Huffman trees.
//
// Codes are assigned in (length, symbol) order. Decoding walks the code one
// bit at a time against per-length counts, which keeps the tables small
// enough to rebuild for every block.

use super::LzxError;
use super::bitstream::Bitstream;

/// Longest code LZX can describe.
pub const MAX_CODE_LEN: usize = 16;

#[derive(Debug, Clone, Default)]
pub struct Tree {
    counts: [u16; MAX_CODE_LEN + 1],
    /// Symbols sorted by code.
    symbols: Vec<u16>,
}

impl Tree {
    /// Build from per-symbol code lengths (0 = unused).
    ///
    /// Over-subscribed length sets are rejected. Incomplete sets are
    /// accepted; an all-zero set gives an empty tree that cannot decode.
    pub fn build(lens: &[u8]) -> Result<Self, LzxError> {
        let mut counts = [0u16; MAX_CODE_LEN + 1];
        for &len in lens {
            let len = usize::from(len);
            if len > MAX_CODE_LEN {
                return Err(LzxError::InvalidPathLengths);
            }
            counts[len] += 1;
        }
        counts[0] = 0;

        let mut left: i32 = 1;
        for &count in &counts[1..] {
            left = (left << 1) - i32::from(count);
            if left < 0 {
                return Err(LzxError::InvalidPathLengths);
            }
        }

        let mut offsets = [0u16; MAX_CODE_LEN + 2];
        for len in 1..=MAX_CODE_LEN {
            offsets[len + 1] = offsets[len] + counts[len];
        }
        let used = usize::from(offsets[MAX_CODE_LEN + 1]);
        let mut symbols = vec![0u16; used];
        for (sym, &len) in lens.iter().enumerate() {
            if len != 0 {
                let slot = &mut offsets[usize::from(len)];
                symbols[usize::from(*slot)] = sym as u16;
                *slot += 1;
            }
        }
        Ok(Self { counts, symbols })
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn decode(&self, bs: &mut Bitstream<'_>) -> Result<u16, LzxError> {
        if self.is_empty() {
            return Err(LzxError::EmptyTree);
        }
        bs.ensure(MAX_CODE_LEN as u32)?;
        let bits = bs.peek(MAX_CODE_LEN as u32);

        let mut code: i32 = 0;
        let mut first: i32 = 0;
        let mut index: i32 = 0;
        for len in 1..=MAX_CODE_LEN {
            code |= ((bits >> (MAX_CODE_LEN - len)) & 1) as i32;
            let count = i32::from(self.counts[len]);
            if code - first < count {
                bs.remove(len as u32);
                return Ok(self.symbols[(index + code - first) as usize]);
            }
            index += count;
            first = (first + count) << 1;
            code <<= 1;
        }
        Err(LzxError::InvalidHuffmanCode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_canonical_codes() {
        // A=0 (len 1), B=10, C=110, D=111.
        let tree = Tree::build(&[1, 2, 3, 3]).unwrap();
        // Bits: 0 10 110 111 0... => A B C D A
        let word: u16 = 0b0101_1011_1000_0000;
        let data = word.to_le_bytes();
        let mut bs = Bitstream::new(&data);
        let got: Vec<u16> = (0..5).map(|_| tree.decode(&mut bs).unwrap()).collect();
        assert_eq!(got, vec![0, 1, 2, 3, 0]);
    }

    #[test]
    fn unused_symbols_are_skipped() {
        // Symbols 0 and 2 unused.
        let tree = Tree::build(&[0, 1, 0, 1]).unwrap();
        let data = 0b1000_0000_0000_0000u16.to_le_bytes();
        let mut bs = Bitstream::new(&data);
        assert_eq!(tree.decode(&mut bs).unwrap(), 3);
        assert_eq!(tree.decode(&mut bs).unwrap(), 1);
    }

    #[test]
    fn oversubscribed_rejected() {
        assert_eq!(
            Tree::build(&[1, 1, 1]).unwrap_err(),
            LzxError::InvalidPathLengths
        );
    }

    #[test]
    fn empty_tree_cannot_decode() {
        let tree = Tree::build(&[0; 8]).unwrap();
        assert!(tree.is_empty());
        let data = [0u8; 4];
        assert_eq!(
            tree.decode(&mut Bitstream::new(&data)),
            Err(LzxError::EmptyTree)
        );
    }

    #[test]
    fn incomplete_code_reports_unmatched_pattern() {
        // Only "0" is assigned; "1..." matches nothing.
        let tree = Tree::build(&[1]).unwrap();
        let data = 0xFFFFu16.to_le_bytes();
        assert_eq!(
            tree.decode(&mut Bitstream::new(&data)),
            Err(LzxError::InvalidHuffmanCode)
        );
    }
}

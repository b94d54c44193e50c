// LZX DELTA decoder.
//
// The stream is a sequence of 32 KiB frames. Every frame starts with a
// 16-bit chunk-size word (skipped), the first frame additionally carries the
// E8 translation header. Frames are built from verbatim, aligned-offset and
// uncompressed blocks; a block may span several frames but a match never
// crosses a frame boundary.
//
// Reference data, if any, sits at the very end of the window so that match
// offsets reaching past the start of the output land in it.

use log::trace;

use super::bitstream::Bitstream;
use super::tree::Tree;
use super::{FRAME_SIZE, LzxError, MAX_WINDOW_BITS, MIN_WINDOW_BITS};

const MIN_MATCH: usize = 2;
const MAX_MATCH: usize = 257;
const NUM_CHARS: usize = 256;
const NUM_PRIMARY_LENGTHS: usize = 7;
const NUM_SECONDARY_LENGTHS: usize = 249;
const PRETREE_SIZE: usize = 20;
const ALIGNED_SIZE: usize = 8;

/// Run-length codes may write this far past the end of a length table.
const LENTABLE_SAFETY: usize = 64;

/// Position slots for window sizes 2^15 ..= 2^25.
const POSITION_SLOTS: [usize; 11] = [30, 32, 34, 36, 38, 42, 50, 66, 98, 162, 290];

const fn extra_bits(slot: usize) -> u32 {
    if slot < 4 {
        0
    } else if slot < 36 {
        (slot / 2 - 1) as u32
    } else {
        17
    }
}

const POSITION_BASE: [u32; 291] = {
    let mut pb = [0u32; 291];
    let mut i = 1;
    while i < pb.len() {
        pb[i] = pb[i - 1] + (1 << extra_bits(i - 1));
        i += 1;
    }
    pb
};

/// E8 translation stops after this many frames (1 GiB of output).
const E8_MAX_FRAMES: u32 = 32768;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockType {
    Verbatim,
    Aligned,
    Uncompressed,
}

/// Decoder for one LZX DELTA stream.
pub struct LzxDecoder {
    window: Vec<u8>,
    window_bits: u32,
    ref_data_size: usize,
    /// Match symbols in the main tree (8 per position slot).
    num_offsets: usize,

    r: [u32; 3],

    main_lens: Vec<u8>,
    length_lens: Vec<u8>,
    aligned_lens: [u8; ALIGNED_SIZE],
    main_tree: Tree,
    length_tree: Tree,
    aligned_tree: Tree,

    block_type: Option<BlockType>,
    block_length: usize,
    block_remaining: usize,

    header_read: bool,
    intel_filesize: i32,
    intel_curpos: i32,
    intel_started: bool,

    frame: u32,
    frame_posn: usize,
    window_posn: usize,
    /// Bytes emitted so far.
    offset: u64,
}

impl LzxDecoder {
    /// New decoder with a `2^window_bits` byte window.
    pub fn new(window_bits: u32) -> Result<Self, LzxError> {
        if !(MIN_WINDOW_BITS..=MAX_WINDOW_BITS).contains(&window_bits) {
            return Err(LzxError::InvalidWindowBits(window_bits));
        }
        let window_size = 1usize << window_bits;
        let num_offsets = POSITION_SLOTS[(window_bits - 15) as usize] << 3;
        Ok(Self {
            window: vec![0; window_size],
            window_bits,
            ref_data_size: 0,
            num_offsets,
            r: [1, 1, 1],
            main_lens: vec![0; NUM_CHARS + num_offsets + LENTABLE_SAFETY],
            length_lens: vec![0; NUM_SECONDARY_LENGTHS + LENTABLE_SAFETY],
            aligned_lens: [0; ALIGNED_SIZE],
            main_tree: Tree::default(),
            length_tree: Tree::default(),
            aligned_tree: Tree::default(),
            block_type: None,
            block_length: 0,
            block_remaining: 0,
            header_read: false,
            intel_filesize: 0,
            intel_curpos: 0,
            intel_started: false,
            frame: 0,
            frame_posn: 0,
            window_posn: 0,
            offset: 0,
        })
    }

    #[inline]
    pub fn window_bits(&self) -> u32 {
        self.window_bits
    }

    #[inline]
    pub fn window_size(&self) -> usize {
        self.window.len()
    }

    /// Place `data` at the end of the window as the dictionary for a patch.
    /// Must be called before decoding.
    pub fn set_reference_data(&mut self, data: &[u8]) -> Result<(), LzxError> {
        if self.offset != 0 || self.header_read {
            return Err(LzxError::ReferenceAfterStart);
        }
        let ws = self.window.len();
        if data.len() > ws {
            return Err(LzxError::WindowTooSmall {
                len: data.len(),
                window: ws,
            });
        }
        self.window[ws - data.len()..].copy_from_slice(data);
        self.ref_data_size = data.len();
        Ok(())
    }

    /// Decode `out_len` bytes from `input`.
    pub fn decompress(mut self, input: &[u8], out_len: usize) -> Result<Vec<u8>, LzxError> {
        let mut out = Vec::with_capacity(out_len);
        let mut bs = Bitstream::new(input);

        while out.len() < out_len {
            // Chunk size prefix; frames are located by output size instead.
            bs.ensure(16)?;
            bs.remove(16);

            if !self.header_read {
                self.header_read = true;
                let (mut hi, mut lo) = (0, 0);
                if bs.read_bits(1)? == 1 {
                    hi = bs.read_bits(16)?;
                    lo = bs.read_bits(16)?;
                }
                self.intel_filesize = ((hi << 16) | lo) as i32;
                trace!("lzx: E8 file size {}", self.intel_filesize);
            }

            let frame_size = FRAME_SIZE.min(out_len - out.len());
            self.decode_frame(&mut bs, frame_size)?;

            // Re-align to the next 16-bit word.
            if bs.bits_left() > 0 {
                bs.ensure(16)?;
            }
            let stray = bs.bits_left() & 15;
            if stray > 0 {
                bs.remove(stray);
            }

            self.emit_frame(frame_size, &mut out);
        }
        Ok(out)
    }

    fn decode_frame(
        &mut self,
        bs: &mut Bitstream<'_>,
        frame_size: usize,
    ) -> Result<(), LzxError> {
        let mut bytes_todo = (self.frame_posn + frame_size) as i64 - self.window_posn as i64;
        while bytes_todo > 0 {
            if self.block_remaining == 0 {
                self.read_block_header(bs)?;
            }

            let mut this_run = (self.block_remaining as i64).min(bytes_todo);
            bytes_todo -= this_run;
            self.block_remaining -= this_run as usize;

            match self.block_type {
                Some(BlockType::Verbatim) => this_run = self.decode_run(bs, this_run, false)?,
                Some(BlockType::Aligned) => this_run = self.decode_run(bs, this_run, true)?,
                Some(BlockType::Uncompressed) => {
                    let run = this_run as usize;
                    let dst = self
                        .window
                        .get_mut(self.window_posn..self.window_posn + run)
                        .ok_or(LzxError::OverreadBlock)?;
                    bs.read_raw(dst)?;
                    self.window_posn += run;
                    this_run = 0;
                }
                None => return Err(LzxError::InvalidBlock(0)),
            }

            // A match may run past the planned end of the run; charge the
            // excess to the block.
            if this_run < 0 {
                let over = this_run.unsigned_abs() as usize;
                if over > self.block_remaining {
                    return Err(LzxError::OverreadBlock);
                }
                self.block_remaining -= over;
            }
        }

        let actual = self.window_posn - self.frame_posn;
        if actual != frame_size {
            return Err(LzxError::FrameSizeMismatch {
                expected: frame_size,
                actual,
            });
        }
        Ok(())
    }

    fn read_block_header(&mut self, bs: &mut Bitstream<'_>) -> Result<(), LzxError> {
        // Uncompressed blocks of odd length are followed by one pad byte.
        if self.block_type == Some(BlockType::Uncompressed) && self.block_length & 1 == 1 {
            bs.read_raw_byte()?;
        }

        let kind = bs.read_bits(3)? as u8;
        let hi = bs.read_bits(16)?;
        let lo = bs.read_bits(8)?;
        self.block_length = ((hi << 8) | lo) as usize;
        self.block_remaining = self.block_length;

        let block_type = match kind {
            1 => {
                self.read_main_and_length_trees(bs)?;
                BlockType::Verbatim
            }
            2 => {
                for len in self.aligned_lens.iter_mut() {
                    *len = bs.read_bits(3)? as u8;
                }
                self.aligned_tree = Tree::build(&self.aligned_lens)?;
                self.read_main_and_length_trees(bs)?;
                BlockType::Aligned
            }
            3 => {
                self.intel_started = true;
                // Skip to the next word boundary (1..=16 bits).
                if bs.bits_left() == 0 {
                    bs.ensure(16)?;
                }
                bs.discard();
                let mut raw = [0u8; 12];
                bs.read_raw(&mut raw)?;
                for (r, chunk) in self.r.iter_mut().zip(raw.chunks_exact(4)) {
                    *r = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
                }
                BlockType::Uncompressed
            }
            other => return Err(LzxError::InvalidBlock(other)),
        };
        trace!(
            "lzx: {:?} block of {} bytes at output {}",
            block_type, self.block_length, self.offset
        );
        self.block_type = Some(block_type);
        Ok(())
    }

    fn read_main_and_length_trees(&mut self, bs: &mut Bitstream<'_>) -> Result<(), LzxError> {
        let main_syms = NUM_CHARS + self.num_offsets;
        read_lengths(bs, &mut self.main_lens, 0, NUM_CHARS)?;
        read_lengths(bs, &mut self.main_lens, NUM_CHARS, main_syms)?;
        self.main_tree = Tree::build(&self.main_lens[..main_syms])?;
        if self.main_lens[0xE8] != 0 {
            self.intel_started = true;
        }

        read_lengths(bs, &mut self.length_lens, 0, NUM_SECONDARY_LENGTHS)?;
        self.length_tree = Tree::build(&self.length_lens[..NUM_SECONDARY_LENGTHS])?;
        Ok(())
    }

    /// Decode literals and matches until at least `run` bytes are produced.
    /// Returns `run` minus what was produced (zero or negative).
    fn decode_run(
        &mut self,
        bs: &mut Bitstream<'_>,
        mut run: i64,
        aligned: bool,
    ) -> Result<i64, LzxError> {
        while run > 0 {
            let main = usize::from(self.main_tree.decode(bs)?);
            if main < NUM_CHARS {
                let slot = self
                    .window
                    .get_mut(self.window_posn)
                    .ok_or(LzxError::OverreadBlock)?;
                *slot = main as u8;
                self.window_posn += 1;
                run -= 1;
                continue;
            }

            let main = main - NUM_CHARS;
            let mut length = main & NUM_PRIMARY_LENGTHS;
            if length == NUM_PRIMARY_LENGTHS {
                length += usize::from(self.length_tree.decode(bs)?);
            }
            length += MIN_MATCH;

            let slot = main >> 3;
            let offset: u32 = match slot {
                0 => self.r[0],
                1 => {
                    self.r.swap(0, 1);
                    self.r[0]
                }
                2 => {
                    self.r.swap(0, 2);
                    self.r[0]
                }
                _ => {
                    let offset = if aligned {
                        self.aligned_offset(bs, slot)?
                    } else {
                        POSITION_BASE[slot] - 2 + bs.read_bits(extra_bits(slot))?
                    };
                    self.r = [offset, self.r[0], self.r[1]];
                    offset
                }
            };

            if length == MAX_MATCH {
                length += read_extended_length(bs)?;
            }

            self.copy_match(offset as usize, length)?;
            run -= length as i64;
        }
        Ok(run)
    }

    fn aligned_offset(&self, bs: &mut Bitstream<'_>, slot: usize) -> Result<u32, LzxError> {
        let extra = extra_bits(slot);
        let base = POSITION_BASE[slot] - 2;
        Ok(match extra {
            0 => 1,
            1 | 2 => base + bs.read_bits(extra)?,
            3 => base + u32::from(self.aligned_tree.decode(bs)?),
            _ => {
                let verbatim = bs.read_bits(extra - 3)? << 3;
                base + verbatim + u32::from(self.aligned_tree.decode(bs)?)
            }
        })
    }

    fn copy_match(&mut self, offset: usize, length: usize) -> Result<(), LzxError> {
        let ws = self.window.len();
        let posn = self.window_posn;
        if posn + length > ws {
            return Err(LzxError::MatchPastWindow {
                position: posn,
                length,
            });
        }

        if offset > posn {
            // Source lies before the window start: reference data, or
            // output that has wrapped.
            let back = offset - posn;
            if offset as u64 > self.offset && back > self.ref_data_size {
                return Err(LzxError::MatchBeforeStart { offset });
            }
            if back > ws {
                return Err(LzxError::MatchBeforeStart { offset });
            }
            let src = ws - back;
            if back < length {
                copy_forward(&mut self.window, src, posn, back);
                copy_forward(&mut self.window, 0, posn + back, length - back);
            } else {
                copy_forward(&mut self.window, src, posn, length);
            }
        } else {
            copy_forward(&mut self.window, posn - offset, posn, length);
        }
        self.window_posn += length;
        Ok(())
    }

    fn emit_frame(&mut self, frame_size: usize, out: &mut Vec<u8>) {
        let start = out.len();
        out.extend_from_slice(&self.window[self.frame_posn..self.frame_posn + frame_size]);

        if self.intel_started
            && self.intel_filesize != 0
            && self.frame < E8_MAX_FRAMES
            && frame_size > 10
        {
            e8_translate(&mut out[start..], self.intel_curpos, self.intel_filesize);
            self.intel_curpos = self.intel_curpos.wrapping_add(frame_size as i32);
        } else if self.intel_filesize != 0 {
            self.intel_curpos = self.intel_curpos.wrapping_add(frame_size as i32);
        }

        self.offset += frame_size as u64;
        self.frame += 1;
        self.frame_posn += frame_size;

        let ws = self.window.len();
        if self.window_posn == ws {
            self.window_posn = 0;
        }
        if self.frame_posn == ws {
            self.frame_posn = 0;
        }
    }
}

/// Read pretree-coded deltas for `lens[first..last]`.
fn read_lengths(
    bs: &mut Bitstream<'_>,
    lens: &mut [u8],
    first: usize,
    last: usize,
) -> Result<(), LzxError> {
    let mut pre_lens = [0u8; PRETREE_SIZE];
    for len in pre_lens.iter_mut() {
        *len = bs.read_bits(4)? as u8;
    }
    let pretree = Tree::build(&pre_lens)?;

    let mut x = first;
    while x < last {
        let (run, value) = match pretree.decode(bs)? {
            17 => (bs.read_bits(4)? as usize + 4, 0),
            18 => (bs.read_bits(5)? as usize + 20, 0),
            19 => {
                let run = bs.read_bits(1)? as usize + 4;
                let z = pretree.decode(bs)?;
                if z > 16 {
                    return Err(LzxError::InvalidPretreeRle);
                }
                let prev = *lens.get(x).ok_or(LzxError::InvalidPretreeRle)?;
                (run, delta_len(prev, z))
            }
            z => (1, delta_len(lens[x], z)),
        };
        lens.get_mut(x..x + run)
            .ok_or(LzxError::InvalidPretreeRle)?
            .fill(value);
        x += run;
    }
    Ok(())
}

#[inline]
fn delta_len(prev: u8, z: u16) -> u8 {
    (i32::from(prev) - i32::from(z)).rem_euclid(17) as u8
}

fn read_extended_length(bs: &mut Bitstream<'_>) -> Result<usize, LzxError> {
    bs.ensure(3)?;
    let extra = if bs.peek(1) == 0 {
        bs.remove(1);
        bs.read_bits(8)?
    } else if bs.peek(2) == 0b10 {
        bs.remove(2);
        bs.read_bits(10)? + 0x100
    } else if bs.peek(3) == 0b110 {
        bs.remove(3);
        bs.read_bits(12)? + 0x500
    } else {
        bs.remove(3);
        bs.read_bits(15)?
    };
    Ok(extra as usize)
}

/// Byte-at-a-time copy so overlapping matches repeat their pattern.
#[inline]
fn copy_forward(window: &mut [u8], src: usize, dst: usize, len: usize) {
    for k in 0..len {
        window[dst + k] = window[src + k];
    }
}

/// Undo the E8 (x86 CALL) translation in one frame of output.
fn e8_translate(buf: &mut [u8], mut curpos: i32, filesize: i32) {
    let end = buf.len() - 10;
    let mut i = 0;
    while i < end {
        let b = buf[i];
        i += 1;
        if b != 0xE8 {
            curpos = curpos.wrapping_add(1);
            continue;
        }
        let abs = i32::from_le_bytes([buf[i], buf[i + 1], buf[i + 2], buf[i + 3]]);
        if abs >= curpos.wrapping_neg() && abs < filesize {
            let rel = if abs >= 0 {
                abs.wrapping_sub(curpos)
            } else {
                abs.wrapping_add(filesize)
            };
            buf[i..i + 4].copy_from_slice(&rel.to_le_bytes());
        }
        i += 4;
        curpos = curpos.wrapping_add(5);
    }
}

// LZX DELTA decompression and the OAB compressed container.
//
// - bitstream: 16-bit little-endian word reader, MSB-first bit order
// - tree:      canonical Huffman trees
// - decoder:   the LZX DELTA frame/block decoder with reference data
// - container: full and patch container headers, block loop

pub mod bitstream;
pub mod container;
pub mod decoder;
pub mod tree;

pub use container::{
    BlockHeader, LZX_FULL_VERSION, LZX_H_VERSION, LZX_PATCH_VERSION, LzxHeader, PatchBlockHeader,
    PatchHeader, decompress_full, decompress_full_to, decompress_patch, decompress_patch_to,
    window_bits_for,
};
pub use decoder::LzxDecoder;

/// Uncompressed size of one LZX frame.
pub const FRAME_SIZE: usize = 32 * 1024;

/// Smallest window the DELTA variant allows (128 KiB).
pub const MIN_WINDOW_BITS: u32 = 17;

/// Largest window the DELTA variant allows (32 MiB).
pub const MAX_WINDOW_BITS: u32 = 25;

/// Failure inside the LZX bitstream decoder.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LzxError {
    #[error("compressed data ended before the block was complete")]
    UnexpectedEof,

    #[error("window size 2^{0} outside 2^17..=2^25")]
    InvalidWindowBits(u32),

    #[error("reference data of {len} bytes does not fit a {window}-byte window")]
    WindowTooSmall { len: usize, window: usize },

    #[error("reference data must be set before decoding starts")]
    ReferenceAfterStart,

    #[error("block type {0} is invalid")]
    InvalidBlock(u8),

    #[error("invalid Huffman path lengths")]
    InvalidPathLengths,

    #[error("bit pattern matches no Huffman code")]
    InvalidHuffmanCode,

    #[error("symbol needed from an empty Huffman tree")]
    EmptyTree,

    #[error("pretree run-length code overruns the length table")]
    InvalidPretreeRle,

    #[error("match of {length} bytes at window position {position} runs past the window")]
    MatchPastWindow { position: usize, length: usize },

    #[error("match offset {offset} reaches before the start of the stream")]
    MatchBeforeStart { offset: usize },

    #[error("decoded more bytes than the current block holds")]
    OverreadBlock,

    #[error("frame decoded to {actual} bytes instead of {expected}")]
    FrameSizeMismatch { expected: usize, actual: usize },
}

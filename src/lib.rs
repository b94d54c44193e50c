//! oabkit: Offline Address Book (OAB v4) decoding and LZX DELTA patching.
//!
//! The crate provides:
//! - A bounds-checked OAB record decoder with a pull-style record iterator (`oab`)
//! - An LZX DELTA decompressor for full and patch containers (`lzx`)
//! - File-oriented helpers (`io`)
//! - A snapshot update planner and driver (`update`)
//! - An optional CLI (`cli` feature)
//!
//! # Quick Start
//!
//! ```no_run
//! use oabkit::CancelToken;
//! use oabkit::oab::OabDecoder;
//!
//! let mut decoder = OabDecoder::open("udetails.oab")?;
//! let stats = decoder.decode(
//!     |_offset, _hash| true,
//!     |rec| {
//!         println!("{:?}", rec.contact.email());
//!         Ok(())
//!     },
//!     &CancelToken::new(),
//! )?;
//! println!("{} records", stats.emitted);
//! # Ok::<(), oabkit::Error>(())
//! ```

pub mod cancel;
pub mod cursor;
pub mod error;
pub mod io;
pub mod lzx;
pub mod oab;
pub mod update;

#[cfg(feature = "cli")]
pub mod cli;

pub use cancel::CancelToken;
pub use error::{Error, ErrorKind, Result};

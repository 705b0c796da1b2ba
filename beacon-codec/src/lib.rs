//! # beacon-codec
//!
//! Frames one RPC exchange, a header followed by a body, over a byte-stream
//! connection.
//!
//! This crate provides:
//! - `Codec` - read header, read body, write, close
//! - `FramedCodec` - the `Codec` over any tokio `AsyncRead + AsyncWrite`
//! - `FrameCodec` - length-prefixed frame encoder/decoder
//! - `Rkyv` and `Json` encodings behind the `Encoding` trait
//!
//! ## Frame Format
//!
//! ```text
//! +----------------+------------------+----------------+------------------+
//! | Length (4 LE)  | Header payload   | Length (4 LE)  | Body payload     |
//! +----------------+------------------+----------------+------------------+
//! ```
//!
//! Each payload is encoded independently, so a reader can decode the header
//! before deciding what type the body is.

mod codec;
mod encoding;
mod frame;

pub use codec::{Codec, FramedCodec};
pub use encoding::{Encoding, Format, Json, Rkyv};
pub use frame::{DEFAULT_MAX_FRAME_SIZE, FrameCodec, LENGTH_PREFIX};

// Re-export for convenience
pub use rkyv::util::AlignedVec;

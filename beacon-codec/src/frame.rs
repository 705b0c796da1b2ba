//! Length-prefixed frames carrying one encoded value each.

use ntex_bytes::{Buf, BufMut, BytesMut};
use ntex_codec::{Decoder, Encoder};
use rkyv::util::AlignedVec;

use beacon_core::CodecError;

/// Default maximum frame size (16 MB).
pub const DEFAULT_MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Size of the length prefix in bytes.
pub const LENGTH_PREFIX: usize = 4;

/// Frame codec splitting a byte stream into independently decodable values.
///
/// A header and its body travel as two consecutive frames. Decoded frames
/// are returned as `AlignedVec` so rkyv can validate them in place.
///
/// ## Frame Format
///
/// ```text
/// +----------------+------------------+
/// | Length (4 LE)  | Payload (N bytes)|
/// +----------------+------------------+
/// ```
///
/// ## Example
///
/// ```rust
/// use beacon_codec::FrameCodec;
/// use ntex_bytes::BytesMut;
/// use ntex_codec::Decoder;
///
/// let codec = FrameCodec::new();
/// let mut buf = BytesMut::new();
///
/// codec.encode_slice(b"header", &mut buf).unwrap();
/// codec.encode_slice(b"body", &mut buf).unwrap();
///
/// assert_eq!(codec.decode(&mut buf).unwrap().unwrap().as_slice(), b"header");
/// assert_eq!(codec.decode(&mut buf).unwrap().unwrap().as_slice(), b"body");
/// ```
#[derive(Debug, Clone)]
pub struct FrameCodec {
    max_frame_size: usize,
}

impl FrameCodec {
    /// Create a new codec with default settings.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }

    /// Create a codec with a custom maximum frame size.
    #[inline]
    #[must_use]
    pub fn with_max_frame_size(max_frame_size: usize) -> Self {
        Self { max_frame_size }
    }

    /// Get the maximum frame size.
    #[inline]
    #[must_use]
    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }

    #[inline]
    fn check_size(&self, size: usize) -> Result<(), CodecError> {
        // The prefix is a u32, so the hard ceiling applies regardless of config.
        let max = self.max_frame_size.min(u32::MAX as usize);
        if size > max {
            return Err(CodecError::FrameTooLarge { size, max });
        }
        Ok(())
    }

    /// Encode a byte slice as one frame.
    pub fn encode_slice(&self, item: &[u8], dst: &mut BytesMut) -> Result<(), CodecError> {
        let len = item.len();
        self.check_size(len)?;

        dst.reserve(LENGTH_PREFIX + len);
        dst.put_u32_le(len as u32);
        dst.put_slice(item);

        Ok(())
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for FrameCodec {
    type Item = AlignedVec;
    type Error = CodecError;

    #[inline]
    fn decode(&self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < LENGTH_PREFIX {
            return Ok(None);
        }

        let len = u32::from_le_bytes([src[0], src[1], src[2], src[3]]) as usize;
        self.check_size(len)?;

        let total_len = LENGTH_PREFIX + len;
        if src.len() < total_len {
            src.reserve(total_len - src.len());
            return Ok(None);
        }

        src.advance(LENGTH_PREFIX);
        let data = src.split_to(len);

        // rkyv needs aligned input; this copy is the only one on the read path.
        let mut aligned = AlignedVec::with_capacity(len);
        aligned.extend_from_slice(&data);

        Ok(Some(aligned))
    }
}

impl Encoder for FrameCodec {
    type Item = Vec<u8>;
    type Error = CodecError;

    #[inline]
    fn encode(&self, item: Self::Item, dst: &mut BytesMut) -> Result<(), Self::Error> {
        self.encode_slice(&item, dst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_frame() {
        let codec = FrameCodec::new();
        let mut buf = BytesMut::new();

        buf.put_u8(10);
        buf.put_u8(0);
        assert!(codec.decode(&mut buf).unwrap().is_none());

        buf.put_u8(0);
        buf.put_u8(0);
        assert!(codec.decode(&mut buf).unwrap().is_none());

        buf.put_slice(b"Arith");
        assert!(codec.decode(&mut buf).unwrap().is_none());

        buf.put_slice(b".Mul.");
        let decoded = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded.as_slice(), b"Arith.Mul.");
        assert!(buf.is_empty());
    }

    #[test]
    fn test_header_then_body_frames() {
        let codec = FrameCodec::new();
        let mut buf = BytesMut::new();

        codec.encode(b"header".to_vec(), &mut buf).unwrap();
        codec.encode_slice(b"body", &mut buf).unwrap();

        assert_eq!(codec.decode(&mut buf).unwrap().unwrap().as_slice(), b"header");
        assert_eq!(codec.decode(&mut buf).unwrap().unwrap().as_slice(), b"body");
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_frame_too_large() {
        let codec = FrameCodec::with_max_frame_size(100);
        let mut buf = BytesMut::new();

        let result = codec.encode_slice(&[0u8; 200], &mut buf);
        assert!(matches!(
            result,
            Err(CodecError::FrameTooLarge { size: 200, max: 100 })
        ));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_decode_oversized_frame() {
        let codec = FrameCodec::with_max_frame_size(100);
        let mut buf = BytesMut::new();

        buf.put_u32_le(200);
        let result = codec.decode(&mut buf);
        assert!(matches!(result, Err(CodecError::FrameTooLarge { .. })));
    }

    #[test]
    fn test_empty_frame() {
        let codec = FrameCodec::new();
        let mut buf = BytesMut::new();

        codec.encode_slice(b"", &mut buf).unwrap();
        assert_eq!(buf.len(), LENGTH_PREFIX);
        let decoded = codec.decode(&mut buf).unwrap().unwrap();
        assert!(decoded.is_empty());
    }

    #[test]
    fn test_aligned_output() {
        let codec = FrameCodec::new();
        let mut buf = BytesMut::new();

        codec.encode_slice(b"test data", &mut buf).unwrap();
        let decoded = codec.decode(&mut buf).unwrap().unwrap();

        assert_eq!(decoded.as_ptr() as usize % 16, 0);
    }
}

//! Wire encodings for the values carried inside frames.
//!
//! A codec is generic over one [`Format`]; the format decides, per value
//! type, how that value becomes frame payload through [`Encoding`].

use rkyv::api::high::{HighDeserializer, HighSerializer, HighValidator};
use rkyv::bytecheck::CheckBytes;
use rkyv::rancor;
use rkyv::ser::allocator::ArenaHandle;
use rkyv::util::AlignedVec;
use rkyv::Archive;
use serde::de::DeserializeOwned;
use serde::Serialize;

use beacon_core::CodecError;

/// A named wire encoding.
pub trait Format: Send + Sync + 'static {
    /// Content type advertised for this encoding.
    const CONTENT_TYPE: &'static str;
}

/// Encoding of one value type under a [`Format`].
pub trait Encoding<T>: Format {
    /// Encode `value` into frame payload bytes.
    fn encode(value: &T) -> Result<Vec<u8>, CodecError>;

    /// Decode one value from an aligned frame payload.
    fn decode(bytes: &AlignedVec) -> Result<T, CodecError>;
}

/// rkyv archive encoding. Values are validated before deserialization.
#[derive(Debug, Clone, Copy, Default)]
pub struct Rkyv;

impl Format for Rkyv {
    const CONTENT_TYPE: &'static str = "application/rkyv";
}

impl<T> Encoding<T> for Rkyv
where
    T: Archive + for<'a> rkyv::Serialize<HighSerializer<AlignedVec, ArenaHandle<'a>, rancor::Error>>,
    T::Archived: for<'a> CheckBytes<HighValidator<'a, rancor::Error>>
        + rkyv::Deserialize<T, HighDeserializer<rancor::Error>>,
{
    fn encode(value: &T) -> Result<Vec<u8>, CodecError> {
        rkyv::to_bytes::<rancor::Error>(value)
            .map(|bytes| bytes.to_vec())
            .map_err(|e| CodecError::Serialization(e.to_string()))
    }

    fn decode(bytes: &AlignedVec) -> Result<T, CodecError> {
        rkyv::from_bytes::<T, rancor::Error>(bytes)
            .map_err(|e| CodecError::Deserialization(e.to_string()))
    }
}

/// JSON encoding via serde.
#[derive(Debug, Clone, Copy, Default)]
pub struct Json;

impl Format for Json {
    const CONTENT_TYPE: &'static str = "application/json";
}

impl<T> Encoding<T> for Json
where
    T: Serialize + DeserializeOwned,
{
    fn encode(value: &T) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(value).map_err(|e| CodecError::Serialization(e.to_string()))
    }

    fn decode(bytes: &AlignedVec) -> Result<T, CodecError> {
        serde_json::from_slice(bytes.as_slice())
            .map_err(|e| CodecError::Deserialization(e.to_string()))
    }
}

//! JSON codec for snapshots and mutation requests.
//!
//! Thin wrappers over `serde_json` that map failures into [`ProtocolError`]
//! so callers never see a raw `serde_json::Error`.

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use super::messages::TopologySnapshot;

/// Errors that can occur while encoding or decoding wire data.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ProtocolError {
    /// The input was empty.
    #[error("empty payload")]
    Empty,

    /// The payload is not valid JSON or does not match the expected shape.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// A value could not be serialized.
    #[error("failed to encode payload: {0}")]
    Encode(String),

    /// A filter name is not one of the known values.
    #[error("unknown topology filter: {0}")]
    UnknownFilter(String),
}

/// Decodes a topology snapshot from JSON bytes.
///
/// # Errors
///
/// [`ProtocolError::Empty`] for empty input, [`ProtocolError::MalformedPayload`]
/// for anything that is not a snapshot.
pub fn decode_snapshot(bytes: &[u8]) -> Result<TopologySnapshot, ProtocolError> {
    decode(bytes)
}

/// Encodes a topology snapshot as pretty-printed JSON.
///
/// # Errors
///
/// [`ProtocolError::Encode`] if serialization fails.
pub fn encode_snapshot(snapshot: &TopologySnapshot) -> Result<Vec<u8>, ProtocolError> {
    serde_json::to_vec_pretty(snapshot).map_err(|e| ProtocolError::Encode(e.to_string()))
}

/// Decodes any wire message.
///
/// # Errors
///
/// Same as [`decode_snapshot`].
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, ProtocolError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(ProtocolError::Empty);
    }
    serde_json::from_slice(bytes).map_err(|e| ProtocolError::MalformedPayload(e.to_string()))
}

/// Encodes any wire message as compact JSON.
///
/// # Errors
///
/// [`ProtocolError::Encode`] if serialization fails.
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, ProtocolError> {
    serde_json::to_vec(value).map_err(|e| ProtocolError::Encode(e.to_string()))
}

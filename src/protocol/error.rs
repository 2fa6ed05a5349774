//! Decoding errors for the TNS/TTC wire protocol.
//!
//! Shared by the varint codec, `FrameDecoder` and the per-message decoders.
//! "Need more data" is never an error: `FrameDecoder::decode` returns `Ok(None)`.
//! Everything here means the stream is malformed and the connection must close.

use thiserror::Error;

/// Errors that can occur while decoding server packets.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// A complete packet ended before a field could be read.
    #[error("Expected at least {expected} remaining bytes, found {actual}")]
    ExpectedAtLeast { expected: usize, actual: usize },

    /// A packet header declared a length smaller than the header itself.
    #[error("Invalid packet length {0}")]
    InvalidPacketLength(usize),

    /// A UB length byte outside the widths the integer type allows.
    #[error("Invalid UB{width} length byte {length}: stream is corrupt")]
    CorruptLength { length: u8, width: u8 },

    /// Unknown packet type or TTC message type.
    #[error("Unknown message id {0}")]
    UnknownMessageId(u8),

    /// Control packet with an unknown control type.
    #[error("Unknown control type {0}")]
    UnknownControlType(u16),

    /// Column or bind of a type this driver cannot route.
    #[error("Unsupported data type {0}")]
    UnsupportedDataType(u8),

    /// Structurally valid bytes that do not make sense for the field.
    #[error("Field not decodable: {0}")]
    FieldNotDecodable(&'static str),

    /// Text field that is not valid UTF-8 (the negotiated charset is AL32UTF8).
    #[error("Invalid UTF-8 in {0}")]
    InvalidUtf8(&'static str),
}

pub type DecodeResult<T> = Result<T, DecodeError>;

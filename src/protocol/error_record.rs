//! Protocol-error record: the payload carried in a `ProtocolError` framelet.
//! Small fixed-field binary record, same hand-rolled style as `header.rs`.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

pub const ERROR_RECORD_SCHEMA_VERSION: u8 = 1;

/// The set of ways a frame can fail classification, or be reported by a peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolErrorCode {
    /// The frame's shape didn't match the protocol grammar.
    MalformedData,
    /// The frame was well-formed but names a payload type this variant
    /// doesn't support (e.g. an `Event` frame under the lean variant).
    NotSupported,
    /// A `ProtocolError` framelet was itself malformed or out of place.
    ErrorInError,
}

impl ProtocolErrorCode {
    fn to_code(self) -> u8 {
        match self {
            Self::MalformedData => 1,
            Self::NotSupported => 2,
            Self::ErrorInError => 3,
        }
    }

    fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::MalformedData),
            2 => Some(Self::NotSupported),
            3 => Some(Self::ErrorInError),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolErrorRecord {
    pub code: ProtocolErrorCode,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum ErrorRecordError {
    #[error("unsupported protocol-error record schema version {0}")]
    UnsupportedSchema(u8),
    #[error("unknown protocol error code {0}")]
    UnknownCode(u8),
    #[error("truncated protocol-error record")]
    Truncated,
    #[error("protocol-error message is not valid utf8")]
    InvalidMessage,
}

impl ProtocolErrorRecord {
    pub fn encode(&self) -> Bytes {
        let message_bytes = self.message.as_bytes();
        let mut buf = BytesMut::with_capacity(1 + 1 + 4 + message_bytes.len());
        buf.put_u8(ERROR_RECORD_SCHEMA_VERSION);
        buf.put_u8(self.code.to_code());
        buf.put_u32_le(message_bytes.len() as u32);
        buf.extend_from_slice(message_bytes);
        buf.freeze()
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ErrorRecordError> {
        let mut cursor = bytes;
        if cursor.remaining() < 2 {
            return Err(ErrorRecordError::Truncated);
        }
        let schema = cursor.get_u8();
        if schema != ERROR_RECORD_SCHEMA_VERSION {
            return Err(ErrorRecordError::UnsupportedSchema(schema));
        }
        let code = ProtocolErrorCode::from_code(cursor.get_u8()).ok_or_else(|| ErrorRecordError::UnknownCode(bytes[1]))?;
        if cursor.remaining() < 4 {
            return Err(ErrorRecordError::Truncated);
        }
        let message_len = cursor.get_u32_le() as usize;
        if cursor.remaining() < message_len {
            return Err(ErrorRecordError::Truncated);
        }
        let message = std::str::from_utf8(&cursor[..message_len])
            .map_err(|_| ErrorRecordError::InvalidMessage)?
            .to_string();
        Ok(Self { code, message })
    }
}

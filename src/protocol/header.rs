//! Header record (component B): the fixed-field binary record carried in
//! every frame's `Headers` framelet. Hand-rolled `BufMut`/`Buf` encode/decode
//! in a manual, little-endian, schema-versioned style.
//!
//! There is no separate layer-data-descriptor field here: the presence or
//! absence of a `LayerData` framelet in the frame itself is the descriptor.
//! The classifier's `ExpectOptionalLayerData` transition reads that directly
//! off the frame rather than off a flag inside this record.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

pub const HEADER_SCHEMA_VERSION: u8 = 1;

/// What kind of payload this frame carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadType {
    Request,
    Response,
    Event,
}

impl PayloadType {
    fn to_code(self) -> u8 {
        match self {
            Self::Request => 1,
            Self::Response => 2,
            Self::Event => 3,
        }
    }

    fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::Request),
            2 => Some(Self::Response),
            3 => Some(Self::Event),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub request_id: u32,
    pub payload_type: PayloadType,
    pub method_name: String,
    pub error_code: i32,
}

#[derive(Debug, Error)]
pub enum HeaderError {
    #[error("unsupported header schema version {0}")]
    UnsupportedSchema(u8),
    #[error("unknown payload type code {0}")]
    UnknownPayloadType(u8),
    #[error("truncated header record")]
    Truncated,
    #[error("method name is not valid utf8")]
    InvalidMethodName,
}

impl Header {
    pub fn encode(&self) -> Bytes {
        let method_bytes = self.method_name.as_bytes();
        let mut buf = BytesMut::with_capacity(1 + 4 + 1 + 4 + 4 + method_bytes.len());
        buf.put_u8(HEADER_SCHEMA_VERSION);
        buf.put_u32_le(self.request_id);
        buf.put_u8(self.payload_type.to_code());
        buf.put_i32_le(self.error_code);
        buf.put_u32_le(method_bytes.len() as u32);
        buf.extend_from_slice(method_bytes);
        buf.freeze()
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, HeaderError> {
        let mut cursor = bytes;
        if cursor.remaining() < 1 {
            return Err(HeaderError::Truncated);
        }
        let schema = cursor.get_u8();
        if schema != HEADER_SCHEMA_VERSION {
            return Err(HeaderError::UnsupportedSchema(schema));
        }
        if cursor.remaining() < 4 + 1 + 4 + 4 {
            return Err(HeaderError::Truncated);
        }
        let request_id = cursor.get_u32_le();
        let type_code = cursor.get_u8();
        let payload_type = PayloadType::from_code(type_code).ok_or(HeaderError::UnknownPayloadType(type_code))?;
        let error_code = cursor.get_i32_le();
        let method_len = cursor.get_u32_le() as usize;
        if cursor.remaining() < method_len {
            return Err(HeaderError::Truncated);
        }
        let method_name = std::str::from_utf8(&cursor[..method_len])
            .map_err(|_| HeaderError::InvalidMethodName)?
            .to_string();
        Ok(Self { request_id, payload_type, method_name, error_code })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips_a_header() {
        let header = Header {
            request_id: 7,
            payload_type: PayloadType::Request,
            method_name: "echo".to_string(),
            error_code: 0,
        };
        let encoded = header.encode();
        let decoded = Header::decode(&encoded).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn rejects_unsupported_schema_version() {
        let mut buf = BytesMut::new();
        buf.put_u8(99);
        assert!(matches!(Header::decode(&buf), Err(HeaderError::UnsupportedSchema(99))));
    }

    #[test]
    fn rejects_unknown_payload_type() {
        let mut buf = BytesMut::new();
        buf.put_u8(HEADER_SCHEMA_VERSION);
        buf.put_u32_le(1);
        buf.put_u8(9);
        buf.put_i32_le(0);
        buf.put_u32_le(0);
        assert!(matches!(Header::decode(&buf), Err(HeaderError::UnknownPayloadType(9))));
    }

    #[test]
    fn rejects_truncated_record() {
        assert!(matches!(Header::decode(&[HEADER_SCHEMA_VERSION]), Err(HeaderError::Truncated)));
    }
}

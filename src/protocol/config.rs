//! Configuration framelet payload. The protocol treats config contents as
//! opaque: the only validation a `Config` framelet gets at the classifier
//! level is "does it parse as CBOR at all", so callers above the classifier
//! decide what the record actually means. Uses `ciborium` for the narrow job
//! of validating the opaque blob rather than decoding a typed record.

use bytes::Bytes;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config record is not valid CBOR: {0}")]
    InvalidCbor(String),
}

/// An opaque, successfully-CBOR-decoded config blob. `raw` preserves the
/// original bytes for forwarding; `value` is the decoded document.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigRecord {
    pub raw: Bytes,
    pub value: ciborium::value::Value,
}

impl ConfigRecord {
    pub fn decode(bytes: &Bytes) -> Result<Self, ConfigError> {
        let value: ciborium::value::Value =
            ciborium::de::from_reader(bytes.as_ref()).map_err(|e| ConfigError::InvalidCbor(e.to_string()))?;
        Ok(Self { raw: bytes.clone(), value })
    }

    pub fn encode_value<T: Serialize>(value: &T) -> Result<Bytes, ConfigError> {
        let mut out = Vec::new();
        ciborium::ser::into_writer(value, &mut out).map_err(|e| ConfigError::InvalidCbor(e.to_string()))?;
        Ok(Bytes::from(out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_a_valid_cbor_document() {
        let encoded = ConfigRecord::encode_value(&42u32).unwrap();
        let record = ConfigRecord::decode(&encoded).unwrap();
        assert_eq!(record.raw, encoded);
    }

    #[test]
    fn rejects_non_cbor_bytes() {
        let garbage = Bytes::from_static(&[0xFF, 0xFF, 0xFF, 0xFF, 0xFF]);
        assert!(ConfigRecord::decode(&garbage).is_err());
    }
}

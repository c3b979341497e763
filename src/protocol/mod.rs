//! Wire protocol: framelet container codec, header record, config and
//! protocol-error records, and the frame classifier that ties them together.

pub mod classify;
pub mod config;
pub mod error_record;
pub mod frame_wire;
pub mod header;

pub use classify::{classify, ClassifyResult, Disposition, ProtocolVariant};
pub use config::{ConfigError, ConfigRecord};
pub use error_record::{ErrorRecordError, ProtocolErrorCode, ProtocolErrorRecord};
pub use frame_wire::{Frame, FrameContainerCodec, Framelet, FrameletError, FrameletType, MAX_FRAMELETS, MAX_FRAMELET_LEN};
pub use header::{Header, HeaderError, PayloadType, HEADER_SCHEMA_VERSION};

use thiserror::Error;

/// Crate-level error, composed from each component's own error type: one
/// `thiserror` variant per failure mode, `#[from]` for the ones that wrap a
/// lower-level error.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("framelet codec error: {0}")]
    Framelet(#[from] FrameletError),
    #[error("header codec error: {0}")]
    Header(#[from] HeaderError),
    #[error("config record error: {0}")]
    Config(#[from] ConfigError),
    #[error("protocol error record error: {0}")]
    ErrorRecord(#[from] ErrorRecordError),
    #[error("request id space exhausted")]
    RequestIdsExhausted,
    #[error("request was cancelled")]
    RequestCancelled,
    #[error("no outstanding request for id {0}")]
    NoSuchRequest(u32),
    #[error("connection closed")]
    ConnectionClosed,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

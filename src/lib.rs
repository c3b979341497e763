//! Framewire - a self-describing framed binary RPC transport
//!
//! Peers exchange request/response/event messages over pluggable transports
//! (a stream-oriented connection or an in-process loopback) using a typed,
//! length-tagged "framelet" wire format. A deterministic classifier turns
//! each received frame into a disposition (deliver to a service, complete an
//! outstanding request, process configuration, report or hang up on a
//! protocol error) without ever needing to buffer or re-parse the frame.
//!
//! # Quick start
//! ```rust,no_run
//! use framewire::connection::{cancel_pair, Connection, Side};
//! use framewire::dispatch::ServiceRegistry;
//! use framewire::protocol::ProtocolVariant;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let (a, b) = framewire::transport::loopback_pair(64 * 1024);
//! let services = Arc::new(ServiceRegistry::new());
//! let server = Connection::start(a, Side::Server, ProtocolVariant::Rich, services.clone());
//! let client = Connection::start(b, Side::Client, ProtocolVariant::Rich, services);
//!
//! let (_handle, token) = cancel_pair();
//! let _ = client.request_response("ping", bytes::Bytes::new(), token).await;
//! # Ok(())
//! # }
//! ```

pub mod connection;
pub mod dispatch;
pub mod outbound;
pub mod protocol;
pub mod server;
pub mod transport;

pub use protocol::{classify, ClassifyResult, Disposition, ProtocolError, ProtocolVariant};
pub use server::{Server, ServerConfig};

/// Protocol version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Protocol name, exchanged during transport-level negotiation by callers
/// that need to identify which wire format a peer speaks.
pub const PROTOCOL_NAME: &str = "framewire-binary-protocol";

/// Whether this build supports the protocol. Always `true` today; kept as a
/// stable entry point for future version-gated builds.
pub fn is_supported() -> bool {
    true
}

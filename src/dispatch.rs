//! Dispatcher (component E): `Service`/`ServiceRegistry` plus the action
//! each `Disposition` maps to. `Service` returns a manually boxed future
//! rather than using an `async fn` directly, which is the standard idiom
//! for an object-safe async trait (the same shape as `tower::Service` /
//! `hyper::service::Service`) and avoids taking on an `async-trait`
//! dependency. `ServiceRegistry` is a method-name-keyed registry with typed
//! error codes: no codegen, no service discovery.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, trace, warn};

use crate::connection::outstanding::OutstandingRequests;
use crate::outbound::{build_frame, build_protocol_error_frame};
use crate::protocol::classify::{ClassifyResult, Disposition};
use crate::protocol::error_record::ProtocolErrorRecord;
use crate::protocol::frame_wire::Frame;
use crate::protocol::header::PayloadType;

pub type ServiceFuture = Pin<Box<dyn Future<Output = Result<Bytes, ServiceError>> + Send>>;

/// A handler for one or more RPC methods. `call` is invoked for both
/// requests (its return value becomes the response payload) and events
/// (its return value is only used for logging on failure).
pub trait Service: Send + Sync {
    fn call(&self, method: &str, payload: Bytes) -> ServiceFuture;
}

#[derive(Debug, Clone, Error)]
pub enum ServiceError {
    #[error("method not found: {0}")]
    MethodNotFound(String),
    #[error("application error {code}: {message}")]
    Application { code: i32, message: String },
}

/// Method-name-keyed table of registered services. Register/deregister are
/// the only lifecycle operations this runtime offers: it intentionally
/// does not do service discovery or codegen.
#[derive(Default)]
pub struct ServiceRegistry {
    handlers: DashMap<String, Arc<dyn Service>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self { handlers: DashMap::new() }
    }

    pub fn register(&self, method: impl Into<String>, service: Arc<dyn Service>) {
        self.handlers.insert(method.into(), service);
    }

    pub fn deregister(&self, method: &str) -> bool {
        self.handlers.remove(method).is_some()
    }

    pub fn get(&self, method: &str) -> Option<Arc<dyn Service>> {
        self.handlers.get(method).map(|entry| entry.value().clone())
    }
}

/// What the caller driving a connection's reader loop should do after a
/// frame has been classified and dispatched.
pub enum DispatchOutcome {
    Continue,
    CloseConnection,
    PeerProtocolError(ProtocolErrorRecord),
}

const METHOD_NOT_FOUND: i32 = 1;

/// Map a `ClassifyResult`'s disposition to the corresponding action,
/// performing whatever I/O that action requires (sending a response,
/// completing an outstanding request, sending a protocol error).
pub async fn dispatch(
    result: ClassifyResult,
    services: &ServiceRegistry,
    outstanding: &OutstandingRequests,
    outbound: &mpsc::UnboundedSender<Frame>,
) -> DispatchOutcome {
    match result.disposition {
        Disposition::DeliverRequestToService => {
            let Some(headers) = result.headers else {
                error!("request disposition missing headers, dropping frame");
                return DispatchOutcome::Continue;
            };
            let payload = result.payload.unwrap_or_default();
            let response = match services.get(&headers.method_name) {
                Some(service) => match service.call(&headers.method_name, payload).await {
                    Ok(bytes) => {
                        build_frame(headers.request_id, &headers.method_name, PayloadType::Response, 0, bytes, None)
                    }
                    Err(ServiceError::Application { code, message }) => build_frame(
                        headers.request_id,
                        &headers.method_name,
                        PayloadType::Response,
                        code,
                        Bytes::from(message),
                        None,
                    ),
                    Err(ServiceError::MethodNotFound(name)) => build_frame(
                        headers.request_id,
                        &headers.method_name,
                        PayloadType::Response,
                        METHOD_NOT_FOUND,
                        Bytes::from(format!("method not found: {name}")),
                        None,
                    ),
                },
                None => build_frame(
                    headers.request_id,
                    &headers.method_name,
                    PayloadType::Response,
                    METHOD_NOT_FOUND,
                    Bytes::from(format!("method not found: {}", headers.method_name)),
                    None,
                ),
            };
            if outbound.send(response).is_err() {
                warn!("failed to queue response frame, outbound channel closed");
            }
            DispatchOutcome::Continue
        }
        Disposition::DeliverResponseToProxy => {
            let Some(headers) = result.headers else {
                error!("response disposition missing headers, dropping frame");
                return DispatchOutcome::Continue;
            };
            let payload = result.payload.unwrap_or_default();
            if !outstanding.complete(headers.request_id, payload) {
                debug!(request_id = headers.request_id, "dropping response for unknown or late request id");
            }
            DispatchOutcome::Continue
        }
        Disposition::DeliverEventToService => {
            let Some(headers) = result.headers else {
                error!("event disposition missing headers, dropping frame");
                return DispatchOutcome::Continue;
            };
            let payload = result.payload.unwrap_or_default();
            match services.get(&headers.method_name) {
                Some(service) => {
                    if let Err(e) = service.call(&headers.method_name, payload).await {
                        warn!(error = %e, method = %headers.method_name, "event handler failed");
                    }
                }
                None => debug!(method = %headers.method_name, "no handler registered for event"),
            }
            DispatchOutcome::Continue
        }
        Disposition::ProcessConfig => {
            trace!("processed configuration frame");
            DispatchOutcome::Continue
        }
        Disposition::HandleProtocolError => {
            let record = result.error.unwrap_or(ProtocolErrorRecord {
                code: crate::protocol::error_record::ProtocolErrorCode::MalformedData,
                message: String::new(),
            });
            DispatchOutcome::PeerProtocolError(record)
        }
        Disposition::SendProtocolError => {
            let Some(code) = result.error_code else {
                error!("send-protocol-error disposition missing an error code");
                return DispatchOutcome::Continue;
            };
            let record = ProtocolErrorRecord { code, message: String::new() };
            let frame = build_protocol_error_frame(&record);
            if outbound.send(frame).is_err() {
                warn!("failed to queue protocol error frame, outbound channel closed");
            }
            DispatchOutcome::Continue
        }
        Disposition::HangUp => DispatchOutcome::CloseConnection,
        Disposition::Indeterminate => {
            error!("classifier returned an indeterminate disposition; this is a bug");
            DispatchOutcome::CloseConnection
        }
    }
}

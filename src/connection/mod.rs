//! Connection state (component D): ties the request-ID allocator and
//! outstanding-request table to a running transport, reading frames,
//! classifying them, and driving the dispatcher.

pub mod cancel;
pub mod outstanding;
pub mod request_id;

pub use cancel::{cancel_pair, CancelHandle, CancelToken};
pub use outstanding::{OutstandingRequests, RequestOutcome};
pub use request_id::{RequestIdAllocator, Side};

use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, RwLock};
use tokio_util::codec::{Decoder, Encoder};
use tracing::{error, warn};

use crate::dispatch::{dispatch, DispatchOutcome, Service, ServiceRegistry};
use crate::outbound::build_frame;
use crate::protocol::classify::{classify, ProtocolVariant};
use crate::protocol::frame_wire::{Frame, FrameContainerCodec};
use crate::protocol::header::PayloadType;
use crate::protocol::ProtocolError;
use crate::transport::Transport;

/// Running counters for one connection.
#[derive(Debug, Clone, Default)]
pub struct ConnectionStats {
    pub frames_sent: u64,
    pub frames_received: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
}

struct ConnectionShared {
    id_alloc: RequestIdAllocator,
    outstanding: OutstandingRequests,
    services: Arc<ServiceRegistry>,
    outbound_tx: mpsc::UnboundedSender<Frame>,
    cancel: CancelHandle,
    cancel_check: CancelToken,
    stats: RwLock<ConnectionStats>,
    variant: ProtocolVariant,
}

/// A handle to a live connection. Reading and writing happen on background
/// tasks spawned by `start`; this handle is cheap to clone and hold onto for
/// issuing requests or registering services while those tasks run.
#[derive(Clone)]
pub struct Connection {
    shared: Arc<ConnectionShared>,
}

impl Connection {
    /// Begin driving `transport`: spawns the reader (decode -> classify ->
    /// dispatch) and writer tasks and returns immediately.
    pub fn start<T>(transport: T, side: Side, variant: ProtocolVariant, services: Arc<ServiceRegistry>) -> Self
    where
        T: Transport,
    {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (cancel_handle, cancel_token) = cancel_pair();
        let shared = Arc::new(ConnectionShared {
            id_alloc: RequestIdAllocator::new(side),
            outstanding: OutstandingRequests::new(),
            services,
            outbound_tx,
            cancel: cancel_handle,
            cancel_check: cancel_token.clone(),
            stats: RwLock::new(ConnectionStats::default()),
            variant,
        });

        let (read_half, write_half) = tokio::io::split(transport);
        tokio::spawn(run_writer(write_half, outbound_rx, cancel_token.clone(), shared.clone()));
        tokio::spawn(run_reader(read_half, shared.clone(), cancel_token));

        Self { shared }
    }

    /// Signal cancellation and return immediately; the reader/writer tasks
    /// tear down and drain outstanding requests on their own schedule.
    pub fn stop(&self) {
        self.shared.cancel.cancel();
    }

    /// Resolve once this connection's tasks have torn down (cleanly closed,
    /// cancelled, or failed).
    pub async fn closed(&self) {
        let mut token = self.shared.cancel_check.clone();
        token.cancelled().await;
    }

    pub async fn stats(&self) -> ConnectionStats {
        self.shared.stats.read().await.clone()
    }

    pub fn register_service(&self, method: impl Into<String>, service: Arc<dyn Service>) {
        self.shared.services.register(method, service);
    }

    pub fn deregister_service(&self, method: &str) -> bool {
        self.shared.services.deregister(method)
    }

    /// Send a request and await its matching response, or resolve early if
    /// `cancel` fires first.
    pub async fn request_response(
        &self,
        method: &str,
        payload: Bytes,
        mut cancel: CancelToken,
    ) -> Result<Bytes, ProtocolError> {
        let request_id = self.shared.id_alloc.allocate()?;
        let rx = self.shared.outstanding.register(request_id);
        let frame = build_frame(request_id, method, PayloadType::Request, 0, payload, None);
        self.shared.outbound_tx.send(frame).map_err(|_| ProtocolError::ConnectionClosed)?;

        tokio::select! {
            outcome = rx => match outcome {
                Ok(RequestOutcome::Response(bytes)) => Ok(bytes),
                Ok(RequestOutcome::Cancelled) => Err(ProtocolError::RequestCancelled),
                Ok(RequestOutcome::ConnectionClosed) | Err(_) => Err(ProtocolError::ConnectionClosed),
            },
            _ = cancel.cancelled() => {
                self.shared.outstanding.cancel(request_id);
                Err(ProtocolError::RequestCancelled)
            }
        }
    }

    /// Send a fire-and-forget event frame; does not wait for a response.
    pub fn send_event(&self, method: &str, payload: Bytes) -> Result<(), ProtocolError> {
        let request_id = self.shared.id_alloc.allocate()?;
        let frame = build_frame(request_id, method, PayloadType::Event, 0, payload, None);
        self.shared.outbound_tx.send(frame).map_err(|_| ProtocolError::ConnectionClosed)
    }
}

async fn run_writer<W>(
    mut write_half: W,
    mut outbound_rx: mpsc::UnboundedReceiver<Frame>,
    mut cancel_token: CancelToken,
    shared: Arc<ConnectionShared>,
) where
    W: AsyncWrite + Unpin,
{
    let mut codec = FrameContainerCodec;
    loop {
        tokio::select! {
            frame = outbound_rx.recv() => {
                let Some(frame) = frame else { break };
                let mut buf = BytesMut::new();
                if let Err(e) = codec.encode(frame, &mut buf) {
                    error!(error = %e, "failed to encode outbound frame");
                    continue;
                }
                if let Err(e) = write_half.write_all(&buf).await {
                    warn!(error = %e, "failed to write frame to transport");
                    break;
                }
                let mut stats = shared.stats.write().await;
                stats.frames_sent += 1;
                stats.bytes_sent += buf.len() as u64;
            }
            _ = cancel_token.cancelled() => break,
        }
    }
    shared.cancel.cancel();
    shared.outstanding.drain_with_closed();
}

async fn run_reader<R>(mut read_half: R, shared: Arc<ConnectionShared>, mut cancel_token: CancelToken)
where
    R: AsyncRead + Unpin,
{
    let mut codec = FrameContainerCodec;
    let mut buf = BytesMut::with_capacity(4096);

    'outer: loop {
        let read_result = tokio::select! {
            result = read_half.read_buf(&mut buf) => result,
            _ = cancel_token.cancelled() => break,
        };

        match read_result {
            Ok(0) => break,
            Ok(n) => {
                let mut stats = shared.stats.write().await;
                stats.bytes_received += n as u64;
            }
            Err(e) => {
                warn!(error = %e, "connection read error");
                break;
            }
        }

        loop {
            match codec.decode(&mut buf) {
                Ok(Some(frame)) => {
                    {
                        let mut stats = shared.stats.write().await;
                        stats.frames_received += 1;
                    }
                    let result = classify(Some(&frame), shared.variant);
                    let outcome =
                        dispatch(result, &shared.services, &shared.outstanding, &shared.outbound_tx).await;
                    match outcome {
                        DispatchOutcome::Continue => {}
                        DispatchOutcome::CloseConnection => break 'outer,
                        DispatchOutcome::PeerProtocolError(record) => {
                            warn!(code = ?record.code, message = %record.message, "peer reported a protocol error");
                            break 'outer;
                        }
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "framelet decode error, closing connection");
                    break 'outer;
                }
            }
        }
    }
    shared.cancel.cancel();
    shared.outstanding.drain_with_closed();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::loopback_pair;
    use std::sync::Arc;

    struct Echo;
    impl Service for Echo {
        fn call(&self, _method: &str, payload: Bytes) -> crate::dispatch::ServiceFuture {
            Box::pin(async move { Ok(payload) })
        }
    }

    #[tokio::test]
    async fn request_response_round_trips_over_a_loopback_transport() {
        let (a, b) = loopback_pair(64 * 1024);
        let services = Arc::new(ServiceRegistry::new());
        services.register("echo", Arc::new(Echo));

        let server = Connection::start(a, Side::Server, ProtocolVariant::Rich, services.clone());
        let client = Connection::start(b, Side::Client, ProtocolVariant::Rich, services);

        let (_handle, token) = cancel_pair();
        let response =
            client.request_response("echo", Bytes::from_static(b"ping"), token).await.unwrap();
        assert_eq!(response, Bytes::from_static(b"ping"));

        server.stop();
        client.stop();
    }

    #[tokio::test]
    async fn stopping_a_connection_wakes_pending_requests_with_connection_closed() {
        let (a, b) = loopback_pair(64 * 1024);
        let services = Arc::new(ServiceRegistry::new());
        let server = Connection::start(a, Side::Server, ProtocolVariant::Rich, services.clone());
        let client = Connection::start(b, Side::Client, ProtocolVariant::Rich, services);

        client.stop();
        let (_handle, token) = cancel_pair();
        let result = client.request_response("never-registered", Bytes::new(), token).await;
        assert!(result.is_err());
        server.stop();
    }
}

//! Outstanding-request table: maps a request ID to the completion handle a
//! caller is waiting on. Uses `dashmap::DashMap` for lock-free concurrent
//! access from many in-flight `request_response` callers plus the
//! connection's single reader task.

use bytes::Bytes;
use dashmap::DashMap;
use tokio::sync::oneshot;

#[derive(Debug, Clone)]
pub enum RequestOutcome {
    Response(Bytes),
    Cancelled,
    ConnectionClosed,
}

#[derive(Default)]
pub struct OutstandingRequests {
    table: DashMap<u32, oneshot::Sender<RequestOutcome>>,
}

impl OutstandingRequests {
    pub fn new() -> Self {
        Self { table: DashMap::new() }
    }

    pub fn register(&self, request_id: u32) -> oneshot::Receiver<RequestOutcome> {
        let (tx, rx) = oneshot::channel();
        self.table.insert(request_id, tx);
        rx
    }

    /// Complete the outstanding request, if any. Returns `false` if no
    /// caller is waiting on this ID (late, duplicate, or unknown response).
    pub fn complete(&self, request_id: u32, payload: Bytes) -> bool {
        match self.table.remove(&request_id) {
            Some((_, tx)) => {
                let _ = tx.send(RequestOutcome::Response(payload));
                true
            }
            None => false,
        }
    }

    pub fn cancel(&self, request_id: u32) -> bool {
        match self.table.remove(&request_id) {
            Some((_, tx)) => {
                let _ = tx.send(RequestOutcome::Cancelled);
                true
            }
            None => false,
        }
    }

    /// Wake every still-outstanding caller with `ConnectionClosed`. Called
    /// once the connection's reader/writer tasks have torn down, so no
    /// caller is left awaiting a oneshot that will never fire.
    pub fn drain_with_closed(&self) {
        let keys: Vec<u32> = self.table.iter().map(|entry| *entry.key()).collect();
        for key in keys {
            if let Some((_, tx)) = self.table.remove(&key) {
                let _ = tx.send(RequestOutcome::ConnectionClosed);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn completing_a_registered_request_wakes_its_waiter() {
        let table = OutstandingRequests::new();
        let rx = table.register(1);
        assert!(table.complete(1, Bytes::from_static(b"ok")));
        let outcome = rx.await.unwrap();
        assert!(matches!(outcome, RequestOutcome::Response(b) if b == Bytes::from_static(b"ok")));
    }

    #[test]
    fn completing_an_unknown_id_is_a_no_op() {
        let table = OutstandingRequests::new();
        assert!(!table.complete(99, Bytes::new()));
    }

    #[tokio::test]
    async fn drain_wakes_all_waiters_with_connection_closed() {
        let table = OutstandingRequests::new();
        let rx1 = table.register(1);
        let rx2 = table.register(2);
        table.drain_with_closed();
        assert!(matches!(rx1.await.unwrap(), RequestOutcome::ConnectionClosed));
        assert!(matches!(rx2.await.unwrap(), RequestOutcome::ConnectionClosed));
        assert!(table.is_empty());
    }
}

//! Cooperative cancellation, built from plain `tokio::sync` primitives
//! (already pulled in by the `full` feature) rather than
//! `tokio_util::sync::CancellationToken`, so no extra feature flag has to
//! be taken on faith. A `watch<bool>` channel is enough: cancellation is a
//! one-shot, idempotent, level-triggered signal, not a value stream.

use tokio::sync::watch;

#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

/// Build a linked signal/observer pair. The handle side calls `cancel()`;
/// every clone of the token side observes it.
pub fn cancel_pair() -> (CancelHandle, CancelToken) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, CancelToken { rx })
}

impl CancelHandle {
    /// Signal cancellation and return immediately. Idempotent: calling this
    /// more than once, or after every token has been dropped, is harmless.
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

impl CancelToken {
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once cancellation has been signalled. Safe to call
    /// repeatedly and to race inside `tokio::select!`.
    pub async fn cancelled(&mut self) {
        loop {
            if *self.rx.borrow() {
                return;
            }
            if self.rx.changed().await.is_err() {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn token_resolves_after_handle_cancels() {
        let (handle, mut token) = cancel_pair();
        assert!(!token.is_cancelled());
        handle.cancel();
        token.cancelled().await;
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn cancelling_twice_is_harmless() {
        let (handle, mut token) = cancel_pair();
        handle.cancel();
        handle.cancel();
        token.cancelled().await;
        assert!(token.is_cancelled());
    }
}

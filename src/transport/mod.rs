//! Pluggable transport seam.
//!
//! Anything that implements `AsyncRead + AsyncWrite + Unpin + Send +
//! 'static` is a valid transport: `tokio::net::TcpStream`,
//! `tokio::net::UnixStream`, a Windows named pipe, or the in-process
//! loopback pair below. A `Connection` can be started over any of them
//! identically.

use tokio::io::{AsyncRead, AsyncWrite};

pub trait Transport: AsyncRead + AsyncWrite + Unpin + Send + 'static {}

impl<T> Transport for T where T: AsyncRead + AsyncWrite + Unpin + Send + 'static {}

/// An in-process loopback transport pair, for same-process peers (tests,
/// embedded use) that don't need a real socket. Built directly on
/// `tokio::io::duplex`; no separate wrapper type is needed since
/// `DuplexStream` already satisfies `Transport`.
pub fn loopback_pair(buffer_size: usize) -> (impl Transport, impl Transport) {
    tokio::io::duplex(buffer_size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn loopback_pair_delivers_bytes_written_on_one_end_to_the_other() {
        let (mut a, mut b) = loopback_pair(1024);
        a.write_all(b"hello").await.unwrap();
        let mut buf = [0u8; 5];
        b.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"hello");
    }
}
